use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{bearer, check, require_token, strip_extension, transport};
use super::{Credentials, ProviderKind, RemoteFile, StorageProvider, UploadRequest, APP_FOLDER};
use crate::error::{Result, SyncError};
use crate::sync::codec::{self, Payload};

const API: &str = "https://api.box.com/2.0";
const UPLOAD: &str = "https://upload.box.com/api/2.0";
const ROOT_FOLDER: &str = "0";

pub struct BoxDrive {
    client: reqwest::Client,
    access_token: Option<String>,
    refresh_token: Option<String>,
    refresh_url: Option<String>,
    revoke_url: Option<String>,
}

#[derive(Deserialize)]
struct Items {
    #[serde(default)]
    entries: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct Refreshed {
    access_token: String,
    refresh_token: Option<String>,
}

fn profile_files(items: Items) -> Vec<RemoteFile> {
    items
        .entries
        .into_iter()
        .filter(|i| i.kind == "file")
        .map(|i| RemoteFile { name: strip_extension(&i.name).to_string(), id: i.id })
        .collect()
}

impl BoxDrive {
    pub fn new(client: reqwest::Client, refresh_url: Option<String>, revoke_url: Option<String>) -> Self {
        BoxDrive { client, access_token: None, refresh_token: None, refresh_url, revoke_url }
    }

    /// Probe the root folder; a 401 means the token expired and gets refreshed.
    async fn ensure_token(&mut self) -> Result<String> {
        let token = require_token(&self.access_token)?.to_string();
        let resp = self
            .client
            .get(format!("{}/folders/{}", API, ROOT_FOLDER))
            .header("Authorization", bearer(&token))
            .send()
            .await
            .map_err(transport)?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            check(resp, "token probe").await?;
            return Ok(token);
        }

        tracing::info!("box access token expired, refreshing");
        let url = self
            .refresh_url
            .as_deref()
            .ok_or_else(|| SyncError::Provider("Access token expired".into()))?;
        let refresh = self.refresh_token.as_deref().ok_or(SyncError::NotAuthenticated)?;
        let resp = self
            .client
            .post(url)
            .query(&[("refresh_token", refresh)])
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(transport)?;
        let fresh: Refreshed = check(resp, "token refresh").await?.json().await.map_err(transport)?;
        self.access_token = Some(fresh.access_token.clone());
        if fresh.refresh_token.is_some() {
            self.refresh_token = fresh.refresh_token;
        }
        Ok(fresh.access_token)
    }

    async fn items(&self, token: &str, folder: &str) -> Result<Items> {
        let resp = self
            .client
            .get(format!("{}/folders/{}/items", API, folder))
            .header("Authorization", bearer(token))
            .query(&[("fields", "type,id,name")])
            .send()
            .await
            .map_err(transport)?;
        check(resp, "folder items").await?.json().await.map_err(transport)
    }

    async fn app_folder(&self, token: &str) -> Result<String> {
        let root = self.items(token, ROOT_FOLDER).await?;
        if let Some(folder) = root.entries.into_iter().find(|i| i.kind == "folder" && i.name == APP_FOLDER) {
            return Ok(folder.id);
        }

        tracing::info!("creating box app folder");
        let resp = self
            .client
            .post(format!("{}/folders", API))
            .header("Authorization", bearer(token))
            .json(&json!({ "name": APP_FOLDER, "parent": { "id": ROOT_FOLDER } }))
            .send()
            .await
            .map_err(transport)?;
        let created: Item = check(resp, "folder create").await?.json().await.map_err(transport)?;
        Ok(created.id)
    }
}

#[async_trait]
impl StorageProvider for BoxDrive {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Box
    }

    fn is_authed(&self) -> bool {
        self.access_token.is_some()
    }

    fn credentials(&self) -> Option<Credentials> {
        self.access_token.clone().map(|access_token| Credentials {
            access_token,
            refresh_token: self.refresh_token.clone(),
        })
    }

    async fn authorize(&mut self, credentials: Credentials) -> Result<()> {
        self.access_token = Some(credentials.access_token);
        self.refresh_token = credentials.refresh_token;
        self.ensure_token().await?;
        Ok(())
    }

    async fn deauthorize(&mut self) -> Result<()> {
        let Some(token) = self.access_token.clone() else {
            return Ok(());
        };
        match self.revoke_url.as_deref() {
            Some(url) => {
                let resp = self
                    .client
                    .post(url)
                    .query(&[("access_token", token.as_str())])
                    .send()
                    .await
                    .map_err(transport)?;
                check(resp, "token revoke").await?;
            }
            None => tracing::warn!("no box revoke endpoint configured, forgetting token locally"),
        }
        self.access_token = None;
        self.refresh_token = None;
        Ok(())
    }

    async fn files_list(&mut self) -> Result<Vec<RemoteFile>> {
        let token = self.ensure_token().await?;
        let folder = self.app_folder(&token).await?;
        Ok(profile_files(self.items(&token, &folder).await?))
    }

    async fn file_upload(&mut self, req: UploadRequest) -> Result<()> {
        let token = self.ensure_token().await?;
        let folder = self.app_folder(&token).await?;
        let existing = self
            .items(&token, &folder)
            .await?
            .entries
            .into_iter()
            .find(|i| i.kind == "file" && (req.id.as_deref() == Some(i.id.as_str()) || i.name == req.file_name));

        let body = codec::encode_payload(&req.contents, req.compression)?;
        let name = existing.as_ref().map(|f| f.name.clone()).unwrap_or_else(|| req.file_name.clone());
        let file = Part::text(body)
            .file_name(name.clone())
            .mime_str("text/plain")
            .map_err(transport)?;

        let request = match &existing {
            Some(f) => self
                .client
                .post(format!("{}/files/{}/content", UPLOAD, f.id))
                .multipart(Form::new().part("file", file)),
            None => {
                let attributes = json!({ "name": name, "parent": { "id": folder } });
                self.client
                    .post(format!("{}/files/content", UPLOAD))
                    .multipart(Form::new().text("attributes", attributes.to_string()).part("file", file))
            }
        };
        let resp = request.header("Authorization", bearer(&token)).send().await.map_err(transport)?;
        check(resp, "upload").await?;
        tracing::info!("box uploaded {}", name);
        Ok(())
    }

    async fn file_download(&mut self, id: &str) -> Result<Payload> {
        let token = self.ensure_token().await?;
        let resp = self
            .client
            .get(format!("{}/files/{}/content", API, id))
            .header("Authorization", bearer(&token))
            .send()
            .await
            .map_err(transport)?;
        let text = check(resp, "download").await?.text().await.map_err(transport)?;
        codec::decode_payload(&text)
    }
}
