use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use serde_json::json;

use super::{bearer, check, require_token, strip_extension, transport};
use super::{Credentials, ProviderKind, RemoteFile, StorageProvider, UploadRequest};
use crate::error::{Result, SyncError};
use crate::sync::codec::{self, Payload};

const API: &str = "https://api.dropboxapi.com/2";
const CONTENT: &str = "https://content.dropboxapi.com/2";

/// Dropbox with an app-folder scoped token; "/" is the app folder.
pub struct Dropbox {
    client: reqwest::Client,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ListFolder {
    entries: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(rename = ".tag")]
    tag: String,
    #[serde(default)]
    id: String,
    name: String,
}

fn files_from(listing: ListFolder) -> Vec<RemoteFile> {
    listing
        .entries
        .into_iter()
        .filter(|e| e.tag == "file")
        .map(|e| RemoteFile { name: strip_extension(&e.name).to_string(), id: e.id })
        .collect()
}

// Dropbox reports token problems in the body, not always with a 401.
fn token_problem(body: &str) -> Option<&'static str> {
    if body.contains("malformed") {
        Some("Auth token is malformed")
    } else if body.contains("invalid_access_token") {
        Some("Invalid authorization token")
    } else {
        None
    }
}

impl Dropbox {
    pub fn new(client: reqwest::Client) -> Self {
        Dropbox { client, token: None }
    }

    async fn checked(&self, resp: Response, context: &str) -> Result<Response> {
        if resp.status().is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match token_problem(&body) {
                Some(msg) => SyncError::Provider(msg.into()),
                None => SyncError::Provider(format!("{}: {}", context, body.trim())),
            });
        }
        check(resp, context).await
    }
}

#[async_trait]
impl StorageProvider for Dropbox {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dropbox
    }

    fn is_authed(&self) -> bool {
        self.token.is_some()
    }

    fn credentials(&self) -> Option<Credentials> {
        self.token.clone().map(Credentials::new)
    }

    async fn authorize(&mut self, credentials: Credentials) -> Result<()> {
        self.token = Some(credentials.access_token);
        Ok(())
    }

    async fn deauthorize(&mut self) -> Result<()> {
        let token = require_token(&self.token)?;
        let resp = self
            .client
            .post(format!("{}/auth/token/revoke", API))
            .header("Authorization", bearer(token))
            .send()
            .await
            .map_err(transport)?;
        self.checked(resp, "token revoke").await?;
        self.token = None;
        Ok(())
    }

    async fn files_list(&mut self) -> Result<Vec<RemoteFile>> {
        let token = require_token(&self.token)?;
        let resp = self
            .client
            .post(format!("{}/files/list_folder", API))
            .header("Authorization", bearer(token))
            .json(&json!({ "path": "" }))
            .send()
            .await
            .map_err(transport)?;
        let listing: ListFolder = self.checked(resp, "list_folder").await?.json().await.map_err(transport)?;
        let files = files_from(listing);
        tracing::debug!("dropbox listed {} profile files", files.len());
        Ok(files)
    }

    async fn file_upload(&mut self, req: UploadRequest) -> Result<()> {
        let token = require_token(&self.token)?;
        let body = codec::encode_payload(&req.contents, req.compression)?;
        let arg = json!({ "path": format!("/{}", req.file_name), "mode": "overwrite" });
        let resp = self
            .client
            .post(format!("{}/files/upload", CONTENT))
            .header("Authorization", bearer(token))
            .header("Dropbox-API-Arg", arg.to_string())
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        self.checked(resp, "upload").await?;
        tracing::info!("dropbox uploaded {}", req.file_name);
        Ok(())
    }

    async fn file_download(&mut self, id: &str) -> Result<Payload> {
        let token = require_token(&self.token)?;
        let arg = json!({ "path": id });
        let resp = self
            .client
            .post(format!("{}/files/download", CONTENT))
            .header("Authorization", bearer(token))
            .header("Dropbox-API-Arg", arg.to_string())
            .send()
            .await
            .map_err(transport)?;
        let text = self.checked(resp, "download").await?.text().await.map_err(transport)?;
        codec::decode_payload(&text)
    }
}
