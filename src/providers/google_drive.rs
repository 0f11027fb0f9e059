use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{bearer, check, require_token, strip_extension, transport};
use super::{Credentials, ProviderKind, RemoteFile, StorageProvider, UploadRequest, APP_FOLDER};
use crate::error::{Result, SyncError};
use crate::sync::codec::{self, Payload};

const TOKEN_INFO: &str = "https://www.googleapis.com/oauth2/v3/tokeninfo";
const FILES: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

pub struct GoogleDrive {
    client: reqwest::Client,
    access_token: Option<String>,
    refresh_token: Option<String>,
    refresh_url: Option<String>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
}

#[derive(Deserialize)]
struct Refreshed {
    access_token: String,
}

fn profile_files(list: FileList) -> Vec<RemoteFile> {
    list.files
        .into_iter()
        .filter(|f| f.mime_type != FOLDER_MIME)
        .map(|f| RemoteFile { name: strip_extension(&f.name).to_string(), id: f.id })
        .collect()
}

impl GoogleDrive {
    pub fn new(client: reqwest::Client, refresh_url: Option<String>) -> Self {
        GoogleDrive { client, access_token: None, refresh_token: None, refresh_url }
    }

    /// Validate the access token, trading the refresh token for a new one
    /// when Google reports it expired.
    async fn ensure_token(&mut self) -> Result<String> {
        let token = require_token(&self.access_token)?.to_string();
        let resp = self
            .client
            .get(TOKEN_INFO)
            .query(&[("access_token", token.as_str())])
            .send()
            .await
            .map_err(transport)?;
        if resp.status() != StatusCode::BAD_REQUEST {
            check(resp, "tokeninfo").await?;
            return Ok(token);
        }

        tracing::info!("google drive access token expired, refreshing");
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
        Ok(fresh.access_token)
    }

    async fn app_folder(&self, token: &str) -> Result<String> {
        let q = format!("mimeType = '{}' and name = '{}' and trashed = false", FOLDER_MIME, APP_FOLDER);
        let resp = self
            .client
            .get(FILES)
            .header("Authorization", bearer(token))
            .query(&[("q", q.as_str()), ("fields", "files(id, name, mimeType)")])
            .send()
            .await
            .map_err(transport)?;
        let found: FileList = check(resp, "folder search").await?.json().await.map_err(transport)?;
        if let Some(folder) = found.files.into_iter().next() {
            return Ok(folder.id);
        }

        tracing::info!("creating google drive app folder");
        let resp = self
            .client
            .post(FILES)
            .header("Authorization", bearer(token))
            .json(&json!({ "name": APP_FOLDER, "mimeType": FOLDER_MIME }))
            .send()
            .await
            .map_err(transport)?;
        let created: DriveFile = check(resp, "folder create").await?.json().await.map_err(transport)?;
        Ok(created.id)
    }

    async fn list_in(&self, token: &str, folder: &str) -> Result<Vec<RemoteFile>> {
        let q = format!("'{}' in parents and trashed = false", folder);
        let resp = self
            .client
            .get(FILES)
            .header("Authorization", bearer(token))
            .query(&[("q", q.as_str()), ("fields", "files(id, name, mimeType)")])
            .send()
            .await
            .map_err(transport)?;
        let list: FileList = check(resp, "files list").await?.json().await.map_err(transport)?;
        Ok(profile_files(list))
    }
}

#[async_trait]
impl StorageProvider for GoogleDrive {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
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

    // Revoking would cut off every other install sharing the grant, so the
    // tokens are only forgotten here.
    async fn deauthorize(&mut self) -> Result<()> {
        self.ensure_token().await?;
        self.access_token = None;
        self.refresh_token = None;
        Ok(())
    }

    async fn files_list(&mut self) -> Result<Vec<RemoteFile>> {
        let token = self.ensure_token().await?;
        let folder = self.app_folder(&token).await?;
        self.list_in(&token, &folder).await
    }

    async fn file_upload(&mut self, req: UploadRequest) -> Result<()> {
        let token = self.ensure_token().await?;
        let folder = self.app_folder(&token).await?;
        let stem = strip_extension(&req.file_name);
        let existing = self
            .list_in(&token, &folder)
            .await?
            .into_iter()
            .find(|f| req.id.as_deref() == Some(f.id.as_str()) || f.name == stem);

        let body = codec::encode_payload(&req.contents, req.compression)?;
        let start = match &existing {
            Some(file) => self
                .client
                .patch(format!("{}/{}", UPLOAD, file.id))
                .json(&json!({ "mimeType": "text/plain" })),
            None => self.client.post(UPLOAD).json(&json!({
                "name": req.file_name,
                "mimeType": "text/plain",
                "parents": [folder],
            })),
        };
        let resp = start
            .query(&[("uploadType", "resumable")])
            .header("Authorization", bearer(&token))
            .header("X-Upload-Content-Type", "text/plain")
            .header("X-Upload-Content-Length", body.len().to_string())
            .send()
            .await
            .map_err(transport)?;
        let resp = check(resp, "upload session").await?;
        let session = resp
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| SyncError::Provider("upload session has no location".into()))?
            .to_string();

        let resp = self
            .client
            .put(session)
            .header("Authorization", bearer(&token))
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        check(resp, "upload").await?;
        tracing::info!("google drive uploaded {}", req.file_name);
        Ok(())
    }

    async fn file_download(&mut self, id: &str) -> Result<Payload> {
        let token = self.ensure_token().await?;
        let resp = self
            .client
            .get(format!("{}/{}", FILES, id))
            .query(&[("alt", "media")])
            .header("Authorization", bearer(&token))
            .send()
            .await
            .map_err(transport)?;
        let text = check(resp, "download").await?.text().await.map_err(transport)?;
        codec::decode_payload(&text)
    }
}
