//! Remote storage backends. Each keeps profile snapshots as `<profile>.marksync`
//! files inside an app folder and speaks its vendor's REST API via reqwest.

pub mod box_drive;
pub mod dropbox;
pub mod google_drive;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::sync::codec::Payload;
use crate::tree::Snapshot;

pub use box_drive::BoxDrive;
pub use dropbox::Dropbox;
pub use google_drive::GoogleDrive;

pub const APP_FOLDER: &str = "marksync";
pub const FILE_EXTENSION: &str = "marksync";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Dropbox,
    GoogleDrive,
    Box,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Credentials { access_token: access_token.into(), refresh_token: None }
    }
}

/// A profile file as listed by the provider. `name` has its extension removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
}

/// A full snapshot upload. Overwrites the file `id` when given (or the file
/// already called `file_name`), otherwise creates `file_name`.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub id: Option<String>,
    pub contents: Snapshot,
    pub compression: bool,
}

/// Auth relay endpoints for providers whose tokens expire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderEndpoints {
    pub google_refresh: Option<String>,
    pub box_refresh: Option<String>,
    pub box_revoke: Option<String>,
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;
    fn is_authed(&self) -> bool;
    fn credentials(&self) -> Option<Credentials>;
    async fn authorize(&mut self, credentials: Credentials) -> Result<()>;
    async fn deauthorize(&mut self) -> Result<()>;
    async fn files_list(&mut self) -> Result<Vec<RemoteFile>>;
    async fn file_upload(&mut self, req: UploadRequest) -> Result<()>;
    async fn file_download(&mut self, id: &str) -> Result<Payload>;
}

pub enum Provider {
    Dropbox(Dropbox),
    GoogleDrive(GoogleDrive),
    Box(BoxDrive),
}

impl Provider {
    pub fn new(kind: ProviderKind, endpoints: &ProviderEndpoints) -> Self {
        let client = reqwest::Client::new();
        match kind {
            ProviderKind::Dropbox => Provider::Dropbox(Dropbox::new(client)),
            ProviderKind::GoogleDrive => {
                Provider::GoogleDrive(GoogleDrive::new(client, endpoints.google_refresh.clone()))
            }
            ProviderKind::Box => Provider::Box(BoxDrive::new(
                client,
                endpoints.box_refresh.clone(),
                endpoints.box_revoke.clone(),
            )),
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::new(ProviderKind::Dropbox, &ProviderEndpoints::default())
    }
}

macro_rules! delegate {
    ($self:ident, $p:ident => $call:expr) => {
        match $self {
            Provider::Dropbox($p) => $call,
            Provider::GoogleDrive($p) => $call,
            Provider::Box($p) => $call,
        }
    };
}

#[async_trait]
impl StorageProvider for Provider {
    fn kind(&self) -> ProviderKind {
        delegate!(self, p => p.kind())
    }

    fn is_authed(&self) -> bool {
        delegate!(self, p => p.is_authed())
    }

    fn credentials(&self) -> Option<Credentials> {
        delegate!(self, p => p.credentials())
    }

    async fn authorize(&mut self, credentials: Credentials) -> Result<()> {
        delegate!(self, p => p.authorize(credentials).await)
    }

    async fn deauthorize(&mut self) -> Result<()> {
        delegate!(self, p => p.deauthorize().await)
    }

    async fn files_list(&mut self) -> Result<Vec<RemoteFile>> {
        delegate!(self, p => p.files_list().await)
    }

    async fn file_upload(&mut self, req: UploadRequest) -> Result<()> {
        delegate!(self, p => p.file_upload(req).await)
    }

    async fn file_download(&mut self, id: &str) -> Result<Payload> {
        delegate!(self, p => p.file_download(id).await)
    }
}

/// Profile file name for a profile.
pub fn profile_file_name(profile: &str) -> String {
    format!("{}.{}", profile, FILE_EXTENSION)
}

/// Drop everything from the first dot on: "work.marksync" -> "work".
pub fn strip_extension(name: &str) -> &str {
    match name.find('.') {
        Some(dot) => &name[..dot],
        None => name,
    }
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub(crate) fn transport(e: reqwest::Error) -> SyncError {
    SyncError::Provider(format!("request failed: {}", e))
}

pub(crate) fn require_token(token: &Option<String>) -> Result<&str> {
    token.as_deref().ok_or(SyncError::NotAuthenticated)
}

/// Pass 2xx responses through, turn anything else into a provider error.
pub(crate) async fn check(resp: Response, context: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!("{} failed with {}: {}", context, status, body);
    Err(describe_failure(status, &body))
}

fn describe_failure(status: StatusCode, body: &str) -> SyncError {
    if status == StatusCode::UNAUTHORIZED {
        return SyncError::Provider("Invalid authorization token".into());
    }
    let body = body.trim();
    if body.is_empty() {
        SyncError::Provider(format!("provider returned {}", status))
    } else {
        SyncError::Provider(body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_from_first_dot() {
        assert_eq!(strip_extension("work.marksync"), "work");
        assert_eq!(strip_extension("v1.2.marksync"), "v1");
        assert_eq!(strip_extension("plain"), "plain");
        assert_eq!(profile_file_name("home"), "home.marksync");
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ProviderKind::GoogleDrive).unwrap(), "\"googledrive\"");
        let kind: ProviderKind = serde_json::from_str("\"box\"").unwrap();
        assert_eq!(kind, ProviderKind::Box);
    }

    #[test]
    fn provider_enum_reports_its_variant() {
        let endpoints = ProviderEndpoints::default();
        for kind in [ProviderKind::Dropbox, ProviderKind::GoogleDrive, ProviderKind::Box] {
            let p = Provider::new(kind, &endpoints);
            assert_eq!(p.kind(), kind);
            assert!(!p.is_authed());
            assert!(p.credentials().is_none());
        }
    }

    #[test]
    fn failures_keep_short_bodies_and_flag_bad_tokens() {
        let err = describe_failure(StatusCode::UNAUTHORIZED, "whatever");
        assert_eq!(err.to_string(), "Invalid authorization token");
        let err = describe_failure(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn unauthenticated_calls_fail_before_any_request() {
        let mut p = Provider::default();
        assert!(matches!(p.files_list().await, Err(SyncError::NotAuthenticated)));
        assert!(matches!(p.file_download("id:1").await, Err(SyncError::NotAuthenticated)));
    }
}
