//! In-process provider for tests. Bodies go through the real payload codec.

use async_trait::async_trait;

use super::{strip_extension, Credentials, ProviderKind, RemoteFile, StorageProvider, UploadRequest};
use crate::error::{Result, SyncError};
use crate::sync::codec::{self, Payload};
use crate::tree::Snapshot;

#[derive(Default)]
pub struct MemoryProvider {
    pub authed: bool,
    pub uploads: usize,
    pub fail_downloads: bool,
    files: Vec<(RemoteFile, String)>,
}

impl MemoryProvider {
    pub fn authed() -> Self {
        MemoryProvider { authed: true, ..Default::default() }
    }

    pub fn seed(&mut self, name: &str, snapshot: &Snapshot, compressed: bool) {
        let body = codec::encode_payload(snapshot, compressed).unwrap();
        let file = RemoteFile { id: format!("id:{}", name), name: name.to_string() };
        self.files.push((file, body));
    }

    pub fn stored(&self, name: &str) -> Payload {
        let (_, body) = self.files.iter().find(|(f, _)| f.name == name).unwrap();
        codec::decode_payload(body).unwrap()
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dropbox
    }

    fn is_authed(&self) -> bool {
        self.authed
    }

    fn credentials(&self) -> Option<Credentials> {
        self.authed.then(|| Credentials::new("memory"))
    }

    async fn authorize(&mut self, _credentials: Credentials) -> Result<()> {
        self.authed = true;
        Ok(())
    }

    async fn deauthorize(&mut self) -> Result<()> {
        self.authed = false;
        Ok(())
    }

    async fn files_list(&mut self) -> Result<Vec<RemoteFile>> {
        Ok(self.files.iter().map(|(f, _)| f.clone()).collect())
    }

    async fn file_upload(&mut self, req: UploadRequest) -> Result<()> {
        self.uploads += 1;
        let body = codec::encode_payload(&req.contents, req.compression)?;
        let stem = strip_extension(&req.file_name).to_string();
        let existing = self
            .files
            .iter_mut()
            .find(|(f, _)| req.id.as_deref() == Some(f.id.as_str()) || f.name == stem);
        match existing {
            Some((_, old)) => *old = body,
            None => self.files.push((RemoteFile { id: format!("id:{}", stem), name: stem }, body)),
        }
        Ok(())
    }

    async fn file_download(&mut self, id: &str) -> Result<Payload> {
        if self.fail_downloads {
            return Err(SyncError::Provider("Failed to reach storage provider".into()));
        }
        let (_, body) = self
            .files
            .iter()
            .find(|(f, _)| f.id == id)
            .ok_or_else(|| SyncError::Provider("path/not_found".into()))?;
        codec::decode_payload(body)
    }
}
