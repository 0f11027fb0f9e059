use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::providers::{Credentials, ProviderEndpoints, ProviderKind};
use crate::sync::DEFAULT_SYNC_RATE;

/// Everything a manager needs to pick up where it left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub provider: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    pub last_sync_time: i64,
    /// Minutes between automatic syncs, 0 disables them.
    pub sync_rate: u32,
    pub compression: bool,
    pub endpoints: ProviderEndpoints,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            provider: ProviderKind::Dropbox,
            credentials: None,
            profile_name: None,
            last_sync_time: 0,
            sync_rate: DEFAULT_SYNC_RATE,
            compression: true,
            endpoints: ProviderEndpoints::default(),
        }
    }
}

/// `<config dir>/marksync/settings.json`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("marksync").join("settings.json"))
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Settings> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(SyncError::Settings(format!("read {}: {}", path.display(), e))),
        };
        serde_json::from_str(&data).map_err(|e| SyncError::Settings(format!("parse {}: {}", path.display(), e)))
    }

    /// Atomic write: .tmp then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| SyncError::Settings(format!("create dir: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| SyncError::Settings(format!("serialize: {}", e)))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| SyncError::Settings(format!("write tmp: {}", e)))?;
        std::fs::rename(&tmp, path).map_err(|e| SyncError::Settings(format!("rename: {}", e)))?;
        Ok(())
    }
}
