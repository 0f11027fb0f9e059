use crate::sync::roots::RootKind;

/// Failures reported by a host bookmark store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("invalid parent: {0}")]
    InvalidParent(String),
    #[error("rejected by host: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("not authenticated with a storage provider")]
    NotAuthenticated,
    #[error("a profile must be selected to enable syncing")]
    NoProfileSelected,
    #[error("{0}")]
    Provider(String),
    #[error("incompatible bookmark \"{title}\": {reason}")]
    IncompatibleNode { title: String, reason: String },
    #[error("{0} root folder is missing from the bookmark tree")]
    AbsentRoot(RootKind),
    #[error("host bookmark store: {0}")]
    Host(#[from] HostError),
    #[error("payload codec: {0}")]
    Codec(String),
    #[error("settings: {0}")]
    Settings(String),
    #[error("another sync operation is already in progress")]
    Busy,
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// What the caller was doing when an error surfaced. Drives the generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Auth,
    Deauth,
    Push,
    Pull,
    Sync,
    Profiles,
}

impl OperationKind {
    fn default_message(self) -> &'static str {
        match self {
            OperationKind::Auth => "Invalid access token",
            OperationKind::Deauth => "An unknown error occured while revoking access",
            OperationKind::Push => "Failed to push bookmark data",
            OperationKind::Pull => "Failed to pull bookmark data",
            OperationKind::Sync => "Failed to sync bookmark data",
            OperationKind::Profiles => "Could not retrieve profiles",
        }
    }
}

impl SyncError {
    /// Message suitable for showing to the user. Provider errors that already
    /// carry a short descriptive string are passed through.
    pub fn user_message(&self, kind: OperationKind) -> String {
        match self {
            SyncError::Provider(msg) if is_descriptive(msg) => msg.clone(),
            SyncError::NotAuthenticated | SyncError::NoProfileSelected | SyncError::Busy => {
                self.to_string()
            }
            _ => kind.default_message().to_string(),
        }
    }
}

// plain one-line sentences only; raw http bodies and json dumps fall back to the default
fn is_descriptive(msg: &str) -> bool {
    !msg.is_empty()
        && msg.len() <= 120
        && !msg.contains('{')
        && !msg.contains('\n')
}
