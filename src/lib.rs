//! Bookmark tree reconciliation against a remote snapshot kept in cloud
//! storage (Dropbox, Google Drive or Box).
//!
//! The engine lives in [`sync`]: serialize the host tree, locate its special
//! roots, diff against the remote copy and apply the resulting deltas.
//! [`SyncManager`] orchestrates push, pull and sync on top of a
//! [`StorageProvider`].

pub mod error;
pub mod host;
pub mod logging;
pub mod providers;
pub mod settings;
pub mod sync;
pub mod tree;

pub use error::{HostError, OperationKind, Result, SyncError};
pub use host::{CreateRequest, HostTree, MemoryHost, Vendor};
pub use providers::{Credentials, Provider, ProviderEndpoints, ProviderKind, RemoteFile, StorageProvider};
pub use settings::Settings;
pub use sync::schedule::AutoSync;
pub use sync::{SyncHandle, SyncManager, SyncOutcome, SyncReport, SyncStatus};
pub use tree::{BookmarkNode, NodeType, Snapshot};
