pub mod apply;
pub mod codec;
pub mod compat;
pub mod delta;
pub mod roots;
pub mod schedule;
pub mod serializer;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::host::HostTree;
use crate::providers::{
    profile_file_name, Credentials, Provider, ProviderEndpoints, ProviderKind, RemoteFile, StorageProvider,
    UploadRequest,
};
use crate::settings::Settings;
use crate::tree::Snapshot;
use apply::DeltaApplier;
use delta::Delta;
use roots::{locate, locate_local, RootKind};
use serializer::{TreeSerializer, TreeStats};

pub const DEFAULT_SYNC_RATE: u32 = 15;
/// Largest interval, in minutes, that still fits a 32-bit millisecond timer.
pub const MAX_SYNC_RATE: u32 = 35791;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Unauthenticated,
    NoProfile,
    Ready { profile: String },
}

/// How a push, pull or sync settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncOutcome {
    Pushed,
    /// Local was at least as new as remote and overwrote it.
    ForcePushed,
    /// Remote was newer; this many deltas were applied locally.
    Merged { deltas: usize },
    UpToDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub last_sync_time: i64,
    pub total_bookmarks: usize,
    pub total_folders: usize,
    pub compression: bool,
    pub outcome: SyncOutcome,
}

/// Reconciles the host's bookmark tree with one remote profile snapshot.
pub struct SyncManager<H: HostTree, P: StorageProvider = Provider> {
    host: H,
    provider: P,
    serializer: TreeSerializer,
    endpoints: ProviderEndpoints,
    profile_name: Option<String>,
    profiles: Vec<RemoteFile>,
    last_sync_time: i64,
    sync_rate: u32,
    compression: bool,
    last_pull_compression: bool,
}

impl<H: HostTree, P: StorageProvider> SyncManager<H, P> {
    pub fn new(host: H, provider: P) -> Self {
        let vendor = host.vendor();
        SyncManager {
            host,
            provider,
            serializer: TreeSerializer::new(vendor),
            endpoints: ProviderEndpoints::default(),
            profile_name: None,
            profiles: Vec::new(),
            last_sync_time: 0,
            sync_rate: DEFAULT_SYNC_RATE,
            compression: true,
            last_pull_compression: true,
        }
    }

    /// Restore persisted state. The provider is expected to be authorized
    /// with `settings.credentials` already, if it needs to be.
    pub fn from_settings(host: H, provider: P, settings: &Settings) -> Self {
        let mut manager = SyncManager::new(host, provider);
        manager.endpoints = settings.endpoints.clone();
        manager.profile_name = settings.profile_name.clone();
        manager.last_sync_time = settings.last_sync_time;
        manager.sync_rate = settings.sync_rate.min(MAX_SYNC_RATE);
        manager.compression = settings.compression;
        manager
    }

    pub fn settings(&self) -> Settings {
        Settings {
            provider: self.provider.kind(),
            credentials: self.provider.credentials(),
            profile_name: self.profile_name.clone(),
            last_sync_time: self.last_sync_time,
            sync_rate: self.sync_rate,
            compression: self.compression,
            endpoints: self.endpoints.clone(),
        }
    }

    pub fn status(&self) -> SyncStatus {
        if !self.provider.is_authed() {
            return SyncStatus::Unauthenticated;
        }
        match self.current_profile() {
            Some(p) => SyncStatus::Ready { profile: p.name.clone() },
            None => SyncStatus::NoProfile,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn last_sync_time(&self) -> i64 {
        self.last_sync_time
    }

    pub fn compression(&self) -> bool {
        self.compression
    }

    pub fn set_compression(&mut self, compression: bool) {
        self.compression = compression;
    }

    pub fn sync_rate(&self) -> u32 {
        self.sync_rate
    }

    /// Store the interval in minutes, clamped to [`MAX_SYNC_RATE`]. Returns
    /// the value kept.
    pub fn set_sync_rate(&mut self, minutes: u32) -> u32 {
        self.sync_rate = minutes.min(MAX_SYNC_RATE);
        self.sync_rate
    }

    pub fn stats(&self) -> TreeStats {
        self.serializer.stats()
    }

    pub fn profiles(&self) -> &[RemoteFile] {
        &self.profiles
    }

    /// The selected profile, if the last listing contained it.
    pub fn current_profile(&self) -> Option<&RemoteFile> {
        let name = self.profile_name.as_deref()?;
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn select_profile(&mut self, name: impl Into<String>) {
        self.profile_name = Some(name.into());
    }

    fn ensure_authed(&self) -> Result<()> {
        if self.provider.is_authed() {
            Ok(())
        } else {
            Err(SyncError::NotAuthenticated)
        }
    }

    fn ensure_profile(&self) -> Result<RemoteFile> {
        self.ensure_authed()?;
        self.current_profile().cloned().ok_or(SyncError::NoProfileSelected)
    }

    fn report(&self, outcome: SyncOutcome) -> SyncReport {
        let stats = self.serializer.stats();
        SyncReport {
            last_sync_time: self.last_sync_time,
            total_bookmarks: stats.bookmarks,
            total_folders: stats.folders,
            compression: self.compression,
            outcome,
        }
    }

    pub async fn revoke_auth(&mut self) -> Result<()> {
        self.ensure_authed()?;
        info!("revoking {:?} access", self.provider.kind());
        self.provider.deauthorize().await
    }

    pub async fn get_profiles(&mut self) -> Result<Vec<RemoteFile>> {
        self.ensure_authed()?;
        let files = self.provider.files_list().await?;
        self.profiles = files.clone();
        Ok(files)
    }

    /// Select `name` and push the local tree into a new profile file.
    pub async fn create_profile(&mut self, name: &str) -> Result<SyncReport> {
        self.select_profile(name);
        let report = self.push().await?;
        self.get_profiles().await?;
        Ok(report)
    }

    /// Canonical snapshot of the live tree, stamped with the last sync time.
    pub async fn load_local(&mut self) -> Result<Snapshot> {
        let tree = self.host.get_tree().await?;
        Ok(self.serializer.serialize(&tree, self.last_sync_time))
    }

    pub async fn get_remote(&mut self) -> Result<Snapshot> {
        let profile = self.ensure_profile()?;
        let payload = self.provider.file_download(&profile.id).await?;
        self.last_pull_compression = payload.compressed;
        Ok(payload.snapshot)
    }

    /// Overwrite the remote profile with the whole local tree.
    pub async fn push(&mut self) -> Result<SyncReport> {
        self.ensure_authed()?;
        let name = self.profile_name.clone().ok_or(SyncError::NoProfileSelected)?;

        let mut snapshot = self.load_local().await?;
        snapshot.last_modified = chrono::Utc::now().timestamp_millis();
        let last_modified = snapshot.last_modified;
        let req = UploadRequest {
            file_name: profile_file_name(&name),
            id: self.current_profile().map(|p| p.id.clone()),
            contents: snapshot,
            compression: self.compression,
        };
        self.provider.file_upload(req).await?;
        self.last_sync_time = last_modified;
        info!("pushed profile {}", name);
        Ok(self.report(SyncOutcome::Pushed))
    }

    /// Replace both local roots' contents with the remote profile.
    pub async fn pull(&mut self) -> Result<SyncReport> {
        self.ensure_profile()?;
        // downloaded first so a failure leaves the local tree untouched
        self.get_remote().await?;

        let tree = self.host.get_tree().await?;
        let toolbar = locate_local(RootKind::Toolbar, &tree).map(|n| n.children().to_vec()).unwrap_or_default();
        let menu = locate_local(RootKind::Menu, &tree)
            .ok_or(SyncError::AbsentRoot(RootKind::Menu))?
            .children()
            .to_vec();

        let mut applier = DeltaApplier::new(&mut self.host);
        for child in toolbar.iter().chain(menu.iter()) {
            applier.delete(child).await?;
        }
        info!("cleared {} local root entries before pull", toolbar.len() + menu.len());

        self.last_sync_time = 0;
        self.sync().await
    }

    /// Bring local and remote into agreement. Whichever side is newer wins.
    pub async fn sync(&mut self) -> Result<SyncReport> {
        self.ensure_profile()?;
        let local = self.load_local().await?;
        let remote = self.get_remote().await?;

        let deltas = plan(&local, &remote)?;
        let outcome = if deltas.is_empty() {
            self.last_sync_time = remote.last_modified;
            info!("sync completed (no changes)");
            SyncOutcome::UpToDate
        } else if self.last_sync_time >= remote.last_modified {
            info!("sync completed (force push, {} deltas ignored)", deltas.len());
            self.push().await?;
            SyncOutcome::ForcePushed
        } else {
            let mut applier = DeltaApplier::new(&mut self.host);
            for delta in &deltas {
                applier.apply(delta).await?;
            }
            self.last_sync_time = remote.last_modified;
            info!("sync completed (merged {} deltas)", deltas.len());
            SyncOutcome::Merged { deltas: deltas.len() }
        };

        if self.last_pull_compression != self.compression {
            info!("adopting remote compression setting: {}", self.last_pull_compression);
            self.compression = self.last_pull_compression;
        }

        self.load_local().await?;
        Ok(self.report(outcome))
    }
}

/// Toolbar deltas followed by menu deltas. A toolbar missing on either side
/// contributes nothing; a missing menu is an error. Only the remote side gets
/// the nested toolbar retry.
fn plan(local: &Snapshot, remote: &Snapshot) -> Result<Vec<Delta>> {
    let mut deltas = match (locate_local(RootKind::Toolbar, &local.data), locate(RootKind::Toolbar, &remote.data)) {
        (Some(l), Some(r)) => delta::diff(Some(&mut l.clone()), &mut r.clone()),
        _ => {
            warn!("toolbar root missing on one side, skipping it");
            Vec::new()
        }
    };

    let mut local_menu = locate_local(RootKind::Menu, &local.data)
        .cloned()
        .ok_or(SyncError::AbsentRoot(RootKind::Menu))?;
    let mut remote_menu = locate(RootKind::Menu, &remote.data)
        .cloned()
        .ok_or(SyncError::AbsentRoot(RootKind::Menu))?;
    deltas.extend(delta::diff(Some(&mut local_menu), &mut remote_menu));
    Ok(deltas)
}

impl<H: HostTree> SyncManager<H, Provider> {
    /// Restore a manager from settings, re-authorizing stored credentials.
    /// A failed authorization is logged and leaves the manager signed out.
    pub async fn restore(host: H, settings: &Settings) -> Self {
        let mut manager = SyncManager::from_settings(host, Provider::new(settings.provider, &settings.endpoints), settings);
        if let Some(creds) = settings.credentials.clone() {
            if let Err(e) = manager.auth(settings.provider, creds).await {
                warn!("stored credentials rejected: {}", e);
            }
        }
        manager
    }

    /// Switch to `kind` and authorize it. On failure the manager falls back
    /// to a signed-out Dropbox provider.
    pub async fn auth(&mut self, kind: ProviderKind, credentials: Credentials) -> Result<()> {
        info!("authorizing {:?}", kind);
        let mut provider = Provider::new(kind, &self.endpoints);
        match provider.authorize(credentials).await {
            Ok(()) => {
                self.provider = provider;
                Ok(())
            }
            Err(e) => {
                self.provider = Provider::default();
                Err(e)
            }
        }
    }

    /// Forget everything but the host and endpoints.
    pub fn reset(&mut self) {
        self.provider = Provider::default();
        self.profile_name = None;
        self.profiles.clear();
        self.last_sync_time = 0;
        self.sync_rate = DEFAULT_SYNC_RATE;
        self.compression = true;
        self.last_pull_compression = true;
    }
}

/// Shared manager that admits one operation at a time. A push, pull or sync
/// started while another is running fails with [`SyncError::Busy`].
pub struct SyncHandle<H: HostTree, P: StorageProvider = Provider> {
    inner: Arc<Mutex<SyncManager<H, P>>>,
}

impl<H: HostTree, P: StorageProvider> Clone for SyncHandle<H, P> {
    fn clone(&self) -> Self {
        SyncHandle { inner: Arc::clone(&self.inner) }
    }
}

impl<H: HostTree, P: StorageProvider> SyncHandle<H, P> {
    pub fn new(manager: SyncManager<H, P>) -> Self {
        SyncHandle { inner: Arc::new(Mutex::new(manager)) }
    }

    fn claim(&self) -> Result<MutexGuard<'_, SyncManager<H, P>>> {
        self.inner.try_lock().map_err(|_| SyncError::Busy)
    }

    /// Wait for exclusive access, for anything other than push/pull/sync.
    pub async fn lock(&self) -> MutexGuard<'_, SyncManager<H, P>> {
        self.inner.lock().await
    }

    pub async fn push(&self) -> Result<SyncReport> {
        self.claim()?.push().await
    }

    pub async fn pull(&self) -> Result<SyncReport> {
        self.claim()?.pull().await
    }

    pub async fn sync(&self) -> Result<SyncReport> {
        self.claim()?.sync().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostOp, MemoryHost, Vendor};
    use crate::providers::memory::MemoryProvider;
    use crate::tree::BookmarkNode;

    fn chromium_tree(bar: Vec<BookmarkNode>, other: Vec<BookmarkNode>) -> BookmarkNode {
        BookmarkNode::folder(
            "0",
            "",
            vec![
                BookmarkNode::folder("1", "Bookmarks bar", bar),
                BookmarkNode::folder("2", "Other bookmarks", other),
            ],
        )
    }

    fn bm(id: &str, url: &str) -> BookmarkNode {
        BookmarkNode::bookmark(id, url, url)
    }

    // pre-order "title|url" of a root's contents, ids ignored
    fn shape(node: &BookmarkNode) -> Vec<String> {
        let mut out = Vec::new();
        for child in node.children() {
            out.push(format!("{}|{}", child.title, child.url.as_deref().unwrap_or("")));
            out.extend(shape(child).into_iter().map(|s| format!("  {}", s)));
        }
        out
    }

    async fn manager_with(
        local: BookmarkNode,
        remote: Option<Snapshot>,
    ) -> SyncManager<MemoryHost, MemoryProvider> {
        let mut provider = MemoryProvider::authed();
        if let Some(remote) = remote {
            provider.seed("laptop", &remote, true);
        }
        let mut manager = SyncManager::new(MemoryHost::from_tree(Vendor::Chromium, local), provider);
        manager.select_profile("laptop");
        manager.get_profiles().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn operations_require_auth_and_profile() {
        let host = MemoryHost::new(Vendor::Chromium);
        let mut manager = SyncManager::new(host, MemoryProvider::default());
        assert_eq!(manager.status(), SyncStatus::Unauthenticated);
        assert!(matches!(manager.push().await, Err(SyncError::NotAuthenticated)));
        assert!(matches!(manager.get_profiles().await, Err(SyncError::NotAuthenticated)));
        assert!(matches!(manager.revoke_auth().await, Err(SyncError::NotAuthenticated)));

        manager.provider.authed = true;
        assert_eq!(manager.status(), SyncStatus::NoProfile);
        assert!(matches!(manager.push().await, Err(SyncError::NoProfileSelected)));
        assert!(matches!(manager.sync().await, Err(SyncError::NoProfileSelected)));
        // a name alone is enough to push, but not to sync
        manager.select_profile("new");
        assert!(matches!(manager.pull().await, Err(SyncError::NoProfileSelected)));
    }

    #[tokio::test]
    async fn create_profile_uploads_and_selects() {
        let local = chromium_tree(vec![bm("10", "a.com")], vec![BookmarkNode::folder("11", "F", vec![bm("12", "b.com")])]);
        let mut manager = manager_with(local, None).await;
        assert!(manager.current_profile().is_none());

        let report = manager.create_profile("desk").await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::Pushed);
        assert_eq!(report.total_bookmarks, 2);
        // root, bar, other, F
        assert_eq!(report.total_folders, 4);
        assert_eq!(manager.current_profile().map(|p| p.name.as_str()), Some("desk"));
        assert_eq!(manager.status(), SyncStatus::Ready { profile: "desk".into() });

        let stored = manager.provider.stored("desk");
        assert!(stored.compressed);
        assert_eq!(stored.snapshot.last_modified, manager.last_sync_time());
    }

    #[tokio::test]
    async fn newer_local_force_pushes_without_touching_host() {
        let remote = Snapshot::new(2_000, chromium_tree(vec![], vec![bm("r1", "remote.com")]));
        let mut manager = manager_with(chromium_tree(vec![], vec![bm("10", "local.com")]), Some(remote)).await;
        manager.last_sync_time = 5_000;

        let report = manager.sync().await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::ForcePushed);
        assert_eq!(manager.provider.uploads, 1);
        assert!(manager.host.journal().is_empty());
        let stored = manager.provider.stored("laptop");
        assert_eq!(shape(&stored.snapshot.data.children()[1]), ["local.com|local.com"]);
    }

    #[tokio::test]
    async fn newer_remote_merges_and_settles_without_upload() {
        let remote = Snapshot::new(
            9_000,
            chromium_tree(
                vec![bm("r0", "bar.com")],
                vec![BookmarkNode::folder("r1", "Work", vec![bm("r2", "a.com"), bm("r3", "b.com")])],
            ),
        );
        let local = chromium_tree(vec![], vec![BookmarkNode::folder("10", "Work", vec![bm("11", "a.com")])]);
        let mut manager = manager_with(local, Some(remote.clone())).await;
        manager.last_sync_time = 1_000;

        let report = manager.sync().await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::Merged { deltas: 2 });
        assert_eq!(report.last_sync_time, 9_000);
        assert_eq!(manager.provider.uploads, 0);
        // toolbar deltas are applied before menu deltas
        let created: Vec<_> = manager
            .host
            .journal()
            .iter()
            .filter_map(|op| match op {
                HostOp::Create { parent_id, url, .. } => Some((parent_id.clone(), url.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(created, [("1".to_string(), Some("bar.com".to_string())), ("10".to_string(), Some("b.com".to_string()))]);

        let tree = manager.host.get_tree().await.unwrap();
        let work = &tree.children()[1].children()[0];
        let urls: Vec<_> = work.children().iter().filter_map(|c| c.url.as_deref()).collect();
        assert_eq!(urls, ["a.com", "b.com"]);
        assert_eq!(report.total_bookmarks, 3);
    }

    #[tokio::test]
    async fn matching_trees_adopt_remote_stamp() {
        let tree = chromium_tree(vec![bm("5", "x.com")], vec![]);
        let mut manager = manager_with(tree.clone(), Some(Snapshot::new(7_777, tree))).await;
        manager.last_sync_time = 10_000;

        let report = manager.sync().await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::UpToDate);
        assert_eq!(manager.last_sync_time(), 7_777);
        assert_eq!(manager.provider.uploads, 0);
        assert!(manager.host.journal().is_empty());
    }

    #[tokio::test]
    async fn pull_replaces_local_contents() {
        let remote = Snapshot::new(
            3_000,
            chromium_tree(
                vec![bm("r0", "bar.com"), BookmarkNode::folder("r1", "Tools", vec![bm("r2", "t.com")])],
                vec![bm("r3", "m.com")],
            ),
        );
        let local = chromium_tree(
            vec![bm("10", "stale.com")],
            vec![BookmarkNode::folder("11", "Old", vec![bm("12", "old.com")]), bm("13", "m.com")],
        );
        let mut manager = manager_with(local, Some(remote.clone())).await;
        manager.last_sync_time = 99_000;

        let report = manager.pull().await.unwrap();

        assert!(matches!(report.outcome, SyncOutcome::Merged { .. }));
        assert_eq!(report.last_sync_time, 3_000);
        assert_eq!(manager.provider.uploads, 0);
        let tree = manager.host.get_tree().await.unwrap();
        assert_eq!(shape(&tree.children()[0]), shape(&remote.data.children()[0]));
        assert_eq!(shape(&tree.children()[1]), shape(&remote.data.children()[1]));
    }

    #[tokio::test]
    async fn sync_adopts_compression_of_last_download() {
        let tree = chromium_tree(vec![], vec![]);
        let mut provider = MemoryProvider::authed();
        provider.seed("laptop", &Snapshot::new(1, tree.clone()), false);
        let mut manager = SyncManager::new(MemoryHost::from_tree(Vendor::Chromium, tree), provider);
        manager.select_profile("laptop");
        manager.get_profiles().await.unwrap();
        assert!(manager.compression());

        let report = manager.sync().await.unwrap();
        assert!(!report.compression);
        assert!(!manager.compression());
    }

    #[tokio::test]
    async fn remote_without_menu_is_rejected() {
        let remote = Snapshot::new(5, BookmarkNode::folder("0", "", vec![BookmarkNode::folder("9", "Misc", vec![])]));
        let mut manager = manager_with(chromium_tree(vec![], vec![]), Some(remote)).await;
        let err = manager.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::AbsentRoot(RootKind::Menu)));
    }

    #[tokio::test]
    async fn settings_round_trip_through_manager() {
        let mut manager = manager_with(chromium_tree(vec![], vec![]), None).await;
        manager.set_sync_rate(90_000);
        manager.last_sync_time = 42;
        let settings = manager.settings();
        assert_eq!(settings.sync_rate, MAX_SYNC_RATE);
        assert_eq!(settings.profile_name.as_deref(), Some("laptop"));

        let restored = SyncManager::from_settings(MemoryHost::new(Vendor::Chromium), MemoryProvider::authed(), &settings);
        assert_eq!(restored.last_sync_time(), 42);
        assert_eq!(restored.sync_rate(), MAX_SYNC_RATE);
    }

    #[tokio::test]
    async fn handle_rejects_overlapping_operations() {
        let tree = chromium_tree(vec![], vec![]);
        let manager = manager_with(tree.clone(), Some(Snapshot::new(1, tree))).await;
        let handle = SyncHandle::new(manager);

        let guard = handle.lock().await;
        assert!(matches!(handle.sync().await, Err(SyncError::Busy)));
        assert!(matches!(handle.clone().push().await, Err(SyncError::Busy)));
        drop(guard);

        assert!(handle.sync().await.is_ok());
    }

    #[tokio::test]
    async fn sync_aborts_remaining_deltas_on_host_error() {
        let remote = Snapshot::new(
            5_000,
            chromium_tree(
                vec![bm("r0", "a.com"), BookmarkNode::bookmark("r1", "b", "ftp://b.example/")],
                vec![bm("r2", "m.com")],
            ),
        );
        let mut provider = MemoryProvider::authed();
        provider.seed("laptop", &remote, true);
        let local = chromium_tree(vec![], vec![bm("10", "old.com")]);
        let host = MemoryHost::from_tree(Vendor::Chromium, local).with_rejected_scheme("ftp");
        let mut manager = SyncManager::new(host, provider);
        manager.select_profile("laptop");
        manager.get_profiles().await.unwrap();
        manager.last_sync_time = 1;

        let err = manager.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::IncompatibleNode { ref title, .. } if title == "b"));
        assert_eq!(manager.last_sync_time(), 1);
        assert_eq!(manager.provider.uploads, 0);
        // the first toolbar create stays, nothing after the failure ran
        let tree = manager.host.get_tree().await.unwrap();
        assert_eq!(shape(&tree.children()[0]), ["a.com|a.com"]);
        assert_eq!(shape(&tree.children()[1]), ["old.com|old.com"]);
        assert_eq!(manager.host.journal().len(), 1);
    }

    #[tokio::test]
    async fn first_create_failure_leaves_host_untouched() {
        let remote = Snapshot::new(5_000, chromium_tree(vec![bm("r0", "a.com")], vec![bm("r1", "m.com")]));
        let mut manager = manager_with(chromium_tree(vec![], vec![bm("10", "old.com")]), Some(remote)).await;
        manager.last_sync_time = 1;
        manager.host_mut().fail_next_creates(1);

        let err = manager.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::IncompatibleNode { ref title, .. } if title == "a.com"));
        assert_eq!(manager.last_sync_time(), 1);
        assert!(manager.host.journal().is_empty());
    }

    #[tokio::test]
    async fn pull_keeps_local_tree_when_download_fails() {
        let remote = Snapshot::new(3_000, chromium_tree(vec![bm("r0", "bar.com")], vec![]));
        let local = chromium_tree(vec![bm("10", "keep.com")], vec![bm("11", "also.com")]);
        let mut manager = manager_with(local, Some(remote)).await;
        manager.last_sync_time = 2_000;
        manager.provider.fail_downloads = true;

        let err = manager.pull().await.unwrap_err();

        assert!(matches!(err, SyncError::Provider(_)));
        assert!(manager.host.journal().is_empty());
        assert_eq!(manager.last_sync_time(), 2_000);
        let tree = manager.host.get_tree().await.unwrap();
        assert_eq!(shape(&tree.children()[0]), ["keep.com|keep.com"]);
    }

    #[test]
    fn nested_local_toolbar_is_left_to_the_menu_diff() {
        let nested = || BookmarkNode::folder("t", "Bookmarks bar", vec![bm("a", "a.com")]);
        let local = Snapshot::new(
            0,
            BookmarkNode::folder("0", "", vec![BookmarkNode::folder("2", "Other bookmarks", vec![nested()])]),
        );
        let remote = Snapshot::new(
            0,
            BookmarkNode::folder(
                "0",
                "",
                vec![
                    BookmarkNode::folder("1", "Bookmarks bar", vec![bm("b", "b.com")]),
                    BookmarkNode::folder("2", "Other bookmarks", vec![nested()]),
                ],
            ),
        );

        assert!(plan(&local, &remote).unwrap().is_empty());
    }
}
