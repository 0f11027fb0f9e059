//! Tree diffing between a local and a remote replica of the same root folder.
//!
//! Nodes are matched by identity proxy rather than id, since the two replicas
//! assign ids independently: folders by title, bookmarks by url. Matching is
//! greedy in remote order and each local node can be claimed once, so
//! duplicates bind by position, first available wins.

use crate::tree::BookmarkNode;

/// One edit that moves the local tree towards the remote one.
///
/// `id` and `node` in `Update`/`Move`/`Delete` address local nodes. The node
/// carried by `Create` is a remote subtree, instantiated whole.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Create { node: BookmarkNode, parent_id: String, index: i64 },
    Update { id: String, title: String },
    Move { id: String, index: i64 },
    Delete { node: BookmarkNode },
}

impl Delta {
    pub fn kind(&self) -> &'static str {
        match self {
            Delta::Create { .. } => "create",
            Delta::Update { .. } => "update",
            Delta::Move { .. } => "move",
            Delta::Delete { .. } => "delete",
        }
    }
}

/// Compute the ordered edit list that turns `local` into `remote`.
///
/// Both folders have their direct children re-indexed to array position as a
/// side effect, recursively for every matched folder pair. A missing local
/// root yields no edits.
pub fn diff(local: Option<&mut BookmarkNode>, remote: &mut BookmarkNode) -> Vec<Delta> {
    match local {
        Some(local) => diff_folder(local, remote),
        None => Vec::new(),
    }
}

fn same_identity(local: &BookmarkNode, remote: &BookmarkNode) -> bool {
    match (&local.url, &remote.url) {
        (None, None) => local.title == remote.title,
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

fn diff_folder(local: &mut BookmarkNode, remote: &mut BookmarkNode) -> Vec<Delta> {
    local.reindex_children();
    remote.reindex_children();

    let local_id = local.id.clone();
    let local_children: &mut [BookmarkNode] = local.children.as_deref_mut().unwrap_or_default();
    let remote_children: &mut [BookmarkNode] = remote.children.as_deref_mut().unwrap_or_default();

    let mut deltas = Vec::new();
    let mut claimed = vec![false; local_children.len()];

    for remote_child in remote_children.iter_mut() {
        let matched = (0..local_children.len())
            .find(|&i| !claimed[i] && same_identity(&local_children[i], remote_child));

        let Some(i) = matched else {
            deltas.push(Delta::Create {
                node: remote_child.clone(),
                parent_id: local_id.clone(),
                index: remote_child.index,
            });
            continue;
        };

        claimed[i] = true;
        let local_child = &mut local_children[i];
        if local_child.title != remote_child.title {
            deltas.push(Delta::Update { id: local_child.id.clone(), title: remote_child.title.clone() });
        }
        if local_child.index != remote_child.index {
            deltas.push(Delta::Move { id: local_child.id.clone(), index: remote_child.index });
        }
        if remote_child.url.is_none() {
            // children's edits follow their folder's own edits directly
            deltas.extend(diff_folder(local_child, remote_child));
        }
    }

    for (child, claimed) in local_children.iter().zip(&claimed) {
        if !claimed {
            deltas.push(Delta::Delete { node: child.clone() });
        }
    }

    deltas
}
