use futures_util::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use super::compat;
use super::delta::Delta;
use crate::error::{Result, SyncError};
use crate::host::{CreateRequest, HostTree};
use crate::tree::BookmarkNode;

fn clamp_index(index: i64) -> usize {
    index.max(0) as usize
}

/// Replays deltas against a live host tree, one call at a time.
pub struct DeltaApplier<'a, H: HostTree> {
    host: &'a mut H,
}

impl<'a, H: HostTree> DeltaApplier<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        DeltaApplier { host }
    }

    pub async fn apply(&mut self, delta: &Delta) -> Result<()> {
        match delta {
            Delta::Create { node, parent_id, index } => {
                self.create(node, parent_id, *index).await?;
            }
            Delta::Update { id, title } => self.host.update_title(id, title).await?,
            Delta::Move { id, index } => self.host.move_node(id, clamp_index(*index)).await?,
            Delta::Delete { node } => self.delete(node).await?,
        }
        Ok(())
    }

    /// Instantiate `node` and its whole subtree under `parent_id`, parents
    /// before children. Returns the id the host assigned to `node`.
    pub async fn create(&mut self, node: &BookmarkNode, parent_id: &str, index: i64) -> Result<String> {
        let top = self.create_one(node, parent_id, clamp_index(index)).await?;

        let mut pending: Vec<(&BookmarkNode, String, usize)> = node
            .children()
            .iter()
            .enumerate()
            .rev()
            .map(|(i, child)| (child, top.clone(), i))
            .collect();
        while let Some((child, parent, i)) = pending.pop() {
            let id = self.create_one(child, &parent, i).await?;
            for (j, grandchild) in child.children().iter().enumerate().rev() {
                pending.push((grandchild, id.clone(), j));
            }
        }
        Ok(top)
    }

    async fn create_one(&mut self, node: &BookmarkNode, parent_id: &str, index: usize) -> Result<String> {
        let req = CreateRequest {
            parent_id: parent_id.to_string(),
            title: node.title.clone(),
            index,
            url: node.url.clone(),
            node_type: compat::create_kind(self.host.vendor(), node),
        };
        let first = match self.host.create(req.clone()).await {
            Ok(created) => return Ok(created.id),
            Err(e) => e,
        };

        let Some(retry) = compat::incoming_fallback(self.host.vendor(), &req, node) else {
            warn!("create \"{}\" rejected: {}", node.title, first);
            return Err(SyncError::IncompatibleNode { title: node.title.clone(), reason: first.to_string() });
        };
        debug!("create \"{}\" rejected ({}), retrying with compat request", node.title, first);
        match self.host.create(retry).await {
            Ok(created) => Ok(created.id),
            Err(e) => {
                warn!("compat retry for \"{}\" failed: {}", node.title, e);
                Err(SyncError::IncompatibleNode { title: node.title.clone(), reason: e.to_string() })
            }
        }
    }

    /// Remove `node`, children first. Folders go through the bulk removal call.
    pub fn delete<'b>(&'b mut self, node: &'b BookmarkNode) -> BoxFuture<'b, Result<()>>
    where
        'a: 'b,
        H: 'b,
    {
        async move {
            for child in node.children() {
                self.delete(child).await?;
            }
            if node.is_folder() {
                self.host.remove_tree(&node.id).await?;
            } else {
                self.host.remove(&node.id).await?;
            }
            Ok(())
        }
        .boxed()
    }
}
