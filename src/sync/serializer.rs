use serde::Serialize;

use super::compat;
use crate::host::Vendor;
use crate::tree::{BookmarkNode, Snapshot};

/// Aggregate counts from the most recent serialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub bookmarks: usize,
    pub folders: usize,
}

/// Turns a host tree into a canonical snapshot.
pub struct TreeSerializer {
    vendor: Vendor,
    stats: TreeStats,
}

impl TreeSerializer {
    pub fn new(vendor: Vendor) -> Self {
        TreeSerializer { vendor, stats: TreeStats::default() }
    }

    pub fn stats(&self) -> TreeStats {
        self.stats
    }

    pub fn serialize(&mut self, root: &BookmarkNode, last_modified: i64) -> Snapshot {
        self.stats = TreeStats::default();
        let data = self.copy_node(root);
        Snapshot::new(last_modified, data)
    }

    fn copy_node(&mut self, node: &BookmarkNode) -> BookmarkNode {
        let children = node.children.as_ref().map(|children| {
            children.iter().map(|c| self.copy_node(c)).collect::<Vec<_>>()
        });
        if children.is_some() {
            self.stats.folders += 1;
        } else {
            self.stats.bookmarks += 1;
        }
        BookmarkNode {
            id: node.id.clone(),
            title: node.title.clone(),
            url: node.url.as_deref().map(|u| compat::outgoing_url(self.vendor, u)),
            index: node.index,
            parent_id: node.parent_id.clone(),
            children,
            node_type: node.node_type,
            date_added: node.date_added,
            date_group_modified: node.date_group_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BookmarkNode {
        BookmarkNode::folder(
            "root________",
            "",
            vec![
                BookmarkNode::folder(
                    "menu________",
                    "Bookmarks Menu",
                    vec![
                        BookmarkNode::bookmark("a", "Rust", "https://rust-lang.org"),
                        BookmarkNode::bookmark("b", "Settings", "http://chrome//settings/"),
                        BookmarkNode::folder("c", "Dev", vec![BookmarkNode::bookmark("d", "Tokio", "https://tokio.rs")]),
                    ],
                ),
                BookmarkNode::folder("toolbar_____", "Bookmarks Toolbar", vec![]),
            ],
        )
    }

    #[test]
    fn counts_folders_and_bookmarks() {
        let mut s = TreeSerializer::new(Vendor::Firefox);
        let snap = s.serialize(&sample(), 42);
        assert_eq!(snap.last_modified, 42);
        assert_eq!(s.stats(), TreeStats { bookmarks: 3, folders: 4 });
        assert_eq!(snap.data.descendant_count(), 6);
    }

    #[test]
    fn counters_reset_between_runs() {
        let mut s = TreeSerializer::new(Vendor::Chromium);
        s.serialize(&sample(), 0);
        s.serialize(&BookmarkNode::folder("0", "", vec![]), 0);
        assert_eq!(s.stats(), TreeStats { bookmarks: 0, folders: 1 });
    }

    #[test]
    fn restores_parked_chrome_urls_on_firefox() {
        let mut s = TreeSerializer::new(Vendor::Firefox);
        let snap = s.serialize(&sample(), 0);
        let menu = &snap.data.children()[0];
        assert_eq!(menu.children()[1].url.as_deref(), Some("chrome://settings/"));
    }
}
