use serde::{Deserialize, Serialize};

/// Version stamped into every snapshot we upload.
pub const DATA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Bookmark,
    Folder,
    Separator,
}

/// One node of a canonical bookmark tree.
///
/// Folders carry `children` (possibly empty), bookmarks carry `url`. Separators
/// carry neither and are tagged with `node_type`. `id` only means something on
/// the replica that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkNode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BookmarkNode>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_group_modified: Option<f64>,
}

impl BookmarkNode {
    pub fn folder(id: impl Into<String>, title: impl Into<String>, children: Vec<BookmarkNode>) -> Self {
        let mut node = BookmarkNode {
            id: id.into(),
            title: title.into(),
            url: None,
            index: 0,
            parent_id: None,
            children: Some(children),
            node_type: None,
            date_added: None,
            date_group_modified: None,
        };
        node.reindex_children();
        node
    }

    pub fn bookmark(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        BookmarkNode {
            id: id.into(),
            title: title.into(),
            url: Some(url.into()),
            index: 0,
            parent_id: None,
            children: None,
            node_type: None,
            date_added: None,
            date_group_modified: None,
        }
    }

    pub fn separator(id: impl Into<String>) -> Self {
        BookmarkNode {
            id: id.into(),
            title: String::new(),
            url: None,
            index: 0,
            parent_id: None,
            children: None,
            node_type: Some(NodeType::Separator),
            date_added: None,
            date_group_modified: None,
        }
    }

    pub fn kind(&self) -> NodeType {
        if self.url.is_some() {
            NodeType::Bookmark
        } else if self.node_type == Some(NodeType::Separator) {
            NodeType::Separator
        } else {
            NodeType::Folder
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == NodeType::Folder
    }

    pub fn children(&self) -> &[BookmarkNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Overwrite each direct child's `index` with its array position.
    pub fn reindex_children(&mut self) {
        if let Some(children) = self.children.as_mut() {
            for (i, child) in children.iter_mut().enumerate() {
                child.index = i as i64;
            }
        }
    }

    /// Number of nodes in this subtree, excluding `self`.
    pub fn descendant_count(&self) -> usize {
        self.children()
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

/// A full replica of the tree at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub last_modified: i64,
    #[serde(default = "default_version")]
    pub version: u32,
    pub data: BookmarkNode,
}

fn default_version() -> u32 {
    DATA_VERSION
}

impl Snapshot {
    pub fn new(last_modified: i64, data: BookmarkNode) -> Self {
        Snapshot { last_modified, version: DATA_VERSION, data }
    }
}
