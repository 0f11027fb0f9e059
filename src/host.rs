use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::error::HostError;
use crate::tree::{BookmarkNode, NodeType};

/// Browser family behind a host store. Decides which compatibility
/// workarounds apply on the way in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Firefox,
    Chromium,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub parent_id: String,
    pub title: String,
    pub index: usize,
    pub url: Option<String>,
    pub node_type: Option<NodeType>,
}

/// The live, mutable bookmark tree owned by the browser.
///
/// Every operation must fail on ids that do not exist; none may silently
/// no-op. `create` assigns a fresh id.
#[async_trait]
pub trait HostTree: Send + Sync {
    fn vendor(&self) -> Vendor;
    async fn get_tree(&self) -> Result<BookmarkNode, HostError>;
    async fn create(&mut self, req: CreateRequest) -> Result<BookmarkNode, HostError>;
    async fn move_node(&mut self, id: &str, index: usize) -> Result<(), HostError>;
    async fn update_title(&mut self, id: &str, title: &str) -> Result<(), HostError>;
    async fn remove(&mut self, id: &str) -> Result<(), HostError>;
    async fn remove_tree(&mut self, id: &str) -> Result<(), HostError>;
}

/// Mutations seen by a [`MemoryHost`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    Create { id: String, parent_id: String, title: String, url: Option<String> },
    Move { id: String, index: usize },
    Update { id: String, title: String },
    Remove { id: String },
    RemoveTree { id: String },
}

#[derive(Debug, Clone)]
struct Entry {
    title: String,
    url: Option<String>,
    node_type: Option<NodeType>,
    parent: Option<String>,
    children: Vec<String>,
    date_added: Option<f64>,
}

impl Entry {
    fn is_folder(&self) -> bool {
        self.url.is_none() && self.node_type != Some(NodeType::Separator)
    }
}

/// In-process host store. Seeded with a vendor's default roots, clamps
/// indices to the parent's bounds, and records every mutation.
pub struct MemoryHost {
    vendor: Vendor,
    root_id: String,
    nodes: HashMap<String, Entry>,
    protected: HashSet<String>,
    next_id: u64,
    rejected_schemes: Vec<String>,
    failing_creates: usize,
    journal: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new(vendor: Vendor) -> Self {
        let (root, roots): (&str, Vec<(&str, &str)>) = match vendor {
            Vendor::Chromium => (
                "0",
                vec![("1", "Bookmarks bar"), ("2", "Other bookmarks"), ("3", "Mobile bookmarks")],
            ),
            Vendor::Firefox => (
                "root________",
                vec![
                    ("menu________", "Bookmarks Menu"),
                    ("toolbar_____", "Bookmarks Toolbar"),
                    ("unfiled_____", "Other Bookmarks"),
                    ("mobile______", "Mobile Bookmarks"),
                ],
            ),
            Vendor::Other => ("root", vec![("menu", "Bookmarks")]),
        };
        let children = roots
            .iter()
            .map(|(id, title)| BookmarkNode::folder(*id, *title, vec![]))
            .collect();
        MemoryHost::from_tree(vendor, BookmarkNode::folder(root, "", children))
    }

    /// Build a host from an existing tree, keeping its ids. The root and its
    /// direct children are treated as fixed roots.
    pub fn from_tree(vendor: Vendor, root: BookmarkNode) -> Self {
        let mut host = MemoryHost {
            vendor,
            root_id: root.id.clone(),
            nodes: HashMap::new(),
            protected: HashSet::new(),
            next_id: 100,
            rejected_schemes: match vendor {
                Vendor::Firefox => vec!["chrome".to_string()],
                _ => Vec::new(),
            },
            failing_creates: 0,
            journal: Vec::new(),
        };
        host.protected.insert(root.id.clone());
        for child in root.children() {
            host.protected.insert(child.id.clone());
        }
        host.insert_subtree(&root, None);
        host
    }

    /// Reject creation of any URL with this scheme.
    pub fn with_rejected_scheme(mut self, scheme: &str) -> Self {
        self.rejected_schemes.push(scheme.to_ascii_lowercase());
        self
    }

    /// Make the next `n` create calls fail regardless of their content.
    pub fn fail_next_creates(&mut self, n: usize) {
        self.failing_creates = n;
    }

    pub fn journal(&self) -> &[HostOp] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert_subtree(&mut self, node: &BookmarkNode, parent: Option<&str>) {
        if let Ok(n) = node.id.parse::<u64>() {
            self.next_id = self.next_id.max(n + 1);
        }
        let is_folder = node.is_folder();
        self.nodes.insert(
            node.id.clone(),
            Entry {
                title: node.title.clone(),
                url: node.url.clone(),
                node_type: if is_folder { Some(NodeType::Folder) } else { node.node_type.or(Some(NodeType::Bookmark)) },
                parent: parent.map(str::to_string),
                children: node.children().iter().map(|c| c.id.clone()).collect(),
                date_added: node.date_added,
            },
        );
        for child in node.children() {
            self.insert_subtree(child, Some(&node.id));
        }
    }

    fn entry(&self, id: &str) -> Result<&Entry, HostError> {
        self.nodes.get(id).ok_or_else(|| HostError::NotFound(id.to_string()))
    }

    fn ensure_mutable(&self, id: &str) -> Result<(), HostError> {
        self.entry(id)?;
        if self.protected.contains(id) {
            return Err(HostError::Rejected(format!("cannot modify root folder {}", id)));
        }
        Ok(())
    }

    fn build(&self, id: &str, index: usize) -> BookmarkNode {
        let entry = &self.nodes[id];
        let children = entry.is_folder().then(|| {
            entry
                .children
                .iter()
                .enumerate()
                .map(|(i, child)| self.build(child, i))
                .collect()
        });
        BookmarkNode {
            id: id.to_string(),
            title: entry.title.clone(),
            url: entry.url.clone(),
            index: index as i64,
            parent_id: entry.parent.clone(),
            children,
            // only Firefox exposes a node type through its bookmarks API
            node_type: match self.vendor {
                Vendor::Firefox => entry.node_type,
                _ => None,
            },
            date_added: entry.date_added,
            date_group_modified: None,
        }
    }

    fn detach(&mut self, id: &str) {
        let parent = self.nodes.get(id).and_then(|e| e.parent.clone());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| c != id);
        }
    }

    fn drop_subtree(&mut self, id: &str) {
        if let Some(entry) = self.nodes.remove(id) {
            for child in entry.children {
                self.drop_subtree(&child);
            }
        }
    }
}

fn scheme_of(url: &str) -> Option<String> {
    url::Url::parse(url).ok().map(|u| u.scheme().to_ascii_lowercase())
}

#[async_trait]
impl HostTree for MemoryHost {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn get_tree(&self) -> Result<BookmarkNode, HostError> {
        self.entry(&self.root_id)?;
        Ok(self.build(&self.root_id, 0))
    }

    async fn create(&mut self, req: CreateRequest) -> Result<BookmarkNode, HostError> {
        if self.failing_creates > 0 {
            self.failing_creates -= 1;
            return Err(HostError::Rejected("create failed".into()));
        }
        let parent = self.entry(&req.parent_id)?;
        if !parent.is_folder() {
            return Err(HostError::InvalidParent(req.parent_id.clone()));
        }
        if let Some(scheme) = req.url.as_deref().and_then(scheme_of) {
            if self.rejected_schemes.contains(&scheme) {
                return Err(HostError::Rejected(format!("unsupported url scheme {}:", scheme)));
            }
        }
        if req.node_type == Some(NodeType::Separator) && self.vendor != Vendor::Firefox {
            return Err(HostError::Rejected("separators are not supported".into()));
        }

        let id = self.next_id.to_string();
        self.next_id += 1;
        let node_type = match (&req.url, req.node_type) {
            (Some(_), _) => Some(NodeType::Bookmark),
            (None, Some(NodeType::Separator)) => Some(NodeType::Separator),
            (None, _) => Some(NodeType::Folder),
        };
        self.nodes.insert(
            id.clone(),
            Entry {
                title: req.title.clone(),
                url: req.url.clone(),
                node_type,
                parent: Some(req.parent_id.clone()),
                children: Vec::new(),
                date_added: Some(chrono::Utc::now().timestamp_millis() as f64),
            },
        );
        let siblings = &mut self
            .nodes
            .get_mut(&req.parent_id)
            .ok_or_else(|| HostError::NotFound(req.parent_id.clone()))?
            .children;
        let index = req.index.min(siblings.len());
        siblings.insert(index, id.clone());

        self.journal.push(HostOp::Create {
            id: id.clone(),
            parent_id: req.parent_id,
            title: req.title,
            url: req.url,
        });
        Ok(self.build(&id, index))
    }

    async fn move_node(&mut self, id: &str, index: usize) -> Result<(), HostError> {
        self.ensure_mutable(id)?;
        let parent_id = self.entry(id)?.parent.clone().ok_or_else(|| HostError::NotFound(id.to_string()))?;
        let siblings = &mut self
            .nodes
            .get_mut(&parent_id)
            .ok_or_else(|| HostError::NotFound(parent_id.clone()))?
            .children;
        siblings.retain(|c| c != id);
        // index is the final position after the move
        let index = index.min(siblings.len());
        siblings.insert(index, id.to_string());
        self.journal.push(HostOp::Move { id: id.to_string(), index });
        Ok(())
    }

    async fn update_title(&mut self, id: &str, title: &str) -> Result<(), HostError> {
        self.ensure_mutable(id)?;
        if let Some(entry) = self.nodes.get_mut(id) {
            entry.title = title.to_string();
        }
        self.journal.push(HostOp::Update { id: id.to_string(), title: title.to_string() });
        Ok(())
    }

    async fn remove(&mut self, id: &str) -> Result<(), HostError> {
        self.ensure_mutable(id)?;
        if !self.entry(id)?.children.is_empty() {
            return Err(HostError::Rejected(format!("folder {} is not empty", id)));
        }
        self.detach(id);
        self.nodes.remove(id);
        self.journal.push(HostOp::Remove { id: id.to_string() });
        Ok(())
    }

    async fn remove_tree(&mut self, id: &str) -> Result<(), HostError> {
        self.ensure_mutable(id)?;
        self.detach(id);
        self.drop_subtree(id);
        self.journal.push(HostOp::RemoveTree { id: id.to_string() });
        Ok(())
    }
}
