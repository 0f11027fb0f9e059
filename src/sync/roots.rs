use std::fmt;

use crate::tree::BookmarkNode;

// Root folder names differ between browser vendors. Matched case-insensitively.
pub const TOOLBAR_TITLES: &[&str] = &["Bookmarks Toolbar", "Bookmarks bar"];
pub const MENU_TITLES: &[&str] = &["Bookmarks Menu", "Other bookmarks", "Bookmarks"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Toolbar,
    Menu,
}

impl RootKind {
    pub fn titles(self) -> &'static [&'static str] {
        match self {
            RootKind::Toolbar => TOOLBAR_TITLES,
            RootKind::Menu => MENU_TITLES,
        }
    }
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootKind::Toolbar => write!(f, "toolbar"),
            RootKind::Menu => write!(f, "menu"),
        }
    }
}

fn title_matches(titles: &[&str], title: &str) -> bool {
    !title.is_empty() && titles.iter().any(|t| t.eq_ignore_ascii_case(title))
}

/// Depth-first search for the first node whose title matches one of `titles`.
/// `depth_limit` counts hops from `node` (depth 0); `None` means unlimited.
pub fn locate_root<'a>(titles: &[&str], node: &'a BookmarkNode, depth_limit: Option<usize>) -> Option<&'a BookmarkNode> {
    if title_matches(titles, &node.title) {
        return Some(node);
    }
    if depth_limit == Some(0) {
        return None;
    }
    let next = depth_limit.map(|d| d - 1);
    node.children()
        .iter()
        .find_map(|child| locate_root(titles, child, next))
}

/// Find a special root inside a full tree. The toolbar is retried one level
/// deeper because some browsers nest it.
pub fn locate(kind: RootKind, tree: &BookmarkNode) -> Option<&BookmarkNode> {
    let found = locate_root(kind.titles(), tree, Some(1));
    match (found, kind) {
        (None, RootKind::Toolbar) => locate_root(kind.titles(), tree, Some(2)),
        _ => found,
    }
}

/// Root lookup on the live tree: depth 1 only. A toolbar nested deeper sits
/// inside the menu root and is diffed as part of it.
pub fn locate_local(kind: RootKind, tree: &BookmarkNode) -> Option<&BookmarkNode> {
    locate_root(kind.titles(), tree, Some(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chromium_tree() -> BookmarkNode {
        BookmarkNode::folder(
            "0",
            "",
            vec![
                BookmarkNode::folder("1", "Bookmarks bar", vec![]),
                BookmarkNode::folder("2", "Other bookmarks", vec![]),
            ],
        )
    }

    #[test]
    fn finds_vendor_roots_case_insensitively() {
        let tree = chromium_tree();
        assert_eq!(locate(RootKind::Toolbar, &tree).unwrap().id, "1");
        assert_eq!(locate(RootKind::Menu, &tree).unwrap().id, "2");

        let ff = BookmarkNode::folder("r", "", vec![BookmarkNode::folder("m", "BOOKMARKS MENU", vec![])]);
        assert_eq!(locate(RootKind::Menu, &ff).unwrap().id, "m");
    }

    #[test]
    fn depth_limit_stops_descent() {
        let tree = BookmarkNode::folder(
            "0",
            "",
            vec![BookmarkNode::folder("1", "Wrapper", vec![BookmarkNode::folder("2", "Bookmarks bar", vec![])])],
        );
        assert!(locate_root(TOOLBAR_TITLES, &tree, Some(1)).is_none());
        assert_eq!(locate_root(TOOLBAR_TITLES, &tree, Some(2)).unwrap().id, "2");
        assert_eq!(locate_root(TOOLBAR_TITLES, &tree, None).unwrap().id, "2");
        // falls back to depth 2 for the toolbar only
        assert_eq!(locate(RootKind::Toolbar, &tree).unwrap().id, "2");
        assert!(locate_local(RootKind::Toolbar, &tree).is_none());
    }

    #[test]
    fn missing_toolbar_is_none() {
        let tree = BookmarkNode::folder("0", "", vec![BookmarkNode::folder("1", "Bookmarks", vec![])]);
        assert!(locate(RootKind::Toolbar, &tree).is_none());
        assert_eq!(locate(RootKind::Menu, &tree).unwrap().id, "1");
    }

    #[test]
    fn empty_titles_never_match() {
        let tree = BookmarkNode::folder("0", "", vec![]);
        assert!(locate_root(&[""], &tree, None).is_none());
    }
}
