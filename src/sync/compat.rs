use crate::host::{CreateRequest, Vendor};
use crate::tree::{BookmarkNode, NodeType};

// Firefox refuses to store chrome:// bookmarks, so they are parked under a
// plain http url locally and restored before they leave the device.
const CHROME_SCHEME: &str = "chrome://";
const CHROME_PARKED: &str = "http://chrome//";

/// Undo the local chrome:// workaround before a url enters a snapshot.
pub fn outgoing_url(vendor: Vendor, url: &str) -> String {
    match url.strip_prefix(CHROME_PARKED) {
        Some(rest) if vendor == Vendor::Firefox => format!("{}{}", CHROME_SCHEME, rest),
        _ => url.to_string(),
    }
}

/// Node type to send with a create request. Only Firefox has a separator
/// kind; everything else is inferred by the host from the url.
pub fn create_kind(vendor: Vendor, node: &BookmarkNode) -> Option<NodeType> {
    (vendor == Vendor::Firefox && node.kind() == NodeType::Separator).then_some(NodeType::Separator)
}

/// Rewrite a create request the host rejected into one it tolerates.
/// Returns `None` when no workaround applies.
pub fn incoming_fallback(vendor: Vendor, req: &CreateRequest, node: &BookmarkNode) -> Option<CreateRequest> {
    if vendor != Vendor::Firefox {
        return None;
    }
    if let Some(rest) = req.url.as_deref().and_then(|u| u.strip_prefix(CHROME_SCHEME)) {
        return Some(CreateRequest {
            url: Some(format!("{}{}", CHROME_PARKED, rest)),
            ..req.clone()
        });
    }
    if node.kind() == NodeType::Separator {
        return Some(CreateRequest {
            node_type: Some(NodeType::Separator),
            ..req.clone()
        });
    }
    None
}
