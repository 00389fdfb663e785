use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::NormalizeError;

/// Protocol-level kind of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    File,
    Directory,
}

/// A raw record: one filesystem entry as described by the protocol
///
/// Paths are relative to the DAV endpoint (e.g. `/files/admin/Photos/a.jpg`),
/// percent-decoded, without a trailing slash. Property values in `props` are
/// dynamically typed because sources may return non-text values for
/// text-valued properties (see the display-name coercion in `normalize`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DavEntry {
    /// Server path relative to the DAV endpoint
    pub path: String,
    /// Last path segment
    pub basename: String,
    /// File or directory, from `resourcetype`
    pub kind: EntryKind,
    /// Size in bytes, from `getcontentlength`
    pub size: Option<u64>,
    /// Raw `getlastmodified` text, RFC 2822
    pub last_modified: Option<String>,
    /// Raw etag, possibly quoted
    pub etag: Option<String>,
    /// MIME type, from `getcontenttype`
    pub content_type: Option<String>,
    /// Remaining properties (`displayname`, `creationdate`, ...)
    pub props: Map<String, Value>,
}

/// A normalized file node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    /// Path relative to the files root (e.g. `/Photos/a.jpg`)
    pub path: String,
    pub basename: String,
    pub display_name: String,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    /// Etag with surrounding quotes stripped
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

/// A normalized folder node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    /// Path relative to the files root (`/` for the root itself)
    pub path: String,
    pub basename: String,
    pub display_name: String,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// A typed node, either a file or a folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    File(File),
    Folder(Folder),
}

impl Node {
    pub fn path(&self) -> &str {
        match self {
            Node::File(f) => &f.path,
            Node::Folder(f) => &f.path,
        }
    }

    pub fn basename(&self) -> &str {
        match self {
            Node::File(f) => &f.basename,
            Node::Folder(f) => &f.basename,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Node::File(f) => Some(f),
            Node::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Node::Folder(f) => Some(f),
            Node::File(_) => None,
        }
    }
}

/// A child record dropped during normalization, kept as a diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    /// Basename of the offending record
    pub basename: String,
    /// Why normalization failed
    pub reason: NormalizeError,
}

/// Result of listing a directory: the resolved folder plus its
/// immediate children (one level, order preserved)
#[derive(Debug, Clone, PartialEq)]
pub struct FolderContents {
    /// The directory's own entry, normalized
    pub folder: Folder,
    /// Children that normalized successfully
    pub contents: Vec<Node>,
    /// Children that were dropped, with the reason for each
    pub skipped: Vec<SkippedEntry>,
}

/// Compare two server paths, tolerating a single trailing slash on either side
pub(crate) fn paths_match(a: &str, b: &str) -> bool {
    let strip = |p: &str| {
        if p.len() > 1 {
            p.strip_suffix('/').map(str::to_string)
        } else {
            None
        }
    };
    a == b
        || strip(a).as_deref() == Some(b)
        || strip(b).as_deref() == Some(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_match_trailing_slash() {
        assert!(paths_match("/files/admin/Photos", "/files/admin/Photos"));
        assert!(paths_match("/files/admin/Photos/", "/files/admin/Photos"));
        assert!(paths_match("/files/admin/Photos", "/files/admin/Photos/"));
        assert!(!paths_match("/files/admin/Photos", "/files/admin/Docs"));
        // Only a single trailing slash is tolerated
        assert!(!paths_match("/files/admin/Photos//", "/files/admin/Photos"));
    }

    #[test]
    fn test_node_accessors() {
        let node = Node::Folder(Folder {
            path: "/Photos".to_string(),
            basename: "Photos".to_string(),
            display_name: "Photos".to_string(),
            size: None,
            modified: None,
            etag: None,
        });

        assert!(node.is_folder());
        assert_eq!(node.path(), "/Photos");
        assert_eq!(node.basename(), "Photos");
        assert!(node.as_file().is_none());
        assert!(node.as_folder().is_some());
    }
}
