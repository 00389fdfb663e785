use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::error;

use crate::{
    error::NormalizeError,
    types::{DavEntry, EntryKind, File, Folder, Node, SkippedEntry},
};

/// Convert one raw record into a typed node
///
/// `root` is the files-root segment (e.g. `/files/admin`); node paths are
/// relative to it, `/` when the entry is the root itself.
pub fn entry_to_node(entry: &DavEntry, root: &str) -> Result<Node, NormalizeError> {
    if !entry.path.starts_with('/') {
        return Err(NormalizeError::RelativePath {
            path: entry.path.clone(),
        });
    }

    let path = root_relative_path(&entry.path, root)?;

    if entry.basename.is_empty() {
        return Err(NormalizeError::EmptyBasename);
    }

    let display_name = coerce_display_name(entry.props.get("displayname"), &entry.basename)?;

    let modified = match &entry.last_modified {
        Some(value) => Some(parse_last_modified(value)?),
        None => None,
    };

    let etag = entry.etag.as_deref().map(unquote_etag);

    let node = match entry.kind {
        EntryKind::Directory => Node::Folder(Folder {
            path,
            basename: entry.basename.clone(),
            display_name,
            size: entry.size,
            modified,
            etag,
        }),
        EntryKind::File => Node::File(File {
            path,
            basename: entry.basename.clone(),
            display_name,
            size: entry.size,
            modified,
            etag,
            content_type: entry.content_type.clone(),
        }),
    };

    Ok(node)
}

/// Convert the directory's own record, which must be a folder
pub fn entry_to_folder(entry: &DavEntry, root: &str) -> Result<Folder, NormalizeError> {
    match entry_to_node(entry, root)? {
        Node::Folder(folder) => Ok(folder),
        Node::File(_) => Err(NormalizeError::NotAFolder {
            basename: entry.basename.clone(),
        }),
    }
}

/// Normalize child records independently
///
/// A record that fails normalization is logged with its basename,
/// recorded in the skipped list, and excluded from the nodes. One
/// malformed entry never prevents the rest of the directory from
/// being returned. Order of surviving nodes is preserved.
pub fn normalize_children(entries: &[DavEntry], root: &str) -> (Vec<Node>, Vec<SkippedEntry>) {
    let mut nodes = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();

    for entry in entries {
        match entry_to_node(entry, root) {
            Ok(node) => nodes.push(node),
            Err(reason) => {
                error!(basename = %entry.basename, error = %reason, "invalid node detected, skipping entry");
                skipped.push(SkippedEntry {
                    basename: entry.basename.clone(),
                    reason,
                });
            }
        }
    }

    (nodes, skipped)
}

fn root_relative_path(path: &str, root: &str) -> Result<String, NormalizeError> {
    if path == root {
        return Ok("/".to_string());
    }
    match path.strip_prefix(root) {
        Some(rest) if rest.starts_with('/') => Ok(rest.to_string()),
        _ => Err(NormalizeError::OutsideRoot {
            path: path.to_string(),
            root: root.to_string(),
        }),
    }
}

/// Coerce the `displayname` property to text
///
/// Some sources hand back non-text values for this property; scalars are
/// coerced here so the workaround stays in one place and can be deleted
/// once upstream is fixed. Composite values fail with a named error.
/// Absent or empty values fall back to the basename.
fn coerce_display_name(
    value: Option<&Value>,
    basename: &str,
) -> Result<String, NormalizeError> {
    match value {
        None | Some(Value::Null) => Ok(basename.to_string()),
        Some(Value::String(s)) if s.is_empty() => Ok(basename.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Array(_)) => Err(NormalizeError::DisplayName {
            found: "array".to_string(),
        }),
        Some(Value::Object(_)) => Err(NormalizeError::DisplayName {
            found: "object".to_string(),
        }),
    }
}

fn parse_last_modified(value: &str) -> Result<DateTime<Utc>, NormalizeError> {
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| NormalizeError::BadLastModified {
            value: value.to_string(),
        })
}

fn unquote_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}
