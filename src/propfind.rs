use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

use crate::{
    error::{DavError, Result},
    types::{DavEntry, EntryKind},
};

/// Build the default property-request body sent with every listing
///
/// Requests the standard DAV properties needed to normalize an entry
/// into a typed node.
pub fn default_propfind() -> String {
    concat!(
        r#"<?xml version="1.0"?>"#,
        "\n",
        r#"<d:propfind xmlns:d="DAV:">"#,
        "\n",
        "  <d:prop>\n",
        "    <d:displayname />\n",
        "    <d:getcontentlength />\n",
        "    <d:getcontenttype />\n",
        "    <d:getlastmodified />\n",
        "    <d:getetag />\n",
        "    <d:creationdate />\n",
        "    <d:resourcetype />\n",
        "  </d:prop>\n",
        "</d:propfind>\n",
    )
    .to_string()
}

/// Properties collected for one `propstat` (or applied for one `response`)
#[derive(Default)]
struct PropDraft {
    display_name: Option<String>,
    creation_date: Option<String>,
    size: Option<u64>,
    last_modified: Option<String>,
    etag: Option<String>,
    content_type: Option<String>,
    collection: bool,
    status_ok: Option<bool>,
}

impl PropDraft {
    /// Merge a 200-status propstat into the applied set
    fn apply(&mut self, other: PropDraft) {
        if other.display_name.is_some() {
            self.display_name = other.display_name;
        }
        if other.creation_date.is_some() {
            self.creation_date = other.creation_date;
        }
        if other.size.is_some() {
            self.size = other.size;
        }
        if other.last_modified.is_some() {
            self.last_modified = other.last_modified;
        }
        if other.etag.is_some() {
            self.etag = other.etag;
        }
        if other.content_type.is_some() {
            self.content_type = other.content_type;
        }
        self.collection |= other.collection;
    }
}

/// Parse a `207 Multi-Status` body into raw records, in document order
///
/// Namespace prefixes are ignored; elements are matched by local name.
/// Only properties from a propstat whose status reports 200 are applied.
/// `strip_prefix` is the DAV endpoint path (e.g. `/remote.php/dav`) that
/// servers prepend to every href; it is removed so entry paths are
/// relative to the endpoint.
pub fn parse_multistatus(xml: &str, strip_prefix: &str) -> Result<Vec<DavEntry>> {
    let mut reader = Reader::from_str(xml);

    let mut entries = Vec::new();
    let mut elements: Vec<Vec<u8>> = Vec::new();
    let mut href: Option<String> = None;
    let mut applied = PropDraft::default();
    let mut pending = PropDraft::default();
    let mut in_propstat = false;
    let mut in_resourcetype = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                match name.as_slice() {
                    b"response" => {
                        href = None;
                        applied = PropDraft::default();
                    }
                    b"propstat" => {
                        pending = PropDraft::default();
                        in_propstat = true;
                    }
                    b"resourcetype" => in_resourcetype = true,
                    b"collection" if in_resourcetype => pending.collection = true,
                    _ => {}
                }
                elements.push(name);
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"collection" && in_resourcetype {
                    pending.collection = true;
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match elements.last().map(Vec::as_slice) {
                    Some(b"href") => href = Some(text.to_string()),
                    Some(b"status") => pending.status_ok = Some(text.contains("200")),
                    Some(name) => {
                        let draft = if in_propstat { &mut pending } else { &mut applied };
                        match name {
                            b"displayname" => draft.display_name = Some(text.to_string()),
                            b"creationdate" => draft.creation_date = Some(text.to_string()),
                            b"getcontentlength" => draft.size = text.parse().ok(),
                            b"getlastmodified" => draft.last_modified = Some(text.to_string()),
                            b"getetag" => draft.etag = Some(text.to_string()),
                            b"getcontenttype" => draft.content_type = Some(text.to_string()),
                            _ => {}
                        }
                    }
                    None => {}
                }
            }
            Event::End(e) => {
                elements.pop();
                match e.local_name().as_ref() {
                    b"propstat" => {
                        in_propstat = false;
                        if pending.status_ok.take().unwrap_or(false) {
                            applied.apply(std::mem::take(&mut pending));
                        }
                    }
                    b"resourcetype" => in_resourcetype = false,
                    b"response" => {
                        let href = href.take().ok_or_else(|| DavError::InvalidResponse {
                            message: "response element without an href".to_string(),
                        })?;
                        entries.push(build_entry(&href, strip_prefix, std::mem::take(&mut applied))?);
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn build_entry(href: &str, strip_prefix: &str, props: PropDraft) -> Result<DavEntry> {
    let path = href_to_path(href, strip_prefix)?;
    let basename = path.rsplit('/').next().unwrap_or("").to_string();

    let kind = if props.collection {
        EntryKind::Directory
    } else {
        EntryKind::File
    };

    let mut bag = serde_json::Map::new();
    if let Some(name) = props.display_name {
        bag.insert("displayname".to_string(), Value::String(name));
    }
    if let Some(date) = props.creation_date {
        bag.insert("creationdate".to_string(), Value::String(date));
    }

    Ok(DavEntry {
        path,
        basename,
        kind,
        size: props.size,
        last_modified: props.last_modified,
        etag: props.etag,
        content_type: props.content_type,
        props: bag,
    })
}

/// Turn an href (absolute URL or absolute path) into an endpoint-relative path
fn href_to_path(href: &str, strip_prefix: &str) -> Result<String> {
    // Absolute URLs keep only their path component
    let raw = if let Some(scheme_end) = href.find("://") {
        let rest = &href[scheme_end + 3..];
        match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "/",
        }
    } else {
        href
    };

    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| DavError::InvalidResponse {
            message: format!("href is not valid UTF-8: {href}"),
        })?;
    let mut path = decoded.into_owned();

    if !strip_prefix.is_empty() && strip_prefix != "/" {
        if let Some(rest) = path.strip_prefix(strip_prefix) {
            if rest.is_empty() {
                path = "/".to_string();
            } else if rest.starts_with('/') {
                path = rest.to_string();
            }
        }
    }

    // Collections carry a trailing slash
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    Ok(path)
}
