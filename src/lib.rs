pub mod client;
pub mod contents;
pub mod error;
pub mod normalize;
pub mod propfind;
pub mod source;
pub mod types;

pub use client::{DavConfig, WebdavClient};
pub use contents::{user_files_root, CancelHandle, ContentsRequest, FilesService};
pub use error::{DavError, NormalizeError, Result};
pub use normalize::{entry_to_folder, entry_to_node, normalize_children};
pub use propfind::{default_propfind, parse_multistatus};
pub use source::{DavSource, ListOptions};
pub use types::{DavEntry, EntryKind, File, Folder, FolderContents, Node, SkippedEntry};
