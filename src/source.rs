use async_trait::async_trait;
use crate::{error::Result, types::DavEntry};

/// Options for a directory-listing request
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Ask for the directory's own entry as the first record
    pub include_self: bool,
    /// Property-request body; sources fall back to the default propfind
    pub payload: Option<String>,
}

/// Core abstraction for WebDAV listing backends
///
/// Implementors return the raw records for one directory level, in
/// document order. When `include_self` is set, the first record is the
/// directory's own entry.
#[async_trait]
pub trait DavSource: Send + Sync {
    /// List the contents of a directory
    ///
    /// Returns `DavError::NotFound` if the directory doesn't exist
    async fn get_directory_contents(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> Result<Vec<DavEntry>>;

    /// Get a human-readable identifier for this source (for logging/debugging)
    fn identifier(&self) -> String;
}
