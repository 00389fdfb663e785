use thiserror::Error;

/// Errors that can occur while listing directory contents
#[derive(Error, Debug)]
pub enum DavError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Directory not found: {path}")]
    NotFound { path: String },

    #[error("Unexpected status code: {status}")]
    Status { status: u16 },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid multistatus response: {message}")]
    InvalidResponse { message: String },

    #[error("Root node does not match requested path")]
    PathMismatch { requested: String, reported: String },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Operation was canceled")]
    Canceled,
}

impl DavError {
    /// True when the operation settled as canceled rather than failed
    pub fn is_canceled(&self) -> bool {
        matches!(self, DavError::Canceled)
    }
}

/// Errors raised when converting a single raw record into a typed node
///
/// These are caught per record for children (the record is dropped and
/// logged) and propagated only for the directory's own entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Entry has an empty basename")]
    EmptyBasename,

    #[error("Entry path is not absolute: {path}")]
    RelativePath { path: String },

    #[error("Entry path {path} is outside the files root {root}")]
    OutsideRoot { path: String, root: String },

    #[error("Display name cannot be coerced to text (found {found})")]
    DisplayName { found: String },

    #[error("Invalid last-modified value: {value}")]
    BadLastModified { value: String },

    #[error("Entry '{basename}' is not a folder")]
    NotAFolder { basename: String },
}

/// Result type alias for listing operations
pub type Result<T> = std::result::Result<T, DavError>;
