use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use crate::{
    error::{DavError, Result},
    normalize::{entry_to_folder, normalize_children},
    propfind::default_propfind,
    source::{DavSource, ListOptions},
    types::{paths_match, FolderContents},
};

/// The WebDAV root segment for a user's files
pub fn user_files_root(user: &str) -> String {
    format!("/files/{}", user.trim_matches('/'))
}

/// Lists directories on a WebDAV source and resolves them into typed nodes
///
/// Calls are independent: no shared mutable state, no deduplication of
/// concurrent listings, no retries.
pub struct FilesService {
    source: Arc<dyn DavSource>,
    /// Files-root segment prefixed to every requested path
    root: String,
}

impl FilesService {
    pub fn new(source: Arc<dyn DavSource>, root: impl Into<String>) -> Self {
        Self {
            source,
            root: root.into(),
        }
    }

    /// List a directory's immediate contents
    ///
    /// `path` is relative to the files root; `/` lists the root. The
    /// returned handle is cancelable; awaiting it yields the listing
    /// result or the originating error.
    pub fn get_contents(&self, path: &str) -> ContentsRequest {
        let source = Arc::clone(&self.source);
        let root = self.root.clone();
        let path = if path.is_empty() { "/" } else { path }.to_string();

        let handle = tokio::spawn(async move { list_contents(source, &root, &path).await });

        ContentsRequest { handle }
    }
}

async fn list_contents(
    source: Arc<dyn DavSource>,
    root: &str,
    path: &str,
) -> Result<FolderContents> {
    let full_path = join_root(root, path);
    debug!(path = %full_path, source = %source.identifier(), "listing directory contents");

    let options = ListOptions {
        include_self: true,
        payload: Some(default_propfind()),
    };
    let entries = source.get_directory_contents(&full_path, &options).await?;

    // The first record is the directory's own entry, the rest are
    // its children
    let (root_entry, children) = match entries.split_first() {
        Some(split) => split,
        None => {
            return Err(DavError::InvalidResponse {
                message: "listing returned no records".to_string(),
            })
        }
    };

    if !paths_match(&root_entry.path, &full_path) {
        debug!(
            expected = %full_path,
            reported = %root_entry.path,
            "root entry does not match the requested path"
        );
        return Err(DavError::PathMismatch {
            requested: full_path,
            reported: root_entry.path.clone(),
        });
    }

    let folder = entry_to_folder(root_entry, root)?;
    let (contents, skipped) = normalize_children(children, root);

    Ok(FolderContents {
        folder,
        contents,
        skipped,
    })
}

fn join_root(root: &str, path: &str) -> String {
    let root = root.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{root}{path}")
    } else {
        format!("{root}/{path}")
    }
}

/// Handle for an in-flight listing operation
///
/// Awaiting the handle yields the result. Canceling aborts the spawned
/// task; the in-flight transport call is dropped, which aborts the
/// underlying request. A canceled operation settles as
/// `DavError::Canceled` with no partial results; cancellation after
/// completion has no effect and the result is delivered normally.
pub struct ContentsRequest {
    handle: JoinHandle<Result<FolderContents>>,
}

impl ContentsRequest {
    /// Request cancellation of the listing
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// A detached handle that can cancel the listing from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            inner: self.handle.abort_handle(),
        }
    }
}

impl Future for ContentsRequest {
    type Output = Result<FolderContents>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_error)) => {
                if join_error.is_cancelled() {
                    Poll::Ready(Err(DavError::Canceled))
                } else {
                    // The listing task panicked; surface it
                    std::panic::resume_unwind(join_error.into_panic())
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Clonable cancellation handle for a [`ContentsRequest`]
#[derive(Clone)]
pub struct CancelHandle {
    inner: AbortHandle,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NormalizeError;
    use crate::types::{DavEntry, EntryKind};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::assert_ok;

    const ROOT: &str = "/files/admin";

    struct StaticSource {
        entries: Vec<DavEntry>,
    }

    #[async_trait]
    impl DavSource for StaticSource {
        async fn get_directory_contents(
            &self,
            _path: &str,
            _options: &ListOptions,
        ) -> Result<Vec<DavEntry>> {
            Ok(self.entries.clone())
        }

        fn identifier(&self) -> String {
            "static".to_string()
        }
    }

    /// Source that never responds, for cancellation tests
    struct HangingSource;

    #[async_trait]
    impl DavSource for HangingSource {
        async fn get_directory_contents(
            &self,
            _path: &str,
            _options: &ListOptions,
        ) -> Result<Vec<DavEntry>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        fn identifier(&self) -> String {
            "hanging".to_string()
        }
    }

    fn entry(path: &str, basename: &str, kind: EntryKind) -> DavEntry {
        DavEntry {
            path: path.to_string(),
            basename: basename.to_string(),
            kind,
            ..Default::default()
        }
    }

    fn photos_listing() -> Vec<DavEntry> {
        vec![
            entry("/files/admin/Photos", "Photos", EntryKind::Directory),
            entry("/files/admin/Photos/a.jpg", "a.jpg", EntryKind::File),
            entry("/files/admin/Photos/b.jpg", "b.jpg", EntryKind::File),
        ]
    }

    fn service(entries: Vec<DavEntry>) -> FilesService {
        FilesService::new(Arc::new(StaticSource { entries }), ROOT)
    }

    #[tokio::test]
    async fn test_get_contents_success() {
        let service = service(photos_listing());

        let result = service.get_contents("/Photos").await.unwrap();

        assert_eq!(result.folder.path, "/Photos");
        assert_eq!(result.folder.basename, "Photos");
        assert_eq!(result.contents.len(), 2);
        assert_eq!(result.contents[0].path(), "/Photos/a.jpg");
        assert_eq!(result.contents[1].path(), "/Photos/b.jpg");
        assert!(result.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_get_contents_root_trailing_slash_tolerated() {
        // Server reports the collection path with a trailing slash
        let mut entries = photos_listing();
        entries[0].path = "/files/admin/Photos/".to_string();
        let service = service(entries);

        let result = service.get_contents("/Photos").await.unwrap();
        assert_eq!(result.folder.basename, "Photos");
        assert_eq!(result.contents.len(), 2);
    }

    #[tokio::test]
    async fn test_get_contents_path_mismatch() {
        let mut entries = photos_listing();
        entries[0] = entry("/files/admin/Docs", "Docs", EntryKind::Directory);
        let service = service(entries);

        let err = service.get_contents("/Photos").await.unwrap_err();

        assert!(matches!(err, DavError::PathMismatch { .. }));
        assert_eq!(err.to_string(), "Root node does not match requested path");
    }

    #[tokio::test]
    async fn test_get_contents_drops_invalid_children() {
        let mut entries = photos_listing();
        entries[1]
            .props
            .insert("displayname".to_string(), json!(["not", "text"]));
        let service = service(entries);

        let result = service.get_contents("/Photos").await.unwrap();

        assert_eq!(result.contents.len(), 1);
        assert_eq!(result.contents[0].basename(), "b.jpg");
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].basename, "a.jpg");
        assert!(matches!(
            result.skipped[0].reason,
            NormalizeError::DisplayName { .. }
        ));
    }

    #[tokio::test]
    async fn test_get_contents_root_normalization_failure_rejects() {
        let mut entries = photos_listing();
        // A root record that is not a collection cannot become a Folder
        entries[0].kind = EntryKind::File;
        let service = service(entries);

        let err = service.get_contents("/Photos").await.unwrap_err();

        assert!(matches!(
            err,
            DavError::Normalize(NormalizeError::NotAFolder { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_contents_empty_response_rejects() {
        let service = service(Vec::new());

        let err = service.get_contents("/Photos").await.unwrap_err();

        assert!(matches!(err, DavError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_cancel_before_settle() {
        let service = FilesService::new(Arc::new(HangingSource), ROOT);

        let request = service.get_contents("/Photos");
        request.cancel();

        let err = request.await.unwrap_err();
        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn test_cancel_handle() {
        let service = FilesService::new(Arc::new(HangingSource), ROOT);

        let request = service.get_contents("/Photos");
        let handle = request.cancel_handle();
        handle.cancel();

        let err = request.await.unwrap_err();
        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn test_cancel_after_completion_delivers_result() {
        let service = service(photos_listing());

        let request = service.get_contents("/Photos");
        let handle = request.cancel_handle();
        // Let the spawned task run to completion before canceling
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();

        let result = tokio_test::assert_ok!(request.await);
        assert_eq!(result.contents.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_listings_are_independent() {
        let service = service(photos_listing());

        let first = service.get_contents("/Photos");
        let second = service.get_contents("/Photos");

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.unwrap().contents.len(), 2);
        assert_eq!(b.unwrap().contents.len(), 2);
    }

    #[test]
    fn test_user_files_root() {
        assert_eq!(user_files_root("admin"), "/files/admin");
        assert_eq!(user_files_root("/admin/"), "/files/admin");
    }
}
