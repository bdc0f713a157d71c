//! Content backends: the storage side of the browser.
//!
//! A backend performs the actual list/create/rename/move/copy/delete/download
//! calls against one drive. Backends carry no clipboard or selection policy;
//! name disambiguation and permission pre-checks live in the browser.
//!
//! # Dyn-compatibility
//!
//! Methods return boxed futures so a `Arc<dyn ContentBackend>` can be chosen
//! at runtime from the drive registry. All borrowed inputs share the
//! lifetime of the returned future.

mod archive;
pub mod local;
pub mod memory;

use crate::error::BackendError;
use crate::model::{Resource, ResourceKind, ResourcePath};
use futures::future::BoxFuture;

pub use local::LocalBackend;
pub use memory::{BackendCall, MemoryBackend};

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage capability for one drive.
pub trait ContentBackend: Send + Sync {
    /// Entries directly inside `path`. Fails with `NotFound` if `path` is
    /// missing or not a directory.
    fn list<'a>(&'a self, path: &'a ResourcePath) -> BoxFuture<'a, BackendResult<Vec<Resource>>>;

    /// Describe a single entry.
    fn stat<'a>(&'a self, path: &'a ResourcePath) -> BoxFuture<'a, BackendResult<Resource>>;

    /// Create an untitled entry of `kind` inside `container`; the backend picks
    /// the name (`Untitled Folder`, `Untitled Folder 1`, …).
    fn create<'a>(
        &'a self,
        container: &'a ResourcePath,
        kind: ResourceKind,
    ) -> BoxFuture<'a, BackendResult<Resource>>;

    /// Rename `path` within its parent.
    fn rename<'a>(
        &'a self,
        path: &'a ResourcePath,
        new_name: &'a str,
    ) -> BoxFuture<'a, BackendResult<Resource>>;

    /// Move `src` into `dest_container`, keeping its name.
    fn move_to<'a>(
        &'a self,
        src: &'a ResourcePath,
        dest_container: &'a ResourcePath,
    ) -> BoxFuture<'a, BackendResult<Resource>>;

    /// Copy `src` into `dest_container` as `name`.
    fn copy<'a>(
        &'a self,
        src: &'a ResourcePath,
        dest_container: &'a ResourcePath,
        name: &'a str,
    ) -> BoxFuture<'a, BackendResult<Resource>>;

    /// Delete `path` (recursively for directories).
    fn delete<'a>(&'a self, path: &'a ResourcePath) -> BoxFuture<'a, BackendResult<()>>;

    /// File bytes, or a zip archive of the subtree when `is_container`.
    fn download<'a>(
        &'a self,
        path: &'a ResourcePath,
        is_container: bool,
    ) -> BoxFuture<'a, BackendResult<Vec<u8>>>;
}

/// First untitled name of `kind` for which `taken` returns `false`.
pub fn untitled_name(kind: ResourceKind, taken: impl Fn(&str) -> bool) -> String {
    let (stem, ext) = match kind {
        ResourceKind::Dir => ("Untitled Folder", ""),
        ResourceKind::File => ("untitled", ".txt"),
    };
    let first = format!("{stem}{ext}");
    if !taken(&first) {
        return first;
    }
    (1u64..)
        .map(|n| format!("{stem} {n}{ext}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(first)
}

/// Best-effort MIME type from a file extension.
pub fn guess_mimetype(name: &str) -> Option<String> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "ipynb" => "application/x-ipynb+json",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untitled_name_counts_up() {
        let taken = ["Untitled Folder", "Untitled Folder 1"];
        assert_eq!(
            untitled_name(ResourceKind::Dir, |n| taken.contains(&n)),
            "Untitled Folder 2"
        );
        assert_eq!(untitled_name(ResourceKind::File, |_| false), "untitled.txt");
    }

    #[test]
    fn test_guess_mimetype() {
        assert_eq!(guess_mimetype("a.TXT").as_deref(), Some("text/plain"));
        assert_eq!(guess_mimetype("noext"), None);
        assert_eq!(guess_mimetype("weird.xyz"), None);
    }
}
