/// Download results.
///
/// Each selected item is fetched independently; the caller sees a single
/// report once every item has settled.
use crate::error::BackendError;
use crate::model::ResourcePath;

/// Bytes for one downloaded item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: ResourcePath,
    /// Suggested file name: the entry name, plus `.zip` for archived
    /// directories.
    pub file_name: String,
    pub archived: bool,
    pub bytes: Vec<u8>,
}

impl Download {
    pub fn new(path: ResourcePath, archived: bool, bytes: Vec<u8>) -> Self {
        let base = if path.is_root() { "root" } else { path.name() };
        let file_name = if archived {
            format!("{base}.zip")
        } else {
            base.to_string()
        };
        Self {
            path,
            file_name,
            archived,
            bytes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub completed: Vec<Download>,
    pub failed: Vec<(ResourcePath, BackendError)>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}
