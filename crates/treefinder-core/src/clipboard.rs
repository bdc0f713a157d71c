/// Pending copy/cut buffer and the naming policy used when pasting.
///
/// The clipboard never performs I/O. It validates and records what the user
/// asked to transfer; [`crate::browser::FileBrowser::paste_selection`] turns
/// the buffer into backend calls.
use crate::error::{BrowserError, Result};
use crate::model::{DriveId, Resource, ResourcePath};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// A clipboard that several browsers (one per drive) can share.
pub type SharedClipboard = Arc<Mutex<Clipboard>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipMode {
    Copy,
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardBuffer {
    /// Whether paste copies or moves the items.
    pub mode: ClipMode,
    /// Staged paths, in the order they were selected.
    pub items: Vec<ResourcePath>,
    /// Drive the items live on. Paste only targets this drive.
    pub source_drive: DriveId,
}

#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    buffer: Option<ClipboardBuffer>,
}

impl Clipboard {
    /// An empty clipboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty clipboard behind a mutex, for browsers to share.
    pub fn shared() -> SharedClipboard {
        Arc::new(Mutex::new(Self::new()))
    }

    /// The pending buffer, `None` when nothing is staged.
    pub fn buffer(&self) -> Option<&ClipboardBuffer> {
        self.buffer.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_none()
    }

    /// Drop the pending buffer.
    pub fn clear(&mut self) {
        self.buffer = None;
    }

    /// Whether `copy` would accept `items`.
    pub fn can_copy(items: &[Resource]) -> bool {
        !items.is_empty() && items.iter().all(|r| !r.is_dir())
    }

    /// Whether `cut` would accept `items`.
    pub fn can_cut(items: &[Resource]) -> bool {
        !items.is_empty() && items.iter().all(|r| r.writable)
    }

    /// Stage `items` for copying. Directories cannot be copied; on failure the
    /// existing buffer is left as it was.
    pub fn copy(&mut self, items: &[Resource]) -> Result<()> {
        let first = Self::first(items)?;
        if let Some(dir) = items.iter().find(|r| r.is_dir()) {
            return Err(BrowserError::UnsupportedOperation(format!(
                "cannot copy directory '{}'",
                dir.path
            )));
        }
        self.stage(ClipMode::Copy, items, first.drive.clone());
        Ok(())
    }

    /// Stage `items` for moving. Every item must be writable.
    pub fn cut(&mut self, items: &[Resource]) -> Result<()> {
        let first = Self::first(items)?;
        if let Some(locked) = items.iter().find(|r| !r.writable) {
            return Err(BrowserError::PermissionDenied(locked.path.clone()));
        }
        self.stage(ClipMode::Cut, items, first.drive.clone());
        Ok(())
    }

    fn first(items: &[Resource]) -> Result<&Resource> {
        items
            .first()
            .ok_or_else(|| BrowserError::UnsupportedOperation("nothing selected".into()))
    }

    fn stage(&mut self, mode: ClipMode, items: &[Resource], source_drive: DriveId) {
        debug!("clipboard: {:?} {} item(s) from drive '{}'", mode, items.len(), source_drive);
        self.buffer = Some(ClipboardBuffer {
            mode,
            items: items.iter().map(|r| r.path.clone()).collect(),
            source_drive,
        });
    }

    /// Forget items on `drive` at or under `path` (they were deleted). An
    /// emptied buffer is cleared.
    pub fn forget(&mut self, drive: &DriveId, path: &ResourcePath) {
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };
        if buffer.source_drive != *drive {
            return;
        }
        buffer.items.retain(|item| !item.starts_with(path));
        if buffer.items.is_empty() {
            self.buffer = None;
        }
    }

    /// Follow a rename of `from` to `to` on `drive`.
    pub fn rebase(&mut self, drive: &DriveId, from: &ResourcePath, to: &ResourcePath) {
        if let Some(buffer) = self.buffer.as_mut().filter(|b| b.source_drive == *drive) {
            for item in buffer.items.iter_mut() {
                if let Some(moved) = item.rebase(from, to) {
                    *item = moved;
                }
            }
        }
    }
}

/// First name in the sequence `name`, `stem-1.ext`, `stem-2.ext`, … not in
/// `taken`. The suffix goes before the last extension; dot-files and names
/// without an extension get it at the end.
pub fn disambiguate(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    (1u64..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}
