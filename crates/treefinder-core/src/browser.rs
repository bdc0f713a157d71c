/// One drive's browser: tree, selection and rename session over a backend.
///
/// Every operation takes `&self`. State lives behind `parking_lot` locks that
/// are released before any backend call is awaited, so a paste and a refresh
/// on the same browser can be in flight together. When more than one lock is
/// needed they are taken in the order tree, selection, clipboard, rename.
///
/// The clipboard is shared (`SharedClipboard`) so several browsers can copy
/// and paste through one buffer. Pasting across drives is refused.
use crate::backend::ContentBackend;
use crate::batch::{settle_all, BatchReport};
use crate::clipboard::{disambiguate, ClipMode, Clipboard, SharedClipboard};
use crate::commands::CommandContext;
use crate::download::{Download, DownloadReport};
use crate::error::{BrowserError, Result};
use crate::events::{emit, BrowserEvent};
use crate::model::{DriveId, Resource, ResourceKind, ResourcePath, ResourceTree, SharedTree};
use crate::refresh;
use crate::rename::{RenameSession, RenameState};
use crate::selection::{topmost, Selection};
use crate::settings::ColumnSettings;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct FileBrowser {
    drive: DriveId,
    backend: Arc<dyn ContentBackend>,
    tree: SharedTree,
    selection: Mutex<Selection>,
    clipboard: SharedClipboard,
    rename: Mutex<RenameSession>,
    events: Option<Sender<BrowserEvent>>,
}

impl FileBrowser {
    /// A browser with an unfetched root and a private clipboard.
    pub fn new(drive: DriveId, backend: Arc<dyn ContentBackend>) -> Self {
        Self {
            tree: ResourceTree::new(drive.clone()).into_shared(),
            drive,
            backend,
            selection: Mutex::new(Selection::new()),
            clipboard: Clipboard::shared(),
            rename: Mutex::new(RenameSession::new()),
            events: None,
        }
    }

    /// Use `clipboard` instead of the private one.
    pub fn with_clipboard(mut self, clipboard: SharedClipboard) -> Self {
        self.clipboard = clipboard;
        self
    }

    /// Report changes on `events`.
    pub fn with_events(mut self, events: Sender<BrowserEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn drive(&self) -> &DriveId {
        &self.drive
    }

    pub fn tree(&self) -> SharedTree {
        Arc::clone(&self.tree)
    }

    pub fn backend(&self) -> Arc<dyn ContentBackend> {
        Arc::clone(&self.backend)
    }

    pub fn clipboard(&self) -> SharedClipboard {
        Arc::clone(&self.clipboard)
    }

    fn emit(&self, event: BrowserEvent) {
        emit(self.events.as_ref(), event);
    }

    // ── Tree ──────────────────────────────────────────────────

    /// Fetch the children of `path` and merge them into the tree.
    ///
    /// Returns the number of entries listed.
    pub async fn load(&self, path: &ResourcePath) -> Result<usize> {
        let listing = self.backend.list(path).await?;
        let entries = listing.len();
        if !self.tree.write().merge_children(path, listing) {
            // Dropped from the tree while the listing was in flight.
            return Err(BrowserError::NotFound(path.clone()));
        }
        debug!(drive = %self.drive, "listed '{}' ({} entries)", path, entries);
        self.emit(BrowserEvent::Listed {
            drive: self.drive.clone(),
            path: path.clone(),
            entries,
        });
        Ok(entries)
    }

    fn require_dir(&self, path: &ResourcePath) -> Result<()> {
        match self.tree.read().resolve(path) {
            None => Err(BrowserError::NotFound(path.clone())),
            Some(r) if !r.is_dir() => Err(BrowserError::UnsupportedOperation(format!(
                "'{path}' is not a directory"
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Expand a directory, fetching its children on first use.
    pub async fn expand(&self, path: &ResourcePath) -> Result<()> {
        self.require_dir(path)?;
        if !self.tree.read().is_loaded(path) {
            self.load(path).await?;
        }
        self.tree.write().set_expanded(path, true);
        Ok(())
    }

    /// Collapse a directory. Cached children are kept. The root stays open.
    pub fn collapse(&self, path: &ResourcePath) -> Result<()> {
        self.require_dir(path)?;
        if !path.is_root() {
            self.tree.write().set_expanded(path, false);
        }
        Ok(())
    }

    /// Load every ancestor of `path` so it becomes addressable in the tree.
    pub async fn reveal(&self, path: &ResourcePath) -> Result<Resource> {
        let mut current = ResourcePath::root();
        for segment in path.segments() {
            if !self.tree.read().is_loaded(&current) {
                self.load(&current).await?;
            }
            current = current.join(segment);
        }
        self.tree
            .read()
            .resolve(path)
            .cloned()
            .ok_or_else(|| BrowserError::NotFound(path.clone()))
    }

    // ── Selection ─────────────────────────────────────────────

    /// Selected paths, oldest first.
    pub fn selection(&self) -> Vec<ResourcePath> {
        self.selection.lock().paths().to_vec()
    }

    /// Selected resources still present in the tree, in selection order.
    pub fn selected_resources(&self) -> Vec<Resource> {
        let tree = self.tree.read();
        let selection = self.selection.lock();
        selection.resolve(&tree)
    }

    fn require_known(&self, paths: &[ResourcePath]) -> Result<()> {
        let tree = self.tree.read();
        match paths.iter().find(|p| !tree.contains(p)) {
            Some(missing) => Err(BrowserError::NotFound(missing.clone())),
            None => Ok(()),
        }
    }

    /// Replace the selection. Every path must be in the tree.
    pub fn select(&self, paths: &[ResourcePath]) -> Result<()> {
        self.require_known(paths)?;
        self.selection.lock().set(paths.iter().cloned());
        Ok(())
    }

    /// Add `path` to the selection. It must be in the tree.
    pub fn add_to_selection(&self, path: &ResourcePath) -> Result<()> {
        self.require_known(std::slice::from_ref(path))?;
        self.selection.lock().add(path.clone());
        Ok(())
    }

    /// Select `path` if unselected, else unselect it. It must be in the tree.
    pub fn toggle_selection(&self, path: &ResourcePath) -> Result<()> {
        self.require_known(std::slice::from_ref(path))?;
        self.selection.lock().toggle(path.clone());
        Ok(())
    }

    pub fn clear_selection(&self) {
        self.selection.lock().clear();
    }

    // ── Clipboard ─────────────────────────────────────────────

    /// Stage the selection for copying. Refused when it holds a directory.
    pub fn copy_selection(&self) -> Result<()> {
        let items = self.selected_resources();
        self.clipboard.lock().copy(&items)
    }

    /// Stage the selection for moving. Every item must be writable.
    pub fn cut_selection(&self) -> Result<()> {
        let items = self.selected_resources();
        self.clipboard.lock().cut(&items)
    }

    /// Paste the clipboard buffer into the directory `target`.
    ///
    /// Items are transferred concurrently and independently. A cut buffer is
    /// cleared only when every item moved; after a partial failure it keeps
    /// just the items that are still at their source.
    pub async fn paste_selection(&self, target: &ResourcePath) -> Result<BatchReport> {
        let buffer = self
            .clipboard
            .lock()
            .buffer()
            .cloned()
            .ok_or(BrowserError::EmptyClipboard)?;
        if buffer.source_drive != self.drive {
            return Err(BrowserError::UnsupportedOperation(format!(
                "cannot paste from drive '{}' into drive '{}'",
                buffer.source_drive, self.drive
            )));
        }
        self.require_dir(target)?;

        let report = match buffer.mode {
            ClipMode::Copy => self.paste_copies(&buffer.items, target).await?,
            ClipMode::Cut => self.paste_moves(&buffer.items, target).await,
        };

        if buffer.mode == ClipMode::Cut {
            let mut clipboard = self.clipboard.lock();
            if report.is_complete() && clipboard.buffer() == Some(&buffer) {
                clipboard.clear();
            } else {
                for moved in report.succeeded_paths() {
                    clipboard.forget(&self.drive, moved);
                }
            }
        }

        info!(
            drive = %self.drive,
            "paste into '{}': {} ok, {} failed",
            target,
            report.succeeded.len(),
            report.failed.len()
        );
        self.emit(BrowserEvent::Pasted {
            drive: self.drive.clone(),
            target: target.clone(),
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
        });
        Ok(report)
    }

    async fn paste_copies(&self, items: &[ResourcePath], target: &ResourcePath) -> Result<BatchReport> {
        // Fresh listing so names are disambiguated against what is really there.
        let listing = self.backend.list(target).await?;
        let mut taken: HashSet<String> = listing.iter().map(|r| r.name().to_string()).collect();
        self.tree.write().merge_children(target, listing);

        let plan: Vec<(ResourcePath, String)> = items
            .iter()
            .map(|src| {
                let name = disambiguate(src.name(), &taken);
                taken.insert(name.clone());
                (src.clone(), name)
            })
            .collect();

        let settled = settle_all(plan, |(src, name)| async move {
            self.backend.copy(&src, target, &name).await
        })
        .await;

        let mut report = BatchReport::default();
        let mut tree = self.tree.write();
        for ((src, _), result) in settled {
            match result {
                Ok(created) => {
                    tree.insert(created.clone());
                    report.succeeded.push((src, Some(created)));
                }
                Err(err) => {
                    warn!(drive = %self.drive, "copy of '{}' failed: {}", src, err);
                    report.failed.push((src, err));
                }
            }
        }
        Ok(report)
    }

    async fn paste_moves(&self, items: &[ResourcePath], target: &ResourcePath) -> BatchReport {
        let settled = settle_all(topmost(items), |src| async move {
            self.backend.move_to(&src, target).await
        })
        .await;

        let mut report = BatchReport::default();
        let mut tree = self.tree.write();
        let mut selection = self.selection.lock();
        let mut rename = self.rename.lock();
        for (src, result) in settled {
            match result {
                Ok(moved) => {
                    tree.remove(&src);
                    tree.insert(moved.clone());
                    selection.rebase(&src, &moved.path);
                    rename.rebase(&src, &moved.path);
                    report.succeeded.push((src, Some(moved)));
                }
                Err(err) => {
                    warn!(drive = %self.drive, "move of '{}' failed: {}", src, err);
                    report.failed.push((src, err));
                }
            }
        }
        // Moved entries whose new parent is not loaded are gone from the tree.
        selection.retain_existing(&tree);
        report
    }

    /// Delete every selected item.
    ///
    /// Refused up front when nothing is selected or any item is read-only.
    /// Items under another selected directory go with it and are not
    /// reported on their own.
    /// Deleted items leave the tree, the selection and the clipboard; items
    /// the backend refused stay where they were.
    pub async fn delete_selection(&self) -> Result<BatchReport> {
        let items = self.selected_resources();
        if items.is_empty() {
            return Err(BrowserError::UnsupportedOperation("nothing selected".into()));
        }
        if let Some(locked) = items.iter().find(|r| !r.writable || r.path.is_root()) {
            return Err(BrowserError::PermissionDenied(locked.path.clone()));
        }

        let paths: Vec<ResourcePath> = items.into_iter().map(|r| r.path).collect();
        let paths = topmost(&paths);
        let settled = settle_all(paths, |path| async move { self.backend.delete(&path).await }).await;

        let mut report = BatchReport::default();
        {
            let mut tree = self.tree.write();
            let mut selection = self.selection.lock();
            let mut clipboard = self.clipboard.lock();
            let mut rename = self.rename.lock();
            for (path, result) in settled {
                match result {
                    Ok(()) => {
                        tree.remove(&path);
                        clipboard.forget(&self.drive, &path);
                        rename.forget(&path);
                        report.succeeded.push((path, None));
                    }
                    Err(err) => {
                        warn!(drive = %self.drive, "delete of '{}' failed: {}", path, err);
                        report.failed.push((path, err));
                    }
                }
            }
            selection.retain_existing(&tree);
        }

        info!(
            drive = %self.drive,
            "delete: {} ok, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        self.emit(BrowserEvent::Deleted {
            drive: self.drive.clone(),
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
        });
        Ok(report)
    }

    // ── Rename ────────────────────────────────────────────────

    pub fn rename_state(&self) -> RenameState {
        self.rename.lock().state().clone()
    }

    /// Start renaming the single selected item.
    pub fn begin_rename(&self) -> Result<ResourcePath> {
        let selected = self.selected_resources();
        let target = self.rename.lock().begin(&selected)?;
        self.emit(BrowserEvent::RenameStarted {
            drive: self.drive.clone(),
            path: target.clone(),
        });
        Ok(target)
    }

    /// Commit `name` for the item being edited.
    ///
    /// Validation failures and backend refusals leave the session editing so
    /// the user can try another name.
    pub async fn submit_rename(&self, name: &str) -> Result<Resource> {
        let request = {
            let tree = self.tree.read();
            let mut rename = self.rename.lock();
            rename.submit(&tree, name)?
        };

        if request.is_noop() {
            let current = self.tree.read().resolve(&request.target).cloned();
            self.rename.lock().finish();
            return current.ok_or(BrowserError::NotFound(request.target));
        }

        let renamed = match self
            .backend
            .rename(&request.target, &request.proposed_name)
            .await
        {
            Ok(renamed) => renamed,
            Err(err) => {
                warn!(drive = %self.drive, "rename of '{}' failed: {}", request.target, err);
                self.rename.lock().fail();
                return Err(err.into());
            }
        };

        let from = request.target;
        let to = renamed.path.clone();
        {
            let mut tree = self.tree.write();
            if tree.rename_in_place(&from, renamed.clone()).is_none() {
                // The tree changed under the commit (e.g. a refresh already
                // picked up the new name); settle for the backend's view.
                tree.remove(&from);
                tree.insert(renamed.clone());
            }
            self.selection.lock().rebase(&from, &to);
            self.clipboard.lock().rebase(&self.drive, &from, &to);
            self.rename.lock().finish();
        }

        self.emit(BrowserEvent::Renamed {
            drive: self.drive.clone(),
            from,
            to,
        });
        Ok(renamed)
    }

    /// Abandon an edit in progress. A commit already in flight still lands.
    pub fn cancel_rename(&self) {
        self.rename.lock().cancel();
    }

    // ── Create ────────────────────────────────────────────────

    /// Directory new entries go into: the last selected directory, else the
    /// parent of the last selected file, else the root.
    pub fn creation_target(&self) -> ResourcePath {
        let tree = self.tree.read();
        let selection = self.selection.lock();
        match selection.last().and_then(|p| tree.resolve(p)) {
            Some(r) if r.is_dir() => r.path.clone(),
            Some(r) => r.path.parent(),
            None => ResourcePath::root(),
        }
    }

    /// Create an untitled folder at the creation target, select it, and start
    /// renaming it.
    pub async fn create_folder(&self) -> Result<Resource> {
        let target = self.creation_target();
        let created = self.backend.create(&target, ResourceKind::Dir).await?;
        info!(drive = %self.drive, "created '{}'", created.path);

        self.tree.write().invalidate(&target);
        self.emit(BrowserEvent::Invalidated {
            drive: self.drive.clone(),
            path: target.clone(),
        });
        self.load(&target).await?;

        {
            let mut tree = self.tree.write();
            tree.set_expanded(&target, true);
            if !tree.contains(&created.path) {
                tree.insert(created.clone());
            }
        }
        self.emit(BrowserEvent::Created {
            drive: self.drive.clone(),
            path: created.path.clone(),
        });

        self.selection.lock().set([created.path.clone()]);
        if let Err(err) = self.begin_rename() {
            warn!(drive = %self.drive, "cannot rename new folder '{}': {}", created.path, err);
        }
        Ok(created)
    }

    // ── Refresh ───────────────────────────────────────────────

    /// Re-list the root and every expanded directory; drop every other
    /// cached listing. Returns the directories re-listed.
    pub async fn refresh_all(&self) -> Result<Vec<ResourcePath>> {
        let targets = {
            let mut tree = self.tree.write();
            let targets = refresh::full_targets(&tree);
            for path in tree.loaded_paths() {
                if !targets.contains(&path) && tree.invalidate(&path) {
                    debug!(drive = %self.drive, "dropped listing of '{}'", path);
                }
            }
            targets
        };
        let refreshed = self.relist(targets).await?;
        self.prune_stale();
        Ok(refreshed)
    }

    /// Re-list the parents of the selected items (the root when nothing is
    /// selected). Returns the directories re-listed.
    pub async fn refresh_selection(&self) -> Result<Vec<ResourcePath>> {
        let targets = {
            let tree = self.tree.read();
            let selection = self.selection.lock();
            let targets = refresh::selection_targets(&tree, selection.paths());
            if targets.is_empty() {
                vec![ResourcePath::root()]
            } else {
                targets
            }
        };
        let refreshed = self.relist(targets).await?;
        self.prune_stale();
        Ok(refreshed)
    }

    /// List `targets` in order, skipping the ones an earlier listing removed.
    /// Only a failure on the root is fatal.
    async fn relist(&self, targets: Vec<ResourcePath>) -> Result<Vec<ResourcePath>> {
        let mut refreshed = Vec::with_capacity(targets.len());
        for target in targets {
            if !self.tree.read().contains(&target) {
                continue;
            }
            match self.load(&target).await {
                Ok(_) => refreshed.push(target),
                Err(err) if target.is_root() => return Err(err),
                Err(err) => {
                    warn!(drive = %self.drive, "refresh of '{}' failed: {}", target, err);
                    self.tree.write().invalidate(&target);
                    self.emit(BrowserEvent::Invalidated {
                        drive: self.drive.clone(),
                        path: target,
                    });
                }
            }
        }
        Ok(refreshed)
    }

    /// Drop selection, clipboard and rename references a listing proved gone.
    fn prune_stale(&self) {
        let tree = self.tree.read();
        self.selection.lock().retain_existing(&tree);

        let mut clipboard = self.clipboard.lock();
        let gone: Vec<ResourcePath> = clipboard
            .buffer()
            .filter(|b| b.source_drive == self.drive)
            .map(|b| {
                b.items
                    .iter()
                    .filter(|p| tree.is_loaded(&p.parent()) && !tree.contains(p))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for path in &gone {
            clipboard.forget(&self.drive, path);
        }
        drop(clipboard);

        let mut rename = self.rename.lock();
        let vanished = rename.editing().filter(|t| !tree.contains(t)).cloned();
        if let Some(target) = vanished {
            rename.forget(&target);
        }
    }

    // ── Download / copy path ──────────────────────────────────

    /// Fetch every selected item concurrently; directories come back as zip
    /// archives.
    pub async fn download_selection(&self) -> Result<DownloadReport> {
        let items = self.selected_resources();
        if items.is_empty() {
            return Err(BrowserError::UnsupportedOperation("nothing selected".into()));
        }
        let settled = settle_all(items, |item| async move {
            self.backend.download(&item.path, item.is_dir()).await
        })
        .await;

        let mut report = DownloadReport::default();
        for (item, result) in settled {
            match result {
                Ok(bytes) => {
                    let archived = item.is_dir();
                    report.completed.push(Download::new(item.path, archived, bytes));
                }
                Err(err) => {
                    warn!(drive = %self.drive, "download of '{}' failed: {}", item.path, err);
                    report.failed.push((item.path, err));
                }
            }
        }
        self.emit(BrowserEvent::Downloaded {
            drive: self.drive.clone(),
            completed: report.completed.len(),
            failed: report.failed.len(),
        });
        Ok(report)
    }

    /// `drive:path` of the single selected item; a bare path on the default
    /// drive.
    pub fn copy_path(&self) -> Result<String> {
        let selected = self.selected_resources();
        let [item] = selected.as_slice() else {
            return Err(BrowserError::UnsupportedOperation(format!(
                "copy path needs exactly one item, {} selected",
                selected.len()
            )));
        };
        Ok(if self.drive.is_root() {
            item.path.to_string()
        } else {
            format!("{}:{}", self.drive, item.path)
        })
    }

    /// Snapshot for command enablement.
    pub fn command_context(&self, columns: &ColumnSettings) -> CommandContext {
        let selected = self.selected_resources();
        let clipboard = self.clipboard.lock().buffer().map(|b| b.mode);
        let renaming = !self.rename.lock().is_idle();
        CommandContext {
            selected,
            clipboard,
            renaming,
            columns: columns.clone(),
        }
    }
}
