//! In-memory backend.
//!
//! Holds a flat `BTreeMap<ResourcePath, Entry>` for one drive. Used for
//! `mem://` drives and throughout the test suite, so it also supports fault
//! injection (`fail_on`), an artificial per-call delay, and a journal of
//! every call it served.

use super::archive::{zip_entries, ArchiveEntry};
use super::{guess_mimetype, untitled_name, BackendResult, ContentBackend};
use crate::error::BackendError;
use crate::model::{DriveId, Metadata, Resource, ResourceKind, ResourcePath};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

/// A call the backend received, recorded in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    List(ResourcePath),
    Stat(ResourcePath),
    Create(ResourcePath, ResourceKind),
    Rename(ResourcePath, String),
    Move(ResourcePath, ResourcePath),
    Copy(ResourcePath, ResourcePath, String),
    Delete(ResourcePath),
    Download(ResourcePath, bool),
}

#[derive(Debug, Clone)]
struct Entry {
    kind: ResourceKind,
    writable: bool,
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

impl Entry {
    fn dir() -> Self {
        Self {
            kind: ResourceKind::Dir,
            writable: true,
            content: Vec::new(),
            modified: Utc::now(),
        }
    }

    fn file(content: Vec<u8>) -> Self {
        Self {
            kind: ResourceKind::File,
            writable: true,
            content,
            modified: Utc::now(),
        }
    }
}

pub struct MemoryBackend {
    drive: DriveId,
    entries: Mutex<BTreeMap<ResourcePath, Entry>>,
    faults: Mutex<HashMap<ResourcePath, BackendError>>,
    journal: Mutex<Vec<BackendCall>>,
    delay: Mutex<Option<Duration>>,
}

impl MemoryBackend {
    /// An empty drive containing only its root directory.
    pub fn new(drive: DriveId) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(ResourcePath::root(), Entry::dir());
        Self {
            drive,
            entries: Mutex::new(entries),
            faults: Mutex::new(HashMap::new()),
            journal: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        }
    }

    /// Add a file (creating missing parent directories).
    pub fn add_file(&self, path: &str, content: &[u8]) -> &Self {
        let path = ResourcePath::parse(path);
        let mut entries = self.entries.lock();
        Self::ensure_dirs(&mut entries, &path.parent());
        entries.insert(path, Entry::file(content.to_vec()));
        self
    }

    /// Add a directory (creating missing parents).
    pub fn add_dir(&self, path: &str) -> &Self {
        let path = ResourcePath::parse(path);
        let mut entries = self.entries.lock();
        Self::ensure_dirs(&mut entries, &path);
        self
    }

    /// Mark an existing entry read-only (or writable again).
    pub fn set_writable(&self, path: &str, writable: bool) -> &Self {
        if let Some(entry) = self.entries.lock().get_mut(&ResourcePath::parse(path)) {
            entry.writable = writable;
        }
        self
    }

    /// Make every call whose primary path is `path` fail with `err`.
    pub fn fail_on(&self, path: &str, err: BackendError) {
        self.faults.lock().insert(ResourcePath::parse(path), err);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Sleep this long inside every call before touching state.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Every call served so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.journal.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.journal.lock().clear();
    }

    pub fn exists(&self, path: &str) -> bool {
        self.entries.lock().contains_key(&ResourcePath::parse(path))
    }

    /// Contents of a file, if present.
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .get(&ResourcePath::parse(path))
            .filter(|e| e.kind == ResourceKind::File)
            .map(|e| e.content.clone())
    }

    fn ensure_dirs(entries: &mut BTreeMap<ResourcePath, Entry>, path: &ResourcePath) {
        let mut current = ResourcePath::root();
        for segment in path.segments() {
            current = current.join(segment);
            entries.entry(current.clone()).or_insert_with(Entry::dir);
        }
    }

    /// Journal the call, apply the delay, and surface an injected fault.
    async fn enter(&self, call: BackendCall, path: &ResourcePath) -> BackendResult<()> {
        debug!(drive = %self.drive, "memory backend: {:?}", call);
        self.journal.lock().push(call);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.faults.lock().get(path) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn resource(&self, path: &ResourcePath, entry: &Entry) -> Resource {
        let is_dir = entry.kind == ResourceKind::Dir;
        Resource {
            path: path.clone(),
            kind: entry.kind,
            writable: entry.writable,
            drive: self.drive.clone(),
            has_children: is_dir,
            meta: Metadata {
                size: (!is_dir).then_some(entry.content.len() as u64),
                modified: Some(entry.modified),
                mimetype: if is_dir { None } else { guess_mimetype(path.name()) },
            },
        }
    }

    fn writable_dir(
        entries: &BTreeMap<ResourcePath, Entry>,
        path: &ResourcePath,
    ) -> BackendResult<()> {
        match entries.get(path) {
            Some(e) if e.kind != ResourceKind::Dir => Err(BackendError::NotFound(path.clone())),
            Some(e) if !e.writable => Err(BackendError::PermissionDenied(path.clone())),
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound(path.clone())),
        }
    }

    /// Keys of `path` and everything under it.
    fn subtree(entries: &BTreeMap<ResourcePath, Entry>, path: &ResourcePath) -> Vec<ResourcePath> {
        entries
            .keys()
            .filter(|k| k.starts_with(path))
            .cloned()
            .collect()
    }

    /// Re-key the subtree at `from` under `to`, optionally keeping the source.
    fn relocate(
        entries: &mut BTreeMap<ResourcePath, Entry>,
        from: &ResourcePath,
        to: &ResourcePath,
        keep_source: bool,
    ) {
        let now = Utc::now();
        for key in Self::subtree(entries, from) {
            let entry = if keep_source {
                entries.get(&key).cloned()
            } else {
                entries.remove(&key)
            };
            if let (Some(mut entry), Some(new_key)) = (entry, key.rebase(from, to)) {
                if keep_source {
                    entry.modified = now;
                    entry.writable = true;
                }
                entries.insert(new_key, entry);
            }
        }
    }
}

impl ContentBackend for MemoryBackend {
    fn list<'a>(&'a self, path: &'a ResourcePath) -> BoxFuture<'a, BackendResult<Vec<Resource>>> {
        Box::pin(async move {
            self.enter(BackendCall::List(path.clone()), path).await?;
            let entries = self.entries.lock();
            match entries.get(path) {
                Some(e) if e.kind == ResourceKind::Dir => {}
                _ => return Err(BackendError::NotFound(path.clone())),
            }
            Ok(entries
                .iter()
                .filter(|(k, _)| !k.is_root() && k.parent() == *path)
                .map(|(k, e)| self.resource(k, e))
                .collect())
        })
    }

    fn stat<'a>(&'a self, path: &'a ResourcePath) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            self.enter(BackendCall::Stat(path.clone()), path).await?;
            let entries = self.entries.lock();
            entries
                .get(path)
                .map(|e| self.resource(path, e))
                .ok_or_else(|| BackendError::NotFound(path.clone()))
        })
    }

    fn create<'a>(
        &'a self,
        container: &'a ResourcePath,
        kind: ResourceKind,
    ) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            self.enter(BackendCall::Create(container.clone(), kind), container)
                .await?;
            let mut entries = self.entries.lock();
            Self::writable_dir(&entries, container)?;
            let name = untitled_name(kind, |n| entries.contains_key(&container.join(n)));
            let path = container.join(&name);
            let entry = match kind {
                ResourceKind::Dir => Entry::dir(),
                ResourceKind::File => Entry::file(Vec::new()),
            };
            let resource = self.resource(&path, &entry);
            entries.insert(path, entry);
            Ok(resource)
        })
    }

    fn rename<'a>(
        &'a self,
        path: &'a ResourcePath,
        new_name: &'a str,
    ) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            self.enter(BackendCall::Rename(path.clone(), new_name.to_string()), path)
                .await?;
            let mut entries = self.entries.lock();
            match entries.get(path) {
                None => return Err(BackendError::NotFound(path.clone())),
                Some(e) if !e.writable || path.is_root() => {
                    return Err(BackendError::PermissionDenied(path.clone()))
                }
                Some(_) => {}
            }
            let target = path.with_name(new_name);
            if target == *path {
                let entry = entries.get(path).cloned().ok_or_else(|| BackendError::NotFound(path.clone()))?;
                return Ok(self.resource(path, &entry));
            }
            if entries.contains_key(&target) {
                return Err(BackendError::Conflict(target));
            }
            Self::relocate(&mut entries, path, &target, false);
            let entry = entries
                .get(&target)
                .cloned()
                .ok_or_else(|| BackendError::NotFound(target.clone()))?;
            Ok(self.resource(&target, &entry))
        })
    }

    fn move_to<'a>(
        &'a self,
        src: &'a ResourcePath,
        dest_container: &'a ResourcePath,
    ) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            self.enter(BackendCall::Move(src.clone(), dest_container.clone()), src)
                .await?;
            let mut entries = self.entries.lock();
            match entries.get(src) {
                None => return Err(BackendError::NotFound(src.clone())),
                Some(e) if !e.writable || src.is_root() => {
                    return Err(BackendError::PermissionDenied(src.clone()))
                }
                Some(_) => {}
            }
            Self::writable_dir(&entries, dest_container)?;
            if dest_container.starts_with(src) {
                return Err(BackendError::Io(format!(
                    "cannot move {src} into its own subtree"
                )));
            }
            let target = dest_container.join(src.name());
            if entries.contains_key(&target) {
                return Err(BackendError::Conflict(target));
            }
            Self::relocate(&mut entries, src, &target, false);
            let entry = entries
                .get(&target)
                .cloned()
                .ok_or_else(|| BackendError::NotFound(target.clone()))?;
            Ok(self.resource(&target, &entry))
        })
    }

    fn copy<'a>(
        &'a self,
        src: &'a ResourcePath,
        dest_container: &'a ResourcePath,
        name: &'a str,
    ) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            self.enter(
                BackendCall::Copy(src.clone(), dest_container.clone(), name.to_string()),
                src,
            )
            .await?;
            let mut entries = self.entries.lock();
            if !entries.contains_key(src) {
                return Err(BackendError::NotFound(src.clone()));
            }
            Self::writable_dir(&entries, dest_container)?;
            let target = dest_container.join(name);
            if entries.contains_key(&target) {
                return Err(BackendError::Conflict(target));
            }
            if target.starts_with(src) {
                return Err(BackendError::Io(format!(
                    "cannot copy {src} into its own subtree"
                )));
            }
            Self::relocate(&mut entries, src, &target, true);
            let entry = entries
                .get(&target)
                .cloned()
                .ok_or_else(|| BackendError::NotFound(target.clone()))?;
            Ok(self.resource(&target, &entry))
        })
    }

    fn delete<'a>(&'a self, path: &'a ResourcePath) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            self.enter(BackendCall::Delete(path.clone()), path).await?;
            let mut entries = self.entries.lock();
            match entries.get(path) {
                None => return Err(BackendError::NotFound(path.clone())),
                Some(e) if !e.writable || path.is_root() => {
                    return Err(BackendError::PermissionDenied(path.clone()))
                }
                Some(_) => {}
            }
            for key in Self::subtree(&entries, path) {
                entries.remove(&key);
            }
            Ok(())
        })
    }

    fn download<'a>(
        &'a self,
        path: &'a ResourcePath,
        is_container: bool,
    ) -> BoxFuture<'a, BackendResult<Vec<u8>>> {
        Box::pin(async move {
            self.enter(BackendCall::Download(path.clone(), is_container), path)
                .await?;
            let members = {
                let entries = self.entries.lock();
                let entry = entries
                    .get(path)
                    .ok_or_else(|| BackendError::NotFound(path.clone()))?;
                if !is_container {
                    if entry.kind == ResourceKind::Dir {
                        return Err(BackendError::Io(format!("{path} is a directory")));
                    }
                    return Ok(entry.content.clone());
                }
                entries
                    .iter()
                    .filter(|(k, _)| k.starts_with(path) && *k != path)
                    .filter_map(|(k, e)| {
                        let relative = k.rebase(path, &ResourcePath::root())?;
                        Some(ArchiveEntry {
                            name: relative.to_string(),
                            content: (e.kind == ResourceKind::File).then(|| e.content.clone()),
                        })
                    })
                    .collect::<Vec<_>>()
            };
            zip_entries(members)
        })
    }
}
