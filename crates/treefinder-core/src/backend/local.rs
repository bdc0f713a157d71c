//! Local filesystem backend.
//!
//! Maps resource paths onto OS paths under a root directory. Single-entry
//! calls go through `tokio::fs`; recursive work (directory copy, archive
//! download) walks the subtree with `jwalk` on a blocking thread.

use super::archive::{zip_entries, ArchiveEntry};
use super::{guess_mimetype, untitled_name, BackendResult, ContentBackend};
use crate::error::BackendError;
use crate::model::{DriveId, Metadata, Resource, ResourceKind, ResourcePath};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub struct LocalBackend {
    root: PathBuf,
    drive: DriveId,
    read_only: bool,
}

impl LocalBackend {
    pub fn new(root: PathBuf, drive: DriveId) -> Self {
        Self {
            root,
            drive,
            read_only: false,
        }
    }

    /// Serve the directory without allowing any mutation.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Map a resource path to an OS path, refusing segments that could
    /// escape the root.
    fn os_path(&self, path: &ResourcePath) -> BackendResult<PathBuf> {
        let mut os = self.root.clone();
        for segment in path.segments() {
            if segment == "." || segment == ".." || segment.contains(['/', '\\', '\0']) {
                return Err(BackendError::PermissionDenied(path.clone()));
            }
            os.push(segment.as_str());
        }
        Ok(os)
    }

    fn check_writable(&self, path: &ResourcePath) -> BackendResult<()> {
        if self.read_only || path.is_root() {
            return Err(BackendError::PermissionDenied(path.clone()));
        }
        Ok(())
    }

    async fn describe(&self, path: &ResourcePath, os: &Path) -> BackendResult<Resource> {
        let meta = fs::metadata(os)
            .await
            .map_err(|e| BackendError::from_io(&e, path))?;
        let kind = if meta.is_dir() {
            ResourceKind::Dir
        } else {
            ResourceKind::File
        };
        let modified: Option<DateTime<Utc>> = meta.modified().ok().map(DateTime::<Utc>::from);
        Ok(Resource {
            path: path.clone(),
            kind,
            writable: !self.read_only && !meta.permissions().readonly(),
            drive: self.drive.clone(),
            has_children: meta.is_dir(),
            meta: Metadata {
                size: (!meta.is_dir()).then_some(meta.len()),
                modified,
                mimetype: if meta.is_dir() {
                    None
                } else {
                    guess_mimetype(path.name())
                },
            },
        })
    }

    async fn ensure_dir(&self, path: &ResourcePath, os: &Path) -> BackendResult<()> {
        match fs::metadata(os).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(BackendError::NotFound(path.clone())),
            Err(e) => Err(BackendError::from_io(&e, path)),
        }
    }

    async fn ensure_absent(&self, path: &ResourcePath, os: &Path) -> BackendResult<()> {
        match fs::symlink_metadata(os).await {
            Ok(_) => Err(BackendError::Conflict(path.clone())),
            Err(_) => Ok(()),
        }
    }
}

/// Recursively copy `src` to `dst` (blocking).
fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in jwalk::WalkDir::new(src).skip_hidden(false).sort(true) {
        let entry = entry.map_err(std::io::Error::other)?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(src) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

/// Collect archive members for the subtree under `src` (blocking).
fn collect_archive(src: &Path) -> std::io::Result<Vec<ArchiveEntry>> {
    let mut members = Vec::new();
    for entry in jwalk::WalkDir::new(src).skip_hidden(false).sort(true) {
        let entry = entry.map_err(std::io::Error::other)?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(src) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let content = if entry.file_type().is_dir() {
            None
        } else {
            Some(std::fs::read(&path)?)
        };
        members.push(ArchiveEntry { name, content });
    }
    Ok(members)
}

fn join_error(err: tokio::task::JoinError) -> BackendError {
    BackendError::Io(format!("blocking task failed: {err}"))
}

impl ContentBackend for LocalBackend {
    fn list<'a>(&'a self, path: &'a ResourcePath) -> BoxFuture<'a, BackendResult<Vec<Resource>>> {
        Box::pin(async move {
            let os = self.os_path(path)?;
            self.ensure_dir(path, &os).await?;
            let mut read_dir = fs::read_dir(&os)
                .await
                .map_err(|e| BackendError::from_io(&e, path))?;
            let mut resources = Vec::new();
            while let Some(entry) = read_dir
                .next_entry()
                .await
                .map_err(|e| BackendError::from_io(&e, path))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = path.join(&name);
                match self.describe(&child, &entry.path()).await {
                    Ok(resource) => resources.push(resource),
                    // Broken symlinks and races with concurrent deletes are skipped.
                    Err(err) => debug!("skipping {}: {}", child, err),
                }
            }
            Ok(resources)
        })
    }

    fn stat<'a>(&'a self, path: &'a ResourcePath) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            let os = self.os_path(path)?;
            self.describe(path, &os).await
        })
    }

    fn create<'a>(
        &'a self,
        container: &'a ResourcePath,
        kind: ResourceKind,
    ) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            if self.read_only {
                return Err(BackendError::PermissionDenied(container.clone()));
            }
            let os = self.os_path(container)?;
            self.ensure_dir(container, &os).await?;
            let mut taken = HashSet::new();
            let mut entries = fs::read_dir(&os)
                .await
                .map_err(|e| BackendError::from_io(&e, container))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| BackendError::from_io(&e, container))?
            {
                taken.insert(entry.file_name().to_string_lossy().into_owned());
            }

            // Another writer may take the chosen name between listing and creation.
            loop {
                let name = untitled_name(kind, |n| taken.contains(n));
                let path = container.join(&name);
                let target = os.join(&name);
                let created = match kind {
                    ResourceKind::Dir => fs::create_dir(&target).await,
                    ResourceKind::File => fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(&target)
                        .await
                        .map(|_| ()),
                };
                match created {
                    Ok(()) => return self.describe(&path, &target).await,
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        debug!("'{}' appeared while creating, trying the next name", path);
                        taken.insert(name);
                    }
                    Err(e) => return Err(BackendError::from_io(&e, &path)),
                }
            }
        })
    }

    fn rename<'a>(
        &'a self,
        path: &'a ResourcePath,
        new_name: &'a str,
    ) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            self.check_writable(path)?;
            let target = path.with_name(new_name);
            let (from, to) = (self.os_path(path)?, self.os_path(&target)?);
            if from != to {
                self.ensure_absent(&target, &to).await?;
                fs::rename(&from, &to)
                    .await
                    .map_err(|e| BackendError::from_io(&e, path))?;
            }
            self.describe(&target, &to).await
        })
    }

    fn move_to<'a>(
        &'a self,
        src: &'a ResourcePath,
        dest_container: &'a ResourcePath,
    ) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            self.check_writable(src)?;
            let dest_os = self.os_path(dest_container)?;
            self.ensure_dir(dest_container, &dest_os).await?;
            let target = dest_container.join(src.name());
            let (from, to) = (self.os_path(src)?, self.os_path(&target)?);
            self.ensure_absent(&target, &to).await?;
            fs::rename(&from, &to)
                .await
                .map_err(|e| BackendError::from_io(&e, src))?;
            self.describe(&target, &to).await
        })
    }

    fn copy<'a>(
        &'a self,
        src: &'a ResourcePath,
        dest_container: &'a ResourcePath,
        name: &'a str,
    ) -> BoxFuture<'a, BackendResult<Resource>> {
        Box::pin(async move {
            if self.read_only {
                return Err(BackendError::PermissionDenied(dest_container.clone()));
            }
            let dest_os = self.os_path(dest_container)?;
            self.ensure_dir(dest_container, &dest_os).await?;
            let target = dest_container.join(name);
            let (from, to) = (self.os_path(src)?, self.os_path(&target)?);
            self.ensure_absent(&target, &to).await?;
            let meta = fs::metadata(&from)
                .await
                .map_err(|e| BackendError::from_io(&e, src))?;
            if meta.is_dir() {
                let (from, to) = (from.clone(), to.clone());
                tokio::task::spawn_blocking(move || copy_tree(&from, &to))
                    .await
                    .map_err(join_error)?
                    .map_err(|e| BackendError::from_io(&e, src))?;
            } else {
                fs::copy(&from, &to)
                    .await
                    .map_err(|e| BackendError::from_io(&e, src))?;
            }
            self.describe(&target, &to).await
        })
    }

    fn delete<'a>(&'a self, path: &'a ResourcePath) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            self.check_writable(path)?;
            let os = self.os_path(path)?;
            let meta = fs::symlink_metadata(&os)
                .await
                .map_err(|e| BackendError::from_io(&e, path))?;
            let removed = if meta.is_dir() {
                fs::remove_dir_all(&os).await
            } else {
                fs::remove_file(&os).await
            };
            removed.map_err(|e| BackendError::from_io(&e, path))
        })
    }

    fn download<'a>(
        &'a self,
        path: &'a ResourcePath,
        is_container: bool,
    ) -> BoxFuture<'a, BackendResult<Vec<u8>>> {
        Box::pin(async move {
            let os = self.os_path(path)?;
            if !is_container {
                return fs::read(&os)
                    .await
                    .map_err(|e| BackendError::from_io(&e, path));
            }
            self.ensure_dir(path, &os).await?;
            let members = tokio::task::spawn_blocking(move || collect_archive(&os))
                .await
                .map_err(join_error)?
                .map_err(|e| BackendError::from_io(&e, path))?;
            zip_entries(members)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalBackend) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/sub")).unwrap();
        std::fs::write(dir.path().join("a/b.txt"), b"bee").unwrap();
        std::fs::write(dir.path().join("a/sub/c.txt"), b"sea").unwrap();
        std::fs::create_dir_all(dir.path().join("dest")).unwrap();
        let backend = LocalBackend::new(dir.path().to_path_buf(), DriveId::new("l"));
        (dir, backend)
    }

    #[tokio::test]
    async fn test_list_describes_entries() {
        let (_dir, backend) = setup();
        let mut entries = backend.list(&ResourcePath::parse("a")).await.unwrap();
        entries.sort_by(|x, y| x.name().cmp(y.name()));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name(), "b.txt");
        assert_eq!(entries[0].meta.size, Some(3));
        assert_eq!(entries[0].meta.mimetype.as_deref(), Some("text/plain"));
        assert!(entries[1].is_dir());
    }

    #[tokio::test]
    async fn test_rejects_parent_segments() {
        let (_dir, backend) = setup();
        let err = backend
            .list(&ResourcePath::from_segments(["..", "etc"]))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_copy_directory_recursively() {
        let (dir, backend) = setup();
        backend
            .copy(&ResourcePath::parse("a"), &ResourcePath::parse("dest"), "a")
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("dest/a/sub/c.txt")).unwrap(), b"sea");
    }

    #[tokio::test]
    async fn test_move_conflict() {
        let (dir, backend) = setup();
        std::fs::write(dir.path().join("dest/b.txt"), b"x").unwrap();
        let err = backend
            .move_to(&ResourcePath::parse("a/b.txt"), &ResourcePath::parse("dest"))
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::Conflict(ResourcePath::parse("dest/b.txt")));
        assert!(dir.path().join("a/b.txt").exists());
    }

    #[tokio::test]
    async fn test_create_and_rename_folder() {
        let (dir, backend) = setup();
        let created = backend
            .create(&ResourcePath::root(), ResourceKind::Dir)
            .await
            .unwrap();
        assert_eq!(created.name(), "Untitled Folder");
        let renamed = backend.rename(&created.path, "named").await.unwrap();
        assert_eq!(renamed.path, ResourcePath::parse("named"));
        assert!(dir.path().join("named").is_dir());
    }

    #[tokio::test]
    async fn test_create_skips_taken_names() {
        let (dir, backend) = setup();
        std::fs::create_dir(dir.path().join("Untitled Folder")).unwrap();
        std::fs::write(dir.path().join("Untitled Folder 1"), b"").unwrap();
        let root = ResourcePath::root();

        let (first, second) = tokio::join!(
            backend.create(&root, ResourceKind::Dir),
            backend.create(&root, ResourceKind::Dir)
        );
        let mut names = vec![
            first.unwrap().name().to_string(),
            second.unwrap().name().to_string(),
        ];
        names.sort();
        assert_eq!(names, vec!["Untitled Folder 2", "Untitled Folder 3"]);
    }

    #[tokio::test]
    async fn test_read_only_refuses_mutation() {
        let (dir, _) = setup();
        let backend = LocalBackend::new(dir.path().to_path_buf(), DriveId::new("l")).read_only();
        let err = backend.delete(&ResourcePath::parse("a/b.txt")).await.unwrap_err();
        assert!(matches!(err, BackendError::PermissionDenied(_)));
        let listed = backend.list(&ResourcePath::parse("a")).await.unwrap();
        assert!(listed.iter().all(|r| !r.writable));
    }

    #[tokio::test]
    async fn test_download_directory_archive() {
        let (_dir, backend) = setup();
        let bytes = backend.download(&ResourcePath::parse("a"), true).await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"b.txt"));
        assert!(names.contains(&"sub/c.txt"));
    }
}
