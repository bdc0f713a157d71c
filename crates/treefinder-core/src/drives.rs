/// Drive registry: which backend serves which drive.
///
/// Drives are described by `DriveSpec { name, url }`. A drive's id is derived
/// from its URL (first 8 hex digits of its MD5), so the same URL always
/// lands on the same drive and re-initialising with an unchanged spec keeps
/// the existing backend instead of building a new one.
use crate::backend::{ContentBackend, LocalBackend, MemoryBackend};
use crate::model::DriveId;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unsupported drive url '{0}' (expected mem://, osfs:// or file://)")]
    UnsupportedScheme(String),

    #[error("drive root {0} is not a directory")]
    MissingRoot(PathBuf),

    #[error("malformed drive spec '{0}' (expected NAME=URL)")]
    MalformedSpec(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveSpec {
    pub name: String,
    pub url: String,
}

impl DriveSpec {
    /// Parse `NAME=URL`.
    pub fn parse(text: &str) -> Result<Self, RegistryError> {
        match text.split_once('=') {
            Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => Ok(Self {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
            }),
            _ => Err(RegistryError::MalformedSpec(text.to_string())),
        }
    }
}

/// A spec after mounting, with the drive it was assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountedResource {
    pub name: String,
    pub url: String,
    pub drive: DriveId,
}

/// Builds a backend for a drive URL.
pub type BackendFactory =
    Box<dyn Fn(&DriveId, &str) -> Result<Arc<dyn ContentBackend>, RegistryError> + Send + Sync>;

/// Deterministic drive id for `url`.
pub fn drive_id_for(url: &str) -> DriveId {
    let digest = Md5::digest(url.as_bytes());
    DriveId::new(&hex::encode(digest)[..8])
}

/// Backend for the `mem://`, `osfs://` and `file://` schemes.
pub fn default_backend_factory(
    drive: &DriveId,
    url: &str,
) -> Result<Arc<dyn ContentBackend>, RegistryError> {
    if url.starts_with("mem://") {
        return Ok(Arc::new(MemoryBackend::new(drive.clone())));
    }
    let root = url
        .strip_prefix("osfs://")
        .or_else(|| url.strip_prefix("file://"))
        .ok_or_else(|| RegistryError::UnsupportedScheme(url.to_string()))?;
    let root = PathBuf::from(root);
    if !root.is_dir() {
        return Err(RegistryError::MissingRoot(root));
    }
    Ok(Arc::new(LocalBackend::new(root, drive.clone())))
}

pub struct DriveRegistry {
    backends: HashMap<DriveId, Arc<dyn ContentBackend>>,
    resources: Vec<MountedResource>,
    factory: BackendFactory,
}

impl DriveRegistry {
    /// A registry serving only the default drive.
    pub fn new(root_backend: Arc<dyn ContentBackend>) -> Self {
        Self::with_factory(root_backend, Box::new(default_backend_factory))
    }

    pub fn with_factory(root_backend: Arc<dyn ContentBackend>, factory: BackendFactory) -> Self {
        let mut backends = HashMap::new();
        backends.insert(DriveId::root(), root_backend);
        Self {
            backends,
            resources: Vec::new(),
            factory,
        }
    }

    /// Replace the mounted drives with `specs`.
    ///
    /// Backends for ids that were already mounted are reused; a URL listed
    /// twice is mounted once; drives absent from `specs` are dropped. The
    /// default drive always stays. If any spec fails to mount, the registry
    /// is left unchanged.
    pub fn init_resources(
        &mut self,
        specs: &[DriveSpec],
    ) -> Result<Vec<MountedResource>, RegistryError> {
        let mut backends: HashMap<DriveId, Arc<dyn ContentBackend>> = HashMap::new();
        if let Some(root) = self.backends.get(&DriveId::root()) {
            backends.insert(DriveId::root(), Arc::clone(root));
        }

        let mut resources = Vec::with_capacity(specs.len());
        for spec in specs {
            let drive = drive_id_for(&spec.url);
            if !backends.contains_key(&drive) {
                let backend = match self.backends.get(&drive) {
                    Some(existing) => Arc::clone(existing),
                    None => (self.factory)(&drive, &spec.url)?,
                };
                backends.insert(drive.clone(), backend);
            }
            resources.push(MountedResource {
                name: spec.name.clone(),
                url: spec.url.clone(),
                drive,
            });
        }

        info!(
            "initialized {} file system resources, {} backends",
            resources.len(),
            backends.len()
        );
        self.backends = backends;
        self.resources = resources.clone();
        Ok(resources)
    }

    pub fn resources(&self) -> &[MountedResource] {
        &self.resources
    }

    pub fn backend(&self, drive: &DriveId) -> Option<Arc<dyn ContentBackend>> {
        self.backends.get(drive).cloned()
    }

    /// Mounted drive ids, default drive first.
    pub fn drives(&self) -> Vec<DriveId> {
        let mut drives: Vec<DriveId> = self.backends.keys().cloned().collect();
        drives.sort();
        drives
    }

    /// Drive id for a resource name or a raw id.
    pub fn find(&self, name_or_id: &str) -> Option<DriveId> {
        self.resources
            .iter()
            .find(|r| r.name == name_or_id)
            .map(|r| r.drive.clone())
            .or_else(|| {
                let id = DriveId::new(name_or_id);
                self.backends.contains_key(&id).then_some(id)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_registry(built: Arc<AtomicUsize>) -> DriveRegistry {
        let root: Arc<dyn ContentBackend> = Arc::new(MemoryBackend::new(DriveId::root()));
        DriveRegistry::with_factory(
            root,
            Box::new(move |drive, _url| {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MemoryBackend::new(drive.clone())) as Arc<dyn ContentBackend>)
            }),
        )
    }

    fn spec(name: &str, url: &str) -> DriveSpec {
        DriveSpec {
            name: name.into(),
            url: url.into(),
        }
    }

    #[test]
    fn test_drive_id_is_deterministic() {
        let a = drive_id_for("mem://one");
        assert_eq!(a, drive_id_for("mem://one"));
        assert_ne!(a, drive_id_for("mem://two"));
        assert_eq!(a.as_str().len(), 8);
    }

    #[test]
    fn test_drive_id_is_md5_prefix() {
        assert_eq!(drive_id_for("osfs:///tmp").as_str(), "c65a0a49");
        assert_eq!(drive_id_for("mem://scratch").as_str(), "5bdbeab1");
    }

    #[test]
    fn test_reuses_backends_and_skips_duplicates() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut registry = counting_registry(built.clone());

        let first = registry
            .init_resources(&[spec("a", "mem://a"), spec("a-again", "mem://a")])
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].drive, first[1].drive);
        assert_eq!(built.load(Ordering::SeqCst), 1);

        let before = registry.backend(&first[0].drive).unwrap();
        registry
            .init_resources(&[spec("a", "mem://a"), spec("b", "mem://b")])
            .unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
        let after = registry.backend(&first[0].drive).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(registry.drives().len(), 3);
    }

    #[test]
    fn test_dropped_drives_disappear_but_root_stays() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut registry = counting_registry(built);
        registry.init_resources(&[spec("a", "mem://a")]).unwrap();
        registry.init_resources(&[]).unwrap();
        assert_eq!(registry.drives(), vec![DriveId::root()]);
        assert!(registry.find("a").is_none());
        assert!(registry.find("").is_some());
    }

    #[test]
    fn test_failed_spec_leaves_registry_unchanged() {
        let root: Arc<dyn ContentBackend> = Arc::new(MemoryBackend::new(DriveId::root()));
        let mut registry = DriveRegistry::new(root);
        registry.init_resources(&[spec("m", "mem://m")]).unwrap();
        let err = registry
            .init_resources(&[spec("bad", "ftp://nowhere")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedScheme(_)));
        assert!(registry.find("m").is_some());
    }

    #[test]
    fn test_spec_parse() {
        assert_eq!(
            DriveSpec::parse("data=osfs:///tmp").unwrap(),
            spec("data", "osfs:///tmp")
        );
        assert!(DriveSpec::parse("no-equals").is_err());
        assert!(DriveSpec::parse("=mem://x").is_err());
    }
}
