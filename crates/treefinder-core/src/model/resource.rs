/// Resources (one file or directory entry) and the arena node wrapping them.
///
/// A `Resource` is the value a backend hands back; a `ResourceNode` is the
/// tree's bookkeeping around it. Nodes reference each other through
/// `NodeIndex` rather than pointers so a node can be rewritten in place
/// (rename) without invalidating anyone holding its index.
use super::path::ResourcePath;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into the tree arena.
///
/// `u32` keeps nodes small; a browsed tree never gets near 4 billion entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of the backing store a resource lives on.
///
/// The default (local) drive is the empty string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriveId(pub CompactString);

impl DriveId {
    pub fn new(id: &str) -> Self {
        Self(CompactString::new(id))
    }

    /// The default drive, addressed without a `drive:` prefix.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DriveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Dir,
}

/// Opaque metadata carried for display. The engine never interprets it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub mimetype: Option<String>,
}

/// One browsable entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub path: ResourcePath,
    pub kind: ResourceKind,
    pub writable: bool,
    pub drive: DriveId,
    /// `true` when the entry is a directory that may hold children, whether or
    /// not they have been fetched yet.
    pub has_children: bool,
    #[serde(default)]
    pub meta: Metadata,
}

impl Resource {
    pub fn file(drive: DriveId, path: ResourcePath) -> Self {
        Self {
            path,
            kind: ResourceKind::File,
            writable: true,
            drive,
            has_children: false,
            meta: Metadata::default(),
        }
    }

    pub fn dir(drive: DriveId, path: ResourcePath) -> Self {
        Self {
            path,
            kind: ResourceKind::Dir,
            writable: true,
            drive,
            has_children: true,
            meta: Metadata::default(),
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Dir
    }
}

/// Arena slot for one resource.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub resource: Resource,

    /// `None` only for the drive root.
    pub parent: Option<NodeIndex>,

    /// Cached children. `None` means "not fetched yet" (lazy population);
    /// `Some(vec![])` is a fetched, empty directory.
    pub children: Option<Vec<NodeIndex>>,

    /// Whether the view shows this directory's children inline.
    pub expanded: bool,
}

impl ResourceNode {
    pub fn new(resource: Resource, parent: Option<NodeIndex>) -> Self {
        Self {
            resource,
            parent,
            children: None,
            expanded: false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.children.is_some()
    }
}
