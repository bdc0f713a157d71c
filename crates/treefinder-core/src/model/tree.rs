/// Arena-backed resource tree with a path index.
///
/// Nodes live in a `Vec<Option<ResourceNode>>`; removed subtrees leave
/// tombstones that are recycled through a free list. Every live node is also
/// registered in a `HashMap<ResourcePath, NodeIndex>`, which is how the
/// selection and clipboard re-resolve their path references after a
/// mutation.
///
/// Mutations are whole operations on `&mut self`. Behind the `SharedTree`
/// write lock that makes each one atomic with respect to readers.
use super::path::ResourcePath;
use super::resource::{DriveId, NodeIndex, Resource, ResourceNode};
use compact_str::CompactString;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A tree shared between the browser and anything rendering it.
pub type SharedTree = Arc<RwLock<ResourceTree>>;

#[derive(Debug, Clone)]
pub struct ResourceTree {
    nodes: Vec<Option<ResourceNode>>,
    free: Vec<NodeIndex>,
    index: HashMap<ResourcePath, NodeIndex>,
    root: NodeIndex,
    drive: DriveId,
}

impl ResourceTree {
    /// Create a tree holding only the (unfetched) root of `drive`.
    pub fn new(drive: DriveId) -> Self {
        let mut root = ResourceNode::new(Resource::dir(drive.clone(), ResourcePath::root()), None);
        root.expanded = true;
        let mut index = HashMap::new();
        index.insert(ResourcePath::root(), NodeIndex::new(0));
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            index,
            root: NodeIndex::new(0),
            drive,
        }
    }

    /// Wrap the tree for sharing.
    pub fn into_shared(self) -> SharedTree {
        Arc::new(RwLock::new(self))
    }

    pub fn drive(&self) -> &DriveId {
        &self.drive
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> Option<&ResourceNode> {
        self.nodes.get(index.idx()).and_then(|slot| slot.as_ref())
    }

    #[inline]
    fn node_mut(&mut self, index: NodeIndex) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(index.idx()).and_then(|slot| slot.as_mut())
    }

    /// Arena slot for `path`, if it is in the tree.
    pub fn lookup(&self, path: &ResourcePath) -> Option<NodeIndex> {
        self.index.get(path).copied()
    }

    /// The cached resource at `path`.
    pub fn resolve(&self, path: &ResourcePath) -> Option<&Resource> {
        self.lookup(path)
            .and_then(|idx| self.node(idx))
            .map(|node| &node.resource)
    }

    /// Whether `path` is in the tree (fetched, not necessarily expanded).
    pub fn contains(&self, path: &ResourcePath) -> bool {
        self.index.contains_key(path)
    }

    /// Whether `path`'s children have been fetched.
    pub fn is_loaded(&self, path: &ResourcePath) -> bool {
        self.lookup(path)
            .and_then(|idx| self.node(idx))
            .is_some_and(|node| node.is_loaded())
    }

    pub fn is_expanded(&self, path: &ResourcePath) -> bool {
        self.lookup(path)
            .and_then(|idx| self.node(idx))
            .is_some_and(|node| node.expanded)
    }

    /// Set the expansion flag. Files cannot be expanded.
    pub fn set_expanded(&mut self, path: &ResourcePath, expanded: bool) -> bool {
        let Some(idx) = self.lookup(path) else {
            return false;
        };
        match self.node_mut(idx) {
            Some(node) if node.resource.is_dir() => {
                node.expanded = expanded;
                true
            }
            _ => false,
        }
    }

    /// Cached children of `path`, or `None` if it is unknown or unfetched.
    pub fn children(&self, path: &ResourcePath) -> Option<Vec<&Resource>> {
        let node = self.node(self.lookup(path)?)?;
        let children = node.children.as_ref()?;
        Some(
            children
                .iter()
                .filter_map(|&c| self.node(c))
                .map(|n| &n.resource)
                .collect(),
        )
    }

    /// Children of a node ordered for display: directories first, then by
    /// case-insensitive name.
    pub fn sorted_children(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let Some(children) = self.node(index).and_then(|n| n.children.as_ref()) else {
            return Vec::new();
        };
        let mut sorted: Vec<NodeIndex> = children.clone();
        sorted.sort_by_cached_key(|&c| {
            let resource = self.node(c).map(|n| &n.resource);
            (
                !resource.is_some_and(|r| r.is_dir()),
                resource.map(|r| r.name().to_lowercase()).unwrap_or_default(),
            )
        });
        sorted
    }

    /// `true` if the (fetched) directory `parent` has a child called `name`.
    ///
    /// Siblings are checked through the path index, so this also works for
    /// entries inserted before the parent's listing was fetched.
    pub fn has_child(&self, parent: &ResourcePath, name: &str) -> bool {
        self.contains(&parent.join(name))
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Paths of every directory whose children are cached and shown.
    pub fn expanded_paths(&self) -> Vec<ResourcePath> {
        let mut paths: Vec<ResourcePath> = self
            .nodes
            .iter()
            .flatten()
            .filter(|n| n.expanded && n.is_loaded())
            .map(|n| n.resource.path.clone())
            .collect();
        // Parents before children so a caller re-fetching in order never
        // lists a directory whose parent listing just dropped it.
        paths.sort_by_key(|p| p.depth());
        paths
    }

    /// Paths of every directory with a cached listing.
    pub fn loaded_paths(&self) -> Vec<ResourcePath> {
        self.nodes
            .iter()
            .flatten()
            .filter(|n| n.is_loaded())
            .map(|n| n.resource.path.clone())
            .collect()
    }

    // ── Mutation ──────────────────────────────────────────────

    fn alloc(&mut self, node: ResourceNode) -> NodeIndex {
        let path = node.resource.path.clone();
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx.idx()] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                NodeIndex::new(self.nodes.len() - 1)
            }
        };
        self.index.insert(path, idx);
        idx
    }

    /// Release `index` and everything underneath it.
    fn free_subtree(&mut self, index: NodeIndex) {
        let mut stack = vec![index];
        while let Some(idx) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(idx.idx()).and_then(Option::take) {
                self.index.remove(&node.resource.path);
                if let Some(children) = node.children {
                    stack.extend(children);
                }
                self.free.push(idx);
            }
        }
    }

    /// Merge a fresh listing of `parent` into the cache.
    ///
    /// Entries that survive keep their `NodeIndex`, expansion flag and cached
    /// children; entries missing from `listing` are dropped with their
    /// subtrees; new entries arrive unfetched. Returns `false` if `parent`
    /// is not in the tree.
    pub fn merge_children(&mut self, parent: &ResourcePath, listing: Vec<Resource>) -> bool {
        let Some(parent_idx) = self.lookup(parent) else {
            return false;
        };

        let existing: HashMap<CompactString, NodeIndex> = self
            .node(parent_idx)
            .and_then(|n| n.children.as_ref())
            .map(|children| {
                children
                    .iter()
                    .filter_map(|&c| self.node(c).map(|n| (CompactString::new(n.resource.name()), c)))
                    .collect()
            })
            .unwrap_or_default();

        let mut kept: Vec<NodeIndex> = Vec::with_capacity(listing.len());
        for resource in listing {
            if resource.path.parent() != *parent || resource.path.is_root() {
                warn!(
                    "ignoring listing entry {} outside {}",
                    resource.path, parent
                );
                continue;
            }
            match existing.get(resource.name()) {
                Some(&idx) if !kept.contains(&idx) => {
                    let kind_changed = self
                        .node(idx)
                        .is_some_and(|n| n.resource.kind != resource.kind);
                    if kind_changed {
                        self.drop_children(idx);
                    }
                    if let Some(node) = self.node_mut(idx) {
                        node.resource = resource;
                        if !node.resource.is_dir() {
                            node.expanded = false;
                        }
                    }
                    kept.push(idx);
                }
                Some(_) => {
                    warn!("duplicate listing entry {}", resource.path);
                }
                None => {
                    let idx = self.alloc(ResourceNode::new(resource, Some(parent_idx)));
                    kept.push(idx);
                }
            }
        }

        for (_, idx) in existing {
            if !kept.contains(&idx) {
                self.free_subtree(idx);
            }
        }

        if let Some(node) = self.node_mut(parent_idx) {
            node.children = Some(kept);
        }
        debug!("merged listing of '{}' ({} nodes live)", parent, self.len());
        true
    }

    /// Forget the cached children of `idx` without touching the node itself.
    fn drop_children(&mut self, idx: NodeIndex) {
        let children = self.node_mut(idx).and_then(|n| n.children.take());
        for child in children.into_iter().flatten() {
            self.free_subtree(child);
        }
    }

    /// Drop the cached children of `path`, forcing a re-fetch on next use.
    pub fn invalidate(&mut self, path: &ResourcePath) -> bool {
        match self.lookup(path) {
            Some(idx) => {
                self.drop_children(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every cached listing, root included.
    pub fn invalidate_all(&mut self) {
        let root = self.root;
        self.drop_children(root);
    }

    /// Insert or update a single resource under an already-fetched parent.
    ///
    /// Returns `None` when the parent is unknown or not fetched yet; the entry
    /// will show up when that parent is listed.
    pub fn insert(&mut self, resource: Resource) -> Option<NodeIndex> {
        if resource.path.is_root() {
            return None;
        }
        if let Some(idx) = self.lookup(&resource.path) {
            if let Some(node) = self.node_mut(idx) {
                node.resource = resource;
            }
            return Some(idx);
        }
        let parent_idx = self.lookup(&resource.path.parent())?;
        if !self.node(parent_idx)?.is_loaded() {
            return None;
        }
        let idx = self.alloc(ResourceNode::new(resource, Some(parent_idx)));
        if let Some(parent) = self.node_mut(parent_idx) {
            parent.resource.has_children = true;
            if let Some(children) = parent.children.as_mut() {
                children.push(idx);
            }
        }
        Some(idx)
    }

    /// Remove `path` and its subtree. The root cannot be removed.
    pub fn remove(&mut self, path: &ResourcePath) -> Option<Resource> {
        if path.is_root() {
            return None;
        }
        let idx = self.lookup(path)?;
        let resource = self.node(idx)?.resource.clone();
        let parent = self.node(idx)?.parent;
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            if let Some(children) = parent.children.as_mut() {
                children.retain(|&c| c != idx);
                if children.is_empty() {
                    parent.resource.has_children = false;
                }
            }
        }
        self.free_subtree(idx);
        Some(resource)
    }

    /// Rewrite the node at `from` with `resource` (same parent, new name).
    ///
    /// The node keeps its `NodeIndex`, expansion flag and cached children;
    /// descendants are re-keyed under the new path. Returns `None` when `from`
    /// is unknown, the parent differs, or the new path is already taken.
    pub fn rename_in_place(&mut self, from: &ResourcePath, resource: Resource) -> Option<NodeIndex> {
        let to = resource.path.clone();
        if from.is_root() || to.parent() != from.parent() {
            return None;
        }
        let idx = self.lookup(from)?;
        if to != *from && self.contains(&to) {
            return None;
        }

        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node_mut(current) else {
                continue;
            };
            let old_path = node.resource.path.clone();
            let new_path = if current == idx {
                to.clone()
            } else {
                old_path.rebase(from, &to).unwrap_or_else(|| old_path.clone())
            };
            node.resource.path = new_path.clone();
            if let Some(children) = node.children.as_ref() {
                stack.extend(children.iter().copied());
            }
            self.index.remove(&old_path);
            self.index.insert(new_path, current);
        }

        if let Some(node) = self.node_mut(idx) {
            let path = node.resource.path.clone();
            node.resource = Resource { path, ..resource };
        }
        Some(idx)
    }
}
