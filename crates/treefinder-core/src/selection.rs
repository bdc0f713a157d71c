/// The set of resources the user has marked, by path.
///
/// Ordered by selection time, unique by path. Holds no node references;
/// callers re-resolve against the tree after every mutation.
use crate::model::{Resource, ResourcePath, ResourceTree};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    paths: Vec<ResourcePath>,
}

impl Selection {
    /// An empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with `paths` (duplicates collapse, first wins).
    pub fn set<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = ResourcePath>,
    {
        self.paths.clear();
        for path in paths {
            self.add(path);
        }
    }

    /// Append `path` unless already selected.
    pub fn add(&mut self, path: ResourcePath) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Add or remove `path`.
    pub fn toggle(&mut self, path: ResourcePath) {
        match self.paths.iter().position(|p| *p == path) {
            Some(pos) => {
                self.paths.remove(pos);
            }
            None => self.paths.push(path),
        }
    }

    /// Unselect `path`.
    pub fn remove(&mut self, path: &ResourcePath) {
        self.paths.retain(|p| p != path);
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Selected paths, oldest first.
    pub fn paths(&self) -> &[ResourcePath] {
        &self.paths
    }

    /// Most recently selected path.
    pub fn last(&self) -> Option<&ResourcePath> {
        self.paths.last()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &ResourcePath) -> bool {
        self.paths.contains(path)
    }

    /// Resources for every selected path still present in `tree`, in order.
    pub fn resolve(&self, tree: &ResourceTree) -> Vec<Resource> {
        self.paths
            .iter()
            .filter_map(|p| tree.resolve(p).cloned())
            .collect()
    }

    /// Drop selected paths that no longer resolve.
    pub fn retain_existing(&mut self, tree: &ResourceTree) {
        self.paths.retain(|p| tree.contains(p));
    }

    /// Rewrite paths at or under `from` so they point under `to`.
    pub fn rebase(&mut self, from: &ResourcePath, to: &ResourcePath) {
        for path in self.paths.iter_mut() {
            if let Some(moved) = path.rebase(from, to) {
                *path = moved;
            }
        }
    }
}

/// `paths` without any entry that lies under another entry, order kept.
///
/// A batch over a directory already covers everything beneath it.
pub fn topmost(paths: &[ResourcePath]) -> Vec<ResourcePath> {
    paths
        .iter()
        .filter(|path| {
            !paths
                .iter()
                .any(|other| other != *path && path.starts_with(other))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DriveId;

    #[test]
    fn test_unique_and_ordered() {
        let mut sel = Selection::new();
        sel.set([
            ResourcePath::parse("b"),
            ResourcePath::parse("a"),
            ResourcePath::parse("b"),
        ]);
        assert_eq!(sel.paths(), &[ResourcePath::parse("b"), ResourcePath::parse("a")]);
        assert_eq!(sel.last(), Some(&ResourcePath::parse("a")));

        sel.toggle(ResourcePath::parse("b"));
        assert_eq!(sel.paths(), &[ResourcePath::parse("a")]);
    }

    #[test]
    fn test_resolve_skips_stale_paths() {
        let drive = DriveId::new("s");
        let mut tree = ResourceTree::new(drive.clone());
        tree.merge_children(
            &ResourcePath::root(),
            vec![Resource::file(drive, ResourcePath::parse("x.txt"))],
        );

        let mut sel = Selection::new();
        sel.set([ResourcePath::parse("gone.txt"), ResourcePath::parse("x.txt")]);
        let resolved = sel.resolve(&tree);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "x.txt");

        sel.retain_existing(&tree);
        assert_eq!(sel.len(), 1);
    }

    #[test]
    fn test_rebase_follows_rename() {
        let mut sel = Selection::new();
        sel.set([ResourcePath::parse("d/a.txt"), ResourcePath::parse("other")]);
        sel.rebase(&ResourcePath::parse("d"), &ResourcePath::parse("e"));
        assert!(sel.contains(&ResourcePath::parse("e/a.txt")));
        assert!(sel.contains(&ResourcePath::parse("other")));
    }

    #[test]
    fn test_topmost_drops_nested_paths() {
        let paths = [
            ResourcePath::parse("a/b.txt"),
            ResourcePath::parse("c"),
            ResourcePath::parse("a"),
            ResourcePath::parse("ab"),
        ];
        assert_eq!(
            topmost(&paths),
            vec![
                ResourcePath::parse("c"),
                ResourcePath::parse("a"),
                ResourcePath::parse("ab"),
            ]
        );
    }
}
