/// Refresh planning.
///
/// Decides which directory listings must be fetched again. The fetching
/// itself happens in the browser, which merges each listing back into the
/// tree so retained nodes keep their identity and expansion state.
use crate::model::{ResourcePath, ResourceTree};

/// Containers to re-list after changes under `selected`: the parent of each
/// selected item, deduplicated, in selection order. Parents the tree no
/// longer knows are skipped.
pub fn selection_targets(tree: &ResourceTree, selected: &[ResourcePath]) -> Vec<ResourcePath> {
    let mut targets: Vec<ResourcePath> = Vec::new();
    for path in selected {
        let parent = path.parent();
        if tree.contains(&parent) && !targets.contains(&parent) {
            targets.push(parent);
        }
    }
    targets
}

/// Containers to re-list for a whole-tree refresh: the root plus every
/// expanded, fetched directory, parents first.
pub fn full_targets(tree: &ResourceTree) -> Vec<ResourcePath> {
    let mut targets = vec![ResourcePath::root()];
    targets.extend(
        tree.expanded_paths()
            .into_iter()
            .filter(|path| !path.is_root()),
    );
    targets
}
