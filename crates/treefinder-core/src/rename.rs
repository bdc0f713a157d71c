/// Rename state machine: `Idle → Editing → Committing → Idle`.
///
/// The session only tracks state and validates names. The backend call and
/// the in-place tree update are done by the browser between `submit` and
/// `finish`/`fail`.
use crate::error::{BrowserError, Result};
use crate::model::{Resource, ResourcePath, ResourceTree};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RenameState {
    #[default]
    Idle,
    Editing {
        target: ResourcePath,
    },
    Committing {
        target: ResourcePath,
        proposed: String,
    },
}

/// A validated rename ready to be sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    pub target: ResourcePath,
    pub proposed_name: String,
}

impl RenameRequest {
    pub fn destination(&self) -> ResourcePath {
        self.target.with_name(&self.proposed_name)
    }

    /// Submitting the current name changes nothing.
    pub fn is_noop(&self) -> bool {
        self.target.name() == self.proposed_name
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenameSession {
    state: RenameState,
}

impl RenameSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RenameState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RenameState::Idle
    }

    /// Target currently being edited, if any.
    pub fn editing(&self) -> Option<&ResourcePath> {
        match &self.state {
            RenameState::Editing { target } => Some(target),
            _ => None,
        }
    }

    /// Whether `begin` would accept this selection.
    pub fn can_begin(selected: &[Resource]) -> bool {
        matches!(selected, [only] if only.writable && !only.path.is_root())
    }

    /// Start editing the single selected item. Restarting while already
    /// editing switches the target; a commit in flight blocks a new rename.
    pub fn begin(&mut self, selected: &[Resource]) -> Result<ResourcePath> {
        if matches!(self.state, RenameState::Committing { .. }) {
            return Err(BrowserError::UnsupportedOperation(
                "a rename is already being committed".into(),
            ));
        }
        let target = match selected {
            [only] => only,
            _ => {
                return Err(BrowserError::UnsupportedOperation(format!(
                    "rename needs exactly one item, {} selected",
                    selected.len()
                )))
            }
        };
        if !target.writable || target.path.is_root() {
            return Err(BrowserError::PermissionDenied(target.path.clone()));
        }
        self.state = RenameState::Editing {
            target: target.path.clone(),
        };
        Ok(target.path.clone())
    }

    /// Validate `name` against the target's siblings and move to
    /// `Committing`. Invalid names leave the session in `Editing`.
    pub fn submit(&mut self, tree: &ResourceTree, name: &str) -> Result<RenameRequest> {
        let RenameState::Editing { target } = &self.state else {
            return Err(BrowserError::UnsupportedOperation(
                "no rename in progress".into(),
            ));
        };
        if !tree.contains(target) {
            let gone = target.clone();
            self.state = RenameState::Idle;
            return Err(BrowserError::NotFound(gone));
        }
        validate_name(tree, target, name)?;
        let request = RenameRequest {
            target: target.clone(),
            proposed_name: name.to_string(),
        };
        self.state = RenameState::Committing {
            target: request.target.clone(),
            proposed: request.proposed_name.clone(),
        };
        Ok(request)
    }

    /// Backend confirmed the rename.
    pub fn finish(&mut self) {
        self.state = RenameState::Idle;
    }

    /// Backend refused the rename; go back to editing the same target.
    pub fn fail(&mut self) {
        if let RenameState::Committing { target, .. } = &self.state {
            self.state = RenameState::Editing {
                target: target.clone(),
            };
        }
    }

    /// Abandon an edit. A commit in flight is not interrupted.
    pub fn cancel(&mut self) {
        if matches!(self.state, RenameState::Editing { .. }) {
            self.state = RenameState::Idle;
        }
    }

    /// Drop an edit whose target at or under `path` is gone.
    pub fn forget(&mut self, path: &ResourcePath) {
        if self.editing().is_some_and(|target| target.starts_with(path)) {
            self.state = RenameState::Idle;
        }
    }

    /// Follow a path change made by some other operation.
    pub fn rebase(&mut self, from: &ResourcePath, to: &ResourcePath) {
        if let RenameState::Editing { target } | RenameState::Committing { target, .. } =
            &mut self.state
        {
            if let Some(moved) = target.rebase(from, to) {
                *target = moved;
            }
        }
    }
}

/// Check a proposed name for `target`: non-empty, a single path segment, and
/// not already used by a sibling. Keeping the current name is allowed.
pub fn validate_name(tree: &ResourceTree, target: &ResourcePath, name: &str) -> Result<()> {
    if name.trim().is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(BrowserError::InvalidName(name.to_string()));
    }
    if name == target.name() {
        return Ok(());
    }
    let parent = target.parent();
    if tree.has_child(&parent, name) {
        return Err(BrowserError::NameConflict {
            name: name.to_string(),
            parent,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DriveId;

    fn tree() -> ResourceTree {
        let drive = DriveId::new("r");
        let mut tree = ResourceTree::new(drive.clone());
        tree.merge_children(
            &ResourcePath::root(),
            vec![
                Resource::file(drive.clone(), ResourcePath::parse("a.txt")),
                Resource::file(drive.clone(), ResourcePath::parse("b.txt")),
                Resource::file(drive, ResourcePath::parse("locked.txt")).read_only(),
            ],
        );
        tree
    }

    fn selected(tree: &ResourceTree, path: &str) -> Vec<Resource> {
        vec![tree.resolve(&ResourcePath::parse(path)).unwrap().clone()]
    }

    #[test]
    fn test_full_cycle() {
        let tree = tree();
        let mut session = RenameSession::new();
        session.begin(&selected(&tree, "a.txt")).unwrap();
        assert_eq!(session.editing(), Some(&ResourcePath::parse("a.txt")));

        let request = session.submit(&tree, "c.txt").unwrap();
        assert_eq!(request.destination(), ResourcePath::parse("c.txt"));
        assert!(matches!(session.state(), RenameState::Committing { .. }));

        session.finish();
        assert!(session.is_idle());
    }

    #[test]
    fn test_multi_item_rejected() {
        let tree = tree();
        let mut both = selected(&tree, "a.txt");
        both.extend(selected(&tree, "b.txt"));
        let mut session = RenameSession::new();
        assert!(matches!(
            session.begin(&both),
            Err(BrowserError::UnsupportedOperation(_))
        ));
        assert!(session.is_idle());
    }

    #[test]
    fn test_read_only_rejected() {
        let tree = tree();
        let mut session = RenameSession::new();
        assert_eq!(
            session.begin(&selected(&tree, "locked.txt")),
            Err(BrowserError::PermissionDenied(ResourcePath::parse("locked.txt")))
        );
    }

    #[test]
    fn test_conflict_keeps_editing() {
        let tree = tree();
        let mut session = RenameSession::new();
        session.begin(&selected(&tree, "a.txt")).unwrap();
        let err = session.submit(&tree, "b.txt").unwrap_err();
        assert!(matches!(err, BrowserError::NameConflict { .. }));
        assert_eq!(session.editing(), Some(&ResourcePath::parse("a.txt")));

        assert!(matches!(
            session.submit(&tree, "  "),
            Err(BrowserError::InvalidName(_))
        ));
        assert!(matches!(
            session.submit(&tree, "x/y"),
            Err(BrowserError::InvalidName(_))
        ));
    }

    #[test]
    fn test_fail_returns_to_editing() {
        let tree = tree();
        let mut session = RenameSession::new();
        session.begin(&selected(&tree, "a.txt")).unwrap();
        session.submit(&tree, "z.txt").unwrap();
        session.fail();
        assert_eq!(session.editing(), Some(&ResourcePath::parse("a.txt")));
        session.cancel();
        assert!(session.is_idle());
    }

    #[test]
    fn test_forget_drops_edit_under_deleted_path() {
        let tree = tree();
        let mut session = RenameSession::new();
        session.begin(&selected(&tree, "a.txt")).unwrap();
        session.forget(&ResourcePath::parse("b.txt"));
        assert!(!session.is_idle());
        session.forget(&ResourcePath::parse("a.txt"));
        assert!(session.is_idle());
    }

    #[test]
    fn test_same_name_is_noop() {
        let tree = tree();
        let mut session = RenameSession::new();
        session.begin(&selected(&tree, "a.txt")).unwrap();
        assert!(session.submit(&tree, "a.txt").unwrap().is_noop());
    }
}
