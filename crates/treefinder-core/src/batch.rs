/// Aggregate outcome of a multi-item operation (paste, delete).
///
/// Items are attempted independently; successes stay applied even when other
/// items fail. There is no rollback.
use crate::error::BackendError;
use crate::model::{Resource, ResourcePath};
use futures::future::join_all;
use std::future::Future;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Source path of each item that went through, with the resulting
    /// resource when the operation produces one (paste) or `None` (delete).
    pub succeeded: Vec<(ResourcePath, Option<Resource>)>,
    /// Source path of each item that failed, with the backend's reason.
    pub failed: Vec<(ResourcePath, BackendError)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeeded_paths(&self) -> impl Iterator<Item = &ResourcePath> {
        self.succeeded.iter().map(|(p, _)| p)
    }

    pub fn failure_for(&self, path: &ResourcePath) -> Option<&BackendError> {
        self.failed.iter().find(|(p, _)| p == path).map(|(_, e)| e)
    }
}

/// Run one future per item concurrently and wait for all of them to settle.
/// Results come back in input order, paired with their item.
pub async fn settle_all<T, R, F, Fut>(items: Vec<T>, op: F) -> Vec<(T, R)>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let results = join_all(items.iter().cloned().map(op)).await;
    items.into_iter().zip(results).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settle_all_keeps_input_order() {
        let settled = settle_all(vec![3u64, 1, 2], |n| async move {
            tokio::time::sleep(std::time::Duration::from_millis(n * 5)).await;
            n * 10
        })
        .await;
        assert_eq!(settled, vec![(3, 30), (1, 10), (2, 20)]);
    }

    #[test]
    fn test_failure_lookup() {
        let report = BatchReport {
            succeeded: vec![(ResourcePath::parse("a"), None)],
            failed: vec![(
                ResourcePath::parse("b"),
                BackendError::NotFound(ResourcePath::parse("b")),
            )],
        };
        assert!(!report.is_complete());
        assert!(report.failure_for(&ResourcePath::parse("b")).is_some());
        assert!(report.failure_for(&ResourcePath::parse("a")).is_none());
        assert_eq!(report.succeeded_paths().count(), 1);
    }
}
