/// Segment-based resource paths.
///
/// A `ResourcePath` is the ordered list of names from the drive root down to
/// an entry. The empty path is the root itself. Paths are the only way the
/// selection and clipboard refer to tree nodes, so they must stay cheap to
/// clone and hash.
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourcePath(Vec<CompactString>);

impl ResourcePath {
    /// The drive root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from already-split segments. Empty segments are dropped.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            segments
                .into_iter()
                .filter(|s| !s.as_ref().is_empty())
                .map(|s| CompactString::new(s.as_ref()))
                .collect(),
        )
    }

    /// Parse a `/`-separated path. Leading, trailing and doubled slashes are
    /// ignored, so `"/a//b/"` and `"a/b"` are the same path.
    pub fn parse(text: &str) -> Self {
        Self::from_segments(text.split('/'))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[CompactString] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Last segment, or `""` for the root.
    pub fn name(&self) -> &str {
        self.0.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// Path of the containing directory. The root is its own parent.
    pub fn parent(&self) -> ResourcePath {
        let mut segments = self.0.clone();
        segments.pop();
        Self(segments)
    }

    /// Child path `self/name`.
    pub fn join(&self, name: &str) -> ResourcePath {
        let mut segments = self.0.clone();
        segments.push(CompactString::new(name));
        Self(segments)
    }

    /// Same parent, different last segment.
    pub fn with_name(&self, name: &str) -> ResourcePath {
        self.parent().join(name)
    }

    /// `true` if `self` is `prefix` or lies underneath it.
    pub fn starts_with(&self, prefix: &ResourcePath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Replace a leading `from` prefix with `to`. Returns `None` when `self`
    /// is not under `from`.
    pub fn rebase(&self, from: &ResourcePath, to: &ResourcePath) -> Option<ResourcePath> {
        if !self.starts_with(from) {
            return None;
        }
        let mut segments = to.0.clone();
        segments.extend(self.0[from.0.len()..].iter().cloned());
        Some(Self(segments))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalises_slashes() {
        let p = ResourcePath::parse("/a//b/");
        assert_eq!(p, ResourcePath::from_segments(["a", "b"]));
        assert_eq!(p.to_string(), "a/b");
        assert!(ResourcePath::parse("/").is_root());
    }

    #[test]
    fn test_parent_and_name() {
        let p = ResourcePath::parse("a/b/c.txt");
        assert_eq!(p.name(), "c.txt");
        assert_eq!(p.parent(), ResourcePath::parse("a/b"));
        assert_eq!(ResourcePath::root().parent(), ResourcePath::root());
        assert_eq!(p.with_name("d.txt"), ResourcePath::parse("a/b/d.txt"));
    }

    #[test]
    fn test_rebase() {
        let p = ResourcePath::parse("a/b/c.txt");
        let moved = p
            .rebase(&ResourcePath::parse("a/b"), &ResourcePath::parse("x"))
            .unwrap();
        assert_eq!(moved, ResourcePath::parse("x/c.txt"));
        assert!(p.rebase(&ResourcePath::parse("z"), &ResourcePath::root()).is_none());
        // Prefix must match whole segments.
        assert!(!ResourcePath::parse("ab/c").starts_with(&ResourcePath::parse("a")));
    }
}
