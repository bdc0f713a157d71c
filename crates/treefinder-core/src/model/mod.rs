/// Data model for the browsable resource tree.
///
/// Re-exports the path type, resources, and the arena-backed tree.
pub mod path;
pub mod resource;
pub mod tree;

pub use path::ResourcePath;
pub use resource::{DriveId, Metadata, NodeIndex, Resource, ResourceKind, ResourceNode};
pub use tree::{ResourceTree, SharedTree};
