/// TreeFinder Shell — line-oriented front end.
///
/// This crate contains the session state and text rendering. Browsing logic
/// lives in `treefinder-core`.
pub mod format;
pub mod state;
pub mod view;

pub use state::{ShellConfig, ShellState};
