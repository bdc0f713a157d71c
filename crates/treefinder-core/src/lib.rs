/// TreeFinder Core — clipboard, transfer and tree engine for a file browser.
///
/// This crate contains all browsing logic with zero front-end dependencies.
/// A front end (the bundled shell, or anything else) drives a
/// [`browser::FileBrowser`] per drive and renders its shared tree.
///
/// # Modules
///
/// - [`model`] — Paths, resources and the arena-backed resource tree.
/// - [`backend`] — Async content backends (in-memory and local disk).
/// - [`browser`] — Per-drive facade: copy/cut/paste/delete, rename,
///   create-folder, refresh, download, copy-path.
/// - [`clipboard`] — The pending copy/cut buffer and paste naming.
/// - [`commands`] — Named commands and their enablement queries.
/// - [`drives`] — Drive registry mounting backends from `NAME=URL` specs.
/// - [`settings`] — Persisted column visibility.
pub mod backend;
pub mod batch;
pub mod browser;
pub mod clipboard;
pub mod commands;
pub mod download;
pub mod drives;
pub mod error;
pub mod events;
pub mod model;
pub mod refresh;
pub mod rename;
pub mod selection;
pub mod settings;
