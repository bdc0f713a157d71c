/// End-to-end tests for `ShellState` — the shell session.
///
/// Sessions are opened over a `LocalBackend` on a temporary directory (the
/// default drive) plus `mem://` drives mounted through the registry, and
/// driven purely through `execute` the way the binary drives them.
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use treefinder_core::backend::{ContentBackend, LocalBackend};
use treefinder_core::drives::{drive_id_for, DriveSpec};
use treefinder_core::model::{DriveId, ResourcePath};
use treefinder_core::settings::{Column, ColumnSettings};
use treefinder_shell::{ShellConfig, ShellState};

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn open(tmp: &TempDir, drives: Vec<DriveSpec>) -> ShellState {
    let root: Arc<dyn ContentBackend> =
        Arc::new(LocalBackend::new(tmp.path().join("root"), DriveId::root()));
    ShellState::open(
        root,
        ShellConfig {
            drives,
            settings_path: Some(tmp.path().join("settings.json")),
            download_dir: tmp.path().join("downloads"),
        },
    )
    .await
    .unwrap()
}

/// Session workspace. The default drive is `root/`; settings and downloads
/// live beside it.
///
/// ```text
/// root/
///   docs/
///     readme.md
///   notes.txt
/// ```
fn workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs/readme.md"), b"# readme").unwrap();
    fs::write(root.join("notes.txt"), b"notes").unwrap();
    tmp
}

fn mem(name: &str) -> DriveSpec {
    DriveSpec {
        name: name.to_string(),
        url: format!("mem://{name}"),
    }
}

// ── Listing ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ls_shows_root_listing() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![]).await;
    let out = shell.execute("ls").await.unwrap();
    assert!(out.contains("docs/"));
    assert!(out.contains("notes.txt"));
    assert!(!out.contains("readme.md"));

    let out = shell.execute("expand docs").await.unwrap();
    assert!(out.contains("readme.md"));
    let out = shell.execute("collapse docs").await.unwrap();
    assert!(!out.contains("readme.md"));
}

#[tokio::test]
async fn unknown_command_is_an_error() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![]).await;
    assert!(shell.execute("launch rockets").await.is_err());
    assert!(shell.execute("help").await.unwrap().contains("paste"));
}

// ── Command enablement ────────────────────────────────────────────────────────

#[tokio::test]
async fn disabled_commands_are_reported_not_run() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![]).await;

    let out = shell.execute("paste").await.unwrap();
    assert_eq!(out, "Paste is not available right now");

    shell.execute("select docs").await.unwrap();
    let out = shell.execute("copy").await.unwrap();
    assert_eq!(out, "Copy is not available right now");
    assert!(shell.clipboard().lock().is_empty());

    let out = shell.execute("commands").await.unwrap();
    let copy_line = out
        .lines()
        .find(|l| l.starts_with("treefinder:copy "))
        .unwrap();
    assert!(copy_line.ends_with("disabled"));
}

// ── Transfers ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn copy_paste_on_disk() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![]).await;

    shell.execute("select notes.txt").await.unwrap();
    assert_eq!(shell.execute("copy").await.unwrap(), "copied 1 item(s)");
    let out = shell.execute("paste docs").await.unwrap();
    assert_eq!(out, "pasted into 'docs': 1 ok, 0 failed");
    let out = shell.execute("paste docs").await.unwrap();
    assert_eq!(out, "pasted into 'docs': 1 ok, 0 failed");

    assert!(tmp.path().join("root/docs/notes.txt").is_file());
    assert!(tmp.path().join("root/docs/notes-1.txt").is_file());
    assert!(shell.events_seen > 0);
}

#[tokio::test]
async fn cut_paste_defaults_to_selection_directory() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![]).await;

    shell.execute("select docs/readme.md").await.unwrap();
    shell.execute("cut").await.unwrap();
    // No target given: paste lands in the selected file's directory.
    shell.execute("select notes.txt").await.unwrap();
    let out = shell.execute("paste").await.unwrap();
    assert!(out.starts_with("pasted into '/'"), "{out}");
    assert!(tmp.path().join("root/readme.md").is_file());
    assert!(!tmp.path().join("root/docs/readme.md").exists());
    assert!(shell.clipboard().lock().is_empty());
}

#[tokio::test]
async fn delete_and_rename_flow() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![]).await;

    shell.execute("select notes.txt").await.unwrap();
    shell.execute("rename").await.unwrap();
    let err = shell.execute("name docs").await.unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(shell.execute("name todo.txt").await.unwrap(), "renamed to 'todo.txt'");
    assert!(tmp.path().join("root/todo.txt").is_file());

    let out = shell.execute("delete").await.unwrap();
    assert_eq!(out, "deleted: 1 ok, 0 failed");
    assert!(!tmp.path().join("root/todo.txt").exists());
}

#[tokio::test]
async fn mkdir_then_name() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![]).await;
    let out = shell.execute("mkdir").await.unwrap();
    assert!(out.starts_with("created 'Untitled Folder'"));
    shell.execute("name reports").await.unwrap();
    assert!(tmp.path().join("root/reports").is_dir());
}

#[tokio::test]
async fn download_writes_files_and_archives() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![]).await;
    shell.execute("select notes.txt docs").await.unwrap();
    let out = shell.execute("download").await.unwrap();
    assert_eq!(out.lines().count(), 2);

    let downloads = tmp.path().join("downloads");
    assert_eq!(fs::read(downloads.join("notes.txt")).unwrap(), b"notes");
    let zip = fs::read(downloads.join("docs.zip")).unwrap();
    assert!(zip.starts_with(b"PK"));
}

#[tokio::test]
async fn download_keeps_same_named_files_apart() {
    let tmp = workspace();
    fs::write(tmp.path().join("root/docs/notes.txt"), b"docs notes").unwrap();
    let mut shell = open(&tmp, vec![]).await;
    shell.execute("select notes.txt docs/notes.txt").await.unwrap();
    let out = shell.execute("download").await.unwrap();
    assert_eq!(out.lines().count(), 2);

    let downloads = tmp.path().join("downloads");
    assert_eq!(fs::read(downloads.join("notes.txt")).unwrap(), b"notes");
    assert_eq!(fs::read(downloads.join("notes-1.txt")).unwrap(), b"docs notes");
}

#[tokio::test]
async fn copy_path_on_default_and_mounted_drive() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![mem("scratch")]).await;

    shell.execute("select docs/readme.md").await.unwrap();
    assert_eq!(shell.execute("path").await.unwrap(), "docs/readme.md");

    shell.execute("use scratch").await.unwrap();
    shell.execute("mkdir").await.unwrap();
    shell.execute("cancel").await.unwrap();
    let id = drive_id_for("mem://scratch");
    assert_eq!(
        shell.execute("path").await.unwrap(),
        format!("{id}:Untitled Folder")
    );
}

// ── Drives ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn paste_across_drives_is_refused() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![mem("scratch")]).await;
    shell.execute("select notes.txt").await.unwrap();
    shell.execute("copy").await.unwrap();

    shell.execute("use scratch").await.unwrap();
    let err = shell.execute("paste /").await.unwrap_err();
    assert!(err.to_string().contains("unsupported operation"));
}

#[tokio::test]
async fn mount_keeps_existing_browsers() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![mem("a")]).await;
    shell.execute("use a").await.unwrap();
    shell.execute("mkdir").await.unwrap();
    shell.execute("cancel").await.unwrap();

    let out = shell.execute("mount b=mem://b").await.unwrap();
    assert!(out.contains("b ["));
    assert_eq!(shell.active_drive(), &drive_id_for("mem://a"));
    assert!(shell
        .browser()
        .unwrap()
        .tree()
        .read()
        .contains(&ResourcePath::parse("Untitled Folder")));

    shell.execute("use b").await.unwrap();
    shell.execute("mount c=mem://c").await.unwrap();
    assert!(shell.active_drive().is_root());
    assert!(shell.execute("use b").await.is_err());
}

#[tokio::test]
async fn mount_keeps_configured_drives() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![mem("cfg")]).await;

    let out = shell.execute("mount extra=mem://extra").await.unwrap();
    assert!(out.contains("cfg ["), "{out}");
    assert!(out.contains("extra ["), "{out}");
    shell.execute("use cfg").await.unwrap();

    let out = shell.execute("mount").await.unwrap();
    assert!(out.contains("cfg ["), "{out}");
    assert!(!out.contains("extra ["), "{out}");
}

// ── Columns ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn toggle_column_persists() {
    let tmp = workspace();
    let mut shell = open(&tmp, vec![]).await;
    assert!(shell.columns.is_visible(Column::Size));

    assert_eq!(
        shell.execute("toggle mimetype").await.unwrap(),
        "column 'mimetype' shown"
    );
    assert!(shell.execute("toggle colour").await.is_err());

    let saved = ColumnSettings::load(&tmp.path().join("settings.json")).unwrap();
    assert_eq!(saved.visible(), vec![Column::Size, Column::Mimetype]);

    let out = shell.execute("ls").await.unwrap();
    assert!(out.contains("text/plain"));

    let reopened = open(&tmp, vec![]).await;
    assert_eq!(reopened.columns, saved);
}
