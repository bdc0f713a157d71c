/// Shell session state.
///
/// Holds one `FileBrowser` per mounted drive, all sharing a single clipboard,
/// plus the column settings and the event receiver the browsers report to.
/// `execute` parses one command line, checks the command layer's enablement
/// for browser actions, runs the action, and returns the text to print.
use crate::format::display_path;
use crate::view::{render, visible_rows};
use anyhow::{anyhow, bail, Context};
use crossbeam_channel::{Receiver, Sender};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use treefinder_core::backend::ContentBackend;
use treefinder_core::batch::BatchReport;
use treefinder_core::browser::FileBrowser;
use treefinder_core::clipboard::{disambiguate, Clipboard, SharedClipboard};
use treefinder_core::commands::Command;
use treefinder_core::drives::{DriveRegistry, DriveSpec};
use treefinder_core::events::{self, BrowserEvent};
use treefinder_core::model::{DriveId, ResourcePath};
use treefinder_core::rename::RenameState;
use treefinder_core::settings::{Column, ColumnSettings};

/// Maximum browser events drained after one command.
///
/// Anything beyond this stays queued for the next command.
const MAX_EVENTS_PER_COMMAND: usize = 500;

const HELP: &str = "\
drives                 list mounted drives
mount NAME=URL...      replace the runtime drives (mem://, osfs://, file://)
use <drive>            switch to a drive by name or id (\"\" or / for the default)
ls                     show the tree
expand <path>          expand a directory
collapse <path>        collapse a directory
select <path>...       replace the selection
add <path>             add to the selection
clear                  clear the selection
copy | cut             stage the selection on the clipboard
paste [dir]            paste into dir (default: the selection's directory)
delete                 delete the selection
rename                 start renaming the selected item
name <new name>        commit the rename
cancel                 abandon the rename
mkdir                  create a new folder
refresh [all]          re-list the selection's directories, or everything
download               save the selection to the download directory
path                   print the selected item's path
columns                list columns
toggle <column>        show or hide a column
commands               list commands and whether they are available
help                   this text";

/// Startup options for a shell session.
#[derive(Debug, Clone, Default)]
pub struct ShellConfig {
    pub drives: Vec<DriveSpec>,
    pub settings_path: Option<PathBuf>,
    pub download_dir: PathBuf,
}

pub struct ShellState {
    registry: DriveRegistry,
    /// Drives from startup configuration; every `mount` keeps them.
    config_drives: Vec<DriveSpec>,
    browsers: BTreeMap<DriveId, FileBrowser>,
    active: DriveId,
    clipboard: SharedClipboard,
    pub columns: ColumnSettings,
    settings_path: Option<PathBuf>,
    download_dir: PathBuf,
    events_tx: Sender<BrowserEvent>,
    events_rx: Receiver<BrowserEvent>,
    /// Events drained since the session started.
    pub events_seen: u64,
}

impl ShellState {
    /// Mount the configured drives and list each drive's root.
    pub async fn open(root: Arc<dyn ContentBackend>, config: ShellConfig) -> anyhow::Result<Self> {
        let columns = match &config.settings_path {
            Some(path) => ColumnSettings::load(path)
                .with_context(|| format!("reading settings {}", path.display()))?,
            None => ColumnSettings::default(),
        };
        let (events_tx, events_rx) = events::channel();
        let mut state = Self {
            registry: DriveRegistry::new(root),
            config_drives: config.drives,
            browsers: BTreeMap::new(),
            active: DriveId::root(),
            clipboard: Clipboard::shared(),
            columns,
            settings_path: config.settings_path,
            download_dir: config.download_dir,
            events_tx,
            events_rx,
            events_seen: 0,
        };
        state.mount(&[]).await?;
        Ok(state)
    }

    /// Mount the configured drives followed by `specs`, replacing any drives
    /// mounted by an earlier call. Browsers of drives that stay mounted keep
    /// their tree and selection.
    pub async fn mount(&mut self, specs: &[DriveSpec]) -> anyhow::Result<()> {
        let all: Vec<DriveSpec> = self
            .config_drives
            .iter()
            .chain(specs)
            .cloned()
            .collect();
        self.registry.init_resources(&all)?;
        let drives = self.registry.drives();
        self.browsers.retain(|drive, _| drives.contains(drive));

        for drive in drives {
            if self.browsers.contains_key(&drive) {
                continue;
            }
            let backend = self
                .registry
                .backend(&drive)
                .ok_or_else(|| anyhow!("drive '{drive}' has no backend"))?;
            let browser = FileBrowser::new(drive.clone(), backend)
                .with_clipboard(Arc::clone(&self.clipboard))
                .with_events(self.events_tx.clone());
            if let Err(err) = browser.load(&ResourcePath::root()).await {
                warn!("cannot list root of drive '{}': {}", drive, err);
            }
            self.browsers.insert(drive, browser);
        }

        if !self.browsers.contains_key(&self.active) {
            self.active = DriveId::root();
        }
        info!("{} drive(s) mounted", self.browsers.len());
        Ok(())
    }

    pub fn active_drive(&self) -> &DriveId {
        &self.active
    }

    pub fn browser(&self) -> anyhow::Result<&FileBrowser> {
        self.browsers
            .get(&self.active)
            .ok_or_else(|| anyhow!("drive '{}' is not mounted", self.active))
    }

    pub fn clipboard(&self) -> SharedClipboard {
        Arc::clone(&self.clipboard)
    }

    /// Pull pending browser events off the channel.
    pub fn drain_events(&mut self) -> Vec<BrowserEvent> {
        let drained: Vec<BrowserEvent> = self
            .events_rx
            .try_iter()
            .take(MAX_EVENTS_PER_COMMAND)
            .collect();
        self.events_seen += drained.len() as u64;
        drained
    }

    /// Run one command line and return its output.
    pub async fn execute(&mut self, line: &str) -> anyhow::Result<String> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let output = match word {
            "" => String::new(),
            "help" => HELP.to_string(),
            "drives" => self.list_drives(),
            "mount" => {
                let specs = args
                    .iter()
                    .map(|a| DriveSpec::parse(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.mount(&specs).await?;
                self.list_drives()
            }
            "use" => self.use_drive(rest).await?,
            "ls" => self.ls()?,
            "expand" => {
                let path = self.reveal(one_arg(&args, "expand <path>")?).await?;
                self.browser()?.expand(&path).await?;
                self.ls()?
            }
            "collapse" => {
                let path = ResourcePath::parse(one_arg(&args, "collapse <path>")?);
                self.browser()?.collapse(&path)?;
                self.ls()?
            }
            "select" => {
                if args.is_empty() {
                    bail!("usage: select <path>...");
                }
                let mut paths = Vec::with_capacity(args.len());
                for arg in &args {
                    paths.push(self.reveal(arg).await?);
                }
                self.browser()?.select(&paths)?;
                self.describe_selection()?
            }
            "add" => {
                let path = self.reveal(one_arg(&args, "add <path>")?).await?;
                self.browser()?.add_to_selection(&path)?;
                self.describe_selection()?
            }
            "clear" => {
                self.browser()?.clear_selection();
                "selection cleared".to_string()
            }
            "copy" => self.run(Command::Copy, &args).await?,
            "cut" => self.run(Command::Cut, &args).await?,
            "paste" => self.run(Command::Paste, &args).await?,
            "delete" => self.run(Command::Delete, &args).await?,
            "rename" => self.run(Command::Rename, &args).await?,
            "download" => self.run(Command::Download, &args).await?,
            "mkdir" => self.run(Command::CreateFolder, &args).await?,
            "refresh" => self.run(Command::Refresh, &args).await?,
            "path" => self.run(Command::CopyPath, &args).await?,
            "toggle" => {
                let column: Column = one_arg(&args, "toggle <column>")?
                    .parse()
                    .map_err(|e: String| anyhow!(e))?;
                self.run(Command::ToggleColumn(column), &args).await?
            }
            "name" => {
                if rest.is_empty() {
                    bail!("usage: name <new name>");
                }
                let renamed = self.browser()?.submit_rename(rest).await?;
                format!("renamed to '{}'", display_path(&renamed.path))
            }
            "cancel" => {
                self.browser()?.cancel_rename();
                "rename cancelled".to_string()
            }
            "columns" => self.list_columns(),
            "commands" => self.list_commands()?,
            other => bail!("unknown command '{other}' (try `help`)"),
        };

        for event in self.drain_events() {
            debug!("event: {:?}", event);
        }
        Ok(output)
    }

    /// Run a browser action if the command layer says it is available.
    async fn run(&mut self, command: Command, args: &[&str]) -> anyhow::Result<String> {
        let ctx = self.browser()?.command_context(&self.columns);
        if !command.is_enabled(&ctx) {
            return Ok(format!("{} is not available right now", command.label()));
        }

        match command {
            Command::Copy => {
                self.browser()?.copy_selection()?;
                Ok(format!("copied {} item(s)", ctx.selected.len()))
            }
            Command::Cut => {
                self.browser()?.cut_selection()?;
                Ok(format!("cut {} item(s)", ctx.selected.len()))
            }
            Command::Paste => {
                let target = match args.first() {
                    Some(arg) => self.reveal(arg).await?,
                    None => self.browser()?.creation_target(),
                };
                let report = self.browser()?.paste_selection(&target).await?;
                Ok(describe_batch(
                    &format!("pasted into '{}'", display_path(&target)),
                    &report,
                ))
            }
            Command::Delete => {
                let report = self.browser()?.delete_selection().await?;
                Ok(describe_batch("deleted", &report))
            }
            Command::Rename => {
                let target = self.browser()?.begin_rename()?;
                Ok(format!(
                    "renaming '{}': `name <new name>` to commit, `cancel` to abandon",
                    display_path(&target)
                ))
            }
            Command::Download => self.download().await,
            Command::CreateFolder => {
                let browser = self.browser()?;
                let created = browser.create_folder().await?;
                let mut out = format!("created '{}'", display_path(&created.path));
                if matches!(browser.rename_state(), RenameState::Editing { .. }) {
                    out.push_str(": `name <new name>` to rename it, `cancel` to keep it");
                }
                Ok(out)
            }
            Command::Refresh => {
                let browser = self.browser()?;
                let refreshed = if args.first() == Some(&"all") {
                    browser.refresh_all().await?
                } else {
                    browser.refresh_selection().await?
                };
                let shown: Vec<String> = refreshed.iter().map(display_path).collect();
                Ok(format!("refreshed {}", shown.join(", ")))
            }
            Command::CopyPath => Ok(self.browser()?.copy_path()?),
            Command::ToggleColumn(column) => {
                let visible = self.columns.toggle(column);
                if let Some(path) = &self.settings_path {
                    self.columns
                        .save(path)
                        .with_context(|| format!("writing settings {}", path.display()))?;
                }
                Ok(format!(
                    "column '{}' {}",
                    column,
                    if visible { "shown" } else { "hidden" }
                ))
            }
        }
    }

    /// Make `arg` addressable in the active tree, loading ancestors on demand.
    async fn reveal(&self, arg: &str) -> anyhow::Result<ResourcePath> {
        let path = ResourcePath::parse(arg);
        self.browser()?.reveal(&path).await?;
        Ok(path)
    }

    async fn use_drive(&mut self, name: &str) -> anyhow::Result<String> {
        let wanted = if name == "/" { "" } else { name };
        let drive = self
            .registry
            .find(wanted)
            .ok_or_else(|| anyhow!("no drive named '{name}'"))?;
        self.active = drive;
        let browser = self.browser()?;
        if !browser.tree().read().is_loaded(&ResourcePath::root()) {
            browser.load(&ResourcePath::root()).await?;
        }
        self.ls()
    }

    /// Save each downloaded item under the download directory. Items sharing
    /// a file name in one batch get `-N` suffixes instead of overwriting.
    async fn download(&self) -> anyhow::Result<String> {
        let report = self.browser()?.download_selection().await?;
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .with_context(|| format!("creating {}", self.download_dir.display()))?;

        let mut lines = Vec::with_capacity(report.total());
        let mut written: HashSet<String> = HashSet::new();
        for item in &report.completed {
            let file_name = disambiguate(&item.file_name, &written);
            let dest = self.download_dir.join(&file_name);
            written.insert(file_name);
            tokio::fs::write(&dest, &item.bytes)
                .await
                .with_context(|| format!("writing {}", dest.display()))?;
            lines.push(format!("saved {} ({} bytes)", dest.display(), item.bytes.len()));
        }
        for (path, err) in &report.failed {
            lines.push(format!("failed {}: {}", display_path(path), err));
        }
        Ok(lines.join("\n"))
    }

    pub fn ls(&self) -> anyhow::Result<String> {
        let browser = self.browser()?;
        let selected = browser.selection();
        let tree = browser.tree();
        let tree = tree.read();
        let rows = visible_rows(&tree);
        if rows.is_empty() {
            return Ok("(empty)".to_string());
        }
        Ok(render(&tree, &rows, &self.columns, &selected)
            .trim_end()
            .to_string())
    }

    fn describe_selection(&self) -> anyhow::Result<String> {
        let selected = self.browser()?.selection();
        let shown: Vec<String> = selected.iter().map(display_path).collect();
        Ok(format!("selected: {}", shown.join(", ")))
    }

    fn list_drives(&self) -> String {
        let mut lines = vec![format!(
            "{} (default)",
            if self.active.is_root() { "*" } else { " " }
        )];
        for resource in self.registry.resources() {
            let marker = if resource.drive == self.active { "*" } else { " " };
            lines.push(format!(
                "{marker} {} [{}] {}",
                resource.name, resource.drive, resource.url
            ));
        }
        lines.join("\n")
    }

    fn list_columns(&self) -> String {
        Column::ALL
            .iter()
            .map(|&c| {
                let mark = if self.columns.is_visible(c) { 'x' } else { ' ' };
                format!("[{mark}] {c}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn list_commands(&self) -> anyhow::Result<String> {
        let ctx = self.browser()?.command_context(&self.columns);
        Ok(Command::all()
            .iter()
            .map(|c| {
                let state = match c.is_toggled(&ctx) {
                    Some(true) => "on",
                    Some(false) => "off",
                    None if c.is_enabled(&ctx) => "enabled",
                    None => "disabled",
                };
                format!("{:<36} {:<20} {}", c.id(), c.label(), state)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn one_arg<'a>(args: &[&'a str], usage: &str) -> anyhow::Result<&'a str> {
    match args {
        [only] => Ok(*only),
        _ => bail!("usage: {usage}"),
    }
}

fn describe_batch(what: &str, report: &BatchReport) -> String {
    let mut lines = vec![format!(
        "{what}: {} ok, {} failed",
        report.succeeded.len(),
        report.failed.len()
    )];
    for (path, err) in &report.failed {
        lines.push(format!("  {}: {}", display_path(path), err));
    }
    lines.join("\n")
}
