/// Named commands and their enablement.
///
/// Enablement is a pure query over a `CommandContext` snapshot; executing a
/// command is the front end's job (it calls the matching `FileBrowser`
/// operation). A front end can therefore grey out or hide commands without
/// touching the tree or the backend.
use crate::clipboard::{ClipMode, Clipboard};
use crate::model::Resource;
use crate::rename::RenameSession;
use crate::settings::{Column, ColumnSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Copy,
    Cut,
    Paste,
    Delete,
    Rename,
    Download,
    CreateFolder,
    Refresh,
    CopyPath,
    ToggleColumn(Column),
}

/// Everything enablement depends on, captured at one instant.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub selected: Vec<Resource>,
    pub clipboard: Option<ClipMode>,
    pub renaming: bool,
    pub columns: ColumnSettings,
}

impl Command {
    /// Every command, column toggles included, in menu order.
    pub fn all() -> Vec<Command> {
        let mut all = vec![
            Command::Copy,
            Command::Cut,
            Command::Paste,
            Command::Delete,
            Command::Rename,
            Command::Download,
            Command::CreateFolder,
            Command::Refresh,
            Command::CopyPath,
        ];
        all.extend(Column::ALL.into_iter().map(Command::ToggleColumn));
        all
    }

    /// Stable identifier, e.g. `treefinder:copy`.
    pub fn id(&self) -> String {
        let name = match self {
            Command::Copy => "copy",
            Command::Cut => "cut",
            Command::Paste => "paste",
            Command::Delete => "delete",
            Command::Rename => "rename",
            Command::Download => "download",
            Command::CreateFolder => "create-folder",
            Command::Refresh => "refresh",
            Command::CopyPath => "copy-path",
            Command::ToggleColumn(column) => {
                return format!("treefinder:toggle-column-{}", column.name())
            }
        };
        format!("treefinder:{name}")
    }

    pub fn label(&self) -> String {
        match self {
            Command::Copy => "Copy".into(),
            Command::Cut => "Cut".into(),
            Command::Paste => "Paste".into(),
            Command::Delete => "Delete".into(),
            Command::Rename => "Rename".into(),
            Command::Download => "Download".into(),
            Command::CreateFolder => "New Folder".into(),
            Command::Refresh => "Refresh".into(),
            Command::CopyPath => "Copy Path".into(),
            Command::ToggleColumn(column) => format!("{} Column", column.title()),
        }
    }

    pub fn is_enabled(&self, ctx: &CommandContext) -> bool {
        let selected = ctx.selected.as_slice();
        match self {
            Command::Copy => Clipboard::can_copy(selected),
            Command::Cut | Command::Delete => Clipboard::can_cut(selected),
            Command::Paste => ctx.clipboard.is_some(),
            Command::Rename => RenameSession::can_begin(selected),
            Command::Download => !selected.is_empty(),
            Command::CopyPath => selected.len() == 1,
            Command::CreateFolder | Command::Refresh | Command::ToggleColumn(_) => true,
        }
    }

    /// Check state for toggle commands; `None` for plain actions.
    pub fn is_toggled(&self, ctx: &CommandContext) -> Option<bool> {
        match self {
            Command::ToggleColumn(column) => Some(ctx.columns.is_visible(*column)),
            _ => None,
        }
    }

    /// Look a command up by id, with or without the `treefinder:` prefix.
    pub fn parse(id: &str) -> Option<Command> {
        let wanted = id.strip_prefix("treefinder:").unwrap_or(id);
        Command::all()
            .into_iter()
            .find(|c| c.id().strip_prefix("treefinder:") == Some(wanted))
    }
}
