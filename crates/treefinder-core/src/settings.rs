/// Optional column visibility, persisted as JSON.
///
/// The file holds a single `display_columns` list of column names. Names this
/// build does not know are ignored on load so older and newer front ends can
/// share one settings file.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Size,
    LastModified,
    Mimetype,
    Writable,
}

impl Column {
    pub const ALL: [Column; 4] = [
        Column::Size,
        Column::LastModified,
        Column::Mimetype,
        Column::Writable,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Size => "size",
            Column::LastModified => "last_modified",
            Column::Mimetype => "mimetype",
            Column::Writable => "writable",
        }
    }

    /// Header text for tabular output.
    pub fn title(self) -> &'static str {
        match self {
            Column::Size => "Size",
            Column::LastModified => "Modified",
            Column::Mimetype => "Type",
            Column::Writable => "W",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown column '{s}'"))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    display_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSettings {
    visible: BTreeSet<Column>,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            visible: BTreeSet::from([Column::Size]),
        }
    }
}

impl ColumnSettings {
    pub fn is_visible(&self, column: Column) -> bool {
        self.visible.contains(&column)
    }

    /// Flip a column; returns its new visibility.
    pub fn toggle(&mut self, column: Column) -> bool {
        if !self.visible.remove(&column) {
            self.visible.insert(column);
        }
        self.is_visible(column)
    }

    /// Visible columns in display order.
    pub fn visible(&self) -> Vec<Column> {
        self.visible.iter().copied().collect()
    }

    /// Build from raw names, skipping the unrecognised ones.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let visible = names
            .into_iter()
            .filter_map(|name| match name.as_ref().parse::<Column>() {
                Ok(column) => Some(column),
                Err(err) => {
                    warn!("{err}, ignoring");
                    None
                }
            })
            .collect();
        Self { visible }
    }

    pub fn names(&self) -> Vec<String> {
        self.visible.iter().map(|c| c.name().to_string()).collect()
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        let file: SettingsFile = serde_json::from_str(&text)?;
        Ok(Self::from_names(file.display_columns))
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = SettingsFile {
            display_columns: self.names(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}
