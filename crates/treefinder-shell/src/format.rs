/// Display formatting for listing columns.
///
/// All sizes are `u64` bytes; floating point is only used at the
/// formatting boundary.
use chrono::{DateTime, Local, Utc};
use treefinder_core::model::{Resource, ResourcePath};
use treefinder_core::settings::Column;

/// Format a byte count with a binary unit (labelled KB, MB, ...).
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else if b < TB {
        format!("{:.2} GB", b / GB)
    } else {
        format!("{:.2} TB", b / TB)
    }
}

/// Modification time in local time, minute precision.
pub fn format_modified(modified: Option<DateTime<Utc>>) -> String {
    match modified {
        Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// Text for one column of one row.
pub fn format_cell(column: Column, resource: &Resource) -> String {
    match column {
        Column::Size => match resource.meta.size {
            Some(size) if !resource.is_dir() => format_size(size),
            _ => "-".to_string(),
        },
        Column::LastModified => format_modified(resource.meta.modified),
        Column::Mimetype => resource.meta.mimetype.clone().unwrap_or_else(|| "-".into()),
        Column::Writable => if resource.writable { "rw" } else { "r-" }.to_string(),
    }
}

/// A path as shown to the user; the root is `/`.
pub fn display_path(path: &ResourcePath) -> String {
    if path.is_root() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treefinder_core::model::DriveId;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_cells() {
        let mut file = Resource::file(DriveId::root(), ResourcePath::parse("a.txt"));
        file.meta.size = Some(2048);
        assert_eq!(format_cell(Column::Size, &file), "2.0 KB");
        assert_eq!(format_cell(Column::Mimetype, &file), "-");
        assert_eq!(format_cell(Column::LastModified, &file), "-");
        assert_eq!(format_cell(Column::Writable, &file.clone().read_only()), "r-");

        let dir = Resource::dir(DriveId::root(), ResourcePath::parse("d"));
        assert_eq!(format_cell(Column::Size, &dir), "-");
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(&ResourcePath::root()), "/");
        assert_eq!(display_path(&ResourcePath::parse("a/b")), "a/b");
    }
}
