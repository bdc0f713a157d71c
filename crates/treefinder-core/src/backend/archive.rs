/// Zip bundling for directory downloads.
use crate::error::BackendError;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One member of a directory archive: a relative path and, for files, the
/// bytes. `None` content records an (empty) directory.
pub(crate) struct ArchiveEntry {
    pub name: String,
    pub content: Option<Vec<u8>>,
}

/// Build an in-memory zip archive from `entries`.
pub(crate) fn zip_entries<I>(entries: I) -> Result<Vec<u8>, BackendError>
where
    I: IntoIterator<Item = ArchiveEntry>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        match entry.content {
            None => writer
                .add_directory(format!("{}/", entry.name), options)
                .map_err(zip_error)?,
            Some(bytes) => {
                writer.start_file(entry.name, options).map_err(zip_error)?;
                writer
                    .write_all(&bytes)
                    .map_err(|e| BackendError::Io(format!("archive write: {e}")))?;
            }
        }
    }

    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn zip_error(err: zip::result::ZipError) -> BackendError {
    BackendError::Io(format!("archive: {err}"))
}
