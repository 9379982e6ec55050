//! File IO helpers: host text files and document import/export.
//!
//! Synchronous and minimal. Text helpers return result enums and log their own
//! failures; import/export return `ActionError` since they run as commands.

use crate::ActionError;
use core_state::Workspace;
use core_text::{Buffer, HostBuffer};
use std::path::{Path, PathBuf};

/// Result of attempting to open a file.
#[derive(Debug)]
pub enum OpenFileResult {
    Success(OpenSuccess),
    Error, // caller reports
}

#[derive(Debug)]
pub struct OpenSuccess {
    pub buffer: Buffer,
    pub file_name: PathBuf,
}

/// Open a file path into a new Buffer. CRLF line endings are normalized to LF.
pub fn open_file(path: &Path) -> OpenFileResult {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let normalized = content.replace("\r\n", "\n");
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("file");
            tracing::debug!(target: "io", file = %path.display(), size_bytes = normalized.len(), "file_read_ok");
            OpenFileResult::Success(OpenSuccess {
                buffer: Buffer::from_str(name, &normalized),
                file_name: path.to_path_buf(),
            })
        }
        Err(e) => {
            tracing::error!(target: "io", ?e, "file_open_error");
            OpenFileResult::Error
        }
    }
}

/// Result of a write attempt.
#[derive(Debug)]
pub enum WriteFileResult {
    Success,
    NoFilename,
    Error,
}

/// Write the host's text to `target`.
pub fn write_file(host: &dyn HostBuffer, target: Option<&Path>) -> WriteFileResult {
    let Some(path) = target else {
        return WriteFileResult::NoFilename;
    };
    match std::fs::write(path, host.value().as_bytes()) {
        Ok(_) => WriteFileResult::Success,
        Err(e) => {
            tracing::error!(target: "io", ?e, "file_write_error");
            WriteFileResult::Error
        }
    }
}

/// Replace document `key` with the `DocumentState` JSON stored at `path`.
pub fn import_file(ws: &mut Workspace, key: &str, path: &Path) -> Result<(), ActionError> {
    let json = std::fs::read_to_string(path).map_err(|source| ActionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ws.import_document(key, &json)?;
    Ok(())
}

pub fn export_file(ws: &Workspace, key: &str, path: &Path) -> Result<(), ActionError> {
    let json = ws.export_document(key)?;
    std::fs::write(path, json).map_err(|source| ActionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(target: "io", key, file = %path.display(), "document_exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::Settings;

    #[test]
    fn open_file_normalizes_line_endings() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            write!(f, "line1\r\nline2\n").unwrap();
        }
        match open_file(&path) {
            OpenFileResult::Success(s) => {
                assert_eq!(s.buffer.value(), "line1\nline2\n");
                assert_eq!(s.file_name, path);
            }
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn open_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            open_file(&dir.path().join("nope.txt")),
            OpenFileResult::Error
        ));
    }

    #[test]
    fn write_file_no_filename() {
        let buffer = Buffer::from_str("t", "x");
        assert!(matches!(write_file(&buffer, None), WriteFileResult::NoFilename));
    }

    #[test]
    fn export_import_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        let mut ws = Workspace::new(Settings::default());
        ws.open("a", "Once upon").unwrap();
        export_file(&ws, "a", &path).unwrap();
        import_file(&mut ws, "b", &path).unwrap();
        assert_eq!(ws.document("a"), ws.document("b"));
    }

    #[test]
    fn import_missing_file_reports_path() {
        let mut ws = Workspace::new(Settings::default());
        let err = import_file(&mut ws, "a", Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ActionError::Io { .. }));
    }
}
