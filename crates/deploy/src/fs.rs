//! File system utils.

use std::{io::Write, path::Path};

use tempfile::NamedTempFile;

pub struct FsHandler;

impl FsHandler {
    /// Create a directory (and its parents) if it doesn't exist.
    pub fn create_dir(path: &Path) -> std::io::Result<()> {
        if path.as_os_str().is_empty() || path.is_dir() {
            return Ok(());
        }

        std::fs::create_dir_all(path)?;
        tracing::debug!("Created directory: {}", path.display());

        Ok(())
    }

    /// Replace the content of `path` with `contents`.
    ///
    /// The data goes to a temporary file in the same directory, is synced to
    /// disk, then renamed over `path`. Readers observe either the old or the
    /// new document, never a partial one.
    pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Self::create_dir(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        // Make the rename itself durable.
        #[cfg(unix)]
        std::fs::File::open(parent)?.sync_all()?;

        tracing::trace!(path = %path.display(), bytes = contents.len(), "File written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_atomic_creates_parent_and_replaces() {
        let temp_dir = TempDir::new("forgeline-fs").expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("doc.json");

        FsHandler::write_atomic(&path, b"first").expect("first write");
        FsHandler::write_atomic(&path, b"second").expect("second write");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

        // No temporary files are left behind.
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
