//! Run-level exclusive lock on a registry directory.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;

use crate::{
    error::{DeployError, DeployResult},
    fs::FsHandler,
};

/// Name of the lock file created inside the registry directory.
pub const LOCK_FILENAME: &str = ".forgeline.lock";

/// Held for the duration of a run. Two runs rewriting the same documents
/// would lose each other's updates, so only one may hold it.
///
/// Released when dropped.
#[derive(Debug)]
pub struct RegistryLock {
    path: PathBuf,
    file: File,
}

impl RegistryLock {
    /// Take the lock without waiting; fails with [`DeployError::RegistryLocked`]
    /// if another run holds it.
    pub fn acquire(registry_dir: &Path) -> DeployResult<Self> {
        let io_err = |e: std::io::Error| DeployError::Registry {
            path: registry_dir.to_path_buf(),
            reason: e.to_string(),
        };

        FsHandler::create_dir(registry_dir).map_err(io_err)?;

        let path = registry_dir.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_err)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Registry lock acquired");
                Ok(Self { path, file })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(DeployError::RegistryLocked(registry_dir.to_path_buf()))
            }
            Err(e) => Err(io_err(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(err = %e, path = %self.path.display(), "Failed to release registry lock");
        }
    }
}
