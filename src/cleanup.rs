//! Scoped removal of the proxy's on-disk cache directory.

use std::path::PathBuf;

use tracing::{debug, warn};

/// Guard tying the proxy cache directory's absence to a scope.
///
/// Acquisition removes any stale directory from a previous run; dropping the
/// guard removes whatever the proxy wrote during this run. Because removal
/// lives in `Drop`, the directory is gone on every exit path, including
/// scenario failures and early returns.
#[derive(Debug)]
pub struct CacheGuard {
    path: PathBuf,
}

impl CacheGuard {
    /// Remove any pre-existing directory at `path` and arm the guard.
    #[must_use]
    pub fn acquire(path: PathBuf) -> Self {
        remove_dir(&path);
        debug!(path = %path.display(), "cache guard armed");
        Self { path }
    }

    /// Path the guard watches over.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for CacheGuard {
    fn drop(&mut self) {
        remove_dir(&self.path);
    }
}

fn remove_dir(path: &std::path::Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "failed to remove cache directory"),
    }
}
