use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Temporary files created during one run, removed when the run ends.
///
/// Removal happens on [`TempArtifacts::cleanup`] or on drop, whichever comes
/// first, so early returns through `?` still clean up. Failures are logged and
/// otherwise ignored.
#[derive(Debug, Default)]
pub struct TempArtifacts {
    paths: Vec<PathBuf>,
}

impl TempArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for removal and hand it back.
    pub fn track(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn cleanup(&mut self) {
        if self.paths.is_empty() {
            return;
        }

        debug!("Cleaning up {} temporary files", self.paths.len());
        for path in self.paths.drain(..) {
            remove_quietly(&path);
        }
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove temp file {}: {e}", path.display()),
    }
}
