use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::SimulationError;

/// Hex characters of the scenario digest kept in directory names.
const DIGEST_CHARS: usize = 12;

/// Per-episode scratch directory handed to the gateway.
///
/// The directory is `root/episode-<digest>-<counter>`, where the digest is taken over the
/// scenario key, so concurrent environments with distinct scenarios or counters never
/// share files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    #[must_use]
    pub fn for_episode(root: &Path, scenario_key: &str, episode: u64) -> Self {
        let digest = Sha256::digest(scenario_key.as_bytes());
        let mut hex = String::with_capacity(DIGEST_CHARS);
        for byte in digest.iter().take(DIGEST_CHARS / 2) {
            let _ = write!(hex, "{byte:02x}");
        }
        Self {
            dir: root.join(format!("episode-{hex}-{episode:04}")),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Create the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Io`] when the directory cannot be created.
    pub fn ensure(&self) -> Result<&Path, SimulationError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            SimulationError::Io(format!("creating {}: {e}", self.dir.display()))
        })?;
        Ok(&self.dir)
    }

    /// Remove the directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Io`] when removal fails for a reason other than absence.
    pub fn clean(&self) -> Result<(), SimulationError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SimulationError::Io(format!(
                "removing {}: {e}",
                self.dir.display()
            ))),
        }
    }
}
