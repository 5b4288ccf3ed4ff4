//! Directory management for the tally node.

use crate::{args::DataDirArgs, constants::DEFAULT_DATA_DIR_NAME};
use directories::ProjectDirs;
use eyre::{Result, eyre};
use std::{fs, path::PathBuf};

/// Returns the default project directories for tally.
pub fn default_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "tally", DEFAULT_DATA_DIR_NAME)
}

/// Returns the default data directory path.
pub fn default_data_dir() -> Option<PathBuf> {
    default_project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Layout of the node's data directory.
#[derive(Debug, Clone)]
pub struct DataDirs {
    pub root: PathBuf,
}

impl DataDirs {
    /// Resolve the root from the args (or the platform default) and create it.
    pub fn new(args: &DataDirArgs) -> Result<Self> {
        let root = args
            .datadir
            .clone()
            .unwrap_or_else(|| default_data_dir().unwrap_or_else(|| PathBuf::from(".tally")));

        fs::create_dir_all(&root)
            .map_err(|e| eyre!("Failed to create directory {}: {}", root.display(), e))?;

        Ok(Self { root })
    }

    /// Returns the path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Returns the directory holding persisted wallets.
    pub fn wallets_dir(&self) -> PathBuf {
        self.root.join("wallets")
    }
}
