//! # Profile Store
//!
//! Profiles as `<name>.json` files in one directory. Saves go through a
//! temporary file and a rename, so a crash mid-save leaves the previous
//! version in place.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::Profile;
use crate::error::{BridgeError, Result};

const PROFILE_EXTENSION: &str = "json";

/// Directory-backed JSON profile store.
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    directory: PathBuf,
}

impl JsonProfileStore {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Loads the profile called `name`.
    ///
    /// A profile without an embedded name takes the file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, the file cannot be read, or
    /// the document is malformed.
    pub async fn load(&self, name: &str) -> Result<Profile> {
        let path = self.path_for(name)?;
        let contents = fs::read_to_string(&path).await?;
        let mut profile = Profile::from_json(&contents)?;
        if profile.name.is_empty() {
            profile.name = name.to_string();
        }
        debug!("Loaded profile '{}' from {}", name, path.display());
        Ok(profile)
    }

    /// Saves `profile` as `name`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the file cannot be written.
    pub async fn save(&self, name: &str, profile: &Profile) -> Result<()> {
        let path = self.path_for(name)?;
        let json = profile.to_json_pretty()?;

        fs::create_dir_all(&self.directory).await?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, json.as_bytes()).await?;
        fs::rename(&temp, &path).await?;

        info!("Saved profile '{}' to {}", name, path.display());
        Ok(())
    }

    /// Names of all stored profiles, sorted.
    ///
    /// A missing directory is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '));
        if !valid {
            return Err(BridgeError::Config(format!("invalid profile name '{}'", name)));
        }
        Ok(self.directory.join(format!("{}.{}", name, PROFILE_EXTENSION)))
    }
}
