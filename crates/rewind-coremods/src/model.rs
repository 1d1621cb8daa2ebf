use std::collections::HashMap;

use rewind_backend::parse_game_version;
use semver::Version;
use serde::{Deserialize, Serialize};

/// A core mod published for one game version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreModDescriptor {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub download_link: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    /// Filled from the index key, not the document body.
    #[serde(skip)]
    pub target_game_version: String,
}

impl CoreModDescriptor {
    #[must_use]
    pub fn sem_version(&self) -> Option<Version> {
        parse_game_version(&self.version)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreModsEntry {
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub mods: Vec<CoreModDescriptor>,
}

/// Core mods keyed by the exact game version string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreModIndex {
    versions: HashMap<String, Vec<CoreModDescriptor>>,
}

impl CoreModIndex {
    #[must_use]
    pub fn from_entries(entries: HashMap<String, CoreModsEntry>) -> Self {
        let versions = entries
            .into_iter()
            .map(|(game_version, entry)| {
                let mods = entry
                    .mods
                    .into_iter()
                    .map(|descriptor| CoreModDescriptor {
                        target_game_version: game_version.clone(),
                        ..descriptor
                    })
                    .collect();
                (game_version, mods)
            })
            .collect();
        Self { versions }
    }

    #[must_use]
    pub fn mods_for(&self, game_version: &str) -> &[CoreModDescriptor] {
        self.versions.get(game_version).map_or(&[], Vec::as_slice)
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
