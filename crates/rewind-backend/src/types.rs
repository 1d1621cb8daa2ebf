use std::fmt;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::version::parse_game_version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModLoader {
    QuestLoader,
    Scotland2,
    Unknown,
}

impl fmt::Display for ModLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuestLoader => write!(f, "QuestLoader"),
            Self::Scotland2 => write!(f, "Scotland2"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The package currently installed on the device, as observed by the host.
///
/// Only the mod loader can change in place; a version switch produces a new
/// `ApkInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApkInfo {
    version: String,
    sem_version: Option<Version>,
    mod_loader: Option<ModLoader>,
    is_64_bit: bool,
    path: PathBuf,
}

impl ApkInfo {
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        mod_loader: Option<ModLoader>,
        is_64_bit: bool,
        path: impl Into<PathBuf>,
    ) -> Self {
        let version = version.into();
        let sem_version = parse_game_version(&version);
        Self {
            version,
            sem_version,
            mod_loader,
            is_64_bit,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn sem_version(&self) -> Option<&Version> {
        self.sem_version.as_ref()
    }

    #[must_use]
    pub fn mod_loader(&self) -> Option<ModLoader> {
        self.mod_loader
    }

    pub fn set_mod_loader(&mut self, mod_loader: Option<ModLoader>) {
        self.mod_loader = mod_loader;
    }

    /// Modded with a loader we recognise.
    #[must_use]
    pub fn is_modded(&self) -> bool {
        matches!(
            self.mod_loader,
            Some(ModLoader::QuestLoader | ModLoader::Scotland2)
        )
    }

    #[must_use]
    pub fn is_64_bit(&self) -> bool {
        self.is_64_bit
    }

    /// Local copy of the installed APK.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMod {
    pub id: String,
    pub version: Version,
    pub enabled: bool,
}
