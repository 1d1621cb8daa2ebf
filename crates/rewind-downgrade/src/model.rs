use std::collections::HashMap;

use rewind_backend::compare_versions;
use serde::{Deserialize, Serialize};

/// One file-level transformation: `diff_name` applied to `file_name`
/// produces `output_file_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub diff_name: String,
    pub file_name: String,
    pub file_crc: u32,
    pub output_file_name: String,
    pub output_crc: u32,
    pub output_size: u64,
}

/// A whole-application transition between two game versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDiff {
    pub from_version: String,
    pub to_version: String,
    pub apk_diff: FileDiff,
    #[serde(default)]
    pub obb_diffs: Vec<FileDiff>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DowngradeIndex {
    pub paths: HashMap<String, Vec<AppDiff>>,
    pub checksums: HashMap<String, u32>,
}

impl DowngradeIndex {
    /// Group `diffs` by source version, newest target first.
    #[must_use]
    pub fn build(diffs: Vec<AppDiff>, checksums: HashMap<String, u32>) -> Self {
        let mut paths: HashMap<String, Vec<AppDiff>> = HashMap::new();
        for diff in diffs {
            paths.entry(diff.from_version.clone()).or_default().push(diff);
        }
        for group in paths.values_mut() {
            group.sort_by(|a, b| compare_versions(&b.to_version, &a.to_version));
        }

        Self { paths, checksums }
    }

    #[must_use]
    pub fn paths_from(&self, from_version: &str) -> &[AppDiff] {
        self.paths.get(from_version).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn checksum(&self, diff_name: &str) -> Option<u32> {
        self.checksums.get(diff_name).copied()
    }

    #[must_use]
    pub fn diff_count(&self) -> usize {
        self.paths.values().map(Vec::len).sum()
    }
}
