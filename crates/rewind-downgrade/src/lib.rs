//! Version downgrades through binary diffs.
//!
//! A downgrade runs in two halves. The first touches nothing on the device:
//! the diff index is consulted, every source file and diff asset is verified
//! by CRC32 and every patched output is verified before it is used. The
//! second half replaces the installed package and its asset packs, treating
//! backups and restores as best-effort.

mod error;
mod index;
mod manager;
mod model;
mod orchestrator;
mod pipeline;
#[cfg(test)]
mod test_support;

pub use error::{DeviceStage, DowngradeError, VerifyStage};
pub use index::{
    BEAT_SABER_PACKAGE_ID, DEFAULT_DIFF_BASE_URL, DEFAULT_DIFF_CHECKSUMS_URL,
    DEFAULT_DIFF_INDEX_URL, DowngradeConfig, DowngradeIndexResolver,
};
pub use manager::{
    DowngradeCapabilities, DowngradeManager, DowngradeOutcome, MIN_DIFFABLE_VERSION,
    VersionSwitch, downgrade_feature_available,
};
pub use model::{AppDiff, DowngradeIndex, FileDiff};
pub use orchestrator::{InstallOrchestrator, InstallReport};
pub use pipeline::{
    DiffPipeline, PatchedAsset, PatchedFiles, Preparation, PreparedTransition,
    TransitionPreparation,
};
