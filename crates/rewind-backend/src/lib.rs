mod error;
mod traits;
mod types;
mod version;

pub use error::{BackendError, NetworkStage};
pub use traits::{
    DecisionPrompter, DeviceController, FileTransfer, ModRegistry, PatchApplier, RejectUnverified,
};
pub use types::{ApkInfo, InstalledMod, ModLoader};
pub use version::{compare_versions, parse_game_version};
