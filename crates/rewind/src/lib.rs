//! Host-facing entry point for Rewind.
//!
//! Hosts (a desktop UI or an automation script) load [`AppSettings`], start
//! logging, and build a [`RewindService`] from their own device, patch tool,
//! prompt and mod manager implementations. The service owns the remote
//! indexes and serialises every operation that mutates the headset.

mod error;
pub mod logging;
mod operation;
mod selection;
mod service;
mod settings;

pub use error::{AppError, AppErrorDetail};
pub use operation::{OperationGuard, OperationLock, OperationLockError};
pub use selection::{SelectionOptions, TargetSelection, select_target};
pub use service::{HostCapabilities, RewindService};
pub use settings::AppSettings;

pub use rewind_backend::{
    ApkInfo, BackendError, DecisionPrompter, DeviceController, InstalledMod, ModLoader,
    ModRegistry, PatchApplier, RejectUnverified,
};
pub use rewind_coremods::{CoreModDescriptor, CoreModStatus};
pub use rewind_downgrade::{AppDiff, DowngradeOutcome, FileDiff, InstallReport, VersionSwitch};
pub use rewind_platform::AppPaths;
