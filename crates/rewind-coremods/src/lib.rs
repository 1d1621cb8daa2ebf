//! Core mod compatibility for installed game versions.

mod error;
mod model;
mod resolver;

pub use error::CoreModError;
pub use model::{CoreModDescriptor, CoreModIndex, CoreModsEntry};
pub use resolver::{CoreModResolver, CoreModStatus, CoreModsConfig, DEFAULT_CORE_MODS_URL};
