//! Shared plumbing for Rewind's remote data and file handling.
//!
//! This crate holds the pieces that every feature crate leans on:
//! - A single-flight cache for remotely loaded documents.
//! - CRC32 file verification.
//! - The injected HTTP transport and the HTTP-backed file transfer.
//! - Download mirror rewriting.

mod cache;
mod checksum;
mod http;
mod mirror;

/// Single-flight, refreshable cache and the loader contract it drives.
pub use cache::{CacheError, Loader, SharedCache};
/// CRC32 helpers used to verify sources, diffs and patched outputs.
pub use checksum::{ChecksumError, crc32_file, crc32_file_async, verify_crc32};
/// Shared HTTP client and the retrying file downloader.
pub use http::{FetchError, HttpFileTransfer, HttpTransport};
/// Download mirror table.
pub use mirror::{
    DEFAULT_MIRROR_REFRESH_MINUTES, DEFAULT_MIRROR_TABLE_URL, MirrorConfig, MirrorSnapshot,
    MirrorTable,
};
