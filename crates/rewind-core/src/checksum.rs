use std::io::Read;
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use log::debug;

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("failed to read {} for checksum: {source}", .path.display())]
pub struct ChecksumError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// CRC32 (IEEE polynomial) over the full contents of `path`.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn crc32_file(path: &Path) -> Result<u32, ChecksumError> {
    let with_path = |source| ChecksumError {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(with_path)?;
    let mut hasher = Hasher::new();
    let mut buffer = vec![0_u8; READ_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer).map_err(with_path)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize())
}

/// Async wrapper around [`crc32_file`]; asset packs run to gigabytes, so the
/// hashing happens on the blocking pool.
///
/// # Errors
/// Returns an error if the file cannot be read or the blocking task panics.
pub async fn crc32_file_async(path: &Path) -> Result<u32, ChecksumError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || crc32_file(&owned))
        .await
        .map_err(|error| ChecksumError {
            path: path.to_path_buf(),
            source: std::io::Error::other(error),
        })?
}

/// Whether the file at `path` has the expected CRC32.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub async fn verify_crc32(path: &Path, expected: u32) -> Result<bool, ChecksumError> {
    let actual = crc32_file_async(path).await?;
    if actual != expected {
        debug!(
            "CRC mismatch for {}: expected {expected}, got {actual}",
            path.display()
        );
    }
    Ok(actual == expected)
}
