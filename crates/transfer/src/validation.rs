use std::path::Path;

use crate::TransferError;

/// Validates that `path` is a regular file of exactly `expected` bytes.
///
/// A resumed upload continues a payload the service already holds a prefix
/// of. If the file was replaced or truncated in between, streaming its tail
/// would produce a corrupt upload, so the size is checked before every
/// attempt. Returns the file size.
pub async fn validate_source_file(path: &Path, expected: u64) -> Result<u64, TransferError> {
    let metadata = tokio::fs::metadata(path).await?;

    if !metadata.is_file() {
        return Err(TransferError::NotAFile(path.display().to_string()));
    }

    let actual = metadata.len();
    if actual != expected {
        return Err(TransferError::SizeMismatch { expected, actual });
    }

    Ok(actual)
}
