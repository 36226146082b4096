//! Receipt images
//!
//! An image is identified by the SHA-256 of its bytes, so the same receipt
//! captured twice is recognised as a duplicate whatever its file name.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use yoru_core::StoreError;

/// Local image file and its content hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptImage {
    pub path: PathBuf,
    /// Hex SHA-256 of the file contents
    pub hash: String,
}

impl ReceiptImage {
    /// Read and hash the file at `path`
    ///
    /// # Errors
    /// - `LedgerError::Store` if the file cannot be read
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let hash = image_hash(&path).await?;
        Ok(Self { path, hash })
    }
}

/// Hex SHA-256 of a file's contents
///
/// # Errors
/// - `LedgerError::Store` if the file cannot be read
pub async fn image_hash(path: &Path) -> Result<String, LedgerError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StoreError::io_error(path, e))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Delete a local image. A file that is already gone is not an error.
///
/// Returns whether a file was removed.
///
/// # Errors
/// - `LedgerError::Store` on any other IO failure
pub async fn delete_image(path: &Path) -> Result<bool, LedgerError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io_error(path, e).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_depends_on_content_only() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("IMG_0001.jpg");
        let b = dir.path().join("copy.jpg");
        tokio::fs::write(&a, b"abc").await.unwrap();
        tokio::fs::write(&b, b"abc").await.unwrap();

        let first = ReceiptImage::open(&a).await.unwrap();
        assert_eq!(
            first.hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(image_hash(&b).await.unwrap(), first.hash);
    }

    #[tokio::test]
    async fn missing_file_cannot_be_hashed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            image_hash(&dir.path().join("gone.jpg")).await,
            Err(LedgerError::Store(StoreError::Io { .. }))
        ));
    }

    #[tokio::test]
    async fn delete_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.jpg");
        tokio::fs::write(&path, b"jpeg").await.unwrap();

        assert!(delete_image(&path).await.unwrap());
        assert!(!path.exists());
        assert!(!delete_image(&path).await.unwrap());
    }
}
