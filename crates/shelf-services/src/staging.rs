//! Release of locally staged upload files.

use shelf_core::StagedAsset;
use std::io::ErrorKind;
use tokio::fs;

/// Remove staged files. Failures are logged and never surface to the caller.
pub async fn release_staged<'a, I>(assets: I)
where
    I: IntoIterator<Item = &'a StagedAsset>,
{
    for asset in assets {
        match fs::remove_file(&asset.path).await {
            Ok(()) => {
                tracing::debug!(path = %asset.path.display(), "Released staged file");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %asset.path.display(), "Staged file already gone");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %asset.path.display(),
                    "Failed to release staged file"
                );
            }
        }
    }
}
