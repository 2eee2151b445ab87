// backup-dav/src/backup/bootstrap.rs
use tracing::{error, info};

use crate::errors::{JobError, RemoteError};
use crate::webdav::{path_prefixes, RemoteEntry, RemoteStore};

/// Makes sure every segment of `remote_dir` exists, creating missing ones
/// from the root down, and returns the listing of `remote_dir` itself.
pub async fn ensure_remote_dir<S: RemoteStore>(
    store: &S,
    remote_dir: &str,
) -> Result<Vec<RemoteEntry>, JobError> {
    let mut listing = Vec::new();

    for prefix in path_prefixes(remote_dir) {
        listing = match store.list(&prefix).await {
            Ok(entries) => entries,
            Err(RemoteError::NotFound(_)) => {
                info!("📂 Creating remote directory {}", prefix);
                store.create_dir(&prefix).await.map_err(|e| fatal_on_credentials(e, &prefix))?;
                Vec::new()
            }
            Err(e) => return Err(fatal_on_credentials(e, &prefix)),
        };
    }

    Ok(listing)
}

fn fatal_on_credentials(err: RemoteError, prefix: &str) -> JobError {
    match err {
        RemoteError::Unauthorized(_) => {
            error!("❌ Remote store rejected the configured credentials");
            JobError::Fatal(format!("Invalid remote credentials (while accessing {})", prefix))
        }
        other => JobError::Retryable(format!("Failed to prepare remote directory {}: {}", prefix, other)),
    }
}
