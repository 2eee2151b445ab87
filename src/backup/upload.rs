// backup-dav/src/backup/upload.rs
use futures::TryStreamExt;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use super::Artifact;
use crate::errors::JobError;
use crate::webdav::{join_path, RemoteStore};

/// Pipes a producer's output straight into a PUT on the remote store and
/// waits for both ends.
///
/// Only a `201 Created` acknowledgment counts as success: the byte stream
/// finishing cleanly says nothing about whether the store kept the file.
/// `507 Insufficient Storage` is fatal for the whole run.
pub async fn upload_artifact<S: RemoteStore>(
    store: &S,
    remote_dir: &str,
    artifact: Artifact,
) -> Result<(), JobError> {
    let Artifact {
        filename,
        body,
        completion,
    } = artifact;
    let remote_path = join_path(remote_dir, &filename);

    let sent = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&sent);
    let body = body.inspect_ok(move |chunk| {
        counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    });

    info!("⬆️ Uploading {}", remote_path);
    let (ack, exit) = tokio::join!(store.put_stream(&remote_path, body), completion);

    if let Ok(StatusCode::INSUFFICIENT_STORAGE) = ack {
        error!("❌ Remote store is out of space while uploading {}", remote_path);
        return Err(JobError::Fatal(format!(
            "Remote store reported insufficient storage for {}",
            remote_path
        )));
    }
    exit?;

    match ack {
        Ok(StatusCode::CREATED) => {
            info!(
                "✅ Uploaded {} ({} bytes)",
                remote_path,
                sent.load(Ordering::Relaxed)
            );
            Ok(())
        }
        Ok(status) => Err(JobError::with_artifact(
            filename,
            format!("Upload of {} was answered with {}", remote_path, status),
        )),
        Err(e) => Err(JobError::with_artifact(
            filename,
            format!("Upload of {} failed: {}", remote_path, e),
        )),
    }
}
