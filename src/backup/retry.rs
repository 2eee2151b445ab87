// backup-dav/src/backup/retry.rs
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{JobError, RemoteError};
use crate::webdav::{join_path, RemoteStore};

/// Pause between a failed attempt and the next one.
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// How a retried job ended and how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome {
    pub attempts: u32,
    pub result: Result<(), JobError>,
}

/// Runs `attempt` until it succeeds, fails fatally, or `retries` extra
/// attempts have been spent.
///
/// Any artifact a failed attempt left on the remote store is deleted before
/// moving on. Cleanup problems are logged and never change the outcome.
pub async fn run_with_retries<S, F, Fut>(
    store: &S,
    remote_dir: &str,
    label: &str,
    retries: u32,
    delay: Duration,
    mut attempt: F,
) -> RetryOutcome
where
    S: RemoteStore,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(), JobError>>,
{
    let mut attempt_no: u32 = 0;
    loop {
        attempt_no = attempt_no.saturating_add(1);
        let err = match attempt(attempt_no).await {
            Ok(()) => return RetryOutcome { attempts: attempt_no, result: Ok(()) },
            Err(e) if e.is_fatal() => return RetryOutcome { attempts: attempt_no, result: Err(e) },
            Err(e) => e,
        };

        warn!("⚠️ {} backup attempt {} failed: {}", label, attempt_no, err);
        if let Some(filename) = err.artifact() {
            remove_partial_artifact(store, &join_path(remote_dir, filename)).await;
        }

        if attempt_no > retries {
            return RetryOutcome { attempts: attempt_no, result: Err(err) };
        }
        info!("Retrying {} backup in {}s ({} of {})", label, delay.as_secs(), attempt_no, retries);
        tokio::time::sleep(delay).await;
    }
}

async fn remove_partial_artifact<S: RemoteStore>(store: &S, remote_path: &str) {
    match store.delete(remote_path).await {
        Ok(()) => info!("🧹 Removed partial upload {}", remote_path),
        Err(RemoteError::NotFound(_)) => debug!("No partial upload left at {}", remote_path),
        Err(RemoteError::Unauthorized(_)) => {
            warn!("Not allowed to remove partial upload {}", remote_path)
        }
        Err(e) => warn!("Failed to remove partial upload {}: {}", remote_path, e),
    }
}
