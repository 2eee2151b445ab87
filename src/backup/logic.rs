// backup-dav/src/backup/logic.rs
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};

use super::retention::{self, PruneReport};
use super::{bootstrap, retry, upload, ArtifactProducer, BackupJob};
use crate::config::BackupConfig;
use crate::errors::JobError;
use crate::utils::filename::FilenameMatcher;
use crate::webdav::RemoteStore;

/// Result of one backup stage after all of its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub label: String,
    pub succeeded: bool,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub pruned: PruneReport,
    pub stages: Vec<StageOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.stages.iter().all(|stage| stage.succeeded)
    }
}

/// Bootstrap -> prune -> directories -> mysql -> mongo.
///
/// Stages run one after another and a failed stage does not stop its
/// siblings; only fatal errors end the run early.
pub async fn perform_backup_orchestration<S, P>(
    config: &BackupConfig,
    store: &S,
    producer: &P,
    retry_delay: Duration,
) -> Result<RunSummary, JobError>
where
    S: RemoteStore,
    P: ArtifactProducer,
{
    if !config.has_targets() {
        return Err(JobError::Fatal(
            "Nothing to back up: configure directories, mysql or mongo".to_string(),
        ));
    }
    let jobs = BackupJob::plan(config);

    let remote_dir = config.remote.path.as_str();
    let listing = bootstrap::ensure_remote_dir(store, remote_dir)
        .await
        .map_err(|e| match e {
            JobError::Fatal(_) => e,
            other => JobError::Fatal(other.to_string()),
        })?;

    let matcher = FilenameMatcher::new(&config.name)
        .map_err(|e| JobError::Fatal(format!("Invalid backup name pattern: {}", e)))?;
    let pruned = retention::prune_expired(
        store,
        remote_dir,
        &listing,
        &matcher,
        config.days_to_keep,
        Utc::now(),
    )
    .await;

    let mut summary = RunSummary {
        pruned,
        stages: Vec::with_capacity(jobs.len()),
    };

    for job in &jobs {
        let label = job.label();
        let stage = label.as_str();
        info!("🚀 Starting {} backup", stage);

        let outcome = retry::run_with_retries(
            store,
            remote_dir,
            stage,
            config.retries,
            retry_delay,
            |attempt| async move {
                if attempt > 1 {
                    info!("{} backup attempt {}", stage, attempt);
                }
                let artifact = producer.produce(&config.name, job)?;
                upload::upload_artifact(store, remote_dir, artifact).await
            },
        )
        .await;

        let attempts = outcome.attempts;
        match outcome.result {
            Ok(()) => {
                info!("✅ {} backup completed", label);
                summary.stages.push(StageOutcome { label, succeeded: true, attempts });
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("❌ {} backup failed after {} attempts: {}", label, attempts, e);
                summary.stages.push(StageOutcome { label, succeeded: false, attempts });
            }
        }
    }

    Ok(summary)
}
