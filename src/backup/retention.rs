// backup-dav/src/backup/retention.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::utils::filename::FilenameMatcher;
use crate::webdav::{join_path, RemoteEntry, RemoteStore};

/// What the pruning pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: usize,
    pub failed: usize,
}

/// Entries that are backup files of this run older than the window.
///
/// A missing or non-positive `days_to_keep` keeps everything, and so does a
/// window reaching past the earliest representable date. Entries without a
/// last-modified date are never selected.
pub fn select_expired<'a>(
    entries: &'a [RemoteEntry],
    matcher: &FilenameMatcher,
    days_to_keep: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<&'a RemoteEntry> {
    let Some(days) = days_to_keep.filter(|d| *d > 0) else {
        return Vec::new();
    };
    let Some(cutoff) = Duration::try_days(days).and_then(|window| now.checked_sub_signed(window)) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| entry.is_file() && matcher.is_match(&entry.name))
        .filter(|entry| entry.last_modified.is_some_and(|modified| modified < cutoff))
        .collect()
}

/// Deletes expired backups from `remote_dir`. Best effort: delete failures
/// are logged and counted, never returned.
pub async fn prune_expired<S: RemoteStore>(
    store: &S,
    remote_dir: &str,
    entries: &[RemoteEntry],
    matcher: &FilenameMatcher,
    days_to_keep: Option<i64>,
    now: DateTime<Utc>,
) -> PruneReport {
    let mut report = PruneReport::default();
    let expired = select_expired(entries, matcher, days_to_keep, now);
    if expired.is_empty() {
        return report;
    }

    info!("🗑️ Removing {} backups older than {} days", expired.len(), days_to_keep.unwrap_or_default());
    for entry in expired {
        let path = join_path(remote_dir, &entry.name);
        match store.delete(&path).await {
            Ok(()) => {
                info!("Removed {}", path);
                report.deleted += 1;
            }
            Err(e) => {
                warn!("⚠️ Failed to remove old backup {}: {}", path, e);
                report.failed += 1;
            }
        }
    }
    report
}
