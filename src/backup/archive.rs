// backup-dav/src/backup/archive.rs
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use super::Artifact;
use crate::errors::JobError;
use crate::utils::find_executable;

/// Spawns `tar` to stream a gzipped archive of `directories` on stdout.
///
/// Paths are stored absolute. Exit code 1 (files changed while being read)
/// still counts as a usable archive.
pub fn spawn_directory_archive(
    filename: String,
    directories: &[PathBuf],
    exclude: &[PathBuf],
) -> Result<Artifact, JobError> {
    let tar = find_executable("tar").map_err(|e| JobError::Retryable(e.to_string()))?;

    info!("📦 Archiving {:?} into {}", directories, filename);
    let mut child = Command::new(&tar)
        .args(tar_args(directories, exclude))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| JobError::Retryable(format!("Failed to spawn {}: {}", tar.display(), e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| JobError::Retryable("tar stdout was not captured".to_string()))?;

    let artifact_name = filename.clone();
    let completion = async move {
        let status = child
            .wait()
            .await
            .map_err(|e| JobError::with_artifact(&artifact_name, format!("Failed to wait for tar: {}", e)))?;
        check_tar_exit(status.code(), &artifact_name)
    };

    Ok(Artifact {
        filename,
        body: Box::pin(ReaderStream::new(stdout)),
        completion: Box::pin(completion),
    })
}

fn tar_args(directories: &[PathBuf], exclude: &[PathBuf]) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-c", "-z", "-P", "-f", "-", "--warning=no-file-changed", "--warning=no-file-removed"]
        .into_iter()
        .map(OsString::from)
        .collect();

    // --exclude only applies to names that follow it
    for path in exclude {
        let mut flag = OsString::from("--exclude=");
        flag.push(path);
        args.push(flag);
    }
    args.extend(directories.iter().map(|d| d.as_os_str().to_owned()));
    args
}

fn check_tar_exit(code: Option<i32>, filename: &str) -> Result<(), JobError> {
    match code {
        Some(0) => Ok(()),
        Some(1) => {
            warn!("tar reported files that changed or vanished while archiving {}", filename);
            Ok(())
        }
        Some(code) => Err(JobError::with_artifact(filename, format!("tar exited with code {}", code))),
        None => Err(JobError::with_artifact(filename, "tar was terminated by a signal")),
    }
}
