// backup-dav/src/backup/db_dump.rs
use bytes::Bytes;
use flate2::read::GzEncoder;
use flate2::Compression;
use std::io::{self, Read};
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::io::{ReaderStream, SyncIoBridge};
use tracing::info;

use super::{Artifact, ByteStream};
use crate::config::{MongoConfig, MysqlConfig};
use crate::errors::JobError;
use crate::utils::find_executable;

/// Compressed chunks buffered between the gzip stage and the upload.
const CHANNEL_CAPACITY: usize = 8;
const CHUNK_SIZE: usize = 64 * 1024;

/// Spawns `mysqldump` for one database and gzips its SQL output in-process.
pub fn spawn_mysql_dump(filename: String, mysql: &MysqlConfig) -> Result<Artifact, JobError> {
    let mysqldump = find_executable("mysqldump").map_err(|e| JobError::Retryable(e.to_string()))?;

    info!("🔍 Dumping mysql database {} into {}", mysql.database, filename);
    let mut child = Command::new(&mysqldump)
        .args(mysqldump_args(mysql))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| JobError::Retryable(format!("Failed to spawn {}: {}", mysqldump.display(), e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| JobError::Retryable("mysqldump stdout was not captured".to_string()))?;
    let (body, compressor) = gzip_stream(stdout);

    let artifact_name = filename.clone();
    let completion = async move {
        let status = child
            .wait()
            .await
            .map_err(|e| JobError::with_artifact(&artifact_name, format!("Failed to wait for mysqldump: {}", e)))?;
        let compressed = compressor
            .await
            .map_err(|e| JobError::with_artifact(&artifact_name, format!("gzip stage aborted: {}", e)))?;

        if !status.success() {
            return Err(JobError::with_artifact(
                &artifact_name,
                format!("mysqldump exited with {}", describe_exit(status)),
            ));
        }
        compressed.map_err(|e| JobError::with_artifact(&artifact_name, format!("gzip stage failed: {}", e)))
    };

    Ok(Artifact {
        filename,
        body,
        completion: Box::pin(completion),
    })
}

/// Spawns `mongodump` in archive mode; it compresses on its own.
pub fn spawn_mongo_dump(filename: String, mongo: &MongoConfig) -> Result<Artifact, JobError> {
    let mongodump = find_executable("mongodump").map_err(|e| JobError::Retryable(e.to_string()))?;

    info!("🔍 Dumping mongo database {} into {}", mongo.database, filename);
    let mut child = Command::new(&mongodump)
        .args(mongodump_args(mongo))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| JobError::Retryable(format!("Failed to spawn {}: {}", mongodump.display(), e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| JobError::Retryable("mongodump stdout was not captured".to_string()))?;

    let artifact_name = filename.clone();
    let completion = async move {
        let status = child
            .wait()
            .await
            .map_err(|e| JobError::with_artifact(&artifact_name, format!("Failed to wait for mongodump: {}", e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(JobError::with_artifact(
                &artifact_name,
                format!("mongodump exited with {}", describe_exit(status)),
            ))
        }
    };

    Ok(Artifact {
        filename,
        body: Box::pin(ReaderStream::new(stdout)),
        completion: Box::pin(completion),
    })
}

fn mysqldump_args(mysql: &MysqlConfig) -> Vec<String> {
    let mut args = vec![
        "-h".to_string(),
        mysql.host.clone(),
        "-P".to_string(),
        mysql.port.to_string(),
        "-u".to_string(),
        mysql.user.clone(),
    ];
    if !mysql.password.is_empty() {
        args.push(format!("--password={}", mysql.password));
    }
    args.extend(
        ["--single-transaction", "--routines", "--triggers"]
            .into_iter()
            .map(String::from),
    );
    args.push(mysql.database.clone());
    args
}

fn mongodump_args(mongo: &MongoConfig) -> Vec<String> {
    let mut args = vec![
        "--host".to_string(),
        mongo.host.clone(),
        "--port".to_string(),
        mongo.port.to_string(),
        "--username".to_string(),
        mongo.user.clone(),
    ];
    if !mongo.password.is_empty() {
        args.push("--password".to_string());
        args.push(mongo.password.clone());
    }
    args.extend([
        "--authenticationDatabase".to_string(),
        mongo.auth_database.clone(),
        "--db".to_string(),
        mongo.database.clone(),
        "--archive".to_string(),
        "--gzip".to_string(),
    ]);
    args
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Gzips `reader` on a blocking thread.
///
/// Compressed chunks travel over a bounded channel, so a slow consumer
/// stalls compression and, through the pipe, the dumping process. The
/// handle resolves to the compressor's own result.
pub fn gzip_stream<R>(reader: R) -> (ByteStream, JoinHandle<io::Result<()>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_CAPACITY);
    let bridge = SyncIoBridge::new(reader);

    let handle = tokio::task::spawn_blocking(move || {
        let mut encoder = GzEncoder::new(bridge, Compression::default());
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = match encoder.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.blocking_send(Err(io::Error::new(e.kind(), e.to_string())));
                    return Err(e);
                }
            };
            if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "compressed stream was dropped before the dump finished",
                ));
            }
        }
    });

    let body = futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|chunk| (chunk, rx)) });
    (Box::pin(body), handle)
}
