mod logic;
pub(crate) mod archive;
pub(crate) mod bootstrap;
pub(crate) mod db_dump;
pub(crate) mod retention;
pub(crate) mod retry;
pub(crate) mod upload;

pub use logic::RunSummary;

use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use crate::config::{BackupConfig, MongoConfig, MysqlConfig};
use crate::errors::JobError;
use crate::utils::filename::{filename_now, BackupKind};
use crate::webdav::RemoteStore;

/// Compressed artifact bytes as they leave the producing process.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Resolves once the producer has exited; failures name the artifact.
pub type Completion = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>;

/// A running producer: where its bytes go, and how it finished.
pub struct Artifact {
    pub filename: String,
    pub body: ByteStream,
    pub completion: Completion,
}

/// One backup target of a run.
#[derive(Debug, Clone)]
pub enum BackupJob {
    Directories {
        directories: Vec<PathBuf>,
        exclude: Vec<PathBuf>,
    },
    Mysql(MysqlConfig),
    Mongo(MongoConfig),
}

impl BackupJob {
    /// Jobs in run order: directories, then relational, then document store.
    pub fn plan(config: &BackupConfig) -> Vec<BackupJob> {
        let mut jobs = Vec::new();
        if !config.directories.is_empty() {
            jobs.push(BackupJob::Directories {
                directories: config.directories.clone(),
                exclude: config.exclude.clone(),
            });
        }
        if let Some(mysql) = &config.mysql {
            jobs.push(BackupJob::Mysql(mysql.clone()));
        }
        if let Some(mongo) = &config.mongo {
            jobs.push(BackupJob::Mongo(mongo.clone()));
        }
        jobs
    }

    pub fn kind(&self) -> BackupKind {
        match self {
            BackupJob::Directories { .. } => BackupKind::Directory,
            BackupJob::Mysql(_) => BackupKind::Mysql,
            BackupJob::Mongo(_) => BackupKind::Mongo,
        }
    }

    /// Database name embedded in the artifact filename.
    pub fn target(&self) -> Option<&str> {
        match self {
            BackupJob::Directories { .. } => None,
            BackupJob::Mysql(db) => Some(&db.database),
            BackupJob::Mongo(db) => Some(&db.database),
        }
    }

    pub fn label(&self) -> String {
        match self {
            BackupJob::Directories { directories, .. } => format!("directories ({})", directories.len()),
            BackupJob::Mysql(db) => format!("mysql:{}", db.database),
            BackupJob::Mongo(db) => format!("mongo:{}", db.database),
        }
    }
}

/// Starts the external process behind a job.
pub trait ArtifactProducer {
    fn produce(&self, run_name: &str, job: &BackupJob) -> Result<Artifact, JobError>;
}

/// Producer backed by `tar`, `mysqldump` and `mongodump`.
pub struct ProcessProducer;

impl ArtifactProducer for ProcessProducer {
    fn produce(&self, run_name: &str, job: &BackupJob) -> Result<Artifact, JobError> {
        let filename = filename_now(run_name, job.kind(), job.target());
        match job {
            BackupJob::Directories { directories, exclude } => {
                archive::spawn_directory_archive(filename, directories, exclude)
            }
            BackupJob::Mysql(mysql) => db_dump::spawn_mysql_dump(filename, mysql),
            BackupJob::Mongo(mongo) => db_dump::spawn_mongo_dump(filename, mongo),
        }
    }
}

/// Public entry point for the backup process.
/// Bootstraps the remote directory, prunes old artifacts and runs every
/// configured job.
pub async fn run_backup_flow<S, P>(
    config: &BackupConfig,
    store: &S,
    producer: &P,
) -> Result<RunSummary, JobError>
where
    S: RemoteStore,
    P: ArtifactProducer,
{
    logic::perform_backup_orchestration(config, store, producer, retry::RETRY_DELAY).await
}
