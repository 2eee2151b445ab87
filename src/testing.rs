//! In-memory stand-ins for the remote store and the dump processes.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::sync::Mutex;

use crate::backup::{Artifact, ArtifactProducer, BackupJob};
use crate::errors::{JobError, RemoteError};
use crate::utils::filename::filename_now;
use crate::webdav::{RemoteEntry, RemoteStore};

#[derive(Default)]
struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, (Vec<u8>, DateTime<Utc>)>,
    calls: Vec<String>,
    deletes: Vec<String>,
    put_statuses: VecDeque<StatusCode>,
    failing_deletes: BTreeSet<String>,
    reject_credentials: bool,
    deletes_unauthorized: bool,
    list_status: Option<u16>,
}

/// Remote store keeping directories and files in maps and recording every
/// call as `"<METHOD> <path>"`.
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut state = State::default();
        state.dirs.insert("/".to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn add_dir(&self, path: &str) {
        self.state.lock().unwrap().dirs.insert(path.to_string());
    }

    pub fn add_file(&self, path: &str, age_days: i64) {
        let modified = Utc::now() - Duration::days(age_days);
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), (b"old".to_vec(), modified));
    }

    /// Next PUT answers with `status` instead of `201 Created`.
    pub fn queue_put_status(&self, status: StatusCode) {
        self.state.lock().unwrap().put_statuses.push_back(status);
    }

    pub fn reject_credentials(&self) {
        self.state.lock().unwrap().reject_credentials = true;
    }

    /// Every listing answers with `status` instead of a multistatus body.
    pub fn fail_listings_with(&self, status: u16) {
        self.state.lock().unwrap().list_status = Some(status);
    }

    pub fn fail_deletes_with_unauthorized(&self) {
        self.state.lock().unwrap().deletes_unauthorized = true;
    }

    pub fn fail_delete_of(&self, path: &str) {
        self.state.lock().unwrap().failing_deletes.insert(path.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }

    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).map(|(data, _)| data.clone())
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

impl RemoteStore for MemoryStore {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("LIST {}", path));
        if state.reject_credentials {
            return Err(RemoteError::Unauthorized(path.to_string()));
        }
        if let Some(status) = state.list_status {
            return Err(RemoteError::UnexpectedStatus {
                path: path.to_string(),
                status,
            });
        }
        if !state.dirs.contains(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }

        let dirs = state
            .dirs
            .iter()
            .filter(|d| d.as_str() != "/" && parent_of(d) == path)
            .map(|d| RemoteEntry {
                path: d.clone(),
                name: basename(d),
                is_dir: true,
                last_modified: None,
                size: None,
            });
        let files = state
            .files
            .iter()
            .filter(|(f, _)| parent_of(f) == path)
            .map(|(f, (data, modified))| RemoteEntry {
                path: f.clone(),
                name: basename(f),
                is_dir: false,
                last_modified: Some(*modified),
                size: Some(data.len() as u64),
            });
        Ok(dirs.chain(files).collect())
    }

    async fn create_dir(&self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("MKCOL {}", path));
        state.dirs.insert(path.to_string());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("DELETE {}", path));
        state.deletes.push(path.to_string());
        if state.deletes_unauthorized {
            return Err(RemoteError::Unauthorized(path.to_string()));
        }
        if state.failing_deletes.contains(path) {
            return Err(RemoteError::UnexpectedStatus {
                path: path.to_string(),
                status: 500,
            });
        }
        match state.files.remove(path) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn put_stream<S>(&self, path: &str, body: S) -> Result<StatusCode, RemoteError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        self.state.lock().unwrap().calls.push(format!("PUT {}", path));

        let chunks: Vec<io::Result<Bytes>> = body.collect().await;
        let data: Vec<u8> = chunks.into_iter().filter_map(Result::ok).flat_map(|c| c.to_vec()).collect();

        let mut state = self.state.lock().unwrap();
        let status = state.put_statuses.pop_front().unwrap_or(StatusCode::CREATED);
        if status == StatusCode::CREATED {
            state.files.insert(path.to_string(), (data, Utc::now()));
        }
        Ok(status)
    }
}

/// Artifact whose producer exits cleanly after emitting `data`.
pub fn ok_artifact(filename: &str, data: &'static [u8]) -> Artifact {
    Artifact {
        filename: filename.to_string(),
        body: Box::pin(futures::stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(data))])),
        completion: Box::pin(async { Ok::<(), JobError>(()) }),
    }
}

/// Artifact whose producer emits a few bytes and then exits with `code`.
pub fn failing_artifact(filename: &str, code: i32) -> Artifact {
    let name = filename.to_string();
    Artifact {
        filename: filename.to_string(),
        body: Box::pin(futures::stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"partial"))])),
        completion: Box::pin(async move {
            Err::<(), _>(JobError::with_artifact(name, format!("exited with code {}", code)))
        }),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Script {
    Succeed,
    Exit(i32),
}

/// Producer that plays back one scripted outcome per `produce` call and
/// remembers the filenames it handed out.
pub struct ScriptedProducer {
    script: Mutex<VecDeque<Script>>,
    filenames: Mutex<Vec<String>>,
}

impl ScriptedProducer {
    pub fn new(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            filenames: Mutex::new(Vec::new()),
        }
    }

    pub fn filenames(&self) -> Vec<String> {
        self.filenames.lock().unwrap().clone()
    }
}

impl ArtifactProducer for ScriptedProducer {
    fn produce(&self, run_name: &str, job: &BackupJob) -> Result<Artifact, JobError> {
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| JobError::Retryable("script exhausted".to_string()))?;
        let filename = filename_now(run_name, job.kind(), job.target());
        self.filenames.lock().unwrap().push(filename.clone());

        Ok(match step {
            Script::Succeed => ok_artifact(&filename, b"backup bytes"),
            Script::Exit(code) => failing_artifact(&filename, code),
        })
    }
}
