use thiserror::Error;

/// Failures talking to the WebDAV store.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Remote path not found: {0}")]
    NotFound(String),

    #[error("Remote store rejected credentials for {0}")]
    Unauthorized(String),

    #[error("Remote store has insufficient storage for {0}")]
    InsufficientStorage(String),

    #[error("Unexpected status {status} for {path}")]
    UnexpectedStatus { path: String, status: u16 },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed multistatus response: {0}")]
    Xml(String),
}

/// Outcome of a failed backup job attempt.
///
/// `Fatal` stops the whole run. The two retryable variants differ only in
/// whether a (possibly partial) remote artifact has to be removed first.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Fatal: {0}")]
    Fatal(String),

    #[error("{reason} (artifact {filename})")]
    RetryableWithArtifact { filename: String, reason: String },

    #[error("{0}")]
    Retryable(String),
}

impl JobError {
    pub fn with_artifact(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        JobError::RetryableWithArtifact {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// Filename of the remote artifact this failure left behind, if any.
    pub fn artifact(&self) -> Option<&str> {
        match self {
            JobError::RetryableWithArtifact { filename, .. } => Some(filename),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, JobError::Fatal(_))
    }
}

impl From<RemoteError> for JobError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unauthorized(_) | RemoteError::InsufficientStorage(_) => {
                JobError::Fatal(err.to_string())
            }
            other => JobError::Retryable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_only_on_tagged_variant() {
        let tagged = JobError::with_artifact("backup-a_2024-01-01_00-00-00-000.tgz", "tar exited 2");
        assert_eq!(tagged.artifact(), Some("backup-a_2024-01-01_00-00-00-000.tgz"));
        assert!(!tagged.is_fatal());

        assert_eq!(JobError::Retryable("boom".into()).artifact(), None);
        assert_eq!(JobError::Fatal("boom".into()).artifact(), None);
    }

    #[test]
    fn test_credential_and_quota_errors_become_fatal() {
        let unauthorized: JobError = RemoteError::Unauthorized("/backup".into()).into();
        assert!(unauthorized.is_fatal());

        let full: JobError = RemoteError::InsufficientStorage("/backup/x".into()).into();
        assert!(full.is_fatal());

        let missing: JobError = RemoteError::NotFound("/backup".into()).into();
        assert!(!missing.is_fatal());
    }
}
