pub mod filename;

use anyhow::{Context, Result};
use std::path::PathBuf;
use which::which;

/// Finds an external tool (`tar`, `mysqldump`, `mongodump`) in the system PATH.
pub fn find_executable(name: &str) -> Result<PathBuf> {
    which(name).with_context(|| {
        format!("{} executable not found in PATH. Please ensure it is installed and in your PATH.", name)
    })
}
