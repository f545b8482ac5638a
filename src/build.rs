//! Compiles the debuggee source with optimizations disabled and debug
//! info retained, and hands back a path plus a cleanup guard.

use crate::error::{DebuggerError, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Owns the compiled debuggee artifact on disk and removes it on drop.
pub struct DebuggeeArtifact {
    path: PathBuf,
}

impl DebuggeeArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DebuggeeArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("failed to remove debuggee artifact {:?}: {}", self.path, e);
        }
    }
}

/// Builds `source_path` with `go build -gcflags 'all=-N -l'` into a
/// timestamp-named binary in the current directory.
pub fn build_debuggee_program(source_path: &Path) -> Result<DebuggeeArtifact> {
    let unix_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| DebuggerError::BuildFailed(e.to_string()))?
        .as_secs();
    let name = format!("__debug__{}", unix_time);

    debug!("building {:?} -> {}", source_path, name);

    let status = Command::new("go")
        .arg("build")
        .arg("-o")
        .arg(&name)
        .arg("-gcflags")
        .arg("all=-N -l")
        .arg(source_path)
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .status()
        .map_err(|e| DebuggerError::BuildFailed(format!("failed to run go build: {}", e)))?;

    if !status.success() {
        return Err(DebuggerError::BuildFailed(format!(
            "go build exited with {}",
            status
        )));
    }

    let abs_path = std::fs::canonicalize(&name)
        .map_err(|e| DebuggerError::BuildFailed(format!("failed to get absolute path: {}", e)))?;

    info!("built debuggee program at {:?}", abs_path);
    Ok(DebuggeeArtifact { path: abs_path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_path_round_trips() {
        let artifact = DebuggeeArtifact {
            path: PathBuf::from("/tmp/__debug__1234"),
        };
        assert_eq!(artifact.path(), Path::new("/tmp/__debug__1234"));
    }

    #[test]
    fn drop_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("__debug__test");
        std::fs::write(&file_path, b"binary").unwrap();
        assert!(file_path.exists());
        {
            let artifact = DebuggeeArtifact {
                path: file_path.clone(),
            };
            assert!(artifact.path().exists());
        }
        assert!(!file_path.exists());
    }
}
