use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use crate::validate::Diagnostic;

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid fragment name '{name}': {reason}")]
    Naming { name: String, reason: &'static str },

    #[error("invalid fragment '{name}': {reason}")]
    Fragment { name: String, reason: String },

    #[error("permission denied: {}", .path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration rejected: {}", summarize(.diagnostics))]
    Validation { diagnostics: Vec<Diagnostic> },

    #[error("validation timed out after {0:?}")]
    Timeout(Duration),

    #[error("service reload failed: {0}")]
    ServiceReload(String),

    #[error("fragment not found: {0}")]
    FragmentNotFound(String),

    #[error("command failed: {command}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map an IO error to `Permission` when the kind warrants it, keeping
/// the failing path either way.
pub(crate) fn io_at(path: &Path, source: std::io::Error) -> ProxyError {
    if source.kind() == std::io::ErrorKind::PermissionDenied {
        ProxyError::Permission {
            path: path.to_path_buf(),
            source,
        }
    } else {
        ProxyError::Io(source)
    }
}
