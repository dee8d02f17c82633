//! Scheduler error types.

use gridx_specs::SpecError;
use thiserror::Error;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid config, malformed handle, unknown resource, or invalid app.
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("role `{role}` has no resource; set one explicitly or resolve a named resource")]
    ResourceUnresolved { role: String },

    #[error("scheduler `{0}` does not support workspaces")]
    WorkspaceUnsupported(String),

    #[error("failed to build workspace `{workspace}`: {source}")]
    Workspace {
        workspace: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("pre-processing of role `{role}` failed: {source}")]
    RolePreProc {
        role: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid log filter `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown scheduler `{name}` (available: {available})")]
    UnknownScheduler { name: String, available: String },

    /// Failure reported by the backend itself. Never retried here.
    #[error("{backend} {op} failed: {source}")]
    Backend {
        backend: String,
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl SchedulerError {
    pub(crate) fn backend(backend: &str, op: &'static str, source: anyhow::Error) -> Self {
        SchedulerError::Backend {
            backend: backend.to_string(),
            op,
            source,
        }
    }

    /// The run config failed validation against the backend's options.
    pub fn is_config_error(&self) -> bool {
        matches!(self, SchedulerError::Spec(SpecError::InvalidRunConfig(_)))
    }

    pub fn is_backend_error(&self) -> bool {
        matches!(self, SchedulerError::Backend { .. })
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
