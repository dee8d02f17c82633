//! Status snapshots reported by scheduler backends.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an application (or of one replica).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Unknown,
}

impl AppState {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppState::Succeeded | AppState::Failed | AppState::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppState::Pending => "PENDING",
            AppState::Running => "RUNNING",
            AppState::Succeeded => "SUCCEEDED",
            AppState::Failed => "FAILED",
            AppState::Cancelled => "CANCELLED",
            AppState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of one replica of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaStatus {
    pub id: u32,
    pub state: AppState,
    pub role: String,
    pub hostname: Option<String>,
}

/// Status of every replica of one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleStatus {
    pub role: String,
    pub replicas: Vec<ReplicaStatus>,
}

/// Read-only snapshot returned by a backend `describe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStatus {
    pub app_id: String,
    pub state: AppState,
    #[serde(default)]
    pub roles: Vec<RoleStatus>,
    /// Backend-provided detail, e.g. a failure reason.
    #[serde(default)]
    pub msg: String,
}

impl AppStatus {
    pub fn new(app_id: impl Into<String>, state: AppState) -> Self {
        Self {
            app_id: app_id.into(),
            state,
            roles: Vec::new(),
            msg: String::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn role(&self, name: &str) -> Option<&RoleStatus> {
        self.roles.iter().find(|r| r.role == name)
    }
}
