//! Application handle encoding.
//!
//! A handle addresses one submitted application on one backend session:
//! `aws_batch://alice/queue:trainer-1a2b3c` breaks down as backend
//! `aws_batch`, session `alice`, app id `queue:trainer-1a2b3c`. The app id is
//! whatever the backend returned and may itself contain `/`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SpecError, SpecResult};

const SCHEME_SEP: &str = "://";

/// Decoded form of an application handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppHandle {
    pub scheduler_backend: String,
    pub session_name: String,
    pub app_id: String,
}

impl AppHandle {
    /// Build a handle, rejecting backend or session names that would not
    /// survive a round trip through the string form.
    pub fn new(
        scheduler_backend: impl Into<String>,
        session_name: impl Into<String>,
        app_id: impl Into<String>,
    ) -> SpecResult<Self> {
        let handle = AppHandle {
            scheduler_backend: scheduler_backend.into(),
            session_name: session_name.into(),
            app_id: app_id.into(),
        };
        check_segment(&handle.render(), "backend", &handle.scheduler_backend)?;
        check_segment(&handle.render(), "session", &handle.session_name)?;
        if handle.app_id.is_empty() {
            return Err(SpecError::malformed_handle(
                &handle.render(),
                "app id is empty",
            ));
        }
        Ok(handle)
    }

    /// Check that `scheduler_backend` and `session_name` can prefix a handle,
    /// before there is an app id to put behind them.
    pub fn check_prefix(scheduler_backend: &str, session_name: &str) -> SpecResult<()> {
        let prefix = format!("{scheduler_backend}{SCHEME_SEP}{session_name}/");
        check_segment(&prefix, "backend", scheduler_backend)?;
        check_segment(&prefix, "session", session_name)
    }

    fn render(&self) -> String {
        format!(
            "{}{SCHEME_SEP}{}/{}",
            self.scheduler_backend, self.session_name, self.app_id
        )
    }
}

fn check_segment(handle: &str, what: &str, value: &str) -> SpecResult<()> {
    if value.is_empty() {
        return Err(SpecError::malformed_handle(
            handle,
            format!("{what} name is empty"),
        ));
    }
    if value.contains('/') || value.contains(SCHEME_SEP) {
        return Err(SpecError::malformed_handle(
            handle,
            format!("{what} name `{value}` contains a reserved separator"),
        ));
    }
    Ok(())
}

impl fmt::Display for AppHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for AppHandle {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_app_handle(s)
    }
}

/// Encode `<backend>://<session>/<app_id>`.
pub fn make_app_handle(scheduler_backend: &str, session_name: &str, app_id: &str) -> SpecResult<String> {
    Ok(AppHandle::new(scheduler_backend, session_name, app_id)?.to_string())
}

/// Decode `<backend>://<session>/<app_id>`.
pub fn parse_app_handle(handle: &str) -> SpecResult<AppHandle> {
    let (backend, rest) = handle
        .split_once(SCHEME_SEP)
        .ok_or_else(|| SpecError::malformed_handle(handle, "expected <backend>://<session>/<app_id>"))?;
    let (session, app_id) = rest
        .split_once('/')
        .ok_or_else(|| SpecError::malformed_handle(handle, "missing app id"))?;

    if backend.is_empty() {
        return Err(SpecError::malformed_handle(handle, "backend name is empty"));
    }
    if backend.contains('/') {
        return Err(SpecError::malformed_handle(handle, "backend name contains `/`"));
    }
    if session.is_empty() {
        return Err(SpecError::malformed_handle(handle, "session name is empty"));
    }
    if app_id.is_empty() {
        return Err(SpecError::malformed_handle(handle, "app id is empty"));
    }

    Ok(AppHandle {
        scheduler_backend: backend.to_string(),
        session_name: session.to_string(),
        app_id: app_id.to_string(),
    })
}
