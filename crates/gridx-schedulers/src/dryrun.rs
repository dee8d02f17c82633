//! Dry-run envelope.
//!
//! Holds what a backend *would* submit, plus a renderer for showing it to a
//! human. Building one never contacts the cluster, so a dry run can be
//! repeated and discarded freely.

use std::fmt;
use std::sync::Arc;

use gridx_specs::{AppDef, RunConfig};
use serde::Serialize;

type Renderer<R> = Arc<dyn Fn(&R) -> String + Send + Sync>;

/// A prepared, not-yet-submitted backend request.
pub struct DryRunInfo<R> {
    request: R,
    renderer: Renderer<R>,
    pub(crate) app: Option<AppDef>,
    pub(crate) cfg: Option<RunConfig>,
}

impl<R> DryRunInfo<R> {
    /// Wrap `request` with a renderer. The renderer must be pure.
    pub fn new<F>(request: R, renderer: F) -> Self
    where
        F: Fn(&R) -> String + Send + Sync + 'static,
    {
        Self {
            request,
            renderer: Arc::new(renderer),
            app: None,
            cfg: None,
        }
    }

    pub fn request(&self) -> &R {
        &self.request
    }

    pub fn into_request(self) -> R {
        self.request
    }

    /// Human-readable form of the request.
    pub fn render(&self) -> String {
        (self.renderer)(&self.request)
    }

    /// The app this request was built from, once the scheduler has
    /// processed it.
    pub fn app(&self) -> Option<&AppDef> {
        self.app.as_ref()
    }

    /// The validated config this request was built with.
    pub fn cfg(&self) -> Option<&RunConfig> {
        self.cfg.as_ref()
    }
}

impl<R: Serialize> DryRunInfo<R> {
    /// Render the request as pretty-printed JSON.
    pub fn with_json_renderer(request: R) -> Self {
        Self::new(request, |req| {
            serde_json::to_string_pretty(req)
                .unwrap_or_else(|e| format!("<unrenderable request: {e}>"))
        })
    }
}

impl<R: fmt::Debug> DryRunInfo<R> {
    /// Render the request with its pretty `Debug` form.
    pub fn with_debug_renderer(request: R) -> Self {
        Self::new(request, |req| format!("{req:#?}"))
    }
}

impl<R: Clone> Clone for DryRunInfo<R> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            renderer: Arc::clone(&self.renderer),
            app: self.app.clone(),
            cfg: self.cfg.clone(),
        }
    }
}

impl<R> fmt::Display for DryRunInfo<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl<R: fmt::Debug> fmt::Debug for DryRunInfo<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DryRunInfo")
            .field("request", &self.request)
            .field("app", &self.app.as_ref().map(|a| &a.name))
            .finish_non_exhaustive()
    }
}
