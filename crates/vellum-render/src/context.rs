//! Holding on to the built environment.
//!
//! Building an environment walks plugin registries and touches the
//! filesystem, so it happens once and the result is reused for every render.
//! [`RenderContext`] is the slot that keeps it:
//!
//! - [`RenderContext::instance`] returns the current environment, building
//!   one with default arguments the first time.
//! - [`RenderContext::construct`] always builds and replaces the current
//!   environment. Use it when a render needs a plugin view path.
//!
//! Callers that want explicit ownership create their own slot with
//! [`RenderContext::new`] and pass it around. Hosts that prefer a single
//! process-wide slot use [`RenderContext::global`].
//!
//! # Example
//!
//! ```rust,ignore
//! use vellum_render::{RenderContext, SiteHost};
//!
//! let host = SiteHost::new("/srv/site");
//! let context = RenderContext::new();
//!
//! let page = context.render_path(&host, "/srv/site/templates/default.twig", &data)?;
//! let teaser = context.render_string(&host, "{{ title }}", &data)?;
//! ```
//!
//! # Thread Safety
//!
//! The slot is guarded by a mutex held for the whole build, so concurrent
//! first calls build once. The environment is shared behind an [`Arc`] and
//! renders take `&self`, so they can run concurrently once it is built.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::builder::EnvironmentBuilder;
use crate::environment::Environment;
use crate::error::EnvError;
use crate::host::Host;

static GLOBAL: Lazy<RenderContext> = Lazy::new(RenderContext::new);

/// Slot holding the most recently built [`Environment`].
#[derive(Debug, Default)]
pub struct RenderContext {
    slot: Mutex<Option<Arc<Environment>>>,
}

impl RenderContext {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot.
    pub fn global() -> &'static RenderContext {
        &GLOBAL
    }

    /// Returns the current environment, building a default one if the slot
    /// is empty.
    pub fn instance(&self, host: &dyn Host) -> Result<Arc<Environment>, EnvError> {
        let mut slot = self.lock();
        if let Some(env) = slot.as_ref() {
            return Ok(Arc::clone(env));
        }
        let env = Arc::new(EnvironmentBuilder::new(host).build()?);
        *slot = Some(Arc::clone(&env));
        Ok(env)
    }

    /// Builds a new environment and makes it the current one.
    ///
    /// The previous environment is dropped from the slot, not merged. If the
    /// build fails the slot is left untouched.
    pub fn construct(
        &self,
        host: &dyn Host,
        view_path: Option<&Path>,
    ) -> Result<Arc<Environment>, EnvError> {
        let mut builder = EnvironmentBuilder::new(host);
        if let Some(view) = view_path {
            builder = builder.view_path(view);
        }
        let env = builder.build()?;
        Ok(self.install(env))
    }

    /// Stores an already built environment as the current one.
    pub fn install(&self, env: Environment) -> Arc<Environment> {
        let env = Arc::new(env);
        *self.lock() = Some(Arc::clone(&env));
        env
    }

    /// The current environment, without building one.
    pub fn current(&self) -> Option<Arc<Environment>> {
        self.lock().clone()
    }

    /// Renders a template file through the current environment.
    pub fn render_path<S: Serialize>(
        &self,
        host: &dyn Host,
        file_path: impl AsRef<Path>,
        data: S,
    ) -> Result<String, EnvError> {
        self.instance(host)?.render_path(file_path, data)
    }

    /// Renders an inline template through the current environment.
    pub fn render_string<S: Serialize>(
        &self,
        host: &dyn Host,
        source: &str,
        data: S,
    ) -> Result<String, EnvError> {
        self.instance(host)?.render_string(source, data)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<Environment>>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
