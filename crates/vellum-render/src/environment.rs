//! The built rendering environment.
//!
//! An [`Environment`] is produced by [`EnvironmentBuilder`] and owns the
//! engine together with its loader. It renders either a template file,
//! addressed by filesystem path, or an inline template string.
//!
//! # Rendering a File
//!
//! [`Environment::render_path`] accepts the path the host resolved for a
//! page template and turns it into the logical name the loader understands:
//!
//! ```text
//! /srv/site/templates/pages/home.twig  ->  pages/home.twig
//! C:\site\templates\pages\home.twig    ->  pages/home.twig   (root C:/site/templates)
//! ```
//!
//! Errors from the engine are passed through as [`EnvError::TemplateNotFound`]
//! or [`EnvError::Render`]; nothing is retried and no fallback output is
//! produced.

use std::fmt;
use std::path::{Path, PathBuf};

use minijinja::Value;
use serde::Serialize;

use crate::builder::EnvironmentBuilder;
use crate::callables::{CallableKind, CallableSet, CallableTable};
use crate::config::CoreOptions;
use crate::error::EnvError;
use crate::host::Host;
use crate::loader::{self, SearchPaths, TemplateLoader};

/// A configured engine plus its template loader.
pub struct Environment {
    pub(crate) engine: minijinja::Environment<'static>,
    pub(crate) loader: TemplateLoader,
    pub(crate) template_dir: PathBuf,
    pub(crate) view_path: Option<PathBuf>,
    pub(crate) options: CoreOptions,
    pub(crate) registered: CallableSet,
}

impl Environment {
    /// Starts building an environment for `host`.
    pub fn builder(host: &dyn Host) -> EnvironmentBuilder<'_> {
        EnvironmentBuilder::new(host)
    }

    /// Renders the template file at `file_path` with `data` as variables.
    ///
    /// The path may be absolute or already logical and may mix `/` and `\`.
    ///
    /// # Errors
    ///
    /// [`EnvError::TemplateNotFound`] if no search path holds the template,
    /// [`EnvError::Render`] if it fails to compile or evaluate.
    pub fn render_path<S: Serialize>(
        &self,
        file_path: impl AsRef<Path>,
        data: S,
    ) -> Result<String, EnvError> {
        let name = self.logical_path(file_path.as_ref());
        tracing::trace!("rendering template {:?}", name);
        let template = self.engine.get_template(&name)?;
        Ok(template.render(Value::from_serialize(&data))?)
    }

    /// Compiles `source` as an anonymous template and renders it.
    ///
    /// The template is not cached under any name. Includes and imports inside
    /// it resolve through the loader like any other template.
    ///
    /// ```rust,ignore
    /// let out = env.render_string("Hello {{ name }}", serde_json::json!({"name": "World"}))?;
    /// assert_eq!(out, "Hello World");
    /// ```
    pub fn render_string<S: Serialize>(&self, source: &str, data: S) -> Result<String, EnvError> {
        Ok(self
            .engine
            .render_str(source, Value::from_serialize(&data))?)
    }

    /// Converts a file path into the logical name used for lookup.
    ///
    /// The template root is stripped if the path lies below it; otherwise the
    /// view path is tried, and failing both the normalized path is used as is.
    pub fn logical_path(&self, file_path: &Path) -> String {
        loader::relative_to(&self.template_dir, file_path)
            .or_else(|| {
                self.view_path
                    .as_deref()
                    .and_then(|view| loader::relative_to(view, file_path))
            })
            .unwrap_or_else(|| loader::logical_path(Path::new(""), file_path))
    }

    /// Appends a search directory to a namespace.
    ///
    /// Templates the engine already loaded stay cached, so only lookups of
    /// templates not yet rendered can be affected.
    pub fn add_path(&self, path: impl Into<PathBuf>, namespace: &str) {
        self.loader.add_path(path, namespace);
    }

    /// The primary template root.
    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// The plugin view directory this environment was built for, if any.
    pub fn view_path(&self) -> Option<&Path> {
        self.view_path.as_deref()
    }

    pub fn options(&self) -> &CoreOptions {
        &self.options
    }

    /// Copy of the loader's current search paths.
    pub fn search_paths(&self) -> SearchPaths {
        self.loader.snapshot()
    }

    /// Callables that were registered, after skipping and overrides.
    pub fn registered(&self, kind: CallableKind) -> &CallableTable {
        self.registered.table(kind)
    }

    /// The underlying MiniJinja environment.
    pub fn engine(&self) -> &minijinja::Environment<'static> {
        &self.engine
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("template_dir", &self.template_dir)
            .field("view_path", &self.view_path)
            .field("options", &self.options)
            .field("search_paths", &self.loader.snapshot())
            .finish_non_exhaustive()
    }
}
