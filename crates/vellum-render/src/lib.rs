//! # Vellum Render - Template Environments for Content-Managed Sites
//!
//! `vellum-render` binds a content-management host to the MiniJinja template
//! engine. It collects the host's template directories, plugin snippets and
//! plugin-contributed component directories into one namespaced loader,
//! registers the host's helper callables as template functions, filters and
//! tests, and keeps the resulting environment around for repeated rendering.
//!
//! ## Core Concepts
//!
//! - [`Host`]: The boundary to the CMS (options, roots, plugins, helpers)
//! - [`EnvironmentBuilder`]: Assembles search paths and callables into an [`Environment`]
//! - [`Environment`]: Renders template files by path, or inline strings
//! - [`RenderContext`]: Holds the built environment and reuses it
//! - [`CallableTable`]: Ordered name → callable tables, with the `*` safe-output marker
//!
//! ## Quick Start
//!
//! ```rust
//! use vellum_render::{RenderContext, SiteHost};
//! use serde_json::json;
//!
//! let site = tempfile::tempdir().unwrap();
//! std::fs::create_dir_all(site.path().join("templates/pages")).unwrap();
//! std::fs::write(
//!     site.path().join("templates/pages/home.twig"),
//!     "<h1>{{ title }}</h1>",
//! ).unwrap();
//!
//! let host = SiteHost::new(site.path());
//! let context = RenderContext::new();
//!
//! let page = context
//!     .render_path(&host, site.path().join("templates/pages/home.twig"), json!({"title": "Fish & Chips"}))
//!     .unwrap();
//! assert_eq!(page, "<h1>Fish &amp; Chips</h1>");
//!
//! let inline = context
//!     .render_string(&host, "Hello {{ name }}", json!({"name": "World"}))
//!     .unwrap();
//! assert_eq!(inline, "Hello World");
//! ```
//!
//! ## Helpers and Safe Output
//!
//! Template functions map onto host helpers by name. A `*` in front of the
//! declared name marks the helper's output as markup that is not escaped:
//!
//! ```rust
//! use vellum_render::{Callable, Environment, SiteHost};
//! use vellum_render::config::OptionStore;
//! use minijinja::Value;
//! use serde_json::json;
//!
//! let site = tempfile::tempdir().unwrap();
//! std::fs::create_dir_all(site.path().join("templates")).unwrap();
//!
//! let bold = Callable::from_fn(|args| {
//!     Ok(Value::from(format!("<b>{}</b>", args[0])))
//! });
//! let host = SiteHost::new(site.path())
//!     .with_helper("bold", bold)
//!     .with_options(OptionStore::new().with(
//!         "vellum.env.functions",
//!         json!({"*strong": "bold", "loud": "bold"}),
//!     ));
//!
//! let env = Environment::builder(&host).build().unwrap();
//! let out = env.render_string("{{ strong('a') }} {{ loud('b') }}", json!({})).unwrap();
//! assert!(out.starts_with("<b>a</b> &lt;b&gt;b&lt;"));
//! ```
//!
//! ## Configuration
//!
//! Host options are read through [`Host::option`]. The keys and their
//! defaults are listed in the [`config`] module; [`config::OptionStore`]
//! loads them from YAML or JSON.

pub mod builder;
pub mod builtins;
pub mod callables;
pub mod config;
pub mod context;
pub mod environment;
mod error;
pub mod host;
pub mod loader;

pub use builder::{EnvironmentBuilder, OPTIONAL_NAMESPACES};
pub use callables::{
    Callable, CallableEntry, CallableKind, CallableSet, CallableTable, Extension, Target,
    DEFAULT_FUNCTIONS, DEFAULT_TESTS,
};
pub use config::{AutoescapeMode, CoreOptions, OptionStore};
pub use context::RenderContext;
pub use environment::Environment;
pub use error::{ConfigError, EnvError};
pub use host::{ComponentsPath, Host, Plugin, RootKind, SiteHost};
pub use loader::{SearchPaths, TemplateLoader, DEFAULT_NAMESPACE, TEMPLATE_EXTENSIONS};
