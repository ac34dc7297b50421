//! The host CMS boundary.
//!
//! Everything the environment needs from the content-management system goes
//! through the [`Host`] trait: option lookup, filesystem roots, plugin
//! snippets, plugin-contributed template directories, helper callables and
//! extensions. The trait is deliberately small so that a host can implement
//! it over whatever configuration and plugin registry it already has.
//!
//! [`SiteHost`] is a ready-made implementation for a site laid out on disk
//! with conventional subdirectories. It is what the tests use, and it is a
//! reasonable starting point for embedding.
//!
//! # Example
//!
//! ```rust
//! use vellum_render::config::OptionStore;
//! use vellum_render::host::{Plugin, RootKind, SiteHost, Host};
//!
//! let host = SiteHost::new("/srv/site")
//!     .with_options(OptionStore::new().with("debug", true))
//!     .with_snippet("cards/item", "/srv/site/plugins/cards/snippets/cards/item.twig")
//!     .with_plugin(Plugin::new("acme/blocks").with_components("/srv/site/plugins/blocks/components"));
//!
//! assert_eq!(host.root(RootKind::Templates), std::path::PathBuf::from("/srv/site/templates"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::callables::{Callable, Extension};
use crate::config::OptionStore;

/// Filesystem roots the host resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    Templates,
    Snippets,
    Plugins,
    Cache,
}

impl RootKind {
    /// Conventional directory name below a site root.
    pub fn dir_name(self) -> &'static str {
        match self {
            RootKind::Templates => "templates",
            RootKind::Snippets => "snippets",
            RootKind::Plugins => "plugins",
            RootKind::Cache => "cache",
        }
    }
}

/// Lazily produces a directory path.
pub type PathProducer = Arc<dyn Fn() -> PathBuf + Send + Sync>;

/// Where a plugin's template components live.
#[derive(Clone)]
pub enum ComponentsPath {
    /// A literal directory.
    Path(PathBuf),
    /// A producer invoked when the environment is built.
    Lazy(PathProducer),
}

impl ComponentsPath {
    /// Resolves the directory, invoking the producer if there is one.
    pub fn resolve(&self) -> PathBuf {
        match self {
            ComponentsPath::Path(path) => path.clone(),
            ComponentsPath::Lazy(produce) => produce(),
        }
    }
}

impl fmt::Debug for ComponentsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentsPath::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ComponentsPath::Lazy(_) => f.write_str("Lazy(<fn>)"),
        }
    }
}

/// An installed plugin, as far as template lookup is concerned.
#[derive(Debug, Clone)]
pub struct Plugin {
    pub id: String,
    pub template_components: Option<ComponentsPath>,
}

impl Plugin {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template_components: None,
        }
    }

    /// Declares a literal template components directory.
    pub fn with_components(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_components = Some(ComponentsPath::Path(path.into()));
        self
    }

    /// Declares a components directory computed when the environment is built.
    pub fn with_lazy_components<F>(mut self, produce: F) -> Self
    where
        F: Fn() -> PathBuf + Send + Sync + 'static,
    {
        self.template_components = Some(ComponentsPath::Lazy(Arc::new(produce)));
        self
    }
}

/// The host CMS as seen by the environment builder.
///
/// Only [`option`](Host::option) and [`root`](Host::root) are required; the
/// remaining methods default to "nothing contributed".
pub trait Host {
    /// Flat option lookup. `None` means "not configured".
    fn option(&self, key: &str) -> Option<Value>;

    /// Resolves one of the host's filesystem roots.
    fn root(&self, kind: RootKind) -> PathBuf;

    /// Plugin-registered snippets as `(logical name, physical path)` pairs,
    /// in registration order.
    fn snippet_extensions(&self) -> Vec<(String, PathBuf)> {
        Vec::new()
    }

    /// Installed plugins, in load order.
    fn plugins(&self) -> Vec<Plugin> {
        Vec::new()
    }

    /// Looks up a helper callable by its target name.
    fn helper(&self, _name: &str) -> Option<Callable> {
        None
    }

    /// Extensions that contribute extra functions, filters and tests.
    fn extensions(&self) -> Vec<Arc<dyn Extension>> {
        Vec::new()
    }
}

/// A [`Host`] over a site directory with conventional subdirectories.
///
/// Roots default to `<site>/templates`, `<site>/snippets`, `<site>/plugins`
/// and `<site>/cache`, and can be overridden one by one.
#[derive(Clone, Default)]
pub struct SiteHost {
    site_root: PathBuf,
    roots: HashMap<RootKind, PathBuf>,
    options: OptionStore,
    snippets: Vec<(String, PathBuf)>,
    plugins: Vec<Plugin>,
    helpers: HashMap<String, Callable>,
    extensions: Vec<Arc<dyn Extension>>,
}

impl SiteHost {
    pub fn new(site_root: impl Into<PathBuf>) -> Self {
        Self {
            site_root: site_root.into(),
            ..Self::default()
        }
    }

    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    pub fn with_root(mut self, kind: RootKind, path: impl Into<PathBuf>) -> Self {
        self.roots.insert(kind, path.into());
        self
    }

    pub fn with_options(mut self, options: OptionStore) -> Self {
        self.options = options;
        self
    }

    pub fn options_mut(&mut self) -> &mut OptionStore {
        &mut self.options
    }

    /// Registers a plugin snippet.
    pub fn with_snippet(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.snippets.push((name.into(), path.into()));
        self
    }

    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Adds a helper to the host's helper library, replacing any helper of
    /// the same name.
    pub fn with_helper(mut self, name: impl Into<String>, helper: Callable) -> Self {
        self.helpers.insert(name.into(), helper);
        self
    }

    pub fn with_extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }
}

impl fmt::Debug for SiteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut helpers: Vec<&String> = self.helpers.keys().collect();
        helpers.sort();
        f.debug_struct("SiteHost")
            .field("site_root", &self.site_root)
            .field("roots", &self.roots)
            .field("options", &self.options)
            .field("snippets", &self.snippets)
            .field("plugins", &self.plugins)
            .field("helpers", &helpers)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

impl Host for SiteHost {
    fn option(&self, key: &str) -> Option<Value> {
        self.options.get(key).cloned()
    }

    fn root(&self, kind: RootKind) -> PathBuf {
        self.roots
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| self.site_root.join(kind.dir_name()))
    }

    fn snippet_extensions(&self) -> Vec<(String, PathBuf)> {
        self.snippets.clone()
    }

    fn plugins(&self) -> Vec<Plugin> {
        self.plugins.clone()
    }

    fn helper(&self, name: &str) -> Option<Callable> {
        self.helpers.get(name).cloned()
    }

    fn extensions(&self) -> Vec<Arc<dyn Extension>> {
        self.extensions.clone()
    }
}
