//! Assembles an [`Environment`] from host configuration.
//!
//! The builder runs a fixed sequence of steps. Each step may append search
//! directories but never removes what an earlier step added, so the order
//! below is also the lookup priority of the default namespace:
//!
//! 1. Resolve core options (debug, strict variables, autoescape, cache).
//! 2. Root the loader at the host's template directory.
//! 3. Append the view path, if it differs from the template directory.
//! 4. Append the search root of every plugin snippet that is a template.
//! 5. Register namespaces: defaults merged with `vellum.namespaces`.
//! 6. Append the extra paths listed in `vellum.paths`.
//! 7. Append every plugin's template components directory.
//! 8. Create the engine with the loader and core options.
//! 9. Register `dump()`.
//! 10. Apply host extensions.
//! 11. Register functions, then filters, then tests.
//!
//! # Optional Namespaces
//!
//! `snippets`, `plugins` and `assets` are registered only if their directory
//! exists. Any other namespace is registered unconditionally; a missing
//! directory there shows up as a failed lookup when a template uses it.
//!
//! # Example
//!
//! ```rust,ignore
//! use vellum_render::{EnvironmentBuilder, SiteHost};
//!
//! let host = SiteHost::new("/srv/site");
//! let env = EnvironmentBuilder::new(&host)
//!     .view_path("/srv/site/plugins/blog/templates")
//!     .build()?;
//! ```

use std::path::{Path, PathBuf};

use minijinja::UndefinedBehavior;
use serde_json::Value as JsonValue;

use crate::builtins;
use crate::callables::{self, Callable, CallableKind, CallableSet, CallableTable, Target};
use crate::config::{self, CoreOptions};
use crate::environment::Environment;
use crate::error::EnvError;
use crate::host::{Host, RootKind};
use crate::loader::{self, SearchPaths, TemplateLoader, DEFAULT_NAMESPACE};

/// Namespaces skipped when their directory does not exist.
pub const OPTIONAL_NAMESPACES: &[&str] = &["snippets", "plugins", "assets"];

/// Builds an [`Environment`] for a host.
pub struct EnvironmentBuilder<'h> {
    host: &'h dyn Host,
    view_path: Option<PathBuf>,
}

impl<'h> EnvironmentBuilder<'h> {
    pub fn new(host: &'h dyn Host) -> Self {
        Self {
            host,
            view_path: None,
        }
    }

    /// Sets the directory the render was triggered from.
    ///
    /// Plugins that ship their own page templates pass their template
    /// directory here, so templates in it can be found next to the site's.
    pub fn view_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.view_path = Some(path.into());
        self
    }

    /// Runs every build step and returns the environment.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Loader`] if the host's template root is not an
    /// existing directory.
    pub fn build(self) -> Result<Environment, EnvError> {
        let host = self.host;
        let options = CoreOptions::from_host(host);
        let template_dir = host.root(RootKind::Templates);

        let mut paths = SearchPaths::rooted(&template_dir)?;
        let view_path = self
            .view_path
            .filter(|view| view.as_path() != template_dir.as_path());
        if let Some(view) = &view_path {
            paths.add_path(view, DEFAULT_NAMESPACE);
        }
        add_snippet_roots(host, &mut paths);
        add_namespaces(host, &template_dir, &mut paths);
        add_extra_paths(host, &mut paths);
        add_component_paths(host, &mut paths);
        tracing::debug!(
            "template search paths for {}: {:?}",
            template_dir.display(),
            paths
        );

        let loader = TemplateLoader::new(paths);
        let mut engine = new_engine(&options, loader.clone());
        builtins::register_dump(&mut engine);

        let mut registered = CallableSet::default();
        for extension in host.extensions() {
            let mut set = CallableSet::default();
            extension.contribute(&mut set);
            tracing::debug!("applying template extension {}", extension.name());
            register_set(host, &mut engine, &set, &mut registered);
        }

        let set = CallableSet {
            functions: merged(CallableTable::default_functions(), host, config::FUNCTIONS),
            filters: merged(CallableTable::new(), host, config::FILTERS),
            tests: merged(CallableTable::default_tests(), host, config::TESTS),
        };
        register_set(host, &mut engine, &set, &mut registered);

        Ok(Environment {
            engine,
            loader,
            template_dir,
            view_path,
            options,
            registered,
        })
    }
}

fn new_engine(options: &CoreOptions, loader: TemplateLoader) -> minijinja::Environment<'static> {
    let mut engine = minijinja::Environment::new();
    engine.set_debug(options.debug);
    engine.set_undefined_behavior(if options.strict_variables {
        UndefinedBehavior::Strict
    } else {
        UndefinedBehavior::Chainable
    });
    let autoescape = options.autoescape;
    engine.set_auto_escape_callback(move |name| autoescape.resolve(name));
    engine.set_loader(move |name| loader.load(name));
    engine
}

fn add_snippet_roots(host: &dyn Host, paths: &mut SearchPaths) {
    for (name, physical) in host.snippet_extensions() {
        if loader::template_extension(&physical.to_string_lossy()).is_none() {
            continue;
        }
        match loader::snippet_root(&name, &physical) {
            Some(root) => paths.add_path(root, DEFAULT_NAMESPACE),
            None => tracing::debug!(
                "snippet {:?} at {} has no search root, skipping",
                name,
                physical.display()
            ),
        }
    }
}

fn add_namespaces(host: &dyn Host, template_dir: &Path, paths: &mut SearchPaths) {
    let mut namespaces: Vec<(String, JsonValue)> = vec![
        ("templates".into(), path_value(template_dir)),
        ("snippets".into(), path_value(&host.root(RootKind::Snippets))),
        ("plugins".into(), path_value(&host.root(RootKind::Plugins))),
    ];

    match host.option(config::NAMESPACES) {
        None | Some(JsonValue::Null) => {}
        Some(JsonValue::Object(overrides)) => {
            for (name, value) in overrides {
                match namespaces.iter_mut().find(|(ns, _)| *ns == name) {
                    Some((_, existing)) => *existing = value,
                    None => namespaces.push((name, value)),
                }
            }
        }
        Some(other) => tracing::debug!("ignoring namespaces option that is not a mapping: {}", other),
    }

    for (name, value) in namespaces {
        let Some(dir) = value.as_str().filter(|s| !s.is_empty()) else {
            tracing::debug!("skipping namespace {:?}: not a path", name);
            continue;
        };
        let dir = Path::new(dir);
        if OPTIONAL_NAMESPACES.contains(&name.as_str()) && !dir.exists() {
            tracing::debug!(
                "skipping optional namespace {:?}: {} does not exist",
                name,
                dir.display()
            );
            continue;
        }
        paths.add_path(dir, &name);
    }
}

fn add_extra_paths(host: &dyn Host, paths: &mut SearchPaths) {
    match host.option(config::PATHS) {
        None | Some(JsonValue::Null) => {}
        Some(JsonValue::Array(entries)) => {
            for entry in entries {
                match entry.as_str().filter(|s| !s.is_empty()) {
                    Some(dir) => paths.add_path(dir, DEFAULT_NAMESPACE),
                    None => tracing::debug!("skipping search path entry {}", entry),
                }
            }
        }
        Some(JsonValue::String(dir)) if !dir.is_empty() => paths.add_path(dir, DEFAULT_NAMESPACE),
        Some(other) => tracing::debug!("ignoring paths option {}", other),
    }
}

fn add_component_paths(host: &dyn Host, paths: &mut SearchPaths) {
    for plugin in host.plugins() {
        if let Some(components) = &plugin.template_components {
            let dir = components.resolve();
            if dir.as_os_str().is_empty() {
                tracing::debug!("plugin {} declares an empty components path, skipping", plugin.id);
                continue;
            }
            tracing::debug!(
                "plugin {} contributes template components at {}",
                plugin.id,
                dir.display()
            );
            paths.add_path(dir, DEFAULT_NAMESPACE);
        }
    }
}

fn path_value(path: &Path) -> JsonValue {
    JsonValue::String(path.to_string_lossy().into_owned())
}

/// `defaults` with the host's table from `key` merged over it.
fn merged(mut defaults: CallableTable, host: &dyn Host, key: &str) -> CallableTable {
    defaults.merge(CallableTable::from_option(host.option(key).as_ref()));
    defaults
}

/// Resolves a target: callables as is, helper names via host then builtins.
fn resolve(host: &dyn Host, target: &Target) -> Option<Callable> {
    match target {
        Target::Callable(callable) => Some(callable.clone()),
        Target::Helper(name) => host.helper(name).or_else(|| builtins::helper(name)),
    }
}

fn register_set(
    host: &dyn Host,
    engine: &mut minijinja::Environment<'static>,
    set: &CallableSet,
    registered: &mut CallableSet,
) {
    for kind in [CallableKind::Function, CallableKind::Filter, CallableKind::Test] {
        let done = match kind {
            CallableKind::Function => &mut registered.functions,
            CallableKind::Filter => &mut registered.filters,
            CallableKind::Test => &mut registered.tests,
        };
        for entry in set.table(kind).iter() {
            match resolve(host, &entry.target) {
                Some(callable) => {
                    callables::register(engine, kind, entry, callable.clone());
                    done.insert(entry.declared.clone(), callable);
                }
                None => tracing::debug!(
                    "skipping {} {:?}: target is not invocable",
                    kind,
                    entry.declared
                ),
            }
        }
    }
}
