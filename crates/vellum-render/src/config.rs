//! Host options and the engine's core settings.
//!
//! The host exposes configuration as a flat key/value store. This module
//! defines the keys the environment reads, an [`OptionStore`] that hosts can
//! use to hold them, and [`CoreOptions`], the resolved engine settings.
//!
//! # Option Keys
//!
//! | Key | Type | Default |
//! |-----|------|---------|
//! | `debug` | bool | `false` |
//! | `vellum.strict` | bool | value of `debug` |
//! | `vellum.autoescape` | string or `false` | `"html"` |
//! | `vellum.cache` | bool | `false` |
//! | `vellum.namespaces` | map name → path | none |
//! | `vellum.paths` | list of paths | none |
//! | `vellum.env.functions` | map name → helper | none |
//! | `vellum.env.filters` | map name → helper | none |
//! | `vellum.env.tests` | map name → helper | none |
//!
//! # Loading From YAML
//!
//! ```rust
//! use vellum_render::config::OptionStore;
//!
//! let options = OptionStore::from_yaml(r#"
//! debug: true
//! vellum.autoescape: false
//! vellum:
//!   paths:
//!     - /srv/shared/templates
//! "#).unwrap();
//!
//! assert_eq!(options.get("debug"), Some(&serde_json::json!(true)));
//! assert!(options.get("vellum.paths").is_some());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use minijinja::AutoEscape;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::host::{Host, RootKind};

pub const DEBUG: &str = "debug";
pub const STRICT: &str = "vellum.strict";
pub const AUTOESCAPE: &str = "vellum.autoescape";
pub const CACHE: &str = "vellum.cache";
pub const NAMESPACES: &str = "vellum.namespaces";
pub const PATHS: &str = "vellum.paths";
pub const FUNCTIONS: &str = "vellum.env.functions";
pub const FILTERS: &str = "vellum.env.filters";
pub const TESTS: &str = "vellum.env.tests";

/// Subdirectory of the host's cache root reserved for template artifacts.
pub const CACHE_SUBDIR: &str = "vellum";

/// Flat key/value option store.
///
/// Keys are looked up verbatim first (`"vellum.strict"` as a single key),
/// then as a dotted path into nested mappings (`vellum: { strict: true }`),
/// so both spellings of a config file work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionStore {
    values: Map<String, Value>,
}

impl OptionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a YAML document whose top level is a mapping.
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(source)?;
        Self::from_value(value)
    }

    /// Parses a JSON document whose top level is an object.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(source)?;
        Self::from_value(value)
    }

    /// Reads and parses a YAML options file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::new()),
            _ => Err(ConfigError::NotAMapping),
        }
    }

    /// Sets a flat key, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Looks up a key, flat first, then as a dotted path.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value);
        }
        let mut segments = key.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// How rendered output is escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoescapeMode {
    /// No escaping (`vellum.autoescape: false`).
    Disabled,
    /// HTML escaping for every template.
    #[default]
    Html,
    /// JSON escaping for every template.
    Json,
    /// Pick the strategy from the template name's extension.
    ByName,
}

impl AutoescapeMode {
    /// Interprets the `vellum.autoescape` option.
    ///
    /// Unknown strategy names fall back to HTML escaping.
    pub fn from_option(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => AutoescapeMode::Html,
            Some(Value::Bool(false)) => AutoescapeMode::Disabled,
            Some(Value::Bool(true)) => AutoescapeMode::Html,
            Some(Value::String(name)) => match name.to_ascii_lowercase().as_str() {
                "html" => AutoescapeMode::Html,
                "json" | "js" => AutoescapeMode::Json,
                "name" => AutoescapeMode::ByName,
                "" | "false" | "none" => AutoescapeMode::Disabled,
                other => {
                    tracing::debug!("unknown autoescape strategy {:?}, using html", other);
                    AutoescapeMode::Html
                }
            },
            Some(other) => {
                tracing::debug!("ignoring non-string autoescape option {}", other);
                AutoescapeMode::Html
            }
        }
    }

    /// Resolves the engine's escape strategy for a template name.
    pub fn resolve(self, name: &str) -> AutoEscape {
        match self {
            AutoescapeMode::Disabled => AutoEscape::None,
            AutoescapeMode::Html => AutoEscape::Html,
            AutoescapeMode::Json => AutoEscape::Json,
            AutoescapeMode::ByName => minijinja::default_auto_escape_callback(name),
        }
    }
}

/// Engine settings resolved from host options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreOptions {
    /// Development mode; richer error output from the engine.
    pub debug: bool,
    /// Undefined variables are hard errors instead of empty values.
    pub strict_variables: bool,
    pub autoescape: AutoescapeMode,
    /// Directory reserved for compiled-template artifacts, if caching is on.
    ///
    /// MiniJinja keeps compiled templates in memory for the lifetime of the
    /// environment, so the directory is resolved for hosts that manage it
    /// but nothing is written there by this crate.
    pub cache_directory: Option<PathBuf>,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            debug: false,
            strict_variables: false,
            autoescape: AutoescapeMode::Html,
            cache_directory: None,
        }
    }
}

impl CoreOptions {
    /// Resolves core settings from the host's options and roots.
    pub fn from_host(host: &dyn Host) -> Self {
        let debug = flag(host, DEBUG).unwrap_or(false);
        let strict_variables = flag(host, STRICT).unwrap_or(debug);
        let autoescape = AutoescapeMode::from_option(host.option(AUTOESCAPE).as_ref());
        let cache_directory = if flag(host, CACHE).unwrap_or(false) {
            Some(host.root(RootKind::Cache).join(CACHE_SUBDIR))
        } else {
            None
        };

        Self {
            debug,
            strict_variables,
            autoescape,
            cache_directory,
        }
    }
}

/// Reads a boolean option, accepting `0`/`1` style numbers too.
fn flag(host: &dyn Host, key: &str) -> Option<bool> {
    match host.option(key)? {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::Null => None,
        other => {
            tracing::debug!("ignoring non-boolean option {} = {}", key, other);
            None
        }
    }
}
