//! Typed registry of template functions, filters and tests.
//!
//! Templates call into the host through three kinds of callables:
//!
//! - functions: `{{ url("blog") }}`
//! - filters: `{{ title | slug }}`
//! - tests: `{% if value is of_type("array") %}`
//!
//! Each kind has its own [`CallableTable`], an ordered table keyed by the
//! name templates use. A table entry pairs a *declared name* with a
//! [`Target`], either a [`Callable`] value or the name of a host helper that
//! is resolved when the environment is built.
//!
//! # Safe Output Marker
//!
//! A declared name starting with `*` marks the callable's output as safe:
//! the exposed name drops the `*` and the result bypasses autoescaping.
//! Strings and plain objects are emitted through their display form;
//! sequences, maps and other values are returned unchanged and are escaped
//! like any other value when printed. `*html` is exposed as `html` and its markup is emitted
//! verbatim, while `option` is exposed as `option` and its result is escaped.
//! Tests accept the marker but ignore it, since they only produce booleans.
//!
//! # Skipped Entries
//!
//! Entries that cannot be registered are dropped without an error: a
//! declared name that is empty once the markers are removed, a configured
//! target that is not a helper name, or a helper name nothing provides.
//!
//! # Default Tables
//!
//! [`DEFAULT_FUNCTIONS`] and [`DEFAULT_TESTS`] map the host's helper library
//! into templates one to one. Templates depend on these names; renaming or
//! removing an entry breaks them.

use std::fmt;
use std::sync::Arc;

use minijinja::value::{Rest, ValueKind};
use minijinja::{Error, State, Value};
use serde_json::Value as JsonValue;

/// Signature shared by every registered callable.
///
/// Filters receive the filtered value as the first argument.
pub type CallableFn = dyn Fn(&State<'_, '_>, &[Value]) -> Result<Value, Error> + Send + Sync;

/// A cheaply clonable callable.
#[derive(Clone)]
pub struct Callable(Arc<CallableFn>);

impl Callable {
    /// Wraps a closure that needs the render state.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&State<'_, '_>, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Callable(Arc::new(f))
    }

    /// Wraps a closure that only looks at its arguments.
    ///
    /// ```rust
    /// use vellum_render::callables::Callable;
    /// use minijinja::Value;
    ///
    /// let upper = Callable::from_fn(|args| {
    ///     Ok(Value::from(args.first().map(|v| v.to_string().to_uppercase()).unwrap_or_default()))
    /// });
    /// ```
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Callable(Arc::new(move |_: &State<'_, '_>, args: &[Value]| f(args)))
    }

    pub fn call(&self, state: &State<'_, '_>, args: &[Value]) -> Result<Value, Error> {
        (self.0)(state, args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(<fn>)")
    }
}

/// What a table entry points at.
#[derive(Debug, Clone)]
pub enum Target {
    /// A callable value, registered as is.
    Callable(Callable),
    /// A helper name, resolved against the host and builtins at build time.
    Helper(String),
}

impl From<Callable> for Target {
    fn from(callable: Callable) -> Self {
        Target::Callable(callable)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Helper(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Helper(name)
    }
}

/// The three callable kinds the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    Filter,
    Test,
}

impl fmt::Display for CallableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallableKind::Function => "function",
            CallableKind::Filter => "filter",
            CallableKind::Test => "test",
        })
    }
}

/// Parses a declared name into its exposed name and safe flag.
///
/// Returns `None` when nothing is left after removing `*` markers.
pub fn parse_declared(declared: &str) -> Option<(&str, bool)> {
    let exposed = declared.trim_matches('*');
    if exposed.is_empty() {
        return None;
    }
    Some((exposed, declared.starts_with('*')))
}

/// One entry of a [`CallableTable`].
#[derive(Debug, Clone)]
pub struct CallableEntry {
    /// The name as declared, including any `*` marker.
    pub declared: String,
    pub target: Target,
}

impl CallableEntry {
    /// Name templates use to call this entry.
    ///
    /// Empty when the declared name is nothing but markers.
    pub fn exposed_name(&self) -> &str {
        parse_declared(&self.declared).map_or("", |(exposed, _)| exposed)
    }

    pub fn is_safe(&self) -> bool {
        parse_declared(&self.declared).is_some_and(|(_, safe)| safe)
    }
}

/// Ordered table of callables keyed by exposed name.
///
/// Inserting an entry whose exposed name is already present replaces the
/// earlier entry in place, so later registrations win without changing the
/// table's order.
#[derive(Debug, Clone, Default)]
pub struct CallableTable {
    entries: Vec<CallableEntry>,
}

impl CallableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(declared name, helper name)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut table = Self::new();
        for (declared, helper) in pairs {
            table.insert(*declared, *helper);
        }
        table
    }

    /// The default function table.
    pub fn default_functions() -> Self {
        Self::from_pairs(DEFAULT_FUNCTIONS)
    }

    /// The default test table.
    pub fn default_tests() -> Self {
        Self::from_pairs(DEFAULT_TESTS)
    }

    /// Reads a table from a host option: a mapping of declared name to
    /// helper name.
    ///
    /// Entries whose value is not a string are not invocable and are
    /// skipped, as is a value that is not a mapping at all.
    pub fn from_option(value: Option<&JsonValue>) -> Self {
        let mut table = Self::new();
        match value {
            None | Some(JsonValue::Null) => {}
            Some(JsonValue::Object(map)) => {
                for (declared, target) in map {
                    match target {
                        JsonValue::String(helper) if !helper.is_empty() => {
                            table.insert(declared.as_str(), helper.as_str());
                        }
                        other => {
                            tracing::debug!(
                                "skipping callable {:?}: target {} is not invocable",
                                declared,
                                other
                            );
                        }
                    }
                }
            }
            Some(other) => {
                tracing::debug!("ignoring callable table that is not a mapping: {}", other);
            }
        }
        table
    }

    /// Adds or replaces an entry. Entries with an empty exposed name are
    /// dropped.
    pub fn insert(&mut self, declared: impl Into<String>, target: impl Into<Target>) -> &mut Self {
        let entry = CallableEntry {
            declared: declared.into(),
            target: target.into(),
        };
        if parse_declared(&entry.declared).is_none() {
            tracing::debug!("skipping callable with empty name {:?}", entry.declared);
            return self;
        }
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.exposed_name() == entry.exposed_name())
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Merges `other` into this table; `other` wins on name collisions.
    pub fn merge(&mut self, other: CallableTable) -> &mut Self {
        for entry in other.entries {
            self.insert(entry.declared, entry.target);
        }
        self
    }

    pub fn get(&self, exposed: &str) -> Option<&CallableEntry> {
        self.entries.iter().find(|e| e.exposed_name() == exposed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallableEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Functions, filters and tests contributed together.
#[derive(Debug, Clone, Default)]
pub struct CallableSet {
    pub functions: CallableTable,
    pub filters: CallableTable,
    pub tests: CallableTable,
}

impl CallableSet {
    pub fn table(&self, kind: CallableKind) -> &CallableTable {
        match kind {
            CallableKind::Function => &self.functions,
            CallableKind::Filter => &self.filters,
            CallableKind::Test => &self.tests,
        }
    }
}

/// A bundle of callables a host can plug into every environment.
///
/// ```rust
/// use vellum_render::callables::{Callable, CallableSet, Extension};
/// use minijinja::Value;
///
/// struct Money;
///
/// impl Extension for Money {
///     fn name(&self) -> &str {
///         "money"
///     }
///
///     fn contribute(&self, set: &mut CallableSet) {
///         set.filters.insert("cents", Callable::from_fn(|args| {
///             let amount = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
///             Ok(Value::from(format!("{}.{:02}", amount / 100, amount % 100)))
///         }));
///     }
/// }
/// ```
pub trait Extension: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Adds this extension's callables to `set`.
    fn contribute(&self, set: &mut CallableSet);
}

/// Registers one resolved callable on the engine.
///
/// Safe entries have string results wrapped as safe strings; tests turn
/// their result into a boolean.
pub(crate) fn register(
    env: &mut minijinja::Environment<'static>,
    kind: CallableKind,
    entry: &CallableEntry,
    callable: Callable,
) {
    let name = entry.exposed_name().to_string();
    let safe = entry.is_safe();

    match kind {
        CallableKind::Function => {
            env.add_function(
                name,
                move |state: &State, args: Rest<Value>| -> Result<Value, Error> {
                    callable.call(state, &args).map(|rv| mark_safe(rv, safe))
                },
            );
        }
        CallableKind::Filter => {
            env.add_filter(
                name,
                move |state: &State, value: Value, args: Rest<Value>| -> Result<Value, Error> {
                    let mut all = Vec::with_capacity(args.len() + 1);
                    all.push(value);
                    all.extend(args.0);
                    callable.call(state, &all).map(|rv| mark_safe(rv, safe))
                },
            );
        }
        CallableKind::Test => {
            env.add_test(
                name,
                move |state: &State, value: Value, args: Rest<Value>| -> Result<bool, Error> {
                    let mut all = Vec::with_capacity(args.len() + 1);
                    all.push(value);
                    all.extend(args.0);
                    callable.call(state, &all).map(|rv| rv.is_true())
                },
            );
        }
    }
}

fn mark_safe(value: Value, safe: bool) -> Value {
    if !safe || value.is_safe() {
        return value;
    }
    match value.kind() {
        ValueKind::String => Value::from_safe_string(value.to_string()),
        ValueKind::Plain => Value::from_safe_string(value.to_string()),
        _ => value,
    }
}

/// Default functions as `(declared name, helper name)`.
///
/// A `*` prefix marks helpers that return markup.
pub const DEFAULT_FUNCTIONS: &[(&str, &str)] = &[
    ("*attr", "attr"),
    ("asset", "asset"),
    ("collection", "collection"),
    ("*csrf", "csrf"),
    ("*csrf_field", "csrf_field"),
    ("*honeypot_field", "honeypot_field"),
    ("*css", "css"),
    ("*esc", "esc"),
    ("error", "error"),
    ("get", "get"),
    ("*gist", "gist"),
    ("go", "go"),
    ("gravatar", "gravatar"),
    ("*h", "h"),
    ("*html", "html"),
    ("*image", "image"),
    ("invalid", "invalid"),
    ("*js", "js"),
    ("kirby", "kirby"),
    ("*kirbytag", "kirbytag"),
    ("*kirbytags", "kirbytags"),
    ("*kirbytext", "kirbytext"),
    ("*markdown", "markdown"),
    ("option", "option"),
    ("memory", "memory"),
    ("*multiline", "multiline"),
    ("page", "page"),
    ("pages", "pages"),
    ("param", "param"),
    ("params", "params"),
    ("*pattern", "pattern"),
    ("timestamp", "timestamp"),
    ("site", "site"),
    ("size", "size"),
    ("slug", "slug"),
    ("*smartypants", "smartypants"),
    ("*snippet", "snippet"),
    ("*strftime", "strftime"),
    ("*svg", "svg"),
    ("t", "t"),
    ("tc", "tc"),
    ("tt", "tt"),
    ("*twitter", "twitter"),
    ("u", "u"),
    ("url", "url"),
    ("url_build", "url_build"),
    ("*video", "video"),
    ("*vimeo", "vimeo"),
    ("*widont", "widont"),
    ("*youtube", "youtube"),
];

/// Default tests as `(declared name, helper name)`.
pub const DEFAULT_TESTS: &[(&str, &str)] = &[("of_type", "of_type")];
