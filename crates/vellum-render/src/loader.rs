//! Namespaced filesystem template loader.
//!
//! Templates are looked up by *logical path*: a name relative to one of the
//! registered search directories, always written with forward slashes.
//! Directories are grouped into namespaces:
//!
//! - The default namespace ([`DEFAULT_NAMESPACE`], the empty string) is
//!   searched for plain names like `"pages/home.twig"`.
//! - A named namespace is searched only for qualified names like
//!   `"@snippets/header.twig"`.
//!
//! Each namespace holds an ordered list of directories. Lookups try them in
//! registration order and the first existing file wins, so earlier
//! registrations take priority. Directories can be appended but never
//! removed.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut paths = SearchPaths::rooted("/srv/site/templates")?;
//! paths.add_path("/srv/site/snippets", "snippets");
//!
//! // "/srv/site/templates/pages/home.twig"
//! paths.find("pages/home.twig")?;
//! // "/srv/site/snippets/header.twig"
//! paths.find("@snippets/header.twig")?;
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use minijinja::{Error, ErrorKind};

use crate::error::EnvError;

/// The namespace searched for unqualified template names.
pub const DEFAULT_NAMESPACE: &str = "";

/// Recognized template file extensions.
///
/// Used to decide which plugin snippets are templates this engine can load.
pub const TEMPLATE_EXTENSIONS: &[&str] = &[".jinja", ".jinja2", ".j2", ".twig"];

/// Returns the template extension `path` ends with, compared case-insensitively.
pub fn template_extension(path: &str) -> Option<&'static str> {
    let lower = path.to_ascii_lowercase();
    TEMPLATE_EXTENSIONS
        .iter()
        .copied()
        .find(|ext| lower.ends_with(ext))
}

/// Ordered search directories grouped by namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    namespaces: Vec<(String, Vec<PathBuf>)>,
}

impl SearchPaths {
    /// Creates search paths whose default namespace starts with `root`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Loader`] if `root` is not an existing directory.
    pub fn rooted(root: impl AsRef<Path>) -> Result<Self, EnvError> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(EnvError::loader(root, "directory does not exist"));
        }
        if !root.is_dir() {
            return Err(EnvError::loader(root, "path is not a directory"));
        }

        let mut paths = Self::default();
        paths.add_path(root, DEFAULT_NAMESPACE);
        Ok(paths)
    }

    /// Appends a directory to a namespace, creating the namespace if needed.
    ///
    /// The directory is not checked for existence. Appending a directory the
    /// namespace already holds leaves the order unchanged.
    pub fn add_path(&mut self, path: impl Into<PathBuf>, namespace: &str) {
        let path = path.into();
        match self.namespaces.iter_mut().find(|(ns, _)| ns == namespace) {
            Some((_, dirs)) => {
                if !dirs.contains(&path) {
                    dirs.push(path);
                }
            }
            None => self.namespaces.push((namespace.to_string(), vec![path])),
        }
    }

    /// Directories registered for a namespace, in search order.
    pub fn paths(&self, namespace: &str) -> &[PathBuf] {
        self.namespaces
            .iter()
            .find(|(ns, _)| ns == namespace)
            .map(|(_, dirs)| dirs.as_slice())
            .unwrap_or(&[])
    }

    /// Registered namespace names, in registration order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(|(ns, _)| ns.as_str())
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|(ns, _)| ns == namespace)
    }

    /// Resolves a template name to the first matching file.
    ///
    /// Returns `Ok(None)` if no directory of the namespace holds the file.
    ///
    /// # Errors
    ///
    /// Fails if the name is malformed, tries to leave its search root, or
    /// names a namespace that was never registered.
    pub fn find(&self, name: &str) -> Result<Option<PathBuf>, Error> {
        let (namespace, relative) = split_name(name)?;
        let segments = relative_segments(name, relative)?;

        if !self.has_namespace(namespace) {
            return Err(Error::new(
                ErrorKind::TemplateNotFound,
                format!("there are no registered paths for namespace \"{}\"", namespace),
            ));
        }

        for dir in self.paths(namespace) {
            let mut candidate = dir.clone();
            candidate.extend(&segments);
            if candidate.is_file() {
                tracing::trace!("resolved template {:?} to {}", name, candidate.display());
                return Ok(Some(candidate));
            }
        }
        tracing::trace!("template {:?} not found in namespace {:?}", name, namespace);
        Ok(None)
    }

    /// Resolves and reads a template's source.
    pub fn load(&self, name: &str) -> Result<Option<String>, Error> {
        let Some(path) = self.find(name)? else {
            return Ok(None);
        };
        match fs::read_to_string(&path) {
            Ok(source) => Ok(Some(source)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template {}", path.display()),
            )
            .with_source(err)),
        }
    }
}

/// Splits `@namespace/rest` into its parts; plain names use the default namespace.
fn split_name(name: &str) -> Result<(&str, &str), Error> {
    let Some(qualified) = name.strip_prefix('@') else {
        return Ok((DEFAULT_NAMESPACE, name));
    };
    match qualified.split_once('/') {
        Some((namespace, rest)) if !namespace.is_empty() => Ok((namespace, rest)),
        _ => Err(Error::new(
            ErrorKind::TemplateNotFound,
            format!(
                "malformed namespaced template name \"{}\" (expecting \"@namespace/template_name\")",
                name
            ),
        )),
    }
}

/// Splits a relative template path into segments, refusing to leave the root.
fn relative_segments<'a>(name: &str, relative: &'a str) -> Result<Vec<&'a str>, Error> {
    let mut segments = Vec::new();
    for segment in relative.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(Error::new(
                    ErrorKind::TemplateNotFound,
                    format!(
                        "template \"{}\" points outside the configured directories",
                        name
                    ),
                ))
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(Error::new(
            ErrorKind::TemplateNotFound,
            format!("template name \"{}\" is empty", name),
        ));
    }
    Ok(segments)
}

/// A shared, appendable handle to [`SearchPaths`].
///
/// The environment's engine and the environment itself hold clones of the
/// same loader, so directories appended through either are visible to
/// subsequent lookups.
#[derive(Debug, Clone, Default)]
pub struct TemplateLoader {
    paths: Arc<RwLock<SearchPaths>>,
}

impl TemplateLoader {
    pub fn new(paths: SearchPaths) -> Self {
        Self {
            paths: Arc::new(RwLock::new(paths)),
        }
    }

    pub fn add_path(&self, path: impl Into<PathBuf>, namespace: &str) {
        let mut paths = self.paths.write().unwrap_or_else(|e| e.into_inner());
        paths.add_path(path, namespace);
    }

    /// Returns a copy of the current search paths.
    pub fn snapshot(&self) -> SearchPaths {
        self.paths.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Loader callback used by the engine.
    pub fn load(&self, name: &str) -> Result<Option<String>, Error> {
        self.paths
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .load(name)
    }
}

/// Converts a file path into a logical path relative to `root`.
///
/// Both `/` and `\` count as separators and runs of separators collapse. If
/// the path starts with `root` (compared segment by segment) that prefix is
/// removed; otherwise the path is kept whole. The result never starts with a
/// separator.
///
/// ```rust
/// use std::path::Path;
/// use vellum_render::loader::logical_path;
///
/// let root = Path::new("/srv/site/templates");
/// assert_eq!(
///     logical_path(root, Path::new("/srv/site/templates//pages\\home.twig")),
///     "pages/home.twig"
/// );
/// assert_eq!(logical_path(root, Path::new("/pages/home.twig")), "pages/home.twig");
/// ```
pub fn logical_path(root: &Path, file_path: &Path) -> String {
    relative_to(root, file_path).unwrap_or_else(|| path_segments(file_path).join("/"))
}

/// Like [`logical_path`], but returns `None` when `file_path` is not under `root`.
pub fn relative_to(root: &Path, file_path: &Path) -> Option<String> {
    let root = path_segments(root);
    let file = path_segments(file_path);

    if root.is_empty() || !file.starts_with(&root) {
        return None;
    }
    Some(file[root.len()..].join("/"))
}

fn path_segments(path: &Path) -> Vec<String> {
    path.to_string_lossy()
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

/// Derives the search root of a plugin snippet.
///
/// A snippet registered as `cards/item` at
/// `/plugins/cards/snippets/cards/item.twig` lives under
/// `/plugins/cards/snippets`: the extension and the logical segments are
/// removed from the end of the physical path. Returns `None` when the path
/// is not a template, does not end with the logical name, or leaves no
/// directory behind.
pub fn snippet_root(logical: &str, physical: &Path) -> Option<PathBuf> {
    let file = physical.to_string_lossy();
    let ext = template_extension(&file)?;
    let stem = PathBuf::from(&file[..file.len() - ext.len()]);

    let logical = match template_extension(logical) {
        Some(own) => &logical[..logical.len() - own.len()],
        None => logical,
    };

    let mut dir = stem.as_path();
    for segment in logical.split(['/', '\\']).filter(|s| !s.is_empty()).rev() {
        match dir.components().next_back() {
            Some(Component::Normal(last)) if last == segment => {}
            _ => return None,
        }
        dir = dir.parent()?;
    }
    if dir.as_os_str().is_empty() {
        return None;
    }
    Some(dir.to_path_buf())
}
