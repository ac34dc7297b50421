//! Error types for environment assembly and rendering.
//!
//! [`EnvError`] is returned by every build and render operation. It keeps the
//! underlying MiniJinja error as its source so callers can still inspect line
//! information and the template name, while the variant tells them which
//! class of failure happened. [`ConfigError`] covers loading an
//! [`OptionStore`](crate::config::OptionStore) from text or disk.

use std::path::PathBuf;

/// Error type for building an environment and rendering through it.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// The primary template root could not be used as a search path.
    #[error("template directory \"{}\" is not usable: {reason}", path.display())]
    Loader {
        /// The directory that was rejected
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// No registered search path yields the requested template.
    #[error(transparent)]
    TemplateNotFound(minijinja::Error),

    /// The template was found but failed to compile or evaluate.
    #[error(transparent)]
    Render(minijinja::Error),
}

impl EnvError {
    pub(crate) fn loader(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        EnvError::Loader {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the engine error behind a not-found or render failure.
    pub fn engine_error(&self) -> Option<&minijinja::Error> {
        match self {
            EnvError::TemplateNotFound(err) | EnvError::Render(err) => Some(err),
            EnvError::Loader { .. } => None,
        }
    }
}

impl From<minijinja::Error> for EnvError {
    fn from(err: minijinja::Error) -> Self {
        match err.kind() {
            minijinja::ErrorKind::TemplateNotFound => EnvError::TemplateNotFound(err),
            _ => EnvError::Render(err),
        }
    }
}

/// Error type for loading host options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading an options file failed.
    #[error("failed to read options from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The YAML document could not be parsed.
    #[error("invalid YAML options: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON document could not be parsed.
    #[error("invalid JSON options: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed, but its top level is not a mapping.
    #[error("options document must be a mapping at the top level")]
    NotAMapping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_template_not_found() {
        let mj_err = minijinja::Error::new(
            minijinja::ErrorKind::TemplateNotFound,
            "template 'foo' not found",
        );
        let err: EnvError = mj_err.into();
        assert!(matches!(err, EnvError::TemplateNotFound(_)));
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn test_other_kinds_map_to_render() {
        for kind in [
            minijinja::ErrorKind::SyntaxError,
            minijinja::ErrorKind::UndefinedError,
            minijinja::ErrorKind::InvalidOperation,
        ] {
            let err: EnvError = minijinja::Error::new(kind, "boom").into();
            assert!(matches!(err, EnvError::Render(_)), "{:?}", kind);
            assert!(err.engine_error().is_some());
        }
    }

    #[test]
    fn test_loader_error_display() {
        let err = EnvError::loader("/srv/site/templates", "directory does not exist");
        let msg = err.to_string();
        assert!(msg.contains("/srv/site/templates"));
        assert!(msg.contains("does not exist"));
        assert!(err.engine_error().is_none());
    }
}
