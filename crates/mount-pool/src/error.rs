//! Error types for mount-content pooling
use thiserror::Error;

/// Result type for pooling operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the pooling core.
///
/// Pool misses, full pools, policy refusals and released scopes are never
/// errors. The only hot-path failure is an allocator that cannot create
/// content, and it reaches the caller unchanged.
#[derive(Error, Debug)]
pub enum Error {
    /// Pooling configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// An allocator failed to create mount content
    #[error("Content creation failed for allocator '{allocator}': {reason}")]
    ContentCreation {
        /// Name of the allocator that failed
        allocator: String,
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a content-creation error without an underlying cause
    pub fn content_creation(allocator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContentCreation {
            allocator: allocator.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a content-creation error wrapping an underlying cause
    pub fn content_creation_with_source<E>(
        allocator: impl Into<String>,
        reason: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ContentCreation {
            allocator: allocator.into(),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the allocator name associated with this error (if any)
    #[must_use]
    pub fn allocator(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } => None,
            Self::ContentCreation { allocator, .. } => Some(allocator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn content_creation_reports_allocator() {
        let err = Error::content_creation("TextView", "out of surfaces");
        assert_eq!(err.allocator(), Some("TextView"));
        assert_eq!(
            err.to_string(),
            "Content creation failed for allocator 'TextView': out of surfaces"
        );
    }

    #[test]
    fn configuration_has_no_allocator() {
        let err = Error::configuration("max_pool_size must be greater than 0");
        assert_eq!(err.allocator(), None);
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::other("gpu lost");
        let err = Error::content_creation_with_source("Surface", "backing store", io);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("gpu lost"));
    }
}
