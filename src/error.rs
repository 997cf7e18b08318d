//! Error types for the managed component runtime

use crate::TypeKey;
use thiserror::Error;

/// Boxed error raised by user supplied callables (constructors, methods, hooks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while configuring the registry or retrieving and invoking
/// managed components
#[derive(Error, Debug)]
pub enum IocError {
    /// Malformed or contradictory binding or metadata
    #[error("Configuration error: {0}")]
    Config(String),

    /// Condition that cannot happen with a valid configuration
    #[error("Bug: {0}")]
    Bug(String),

    /// Dependency graph contains a cycle
    #[error("Circular dependency: {}", format_chain(.chain))]
    CircularDependency { chain: Vec<&'static str> },

    /// Dependency has no descriptor and cannot be built from the catalog
    #[error("Unresolved dependency {dependency} required by {host}")]
    UnresolvedDependency {
        dependency: &'static str,
        host: String,
    },

    /// Service lookup found no runtime implementation
    #[error("No provider for service {type_name}")]
    NoProvider { type_name: &'static str },

    /// Requested contract is not managed by the registry
    #[error("Contract not managed: {type_name}")]
    NotFound { type_name: &'static str },

    /// The wrapped callable itself failed
    #[error("Invocation of {method} failed: {source}")]
    Invocation {
        method: String,
        #[source]
        source: BoxError,
    },

    /// Access checked method invoked without a satisfied security context
    #[error("Not authorized to invoke {method}: {reason}")]
    Authorization { method: String, reason: String },

    /// Scope store needs a context that is not active on this thread
    #[error("No active context for {scope} scope")]
    InactiveScope { scope: &'static str },

    /// Explicit arguments do not match the parameter list
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// Intercepted call names a method the descriptor does not expose
    #[error("No method {method} on {class}")]
    NoSuchMethod { class: &'static str, method: String },
}

fn format_chain(chain: &[&'static str]) -> String {
    chain.join(" -> ")
}

impl IocError {
    /// Create a Config error
    #[inline]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Create a Bug error
    #[inline]
    pub fn bug(reason: impl Into<String>) -> Self {
        Self::Bug(reason.into())
    }

    /// Create an IllegalArgument error
    #[inline]
    pub fn illegal_argument(reason: impl Into<String>) -> Self {
        Self::IllegalArgument(reason.into())
    }

    /// Create a NotFound error for a contract
    #[inline]
    pub fn not_found(contract: &TypeKey) -> Self {
        Self::NotFound {
            type_name: contract.name(),
        }
    }

    /// Create a NoProvider error for a contract
    #[inline]
    pub fn no_provider(contract: &TypeKey) -> Self {
        Self::NoProvider {
            type_name: contract.name(),
        }
    }

    /// Create an Invocation error wrapping the callable failure
    #[inline]
    pub fn invocation(method: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Invocation {
            method: method.into(),
            source: source.into(),
        }
    }

    /// True for errors an optional retrieval treats as absence
    #[inline]
    pub fn is_absence(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NoProvider { .. })
    }
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, IocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_message_lists_chain() {
        let err = IocError::CircularDependency {
            chain: vec!["A", "B", "A"],
        };
        assert_eq!(err.to_string(), "Circular dependency: A -> B -> A");
    }

    #[test]
    fn test_absence_classification() {
        let key = TypeKey::of::<String>();
        assert!(IocError::not_found(&key).is_absence());
        assert!(IocError::no_provider(&key).is_absence());
        assert!(!IocError::bug("x").is_absence());
    }

    #[test]
    fn test_invocation_preserves_source() {
        use std::error::Error as _;
        let err = IocError::invocation("Car::drive", "engine stalled");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("engine stalled"));
    }
}
