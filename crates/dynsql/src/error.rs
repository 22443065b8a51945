//! Error types for dynsql

use thiserror::Error;

/// Result type alias for dynsql operations
pub type DynSqlResult<T> = Result<T, DynSqlError>;

/// Errors raised while compiling or evaluating SQL templates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DynSqlError {
    /// A property, positional parameter, include id or include prop is absent
    /// from the active parameter bag
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// An include references an id that is not registered in the collection
    #[error("missing sql: {0}")]
    FragmentNotFound(String),

    /// A boolean test expression failed at runtime
    #[error("failed execute template: {0}")]
    TemplateExecution(String),

    /// A boolean test expression could not be compiled
    #[error("invalid test expression '{expr}' at {position}: {message}")]
    ExpressionSyntax {
        expr: String,
        position: usize,
        message: String,
    },

    /// The same id was registered twice
    #[error("duplicate sql id: {0}")]
    DuplicateFragment(String),

    /// Fragments include each other through the collection
    #[error("include cycle: {}", .0.join(" -> "))]
    IncludeCycle(Vec<String>),

    /// Nested includes went deeper than the context allows
    #[error("include depth {depth} exceeded while resolving '{id}'")]
    IncludeDepthExceeded { id: String, depth: usize },

    /// A record could not be converted into a parameter bag
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Mapper file decode/compile error
    #[error("mapper error: {0}")]
    Mapper(String),
}

impl DynSqlError {
    /// Create a missing parameter error
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingParameter(name.into())
    }

    /// Create a runtime expression error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::TemplateExecution(message.into())
    }

    pub(crate) fn syntax(expr: &str, position: usize, message: impl Into<String>) -> Self {
        Self::ExpressionSyntax {
            expr: expr.to_string(),
            position,
            message: message.into(),
        }
    }

    /// Check if this is a missing parameter error
    pub fn is_missing_parameter(&self) -> bool {
        matches!(self, Self::MissingParameter(_))
    }

    /// Check if this is a fragment-not-found error
    pub fn is_fragment_not_found(&self) -> bool {
        matches!(self, Self::FragmentNotFound(_))
    }

    /// Check if this error is a registry misconfiguration rather than a
    /// per-request failure
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::FragmentNotFound(_)
                | Self::DuplicateFragment(_)
                | Self::IncludeCycle(_)
                | Self::ExpressionSyntax { .. }
                | Self::Mapper(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_lowercase() {
        assert_eq!(DynSqlError::missing("id").to_string(), "missing parameter: id");
        assert_eq!(
            DynSqlError::FragmentNotFound("Blog.find".into()).to_string(),
            "missing sql: Blog.find"
        );
        assert_eq!(
            DynSqlError::Serialization("expected a record, got number".into()).to_string(),
            "serialization error: expected a record, got number"
        );
        assert_eq!(
            DynSqlError::IncludeCycle(vec!["A".into(), "B".into(), "A".into()]).to_string(),
            "include cycle: A -> B -> A"
        );
    }
}
