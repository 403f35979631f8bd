use thiserror::Error;

use crate::path::PathError;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("rule '{id}' not found")]
    RuleNotFound { id: String },

    #[error("duplicate rule id '{id}'")]
    DuplicateRuleId { id: String },

    #[error("path '{path}' does not resolve")]
    PathNotFound { path: String },

    #[error("parameter '{name}' is not set")]
    MissingParameter { name: String },

    #[error("rule '{rule}' has no metadata '{key}'")]
    MissingMetadata { rule: String, key: String },

    #[error("no rule is executing; metadata '{key}' is unavailable")]
    NoActiveRule { key: String },

    #[error("expected {expected} at {source_desc}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        source_desc: String,
    },

    #[error("invalid selector pattern: {0}")]
    InvalidSelectorPattern(#[from] regex::Error),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("recursion limit exceeded at rule '{rule}' (depth {depth})")]
    RecursionLimit { rule: String, depth: usize },

    #[error("rule body panicked: {message}")]
    Panicked { message: String },

    #[error("task executor dropped the rule body before it completed")]
    TaskAbandoned,

    #[error("{0}")]
    Custom(String),
}

impl ValidationError {
    pub fn custom(message: impl Into<String>) -> Self {
        ValidationError::Custom(message.into())
    }

    /// A stable snake_case name for the variant, used as the kind of a
    /// [`ResultReason::Error`](crate::ResultReason::Error).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::RuleNotFound { .. } => "rule_not_found",
            ValidationError::DuplicateRuleId { .. } => "duplicate_rule_id",
            ValidationError::PathNotFound { .. } => "path_not_found",
            ValidationError::MissingParameter { .. } => "missing_parameter",
            ValidationError::MissingMetadata { .. } => "missing_metadata",
            ValidationError::NoActiveRule { .. } => "no_active_rule",
            ValidationError::TypeMismatch { .. } => "type_mismatch",
            ValidationError::InvalidSelectorPattern(_) => "invalid_selector_pattern",
            ValidationError::Path(_) => "path",
            ValidationError::RecursionLimit { .. } => "recursion_limit",
            ValidationError::Panicked { .. } => "panicked",
            ValidationError::TaskAbandoned => "task_abandoned",
            ValidationError::Custom(_) => "custom",
        }
    }
}
