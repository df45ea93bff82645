use crate::quota::BreachAction;
use rust_decimal::Decimal;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "catalog[2].input_price_per_million")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "quota_manager")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the governance runtime.
///
/// Failed backend attempts are not represented here; the coordinator handles
/// them as [`crate::execution::BackendFailure`] values.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown model: {model_id}")]
    UnknownModel { model_id: String },

    #[error("Invalid unit counts: input={input}, output={output} (must be >= 0)")]
    InvalidUnits { input: i64, output: i64 },

    #[error("No candidates for modality '{modality}'")]
    NoCandidates { modality: String },

    #[error("Quota '{quota}' exceeded ({action}): usage {usage} + {requested} > limit {limit}")]
    QuotaExceeded {
        quota: String,
        action: BreachAction,
        usage: Decimal,
        limit: Decimal,
        requested: Decimal,
    },

    #[error("Circuit open for backend '{backend}'")]
    CircuitOpen { backend: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Lock poisoning inside one of the shared managers.
    pub(crate) fn poisoned(source: &str) -> Self {
        Error::runtime_with_context(
            format!("{} lock poisoned", source),
            ErrorContext::new().with_source(source),
        )
    }

    /// Configuration and programmer errors: fatal to the request, never retried.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownModel { .. }
                | Error::InvalidUnits { .. }
                | Error::NoCandidates { .. }
                | Error::Configuration { .. }
        )
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = Error::configuration_with_context(
            "negative price",
            ErrorContext::new()
                .with_field_path("catalog[0].input_price_per_million")
                .with_source("config_loader"),
        );
        let msg = err.to_string();
        assert!(msg.contains("negative price"));
        assert!(msg.contains("field: catalog[0].input_price_per_million"));
        assert!(msg.contains("source: config_loader"));
    }

    #[test]
    fn test_configuration_classification() {
        assert!(Error::UnknownModel {
            model_id: "x/y".into()
        }
        .is_configuration_error());
        assert!(Error::NoCandidates {
            modality: "video".into()
        }
        .is_configuration_error());
        assert!(!Error::CircuitOpen {
            backend: "x/y".into()
        }
        .is_configuration_error());
    }

    #[test]
    fn test_quota_exceeded_message() {
        let err = Error::QuotaExceeded {
            quota: "global".into(),
            action: BreachAction::HardStop,
            usage: Decimal::ZERO,
            limit: Decimal::new(2, 0),
            requested: Decimal::new(3, 0),
        };
        assert_eq!(
            err.to_string(),
            "Quota 'global' exceeded (hard_stop): usage 0 + 3 > limit 2"
        );
    }
}
