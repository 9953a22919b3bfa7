//! Error types for planner and analyzer operations.
//!
//! Data-quality problems (unparsable lines, missing fields) are never errors:
//! they are skipped and counted by the component that meets them. The variants
//! below cover contract violations and infrastructure failures only.

use std::fmt;

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

/// Structured context for planner errors.
///
/// Provides additional information about where and why an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "allocate", "detect_bursts")
    pub operation: Option<String>,
    /// The offending field (e.g., "subframe_minutes")
    pub field: Option<String>,
    /// The offending value, rendered for display
    pub value: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the offending field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Set the offending value.
    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref field) = self.field {
            parts.push(format!("field={}", field));
        }
        if let Some(ref value) = self.value {
            parts.push(format!("value={}", value));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for planner operations
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// A caller broke an input contract (negative exposure, negative
    /// threshold, non-positive subframe length, ...).
    #[error("Invalid input: {message} {context}")]
    InvalidInput {
        message: String,
        context: ErrorContext,
    },

    /// A whole document could not be parsed (as opposed to a single line,
    /// which is skipped).
    #[error("Parse error: {message} {context}")]
    Parse {
        message: String,
        context: ErrorContext,
    },

    /// Configuration or initialization error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Settings store failure.
    #[error("Storage error: {message} {context}")]
    Storage {
        message: String,
        context: ErrorContext,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlannerError {
    /// Create an invalid-input error with context.
    pub fn invalid_input(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InvalidInput {
            message: message.into(),
            context,
        }
    }

    /// Create a parse error with context.
    pub fn parse(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Parse {
            message: message.into(),
            context,
        }
    }

    /// Create a storage error with context.
    pub fn storage(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Storage {
            message: message.into(),
            context,
        }
    }

    /// Whether the error was caused by the caller's input rather than by the
    /// environment.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. } | Self::Parse { .. })
    }
}

/// Fail with [`PlannerError::InvalidInput`] unless `value` is finite and
/// non-negative.
pub(crate) fn ensure_non_negative(operation: &str, field: &str, value: f64) -> PlannerResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PlannerError::invalid_input(
            format!("{} must be a finite, non-negative number", field),
            ErrorContext::new(operation)
                .with_field(field)
                .with_value(value),
        ))
    }
}
