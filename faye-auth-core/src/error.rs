//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

pub type FayeAuthResult<T> = Result<T, FayeAuthError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Error raised while setting up an authentication gate
///
/// Authentication failures at run time never surface here; the gate retries
/// them (see [`AuthError`]).
#[derive(Error, Debug)]
pub enum FayeAuthError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },
}

impl FayeAuthError {
    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            FayeAuthError::Config { context, .. } | FayeAuthError::Validation { context, .. } => {
                context
            }
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            FayeAuthError::Config { context, .. } | FayeAuthError::Validation { context, .. } => {
                context
            }
        }
    }

    /// Record the operation that failed
    pub fn with_operation(mut self, operation: &str) -> Self {
        self.context_mut().operation = Some(operation.to_string());
        self
    }

    /// Add a recovery suggestion ahead of the generic one
    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.context_mut()
            .recovery_suggestions
            .insert(0, suggestion.to_string());
        self
    }

    /// Log the error with its tracking id
    pub fn log(&self) {
        let context = self.context();
        error!(
            error_id = %context.error_id,
            component = %context.component,
            operation = ?context.operation,
            error = %self,
            "Configuration or validation error"
        );
    }
}

/// Outcome of a failed authentication round trip
///
/// None of these are fatal to the gate: every variant, including a rejection,
/// leads to a scheduled retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("endpoint rejected authentication with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("network failure: {message}")]
    Network { message: String },

    #[error("authentication timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("invalid response from endpoint: {message}")]
    InvalidResponse { message: String },
}

impl AuthError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}

/// Error raised by a whitelist predicate while evaluating a subject
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct WhitelistError {
    pub message: String,
}

impl WhitelistError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::FayeAuthError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file"),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::FayeAuthError::Config {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::FayeAuthError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}
