//! Centralized error types for notification-mailer using thiserror.
//!
//! Every send failure is local to one call: nothing is retried and the
//! send counter is left untouched.

use thiserror::Error;

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid template '{name}': {message}")]
    InvalidTemplate { name: String, message: String },
    #[error("invalid transport: {0}")]
    InvalidTransport(String),
}

/// Errors related to template rendering.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template '{name}' not found")]
    NotFound { name: String },
    #[error("template render failed: {message}")]
    RenderFailed { message: String },
}

/// Errors raised by a send call.
///
/// The contract violations carry the name of the public operation that was
/// invoked, so callers can tell which entry point rejected the input.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("{operation}: recipient address missing")]
    MissingRecipient { operation: &'static str },
    #[error("{operation}: subject missing")]
    MissingSubject { operation: &'static str },
    #[error("{operation}: content missing")]
    MissingContent { operation: &'static str },
    #[error("{operation}: from address missing")]
    MissingFromAddress { operation: &'static str },
    #[error("{operation}: invalid recipient type ({kind})")]
    InvalidRecipientKind {
        operation: &'static str,
        kind: String,
    },
    #[error("{operation}: no template rendered ({template})")]
    NoTemplateRendered {
        operation: &'static str,
        template: String,
    },
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("failed to build message: {0}")]
    InvalidMessage(String),
    #[error("failed to send notification: {0}")]
    SendFailed(String),
}

impl NotifyError {
    /// Stable machine-readable code for the failing rule.
    pub fn reason(&self) -> &'static str {
        match self {
            NotifyError::MissingRecipient { .. } => "missing_recipient",
            NotifyError::MissingSubject { .. } => "missing_subject",
            NotifyError::MissingContent { .. } => "missing_content",
            NotifyError::MissingFromAddress { .. } => "missing_from_address",
            NotifyError::InvalidRecipientKind { .. } => "invalid_recipient_kind",
            NotifyError::NoTemplateRendered { .. } => "no_template_rendered",
            NotifyError::Template(_) => "template_error",
            NotifyError::InvalidMessage(_) => "invalid_message",
            NotifyError::SendFailed(_) => "send_failed",
        }
    }

    /// Operation name for contract violations, `None` for runtime failures.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            NotifyError::MissingRecipient { operation }
            | NotifyError::MissingSubject { operation }
            | NotifyError::MissingContent { operation }
            | NotifyError::MissingFromAddress { operation }
            | NotifyError::InvalidRecipientKind { operation, .. }
            | NotifyError::NoTemplateRendered { operation, .. } => Some(operation),
            _ => None,
        }
    }
}
