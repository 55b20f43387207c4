// src/lib.rs
//! notification-mailer - template-driven email notifications.

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod preview;
pub mod template;

// Re-export commonly used types
pub use cli::LogFormat;
pub use error::{ConfigError, NotifyError, TemplateError};
pub use notify::{
    Address, AttachmentInput, MailTransport, MessageComposer, OutgoingMessage, RecipientSet,
    TemplateContext, TemplateStrings,
};
pub use template::{TemplateEngine, TemplateLoader};
