//! Configuration loading and validation for notification-mailer.
//!
//! This module handles loading the YAML configuration file,
//! validation, and environment variables for SMTP credentials.

mod env;
mod secret;
mod transport;
mod types;
mod validation;

pub use env::{resolve_env_vars, resolve_relative_path};
pub use secret::SecretString;
pub use transport::{FileTransportConfig, SmtpConfig, TlsMode, TransportConfig};
pub use types::{
    AddressConfig, Config, DEFAULT_CONFIG_PATH, DEFAULT_FROM_ADDRESS, DEFAULT_FROM_NAME,
    TemplateConfig, TemplateLoaderKind,
};
pub use validation::validate_email_address;

#[cfg(test)]
mod tests;
