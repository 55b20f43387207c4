//! Mail transport configurations (SMTP, file drop).

use super::secret::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

/// Transport configuration with type tag for deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TransportConfig {
    #[serde(rename = "smtp")]
    Smtp(SmtpConfig),
    #[serde(rename = "file")]
    File(FileTransportConfig),
}

impl TransportConfig {
    /// Type name as written in the config file.
    pub fn transport_type(&self) -> &'static str {
        match self {
            TransportConfig::Smtp(_) => "smtp",
            TransportConfig::File(_) => "file",
        }
    }
}

/// SMTP server configuration.
///
/// `host` and `username` support `${ENV_VAR}` substitution, as does the
/// password which is additionally kept out of debug output.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub tls: TlsMode,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

/// Directory that receives one `.eml` file per message.
#[derive(Debug, Clone, Deserialize)]
pub struct FileTransportConfig {
    pub path: PathBuf,
}

/// TLS mode for SMTP connections.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    None,
    #[default]
    Starttls,
    Tls,
}

fn default_smtp_port() -> u16 {
    587
}

pub(crate) fn default_true() -> bool {
    true
}
