//! Core configuration types and loading.

use super::env::resolve_relative_path;
use super::transport::TransportConfig;
use super::validation::{validate_email_address, validate_header_value, validate_jinja_template};
use crate::error::ConfigError;
use crate::notify::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/notification-mailer/config.yaml";

/// Default `from` address when the config file does not set one.
pub const DEFAULT_FROM_ADDRESS: &str = "nobody@domain.tld";

/// Default `from` display name when the config file does not set one.
pub const DEFAULT_FROM_NAME: &str = "Mr. Nobody";

/// Main configuration structure.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Template loading strategy.
    #[serde(default)]
    pub template: TemplateConfig,
    /// Default from address (required to be non-empty).
    #[serde(default = "default_from")]
    pub from: AddressConfig,
    /// Optional sender address.
    #[serde(default)]
    pub sender: AddressConfig,
    /// Optional reply-to address.
    #[serde(default)]
    pub reply_to: AddressConfig,
    /// Optional bounce address (bare address, no display name).
    #[serde(default)]
    pub return_path: Option<String>,
    /// Optional prefix prepended verbatim to every subject.
    #[serde(default)]
    pub subject_prefix: Option<String>,
    /// Delivery transport. Without one, messages can be composed but not sent.
    #[serde(default)]
    pub transport: Option<TransportConfig>,
}

/// An address with optional display name, as written in the config file.
///
/// An absent or blank `address` means "not configured"; a name without
/// an address is ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AddressConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl AddressConfig {
    /// Create an address config from parts.
    pub fn new(address: &str, name: Option<&str>) -> Self {
        Self {
            address: Some(address.to_string()),
            name: name.map(String::from),
        }
    }

    /// Convert into a message address, `None` when no address is configured.
    pub fn to_address(&self) -> Option<Address> {
        let email = self.address.as_deref().map(str::trim).filter(|a| !a.is_empty())?;
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        Some(match name {
            Some(name) => Address::with_name(email, name),
            None => Address::new(email),
        })
    }
}

fn default_from() -> AddressConfig {
    AddressConfig::new(DEFAULT_FROM_ADDRESS, Some(DEFAULT_FROM_NAME))
}

/// Template loading configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateConfig {
    /// Which loader strategy to use.
    #[serde(default)]
    pub loader: TemplateLoaderKind,
    /// Template directory for the filesystem loader.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Inline templates (name -> source) for the array loader.
    #[serde(default)]
    pub templates: HashMap<String, String>,
}

impl TemplateConfig {
    /// True when templates can only come from a host-supplied environment:
    /// the `clone` loader with no inline templates to fall back on.
    pub fn needs_shared_environment(&self) -> bool {
        self.loader == TemplateLoaderKind::Clone && self.templates.is_empty()
    }
}

/// Template loader strategy.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemplateLoaderKind {
    /// Clone of the host application's template environment.
    #[default]
    Clone,
    /// Fresh environment reading templates from a directory.
    Filesystem,
    /// Fresh environment over an in-memory template map.
    Array,
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// A relative `template.path` is resolved against the directory
    /// containing the config file.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file cannot be read.
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_yaml(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        if let Some(template_path) = config.template.path.take() {
            config.template.path = Some(resolve_relative_path(&template_path, config_dir));
        }

        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate the whole configuration.
    ///
    /// # Errors
    /// Returns a `Vec<ConfigError>` containing every problem found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        match self.from.address.as_deref().map(str::trim) {
            None | Some("") => errors.push(ConfigError::ValidationError(
                "from.address cannot be empty".to_string(),
            )),
            Some(address) => {
                if let Err(e) = validate_email_address(address) {
                    errors.push(ConfigError::ValidationError(format!("from.address: {}", e)));
                }
            }
        }

        for (field, config) in [("sender", &self.sender), ("reply_to", &self.reply_to)] {
            if let Some(address) = config.to_address()
                && let Err(e) = validate_email_address(&address.email)
            {
                errors.push(ConfigError::ValidationError(format!(
                    "{}.address: {}",
                    field, e
                )));
            }
        }

        if let Some(return_path) = self.return_path.as_deref().map(str::trim)
            && !return_path.is_empty()
            && let Err(e) = validate_email_address(return_path)
        {
            errors.push(ConfigError::ValidationError(format!("return_path: {}", e)));
        }

        if let Some(prefix) = &self.subject_prefix
            && let Err(e) = validate_header_value(prefix)
        {
            errors.push(ConfigError::ValidationError(format!(
                "subject_prefix: {}",
                e
            )));
        }

        self.validate_template(&mut errors);
        self.validate_transport(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_template(&self, errors: &mut Vec<ConfigError>) {
        match self.template.loader {
            TemplateLoaderKind::Filesystem => match &self.template.path {
                None => errors.push(ConfigError::ValidationError(
                    "template.path is required for the filesystem loader".to_string(),
                )),
                Some(path) if !path.is_dir() => {
                    errors.push(ConfigError::ValidationError(format!(
                        "template.path '{}' is not a directory",
                        path.display()
                    )))
                }
                Some(_) => {}
            },
            TemplateLoaderKind::Clone | TemplateLoaderKind::Array => {
                if self.template.needs_shared_environment() {
                    tracing::warn!(
                        "template.loader is clone with no inline templates; \
                         templates must come from the host environment"
                    );
                }
                if self.template.path.is_some() {
                    tracing::warn!(
                        loader = ?self.template.loader,
                        "template.path is only used by the filesystem loader"
                    );
                }
            }
        }

        for (name, source) in &self.template.templates {
            if let Err(e) = validate_jinja_template(source) {
                errors.push(ConfigError::InvalidTemplate {
                    name: name.clone(),
                    message: e,
                });
            }
        }
    }

    fn validate_transport(&self, errors: &mut Vec<ConfigError>) {
        match &self.transport {
            Some(TransportConfig::Smtp(smtp)) => {
                if smtp.host.trim().is_empty() {
                    errors.push(ConfigError::InvalidTransport(
                        "smtp.host cannot be empty".to_string(),
                    ));
                }
                match (&smtp.username, &smtp.password) {
                    (Some(_), None) => errors.push(ConfigError::InvalidTransport(
                        "smtp.password required when smtp.username is set".to_string(),
                    )),
                    (None, Some(_)) => errors.push(ConfigError::InvalidTransport(
                        "smtp.username required when smtp.password is set".to_string(),
                    )),
                    _ => {}
                }
            }
            Some(TransportConfig::File(file)) => {
                if file.path.as_os_str().is_empty() {
                    errors.push(ConfigError::InvalidTransport(
                        "file.path cannot be empty".to_string(),
                    ));
                }
            }
            None => {}
        }
    }
}
