//! Tests for Config loading and validation against YAML fixtures.

use super::*;
use crate::error::ConfigError;
use crate::notify::Address;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// ============================================================
// Config Loading Tests
// ============================================================

#[test]
fn load_valid_config() {
    let config = Config::load(&fixture_path("config_valid.yaml")).unwrap();

    // Template loader
    assert_eq!(config.template.loader, TemplateLoaderKind::Filesystem);
    assert_eq!(
        config.template.path.as_deref(),
        Some(fixture_path("templates").as_path())
    );

    // Addresses
    assert_eq!(
        config.from.to_address(),
        Some(Address::with_name("noreply@example.com", "Example Notifications"))
    );
    assert_eq!(config.sender.to_address(), None);
    assert_eq!(
        config.reply_to.to_address(),
        Some(Address::with_name("support@example.com", "Example Support"))
    );
    assert_eq!(config.return_path.as_deref(), Some("bounces@example.com"));
    assert_eq!(config.subject_prefix.as_deref(), Some("[Example] "));

    // Transport
    match config.transport.as_ref().unwrap() {
        TransportConfig::Smtp(smtp) => {
            assert_eq!(smtp.host, "smtp.example.com");
            assert_eq!(smtp.port, 587);
            assert_eq!(smtp.tls, TlsMode::Starttls);
            assert_eq!(smtp.username.as_deref(), Some("mailer"));
            // Substitution happens when the transport is built, not at load.
            assert_eq!(
                smtp.password.as_ref().map(|p| p.expose()),
                Some("${SMTP_PASSWORD}")
            );
        }
        other => panic!("Expected smtp transport, got {:?}", other),
    }

    assert!(config.validate().is_ok(), "{:?}", config.validate().err());
}

#[test]
fn load_minimal_config_applies_defaults() {
    let config = Config::load(&fixture_path("config_minimal.yaml")).unwrap();

    assert_eq!(config.template.loader, TemplateLoaderKind::Clone);
    assert!(config.template.path.is_none());
    assert!(config.template.templates.is_empty());
    assert_eq!(
        config.from.to_address(),
        Some(Address::new("noreply@example.com"))
    );
    assert!(config.reply_to.to_address().is_none());
    assert!(config.return_path.is_none());
    assert!(config.subject_prefix.is_none());
    assert!(config.transport.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn absent_from_uses_default_address() {
    let config = Config::from_yaml("subject_prefix: \"[x] \"").unwrap();

    assert_eq!(
        config.from.to_address(),
        Some(Address::with_name(DEFAULT_FROM_ADDRESS, DEFAULT_FROM_NAME))
    );
}

#[test]
fn load_array_config_with_inline_templates() {
    let config = Config::load(&fixture_path("config_array.yaml")).unwrap();

    assert_eq!(config.template.loader, TemplateLoaderKind::Array);
    assert_eq!(config.template.templates.len(), 3);
    assert!(config.template.templates.contains_key("ping.html.j2"));
    assert!(config.validate().is_ok());
}

#[test]
fn clone_loader_needs_shared_environment_only_without_inline_templates() {
    let minimal = Config::load(&fixture_path("config_minimal.yaml")).unwrap();
    assert_eq!(minimal.template.loader, TemplateLoaderKind::Clone);
    assert!(minimal.template.needs_shared_environment());
    // Still a valid config: a host may supply the environment.
    assert!(minimal.validate().is_ok());

    let with_inline = Config::from_yaml(
        "template:\n  loader: clone\n  templates:\n    a.txt.j2: \"hi\"\n",
    )
    .unwrap();
    assert!(!with_inline.template.needs_shared_environment());

    let array = Config::load(&fixture_path("config_array.yaml")).unwrap();
    assert!(!array.template.needs_shared_environment());
}

#[test]
fn load_nonexistent_file_fails() {
    let result = Config::load(&fixture_path("does_not_exist.yaml"));
    assert!(matches!(result, Err(ConfigError::LoadError(_))));
}

#[test]
fn load_unknown_transport_type_fails() {
    let result = Config::load(&fixture_path("config_bad_transport.yaml"));
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn load_keeps_absolute_template_path() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        "template:\n  loader: filesystem\n  path: /srv/mail/templates\n",
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(
        config.template.path,
        Some(PathBuf::from("/srv/mail/templates"))
    );
}

// ============================================================
// Validation Tests
// ============================================================

#[test]
fn validate_collects_all_errors() {
    let config = Config::load(&fixture_path("config_invalid.yaml")).unwrap();

    let errors = config.validate().unwrap_err();
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();

    assert_eq!(errors.len(), 7, "{:#?}", messages);
    assert!(messages.iter().any(|m| m.contains("from.address")));
    assert!(messages.iter().any(|m| m.contains("sender.address")));
    assert!(messages.iter().any(|m| m.contains("return_path")));
    assert!(messages.iter().any(|m| m.contains("subject_prefix")));
    assert!(messages.iter().any(|m| m.contains("template.path is required")));
    assert!(messages.iter().any(|m| m.contains("smtp.host")));
    assert!(messages.iter().any(|m| m.contains("smtp.password required")));
}

#[test]
fn validate_rejects_broken_inline_template() {
    let config = Config::load(&fixture_path("config_invalid_template.yaml")).unwrap();

    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::InvalidTemplate { name, .. } => assert_eq!(name, "broken.txt.j2"),
        e => panic!("Expected InvalidTemplate, got {:?}", e),
    }
}

#[test]
fn validate_rejects_empty_from_address() {
    let config = Config::from_yaml("from:\n  address: \"  \"\n  name: Nobody\n").unwrap();

    let errors = config.validate().unwrap_err();
    assert!(errors[0].to_string().contains("from.address cannot be empty"));
}

#[test]
fn validate_rejects_template_path_that_is_not_a_directory() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let yaml = format!(
        "template:\n  loader: filesystem\n  path: {}\n",
        file.path().display()
    );
    let config = Config::from_yaml(&yaml).unwrap();

    let errors = config.validate().unwrap_err();
    assert!(errors[0].to_string().contains("is not a directory"));
}

#[test]
fn validate_ignores_name_without_address() {
    let config = Config::from_yaml("reply_to:\n  name: Support\n").unwrap();

    assert!(config.reply_to.to_address().is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn validate_rejects_file_transport_without_path() {
    let config = Config::from_yaml("transport:\n  type: file\n  path: \"\"\n").unwrap();

    let errors = config.validate().unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidTransport(_)));
}

#[test]
fn validate_rejects_password_without_username() {
    let yaml = r#"
transport:
  type: smtp
  host: smtp.example.com
  password: secret
"#;
    let config = Config::from_yaml(yaml).unwrap();

    let errors = config.validate().unwrap_err();
    assert!(errors[0].to_string().contains("smtp.username required"));
}

// ============================================================
// AddressConfig Tests
// ============================================================

#[test]
fn address_config_trims_and_drops_blank_name() {
    let config = AddressConfig {
        address: Some("  a@b.com ".to_string()),
        name: Some("   ".to_string()),
    };
    assert_eq!(config.to_address(), Some(Address::new("a@b.com")));
}

#[test]
fn address_config_without_address_is_unset() {
    assert!(AddressConfig::default().to_address().is_none());
    assert!(AddressConfig::new("", Some("Name")).to_address().is_none());
}
