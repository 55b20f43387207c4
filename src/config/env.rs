//! Environment variable substitution and path resolution.

use crate::error::ConfigError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static ENV_VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex")
});

/// Resolves `${VAR_NAME}` patterns in a string.
///
/// All undefined variables are reported together in one error.
pub fn resolve_env_vars(value: &str) -> Result<String, ConfigError> {
    let mut result = value.to_string();
    let mut errors = Vec::new();

    for cap in ENV_VAR_REGEX.captures_iter(value) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        match std::env::var(var_name) {
            Ok(var_value) => {
                result = result.replace(full_match, &var_value);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(ConfigError::ValidationError(format!(
            "undefined environment variable{}: {}",
            if errors.len() > 1 { "s" } else { "" },
            errors.join(", ")
        )))
    }
}

/// Resolves a configured path against the directory holding the config file.
///
/// Absolute paths are returned unchanged.
pub fn resolve_relative_path(path: &Path, config_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn resolve_env_vars_substitutes_single_variable() {
        temp_env::with_var("TEST_SMTP_HOST_VAR", Some("smtp.example.com"), || {
            let result = resolve_env_vars("${TEST_SMTP_HOST_VAR}");
            assert_eq!(result.unwrap(), "smtp.example.com");
        });
    }

    #[test]
    #[serial]
    fn resolve_env_vars_substitutes_multiple_variables() {
        temp_env::with_vars(
            [
                ("TEST_MAIL_USER", Some("mailer")),
                ("TEST_MAIL_DOMAIN", Some("example.com")),
            ],
            || {
                let result = resolve_env_vars("${TEST_MAIL_USER}@${TEST_MAIL_DOMAIN}");
                assert_eq!(result.unwrap(), "mailer@example.com");
            },
        );
    }

    #[test]
    fn resolve_env_vars_returns_unchanged_without_pattern() {
        let input = "smtp.example.com";
        let result = resolve_env_vars(input);
        assert_eq!(result.unwrap(), input);
    }

    #[test]
    #[serial]
    fn resolve_env_vars_error_on_undefined_variable() {
        temp_env::with_var("UNDEFINED_VAR_XYZ_123", None::<&str>, || {
            let result = resolve_env_vars("${UNDEFINED_VAR_XYZ_123}");
            assert!(result.is_err());
            let err = result.unwrap_err();
            assert!(err.to_string().contains("UNDEFINED_VAR_XYZ_123"));
        });
    }

    #[test]
    #[serial]
    fn resolve_env_vars_error_lists_all_undefined_variables() {
        temp_env::with_vars(
            [("UNDEFINED_A", None::<&str>), ("UNDEFINED_B", None::<&str>)],
            || {
                let result = resolve_env_vars("${UNDEFINED_A} and ${UNDEFINED_B}");
                let err = result.unwrap_err().to_string();
                assert!(err.contains("variables"));
                assert!(err.contains("UNDEFINED_A"));
                assert!(err.contains("UNDEFINED_B"));
            },
        );
    }

    #[test]
    #[serial]
    fn resolve_env_vars_preserves_text_around_variables() {
        temp_env::with_var("TEST_MIDDLE", Some("REPLACED"), || {
            let result = resolve_env_vars("prefix_${TEST_MIDDLE}_suffix");
            assert_eq!(result.unwrap(), "prefix_REPLACED_suffix");
        });
    }

    #[test]
    #[serial]
    fn resolve_env_vars_handles_empty_env_value() {
        temp_env::with_var("TEST_EMPTY_VAR", Some(""), || {
            let result = resolve_env_vars("before${TEST_EMPTY_VAR}after");
            assert_eq!(result.unwrap(), "beforeafter");
        });
    }

    #[test]
    fn resolve_relative_path_joins_config_dir() {
        let resolved = resolve_relative_path(Path::new("templates"), Path::new("/etc/mailer"));
        assert_eq!(resolved, PathBuf::from("/etc/mailer/templates"));
    }

    #[test]
    fn resolve_relative_path_keeps_absolute() {
        let resolved = resolve_relative_path(Path::new("/srv/templates"), Path::new("/etc/mailer"));
        assert_eq!(resolved, PathBuf::from("/srv/templates"));
    }
}
