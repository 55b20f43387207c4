//! Template and address validation utilities.

use minijinja::Environment;

/// Validates Jinja template syntax.
pub(crate) fn validate_jinja_template(source: &str) -> Result<(), String> {
    let mut env = Environment::new();
    env.add_template("_validate", source)
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Validates a bare email address (`local@domain`, no display name).
pub fn validate_email_address(address: &str) -> Result<(), String> {
    address
        .trim()
        .parse::<lettre::Address>()
        .map(|_| ())
        .map_err(|e| format!("invalid email address '{}': {}", address, e))
}

/// Rejects values that would break a header line.
pub(crate) fn validate_header_value(value: &str) -> Result<(), String> {
    if value.contains(['\r', '\n']) {
        Err("must not contain line breaks".to_string())
    } else {
        Ok(())
    }
}
