//! Command-line interface for notification-mailer using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::preview::PreviewFormat;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format for log aggregation.
    Json,
}

/// Render templated notifications and send them by email.
#[derive(Parser, Debug)]
#[command(name = "notification-mailer")]
#[command(version)]
#[command(about = "Render templated notifications and send them by email")]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Validate configuration and exit.
    #[arg(long = "validate")]
    pub validate: bool,

    /// Log format: text or json.
    #[arg(
        long = "log-format",
        value_enum,
        default_value_t = LogFormat::Text,
        env = "LOG_FORMAT",
        global = true
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a template with sample data and print the page to stdout.
    Preview {
        /// Template reference (without `.html.j2` / `.txt.j2`).
        template: String,

        /// Variant to render.
        #[arg(long, value_enum, default_value_t = PreviewFormat::Html)]
        format: PreviewFormat,

        /// JSON object overriding the sample data.
        #[arg(long)]
        data: Option<String>,
    },

    /// Render a template pair and send it.
    Send {
        /// Template reference (without `.html.j2` / `.txt.j2`).
        #[arg(long)]
        template: String,

        /// Recipient, may be repeated.
        #[arg(long)]
        to: Vec<String>,

        /// Carbon-copy recipient, may be repeated.
        #[arg(long)]
        cc: Vec<String>,

        /// Blind carbon-copy recipient, may be repeated.
        #[arg(long)]
        bcc: Vec<String>,

        /// Subject, may use template syntax.
        #[arg(long)]
        subject: String,

        /// JSON object used as template context.
        #[arg(long)]
        data: Option<String>,

        /// Extra header as `Name: value`, may be repeated.
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// File to attach, may be repeated.
        #[arg(long)]
        attach: Vec<PathBuf>,
    },
}

/// Parse a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
