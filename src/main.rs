//! notification-mailer - render templated notifications and send them by email.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use notification_mailer::cli::{Cli, Command, LogFormat};
use notification_mailer::config::Config;
use notification_mailer::notify::{
    AttachmentInput, MessageComposer, RecipientSet, TemplateContext,
};
use notification_mailer::metrics;
use notification_mailer::preview::render_preview;
use notification_mailer::template::TemplateEngine;

/// Initialize the tracing subscriber with the specified log format.
///
/// Logs go to stderr so previews on stdout stay clean.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format);

    info!(config_path = %cli.config.display(), "Loading configuration");

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
            std::process::exit(1);
        }
    };

    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Configuration validation error");
        }
        error!(
            error_count = errors.len(),
            "Configuration validation failed"
        );
        std::process::exit(1);
    }

    if cli.validate || cli.command.is_none() {
        print_summary(&cli, &config);
        return Ok(());
    }
    let Some(command) = cli.command else {
        return Ok(());
    };

    // The binary has no host environment to clone.
    if config.template.needs_shared_environment() {
        error!(
            path = %cli.config.display(),
            "template.loader 'clone' needs inline templates when run from the command line; \
             use the filesystem or array loader"
        );
        std::process::exit(1);
    }

    match command {
        Command::Preview {
            template,
            format,
            data,
        } => {
            let engine = TemplateEngine::from_config(&config.template, None)?;
            let overrides = parse_context(data.as_deref())?;
            let page = render_preview(&engine, &template, format, overrides)?;
            println!("{}", page);
            Ok(())
        }
        Command::Send {
            template,
            to,
            cc,
            bcc,
            subject,
            data,
            headers,
            attach,
        } => {
            let context = parse_context(data.as_deref())?;
            let recipients = RecipientSet::new()
                .with("to", to)
                .with("cc", cc)
                .with("bcc", bcc);
            let attachments: Vec<AttachmentInput> =
                attach.into_iter().map(AttachmentInput::from).collect();

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(async {
                let composer = MessageComposer::from_config(&config, None)?;
                metrics::register_metric_descriptions();
                metrics::initialize_metrics(composer.transport().transport_type());

                let headers: Vec<(&str, &str)> = headers
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect();

                composer
                    .send_template_message_multi(
                        &template,
                        &recipients,
                        &subject,
                        context,
                        &headers,
                        &attachments,
                    )
                    .await?;

                println!(
                    "Sent 1 message via {} transport",
                    composer.transport().transport_type()
                );
                Ok::<(), anyhow::Error>(())
            })
        }
    }
}

/// Print the effective configuration.
fn print_summary(cli: &Cli, config: &Config) {
    println!("Configuration is valid: {}", cli.config.display());
    if let Some(from) = config.from.to_address() {
        println!("  From: {}", from);
    }
    match &config.template.path {
        Some(path) => println!(
            "  Templates: {:?} loader ({})",
            config.template.loader,
            path.display()
        ),
        None => println!("  Templates: {:?} loader", config.template.loader),
    }
    println!("  Inline templates: {}", config.template.templates.len());
    match &config.transport {
        Some(transport) => println!("  Transport: {}", transport.transport_type()),
        None => println!("  Transport: none (sending disabled)"),
    }
}

/// Parse a `--data` argument into a template context.
fn parse_context(data: Option<&str>) -> Result<TemplateContext> {
    match data {
        Some(raw) => serde_json::from_str(raw).context("--data must be a JSON object"),
        None => Ok(TemplateContext::new()),
    }
}
