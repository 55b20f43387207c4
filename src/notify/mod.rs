//! Template-driven message composition and dispatch.
//!
//! [`MessageComposer`] renders a subject and html/plain bodies from either
//! named templates or inline template strings, validates the result, merges
//! extra headers and attachments into an [`OutgoingMessage`] and hands it to
//! a [`MailTransport`].
//!
//! ```text
//! send_template_message ──────┐
//! send_template_message_multi ┤
//! send_template_string_* ─────┴─> compose ─> MailTransport::send ─> sent count
//! ```
//!
//! # Example
//!
//! ```ignore
//! use notification_mailer::notify::{MessageComposer, TemplateContext};
//!
//! let composer = MessageComposer::from_config(&config, None)?;
//! let mut context = TemplateContext::new();
//! context.insert("name".into(), "Ann".into());
//! composer
//!     .send_template_message("welcome", "a@b.com", "Hi {{ name }}", context, &[], &[])
//!     .await?;
//! ```

pub mod attachment;
pub mod message;
pub mod recipients;
pub mod transport;

use crate::config::Config;
use crate::error::{ConfigError, NotifyError};
use crate::template::{HTML_TEMPLATE_SUFFIX, TEXT_TEMPLATE_SUFFIX, TemplateEngine};
use minijinja::Environment;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Instrument;

pub use attachment::{
    AttachmentInput, PdfBuffer, PdfMetadata, PdfSource, UploadedFile, attachment_file_name,
};
pub use message::{Address, AttachmentBody, MessageAttachment, MessageHeaders, OutgoingMessage};
pub use recipients::{AddressList, RecipientKind, RecipientSet};
pub use transport::{
    FileTransport, MailTransport, SmtpTransport, build_lettre_message, transport_from_config,
};

/// Variables available to subject and body templates.
pub type TemplateContext = serde_json::Map<String, Value>;

/// Context key holding the literal subject.
pub const SUBJECT_KEY: &str = "subject";

/// Context key holding a `=` line as long as the subject.
pub const SUBJECT_UNDERLINE_KEY: &str = "subject_underline";

pub(crate) const OP_TEMPLATE: &str = "send_template_message";
pub(crate) const OP_TEMPLATE_MULTI: &str = "send_template_message_multi";
pub(crate) const OP_STRING: &str = "send_template_string_message";
pub(crate) const OP_STRING_MULTI: &str = "send_template_string_message_multi";

// =============================================================================
// Template strings
// =============================================================================

/// Inline body templates.
///
/// `plain` and `txt` fill the same plain-text slot; when both are given,
/// `txt` is rendered last and wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateStrings {
    pub html: Option<String>,
    pub plain: Option<String>,
    pub txt: Option<String>,
}

impl TemplateStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn html(mut self, source: impl Into<String>) -> Self {
        self.html = Some(source.into());
        self
    }

    pub fn plain(mut self, source: impl Into<String>) -> Self {
        self.plain = Some(source.into());
        self
    }

    pub fn txt(mut self, source: impl Into<String>) -> Self {
        self.txt = Some(source.into());
        self
    }
}

/// Builds from `(key, source)` pairs; keys other than `html`, `plain` and
/// `txt` are ignored.
impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for TemplateStrings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut strings = TemplateStrings::new();
        for (key, source) in iter {
            match key.as_ref() {
                "html" => strings.html = Some(source.into()),
                "plain" => strings.plain = Some(source.into()),
                "txt" => strings.txt = Some(source.into()),
                _ => {}
            }
        }
        strings
    }
}

/// Where the bodies of a message come from.
#[derive(Debug, Clone, Copy)]
enum BodySource<'a> {
    Named(&'a str),
    Strings(&'a TemplateStrings),
}

impl BodySource<'_> {
    fn label(&self) -> &str {
        match self {
            BodySource::Named(name) => name,
            BodySource::Strings(_) => "<inline>",
        }
    }
}

// =============================================================================
// MessageComposer
// =============================================================================

/// Renders, assembles and dispatches templated messages.
///
/// The send count is atomic, so one composer can be shared between
/// concurrent callers.
pub struct MessageComposer {
    transport: Arc<dyn MailTransport>,
    templates: TemplateEngine,
    from: Option<Address>,
    sender: Option<Address>,
    reply_to: Option<Address>,
    return_path: Option<String>,
    subject_prefix: Option<String>,
    sent: AtomicU64,
}

impl MessageComposer {
    /// Composer with no addresses configured.
    ///
    /// A `from` address must be set before any send can succeed.
    pub fn new(transport: Arc<dyn MailTransport>, templates: TemplateEngine) -> Self {
        Self {
            transport,
            templates,
            from: None,
            sender: None,
            reply_to: None,
            return_path: None,
            subject_prefix: None,
            sent: AtomicU64::new(0),
        }
    }

    /// Build a composer and its transport from configuration.
    ///
    /// `shared` is the host application's template environment, used by the
    /// `clone` loader.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidTransport`] when no transport is
    /// configured or it cannot be built, and template errors from the loader.
    pub fn from_config(
        config: &Config,
        shared: Option<&Environment<'static>>,
    ) -> Result<Self, ConfigError> {
        let transport_config = config.transport.as_ref().ok_or_else(|| {
            ConfigError::InvalidTransport("no transport configured".to_string())
        })?;
        let transport = transport_from_config(transport_config)?;
        Self::with_transport(config, transport, shared)
    }

    /// Build a composer from configuration with an explicit transport.
    pub fn with_transport(
        config: &Config,
        transport: Arc<dyn MailTransport>,
        shared: Option<&Environment<'static>>,
    ) -> Result<Self, ConfigError> {
        let templates = TemplateEngine::from_config(&config.template, shared)?;
        let mut composer = Self::new(transport, templates);
        composer
            .set_from(config.from.to_address())
            .set_sender(config.sender.to_address())
            .set_reply_to(config.reply_to.to_address())
            .set_return_path(config.return_path.clone())
            .set_subject_prefix(config.subject_prefix.clone());
        Ok(composer)
    }

    pub fn set_from(&mut self, from: impl Into<Option<Address>>) -> &mut Self {
        self.from = from.into();
        self
    }

    pub fn set_sender(&mut self, sender: impl Into<Option<Address>>) -> &mut Self {
        self.sender = sender.into();
        self
    }

    pub fn set_reply_to(&mut self, reply_to: impl Into<Option<Address>>) -> &mut Self {
        self.reply_to = reply_to.into();
        self
    }

    pub fn set_return_path(&mut self, return_path: impl Into<Option<String>>) -> &mut Self {
        self.return_path = return_path.into();
        self
    }

    pub fn set_subject_prefix(&mut self, prefix: impl Into<Option<String>>) -> &mut Self {
        self.subject_prefix = prefix.into();
        self
    }

    pub fn set_transport(&mut self, transport: Arc<dyn MailTransport>) -> &mut Self {
        self.transport = transport;
        self
    }

    pub fn transport(&self) -> &Arc<dyn MailTransport> {
        &self.transport
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    /// Mutable access, e.g. to register templates at runtime.
    pub fn templates_mut(&mut self) -> &mut TemplateEngine {
        &mut self.templates
    }

    /// Messages successfully handed to the transport since creation or
    /// the last reset.
    pub fn sent_messages_count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn reset_messages_count(&self) {
        self.sent.store(0, Ordering::SeqCst);
    }

    /// Send a named template pair to one address or a list of `to` addresses.
    pub async fn send_template_message(
        &self,
        template: &str,
        to: impl Into<AddressList>,
        subject: &str,
        context: TemplateContext,
        headers: &[(&str, &str)],
        attachments: &[AttachmentInput],
    ) -> Result<(), NotifyError> {
        let recipients = RecipientSet::to(to);
        self.dispatch(
            OP_TEMPLATE,
            BodySource::Named(template),
            &recipients,
            subject,
            context,
            headers,
            attachments,
        )
        .await
    }

    /// Send a named template pair to recipients keyed by kind.
    ///
    /// Bodies come from `<template>.html.j2` and `<template>.txt.j2`; a
    /// variant whose template does not exist is skipped.
    pub async fn send_template_message_multi(
        &self,
        template: &str,
        recipients: &RecipientSet,
        subject: &str,
        context: TemplateContext,
        headers: &[(&str, &str)],
        attachments: &[AttachmentInput],
    ) -> Result<(), NotifyError> {
        self.dispatch(
            OP_TEMPLATE_MULTI,
            BodySource::Named(template),
            recipients,
            subject,
            context,
            headers,
            attachments,
        )
        .await
    }

    /// Send inline template strings to one address or a list of `to` addresses.
    pub async fn send_template_string_message(
        &self,
        strings: &TemplateStrings,
        to: impl Into<AddressList>,
        subject: &str,
        context: TemplateContext,
        headers: &[(&str, &str)],
        attachments: &[AttachmentInput],
    ) -> Result<(), NotifyError> {
        let recipients = RecipientSet::to(to);
        self.dispatch(
            OP_STRING,
            BodySource::Strings(strings),
            &recipients,
            subject,
            context,
            headers,
            attachments,
        )
        .await
    }

    /// Send inline template strings to recipients keyed by kind.
    pub async fn send_template_string_message_multi(
        &self,
        strings: &TemplateStrings,
        recipients: &RecipientSet,
        subject: &str,
        context: TemplateContext,
        headers: &[(&str, &str)],
        attachments: &[AttachmentInput],
    ) -> Result<(), NotifyError> {
        self.dispatch(
            OP_STRING_MULTI,
            BodySource::Strings(strings),
            recipients,
            subject,
            context,
            headers,
            attachments,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        operation: &'static str,
        source: BodySource<'_>,
        recipients: &RecipientSet,
        subject: &str,
        context: TemplateContext,
        headers: &[(&str, &str)],
        attachments: &[AttachmentInput],
    ) -> Result<(), NotifyError> {
        let span = tracing::info_span!(
            "send_message",
            operation = operation,
            template = %source.label()
        );

        async {
            let result = match self.compose(
                operation,
                source,
                recipients,
                subject,
                context,
                headers,
                attachments,
            ) {
                Ok(message) => self.transport.send(&message).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    let total = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
                    metrics::counter!(
                        crate::metrics::MESSAGES_SENT_TOTAL,
                        "operation" => operation,
                        "transport" => self.transport.transport_type().to_string()
                    )
                    .increment(1);
                    tracing::info!(sent_total = total, "Message sent");
                    Ok(())
                }
                Err(e) => {
                    metrics::counter!(
                        crate::metrics::SEND_ERRORS_TOTAL,
                        "operation" => operation,
                        "reason" => e.reason()
                    )
                    .increment(1);
                    tracing::warn!(error = %e, reason = e.reason(), "Message not sent");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Render, validate and assemble a message without sending it.
    #[allow(clippy::too_many_arguments)]
    fn compose(
        &self,
        operation: &'static str,
        source: BodySource<'_>,
        recipients: &RecipientSet,
        subject: &str,
        mut context: TemplateContext,
        headers: &[(&str, &str)],
        attachments: &[AttachmentInput],
    ) -> Result<OutgoingMessage, NotifyError> {
        context
            .entry(SUBJECT_KEY)
            .or_insert_with(|| Value::String(subject.to_string()));
        context
            .entry(SUBJECT_UNDERLINE_KEY)
            .or_insert_with(|| Value::String("=".repeat(subject.chars().count())));

        let subject = self.templates.render_str(subject, &context)?;
        let (html, text) = self.render_bodies(source, &context)?;

        if recipients.is_empty() {
            return Err(NotifyError::MissingRecipient { operation });
        }
        if subject.trim().is_empty() {
            return Err(NotifyError::MissingSubject { operation });
        }
        if html.is_none() && text.is_none() {
            return Err(match source {
                BodySource::Named(template) => NotifyError::NoTemplateRendered {
                    operation,
                    template: template.to_string(),
                },
                BodySource::Strings(_) => NotifyError::MissingContent { operation },
            });
        }
        let from = self
            .from
            .as_ref()
            .filter(|from| !from.is_blank())
            .ok_or(NotifyError::MissingFromAddress { operation })?;

        let mut message = OutgoingMessage::new(from.clone());
        message.sender = self.sender.clone().filter(|a| !a.is_blank());
        message.reply_to = self.reply_to.clone().filter(|a| !a.is_blank());
        message.return_path = self
            .return_path
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from);

        // Keys differing only in case land in the same list.
        for (key, addresses) in recipients.entries() {
            let kind =
                RecipientKind::parse(key).ok_or_else(|| NotifyError::InvalidRecipientKind {
                    operation,
                    kind: key.to_string(),
                })?;
            let target = match kind {
                RecipientKind::To => &mut message.to,
                RecipientKind::Cc => &mut message.cc,
                RecipientKind::Bcc => &mut message.bcc,
            };
            target.extend(addresses.iter().filter(|a| !a.is_blank()).cloned());
        }

        for (name, value) in headers {
            if message.headers.set(name, value) {
                tracing::debug!(header = %name, "Header overwritten");
            }
        }

        message.subject = match self.subject_prefix.as_deref().filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{}{}", prefix, subject),
            None => subject,
        };

        for input in attachments {
            match input.normalize() {
                Some(attachment) => message.attachments.push(attachment),
                None => tracing::debug!(
                    kind = input.kind(),
                    input = ?input,
                    "Attachment skipped"
                ),
            }
        }

        message.html = html;
        message.text = text;

        tracing::debug!(
            recipients = message.recipients().count(),
            attachments = message.attachments.len(),
            headers = message.headers.len(),
            "Message assembled"
        );
        Ok(message)
    }

    fn render_bodies(
        &self,
        source: BodySource<'_>,
        context: &TemplateContext,
    ) -> Result<(Option<String>, Option<String>), NotifyError> {
        match source {
            BodySource::Named(template) => {
                let html_name = format!("{}{}", template, HTML_TEMPLATE_SUFFIX);
                let text_name = format!("{}{}", template, TEXT_TEMPLATE_SUFFIX);

                let html = if self.templates.exists(&html_name) {
                    Some(self.templates.render(&html_name, context)?)
                } else {
                    None
                };
                let text = if self.templates.exists(&text_name) {
                    Some(self.templates.render(&text_name, context)?)
                } else {
                    None
                };
                Ok((html, text))
            }
            BodySource::Strings(strings) => {
                let html = strings
                    .html
                    .as_deref()
                    .map(|source| self.templates.render_html_str(source, context))
                    .transpose()?;
                let mut text = None;
                for source in [&strings.plain, &strings.txt].into_iter().flatten() {
                    text = Some(self.templates.render_str(source, context)?);
                }
                Ok((html, text))
            }
        }
    }
}

impl std::fmt::Debug for MessageComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageComposer")
            .field("transport", &self.transport.transport_type())
            .field("templates", &self.templates)
            .field("from", &self.from)
            .field("sender", &self.sender)
            .field("reply_to", &self.reply_to)
            .field("return_path", &self.return_path)
            .field("subject_prefix", &self.subject_prefix)
            .field("sent", &self.sent_messages_count())
            .finish()
    }
}
