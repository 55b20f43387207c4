//! Mail transports.
//!
//! The composer hands a fully assembled [`OutgoingMessage`] to a
//! [`MailTransport`]. Production transports convert it to a
//! `lettre::Message` and deliver it over SMTP or drop it as an `.eml` file.

use super::message::{Address, AttachmentBody, OutgoingMessage};
use crate::config::{FileTransportConfig, SmtpConfig, TlsMode, TransportConfig, resolve_env_vars};
use crate::error::{ConfigError, NotifyError};
use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// MailTransport Trait
// =============================================================================

/// Async delivery abstraction.
///
/// Implementations receive one message per call and either deliver it or
/// report why not. No retries happen above this trait.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Transport type identifier (e.g. "smtp", "file").
    fn transport_type(&self) -> &str;

    /// Deliver a message.
    ///
    /// # Errors
    /// * [`NotifyError::InvalidMessage`] - the message cannot be encoded.
    /// * [`NotifyError::SendFailed`] - delivery was refused or failed.
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError>;
}

/// Build the transport described by the configuration.
pub fn transport_from_config(
    config: &TransportConfig,
) -> Result<Arc<dyn MailTransport>, ConfigError> {
    let transport: Arc<dyn MailTransport> = match config {
        TransportConfig::Smtp(smtp) => Arc::new(SmtpTransport::from_config(smtp)?),
        TransportConfig::File(file) => Arc::new(FileTransport::from_config(file)?),
    };
    tracing::debug!(transport = %config.transport_type(), "Mail transport configured");
    Ok(transport)
}

// =============================================================================
// SMTP
// =============================================================================

/// SMTP delivery over `AsyncSmtpTransport<Tokio1Executor>`.
pub struct SmtpTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
}

impl SmtpTransport {
    /// Wrap an already built lettre transport.
    pub fn new(inner: AsyncSmtpTransport<Tokio1Executor>, host: &str, port: u16) -> Self {
        Self {
            inner,
            host: host.to_string(),
            port,
        }
    }

    /// Build from configuration, resolving `${VAR}` in host and credentials.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidTransport`] when a variable is undefined,
    /// TLS parameters cannot be built or credentials are incomplete.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, ConfigError> {
        let host = resolve_env_vars(&config.host)
            .map_err(|e| ConfigError::InvalidTransport(format!("smtp.host: {}", e)))?;

        let username = config
            .username
            .as_deref()
            .map(resolve_env_vars)
            .transpose()
            .map_err(|e| ConfigError::InvalidTransport(format!("smtp.username: {}", e)))?;

        let password = config
            .password
            .as_ref()
            .map(|p| resolve_env_vars(p.expose()))
            .transpose()
            .map_err(|e| ConfigError::InvalidTransport(format!("smtp.password: {}", e)))?;

        let inner = build_smtp_transport(&host, config, username, password)?;
        Ok(Self::new(inner, &host, config.port))
    }
}

/// Build the SMTP transport for the TLS mode, credentials and `tls_verify` setting.
fn build_smtp_transport(
    host: &str,
    config: &SmtpConfig,
    username: Option<String>,
    password: Option<String>,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, ConfigError> {
    let tls_parameters = || {
        TlsParameters::builder(host.to_string())
            .dangerous_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|e| ConfigError::InvalidTransport(format!("TLS configuration error: {}", e)))
    };

    let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(config.port);
    let builder = match config.tls {
        TlsMode::None => builder,
        TlsMode::Starttls => builder.tls(Tls::Required(tls_parameters()?)),
        TlsMode::Tls => builder.tls(Tls::Wrapper(tls_parameters()?)),
    };

    let builder = match (username, password) {
        (Some(u), Some(p)) => builder.credentials(Credentials::new(u, p)),
        (Some(_), None) => {
            return Err(ConfigError::InvalidTransport(
                "smtp.password required when smtp.username is set".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(ConfigError::InvalidTransport(
                "smtp.username required when smtp.password is set".to_string(),
            ));
        }
        (None, None) => builder,
    };

    Ok(builder.build())
}

#[async_trait]
impl MailTransport for SmtpTransport {
    fn transport_type(&self) -> &str {
        "smtp"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        let email = build_lettre_message(message).await?;
        self.inner
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::SendFailed(e.to_string()))
    }
}

impl std::fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of debug output.
        f.debug_struct("SmtpTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

// =============================================================================
// File drop
// =============================================================================

/// Writes every message as an `.eml` file into a directory.
pub struct FileTransport {
    inner: AsyncFileTransport<Tokio1Executor>,
    dir: PathBuf,
}

impl FileTransport {
    /// Transport writing into `dir`, which must exist.
    pub fn new(dir: &Path) -> Self {
        Self {
            inner: AsyncFileTransport::<Tokio1Executor>::new(dir),
            dir: dir.to_path_buf(),
        }
    }

    /// Build from configuration, creating the directory when missing.
    pub fn from_config(config: &FileTransportConfig) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(&config.path).map_err(|e| {
            ConfigError::InvalidTransport(format!("file.path '{}': {}", config.path.display(), e))
        })?;
        Ok(Self::new(&config.path))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl MailTransport for FileTransport {
    fn transport_type(&self) -> &str {
        "file"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        let email = build_lettre_message(message).await?;
        let id = self
            .inner
            .send(email)
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;
        tracing::debug!(id = %id, dir = %self.dir.display(), "Message written to file");
        Ok(())
    }
}

impl std::fmt::Debug for FileTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTransport")
            .field("dir", &self.dir)
            .finish()
    }
}

// =============================================================================
// OutgoingMessage -> lettre::Message
// =============================================================================

enum Body {
    Single(SinglePart),
    Multi(MultiPart),
}

/// Convert an [`OutgoingMessage`] to a `lettre::Message`.
///
/// Custom headers are written before the subject, so a custom `Subject`
/// header never replaces the rendered subject. The return path becomes the
/// SMTP envelope sender. File-backed attachments are read here.
///
/// # Errors
/// Returns [`NotifyError::InvalidMessage`] for unparsable addresses, header
/// names, content types or unreadable attachment files.
pub async fn build_lettre_message(message: &OutgoingMessage) -> Result<Message, NotifyError> {
    let mut builder = Message::builder().from(mailbox(&message.from)?);

    if let Some(sender) = &message.sender {
        builder = builder.sender(mailbox(sender)?);
    }
    if let Some(reply_to) = &message.reply_to {
        builder = builder.reply_to(mailbox(reply_to)?);
    }
    for address in &message.to {
        builder = builder.to(mailbox(address)?);
    }
    for address in &message.cc {
        builder = builder.cc(mailbox(address)?);
    }
    for address in &message.bcc {
        builder = builder.bcc(mailbox(address)?);
    }

    if let Some(return_path) = &message.return_path {
        let bounce: lettre::Address = return_path.trim().parse().map_err(|e| {
            NotifyError::InvalidMessage(format!("invalid return path '{}': {}", return_path, e))
        })?;
        let recipients = message
            .recipients()
            .map(|address| mailbox(address).map(|mb| mb.email))
            .collect::<Result<Vec<_>, _>>()?;
        let envelope = Envelope::new(Some(bounce), recipients)
            .map_err(|e| NotifyError::InvalidMessage(e.to_string()))?;
        builder = builder.envelope(envelope);
    }

    for (name, value) in message.headers.iter() {
        let header_name = HeaderName::new_from_ascii(name.to_string())
            .map_err(|e| NotifyError::InvalidMessage(format!("header '{}': {}", name, e)))?;
        builder = builder.raw_header(HeaderValue::new(header_name, value.to_string()));
    }

    builder = builder.subject(message.subject.clone());

    let body = match (&message.html, &message.text) {
        (Some(html), Some(text)) => {
            Body::Multi(MultiPart::alternative_plain_html(text.clone(), html.clone()))
        }
        (Some(html), None) => Body::Single(SinglePart::html(html.clone())),
        (None, Some(text)) => Body::Single(SinglePart::plain(text.clone())),
        (None, None) => Body::Single(SinglePart::plain(String::new())),
    };

    let result = if message.attachments.is_empty() {
        match body {
            Body::Single(part) => builder.singlepart(part),
            Body::Multi(part) => builder.multipart(part),
        }
    } else {
        let mut mixed = match body {
            Body::Single(part) => MultiPart::mixed().singlepart(part),
            Body::Multi(part) => MultiPart::mixed().multipart(part),
        };
        for attachment in &message.attachments {
            let content = match &attachment.body {
                AttachmentBody::Bytes(bytes) => bytes.clone(),
                AttachmentBody::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                    NotifyError::InvalidMessage(format!(
                        "attachment '{}': {}",
                        path.display(),
                        e
                    ))
                })?,
            };
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                NotifyError::InvalidMessage(format!(
                    "attachment '{}' content type '{}': {}",
                    attachment.filename, attachment.content_type, e
                ))
            })?;
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone()).body(content, content_type),
            );
        }
        builder.multipart(mixed)
    };

    result.map_err(|e| NotifyError::InvalidMessage(e.to_string()))
}

fn mailbox(address: &Address) -> Result<Mailbox, NotifyError> {
    let email = address.email.trim();
    match &address.name {
        Some(name) => {
            let parsed: lettre::Address = email.parse().map_err(|e| {
                NotifyError::InvalidMessage(format!("invalid address '{}': {}", email, e))
            })?;
            Ok(Mailbox::new(Some(name.clone()), parsed))
        }
        None => email.parse().map_err(|e| {
            NotifyError::InvalidMessage(format!("invalid address '{}': {}", email, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretString;
    use crate::notify::message::MessageAttachment;

    fn base_message() -> OutgoingMessage {
        let mut message = OutgoingMessage::new(Address::with_name("noreply@x.com", "Mailer"));
        message.to.push(Address::new("a@b.com"));
        message.subject = "Hi Ann".to_string();
        message.text = Some("Hello Ann".to_string());
        message
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).to_string()
    }

    fn smtp_config(tls: TlsMode) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: None,
            password: None,
            tls,
            tls_verify: true,
        }
    }

    #[tokio::test]
    async fn converts_addresses_subject_and_plain_body() {
        let email = build_lettre_message(&base_message()).await.unwrap();
        let raw = formatted(&email);

        assert!(raw.contains("From: Mailer <noreply@x.com>"), "got: {}", raw);
        assert!(raw.contains("To: a@b.com"));
        assert!(raw.contains("Subject: Hi Ann"));
        assert!(raw.contains("Hello Ann"));
        assert!(raw.contains("text/plain"));
    }

    #[tokio::test]
    async fn html_and_text_become_multipart_alternative() {
        let mut message = base_message();
        message.html = Some("<p>Hello Ann</p>".to_string());

        let raw = formatted(&build_lettre_message(&message).await.unwrap());

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("<p>Hello Ann</p>"));
    }

    #[tokio::test]
    async fn custom_headers_are_written() {
        let mut message = base_message();
        message.headers.set("X-Campaign", "spring");

        let raw = formatted(&build_lettre_message(&message).await.unwrap());
        assert!(raw.contains("X-Campaign: spring"));
    }

    #[tokio::test]
    async fn invalid_header_name_is_rejected() {
        let mut message = base_message();
        message.headers.set("Bad Header", "x");

        let result = build_lettre_message(&message).await;
        assert!(matches!(result, Err(NotifyError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn invalid_recipient_address_is_rejected() {
        let mut message = base_message();
        message.to = vec![Address::new("not-an-address")];

        let result = build_lettre_message(&message).await;
        assert!(matches!(result, Err(NotifyError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn return_path_sets_envelope_sender() {
        let mut message = base_message();
        message.bcc.push(Address::new("audit@b.com"));
        message.return_path = Some("bounces@x.com".to_string());

        let email = build_lettre_message(&message).await.unwrap();
        let envelope = email.envelope();

        assert_eq!(
            envelope.from().map(|a| a.to_string()),
            Some("bounces@x.com".to_string())
        );
        let recipients: Vec<String> = envelope.to().iter().map(|a| a.to_string()).collect();
        assert!(recipients.contains(&"a@b.com".to_string()));
        assert!(recipients.contains(&"audit@b.com".to_string()));
    }

    #[tokio::test]
    async fn sender_and_reply_to_are_written() {
        let mut message = base_message();
        message.sender = Some(Address::new("bot@x.com"));
        message.reply_to = Some(Address::with_name("help@x.com", "Help Desk"));

        let raw = formatted(&build_lettre_message(&message).await.unwrap());
        assert!(raw.contains("Sender: bot@x.com"));
        assert!(raw.contains("Reply-To: Help Desk <help@x.com>"));
    }

    #[tokio::test]
    async fn attachments_wrap_body_in_multipart_mixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "quarterly numbers").unwrap();

        let mut message = base_message();
        message.attachments.push(MessageAttachment::from_path(&path));
        message
            .attachments
            .push(MessageAttachment::new("summary.pdf", "application/pdf", b"%PDF".to_vec()));

        let raw = formatted(&build_lettre_message(&message).await.unwrap());

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("report.txt"));
        assert!(raw.contains("summary.pdf"));
        assert!(raw.contains("application/pdf"));
    }

    #[tokio::test]
    async fn unreadable_attachment_file_is_rejected() {
        let mut message = base_message();
        message
            .attachments
            .push(MessageAttachment::from_path("/nonexistent/gone.txt"));

        let result = build_lettre_message(&message).await;
        assert!(matches!(result, Err(NotifyError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn file_transport_writes_eml_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FileTransport::from_config(&FileTransportConfig {
            path: dir.path().join("outbox"),
        })
        .unwrap();

        transport.send(&base_message()).await.unwrap();

        let written: Vec<_> = std::fs::read_dir(transport.dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "eml"))
            .collect();
        assert_eq!(written.len(), 1);
        let content = std::fs::read_to_string(written[0].path()).unwrap();
        assert!(content.contains("Subject: Hi Ann"));
    }

    #[tokio::test]
    async fn smtp_from_config_for_every_tls_mode() {
        for tls in [TlsMode::None, TlsMode::Starttls, TlsMode::Tls] {
            let transport = SmtpTransport::from_config(&smtp_config(tls)).unwrap();
            assert_eq!(transport.transport_type(), "smtp");
        }
    }

    #[test]
    fn smtp_from_config_rejects_half_credentials() {
        let mut config = smtp_config(TlsMode::Starttls);
        config.username = Some("mailer".to_string());

        let result = SmtpTransport::from_config(&config);
        assert!(matches!(result, Err(ConfigError::InvalidTransport(_))));

        let mut config = smtp_config(TlsMode::Starttls);
        config.password = Some(SecretString::new("secret".to_string()));

        let result = SmtpTransport::from_config(&config);
        assert!(matches!(result, Err(ConfigError::InvalidTransport(_))));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn smtp_from_config_resolves_credentials_from_env() {
        temp_env::with_vars(
            [
                ("TEST_MAILER_SMTP_USER", Some("mailer")),
                ("TEST_MAILER_SMTP_PASS", Some("hunter2")),
            ],
            || {
                let mut config = smtp_config(TlsMode::Starttls);
                config.username = Some("${TEST_MAILER_SMTP_USER}".to_string());
                config.password = Some(SecretString::new("${TEST_MAILER_SMTP_PASS}".to_string()));

                let transport = SmtpTransport::from_config(&config).unwrap();
                let debug = format!("{:?}", transport);
                assert!(debug.contains("smtp.example.com"));
                assert!(!debug.contains("hunter2"));
            },
        );
    }

    #[test]
    #[serial_test::serial]
    fn smtp_from_config_fails_on_undefined_variable() {
        temp_env::with_var_unset("TEST_MAILER_UNDEFINED_PASS", || {
            let mut config = smtp_config(TlsMode::None);
            config.username = Some("mailer".to_string());
            config.password = Some(SecretString::new("${TEST_MAILER_UNDEFINED_PASS}".to_string()));

            let result = SmtpTransport::from_config(&config);
            assert!(matches!(result, Err(ConfigError::InvalidTransport(_))));
        });
    }

    #[tokio::test]
    async fn transport_from_config_selects_implementation() {
        let dir = tempfile::tempdir().unwrap();
        let file = TransportConfig::File(FileTransportConfig {
            path: dir.path().to_path_buf(),
        });
        assert_eq!(transport_from_config(&file).unwrap().transport_type(), "file");

        let smtp = TransportConfig::Smtp(smtp_config(TlsMode::None));
        assert_eq!(transport_from_config(&smtp).unwrap().transport_type(), "smtp");
    }
}
