//! Outgoing message model handed to a [`MailTransport`](super::MailTransport).

use std::fmt;
use std::path::PathBuf;

/// An email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Address part (`local@domain`). May also hold a full `Name <addr>` form.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
}

impl Address {
    /// Address without display name.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Address with display name.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }

    /// True when the address part is blank.
    pub fn is_blank(&self) -> bool {
        self.email.trim().is_empty()
    }
}

impl From<&str> for Address {
    fn from(email: &str) -> Self {
        Address::new(email)
    }
}

impl From<String> for Address {
    fn from(email: String) -> Self {
        Address::new(email)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

/// Free-form text headers, looked up by case-insensitive name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    entries: Vec<(String, String)>,
}

impl MessageHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header value.
    ///
    /// An existing header with the same name keeps its position and
    /// receives the new value; otherwise the header is appended.
    /// Returns `true` when an existing value was overwritten.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some((_, existing_value)) => {
                *existing_value = value.to_string();
                true
            }
            None => {
                self.entries.push((name.to_string(), value.to_string()));
                false
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Content of an attachment: in-memory bytes or a file read at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentBody {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// A normalized attachment ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttachment {
    pub filename: String,
    pub content_type: String,
    pub body: AttachmentBody,
}

impl MessageAttachment {
    /// Attachment from in-memory bytes.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            body: AttachmentBody::Bytes(bytes),
        }
    }

    /// Attachment read from `path` at delivery time.
    ///
    /// The filename is the last path component and the content type is
    /// guessed from the extension (`application/octet-stream` if unknown).
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            filename,
            content_type,
            body: AttachmentBody::Path(path),
        }
    }
}

/// A fully assembled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: Address,
    pub sender: Option<Address>,
    pub reply_to: Option<Address>,
    /// Bounce address; a bare address, never a display-name pair.
    pub return_path: Option<String>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub headers: MessageHeaders,
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<MessageAttachment>,
}

impl OutgoingMessage {
    /// Empty message from the given address.
    pub fn new(from: Address) -> Self {
        Self {
            from,
            sender: None,
            reply_to: None,
            return_path: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            headers: MessageHeaders::new(),
            subject: String::new(),
            html: None,
            text: None,
            attachments: Vec::new(),
        }
    }

    /// All recipients across to, cc and bcc.
    pub fn recipients(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }
}
