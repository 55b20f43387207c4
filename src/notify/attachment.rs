//! Attachment inputs and their normalization into [`MessageAttachment`]s.
//!
//! Callers hand the composer a mix of file paths, uploaded files, ready-made
//! attachments and in-memory PDF documents. Each input is normalized to a
//! [`MessageAttachment`]; inputs that cannot be resolved (such as a path
//! that does not exist) are skipped without error.

use super::message::MessageAttachment;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Content type of generated PDF documents.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Metadata key holding the document title in [`PdfMetadata`].
pub const PDF_TITLE_KEY: &str = "Title";

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9._-]").expect("Invalid regex pattern"));

/// An in-memory PDF document that can be attached to a message.
///
/// Implemented by adapters around PDF generators; the composer only needs
/// the rendered bytes and an optional title for the attachment filename.
pub trait PdfSource: Send + Sync {
    /// Rendered document bytes.
    fn pdf_bytes(&self) -> Vec<u8>;

    /// Document title, if the generator recorded one.
    fn title(&self) -> Option<String>;
}

/// PDF produced by a generator that keeps its title as a dedicated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfBuffer {
    pub bytes: Vec<u8>,
    pub title: Option<String>,
}

impl PdfBuffer {
    pub fn new(bytes: Vec<u8>, title: Option<&str>) -> Self {
        Self {
            bytes,
            title: title.map(String::from),
        }
    }
}

impl PdfSource for PdfBuffer {
    fn pdf_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn title(&self) -> Option<String> {
        self.title.clone()
    }
}

/// PDF produced by a generator that keeps a document-info dictionary.
///
/// The title is read from the `Title` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfMetadata {
    pub bytes: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

impl PdfMetadata {
    pub fn new(bytes: Vec<u8>, metadata: HashMap<String, String>) -> Self {
        Self { bytes, metadata }
    }
}

impl PdfSource for PdfMetadata {
    fn pdf_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn title(&self) -> Option<String> {
        self.metadata.get(PDF_TITLE_KEY).cloned()
    }
}

/// A file received through an upload form.
///
/// `real_path` is where the upload is stored on disk; `client_name` is the
/// filename reported by the client, used as attachment name when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub real_path: PathBuf,
    pub client_name: Option<String>,
}

impl UploadedFile {
    pub fn new(real_path: impl Into<PathBuf>, client_name: Option<&str>) -> Self {
        Self {
            real_path: real_path.into(),
            client_name: client_name.map(String::from),
        }
    }
}

/// Anything the composer accepts as an attachment.
pub enum AttachmentInput {
    /// Path to a file on disk. Skipped when the file does not exist.
    Path(PathBuf),
    /// Uploaded file, attached from its real path.
    Upload(UploadedFile),
    /// Ready-made attachment, passed through unchanged.
    Prebuilt(MessageAttachment),
    /// In-memory PDF document.
    Pdf(Box<dyn PdfSource>),
}

impl AttachmentInput {
    /// Wrap any PDF source.
    pub fn pdf(source: impl PdfSource + 'static) -> Self {
        AttachmentInput::Pdf(Box::new(source))
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AttachmentInput::Path(_) => "path",
            AttachmentInput::Upload(_) => "upload",
            AttachmentInput::Prebuilt(_) => "prebuilt",
            AttachmentInput::Pdf(_) => "pdf",
        }
    }

    /// Normalize into a message attachment.
    ///
    /// Returns `None` for inputs that cannot be resolved.
    pub fn normalize(&self) -> Option<MessageAttachment> {
        match self {
            AttachmentInput::Path(path) => {
                path.is_file().then(|| MessageAttachment::from_path(path))
            }
            AttachmentInput::Upload(upload) => {
                if !upload.real_path.is_file() {
                    return None;
                }
                let mut attachment = MessageAttachment::from_path(&upload.real_path);
                if let Some(name) = upload.client_name.as_deref().and_then(client_file_name) {
                    attachment.content_type = mime_guess::from_path(&name)
                        .first_or_octet_stream()
                        .essence_str()
                        .to_string();
                    attachment.filename = name;
                }
                Some(attachment)
            }
            AttachmentInput::Prebuilt(attachment) => Some(attachment.clone()),
            AttachmentInput::Pdf(source) => {
                let filename = format!("{}.pdf", attachment_file_name(source.title().as_deref()));
                Some(MessageAttachment::new(
                    filename,
                    PDF_CONTENT_TYPE,
                    source.pdf_bytes(),
                ))
            }
        }
    }
}

impl fmt::Debug for AttachmentInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentInput::Path(path) => f.debug_tuple("Path").field(path).finish(),
            AttachmentInput::Upload(upload) => f.debug_tuple("Upload").field(upload).finish(),
            AttachmentInput::Prebuilt(attachment) => f
                .debug_tuple("Prebuilt")
                .field(&attachment.filename)
                .finish(),
            AttachmentInput::Pdf(source) => f.debug_tuple("Pdf").field(&source.title()).finish(),
        }
    }
}

impl From<PathBuf> for AttachmentInput {
    fn from(path: PathBuf) -> Self {
        AttachmentInput::Path(path)
    }
}

impl From<&Path> for AttachmentInput {
    fn from(path: &Path) -> Self {
        AttachmentInput::Path(path.to_path_buf())
    }
}

impl From<&str> for AttachmentInput {
    fn from(path: &str) -> Self {
        AttachmentInput::Path(PathBuf::from(path))
    }
}

impl From<UploadedFile> for AttachmentInput {
    fn from(upload: UploadedFile) -> Self {
        AttachmentInput::Upload(upload)
    }
}

impl From<MessageAttachment> for AttachmentInput {
    fn from(attachment: MessageAttachment) -> Self {
        AttachmentInput::Prebuilt(attachment)
    }
}

impl From<PdfBuffer> for AttachmentInput {
    fn from(pdf: PdfBuffer) -> Self {
        AttachmentInput::pdf(pdf)
    }
}

impl From<PdfMetadata> for AttachmentInput {
    fn from(pdf: PdfMetadata) -> Self {
        AttachmentInput::pdf(pdf)
    }
}

/// Last path segment of a client-reported filename, without quotes or
/// control characters. `None` when nothing usable is left.
fn client_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();
    match cleaned {
        "" | "." | ".." => None,
        _ => Some(cleaned.to_string()),
    }
}

/// Turn a document title into a filesystem-safe file stem.
///
/// The title is lowercased, whitespace runs become `_` and anything outside
/// `[a-z0-9._-]` is dropped. A missing title, or one with nothing left after
/// cleaning, yields `document_<hex timestamp>`.
pub fn attachment_file_name(title: Option<&str>) -> String {
    let cleaned = title
        .map(|t| {
            let lower = t.trim().to_lowercase();
            let underscored = WHITESPACE.replace_all(&lower, "_");
            UNSAFE_FILENAME_CHARS.replace_all(&underscored, "").into_owned()
        })
        .unwrap_or_default();

    if cleaned.is_empty() {
        format!("document_{:x}", chrono::Utc::now().timestamp_micros())
    } else {
        cleaned
    }
}
