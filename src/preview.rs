//! Template previews for visual inspection.
//!
//! Renders `<template>.html.j2` or `<template>.txt.j2` against canned sample
//! data and wraps the result in a minimal HTML page. Plain-text output is
//! escaped and wrapped in `<pre>`.

use crate::error::TemplateError;
use crate::notify::{SUBJECT_KEY, SUBJECT_UNDERLINE_KEY, TemplateContext};
use crate::template::{HTML_TEMPLATE_SUFFIX, TEXT_TEMPLATE_SUFFIX, TemplateEngine};
use clap::ValueEnum;
use minijinja::HtmlEscape;
use serde_json::Value;

const SAMPLE_SUBJECT: &str = "Sample subject";

/// Which variant of a template pair to preview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PreviewFormat {
    #[default]
    Html,
    Txt,
}

impl PreviewFormat {
    /// Template name for this variant of `template`.
    pub fn template_name(&self, template: &str) -> String {
        match self {
            PreviewFormat::Html => format!("{}{}", template, HTML_TEMPLATE_SUFFIX),
            PreviewFormat::Txt => format!("{}{}", template, TEXT_TEMPLATE_SUFFIX),
        }
    }
}

/// Sample values for the variables templates commonly use.
pub fn sample_context() -> TemplateContext {
    let mut context = TemplateContext::new();
    context.insert("fullname".into(), Value::from("John Doe"));
    context.insert("link".into(), Value::from("https://www.domain.tld"));
    context.insert(
        "timestamp".into(),
        Value::from(chrono::Local::now().to_rfc3339()),
    );
    context.insert(SUBJECT_KEY.into(), Value::from(SAMPLE_SUBJECT));
    context.insert(
        SUBJECT_UNDERLINE_KEY.into(),
        Value::from("=".repeat(SAMPLE_SUBJECT.chars().count())),
    );
    context.insert("message".into(), Value::from("First line\nSecond line"));
    context
}

/// Render a preview page.
///
/// `overrides` replaces or extends the sample data.
///
/// # Errors
/// Returns [`TemplateError::NotFound`] when the variant does not exist and
/// [`TemplateError::RenderFailed`] when rendering fails.
pub fn render_preview(
    engine: &TemplateEngine,
    template: &str,
    format: PreviewFormat,
    overrides: TemplateContext,
) -> Result<String, TemplateError> {
    let mut context = sample_context();
    context.extend(overrides);

    let body = engine.render(&format.template_name(template), &context)?;

    Ok(match format {
        PreviewFormat::Html => format!(
            "<html><head><meta charset=\"utf-8\"></head><body>{}</body></html>",
            body
        ),
        PreviewFormat::Txt => format!(
            "<html><head><meta charset=\"utf-8\"></head><body><pre>{}</pre></body></html>",
            HtmlEscape(&body)
        ),
    })
}
