//! Template engine for email subjects and bodies.
//!
//! Wraps a minijinja `Environment` built from one of three loader
//! strategies and renders both named templates and inline template strings
//! against a JSON-like context.
//!
//! # Example
//!
//! ```ignore
//! use notification_mailer::template::{TemplateEngine, TemplateLoader};
//! use serde_json::json;
//!
//! let engine = TemplateEngine::new(TemplateLoader::Filesystem("templates".into()))?;
//! if engine.exists("welcome.html.j2") {
//!     let html = engine.render("welcome.html.j2", json!({"name": "Ann"}))?;
//! }
//! ```

use crate::config::{TemplateConfig, TemplateLoaderKind};
use crate::error::{ConfigError, TemplateError};
use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Suffix of named HTML body templates (`<ref>.html.j2`).
pub const HTML_TEMPLATE_SUFFIX: &str = ".html.j2";

/// Suffix of named plain-text body templates (`<ref>.txt.j2`).
pub const TEXT_TEMPLATE_SUFFIX: &str = ".txt.j2";

/// Template resolution strategy, chosen once at construction.
pub enum TemplateLoader {
    /// Clone of a host-supplied environment, keeping its loader, filters
    /// and settings. `None` falls back to an empty environment.
    Clone(Option<Environment<'static>>),
    /// Fresh environment loading templates from a directory.
    Filesystem(PathBuf),
    /// Fresh environment over an in-memory name -> source map.
    Array(HashMap<String, String>),
}

impl TemplateLoader {
    fn kind(&self) -> TemplateLoaderKind {
        match self {
            TemplateLoader::Clone(_) => TemplateLoaderKind::Clone,
            TemplateLoader::Filesystem(_) => TemplateLoaderKind::Filesystem,
            TemplateLoader::Array(_) => TemplateLoaderKind::Array,
        }
    }
}

/// Template engine for rendering Jinja2 syntax.
pub struct TemplateEngine {
    /// Environment for named templates and plain inline strings.
    env: Environment<'static>,
    /// Same templates, but inline strings are HTML auto-escaped.
    html_env: Environment<'static>,
    loader: TemplateLoaderKind,
}

impl TemplateEngine {
    /// Build an engine from a loader strategy.
    ///
    /// # Errors
    /// Returns [`TemplateError::RenderFailed`] if an array template does not parse.
    pub fn new(loader: TemplateLoader) -> Result<Self, TemplateError> {
        let kind = loader.kind();
        let mut env = match loader {
            TemplateLoader::Clone(Some(shared)) => shared,
            TemplateLoader::Clone(None) => fresh_environment(),
            TemplateLoader::Filesystem(path) => {
                let mut env = fresh_environment();
                env.set_loader(minijinja::path_loader(path));
                env
            }
            TemplateLoader::Array(templates) => {
                let mut env = fresh_environment();
                for (name, source) in templates {
                    env.add_template_owned(name.clone(), source)
                        .map_err(|e| TemplateError::RenderFailed {
                            message: format!("{}: {}", name, e),
                        })?;
                }
                env
            }
        };

        if kind != TemplateLoaderKind::Clone {
            env.set_auto_escape_callback(auto_escape_for);
        }

        let mut html_env = env.clone();
        html_env.set_auto_escape_callback(|_| AutoEscape::Html);

        Ok(Self {
            env,
            html_env,
            loader: kind,
        })
    }

    /// Build an engine from configuration.
    ///
    /// `shared` is the host application's environment, cloned by the
    /// `clone` loader and ignored by the others.
    pub fn from_config(
        config: &TemplateConfig,
        shared: Option<&Environment<'static>>,
    ) -> Result<Self, ConfigError> {
        let loader = match config.loader {
            TemplateLoaderKind::Clone => TemplateLoader::Clone(shared.cloned()),
            TemplateLoaderKind::Filesystem => {
                let path = config.path.clone().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "template.path is required for the filesystem loader".to_string(),
                    )
                })?;
                TemplateLoader::Filesystem(path)
            }
            TemplateLoaderKind::Array => TemplateLoader::Array(config.templates.clone()),
        };

        let mut engine = Self::new(loader).map_err(|e| ConfigError::InvalidTemplate {
            name: "template.templates".to_string(),
            message: e.to_string(),
        })?;

        // Inline templates are also available to the other loaders.
        if config.loader != TemplateLoaderKind::Array {
            for (name, source) in &config.templates {
                engine
                    .add_template(name, source)
                    .map_err(|e| ConfigError::InvalidTemplate {
                        name: name.clone(),
                        message: e.to_string(),
                    })?;
            }
        }

        Ok(engine)
    }

    /// Register (or replace) a named template.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        for env in [&mut self.env, &mut self.html_env] {
            env.add_template_owned(name.to_string(), source.to_string())
                .map_err(|e| TemplateError::RenderFailed {
                    message: format!("{}: {}", name, e),
                })?;
        }
        Ok(())
    }

    /// Whether a named template can be resolved.
    ///
    /// A template that exists but fails to parse still counts as existing,
    /// so the parse error surfaces when it is rendered.
    pub fn exists(&self, name: &str) -> bool {
        match self.env.get_template(name) {
            Ok(_) => true,
            Err(e) => e.kind() != ErrorKind::TemplateNotFound,
        }
    }

    /// Render a named template.
    ///
    /// # Errors
    /// * [`TemplateError::NotFound`] - no template with that name.
    /// * [`TemplateError::RenderFailed`] - parse or render failure.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, TemplateError> {
        tracing::trace!(template = %name, "Rendering named template");

        let template = self.env.get_template(name).map_err(|e| {
            if e.kind() == ErrorKind::TemplateNotFound {
                TemplateError::NotFound {
                    name: name.to_string(),
                }
            } else {
                TemplateError::RenderFailed {
                    message: e.to_string(),
                }
            }
        })?;

        template.render(ctx).map_err(|e| TemplateError::RenderFailed {
            message: e.to_string(),
        })
    }

    /// Render an inline template string without auto-escaping.
    pub fn render_str<S: Serialize>(&self, source: &str, ctx: S) -> Result<String, TemplateError> {
        self.env
            .render_str(source, ctx)
            .map_err(|e| TemplateError::RenderFailed {
                message: e.to_string(),
            })
    }

    /// Render an inline template string with HTML auto-escape.
    pub fn render_html_str<S: Serialize>(
        &self,
        source: &str,
        ctx: S,
    ) -> Result<String, TemplateError> {
        self.html_env
            .render_str(source, ctx)
            .map_err(|e| TemplateError::RenderFailed {
                message: e.to_string(),
            })
    }

    /// Loader strategy this engine was built with.
    pub fn loader(&self) -> TemplateLoaderKind {
        self.loader
    }

    /// The underlying environment, e.g. to register filters.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("loader", &self.loader)
            .field("template_count", &self.env.templates().count())
            .finish()
    }
}

/// Lenient environment: undefined variables render as empty strings.
fn fresh_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env
}

fn auto_escape_for(name: &str) -> AutoEscape {
    let name = name.strip_suffix(".j2").unwrap_or(name);
    if name.ends_with(".html") || name.ends_with(".htm") {
        AutoEscape::Html
    } else {
        AutoEscape::None
    }
}
