//! # Templates
//!
//! Manifest templates loaded once at startup and indexed by `(kind, tier)`.
//!
//! File names follow `<kind>[-<tier>].yaml` (or `.yml`): `deployment.yaml` is
//! the default deployment template, `deployment-api.yaml` the `api` tier and
//! `service-http.yaml` the `http` service template. Template text may only
//! contain substitution points of the form `{{ .Name }}`.

use crate::cluster::ResourceKind;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{(.*?)\}\}").expect("template action regex is valid")
});

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*$").expect("template variable regex is valid")
});

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("can not parse template `{file}`: {message}")]
    Parse { file: String, message: String },
    #[error("unknown template type `{kind}` in `{file}`")]
    UnknownKind { file: String, kind: String },
    #[error("can not read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error walking template dir: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("variable `{variable}` is not available in {kind} templates")]
    UnknownVariable {
        variable: String,
        kind: ResourceKind,
    },
    #[error("descriptor has no `service` section")]
    MissingService,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Variable(String),
}

/// Pre-parsed manifest skeleton
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template `source` registered as `name`
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Parse`] for unterminated or malformed `{{ }}` actions.
    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        let parse_error = |message: String| TemplateError::Parse {
            file: name.to_string(),
            message,
        };

        let mut segments = Vec::new();
        let mut last = 0;
        for action in ACTION.captures_iter(source) {
            let (Some(whole), Some(body)) = (action.get(0), action.get(1)) else {
                continue;
            };
            push_text(&mut segments, &source[last..whole.start()])
                .map_err(|()| parse_error(format!("unclosed action before offset {}", whole.start())))?;

            let variable = VARIABLE
                .captures(body.as_str())
                .and_then(|c| c.get(1))
                .ok_or_else(|| {
                    parse_error(format!(
                        "unsupported action `{{{{{}}}}}`, only `{{{{ .Name }}}}` is allowed",
                        body.as_str()
                    ))
                })?;
            segments.push(Segment::Variable(variable.as_str().to_string()));
            last = whole.end();
        }
        push_text(&mut segments, &source[last..])
            .map_err(|()| parse_error("unclosed action".to_string()))?;

        Ok(Self {
            name: name.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variables referenced by the template, in order of first use
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for segment in &self.segments {
            if let Segment::Variable(variable) = segment {
                if !seen.contains(&variable.as_str()) {
                    seen.push(variable.as_str());
                }
            }
        }
        seen
    }

    /// Substitute every variable from `values`
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownVariable`] when the template uses a variable missing from `values`.
    pub fn render(
        &self,
        kind: ResourceKind,
        values: &BTreeMap<&'static str, String>,
    ) -> Result<String, RenderError> {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Variable(variable) => {
                    let value = values.get(variable.as_str()).ok_or_else(|| {
                        RenderError::UnknownVariable {
                            variable: variable.clone(),
                            kind,
                        }
                    })?;
                    output.push_str(value);
                }
            }
        }
        Ok(output)
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str) -> Result<(), ()> {
    if text.contains("{{") {
        return Err(());
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
    Ok(())
}

/// Derive `(kind, tier)` from a template file name
///
/// Returns `Ok(None)` for files that are not YAML.
///
/// # Errors
///
/// Returns [`TemplateError::UnknownKind`] when the kind prefix is not a known workload or service kind.
pub fn template_key(file_name: &str) -> Result<Option<(ResourceKind, String)>, TemplateError> {
    if !(file_name.ends_with(".yaml") || file_name.ends_with(".yml")) {
        return Ok(None);
    }

    let stem = file_name.split('.').next().unwrap_or_default();
    let (kind_name, tier) = stem.split_once('-').unwrap_or((stem, ""));
    let kind = match kind_name {
        "cronjob" => ResourceKind::CronJob,
        "deployment" => ResourceKind::Deployment,
        "service" => ResourceKind::Service,
        other => {
            return Err(TemplateError::UnknownKind {
                file: file_name.to_string(),
                kind: other.to_string(),
            })
        }
    };
    Ok(Some((kind, tier.to_string())))
}

/// Immutable `kind -> tier -> template` index
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<ResourceKind, HashMap<String, Template>>,
}

impl TemplateRegistry {
    /// Load every template below `dir`, in sorted order
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the directory can not be walked or a template can not be read or parsed.
    pub fn load(dir: &Path) -> Result<Self, TemplateError> {
        let mut registry = Self::default();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            let Some((kind, tier)) = template_key(&file_name)? else {
                debug!("Skipping non-template file {}", entry.path().display());
                continue;
            };

            let source =
                std::fs::read_to_string(entry.path()).map_err(|source| TemplateError::Io {
                    path: entry.path().to_path_buf(),
                    source,
                })?;
            let template = Template::parse(&file_name, &source)?;
            info!(
                "Template {} loaded as {} for tier `{}`",
                file_name, kind, tier
            );
            registry.insert(kind, tier, template);
        }

        info!("{} templates loaded from {}", registry.len(), dir.display());
        Ok(registry)
    }

    /// Register a template, replacing (with a warning) any previous one for the key
    pub fn insert(&mut self, kind: ResourceKind, tier: impl Into<String>, template: Template) {
        let tier = tier.into();
        let by_tier = self.templates.entry(kind).or_default();
        if let Some(previous) = by_tier.get(&tier) {
            warn!(
                "Template {} replaces {} for {} tier `{}`",
                template.name(),
                previous.name(),
                kind,
                tier
            );
        }
        by_tier.insert(tier, template);
    }

    #[must_use]
    pub fn get(&self, kind: ResourceKind, tier: &str) -> Option<&Template> {
        self.templates.get(&kind).and_then(|by_tier| by_tier.get(tier))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
