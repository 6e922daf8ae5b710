// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration error reporting.
//!
//! Figment names a failing key by its dotted path. The types here carry that
//! path into a miette report, locate the key inside the `[section]` of the
//! TOML file that set it, and list what the section actually accepts.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::path::Path;

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

use crate::model::SECTIONS;

/// Jaro-Winkler score a candidate must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// A configuration error with enough context for a miette report.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A top-level table that is not a known section.
    #[error("unknown section `[{section}]`")]
    #[diagnostic(
        code(signoff::config::unknown_section),
        help("{}", section_help(suggestion.as_deref()))
    )]
    UnknownSection {
        section: String,
        suggestion: Option<String>,
        #[label("not a signoff.toml section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key its section does not accept.
    #[error("unknown key `{path}`")]
    #[diagnostic(
        code(signoff::config::unknown_key),
        help("{}", key_help(key, suggestion.as_deref(), moved_to.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Dotted path, e.g. `worker.concurency`.
        path: String,
        key: String,
        suggestion: Option<String>,
        /// The section that does accept `key`, when it was put in the wrong one.
        moved_to: Option<String>,
        valid_keys: String,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into its key's type.
    #[error("invalid value for `{path}`: {detail}")]
    #[diagnostic(
        code(signoff::config::invalid_value),
        help("{}", value_help(expected.as_deref()))
    )]
    InvalidValue {
        path: String,
        detail: String,
        expected: Option<String>,
        #[label("set here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed but breaks a semantic rule.
    #[error("`{field}` {message}")]
    #[diagnostic(code(signoff::config::validation))]
    Invalid {
        /// Dotted path of the offending key, e.g. `worker.soft_time_limit_secs`.
        field: String,
        message: String,
        #[label("set here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(signoff::config::other))]
    Other(String),
}

impl ConfigError {
    /// A validation failure for the key at `field`.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.into(),
            span: None,
            src: None,
        }
    }

    /// Point a validation error at the line that set the key.
    ///
    /// `sources` is in precedence order; the first file that sets the key wins.
    pub fn located(self, sources: &[ConfigSource]) -> Self {
        match self {
            ConfigError::Invalid {
                field,
                message,
                span: None,
                ..
            } => {
                let (section, key) = split_path(&field);
                let (span, src) = sources
                    .iter()
                    .find_map(|source| {
                        source
                            .key_span(section, key)
                            .map(|span| (Some(span), Some(source.named())))
                    })
                    .unwrap_or((None, None));
                ConfigError::Invalid {
                    field,
                    message,
                    span,
                    src,
                }
            }
            other => other,
        }
    }
}

fn section_help(suggestion: Option<&str>) -> String {
    let names: Vec<&str> = SECTIONS.iter().map(|(name, _)| *name).collect();
    match suggestion {
        Some(s) => format!("did you mean `[{s}]`? sections are: {}", names.join(", ")),
        None => format!("sections are: {}", names.join(", ")),
    }
}

fn key_help(key: &str, suggestion: Option<&str>, moved_to: Option<&str>, valid_keys: &str) -> String {
    match (moved_to, suggestion) {
        (Some(section), _) => format!("`{key}` belongs in [{section}]"),
        (None, Some(s)) => format!("did you mean `{s}`? this section accepts: {valid_keys}"),
        (None, None) => format!("this section accepts: {valid_keys}"),
    }
}

fn value_help(expected: Option<&str>) -> String {
    match expected {
        Some(e) => format!("expected {e}"),
        None => "see `signoff config show` for the current value".to_string(),
    }
}

/// A TOML document the configuration was read from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub name: String,
    pub content: String,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    fn named(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.content.clone())
    }

    /// Each trimmed line with its byte offset and the table it belongs to.
    fn lines(&self) -> impl Iterator<Item = (usize, Option<&str>, &str)> {
        let mut table = None;
        let mut offset = 0;
        self.content.split_inclusive('\n').map(move |line| {
            let start = offset + (line.len() - line.trim_start().len());
            offset += line.len();
            let trimmed = line.trim();
            if let Some(name) = table_header(trimmed) {
                table = Some(name);
            }
            (start, table, trimmed)
        })
    }

    /// Span of the `[section]` header.
    fn header_span(&self, section: &str) -> Option<SourceSpan> {
        self.lines()
            .find(|(_, _, line)| table_header(line) == Some(section))
            .map(|(start, _, line)| SourceSpan::new(start.into(), line.len()))
    }

    /// Span of `key` where it is assigned inside `section` (or at top level).
    ///
    /// Only the lines under the matching header are searched, so a key of the
    /// same name in another section is never picked up.
    fn key_span(&self, section: Option<&str>, key: &str) -> Option<SourceSpan> {
        self.lines()
            .find(|(_, table, line)| {
                *table == section && table_header(line).is_none() && assigns(line, key)
            })
            .map(|(start, _, _)| SourceSpan::new(start.into(), key.len()))
    }
}

fn table_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

fn assigns(line: &str, key: &str) -> bool {
    line.strip_prefix(key)
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((section, key)) => (Some(section), key),
        None => (None, path),
    }
}

/// The section that accepts `key`, if any does.
fn home_section(key: &str) -> Option<&'static str> {
    SECTIONS
        .iter()
        .find(|(_, keys)| keys.contains(&key))
        .map(|(name, _)| *name)
}

fn closest<'a>(word: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|candidate| (strsim::jaro_winkler(word, candidate), candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate)
}

/// The source that produced `error`.
///
/// Errors from environment variables have no source document. Errors from an
/// inline string match the only source given.
fn source_of<'a>(error: &figment::Error, sources: &'a [ConfigSource]) -> Option<&'a ConfigSource> {
    let origin = error.metadata.as_ref()?.source.as_ref()?;
    match origin.file_path() {
        Some(path) => sources.iter().find(|s| Path::new(&s.name) == path),
        None if sources.len() == 1 => sources.first(),
        None => None,
    }
}

fn attach(
    source: Option<&ConfigSource>,
    find: impl Fn(&ConfigSource) -> Option<SourceSpan>,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    source
        .and_then(|s| find(s).map(|span| (Some(span), Some(s.named()))))
        .unwrap_or((None, None))
}

/// Convert a `figment::Error` (which may hold several) into diagnostics.
pub fn figment_to_config_errors(err: figment::Error, sources: &[ConfigSource]) -> Vec<ConfigError> {
    err.into_iter().map(|error| convert(&error, sources)).collect()
}

fn convert(error: &figment::Error, sources: &[ConfigSource]) -> ConfigError {
    let source = source_of(error, sources);
    let path = error.path.join(".");

    match &error.kind {
        Kind::UnknownField(key, expected) => {
            let section = error.path.first().map(String::as_str).filter(|s| *s != key.as_str());
            match section {
                None => {
                    let (span, src) = attach(source, |s| {
                        s.header_span(key).or_else(|| s.key_span(None, key))
                    });
                    ConfigError::UnknownSection {
                        section: key.clone(),
                        suggestion: closest(key, SECTIONS.iter().map(|(name, _)| *name))
                            .map(str::to_string),
                        span,
                        src,
                    }
                }
                Some(section) => {
                    let (span, src) = attach(source, |s| s.key_span(Some(section), key));
                    ConfigError::UnknownKey {
                        path: format!("{section}.{key}"),
                        key: key.clone(),
                        suggestion: closest(key, expected.iter().copied()).map(str::to_string),
                        moved_to: home_section(key)
                            .filter(|home| *home != section)
                            .map(str::to_string),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
            }
        }
        Kind::UnknownVariant(found, expected) => {
            let (section, key) = split_path(&path);
            let (span, src) = attach(source, |s| s.key_span(section, key));
            ConfigError::InvalidValue {
                detail: format!("unknown variant `{found}`"),
                expected: Some(format!("one of: {}", expected.join(", "))),
                path,
                span,
                src,
            }
        }
        Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
            let (section, key) = split_path(&path);
            let (span, src) = attach(source, |s| s.key_span(section, key));
            ConfigError::InvalidValue {
                detail: format!("found {actual}"),
                expected: Some(expected.clone()),
                path,
                span,
                src,
            }
        }
        kind if !path.is_empty() => {
            let (section, key) = split_path(&path);
            let (span, src) = attach(source, |s| s.key_span(section, key));
            ConfigError::InvalidValue {
                detail: kind.to_string(),
                expected: None,
                path,
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

/// Render errors with miette's graphical handler, ending with a count.
fn format_errors(errors: &[ConfigError]) -> String {
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        if handler.render_report(&mut out, error).is_err() {
            out.push_str(&format!("Error: {error}\n"));
        }
    }
    out.push_str(&format!(
        "{} configuration error(s); fix signoff.toml or the SIGNOFF_* overrides\n",
        errors.len()
    ));
    out
}

/// Print config errors to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    eprint!("{}", format_errors(errors));
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[kms]
provider = \"local\"

[worker]
concurrency = 4
soft_time_limit_secs = 400
";

    fn sample() -> ConfigSource {
        ConfigSource::new("signoff.toml", SAMPLE)
    }

    fn spanned(span: Option<SourceSpan>) -> &'static str {
        let span = span.expect("span");
        &SAMPLE[span.offset()..span.offset() + span.len()]
    }

    #[test]
    fn key_span_stays_inside_its_section() {
        let source = sample();
        assert_eq!(
            spanned(source.key_span(Some("worker"), "soft_time_limit_secs")),
            "soft_time_limit_secs"
        );
        assert!(source.key_span(Some("kms"), "concurrency").is_none());
        assert!(source.key_span(None, "provider").is_none());
    }

    #[test]
    fn header_span_covers_the_table_line() {
        assert_eq!(spanned(sample().header_span("worker")), "[worker]");
        assert!(sample().header_span("scheduler").is_none());
    }

    #[test]
    fn typo_suggests_key_from_same_section() {
        let keys = SECTIONS.iter().find(|(s, _)| *s == "worker").unwrap().1;
        assert_eq!(closest("concurency", keys.iter().copied()), Some("concurrency"));
        assert_eq!(closest("zzzzzz", keys.iter().copied()), None);
    }

    #[test]
    fn misplaced_key_names_its_home_section() {
        assert_eq!(home_section("anchor_date"), Some("scheduler"));
        assert_eq!(home_section("key_id"), Some("kms"));
        assert_eq!(home_section("bot_token"), None);
        assert_eq!(
            key_help("anchor_date", None, Some("scheduler"), "concurrency"),
            "`anchor_date` belongs in [scheduler]"
        );
    }

    #[test]
    fn validation_error_is_located_in_its_section() {
        let error = ConfigError::invalid("worker.soft_time_limit_secs", "must be less than 300")
            .located(&[sample()]);
        assert_eq!(
            error.to_string(),
            "`worker.soft_time_limit_secs` must be less than 300"
        );
        match error {
            ConfigError::Invalid { span, src, .. } => {
                assert_eq!(spanned(span), "soft_time_limit_secs");
                assert!(src.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unset_key_stays_unlocated() {
        let error = ConfigError::invalid("kms.key_id", "is required for the aws provider")
            .located(&[sample()]);
        assert!(matches!(error, ConfigError::Invalid { span: None, .. }));
    }

    #[test]
    fn formatted_errors_end_with_count() {
        let text = format_errors(&[
            ConfigError::invalid("worker.concurrency", "must be at least 1"),
            ConfigError::Other("boom".into()),
        ]);
        assert!(text.contains("worker.concurrency"));
        assert!(text.ends_with("2 configuration error(s); fix signoff.toml or the SIGNOFF_* overrides\n"));
    }
}
