use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LunchboxError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("failed to read settings from {path}")]
    SettingsLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings from {path}: {message}")]
    SettingsParse { path: String, message: String },

    #[error("failed to encode settings: {message}")]
    SettingsEncode { message: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Rejection payload of a pipeline operation.
///
/// `summary` is the one-line reason; `detail_lines` carry the remediation text
/// (command attempted, captured stderr, install help) in display order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{summary}")]
pub struct Failure {
    pub summary: String,
    pub detail_lines: Vec<String>,
}

impl Failure {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            detail_lines: Vec::new(),
        }
    }

    pub fn with_detail(mut self, line: impl Into<String>) -> Self {
        self.detail_lines.push(line.into());
        self
    }

    pub fn with_details<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detail_lines.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Summary followed by every detail line, newline separated.
    pub fn render(&self) -> String {
        let mut text = self.summary.clone();
        for line in &self.detail_lines {
            text.push('\n');
            text.push_str(line);
        }
        text
    }
}

impl Diagnostic for Failure {
    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        if self.detail_lines.is_empty() {
            None
        } else {
            Some(Box::new(self.detail_lines.join("\n")))
        }
    }
}

impl From<LunchboxError> for Failure {
    fn from(err: LunchboxError) -> Self {
        let mut failure = Failure::new(err.to_string());
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            failure.detail_lines.push(format!("\t{cause}"));
            source = std::error::Error::source(cause);
        }
        failure
    }
}
