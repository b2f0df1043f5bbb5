//! Error taxonomy shared by the config loader, detector and search engine.
//!
//! Each variant corresponds to one of the error kinds named in the engine
//! design: `Config` and `Detection` are surfaced to the caller as-is,
//! `Decoding`, `RuntimeRegex` and `Io` are recovered from locally (the
//! affected system or line is skipped), and `Interrupted` is returned only
//! once a caller-driven cancellation reaches the immediate stage.

use std::fmt;

/// Where a [`AuditError::Config`] occurred, for error messages that point a
/// user at the exact YAML file/section/option responsible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLocation {
    pub file: String,
    pub section: Option<String>,
    pub option: Option<String>,
}

impl ConfigLocation {
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            section: None,
            option: None,
        }
    }

    #[must_use]
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    #[must_use]
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }
}

impl fmt::Display for ConfigLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(section) = &self.section {
            write!(f, " section {section:?}")?;
        }
        if let Some(option) = &self.option {
            write!(f, " option {option:?}")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// YAML syntax, schema, cyclic include, regex-compile or option-coherence
    /// failure. Fatal for the whole load; no partial engine run follows.
    #[error("config error at {location}: {message}")]
    Config {
        location: ConfigLocation,
        message: String,
    },

    /// A source file could not be decoded under its declared encoding
    /// without replacement. Non-fatal: the affected `System` is marked
    /// `error` and excluded from results.
    #[error("failed to decode {file} as {encoding}: {message}")]
    Decoding {
        file: String,
        encoding: String,
        message: String,
    },

    /// No producer marker was found within the detector's header window.
    #[error("no producer marker found in {file} within {window} header lines")]
    Detection { file: String, window: usize },

    /// A capture-group or indexing bug surfaced while evaluating a search at
    /// runtime. Per-line recoverable: the line is skipped, the search
    /// continues.
    #[error("regex evaluation error for search {search:?} on {system} line {line}: {message}")]
    RuntimeRegex {
        system: String,
        search: String,
        line: usize,
        message: String,
    },

    /// A read failed mid-stream. Aborts analysis of the affected system
    /// only; rows already collected for that system are discarded.
    #[error("io error reading {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The caller escalated cancellation to the immediate stage.
    #[error("analysis interrupted")]
    Interrupted,
}

impl AuditError {
    pub fn config(location: ConfigLocation, message: impl Into<String>) -> Self {
        Self::Config {
            location,
            message: message.into(),
        }
    }

    pub fn io(file: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            file: file.into(),
            source,
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
