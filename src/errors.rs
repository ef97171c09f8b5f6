//! Error types.
//!
//! Every failure surfaced by the client is one [`Error`] value. Variants carry the command text
//! that was issued and, where HAProxy answered at all, the fragment of the response that caused
//! the failure, so callers can diagnose problems without re-issuing the command.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Connecting to, writing to, or reading from a Runtime API socket failed.
    #[error("transport failure on {endpoint} for `{command}`: {source}")]
    Transport {
        endpoint: String,
        command: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// No response arrived within the dispatcher deadline.
    #[error("no response within {timeout:?} for `{command}`")]
    Timeout { command: String, timeout: Duration },

    /// HAProxy rejected the command, either with a severity marker or with text that does not
    /// match the expected success message.
    #[error("HAProxy rejected `{command}`: {message}")]
    Protocol {
        command: String,
        /// Severity digit (`0`-`3`) when the response carried one.
        severity: Option<u8>,
        message: String,
        response: String,
    },

    /// The response did not match the grammar expected for the requested resource.
    #[error("failed to parse response to `{command}`: {reason} (line: {line:?})")]
    Parse {
        command: String,
        reason: String,
        line: String,
    },

    /// The requested item is absent from HAProxy's answer.
    #[error("{what} not found (`{command}`)")]
    NotFound {
        command: String,
        what: String,
        response: String,
    },

    /// The caller supplied an invalid argument; nothing was sent.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// Client configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn transport(endpoint: impl ToString, command: &str, source: io::Error) -> Self {
        Error::Transport {
            endpoint: endpoint.to_string(),
            command: command.to_owned(),
            source: Arc::new(source),
        }
    }

    /// Build a parse error that is not yet attached to a command.
    ///
    /// Parsers are pure functions over response text; the call site fills in the command with
    /// [`Error::with_command`].
    pub(crate) fn parse(reason: impl Into<String>, line: &str) -> Self {
        Error::Parse {
            command: String::new(),
            reason: reason.into(),
            line: line.to_owned(),
        }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Error::Validation(reason.into())
    }

    /// Attach the command text to an error produced without it.
    pub(crate) fn with_command(mut self, text: &str) -> Self {
        match &mut self {
            Error::Transport { command, .. }
            | Error::Timeout { command, .. }
            | Error::Protocol { command, .. }
            | Error::Parse { command, .. }
            | Error::NotFound { command, .. } => {
                if command.is_empty() {
                    *command = text.to_owned();
                }
            }
            Error::Validation(_) | Error::Config(_) => {}
        }
        self
    }

    /// Only transport failures are retried by the dispatcher.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// The command that produced this error, if one was issued.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        match self {
            Error::Transport { command, .. }
            | Error::Timeout { command, .. }
            | Error::Protocol { command, .. }
            | Error::Parse { command, .. }
            | Error::NotFound { command, .. } => Some(command.as_str()),
            Error::Validation(_) | Error::Config(_) => None,
        }
    }
}
