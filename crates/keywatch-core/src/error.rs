//! Structured error handling for key lookups and watches.

use hipstr::HipStr;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur while reading or watching a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Input validation failed.
    InvalidInput,
    /// Client construction or transport failed.
    Connection,
    /// The key does not exist in the store.
    NotFound,
    /// The watch specification could not be built.
    WatchSetup,
    /// The long-poll loop failed after the stream was opened.
    Background,
    /// Timeout occurred.
    Timeout,
    /// The store returned a payload that could not be decoded.
    Serialization,
    /// Unknown error occurred.
    #[default]
    Unknown,
}

impl ErrorKind {
    /// Check if this error kind is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }
}

/// Structured error type with classification and context tracking.
#[must_use]
#[derive(Debug, Error)]
#[error("[{kind}]{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Primary error message.
    pub message: Option<HipStr<'static>>,
    /// Underlying source error, if any.
    #[source]
    pub source: Option<BoxedError>,
    /// Additional context information.
    pub context: Option<HipStr<'static>>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            context: None,
        }
    }

    /// Creates a new error from a source error.
    pub fn from_source(kind: ErrorKind, source: impl Into<BoxedError>) -> Self {
        Self {
            kind,
            message: None,
            source: Some(source.into()),
            context: None,
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates a connection error.
    pub fn connection() -> Self {
        Self::new(ErrorKind::Connection)
    }

    /// Creates a not found error.
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Creates a watch setup error.
    pub fn watch_setup() -> Self {
        Self::new(ErrorKind::WatchSetup)
    }

    /// Creates a background loop error.
    pub fn background() -> Self {
        Self::new(ErrorKind::Background)
    }

    /// Creates a timeout error.
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    /// Creates a serialization error.
    pub fn serialization() -> Self {
        Self::new(ErrorKind::Serialization)
    }

    /// Creates the error returned when a key is absent on a synchronous read.
    pub fn key_not_found(key: &str) -> Self {
        Self::not_found().with_message(format!("Key ( {key} ) was not found"))
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<HipStr<'static>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the source of the error.
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds context to the error.
    pub fn with_context(mut self, context: impl Into<HipStr<'static>>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Check if this error is retryable based on its kind.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if this error reports an absent key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_error_new() {
        let error = Error::new(ErrorKind::Unknown);
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(error.message.is_none());
        assert!(error.source.is_none());
        assert!(error.context.is_none());
    }

    #[test]
    fn test_error_builder_pattern() {
        let error = Error::watch_setup()
            .with_message("unsupported watch type")
            .with_context("keyprefix");

        assert_eq!(error.kind, ErrorKind::WatchSetup);
        assert_eq!(error.message.as_deref(), Some("unsupported watch type"));
        assert_eq!(error.context.as_deref(), Some("keyprefix"));
    }

    #[test]
    fn test_error_display() {
        let error = Error::key_not_found("config.json");

        let display_str = error.to_string();
        assert!(display_str.contains("not_found"));
        assert!(display_str.contains("config.json"));
        assert!(error.is_not_found());
    }

    #[test]
    fn test_display_without_message() {
        assert_eq!(Error::background().to_string(), "[background]");
    }

    #[test]
    fn test_from_source() {
        let source = std::io::Error::other("connection refused");
        let error = Error::from_source(ErrorKind::Connection, source);

        assert!(error.source.is_some());
        assert!(error.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorKind::Connection.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());

        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::WatchSetup.is_retryable());
        assert!(!ErrorKind::Background.is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            ErrorKind::from_str("watch_setup").unwrap(),
            ErrorKind::WatchSetup
        );
        assert_eq!(
            ErrorKind::from_str("not_found").unwrap(),
            ErrorKind::NotFound
        );
        assert!(ErrorKind::from_str("invalid").is_err());
    }
}
