//! Messages delivered on a change stream.

use bytes::Bytes;

use crate::{Error, Result};

/// One observation of a watched key.
///
/// Exactly one of `value` and `error` is meaningful. A message with neither
/// set is valid and means the key is absent (never written or deleted); it is
/// not an error.
#[derive(Debug)]
pub struct WatchMessage {
    /// Raw bytes stored at the key, `None` when the key is absent.
    pub value: Option<Bytes>,
    /// Error that prevented the watch from producing a value.
    pub error: Option<Error>,
}

impl WatchMessage {
    /// Creates a message carrying the current value of the key.
    pub fn value(value: impl Into<Bytes>) -> Self {
        Self {
            value: Some(value.into()),
            error: None,
        }
    }

    /// Creates a message reporting that the key is absent.
    pub fn absent() -> Self {
        Self {
            value: None,
            error: None,
        }
    }

    /// Creates a message carrying an error.
    pub fn error(error: Error) -> Self {
        Self {
            value: None,
            error: Some(error),
        }
    }

    /// Returns true if this message carries an error.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns true if this message reports an absent key.
    #[inline]
    pub fn is_absent(&self) -> bool {
        self.value.is_none() && self.error.is_none()
    }

    /// Converts the message into a result, keeping absence as `Ok(None)`.
    pub fn into_result(self) -> Result<Option<Bytes>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_absent_is_not_an_error() {
        let message = WatchMessage::absent();
        assert!(message.is_absent());
        assert!(!message.is_error());
        assert_eq!(message.into_result().unwrap(), None);
    }

    #[test]
    fn test_empty_value_is_not_absent() {
        let message = WatchMessage::value(Bytes::new());
        assert!(!message.is_absent());
        assert_eq!(message.into_result().unwrap(), Some(Bytes::new()));
    }

    #[test]
    fn test_error_message() {
        let message = WatchMessage::error(Error::connection());
        assert!(message.is_error());
        assert!(!message.is_absent());
        assert_eq!(message.into_result().unwrap_err().kind, ErrorKind::Connection);
    }
}
