//! Error types for the Consul client.

use thiserror::Error;

/// Result type alias for Consul client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Consul client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Response body was not a valid KV listing.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Stored value was not valid base64.
    #[error("Invalid value encoding: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Agent address could not be parsed.
    #[error("Invalid address: {0}")]
    Url(#[from] url::ParseError),
    /// Agent address is unusable.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// Agent answered with an unexpected status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    /// Blocking query response carried no usable `X-Consul-Index`.
    #[error("Missing or invalid X-Consul-Index header")]
    MissingIndex,
}

impl From<Error> for keywatch_core::Error {
    fn from(err: Error) -> Self {
        use keywatch_core::Error as CoreError;

        match err {
            Error::Reqwest(e) => {
                if e.is_timeout() {
                    CoreError::timeout()
                        .with_message(e.to_string())
                        .with_source(e)
                } else if e.is_connect() {
                    CoreError::connection()
                        .with_message("Connection failed")
                        .with_source(e)
                } else if e.is_decode() {
                    CoreError::serialization()
                        .with_message(e.to_string())
                        .with_source(e)
                } else {
                    CoreError::connection()
                        .with_message(e.to_string())
                        .with_source(e)
                }
            }
            Error::Serde(e) => CoreError::serialization()
                .with_message(e.to_string())
                .with_source(e),
            Error::Base64(e) => CoreError::serialization()
                .with_message(e.to_string())
                .with_source(e),
            Error::Url(e) => CoreError::connection()
                .with_message(format!("Invalid address: {e}"))
                .with_source(e),
            Error::InvalidAddress(reason) => {
                CoreError::connection().with_message(format!("Invalid address: {reason}"))
            }
            err @ Error::Status { status, .. } => CoreError::connection()
                .with_context(format!("status {status}"))
                .with_message(err.to_string()),
            err @ Error::MissingIndex => CoreError::serialization().with_message(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use keywatch_core::ErrorKind;

    use super::*;

    #[test]
    fn test_status_maps_to_connection() {
        let err: keywatch_core::Error = Error::Status {
            status: 403,
            body: "Permission denied".to_owned(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Connection);
        assert!(err.to_string().contains("Permission denied"));
    }

    #[test]
    fn test_decode_failures_map_to_serialization() {
        let err: keywatch_core::Error = Error::MissingIndex.into();
        assert_eq!(err.kind, ErrorKind::Serialization);

        let json = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err: keywatch_core::Error = Error::from(json).into();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }

    #[test]
    fn test_invalid_address_maps_to_connection() {
        let err: keywatch_core::Error = Error::InvalidAddress("no host".to_owned()).into();
        assert_eq!(err.kind, ErrorKind::Connection);
        assert!(err.to_string().contains("no host"));
    }
}
