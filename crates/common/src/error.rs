//! Error types shared by the Ad+ adapters.
//!
//! Internals return `Result<T, Report<AdplusError>>` so context can be attached
//! as an error travels up. The adapter operations exposed to the host never
//! surface these errors: they log and degrade instead.

use derive_more::{Display, Error};
use http::StatusCode;

#[derive(Debug, Display, Error)]
pub enum AdplusError {
    /// Settings could not be loaded or failed validation.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// A persistence backend rejected a read or write.
    #[display("Storage error ({backend}): {message}")]
    Storage {
        backend: &'static str,
        message: String,
    },

    /// The identity server returned something unusable.
    #[display("Identity error: {message}")]
    Identity { message: String },

    /// Bid request translation or response interpretation failed.
    #[display("Bidder error: {message}")]
    Bidder { message: String },

    /// The outbound HTTP call did not complete.
    #[display("Transport error: {message}")]
    Transport { message: String },

    /// The caller sent a request the edge service cannot handle.
    #[display("Invalid request: {message}")]
    InvalidRequest { message: String },
}

impl AdplusError {
    /// HTTP status used when this error ends a request at the edge.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Transport { .. } | Self::Identity { .. } | Self::Bidder { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::Configuration { .. } | Self::Storage { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_message() {
        let err = AdplusError::Storage {
            backend: "cookie",
            message: "jar poisoned".to_string(),
        };
        assert_eq!(err.to_string(), "Storage error (cookie): jar poisoned");

        let err = AdplusError::Configuration {
            message: "bad url".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: bad url");
    }

    #[test]
    fn test_status_codes() {
        let invalid = AdplusError::InvalidRequest {
            message: String::new(),
        };
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let transport = AdplusError::Transport {
            message: String::new(),
        };
        assert_eq!(transport.status_code(), StatusCode::BAD_GATEWAY);

        let config = AdplusError::Configuration {
            message: String::new(),
        };
        assert_eq!(config.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
