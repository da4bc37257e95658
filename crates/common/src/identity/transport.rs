//! Outbound ports used by the identity submodule.

use async_trait::async_trait;
use error_stack::Report;
use url::Url;

use crate::error::AdplusError;

/// Issues the identity fetch.
///
/// Implementations return the response body on a successful status, `None`
/// or an empty string for an empty body, and an error for anything that
/// did not produce a successful response. No retries.
#[async_trait(?Send)]
pub trait IdentityTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AdplusError::Transport`] when the request fails or the server
    /// answers with a non-success status.
    async fn get(
        &self,
        url: &Url,
        with_credentials: bool,
    ) -> Result<Option<String>, Report<AdplusError>>;
}

/// Source of the current time in milliseconds since the epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
