use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use fastly::http::header;
use fastly::Request;
use url::Url;

use adplus_common::error::AdplusError;
use adplus_common::identity::IdentityTransport;

use crate::backend::ensure_backend_from_url;

/// Identity fetches issued from the edge on behalf of the browser.
///
/// With credentials, the caller's `Cookie` header is forwarded so the
/// identity server sees the same third-party cookies it would in-browser.
pub struct FastlyIdentityTransport {
    cookie_header: Option<String>,
}

impl FastlyIdentityTransport {
    #[must_use]
    pub fn new(cookie_header: Option<String>) -> Self {
        Self { cookie_header }
    }
}

#[async_trait(?Send)]
impl IdentityTransport for FastlyIdentityTransport {
    async fn get(
        &self,
        url: &Url,
        with_credentials: bool,
    ) -> Result<Option<String>, Report<AdplusError>> {
        let backend = ensure_backend_from_url(url.as_str())?;

        let mut req = Request::get(url.as_str());
        if with_credentials {
            if let Some(cookies) = self.cookie_header.as_deref() {
                req.set_header(header::COOKIE, cookies);
            }
        }

        let mut resp = req.send(backend).change_context(AdplusError::Transport {
            message: format!("identity request to {} failed", url),
        })?;

        if !resp.get_status().is_success() {
            return Err(Report::new(AdplusError::Transport {
                message: format!("identity server answered {}", resp.get_status()),
            }));
        }

        let body = resp.take_body_str();
        Ok((!body.is_empty()).then_some(body))
    }
}
