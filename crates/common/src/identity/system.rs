//! Identifier resolution, refresh and rotation.

use std::sync::Arc;

use error_stack::{Report, ResultExt};
use serde_json::Value;
use url::Url;

use crate::error::AdplusError;
use crate::settings::IdentitySettings;

use super::record::{state_of, IdResponse, IdentityRecord, RecordState};
use super::storage::IdentityStorage;
use super::transport::{Clock, IdentityTransport};

/// Outcome of [`AdplusIdSystem::resolve`].
pub enum IdResolution {
    /// A usable record was found; no network call is needed.
    Cached(IdentityRecord),
    /// The identifier must be fetched. Awaiting the handle performs the fetch.
    Deferred(RefreshHandle),
}

impl std::fmt::Debug for IdResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cached(record) => f.debug_tuple("Cached").field(record).finish(),
            Self::Deferred(handle) => f
                .debug_struct("Deferred")
                .field("previous_uid", &handle.previous_uid)
                .finish(),
        }
    }
}

struct IdentityCore {
    settings: IdentitySettings,
    storage: IdentityStorage,
    transport: Arc<dyn IdentityTransport>,
    clock: Arc<dyn Clock>,
}

/// A pending identity fetch.
///
/// [`RefreshHandle::fetch`] consumes the handle, so every handle issues at
/// most one request and completes exactly once.
pub struct RefreshHandle {
    core: Arc<IdentityCore>,
    previous_uid: Option<String>,
}

impl RefreshHandle {
    /// Identifier sent as the rotation hint, if any.
    #[must_use]
    pub fn previous_uid(&self) -> Option<&str> {
        self.previous_uid.as_deref()
    }

    /// Fetch a new identifier, persist it, and return the server response.
    ///
    /// Returns `None` when the request fails, the body is empty or malformed,
    /// or it carries no identifier.
    pub async fn fetch(self) -> Option<IdResponse> {
        self.core.fetch(self.previous_uid.as_deref()).await
    }
}

impl IdentityCore {
    fn refresh_url(&self, previous_uid: Option<&str>) -> Result<Url, Report<AdplusError>> {
        let mut url =
            Url::parse(&self.settings.api_url).change_context(AdplusError::Configuration {
                message: format!("Invalid identity api_url: {}", self.settings.api_url),
            })?;

        let storage_ok = if self.storage.storage_ok() { "1" } else { "0" };
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.settings.client_id)
                .append_pair("storage_ok", storage_ok);
            if let Some(uid) = previous_uid {
                query.append_pair("old_uid", uid);
            }
        }

        Ok(url)
    }

    async fn fetch(&self, previous_uid: Option<&str>) -> Option<IdResponse> {
        let url = match self.refresh_url(previous_uid) {
            Ok(url) => url,
            Err(e) => {
                log::error!("adplusId: cannot build identity url: {:?}", e);
                return None;
            }
        };

        log::debug!("adplusId: fetching identifier from {}", url);

        let body = match self.transport.get(&url, true).await {
            Ok(Some(body)) if !body.trim().is_empty() => body,
            Ok(_) => {
                log::error!("adplusId: no uid returned");
                return None;
            }
            Err(e) => {
                log::error!("adplusId: identity fetch failed: {:?}", e);
                return None;
            }
        };

        self.handle_body(&body)
    }

    fn handle_body(&self, body: &str) -> Option<IdResponse> {
        let parsed = serde_json::from_str::<Value>(body).change_context(AdplusError::Identity {
            message: "identity response is not JSON".to_string(),
        });
        let data = match parsed {
            Ok(data) => data,
            Err(e) => {
                log::error!("adplusId: {:?}", e);
                return None;
            }
        };

        let has_uid = matches!(data.get("uid"), Some(Value::String(uid)) if !uid.is_empty());
        if !has_uid {
            log::warn!("adplusId: identity response has no uid, clearing stored record");
            self.storage.clear();
            return None;
        }

        match serde_json::from_value::<IdResponse>(data) {
            Ok(response) => {
                self.persist(&response);
                Some(response)
            }
            Err(e) => {
                log::error!("adplusId: unexpected identity response shape: {}", e);
                None
            }
        }
    }

    fn persist(&self, response: &IdResponse) {
        let Some(lifetime_ms) = response.lifetime_ms(self.settings.default_lifetime_ms()) else {
            log::warn!("adplusId: identifier expired");
            self.storage.clear();
            return;
        };

        let record = IdentityRecord::from_response(
            response,
            self.clock.now_ms(),
            lifetime_ms,
            self.settings.rotation_interval_ms,
        );
        self.storage.write(&record);
    }
}

/// The Ad+ user-identity submodule.
#[derive(Clone)]
pub struct AdplusIdSystem {
    core: Arc<IdentityCore>,
}

impl AdplusIdSystem {
    #[must_use]
    pub fn new(
        settings: IdentitySettings,
        storage: IdentityStorage,
        transport: Arc<dyn IdentityTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            core: Arc::new(IdentityCore {
                settings,
                storage,
                transport,
                clock,
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &IdentitySettings {
        &self.core.settings
    }

    /// Return the cached record, or a handle that fetches a new one.
    ///
    /// Expiry is checked before rotation. An expired record is removed from
    /// every backend before the handle is returned, and the fetch carries no
    /// rotation hint.
    #[must_use]
    pub fn resolve(&self) -> IdResolution {
        let now = self.core.clock.now_ms();
        let record = self.core.storage.read();

        match (state_of(record.as_ref(), now), record) {
            (RecordState::Valid, Some(record)) => {
                log::debug!("adplusId: using stored identifier");
                IdResolution::Cached(record)
            }
            (RecordState::StaleNeedsRotation, Some(record)) => {
                log::info!("adplusId: rotating stored identifier");
                self.deferred(Some(record.uid).filter(|uid| !uid.is_empty()))
            }
            (RecordState::Expired, _) => {
                log::info!("adplusId: stored identifier expired");
                self.core.storage.clear();
                self.deferred(None)
            }
            _ => self.deferred(None),
        }
    }

    /// Apply the persist rule to a server response.
    pub fn persist(&self, response: &IdResponse) {
        self.core.persist(response);
    }

    /// Remove the record from every backend.
    pub fn clear(&self) {
        self.core.storage.clear();
    }

    fn deferred(&self, previous_uid: Option<String>) -> IdResolution {
        IdResolution::Deferred(RefreshHandle {
            core: Arc::clone(&self.core),
            previous_uid,
        })
    }
}
