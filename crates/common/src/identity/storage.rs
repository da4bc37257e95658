//! Persistence port for the identity record.
//!
//! The record lives in two places: a durable local store and a cookie.
//! [`IdentityStorage`] treats them as one logical store, reading from the
//! first backend that holds a usable record and writing to all of them.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use cookie::CookieJar;
use error_stack::{Report, ResultExt};

use crate::cookies::{
    create_cross_site_cookie, format_cookie_expires, parse_cookies_to_jar, EXPIRED_COOKIE_DATE,
};
use crate::error::AdplusError;

use super::record::{IdentityRecord, MAX_LIFETIME_MS};
use super::transport::{Clock, SystemClock};

/// A physical key/value store the identity record can be persisted in.
pub trait StorageBackend: Send + Sync {
    /// Short name used in logs and errors.
    fn backend_name(&self) -> &'static str;

    /// Whether this backend can currently persist data.
    fn is_enabled(&self) -> bool;

    /// # Errors
    ///
    /// Returns [`AdplusError::Storage`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Report<AdplusError>>;

    /// Store `value` under `key`. Backends that support expiry drop the
    /// value at `expires_at_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`AdplusError::Storage`] if the backend rejects the write.
    fn set(&self, key: &str, value: &str, expires_at_ms: i64) -> Result<(), Report<AdplusError>>;

    /// # Errors
    ///
    /// Returns [`AdplusError::Storage`] if the backend rejects the removal.
    fn remove(&self, key: &str) -> Result<(), Report<AdplusError>>;
}

fn lock_poisoned(backend: &'static str) -> Report<AdplusError> {
    Report::new(AdplusError::Storage {
        backend,
        message: "lock poisoned".to_string(),
    })
}

/// In-memory key/value store standing in for durable device storage.
///
/// The capability flag is reported as-is, so hosts without device storage
/// can register a disabled instance.
#[derive(Debug)]
pub struct MemoryBackend {
    enabled: bool,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, Report<AdplusError>> {
        self.entries
            .lock()
            .map_err(|_| lock_poisoned(self.backend_name()))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(true)
    }
}

impl StorageBackend for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "local_storage"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn get(&self, key: &str) -> Result<Option<String>, Report<AdplusError>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, _expires_at_ms: i64) -> Result<(), Report<AdplusError>> {
        if !self.enabled {
            return Err(Report::new(AdplusError::Storage {
                backend: self.backend_name(),
                message: "local storage is disabled".to_string(),
            }));
        }
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Report<AdplusError>> {
        if self.enabled {
            self.entries()?.remove(key);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CookieState {
    jar: CookieJar,
    set_cookie_headers: Vec<String>,
    probe_cookie_sent: bool,
}

/// How [`CookieBackend`] decides whether cookies work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CookieProbe {
    /// Write the test cookie, read it back, then expire it. Suits a jar that
    /// sees its own writes, such as the browser's.
    #[default]
    RoundTrip,
    /// Cookies work only if the client sent back the test cookie set on an
    /// earlier response. When it is missing, the test cookie is set once so
    /// the next request can report it.
    Returned,
}

/// Cookie store backed by the request's cookie jar.
///
/// Writes update the jar so later reads in the same request see them, and
/// queue a `Set-Cookie` header for the response. Values are percent-encoded.
pub struct CookieBackend {
    state: Mutex<CookieState>,
    test_cookie_name: String,
    test_cookie_returned: bool,
    probe: CookieProbe,
    clock: Arc<dyn Clock>,
    path: String,
    domain: Option<String>,
}

impl fmt::Debug for CookieBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieBackend")
            .field("test_cookie_name", &self.test_cookie_name)
            .field("test_cookie_returned", &self.test_cookie_returned)
            .field("probe", &self.probe)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl CookieBackend {
    #[must_use]
    pub fn new(jar: CookieJar, test_cookie_name: impl Into<String>) -> Self {
        let test_cookie_name = test_cookie_name.into();
        let test_cookie_returned = jar
            .get(&test_cookie_name)
            .is_some_and(|c| !c.value().is_empty());
        Self {
            state: Mutex::new(CookieState {
                jar,
                ..CookieState::default()
            }),
            test_cookie_name,
            test_cookie_returned,
            probe: CookieProbe::default(),
            clock: Arc::new(SystemClock),
            path: "/".to_string(),
            domain: None,
        }
    }

    /// Seed the jar from a raw `Cookie` header value.
    #[must_use]
    pub fn from_cookie_header(header: &str, test_cookie_name: impl Into<String>) -> Self {
        Self::new(parse_cookies_to_jar(header), test_cookie_name)
    }

    #[must_use]
    pub fn with_probe(mut self, probe: CookieProbe) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    /// `Set-Cookie` values accumulated so far, in write order.
    ///
    /// # Errors
    ///
    /// Returns [`AdplusError::Storage`] if the cookie state is poisoned.
    pub fn set_cookie_headers(&self) -> Result<Vec<String>, Report<AdplusError>> {
        Ok(self.state()?.set_cookie_headers.clone())
    }

    fn state(&self) -> Result<MutexGuard<'_, CookieState>, Report<AdplusError>> {
        self.state
            .lock()
            .map_err(|_| lock_poisoned(self.backend_name()))
    }

    fn write_cookie(
        &self,
        name: &str,
        value: &str,
        expires: &str,
        keep: bool,
    ) -> Result<(), Report<AdplusError>> {
        let encoded = urlencoding::encode(value).into_owned();
        let header = create_cross_site_cookie(
            name,
            &encoded,
            expires,
            &self.path,
            self.domain.as_deref(),
        );

        let mut state = self.state()?;
        if keep {
            state
                .jar
                .add(cookie::Cookie::new(name.to_string(), encoded));
        } else {
            state.jar.remove(cookie::Cookie::from(name.to_string()));
        }
        state.set_cookie_headers.push(header);
        Ok(())
    }

    fn read_cookie(&self, name: &str) -> Result<Option<String>, Report<AdplusError>> {
        let state = self.state()?;
        let Some(cookie) = state.jar.get(name) else {
            return Ok(None);
        };
        if cookie.value().is_empty() {
            return Ok(None);
        }
        let decoded = urlencoding::decode(cookie.value())
            .change_context(AdplusError::Storage {
                backend: self.backend_name(),
                message: format!("cookie '{}' is not valid percent-encoded UTF-8", name),
            })?
            .into_owned();
        Ok(Some(decoded))
    }

    fn probe(&self) -> Result<bool, Report<AdplusError>> {
        match self.probe {
            CookieProbe::RoundTrip => self.probe_round_trip(),
            CookieProbe::Returned => self.probe_returned(),
        }
    }

    fn probe_round_trip(&self) -> Result<bool, Report<AdplusError>> {
        let soon = format_cookie_expires(self.clock.now_ms().saturating_add(60_000));
        self.write_cookie(&self.test_cookie_name, "1", &soon, true)?;
        if self.read_cookie(&self.test_cookie_name)?.is_none() {
            return Ok(false);
        }
        self.write_cookie(&self.test_cookie_name, "1", EXPIRED_COOKIE_DATE, false)?;
        Ok(true)
    }

    fn probe_returned(&self) -> Result<bool, Report<AdplusError>> {
        if self.test_cookie_returned {
            return Ok(true);
        }
        if !self.state()?.probe_cookie_sent {
            let expires =
                format_cookie_expires(self.clock.now_ms().saturating_add(MAX_LIFETIME_MS));
            self.write_cookie(&self.test_cookie_name, "1", &expires, true)?;
            self.state()?.probe_cookie_sent = true;
        }
        Ok(false)
    }
}

impl StorageBackend for CookieBackend {
    fn backend_name(&self) -> &'static str {
        "cookie"
    }

    /// Probe as configured by [`CookieProbe`]; any failure reads as disabled.
    fn is_enabled(&self) -> bool {
        match self.probe() {
            Ok(enabled) => enabled,
            Err(e) => {
                log::debug!("adplusId: cookie probe failed: {:?}", e);
                false
            }
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, Report<AdplusError>> {
        self.read_cookie(key)
    }

    fn set(&self, key: &str, value: &str, expires_at_ms: i64) -> Result<(), Report<AdplusError>> {
        self.write_cookie(key, value, &format_cookie_expires(expires_at_ms), true)
    }

    fn remove(&self, key: &str) -> Result<(), Report<AdplusError>> {
        self.write_cookie(key, "", EXPIRED_COOKIE_DATE, false)
    }
}

/// One logical record store over an ordered list of backends.
#[derive(Clone)]
pub struct IdentityStorage {
    key: String,
    backends: Vec<Arc<dyn StorageBackend>>,
}

impl IdentityStorage {
    #[must_use]
    pub fn new(key: impl Into<String>, backends: Vec<Arc<dyn StorageBackend>>) -> Self {
        Self {
            key: key.into(),
            backends,
        }
    }

    /// True when any backend can persist data.
    #[must_use]
    pub fn storage_ok(&self) -> bool {
        self.backends.iter().any(|b| b.is_enabled())
    }

    /// First backend value that parses as a record.
    ///
    /// A value that does not parse is logged and skipped so the next
    /// backend still gets a chance.
    #[must_use]
    pub fn read(&self) -> Option<IdentityRecord> {
        for backend in &self.backends {
            let raw = match backend.get(&self.key) {
                Ok(Some(raw)) if !raw.is_empty() => raw,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!(
                        "adplusId: failed to read {}: {:?}",
                        backend.backend_name(),
                        e
                    );
                    continue;
                }
            };

            match serde_json::from_str::<IdentityRecord>(&raw) {
                Ok(record) => {
                    log::debug!("adplusId: record read from {}", backend.backend_name());
                    return Some(record);
                }
                Err(e) => {
                    log::warn!(
                        "adplusId: discarding malformed record in {}: {}",
                        backend.backend_name(),
                        e
                    );
                }
            }
        }
        None
    }

    /// Write the record to every backend, logging failures.
    pub fn write(&self, record: &IdentityRecord) {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                log::error!("adplusId: failed to serialize record: {}", e);
                return;
            }
        };
        let expires_at = record.expires_at.unwrap_or(0);

        for backend in &self.backends {
            if let Err(e) = backend.set(&self.key, &json, expires_at) {
                log::warn!(
                    "adplusId: failed to write {}: {:?}",
                    backend.backend_name(),
                    e
                );
            }
        }
    }

    /// Remove the record from every backend, logging failures.
    pub fn clear(&self) {
        for backend in &self.backends {
            if let Err(e) = backend.remove(&self.key) {
                log::warn!(
                    "adplusId: failed to clear {}: {:?}",
                    backend.backend_name(),
                    e
                );
            }
        }
    }
}
