//! Ad+ user-identity submodule.
//!
//! Resolves a persistent user identifier, keeps it in local storage and a
//! cookie, and rotates it every few hours:
//!
//! - a record younger than its `rotateAt` is served from storage;
//! - a record past `rotateAt` but before `expiresAt` is refreshed with the
//!   current identifier as `old_uid`;
//! - an expired or missing record is cleared and fetched from scratch.
//!
//! Persistence, HTTP and time are injected through [`StorageBackend`],
//! [`IdentityTransport`] and [`Clock`] so the edge host and tests can supply
//! their own.

pub mod eids;
pub mod record;
pub mod storage;
pub mod system;
pub mod transport;

pub use eids::{decode, eids, AdplusId, DecodedId, Eid, EidUid};
pub use record::{IdResponse, IdentityRecord, Lifetime, RecordState};
pub use storage::{CookieBackend, CookieProbe, IdentityStorage, MemoryBackend, StorageBackend};
pub use system::{AdplusIdSystem, IdResolution, RefreshHandle};
pub use transport::{Clock, IdentityTransport, SystemClock};

/// Name the submodule registers under.
pub const MODULE_NAME: &str = "adplusId";
