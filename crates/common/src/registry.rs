//! Host registration contract.
//!
//! The host framework knows bidders by code and identity submodules by
//! name. [`ModuleRegistry`] is the in-memory table it dispatches through.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::bidder::{AdResponse, AdplusBidAdapter, BidRequest, BidderRequest, MediaType};
use crate::bidder::PageEnvironment;
use crate::identity::{self, AdplusId, AdplusIdSystem, DecodedId, Eid, IdResolution};

/// Trait implemented by bid adapters.
pub trait BidderSpec: Send + Sync {
    /// Bidder code (e.g., "adplus").
    fn code(&self) -> &'static str;

    fn supported_media_types(&self) -> &'static [MediaType];

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool;

    /// Transform valid bid requests into outbound HTTP requests.
    fn build_requests(
        &self,
        requests: &[BidRequest],
        page: &dyn PageEnvironment,
    ) -> Vec<BidderRequest>;

    /// Parse a response body into normalized bids.
    fn interpret_response(&self, body: Option<&Value>) -> Vec<AdResponse>;

    fn on_timeout(&self, timeout_data: &Value);

    fn on_bid_won(&self, bid: &Value);
}

/// Trait implemented by user-identity submodules.
pub trait UserIdSubmodule: Send + Sync {
    /// Name used to link the submodule with host configuration.
    fn name(&self) -> &'static str;

    /// Normalize a stored or fetched value for bid requests.
    fn decode(&self, value: &Value) -> Option<DecodedId>;

    /// Return a cached identity or a handle that fetches one.
    fn get_id(&self) -> IdResolution;

    fn eids(&self, values: &[AdplusId]) -> Vec<Eid>;
}

impl BidderSpec for AdplusBidAdapter {
    fn code(&self) -> &'static str {
        AdplusBidAdapter::code(self)
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        AdplusBidAdapter::supported_media_types(self)
    }

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        AdplusBidAdapter::is_bid_request_valid(self, bid)
    }

    fn build_requests(
        &self,
        requests: &[BidRequest],
        page: &dyn PageEnvironment,
    ) -> Vec<BidderRequest> {
        AdplusBidAdapter::build_requests(self, requests, page)
    }

    fn interpret_response(&self, body: Option<&Value>) -> Vec<AdResponse> {
        AdplusBidAdapter::interpret_response(self, body)
    }

    fn on_timeout(&self, timeout_data: &Value) {
        AdplusBidAdapter::on_timeout(self, timeout_data);
    }

    fn on_bid_won(&self, bid: &Value) {
        AdplusBidAdapter::on_bid_won(self, bid);
    }
}

impl UserIdSubmodule for AdplusIdSystem {
    fn name(&self) -> &'static str {
        identity::MODULE_NAME
    }

    fn decode(&self, value: &Value) -> Option<DecodedId> {
        identity::decode(value)
    }

    fn get_id(&self) -> IdResolution {
        self.resolve()
    }

    fn eids(&self, values: &[AdplusId]) -> Vec<Eid> {
        identity::eids(&self.settings().eid_source, values)
    }
}

/// Registered bidders and identity submodules.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    bidders: HashMap<&'static str, Arc<dyn BidderSpec>>,
    submodules: HashMap<&'static str, Arc<dyn UserIdSubmodule>>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bidder, replacing any bidder with the same code.
    pub fn register_bidder(&mut self, bidder: Arc<dyn BidderSpec>) {
        let code = bidder.code();
        log::info!("Registering bidder: {}", code);
        if self.bidders.insert(code, bidder).is_some() {
            log::warn!("Bidder '{}' was already registered, replaced", code);
        }
    }

    /// Register a submodule, replacing any submodule with the same name.
    pub fn register_submodule(&mut self, submodule: Arc<dyn UserIdSubmodule>) {
        let name = submodule.name();
        log::info!("Registering user id submodule: {}", name);
        if self.submodules.insert(name, submodule).is_some() {
            log::warn!("Submodule '{}' was already registered, replaced", name);
        }
    }

    #[must_use]
    pub fn bidder(&self, code: &str) -> Option<Arc<dyn BidderSpec>> {
        self.bidders.get(code).cloned()
    }

    #[must_use]
    pub fn submodule(&self, name: &str) -> Option<Arc<dyn UserIdSubmodule>> {
        self.submodules.get(name).cloned()
    }

    /// Eids for every value a registered submodule can decode.
    #[must_use]
    pub fn eids_for(&self, values: &[Value]) -> Vec<Eid> {
        let mut eids = Vec::new();
        let mut names: Vec<&&'static str> = self.submodules.keys().collect();
        names.sort();

        for name in names {
            let Some(submodule) = self.submodules.get(*name) else {
                continue;
            };
            let decoded: Vec<AdplusId> = values
                .iter()
                .filter_map(|value| submodule.decode(value))
                .map(|d| d.adplus_id)
                .collect();
            if !decoded.is_empty() {
                eids.extend(submodule.eids(&decoded));
            }
        }
        eids
    }
}
