//! Ad+ bid adapter: validation, request building and response mapping.

use http::Method;
use serde_json::Value;

use crate::settings::BidderSettings;

use super::environment::PageEnvironment;
use super::types::{
    AdMeta, AdResponse, AdplusBid, AdplusBidRequest, BidRequest, BidderRequest, MediaType,
};

/// Bidder code the adapter registers under.
pub const BIDDER_CODE: &str = "adplus";

/// Parse a host-supplied bid, rejecting `null`.
#[must_use]
pub fn parse_bid_request(value: &Value) -> Option<BidRequest> {
    if value.is_null() {
        log::error!("adplus: bid can not be empty");
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(bid) => Some(bid),
        Err(e) => {
            log::error!("adplus: bid has an unexpected shape: {}", e);
            None
        }
    }
}

/// Leading integer of a string, the way `parseInt` reads it: `"12ab"` is 12,
/// `"ab12"` has none.
#[must_use]
pub fn parse_leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// `[width, height, ...]` with every entry numeric.
fn is_numeric_size(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|pair| pair.len() >= 2 && pair.iter().all(Value::is_number))
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// The Ad+ bid adapter.
#[derive(Debug, Clone)]
pub struct AdplusBidAdapter {
    settings: BidderSettings,
}

impl AdplusBidAdapter {
    #[must_use]
    pub fn new(settings: BidderSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        BIDDER_CODE
    }

    #[must_use]
    pub fn supported_media_types(&self) -> &'static [MediaType] {
        &[MediaType::Banner]
    }

    /// Check bidder params and banner sizes, logging the first problem found.
    #[must_use]
    pub fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        let Some(params) = bid.params.as_ref() else {
            log::error!("adplus: bid.params is required");
            return false;
        };

        if non_empty_str(params.ad_unit_id.as_ref()).is_none() {
            log::error!("adplus: bid.params.adUnitId is missing or has wrong type");
            return false;
        }

        if non_empty_str(params.inventory_id.as_ref()).is_none() {
            log::error!("adplus: bid.params.inventoryId is missing or has wrong type");
            return false;
        }

        let sizes_ok = bid
            .media_types
            .as_ref()
            .and_then(|m| m.banner.as_ref())
            .and_then(|b| b.sizes.as_ref())
            .and_then(Value::as_array)
            .and_then(|sizes| sizes.first())
            .is_some_and(is_numeric_size);
        if !sizes_ok {
            log::error!("adplus: wrong or missing size parameters");
            return false;
        }

        true
    }

    /// One POST descriptor per bid, in input order.
    ///
    /// Bids lacking params or a banner size are skipped with an error log.
    #[must_use]
    pub fn build_requests(
        &self,
        requests: &[BidRequest],
        page: &dyn PageEnvironment,
    ) -> Vec<BidderRequest> {
        requests
            .iter()
            .filter_map(|bid| self.create_bid_request(bid, page))
            .collect()
    }

    fn create_bid_request(
        &self,
        bid: &BidRequest,
        page: &dyn PageEnvironment,
    ) -> Option<BidderRequest> {
        let Some(params) = bid.params.as_ref() else {
            log::error!("adplus: skipping bid {:?} without params", bid.bid_id);
            return None;
        };
        let Some(size) = bid.first_banner_size().and_then(Value::as_array) else {
            log::error!("adplus: skipping bid {:?} without banner size", bid.bid_id);
            return None;
        };

        let inventory_id = coerce_id(params.inventory_id.as_ref(), "inventoryId");
        let ad_unit_id = coerce_id(params.ad_unit_id.as_ref(), "adUnitId");

        let sdk_version = params
            .sdk_version
            .clone()
            .filter(|v| !is_falsy(v))
            .unwrap_or_else(|| Value::String(self.settings.default_sdk_version.clone()));

        let data = AdplusBidRequest {
            bid_id: bid.bid_id.clone(),
            inventory_id,
            ad_unit_id,
            ad_unit_width: size.first().cloned(),
            ad_unit_height: size.get(1).cloned(),
            extra_data: params.extra_data.clone(),
            year_of_birth: params.year_of_birth.clone(),
            gender: params.gender.clone(),
            categories: params.categories.clone(),
            latitude: params.latitude.clone(),
            longitude: params.longitude.clone(),
            sdk_version,
            interstitial: 0,
            secure: u8::from(page.is_secure()),
            screen_width: page.screen_width(),
            screen_height: page.screen_height(),
            language: page
                .language()
                .unwrap_or_else(|| self.settings.default_language.clone()),
            page_url: page.page_url(),
            domain: page.hostname(),
            referrer: page.referrer(),
            adplus_uid: bid
                .user_id
                .as_ref()
                .and_then(|ids| ids.get("adplusId"))
                .filter(|v| !v.is_null())
                .cloned(),
            eids: bid.user_id_as_eids.clone().filter(|v| !v.is_null()),
        };

        Some(BidderRequest {
            method: Method::POST,
            url: self.settings.endpoint.clone(),
            data,
        })
    }

    /// Map the endpoint's bid list. Anything but a non-empty list yields no bids.
    #[must_use]
    pub fn interpret_response(&self, body: Option<&Value>) -> Vec<AdResponse> {
        let Some(entries) = body.and_then(Value::as_array) else {
            log::debug!("adplus: empty or non-list response body");
            return Vec::new();
        };

        let bids: Vec<AdResponse> = entries.iter().map(create_ad_response).collect();
        log::info!("adplus: interpreted {} bids", bids.len());
        bids
    }

    pub fn on_timeout(&self, timeout_data: &Value) {
        log::error!("adplus: adapter timed out for the auction: {}", timeout_data);
    }

    pub fn on_bid_won(&self, bid: &Value) {
        let field = |name: &str| {
            bid.get(name)
                .or_else(|| bid.get("params").and_then(|p| p.get(name)))
                .map_or_else(|| "undefined".to_string(), display_value)
        };
        log::info!(
            "adplus: adapter won the auction. Bid id: {}, Ad Unit Id: {}, Inventory Id: {}",
            field("bidId"),
            field("adUnitId"),
            field("inventoryId"),
        );
    }
}

fn coerce_id(value: Option<&Value>, name: &str) -> Option<i64> {
    let parsed = match value {
        Some(Value::String(s)) => parse_leading_int(s),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    };
    if parsed.is_none() {
        log::warn!("adplus: {} is not numeric, omitting it", name);
    }
    parsed
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn create_ad_response(entry: &Value) -> AdResponse {
    let bid: AdplusBid = serde_json::from_value(entry.clone()).unwrap_or_else(|e| {
        log::warn!("adplus: bid entry has an unexpected shape: {}", e);
        AdplusBid::default()
    });

    let primary_cat_id = bid
        .category_ids
        .as_ref()
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .cloned();

    AdResponse {
        request_id: bid.request_id,
        cpm: bid.cpm,
        currency: bid.currency,
        width: bid.width,
        height: bid.height,
        creative_id: bid.creative_id,
        deal_id: bid.deal_id,
        net_revenue: bid.net_revenue,
        ttl: bid.ttl,
        ad: bid.ad,
        media_type: bid.media_type,
        meta: AdMeta {
            advertiser_domains: bid.advertiser_domains,
            primary_cat_id,
            secondary_cat_ids: bid.category_ids,
        },
    }
}
