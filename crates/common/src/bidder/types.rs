//! Request and response shapes for the Ad+ bid adapter.

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Media type enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Banner,
}

/// Bid request handed over by the host framework.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_unit_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BidParams>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_types: Option<MediaTypes>,

    /// Decoded identities keyed by submodule, e.g. `{"adplusId": {...}}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id_as_eids: Option<Value>,
}

impl BidRequest {
    /// First declared banner size entry, unvalidated.
    #[must_use]
    pub fn first_banner_size(&self) -> Option<&Value> {
        self.media_types
            .as_ref()?
            .banner
            .as_ref()?
            .sizes
            .as_ref()?
            .as_array()?
            .first()
    }
}

/// Publisher-supplied bidder parameters.
///
/// Kept as raw JSON so type checks happen in validation rather than
/// failing deserialization of the whole bid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_unit_id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_of_birth: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaTypes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<BannerSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BannerSpec {
    /// Expected `[[width, height], ...]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Value>,
}

/// JSON body posted to the header-bidding endpoint. Absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdplusBidRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_unit_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_unit_width: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_unit_height: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_of_birth: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<Value>,
    pub sdk_version: Value,
    pub interstitial: u8,
    pub secure: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_height: Option<u32>,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adplus_uid: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eids: Option<Value>,
}

/// Outbound HTTP request descriptor produced by `build_requests`.
#[derive(Debug, Clone)]
pub struct BidderRequest {
    pub method: Method,
    pub url: String,
    pub data: AdplusBidRequest,
}

/// One bid as returned by the header-bidding endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdplusBid {
    #[serde(rename = "requestID", default)]
    pub request_id: Option<Value>,
    #[serde(default)]
    pub cpm: Option<Value>,
    #[serde(default)]
    pub currency: Option<Value>,
    #[serde(default)]
    pub width: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(rename = "creativeID", default)]
    pub creative_id: Option<Value>,
    #[serde(rename = "dealID", default)]
    pub deal_id: Option<Value>,
    #[serde(rename = "netRevenue", default)]
    pub net_revenue: Option<Value>,
    #[serde(default)]
    pub ttl: Option<Value>,
    #[serde(default)]
    pub ad: Option<Value>,
    #[serde(rename = "mediaType", default)]
    pub media_type: Option<Value>,
    #[serde(rename = "advertiserDomains", default)]
    pub advertiser_domains: Option<Value>,
    #[serde(rename = "categoryIDs", default)]
    pub category_ids: Option<Value>,
}

/// Normalized bid handed back to the host framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpm: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_revenue: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<Value>,
    pub meta: AdMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertiser_domains: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_cat_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_cat_ids: Option<Value>,
}
