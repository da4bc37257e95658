use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AdplusError;

pub const ENVIRONMENT_VARIABLE_PREFIX: &str = "ADPLUS";
pub const ENVIRONMENT_VARIABLE_SEPARATOR: &str = "__";

/// Settings for the Ad+ user-identity submodule.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct IdentitySettings {
    /// Identity server endpoint, without query parameters.
    #[serde(default = "default_api_url")]
    #[validate(url)]
    pub api_url: String,

    /// Partner account sent as `client_id` on every fetch.
    #[serde(default = "default_client_id")]
    #[validate(length(min = 1))]
    pub client_id: String,

    /// Local-storage key and cookie name holding the persisted record.
    #[serde(default = "default_storage_key")]
    #[validate(length(min = 1))]
    pub storage_key: String,

    /// Cookie written and read back to decide whether cookies work.
    #[serde(default = "default_test_cookie_name")]
    #[validate(length(min = 1))]
    pub test_cookie_name: String,

    /// Time after a write at which the identifier should be refreshed.
    #[serde(default = "default_rotation_interval_ms")]
    #[validate(range(min = 1000))]
    pub rotation_interval_ms: i64,

    /// Source domain reported in eids.
    #[serde(default = "default_eid_source")]
    #[validate(length(min = 1))]
    pub eid_source: String,

    #[serde(default)]
    pub cookie_domain: Option<String>,

    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,
}

impl IdentitySettings {
    /// Lifetime applied when the server gives none: three rotations minus a second.
    #[must_use]
    pub fn default_lifetime_ms(&self) -> i64 {
        self.rotation_interval_ms * 3 - 1000
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            client_id: default_client_id(),
            storage_key: default_storage_key(),
            test_cookie_name: default_test_cookie_name(),
            rotation_interval_ms: default_rotation_interval_ms(),
            eid_source: default_eid_source(),
            cookie_domain: None,
            cookie_path: default_cookie_path(),
        }
    }
}

/// Settings for the Ad+ bid adapter.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BidderSettings {
    /// Header-bidding endpoint receiving one POST per bid.
    #[serde(default = "default_bidder_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    #[serde(default = "default_sdk_version")]
    pub default_sdk_version: String,

    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for BidderSettings {
    fn default() -> Self {
        Self {
            endpoint: default_bidder_endpoint(),
            default_sdk_version: default_sdk_version(),
            default_language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub identity: IdentitySettings,

    #[serde(default)]
    #[validate(nested)]
    pub bidder: BidderSettings,
}

impl Settings {
    /// Parse settings from a TOML document, applying `ADPLUS__*` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AdplusError::Configuration`] if the TOML is malformed or a
    /// value has the wrong type.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<AdplusError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_VARIABLE_PREFIX)
            .separator(ENVIRONMENT_VARIABLE_SEPARATOR)
            .try_parsing(true);

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(AdplusError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        config
            .try_deserialize()
            .change_context(AdplusError::Configuration {
                message: "Failed to deserialize configuration".to_string(),
            })
    }

    /// Serialize the effective settings back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`AdplusError::Configuration`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, Report<AdplusError>> {
        toml::to_string_pretty(self).change_context(AdplusError::Configuration {
            message: "Failed to serialize settings to TOML".to_string(),
        })
    }
}

fn default_api_url() -> String {
    "https://id.ad-plus.com.tr/v2".to_string()
}

fn default_client_id() -> String {
    "xqkDY946ohWmBm3gWXDTfD".to_string()
}

fn default_storage_key() -> String {
    "_adplus_uid_v2".to_string()
}

fn default_test_cookie_name() -> String {
    "adplus_test".to_string()
}

fn default_rotation_interval_ms() -> i64 {
    4 * 60 * 60 * 1000
}

fn default_eid_source() -> String {
    "ad-plus.com.tr".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_bidder_endpoint() -> String {
    "https://ssp.ad-plus.com.tr/server/headerBidding".to_string()
}

fn default_sdk_version() -> String {
    "1".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}
