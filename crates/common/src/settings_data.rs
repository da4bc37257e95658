//! Settings embedded in the service at build time.

use error_stack::{Report, ResultExt};
use validator::Validate;

use crate::error::AdplusError;
use crate::settings::Settings;

const SETTINGS_TOML: &str = include_str!("../../../adplus.toml");

/// Load and validate the settings compiled into the binary.
///
/// # Errors
///
/// Returns [`AdplusError::Configuration`] if the embedded TOML cannot be
/// parsed or fails validation.
pub fn get_settings() -> Result<Settings, Report<AdplusError>> {
    let settings = Settings::from_toml(SETTINGS_TOML)?;
    settings
        .validate()
        .change_context(AdplusError::Configuration {
            message: "Settings validation failed".to_string(),
        })?;

    log::debug!(
        "adplus: loaded settings (identity api: {}, bidder endpoint: {})",
        settings.identity.api_url,
        settings.bidder.endpoint
    );

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_settings_load() {
        let settings = get_settings().expect("embedded settings should be valid");
        assert_eq!(settings.identity.storage_key, "_adplus_uid_v2");
        assert_eq!(settings.identity.test_cookie_name, "adplus_test");
        assert_eq!(settings.identity.rotation_interval_ms, 4 * 60 * 60 * 1000);
    }
}
