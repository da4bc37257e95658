use std::time::Duration;

use error_stack::{Report, ResultExt};
use fastly::backend::Backend;
use url::Url;

use adplus_common::error::AdplusError;

/// Host header value for a backend request; the port is kept only when non-standard.
#[inline]
fn compute_host_header(scheme: &str, host: &str, port: u16) -> String {
    let is_https = scheme.eq_ignore_ascii_case("https");
    let default_port = if is_https { 443 } else { 80 };
    if port != default_port {
        format!("{}:{}", host, port)
    } else {
        host.to_string()
    }
}

/// Name of the dynamic backend serving `scheme://host:port`.
fn backend_name(scheme: &str, host: &str, port: u16) -> String {
    let name_base = format!("{}_{}_{}", scheme, host, port);
    format!("adplus_{}", name_base.replace(['.', ':'], "_"))
}

/// Ensure a dynamic backend exists for the partner origin and return its name.
///
/// If a backend with the derived name already exists it is reused.
///
/// # Errors
///
/// Returns [`AdplusError::Transport`] when the host is missing or the backend
/// cannot be created.
pub fn ensure_partner_backend(
    scheme: &str,
    host: &str,
    port: Option<u16>,
) -> Result<String, Report<AdplusError>> {
    if host.is_empty() {
        return Err(Report::new(AdplusError::Transport {
            message: "missing host".to_string(),
        }));
    }

    let is_https = scheme.eq_ignore_ascii_case("https");
    let target_port = port.unwrap_or(if is_https { 443 } else { 80 });
    let host_with_port = format!("{}:{}", host, target_port);
    let name = backend_name(scheme, host, target_port);

    let mut builder = Backend::builder(&name, &host_with_port)
        .override_host(&compute_host_header(scheme, host, target_port))
        .connect_timeout(Duration::from_secs(1))
        .first_byte_timeout(Duration::from_secs(5))
        .between_bytes_timeout(Duration::from_secs(5));
    if is_https {
        builder = builder
            .enable_ssl()
            .sni_hostname(host)
            .check_certificate(host);
    }

    match builder.finish() {
        Ok(_) => {
            log::info!("created dynamic backend: {} -> {}", name, host_with_port);
            Ok(name)
        }
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("NameInUse") || msg.contains("already in use") {
                log::debug!("reusing existing dynamic backend: {}", name);
                Ok(name)
            } else {
                Err(Report::new(AdplusError::Transport {
                    message: format!(
                        "dynamic backend creation failed ({} -> {}): {}",
                        name, host_with_port, msg
                    ),
                }))
            }
        }
    }
}

/// # Errors
///
/// Returns [`AdplusError::Transport`] when `url` is not absolute or the
/// backend cannot be created.
pub fn ensure_backend_from_url(url: &str) -> Result<String, Report<AdplusError>> {
    let parsed = Url::parse(url).change_context(AdplusError::Transport {
        message: format!("Invalid partner url: {}", url),
    })?;

    let host = parsed.host_str().ok_or_else(|| {
        Report::new(AdplusError::Transport {
            message: format!("Missing host in partner url: {}", url),
        })
    })?;

    ensure_partner_backend(parsed.scheme(), host, parsed.port())
}

#[cfg(test)]
mod tests {
    use super::{backend_name, compute_host_header};

    #[test]
    fn host_header_keeps_non_standard_port() {
        assert_eq!(
            compute_host_header("https", "ssp.ad-plus.com.tr", 8443),
            "ssp.ad-plus.com.tr:8443"
        );
        assert_eq!(
            compute_host_header("http", "ssp.ad-plus.com.tr", 8080),
            "ssp.ad-plus.com.tr:8080"
        );
    }

    #[test]
    fn host_header_drops_standard_port() {
        assert_eq!(
            compute_host_header("https", "id.ad-plus.com.tr", 443),
            "id.ad-plus.com.tr"
        );
        assert_eq!(compute_host_header("http", "id.ad-plus.com.tr", 80), "id.ad-plus.com.tr");
    }

    #[test]
    fn backend_name_is_sanitized() {
        assert_eq!(
            backend_name("https", "id.ad-plus.com.tr", 443),
            "adplus_https_id_ad-plus_com_tr_443"
        );
    }
}
