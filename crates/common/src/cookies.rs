use chrono::{DateTime, Utc};
use cookie::{Cookie, CookieJar};

/// `Expires` value that makes a browser drop the cookie immediately.
pub const EXPIRED_COOKIE_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

// return empty cookie jar for unparsable cookies
#[must_use]
pub fn parse_cookies_to_jar(s: &str) -> CookieJar {
    let cookie_str = s.trim().to_owned();
    let mut jar = CookieJar::new();
    let cookies = Cookie::split_parse(cookie_str).filter_map(Result::ok);

    for cookie in cookies {
        jar.add_original(cookie);
    }

    jar
}

/// Format a millisecond timestamp as an HTTP date for the `Expires` attribute.
///
/// Timestamps outside chrono's range fall back to the epoch, which expires
/// the cookie rather than keeping it forever.
#[must_use]
pub fn format_cookie_expires(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
        .unwrap_or_else(|| EXPIRED_COOKIE_DATE.to_string())
}

/// Build a cross-site `Set-Cookie` value (`Secure; SameSite=None`).
#[must_use]
pub fn create_cross_site_cookie(
    name: &str,
    value: &str,
    expires: &str,
    path: &str,
    domain: Option<&str>,
) -> String {
    let domain_attr = domain
        .map(|d| format!(" Domain={};", d))
        .unwrap_or_default();
    format!(
        "{}={};{} Path={}; Expires={}; Secure; SameSite=None",
        name, value, domain_attr, path, expires,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookies_to_jar() {
        let header_value = "c1=v1; c2=v2";
        let jar = parse_cookies_to_jar(header_value);

        assert!(jar.iter().count() == 2);
        assert_eq!(jar.get("c1").expect("c1 present").value(), "v1");
        assert_eq!(jar.get("c2").expect("c2 present").value(), "v2");
    }

    #[test]
    fn test_parse_cookies_to_jar_keeps_json_values() {
        let jar = parse_cookies_to_jar(r#"_adplus_uid_v2={"uid":"abc","atype":2}"#);
        assert_eq!(
            jar.get("_adplus_uid_v2").expect("cookie present").value(),
            r#"{"uid":"abc","atype":2}"#
        );
    }

    #[test]
    fn test_parse_cookies_to_jar_empty() {
        let jar = parse_cookies_to_jar("");
        assert!(jar.iter().count() == 0);
    }

    #[test]
    fn test_parse_cookies_to_jar_invalid() {
        let jar = parse_cookies_to_jar("invalid");
        assert!(jar.iter().count() == 0);
    }

    #[test]
    fn test_format_cookie_expires() {
        assert_eq!(format_cookie_expires(0), EXPIRED_COOKIE_DATE);
        assert_eq!(
            format_cookie_expires(1_762_423_200_000),
            "Thu, 06 Nov 2025 10:00:00 GMT"
        );
    }

    #[test]
    fn test_create_cross_site_cookie() {
        let cookie = create_cross_site_cookie(
            "_adplus_uid_v2",
            "v",
            EXPIRED_COOKIE_DATE,
            "/",
            Some(".example.com"),
        );
        assert_eq!(
            cookie,
            "_adplus_uid_v2=v; Domain=.example.com; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Secure; SameSite=None"
        );

        let cookie = create_cross_site_cookie("adplus_test", "1", EXPIRED_COOKIE_DATE, "/", None);
        assert_eq!(
            cookie,
            "adplus_test=1; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Secure; SameSite=None"
        );
    }
}
