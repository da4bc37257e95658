//! Page environment signals sent with every bid request.

use serde::{Deserialize, Serialize};
use url::Url;

/// Browser-side facts about the page the auction runs on.
pub trait PageEnvironment {
    fn is_secure(&self) -> bool;
    fn screen_width(&self) -> Option<u32>;
    fn screen_height(&self) -> Option<u32>;
    fn language(&self) -> Option<String>;
    fn page_url(&self) -> Option<String>;
    fn hostname(&self) -> Option<String>;
    fn referrer(&self) -> Option<String>;
}

/// Page environment reported by the client alongside its bids.
///
/// Protocol and hostname are derived from `pageUrl`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_height: Option<u32>,
}

impl PageContext {
    /// Fill fields the client left empty.
    #[must_use]
    pub fn with_fallbacks(
        mut self,
        page_url: Option<String>,
        referrer: Option<String>,
        language: Option<String>,
    ) -> Self {
        self.page_url = non_empty(self.page_url).or(page_url);
        self.referrer = non_empty(self.referrer).or(referrer);
        self.language = non_empty(self.language).or(language);
        self
    }

    fn parsed_url(&self) -> Option<Url> {
        self.page_url.as_deref().and_then(|u| Url::parse(u).ok())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl PageEnvironment for PageContext {
    fn is_secure(&self) -> bool {
        self.parsed_url().is_some_and(|u| u.scheme() == "https")
    }

    fn screen_width(&self) -> Option<u32> {
        self.screen_width
    }

    fn screen_height(&self) -> Option<u32> {
        self.screen_height
    }

    fn language(&self) -> Option<String> {
        non_empty(self.language.clone())
    }

    fn page_url(&self) -> Option<String> {
        non_empty(self.page_url.clone())
    }

    fn hostname(&self) -> Option<String> {
        self.parsed_url()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    fn referrer(&self) -> Option<String> {
        non_empty(self.referrer.clone())
    }
}

/// Primary tag of an `Accept-Language` header, e.g. `tr-TR` from `tr-TR,tr;q=0.9`.
#[must_use]
pub fn primary_language(accept_language: &str) -> Option<String> {
    accept_language
        .split(',')
        .next()
        .and_then(|tag| tag.split(';').next())
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && *tag != "*")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_context_derives_protocol_and_hostname() {
        let page = PageContext {
            page_url: Some("https://news.example.com/article?id=1".to_string()),
            ..PageContext::default()
        };
        assert!(page.is_secure());
        assert_eq!(page.hostname().as_deref(), Some("news.example.com"));

        let page = PageContext {
            page_url: Some("http://news.example.com/".to_string()),
            ..PageContext::default()
        };
        assert!(!page.is_secure());
    }

    #[test]
    fn test_page_context_without_url() {
        let page = PageContext::default();
        assert!(!page.is_secure());
        assert_eq!(page.hostname(), None);
        assert_eq!(page.page_url(), None);
    }

    #[test]
    fn test_with_fallbacks_keeps_client_values() {
        let page = PageContext {
            language: Some("tr-TR".to_string()),
            page_url: Some(String::new()),
            ..PageContext::default()
        }
        .with_fallbacks(
            Some("https://fallback.example.com/".to_string()),
            Some("https://ref.example.com/".to_string()),
            Some("en-GB".to_string()),
        );

        assert_eq!(page.language().as_deref(), Some("tr-TR"));
        assert_eq!(
            page.page_url().as_deref(),
            Some("https://fallback.example.com/")
        );
        assert_eq!(page.referrer().as_deref(), Some("https://ref.example.com/"));
    }

    #[test]
    fn test_primary_language() {
        assert_eq!(
            primary_language("tr-TR,tr;q=0.9,en;q=0.8").as_deref(),
            Some("tr-TR")
        );
        assert_eq!(primary_language("en;q=0.5").as_deref(), Some("en"));
        assert_eq!(primary_language("*"), None);
        assert_eq!(primary_language(""), None);
    }
}
