#[cfg(test)]
pub mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use error_stack::Report;
    use url::Url;

    use crate::error::AdplusError;
    use crate::identity::{Clock, IdentityTransport};
    use crate::settings::Settings;

    /// 2025-11-06T10:00:00Z
    pub const TEST_NOW_MS: i64 = 1_762_423_200_000;

    pub fn crate_test_settings_str() -> String {
        r#"
            [identity]
            api_url = "https://id.ad-plus.com.tr/v2"
            client_id = "xqkDY946ohWmBm3gWXDTfD"
            storage_key = "_adplus_uid_v2"
            cookie_domain = ".test-publisher.com"

            [bidder]
            endpoint = "https://ssp.ad-plus.com.tr/server/headerBidding"
            "#
        .to_string()
    }

    pub fn create_test_settings() -> Settings {
        let toml_str = crate_test_settings_str();
        Settings::from_toml(&toml_str).expect("Invalid config")
    }

    /// Clock frozen at a settable instant.
    #[derive(Debug)]
    pub struct FixedClock {
        now_ms: AtomicI64,
    }

    impl FixedClock {
        pub fn new(now_ms: i64) -> Self {
            Self {
                now_ms: AtomicI64::new(now_ms),
            }
        }

        pub fn set(&self, now_ms: i64) {
            self.now_ms.store(now_ms, Ordering::SeqCst);
        }
    }

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            self.now_ms.load(Ordering::SeqCst)
        }
    }

    enum Outcome {
        Body(Option<String>),
        Error(String),
    }

    /// Transport replaying queued outcomes and recording requested URLs.
    #[derive(Default)]
    pub struct MockTransport {
        outcomes: Mutex<VecDeque<Outcome>>,
        requests: Mutex<Vec<(String, bool)>>,
    }

    impl MockTransport {
        pub fn push_body(&self, body: &str) {
            self.push(Outcome::Body(Some(body.to_string())));
        }

        pub fn push_empty(&self) {
            self.push(Outcome::Body(None));
        }

        pub fn push_error(&self, message: &str) {
            self.push(Outcome::Error(message.to_string()));
        }

        pub fn requested_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("requests lock")
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }

        pub fn credentials_flags(&self) -> Vec<bool> {
            self.requests
                .lock()
                .expect("requests lock")
                .iter()
                .map(|(_, with_credentials)| *with_credentials)
                .collect()
        }

        fn push(&self, outcome: Outcome) {
            self.outcomes
                .lock()
                .expect("outcomes lock")
                .push_back(outcome);
        }
    }

    #[async_trait(?Send)]
    impl IdentityTransport for MockTransport {
        async fn get(
            &self,
            url: &Url,
            with_credentials: bool,
        ) -> Result<Option<String>, Report<AdplusError>> {
            self.requests
                .lock()
                .expect("requests lock")
                .push((url.to_string(), with_credentials));

            let outcome = self.outcomes.lock().expect("outcomes lock").pop_front();
            match outcome {
                Some(Outcome::Body(body)) => Ok(body),
                Some(Outcome::Error(message)) => {
                    Err(Report::new(AdplusError::Transport { message }))
                }
                None => Err(Report::new(AdplusError::Transport {
                    message: "no response queued".to_string(),
                })),
            }
        }
    }
}
