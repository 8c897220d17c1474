//! Waiting for client-rendered listing content.

use crate::session::{BrowsingSession, SessionError};
use shared::config::ReadinessConfig;
use std::time::Duration;
use tracing::debug;

/// How the scanner waits for a listing to render after a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Wait a fixed delay
    Fixed(Duration),
    /// Query `selector` until it matches, at most `timeout / interval` times
    Poll {
        selector: String,
        interval: Duration,
        timeout: Duration,
    },
}

impl Readiness {
    /// Build from configuration, polling for `item_selector` in poll mode
    pub fn from_config(config: &ReadinessConfig, item_selector: &str) -> Self {
        match *config {
            ReadinessConfig::Fixed { delay_ms } => Readiness::Fixed(Duration::from_millis(delay_ms)),
            ReadinessConfig::Poll {
                interval_ms,
                timeout_ms,
            } => Readiness::Poll {
                selector: item_selector.to_string(),
                interval: Duration::from_millis(interval_ms.max(1)),
                timeout: Duration::from_millis(timeout_ms),
            },
        }
    }

    /// Wait until the current page is ready
    ///
    /// Running out of poll attempts is not an error: a category without items
    /// never renders any.
    pub async fn settle<S: BrowsingSession>(&self, session: &S) -> Result<(), SessionError> {
        match self {
            Readiness::Fixed(delay) => {
                session.wait_for(*delay).await;
                Ok(())
            }
            Readiness::Poll {
                selector,
                interval,
                timeout,
            } => {
                let attempts = (timeout.as_millis() / interval.as_millis().max(1)).max(1) as u64;

                for attempt in 1..=attempts {
                    if !session.query_all(selector).await?.is_empty() {
                        debug!(attempt, selector = %selector, "Listing rendered");
                        return Ok(());
                    }
                    if attempt < attempts {
                        session.wait_for(*interval).await;
                    }
                }

                debug!(
                    selector = %selector,
                    timeout_ms = timeout.as_millis() as u64,
                    "Listing still empty after polling"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixture::{listing_page, FixtureSession};

    const URL: &str = "https://shop.test/users/konto/biblioteka/ebooki?onPage=100";

    fn poll(interval_ms: u64, timeout_ms: u64) -> Readiness {
        Readiness::from_config(
            &ReadinessConfig::Poll {
                interval_ms,
                timeout_ms,
            },
            "ul#listBooks li",
        )
    }

    #[tokio::test]
    async fn test_fixed_waits_once() {
        let mut session = FixtureSession::new().with_page(URL, "<html></html>");
        session.goto(URL).await.unwrap();

        let readiness = Readiness::from_config(&ReadinessConfig::Fixed { delay_ms: 2000 }, "li");
        readiness.settle(&session).await.unwrap();

        assert_eq!(session.waits(), vec![Duration::from_millis(2000)]);
    }

    #[tokio::test]
    async fn test_poll_stops_when_items_render() {
        let page = listing_page(&[(Some("Autor"), Some("Tytuł"))], &[]);
        let mut session = FixtureSession::new().with_delayed_page(URL, page, 2);
        session.goto(URL).await.unwrap();

        poll(250, 5000).settle(&session).await.unwrap();

        assert_eq!(session.waits().len(), 2);
    }

    #[tokio::test]
    async fn test_poll_gives_up_on_empty_listing() {
        let mut session = FixtureSession::new().with_page(URL, listing_page(&[], &[]));
        session.goto(URL).await.unwrap();

        poll(250, 1000).settle(&session).await.unwrap();

        // four attempts, three pauses between them
        assert_eq!(session.waits(), vec![Duration::from_millis(250); 3]);
    }
}
