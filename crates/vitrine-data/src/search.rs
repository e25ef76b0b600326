//! Debounced search-as-you-type with stale-result discard.

use crate::api::CatalogApi;
use crate::error::FetchError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use vitrine_catalog::product::Product;

/// Quiet period a query waits out before dispatch.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// One edition of the search view. Tokens from earlier editions are
/// stale the moment a newer one begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewToken(u64);

/// Debounces keystrokes into catalog search queries.
///
/// Each keystroke calls [`SearchDebouncer::begin`] and then runs its
/// edition. A run that finds itself superseded, whether still in its
/// quiet period or already holding results, yields `Ok(None)` and the
/// caller keeps whatever it currently shows. Results are therefore
/// applied in edition order no matter how responses interleave.
pub struct SearchDebouncer<A> {
    api: A,
    delay: Duration,
    epoch: AtomicU64,
}

impl<A: CatalogApi> SearchDebouncer<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            delay: DEFAULT_DEBOUNCE,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Begin a new edition, superseding all earlier ones.
    pub fn begin(&self) -> ViewToken {
        ViewToken(self.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn superseded(&self, token: ViewToken) -> bool {
        self.epoch.load(Ordering::SeqCst) != token.0
    }

    /// Run one edition to completion.
    ///
    /// `Ok(Some(products))` is a live answer, `Ok(None)` means the
    /// edition went stale and produced nothing to apply.
    pub async fn run(
        &self,
        token: ViewToken,
        term: &str,
        limit: usize,
    ) -> Result<Option<Vec<Product>>, FetchError> {
        if self.superseded(token) {
            return Ok(None);
        }

        let term = term.trim();
        if term.is_empty() {
            // Clearing the box clears results without a round trip.
            return Ok(Some(Vec::new()));
        }

        tokio::time::sleep(self.delay).await;
        if self.superseded(token) {
            debug!(term, "query superseded during quiet period");
            return Ok(None);
        }

        let results = self.api.search_products(term, limit).await;
        if self.superseded(token) {
            debug!(term, "stale results discarded");
            return Ok(None);
        }

        results.map(Some)
    }
}
