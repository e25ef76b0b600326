//! End-to-end upstream flows: listing with batched images, and policy
//! wrapping over an unreliable backend.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use vitrine_catalog::prelude::*;
use vitrine_data::{
    pending_codes, BackoffStrategy, BatchConfig, CatalogApi, FetchError, FetchPolicy,
    ImageBatcher, MemoryCatalog, MemoryImageSource, PolicyCatalog, ProductQuery, RetryPolicy,
    StockQuery, StockRecord,
};

fn usd(cents: i64) -> Money {
    Money::new(cents, Currency::USD)
}

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_product(Product::new("TEE", "T-Shirt", usd(1900)).with_image("ITEM-TEE"))
        .with_product(Product::new("MUG", "Coffee Mug", usd(900)).with_image("ITEM-MUG"))
        .with_product(
            Product::new("CAP", "Baseball Cap", usd(1500))
                .with_image("https://cdn.example.com/cap.jpg"),
        )
}

#[tokio::test]
async fn test_listing_resolves_images_in_one_batch() {
    let catalog = catalog();
    let batcher = ImageBatcher::new(
        MemoryImageSource::new()
            .with_image("ITEM-TEE", "https://cdn.example.com/tee.jpg")
            .with_image("ITEM-MUG", "https://cdn.example.com/mug.jpg"),
    );

    let listing = catalog
        .list_products(&ProductQuery::default())
        .await
        .unwrap();

    // Only item codes go to the image service; the cap already has a
    // renderable URL.
    let codes = pending_codes(&listing);
    assert_eq!(codes.len(), 2);

    let outcome = batcher.resolve_batch(&codes).await;
    assert_eq!(outcome.summary.total, 2);
    assert_eq!(outcome.summary.successful, 2);
    assert_eq!(
        outcome.status_for("ITEM-TEE").unwrap().url.as_deref(),
        Some("https://cdn.example.com/tee.jpg")
    );

    // A revisit within the session is answered from cache.
    let revisit = batcher.resolve_batch(&codes).await;
    assert_eq!(revisit.summary.dispatched, 0);
    assert_eq!(revisit.summary.successful, 2);
}

#[tokio::test]
async fn test_tight_concurrency_still_answers_every_code() {
    let source = MemoryImageSource::new()
        .with_image("ITEM-1", "https://cdn.example.com/1.jpg")
        .with_image("ITEM-2", "https://cdn.example.com/2.jpg")
        .with_image("ITEM-3", "https://cdn.example.com/3.jpg")
        .with_image("ITEM-4", "https://cdn.example.com/4.jpg")
        .with_image("ITEM-5", "https://cdn.example.com/5.jpg");
    let batcher = ImageBatcher::with_config(source, BatchConfig::default().with_concurrency(2));

    let codes: Vec<String> = (1..=5).map(|n| format!("ITEM-{n}")).collect();
    let outcome = batcher.resolve_batch(&codes).await;

    assert_eq!(outcome.summary.total, 5);
    assert_eq!(outcome.summary.successful, 5);
    assert!(batcher.progress().is_complete());
}

/// Backend whose first few calls fail with a server error.
struct FlakyCatalog {
    inner: MemoryCatalog,
    failures_left: AtomicU32,
}

impl FlakyCatalog {
    fn new(inner: MemoryCatalog, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
        }
    }

    fn trip(&self) -> Result<(), FetchError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(FetchError::Upstream { status: 503 });
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogApi for FlakyCatalog {
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, FetchError> {
        self.trip()?;
        self.inner.list_products(query).await
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, FetchError> {
        self.trip()?;
        self.inner.get_product(id).await
    }

    async fn search_products(&self, term: &str, limit: usize) -> Result<Vec<Product>, FetchError> {
        self.trip()?;
        self.inner.search_products(term, limit).await
    }

    async fn get_categories(&self) -> Result<Vec<Category>, FetchError> {
        self.trip()?;
        self.inner.get_categories().await
    }

    async fn get_stock_balance(&self, query: &StockQuery) -> Result<Vec<StockRecord>, FetchError> {
        self.trip()?;
        self.inner.get_stock_balance(query).await
    }
}

#[tokio::test]
async fn test_policy_rides_out_transient_failures() {
    let flaky = FlakyCatalog::new(catalog(), 2);
    let wrapped = PolicyCatalog::new(flaky).with_fetch_policy(FetchPolicy::new(
        Duration::from_millis(500),
        RetryPolicy::new(2).with_backoff(BackoffStrategy::None),
    ));

    let listing = wrapped
        .list_products(&ProductQuery::default())
        .await
        .unwrap();
    assert_eq!(listing.len(), 3);
}

#[tokio::test]
async fn test_exhausted_retry_budget_surfaces_the_error() {
    let flaky = FlakyCatalog::new(catalog(), 3);
    let wrapped = PolicyCatalog::new(flaky).with_fetch_policy(FetchPolicy::new(
        Duration::from_millis(500),
        RetryPolicy::new(1).with_backoff(BackoffStrategy::None),
    ));

    let result = wrapped.list_products(&ProductQuery::default()).await;
    assert!(matches!(result, Err(FetchError::Upstream { status: 503 })));
}
