//! Batched image resolution with a session cache.
//!
//! Listing pages reference display images by item code; the image
//! service resolves codes to URLs one at a time. The batcher fans a
//! page's worth of codes out with bounded concurrency, absorbs
//! individual failures into placeholders, and caches answers for the
//! session so revisits render instantly.

use crate::error::FetchError;
use crate::policy::Upstream;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vitrine_catalog::product::Product;

/// The image service surface.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Resolve one item code.
    ///
    /// `Ok(Some(url))` is a renderable image, `Ok(None)` means the item
    /// cleanly has no image, `Err` is an upstream fault.
    async fn resolve(&self, item_code: &str) -> Result<Option<String>, FetchError>;
}

/// Batcher configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// In-flight lookups per batch.
    pub concurrency: usize,
    /// Feature switch; a disabled batcher renders placeholders only.
    pub enabled: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: Upstream::Images.default_concurrency(),
            enabled: true,
        }
    }
}

impl BatchConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Progress of the current batch, shared with whoever renders a
/// loading indicator.
#[derive(Debug, Default)]
pub struct BatchProgress {
    total: AtomicUsize,
    completed: AtomicUsize,
}

impl BatchProgress {
    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
    }

    fn mark_complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Completion percentage, 0 through 100. An empty batch is done.
    pub fn percent(&self) -> u8 {
        let total = self.total();
        if total == 0 {
            return 100;
        }
        ((self.completed() * 100 / total).min(100)) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total()
    }
}

/// Resolution result for one item code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStatus {
    /// The code this status answers for.
    pub item_code: String,
    /// Renderable URL, when one exists.
    pub url: Option<String>,
}

impl ImageStatus {
    /// Whether there is an image to render. False covers both a clean
    /// no-image answer and an absorbed lookup failure.
    pub fn has_image(&self) -> bool {
        self.url.is_some()
    }
}

/// Counts for one finished batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Unique codes the batch answered for, cache hits included.
    pub total: usize,
    /// Codes actually sent to the image service.
    pub dispatched: usize,
    /// Codes that ended with a renderable URL.
    pub successful: usize,
    /// Dispatched lookups that failed upstream.
    pub failed: usize,
    /// Wall time the batch took.
    pub duration: Duration,
}

/// One finished batch: per-code statuses plus the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Statuses in first-seen code order.
    pub statuses: Vec<ImageStatus>,
    pub summary: BatchSummary,
}

impl BatchOutcome {
    /// The status for one code.
    pub fn status_for(&self, item_code: &str) -> Option<&ImageStatus> {
        self.statuses.iter().find(|s| s.item_code == item_code)
    }

    /// A batch is an error only when every code in it failed and
    /// nothing rendered at all; individual failures are placeholders.
    pub fn is_error(&self) -> bool {
        self.summary.total > 0 && self.summary.failed == self.summary.total
    }
}

/// Batches item-code lookups against an image service.
pub struct ImageBatcher<S> {
    source: S,
    config: BatchConfig,
    progress: Arc<BatchProgress>,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl<S: ImageSource> ImageBatcher<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, BatchConfig::default())
    }

    pub fn with_config(source: S, config: BatchConfig) -> Self {
        Self {
            source,
            config,
            progress: Arc::new(BatchProgress::default()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A handle onto the current batch's progress.
    pub fn progress(&self) -> Arc<BatchProgress> {
        Arc::clone(&self.progress)
    }

    /// Resolve a page's worth of item codes.
    ///
    /// Codes are deduplicated; cached answers (including clean
    /// no-image answers) are served without a dispatch; failures
    /// become placeholder statuses and are not cached, so the next
    /// batch retries them.
    pub async fn resolve_batch(&self, item_codes: &[String]) -> BatchOutcome {
        let started = Instant::now();

        let mut unique: Vec<String> = Vec::new();
        for code in item_codes {
            let code = code.trim();
            if code.is_empty() || unique.iter().any(|c| c == code) {
                continue;
            }
            unique.push(code.to_string());
        }
        let total = unique.len();

        if !self.config.enabled {
            self.progress.reset(0);
            let statuses = unique
                .into_iter()
                .map(|item_code| ImageStatus {
                    item_code,
                    url: None,
                })
                .collect();
            return BatchOutcome {
                statuses,
                summary: BatchSummary {
                    total,
                    dispatched: 0,
                    successful: 0,
                    failed: 0,
                    duration: started.elapsed(),
                },
            };
        }

        self.progress.reset(total);

        let mut slots: Vec<Option<ImageStatus>> = vec![None; total];
        let mut jobs: Vec<(usize, String)> = Vec::new();
        for (idx, code) in unique.iter().enumerate() {
            if let Some(url) = self.cache_get(code) {
                slots[idx] = Some(ImageStatus {
                    item_code: code.clone(),
                    url,
                });
                self.progress.mark_complete();
            } else {
                jobs.push((idx, code.clone()));
            }
        }

        let dispatched = jobs.len();
        debug!(total, dispatched, "resolving image batch");

        let results: Vec<(usize, String, Result<Option<String>, FetchError>)> =
            stream::iter(jobs)
                .map(|(idx, code)| {
                    let source = &self.source;
                    let progress = &self.progress;
                    async move {
                        let outcome = source.resolve(&code).await;
                        progress.mark_complete();
                        (idx, code, outcome)
                    }
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

        let mut failed = 0usize;
        for (idx, item_code, outcome) in results {
            let url = match outcome {
                Ok(url) => {
                    self.cache_put(item_code.clone(), url.clone());
                    url
                }
                Err(err) => {
                    warn!(%err, item_code = %item_code, "image lookup failed");
                    failed += 1;
                    None
                }
            };
            slots[idx] = Some(ImageStatus { item_code, url });
        }

        let statuses: Vec<ImageStatus> = slots.into_iter().flatten().collect();
        let successful = statuses.iter().filter(|s| s.has_image()).count();

        BatchOutcome {
            statuses,
            summary: BatchSummary {
                total,
                dispatched,
                successful,
                failed,
                duration: started.elapsed(),
            },
        }
    }

    fn cache_get(&self, code: &str) -> Option<Option<String>> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(code).cloned())
    }

    fn cache_put(&self, code: String, url: Option<String>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(code, url);
        }
    }
}

/// Whether a product image reference is an item code still needing
/// resolution, as opposed to a renderable URL.
pub fn needs_resolution(raw: &str) -> bool {
    let trimmed = raw.trim();
    !(trimmed.contains("://") || trimmed.starts_with("//") || trimmed.starts_with('/'))
}

/// Item codes to resolve for a listing of products.
pub fn pending_codes(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .filter_map(|p| p.image.as_deref())
        .filter(|raw| needs_resolution(raw))
        .map(str::to_string)
        .collect()
}

/// In-memory image service for demos and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: HashMap<String, String>,
    failing: HashSet<String>,
    latency: Option<Duration>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, code: impl Into<String>, url: impl Into<String>) -> Self {
        self.images.insert(code.into(), url.into());
        self
    }

    /// Make lookups for this code fail upstream.
    pub fn with_failure(mut self, code: impl Into<String>) -> Self {
        self.failing.insert(code.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl ImageSource for MemoryImageSource {
    async fn resolve(&self, item_code: &str) -> Result<Option<String>, FetchError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.contains(item_code) {
            return Err(FetchError::Upstream { status: 502 });
        }
        Ok(self.images.get(item_code).cloned())
    }
}
