//! Fetch policies: per-upstream timeouts, retries, and backoff.

use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Well-known upstream categories.
///
/// Each upstream carries default timeouts, retry counts, and
/// concurrency limits reflecting how critical it is to a page view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    /// Product and category reads.
    Catalog,
    /// Warehouse stock balances.
    Stock,
    /// Display image lookups.
    Images,
    /// Search-as-you-type queries.
    Search,
    /// Custom upstream with a name.
    Custom(&'static str),
}

impl Upstream {
    /// Default total deadline for one call to this upstream.
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Catalog => Duration::from_millis(800),
            Self::Stock => Duration::from_millis(400),
            Self::Images => Duration::from_millis(1200),
            Self::Search => Duration::from_millis(600),
            Self::Custom(_) => Duration::from_millis(500),
        }
    }

    /// Default retry budget for this upstream.
    pub fn default_max_retries(&self) -> u32 {
        match self {
            // Purchase-blocking reads get a second chance.
            Self::Catalog | Self::Stock => 2,
            // Decorative or superseded-anyway work is not retried.
            Self::Images | Self::Search => 0,
            Self::Custom(_) => 1,
        }
    }

    /// Default number of in-flight calls to this upstream.
    pub fn default_concurrency(&self) -> usize {
        match self {
            Self::Images => 6,
            Self::Search => 1,
            _ => 4,
        }
    }

    /// Whether a page view blocks on this upstream.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Catalog | Self::Stock)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Catalog => "catalog",
            Self::Stock => "stock",
            Self::Images => "images",
            Self::Search => "search",
            Self::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff with base and max.
    Exponential {
        /// Initial delay.
        base: Duration,
        /// Maximum delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::Exponential { base, max } => {
                let multiplier = 2u64.saturating_pow(attempt);
                let delay =
                    Duration::from_millis((base.as_millis() as u64).saturating_mul(multiplier));
                delay.min(*max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(50),
            max: Duration::from_millis(500),
        }
    }
}

/// Retry policy for fetch operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try.
    pub max_attempts: u32,
    /// Backoff strategy between attempts.
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::default(),
        }
    }

    /// Create a policy with no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: BackoffStrategy::None,
        }
    }

    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Whether a failed attempt should be retried.
    pub fn should_retry(&self, err: &FetchError, attempt: u32) -> bool {
        attempt < self.max_attempts && err.is_retryable()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Fetch policy combining a total deadline with a retry policy.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Deadline for one attempt.
    pub timeout: Duration,
    /// Retry policy across attempts.
    pub retry: RetryPolicy,
}

impl FetchPolicy {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    /// Policy from an upstream's defaults.
    pub fn for_upstream(upstream: Upstream) -> Self {
        Self {
            timeout: upstream.default_timeout(),
            retry: RetryPolicy::new(upstream.default_max_retries()),
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }
}

/// Run one fetch under a policy: each attempt gets the full deadline,
/// and retryable failures are re-attempted with backoff until the
/// retry budget runs out.
pub async fn with_policy<T, F, Fut>(policy: &FetchPolicy, mut call: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(policy.timeout)),
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if policy.retry.should_retry(&err, attempt) => {
                let delay = policy.retry.backoff.delay_for_attempt(attempt);
                debug!(%err, attempt, ?delay, "retrying fetch");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff() {
        let strategy = BackoffStrategy::Exponential {
            base: Duration::from_millis(50),
            max: Duration::from_millis(500),
        };
        assert_eq!(strategy.delay_for_attempt(0), Duration::from_millis(50));
        assert_eq!(strategy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(strategy.delay_for_attempt(2), Duration::from_millis(200));
        // Capped at max.
        assert_eq!(strategy.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_retry_budget_and_classification() {
        let policy = RetryPolicy::new(2);
        let transient = FetchError::Upstream { status: 503 };
        let permanent = FetchError::NotFound("p-1".to_string());

        assert!(policy.should_retry(&transient, 0));
        assert!(policy.should_retry(&transient, 1));
        assert!(!policy.should_retry(&transient, 2));
        assert!(!policy.should_retry(&permanent, 0));
    }

    #[test]
    fn test_upstream_defaults() {
        assert_eq!(Upstream::Images.default_concurrency(), 6);
        assert_eq!(Upstream::Images.default_max_retries(), 0);
        assert!(Upstream::Catalog.is_critical());
        assert!(!Upstream::Images.is_critical());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_policy_retries_transient_failures() {
        let policy = FetchPolicy::new(
            Duration::from_millis(500),
            RetryPolicy::new(2).with_backoff(BackoffStrategy::None),
        );
        let attempts = AtomicU32::new(0);

        let result = with_policy(&policy, || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FetchError::Upstream { status: 503 })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_policy_gives_up_on_permanent_failures() {
        let policy = FetchPolicy::new(Duration::from_millis(500), RetryPolicy::new(3));
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = with_policy(&policy, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::NotFound("p-1".to_string()))
        })
        .await;

        assert!(matches!(result, Err(FetchError::NotFound(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_policy_times_out_slow_calls() {
        let policy = FetchPolicy::new(Duration::from_millis(100), RetryPolicy::none());

        let result: Result<(), _> = with_policy(&policy, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(FetchError::Timeout(_))));
    }
}
