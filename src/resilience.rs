//! Page fetching with retry, backoff, jitter, and per-attempt timeouts.
//!
//! Every network call in the pipeline goes through a [`PageSource`]:
//! - [`PageSource`]: Core trait returning the body of a page
//! - [`HttpSource`]: reqwest-backed source resolving paths against the site's base URL
//! - [`Resilient`]: Decorator that adds a [`RetryPolicy`] to any `PageSource`
//!
//! # Retry Strategy
//!
//! The default policy matches the site's tolerance for a single, patient client:
//! - Unbounded retry count
//! - Linear backoff of 5 seconds per attempt, capped at 60 seconds
//! - Random jitter (0-1000ms) added to every delay
//! - Each attempt is cut off after 10 seconds
//!
//! Only transient failures are retried (see [`Error::is_transient`]).

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::error::{Error, Result};

/// Trait for anything that can return the body of a page.
///
/// `url` may be absolute, or a path relative to the source's base URL.
pub trait PageSource {
    async fn get(&self, url: &str) -> Result<String>;
}

/// Shape of the delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `delay * attempt`
    Linear,
    /// `delay * 2^(attempt - 1)`
    Exponential,
}

/// Information handed to the retry observer before each backoff sleep.
#[derive(Debug)]
pub struct RetryAttempt<'a> {
    /// 1-based number of the attempt that just failed.
    pub attempt: usize,
    pub delay: Duration,
    pub error: &'a Error,
}

type RetryObserver = Arc<dyn Fn(&RetryAttempt<'_>) + Send + Sync>;

/// A composable retry policy for asynchronous operations.
#[derive(Clone)]
pub struct RetryPolicy {
    /// `None` retries forever.
    pub max_retries: Option<usize>,
    pub backoff: Backoff,
    pub delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the uniform random jitter added to each delay.
    pub jitter: Duration,
    pub attempt_timeout: Duration,
    on_retry: Option<RetryObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            backoff: Backoff::Linear,
            delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter: Duration::from_millis(1000),
            attempt_timeout: Duration::from_secs(10),
            on_retry: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("delay", &self.delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl RetryPolicy {
    /// Register a hook called before every backoff sleep.
    pub fn on_retry(mut self, hook: impl Fn(&RetryAttempt<'_>) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Delay before the retry following failed attempt number `attempt`, without jitter.
    pub fn base_delay(&self, attempt: usize) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.delay.saturating_mul(attempt.min(u32::MAX as usize) as u32),
            Backoff::Exponential => {
                let shift = (attempt - 1).min(31) as u32;
                self.delay.saturating_mul(1u32 << shift)
            }
        };
        delay.min(self.max_delay)
    }

    fn jittered_delay(&self, attempt: usize) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=jitter_ms)
        };
        self.base_delay(attempt) + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or runs
    /// out of retries. Each attempt is bounded by `attempt_timeout`.
    ///
    /// `label` identifies the operation in logs and timeout errors.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            let outcome = match timeout(self.attempt_timeout, op()).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout {
                    url: label.to_string(),
                    after: self.attempt_timeout,
                }),
            };

            let e = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempt += 1;

            if !e.is_transient() {
                debug!(label, error = %e, "non-transient failure; not retrying");
                return Err(e);
            }

            if self.max_retries.is_some_and(|max| attempt > max) {
                error!(
                    label,
                    attempt,
                    max = ?self.max_retries,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %e,
                    "exhausted retries"
                );
                return Err(e);
            }

            let delay = self.jittered_delay(attempt);
            if let Some(hook) = &self.on_retry {
                hook(&RetryAttempt {
                    attempt,
                    delay,
                    error: &e,
                });
            }
            warn!(
                label,
                attempt,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                ?delay,
                error = %e,
                "attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// Wrapper that adds a [`RetryPolicy`] to any [`PageSource`] implementation.
#[derive(Debug, Clone)]
pub struct Resilient<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: PageSource> Resilient<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<S: PageSource> PageSource for Resilient<S> {
    async fn get(&self, url: &str) -> Result<String> {
        let inner = &self.inner;
        self.policy.run(url, move || inner.get(url)).await
    }
}

/// A [`PageSource`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    pub fn new(base: Url, user_agent: &str) -> Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client, base })
    }
}

impl PageSource for HttpSource {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> Result<String> {
        let target = self.base.join(url)?;
        let response = self.client.get(target.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: target.to_string(),
                status,
            });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: Duration::ZERO,
            attempt_timeout: Duration::from_millis(200),
            ..RetryPolicy::default()
        }
    }

    fn unavailable() -> Error {
        Error::Status {
            url: "/x".into(),
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Fails with HTTP 503 for the first `failures` requests.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl PageSource for Flaky {
        async fn get(&self, url: &str) -> Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(unavailable())
            } else {
                Ok(format!("body of {url}"))
            }
        }
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_secs(5));
        assert_eq!(policy.base_delay(3), Duration::from_secs(15));
        assert_eq!(policy.base_delay(100), Duration::from_secs(60));
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy {
            backoff: Backoff::Exponential,
            delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.base_delay(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay(4), Duration::from_secs(8));
        assert_eq!(policy.base_delay(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let observed = Arc::new(AtomicUsize::new(0));
        let delays = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = observed.clone();
        let seen_delays = delays.clone();
        let policy = fast_policy().on_retry(move |a| {
            seen.store(a.attempt, Ordering::SeqCst);
            seen_delays.lock().unwrap().push(a.delay);
        });

        let calls = &AtomicUsize::new(0);
        let result = policy
            .run("/flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(unavailable())
                } else {
                    Ok("body")
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "body");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(observed.load(Ordering::SeqCst), 3);
        assert_eq!(
            *delays.lock().unwrap(),
            vec![
                Duration::from_millis(1),
                Duration::from_millis(2),
                Duration::from_millis(3)
            ]
        );
    }

    #[tokio::test]
    async fn test_non_transient_is_not_retried() {
        let calls = &AtomicUsize::new(0);
        let result: Result<()> = fast_policy()
            .run("/missing", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Status {
                    url: "/missing".into(),
                    status: reqwest::StatusCode::NOT_FOUND,
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bounded_retries_give_up() {
        let policy = RetryPolicy {
            max_retries: Some(2),
            ..fast_policy()
        };
        let calls = &AtomicUsize::new(0);
        let result: Result<()> = policy
            .run("/down", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(unavailable())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_transient() {
        let policy = RetryPolicy {
            max_retries: Some(1),
            attempt_timeout: Duration::from_millis(10),
            ..fast_policy()
        };
        let calls = &AtomicUsize::new(0);
        let result: Result<()> = policy
            .run("/slow", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resilient_source_retries_inner_source() {
        let source = Resilient::new(
            Flaky {
                failures: 2,
                calls: AtomicUsize::new(0),
            },
            fast_policy(),
        );

        let body = source.get("/subject/").await.unwrap();
        assert_eq!(body, "body of /subject/");
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_resilient_source_passes_through_not_found() {
        let mock = crate::testing::MockSource::new();
        let source = Resilient::new(mock.clone(), fast_policy());

        let err = source.get("/author/0").await.unwrap_err();
        assert!(matches!(err, Error::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND));
        assert_eq!(mock.request_count("/author/0"), 1);
    }
}
