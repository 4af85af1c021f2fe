//! Per-client rate limiting using the token bucket algorithm.
//!
//! # Algorithm
//!
//! Each client key gets its own Governor direct limiter (GCRA, equivalent to
//! a token bucket with capacity `burst` refilled at `rps` tokens per second).
//! Buckets are independent: exhausting one never affects another.
//!
//! # Client Map
//!
//! ```text
//! RwLock<HashMap<client key, Arc<ClientBucket>>>
//!   read lock  ─► hit ─► check bucket (lock-free)
//!   miss ─► write lock ─► re-check ─► insert (evict first if at capacity)
//! ```
//!
//! The map is bounded. Each bucket records when it was last seen; a
//! background sweep drops buckets idle for longer than the configured TTL,
//! and inserting at capacity first sweeps idle buckets, then evicts the
//! least recently seen one.
//!
//! # Response Headers
//!
//! On rate limit exceeded (429):
//! - `Retry-After`: Seconds until the next request will be accepted
//! - `X-RateLimit-Limit`: Configured RPS limit
//! - `X-RateLimit-Remaining`: Always `0`

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::RwLock;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::client_key;
use crate::error::ErrorResponse;
use crate::metrics;

/// Body of the 429 response.
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Default cap on tracked clients.
pub const DEFAULT_MAX_CLIENTS: usize = 10_000;

/// Default idle time after which a client bucket may be swept.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(600);

/// At capacity, 1/64th of the cap (at least one entry) is evicted at once.
const CAPACITY_EVICTION_DIVISOR: usize = 64;

/// Error type for rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// RPS value cannot be zero.
    ZeroRps,
    /// The client map needs room for at least one entry.
    ZeroCapacity,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::ZeroRps => {
                write!(f, "RPS must be greater than 0; disable rate limiting instead")
            }
            RateLimitError::ZeroCapacity => write!(f, "max clients must be greater than 0"),
        }
    }
}

impl std::error::Error for RateLimitError {}

/// One client's bucket plus its last-seen time.
struct ClientBucket {
    limiter: DefaultDirectRateLimiter,
    /// Milliseconds since the owning limiter's epoch
    last_seen_ms: AtomicU64,
}

impl ClientBucket {
    fn new(quota: Quota, now_ms: u64) -> Self {
        Self {
            limiter: RateLimiter::direct(quota),
            last_seen_ms: AtomicU64::new(now_ms),
        }
    }

    fn touch(&self, now_ms: u64) {
        self.last_seen_ms.store(now_ms, Ordering::Relaxed);
    }

    fn last_seen(&self) -> u64 {
        self.last_seen_ms.load(Ordering::Relaxed)
    }
}

/// Bounded map of per-client token buckets.
pub struct ClientRateLimiter {
    quota: Quota,
    rps: u32,
    clients: RwLock<HashMap<String, Arc<ClientBucket>>>,
    max_clients: usize,
    idle_ttl: Duration,
    epoch: Instant,
}

impl ClientRateLimiter {
    /// Create a limiter with default bounds.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroRps` if `rps` is 0.
    pub fn new(rps: u32, burst: u32) -> Result<Self, RateLimitError> {
        Self::with_bounds(rps, burst, DEFAULT_MAX_CLIENTS, DEFAULT_IDLE_TTL)
    }

    /// Create a limiter with an explicit client cap and idle TTL.
    ///
    /// A `burst` of 0 is treated as 1.
    pub fn with_bounds(
        rps: u32,
        burst: u32,
        max_clients: usize,
        idle_ttl: Duration,
    ) -> Result<Self, RateLimitError> {
        let rps_nonzero = NonZeroU32::new(rps).ok_or(RateLimitError::ZeroRps)?;
        if max_clients == 0 {
            return Err(RateLimitError::ZeroCapacity);
        }

        const MIN_BURST: NonZeroU32 = NonZeroU32::MIN;
        let burst_nonzero = NonZeroU32::new(burst).unwrap_or(MIN_BURST);

        Ok(Self {
            quota: Quota::per_second(rps_nonzero).allow_burst(burst_nonzero),
            rps,
            clients: RwLock::new(HashMap::new()),
            max_clients,
            idle_ttl,
            epoch: Instant::now(),
        })
    }

    /// Configured sustained rate.
    pub fn limit(&self) -> u32 {
        self.rps
    }

    /// Admit or reject one request for `key`.
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).is_ok()
    }

    /// Like [`allow`](Self::allow), returning the wait time on rejection.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let now = self.now_ms();
        let bucket = self.bucket(key, now);

        bucket
            .limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
    }

    /// Number of client buckets currently held.
    pub fn tracked_clients(&self) -> usize {
        self.clients.read().len()
    }

    /// Drop buckets idle for at least the configured TTL.
    ///
    /// Returns how many were removed.
    pub fn sweep_idle(&self) -> usize {
        let now = self.now_ms();
        let mut clients = self.clients.write();
        let removed = self.evict_idle(&mut clients, now);
        metrics::set_rate_limit_clients(clients.len());
        removed
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Look up or create the bucket for `key`, marking it seen at `now`.
    ///
    /// The touch happens while the map lock is held, so a sweep (which needs
    /// the write lock) never drops a bucket between lookup and use.
    fn bucket(&self, key: &str, now: u64) -> Arc<ClientBucket> {
        if let Some(bucket) = self.clients.read().get(key) {
            bucket.touch(now);
            return bucket.clone();
        }

        let mut clients = self.clients.write();
        // Another request may have inserted while we waited for the write lock
        if let Some(bucket) = clients.get(key) {
            bucket.touch(now);
            return bucket.clone();
        }

        if clients.len() >= self.max_clients {
            self.make_room(&mut clients, now);
        }

        let bucket = Arc::new(ClientBucket::new(self.quota, now));
        clients.insert(key.to_string(), bucket.clone());
        metrics::set_rate_limit_clients(clients.len());
        bucket
    }

    fn make_room(&self, clients: &mut HashMap<String, Arc<ClientBucket>>, now: u64) {
        if self.evict_idle(clients, now) > 0 && clients.len() < self.max_clients {
            return;
        }

        // Finding the oldest entries is a full scan, so free a batch at once
        // and let the following inserts skip it
        let batch =
            (self.max_clients / CAPACITY_EVICTION_DIVISOR).clamp(1, clients.len().max(1));
        let mut by_age: Vec<(u64, &String)> = clients
            .iter()
            .map(|(key, bucket)| (bucket.last_seen(), key))
            .collect();
        if batch < by_age.len() {
            by_age.select_nth_unstable_by_key(batch - 1, |(seen, _)| *seen);
        }
        let victims: Vec<String> = by_age
            .into_iter()
            .take(batch)
            .map(|(_, key)| key.clone())
            .collect();

        for key in &victims {
            clients.remove(key);
        }
        if !victims.is_empty() {
            metrics::record_rate_limit_evictions("capacity", victims.len());
            debug!(
                evicted = victims.len(),
                "Evicted least recently seen clients at capacity"
            );
        }
    }

    fn evict_idle(&self, clients: &mut HashMap<String, Arc<ClientBucket>>, now: u64) -> usize {
        let ttl_ms = u64::try_from(self.idle_ttl.as_millis()).unwrap_or(u64::MAX);
        let before = clients.len();
        clients.retain(|_, bucket| now.saturating_sub(bucket.last_seen()) < ttl_ms);

        let removed = before - clients.len();
        if removed > 0 {
            metrics::record_rate_limit_evictions("idle", removed);
        }
        removed
    }
}

/// Rate limiting layer for Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = Arc::new(ClientRateLimiter::new(10, 20)?);
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(RateLimitLayer::new(limiter));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<ClientRateLimiter>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<ClientRateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<ClientRateLimiter>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();
        let client = client_key(&req).into_owned();

        Box::pin(async move {
            match limiter.check(&client) {
                Ok(()) => inner.call(req).await,
                Err(wait) => {
                    let retry_after = ceil_secs(wait).max(1);

                    warn!(
                        client = %client,
                        path = %req.uri().path(),
                        retry_after_secs = retry_after,
                        "Rate limit exceeded"
                    );
                    metrics::record_rate_limited();

                    Ok(rate_limited_response(limiter.limit(), retry_after))
                }
            }
        })
    }
}

fn ceil_secs(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

fn rate_limited_response(limit: u32, retry_after: u64) -> Response<Body> {
    let mut response =
        ErrorResponse::into_response_with(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE);

    let headers = response.headers_mut();
    headers.insert("retry-after", HeaderValue::from(retry_after));
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    response
}
