//! Shared application state for Axum handlers.
//!
//! This module provides thread-safe, clonable state that is shared across
//! all request handlers. It includes:
//!
//! - **Services**: Project and task operations over the repositories
//! - **Rate Limiter**: Per-client buckets, present when rate limiting is on
//! - **Token Validator**: Bearer validation with its key cache, present when
//!   auth is on
//! - **Configuration**: Runtime configuration access
//!
//! # Structured Concurrency
//!
//! Background tasks (signing key preload, idle client sweep) are managed
//! with `tokio_util::task::TaskTracker` and `CancellationToken`. Call
//! `shutdown()` to stop them before application exit.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::auth::{HttpKeySetSource, KeyCache, KeySetSource, TokenValidator};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::ClientRateLimiter;
use crate::services::{ProjectService, TaskService};
use crate::storage::Repositories;

/// Shared application state for Axum handlers.
///
/// # Lifecycle
///
/// ```rust,ignore
/// let state = AppState::new(config, Repositories::in_memory())?;
/// // ... serve ...
/// state.shutdown().await;  // Wait for background tasks to complete
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Project operations
    pub projects: ProjectService,
    /// Task operations
    pub tasks: TaskService,
    /// Per-client limiter (None = rate limiting disabled)
    pub rate_limiter: Option<Arc<ClientRateLimiter>>,
    /// Bearer token validator (None = auth disabled)
    pub token_validator: Option<Arc<TokenValidator>>,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Tracks spawned background tasks for graceful shutdown
    task_tracker: TaskTracker,
    /// Cancellation token for signaling background tasks to stop
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Create state, fetching signing keys over HTTP when auth is enabled.
    ///
    /// Must be called inside a Tokio runtime: background tasks are spawned
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the rate limiter or key-set client
    /// cannot be built from the configuration.
    pub fn new(config: Config, repos: Repositories) -> AppResult<Self> {
        let source: Option<Arc<dyn KeySetSource>> = if config.auth_enabled {
            let url = config.auth_jwks_url.as_deref().ok_or_else(|| {
                AppError::ConfigError("AUTH_JWKS_URL must be set when AUTH_ENABLED=true".to_string())
            })?;
            let source = HttpKeySetSource::new(url, config.jwks_fetch_timeout)
                .map_err(|e| AppError::ConfigError(format!("key set client: {e}")))?;
            Some(Arc::new(source))
        } else {
            None
        };

        Self::with_key_source(config, repos, source)
    }

    /// Create state with an explicit key-set source.
    ///
    /// Auth is enabled exactly when `key_source` is `Some`, regardless of
    /// `config.auth_enabled`. Tests use this to inject fake key sets.
    pub fn with_key_source(
        config: Config,
        repos: Repositories,
        key_source: Option<Arc<dyn KeySetSource>>,
    ) -> AppResult<Self> {
        let rate_limiter = if config.rate_limiting_enabled() {
            let limiter = ClientRateLimiter::with_bounds(
                config.rate_limit_rps,
                config.rate_limit_burst,
                config.rate_limit_max_clients,
                config.rate_limit_idle_ttl,
            )
            .map_err(|e| AppError::ConfigError(format!("rate limiter: {e}")))?;
            Some(Arc::new(limiter))
        } else {
            None
        };

        let token_validator = key_source.map(|source| {
            let cache = Arc::new(KeyCache::new(source));
            Arc::new(TokenValidator::new(cache, config.auth_issuer.clone()))
        });

        let state = Self {
            config: Arc::new(config),
            projects: ProjectService::new(repos.projects),
            tasks: TaskService::new(repos.tasks),
            rate_limiter,
            token_validator,
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_key_preload_task();
        state.spawn_limiter_sweep_task();

        Ok(state)
    }

    /// Fetch signing keys once at startup so the first request does not pay
    /// for the round trip. Failure only logs; misses refresh again later.
    fn spawn_key_preload_task(&self) {
        let Some(validator) = self.token_validator.clone() else {
            return;
        };
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Key preload cancelled");
                }
                result = validator.key_cache().refresh() => match result {
                    Ok(count) => info!(keys = count, "Signing keys preloaded"),
                    Err(e) => warn!(error = %e, "Signing key preload failed, will retry on demand"),
                },
            }
        });
    }

    /// Periodically drop idle rate-limiter buckets.
    fn spawn_limiter_sweep_task(&self) {
        let Some(limiter) = self.rate_limiter.clone() else {
            return;
        };
        let period = self.config.rate_limit_sweep_interval;
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased; // Check cancellation first

                    _ = cancel.cancelled() => {
                        debug!("Limiter sweep task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = limiter.sweep_idle();
                        trace!(
                            removed,
                            remaining = limiter.tracked_clients(),
                            "Swept idle rate limit clients"
                        );
                    }
                }
            }

            debug!("Limiter sweep task shutting down");
        });
    }

    /// Whether graceful shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Mark the service as shutting down and signal background tasks,
    /// without waiting for them.
    pub fn begin_shutdown(&self) {
        self.cancellation_token.cancel();
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// 1. Signals all tasks to stop via the cancellation token
    /// 2. Closes the task tracker (prevents new tasks)
    /// 3. Waits for all tasks to complete
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
