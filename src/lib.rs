//! # Taskboard
//!
//! A REST backend for projects and tasks built on Axum, featuring:
//!
//! - **Security**: Bearer JWT validation against a remote RSA key set,
//!   per-client rate limiting, allow-list CORS
//! - **Resilience**: Panic recovery, request timeouts, graceful shutdown
//! - **Observability**: Structured access logs, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline (Recovery → Rate Limit → CORS → Access Log → Auth)│
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, projects, tasks, docs)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Services (ProjectService, TaskService)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Repositories (in-memory document store)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskboard::storage::Repositories;
//! use taskboard::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config, Repositories::in_memory())?;
//!     let app = build_router(state);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Security Configuration
//!
//! Enable bearer authentication:
//! ```bash
//! AUTH_ENABLED=true AUTH_JWKS_URL=https://id.example.com/certs cargo run
//! ```
//!
//! Tune rate limiting:
//! ```bash
//! RATE_LIMIT_RPS=100 RATE_LIMIT_BURST=50 cargo run
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use pipeline::{Pipeline, Stage};
pub use routes::build_router;
pub use state::AppState;
