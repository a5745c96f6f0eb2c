//! # Middleware Module
//!
//! Stock chain handlers. Each is an ordinary [`Handler`](crate::chain::Handler) that
//! wraps everything downstream by calling [`Context::next`](crate::context::Context::next).
//!
//! | Handler | Behaviour |
//! |---------|-----------|
//! | [`logging`] | request span, status and latency log |
//! | [`recover`] | converts a downstream panic into a 500 response |
//! | [`Metrics::handler`] | request count, latency and status-class counters |
//! | [`bearer_auth`] | rejects with 401 unless the bearer token matches |
//!
//! Place [`recover`] first so that it also covers the other middleware:
//!
//! ```rust
//! use brrtcore::chain::{chain, handler};
//! use brrtcore::middleware::{logging, recover, Metrics};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(Metrics::new());
//! let handlers = chain([
//!     recover(),
//!     logging(),
//!     metrics.handler(),
//!     handler(|ctx| {
//!         let _ = ctx.serve_plain(http::StatusCode::OK, "ok");
//!     }),
//! ]);
//! assert_eq!(handlers.len(), 4);
//! ```

mod auth;
mod logging;
mod metrics;
mod recover;

pub use auth::bearer_auth;
pub use logging::logging;
pub use metrics::Metrics;
pub use recover::recover;
