//! # Pool Module
//!
//! Reuse pool for request contexts.
//!
//! ## Invariants
//!
//! - A context is owned by exactly one request between [`ContextPool::acquire`] and
//!   [`ContextPool::release`]; the pool never hands the same instance out twice.
//! - A context is recycled before it is stored, so what `acquire` returns is
//!   indistinguishable from [`Context::new`](crate::context::Context::new) in cursor
//!   position, finalizer list and cancellation state.
//! - Acquisition never waits for a free instance: an empty pool constructs one.
//!
//! ## Configuration
//!
//! - `BRRTR_CTX_POOL_MAX_IDLE`: idle contexts kept (default: 1024)
//! - `BRRTR_CTX_POOL_PREALLOCATE`: contexts created up front (default: 0)

mod core;
mod metrics;

pub use core::ContextPool;
pub use metrics::PoolMetrics;
