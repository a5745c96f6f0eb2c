//! # Context Module
//!
//! The request context: the unit handler code works with.
//!
//! ## Lifecycle
//!
//! ```text
//! acquire (pool) ─► reset ─► run ─► chain ─► finalizers ─► recycle ─► release (pool)
//!                                     │
//!                                     ├─ next()      run everything downstream
//!                                     ├─ restart()   rerun with a different chain
//!                                     ├─ defer()     queue cleanup
//!                                     ├─ replicate() child scope for a sub-task
//!                                     └─ cancel()    record status, fire done-signal
//! ```
//!
//! [`Context::reset`] overwrites everything a previous request left behind: a new
//! root cancellation node, an empty finalizer list, a cursor rewound onto the new
//! chain, and fresh response, session and data bag handles. A straggling replica of
//! the previous request therefore cannot observe or affect the next one.
//!
//! ## Panics
//!
//! [`Context::run`] catches a handler panic only long enough to run the finalizers,
//! then resumes unwinding. Converting a panic into a response is the job of
//! [`middleware::recover`](crate::middleware::recover).

mod core;
mod data;

pub use core::{Context, ContextState};
pub(crate) use core::panic_message;
pub use data::DataBag;
