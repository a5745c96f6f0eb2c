//! # brrtcore
//!
//! **brrtcore** is the request-processing core of a coroutine-powered HTTP framework:
//! it builds a cancellable context for every request, runs the resolved handler chain
//! against it, guarantees cleanup on every exit path, and recycles contexts across
//! requests without leaking a previous request's cancellation tree.
//!
//! ## Architecture
//!
//! - **[`cancel`]** - cancellation tree: done-signal, error slot, child propagation
//! - **[`chain`]** - handler chains, the cursor that walks them, deferred finalizers
//! - **[`context`]** - the per-request context handlers work with
//! - **[`pool`]** - reuse pool handing out freshly reset contexts
//! - **[`dispatcher`]** - per-request entry point: resolve, bind, run, recycle
//! - **[`router`]** - route resolver boundary and a pattern router
//! - **[`response`]** - response handle wrapping the HTTP stack's sink
//! - **[`extension`]** - name-keyed capabilities invoked through the context
//! - **[`env`]** - application environment: modes, config store, sessions, hooks
//! - **[`session`]** - session store boundary and an in-memory provider
//! - **[`middleware`]** - logging, panic recovery, metrics and bearer auth handlers
//! - **[`runtime_config`]** / **[`otel`]** - `BRRTR_*` configuration and logging setup
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Stack as HTTP stack
//!     participant D as Dispatcher
//!     participant R as RouteResolver
//!     participant P as ContextPool
//!     participant C as Context
//!
//!     Stack->>D: handle(request, sink)
//!     D->>R: resolve(method, path)
//!     R-->>D: RouteMatch { chain, path_params }
//!     D->>P: acquire()
//!     P-->>D: Context
//!     D->>C: reset(request, writer, chain)
//!     D->>C: run()
//!     C->>C: next() ... handlers ... finalizers
//!     C->>C: release → cancel()
//!     D->>P: release(context)
//!     D-->>Stack: Served { status, sink }
//! ```
//!
//! ## Example
//!
//! ```rust
//! use brrtcore::chain::handler;
//! use brrtcore::dispatcher::Dispatcher;
//! use brrtcore::env::Env;
//! use brrtcore::middleware::{bearer_auth, logging};
//! use brrtcore::response::BufferedResponse;
//! use brrtcore::router::Router;
//! use http::{Method, Request, StatusCode};
//! use std::sync::Arc;
//!
//! let mut router = Router::new();
//! router
//!     .add(
//!         Method::GET,
//!         "/pets/{id}",
//!         vec![
//!             logging(),
//!             bearer_auth("secret"),
//!             handler(|ctx| {
//!                 let id = ctx.param("id").unwrap_or_default().to_string();
//!                 let _ = ctx.serve_plain(StatusCode::OK, &id);
//!             }),
//!         ],
//!     )
//!     .expect("valid pattern");
//!
//! let dispatcher = Dispatcher::new(router, Arc::new(Env::new()));
//! let sink = BufferedResponse::new();
//! let request = Request::get("/pets/7")
//!     .header("authorization", "Bearer secret")
//!     .body(Vec::new())
//!     .expect("request");
//!
//! let served = dispatcher.handle(request, Box::new(sink.clone()));
//! assert_eq!(served.status, StatusCode::OK);
//! assert_eq!(sink.body_text(), "7");
//! ```

pub mod cancel;
pub mod chain;
pub mod context;
pub mod dispatcher;
pub mod env;
pub mod extension;
pub mod ids;
pub mod middleware;
pub mod otel;
pub mod pool;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod session;

pub use cancel::{CancelError, CancelNode, DoneSignal};
pub use chain::{chain, handler, Chain, Handler};
pub use context::Context;
pub use dispatcher::{Dispatcher, Served};
pub use env::Env;
pub use extension::{Capability, CapabilityError};
pub use response::{BufferedResponse, ResponseSink, ResponseWriter};
pub use router::{RouteMatch, RouteResolver, Router};
