//! Dispatcher core - hot path for request dispatch.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use crate::chain::{chain, handler, Chain, Handler};
use crate::context::{panic_message, Context};
use crate::env::Env;
use crate::pool::{ContextPool, PoolMetrics};
use crate::response::{ResponseSink, ResponseWriter};
use crate::router::{ParamVec, RouteResolver};
use arc_swap::ArcSwap;
use http::{Request, StatusCode};
use may::coroutine::JoinHandle;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const NOT_FOUND_ROUTE: &str = "not_found";

/// Outcome of a dispatched request
pub struct Served {
    /// Status the response was committed with
    pub status: StatusCode,
    /// The sink passed to `handle`, handed back after the run
    pub sink: Option<Box<dyn ResponseSink>>,
}

impl fmt::Debug for Served {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Served")
            .field("status", &self.status)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// Default not-found handler: `404 {"error":"Not Found","path":...}`
#[must_use]
pub fn not_found_handler() -> Handler {
    handler(|ctx: &mut Context| {
        let body = serde_json::json!({ "error": "Not Found", "path": ctx.path() });
        if let Err(e) = ctx.serve_json(StatusCode::NOT_FOUND, &body) {
            warn!(request_id = %ctx.request_id(), error = %e, "Failed to write not-found response");
        }
    })
}

/// Per-request entry point over a route resolver and a context pool.
pub struct Dispatcher {
    resolver: ArcSwap<Box<dyn RouteResolver>>,
    pool: ContextPool,
    not_found: Chain,
    stack_size: usize,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.pool)
            .field("not_found_handlers", &self.not_found.len())
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher with a pool sized from the environment's runtime configuration
    pub fn new<R>(resolver: R, env: Arc<Env>) -> Self
    where
        R: RouteResolver + 'static,
    {
        Self::with_pool(resolver, ContextPool::new(env))
    }

    pub fn with_pool<R>(resolver: R, pool: ContextPool) -> Self
    where
        R: RouteResolver + 'static,
    {
        let stack_size = pool.env().runtime.stack_size;
        info!(
            max_idle = pool.max_idle(),
            stack_size = stack_size,
            "Dispatcher created"
        );
        let resolver: Box<dyn RouteResolver> = Box::new(resolver);
        Self {
            resolver: ArcSwap::from_pointee(resolver),
            pool,
            not_found: chain([not_found_handler()]),
            stack_size,
        }
    }

    /// Replace the chain run when no route matches
    #[must_use]
    pub fn with_not_found(mut self, not_found: Chain) -> Self {
        self.not_found = not_found;
        self
    }

    /// Swap the route resolver. Requests already resolved keep their chain.
    pub fn replace_resolver<R>(&self, resolver: R)
    where
        R: RouteResolver + 'static,
    {
        let resolver: Box<dyn RouteResolver> = Box::new(resolver);
        self.resolver.store(Arc::new(resolver));
        info!("Route resolver replaced");
    }

    #[must_use]
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    #[must_use]
    pub fn pool_metrics(&self) -> Arc<PoolMetrics> {
        self.pool.metrics()
    }

    /// Run one request to completion on the calling coroutine or thread.
    ///
    /// # Panics
    ///
    /// Re-raises a panic that escaped the handler chain, after its finalizers ran.
    pub fn handle(&self, request: Request<Vec<u8>>, sink: Box<dyn ResponseSink>) -> Served {
        let start = Instant::now();

        // D1: Route resolution
        let resolved = self.resolver.load().resolve(request.method(), request.uri().path());
        let (route, chain, params) = match resolved {
            Some(m) => (m.name, m.chain, m.path_params),
            None => {
                // D2: No route matched
                debug!(
                    method = %request.method(),
                    path = %request.uri().path(),
                    "No route matched - running not-found chain"
                );
                (
                    Arc::from(NOT_FOUND_ROUTE),
                    Arc::clone(&self.not_found),
                    ParamVec::new(),
                )
            }
        };

        // D3: Context acquired and bound
        let mut ctx = self.pool.acquire();
        ctx.reset(request, ResponseWriter::new(sink), chain);
        ctx.bind_route(route, params);
        let request_id = ctx.request_id();
        if let Err(e) = ctx.start_session() {
            warn!(
                request_id = %request_id,
                error = %e,
                "Session start failed - running chain without a session"
            );
        }
        debug!(
            request_id = %request_id,
            route = ctx.route().unwrap_or_default(),
            handlers = ctx.cursor().len(),
            has_session = ctx.session().is_some(),
            "Context bound"
        );

        // D4: Chain run
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.run())) {
            // D5: Panic escaped the chain - context is not reused
            error!(
                request_id = %request_id,
                route = ctx.route().unwrap_or_default(),
                panic_message = %panic_message(payload.as_ref()),
                "Handler chain panicked - CRITICAL"
            );
            self.pool.discard(ctx);
            panic::resume_unwind(payload);
        }

        // D6: Response handed back
        let status = ctx.response().status();
        let sink = ctx.response().take_sink();
        info!(
            request_id = %request_id,
            route = ctx.route().unwrap_or_default(),
            status = status.as_u16(),
            bytes = ctx.response().size(),
            latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Request complete"
        );

        // D7: Context returned to the pool
        self.pool.release(ctx);
        Served { status, sink }
    }

    /// Run [`handle`](Self::handle) on a new coroutine.
    ///
    /// A panic in the chain surfaces as the `Err` of `join()`.
    #[allow(unsafe_code)]
    pub fn serve(
        self: &Arc<Self>,
        request: Request<Vec<u8>>,
        sink: Box<dyn ResponseSink>,
    ) -> io::Result<JoinHandle<Served>> {
        let dispatcher = Arc::clone(self);
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns the request, the sink and an Arc to the dispatcher.
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .stack_size(self.stack_size)
                .spawn(move || dispatcher.handle(request, sink))
        };
        if let Err(e) = &spawned {
            error!(
                error = %e,
                stack_size = self.stack_size,
                "Failed to spawn request coroutine - CRITICAL"
            );
        }
        spawned
    }
}
