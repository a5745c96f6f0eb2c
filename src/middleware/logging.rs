use crate::chain::{handler, Handler};
use crate::context::Context;
use std::time::Instant;
use tracing::{field, info, info_span};

/// Open a `request` span around the downstream chain and log status and latency.
#[must_use]
pub fn logging() -> Handler {
    handler(|ctx: &mut Context| {
        let span = info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            route = ctx.route().unwrap_or_default(),
            status = field::Empty,
            latency_ms = field::Empty,
        );
        let start = Instant::now();
        span.in_scope(|| ctx.next());

        let status = ctx.response().status().as_u16();
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        span.record("status", status);
        span.record("latency_ms", latency_ms);
        span.in_scope(|| {
            info!(
                status = status,
                latency_ms = latency_ms,
                bytes = ctx.response().size(),
                "Request handled"
            );
        });
    })
}
