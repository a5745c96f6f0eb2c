use crate::chain::{handler, Handler};
use crate::context::{panic_message, Context};
use http::StatusCode;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, warn};

/// Catch a panic from the downstream chain and answer 500.
///
/// The panic is logged and swallowed. When the response was already committed the
/// status cannot change, so only the log entry remains.
#[must_use]
pub fn recover() -> Handler {
    handler(|ctx: &mut Context| {
        let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) else {
            return;
        };
        let backtrace = std::backtrace::Backtrace::capture();
        error!(
            request_id = %ctx.request_id(),
            route = ctx.route().unwrap_or_default(),
            panic_message = %panic_message(payload.as_ref()),
            backtrace = %backtrace,
            "Handler panicked - recovered"
        );
        if ctx.response().written() {
            warn!(
                request_id = %ctx.request_id(),
                status = ctx.response().status().as_u16(),
                "Response already committed - cannot send 500"
            );
            return;
        }
        let body = serde_json::json!({ "error": "Internal Server Error" });
        if let Err(e) = ctx.serve_json(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            warn!(request_id = %ctx.request_id(), error = %e, "Failed to write 500 response");
        }
    })
}
