use crate::chain::{handler, Handler};
use crate::context::Context;
use http::header::AUTHORIZATION;
use http::StatusCode;
use tracing::{debug, warn};

/// Continue only when `Authorization: Bearer <token>` matches; otherwise answer
/// `401 {"error":"Unauthorized"}` and end the chain.
#[must_use]
pub fn bearer_auth(token: impl Into<String>) -> Handler {
    let expected: String = token.into();
    handler(move |ctx: &mut Context| {
        let presented = ctx
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        if presented == Some(expected.as_str()) {
            debug!(request_id = %ctx.request_id(), "Bearer token accepted");
            ctx.next();
            return;
        }
        debug!(
            request_id = %ctx.request_id(),
            token_present = presented.is_some(),
            "Bearer token rejected"
        );
        let body = serde_json::json!({ "error": "Unauthorized" });
        if let Err(e) = ctx.serve_json(StatusCode::UNAUTHORIZED, &body) {
            warn!(request_id = %ctx.request_id(), error = %e, "Failed to write 401 response");
        }
    })
}
