//! Context core - request lifecycle and the chain run loop.

use super::DataBag;
use crate::cancel::{CancelError, CancelNode, DoneSignal};
use crate::chain::{Chain, Cursor, Finalizers};
use crate::env::Env;
use crate::extension::{CapabilityError, CapabilityResult};
use crate::ids::RequestId;
use crate::response::ResponseWriter;
use crate::router::ParamVec;
use crate::session::{SessionError, SessionStore};
use http::{HeaderMap, Method, Request, StatusCode};
use may::coroutine::JoinHandle;
use serde_json::Value;
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, warn};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

fn empty_request() -> Arc<Request<Vec<u8>>> {
    static EMPTY: OnceLock<Arc<Request<Vec<u8>>>> = OnceLock::new();
    Arc::clone(EMPTY.get_or_init(|| Arc::new(Request::new(Vec::new()))))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Per-request state exposed to handlers.
///
/// A context owns its cancellation node, chain cursor and finalizer list for the
/// duration of one request. Request, response, session and data bag are shared with
/// any replica it creates.
pub struct Context {
    request_id: RequestId,
    node: Arc<CancelNode>,
    cursor: Cursor,
    deferred: Finalizers,
    request: Arc<Request<Vec<u8>>>,
    response: ResponseWriter,
    session: Option<Arc<dyn SessionStore>>,
    data: DataBag,
    route: Option<Arc<str>>,
    params: ParamVec,
    status_recorded: AtomicBool,
    env: Arc<Env>,
}

/// Observable lifecycle state of a context, used to compare a reused context
/// against a freshly constructed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextState {
    pub cursor_index: isize,
    pub chain_len: usize,
    pub pending_finalizers: usize,
    pub done: bool,
    pub err: Option<CancelError>,
    pub children: usize,
    pub has_parent: bool,
    pub has_session: bool,
    pub data_entries: usize,
    pub route: Option<Arc<str>>,
    pub params: usize,
    pub status: StatusCode,
    pub body_bytes: usize,
    pub committed: bool,
    pub status_recorded: bool,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("node", &self.node)
            .field("cursor", &self.cursor)
            .field("deferred", &self.deferred)
            .field("method", self.request.method())
            .field("path", &self.request.uri().path())
            .field("route", &self.route)
            .field("response", &self.response)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

impl Context {
    /// A context bound to nothing: empty chain, open root node, detached response.
    #[must_use]
    pub fn new(env: Arc<Env>) -> Self {
        Self {
            request_id: RequestId::new(),
            node: CancelNode::root(),
            cursor: Cursor::empty(),
            deferred: Finalizers::new(),
            request: empty_request(),
            response: ResponseWriter::detached(),
            session: None,
            data: DataBag::new(),
            route: None,
            params: ParamVec::new(),
            status_recorded: AtomicBool::new(false),
            env,
        }
    }

    /// Bind a new request.
    ///
    /// Installs a fresh root cancellation node, clears the finalizer list, rewinds the
    /// cursor onto `chain` and drops everything left by the previous occupant.
    pub fn reset(&mut self, request: Request<Vec<u8>>, response: ResponseWriter, chain: Chain) {
        self.request_id = RequestId::from_headers(request.headers());
        self.node = CancelNode::root();
        self.cursor.reset(chain);
        self.deferred.clear();
        self.request = Arc::new(request);
        self.response = response;
        self.session = None;
        self.data = DataBag::new();
        self.route = None;
        self.params.clear();
        self.status_recorded.store(false, Ordering::Release);
    }

    /// Record the matched route and its path parameters
    pub fn bind_route(&mut self, route: Arc<str>, params: ParamVec) {
        self.route = Some(route);
        self.params = params;
    }

    /// Child context sharing request, response, session and data bag.
    ///
    /// The replica owns a new cancellation node registered under this context's node:
    /// cancelling this context cancels the replica, never the other way round. Its
    /// cursor is a copy taken now and its finalizer list starts empty.
    #[must_use]
    pub fn replicate(&self) -> Context {
        Context {
            request_id: self.request_id,
            node: CancelNode::child_of(&self.node),
            cursor: self.cursor.clone(),
            deferred: Finalizers::new(),
            request: Arc::clone(&self.request),
            response: self.response.clone(),
            session: self.session.clone(),
            data: self.data.clone(),
            route: self.route.clone(),
            params: self.params.clone(),
            status_recorded: AtomicBool::new(false),
            env: Arc::clone(&self.env),
        }
    }

    /// Run `f` with a replica on a new coroutine.
    ///
    /// The replica detaches from this context once `f` returns.
    #[allow(unsafe_code)]
    pub fn spawn_replica<F, T>(&self, f: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce(&mut Context) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut replica = self.replicate();
        let stack_size = self.env.runtime.stack_size;
        debug!(
            request_id = %self.request_id,
            parent = %self.node.id(),
            replica = %replica.node.id(),
            stack_size = stack_size,
            "Spawning replica coroutine"
        );
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns the replica outright and holds no borrowed data.
        unsafe {
            may::coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    let out = f(&mut replica);
                    replica.node.cancel(true, CancelError::Canceled);
                    out
                })
        }
    }

    /// Record the final status through the post-process hook, then cancel this
    /// context's node and detach it from its parent.
    ///
    /// The hook fires once per bound request, even when the node was already
    /// cancelled through [`cancel_node`](Self::cancel_node) or by a parent. Repeated
    /// calls change nothing.
    pub fn cancel(&self) {
        if !self.status_recorded.swap(true, Ordering::AcqRel) {
            if let Some(hook) = self.env.post_process() {
                hook(&self.request, self.response.status());
            }
        }
        self.node.cancel(true, CancelError::Canceled);
    }

    /// Run the bound chain, then every finalizer.
    ///
    /// A release finalizer is queued before the chain starts, so it runs even when the
    /// chain short-circuits or panics. A handler panic is re-raised after the
    /// finalizers have run.
    pub fn run(&mut self) {
        self.deferred.push(Box::new(release_request));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.next()));
        if let Err(payload) = &outcome {
            warn!(
                request_id = %self.request_id,
                handler_index = self.cursor.index(),
                panic_message = %panic_message(payload.as_ref()),
                "Handler panicked - running finalizers before unwinding"
            );
        }

        let finalizer_panic = self.run_deferred();

        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
        if let Some(payload) = finalizer_panic {
            panic::resume_unwind(payload);
        }
    }

    /// Advance to the next handler and run it.
    ///
    /// Everything downstream runs only through the handlers themselves: middleware
    /// calls `next` to run the rest of the chain, then resumes its own
    /// post-processing. A handler that returns without calling `next` ends the
    /// chain, and later calls to `next` for this run do nothing.
    pub fn next(&mut self) {
        self.cursor.step();
        let Some(handler) = self.cursor.current() else {
            return;
        };
        let at = self.cursor.index();
        handler(self);
        if self.cursor.index() == at {
            self.cursor.stop();
        }
    }

    /// Rewind the cursor, bind `chain` and run it from the first handler.
    ///
    /// Handlers remaining in the previous chain never run. The new chain follows the
    /// same continuation rule as any other: only its first handler runs unless that
    /// handler calls [`next`](Self::next).
    pub fn restart(&mut self, chain: Chain) {
        debug!(
            request_id = %self.request_id,
            from_index = self.cursor.index(),
            handlers = chain.len(),
            "Restarting chain"
        );
        self.cursor.reset(chain);
        self.next();
    }

    /// Queue `action` to run after the chain
    pub fn defer<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.deferred.push(Box::new(move |_ctx: &mut Context| action()));
    }

    /// Queue `action` to run after the chain, with access to the context
    pub fn defer_ctx<F>(&mut self, action: F)
    where
        F: FnOnce(&mut Context) + Send + 'static,
    {
        self.deferred.push(Box::new(action));
    }

    fn run_deferred(&mut self) -> Option<Box<dyn Any + Send>> {
        let mut first_panic = None;
        // Finalizers queued by a finalizer run in a later pass.
        loop {
            let pending = self.deferred.take();
            if pending.is_empty() {
                break;
            }
            for action in pending {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| action(self))) {
                    error!(
                        request_id = %self.request_id,
                        panic_message = %panic_message(payload.as_ref()),
                        "Finalizer panicked"
                    );
                    first_panic.get_or_insert(payload);
                }
            }
        }
        first_panic
    }

    /// Invoke the capability registered under `name`
    pub fn call(&mut self, name: &str, args: &[Value]) -> CapabilityResult {
        let capability = self
            .env
            .extensions()
            .get(name)
            .cloned()
            .ok_or_else(|| CapabilityError::NotFound {
                name: name.to_string(),
            })?;
        capability.invoke(self, args)
    }

    /// Start (or resume) the session for this request.
    ///
    /// Returns the session id, or `None` when no session manager is configured.
    pub fn start_session(&mut self) -> Result<Option<String>, SessionError> {
        if let Some(session) = &self.session {
            return Ok(Some(session.session_id().to_string()));
        }
        let Some(manager) = self.env.session_manager().cloned() else {
            return Ok(None);
        };
        let session = manager.start(&self.request, &self.response)?;
        let sid = session.session_id().to_string();
        self.session = Some(session);
        Ok(Some(sid))
    }

    /// Release the session handle, if one was started
    pub fn release_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.release(&self.response);
        }
    }

    /// Write a `text/plain` body with `status`
    pub fn serve_plain(&self, status: StatusCode, body: &str) -> io::Result<usize> {
        self.response.send(status, TEXT_PLAIN, body.as_bytes())
    }

    /// Write `value` as an `application/json` body with `status`
    pub fn serve_json(&self, status: StatusCode, value: &Value) -> io::Result<usize> {
        let body = serde_json::to_vec(value).map_err(io::Error::other)?;
        self.response.send(status, APPLICATION_JSON, &body)
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn request(&self) -> &Request<Vec<u8>> {
        &self.request
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Request header as text
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Decoded query parameter; the last occurrence wins
    #[must_use]
    pub fn query(&self, name: &str) -> Option<String> {
        self.request
            .uri()
            .query()?
            .split('&')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                if urlencoding::decode(k).ok()? != name {
                    return None;
                }
                urlencoding::decode(v).ok()
            })
            .last()
            .map(Cow::into_owned)
    }

    /// Path parameter by name; the last occurrence wins
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    /// Name of the matched route
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    #[must_use]
    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    #[must_use]
    pub fn session(&self) -> Option<&Arc<dyn SessionStore>> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn data(&self) -> &DataBag {
        &self.data
    }

    #[must_use]
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    #[must_use]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// This context's cancellation node
    #[must_use]
    pub fn cancel_node(&self) -> &Arc<CancelNode> {
        &self.node
    }

    #[must_use]
    pub fn done_signal(&self) -> DoneSignal {
        self.node.done_signal()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.node.is_done()
    }

    #[must_use]
    pub fn err(&self) -> Option<CancelError> {
        self.node.err()
    }

    #[must_use]
    pub fn pending_finalizers(&self) -> usize {
        self.deferred.len()
    }

    #[must_use]
    pub fn snapshot(&self) -> ContextState {
        ContextState {
            cursor_index: self.cursor.index(),
            chain_len: self.cursor.len(),
            pending_finalizers: self.deferred.len(),
            done: self.node.is_done(),
            err: self.node.err(),
            children: self.node.child_count(),
            has_parent: self.node.parent().is_some(),
            has_session: self.session.is_some(),
            data_entries: self.data.len(),
            route: self.route.clone(),
            params: self.params.len(),
            status: self.response.status(),
            body_bytes: self.response.size(),
            committed: self.response.written(),
            status_recorded: self.status_recorded.load(Ordering::Acquire),
        }
    }

    /// Drop per-request state before the context goes back to the pool.
    ///
    /// A node that was never cancelled is cancelled here so replicas still holding it
    /// observe the end of the request.
    pub(crate) fn recycle(&mut self) {
        self.node.cancel(true, CancelError::Canceled);
        self.node = CancelNode::root();
        self.cursor = Cursor::empty();
        self.deferred.clear();
        self.request = empty_request();
        self.response = ResponseWriter::detached();
        self.session = None;
        self.data = DataBag::new();
        self.route = None;
        self.params.clear();
        self.status_recorded.store(false, Ordering::Release);
    }
}

fn release_request(ctx: &mut Context) {
    if let Err(e) = ctx.call("release", &[]) {
        warn!(
            request_id = %ctx.request_id,
            error = %e,
            "Release capability failed - releasing directly"
        );
        ctx.release_session();
        ctx.cancel();
    }
}
