//! # Response Module
//!
//! The response-writing handle a context exposes to handlers.
//!
//! Actual I/O belongs to the HTTP stack behind a [`ResponseSink`]. The
//! [`ResponseWriter`] wraps the sink, records the status and the number of body bytes
//! written, and is shared by a context and all of its replicas. Once the dispatcher
//! takes the sink back with [`ResponseWriter::take_sink`], further writes from
//! straggling replicas fail with `NotConnected` instead of reaching the next request.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Destination of a response, implemented by the underlying HTTP stack.
pub trait ResponseSink: Send {
    /// Commit the status line
    fn set_status(&mut self, status: StatusCode);
    /// Add a header to the outgoing response
    fn append_header(&mut self, name: HeaderName, value: HeaderValue);
    /// Append body bytes
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

#[derive(Debug, Default)]
struct Buffer {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// In-memory [`ResponseSink`].
///
/// Clones share the same buffer, so a caller can keep one clone and inspect what
/// the handlers wrote after the sink has been handed to the dispatcher.
#[derive(Clone, Debug, Default)]
pub struct BufferedResponse {
    inner: Arc<Mutex<Buffer>>,
}

impl BufferedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Committed status, `None` if nothing was committed
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.lock().status
    }

    /// Header value by name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.lock()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// All values of a header
    #[must_use]
    pub fn header_all(&self, name: &str) -> Vec<String> {
        self.lock()
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_owned))
            .collect()
    }

    /// Body bytes written so far
    #[must_use]
    pub fn body(&self) -> Vec<u8> {
        self.lock().body.clone()
    }

    /// Body as UTF-8 text (lossy)
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.lock().body).into_owned()
    }
}

impl ResponseSink for BufferedResponse {
    fn set_status(&mut self, status: StatusCode) {
        self.lock().status = Some(status);
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.append(name, value);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().body.extend_from_slice(buf);
        Ok(buf.len())
    }
}

struct WriterState {
    sink: Option<Box<dyn ResponseSink>>,
    status: StatusCode,
    headers: HeaderMap,
    size: usize,
    committed: bool,
}

impl WriterState {
    fn commit(&mut self) -> io::Result<()> {
        if self.committed {
            return Ok(());
        }
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "response sink released"))?;
        sink.set_status(self.status);
        let headers = std::mem::take(&mut self.headers);
        stage_headers(sink.as_mut(), headers);
        self.committed = true;
        Ok(())
    }
}

fn stage_headers(sink: &mut dyn ResponseSink, headers: HeaderMap) {
    let mut last: Option<HeaderName> = None;
    for (name, value) in headers {
        if let Some(name) = name {
            last = Some(name);
        }
        if let Some(name) = &last {
            sink.append_header(name.clone(), value);
        }
    }
}

/// Cloneable response handle shared by a context and its replicas.
#[derive(Clone)]
pub struct ResponseWriter {
    inner: Arc<Mutex<WriterState>>,
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ResponseWriter")
            .field("status", &state.status)
            .field("size", &state.size)
            .field("committed", &state.committed)
            .field("attached", &state.sink.is_some())
            .finish()
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::detached()
    }
}

impl ResponseWriter {
    /// Writer bound to `sink`. Status defaults to 200 OK until changed.
    #[must_use]
    pub fn new(sink: Box<dyn ResponseSink>) -> Self {
        Self::with_sink(Some(sink))
    }

    /// Writer with no sink; every write fails with `NotConnected`.
    #[must_use]
    pub fn detached() -> Self {
        Self::with_sink(None)
    }

    fn with_sink(sink: Option<Box<dyn ResponseSink>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WriterState {
                sink,
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                size: 0,
                committed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Status that was (or will be) sent
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.lock().status
    }

    /// Set the status. Ignored once the header has been committed.
    pub fn set_status(&self, status: StatusCode) {
        let mut state = self.lock();
        if state.committed {
            warn!(
                current = state.status.as_u16(),
                attempted = status.as_u16(),
                "Status change after response committed - ignored"
            );
            return;
        }
        state.status = status;
    }

    /// Set (replace) a response header before the body is written
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        let mut state = self.lock();
        if state.committed {
            warn!(header = %name, "Header change after response committed - ignored");
            return;
        }
        state.headers.insert(name, value);
    }

    /// Add a response header, keeping existing values with the same name
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        let mut state = self.lock();
        if state.committed {
            warn!(header = %name, "Header change after response committed - ignored");
            return;
        }
        state.headers.append(name, value);
    }

    /// Header staged (not yet committed) under `name`
    #[must_use]
    pub fn staged_header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.lock().headers.get(name).cloned()
    }

    /// Commit status and headers without writing a body
    pub fn write_header(&self) -> io::Result<()> {
        self.lock().commit()
    }

    /// Write body bytes, committing status and headers first
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.commit()?;
        let sink = state
            .sink
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "response sink released"))?;
        let n = sink.write(buf)?;
        state.size += n;
        Ok(n)
    }

    /// Write `body` with the given status and content type
    pub fn send(&self, status: StatusCode, content_type: &'static str, body: &[u8]) -> io::Result<usize> {
        self.set_status(status);
        self.insert_header(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.write(body)
    }

    /// Body bytes written
    #[must_use]
    pub fn size(&self) -> usize {
        self.lock().size
    }

    /// Whether status and headers have been committed
    #[must_use]
    pub fn written(&self) -> bool {
        self.lock().committed
    }

    /// Detach and return the sink. Later writes through any clone fail.
    ///
    /// An uncommitted response is committed first so the status reaches the sink.
    pub fn take_sink(&self) -> Option<Box<dyn ResponseSink>> {
        let mut state = self.lock();
        if let Err(e) = state.commit() {
            warn!(error = %e, "Could not commit response before release");
        }
        state.sink.take()
    }
}
