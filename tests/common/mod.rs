#![allow(dead_code)]

use brrtcore::chain::Chain;
use brrtcore::context::Context;
use brrtcore::env::Env;
use brrtcore::response::{BufferedResponse, ResponseWriter};
use http::Request;
use parking_lot::Mutex;
use std::sync::Arc;

/// Ordered log of events shared between handlers and the test body
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

pub fn env() -> Arc<Env> {
    Arc::new(Env::new())
}

pub fn get(path: &str) -> Request<Vec<u8>> {
    Request::builder().uri(path).body(Vec::new()).unwrap()
}

/// Context bound to `handlers` and a request for `path`, writing into a buffer
pub fn bound(env: Arc<Env>, path: &str, handlers: Chain) -> (Context, BufferedResponse) {
    let sink = BufferedResponse::new();
    let mut ctx = Context::new(env);
    ctx.reset(get(path), ResponseWriter::new(Box::new(sink.clone())), handlers);
    (ctx, sink)
}
