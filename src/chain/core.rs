//! Chain core - hot path for handler advancement.

use crate::context::Context;
use std::fmt;
use std::sync::Arc;

/// A request handler. Receives the context and may call `ctx.next()` to continue.
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// An ordered, shareable sequence of handlers.
pub type Chain = Arc<[Handler]>;

/// A deferred action run after the chain finishes.
pub type Deferred = Box<dyn FnOnce(&mut Context) + Send>;

/// Wrap a closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build a [`Chain`] from handlers in execution order
pub fn chain(handlers: impl IntoIterator<Item = Handler>) -> Chain {
    handlers.into_iter().collect::<Vec<_>>().into()
}

/// Movable position over a bound chain.
#[derive(Clone)]
pub struct Cursor {
    index: isize,
    chain: Chain,
}

impl Cursor {
    /// Position before the first handler; the first advance lands on 0
    pub const BEFORE_START: isize = -1;

    /// Create a cursor over `chain`, positioned before the first handler
    #[must_use]
    pub fn new(chain: Chain) -> Self {
        Self {
            index: Self::BEFORE_START,
            chain,
        }
    }

    /// Cursor over an empty chain
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Arc::from(Vec::<Handler>::new()))
    }

    /// Rewind to the sentinel and bind a new chain
    pub fn reset(&mut self, chain: Chain) {
        self.index = Self::BEFORE_START;
        self.chain = chain;
    }

    /// Current index (`BEFORE_START` until the first advance)
    #[inline]
    #[must_use]
    pub fn index(&self) -> isize {
        self.index
    }

    /// Number of handlers in the bound chain
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether the bound chain has no handlers
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Whether every handler has been reached
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.current().is_none()
    }

    /// The bound chain
    #[must_use]
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Move one position forward.
    #[inline]
    pub(crate) fn step(&mut self) {
        self.index = self.index.saturating_add(1);
    }

    /// Move past the last handler so nothing further runs.
    #[inline]
    pub(crate) fn stop(&mut self) {
        self.index = isize::try_from(self.chain.len()).unwrap_or(isize::MAX);
    }

    /// Handler at the current index, if the index is inside the chain.
    ///
    /// Compared against the chain bound right now, so a chain swapped mid-run by a
    /// restart is never indexed with the old length.
    #[inline]
    pub(crate) fn current(&self) -> Option<Handler> {
        usize::try_from(self.index)
            .ok()
            .and_then(|i| self.chain.get(i))
            .map(Arc::clone)
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("index", &self.index)
            .field("len", &self.chain.len())
            .finish()
    }
}

/// Append-only list of deferred actions.
#[derive(Default)]
pub struct Finalizers {
    actions: Vec<Deferred>,
}

impl Finalizers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Deferred) {
        self.actions.push(action);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Take every pending action, leaving the list empty
    pub(crate) fn take(&mut self) -> Vec<Deferred> {
        std::mem::take(&mut self.actions)
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}

impl fmt::Debug for Finalizers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizers")
            .field("pending", &self.actions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        handler(|_ctx| {})
    }

    #[test]
    fn test_cursor_starts_before_first_handler() {
        let cursor = Cursor::new(chain([noop(), noop()]));
        assert_eq!(cursor.index(), Cursor::BEFORE_START);
        assert_eq!(cursor.len(), 2);
        assert!(cursor.current().is_none());
    }

    #[test]
    fn test_step_walks_then_exhausts() {
        let mut cursor = Cursor::new(chain([noop(), noop()]));
        cursor.step();
        assert!(cursor.current().is_some());
        cursor.step();
        assert!(cursor.current().is_some());
        cursor.step();
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_reset_rewinds_and_rebinds() {
        let mut cursor = Cursor::new(chain([noop()]));
        cursor.step();
        cursor.step();
        cursor.reset(chain([noop(), noop(), noop()]));
        assert_eq!(cursor.index(), Cursor::BEFORE_START);
        assert_eq!(cursor.len(), 3);
    }

    #[test]
    fn test_stop_exhausts() {
        let mut cursor = Cursor::new(chain([noop(), noop()]));
        cursor.step();
        cursor.stop();
        assert!(cursor.is_exhausted());
        cursor.step();
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_empty_cursor() {
        let mut cursor = Cursor::empty();
        assert!(cursor.is_empty());
        cursor.step();
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_finalizers_take_empties_list() {
        let mut finalizers = Finalizers::new();
        finalizers.push(Box::new(|_ctx| {}));
        finalizers.push(Box::new(|_ctx| {}));
        assert_eq!(finalizers.len(), 2);
        assert_eq!(finalizers.take().len(), 2);
        assert!(finalizers.is_empty());
    }
}
