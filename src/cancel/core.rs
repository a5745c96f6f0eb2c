//! Cancel core - per-node state, propagation and the done-signal.

use may::sync::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a cancellation node, used as the key in a parent's child set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Reason a node was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelError {
    /// The context was explicitly cancelled (the request finished or a handler gave up)
    Canceled,
    /// A collaborator racing a timer against the done-signal gave up waiting
    DeadlineExceeded,
    /// Cancelled for an application-specific reason
    ///
    /// The reason must be non-empty; cancelling with an empty reason is a
    /// programming error and panics.
    Aborted(Arc<str>),
}

impl CancelError {
    /// Create an application-specific cancellation reason
    #[must_use]
    pub fn aborted(reason: impl Into<Arc<str>>) -> Self {
        CancelError::Aborted(reason.into())
    }

    fn is_missing_reason(&self) -> bool {
        matches!(self, CancelError::Aborted(reason) if reason.trim().is_empty())
    }
}

impl fmt::Display for CancelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelError::Canceled => write!(f, "context canceled"),
            CancelError::DeadlineExceeded => write!(f, "context deadline exceeded"),
            CancelError::Aborted(reason) => write!(f, "context aborted: {reason}"),
        }
    }
}

impl std::error::Error for CancelError {}

#[derive(Default)]
struct NodeState {
    err: Option<CancelError>,
    // None until the first child registers
    children: Option<HashMap<NodeId, Arc<CancelNode>>>,
}

/// A node in the cancellation tree.
///
/// Invariant: `err()` is `Some` if and only if the done-signal has fired.
pub struct CancelNode {
    id: NodeId,
    parent: Option<Weak<CancelNode>>,
    state: Mutex<NodeState>,
    done: Condvar,
}

impl fmt::Debug for CancelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CancelNode")
            .field("id", &self.id)
            .field("has_parent", &self.parent.is_some())
            .field("err", &state.err)
            .field(
                "children",
                &state.children.as_ref().map_or(0, HashMap::len),
            )
            .finish()
    }
}

impl CancelNode {
    /// Create a root node with no parent and an open done-signal.
    #[must_use]
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::next(),
            parent: None,
            state: Mutex::new(NodeState::default()),
            done: Condvar::new(),
        })
    }

    /// Create a node subordinate to `parent` and register it there.
    ///
    /// If `parent` is already cancelled the new node comes back cancelled with
    /// the parent's error.
    #[must_use]
    pub fn child_of(parent: &Arc<CancelNode>) -> Arc<Self> {
        let child = Arc::new(Self {
            id: NodeId::next(),
            parent: Some(Arc::downgrade(parent)),
            state: Mutex::new(NodeState::default()),
            done: Condvar::new(),
        });
        parent.register_child(&child);
        child
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identifier of this node
    #[inline]
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent node, if this node has one and the parent is still alive
    #[must_use]
    pub fn parent(&self) -> Option<Arc<CancelNode>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Whether the done-signal has fired
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.lock().err.is_some()
    }

    /// The cancellation error, `None` while the node is live
    #[must_use]
    pub fn err(&self) -> Option<CancelError> {
        self.lock().err.clone()
    }

    /// Number of children currently registered
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.lock().children.as_ref().map_or(0, HashMap::len)
    }

    /// Whether `id` is currently registered as a child of this node
    #[must_use]
    pub fn has_child(&self, id: NodeId) -> bool {
        self.lock()
            .children
            .as_ref()
            .is_some_and(|children| children.contains_key(&id))
    }

    /// Register `child` under this node.
    ///
    /// A child registered on a node that is already done is cancelled on the spot
    /// with this node's error instead of being stored.
    pub fn register_child(&self, child: &Arc<CancelNode>) {
        let mut state = self.lock();
        if let Some(err) = state.err.clone() {
            drop(state);
            trace!(parent = %self.id, child = %child.id, "Late child cancelled on registration");
            child.cancel(false, err);
            return;
        }
        state
            .children
            .get_or_insert_with(HashMap::new)
            .insert(child.id, Arc::clone(child));
    }

    fn remove_child(&self, id: NodeId) {
        let mut state = self.lock();
        if let Some(children) = state.children.as_mut() {
            children.remove(&id);
        }
    }

    /// Cancel this node and everything registered beneath it.
    ///
    /// Sets the error, fires the done-signal, cancels every registered child with
    /// the same error and clears the child set. With `detach_from_parent` the node
    /// also removes itself from its parent's child set. Cancelling a node that is
    /// already done changes nothing.
    ///
    /// # Panics
    ///
    /// Panics when `err` carries an empty reason. A cancellation without a reason
    /// is a defect in the caller, not a runtime condition.
    #[allow(clippy::panic)]
    pub fn cancel(&self, detach_from_parent: bool, err: CancelError) {
        if err.is_missing_reason() {
            panic!("cancel node {}: internal error: missing cancel error", self.id);
        }

        let children = {
            let mut state = self.lock();
            if state.err.is_some() {
                return;
            }
            state.err = Some(err.clone());
            self.done.notify_all();
            state.children.take()
        };

        if let Some(children) = children {
            debug!(node = %self.id, children = children.len(), error = %err, "Propagating cancel");
            for child in children.values() {
                child.cancel(false, err.clone());
            }
        }

        if detach_from_parent {
            if let Some(parent) = self.parent() {
                parent.remove_child(self.id);
            }
        }
    }

    /// Handle for waiting on this node's done-signal
    #[must_use]
    pub fn done_signal(self: &Arc<Self>) -> DoneSignal {
        DoneSignal {
            node: Arc::clone(self),
        }
    }
}

/// Cloneable waiter on a node's done-signal.
#[derive(Clone, Debug)]
pub struct DoneSignal {
    node: Arc<CancelNode>,
}

impl DoneSignal {
    /// Whether the signal has fired
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.node.is_done()
    }

    /// Error the node was cancelled with, if it has been
    #[must_use]
    pub fn err(&self) -> Option<CancelError> {
        self.node.err()
    }

    /// Block the current coroutine (or thread) until the signal fires.
    pub fn wait(&self) -> CancelError {
        let mut state = self.node.lock();
        loop {
            if let Some(err) = state.err.clone() {
                return err;
            }
            state = self
                .node
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait up to `timeout` for the signal. Returns the error if it fired in time.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CancelError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.node.lock();
        loop {
            if let Some(err) = state.err.clone() {
                return Some(err);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, _timed_out) = self
                .node
                .done
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }
}
