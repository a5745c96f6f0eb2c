use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a context pool
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Contexts constructed because the pool was empty (or preallocated)
    pub created: AtomicU64,
    /// Every acquisition, fresh or reused
    pub acquired: AtomicU64,
    /// Acquisitions served from the idle list
    pub reused: AtomicU64,
    /// Contexts handed back
    pub released: AtomicU64,
    /// Released contexts dropped because the idle list was full or the run panicked
    pub dropped: AtomicU64,
}

impl PoolMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Contexts acquired and not yet released (approximate under concurrency)
    #[must_use]
    pub fn get_in_flight(&self) -> u64 {
        self.get_acquired().saturating_sub(self.get_released())
    }
}
