use crate::chain::{handler, Handler};
use crate::context::Context;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Request counters shared by every request that passes [`Metrics::handler`].
///
/// All counters are atomics updated with `Ordering::Relaxed`; readings are
/// eventually consistent.
#[derive(Debug, Default)]
pub struct Metrics {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    status_2xx: AtomicUsize,
    status_3xx: AtomicUsize,
    status_4xx: AtomicUsize,
    status_5xx: AtomicUsize,
    stack_size: AtomicUsize,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain handler recording the request once everything downstream returned
    #[must_use]
    pub fn handler(self: &Arc<Self>) -> Handler {
        let metrics = Arc::clone(self);
        handler(move |ctx: &mut Context| {
            let start = Instant::now();
            ctx.next();
            metrics.record(ctx.response().status().as_u16(), start.elapsed());
        })
    }

    fn record(&self, status: u16, latency: Duration) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns.fetch_add(
            u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
        let class = match status {
            200..=299 => &self.status_2xx,
            300..=399 => &self.status_3xx,
            400..=499 => &self.status_4xx,
            500..=599 => &self.status_5xx,
            _ => return,
        };
        class.fetch_add(1, Ordering::Relaxed);
        // Stack size of the coroutine serving the request, when there is one
        if may::coroutine::is_coroutine() {
            self.stack_size
                .store(may::coroutine::current().stack_size(), Ordering::Relaxed);
        }
    }

    /// Total number of requests recorded
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean latency across recorded requests, zero before the first one
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Counts for 2xx, 3xx, 4xx and 5xx responses
    #[must_use]
    pub fn status_classes(&self) -> [usize; 4] {
        [
            self.status_2xx.load(Ordering::Relaxed),
            self.status_3xx.load(Ordering::Relaxed),
            self.status_4xx.load(Ordering::Relaxed),
            self.status_5xx.load(Ordering::Relaxed),
        ]
    }

    /// Stack size of the last coroutine that served a request, 0 if none did
    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_classifies_status() {
        let metrics = Metrics::new();
        metrics.record(200, Duration::from_millis(2));
        metrics.record(404, Duration::from_millis(4));
        metrics.record(503, Duration::from_millis(6));
        assert_eq!(metrics.request_count(), 3);
        assert_eq!(metrics.status_classes(), [1, 0, 1, 1]);
        assert_eq!(metrics.average_latency(), Duration::from_millis(4));
    }

    #[test]
    fn test_average_latency_without_requests() {
        assert_eq!(Metrics::new().average_latency(), Duration::ZERO);
    }
}
