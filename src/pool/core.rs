use super::PoolMetrics;
use crate::context::Context;
use crate::env::Env;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Pool of reusable [`Context`] instances sharing one [`Env`].
pub struct ContextPool {
    idle: Mutex<Vec<Box<Context>>>,
    env: Arc<Env>,
    max_idle: usize,
    metrics: Arc<PoolMetrics>,
}

impl std::fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPool")
            .field("idle", &self.idle_count())
            .field("max_idle", &self.max_idle)
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl ContextPool {
    /// Pool sized from the environment's runtime configuration
    #[must_use]
    pub fn new(env: Arc<Env>) -> Self {
        let runtime = env.runtime;
        Self::with_capacity(env, runtime.pool_max_idle, runtime.pool_preallocate)
    }

    /// Pool keeping at most `max_idle` contexts, `preallocate` of them built now
    #[must_use]
    pub fn with_capacity(env: Arc<Env>, max_idle: usize, preallocate: usize) -> Self {
        let metrics = Arc::new(PoolMetrics::new());
        let count = preallocate.min(max_idle);
        let idle: Vec<Box<Context>> = (0..count)
            .map(|_| {
                metrics.record_created();
                Box::new(Context::new(Arc::clone(&env)))
            })
            .collect();
        info!(
            max_idle = max_idle,
            preallocated = count,
            "Creating context pool"
        );
        Self {
            idle: Mutex::new(idle),
            env,
            max_idle,
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Box<Context>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an idle context, or construct one when none is free
    #[must_use]
    pub fn acquire(&self) -> Box<Context> {
        let reused = self.lock().pop();
        self.metrics.record_acquired();
        match reused {
            Some(ctx) => {
                self.metrics.record_reused();
                ctx
            }
            None => {
                self.metrics.record_created();
                debug!(
                    in_flight = self.metrics.get_in_flight(),
                    "Context pool empty - constructing context"
                );
                Box::new(Context::new(Arc::clone(&self.env)))
            }
        }
    }

    /// Return a context whose run, finalizers included, has completed
    pub fn release(&self, mut ctx: Box<Context>) {
        ctx.recycle();
        self.metrics.record_released();
        let mut idle = self.lock();
        if idle.len() >= self.max_idle {
            drop(idle);
            self.metrics.record_dropped();
            return;
        }
        idle.push(ctx);
    }

    /// Account for a context that will not come back (its run panicked)
    pub fn discard(&self, ctx: Box<Context>) {
        drop(ctx);
        self.metrics.record_released();
        self.metrics.record_dropped();
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    #[must_use]
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<PoolMetrics> {
        Arc::clone(&self.metrics)
    }
}
