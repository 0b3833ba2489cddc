//! Dispatch pool.
//!
//! # Responsibilities
//! - Admit callers under a bounded backlog
//! - Assign each caller exactly one idle target, in arrival order
//! - Release targets when their request completes and hand them to the backlog
//! - Close once, waking every waiting caller
//!
//! # Design Decisions
//! - One mutex guards registry, busy set, wait queue and the closed flag
//! - The dispatcher delivers while holding the mutex; a oneshot send never
//!   blocks, and a caller that went away hands the target straight back
//! - Release is tied to dropping an [`Assignment`], so every exit path of a
//!   request (success, error, caller-side cancellation) releases exactly once
//! - `close` and matching are serialized by the mutex: a caller matched before
//!   the close keeps its target, every other waiter gets `ShuttingDown`

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};

use crate::config::PoolConfig;
use crate::discovery::poller::DiscoveryLoop;
use crate::discovery::Refresher;
use crate::http::client::Transport;
use crate::http::request::rewrite_request;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::load_balancer::{
    body::ReleaseBody,
    queue::{Ticket, WaitQueue},
    registry::{RefreshSummary, Registry},
    target::{Target, TargetKey},
    types::{PoolError, PoolResult, PoolSnapshot, PoolStats, TargetStatus},
};
use crate::observability::metrics;

/// Client-side balancer for one logical service.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
}

impl Pool {
    /// Create a pool with no discovery attached.
    ///
    /// Targets are supplied with [`Pool::refresh`] and the pool lives until
    /// [`Pool::close`] is called.
    pub fn new(config: &PoolConfig, transport: Arc<dyn Transport>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                registry: Registry::new(),
                waiting: WaitQueue::new(config.effective_max_waiting()),
                is_closed: false,
                stats: PoolStats::default(),
            }),
            closed: Shutdown::new(),
        });

        Self { shared, transport }
    }

    /// Create a pool and spawn its discovery loop.
    ///
    /// The pool closes when `shutdown` fires. Must be called within a Tokio
    /// runtime.
    pub fn spawn(
        config: &PoolConfig,
        transport: Arc<dyn Transport>,
        refresher: Arc<dyn Refresher>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let pool = Self::new(config, transport);

        let discovery = DiscoveryLoop::new(
            Arc::downgrade(&pool.shared),
            refresher,
            config.selector.clone(),
            config.interval(),
        );
        tokio::spawn(discovery.run(shutdown));

        pool
    }

    /// Forward `request` to an idle target.
    ///
    /// Waits until a target is free. The returned body releases the target
    /// when it reaches end-of-stream or is dropped, whichever comes first.
    pub async fn dispatch<B>(&self, request: &Request<B>) -> PoolResult<Response<ReleaseBody>>
    where
        B: Clone + Into<Body>,
    {
        let start = Instant::now();
        let assignment = self.acquire().await?;

        // Every early return below drops `assignment`, which releases it.
        let outbound = match rewrite_request(request, assignment.target()) {
            Ok(outbound) => outbound,
            Err(e) => {
                metrics::record_dispatch("request_error", start);
                return Err(e.into());
            }
        };

        tracing::debug!(
            target_key = %assignment.target().key,
            uri = %outbound.uri(),
            method = %outbound.method(),
            "Forwarding request"
        );

        match self.transport.send(outbound).await {
            Ok(response) => {
                metrics::record_dispatch("ok", start);
                Ok(response.map(|body| ReleaseBody::new(body, assignment)))
            }
            Err(e) => {
                tracing::warn!(target_key = %assignment.target().key, error = %e, "Transport error");
                metrics::record_dispatch("transport_error", start);
                Err(PoolError::Transport(e))
            }
        }
    }

    /// Wait for exclusive use of an idle target.
    ///
    /// Fails immediately with [`PoolError::AdmissionRejected`] if the wait
    /// queue is full. The target is released when the returned handle drops.
    pub async fn acquire(&self) -> PoolResult<Assignment> {
        let mut closed = self.shared.closed.subscribe();
        let (ticket, assigned) = Ticket::new();
        self.shared.admit(ticket)?;

        tokio::select! {
            biased;
            assigned = assigned => assigned.map_err(|_| PoolError::ShuttingDown),
            _ = closed.recv() => Err(PoolError::ShuttingDown),
        }
    }

    /// Replace the known targets and serve any backlog.
    pub fn refresh(&self, targets: Vec<Target>) -> RefreshSummary {
        self.shared.refresh(targets)
    }

    /// Close the pool. Waiting and future callers get `ShuttingDown`.
    ///
    /// Only the first call has an effect.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().is_closed
    }

    /// Current targets, sorted by key.
    pub fn targets(&self) -> Vec<TargetStatus> {
        self.shared.lock().target_statuses()
    }

    /// Targets plus queue depth and counters.
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.shared.lock();
        PoolSnapshot {
            targets: state.target_statuses(),
            busy: state.registry.busy_len(),
            waiting: state.waiting.len(),
            max_waiting: state.waiting.capacity(),
            closed: state.is_closed,
            stats: state.stats,
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.lock().stats
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("snapshot", &self.snapshot()).finish()
    }
}

/// Exclusive use of one target.
///
/// Dropping the handle releases the target and serves the backlog.
pub struct Assignment {
    target: Target,
    pool: Arc<Shared>,
    armed: bool,
}

impl Assignment {
    fn new(target: Target, pool: Arc<Shared>) -> Self {
        Self {
            target,
            pool,
            armed: true,
        }
    }

    /// The assigned target.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Release explicitly. Same as dropping the handle.
    pub fn release(self) {}

    // For use under the pool mutex, where dropping armed would deadlock.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl std::fmt::Debug for Assignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assignment")
            .field("target", &self.target)
            .field("armed", &self.armed)
            .finish()
    }
}

impl Drop for Assignment {
    fn drop(&mut self) {
        if self.armed {
            self.pool.release(&self.target.key);
        }
    }
}

pub(crate) struct Shared {
    state: Mutex<State>,
    closed: Shutdown,
}

struct State {
    registry: Registry,
    waiting: WaitQueue<Assignment>,
    is_closed: bool,
    stats: PoolStats,
}

impl State {
    fn target_statuses(&self) -> Vec<TargetStatus> {
        let mut targets: Vec<&Target> = self.registry.targets().collect();
        targets.sort_by(|a, b| a.key.cmp(&b.key));
        targets
            .into_iter()
            .map(|target| TargetStatus {
                name: target.key.name.clone(),
                uid: target.key.uid.clone(),
                address: target.authority(),
                busy: self.registry.is_busy(&target.key),
            })
            .collect()
    }
}

impl Shared {
    // The state is consistent between statements, so a panic elsewhere while
    // holding the lock leaves nothing half-updated.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(self: &Arc<Self>, ticket: Ticket<Assignment>) -> PoolResult<()> {
        let mut state = self.lock();
        if state.is_closed {
            return Err(PoolError::ShuttingDown);
        }

        if state.waiting.try_enqueue(ticket).is_err() {
            state.stats.rejected += 1;
            metrics::record_admission("rejected");
            tracing::debug!(waiting = state.waiting.len(), "Wait queue full, rejecting caller");
            return Err(PoolError::AdmissionRejected {
                capacity: state.waiting.capacity(),
            });
        }

        state.stats.admitted += 1;
        metrics::record_admission("admitted");
        self.serve(&mut state);
        Ok(())
    }

    pub(crate) fn refresh(self: &Arc<Self>, targets: Vec<Target>) -> RefreshSummary {
        let mut state = self.lock();
        let summary = state.registry.replace(targets);
        state.stats.refreshes += 1;
        if summary.added > 0 || summary.removed > 0 {
            tracing::info!(
                added = summary.added,
                removed = summary.removed,
                total = summary.total,
                "Targets changed"
            );
        }
        self.serve(&mut state);
        summary
    }

    fn release(self: &Arc<Self>, key: &TargetKey) {
        let mut state = self.lock();
        if state.registry.release(key) {
            state.stats.released += 1;
            metrics::record_release();
            tracing::trace!(target_key = %key, "Target released");
        }
        self.serve(&mut state);
    }

    /// Fires once the pool is closed, or once it is dropped.
    pub(crate) fn closed_signal(&self) -> ShutdownSignal {
        self.closed.subscribe()
    }

    pub(crate) fn close(&self) {
        let mut state = self.lock();
        if state.is_closed {
            return;
        }
        state.is_closed = true;
        let abandoned = state.waiting.drain();
        self.closed.trigger();
        drop(state);

        tracing::info!(waiting = abandoned.len(), "Pool closed");
        drop(abandoned);
    }

    /// Match idle targets with waiting callers until one side runs out.
    fn serve(self: &Arc<Self>, state: &mut State) {
        while !state.is_closed && !state.waiting.is_empty() {
            let Some(target) = state.registry.pick_idle().cloned() else {
                break;
            };
            let Some(ticket) = state.waiting.dequeue() else {
                break;
            };

            state.registry.mark_busy(&target.key);
            let assignment = Assignment::new(target, Arc::clone(self));

            if let Err(mut unclaimed) = ticket.deliver(assignment) {
                unclaimed.disarm();
                state.registry.release(&unclaimed.target.key);
                continue;
            }

            state.stats.assigned += 1;
        }

        metrics::record_pool_state(
            state.registry.len(),
            state.registry.busy_len(),
            state.waiting.len(),
        );
    }
}
