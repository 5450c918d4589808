//! Background patch generation: one named thread servicing a FIFO request
//! channel and publishing finished meshes on a result channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use dashmap::DashSet;
use quadsphere_cubesphere::{PatchMesh, PatchParams, generate_patch};

use crate::{LodError, NodeId};

/// Name of the worker thread, visible in logs and debuggers.
pub const WORKER_THREAD_NAME: &str = "quadsphere-mesh-worker";

/// A request to build the mesh for one node.
#[derive(Clone, Copy, Debug)]
pub struct PatchRequest {
    /// Node the mesh belongs to.
    pub node: NodeId,
    /// Geometry inputs, resolution included, captured at submission.
    pub params: PatchParams,
}

/// A finished mesh.
#[derive(Debug)]
pub struct PatchResult {
    pub node: NodeId,
    pub mesh: PatchMesh,
}

/// Owns the worker thread and both channel ends the update thread needs.
///
/// Requests are serviced strictly in submission order. Results are collected
/// with [`drain_results`](Self::drain_results), which never blocks.
pub struct MeshWorker {
    request_tx: Option<Sender<PatchRequest>>,
    result_rx: Receiver<PatchResult>,
    pending: Arc<DashSet<NodeId>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    #[cfg(test)]
    inline: Option<InlineQueue>,
}

impl MeshWorker {
    /// Start the worker thread.
    ///
    /// `poll_interval` bounds how long the idle thread waits before
    /// re-checking the cancellation flag.
    pub fn spawn(poll_interval: Duration) -> Result<Self, LodError> {
        let (request_tx, request_rx) = unbounded::<PatchRequest>();
        let (result_tx, result_rx) = unbounded::<PatchResult>();
        let pending = Arc::new(DashSet::new());
        let cancelled = Arc::new(AtomicBool::new(false));

        let handle = {
            let pending = Arc::clone(&pending);
            let cancelled = Arc::clone(&cancelled);
            std::thread::Builder::new()
                .name(WORKER_THREAD_NAME.into())
                .spawn(move || {
                    run_worker(&request_rx, &result_tx, &pending, &cancelled, poll_interval);
                })
                .map_err(LodError::WorkerSpawn)?
        };

        tracing::info!(poll_interval_ms = poll_interval.as_millis() as u64, "mesh worker started");

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            pending,
            cancelled,
            handle: Some(handle),
            #[cfg(test)]
            inline: None,
        })
    }

    /// Queue a request. Never blocks.
    ///
    /// Fails with [`LodError::AlreadyPending`] if the node already has a
    /// request queued or in flight, and with [`LodError::WorkerShutDown`]
    /// once [`shutdown`](Self::shutdown) has run.
    pub fn submit(&self, request: PatchRequest) -> Result<(), LodError> {
        let sender = match &self.request_tx {
            Some(sender) if !self.cancelled.load(Ordering::Acquire) => sender,
            _ => return Err(LodError::WorkerShutDown),
        };
        if !self.pending.insert(request.node) {
            return Err(LodError::AlreadyPending(request.node));
        }
        if sender.send(request).is_err() {
            self.pending.remove(&request.node);
            return Err(LodError::WorkerShutDown);
        }
        tracing::trace!(node = %request.node, "patch request queued");
        Ok(())
    }

    /// Collect every published result without blocking.
    pub fn drain_results(&self) -> Vec<PatchResult> {
        self.result_rx.try_iter().collect()
    }

    /// Requests queued or in flight.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.contains(&node)
    }

    /// Withdraw a queued or running request.
    ///
    /// A request not yet started is skipped; one already generating is
    /// discarded instead of published. Returns whether `node` was pending.
    pub fn cancel(&self, node: NodeId) -> bool {
        let cancelled = self.pending.remove(&node).is_some();
        if cancelled {
            tracing::trace!(node = %node, "patch request cancelled");
        }
        cancelled
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.request_tx.is_none()
    }

    /// Cancel, close the request channel and join the thread.
    ///
    /// Queued requests are discarded and results not yet drained are
    /// dropped. Calling it again is a no-op.
    pub fn shutdown(&mut self) {
        let Some(sender) = self.request_tx.take() else {
            return;
        };
        self.cancelled.store(true, Ordering::Release);
        drop(sender);

        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("mesh worker thread panicked");
        }

        let discarded = self.pending.len();
        self.pending.clear();
        let dropped = self.result_rx.try_iter().count();
        tracing::info!(discarded, dropped, "mesh worker stopped");
    }
}

impl Drop for MeshWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MeshWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshWorker")
            .field("pending", &self.pending.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn run_worker(
    requests: &Receiver<PatchRequest>,
    results: &Sender<PatchResult>,
    pending: &DashSet<NodeId>,
    cancelled: &AtomicBool,
    poll_interval: Duration,
) {
    loop {
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        let request = match requests.recv_timeout(poll_interval) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        if let Some(result) = process(&request, pending)
            && results.send(result).is_err()
        {
            break;
        }
    }
}

fn process(request: &PatchRequest, pending: &DashSet<NodeId>) -> Option<PatchResult> {
    if !pending.contains(&request.node) {
        tracing::trace!(node = %request.node, "cancelled patch request skipped");
        return None;
    }
    let mesh = generate_patch(&request.params);
    tracing::trace!(
        node = %request.node,
        vertices = mesh.vertices.len(),
        triangles = mesh.triangle_count(),
        "patch generated"
    );
    // Cleared before publishing so a drained result never finds its node
    // pending. Already gone means it was cancelled while generating.
    pending.remove(&request.node)?;
    Some(PatchResult {
        node: request.node,
        mesh,
    })
}

/// Threadless mode for deterministic tests: requests wait in the channel
/// until the test runs them.
#[cfg(test)]
struct InlineQueue {
    request_tx: Sender<PatchRequest>,
    request_rx: Receiver<PatchRequest>,
    result_tx: Sender<PatchResult>,
}

#[cfg(test)]
impl MeshWorker {
    pub(crate) fn inline() -> Self {
        let (request_tx, request_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        Self {
            request_tx: Some(request_tx.clone()),
            result_rx,
            pending: Arc::new(DashSet::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
            handle: None,
            inline: Some(InlineQueue {
                request_tx,
                request_rx,
                result_tx,
            }),
        }
    }

    /// Generate every queued request, in order.
    pub(crate) fn run_pending(&self) -> usize {
        self.run_pending_except(|_| false)
    }

    /// Generate queued requests except those `hold` selects, which stay queued.
    pub(crate) fn run_pending_except(&self, hold: impl Fn(&PatchRequest) -> bool) -> usize {
        let Some(queue) = &self.inline else {
            return 0;
        };
        if self.cancelled.load(Ordering::Acquire) {
            return 0;
        }
        let queued: Vec<_> = queue.request_rx.try_iter().collect();
        let mut processed = 0;
        for request in queued {
            if hold(&request) {
                let _ = queue.request_tx.send(request);
                continue;
            }
            if let Some(result) = process(&request, &self.pending) {
                let _ = queue.result_tx.send(result);
                processed += 1;
            }
        }
        processed
    }
}
