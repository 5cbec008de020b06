//! The capacity-bounded resource pool.
//!
//! Resources are created lazily: the first `capacity` acquisitions each
//! build a fresh handle, and every acquisition after that blocks until some
//! caller returns one. The availability queue is the sole hand-off point
//! between releasers and acquirers; no fairness among blocked acquirers is
//! promised.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;

use crate::error::PoolError;
use crate::pool::factory::ResourceFactory;
use crate::pool::handle::ResourceHandle;

/// Configuration for a resource pool
#[derive(Debug, Clone)]
pub struct ResourcePoolConfig {
    /// Maximum number of handles the pool will ever create
    pub capacity: usize,

    /// Prefix for handle names; handles are named `<prefix>-<N>` with a
    /// 1-based creation sequence number
    pub handle_name_prefix: String,
}

impl Default for ResourcePoolConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            handle_name_prefix: "res".to_string(),
        }
    }
}

/// Counters describing a pool's activity so far
#[derive(Debug, Default, Clone)]
pub struct PoolStats {
    /// Number of handles created
    pub total_created: usize,

    /// Number of successful checkouts
    pub total_checkouts: usize,

    /// Number of handles returned to the availability queue
    pub total_returns: usize,
}

/// Shared state behind a pool and all of its outstanding checkouts.
struct PoolInner<F: ResourceFactory> {
    /// Pool configuration
    config: ResourcePoolConfig,

    /// Owner-supplied construction/teardown hooks
    factory: Arc<F>,

    /// Number of handles created so far; monotonic, `0..=capacity`
    created: AtomicUsize,

    /// Serializes the check-and-create slow path so concurrent first-time
    /// acquirers never create more than `capacity` handles
    create_lock: Mutex<()>,

    /// Every handle ever created, in creation order; used only for teardown
    handles: Mutex<Vec<Arc<ResourceHandle<F>>>>,

    /// Producer side of the availability queue
    slot_tx: Sender<Arc<ResourceHandle<F>>>,

    /// Consumer side of the availability queue
    slot_rx: Receiver<Arc<ResourceHandle<F>>>,

    /// Whether the pool has been closed
    closed: AtomicBool,

    /// Checkouts performed, for statistics
    checkouts: AtomicUsize,

    /// Returns performed, for statistics
    returns: AtomicUsize,
}

impl<F: ResourceFactory> PoolInner<F> {
    /// Create one handle if capacity has not been reached yet.
    ///
    /// Double-checked: the counter is read once without the lock as a fast
    /// path, then re-read under the lock before creating. The counter only
    /// advances after a successful build and enqueue, so a failed build
    /// leaves the slot available for a later attempt.
    fn ensure_slot(&self) -> Result<(), PoolError> {
        if self.created.load(Ordering::Acquire) >= self.config.capacity {
            return Ok(());
        }

        let _creating = self.create_lock.lock();
        let created = self.created.load(Ordering::Acquire);
        if created >= self.config.capacity {
            return Ok(());
        }

        let seq = created + 1;
        let name = format!("{}-{}", self.config.handle_name_prefix, seq);
        let handle = Arc::new(ResourceHandle::new(name, Arc::clone(&self.factory)));
        handle.rebuild()?;

        self.handles.lock().push(Arc::clone(&handle));
        // Cannot block: the queue holds at most `created` handles and
        // `created < capacity` here.
        self.slot_tx.send(handle).map_err(|_| PoolError::Disconnected)?;
        self.created.store(seq, Ordering::Release);

        debug!("Created handle {} of {}", seq, self.config.capacity);
        Ok(())
    }

    /// Put a handle back on the availability queue.
    fn return_slot(&self, slot: Arc<ResourceHandle<F>>) {
        if self.closed.load(Ordering::Acquire) {
            // The pool shut down while this handle was checked out; its
            // resource was already torn down by close(). Anything rebuilt
            // since is destroyed here instead of re-queued.
            if let Err(e) = slot.teardown() {
                warn!(
                    "Failed to close resource for handle {} after shutdown: {}",
                    slot.name(),
                    e
                );
            }
            return;
        }

        trace!("Returning handle {} to the pool", slot.name());
        match self.slot_tx.try_send(slot) {
            Ok(()) => {
                self.returns.fetch_add(1, Ordering::Relaxed);
            }
            // A full queue would mean a handle was returned twice, which the
            // ownership model prevents.
            Err(TrySendError::Full(slot)) | Err(TrySendError::Disconnected(slot)) => {
                warn!(
                    "Failed to return handle {} to the availability queue",
                    slot.name()
                );
            }
        }
    }

    /// Tear down every handle ever created. Idempotent.
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let handles = self.handles.lock();
        info!("Closing resource pool; tearing down {} handles", handles.len());

        for handle in handles.iter() {
            if let Err(e) = handle.teardown() {
                warn!(
                    "Failed to close resource for handle {}: {}",
                    handle.name(),
                    e
                );
            }
        }
    }
}

impl<F: ResourceFactory> Drop for PoolInner<F> {
    fn drop(&mut self) {
        // Runs once the pool and all outstanding checkouts are gone; makes
        // sure resources are destroyed even if close() was never called.
        self.close();
    }
}

/// A bounded pool of reusable resources.
///
/// The pool lazily creates up to `capacity` [`ResourceHandle`]s, each owning
/// one resource built by the supplied [`ResourceFactory`]. Acquired handles
/// come wrapped in a [`PooledResource`] guard that returns them to the pool
/// when dropped.
///
/// Cloning the pool is cheap and yields another reference to the same
/// underlying pool.
///
/// # Example
///
/// ```
/// use respool::{ResourceFactory, ResourcePool};
///
/// struct Counters;
///
/// impl ResourceFactory for Counters {
///     type Resource = u64;
///
///     fn create(&self) -> Result<u64, String> {
///         Ok(0)
///     }
///
///     fn destroy(&self, _counter: u64) -> Result<(), String> {
///         Ok(())
///     }
/// }
///
/// let pool = ResourcePool::new(Counters, 2).unwrap();
/// let total = pool.execute(|handle| *handle.get().unwrap() + 1).unwrap();
/// assert_eq!(total, 1);
/// pool.close();
/// ```
pub struct ResourcePool<F: ResourceFactory> {
    /// State shared with outstanding checkouts
    inner: Arc<PoolInner<F>>,
}

impl<F: ResourceFactory> ResourcePool<F> {
    /// Create a new pool with the given capacity.
    ///
    /// No resources are created eagerly; the first `capacity` acquisitions
    /// build them on demand.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(factory: F, capacity: usize) -> Result<Self, PoolError> {
        Self::with_config(
            factory,
            ResourcePoolConfig {
                capacity,
                ..Default::default()
            },
        )
    }

    /// Create a new pool with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidCapacity`] if the configured capacity is
    /// zero.
    pub fn with_config(factory: F, config: ResourcePoolConfig) -> Result<Self, PoolError> {
        if config.capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }

        let (slot_tx, slot_rx) = bounded(config.capacity);

        info!("Creating resource pool with capacity {}", config.capacity);

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                factory: Arc::new(factory),
                created: AtomicUsize::new(0),
                create_lock: Mutex::new(()),
                handles: Mutex::new(Vec::new()),
                slot_tx,
                slot_rx,
                closed: AtomicBool::new(false),
                checkouts: AtomicUsize::new(0),
                returns: AtomicUsize::new(0),
            }),
        })
    }

    /// Acquire a handle, blocking until one is available.
    ///
    /// While fewer than `capacity` handles exist, this creates a fresh one
    /// (building its resource via the factory) and returns it immediately.
    /// Once capacity is exhausted, the call blocks until another caller
    /// releases a handle. No ordering among blocked acquirers is guaranteed.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolShutdown`] if the pool has been closed,
    /// [`PoolError::CreationFailed`] if a first-time build fails (the
    /// capacity slot is not consumed and a later call may retry it), or
    /// [`PoolError::Disconnected`] if the availability queue disconnects
    /// while waiting.
    pub fn acquire(&self) -> Result<PooledResource<F>, PoolError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        self.inner.ensure_slot()?;

        let slot = self
            .inner
            .slot_rx
            .recv()
            .map_err(|_| PoolError::Disconnected)?;
        Ok(self.checked_out(slot))
    }

    /// Acquire a handle, waiting at most `timeout` for one to free up.
    ///
    /// # Errors
    ///
    /// As [`acquire`](Self::acquire), plus [`PoolError::Timeout`] when no
    /// handle became available in time.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<PooledResource<F>, PoolError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        self.inner.ensure_slot()?;

        let slot = match self.inner.slot_rx.recv_timeout(timeout) {
            Ok(slot) => slot,
            Err(RecvTimeoutError::Timeout) => return Err(PoolError::Timeout),
            Err(RecvTimeoutError::Disconnected) => return Err(PoolError::Disconnected),
        };
        Ok(self.checked_out(slot))
    }

    /// Acquire a handle without waiting.
    ///
    /// # Errors
    ///
    /// As [`acquire`](Self::acquire), plus [`PoolError::Exhausted`] when no
    /// handle is immediately available.
    pub fn try_acquire(&self) -> Result<PooledResource<F>, PoolError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        self.inner.ensure_slot()?;

        let slot = match self.inner.slot_rx.try_recv() {
            Ok(slot) => slot,
            Err(TryRecvError::Empty) => return Err(PoolError::Exhausted),
            Err(TryRecvError::Disconnected) => return Err(PoolError::Disconnected),
        };
        Ok(self.checked_out(slot))
    }

    /// Acquire a handle, apply `op` to it, and return the handle.
    ///
    /// The handle goes back to the pool on every exit path, including a
    /// panic inside `op`.
    ///
    /// # Errors
    ///
    /// Propagates acquisition failures; see [`acquire`](Self::acquire).
    pub fn execute<R>(&self, op: impl FnOnce(&ResourceHandle<F>) -> R) -> Result<R, PoolError> {
        let pooled = self.acquire()?;
        Ok(op(pooled.handle()))
    }

    /// Return a previously acquired handle to the pool.
    ///
    /// Equivalent to dropping the guard; provided for callers that prefer an
    /// explicit hand-back.
    pub fn release(&self, handle: PooledResource<F>) {
        handle.release();
    }

    /// Close the pool, destroying the resource of every handle ever created,
    /// checked out or idle.
    ///
    /// Per-resource teardown failures are logged and teardown continues with
    /// the remaining handles. Subsequent acquisitions fail with
    /// [`PoolError::PoolShutdown`]. Closing is intended for shutdown only:
    /// calling it while handles are actively in use violates the pool's
    /// preconditions, and the affected resources are destroyed out from
    /// under their holders.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Get the fixed capacity of the pool.
    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    /// Get the number of handles created so far.
    pub fn created_count(&self) -> usize {
        self.inner.created.load(Ordering::Acquire)
    }

    /// Get the number of handles currently sitting in the availability
    /// queue.
    pub fn available_count(&self) -> usize {
        self.inner.slot_rx.len()
    }

    /// Check whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get a snapshot of the pool's activity counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total_created: self.inner.created.load(Ordering::Relaxed),
            total_checkouts: self.inner.checkouts.load(Ordering::Relaxed),
            total_returns: self.inner.returns.load(Ordering::Relaxed),
        }
    }

    /// Wrap a dequeued slot in a checkout guard.
    fn checked_out(&self, slot: Arc<ResourceHandle<F>>) -> PooledResource<F> {
        self.inner.checkouts.fetch_add(1, Ordering::Relaxed);
        trace!("Handle {} checked out", slot.name());
        PooledResource {
            slot: Some(slot),
            pool: Arc::clone(&self.inner),
        }
    }
}

impl<F: ResourceFactory> Clone for ResourcePool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A checked-out handle that returns itself to the pool when dropped.
///
/// Dereferences to the underlying [`ResourceHandle`], so the resource and
/// extension map are reachable directly on the guard.
pub struct PooledResource<F: ResourceFactory> {
    /// The checked-out handle; `None` once released
    slot: Option<Arc<ResourceHandle<F>>>,

    /// The pool this handle goes back to
    pool: Arc<PoolInner<F>>,
}

impl<F: ResourceFactory> PooledResource<F> {
    /// Get the checked-out handle.
    pub fn handle(&self) -> &ResourceHandle<F> {
        self.slot.as_deref().expect("handle already released")
    }

    /// Return the handle to the pool before the guard is dropped.
    pub fn release(mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.return_slot(slot);
        }
    }
}

impl<F: ResourceFactory> Deref for PooledResource<F> {
    type Target = ResourceHandle<F>;

    fn deref(&self) -> &Self::Target {
        self.handle()
    }
}

impl<F: ResourceFactory> Drop for PooledResource<F> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.return_slot(slot);
        }
    }
}
