//! Owner-supplied hooks for resource construction and teardown.

/// A factory for the resources managed by a pool.
///
/// The pool never inspects the resources it manages; the owner of a pool
/// supplies one of these to define how a resource comes into existence and
/// how it is destroyed. Both hooks may fail. The factory is shared across
/// threads and across every handle in the pool, so any state it carries must
/// be safe to reach concurrently.
pub trait ResourceFactory: Send + Sync + 'static {
    /// The resource type managed by the pool
    type Resource: Send + 'static;

    /// Construct one fresh resource instance.
    ///
    /// Called on first-time builds and on every rebuild. A failure here
    /// propagates to the acquiring or rebuilding caller; the pool performs
    /// no retries of its own.
    fn create(&self) -> Result<Self::Resource, String>;

    /// Release one resource instance.
    ///
    /// Called when a handle rebuilds its resource and when the pool is
    /// closed. During pool-wide close a failure is logged and teardown
    /// continues with the remaining handles; during a rebuild it propagates
    /// to the caller.
    fn destroy(&self, resource: Self::Resource) -> Result<(), String>;
}
