//! Handles wrapping the resources owned by a pool.
//!
//! A handle is created once by its pool, keeps its name for life, and owns
//! exactly one underlying resource at a time. The resource can be destroyed
//! and recreated any number of times via [`ResourceHandle::rebuild`]; the
//! handle itself is only destroyed when the pool closes.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::PoolError;
use crate::pool::factory::ResourceFactory;

/// Caller-scoped scratch space attached to a handle.
///
/// The pool never interprets this map; it is cleared every time the handle's
/// resource is rebuilt.
pub type Extensions = HashMap<String, Box<dyn Any + Send>>;

/// Mutable state of a handle: the owned resource and its extension map.
struct HandleState<T> {
    /// The owned resource, or `None` before the first build and after a
    /// failed rebuild or final teardown
    resource: Option<T>,

    /// Caller bookkeeping, reset on every rebuild
    extensions: Extensions,
}

/// A named wrapper around one pooled resource.
///
/// Exclusive use of the resource is guaranteed by pool discipline: a handle
/// is either sitting in the availability queue or checked out by exactly one
/// caller. The internal lock exists so that pool-wide close can tear down
/// handles that are currently checked out.
pub struct ResourceHandle<F: ResourceFactory> {
    /// Identity assigned at creation time, fixed for the handle's life
    name: String,

    /// The hooks used to build and destroy the underlying resource
    factory: Arc<F>,

    /// The owned resource and extension map
    state: Mutex<HandleState<F::Resource>>,
}

impl<F: ResourceFactory> ResourceHandle<F> {
    /// Create a new, unbuilt handle. Only the pool creates handles.
    pub(crate) fn new(name: String, factory: Arc<F>) -> Self {
        Self {
            name,
            factory,
            state: Mutex::new(HandleState {
                resource: None,
                extensions: Extensions::new(),
            }),
        }
    }

    /// Get the identity of this handle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get locked access to the underlying resource.
    ///
    /// Returns `None` if the handle has never been built, or if its last
    /// rebuild failed and left it resource-less.
    pub fn get(&self) -> Option<MappedMutexGuard<'_, F::Resource>> {
        MutexGuard::try_map(self.state.lock(), |state| state.resource.as_mut()).ok()
    }

    /// Get locked access to the extension map.
    ///
    /// The map is caller-managed scratch space; the pool only ever clears it,
    /// and only as a side effect of [`rebuild`](Self::rebuild).
    pub fn extensions(&self) -> MappedMutexGuard<'_, Extensions> {
        MutexGuard::map(self.state.lock(), |state| &mut state.extensions)
    }

    /// Destroy the current resource (if any) and build a fresh one.
    ///
    /// This is the single code path for both first-time construction and any
    /// later refresh. The prior resource is always destroyed before the new
    /// one is assigned, and the extension map is reset to empty once the new
    /// resource is in place.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::TeardownFailed`] if destroying the prior resource
    /// fails (the handle is left resource-less), or
    /// [`PoolError::CreationFailed`] if the construction hook fails.
    pub fn rebuild(&self) -> Result<(), PoolError> {
        let mut state = self.state.lock();

        if let Some(old) = state.resource.take() {
            match self.factory.destroy(old) {
                Ok(()) => debug!("Closed resource for handle {}", self.name),
                Err(e) => {
                    warn!("Failed to close resource for handle {}: {}", self.name, e);
                    return Err(PoolError::TeardownFailed(e));
                }
            }
        }

        match self.factory.create() {
            Ok(resource) => {
                debug!("Created resource for handle {}", self.name);
                state.resource = Some(resource);
                state.extensions.clear();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to create resource for handle {}: {}", self.name, e);
                Err(PoolError::CreationFailed(e))
            }
        }
    }

    /// Destroy the owned resource without replacing it.
    ///
    /// Used by the pool during shutdown; a no-op if the handle holds nothing.
    pub(crate) fn teardown(&self) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        if let Some(resource) = state.resource.take() {
            self.factory
                .destroy(resource)
                .map_err(PoolError::TeardownFailed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Factory that records hook invocations in order.
    struct RecordingFactory {
        events: StdMutex<Vec<String>>,
        next_id: AtomicUsize,
        fail_create: AtomicBool,
        fail_destroy: AtomicBool,
    }

    impl RecordingFactory {
        fn new() -> Self {
            Self {
                events: StdMutex::new(Vec::new()),
                next_id: AtomicUsize::new(0),
                fail_create: AtomicBool::new(false),
                fail_destroy: AtomicBool::new(false),
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ResourceFactory for RecordingFactory {
        type Resource = usize;

        fn create(&self) -> Result<usize, String> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err("create refused".to_string());
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.events.lock().unwrap().push(format!("create {}", id));
            Ok(id)
        }

        fn destroy(&self, resource: usize) -> Result<(), String> {
            if self.fail_destroy.load(Ordering::SeqCst) {
                return Err("destroy refused".to_string());
            }
            self.events
                .lock()
                .unwrap()
                .push(format!("destroy {}", resource));
            Ok(())
        }
    }

    fn handle_with(factory: Arc<RecordingFactory>) -> ResourceHandle<RecordingFactory> {
        ResourceHandle::new("res-1".to_string(), factory)
    }

    #[test]
    fn test_unbuilt_handle_has_no_resource() {
        let factory = Arc::new(RecordingFactory::new());
        let handle = handle_with(factory);

        assert_eq!(handle.name(), "res-1");
        assert!(handle.get().is_none());
    }

    #[test]
    fn test_first_build_assigns_resource() {
        let factory = Arc::new(RecordingFactory::new());
        let handle = handle_with(Arc::clone(&factory));

        handle.rebuild().unwrap();

        assert_eq!(*handle.get().unwrap(), 1);
        assert_eq!(factory.events(), vec!["create 1"]);
    }

    #[test]
    fn test_rebuild_destroys_prior_resource_first() {
        let factory = Arc::new(RecordingFactory::new());
        let handle = handle_with(Arc::clone(&factory));

        handle.rebuild().unwrap();
        handle.rebuild().unwrap();

        // The old resource must be gone before the replacement exists.
        assert_eq!(factory.events(), vec!["create 1", "destroy 1", "create 2"]);
        assert_eq!(*handle.get().unwrap(), 2);
    }

    #[test]
    fn test_rebuild_clears_extensions() {
        let factory = Arc::new(RecordingFactory::new());
        let handle = handle_with(factory);

        handle.rebuild().unwrap();
        handle
            .extensions()
            .insert("attempts".to_string(), Box::new(3u32));
        assert!(handle.extensions().contains_key("attempts"));

        handle.rebuild().unwrap();

        assert!(handle.extensions().get("attempts").is_none());
    }

    #[test]
    fn test_extension_values_downcast() {
        let factory = Arc::new(RecordingFactory::new());
        let handle = handle_with(factory);

        handle.rebuild().unwrap();
        handle
            .extensions()
            .insert("label".to_string(), Box::new("primary".to_string()));

        let extensions = handle.extensions();
        let label = extensions
            .get("label")
            .and_then(|value| value.downcast_ref::<String>())
            .unwrap();
        assert_eq!(label, "primary");
    }

    #[test]
    fn test_failed_create_leaves_handle_resourceless() {
        let factory = Arc::new(RecordingFactory::new());
        let handle = handle_with(Arc::clone(&factory));

        handle.rebuild().unwrap();
        factory.fail_create.store(true, Ordering::SeqCst);

        let result = handle.rebuild();
        assert!(matches!(result, Err(PoolError::CreationFailed(_))));

        // The prior resource was destroyed before the failed build.
        assert_eq!(factory.events(), vec!["create 1", "destroy 1"]);
        assert!(handle.get().is_none());
    }

    #[test]
    fn test_failed_destroy_propagates_from_rebuild() {
        let factory = Arc::new(RecordingFactory::new());
        let handle = handle_with(Arc::clone(&factory));

        handle.rebuild().unwrap();
        factory.fail_destroy.store(true, Ordering::SeqCst);

        let result = handle.rebuild();
        assert!(matches!(result, Err(PoolError::TeardownFailed(_))));
        assert!(handle.get().is_none());
    }

    #[test]
    fn test_teardown_runs_hook_at_most_once() {
        let factory = Arc::new(RecordingFactory::new());
        let handle = handle_with(Arc::clone(&factory));

        handle.rebuild().unwrap();
        handle.teardown().unwrap();
        handle.teardown().unwrap();

        assert_eq!(factory.events(), vec!["create 1", "destroy 1"]);
        assert!(handle.get().is_none());
    }
}
