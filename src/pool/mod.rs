//! Bounded pooling of expensive, caller-defined resources.
//!
//! This module provides the pieces of the pooling machinery:
//!
//! - [`factory::ResourceFactory`] — the owner-supplied construction and
//!   teardown hooks
//! - [`handle::ResourceHandle`] — the named wrapper that owns one resource
//!   and its extension map
//! - [`resource::ResourcePool`] — the capacity-bounded pool with blocking
//!   acquisition

pub mod factory;
pub mod handle;
pub mod resource;

// Re-export key types from factory
pub use factory::ResourceFactory;

// Re-export key types from handle
pub use handle::{Extensions, ResourceHandle};

// Re-export key types from resource
pub use resource::{PoolStats, PooledResource, ResourcePool, ResourcePoolConfig};
