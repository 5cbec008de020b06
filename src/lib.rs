#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # respool
//!
//! A bounded, thread-safe pool for expensive resources such as connections,
//! parsers, or reusable buffers.
//!
//! The pool creates resources lazily on first demand, never exceeds the
//! capacity fixed at construction, hands resources out to concurrent callers,
//! and reclaims them for reuse. What a "resource" is stays opaque to the
//! pool: the owner supplies a [`ResourceFactory`] with a construction hook
//! and a teardown hook, and everything else is generic.
//!
//! ## Example
//!
//! ```
//! use respool::{ResourceFactory, ResourcePool};
//!
//! struct Buffers;
//!
//! impl ResourceFactory for Buffers {
//!     type Resource = Vec<u8>;
//!
//!     fn create(&self) -> Result<Vec<u8>, String> {
//!         Ok(Vec::with_capacity(4096))
//!     }
//!
//!     fn destroy(&self, _buffer: Vec<u8>) -> Result<(), String> {
//!         Ok(())
//!     }
//! }
//!
//! let pool = ResourcePool::new(Buffers, 4).unwrap();
//! let buffer = pool.acquire().unwrap();
//! assert!(buffer.get().unwrap().capacity() >= 4096);
//! drop(buffer); // returned to the pool for the next caller
//! pool.close();
//! ```

/// Error types for pool operations
pub mod error;

/// Resource pooling: factory hooks, pooled handles, and the pool itself
pub mod pool;

// Re-export key types for easier access
pub use error::PoolError;
pub use pool::factory::ResourceFactory;
pub use pool::handle::{Extensions, ResourceHandle};
pub use pool::resource::{PoolStats, PooledResource, ResourcePool, ResourcePoolConfig};
