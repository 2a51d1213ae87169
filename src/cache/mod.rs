//! Persistent cache of accessible binaries
//!
//! Enumerating the binaries a workspace can reach walks the whole dependency
//! graph, so the result is memoized per workspace directory and shared by
//! every invocation on the machine.
//!
//! # Lifecycle
//!
//! | Event | Effect |
//! |-------|--------|
//! | lookup, record present | stored map returned, no enumeration |
//! | lookup, record missing or unreadable | enumerate once, persist, return |
//! | dependencies installed | every record removed |
//!
//! Records never expire on their own.

pub mod binaries;
pub mod entry;
pub mod invalidator;
pub mod lock;

pub use binaries::{BinaryCache, CacheOptions};
pub use entry::{CacheEntry, SCHEMA_VERSION};
pub use invalidator::CacheInvalidator;
pub use lock::CacheLock;
