//! `boundedcache`: a bounded in-process cache combining LRU capacity
//! eviction with per-entry TTL expiration.
//!
//! ```
//! use boundedcache::Cache;
//!
//! let mut cache: Cache<&str, u32> = Cache::new(2).unwrap();
//! cache.insert("a", 1).unwrap();
//! cache.insert("b", 2).unwrap();
//! assert_eq!(*cache.get(&"a").unwrap(), 1);
//!
//! cache.insert("c", 3).unwrap(); // evicts "b", the least recently used
//! assert!(cache.get(&"b").is_err());
//! ```
//!
//! Entries never expire in the background: every public method first drains
//! whatever has expired since it was last called (see [`clock`]), so reads
//! and writes are always consistent with the cache's declared TTLs without
//! needing a sweeper thread.

mod cache;

pub use cache::clock;
pub use cache::{Cache, CacheError, CallbackError, EvictionCallback, Stats, NO_EXPIRY};
