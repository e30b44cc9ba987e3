//! A bounded in-process cache combining capacity-based LRU eviction with
//! optional per-entry TTL expiration.

mod arena;
mod error;
mod ttl_index;

pub mod clock;

pub use error::{CacheError, CallbackError};

use arena::Arena;
use clock::{Clock, SystemClock};
use ttl_index::TtlIndex;

use hashbrown::raw::RawTable;
use std::hash::{BuildHasher, Hash, Hasher};

#[cfg(feature = "ahash")]
type HashBuilder = ahash::RandomState;
#[cfg(not(feature = "ahash"))]
type HashBuilder = std::collections::hash_map::RandomState;

/// A no-expiry sentinel meaning "keep this entry until it's capacity-evicted
/// or explicitly removed."
pub const NO_EXPIRY: i64 = -1;

struct Node<K, V> {
    key: K,
    value: V,
    /// `None` if this entry has no TTL.
    deadline: Option<(u64, u64)>,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V, deadline: Option<(u64, u64)>) -> Self {
        Node { key, value, deadline }
    }
}

/// A user-supplied function invoked once per evicted entry, immediately
/// before its key and value are dropped.
///
/// Fired on capacity eviction, TTL expiry, and size-shrink eviction. Never
/// fired on overwrite, explicit `remove`, or `clear` (see [`Cache::clear`]).
pub type EvictionCallback<K, V> = Box<dyn FnMut(&K, &V) -> Result<(), CallbackError> + Send>;

/// Hit/miss counters, snapshotted by [`Cache::get_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub hits: u64,
    pub misses: u64,
}

/// A bounded cache combining LRU capacity eviction with per-entry TTL
/// expiration.
///
/// Expired entries are not evicted by a background thread; every public
/// method first drains whatever has expired by the time it's called (see
/// the module-level docs in [`clock`]), so a `len()` read right after an
/// expiry is always consistent with what a subsequent `get` would see.
pub struct Cache<K, V, C = SystemClock>
where
    K: Hash + Eq,
{
    key_index: RawTable<usize>,
    hash_builder: HashBuilder,
    order: Arena<Node<K, V>>,
    ttl: TtlIndex,
    capacity: usize,
    default_ttl_nanos: Option<u64>,
    callback: Option<EvictionCallback<K, V>>,
    hits: u64,
    misses: u64,
    clock: C,
}

impl<K, V, C> std::fmt::Debug for Cache<K, V, C>
where
    K: Hash + Eq + std::fmt::Debug,
    V: std::fmt::Debug,
    C: Clock,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity)
            .field("len", &self.key_index.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .field("clock", &self.clock)
            .finish()
    }
}

impl<K: Hash + Eq, V> Cache<K, V, SystemClock> {
    /// Creates a cache bounded to `capacity` entries with no default TTL and
    /// no eviction callback.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        Self::with_clock_and_options(capacity, None, None, SystemClock)
    }

    /// Creates a cache bounded to `capacity` entries, applying `ttl_nanos`
    /// as the default TTL for inserts that don't specify their own.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidCapacity`] if `capacity` is 0, or
    /// [`CacheError::InvalidTtl`] if `ttl_nanos` is 0.
    pub fn with_ttl(capacity: usize, ttl_nanos: u64) -> Result<Self, CacheError> {
        Self::with_clock_and_options(capacity, Some(ttl_nanos), None, SystemClock)
    }

    /// Creates a cache bounded to `capacity` entries, installing `callback`
    /// as its eviction callback.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidCapacity`] if `capacity` is 0.
    pub fn with_callback(capacity: usize, callback: EvictionCallback<K, V>) -> Result<Self, CacheError> {
        Self::with_clock_and_options(capacity, None, Some(callback), SystemClock)
    }

    /// Creates a cache bounded to `capacity` entries with both a default TTL
    /// and an eviction callback.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidCapacity`] if `capacity` is 0, or
    /// [`CacheError::InvalidTtl`] if `ttl_nanos` is 0.
    pub fn with_ttl_and_callback(
        capacity: usize,
        ttl_nanos: u64,
        callback: EvictionCallback<K, V>,
    ) -> Result<Self, CacheError> {
        Self::with_clock_and_options(capacity, Some(ttl_nanos), Some(callback), SystemClock)
    }
}

impl<K: Hash + Eq, V, C: Clock> Cache<K, V, C> {
    /// Creates a cache driven by a caller-supplied [`Clock`], for
    /// deterministic TTL testing (see [`clock::FakeClock`]).
    pub fn with_clock(capacity: usize, clock: C) -> Result<Self, CacheError> {
        Self::with_clock_and_options(capacity, None, None, clock)
    }

    /// Creates a cache with every constructor knob spelled out: capacity, an
    /// optional default TTL, an optional eviction callback, and the clock
    /// driving its TTL deadlines.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidCapacity`] if `capacity` is 0, or
    /// [`CacheError::InvalidTtl`] if `default_ttl_nanos` is `Some(0)`.
    pub fn with_clock_and_options(
        capacity: usize,
        default_ttl_nanos: Option<u64>,
        callback: Option<EvictionCallback<K, V>>,
        clock: C,
    ) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity);
        }
        if default_ttl_nanos == Some(0) {
            return Err(CacheError::InvalidTtl);
        }
        Ok(Cache {
            key_index: RawTable::with_capacity(capacity),
            hash_builder: HashBuilder::default(),
            order: Arena::with_capacity(capacity),
            ttl: TtlIndex::new(),
            capacity,
            default_ttl_nanos,
            callback,
            hits: 0,
            misses: 0,
            clock,
        })
    }

    /// Sets a default TTL (nanoseconds) applied by `insert`/`update` when no
    /// explicit ttl is given. Pass `None` to go back to no default (entries
    /// live until capacity-evicted or removed).
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidTtl`] if `ttl_nanos` is `Some(0)`: a zero
    /// default ttl would make every subsequent default-ttl insert already
    /// expired by the time the next drain runs, the same bug-compat
    /// ambiguity `insert_with_ttl` rejects for an explicit `ttl=0`.
    pub fn set_default_ttl(&mut self, ttl_nanos: Option<u64>) -> Result<(), CacheError> {
        if ttl_nanos == Some(0) {
            return Err(CacheError::InvalidTtl);
        }
        self.default_ttl_nanos = ttl_nanos;
        Ok(())
    }

    /// Installs (or replaces) the eviction callback.
    pub fn set_callback(&mut self, callback: EvictionCallback<K, V>) {
        self.callback = Some(callback);
    }

    /// Removes any installed eviction callback.
    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    fn hash(&self, key: &K) -> u64 {
        let hasher = &mut self.hash_builder.build_hasher();
        key.hash(hasher);
        hasher.finish()
    }

    fn insert_index(&mut self, hash: u64, handle: usize) {
        let Self { ref mut key_index, ref order, ref hash_builder, .. } = *self;
        key_index.insert(hash, handle, move |&h| {
            let hasher = &mut hash_builder.build_hasher();
            order.get(h).key.hash(hasher);
            hasher.finish()
        });
    }

    fn get_handle(&self, hash: u64, key: &K) -> Option<usize> {
        let Self { key_index, order, .. } = self;
        key_index.get(hash, |&h| *key == order.get(h).key).copied()
    }

    /// Erases `handle` from every index and the arena, invoking the
    /// eviction callback (if any) on its way out. Callers are responsible
    /// for having already removed `handle` from whichever index led them to
    /// it (the ttl index, when draining; nothing extra, when evicting by
    /// capacity).
    fn evict(&mut self, handle: usize) -> Result<(), CallbackError> {
        let hash = {
            let key = &self.order.get(handle).key;
            self.hash(key)
        };
        let erased = self.key_index.erase_entry(hash, |&h| h == handle);
        debug_assert!(erased, "evict: handle missing from key index");
        if let Some(deadline) = self.order.get(handle).deadline {
            self.ttl.remove(&deadline);
        }
        let node = self.order.remove(handle);
        match &mut self.callback {
            Some(cb) => cb(&node.key, &node.value),
            None => Ok(()),
        }
    }

    /// Evicts every entry whose deadline has passed. Returns whatever
    /// callback errors were produced along the way, for the caller to fold
    /// into its own result.
    fn drain_expired(&mut self) -> Vec<CallbackError> {
        let now = self.clock.now_nanos();
        let mut errors = Vec::new();
        loop {
            match self.ttl.peek_earliest() {
                Some((deadline, handle)) if deadline.0 <= now => {
                    if let Err(e) = self.evict(handle) {
                        errors.push(e);
                    }
                }
                _ => break,
            }
        }
        errors
    }

    /// Evicts the least-recently-used entry to make room for an insert.
    fn evict_for_capacity(&mut self) -> Result<(), CallbackError> {
        let handle = self.order.back();
        self.evict(handle)
    }

    fn resolve_deadline(&mut self, explicit_ttl_nanos: Option<i64>) -> Result<Option<(u64, u64)>, CacheError> {
        let ttl_nanos = match explicit_ttl_nanos {
            Some(NO_EXPIRY) => return Ok(None),
            Some(n) if n > 0 => Some(n as u64),
            Some(_) => return Err(CacheError::InvalidTtl),
            None => self.default_ttl_nanos,
        };
        Ok(ttl_nanos.map(|nanos| {
            let deadline_nanos = self.clock.now_nanos().saturating_add(nanos);
            let seq = self.ttl.next_seq();
            (deadline_nanos, seq)
        }))
    }

    fn insert_inner(
        &mut self,
        key: K,
        value: V,
        explicit_ttl_nanos: Option<i64>,
    ) -> Result<(), CacheError> {
        let mut errors = self.drain_expired();
        let deadline = match self.resolve_deadline(explicit_ttl_nanos) {
            Ok(d) => d,
            Err(e) => return Err(e),
        };
        let hash = self.hash(&key);
        match self.get_handle(hash, &key) {
            Some(handle) => {
                if let Some(old_deadline) = self.order.get(handle).deadline {
                    self.ttl.remove(&old_deadline);
                }
                {
                    let node = self.order.get_mut(handle);
                    node.value = value;
                    node.deadline = deadline;
                }
                if let Some(d) = deadline {
                    self.ttl.insert(d, handle);
                }
                self.order.move_to_front(handle);
            }
            None => {
                if self.key_index.len() >= self.capacity {
                    if let Err(e) = self.evict_for_capacity() {
                        errors.push(e);
                    }
                }
                let handle = self.order.push_front(Node::new(key, value, deadline));
                self.insert_index(hash, handle);
                if let Some(d) = deadline {
                    self.ttl.insert(d, handle);
                }
            }
        }
        match CacheError::coalesce_callback_errors(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Inserts or overwrites `key`, using the cache's default TTL (if any).
    /// Resets recency and TTL even on overwrite.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), CacheError> {
        self.insert_inner(key, value, None)
    }

    /// Inserts or overwrites `key` with an explicit ttl in nanoseconds, or
    /// [`NO_EXPIRY`] for no expiration.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidTtl`] if `ttl_nanos` is `0` or any
    /// negative value other than [`NO_EXPIRY`].
    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl_nanos: i64) -> Result<(), CacheError> {
        self.insert_inner(key, value, Some(ttl_nanos))
    }

    /// Applies `insert` to every `(key, value)` pair in `mapping`, in the
    /// order it's iterated. Each pair follows the full insert semantics: an
    /// existing key is overwritten with its recency and TTL reset, an absent
    /// key may evict the current least-recently-used entry to make room.
    ///
    /// Callback failures from any pair are coalesced into one
    /// [`CacheError::CallbackFailure`], in the order the evictions occurred;
    /// pairs after a failing one are still applied.
    pub fn update<I>(&mut self, mapping: I) -> Result<(), CacheError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut errors = Vec::new();
        for (key, value) in mapping {
            if let Err(e) = self.insert(key, value) {
                match e {
                    CacheError::CallbackFailure(es) => errors.extend(es),
                    other => return Err(other),
                }
            }
        }
        match CacheError::coalesce_callback_errors(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Reads `key`, marking it most-recently-used.
    ///
    /// # Errors
    /// Returns [`CacheError::KeyNotFound`] if `key` is absent or has expired.
    pub fn get(&mut self, key: &K) -> Result<&V, CacheError> {
        let errors = self.drain_expired();
        let hash = self.hash(key);
        match self.get_handle(hash, key) {
            Some(handle) => {
                self.order.move_to_front(handle);
                self.hits += 1;
                if let Some(e) = CacheError::coalesce_callback_errors(errors) {
                    return Err(e);
                }
                Ok(&self.order.get(handle).value)
            }
            None => {
                self.misses += 1;
                match CacheError::coalesce_callback_errors(errors) {
                    Some(e) => Err(e),
                    None => Err(CacheError::KeyNotFound),
                }
            }
        }
    }

    /// Reads `key`, marking it most-recently-used if present, otherwise
    /// returning `default`. Never fails: any callback errors encountered
    /// while draining expired entries are swallowed, since this method's
    /// signature has nowhere to put them (use `get` if you need to observe
    /// them).
    pub fn get_or<'a>(&'a mut self, key: &K, default: &'a V) -> &'a V {
        let _ = self.drain_expired();
        let hash = self.hash(key);
        match self.get_handle(hash, key) {
            Some(handle) => {
                self.order.move_to_front(handle);
                self.hits += 1;
                &self.order.get(handle).value
            }
            None => {
                self.misses += 1;
                default
            }
        }
    }

    /// Reads `key` without affecting recency or hit/miss counters.
    ///
    /// # Errors
    /// Returns [`CacheError::KeyNotFound`] if `key` is absent or has expired.
    pub fn peek(&mut self, key: &K) -> Result<&V, CacheError> {
        let errors = self.drain_expired();
        let hash = self.hash(key);
        match self.get_handle(hash, key) {
            Some(handle) => {
                if let Some(e) = CacheError::coalesce_callback_errors(errors) {
                    return Err(e);
                }
                Ok(&self.order.get(handle).value)
            }
            None => match CacheError::coalesce_callback_errors(errors) {
                Some(e) => Err(e),
                None => Err(CacheError::KeyNotFound),
            },
        }
    }

    /// Reports whether `key` is present, without affecting recency, hit/miss
    /// counters, or being observable as a `KeyNotFound` error.
    ///
    /// # Errors
    /// Returns [`CacheError::CallbackFailure`] if draining expired entries
    /// ahead of the lookup invoked a failing eviction callback.
    pub fn contains(&mut self, key: &K) -> Result<bool, CacheError> {
        let errors = self.drain_expired();
        let hash = self.hash(key);
        let present = self.get_handle(hash, key).is_some();
        match CacheError::coalesce_callback_errors(errors) {
            Some(e) => Err(e),
            None => Ok(present),
        }
    }

    /// Removes `key`, returning its value if present. Does not invoke the
    /// eviction callback: an explicit `remove` is caller-directed, not an
    /// eviction.
    pub fn remove(&mut self, key: &K) -> Result<V, CacheError> {
        let errors = self.drain_expired();
        let hash = self.hash(key);
        let Self { key_index, order, .. } = self;
        match key_index.remove_entry(hash, |&h| *key == order.get(h).key) {
            Some(handle) => {
                if let Some(deadline) = self.order.get(handle).deadline {
                    self.ttl.remove(&deadline);
                }
                let node = self.order.remove(handle);
                if let Some(e) = CacheError::coalesce_callback_errors(errors) {
                    return Err(e);
                }
                Ok(node.value)
            }
            None => match CacheError::coalesce_callback_errors(errors) {
                Some(e) => Err(e),
                None => Err(CacheError::KeyNotFound),
            },
        }
    }

    /// The most-recently-used `(key, value)` pair, without affecting
    /// recency.
    ///
    /// # Errors
    /// Returns [`CacheError::CallbackFailure`] if draining expired entries
    /// ahead of the lookup invoked a failing eviction callback.
    pub fn peek_first_item(&mut self) -> Result<Option<(&K, &V)>, CacheError> {
        let errors = self.drain_expired();
        if let Some(e) = CacheError::coalesce_callback_errors(errors) {
            return Err(e);
        }
        if self.order.is_empty() {
            return Ok(None);
        }
        let node = self.order.get(self.order.front());
        Ok(Some((&node.key, &node.value)))
    }

    /// The least-recently-used `(key, value)` pair -- the next entry a
    /// capacity eviction would remove -- without affecting recency.
    ///
    /// # Errors
    /// Returns [`CacheError::CallbackFailure`] if draining expired entries
    /// ahead of the lookup invoked a failing eviction callback.
    pub fn peek_last_item(&mut self) -> Result<Option<(&K, &V)>, CacheError> {
        let errors = self.drain_expired();
        if let Some(e) = CacheError::coalesce_callback_errors(errors) {
            return Err(e);
        }
        if self.order.is_empty() {
            return Ok(None);
        }
        let node = self.order.get(self.order.back());
        Ok(Some((&node.key, &node.value)))
    }

    /// Keys from most- to least-recently-used.
    ///
    /// # Errors
    /// Returns [`CacheError::CallbackFailure`] if draining expired entries
    /// ahead of the snapshot invoked a failing eviction callback.
    pub fn keys(&mut self) -> Result<impl Iterator<Item = &K>, CacheError> {
        let errors = self.drain_expired();
        match CacheError::coalesce_callback_errors(errors) {
            Some(e) => Err(e),
            None => Ok(self.order.iter().map(|n| &n.key)),
        }
    }

    /// Values from most- to least-recently-used.
    ///
    /// # Errors
    /// Returns [`CacheError::CallbackFailure`] if draining expired entries
    /// ahead of the snapshot invoked a failing eviction callback.
    pub fn values(&mut self) -> Result<impl Iterator<Item = &V>, CacheError> {
        let errors = self.drain_expired();
        match CacheError::coalesce_callback_errors(errors) {
            Some(e) => Err(e),
            None => Ok(self.order.iter().map(|n| &n.value)),
        }
    }

    /// `(key, value)` pairs from most- to least-recently-used.
    ///
    /// # Errors
    /// Returns [`CacheError::CallbackFailure`] if draining expired entries
    /// ahead of the snapshot invoked a failing eviction callback.
    pub fn items(&mut self) -> Result<impl Iterator<Item = (&K, &V)>, CacheError> {
        let errors = self.drain_expired();
        match CacheError::coalesce_callback_errors(errors) {
            Some(e) => Err(e),
            None => Ok(self.order.iter().map(|n| (&n.key, &n.value))),
        }
    }

    /// Number of live entries, after draining whatever has expired.
    ///
    /// # Errors
    /// Returns [`CacheError::CallbackFailure`] if draining expired entries
    /// invoked a failing eviction callback.
    pub fn len(&mut self) -> Result<usize, CacheError> {
        let errors = self.drain_expired();
        match CacheError::coalesce_callback_errors(errors) {
            Some(e) => Err(e),
            None => Ok(self.key_index.len()),
        }
    }

    /// Whether the cache has any live entries, after draining whatever has
    /// expired.
    ///
    /// # Errors
    /// Returns [`CacheError::CallbackFailure`] if draining expired entries
    /// invoked a failing eviction callback.
    pub fn is_empty(&mut self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    /// The capacity bound set at construction or by the last `set_size`.
    pub fn get_size(&self) -> usize {
        self.capacity
    }

    /// Shrinks or grows the capacity bound. Shrinking evicts
    /// least-recently-used entries (firing the eviction callback for each)
    /// until occupancy fits the new size.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidSize`] if `new_size` is 0.
    pub fn set_size(&mut self, new_size: usize) -> Result<(), CacheError> {
        if new_size == 0 {
            return Err(CacheError::InvalidSize);
        }
        let mut errors = self.drain_expired();
        self.capacity = new_size;
        while self.key_index.len() > self.capacity {
            if let Err(e) = self.evict_for_capacity() {
                errors.push(e);
            }
        }
        match CacheError::coalesce_callback_errors(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Removes every entry without invoking the eviction callback (a clear
    /// is caller-directed, not an eviction) and resets hit/miss counters.
    pub fn clear(&mut self) {
        self.key_index.clear();
        self.order.clear();
        self.ttl.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// A snapshot of hit/miss counters.
    pub fn get_stats(&self) -> Stats {
        Stats { hits: self.hits, misses: self.misses }
    }
}
