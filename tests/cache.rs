//! End-to-end tests against the public API, using `FakeClock` so the TTL
//! scenarios are deterministic and don't rely on real sleeps.

use boundedcache::clock::FakeClock;
use boundedcache::{Cache, CacheError, NO_EXPIRY};

fn cache<V>(capacity: usize) -> (Cache<i64, V, FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    let cache = Cache::with_clock(capacity, clock.clone()).unwrap();
    (cache, clock)
}

/// Scenario 1: LRU basic.
#[test]
fn lru_basic() {
    let (mut c, _clock) = cache::<i64>(2);
    c.insert(1, 1).unwrap();
    c.insert(2, 2).unwrap();
    c.get(&1).unwrap();
    c.insert(3, 3).unwrap();

    let live: Vec<i64> = c.keys().unwrap().copied().collect();
    assert_eq!(live, vec![3, 1]);
    assert!(matches!(c.get(&2), Err(CacheError::KeyNotFound)));
}

/// Scenario 2: TTL expiry with a cache-wide default ttl.
#[test]
fn ttl_expiry_with_default_ttl() {
    let (mut c, clock) = cache::<i64>(2);
    c.set_default_ttl(Some(20_000_000)).unwrap(); // 20ms in nanoseconds
    c.insert(0, 0).unwrap();
    c.insert(1, 1).unwrap();

    clock.advance(10_000_000); // t=10ms
    assert!(c.contains(&0).unwrap());
    assert!(c.contains(&1).unwrap());

    clock.advance(15_000_000); // t=25ms
    assert!(!c.contains(&0).unwrap());
    assert!(!c.contains(&1).unwrap());
}

/// Scenario 3: mixed per-entry TTLs observed through peek_first/last_item.
#[test]
fn mixed_ttl_peek() {
    let (mut c, clock) = cache::<i64>(2);
    c.insert_with_ttl(0, 0, 80_000_000).unwrap();
    c.insert_with_ttl(1, 1, 20_000_000).unwrap();

    clock.advance(10_000_000); // t=10ms
    assert_eq!(c.peek_first_item().unwrap(), Some((&1, &1)));
    assert_eq!(c.peek_last_item().unwrap(), Some((&0, &0)));

    clock.advance(15_000_000); // t=25ms, key 1 has expired
    assert_eq!(c.peek_first_item().unwrap(), Some((&0, &0)));
    assert_eq!(c.peek_last_item().unwrap(), Some((&0, &0)));

    clock.advance(60_000_000); // t=85ms, both expired
    assert_eq!(c.peek_first_item().unwrap(), None);
}

/// Scenario 4: resize shrink fires the callback for each evicted entry.
#[test]
fn resize_shrink_invokes_callback() {
    let (mut c, _clock) = cache::<i64>(2);
    let evicted = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let evicted_clone = evicted.clone();
    c.set_callback(Box::new(move |k: &i64, v: &i64| {
        evicted_clone.borrow_mut().push((*k, *v));
        Ok(())
    }));

    c.insert(1, 1).unwrap();
    c.insert(2, 2).unwrap();
    assert_eq!(evicted.borrow().len(), 0);

    c.set_size(1).unwrap();
    assert_eq!(*evicted.borrow(), vec![(1, 1)]);
    assert_eq!(c.keys().unwrap().copied().collect::<Vec<_>>(), vec![2]);
}

/// Scenario 5: overwriting a key resets its TTL deadline.
#[test]
fn overwrite_resets_ttl() {
    let (mut c, clock) = cache::<i64>(2);
    c.set_default_ttl(Some(20_000_000)).unwrap();
    c.insert(1, 1).unwrap(); // t=0

    clock.advance(10_000_000); // t=10ms
    c.insert(1, 2).unwrap(); // deadline reset to t=30ms

    clock.advance(15_000_000); // t=25ms
    assert_eq!(*c.get(&1).unwrap(), 2);

    clock.advance(10_000_000); // t=35ms
    assert!(matches!(c.get(&1), Err(CacheError::KeyNotFound)));
}

/// Scenario 6: hit/miss stats track get/get_or traffic and reset on clear.
#[test]
fn stats_scenario() {
    let (mut c, _clock) = cache::<i64>(10);
    for i in 0..9 {
        c.insert(i, i).unwrap();
    }
    assert_eq!((c.get_stats().hits, c.get_stats().misses), (0, 0));

    c.get(&0).unwrap();
    assert_eq!((c.get_stats().hits, c.get_stats().misses), (1, 0));

    let default = -1;
    c.get_or(&0, &default);
    assert_eq!((c.get_stats().hits, c.get_stats().misses), (2, 0));

    c.get_or(&-1, &default);
    assert_eq!((c.get_stats().hits, c.get_stats().misses), (2, 1));

    assert!(matches!(c.get(&-2), Err(CacheError::KeyNotFound)));
    assert_eq!((c.get_stats().hits, c.get_stats().misses), (2, 2));

    c.clear();
    assert_eq!((c.get_stats().hits, c.get_stats().misses), (0, 0));
}

/// P1: occupancy never exceeds capacity, across interleaved inserts and
/// overwrites.
#[test]
fn property_capacity_never_exceeded() {
    let (mut c, _clock) = cache::<i64>(3);
    for i in 0..50 {
        c.insert(i % 7, i).unwrap();
        assert!(c.len().unwrap() <= 3);
    }
}

/// P2: accessing a live key always brings it to the front of recency order.
#[test]
fn property_access_moves_to_front() {
    let (mut c, _clock) = cache::<i64>(4);
    for i in 0..4 {
        c.insert(i, i).unwrap();
    }
    for i in 0..4 {
        c.get(&i).unwrap();
        assert_eq!(c.peek_first_item().unwrap(), Some((&i, &i)));
    }
}

/// P3: a finite-ttl key is observable exactly up to its deadline, not after.
#[test]
fn property_ttl_roundtrip_boundary() {
    let (mut c, clock) = cache::<i64>(1);
    c.insert_with_ttl(0, 0, 100).unwrap();
    clock.advance(99);
    assert!(c.contains(&0).unwrap());
    clock.advance(1); // now == deadline
    assert!(!c.contains(&0).unwrap());
}

/// P4: dropped values run their destructor exactly once, whether evicted,
/// removed, or dropped along with the whole cache.
#[test]
fn property_values_drop_exactly_once() {
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter(Rc<Cell<u32>>);
    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    let counter = Rc::new(Cell::new(0));
    {
        let (mut c, _clock) = cache::<DropCounter>(1);
        c.insert(1, DropCounter(counter.clone())).unwrap();
        c.insert(2, DropCounter(counter.clone())).unwrap(); // evicts key 1
        assert_eq!(counter.get(), 1);
        let removed = c.remove(&2).unwrap();
        assert_eq!(counter.get(), 1);
        drop(removed);
        assert_eq!(counter.get(), 2);
    }
    assert_eq!(counter.get(), 2);
}

/// P6: the eviction callback fires only for capacity/TTL/resize evictions,
/// never for overwrite, explicit remove, or clear.
#[test]
fn property_callback_fires_only_on_eviction() {
    let (mut c, _clock) = cache::<i64>(1);
    let calls = std::rc::Rc::new(std::cell::Cell::new(0u32));
    let calls_clone = calls.clone();
    c.set_callback(Box::new(move |_k: &i64, _v: &i64| {
        calls_clone.set(calls_clone.get() + 1);
        Ok(())
    }));

    c.insert(1, 1).unwrap();
    c.insert(1, 2).unwrap(); // overwrite, no callback
    assert_eq!(calls.get(), 0);

    c.remove(&1).unwrap(); // explicit remove, no callback
    assert_eq!(calls.get(), 0);

    c.insert(1, 1).unwrap();
    c.clear(); // clear, no callback
    assert_eq!(calls.get(), 0);

    c.insert(1, 1).unwrap();
    c.insert(2, 2).unwrap(); // capacity eviction of key 1
    assert_eq!(calls.get(), 1);
}

/// Callback failures are surfaced on the triggering operation without
/// rolling back the eviction that already happened.
#[test]
fn callback_failure_does_not_roll_back_eviction() {
    let (mut c, clock) = cache::<i64>(1);
    c.insert_with_ttl(1, 1, 50).unwrap();
    c.set_callback(Box::new(|_k: &i64, _v: &i64| Err("callback exploded".into())));

    clock.advance(100); // key 1 is now expired
    let result = c.insert(2, 2);

    assert!(matches!(result, Err(CacheError::CallbackFailure(_))));
    assert_eq!(*c.get(&2).unwrap(), 2);
    assert!(matches!(c.get(&1), Err(CacheError::KeyNotFound)));
}

#[test]
fn zero_ttl_is_rejected_as_invalid() {
    let (mut c, _clock) = cache::<i64>(1);
    assert!(matches!(c.insert_with_ttl(1, 1, 0), Err(CacheError::InvalidTtl)));
}

#[test]
fn no_expiry_sentinel_survives_indefinitely() {
    let (mut c, clock) = cache::<i64>(1);
    c.insert_with_ttl(1, 1, NO_EXPIRY).unwrap();
    clock.advance(u64::from(u32::MAX));
    assert!(c.contains(&1).unwrap());
}

#[test]
fn zero_capacity_construction_is_rejected() {
    assert!(matches!(Cache::<i64, i64>::new(0), Err(CacheError::InvalidCapacity)));
}

#[test]
fn set_size_zero_is_rejected() {
    let (mut c, _clock) = cache::<i64>(2);
    assert!(matches!(c.set_size(0), Err(CacheError::InvalidSize)));
}

/// `update` applies insert semantics to a whole mapping, in order: existing
/// keys are overwritten with recency/TTL reset, new keys can evict.
#[test]
fn update_applies_insert_to_every_pair() {
    let (mut c, _clock) = cache::<i64>(2);
    c.insert(1, 1).unwrap();
    c.update(vec![(1, 10), (2, 20)]).unwrap();

    assert_eq!(c.keys().unwrap().copied().collect::<Vec<_>>(), vec![2, 1]);
    assert_eq!(*c.get(&1).unwrap(), 10);
    assert_eq!(*c.get(&2).unwrap(), 20);
}
