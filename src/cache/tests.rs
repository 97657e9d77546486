use std::sync::Arc;

use super::*;

#[test]
fn test_zero_capacity_is_rejected() {
    assert_eq!(LruCache::<String, u32>::new(0).unwrap_err(), CacheError::ZeroCapacity);
}

#[test]
fn test_put_get_remove() {
    let cache = LruCache::new(4).unwrap();
    assert!(cache.is_empty());
    assert_eq!(cache.put("a", 1), None);
    assert_eq!(cache.put("b", 2), None);
    assert_eq!(cache.get(&"a"), Some(1));
    assert_eq!(cache.len(), 2);

    assert_eq!(cache.put("a", 10), None);
    assert_eq!(cache.get(&"a"), Some(10));
    assert_eq!(cache.len(), 2);

    assert_eq!(cache.remove(&"a"), Some(10));
    assert_eq!(cache.remove(&"a"), None);
    assert_eq!(cache.get(&"a"), None);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.capacity(), 4);
}

#[test]
fn test_overflow_evicts_least_recently_used() {
    let cache = LruCache::new(3).unwrap();
    cache.put(1, "one");
    cache.put(2, "two");
    cache.put(3, "three");

    assert_eq!(cache.put(4, "four"), Some((1, "one")));
    assert_eq!(cache.len(), 3);
    assert!(!cache.contains(&1));
    assert_eq!(cache.keys(), vec![4, 3, 2]);
}

#[test]
fn test_get_refreshes_recency() {
    let cache = LruCache::new(3).unwrap();
    cache.put(1, ());
    cache.put(2, ());
    cache.put(3, ());

    assert_eq!(cache.get(&1), Some(()));
    assert_eq!(cache.put(4, ()), Some((2, ())));
    assert!(cache.contains(&1));
    assert_eq!(cache.keys(), vec![4, 1, 3]);
}

#[test]
fn test_put_existing_key_refreshes_recency() {
    let cache = LruCache::new(2).unwrap();
    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("a", 3);

    assert_eq!(cache.put("c", 4), Some(("b", 2)));
    assert_eq!(cache.keys(), vec!["c", "a"]);
}

#[test]
fn test_peek_does_not_refresh() {
    let cache = LruCache::new(2).unwrap();
    cache.put("a", 1);
    cache.put("b", 2);

    assert_eq!(cache.peek(&"a"), Some(1));
    assert_eq!(cache.put("c", 3), Some(("a", 1)));
}

#[test]
fn test_removed_slots_are_reused() {
    let cache = LruCache::new(2).unwrap();
    cache.put("a", 1);
    cache.put("b", 2);
    cache.remove(&"a");
    cache.put("c", 3);

    assert_eq!(cache.put("d", 4), Some(("b", 2)));
    assert_eq!(cache.keys(), vec!["d", "c"]);
}

#[test]
fn test_clear() {
    let cache = LruCache::new(2).unwrap();
    cache.put("a", 1);
    cache.put("b", 2);
    cache.clear();

    assert!(cache.is_empty());
    assert!(cache.keys().is_empty());
    cache.put("c", 3);
    assert_eq!(cache.get(&"c"), Some(3));
}

#[test]
fn test_capacity_one() {
    let cache = LruCache::new(1).unwrap();
    cache.put("a", 1);
    assert_eq!(cache.put("b", 2), Some(("a", 1)));
    assert_eq!(cache.get(&"b"), Some(2));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_concurrent_access_respects_capacity() {
    let cache = Arc::new(LruCache::new(16).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..500 {
                    cache.put(format!("{t}-{i}"), i);
                    cache.get(&format!("{t}-{}", i / 2));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 16);
    assert_eq!(cache.keys().len(), 16);
}
