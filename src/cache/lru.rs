use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::utils::CacheError;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// Recency list threaded through a slab; `head` is most recently used.
#[derive(Debug)]
struct Inner<K, V> {
    map: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

/// Capacity-bounded, thread-safe LRU cache.
///
/// `get` and `put` both promote an entry to most recently used. A `put` of a
/// new key into a full cache evicts exactly the least recently used entry
/// first. All operations take one lock and run in O(1).
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner {
                map: HashMap::with_capacity(capacity),
                nodes: Vec::with_capacity(capacity),
                free: Vec::new(),
                head: NIL,
                tail: NIL,
            }),
        })
    }

    /// Inserts or replaces `key`. Returns the evicted entry, if any.
    pub fn put(&self, key: K, value: V) -> Option<(K, V)> {
        let mut inner = self.lock();

        if let Some(&idx) = inner.map.get(&key) {
            inner.nodes[idx].value = value;
            inner.promote(idx);
            return None;
        }

        let evicted = if inner.map.len() >= self.capacity {
            inner.evict_tail()
        } else {
            None
        };

        let node = Node {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        };
        let idx = match inner.free.pop() {
            Some(idx) => {
                inner.nodes[idx] = node;
                idx
            }
            None => {
                inner.nodes.push(node);
                inner.nodes.len() - 1
            }
        };
        inner.push_front(idx);
        inner.map.insert(key, idx);
        evicted
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let idx = *inner.map.get(key)?;
        inner.promote(idx);
        Some(inner.nodes[idx].value.clone())
    }

    /// Lookup that leaves recency untouched.
    pub fn peek(&self, key: &K) -> Option<V> {
        let inner = self.lock();
        inner.map.get(key).map(|&idx| inner.nodes[idx].value.clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().map.contains_key(key)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let idx = inner.map.remove(key)?;
        inner.unlink(idx);
        inner.free.push(idx);
        Some(inner.nodes[idx].value.clone())
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.nodes.clear();
        inner.free.clear();
        inner.head = NIL;
        inner.tail = NIL;
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        let inner = self.lock();
        let mut keys = Vec::with_capacity(inner.map.len());
        let mut cursor = inner.head;
        while cursor != NIL {
            keys.push(inner.nodes[cursor].key.clone());
            cursor = inner.nodes[cursor].next;
        }
        keys
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            NIL => self.head = next,
            p => self.nodes[p].next = next,
        }
        match next {
            NIL => self.tail = prev,
            n => self.nodes[n].prev = prev,
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn promote(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn evict_tail(&mut self) -> Option<(K, V)> {
        let idx = self.tail;
        if idx == NIL {
            return None;
        }
        self.unlink(idx);
        self.free.push(idx);
        let node = &self.nodes[idx];
        self.map.remove(&node.key);
        Some((node.key.clone(), node.value.clone()))
    }
}
