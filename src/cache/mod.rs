//! Bounded in-memory caches for hot lookups (user identities, session records).

pub mod lru;

pub use lru::LruCache;

pub use crate::utils::CacheError;

#[cfg(test)]
mod tests;
