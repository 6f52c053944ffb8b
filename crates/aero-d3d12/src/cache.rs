//! Hash-keyed cache shared by the root-signature and pipeline-state caches.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use xxhash_rust::xxh64::Xxh64;

use crate::error::CacheError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// xxHash64 of the `Hash` encoding of `value`. Stable for the lifetime of the process.
pub(crate) fn stable_hash64<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = Xxh64::new(0);
    value.hash(&mut hasher);
    hasher.finish()
}

fn default_hasher<K: Hash>(key: &K) -> u64 {
    stable_hash64(key)
}

/// Maps a 64-bit key hash to the key it was computed from and a cached value.
///
/// Entries are never evicted. With collision verification enabled, a hit whose stored key differs
/// from the requested key is reported as [`CacheError::HashCollision`]; without it the stored
/// value is returned on hash equality alone.
pub struct ContentCache<K, V> {
    name: &'static str,
    entries: HashMap<u64, (K, V)>,
    hasher: fn(&K) -> u64,
    verify_collisions: bool,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V: Clone> ContentCache<K, V> {
    pub fn new(name: &'static str, verify_collisions: bool) -> Self {
        Self::with_hasher(name, verify_collisions, default_hasher::<K>)
    }

    /// Uses `hasher` instead of xxHash64 to derive key hashes.
    pub fn with_hasher(
        name: &'static str,
        verify_collisions: bool,
        hasher: fn(&K) -> u64,
    ) -> Self {
        Self {
            name,
            entries: HashMap::new(),
            hasher,
            verify_collisions,
            hits: 0,
            misses: 0,
        }
    }

    pub fn hash_key(&self, key: &K) -> u64 {
        (self.hasher)(key)
    }

    /// Returns the value cached under `hash`, if any.
    pub fn lookup(&mut self, hash: u64, key: &K) -> Result<Option<V>, CacheError> {
        let Some((stored, value)) = self.entries.get(&hash) else {
            self.misses += 1;
            return Ok(None);
        };

        if self.verify_collisions && stored != key {
            tracing::error!(cache = self.name, hash, "hash collision");
            return Err(CacheError::HashCollision {
                cache: self.name,
                hash,
            });
        }

        self.hits += 1;
        tracing::trace!(cache = self.name, hash, "cache hit");
        Ok(Some(value.clone()))
    }

    /// Stores `value` under `hash`, replacing any previous entry.
    pub fn insert(&mut self, hash: u64, key: K, value: V) {
        if self.entries.insert(hash, (key, value)).is_some() {
            tracing::debug!(cache = self.name, hash, "replaced entry");
        }
    }

    /// Returns the cached value for `hash`, or builds one with `make` and caches it.
    ///
    /// Failures from `make` are returned unchanged and nothing is cached.
    pub fn get_or_try_insert_with<E, F>(&mut self, hash: u64, key: K, make: F) -> Result<V, E>
    where
        E: From<CacheError>,
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.lookup(hash, &key)? {
            return Ok(value);
        }
        let value = make(&key)?;
        self.insert(hash, key, value.clone());
        Ok(value)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> std::fmt::Debug for ContentCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("verify_collisions", &self.verify_collisions)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}
