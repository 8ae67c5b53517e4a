//! The three record stores backing the forwarding tables.
//!
//! Each store is a slot-recycling pool of records plus a hash index from
//! logical key to slot handle. Handles are stable while the record lives,
//! but slots are reused after deletion, so readers always go through the
//! hash index and never cache raw slot positions across a mutation.

use rust_nsh_common::error::Error;
use rust_nsh_common::header::{NshHeader, NSH_MD1_WORDS, NSH_MD_TYPE_1};
use rust_nsh_common::types::{
    NshMapping, ProxySession, ProxySessionKey, ServicePathKey,
};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/* ---------------------------------------------------------------- *
 * Slot pool
 * ---------------------------------------------------------------- */

#[derive(Debug)]
struct SlotPool<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> SlotPool<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, value: T) -> u32 {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn remove(&mut self, index: u32) -> Option<T> {
        let value = self.slots.get_mut(index as usize)?.take()?;
        self.free.push(index);
        Some(value)
    }

    fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize)?.as_ref()
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/* ---------------------------------------------------------------- *
 * Keyed store: pool + hash index
 * ---------------------------------------------------------------- */

#[derive(Debug)]
struct KeyedStore<K, V> {
    pool: SlotPool<V>,
    by_key: HashMap<K, u32>,
}

impl<K: Copy + Eq + Hash + Display, V> KeyedStore<K, V> {
    fn new() -> Self {
        Self {
            pool: SlotPool::new(),
            by_key: HashMap::new(),
        }
    }

    fn add(&mut self, key: K, value: V) -> Result<u32, Error> {
        if self.by_key.contains_key(&key) {
            return Err(Error::DuplicateKey(key.to_string()));
        }
        let index = self.pool.insert(value);
        self.by_key.insert(key, index);
        Ok(index)
    }

    fn delete(&mut self, key: K) -> Result<V, Error> {
        // Unhook the index first: no reader may observe a hash entry whose
        // slot has already been freed.
        let index = self
            .by_key
            .remove(&key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        self.pool
            .remove(index)
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    fn get(&self, key: K) -> Option<&V> {
        self.pool.get(*self.by_key.get(&key)?)
    }

    fn contains(&self, key: K) -> bool {
        self.by_key.contains_key(&key)
    }

    fn iter(&self) -> impl Iterator<Item = &V> {
        self.pool.iter()
    }

    fn len(&self) -> usize {
        self.pool.len()
    }
}

/* ---------------------------------------------------------------- *
 * Forwarding tables
 * ---------------------------------------------------------------- */

/// The forwarding-table state: header entries, mappings and proxy sessions.
///
/// All mutation goes through the methods here; the mapping/proxy-session
/// composite transaction validates every precondition before committing
/// either record, so a failed add leaves no partial state behind.
#[derive(Debug)]
pub struct NshTables {
    entries: KeyedStore<ServicePathKey, NshHeader>,
    mappings: KeyedStore<ServicePathKey, NshMapping>,
    proxy_sessions: KeyedStore<ProxySessionKey, ProxySession>,
}

impl NshTables {
    pub fn new() -> Self {
        Self {
            entries: KeyedStore::new(),
            mappings: KeyedStore::new(),
            proxy_sessions: KeyedStore::new(),
        }
    }

    /// Store a header entry, keyed by its own service-path key.
    ///
    /// Only fixed-length MD type 1 headers are storable; anything else is
    /// rejected here so the data path never sees an unsupported layout.
    pub fn add_entry(&mut self, header: NshHeader) -> Result<u32, Error> {
        if header.md_type != NSH_MD_TYPE_1 {
            return Err(Error::InvalidArgument(format!(
                "md-type {} not supported, only md-type 1",
                header.md_type
            )));
        }
        if header.length != NSH_MD1_WORDS {
            return Err(Error::InvalidArgument(format!(
                "md-type 1 header must be {} words, got {}",
                NSH_MD1_WORDS, header.length
            )));
        }
        self.entries.add(header.key, header)
    }

    pub fn delete_entry(&mut self, key: ServicePathKey) -> Result<(), Error> {
        self.entries.delete(key).map(|_| ())
    }

    pub fn entry(&self, key: ServicePathKey) -> Option<&NshHeader> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &NshHeader> {
        self.entries.iter()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Add a forwarding mapping.
    ///
    /// A mapping whose egress is VXLAN-v4/v6 also creates the proxy session
    /// for its `(selector, egress interface)` tunnel, with the session's NSI
    /// one below the mapping's. The whole operation is atomic: every
    /// precondition is checked before either record is inserted.
    pub fn add_mapping(&mut self, map: NshMapping) -> Result<u32, Error> {
        if self.mappings.contains(map.key) {
            return Err(Error::DuplicateKey(map.key.to_string()));
        }

        let proxy = if map.next_hop.needs_proxy_session() {
            let session_key = ProxySessionKey {
                transport: map.next_hop,
                sw_if_index: map.sw_if_index,
            };
            let key = map.key.decrement_index().ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "proxy session for {} needs a service index above 0",
                    map.key
                ))
            })?;
            if self.proxy_sessions.contains(session_key) {
                return Err(Error::DuplicateKey(session_key.to_string()));
            }
            Some(ProxySession { session_key, key })
        } else {
            None
        };

        let index = self.mappings.add(map.key, map)?;
        if let Some(proxy) = proxy {
            self.proxy_sessions.add(proxy.session_key, proxy)?;
        }
        Ok(index)
    }

    /// Delete a mapping, cascading to the proxy session it created.
    pub fn delete_mapping(&mut self, key: ServicePathKey) -> Result<(), Error> {
        let map = self.mappings.delete(key)?;
        if map.next_hop.needs_proxy_session() {
            let session_key = ProxySessionKey {
                transport: map.next_hop,
                sw_if_index: map.sw_if_index,
            };
            // The session may already have been removed explicitly.
            let _ = self.proxy_sessions.delete(session_key);
        }
        Ok(())
    }

    pub fn mapping(&self, key: ServicePathKey) -> Option<&NshMapping> {
        self.mappings.get(key)
    }

    pub fn mappings(&self) -> impl Iterator<Item = &NshMapping> {
        self.mappings.iter()
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }

    pub fn proxy_session(&self, key: ProxySessionKey) -> Option<&ProxySession> {
        self.proxy_sessions.get(key)
    }

    pub fn delete_proxy_session(&mut self, key: ProxySessionKey) -> Result<(), Error> {
        self.proxy_sessions.delete(key).map(|_| ())
    }

    pub fn proxy_sessions(&self) -> impl Iterator<Item = &ProxySession> {
        self.proxy_sessions.iter()
    }

    pub fn proxy_session_count(&self) -> usize {
        self.proxy_sessions.len()
    }
}

impl Default for NshTables {
    fn default() -> Self {
        Self::new()
    }
}
