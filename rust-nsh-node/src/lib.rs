//! Userspace NSH forwarding node.
//!
//! This crate provides the process-wide forwarding-table context (header
//! entries, mappings and proxy sessions), the control-plane operations that
//! mutate it and the batch packet-rewrite engine that reads it.

use log::info;
use rust_nsh_common::error::Error;
use rust_nsh_common::header::NshHeader;
use rust_nsh_common::metrics::NshMetrics;
use rust_nsh_common::types::{
    NshMapping, ProxySession, ProxySessionKey, ServicePathKey,
};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod engine;
pub mod packet;
pub mod tables;

pub use engine::{EgressDecision, IngressMode, Outcome, TraceSink};
pub use packet::{Packet, PacketBuf};

use tables::NshTables;

/// The forwarding node: shared tables plus metrics.
///
/// Constructed once at startup and handed by reference into whatever runs
/// the control plane and the rewrite workers; there is no ambient global.
/// Control mutations take the write lock for the duration of one
/// transaction, batches take the read lock for the duration of one batch,
/// so a reader never observes a partially applied mutation.
pub struct NshNode {
    tables: Arc<RwLock<NshTables>>,
    metrics: Arc<NshMetrics>,
}

impl NshNode {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(NshTables::new())),
            metrics: Arc::new(NshMetrics::new()),
        }
    }

    /* ------------------------------------------------------------ *
     * Header entry control plane
     * ------------------------------------------------------------ */

    /// Store a header entry. Returns the entry's slot handle.
    pub fn add_header_entry(&self, header: NshHeader) -> Result<u32, Error> {
        let mut tables = self.write_tables();
        let index = tables.add_entry(header)?;
        self.metrics.header_entries.set(tables.entry_count() as u64);
        drop(tables);

        info!("added nsh entry {} (index {})", header.key, index);
        Ok(index)
    }

    pub fn delete_header_entry(&self, key: ServicePathKey) -> Result<(), Error> {
        let mut tables = self.write_tables();
        tables.delete_entry(key)?;
        self.metrics.header_entries.set(tables.entry_count() as u64);
        drop(tables);

        info!("deleted nsh entry {}", key);
        Ok(())
    }

    pub fn list_header_entries(&self) -> Vec<NshHeader> {
        self.read_tables().entries().copied().collect()
    }

    /* ------------------------------------------------------------ *
     * Mapping control plane
     * ------------------------------------------------------------ */

    /// Add a forwarding mapping (and, for VXLAN egress, its proxy
    /// session). Returns the mapping's slot handle.
    pub fn add_mapping(&self, map: NshMapping) -> Result<u32, Error> {
        let mut tables = self.write_tables();
        let index = tables.add_mapping(map)?;
        self.metrics.mappings.set(tables.mapping_count() as u64);
        self.metrics
            .proxy_sessions
            .set(tables.proxy_session_count() as u64);
        drop(tables);

        info!("added nsh mapping {} (index {})", map.key, index);
        Ok(index)
    }

    pub fn delete_mapping(&self, key: ServicePathKey) -> Result<(), Error> {
        let mut tables = self.write_tables();
        tables.delete_mapping(key)?;
        self.metrics.mappings.set(tables.mapping_count() as u64);
        self.metrics
            .proxy_sessions
            .set(tables.proxy_session_count() as u64);
        drop(tables);

        info!("deleted nsh mapping {}", key);
        Ok(())
    }

    pub fn list_mappings(&self) -> Vec<NshMapping> {
        self.read_tables().mappings().copied().collect()
    }

    /* ------------------------------------------------------------ *
     * Proxy session control plane
     * ------------------------------------------------------------ */

    pub fn delete_proxy_session(&self, key: ProxySessionKey) -> Result<(), Error> {
        let mut tables = self.write_tables();
        tables.delete_proxy_session(key)?;
        self.metrics
            .proxy_sessions
            .set(tables.proxy_session_count() as u64);
        drop(tables);

        info!("deleted nsh proxy session {}", key);
        Ok(())
    }

    pub fn list_proxy_sessions(&self) -> Vec<ProxySession> {
        self.read_tables().proxy_sessions().copied().collect()
    }

    /* ------------------------------------------------------------ *
     * Shared state accessors
     * ------------------------------------------------------------ */

    /// Node metrics: engine outcome counters and table-size gauges.
    pub fn metrics(&self) -> &NshMetrics {
        &self.metrics
    }

    /// Clonable handle to the metrics, for long-lived observers.
    pub fn metrics_handle(&self) -> Arc<NshMetrics> {
        Arc::clone(&self.metrics)
    }

    pub(crate) fn read_tables(&self) -> RwLockReadGuard<'_, NshTables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_tables(&self) -> RwLockWriteGuard<'_, NshTables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for NshNode {
    fn default() -> Self {
        Self::new()
    }
}
