//! Forwarding-table configuration files.
//!
//! The CLI keeps the operator's tables in a JSON file and rebuilds a
//! [`NshNode`] from it for every command, so every edit goes through the
//! node's own validation.

use anyhow::{Context, Result};
use rust_nsh_common::header::NshHeader;
use rust_nsh_common::types::{NshMapping, ProxySession};
use rust_nsh_node::NshNode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// On-disk form of the forwarding tables.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub entries: Vec<NshHeader>,

    #[serde(default)]
    pub maps: Vec<NshMapping>,

    /// Live proxy sessions. VXLAN maps respawn their sessions on load;
    /// this list records which of them survived explicit deletes.
    #[serde(default)]
    pub proxy_sessions: Vec<ProxySession>,
}

/// Load a configuration; a missing file is an empty configuration.
pub fn load(path: &Path) -> Result<TableConfig> {
    if !path.exists() {
        return Ok(TableConfig::default());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

/// Persist a node's current tables.
pub fn save(path: &Path, node: &NshNode) -> Result<()> {
    let config = TableConfig {
        entries: node.list_header_entries(),
        maps: node.list_mappings(),
        proxy_sessions: node.list_proxy_sessions(),
    };
    let data = serde_json::to_string_pretty(&config)?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Build a node from a configuration.
///
/// Adding the maps recreates their proxy sessions; sessions the
/// configuration no longer lists were deleted by the operator and are
/// dropped again.
pub fn build_node(config: &TableConfig) -> Result<NshNode> {
    let node = NshNode::new();

    for entry in &config.entries {
        node.add_header_entry(*entry)
            .with_context(|| format!("config entry {}", entry.key))?;
    }
    for map in &config.maps {
        node.add_mapping(*map)
            .with_context(|| format!("config map {}", map.key))?;
    }
    for session in node.list_proxy_sessions() {
        let kept = config
            .proxy_sessions
            .iter()
            .any(|s| s.session_key == session.session_key);
        if !kept {
            node.delete_proxy_session(session.session_key)?;
        }
    }

    Ok(node)
}
