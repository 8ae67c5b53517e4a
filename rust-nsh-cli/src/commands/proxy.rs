//! Proxy session command implementation for the NSH CLI

use anyhow::{bail, Context, Result};
use rust_nsh_common::types::{NextHop, ProxySessionKey};
use std::path::Path;

use crate::{config, ProxyCommands};

/// Handle proxy-session commands
pub fn handle_command(config_path: &Path, cmd: ProxyCommands) -> Result<()> {
    match cmd {
        ProxyCommands::Remove {
            transport,
            sw_if_index,
        } => remove_session(config_path, &transport, sw_if_index),
        ProxyCommands::Show { json } => show_sessions(config_path, json),
    }
}

fn remove_session(config_path: &Path, transport: &str, sw_if_index: u32) -> Result<()> {
    let transport = match transport {
        "vxlan4" => NextHop::Vxlan4,
        "vxlan6" => NextHop::Vxlan6,
        other => bail!("unknown transport '{}', expected vxlan4|vxlan6", other),
    };
    let key = ProxySessionKey {
        transport,
        sw_if_index,
    };

    let node = config::build_node(&config::load(config_path)?)?;
    node.delete_proxy_session(key)
        .context("failed to remove nsh proxy session")?;
    config::save(config_path, &node)?;

    println!("Removed proxy session: {}", key);
    Ok(())
}

fn show_sessions(config_path: &Path, json: bool) -> Result<()> {
    let node = config::build_node(&config::load(config_path)?)?;
    let sessions = node.list_proxy_sessions();

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No nsh proxy sessions configured.");
        return Ok(());
    }
    for session in sessions {
        println!("{}", session);
    }
    Ok(())
}
