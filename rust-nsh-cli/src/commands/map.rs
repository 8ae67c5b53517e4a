//! Forwarding mapping command implementation for the NSH CLI

use anyhow::{bail, Context, Result};
use rust_nsh_common::types::{NextHop, NshAction, NshMapping, ServicePathKey};
use std::path::Path;

use crate::{config, MapCommands};

/// Handle mapping-related commands
pub fn handle_command(config_path: &Path, cmd: MapCommands) -> Result<()> {
    match cmd {
        MapCommands::Add {
            nsp,
            nsi,
            mapped_nsp,
            mapped_nsi,
            action,
            encap_gre_intf,
            encap_vxlan_gpe_intf,
            encap_vxlan4_intf,
            encap_vxlan6_intf,
            encap_none,
        } => {
            let (next_hop, sw_if_index) = next_hop_from_args(
                encap_gre_intf,
                encap_vxlan_gpe_intf,
                encap_vxlan4_intf,
                encap_vxlan6_intf,
                encap_none,
            )?;
            let map = NshMapping {
                key: ServicePathKey::new(nsp, nsi),
                mapped_key: ServicePathKey::new(mapped_nsp, mapped_nsi),
                action: action.parse::<NshAction>()?,
                sw_if_index,
                next_hop,
            };
            add_map(config_path, map)
        }
        MapCommands::Remove { nsp, nsi } => remove_map(config_path, nsp, nsi),
        MapCommands::Show { json } => show_maps(config_path, json),
    }
}

/// Resolve the encap-* selector arguments into one egress choice
fn next_hop_from_args(
    gre: Option<u32>,
    vxlan_gpe: Option<u32>,
    vxlan4: Option<u32>,
    vxlan6: Option<u32>,
    none: bool,
) -> Result<(NextHop, u32)> {
    let mut selected = Vec::new();
    if let Some(intf) = gre {
        selected.push((NextHop::Gre, intf));
    }
    if let Some(intf) = vxlan_gpe {
        selected.push((NextHop::VxlanGpe, intf));
    }
    if let Some(intf) = vxlan4 {
        selected.push((NextHop::Vxlan4, intf));
    }
    if let Some(intf) = vxlan6 {
        selected.push((NextHop::Vxlan6, intf));
    }
    if none {
        selected.push((NextHop::Drop, 0));
    }

    match selected.as_slice() {
        [one] => Ok(*one),
        [] => bail!(
            "must specify one of --encap-gre-intf, --encap-vxlan-gpe-intf, \
             --encap-vxlan4-intf, --encap-vxlan6-intf, --encap-none"
        ),
        _ => bail!("only one encapsulation selector may be given"),
    }
}

/// Add a mapping to the configured tables
fn add_map(config_path: &Path, map: NshMapping) -> Result<()> {
    let node = config::build_node(&config::load(config_path)?)?;

    node.add_mapping(map).context("failed to add nsh mapping")?;
    config::save(config_path, &node)?;

    println!("Added mapping: {}", map);
    if map.next_hop.needs_proxy_session() {
        println!(
            "Created proxy session: {} intf {}",
            map.next_hop, map.sw_if_index
        );
    }
    Ok(())
}

/// Remove a mapping from the configured tables
fn remove_map(config_path: &Path, nsp: u32, nsi: u8) -> Result<()> {
    let node = config::build_node(&config::load(config_path)?)?;
    let key = ServicePathKey::new(nsp, nsi);

    node.delete_mapping(key)
        .context("failed to remove nsh mapping")?;
    config::save(config_path, &node)?;

    println!("Removed mapping: {}", key);
    Ok(())
}

/// Show all mappings
fn show_maps(config_path: &Path, json: bool) -> Result<()> {
    let node = config::build_node(&config::load(config_path)?)?;
    let maps = node.list_mappings();

    if json {
        println!("{}", serde_json::to_string_pretty(&maps)?);
        return Ok(());
    }

    if maps.is_empty() {
        println!("No nsh maps configured.");
        return Ok(());
    }
    for map in maps {
        let role = if map.is_sff() { "sff" } else { "sf" };
        println!("{} ({})", map, role);
    }
    Ok(())
}
