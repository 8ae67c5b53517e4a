//! Header entry command implementation for the NSH CLI

use anyhow::{bail, Context, Result};
use log::info;
use rust_nsh_common::header::{
    NshHeader, NSH_NEXT_PROTO_ETHERNET, NSH_NEXT_PROTO_IP4, NSH_NEXT_PROTO_IP6,
};
use rust_nsh_common::types::ServicePathKey;
use std::path::Path;

use crate::{config, utils, EntryCommands, EntryFields};

/// Handle entry-related commands
pub fn handle_command(config_path: &Path, cmd: EntryCommands) -> Result<()> {
    match cmd {
        EntryCommands::Add { fields } => add_entry(config_path, &fields),
        EntryCommands::Remove { nsp, nsi } => remove_entry(config_path, nsp, nsi),
        EntryCommands::Show { json } => show_entries(config_path, json),
        EntryCommands::Encode { fields } => encode_entry(&fields),
    }
}

fn header_from_fields(fields: &EntryFields) -> Result<NshHeader> {
    let next_protocol = match fields.next_protocol.as_str() {
        "ip4" => NSH_NEXT_PROTO_IP4,
        "ip6" => NSH_NEXT_PROTO_IP6,
        "ethernet" => NSH_NEXT_PROTO_ETHERNET,
        other => bail!(
            "unknown next protocol '{}', expected ip4|ip6|ethernet",
            other
        ),
    };

    let mut hdr = NshHeader::md1(
        ServicePathKey::new(fields.nsp, fields.nsi),
        next_protocol,
        [fields.c1, fields.c2, fields.c3, fields.c4],
    );
    hdr.version = fields.version & 0x3;
    hdr.o_bit = fields.o_bit;
    hdr.c_bit = fields.c_bit;
    Ok(hdr)
}

/// Add a header entry to the configured tables
fn add_entry(config_path: &Path, fields: &EntryFields) -> Result<()> {
    let node = config::build_node(&config::load(config_path)?)?;
    let hdr = header_from_fields(fields)?;

    node.add_header_entry(hdr)
        .context("failed to add nsh entry")?;
    config::save(config_path, &node)?;

    info!("entry {} written to {}", hdr.key, config_path.display());
    println!("Added entry: {}", hdr.key);
    Ok(())
}

/// Remove a header entry from the configured tables
fn remove_entry(config_path: &Path, nsp: u32, nsi: u8) -> Result<()> {
    let node = config::build_node(&config::load(config_path)?)?;
    let key = ServicePathKey::new(nsp, nsi);

    node.delete_header_entry(key)
        .context("failed to remove nsh entry")?;
    config::save(config_path, &node)?;

    println!("Removed entry: {}", key);
    Ok(())
}

/// Show all header entries
fn show_entries(config_path: &Path, json: bool) -> Result<()> {
    let node = config::build_node(&config::load(config_path)?)?;
    let entries = node.list_header_entries();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No nsh entries configured.");
        return Ok(());
    }
    for entry in entries {
        println!("{}", entry);
    }
    Ok(())
}

/// Print a header's wire encoding without storing it
fn encode_entry(fields: &EntryFields) -> Result<()> {
    let hdr = header_from_fields(fields)?;
    println!("{}", utils::format_hex(&hdr.to_bytes()));
    Ok(())
}

/// Decode and pretty-print an NSH header from hex bytes
pub fn decode(hex: &str) -> Result<()> {
    let bytes = utils::parse_hex(hex)?;
    let hdr = NshHeader::decode(&bytes).context("failed to decode nsh header")?;
    println!("{}", hdr);
    Ok(())
}
