//! Run command: feed packets through a node built from the configuration

use anyhow::{bail, Context, Result};
use log::info;
use rust_nsh_common::types::PacketId;
use rust_nsh_node::{IngressMode, Packet};
use std::path::Path;

use crate::{config, utils};

/// Build a node from the configuration and run the given hex packets
/// through one batch, printing the per-packet outcomes.
pub fn run_packets(
    config_path: &Path,
    mode: &str,
    rx_interface: u32,
    key: Option<&str>,
    trace: bool,
    hex_packets: &[String],
) -> Result<()> {
    let mode = match mode {
        "explicit" => IngressMode::Explicit,
        "classified" => IngressMode::Classified,
        "proxied" => IngressMode::Proxied,
        other => bail!(
            "unknown ingress mode '{}', expected explicit|classified|proxied",
            other
        ),
    };
    if hex_packets.is_empty() {
        bail!("no packets given");
    }
    let classified_key = key.map(utils::parse_key).transpose()?;

    let node = config::build_node(&config::load(config_path)?)?;
    info!(
        "running {} packet(s) against {} ({:?} ingress)",
        hex_packets.len(),
        config_path.display(),
        mode
    );

    let mut packets = Vec::with_capacity(hex_packets.len());
    for (i, hex) in hex_packets.iter().enumerate() {
        let bytes = utils::parse_hex(hex).with_context(|| format!("packet {}", i))?;
        let mut packet = Packet::new(PacketId(i as u64), &bytes).with_rx_interface(rx_interface);
        if let Some(key) = classified_key {
            packet = packet.with_classified_key(key);
        }
        if trace {
            packet = packet.with_trace();
        }
        packets.push(packet);
    }

    let mut sink = |id: PacketId, bytes: &[u8]| {
        println!("trace packet {}: {}", id.0, utils::format_hex(bytes));
    };
    let outcomes = if trace {
        node.process_batch_traced(&mut packets, mode, Some(&mut sink))
    } else {
        node.process_batch(&mut packets, mode)
    };

    for (outcome, packet) in outcomes.iter().zip(packets.iter()) {
        match outcome.result {
            Ok(decision) => println!(
                "packet {}: {} intf {} ({} bytes out)",
                outcome.handle.0,
                decision.next_hop,
                decision.sw_if_index,
                packet.len()
            ),
            Err(err) => println!("packet {}: dropped: {}", outcome.handle.0, err),
        }
    }

    let metrics = node.metrics();
    utils::print_header("Summary");
    println!("Processed: {}", metrics.packets_processed());
    println!("Mapped:    {}", metrics.packets_mapped.value());
    println!(
        "Dropped:   {}",
        metrics.packets_processed() - metrics.packets_mapped.value()
    );
    Ok(())
}
