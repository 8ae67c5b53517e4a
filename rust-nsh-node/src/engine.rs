//! The batch packet-rewrite engine.
//!
//! Pure, non-blocking computation over an in-memory batch: derive the
//! lookup key per the batch's ingress mode, resolve it against the shared
//! tables, apply the header action and record an outcome per packet. A
//! single read guard covers the whole batch, so a batch never observes a
//! half-applied table mutation.

use crate::packet::Packet;
use crate::tables::NshTables;
use crate::NshNode;
use log::debug;
use rust_nsh_common::error::ForwardError;
use rust_nsh_common::header::{NshHeader, NSH_MD1_LEN};
use rust_nsh_common::types::{
    InterfaceId, NextHop, NshAction, PacketId, ProxySessionKey,
};

/// How the service-path key of a batch's packets is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressMode {
    /// Parsed directly from the inline NSH header on each packet.
    Explicit,
    /// Supplied out-of-band by an upstream classifier, carried in the
    /// packet's metadata.
    Classified,
    /// Derived from the proxy session registered for the arrival tunnel.
    Proxied,
}

/// Where a successfully rewritten packet is handed next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EgressDecision {
    /// Downstream encapsulation path.
    pub next_hop: NextHop,
    /// Egress interface handle.
    pub sw_if_index: InterfaceId,
}

/// Per-packet result record. A miss routes the packet to a drop outcome;
/// it never aborts the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub handle: PacketId,
    pub result: Result<EgressDecision, ForwardError>,
}

/// Sink invoked with `(handle, front-of-buffer header bytes)` for each
/// packet that requested tracing, after its rewrite.
pub type TraceSink<'a> = &'a mut dyn FnMut(PacketId, &[u8]);

impl NshNode {
    /// Run one batch through the rewrite engine.
    ///
    /// Outcomes are emitted in the batch's packet order, so packets bound
    /// for the same next hop keep their relative order. How the batch is
    /// internally subdivided is not observable in the results.
    pub fn process_batch(&self, packets: &mut [Packet], mode: IngressMode) -> Vec<Outcome> {
        self.process_batch_traced(packets, mode, None)
    }

    /// [`process_batch`](Self::process_batch) with a trace sink for packets
    /// whose `trace` flag is set.
    pub fn process_batch_traced(
        &self,
        packets: &mut [Packet],
        mode: IngressMode,
        mut sink: Option<TraceSink<'_>>,
    ) -> Vec<Outcome> {
        let tables = self.read_tables();
        let metrics = self.metrics();
        let mut outcomes = Vec::with_capacity(packets.len());

        for packet in packets.iter_mut() {
            let result = rewrite_one(&tables, packet, mode);

            match result {
                Ok(_) => metrics.packets_mapped.increment(),
                Err(ForwardError::NoMapping) => metrics.no_mapping.increment(),
                Err(ForwardError::NoEntry) => metrics.no_entry.increment(),
                Err(ForwardError::NoProxySession) => metrics.no_proxy_session.increment(),
                Err(ForwardError::Truncated) => metrics.truncated_header.increment(),
            }

            if packet.trace {
                if let Some(sink) = sink.as_mut() {
                    let n = packet.len().min(NSH_MD1_LEN);
                    sink(packet.handle, &packet.bytes()[..n]);
                }
            }

            outcomes.push(Outcome {
                handle: packet.handle,
                result,
            });
        }

        outcomes
    }
}

/// Rewrite a single packet against the tables.
fn rewrite_one(
    tables: &NshTables,
    packet: &mut Packet,
    mode: IngressMode,
) -> Result<EgressDecision, ForwardError> {
    // Derive the lookup key, and the inline header length when the packet
    // actually carries one. Classified and proxied packets arrive without
    // an inline NSH header, so there is nothing to pop for them.
    let (key, inline_len) = match mode {
        IngressMode::Explicit => {
            let hdr = NshHeader::decode(packet.bytes()).map_err(|_| ForwardError::Truncated)?;
            (hdr.key, hdr.header_len())
        }
        IngressMode::Classified => match packet.classified_key {
            Some(key) => (key, 0),
            None => {
                debug!("classified ingress without a key on {}", packet.handle);
                return Err(ForwardError::NoMapping);
            }
        },
        IngressMode::Proxied => {
            let session_key = ProxySessionKey {
                transport: NextHop::Vxlan4,
                sw_if_index: packet.rx_sw_if_index,
            };
            let session = tables
                .proxy_session(session_key)
                .ok_or(ForwardError::NoProxySession)?;
            (session.key, 0)
        }
    };

    let map = tables.mapping(key).ok_or(ForwardError::NoMapping)?;
    let decision = EgressDecision {
        next_hop: map.next_hop,
        sw_if_index: map.sw_if_index,
    };

    match map.action {
        NshAction::Pop => packet.buf_mut().pull(inline_len),
        NshAction::Swap | NshAction::Push => {
            let entry = tables.entry(map.mapped_key).ok_or(ForwardError::NoEntry)?;
            let encap = entry.to_bytes();
            if map.action == NshAction::Swap {
                packet.buf_mut().pull(inline_len);
            }
            packet.buf_mut().push(&encap);
        }
    }

    Ok(decision)
}
