//! End-to-end forwarding tests: control plane, resolver and rewrite engine.

use rust_nsh_common::error::{Error, ForwardError};
use rust_nsh_common::header::{NshHeader, NSH_MD1_LEN, NSH_NEXT_PROTO_IP4};
use rust_nsh_common::types::{
    NextHop, NshAction, NshMapping, PacketId, ProxySessionKey, ServicePathKey,
};
use rust_nsh_node::{EgressDecision, IngressMode, NshNode, Packet};

const PAYLOAD: &[u8] = b"inner packet payload bytes";

fn entry(nsp: u32, nsi: u8) -> NshHeader {
    NshHeader::md1(
        ServicePathKey::new(nsp, nsi),
        NSH_NEXT_PROTO_IP4,
        [1, 2, 3, 4],
    )
}

fn mapping(
    nsp: u32,
    nsi: u8,
    action: NshAction,
    next_hop: NextHop,
    sw_if_index: u32,
) -> NshMapping {
    NshMapping {
        key: ServicePathKey::new(nsp, nsi),
        mapped_key: ServicePathKey::new(nsp, nsi),
        action,
        sw_if_index,
        next_hop,
    }
}

/// A packet carrying `hdr` inline, followed by `PAYLOAD`.
fn packet_with_header(id: u64, hdr: &NshHeader) -> Packet {
    let mut wire = hdr.to_bytes().to_vec();
    wire.extend_from_slice(PAYLOAD);
    Packet::new(PacketId(id), &wire)
}

#[test]
fn swap_on_explicit_ingress() {
    let node = NshNode::new();
    let hdr = entry(100, 5);
    node.add_header_entry(hdr).unwrap();
    node.add_mapping(mapping(100, 5, NshAction::Swap, NextHop::Gre, 7))
        .unwrap();

    let mut packets = vec![packet_with_header(1, &hdr)];
    let original_len = packets[0].len();
    let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);

    assert_eq!(
        outcomes[0].result,
        Ok(EgressDecision {
            next_hop: NextHop::Gre,
            sw_if_index: 7,
        })
    );
    // Same-size swap: total length unchanged, front bytes are the stored
    // entry's encoding, payload intact behind it.
    assert_eq!(packets[0].len(), original_len);
    assert_eq!(&packets[0].bytes()[..NSH_MD1_LEN], hdr.to_bytes().as_ref());
    assert_eq!(&packets[0].bytes()[NSH_MD1_LEN..], PAYLOAD);
}

#[test]
fn pop_reduces_length_by_declared_header_size() {
    let node = NshNode::new();
    node.add_mapping(mapping(20, 8, NshAction::Pop, NextHop::Gre, 2))
        .unwrap();

    // An inline header declaring 8 words (32 bytes): pop must remove
    // exactly what the header declares, not the fixed MD type 1 size.
    let mut hdr = entry(20, 8);
    hdr.length = 8;
    let mut wire = hdr.to_bytes().to_vec();
    wire.extend_from_slice(&[0u8; 8]); // the two declared extra words
    wire.extend_from_slice(PAYLOAD);

    let mut packets = vec![Packet::new(PacketId(1), &wire)];
    let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);

    assert!(outcomes[0].result.is_ok());
    assert_eq!(packets[0].len(), wire.len() - 32);
    assert_eq!(packets[0].bytes(), PAYLOAD);
}

#[test]
fn swap_replaces_wider_inline_header() {
    let node = NshNode::new();
    let replacement = entry(30, 2);
    node.add_header_entry(replacement).unwrap();

    let mut map = mapping(30, 3, NshAction::Swap, NextHop::VxlanGpe, 5);
    map.mapped_key = ServicePathKey::new(30, 2);
    node.add_mapping(map).unwrap();

    // Inline header of 32 bytes swapped for a 24-byte entry:
    // L - H1 + H2 = L - 32 + 24.
    let mut inline = entry(30, 3);
    inline.length = 8;
    let mut wire = inline.to_bytes().to_vec();
    wire.extend_from_slice(&[0u8; 8]);
    wire.extend_from_slice(PAYLOAD);

    let mut packets = vec![Packet::new(PacketId(1), &wire)];
    let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);

    assert!(outcomes[0].result.is_ok());
    assert_eq!(packets[0].len(), wire.len() - 32 + NSH_MD1_LEN);
    assert_eq!(
        &packets[0].bytes()[..NSH_MD1_LEN],
        replacement.to_bytes().as_ref()
    );
    assert_eq!(&packets[0].bytes()[NSH_MD1_LEN..], PAYLOAD);
}

#[test]
fn push_stacks_in_front_of_existing_header() {
    let node = NshNode::new();
    let outer = entry(40, 1);
    node.add_header_entry(outer).unwrap();

    let mut map = mapping(40, 9, NshAction::Push, NextHop::VxlanGpe, 11);
    map.mapped_key = ServicePathKey::new(40, 1);
    node.add_mapping(map).unwrap();

    let inner = entry(40, 9);
    let mut packets = vec![packet_with_header(1, &inner)];
    let original = packets[0].bytes().to_vec();
    let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);

    assert!(outcomes[0].result.is_ok());
    assert_eq!(packets[0].len(), original.len() + NSH_MD1_LEN);
    assert_eq!(
        &packets[0].bytes()[..NSH_MD1_LEN],
        outer.to_bytes().as_ref()
    );
    assert_eq!(&packets[0].bytes()[NSH_MD1_LEN..], &original[..]);
}

#[test]
fn unmapped_key_routes_to_drop() {
    let node = NshNode::new();
    let mut packets = vec![packet_with_header(1, &entry(77, 7))];
    let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);

    assert_eq!(outcomes[0].result, Err(ForwardError::NoMapping));
    assert_eq!(node.metrics().no_mapping.value(), 1);
}

#[test]
fn missing_target_entry_routes_to_drop() {
    let node = NshNode::new();
    // Mapping exists but its target header entry was never stored.
    node.add_mapping(mapping(50, 5, NshAction::Swap, NextHop::Gre, 1))
        .unwrap();

    let mut packets = vec![packet_with_header(1, &entry(50, 5))];
    let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);

    assert_eq!(outcomes[0].result, Err(ForwardError::NoEntry));
}

#[test]
fn truncated_inline_header_routes_to_drop() {
    let node = NshNode::new();
    node.add_mapping(mapping(60, 6, NshAction::Pop, NextHop::Gre, 1))
        .unwrap();

    let wire = entry(60, 6).to_bytes();
    let mut packets = vec![Packet::new(PacketId(1), &wire[..12])];
    let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);

    assert_eq!(outcomes[0].result, Err(ForwardError::Truncated));
    assert_eq!(node.metrics().truncated_header.value(), 1);
}

#[test]
fn misses_do_not_disturb_batch_siblings() {
    let node = NshNode::new();
    let hdr = entry(100, 5);
    node.add_header_entry(hdr).unwrap();
    node.add_mapping(mapping(100, 5, NshAction::Swap, NextHop::Gre, 7))
        .unwrap();

    let mut packets = vec![
        packet_with_header(1, &hdr),
        packet_with_header(2, &entry(9, 9)), // no mapping
        packet_with_header(3, &hdr),
    ];
    let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);

    assert!(outcomes[0].result.is_ok());
    assert_eq!(outcomes[1].result, Err(ForwardError::NoMapping));
    assert!(outcomes[2].result.is_ok());
    // The failed packet's buffer is untouched.
    assert_eq!(
        &packets[1].bytes()[..NSH_MD1_LEN],
        entry(9, 9).to_bytes().as_ref()
    );
}

#[test]
fn classified_ingress_uses_attached_key() {
    let node = NshNode::new();
    node.add_mapping(mapping(80, 4, NshAction::Pop, NextHop::Gre, 12))
        .unwrap();

    // No inline header: a classified packet is just the inner payload plus
    // the key the classifier attached. Pop therefore removes nothing.
    let mut packets = vec![Packet::new(PacketId(1), PAYLOAD)
        .with_classified_key(ServicePathKey::new(80, 4))];
    let outcomes = node.process_batch(&mut packets, IngressMode::Classified);

    assert_eq!(
        outcomes[0].result,
        Ok(EgressDecision {
            next_hop: NextHop::Gre,
            sw_if_index: 12,
        })
    );
    assert_eq!(packets[0].bytes(), PAYLOAD);
}

#[test]
fn proxied_ingress_resolves_through_proxy_session() {
    let node = NshNode::new();

    // The VXLAN4 mapping for (200, 10) on interface 3 registers a proxy
    // session holding the one-hop-before key (200, 9).
    node.add_mapping(mapping(200, 10, NshAction::Swap, NextHop::Vxlan4, 3))
        .unwrap();
    let sessions = node.list_proxy_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].key, ServicePathKey::new(200, 9));
    assert_eq!(
        sessions[0].session_key,
        ProxySessionKey {
            transport: NextHop::Vxlan4,
            sw_if_index: 3,
        }
    );

    // Return traffic from the proxied function continues the chain at the
    // synthesized key.
    node.add_mapping(mapping(200, 9, NshAction::Pop, NextHop::Gre, 9))
        .unwrap();

    let mut packets = vec![Packet::new(PacketId(1), PAYLOAD).with_rx_interface(3)];
    let outcomes = node.process_batch(&mut packets, IngressMode::Proxied);

    assert_eq!(
        outcomes[0].result,
        Ok(EgressDecision {
            next_hop: NextHop::Gre,
            sw_if_index: 9,
        })
    );
}

#[test]
fn proxied_ingress_without_session_routes_to_drop() {
    let node = NshNode::new();
    let mut packets = vec![Packet::new(PacketId(1), PAYLOAD).with_rx_interface(99)];
    let outcomes = node.process_batch(&mut packets, IngressMode::Proxied);

    assert_eq!(outcomes[0].result, Err(ForwardError::NoProxySession));
    assert_eq!(node.metrics().no_proxy_session.value(), 1);
}

#[test]
fn proxy_session_nsi_floor() {
    let node = NshNode::new();
    let err = node
        .add_mapping(mapping(200, 0, NshAction::Swap, NextHop::Vxlan4, 3))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(node.list_mappings().is_empty());
    assert!(node.list_proxy_sessions().is_empty());
}

#[test]
fn mapping_uniqueness_round_trip() {
    let node = NshNode::new();
    let map = mapping(1, 1, NshAction::Pop, NextHop::Gre, 1);

    node.add_mapping(map).unwrap();
    assert!(matches!(
        node.add_mapping(map),
        Err(Error::DuplicateKey(_))
    ));
    node.delete_mapping(map.key).unwrap();
    node.add_mapping(map).unwrap();
}

#[test]
fn batching_is_not_observable() {
    let node = NshNode::new();
    let hdr = entry(100, 5);
    node.add_header_entry(hdr).unwrap();
    node.add_mapping(mapping(100, 5, NshAction::Swap, NextHop::Gre, 7))
        .unwrap();
    node.add_mapping(mapping(60, 6, NshAction::Pop, NextHop::VxlanGpe, 8))
        .unwrap();

    let build = || -> Vec<Packet> {
        (0..8u64)
            .map(|i| {
                if i % 3 == 0 {
                    packet_with_header(i, &entry(60, 6))
                } else if i % 3 == 1 {
                    packet_with_header(i, &hdr)
                } else {
                    packet_with_header(i, &entry(9, 9)) // miss
                }
            })
            .collect()
    };

    // One batch of eight.
    let mut whole = build();
    let whole_outcomes = node.process_batch(&mut whole, IngressMode::Explicit);

    // The same packets split into sub-batches of 3 / 1 / 4.
    let mut split = build();
    let mut split_outcomes = Vec::new();
    let (first, rest) = split.split_at_mut(3);
    let (second, third) = rest.split_at_mut(1);
    for chunk in [first, second, third] {
        split_outcomes.extend(node.process_batch(chunk, IngressMode::Explicit));
    }

    assert_eq!(whole_outcomes, split_outcomes);
    for (a, b) in whole.iter().zip(split.iter()) {
        assert_eq!(a.bytes(), b.bytes());
    }
}

#[test]
fn same_next_hop_packets_keep_their_order() {
    let node = NshNode::new();
    let hdr = entry(100, 5);
    node.add_header_entry(hdr).unwrap();
    node.add_mapping(mapping(100, 5, NshAction::Swap, NextHop::Gre, 7))
        .unwrap();
    node.add_mapping(mapping(60, 6, NshAction::Pop, NextHop::VxlanGpe, 8))
        .unwrap();

    let mut packets: Vec<Packet> = (0..6u64)
        .map(|i| {
            if i % 2 == 0 {
                packet_with_header(i, &hdr)
            } else {
                packet_with_header(i, &entry(60, 6))
            }
        })
        .collect();
    let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);

    let gre_order: Vec<u64> = outcomes
        .iter()
        .filter(|o| matches!(o.result, Ok(d) if d.next_hop == NextHop::Gre))
        .map(|o| o.handle.0)
        .collect();
    assert_eq!(gre_order, vec![0, 2, 4]);

    let gpe_order: Vec<u64> = outcomes
        .iter()
        .filter(|o| matches!(o.result, Ok(d) if d.next_hop == NextHop::VxlanGpe))
        .map(|o| o.handle.0)
        .collect();
    assert_eq!(gpe_order, vec![1, 3, 5]);
}

#[test]
fn trace_sink_sees_post_rewrite_header() {
    let node = NshNode::new();
    let hdr = entry(100, 5);
    node.add_header_entry(hdr).unwrap();
    node.add_mapping(mapping(100, 5, NshAction::Swap, NextHop::Gre, 7))
        .unwrap();

    let mut packets = vec![
        packet_with_header(1, &hdr).with_trace(),
        packet_with_header(2, &hdr), // not traced
    ];
    let mut traced = Vec::new();
    let mut sink = |id: PacketId, bytes: &[u8]| traced.push((id, bytes.to_vec()));
    node.process_batch_traced(&mut packets, IngressMode::Explicit, Some(&mut sink));

    assert_eq!(traced.len(), 1);
    assert_eq!(traced[0].0, PacketId(1));
    assert_eq!(traced[0].1, hdr.to_bytes().to_vec());
}

#[test]
fn concurrent_workers_share_the_tables() {
    use std::sync::Arc;

    let node = Arc::new(NshNode::new());
    let hdr = entry(100, 5);
    node.add_header_entry(hdr).unwrap();
    node.add_mapping(mapping(100, 5, NshAction::Swap, NextHop::Gre, 7))
        .unwrap();

    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let node = Arc::clone(&node);
            std::thread::spawn(move || {
                let mut packets: Vec<Packet> = (0..64)
                    .map(|i| packet_with_header(worker * 64 + i, &entry(100, 5)))
                    .collect();
                let outcomes = node.process_batch(&mut packets, IngressMode::Explicit);
                assert!(outcomes.iter().all(|o| o.result.is_ok()));
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(node.metrics().packets_mapped.value(), 4 * 64);
}

#[test]
fn metrics_track_outcomes_and_table_sizes() {
    let node = NshNode::new();
    let hdr = entry(100, 5);
    node.add_header_entry(hdr).unwrap();
    node.add_mapping(mapping(100, 5, NshAction::Swap, NextHop::Gre, 7))
        .unwrap();
    node.add_mapping(mapping(200, 10, NshAction::Swap, NextHop::Vxlan4, 3))
        .unwrap();

    assert_eq!(node.metrics().header_entries.value(), 1);
    assert_eq!(node.metrics().mappings.value(), 2);
    assert_eq!(node.metrics().proxy_sessions.value(), 1);

    let mut packets = vec![
        packet_with_header(1, &hdr),
        packet_with_header(2, &entry(9, 9)),
    ];
    node.process_batch(&mut packets, IngressMode::Explicit);

    assert_eq!(node.metrics().packets_mapped.value(), 1);
    assert_eq!(node.metrics().no_mapping.value(), 1);
    assert_eq!(node.metrics().packets_processed(), 2);

    node.delete_mapping(ServicePathKey::new(200, 10)).unwrap();
    assert_eq!(node.metrics().mappings.value(), 1);
    assert_eq!(node.metrics().proxy_sessions.value(), 0);
}
