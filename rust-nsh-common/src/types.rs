//! Shared table record types for the NSH forwarder.
//!
//! These types are exchanged between the forwarding node and the control
//! surfaces that mutate its tables, and carry serde derives so operator
//! tooling can persist them.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interface identifier type used for identifying network interfaces.
pub type InterfaceId = u32;

/// Number of bits the NSP occupies above the NSI in a packed key.
pub const NSP_SHIFT: u32 = 8;

/// Mask for the 24-bit NSP field.
pub const NSP_MASK: u32 = 0x00ff_ffff;

/// Mask for the 8-bit NSI field.
pub const NSI_MASK: u32 = 0x0000_00ff;

/// Stable handle to a packet buffer for the duration of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketId(pub u64);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketId({})", self.0)
    }
}

/// The (NSP, NSI) pair identifying one hop of a service chain.
///
/// Packed on the wire as a 32-bit value with the 24-bit Network Service Path
/// in the high bits and the 8-bit Network Service Index in the low byte.
/// This is the primary lookup key for every table in the forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServicePathKey {
    /// Network Service Path, 24 bits.
    pub nsp: u32,
    /// Network Service Index.
    pub nsi: u8,
}

impl ServicePathKey {
    /// Creates a key, masking the NSP down to its 24 valid bits.
    pub fn new(nsp: u32, nsi: u8) -> Self {
        Self {
            nsp: nsp & NSP_MASK,
            nsi,
        }
    }

    /// Packs the key into its 32-bit wire representation.
    pub fn to_u32(self) -> u32 {
        ((self.nsp & NSP_MASK) << NSP_SHIFT) | self.nsi as u32
    }

    /// Unpacks a key from its 32-bit wire representation.
    pub fn from_u32(raw: u32) -> Self {
        Self {
            nsp: (raw >> NSP_SHIFT) & NSP_MASK,
            nsi: (raw & NSI_MASK) as u8,
        }
    }

    /// Returns the key one service hop downstream, or `None` when the index
    /// is already at its floor.
    pub fn decrement_index(self) -> Option<Self> {
        let nsi = self.nsi.checked_sub(1)?;
        Some(Self { nsp: self.nsp, nsi })
    }
}

impl fmt::Display for ServicePathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nsp {} nsi {}", self.nsp, self.nsi)
    }
}

/// What happens to a packet's NSH encapsulation when a mapping applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum NshAction {
    /// Replace the inline header with the mapped entry's header.
    Swap = 0,
    /// Stack the mapped entry's header in front of whatever is present.
    Push = 1,
    /// Strip the inline header and forward the inner packet.
    Pop = 2,
}

impl fmt::Display for NshAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NshAction::Swap => write!(f, "swap"),
            NshAction::Push => write!(f, "push"),
            NshAction::Pop => write!(f, "pop"),
        }
    }
}

impl FromStr for NshAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "swap" => Ok(NshAction::Swap),
            "push" => Ok(NshAction::Push),
            "pop" => Ok(NshAction::Pop),
            other => Err(Error::InvalidArgument(format!(
                "unknown nsh action '{}', expected swap|push|pop",
                other
            ))),
        }
    }
}

/// The downstream encapsulation path a packet is handed to after rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum NextHop {
    /// No egress assigned yet.
    Unassigned = 0,
    /// Drop the packet.
    Drop = 1,
    /// GRE tunnel egress.
    Gre = 2,
    /// VXLAN-GPE tunnel egress.
    VxlanGpe = 3,
    /// VXLAN over IPv4 egress (NSH-aware proxy path).
    Vxlan4 = 4,
    /// VXLAN over IPv6 egress (NSH-aware proxy path).
    Vxlan6 = 5,
}

impl NextHop {
    /// Whether this egress reaches an NSH-unaware function through a VXLAN
    /// tunnel, which requires a proxy session for the return traffic.
    pub fn needs_proxy_session(self) -> bool {
        matches!(self, NextHop::Vxlan4 | NextHop::Vxlan6)
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextHop::Unassigned => write!(f, "unassigned"),
            NextHop::Drop => write!(f, "drop"),
            NextHop::Gre => write!(f, "GRE"),
            NextHop::VxlanGpe => write!(f, "VXLAN-GPE"),
            NextHop::Vxlan4 => write!(f, "VXLAN4"),
            NextHop::Vxlan6 => write!(f, "VXLAN6"),
        }
    }
}

/// A forwarding rule: what to do with the encapsulation of packets carrying
/// `key`, and where they go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NshMapping {
    /// The mapping's own identity: the service-path key it matches.
    pub key: ServicePathKey,
    /// Key of the header entry applied on swap/push. Ignored for pop.
    pub mapped_key: ServicePathKey,
    /// Header action to apply.
    pub action: NshAction,
    /// Egress interface handle.
    pub sw_if_index: InterfaceId,
    /// Which encapsulation path the packet is handed to.
    pub next_hop: NextHop,
}

impl NshMapping {
    /// SFF-vs-SF heuristic: a mapping whose source and target keys are equal
    /// behaves like a service-function forwarder hop, otherwise like a
    /// service function. Rules about NSI decrement are out of scope here.
    pub fn is_sff(&self) -> bool {
        self.key == self.mapped_key
    }
}

impl fmt::Display for NshMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nsh entry {} maps to {} nsh_action {}",
            self.key, self.mapped_key, self.action
        )?;
        match self.next_hop {
            NextHop::Gre => write!(f, " encapped by GRE intf: {}", self.sw_if_index),
            NextHop::VxlanGpe => {
                write!(f, " encapped by VXLAN GPE intf: {}", self.sw_if_index)
            }
            NextHop::Vxlan4 => write!(f, " encapped by VXLAN4 intf: {}", self.sw_if_index),
            NextHop::Vxlan6 => write!(f, " encapped by VXLAN6 intf: {}", self.sw_if_index),
            NextHop::Drop | NextHop::Unassigned => write!(f, " egress: {}", self.next_hop),
        }
    }
}

/// Key of a proxy session: the tunnel a header-less packet arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxySessionKey {
    /// Encapsulation family of the arrival tunnel.
    pub transport: NextHop,
    /// Ingress interface handle.
    pub sw_if_index: InterfaceId,
}

impl fmt::Display for ProxySessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} intf {}", self.transport, self.sw_if_index)
    }
}

/// Reverse-lookup record synthesizing a service-path key for packets that
/// carry no inline NSH header. The stored NSI is one below the mapping that
/// spawned the session: the proxy hop sits one service index before the
/// mapped destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySession {
    /// The arrival tunnel this session matches.
    pub session_key: ProxySessionKey,
    /// The synthesized service-path key.
    pub key: ServicePathKey,
}

impl fmt::Display for ProxySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nsh proxy session {} -> {}", self.session_key, self.key)
    }
}
