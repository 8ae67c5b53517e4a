//! Error types for the NSH forwarder.

use thiserror::Error;

/// Errors surfaced synchronously by control-plane operations and the
/// wire-format codec.
#[derive(Error, Debug)]
pub enum Error {
    /// An add operation hit a key that is already present.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A delete or lookup addressed a key that is not present.
    #[error("not found: {0}")]
    NotFound(String),

    /// A record was rejected before it was stored.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A decode saw fewer bytes than the header declares.
    #[error("truncated NSH header: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
}

/// Per-packet resolution misses. These are non-fatal: the affected packet is
/// routed to a drop outcome and the rest of the batch continues.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardError {
    /// No mapping exists for the packet's service-path key.
    #[error("no mapping for nsh key")]
    NoMapping,

    /// The mapping's target key has no header entry.
    #[error("no entry for nsh key")]
    NoEntry,

    /// Proxied ingress with no proxy session on the arrival tunnel.
    #[error("no proxy session for ingress tunnel")]
    NoProxySession,

    /// The inline header declared more bytes than the packet carries.
    #[error("truncated inline nsh header")]
    Truncated,
}
