//! NSH wire-format encoding and decoding.
//!
//! Only the fixed-length MD type 1 header is supported: a 4-byte base
//! header, the 4-byte service path header and four 4-byte context words.
//! Variable-length metadata (MD type 2 TLVs) is rejected on the control
//! path before a record is ever stored.

use crate::error::Error;
use crate::types::ServicePathKey;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/* ---------------------------------------------------------------- *
 * Wire layout constants
 * ---------------------------------------------------------------- */

/// O (OAM) bit in the first header byte.
pub const NSH_O_BIT: u8 = 1 << 5;

/// C (context) bit in the first header byte.
pub const NSH_C_BIT: u8 = 1 << 4;

/// The single supported metadata type.
pub const NSH_MD_TYPE_1: u8 = 1;

/// MD type 1 header length in 4-byte words.
pub const NSH_MD1_WORDS: u8 = 6;

/// MD type 1 header length in bytes.
pub const NSH_MD1_LEN: usize = NSH_MD1_WORDS as usize * 4;

/// Bytes needed before the declared length can even be read.
pub const NSH_BASE_LEN: usize = 4;

/// Next-protocol codes carried in the base header.
pub const NSH_NEXT_PROTO_IP4: u8 = 1;
pub const NSH_NEXT_PROTO_IP6: u8 = 2;
pub const NSH_NEXT_PROTO_ETHERNET: u8 = 3;

/* ---------------------------------------------------------------- *
 * Header record
 * ---------------------------------------------------------------- */

/// An immutable NSH header record.
///
/// Doubles as the in-memory form of a stored header entry and the decoded
/// form of an inline header read off a packet. Identified by its own
/// service-path key; changing a stored entry is delete-then-add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NshHeader {
    /// Protocol version, 2 bits.
    pub version: u8,
    /// OAM packet indicator.
    pub o_bit: bool,
    /// Context header indicator.
    pub c_bit: bool,
    /// Total header size in 4-byte words (6 for MD type 1).
    pub length: u8,
    /// Metadata type.
    pub md_type: u8,
    /// Protocol of the encapsulated payload.
    pub next_protocol: u8,
    /// Service path / service index pair.
    pub key: ServicePathKey,
    /// Network platform context.
    pub c1: u32,
    /// Network shared context.
    pub c2: u32,
    /// Service platform context.
    pub c3: u32,
    /// Service shared context.
    pub c4: u32,
}

impl NshHeader {
    /// Creates an MD type 1 header with the mandatory fixed fields.
    pub fn md1(key: ServicePathKey, next_protocol: u8, c: [u32; 4]) -> Self {
        Self {
            version: 0,
            o_bit: false,
            c_bit: false,
            length: NSH_MD1_WORDS,
            md_type: NSH_MD_TYPE_1,
            next_protocol,
            key,
            c1: c[0],
            c2: c[1],
            c3: c[2],
            c4: c[3],
        }
    }

    /// Declared header size in bytes.
    pub fn header_len(&self) -> usize {
        self.length as usize * 4
    }

    /// Encode into `buf`, network byte order for all multi-byte fields.
    pub fn encode(&self, buf: &mut BytesMut) {
        let ver_o_c = ((self.version & 0x3) << 6)
            | if self.o_bit { NSH_O_BIT } else { 0 }
            | if self.c_bit { NSH_C_BIT } else { 0 };
        buf.put_u8(ver_o_c);
        buf.put_u8(self.length);
        buf.put_u8(self.md_type);
        buf.put_u8(self.next_protocol);
        buf.put_u32(self.key.to_u32());
        buf.put_u32(self.c1);
        buf.put_u32(self.c2);
        buf.put_u32(self.c3);
        buf.put_u32(self.c4);
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(NSH_MD1_LEN);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a header from the front of `data`.
    ///
    /// Reports [`Error::Truncated`] when `data` holds fewer bytes than the
    /// header declares rather than reading past the end.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        if data.len() < NSH_BASE_LEN {
            return Err(Error::Truncated {
                need: NSH_BASE_LEN,
                have: data.len(),
            });
        }

        let declared = data[1] as usize * 4;
        if declared < NSH_MD1_LEN {
            return Err(Error::Truncated {
                need: NSH_MD1_LEN,
                have: declared,
            });
        }
        if data.len() < declared {
            return Err(Error::Truncated {
                need: declared,
                have: data.len(),
            });
        }

        let mut buf = data;
        let ver_o_c = buf.get_u8();
        let length = buf.get_u8();
        let md_type = buf.get_u8();
        let next_protocol = buf.get_u8();
        let key = ServicePathKey::from_u32(buf.get_u32());

        Ok(Self {
            version: ver_o_c >> 6,
            o_bit: ver_o_c & NSH_O_BIT != 0,
            c_bit: ver_o_c & NSH_C_BIT != 0,
            length,
            md_type,
            next_protocol,
            key,
            c1: buf.get_u32(),
            c2: buf.get_u32(),
            c3: buf.get_u32(),
            c4: buf.get_u32(),
        })
    }
}

impl fmt::Display for NshHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nsh ver {} ", self.version)?;
        if self.o_bit {
            write!(f, "O-set ")?;
        }
        if self.c_bit {
            write!(f, "C-set ")?;
        }
        writeln!(
            f,
            "len {} ({} bytes) md_type {} next_protocol {}",
            self.length,
            self.header_len(),
            self.md_type,
            self.next_protocol
        )?;
        writeln!(
            f,
            "  service path {} service index {}",
            self.key.nsp, self.key.nsi
        )?;
        write!(
            f,
            "  c1 {} c2 {} c3 {} c4 {}",
            self.c1, self.c2, self.c3, self.c4
        )
    }
}
