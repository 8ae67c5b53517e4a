//! Utility functions for the NSH CLI

use anyhow::{bail, Result};
use rust_nsh_common::types::ServicePathKey;

/// Parse a hex string (whitespace tolerated) into bytes
pub fn parse_hex(hex: &str) -> Result<Vec<u8>> {
    let cleaned: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        bail!("hex string has an odd number of digits");
    }

    let mut bytes = Vec::with_capacity(cleaned.len() / 2);
    for i in (0..cleaned.len()).step_by(2) {
        let pair = &cleaned[i..i + 2];
        let byte = u8::from_str_radix(pair, 16)
            .map_err(|_| anyhow::anyhow!("invalid hex digits '{}'", pair))?;
        bytes.push(byte);
    }
    Ok(bytes)
}

/// Format bytes as a lowercase hex string
pub fn format_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parse a "nsp,nsi" pair into a service-path key
pub fn parse_key(s: &str) -> Result<ServicePathKey> {
    let (nsp, nsi) = match s.split_once(',') {
        Some(parts) => parts,
        None => bail!("expected key as \"nsp,nsi\", got '{}'", s),
    };
    Ok(ServicePathKey::new(
        nsp.trim().parse()?,
        nsi.trim().parse()?,
    ))
}

/// Print a section header in the CLI output
pub fn print_header(title: &str) {
    let separator = "=".repeat(title.len());
    println!("\n{}", title);
    println!("{}", separator);
}
