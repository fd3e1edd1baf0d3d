//! # Field Element Encoding
//!
//! Conversions between BN254 field elements and the wire formats used at
//! the crate boundaries: 32-byte big-endian words from the chain, and
//! `0x`-prefixed hex strings in the read API.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};

use crate::errors::TreeError;

/// Decode a big-endian byte word into a field element, reducing mod the
/// field prime. On-chain words are `uint256` and may exceed the modulus;
/// reduction at this boundary keeps the accumulator's inputs canonical.
pub fn fr_from_be_bytes(bytes: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Encode a field element as a `0x`-prefixed, 64-digit lowercase hex string.
pub fn fr_to_hex(value: &Fr) -> String {
    format!("0x{}", hex::encode(value.into_bigint().to_bytes_be()))
}

/// Parse a hex string (with or without `0x` prefix) into a field element.
pub fn fr_from_hex(s: &str) -> Result<Fr, TreeError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    // Tolerate odd-length input by left-padding a nibble.
    let padded = if trimmed.len() % 2 == 1 {
        format!("0{trimmed}")
    } else {
        trimmed.to_owned()
    };
    let bytes = hex::decode(&padded).map_err(|e| TreeError::InvalidEncoding(e.to_string()))?;
    if bytes.len() > 32 {
        return Err(TreeError::InvalidEncoding(format!(
            "{} bytes exceeds the 32-byte field width",
            bytes.len()
        )));
    }
    Ok(Fr::from_be_bytes_mod_order(&bytes))
}
