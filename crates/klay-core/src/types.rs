//! Shared wire types: 256-bit quantities, hex helpers and signature triples.
//!
//! Hex strings are `0x`-prefixed and lower case. Quantities render without
//! leading zero nibbles except for zero itself (`0x0`); byte strings render
//! at their full length (`0x` for empty).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::constants::{EIP155_V_OFFSET, PLACEHOLDER_V, UNBOUND_V_OFFSET};
use crate::error::{CodecError, CryptoError};

pub use alloy_primitives::U256;

/// Strip an optional `0x`/`0X` prefix.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Encode bytes as `0x`-prefixed lower-case hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a hex byte string, tolerating a missing prefix and an odd nibble count.
pub fn from_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let body = strip_0x(s);
    if body.len() % 2 == 1 {
        hex::decode(format!("0{body}"))
    } else {
        hex::decode(body)
    }
}

/// Big-endian bytes of `value` with leading zero bytes removed (zero is empty).
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Minimal big-endian encoding of a `u64` (zero is empty).
pub fn u64_to_be_trimmed(value: u64) -> Vec<u8> {
    trim_leading_zeros(&value.to_be_bytes()).to_vec()
}

/// Minimal big-endian encoding of a [`U256`] (zero is empty).
pub fn u256_to_be_trimmed(value: &U256) -> Vec<u8> {
    trim_leading_zeros(&value.to_be_bytes::<32>()).to_vec()
}

/// Render a `u64` quantity as `0x`-prefixed hex.
pub fn quantity_hex(value: u64) -> String {
    format!("{value:#x}")
}

/// Render a [`U256`] quantity as `0x`-prefixed hex.
pub fn u256_quantity_hex(value: &U256) -> String {
    format!("{value:#x}")
}

/// Parse a quantity given as `0x` hex or as a decimal string.
pub fn parse_u64(field: &'static str, s: &str) -> Result<u64, CodecError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some("") => Ok(0),
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| CodecError::invalid(field, e.to_string()))
}

/// Parse a 256-bit quantity given as `0x` hex or as a decimal string.
pub fn parse_u256(field: &'static str, s: &str) -> Result<U256, CodecError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some("") => Ok(U256::ZERO),
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|e| CodecError::invalid(field, e.to_string()))
}

/// The recovery value `v` of a signature, kept structured.
///
/// On the wire `v` is a single integer that folds the ECDSA recovery id and
/// the chain id together (`id + chain_id * 2 + 35`). The codec converts at
/// the boundary with [`RecoveryValue::to_v`] and [`RecoveryValue::from_v`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecoveryValue {
    /// Placeholder in a slot that has not been signed (`v = 0x01`, empty `r`/`s`).
    Unsigned,
    /// Signature not bound to any chain (`v = 27 + id`); personal messages use this.
    Unbound {
        /// ECDSA recovery id (0 or 1).
        recovery_id: u8,
    },
    /// Chain-bound signature (`v = id + chain_id * 2 + 35`).
    ChainBound {
        /// ECDSA recovery id (0 or 1).
        recovery_id: u8,
        /// Chain the signature was produced for.
        chain_id: u64,
    },
}

impl RecoveryValue {
    /// Bind a recovery id to a chain.
    pub fn bound(recovery_id: u8, chain_id: u64) -> Self {
        Self::ChainBound {
            recovery_id: recovery_id & 1,
            chain_id,
        }
    }

    /// Fold into the wire integer.
    pub fn to_v(&self) -> Result<u64, CryptoError> {
        match *self {
            Self::Unsigned => Ok(PLACEHOLDER_V),
            Self::Unbound { recovery_id } => Ok(UNBOUND_V_OFFSET + recovery_id as u64),
            Self::ChainBound {
                recovery_id,
                chain_id,
            } => chain_id
                .checked_mul(2)
                .and_then(|c| c.checked_add(EIP155_V_OFFSET + recovery_id as u64))
                .ok_or(CryptoError::ChainIdOverflow(chain_id)),
        }
    }

    /// Unfold a wire integer.
    pub fn from_v(v: u64) -> Result<Self, CodecError> {
        match v {
            PLACEHOLDER_V => Ok(Self::Unsigned),
            27 | 28 => Ok(Self::Unbound {
                recovery_id: (v - UNBOUND_V_OFFSET) as u8,
            }),
            v if v >= EIP155_V_OFFSET => {
                let folded = v - EIP155_V_OFFSET;
                Ok(Self::ChainBound {
                    recovery_id: (folded % 2) as u8,
                    chain_id: folded / 2,
                })
            }
            other => Err(CodecError::malformed(format!(
                "signature v {other:#x} is neither a placeholder nor a recovery value"
            ))),
        }
    }

    /// The ECDSA recovery id, if this is a real signature.
    pub fn recovery_id(&self) -> Option<u8> {
        match *self {
            Self::Unsigned => None,
            Self::Unbound { recovery_id } | Self::ChainBound { recovery_id, .. } => {
                Some(recovery_id)
            }
        }
    }

    /// The chain this signature is bound to, if any.
    pub fn chain_id(&self) -> Option<u64> {
        match *self {
            Self::ChainBound { chain_id, .. } => Some(chain_id),
            _ => None,
        }
    }
}

/// An ECDSA signature triple `(v, r, s)`.
///
/// `r` and `s` are unsigned big-endian integers; on the wire they lose their
/// leading zero bytes like every other RLP integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureData {
    /// Structured recovery value.
    pub v: RecoveryValue,
    /// `r` component.
    pub r: U256,
    /// `s` component.
    pub s: U256,
}

impl SignatureData {
    /// Placeholder written into unsigned signature slots: `[0x01, "", ""]`.
    pub const EMPTY: Self = Self {
        v: RecoveryValue::Unsigned,
        r: U256::ZERO,
        s: U256::ZERO,
    };

    /// Build a triple from its parts.
    pub fn new(v: RecoveryValue, r: U256, s: U256) -> Self {
        Self { v, r, s }
    }

    /// Whether this is the unsigned placeholder.
    pub fn is_empty(&self) -> bool {
        matches!(self.v, RecoveryValue::Unsigned) && self.r.is_zero() && self.s.is_zero()
    }

    /// `r || s` as 64 bytes.
    pub fn rs_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        out[32..].copy_from_slice(&self.s.to_be_bytes::<32>());
        out
    }

    /// Hex strings `[v, r, s]` in the chain's canonical form.
    ///
    /// `r` and `s` are even-length: a leading zero nibble is dropped or a
    /// zero nibble prepended as needed, and zero renders as `0x`.
    pub fn to_hex_triple(&self) -> Result<[String; 3], CryptoError> {
        Ok([
            to_hex(&u64_to_be_trimmed(self.v.to_v()?)),
            to_hex(&u256_to_be_trimmed(&self.r)),
            to_hex(&u256_to_be_trimmed(&self.s)),
        ])
    }

    /// Parse hex strings `[v, r, s]`.
    pub fn from_hex_triple(triple: &[String; 3]) -> Result<Self, CodecError> {
        let v = parse_u64("v", &triple[0])?;
        Ok(Self {
            v: RecoveryValue::from_v(v)?,
            r: parse_u256("r", &triple[1])?,
            s: parse_u256("s", &triple[2])?,
        })
    }
}

impl fmt::Debug for SignatureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureData")
            .field("v", &self.v)
            .field("r", &format_args!("{:#x}", self.r))
            .field("s", &format_args!("{:#x}", self.s))
            .finish()
    }
}

impl Serialize for SignatureData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_hex_triple()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SignatureData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let triple = <[String; 3]>::deserialize(deserializer)?;
        Self::from_hex_triple(&triple).map_err(serde::de::Error::custom)
    }
}
