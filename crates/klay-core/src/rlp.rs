//! RLP encoding and decoding helpers.
//!
//! Thin layer over `alloy-rlp` headers. Encoding works on already-encoded
//! items so transaction field lists can be assembled positionally; decoding
//! produces a borrowed [`RlpItem`] tree that the transaction codec walks by
//! position.

use alloy_rlp::{Encodable, Header};

use crate::address::Address;
use crate::error::CodecError;
use crate::types::{trim_leading_zeros, u256_to_be_trimmed, U256};

/// Result type for RLP operations.
pub type RlpResult<T> = Result<T, CodecError>;

/// Deepest list nesting the decoder accepts. Transactions need three levels
/// (fields, signature list, signature triple).
pub const MAX_DEPTH: usize = 16;

// ============================================================================
// Encoding
// ============================================================================

/// Encode a byte string.
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 9);
    bytes.encode(&mut out);
    out
}

/// Encode an unsigned integer in its minimal big-endian form.
pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_bytes(trim_leading_zeros(&value.to_be_bytes()))
}

/// Encode a 256-bit unsigned integer in its minimal big-endian form.
pub fn encode_u256(value: &U256) -> Vec<u8> {
    encode_bytes(&u256_to_be_trimmed(value))
}

/// Encode an address as a 20-byte string.
pub fn encode_address(address: &Address) -> Vec<u8> {
    encode_bytes(address.as_bytes())
}

/// Encode an optional address; `None` becomes the empty string.
pub fn encode_optional_address(address: Option<&Address>) -> Vec<u8> {
    match address {
        Some(a) => encode_address(a),
        None => encode_bytes(&[]),
    }
}

/// Wrap already-encoded items into a list.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_length: usize = items.iter().map(Vec::len).sum();
    let header = Header {
        list: true,
        payload_length,
    };
    let mut out = Vec::with_capacity(header.length() + payload_length);
    header.encode(&mut out);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

// ============================================================================
// Decoding
// ============================================================================

/// A decoded RLP item borrowing from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem<'a> {
    /// A byte string.
    Bytes(&'a [u8]),
    /// A list of items.
    List(Vec<RlpItem<'a>>),
}

impl<'a> RlpItem<'a> {
    /// Decode exactly one item spanning all of `data`.
    pub fn decode(data: &'a [u8]) -> RlpResult<Self> {
        let mut buf = data;
        let item = decode_item(&mut buf, 0)?;
        if !buf.is_empty() {
            return Err(CodecError::malformed(format!(
                "{} trailing bytes after RLP item",
                buf.len()
            )));
        }
        Ok(item)
    }

    /// The byte-string payload, or an error naming `field`.
    pub fn as_bytes(&self, field: &'static str) -> RlpResult<&'a [u8]> {
        match self {
            RlpItem::Bytes(b) => Ok(b),
            RlpItem::List(_) => Err(CodecError::malformed(format!(
                "expected string for {field}, found list"
            ))),
        }
    }

    /// The list items, or an error naming `field`.
    pub fn as_list(&self, field: &'static str) -> RlpResult<&[RlpItem<'a>]> {
        match self {
            RlpItem::List(items) => Ok(items),
            RlpItem::Bytes(_) => Err(CodecError::malformed(format!(
                "expected list for {field}, found string"
            ))),
        }
    }

    /// Decode a canonical unsigned integer of at most 8 bytes.
    pub fn as_u64(&self, field: &'static str) -> RlpResult<u64> {
        let bytes = self.as_bytes(field)?;
        check_canonical_int(field, bytes, 8)?;
        let mut buf = [0u8; 8];
        buf[8 - bytes.len()..].copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    /// Decode a canonical unsigned integer of at most 32 bytes.
    pub fn as_u256(&self, field: &'static str) -> RlpResult<U256> {
        let bytes = self.as_bytes(field)?;
        check_canonical_int(field, bytes, 32)?;
        U256::try_from_be_slice(bytes)
            .ok_or_else(|| CodecError::malformed(format!("{field} does not fit 256 bits")))
    }

    /// Decode a 20-byte address.
    pub fn as_address(&self, field: &'static str) -> RlpResult<Address> {
        let bytes = self.as_bytes(field)?;
        Address::from_slice(bytes)
            .map_err(|e| CodecError::malformed(format!("{field}: {e}")))
    }

    /// Decode an address that may be the empty string.
    pub fn as_optional_address(&self, field: &'static str) -> RlpResult<Option<Address>> {
        let bytes = self.as_bytes(field)?;
        if bytes.is_empty() {
            Ok(None)
        } else {
            self.as_address(field).map(Some)
        }
    }
}

fn check_canonical_int(field: &'static str, bytes: &[u8], max_len: usize) -> RlpResult<()> {
    if bytes.len() > max_len {
        return Err(CodecError::malformed(format!(
            "{field} is {} bytes, at most {max_len} allowed",
            bytes.len()
        )));
    }
    if bytes.first() == Some(&0) {
        return Err(CodecError::malformed(format!(
            "{field} has a leading zero byte"
        )));
    }
    Ok(())
}

fn decode_item<'a>(buf: &mut &'a [u8], depth: usize) -> RlpResult<RlpItem<'a>> {
    let header = Header::decode(buf)
        .map_err(|e| CodecError::malformed(format!("invalid RLP header: {e}")))?;
    if buf.len() < header.payload_length {
        return Err(CodecError::malformed(format!(
            "RLP payload truncated: need {}, have {}",
            header.payload_length,
            buf.len()
        )));
    }
    let (payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;

    if !header.list {
        return Ok(RlpItem::Bytes(payload));
    }
    if depth >= MAX_DEPTH {
        return Err(CodecError::malformed("RLP nesting too deep"));
    }

    let mut items = Vec::new();
    let mut inner = payload;
    while !inner.is_empty() {
        items.push(decode_item(&mut inner, depth + 1)?);
    }
    Ok(RlpItem::List(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_single_byte_is_itself() {
        assert_eq!(encode_bytes(&[0x42]), vec![0x42]);
    }

    #[test]
    fn encode_empty_string() {
        assert_eq!(encode_bytes(&[]), vec![0x80]);
    }

    #[test]
    fn encode_integers() {
        assert_eq!(encode_u64(0), vec![0x80]);
        assert_eq!(encode_u64(0x0e), vec![0x0e]);
        assert_eq!(encode_u64(0x3b9ac9ff), vec![0x84, 0x3b, 0x9a, 0xc9, 0xff]);
        assert_eq!(encode_u256(&U256::from(0x80u64)), vec![0x81, 0x80]);
    }

    #[test]
    fn encode_nested_list() {
        let inner = encode_list(&[encode_u64(1), encode_bytes(&[]), encode_bytes(&[])]);
        assert_eq!(inner, vec![0xc3, 0x01, 0x80, 0x80]);
        let outer = encode_list(&[inner]);
        assert_eq!(outer, vec![0xc4, 0xc3, 0x01, 0x80, 0x80]);
    }

    #[test]
    fn encode_long_list_header() {
        let items: Vec<Vec<u8>> = (0..60).map(|_| encode_u64(1)).collect();
        let out = encode_list(&items);
        assert_eq!(&out[..2], &[0xf8, 60]);
        assert_eq!(out.len(), 62);
    }

    #[test]
    fn decode_roundtrip_tree() {
        let encoded = encode_list(&[
            encode_u64(7),
            encode_list(&[encode_bytes(b"abc")]),
            encode_bytes(&[]),
        ]);
        let item = RlpItem::decode(&encoded).unwrap();
        let list = item.as_list("root").unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].as_u64("a").unwrap(), 7);
        assert_eq!(
            list[1].as_list("b").unwrap()[0].as_bytes("c").unwrap(),
            b"abc"
        );
        assert_eq!(list[2].as_u64("d").unwrap(), 0);
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let err = RlpItem::decode(&[0x01, 0x02]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedEncoding(_)));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let err = RlpItem::decode(&[0x83, 0x61]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedEncoding(_)));
    }

    #[test]
    fn decode_rejects_leading_zero_integer() {
        let item = RlpItem::decode(&[0x82, 0x00, 0x01]).unwrap();
        assert!(item.as_u64("nonce").is_err());
    }

    #[test]
    fn decode_rejects_oversized_u64() {
        let encoded = encode_bytes(&[1u8; 9]);
        let item = RlpItem::decode(&encoded).unwrap();
        assert!(item.as_u64("gas").is_err());
    }

    #[test]
    fn list_where_string_expected() {
        let item = RlpItem::decode(&[0xc0]).unwrap();
        assert!(item.as_bytes("to").is_err());
        assert!(item.as_list("sigs").unwrap().is_empty());
    }

    fn nested(levels: usize) -> Vec<u8> {
        (0..levels).fold(encode_bytes(&[]), |inner, _| encode_list(&[inner]))
    }

    #[test]
    fn nesting_limit() {
        assert!(RlpItem::decode(&nested(MAX_DEPTH)).is_ok());
        let err = RlpItem::decode(&nested(MAX_DEPTH + 1)).unwrap_err();
        assert_eq!(err, CodecError::malformed("RLP nesting too deep"));
    }

    #[test]
    fn optional_address() {
        let item = RlpItem::decode(&[0x80]).unwrap();
        assert_eq!(item.as_optional_address("to").unwrap(), None);
        let addr = Address::from_bytes([0x11; 20]);
        let encoded = encode_address(&addr);
        let item = RlpItem::decode(&encoded).unwrap();
        assert_eq!(item.as_optional_address("to").unwrap(), Some(addr));
    }
}
