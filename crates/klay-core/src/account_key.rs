//! On-chain account key structures.
//!
//! An account key describes which public keys authorise an account and how
//! signatures are weighed. It is carried RLP-encoded inside account-update
//! transactions and produced from a keyring when registering an account.
//!
//! Encoding is `type_byte ++ RLP(body)`:
//!
//! | Variant          | Type | Body                                   |
//! |------------------|------|----------------------------------------|
//! | Nil              | -    | (the whole encoding is `0x80`)         |
//! | Legacy           | 0x01 | `[]`                                   |
//! | Public           | 0x02 | compressed public key                  |
//! | Fail             | 0x03 | `[]`                                   |
//! | WeightedMultiSig | 0x04 | `[threshold, [[weight, key], ...]]`    |
//! | RoleBased        | 0x05 | `[encoded_role_key, ...]`              |

use crate::constants::ROLE_COUNT;
use crate::crypto::PublicKey;
use crate::error::CodecError;
use crate::rlp::{encode_bytes, encode_list, encode_u64, RlpItem, RlpResult};

const KEY_TYPE_LEGACY: u8 = 0x01;
const KEY_TYPE_PUBLIC: u8 = 0x02;
const KEY_TYPE_FAIL: u8 = 0x03;
const KEY_TYPE_WEIGHTED_MULTISIG: u8 = 0x04;
const KEY_TYPE_ROLE_BASED: u8 = 0x05;
const NIL_ENCODING: u8 = 0x80;

/// Threshold and per-key weights for a weighted multi-sig key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedMultiSigOptions {
    /// Sum of weights a set of signatures must reach.
    pub threshold: u32,
    /// One weight per key. Empty means weight 1 for every key.
    pub weights: Vec<u32>,
}

impl Default for WeightedMultiSigOptions {
    fn default() -> Self {
        Self {
            threshold: 1,
            weights: Vec::new(),
        }
    }
}

impl WeightedMultiSigOptions {
    /// Options with an explicit threshold and weights.
    pub fn new(threshold: u32, weights: Vec<u32>) -> Self {
        Self { threshold, weights }
    }

    /// Whether these are the defaults (threshold 1, implicit weights).
    pub fn is_default(&self) -> bool {
        self.threshold == 1 && self.weights.is_empty()
    }
}

/// A public key with its weight in a multi-sig key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedPublicKey {
    pub weight: u32,
    pub key: PublicKey,
}

/// An account key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountKey {
    /// No change; only valid as a role inside a role-based key update.
    Nil,
    /// The address-derived key.
    Legacy,
    /// A single public key.
    Public(PublicKey),
    /// Rejects every transaction.
    Fail,
    /// Several weighted public keys.
    WeightedMultiSig {
        threshold: u32,
        keys: Vec<WeightedPublicKey>,
    },
    /// One key per role: transaction, account update, fee payer.
    RoleBased(Vec<AccountKey>),
}

impl AccountKey {
    /// Build a weighted multi-sig key, validating weights against the threshold.
    pub fn weighted(keys: &[PublicKey], options: &WeightedMultiSigOptions) -> Result<Self, CodecError> {
        if keys.is_empty() {
            return Err(CodecError::invalid("keys", "weighted multi-sig needs at least one key"));
        }
        let weights: Vec<u32> = if options.weights.is_empty() {
            vec![1; keys.len()]
        } else {
            options.weights.clone()
        };
        if weights.len() != keys.len() {
            return Err(CodecError::invalid(
                "weights",
                format!("{} weights for {} keys", weights.len(), keys.len()),
            ));
        }
        let total: u64 = weights.iter().map(|&w| w as u64).sum();
        if options.threshold == 0 || total < options.threshold as u64 {
            return Err(CodecError::invalid(
                "threshold",
                format!("threshold {} unreachable with total weight {total}", options.threshold),
            ));
        }
        Ok(Self::WeightedMultiSig {
            threshold: options.threshold,
            keys: keys
                .iter()
                .zip(weights)
                .map(|(&key, weight)| WeightedPublicKey { weight, key })
                .collect(),
        })
    }

    /// Build a role-based key from up to three role keys.
    pub fn role_based(roles: Vec<AccountKey>) -> Result<Self, CodecError> {
        if roles.is_empty() || roles.len() > ROLE_COUNT {
            return Err(CodecError::invalid(
                "roles",
                format!("role-based key needs 1 to {ROLE_COUNT} roles, got {}", roles.len()),
            ));
        }
        if roles.iter().any(|r| matches!(r, AccountKey::RoleBased(_))) {
            return Err(CodecError::invalid("roles", "role keys cannot be role-based"));
        }
        Ok(Self::RoleBased(roles))
    }

    /// Short variant name as used by the chain's JSON-RPC.
    pub fn type_name(&self) -> &'static str {
        match self {
            AccountKey::Nil => "AccountKeyNil",
            AccountKey::Legacy => "AccountKeyLegacy",
            AccountKey::Public(_) => "AccountKeyPublic",
            AccountKey::Fail => "AccountKeyFail",
            AccountKey::WeightedMultiSig { .. } => "AccountKeyWeightedMultiSig",
            AccountKey::RoleBased(_) => "AccountKeyRoleBased",
        }
    }

    /// Type-prefixed encoding.
    pub fn encode(&self) -> Vec<u8> {
        let (type_byte, body) = match self {
            AccountKey::Nil => return vec![NIL_ENCODING],
            AccountKey::Legacy => (KEY_TYPE_LEGACY, encode_list(&[])),
            AccountKey::Public(key) => (KEY_TYPE_PUBLIC, encode_bytes(&key.compressed())),
            AccountKey::Fail => (KEY_TYPE_FAIL, encode_list(&[])),
            AccountKey::WeightedMultiSig { threshold, keys } => {
                let entries: Vec<Vec<u8>> = keys
                    .iter()
                    .map(|k| encode_list(&[encode_u64(k.weight as u64), encode_bytes(&k.key.compressed())]))
                    .collect();
                (
                    KEY_TYPE_WEIGHTED_MULTISIG,
                    encode_list(&[encode_u64(*threshold as u64), encode_list(&entries)]),
                )
            }
            AccountKey::RoleBased(roles) => {
                let entries: Vec<Vec<u8>> = roles.iter().map(|r| encode_bytes(&r.encode())).collect();
                (KEY_TYPE_ROLE_BASED, encode_list(&entries))
            }
        };
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(type_byte);
        out.extend_from_slice(&body);
        out
    }

    /// Decode a type-prefixed encoding.
    pub fn decode(data: &[u8]) -> RlpResult<Self> {
        Self::decode_inner(data, true)
    }

    fn decode_inner(data: &[u8], allow_roles: bool) -> RlpResult<Self> {
        let (&type_byte, body) = data
            .split_first()
            .ok_or_else(|| CodecError::malformed("empty account key"))?;
        match type_byte {
            NIL_ENCODING if body.is_empty() => Ok(AccountKey::Nil),
            KEY_TYPE_LEGACY => {
                expect_empty_list(body)?;
                Ok(AccountKey::Legacy)
            }
            KEY_TYPE_FAIL => {
                expect_empty_list(body)?;
                Ok(AccountKey::Fail)
            }
            KEY_TYPE_PUBLIC => {
                let item = RlpItem::decode(body)?;
                Ok(AccountKey::Public(decode_public_key(&item)?))
            }
            KEY_TYPE_WEIGHTED_MULTISIG => {
                let item = RlpItem::decode(body)?;
                let fields = item.as_list("weightedMultiSig")?;
                let [threshold, entries] = fields else {
                    return Err(CodecError::malformed(format!(
                        "weighted multi-sig key has {} fields, expected 2",
                        fields.len()
                    )));
                };
                let threshold = decode_u32(threshold, "threshold")?;
                let keys = entries
                    .as_list("weightedKeys")?
                    .iter()
                    .map(|entry| {
                        let pair = entry.as_list("weightedKey")?;
                        let [weight, key] = pair else {
                            return Err(CodecError::malformed("weighted key entry must be [weight, key]"));
                        };
                        Ok(WeightedPublicKey {
                            weight: decode_u32(weight, "weight")?,
                            key: decode_public_key(key)?,
                        })
                    })
                    .collect::<RlpResult<Vec<_>>>()?;
                if keys.is_empty() {
                    return Err(CodecError::malformed("weighted multi-sig key without keys"));
                }
                Ok(AccountKey::WeightedMultiSig { threshold, keys })
            }
            KEY_TYPE_ROLE_BASED if allow_roles => {
                let item = RlpItem::decode(body)?;
                let roles = item
                    .as_list("roleBasedKey")?
                    .iter()
                    .map(|r| Self::decode_inner(r.as_bytes("roleKey")?, false))
                    .collect::<RlpResult<Vec<_>>>()?;
                if roles.is_empty() || roles.len() > ROLE_COUNT {
                    return Err(CodecError::malformed(format!(
                        "role-based key with {} roles",
                        roles.len()
                    )));
                }
                Ok(AccountKey::RoleBased(roles))
            }
            other => Err(CodecError::malformed(format!("unknown account key type 0x{other:02x}"))),
        }
    }
}

fn expect_empty_list(body: &[u8]) -> RlpResult<()> {
    let item = RlpItem::decode(body)?;
    if !item.as_list("accountKey")?.is_empty() {
        return Err(CodecError::malformed("expected an empty list"));
    }
    Ok(())
}

fn decode_public_key(item: &RlpItem<'_>) -> RlpResult<PublicKey> {
    let bytes = item.as_bytes("publicKey")?;
    PublicKey::from_sec1_bytes(bytes).map_err(|e| CodecError::malformed(format!("publicKey: {e}")))
}

fn decode_u32(item: &RlpItem<'_>, field: &'static str) -> RlpResult<u32> {
    let value = item.as_u64(field)?;
    u32::try_from(value).map_err(|_| CodecError::malformed(format!("{field} {value} exceeds u32")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn key(seed: u8) -> PublicKey {
        KeyPair::from_secret_bytes(&[seed; 32]).unwrap().public_key()
    }

    #[test]
    fn fixed_encodings() {
        assert_eq!(AccountKey::Nil.encode(), vec![0x80]);
        assert_eq!(AccountKey::Legacy.encode(), vec![0x01, 0xc0]);
        assert_eq!(AccountKey::Fail.encode(), vec![0x03, 0xc0]);
    }

    #[test]
    fn public_key_encoding() {
        let pk = key(1);
        let encoded = AccountKey::Public(pk).encode();
        assert_eq!(encoded[0], 0x02);
        assert_eq!(encoded[1], 0xa1);
        assert_eq!(&encoded[2..], &pk.compressed());
        assert_eq!(AccountKey::decode(&encoded).unwrap(), AccountKey::Public(pk));
    }

    #[test]
    fn weighted_roundtrip() {
        let ak = AccountKey::weighted(&[key(1), key(2)], &WeightedMultiSigOptions::new(2, vec![1, 1])).unwrap();
        let encoded = ak.encode();
        assert_eq!(encoded[0], 0x04);
        assert_eq!(AccountKey::decode(&encoded).unwrap(), ak);
    }

    #[test]
    fn weighted_defaults_to_unit_weights() {
        let ak = AccountKey::weighted(&[key(1), key(2)], &WeightedMultiSigOptions::default()).unwrap();
        match ak {
            AccountKey::WeightedMultiSig { threshold, keys } => {
                assert_eq!(threshold, 1);
                assert!(keys.iter().all(|k| k.weight == 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn weighted_rejects_unreachable_threshold() {
        let err = AccountKey::weighted(&[key(1)], &WeightedMultiSigOptions::new(3, vec![1])).unwrap_err();
        assert!(matches!(err, CodecError::InvalidField { field: "threshold", .. }));
    }

    #[test]
    fn weighted_rejects_weight_count_mismatch() {
        let err = AccountKey::weighted(&[key(1), key(2)], &WeightedMultiSigOptions::new(1, vec![1])).unwrap_err();
        assert!(matches!(err, CodecError::InvalidField { field: "weights", .. }));
    }

    #[test]
    fn role_based_roundtrip_with_nil() {
        let ak = AccountKey::role_based(vec![
            AccountKey::Public(key(1)),
            AccountKey::Nil,
            AccountKey::Public(key(3)),
        ])
        .unwrap();
        let encoded = ak.encode();
        assert_eq!(encoded[0], 0x05);
        assert_eq!(AccountKey::decode(&encoded).unwrap(), ak);
    }

    #[test]
    fn nested_role_based_rejected() {
        let inner = AccountKey::RoleBased(vec![AccountKey::Legacy]);
        assert!(AccountKey::role_based(vec![inner.clone()]).is_err());
        let encoded = AccountKey::RoleBased(vec![inner]).encode();
        assert!(AccountKey::decode(&encoded).is_err());
    }

    #[test]
    fn unknown_type_rejected() {
        assert!(matches!(
            AccountKey::decode(&[0x09, 0xc0]).unwrap_err(),
            CodecError::MalformedEncoding(_)
        ));
        assert!(AccountKey::decode(&[]).is_err());
    }
}
