//! Wire encoding, signing payloads and decoding.
//!
//! Typed transactions encode as `tag ++ RLP([fields.., (feeRatio), sigs,
//! (feePayer, feePayerSigs)])`. The sender hashes
//! `RLP([RLP([tag, fields.., (feeRatio)]), chainId, "", ""])`; the fee
//! payer hashes the same with its address inserted before the chain id.
//! Legacy transactions use the plain EIP-155 nine-field list.
//!
//! Signature lists are never empty on the wire: an unsigned slot carries the
//! placeholder `[0x01, "", ""]`, and decoding drops placeholders again.

use crate::account_key::AccountKey;
use crate::constants::{MAX_FEE_RATIO, MIN_FEE_RATIO};
use crate::crypto::keccak256;
use crate::error::CodecError;
use crate::rlp::{
    encode_address, encode_bytes, encode_list, encode_optional_address, encode_u256, encode_u64,
    RlpItem, RlpResult,
};
use crate::types::{from_hex, to_hex, RecoveryValue, SignatureData};

use super::{FeeDelegation, Transaction, TxFamily, TxPayload, TxType};

const LEGACY_FIELD_COUNT: usize = 9;

impl Transaction {
    /// Broadcastable bytes.
    pub fn rlp_encoding(&self) -> Result<Vec<u8>, CodecError> {
        let mut fields = self.encoded_fields()?;
        let Some(tag) = self.tx_type().tag() else {
            let sig = match self.signatures.as_slice() {
                [] => SignatureData::EMPTY,
                [sig] => *sig,
                more => {
                    return Err(CodecError::invalid(
                        "signatures",
                        format!("legacy transaction carries one signature, found {}", more.len()),
                    ));
                }
            };
            fields.extend(encode_signature_fields(&sig)?);
            return Ok(encode_list(&fields));
        };

        fields.push(encode_signature_list(&self.signatures)?);
        if let Some(fd) = &self.fee_delegation {
            fields.push(encode_optional_address(fd.fee_payer.as_ref()));
            fields.push(encode_signature_list(&fd.fee_payer_signatures)?);
        }
        Ok(prefixed(tag, &encode_list(&fields)))
    }

    /// Broadcastable bytes as `0x` hex.
    pub fn raw_transaction(&self) -> Result<String, CodecError> {
        self.rlp_encoding().map(|raw| to_hex(&raw))
    }

    /// Bytes the sender hashes and signs.
    pub fn sender_signing_payload(&self) -> Result<Vec<u8>, CodecError> {
        let chain_id = self.chain_id.ok_or(CodecError::MissingField("chainId"))?;
        let mut fields = self.encoded_fields()?;
        match self.tx_type().tag() {
            None => {
                fields.extend([encode_u64(chain_id), encode_bytes(&[]), encode_bytes(&[])]);
                Ok(encode_list(&fields))
            }
            Some(tag) => Ok(encode_list(&[
                tagged_list(tag, fields),
                encode_u64(chain_id),
                encode_bytes(&[]),
                encode_bytes(&[]),
            ])),
        }
    }

    /// Bytes the fee payer hashes and signs.
    pub fn fee_payer_signing_payload(&self) -> Result<Vec<u8>, CodecError> {
        let tx_type = self.tx_type();
        let (Some(tag), Some(fd)) = (tx_type.tag(), &self.fee_delegation) else {
            return Err(CodecError::NotFeeDelegated(tx_type.name()));
        };
        let fee_payer = fd.fee_payer.ok_or(CodecError::MissingField("feePayer"))?;
        let chain_id = self.chain_id.ok_or(CodecError::MissingField("chainId"))?;
        let fields = self.encoded_fields()?;
        Ok(encode_list(&[
            tagged_list(tag, fields),
            encode_address(&fee_payer),
            encode_u64(chain_id),
            encode_bytes(&[]),
            encode_bytes(&[]),
        ]))
    }

    /// Keccak-256 of [`Self::sender_signing_payload`].
    pub fn sender_signing_hash(&self) -> Result<[u8; 32], CodecError> {
        self.sender_signing_payload().map(|p| keccak256(&p))
    }

    /// Keccak-256 of [`Self::fee_payer_signing_payload`].
    pub fn fee_payer_signing_hash(&self) -> Result<[u8; 32], CodecError> {
        self.fee_payer_signing_payload().map(|p| keccak256(&p))
    }

    /// Hash of the full raw transaction.
    pub fn transaction_hash(&self) -> Result<[u8; 32], CodecError> {
        self.rlp_encoding().map(|raw| keccak256(&raw))
    }

    /// Hash identifying the sender's part of a fee-delegated transaction:
    /// the raw encoding without fee payer data. Equals the transaction hash
    /// for every other type.
    pub fn sender_tx_hash(&self) -> Result<[u8; 32], CodecError> {
        let tx_type = self.tx_type();
        match (tx_type.tag(), tx_type.is_fee_delegated()) {
            (Some(tag), true) => {
                let mut fields = self.encoded_fields()?;
                fields.push(encode_signature_list(&self.signatures)?);
                Ok(keccak256(&prefixed(tag, &encode_list(&fields))))
            }
            _ => self.transaction_hash(),
        }
    }

    /// Decode raw bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let (&first, rest) = raw
            .split_first()
            .ok_or_else(|| CodecError::malformed("empty transaction"))?;
        if first >= 0xc0 {
            return decode_legacy(raw);
        }
        if first >= 0x80 {
            return Err(CodecError::malformed("transaction is an RLP string, not a list"));
        }
        decode_typed(TxType::from_tag(first)?, rest)
    }

    /// Decode `0x` hex.
    pub fn decode_hex(raw: &str) -> Result<Self, CodecError> {
        let bytes = from_hex(raw).map_err(|e| CodecError::malformed(format!("raw transaction hex: {e}")))?;
        Self::decode(&bytes)
    }

    /// Family fields in wire order, fee ratio appended for with-ratio types.
    fn encoded_fields(&self) -> Result<Vec<Vec<u8>>, CodecError> {
        let nonce = encode_u64(self.nonce.ok_or(CodecError::MissingField("nonce"))?);
        let gas_price = encode_u256(&self.gas_price.ok_or(CodecError::MissingField("gasPrice"))?);
        let gas = encode_u64(self.gas);

        let mut fields = vec![nonce, gas_price, gas];
        let from = match (&self.payload, self.from.as_ref()) {
            (TxPayload::Legacy { to, value, input }, _) => {
                if self.fee_delegation.is_some() {
                    return Err(CodecError::ForbiddenField("feePayer"));
                }
                fields.extend([
                    encode_optional_address(to.as_ref()),
                    encode_u256(value),
                    encode_bytes(input),
                ]);
                return Ok(fields);
            }
            (_, Some(from)) => encode_address(from),
            (_, None) => return Err(CodecError::MissingField("from")),
        };

        match &self.payload {
            TxPayload::Legacy { .. } => {}
            TxPayload::ValueTransfer { to, value } => {
                fields.extend([encode_address(to), encode_u256(value), from]);
            }
            TxPayload::ValueTransferMemo { to, value, input }
            | TxPayload::SmartContractExecution { to, value, input } => {
                fields.extend([encode_address(to), encode_u256(value), from, encode_bytes(input)]);
            }
            TxPayload::AccountUpdate { account_key } => {
                fields.extend([from, encode_bytes(&account_key.encode())]);
            }
            TxPayload::SmartContractDeploy {
                value,
                input,
                human_readable,
                code_format,
            } => {
                fields.extend([
                    encode_bytes(&[]),
                    encode_u256(value),
                    from,
                    encode_bytes(input),
                    encode_u64(*human_readable as u64),
                    encode_u64(*code_format as u64),
                ]);
            }
            TxPayload::Cancel => fields.push(from),
            TxPayload::ChainDataAnchoring { input } => {
                fields.extend([from, encode_bytes(input)]);
            }
        }

        if let Some(FeeDelegation {
            fee_ratio: Some(ratio),
            ..
        }) = &self.fee_delegation
        {
            fields.push(encode_u64(check_fee_ratio(*ratio as u64)? as u64));
        }
        Ok(fields)
    }
}

fn prefixed(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(tag);
    out.extend_from_slice(body);
    out
}

fn tagged_list(tag: u8, fields: Vec<Vec<u8>>) -> Vec<u8> {
    let mut items = Vec::with_capacity(fields.len() + 1);
    items.push(encode_u64(tag as u64));
    items.extend(fields);
    encode_list(&items)
}

fn check_fee_ratio(ratio: u64) -> Result<u8, CodecError> {
    if (MIN_FEE_RATIO as u64..=MAX_FEE_RATIO as u64).contains(&ratio) {
        Ok(ratio as u8)
    } else {
        Err(CodecError::invalid(
            "feeRatio",
            format!("{ratio} outside {MIN_FEE_RATIO}..={MAX_FEE_RATIO}"),
        ))
    }
}

fn encode_signature_fields(sig: &SignatureData) -> Result<[Vec<u8>; 3], CodecError> {
    let v = sig
        .v
        .to_v()
        .map_err(|e| CodecError::invalid("signatures", e.to_string()))?;
    Ok([encode_u64(v), encode_u256(&sig.r), encode_u256(&sig.s)])
}

fn encode_signature_list(sigs: &[SignatureData]) -> Result<Vec<u8>, CodecError> {
    let entries = if sigs.is_empty() {
        vec![encode_list(&encode_signature_fields(&SignatureData::EMPTY)?)]
    } else {
        sigs.iter()
            .map(|s| encode_signature_fields(s).map(|f| encode_list(&f)))
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(encode_list(&entries))
}

fn decode_signature(v: &RlpItem<'_>, r: &RlpItem<'_>, s: &RlpItem<'_>) -> RlpResult<SignatureData> {
    Ok(SignatureData::new(
        RecoveryValue::from_v(v.as_u64("v")?)?,
        r.as_u256("r")?,
        s.as_u256("s")?,
    ))
}

/// Decode a signature list, dropping unsigned placeholders.
fn decode_signature_list(item: &RlpItem<'_>, field: &'static str) -> RlpResult<Vec<SignatureData>> {
    let mut out = Vec::new();
    for entry in item.as_list(field)? {
        let triple = entry.as_list(field)?;
        let [v, r, s] = triple else {
            return Err(CodecError::malformed(format!(
                "{field} entry has {} items, expected 3",
                triple.len()
            )));
        };
        let sig = decode_signature(v, r, s)?;
        if !sig.is_empty() {
            out.push(sig);
        }
    }
    Ok(out)
}

/// Chain id bound into the first real signature; every other signature must agree.
fn chain_id_from_signatures<'s>(
    sigs: impl IntoIterator<Item = &'s SignatureData>,
) -> RlpResult<Option<u64>> {
    let mut chain_id = None;
    for id in sigs.into_iter().filter_map(|s| s.v.chain_id()) {
        match chain_id {
            None => chain_id = Some(id),
            Some(seen) if seen != id => {
                return Err(CodecError::malformed(format!(
                    "signatures bound to different chains ({seen} and {id})"
                )));
            }
            Some(_) => {}
        }
    }
    Ok(chain_id)
}

fn decode_legacy(raw: &[u8]) -> Result<Transaction, CodecError> {
    let item = RlpItem::decode(raw)?;
    let fields = item.as_list("transaction")?;
    let [nonce, gas_price, gas, to, value, input, v, r, s] = fields else {
        return Err(CodecError::malformed(format!(
            "{} expects {LEGACY_FIELD_COUNT} fields, found {}",
            TxType::LEGACY.name(),
            fields.len()
        )));
    };
    let sig = decode_signature(v, r, s)?;
    let signatures = if sig.is_empty() { Vec::new() } else { vec![sig] };
    Ok(Transaction {
        payload: TxPayload::Legacy {
            to: to.as_optional_address("to")?,
            value: value.as_u256("value")?,
            input: input.as_bytes("input")?.to_vec(),
        },
        from: None,
        nonce: Some(nonce.as_u64("nonce")?),
        gas_price: Some(gas_price.as_u256("gasPrice")?),
        gas: gas.as_u64("gas")?,
        chain_id: chain_id_from_signatures(&signatures)?,
        fee_delegation: None,
        signatures,
    })
}

fn family_field_count(family: TxFamily) -> usize {
    match family {
        TxFamily::Legacy => 6,
        TxFamily::ValueTransfer => 6,
        TxFamily::ValueTransferMemo => 7,
        TxFamily::AccountUpdate => 5,
        TxFamily::SmartContractDeploy => 9,
        TxFamily::SmartContractExecution => 7,
        TxFamily::Cancel => 4,
        TxFamily::ChainDataAnchoring => 5,
    }
}

/// Positional reader over a decoded field list whose length was checked.
struct Fields<'i, 'a> {
    items: std::slice::Iter<'i, RlpItem<'a>>,
}

impl<'i, 'a> Fields<'i, 'a> {
    fn next(&mut self, field: &'static str) -> RlpResult<&'i RlpItem<'a>> {
        self.items.next().ok_or(CodecError::MissingField(field))
    }
}

fn decode_typed(tx_type: TxType, body: &[u8]) -> Result<Transaction, CodecError> {
    let item = RlpItem::decode(body)?;
    let list = item.as_list("transaction")?;

    let expected = family_field_count(tx_type.family)
        + tx_type.has_fee_ratio() as usize
        + 1
        + if tx_type.is_fee_delegated() { 2 } else { 0 };
    if list.len() != expected {
        return Err(CodecError::malformed(format!(
            "{tx_type} expects {expected} fields, found {}",
            list.len()
        )));
    }

    let mut f = Fields { items: list.iter() };
    let nonce = f.next("nonce")?.as_u64("nonce")?;
    let gas_price = f.next("gasPrice")?.as_u256("gasPrice")?;
    let gas = f.next("gas")?.as_u64("gas")?;

    let (payload, from) = match tx_type.family {
        TxFamily::Legacy => return Err(CodecError::malformed("legacy transactions carry no tag")),
        TxFamily::ValueTransfer => {
            let to = f.next("to")?.as_address("to")?;
            let value = f.next("value")?.as_u256("value")?;
            let from = f.next("from")?.as_address("from")?;
            (TxPayload::ValueTransfer { to, value }, from)
        }
        TxFamily::ValueTransferMemo | TxFamily::SmartContractExecution => {
            let to = f.next("to")?.as_address("to")?;
            let value = f.next("value")?.as_u256("value")?;
            let from = f.next("from")?.as_address("from")?;
            let input = f.next("input")?.as_bytes("input")?.to_vec();
            let payload = if tx_type.family == TxFamily::ValueTransferMemo {
                TxPayload::ValueTransferMemo { to, value, input }
            } else {
                TxPayload::SmartContractExecution { to, value, input }
            };
            (payload, from)
        }
        TxFamily::AccountUpdate => {
            let from = f.next("from")?.as_address("from")?;
            let account_key = AccountKey::decode(f.next("key")?.as_bytes("key")?)?;
            (TxPayload::AccountUpdate { account_key }, from)
        }
        TxFamily::SmartContractDeploy => {
            if f.next("to")?.as_optional_address("to")?.is_some() {
                return Err(CodecError::ForbiddenField("to"));
            }
            let value = f.next("value")?.as_u256("value")?;
            let from = f.next("from")?.as_address("from")?;
            let input = f.next("input")?.as_bytes("input")?.to_vec();
            let human_readable = match f.next("humanReadable")?.as_u64("humanReadable")? {
                0 => false,
                1 => true,
                other => {
                    return Err(CodecError::malformed(format!("humanReadable must be 0 or 1, got {other}")));
                }
            };
            let code_format = f.next("codeFormat")?.as_u64("codeFormat")?;
            let code_format = u8::try_from(code_format)
                .map_err(|_| CodecError::malformed(format!("codeFormat {code_format} out of range")))?;
            (
                TxPayload::SmartContractDeploy {
                    value,
                    input,
                    human_readable,
                    code_format,
                },
                from,
            )
        }
        TxFamily::Cancel => (TxPayload::Cancel, f.next("from")?.as_address("from")?),
        TxFamily::ChainDataAnchoring => {
            let from = f.next("from")?.as_address("from")?;
            let input = f.next("input")?.as_bytes("input")?.to_vec();
            (TxPayload::ChainDataAnchoring { input }, from)
        }
    };

    let fee_ratio = if tx_type.has_fee_ratio() {
        Some(check_fee_ratio(f.next("feeRatio")?.as_u64("feeRatio")?)?)
    } else {
        None
    };
    let signatures = decode_signature_list(f.next("signatures")?, "signatures")?;
    let fee_delegation = if tx_type.is_fee_delegated() {
        Some(FeeDelegation {
            fee_ratio,
            fee_payer: f.next("feePayer")?.as_optional_address("feePayer")?,
            fee_payer_signatures: decode_signature_list(f.next("feePayerSignatures")?, "feePayerSignatures")?,
        })
    } else {
        None
    };

    let chain_id = chain_id_from_signatures(
        signatures
            .iter()
            .chain(fee_delegation.iter().flat_map(|fd| fd.fee_payer_signatures.iter())),
    )?;

    Ok(Transaction {
        payload,
        from: Some(from),
        nonce: Some(nonce),
        gas_price: Some(gas_price),
        gas,
        chain_id,
        fee_delegation,
        signatures,
    })
}
