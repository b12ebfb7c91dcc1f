//! JSON transaction requests.
//!
//! [`TransactionRequest`] is the loosely typed, camelCase form in which
//! transactions arrive from JSON (files, RPC payloads, CLI input). Converting
//! it into a [`Transaction`] enforces the field set of the named type: a
//! required field that is absent yields [`CodecError::MissingField`], a field
//! the type does not carry yields [`CodecError::ForbiddenField`].

use serde::{Deserialize, Serialize};

use crate::account_key::AccountKey;
use crate::address::Address;
use crate::constants::{CODE_FORMAT_EVM, MAX_FEE_RATIO, MIN_FEE_RATIO};
use crate::error::CodecError;
use crate::types::{from_hex, parse_u256, parse_u64, quantity_hex, to_hex, u256_quantity_hex, SignatureData, U256};

use super::{FeeDelegation, FeeMode, Transaction, TxFamily, TxPayload, TxType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Chain type name, e.g. `TxTypeValueTransfer`.
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, alias = "data", skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// RLP-encoded account key, hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_readable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer: Option<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<SignatureData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fee_payer_signatures: Vec<SignatureData>,
}

fn require<T>(field: &'static str, value: Option<T>) -> Result<T, CodecError> {
    value.ok_or(CodecError::MissingField(field))
}

fn forbid<T>(field: &'static str, value: &Option<T>) -> Result<(), CodecError> {
    match value {
        Some(_) => Err(CodecError::ForbiddenField(field)),
        None => Ok(()),
    }
}

fn bytes_field(field: &'static str, value: &str) -> Result<Vec<u8>, CodecError> {
    from_hex(value).map_err(|e| CodecError::invalid(field, e.to_string()))
}

fn value_or_zero(value: Option<&str>) -> Result<U256, CodecError> {
    value.map(|v| parse_u256("value", v)).transpose().map(|v| v.unwrap_or(U256::ZERO))
}

fn real_signatures(sigs: &[SignatureData]) -> Vec<SignatureData> {
    sigs.iter().filter(|s| !s.is_empty()).copied().collect()
}

impl Transaction {
    /// Build a transaction from its JSON request, validating the field set.
    pub fn from_request(req: &TransactionRequest) -> Result<Self, CodecError> {
        let tx_type = TxType::from_name(&req.tx_type)?;
        let from = req.from;
        if !tx_type.is_legacy() {
            require("from", from)?;
        }

        let payload = match tx_type.family {
            TxFamily::Legacy => TxPayload::Legacy {
                to: req.to,
                value: value_or_zero(req.value.as_deref())?,
                input: req.input.as_deref().map(|i| bytes_field("input", i)).transpose()?.unwrap_or_default(),
            },
            TxFamily::ValueTransfer => {
                forbid("input", &req.input)?;
                TxPayload::ValueTransfer {
                    to: require("to", req.to)?,
                    value: parse_u256("value", require("value", req.value.as_deref())?)?,
                }
            }
            TxFamily::ValueTransferMemo => TxPayload::ValueTransferMemo {
                to: require("to", req.to)?,
                value: parse_u256("value", require("value", req.value.as_deref())?)?,
                input: bytes_field("input", require("input", req.input.as_deref())?)?,
            },
            TxFamily::AccountUpdate => {
                forbid("to", &req.to)?;
                forbid("value", &req.value)?;
                forbid("input", &req.input)?;
                let key = bytes_field("key", require("key", req.key.as_deref())?)?;
                TxPayload::AccountUpdate {
                    account_key: AccountKey::decode(&key)?,
                }
            }
            TxFamily::SmartContractDeploy => {
                forbid("to", &req.to)?;
                let code_format = req
                    .code_format
                    .as_deref()
                    .map(|c| parse_u64("codeFormat", c))
                    .transpose()?
                    .unwrap_or(CODE_FORMAT_EVM as u64);
                TxPayload::SmartContractDeploy {
                    value: value_or_zero(req.value.as_deref())?,
                    input: bytes_field("input", require("input", req.input.as_deref())?)?,
                    human_readable: req.human_readable.unwrap_or(false),
                    code_format: u8::try_from(code_format)
                        .map_err(|_| CodecError::invalid("codeFormat", format!("{code_format} out of range")))?,
                }
            }
            TxFamily::SmartContractExecution => TxPayload::SmartContractExecution {
                to: require("to", req.to)?,
                value: value_or_zero(req.value.as_deref())?,
                input: bytes_field("input", require("input", req.input.as_deref())?)?,
            },
            TxFamily::Cancel => {
                forbid("to", &req.to)?;
                forbid("value", &req.value)?;
                forbid("input", &req.input)?;
                TxPayload::Cancel
            }
            TxFamily::ChainDataAnchoring => {
                forbid("to", &req.to)?;
                forbid("value", &req.value)?;
                TxPayload::ChainDataAnchoring {
                    input: bytes_field("input", require("input", req.input.as_deref())?)?,
                }
            }
        };

        if tx_type.family != TxFamily::AccountUpdate {
            forbid("key", &req.key)?;
        }
        if tx_type.family != TxFamily::SmartContractDeploy {
            forbid("humanReadable", &req.human_readable)?;
            forbid("codeFormat", &req.code_format)?;
        }

        let fee_delegation = match tx_type.fee_mode {
            FeeMode::Sender => {
                forbid("feeRatio", &req.fee_ratio)?;
                forbid("feePayer", &req.fee_payer)?;
                if !req.fee_payer_signatures.is_empty() {
                    return Err(CodecError::ForbiddenField("feePayerSignatures"));
                }
                None
            }
            FeeMode::Delegated | FeeMode::DelegatedWithRatio => {
                let fee_ratio = if tx_type.fee_mode == FeeMode::DelegatedWithRatio {
                    let ratio = parse_u64("feeRatio", require("feeRatio", req.fee_ratio.as_deref())?)?;
                    Some(u8::try_from(ratio).map_err(|_| CodecError::invalid("feeRatio", format!("{ratio} out of range")))?)
                } else {
                    forbid("feeRatio", &req.fee_ratio)?;
                    None
                };
                Some(FeeDelegation {
                    fee_ratio,
                    fee_payer: req.fee_payer,
                    fee_payer_signatures: real_signatures(&req.fee_payer_signatures),
                })
            }
        };

        let tx = Transaction {
            payload,
            from,
            nonce: req.nonce.as_deref().map(|n| parse_u64("nonce", n)).transpose()?,
            gas_price: req.gas_price.as_deref().map(|g| parse_u256("gasPrice", g)).transpose()?,
            gas: parse_u64("gas", require("gas", req.gas.as_deref())?)?,
            chain_id: req.chain_id.as_deref().map(|c| parse_u64("chainId", c)).transpose()?,
            fee_delegation,
            signatures: real_signatures(&req.signatures),
        };
        if let Some(ratio) = tx.fee_delegation.as_ref().and_then(|fd| fd.fee_ratio) {
            if !(MIN_FEE_RATIO..=MAX_FEE_RATIO).contains(&ratio) {
                return Err(CodecError::invalid(
                    "feeRatio",
                    format!("{ratio} outside {MIN_FEE_RATIO}..={MAX_FEE_RATIO}"),
                ));
            }
        }
        Ok(tx)
    }

    /// JSON request form. Unsigned signature slots appear as the wire
    /// placeholder `["0x01", "0x", "0x"]` for typed transactions.
    pub fn to_request(&self) -> TransactionRequest {
        let tx_type = self.tx_type();
        let wire_view = |sigs: &[SignatureData]| {
            if sigs.is_empty() && !tx_type.is_legacy() {
                vec![SignatureData::EMPTY]
            } else {
                sigs.to_vec()
            }
        };

        let mut req = TransactionRequest {
            tx_type: tx_type.name(),
            from: self.from,
            nonce: self.nonce.map(quantity_hex),
            gas_price: self.gas_price.as_ref().map(u256_quantity_hex),
            gas: Some(quantity_hex(self.gas)),
            chain_id: self.chain_id.map(quantity_hex),
            signatures: wire_view(&self.signatures),
            ..Default::default()
        };

        match &self.payload {
            TxPayload::Legacy { to, value, input } => {
                req.to = *to;
                req.value = Some(u256_quantity_hex(value));
                req.input = Some(to_hex(input));
            }
            TxPayload::ValueTransfer { to, value } => {
                req.to = Some(*to);
                req.value = Some(u256_quantity_hex(value));
            }
            TxPayload::ValueTransferMemo { to, value, input }
            | TxPayload::SmartContractExecution { to, value, input } => {
                req.to = Some(*to);
                req.value = Some(u256_quantity_hex(value));
                req.input = Some(to_hex(input));
            }
            TxPayload::AccountUpdate { account_key } => {
                req.key = Some(to_hex(&account_key.encode()));
            }
            TxPayload::SmartContractDeploy {
                value,
                input,
                human_readable,
                code_format,
            } => {
                req.value = Some(u256_quantity_hex(value));
                req.input = Some(to_hex(input));
                req.human_readable = Some(*human_readable);
                req.code_format = Some(quantity_hex(*code_format as u64));
            }
            TxPayload::Cancel => {}
            TxPayload::ChainDataAnchoring { input } => {
                req.input = Some(to_hex(input));
            }
        }

        if let Some(fd) = &self.fee_delegation {
            req.fee_ratio = fd.fee_ratio.map(|r| quantity_hex(r as u64));
            req.fee_payer = fd.fee_payer;
            req.fee_payer_signatures = wire_view(&fd.fee_payer_signatures);
        }
        req
    }
}
