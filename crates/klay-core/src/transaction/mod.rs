//! The transaction model.
//!
//! A [`Transaction`] is the family payload ([`TxPayload`]), the fields every
//! type shares, optional fee-delegation data and the attached signatures.
//! The concrete [`TxType`] is derived from the payload and the fee-delegation
//! data, so an invalid combination of fields for a type cannot be expressed
//! except for the legacy-plus-fee-payer case, which the codec rejects.
//!
//! `nonce`, `gas_price` and `chain_id` may be left unset while drafting; the
//! signer fills them before hashing.

pub mod codec;
pub mod request;
pub mod tx_type;

pub use request::TransactionRequest;
pub use tx_type::{FeeMode, TxFamily, TxType};

use crate::account_key::AccountKey;
use crate::address::Address;
use crate::constants::CODE_FORMAT_EVM;
use crate::crypto::recover_address;
use crate::error::KlayError;
use crate::types::{SignatureData, U256};

/// Family-specific fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPayload {
    /// Pre-typed transaction. `to = None` deploys a contract.
    Legacy {
        to: Option<Address>,
        value: U256,
        input: Vec<u8>,
    },
    ValueTransfer {
        to: Address,
        value: U256,
    },
    ValueTransferMemo {
        to: Address,
        value: U256,
        input: Vec<u8>,
    },
    AccountUpdate {
        account_key: AccountKey,
    },
    SmartContractDeploy {
        value: U256,
        input: Vec<u8>,
        human_readable: bool,
        code_format: u8,
    },
    SmartContractExecution {
        to: Address,
        value: U256,
        input: Vec<u8>,
    },
    Cancel,
    ChainDataAnchoring {
        input: Vec<u8>,
    },
}

impl TxPayload {
    pub fn family(&self) -> TxFamily {
        match self {
            TxPayload::Legacy { .. } => TxFamily::Legacy,
            TxPayload::ValueTransfer { .. } => TxFamily::ValueTransfer,
            TxPayload::ValueTransferMemo { .. } => TxFamily::ValueTransferMemo,
            TxPayload::AccountUpdate { .. } => TxFamily::AccountUpdate,
            TxPayload::SmartContractDeploy { .. } => TxFamily::SmartContractDeploy,
            TxPayload::SmartContractExecution { .. } => TxFamily::SmartContractExecution,
            TxPayload::Cancel => TxFamily::Cancel,
            TxPayload::ChainDataAnchoring { .. } => TxFamily::ChainDataAnchoring,
        }
    }

    /// Contract deployment with EVM bytecode.
    pub fn deploy(value: U256, input: Vec<u8>) -> Self {
        TxPayload::SmartContractDeploy {
            value,
            input,
            human_readable: false,
            code_format: CODE_FORMAT_EVM,
        }
    }
}

/// Fee payer data carried by fee-delegated types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeDelegation {
    /// Percentage (1..=99) of the fee paid by the fee payer. `Some` selects
    /// the with-ratio variant.
    pub fee_ratio: Option<u8>,
    /// Unset until the fee payer signs or is named.
    pub fee_payer: Option<Address>,
    pub fee_payer_signatures: Vec<SignatureData>,
}

/// Progress of a transaction through signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    /// Nonce, gas price, chain id or sender still missing.
    Draft,
    /// Every field needed for hashing is present.
    Filled,
    /// At least one sender signature is attached.
    SenderSigned,
    /// Sender and fee payer signatures are attached (fee-delegated only).
    FullySigned,
}

/// A transaction of any supported type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub payload: TxPayload,
    /// Sender. Optional only for legacy transactions, where it is implied by
    /// the signature.
    pub from: Option<Address>,
    pub nonce: Option<u64>,
    pub gas_price: Option<U256>,
    pub gas: u64,
    pub chain_id: Option<u64>,
    /// `None` for sender-paid types.
    pub fee_delegation: Option<FeeDelegation>,
    pub signatures: Vec<SignatureData>,
}

impl Transaction {
    /// A sender-paid draft.
    pub fn new(payload: TxPayload, gas: u64) -> Self {
        Self {
            payload,
            from: None,
            nonce: None,
            gas_price: None,
            gas,
            chain_id: None,
            fee_delegation: None,
            signatures: Vec::new(),
        }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Switch to the fee-delegated variant.
    pub fn fee_delegated(mut self) -> Self {
        self.fee_delegation.get_or_insert_with(FeeDelegation::default).fee_ratio = None;
        self
    }

    /// Switch to the fee-delegated-with-ratio variant.
    pub fn fee_delegated_with_ratio(mut self, fee_ratio: u8) -> Self {
        self.fee_delegation.get_or_insert_with(FeeDelegation::default).fee_ratio = Some(fee_ratio);
        self
    }

    pub fn with_fee_payer(mut self, fee_payer: Address) -> Self {
        self.fee_delegation.get_or_insert_with(FeeDelegation::default).fee_payer = Some(fee_payer);
        self
    }

    /// The concrete type implied by payload and fee-delegation data.
    pub fn tx_type(&self) -> TxType {
        let fee_mode = match &self.fee_delegation {
            None => FeeMode::Sender,
            Some(FeeDelegation { fee_ratio: None, .. }) => FeeMode::Delegated,
            Some(FeeDelegation { fee_ratio: Some(_), .. }) => FeeMode::DelegatedWithRatio,
        };
        TxType::new(self.payload.family(), fee_mode)
    }

    pub fn is_fee_delegated(&self) -> bool {
        self.fee_delegation.is_some()
    }

    pub fn fee_payer(&self) -> Option<Address> {
        self.fee_delegation.as_ref().and_then(|fd| fd.fee_payer)
    }

    /// Fee payer signatures; empty for sender-paid types.
    pub fn fee_payer_signatures(&self) -> &[SignatureData] {
        self.fee_delegation
            .as_ref()
            .map(|fd| fd.fee_payer_signatures.as_slice())
            .unwrap_or(&[])
    }

    /// Whether every field the signing hash depends on is set.
    pub fn is_filled(&self) -> bool {
        self.nonce.is_some()
            && self.gas_price.is_some()
            && self.chain_id.is_some()
            && (self.from.is_some() || self.tx_type().is_legacy())
    }

    pub fn signing_state(&self) -> SigningState {
        let sender_signed = self.signatures.iter().any(|s| !s.is_empty());
        let payer_signed = self.fee_payer_signatures().iter().any(|s| !s.is_empty());
        match (sender_signed, self.is_fee_delegated() && payer_signed) {
            (true, true) => SigningState::FullySigned,
            (true, false) => SigningState::SenderSigned,
            (false, _) if self.is_filled() => SigningState::Filled,
            (false, _) => SigningState::Draft,
        }
    }

    /// Whether nothing more needs to sign before broadcasting.
    pub fn is_complete(&self) -> bool {
        match self.signing_state() {
            SigningState::FullySigned => true,
            SigningState::SenderSigned => !self.is_fee_delegated(),
            _ => false,
        }
    }

    /// Addresses recovered from every sender signature.
    pub fn recover_senders(&self) -> Result<Vec<Address>, KlayError> {
        let hash = self.sender_signing_hash()?;
        self.signatures
            .iter()
            .map(|sig| recover_address(&hash, sig).map_err(KlayError::from))
            .collect()
    }

    /// Addresses recovered from every fee payer signature.
    pub fn recover_fee_payers(&self) -> Result<Vec<Address>, KlayError> {
        let hash = self.fee_payer_signing_hash()?;
        self.fee_payer_signatures()
            .iter()
            .map(|sig| recover_address(&hash, sig).map_err(KlayError::from))
            .collect()
    }
}
