//! Transaction signing.
//!
//! [`TransactionSigner`] fills in missing `nonce`, `gas_price` and `chain_id`
//! from a [`ChainData`] source, hashes the transaction for the requested
//! role and appends the keyring's signatures. Fields the caller already set
//! are never fetched; the lookups that are needed run concurrently.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use klay_core::address::Address;
use klay_core::error::CodecError;
use klay_core::transaction::{Transaction, TxFamily};
use klay_core::types::{SignatureData, U256};

use crate::error::WalletError;
use crate::keyring::{Keyring, Role};

/// Failure reported by a chain-data source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainDataError {
    #[error("chain data unavailable: {0}")]
    Unavailable(String),
    #[error("invalid chain data response: {0}")]
    InvalidResponse(String),
}

/// Source of account and network state needed before signing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainData: Send + Sync {
    /// Next nonce for `address`, including pending transactions.
    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainDataError>;

    async fn get_gas_price(&self) -> Result<U256, ChainDataError>;

    async fn get_chain_id(&self) -> Result<u64, ChainDataError>;
}

/// Signs transactions with a keyring, resolving missing fields first.
pub struct TransactionSigner<C> {
    chain: C,
}

impl<C: ChainData> TransactionSigner<C> {
    pub fn new(chain: C) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Resolve `nonce`, `gas_price` and `chain_id` where unset.
    pub async fn fill(&self, tx: &mut Transaction) -> Result<(), WalletError> {
        let (nonce, gas_price, chain_id) = tokio::try_join!(
            self.resolve_nonce(tx.nonce, tx.from),
            self.resolve_gas_price(tx.gas_price),
            self.resolve_chain_id(tx.chain_id),
        )?;
        tx.nonce = Some(nonce);
        tx.gas_price = Some(gas_price);
        tx.chain_id = Some(chain_id);
        Ok(())
    }

    async fn resolve_nonce(&self, nonce: Option<u64>, from: Option<Address>) -> Result<u64, WalletError> {
        match (nonce, from) {
            (Some(nonce), _) => Ok(nonce),
            (None, Some(address)) => {
                let nonce = self.chain.get_transaction_count(address).await?;
                debug!(%address, nonce, "fetched nonce");
                Ok(nonce)
            }
            (None, None) => Err(CodecError::MissingField("from").into()),
        }
    }

    async fn resolve_gas_price(&self, gas_price: Option<U256>) -> Result<U256, WalletError> {
        match gas_price {
            Some(gas_price) => Ok(gas_price),
            None => {
                let gas_price = self.chain.get_gas_price().await?;
                debug!(%gas_price, "fetched gas price");
                Ok(gas_price)
            }
        }
    }

    async fn resolve_chain_id(&self, chain_id: Option<u64>) -> Result<u64, WalletError> {
        match chain_id {
            Some(chain_id) => Ok(chain_id),
            None => {
                let chain_id = self.chain.get_chain_id().await?;
                debug!(chain_id, "fetched chain id");
                Ok(chain_id)
            }
        }
    }

    /// Sign as sender with every key of the role and return the raw transaction.
    ///
    /// Account updates sign with the account-update role, everything else with
    /// the transaction role. An unset `from` becomes the keyring address.
    pub async fn sign(&self, keyring: &Keyring, tx: &mut Transaction) -> Result<String, WalletError> {
        self.sign_sender(keyring, tx, None).await
    }

    /// Sign as sender with the key at `index` of the role.
    pub async fn sign_with_index(
        &self,
        keyring: &Keyring,
        tx: &mut Transaction,
        index: usize,
    ) -> Result<String, WalletError> {
        self.sign_sender(keyring, tx, Some(index)).await
    }

    /// Sign as fee payer with every fee-payer key and return the raw transaction.
    /// An unset fee payer becomes the keyring address.
    pub async fn sign_as_fee_payer(&self, keyring: &Keyring, tx: &mut Transaction) -> Result<String, WalletError> {
        self.sign_fee_payer(keyring, tx, None).await
    }

    /// Sign as fee payer with the fee-payer key at `index`.
    pub async fn sign_as_fee_payer_with_index(
        &self,
        keyring: &Keyring,
        tx: &mut Transaction,
        index: usize,
    ) -> Result<String, WalletError> {
        self.sign_fee_payer(keyring, tx, Some(index)).await
    }

    async fn sign_sender(
        &self,
        keyring: &Keyring,
        tx: &mut Transaction,
        index: Option<usize>,
    ) -> Result<String, WalletError> {
        let legacy = tx.tx_type().is_legacy();
        if legacy && keyring.is_decoupled() {
            return Err(WalletError::LegacyRequiresCoupledKey);
        }
        if let Some(from) = tx.from.filter(|&from| from != keyring.address()) {
            return Err(WalletError::SenderMismatch {
                tx: from,
                keyring: keyring.address(),
            });
        }
        let role = match tx.payload.family() {
            TxFamily::AccountUpdate => Role::AccountUpdate,
            _ => Role::Transaction,
        };

        // `tx` is only replaced once every step has succeeded.
        let mut draft = tx.clone();
        draft.from = Some(keyring.address());
        self.fill(&mut draft).await?;
        let hash = draft.sender_signing_hash()?;
        let chain_id = draft.chain_id.ok_or(CodecError::MissingField("chainId"))?;
        let signatures = sign_hash(keyring, &hash, chain_id, role, index)?;
        debug!(
            tx_type = %draft.tx_type(),
            address = %keyring.address(),
            %role,
            signatures = signatures.len(),
            "signed as sender"
        );

        if legacy {
            // Legacy encodes exactly one signature.
            draft.signatures = signatures.into_iter().take(1).collect();
        } else {
            draft.signatures.extend(signatures);
        }
        let raw = draft.raw_transaction()?;
        *tx = draft;
        Ok(raw)
    }

    async fn sign_fee_payer(
        &self,
        keyring: &Keyring,
        tx: &mut Transaction,
        index: Option<usize>,
    ) -> Result<String, WalletError> {
        if !tx.is_fee_delegated() {
            return Err(CodecError::NotFeeDelegated(tx.tx_type().name()).into());
        }
        if let Some(payer) = tx.fee_payer().filter(|&payer| payer != keyring.address()) {
            return Err(WalletError::FeePayerMismatch {
                tx: payer,
                keyring: keyring.address(),
            });
        }

        let mut draft = tx.clone();
        if let Some(delegation) = draft.fee_delegation.as_mut() {
            delegation.fee_payer = Some(keyring.address());
        }
        self.fill(&mut draft).await?;
        let hash = draft.fee_payer_signing_hash()?;
        let chain_id = draft.chain_id.ok_or(CodecError::MissingField("chainId"))?;
        let signatures = sign_hash(keyring, &hash, chain_id, Role::FeePayer, index)?;
        debug!(
            tx_type = %draft.tx_type(),
            fee_payer = %keyring.address(),
            signatures = signatures.len(),
            "signed as fee payer"
        );

        if let Some(delegation) = draft.fee_delegation.as_mut() {
            delegation.fee_payer_signatures.extend(signatures);
        }
        let raw = draft.raw_transaction()?;
        *tx = draft;
        Ok(raw)
    }
}

fn sign_hash(
    keyring: &Keyring,
    hash: &[u8; 32],
    chain_id: u64,
    role: Role,
    index: Option<usize>,
) -> Result<Vec<SignatureData>, WalletError> {
    match index {
        Some(index) => Ok(vec![keyring.sign_with_key(hash, chain_id, role, index)?]),
        None => keyring.sign_with_keys(hash, chain_id, role),
    }
}
