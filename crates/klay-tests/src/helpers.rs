//! Shared fixtures for the integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use klay_core::{Address, U256};
use klay_wallet::{ChainData, ChainDataError, Kdf, KeystoreOptions, PrivateKey};

/// Sender key of the reference vectors.
pub const SENDER_KEY: &str = "0xf8cc7c3813ad23817466b1802ee805ee417001fcce9376ab8728c92dd8ea0a6b";
/// Checksummed address of [`SENDER_KEY`].
pub const SENDER_ADDRESS: &str = "0x90B3E9A3770481345A7F17f22f16D020Bccfd33e";
/// Compressed public key of [`SENDER_KEY`].
pub const SENDER_PUBLIC_KEY: &str = "0x02dbac81e8486d68eac4e6ef9db617f7fbd79a04a3b323c982a09cdfc61f0ae0e8";

/// Fee payer key of the reference vectors.
pub const FEE_PAYER_KEY: &str = "0xb9d5558443585bca6f225b935950e3f6e69f9da8a5809a83f51c3365dff53936";
/// Checksummed address of [`FEE_PAYER_KEY`].
pub const FEE_PAYER_ADDRESS: &str = "0x33f524631e573329a550296F595c820D6c65213f";

/// Recipient used by the reference vectors.
pub const TO: &str = "0x7b65b75d204abed71587c9e519a89277766ee1d0";

pub fn sender_key() -> PrivateKey {
    PrivateKey::from_hex(SENDER_KEY).expect("sender key")
}

pub fn fee_payer_key() -> PrivateKey {
    PrivateKey::from_hex(FEE_PAYER_KEY).expect("fee payer key")
}

pub fn to() -> Address {
    Address::parse(TO).expect("recipient")
}

/// Deterministic key from a seed byte.
pub fn key(seed: u8) -> PrivateKey {
    PrivateKey::from_bytes(&[seed; 32]).expect("seed key")
}

/// Keystore options with cheap KDF parameters.
pub fn fast_keystore_options() -> KeystoreOptions {
    KeystoreOptions::with_kdf(Kdf::Scrypt {
        n: 16,
        r: 8,
        p: 1,
        dklen: 32,
    })
}

/// Chain data with fixed answers that counts how often it is asked.
#[derive(Debug)]
pub struct FixedChainData {
    pub nonce: u64,
    pub gas_price: U256,
    pub chain_id: u64,
    pub available: bool,
    calls: AtomicUsize,
}

impl FixedChainData {
    pub fn new(nonce: u64, gas_price: u64, chain_id: u64) -> Self {
        Self {
            nonce,
            gas_price: U256::from(gas_price),
            chain_id,
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// A source whose every lookup fails.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(0, 0, 0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer<T>(&self, value: T) -> Result<T, ChainDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available {
            Ok(value)
        } else {
            Err(ChainDataError::Unavailable("node down".into()))
        }
    }
}

#[async_trait]
impl ChainData for FixedChainData {
    async fn get_transaction_count(&self, _address: Address) -> Result<u64, ChainDataError> {
        self.answer(self.nonce)
    }

    async fn get_gas_price(&self) -> Result<U256, ChainDataError> {
        self.answer(self.gas_price)
    }

    async fn get_chain_id(&self) -> Result<u64, ChainDataError> {
        self.answer(self.chain_id)
    }
}
