//! # klay-wallet — keyrings, keystores and transaction signing.
//!
//! Holds key material partitioned by role, encrypts it to and from
//! keystore records, signs transactions after resolving missing fields from
//! a chain-data source, and merges independently signed copies of a
//! transaction.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`keys`] — private keys, decoupled addresses, combined wallet keys
//! - [`keyring`] — role model, multi-key signing, account-key projection
//! - [`encryption`] — scrypt/pbkdf2 key derivation and aes-128-ctr
//! - [`keystore`] — version 3 and 4 keystore records
//! - [`signer`] — field resolution and sender / fee payer signing
//! - [`combine`] — signature combination

pub mod combine;
pub mod encryption;
pub mod error;
pub mod keyring;
pub mod keys;
pub mod keystore;
pub mod signer;

// Re-exports for convenient access
pub use combine::{combine_raw_transactions, combine_signed_raw};
pub use encryption::{Kdf, KeystoreOptions};
pub use error::WalletError;
pub use keyring::{Account, Keyring, Role};
pub use keys::PrivateKey;
pub use keystore::Keystore;
pub use signer::{ChainData, ChainDataError, TransactionSigner};
