//! # klay-core
//! Wire types, RLP codec and secp256k1 primitives for Klaytn transactions.

pub mod account_key;
pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod rlp;
pub mod transaction;
pub mod types;

pub use account_key::{AccountKey, WeightedMultiSigOptions, WeightedPublicKey};
pub use address::Address;
pub use crypto::{KeyPair, PublicKey};
pub use error::{AddressError, CodecError, CryptoError, KlayError};
pub use transaction::{
    FeeDelegation, FeeMode, SigningState, Transaction, TransactionRequest, TxFamily, TxPayload,
    TxType,
};
pub use types::{RecoveryValue, SignatureData, U256};
