//! Wallet error types.

use klay_core::address::Address;
use klay_core::error::{AddressError, CodecError, CryptoError};
use thiserror::Error;

use crate::keyring::Role;
use crate::signer::ChainDataError;

/// Errors that can occur in keyring, keystore, signing and combination operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Neither the requested role nor the transaction role holds a key.
    #[error("no key for role {role}")]
    NoKeyForRole {
        /// Requested role.
        role: Role,
    },

    /// Key index beyond the role's key sequence.
    #[error("key index {index} out of range for role {role} ({len} keys)")]
    IndexOutOfRange {
        /// Requested role.
        role: Role,
        /// Requested index.
        index: usize,
        /// Number of keys the role resolved to.
        len: usize,
    },

    /// Private key bytes or hex are not a valid secp256k1 scalar.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Combined `key 0x00 address` secret is malformed.
    #[error("invalid wallet key: {0}")]
    InvalidWalletKey(String),

    /// Operation requires a keyring with exactly one transaction key and no other roles.
    #[error("keyring does not hold a single key")]
    NotSingleKey,

    /// MAC mismatch: wrong password or tampered keystore.
    #[error("keystore authentication failed")]
    AuthenticationFailed,

    /// Keystore JSON is structurally invalid.
    #[error("invalid keystore format: {0}")]
    InvalidKeystoreFormat(String),

    /// KDF name not recognised.
    #[error("unsupported kdf: {0}")]
    UnsupportedKdf(String),

    /// Cipher name not recognised.
    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    /// Key derivation or cipher failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// Raw transactions disagree on a field other than signatures.
    #[error("incompatible transactions: {field} differs")]
    IncompatibleTransactions {
        /// First field found to differ.
        field: &'static str,
    },

    /// Nothing to combine.
    #[error("no transactions to combine")]
    NothingToCombine,

    /// Transaction sender differs from the keyring address.
    #[error("sender mismatch: transaction from {tx}, keyring {keyring}")]
    SenderMismatch {
        /// Sender named by the transaction.
        tx: Address,
        /// Address of the signing keyring.
        keyring: Address,
    },

    /// Fee payer differs from the keyring address.
    #[error("fee payer mismatch: transaction names {tx}, keyring {keyring}")]
    FeePayerMismatch {
        /// Fee payer named by the transaction.
        tx: Address,
        /// Address of the signing keyring.
        keyring: Address,
    },

    /// Legacy transactions can only be signed by a key that owns its address.
    #[error("legacy transactions cannot be signed with a decoupled key")]
    LegacyRequiresCoupledKey,

    /// Chain-data collaborator failure.
    #[error(transparent)]
    ChainData(#[from] ChainDataError),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Transaction codec error from klay-core.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Cryptographic error from klay-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Address error from klay-core.
    #[error(transparent)]
    Address(#[from] AddressError),
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_no_key_for_role() {
        let e = WalletError::NoKeyForRole {
            role: Role::FeePayer,
        };
        assert_eq!(e.to_string(), "no key for role feePayer");
    }

    #[test]
    fn display_index_out_of_range() {
        let e = WalletError::IndexOutOfRange {
            role: Role::Transaction,
            index: 3,
            len: 2,
        };
        assert_eq!(
            e.to_string(),
            "key index 3 out of range for role transaction (2 keys)"
        );
    }

    #[test]
    fn display_incompatible() {
        let e = WalletError::IncompatibleTransactions { field: "nonce" };
        assert_eq!(e.to_string(), "incompatible transactions: nonce differs");
    }

    #[test]
    fn from_codec_error() {
        let e: WalletError = CodecError::MissingField("gas").into();
        assert_eq!(e, WalletError::Codec(CodecError::MissingField("gas")));
    }

    #[test]
    fn from_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(WalletError::from(err), WalletError::Serialization(_)));
    }
}
