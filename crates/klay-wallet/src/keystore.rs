//! Keystore records (versions 3 and 4).
//!
//! Version 3 holds one encrypted key under `crypto` (older writers used
//! `Crypto`). Version 4 holds a `keyring`: either a flat array of encrypted
//! keys for the transaction role, or an array of three role arrays.
//!
//! ```json
//! {
//!   "version": 4,
//!   "id": "…",
//!   "address": "0x…",
//!   "keyring": [[{ "cipher": "aes-128-ctr", … }], [], [{ … }]]
//! }
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use klay_core::address::Address;
use klay_core::constants::ROLE_COUNT;

use crate::encryption::{self, CryptoParams, KeystoreOptions};
use crate::error::WalletError;
use crate::keyring::{Keyring, Role};
use crate::keys::PrivateKey;

/// Version of single-key records.
pub const KEYSTORE_V3: u32 = 3;
/// Version of keyring records.
pub const KEYSTORE_V4: u32 = 4;

/// Encrypted keys of a version 4 record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeystoreKeyring {
    /// Transaction-role keys only.
    Flat(Vec<CryptoParams>),
    /// One array per role, in role order.
    Roles(Vec<Vec<CryptoParams>>),
}

/// A keystore record as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystore {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, alias = "Crypto", skip_serializing_if = "Option::is_none")]
    pub crypto: Option<CryptoParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyring: Option<KeystoreKeyring>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Single,
    Keyring,
}

impl Keystore {
    /// Parse a record from JSON.
    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        serde_json::from_str(json).map_err(|e| WalletError::InvalidKeystoreFormat(e.to_string()))
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, WalletError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Encrypt a single-key keyring into a version 3 record.
    pub fn encrypt_v3(keyring: &Keyring, password: &[u8], options: &KeystoreOptions) -> Result<Self, WalletError> {
        let [key] = keyring.keys(Role::Transaction) else {
            return Err(WalletError::NotSingleKey);
        };
        if !keyring.is_single() {
            return Err(WalletError::NotSingleKey);
        }
        debug!(address = %keyring.address(), kdf = options.kdf.name(), "encrypting v3 keystore");
        Ok(Self {
            version: KEYSTORE_V3,
            id: record_id(options),
            address: Some(keyring.address().to_hex()),
            crypto: Some(key.encrypt(password, options)?),
            keyring: None,
        })
    }

    /// Encrypt any keyring into a version 4 record. Keyrings without
    /// non-transaction keys are written in the flat layout.
    pub fn encrypt_v4(keyring: &Keyring, password: &[u8], options: &KeystoreOptions) -> Result<Self, WalletError> {
        let encrypt_role = |role: Role| -> Result<Vec<CryptoParams>, WalletError> {
            keyring
                .keys(role)
                .iter()
                .map(|k| k.encrypt(password, options))
                .collect()
        };
        let encrypted = if keyring.is_role_based() {
            KeystoreKeyring::Roles(Role::ALL.iter().map(|&r| encrypt_role(r)).collect::<Result<_, _>>()?)
        } else {
            KeystoreKeyring::Flat(encrypt_role(Role::Transaction)?)
        };
        debug!(address = %keyring.address(), kdf = options.kdf.name(), "encrypting v4 keystore");
        Ok(Self {
            version: KEYSTORE_V4,
            id: record_id(options),
            address: Some(keyring.address().to_hex()),
            crypto: None,
            keyring: Some(encrypted),
        })
    }

    /// Decrypt into a keyring. An unknown version is tolerated when the
    /// record's shape identifies it.
    pub fn decrypt(&self, password: &[u8]) -> Result<Keyring, WalletError> {
        match self.layout()? {
            Layout::Single => self.decrypt_single(password),
            Layout::Keyring => self.decrypt_keyring(password),
        }
    }

    fn layout(&self) -> Result<Layout, WalletError> {
        match self.version {
            KEYSTORE_V3 => Ok(Layout::Single),
            KEYSTORE_V4 => Ok(Layout::Keyring),
            other => {
                warn!(version = other, "unknown keystore version, detecting layout");
                match (&self.keyring, &self.crypto) {
                    (Some(_), _) => Ok(Layout::Keyring),
                    (None, Some(_)) => Ok(Layout::Single),
                    (None, None) => Err(WalletError::InvalidKeystoreFormat(
                        "record has neither crypto nor keyring".into(),
                    )),
                }
            }
        }
    }

    fn address(&self) -> Result<Option<Address>, WalletError> {
        self.address
            .as_deref()
            .map(Address::parse)
            .transpose()
            .map_err(|e| WalletError::InvalidKeystoreFormat(format!("address: {e}")))
    }

    fn decrypt_single(&self, password: &[u8]) -> Result<Keyring, WalletError> {
        let crypto = self
            .crypto
            .as_ref()
            .ok_or_else(|| WalletError::InvalidKeystoreFormat("missing crypto".into()))?;
        let secret = encryption::decrypt(crypto, password)?;
        let key = PrivateKey::from_bytes(&secret)?;
        let address = self.address()?.unwrap_or_else(|| key.derived_address());
        debug!(%address, "decrypted v3 keystore");
        Ok(Keyring::single(address, key))
    }

    fn decrypt_keyring(&self, password: &[u8]) -> Result<Keyring, WalletError> {
        let encrypted = self
            .keyring
            .as_ref()
            .ok_or_else(|| WalletError::InvalidKeystoreFormat("missing keyring".into()))?;
        let address = self
            .address()?
            .ok_or_else(|| WalletError::InvalidKeystoreFormat("missing address".into()))?;
        let decrypt_all = |entries: &[CryptoParams]| -> Result<Vec<PrivateKey>, WalletError> {
            entries
                .iter()
                .map(|c| PrivateKey::decrypt(c, password, address))
                .collect()
        };

        let roles = match encrypted {
            KeystoreKeyring::Flat(entries) => vec![decrypt_all(entries)?],
            KeystoreKeyring::Roles(roles) => {
                if roles.len() > ROLE_COUNT {
                    return Err(WalletError::InvalidKeystoreFormat(format!(
                        "{} role arrays, at most {ROLE_COUNT}",
                        roles.len()
                    )));
                }
                roles.iter().map(|r| decrypt_all(r)).collect::<Result<_, _>>()?
            }
        };
        debug!(%address, "decrypted v4 keystore");
        Keyring::role_based(address, roles)
    }
}

fn record_id(options: &KeystoreOptions) -> String {
    options
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
