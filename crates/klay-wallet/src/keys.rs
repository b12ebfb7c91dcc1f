//! Private key material.
//!
//! A [`PrivateKey`] is a secp256k1 secret plus the address it signs for. The
//! address is normally derived from the key, but an account whose key was
//! replaced on chain keeps its old address: such a key is *decoupled* and
//! carries the address explicitly. No check forces the two to match.
//!
//! The combined wallet-key form packs one key and one address into a single
//! string: `0x<64 hex key>0x00<0x + 40 hex address>`.

use std::fmt;
use zeroize::Zeroizing;

use klay_core::address::Address;
use klay_core::constants::WALLET_KEY_SEPARATOR;
use klay_core::crypto::{KeyPair, PublicKey};
use klay_core::types::{strip_0x, SignatureData};

use crate::encryption::{self, CryptoParams, KeystoreOptions};
use crate::error::WalletError;

/// A private key bound to an address.
#[derive(Clone)]
pub struct PrivateKey {
    keypair: KeyPair,
    address: Address,
}

impl PrivateKey {
    /// Generate a random key using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self::from_keypair(KeyPair::generate())
    }

    fn from_keypair(keypair: KeyPair) -> Self {
        let address = keypair.address();
        Self { keypair, address }
    }

    /// Create from 32 raw secret bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        KeyPair::from_secret_bytes(bytes)
            .map(Self::from_keypair)
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))
    }

    /// Parse a hex secret, with or without `0x`. A combined wallet key is
    /// accepted too and yields a possibly decoupled key.
    pub fn from_hex(s: &str) -> Result<Self, WalletError> {
        if is_wallet_key(s) {
            return Self::from_wallet_key(s);
        }
        let body = strip_0x(s.trim());
        if body.len() != 64 {
            return Err(WalletError::InvalidPrivateKey(format!(
                "expected 64 hex characters, got {}",
                body.len()
            )));
        }
        let bytes = Zeroizing::new(
            hex::decode(body).map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Parse a combined `key 0x00 address` wallet key.
    pub fn from_wallet_key(s: &str) -> Result<Self, WalletError> {
        let (key, address) = split_wallet_key(s)?;
        let key = Self::from_hex(key).map_err(|e| WalletError::InvalidWalletKey(e.to_string()))?;
        let address = Address::parse(address).map_err(|e| WalletError::InvalidWalletKey(e.to_string()))?;
        Ok(key.with_address(address))
    }

    /// Bind this key to an explicit address.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// The address this key signs for.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The address derived from the key itself.
    pub fn derived_address(&self) -> Address {
        self.keypair.address()
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Whether the bound address differs from the derived one.
    pub fn is_decoupled(&self) -> bool {
        self.address != self.keypair.address()
    }

    /// Raw secret bytes, wiped on drop.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.keypair.secret_bytes())
    }

    /// `0x` hex of the secret, wiped on drop.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(*self.secret_bytes())))
    }

    /// Combined wallet-key string for this key and its address.
    pub fn to_wallet_key(&self) -> Zeroizing<String> {
        Zeroizing::new(format!(
            "{}{WALLET_KEY_SEPARATOR}{}",
            self.to_hex().as_str(),
            self.address.to_hex()
        ))
    }

    /// Sign a 32-byte hash for `chain_id`.
    pub fn sign(&self, hash: &[u8; 32], chain_id: u64) -> Result<SignatureData, WalletError> {
        Ok(self.keypair.sign_for_chain(hash, chain_id)?)
    }

    /// Sign a personal message.
    pub fn sign_message(&self, message: &[u8]) -> Result<SignatureData, WalletError> {
        Ok(self.keypair.sign_message(message)?)
    }

    /// Encrypt this key for a keystore record.
    pub fn encrypt(&self, password: &[u8], options: &KeystoreOptions) -> Result<CryptoParams, WalletError> {
        encryption::encrypt(self.secret_bytes().as_slice(), password, options)
    }

    /// Decrypt a keystore crypto section into a key bound to `address`.
    pub fn decrypt(crypto: &CryptoParams, password: &[u8], address: Address) -> Result<Self, WalletError> {
        let secret = encryption::decrypt(crypto, password)?;
        Ok(Self::from_bytes(&secret)?.with_address(address))
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && *self.secret_bytes() == *other.secret_bytes()
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("address", &self.address)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Whether `s` looks like a combined wallet key.
pub fn is_wallet_key(s: &str) -> bool {
    split_wallet_key(s).is_ok()
}

fn split_wallet_key(s: &str) -> Result<(&str, &str), WalletError> {
    let s = s.trim();
    let body = strip_0x(s);
    let is_hex = |part: &str| part.chars().all(|c| c.is_ascii_hexdigit());
    if body.len() < 64 + WALLET_KEY_SEPARATOR.len() || !body.is_char_boundary(64) {
        return Err(WalletError::InvalidWalletKey("too short".into()));
    }
    let (key, rest) = body.split_at(64);
    let address = rest
        .strip_prefix(WALLET_KEY_SEPARATOR)
        .ok_or_else(|| WalletError::InvalidWalletKey("missing 0x00 separator".into()))?;
    if !is_hex(key) || strip_0x(address).len() != 40 || !is_hex(strip_0x(address)) {
        return Err(WalletError::InvalidWalletKey("expected <key>0x00<address>".into()));
    }
    Ok((key, address))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0xf8cc7c3813ad23817466b1802ee805ee417001fcce9376ab8728c92dd8ea0a6b";
    const ADDRESS: &str = "0x90b3e9a3770481345a7f17f22f16d020bccfd33e";

    #[test]
    fn from_hex_derives_address() {
        let key = PrivateKey::from_hex(KEY).unwrap();
        assert_eq!(key.address().to_hex(), ADDRESS);
        assert!(!key.is_decoupled());
        assert_eq!(key.to_hex().as_str(), KEY);
    }

    #[test]
    fn from_hex_without_prefix() {
        let key = PrivateKey::from_hex(&KEY[2..]).unwrap();
        assert_eq!(key.address().to_hex(), ADDRESS);
    }

    #[test]
    fn invalid_keys_rejected() {
        assert!(matches!(
            PrivateKey::from_hex("0x1234").unwrap_err(),
            WalletError::InvalidPrivateKey(_)
        ));
        assert!(matches!(
            PrivateKey::from_hex(&format!("0x{}", "0".repeat(64))).unwrap_err(),
            WalletError::InvalidPrivateKey(_)
        ));
        assert!(matches!(
            PrivateKey::from_hex(&format!("0x{}", "zz".repeat(32))).unwrap_err(),
            WalletError::InvalidPrivateKey(_)
        ));
    }

    #[test]
    fn wallet_key_roundtrip_coupled() {
        let key = PrivateKey::from_hex(KEY).unwrap();
        let wallet_key = key.to_wallet_key();
        assert_eq!(wallet_key.as_str(), format!("{KEY}0x00{ADDRESS}"));
        assert_eq!(PrivateKey::from_wallet_key(&wallet_key).unwrap(), key);
    }

    #[test]
    fn wallet_key_roundtrip_decoupled() {
        let other = Address::from_bytes([0x11; 20]);
        let key = PrivateKey::from_hex(KEY).unwrap().with_address(other);
        assert!(key.is_decoupled());
        let parsed = PrivateKey::from_hex(&key.to_wallet_key()).unwrap();
        assert_eq!(parsed.address(), other);
        assert_eq!(parsed.derived_address().to_hex(), ADDRESS);
    }

    #[test]
    fn malformed_wallet_keys() {
        assert!(!is_wallet_key(KEY));
        assert!(!is_wallet_key(&format!("{KEY}0x01{ADDRESS}")));
        assert!(!is_wallet_key(&format!("{KEY}0x00{}", &ADDRESS[..40])));
        assert!(is_wallet_key(&format!("{KEY}0x00{ADDRESS}")));
    }

    #[test]
    fn debug_redacts_secret() {
        let key = PrivateKey::from_hex(KEY).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&KEY[2..]));
    }
}
