//! secp256k1 cryptographic operations.
//!
//! Provides key generation, prehash signing with recoverable signatures,
//! public key recovery and address derivation. Uses `k256` for the curve
//! arithmetic and `sha3` for Keccak-256.
//!
//! # Signing scheme
//!
//! Every transaction signature is an ECDSA signature over a 32-byte
//! Keccak-256 hash, made with RFC 6979 deterministic nonces and normalised
//! to low-S. The recovery id is then bound to a chain id through
//! [`RecoveryValue`].

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use std::fmt;

use crate::address::Address;
use crate::constants::MESSAGE_PREFIX;
use crate::error::CryptoError;
use crate::types::{RecoveryValue, SignatureData, U256};

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Hash of a personal message: `keccak256(prefix ++ len ++ message)`.
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(MESSAGE_PREFIX.len() + 20 + message.len());
    data.extend_from_slice(MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(message.len().to_string().as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// secp256k1 keypair.
///
/// Wraps [`k256::ecdsa::SigningKey`], which zeroizes the secret scalar on
/// drop.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Create a keypair from a 32-byte big-endian secret scalar.
    ///
    /// Rejects zero and values not below the curve order.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidPrivateKey);
        }
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Get the raw 32-byte secret. Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// The public key of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: *self.signing_key.verifying_key(),
        }
    }

    /// The address derived from the public key.
    pub fn address(&self) -> Address {
        self.public_key().address()
    }

    /// Sign a 32-byte hash, returning `(r, s, recovery_id)`.
    ///
    /// S is normalised to the lower half of the curve order; the recovery id
    /// is flipped when normalisation changes S.
    pub fn sign_prehash(&self, hash: &[u8; 32]) -> Result<(U256, U256, u8), CryptoError> {
        let (signature, recovery_id): (Signature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|_| CryptoError::InvalidSignature)?;

        let normalized = signature.normalize_s();
        let recovery_id = if normalized.is_some() {
            recovery_id.to_byte() ^ 1
        } else {
            recovery_id.to_byte()
        };
        let signature = normalized.unwrap_or(signature);

        let bytes = signature.to_bytes();
        let r = U256::from_be_slice(&bytes[..32]);
        let s = U256::from_be_slice(&bytes[32..]);
        Ok((r, s, recovery_id & 1))
    }

    /// Sign a hash and bind the recovery id to `chain_id`.
    pub fn sign_for_chain(&self, hash: &[u8; 32], chain_id: u64) -> Result<SignatureData, CryptoError> {
        let (r, s, recovery_id) = self.sign_prehash(hash)?;
        let v = RecoveryValue::bound(recovery_id, chain_id);
        v.to_v()?;
        Ok(SignatureData::new(v, r, s))
    }

    /// Sign a personal message (not bound to any chain).
    pub fn sign_message(&self, message: &[u8]) -> Result<SignatureData, CryptoError> {
        let (r, s, recovery_id) = self.sign_prehash(&hash_message(message))?;
        Ok(SignatureData::new(RecoveryValue::Unbound { recovery_id }, r, s))
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl PublicKey {
    /// Parse a SEC1 encoded public key (33-byte compressed or 65-byte uncompressed).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key })
    }

    /// 33-byte compressed SEC1 encoding.
    pub fn compressed(&self) -> [u8; 33] {
        let point = self.verifying_key.to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// 64-byte uncompressed coordinates without the SEC1 `0x04` prefix.
    pub fn uncompressed(&self) -> [u8; 64] {
        let point = self.verifying_key.to_encoded_point(false);
        let mut out = [0u8; 64];
        out.copy_from_slice(&point.as_bytes()[1..]);
        out
    }

    /// Address owning this public key.
    pub fn address(&self) -> Address {
        Address::from_raw_public_key(&self.uncompressed())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.compressed()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.compressed()))
    }
}

/// Recover the public key that produced `signature` over `hash`.
pub fn recover_public_key(hash: &[u8; 32], signature: &SignatureData) -> Result<PublicKey, CryptoError> {
    let recovery_id = signature.v.recovery_id().ok_or(CryptoError::InvalidSignature)?;
    let recovery_id = RecoveryId::from_byte(recovery_id).ok_or(CryptoError::InvalidSignature)?;
    let sig = Signature::from_slice(&signature.rs_bytes()).map_err(|_| CryptoError::InvalidSignature)?;
    let verifying_key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(PublicKey { verifying_key })
}

/// Recover the address that produced `signature` over `hash`.
pub fn recover_address(hash: &[u8; 32], signature: &SignatureData) -> Result<Address, CryptoError> {
    recover_public_key(hash, signature).map(|pk| pk.address())
}

/// Recover the signer of a personal message.
pub fn recover_message_signer(message: &[u8], signature: &SignatureData) -> Result<Address, CryptoError> {
    recover_address(&hash_message(message), signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "f8cc7c3813ad23817466b1802ee805ee417001fcce9376ab8728c92dd8ea0a6b";

    fn sample_key() -> KeyPair {
        KeyPair::from_secret_bytes(&hex::decode(KEY).unwrap()).unwrap()
    }

    #[test]
    fn keccak_of_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn address_from_known_key() {
        assert_eq!(
            sample_key().address().to_checksum(),
            "0x90B3E9A3770481345A7F17f22f16D020Bccfd33e"
        );
    }

    #[test]
    fn compressed_public_key_known_value() {
        assert_eq!(
            hex::encode(sample_key().public_key().compressed()),
            "02dbac81e8486d68eac4e6ef9db617f7fbd79a04a3b323c982a09cdfc61f0ae0e8"
        );
    }

    #[test]
    fn public_key_sec1_roundtrip() {
        let pk = sample_key().public_key();
        let parsed = PublicKey::from_sec1_bytes(&pk.compressed()).unwrap();
        assert_eq!(pk, parsed);
    }

    #[test]
    fn zero_key_rejected() {
        assert_eq!(
            KeyPair::from_secret_bytes(&[0u8; 32]).unwrap_err(),
            CryptoError::InvalidPrivateKey
        );
    }

    #[test]
    fn short_key_rejected() {
        assert_eq!(
            KeyPair::from_secret_bytes(&[1u8; 31]).unwrap_err(),
            CryptoError::InvalidPrivateKey
        );
    }

    #[test]
    fn sign_is_deterministic() {
        let kp = sample_key();
        let hash = keccak256(b"payload");
        assert_eq!(kp.sign_prehash(&hash).unwrap(), kp.sign_prehash(&hash).unwrap());
    }

    #[test]
    fn sign_and_recover_for_chain() {
        let kp = sample_key();
        let hash = keccak256(b"payload");
        let sig = kp.sign_for_chain(&hash, 1001).unwrap();
        assert_eq!(sig.v.chain_id(), Some(1001));
        assert_eq!(recover_address(&hash, &sig).unwrap(), kp.address());
    }

    #[test]
    fn signatures_are_low_s() {
        let kp = KeyPair::generate();
        let half_order = U256::from_str_radix(
            "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0",
            16,
        )
        .unwrap();
        for i in 0..16u8 {
            let (_, s, _) = kp.sign_prehash(&keccak256(&[i])).unwrap();
            assert!(s <= half_order);
        }
    }

    #[test]
    fn recover_placeholder_fails() {
        let hash = keccak256(b"x");
        assert_eq!(
            recover_address(&hash, &SignatureData::EMPTY).unwrap_err(),
            CryptoError::InvalidSignature
        );
    }

    #[test]
    fn message_signature_recovers() {
        let kp = sample_key();
        let sig = kp.sign_message(b"hello klaytn").unwrap();
        assert!(matches!(sig.v, RecoveryValue::Unbound { .. }));
        assert_eq!(recover_message_signer(b"hello klaytn", &sig).unwrap(), kp.address());
    }

    #[test]
    fn debug_hides_secret() {
        let debug = format!("{:?}", sample_key());
        assert!(!debug.contains(KEY));
        assert!(debug.contains("KeyPair"));
    }
}
