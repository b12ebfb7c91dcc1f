//! Password-based key encryption for keystore records.
//!
//! A secret is encrypted with AES-128-CTR under the first 16 bytes of a
//! password-derived key. The remaining derived bytes authenticate the
//! ciphertext:
//!
//! ```text
//! dk  = scrypt(password, salt, n, r, p, dklen) | pbkdf2-hmac-sha256(password, salt, c, dklen)
//! ct  = aes-128-ctr(key = dk[0..16], iv, secret)
//! mac = keccak256(dk[16..32] || ct)
//! ```
//!
//! The MAC is the only password check: a wrong password fails it before
//! anything is decrypted.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use klay_core::crypto::keccak256;
use klay_core::types::from_hex;

use crate::error::WalletError;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Cipher name written to and accepted from keystore records.
pub const CIPHER_AES_128_CTR: &str = "aes-128-ctr";

/// PRF name of the only supported PBKDF2 variant.
pub const PRF_HMAC_SHA256: &str = "hmac-sha256";

/// Salt length in bytes when generated.
const SALT_LEN: usize = 32;

/// AES-CTR IV length in bytes.
const IV_LEN: usize = 16;

/// Derived key bytes needed: 16 for the cipher, 16 for the MAC.
const MIN_DKLEN: usize = 32;
const MAX_DKLEN: usize = 64;

/// Upper bounds on KDF costs accepted from a record.
const MAX_SCRYPT_N: u32 = 1 << 20;
const MAX_SCRYPT_R: u32 = 32;
const MAX_SCRYPT_P: u32 = 16;
/// scrypt needs `128 * n * r` bytes of memory.
const MAX_SCRYPT_MEMORY: u64 = 1 << 30;
const MAX_PBKDF2_C: u32 = 10_000_000;

/// Default scrypt cost parameter.
pub const DEFAULT_SCRYPT_N: u32 = 4096;
/// Default scrypt block size.
pub const DEFAULT_SCRYPT_R: u32 = 8;
/// Default scrypt parallelism.
pub const DEFAULT_SCRYPT_P: u32 = 1;
/// Default PBKDF2 iteration count.
pub const DEFAULT_PBKDF2_C: u32 = 262_144;
/// Default derived key length.
pub const DEFAULT_DKLEN: usize = 32;

/// Key derivation function and its cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kdf {
    Scrypt { n: u32, r: u32, p: u32, dklen: usize },
    Pbkdf2 { c: u32, dklen: usize },
}

impl Kdf {
    /// scrypt with n=4096, r=8, p=1, dklen=32.
    pub fn scrypt() -> Self {
        Kdf::Scrypt {
            n: DEFAULT_SCRYPT_N,
            r: DEFAULT_SCRYPT_R,
            p: DEFAULT_SCRYPT_P,
            dklen: DEFAULT_DKLEN,
        }
    }

    /// pbkdf2-hmac-sha256 with c=262144, dklen=32.
    pub fn pbkdf2() -> Self {
        Kdf::Pbkdf2 {
            c: DEFAULT_PBKDF2_C,
            dklen: DEFAULT_DKLEN,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kdf::Scrypt { .. } => "scrypt",
            Kdf::Pbkdf2 { .. } => "pbkdf2",
        }
    }

    fn dklen(&self) -> usize {
        match *self {
            Kdf::Scrypt { dklen, .. } | Kdf::Pbkdf2 { dklen, .. } => dklen,
        }
    }

    /// Range check of the length and cost parameters.
    fn check(&self) -> Result<(), String> {
        let dklen = self.dklen();
        if !(MIN_DKLEN..=MAX_DKLEN).contains(&dklen) {
            return Err(format!("dklen {dklen} outside {MIN_DKLEN}..={MAX_DKLEN}"));
        }
        match *self {
            Kdf::Scrypt { n, r, p, .. } => {
                if n < 2 || !n.is_power_of_two() || n > MAX_SCRYPT_N {
                    return Err(format!(
                        "scrypt n {n} is not a power of two in 2..={MAX_SCRYPT_N}"
                    ));
                }
                if !(1..=MAX_SCRYPT_R).contains(&r) {
                    return Err(format!("scrypt r {r} outside 1..={MAX_SCRYPT_R}"));
                }
                if !(1..=MAX_SCRYPT_P).contains(&p) {
                    return Err(format!("scrypt p {p} outside 1..={MAX_SCRYPT_P}"));
                }
                if 128 * u64::from(n) * u64::from(r) > MAX_SCRYPT_MEMORY {
                    return Err(format!("scrypt n {n} with r {r} needs more than {MAX_SCRYPT_MEMORY} bytes"));
                }
            }
            Kdf::Pbkdf2 { c, .. } => {
                if !(1..=MAX_PBKDF2_C).contains(&c) {
                    return Err(format!("pbkdf2 c {c} outside 1..={MAX_PBKDF2_C}"));
                }
            }
        }
        Ok(())
    }

    fn derive(&self, password: &[u8], salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        self.check().map_err(WalletError::Encryption)?;
        let dklen = self.dklen();
        let mut out = Zeroizing::new(vec![0u8; dklen]);
        match *self {
            Kdf::Scrypt { n, r, p, .. } => {
                let params = scrypt::Params::new(n.trailing_zeros() as u8, r, p, dklen)
                    .map_err(|e| WalletError::Encryption(format!("scrypt params: {e}")))?;
                scrypt::scrypt(password, salt, &params, &mut out)
                    .map_err(|e| WalletError::Encryption(format!("scrypt: {e}")))?;
            }
            Kdf::Pbkdf2 { c, .. } => {
                pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, c, &mut out);
            }
        }
        Ok(out)
    }

    fn to_json(&self, salt: &[u8]) -> serde_json::Value {
        let salt = hex::encode(salt);
        match *self {
            Kdf::Scrypt { n, r, p, dklen } => serde_json::json!({
                "dklen": dklen,
                "n": n,
                "p": p,
                "r": r,
                "salt": salt,
            }),
            Kdf::Pbkdf2 { c, dklen } => serde_json::json!({
                "c": c,
                "dklen": dklen,
                "prf": PRF_HMAC_SHA256,
                "salt": salt,
            }),
        }
    }

    /// Parse a record's `kdf` name and `kdfparams` object into the function and its salt.
    fn from_json(name: &str, params: &serde_json::Value) -> Result<(Self, Vec<u8>), WalletError> {
        #[derive(Deserialize)]
        struct ScryptJson {
            dklen: usize,
            n: u32,
            r: u32,
            p: u32,
            salt: String,
        }

        #[derive(Deserialize)]
        struct Pbkdf2Json {
            c: u32,
            dklen: usize,
            #[serde(default)]
            prf: Option<String>,
            salt: String,
        }

        let bad = |e: serde_json::Error| WalletError::InvalidKeystoreFormat(format!("kdfparams: {e}"));
        let (kdf, salt) = match name.to_ascii_lowercase().as_str() {
            "scrypt" => {
                let p: ScryptJson = serde_json::from_value(params.clone()).map_err(bad)?;
                (
                    Kdf::Scrypt {
                        n: p.n,
                        r: p.r,
                        p: p.p,
                        dklen: p.dklen,
                    },
                    p.salt,
                )
            }
            "pbkdf2" => {
                let p: Pbkdf2Json = serde_json::from_value(params.clone()).map_err(bad)?;
                if let Some(prf) = p.prf.as_deref() {
                    if prf != PRF_HMAC_SHA256 {
                        return Err(WalletError::UnsupportedKdf(format!("pbkdf2 with {prf}")));
                    }
                }
                (
                    Kdf::Pbkdf2 {
                        c: p.c,
                        dklen: p.dklen,
                    },
                    p.salt,
                )
            }
            other => return Err(WalletError::UnsupportedKdf(other.to_string())),
        };
        kdf.check()
            .map_err(|e| WalletError::InvalidKeystoreFormat(format!("kdfparams: {e}")))?;
        Ok((kdf, hex_field("salt", &salt)?))
    }
}

impl Default for Kdf {
    fn default() -> Self {
        Kdf::scrypt()
    }
}

/// Options for producing keystore records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeystoreOptions {
    pub kdf: Kdf,
    /// Fixed salt; random when `None`.
    pub salt: Option<Vec<u8>>,
    /// Fixed IV; random when `None`.
    pub iv: Option<[u8; IV_LEN]>,
    /// Fixed record id; a random UUID when `None`.
    pub id: Option<String>,
}

impl KeystoreOptions {
    pub fn with_kdf(kdf: Kdf) -> Self {
        Self {
            kdf,
            ..Default::default()
        }
    }
}

/// `cipherparams` of a crypto section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

/// One encrypted key as stored in a keystore record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoParams {
    pub cipher: String,
    pub cipherparams: CipherParams,
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: serde_json::Value,
    pub mac: String,
}

fn hex_field(field: &str, value: &str) -> Result<Vec<u8>, WalletError> {
    from_hex(value).map_err(|e| WalletError::InvalidKeystoreFormat(format!("{field}: {e}")))
}

/// Equality that takes the same time wherever the inputs first differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn mac(derived: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(16 + ciphertext.len());
    data.extend_from_slice(&derived[16..32]);
    data.extend_from_slice(ciphertext);
    keccak256(&data)
}

fn apply_ctr(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<(), WalletError> {
    let mut cipher = Aes128Ctr::new_from_slices(key, iv)
        .map_err(|e| WalletError::Encryption(format!("aes-128-ctr: {e}")))?;
    cipher.apply_keystream(buf);
    Ok(())
}

/// Encrypt `secret` under `password`.
pub fn encrypt(secret: &[u8], password: &[u8], options: &KeystoreOptions) -> Result<CryptoParams, WalletError> {
    let salt = match &options.salt {
        Some(salt) => salt.clone(),
        None => {
            let mut salt = vec![0u8; SALT_LEN];
            rand::rngs::OsRng.fill_bytes(&mut salt);
            salt
        }
    };
    let iv = match options.iv {
        Some(iv) => iv,
        None => {
            let mut iv = [0u8; IV_LEN];
            rand::rngs::OsRng.fill_bytes(&mut iv);
            iv
        }
    };

    let derived = options.kdf.derive(password, &salt)?;
    let mut ciphertext = secret.to_vec();
    apply_ctr(&derived[..16], &iv, &mut ciphertext)?;
    let mac = mac(&derived, &ciphertext);

    Ok(CryptoParams {
        cipher: CIPHER_AES_128_CTR.to_string(),
        cipherparams: CipherParams { iv: hex::encode(iv) },
        ciphertext: hex::encode(&ciphertext),
        kdf: options.kdf.name().to_string(),
        kdfparams: options.kdf.to_json(&salt),
        mac: hex::encode(mac),
    })
}

/// Decrypt a crypto section. Fails with [`WalletError::AuthenticationFailed`]
/// when the MAC does not match.
pub fn decrypt(crypto: &CryptoParams, password: &[u8]) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    if !crypto.cipher.eq_ignore_ascii_case(CIPHER_AES_128_CTR) {
        return Err(WalletError::UnsupportedCipher(crypto.cipher.clone()));
    }
    let (kdf, salt) = Kdf::from_json(&crypto.kdf, &crypto.kdfparams)?;
    let iv = hex_field("iv", &crypto.cipherparams.iv)?;
    if iv.len() != IV_LEN {
        return Err(WalletError::InvalidKeystoreFormat(format!(
            "iv is {} bytes, expected {IV_LEN}",
            iv.len()
        )));
    }
    let ciphertext = hex_field("ciphertext", &crypto.ciphertext)?;
    let expected_mac = hex_field("mac", &crypto.mac)?;

    let derived = kdf.derive(password, &salt)?;
    if !constant_time_eq(&mac(&derived, &ciphertext), &expected_mac) {
        return Err(WalletError::AuthenticationFailed);
    }

    let mut secret = Zeroizing::new(ciphertext);
    apply_ctr(&derived[..16], &iv, &mut secret)?;
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_scrypt() -> KeystoreOptions {
        KeystoreOptions::with_kdf(Kdf::Scrypt {
            n: 16,
            r: 8,
            p: 1,
            dklen: 32,
        })
    }

    fn fast_pbkdf2() -> KeystoreOptions {
        KeystoreOptions::with_kdf(Kdf::Pbkdf2 { c: 16, dklen: 32 })
    }

    #[test]
    fn scrypt_roundtrip() {
        let secret = [0x42u8; 32];
        let crypto = encrypt(&secret, b"password", &fast_scrypt()).unwrap();
        assert_eq!(crypto.kdf, "scrypt");
        assert_eq!(crypto.kdfparams["n"], 16);
        let decrypted = decrypt(&crypto, b"password").unwrap();
        assert_eq!(decrypted.as_slice(), &secret);
    }

    #[test]
    fn pbkdf2_roundtrip() {
        let secret = [0x24u8; 32];
        let crypto = encrypt(&secret, b"password", &fast_pbkdf2()).unwrap();
        assert_eq!(crypto.kdfparams["prf"], "hmac-sha256");
        let decrypted = decrypt(&crypto, b"password").unwrap();
        assert_eq!(decrypted.as_slice(), &secret);
    }

    #[test]
    fn wrong_password_fails_mac() {
        let crypto = encrypt(&[1u8; 32], b"right", &fast_scrypt()).unwrap();
        assert_eq!(
            decrypt(&crypto, b"wrong").unwrap_err(),
            WalletError::AuthenticationFailed
        );
    }

    #[test]
    fn tampered_ciphertext_fails_mac() {
        let mut crypto = encrypt(&[1u8; 32], b"pw", &fast_pbkdf2()).unwrap();
        let mut ct = hex::decode(&crypto.ciphertext).unwrap();
        ct[0] ^= 0xff;
        crypto.ciphertext = hex::encode(ct);
        assert_eq!(
            decrypt(&crypto, b"pw").unwrap_err(),
            WalletError::AuthenticationFailed
        );
    }

    #[test]
    fn supplied_salt_and_iv_are_used() {
        let options = KeystoreOptions {
            salt: Some(vec![0xaa; 32]),
            iv: Some([0xbb; 16]),
            ..fast_scrypt()
        };
        let crypto = encrypt(&[1u8; 32], b"pw", &options).unwrap();
        assert_eq!(crypto.cipherparams.iv, "bb".repeat(16));
        assert_eq!(crypto.kdfparams["salt"], "aa".repeat(32));
        let again = encrypt(&[1u8; 32], b"pw", &options).unwrap();
        assert_eq!(crypto, again);
    }

    #[test]
    fn unsupported_cipher() {
        let mut crypto = encrypt(&[1u8; 32], b"pw", &fast_pbkdf2()).unwrap();
        crypto.cipher = "aes-256-gcm".into();
        assert_eq!(
            decrypt(&crypto, b"pw").unwrap_err(),
            WalletError::UnsupportedCipher("aes-256-gcm".into())
        );
    }

    #[test]
    fn unsupported_kdf() {
        let mut crypto = encrypt(&[1u8; 32], b"pw", &fast_pbkdf2()).unwrap();
        crypto.kdf = "argon2".into();
        assert_eq!(
            decrypt(&crypto, b"pw").unwrap_err(),
            WalletError::UnsupportedKdf("argon2".into())
        );
    }

    #[test]
    fn scrypt_n_must_be_power_of_two() {
        let options = KeystoreOptions::with_kdf(Kdf::Scrypt {
            n: 1000,
            r: 8,
            p: 1,
            dklen: 32,
        });
        assert!(matches!(
            encrypt(&[1u8; 32], b"pw", &options).unwrap_err(),
            WalletError::Encryption(_)
        ));
    }

    fn pbkdf2_record(kdfparams: serde_json::Value) -> CryptoParams {
        let mut crypto = encrypt(&[1u8; 32], b"pw", &fast_pbkdf2()).unwrap();
        crypto.kdfparams = kdfparams;
        crypto
    }

    #[test]
    fn oversized_dklen_rejected_without_deriving() {
        let salt = "ab".repeat(32);
        for dklen in [u64::MAX, 65, 31] {
            let crypto = pbkdf2_record(serde_json::json!({
                "c": 16, "dklen": dklen, "prf": "hmac-sha256", "salt": salt,
            }));
            assert!(matches!(
                decrypt(&crypto, b"pw").unwrap_err(),
                WalletError::InvalidKeystoreFormat(_)
            ));
        }
    }

    #[test]
    fn excessive_costs_rejected() {
        let salt = "ab".repeat(32);
        let records = [
            pbkdf2_record(serde_json::json!({"c": u32::MAX, "dklen": 32, "salt": salt})),
            pbkdf2_record(serde_json::json!({"c": 0, "dklen": 32, "salt": salt})),
        ];
        for crypto in records {
            assert!(matches!(
                decrypt(&crypto, b"pw").unwrap_err(),
                WalletError::InvalidKeystoreFormat(_)
            ));
        }

        let scrypt_params = [
            (1u32 << 31, 8u32, 1u32),
            (1 << 20, 32, 1),
            (16, 0, 1),
            (16, 8, 1000),
        ];
        for (n, r, p) in scrypt_params {
            let mut crypto = encrypt(&[1u8; 32], b"pw", &fast_scrypt()).unwrap();
            crypto.kdfparams = serde_json::json!({"n": n, "r": r, "p": p, "dklen": 32, "salt": salt});
            assert!(
                matches!(decrypt(&crypto, b"pw").unwrap_err(), WalletError::InvalidKeystoreFormat(_)),
                "n={n} r={r} p={p}"
            );
        }
    }

    #[test]
    fn mac_comparison() {
        assert!(constant_time_eq(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2]));
    }

    #[test]
    fn defaults() {
        assert_eq!(
            Kdf::default(),
            Kdf::Scrypt {
                n: 4096,
                r: 8,
                p: 1,
                dklen: 32
            }
        );
        assert_eq!(Kdf::pbkdf2(), Kdf::Pbkdf2 { c: 262_144, dklen: 32 });
    }
}
