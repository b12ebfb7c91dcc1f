//! Keystore compatibility and file round trips.

use klay_tests::helpers::*;
use klay_wallet::{Kdf, Keyring, Keystore, KeystoreOptions, Role, WalletError};

/// Version 3 pbkdf2 record written by another implementation (no address field).
const PBKDF2_V3: &str = r#"{"crypto":{"cipher":"aes-128-ctr","cipherparams":{"iv":"6087dab2f9fdbbfaddc31a909735c1e6"},"ciphertext":"5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46","kdf":"pbkdf2","kdfparams":{"c":262144,"dklen":32,"prf":"hmac-sha256","salt":"ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"},"mac":"517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9e51205e9b2"},"id":"3198bc9c-6672-5ab3-d995-4942343ae5b6","version":3}"#;
const PBKDF2_V3_KEY: &str = "0x7a28b5ba57c53603b0b07b56bba752f7784bf506fa95edc395f5cf6c7514fe9d";

#[test]
fn decrypts_pbkdf2_reference_record() {
    let record = Keystore::from_json(PBKDF2_V3).unwrap();
    let keyring = record.decrypt(b"testpassword").unwrap();
    let key = &keyring.keys(Role::Transaction)[0];
    assert_eq!(key.to_hex().as_str(), PBKDF2_V3_KEY);
    // Without an address field the derived address is used.
    assert_eq!(keyring.address(), key.derived_address());
    assert!(!keyring.is_decoupled());
}

#[test]
fn reference_record_rejects_wrong_password() {
    let record = Keystore::from_json(PBKDF2_V3).unwrap();
    assert_eq!(
        record.decrypt(b"wrongpassword").unwrap_err(),
        WalletError::AuthenticationFailed
    );
}

#[test]
fn default_scrypt_parameters_roundtrip() {
    let keyring = Keyring::from_key(sender_key());
    let record = keyring.encrypt_v3(b"pw", &KeystoreOptions::default()).unwrap();
    let crypto = record.crypto.as_ref().unwrap();
    assert_eq!(crypto.kdf, "scrypt");
    assert_eq!(crypto.kdfparams["n"], 4096);
    assert_eq!(crypto.kdfparams["r"], 8);
    assert_eq!(crypto.kdfparams["p"], 1);
    assert_eq!(crypto.kdfparams["dklen"], 32);
    assert_eq!(record.address.as_deref(), Some("0x90b3e9a3770481345a7f17f22f16d020bccfd33e"));
    assert_eq!(record.decrypt(b"pw").unwrap(), keyring);
}

#[test]
fn role_based_keyring_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystore.json");

    let keyring = Keyring::role_based(
        sender_key().address(),
        vec![vec![key(1), key(2)], vec![key(3)], vec![key(4)]],
    )
    .unwrap();
    let record = keyring.encrypt(b"correct horse", &fast_keystore_options()).unwrap();
    std::fs::write(&path, record.to_json().unwrap()).unwrap();

    let json = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], 4);
    assert_eq!(value["keyring"].as_array().unwrap().len(), 3);
    assert!(value.get("crypto").is_none());

    let restored = Keystore::from_json(&json).unwrap().decrypt(b"correct horse").unwrap();
    assert_eq!(restored, keyring);
    assert!(restored.is_role_based());
}

#[test]
fn decoupled_single_key_keeps_its_address() {
    let address = fee_payer_key().address();
    let keyring = Keyring::single(address, sender_key());
    for record in [
        keyring.encrypt_v3(b"pw", &fast_keystore_options()).unwrap(),
        keyring.encrypt(b"pw", &fast_keystore_options()).unwrap(),
    ] {
        let restored = record.decrypt(b"pw").unwrap();
        assert_eq!(restored.address(), address);
        assert!(restored.is_decoupled());
        assert_eq!(restored.to_wallet_key().unwrap(), keyring.to_wallet_key().unwrap());
    }
}

#[test]
fn pbkdf2_v4_roundtrip_keeps_every_role() {
    let options = KeystoreOptions::with_kdf(Kdf::Pbkdf2 { c: 32, dklen: 32 });
    let keyring = Keyring::role_based(
        key(8).address(),
        vec![vec![key(8), key(9)], vec![], vec![key(10)]],
    )
    .unwrap();
    let json = keyring.encrypt(b"pw", &options).unwrap().to_json().unwrap();
    assert!(json.contains("\"prf\": \"hmac-sha256\""));

    let record = Keystore::from_json(&json).unwrap();
    let restored = record.decrypt(b"pw").unwrap();
    assert_eq!(restored, keyring);
    for role in Role::ALL {
        assert_eq!(restored.keys(role), keyring.keys(role));
    }
    assert_eq!(record.decrypt(b"pW").unwrap_err(), WalletError::AuthenticationFailed);
}

#[test]
fn hostile_kdf_parameters_are_format_errors() {
    let hostile = [
        r#""kdf":"pbkdf2","kdfparams":{"c":262144,"dklen":18446744073709551615,"prf":"hmac-sha256","salt":"ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"}"#,
        r#""kdf":"pbkdf2","kdfparams":{"c":4294967295,"dklen":32,"prf":"hmac-sha256","salt":"ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"}"#,
        r#""kdf":"scrypt","kdfparams":{"n":2147483648,"r":8,"p":1,"dklen":32,"salt":"ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"}"#,
    ];
    for kdf in hostile {
        let json = format!(
            r#"{{"crypto":{{"cipher":"aes-128-ctr","cipherparams":{{"iv":"6087dab2f9fdbbfaddc31a909735c1e6"}},"ciphertext":"5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46",{kdf},"mac":"517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9e51205e9b2"}},"id":"3198bc9c-6672-5ab3-d995-4942343ae5b6","version":3}}"#
        );
        let record = Keystore::from_json(&json).unwrap();
        assert!(
            matches!(record.decrypt(b"testpassword").unwrap_err(), WalletError::InvalidKeystoreFormat(_)),
            "{kdf}"
        );
    }
}

#[test]
fn structural_errors_precede_cryptography() {
    let v4_without_keyring = r#"{"version":4,"id":"x","address":"0x90b3e9a3770481345a7f17f22f16d020bccfd33e"}"#;
    assert!(matches!(
        Keystore::from_json(v4_without_keyring).unwrap().decrypt(b"pw").unwrap_err(),
        WalletError::InvalidKeystoreFormat(_)
    ));
    let v3_without_crypto = r#"{"version":3,"id":"x"}"#;
    assert!(matches!(
        Keystore::from_json(v3_without_crypto).unwrap().decrypt(b"pw").unwrap_err(),
        WalletError::InvalidKeystoreFormat(_)
    ));
}
