//! Integration test suite for the Klaytn client crates.
//!
//! Reference wire vectors, multi-party signing flows across the codec,
//! keyring, signer and combinator, keystore compatibility, and
//! property-based decoding of hostile input.

pub mod helpers;
