//! Keyrings and the role model.
//!
//! A [`Keyring`] binds one address to up to three ordered key sequences,
//! one per [`Role`]. A role with no keys of its own borrows the transaction
//! role's keys when asked for a signing key, so an account that never
//! customised its roles signs everything with its primary key.
//!
//! # Shapes
//!
//! - single key: one transaction key, other roles empty
//! - multiple keys: several transaction keys (weighted multi-sig accounts)
//! - role-based: any non-transaction role populated

use std::fmt;
use tracing::debug;

use klay_core::account_key::{AccountKey, WeightedMultiSigOptions};
use klay_core::address::Address;
use klay_core::constants::ROLE_COUNT;
use klay_core::crypto::{hash_message, recover_public_key};
use klay_core::types::SignatureData;

use crate::encryption::KeystoreOptions;
use crate::error::WalletError;
use crate::keys::PrivateKey;
use crate::keystore::Keystore;

/// Authority a key is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Submitting transactions.
    Transaction,
    /// Updating the account key.
    AccountUpdate,
    /// Paying fees of delegated transactions.
    FeePayer,
}

impl Role {
    pub const ALL: [Role; ROLE_COUNT] = [Role::Transaction, Role::AccountUpdate, Role::FeePayer];

    /// Slot index: 0, 1, 2.
    pub fn index(self) -> usize {
        match self {
            Role::Transaction => 0,
            Role::AccountUpdate => 1,
            Role::FeePayer => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Transaction => "transaction",
            Role::AccountUpdate => "accountUpdate",
            Role::FeePayer => "feePayer",
        })
    }
}

/// An address and the on-chain key it should be registered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub account_key: AccountKey,
}

/// Keys for one address, partitioned by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyring {
    address: Address,
    keys: [Vec<PrivateKey>; ROLE_COUNT],
}

impl Keyring {
    /// Build from per-role key sequences. At least one role must hold a key.
    pub fn new(address: Address, keys: [Vec<PrivateKey>; ROLE_COUNT]) -> Result<Self, WalletError> {
        if keys.iter().all(Vec::is_empty) {
            return Err(WalletError::NoKeyForRole {
                role: Role::Transaction,
            });
        }
        Ok(Self { address, keys })
    }

    /// Keyring for one key at the key's own address.
    pub fn from_key(key: PrivateKey) -> Self {
        Self {
            address: key.address(),
            keys: [vec![key], Vec::new(), Vec::new()],
        }
    }

    /// Keyring for one key at an explicit (possibly decoupled) address.
    pub fn single(address: Address, key: PrivateKey) -> Self {
        Self {
            address,
            keys: [vec![key.with_address(address)], Vec::new(), Vec::new()],
        }
    }

    /// Keyring with several transaction-role keys.
    pub fn multiple(address: Address, keys: Vec<PrivateKey>) -> Result<Self, WalletError> {
        Self::role_based(address, vec![keys])
    }

    /// Keyring with explicit per-role keys, in role order. Fewer than three
    /// sequences leave the trailing roles empty.
    pub fn role_based(address: Address, roles: Vec<Vec<PrivateKey>>) -> Result<Self, WalletError> {
        if roles.len() > ROLE_COUNT {
            return Err(WalletError::InvalidKeystoreFormat(format!(
                "{} role key sets, at most {ROLE_COUNT}",
                roles.len()
            )));
        }
        let mut keys: [Vec<PrivateKey>; ROLE_COUNT] = Default::default();
        for (slot, role_keys) in keys.iter_mut().zip(roles) {
            *slot = role_keys.into_iter().map(|k| k.with_address(address)).collect();
        }
        Self::new(address, keys)
    }

    /// Keyring from a combined `key 0x00 address` secret.
    pub fn from_wallet_key(wallet_key: &str) -> Result<Self, WalletError> {
        let key = PrivateKey::from_wallet_key(wallet_key)?;
        Ok(Self::single(key.address(), key))
    }

    /// Keyring from hex keys per role.
    pub fn from_hex_keys(address: &str, roles: &[Vec<String>]) -> Result<Self, WalletError> {
        let address = Address::parse(address)?;
        let roles = roles
            .iter()
            .map(|role| role.iter().map(|k| PrivateKey::from_hex(k)).collect())
            .collect::<Result<Vec<Vec<_>>, _>>()?;
        Self::role_based(address, roles)
    }

    /// Keyring with one fresh random key.
    pub fn generate() -> Self {
        Self::from_key(PrivateKey::generate())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The role's own keys, without fallback.
    pub fn keys(&self, role: Role) -> &[PrivateKey] {
        &self.keys[role.index()]
    }

    /// Keys to sign with for `role`: the role's own keys, or the transaction
    /// role's keys when the role has none.
    pub fn keys_for_role(&self, role: Role) -> Result<&[PrivateKey], WalletError> {
        let own = self.keys(role);
        if !own.is_empty() {
            return Ok(own);
        }
        let primary = self.keys(Role::Transaction);
        if role != Role::Transaction && !primary.is_empty() {
            return Ok(primary);
        }
        Err(WalletError::NoKeyForRole { role })
    }

    /// Whether this is a single key: one transaction key and nothing else.
    pub fn is_single(&self) -> bool {
        self.keys[0].len() == 1 && self.keys[1..].iter().all(Vec::is_empty)
    }

    /// Whether any non-transaction role holds keys.
    pub fn is_role_based(&self) -> bool {
        self.keys[1..].iter().any(|k| !k.is_empty())
    }

    /// Whether the address is not the one derived from the key. Multi-key
    /// keyrings are always decoupled.
    pub fn is_decoupled(&self) -> bool {
        match self.keys[0].as_slice() {
            [key] if self.is_single() => key.derived_address() != self.address,
            _ => true,
        }
    }

    /// Sign `hash` with the key at `index` of the role's keys.
    pub fn sign_with_key(
        &self,
        hash: &[u8; 32],
        chain_id: u64,
        role: Role,
        index: usize,
    ) -> Result<SignatureData, WalletError> {
        let keys = self.keys_for_role(role)?;
        let key = keys.get(index).ok_or(WalletError::IndexOutOfRange {
            role,
            index,
            len: keys.len(),
        })?;
        debug!(address = %self.address, %role, index, chain_id, "signing hash");
        key.sign(hash, chain_id)
    }

    /// Sign `hash` with every key of the role, in order.
    pub fn sign_with_keys(&self, hash: &[u8; 32], chain_id: u64, role: Role) -> Result<Vec<SignatureData>, WalletError> {
        let keys = self.keys_for_role(role)?;
        debug!(address = %self.address, %role, keys = keys.len(), chain_id, "signing hash with all role keys");
        keys.iter().map(|k| k.sign(hash, chain_id)).collect()
    }

    /// Sign a personal message with one key (`Some(index)`) or all keys of the role.
    pub fn sign_message(
        &self,
        message: &[u8],
        role: Role,
        index: Option<usize>,
    ) -> Result<Vec<SignatureData>, WalletError> {
        let keys = self.keys_for_role(role)?;
        match index {
            Some(index) => {
                let key = keys.get(index).ok_or(WalletError::IndexOutOfRange {
                    role,
                    index,
                    len: keys.len(),
                })?;
                Ok(vec![key.sign_message(message)?])
            }
            None => keys.iter().map(|k| k.sign_message(message)).collect(),
        }
    }

    /// Whether `signature` over `hash` was made by one of the role's keys.
    pub fn verify(&self, hash: &[u8; 32], signature: &SignatureData, role: Role) -> Result<bool, WalletError> {
        let recovered = recover_public_key(hash, signature)?;
        Ok(self
            .keys_for_role(role)?
            .iter()
            .any(|k| k.public_key() == recovered))
    }

    /// Whether every signature over the personal message was made by one of the role's keys.
    pub fn verify_message(
        &self,
        message: &[u8],
        signatures: &[SignatureData],
        role: Role,
    ) -> Result<bool, WalletError> {
        if signatures.is_empty() {
            return Ok(false);
        }
        let hash = hash_message(message);
        for sig in signatures {
            if !self.verify(&hash, sig, role)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Append a key to a role.
    pub fn add_key(&mut self, role: Role, key: PrivateKey) {
        self.keys[role.index()].push(key.with_address(self.address));
    }

    /// Replace a role's keys. Replacing with an empty sequence clears the role.
    pub fn update_role(&mut self, role: Role, keys: Vec<PrivateKey>) -> Result<(), WalletError> {
        let address = self.address;
        let mut next = self.keys.clone();
        next[role.index()] = keys.into_iter().map(|k| k.with_address(address)).collect();
        if next.iter().all(Vec::is_empty) {
            return Err(WalletError::NoKeyForRole { role });
        }
        self.keys = next;
        Ok(())
    }

    /// Replace every role with those of `other`, keeping this address.
    pub fn update(&mut self, other: &Keyring) {
        let address = self.address;
        self.keys = other
            .keys
            .clone()
            .map(|role| role.into_iter().map(|k| k.with_address(address)).collect());
    }

    /// Remove all keys of a role.
    pub fn remove_role(&mut self, role: Role) -> Result<(), WalletError> {
        self.update_role(role, Vec::new())
    }

    /// Remove one key of a role.
    pub fn remove_key(&mut self, role: Role, index: usize) -> Result<PrivateKey, WalletError> {
        let len = self.keys[role.index()].len();
        if index >= len {
            return Err(WalletError::IndexOutOfRange { role, index, len });
        }
        if len == 1 && self.keys.iter().map(Vec::len).sum::<usize>() == 1 {
            return Err(WalletError::NoKeyForRole { role });
        }
        Ok(self.keys[role.index()].remove(index))
    }

    /// Combined `key 0x00 address` secret. Only for single-key keyrings.
    pub fn to_wallet_key(&self) -> Result<String, WalletError> {
        match self.keys[0].as_slice() {
            [key] if self.is_single() => Ok(key.to_wallet_key().to_string()),
            _ => Err(WalletError::NotSingleKey),
        }
    }

    /// On-chain account key with default threshold and weights.
    pub fn to_account(&self) -> Result<Account, WalletError> {
        self.to_account_with_options(&[])
    }

    /// On-chain account key. `options` holds one entry per role (missing
    /// entries default to threshold 1 and weight 1 per key).
    pub fn to_account_with_options(&self, options: &[WeightedMultiSigOptions]) -> Result<Account, WalletError> {
        let default = WeightedMultiSigOptions::default();
        let role_key = |role: Role| -> Result<AccountKey, WalletError> {
            let keys = self.keys(role);
            let opts = options.get(role.index()).unwrap_or(&default);
            match keys {
                [] => Ok(AccountKey::Nil),
                [key] if opts.is_default() => Ok(AccountKey::Public(key.public_key())),
                _ => {
                    let public: Vec<_> = keys.iter().map(PrivateKey::public_key).collect();
                    Ok(AccountKey::weighted(&public, opts)?)
                }
            }
        };

        let account_key = if self.is_role_based() {
            let roles = Role::ALL.iter().map(|&r| role_key(r)).collect::<Result<Vec<_>, _>>()?;
            AccountKey::role_based(roles)?
        } else {
            role_key(Role::Transaction)?
        };
        Ok(Account {
            address: self.address,
            account_key,
        })
    }

    /// Encrypt into a version 4 keystore record.
    pub fn encrypt(&self, password: &[u8], options: &KeystoreOptions) -> Result<Keystore, WalletError> {
        Keystore::encrypt_v4(self, password, options)
    }

    /// Encrypt into a version 3 keystore record. Only for single-key keyrings.
    pub fn encrypt_v3(&self, password: &[u8], options: &KeystoreOptions) -> Result<Keystore, WalletError> {
        Keystore::encrypt_v3(self, password, options)
    }
}
