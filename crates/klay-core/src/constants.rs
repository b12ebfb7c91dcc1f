//! Protocol constants shared by the codec, signer and keystore.

/// Offset added to a type family's base tag for the fee-delegated variant.
pub const FEE_DELEGATED_OFFSET: u8 = 1;

/// Offset added to a type family's base tag for the fee-delegated-with-ratio variant.
pub const FEE_DELEGATED_WITH_RATIO_OFFSET: u8 = 2;

/// Base tag of the value-transfer family.
pub const TAG_VALUE_TRANSFER: u8 = 0x08;

/// Base tag of the value-transfer-with-memo family.
pub const TAG_VALUE_TRANSFER_MEMO: u8 = 0x10;

/// Account creation. Recognised on the wire but never constructed or decoded.
pub const TAG_ACCOUNT_CREATION: u8 = 0x18;

/// Base tag of the account-update family.
pub const TAG_ACCOUNT_UPDATE: u8 = 0x20;

/// Base tag of the smart-contract-deploy family.
pub const TAG_SMART_CONTRACT_DEPLOY: u8 = 0x28;

/// Base tag of the smart-contract-execution family.
pub const TAG_SMART_CONTRACT_EXECUTION: u8 = 0x30;

/// Base tag of the cancel family.
pub const TAG_CANCEL: u8 = 0x38;

/// Base tag of the chain-data-anchoring family.
pub const TAG_CHAIN_DATA_ANCHORING: u8 = 0x48;

/// Offset in the EIP-155 recovery value: `v = recovery_id + chain_id * 2 + 35`.
pub const EIP155_V_OFFSET: u64 = 35;

/// Offset for signatures not bound to a chain: `v = recovery_id + 27`.
pub const UNBOUND_V_OFFSET: u64 = 27;

/// `v` carried by a signature slot that has not been signed yet.
pub const PLACEHOLDER_V: u64 = 1;

/// Smallest fee ratio a fee-delegated-with-ratio transaction may carry.
pub const MIN_FEE_RATIO: u8 = 1;

/// Largest fee ratio a fee-delegated-with-ratio transaction may carry.
pub const MAX_FEE_RATIO: u8 = 99;

/// Code format of EVM bytecode in smart contract deploy transactions.
pub const CODE_FORMAT_EVM: u8 = 0;

/// Separator between the key and the address in a combined wallet key.
pub const WALLET_KEY_SEPARATOR: &str = "0x00";

/// Prefix hashed in front of personal messages before signing.
pub const MESSAGE_PREFIX: &str = "\x19Klaytn Signed Message:\n";

/// Number of key roles a role-based account carries.
pub const ROLE_COUNT: usize = 3;
