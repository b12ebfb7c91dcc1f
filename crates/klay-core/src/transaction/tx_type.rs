//! Transaction type registry.
//!
//! Every typed transaction belongs to a family with a base tag. The basic
//! variant uses the base tag, the fee-delegated variant `base + 1` and the
//! fee-delegated-with-ratio variant `base + 2`. Legacy transactions carry no
//! tag.

use std::fmt;

use crate::constants::{
    FEE_DELEGATED_OFFSET, FEE_DELEGATED_WITH_RATIO_OFFSET, TAG_ACCOUNT_CREATION, TAG_ACCOUNT_UPDATE,
    TAG_CANCEL, TAG_CHAIN_DATA_ANCHORING, TAG_SMART_CONTRACT_DEPLOY, TAG_SMART_CONTRACT_EXECUTION,
    TAG_VALUE_TRANSFER, TAG_VALUE_TRANSFER_MEMO,
};
use crate::error::CodecError;

/// A transaction family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxFamily {
    Legacy,
    ValueTransfer,
    ValueTransferMemo,
    AccountUpdate,
    SmartContractDeploy,
    SmartContractExecution,
    Cancel,
    ChainDataAnchoring,
}

impl TxFamily {
    const TYPED: [TxFamily; 7] = [
        TxFamily::ValueTransfer,
        TxFamily::ValueTransferMemo,
        TxFamily::AccountUpdate,
        TxFamily::SmartContractDeploy,
        TxFamily::SmartContractExecution,
        TxFamily::Cancel,
        TxFamily::ChainDataAnchoring,
    ];

    /// Base tag, `None` for legacy.
    pub fn base_tag(self) -> Option<u8> {
        match self {
            TxFamily::Legacy => None,
            TxFamily::ValueTransfer => Some(TAG_VALUE_TRANSFER),
            TxFamily::ValueTransferMemo => Some(TAG_VALUE_TRANSFER_MEMO),
            TxFamily::AccountUpdate => Some(TAG_ACCOUNT_UPDATE),
            TxFamily::SmartContractDeploy => Some(TAG_SMART_CONTRACT_DEPLOY),
            TxFamily::SmartContractExecution => Some(TAG_SMART_CONTRACT_EXECUTION),
            TxFamily::Cancel => Some(TAG_CANCEL),
            TxFamily::ChainDataAnchoring => Some(TAG_CHAIN_DATA_ANCHORING),
        }
    }

    fn name_stem(self) -> &'static str {
        match self {
            TxFamily::Legacy => "LegacyTransaction",
            TxFamily::ValueTransfer => "ValueTransfer",
            TxFamily::ValueTransferMemo => "ValueTransferMemo",
            TxFamily::AccountUpdate => "AccountUpdate",
            TxFamily::SmartContractDeploy => "SmartContractDeploy",
            TxFamily::SmartContractExecution => "SmartContractExecution",
            TxFamily::Cancel => "Cancel",
            TxFamily::ChainDataAnchoring => "ChainDataAnchoring",
        }
    }
}

/// Who pays the fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeeMode {
    /// The sender pays.
    Sender,
    /// A fee payer pays everything.
    Delegated,
    /// A fee payer pays `fee_ratio` percent, the sender the rest.
    DelegatedWithRatio,
}

impl FeeMode {
    fn offset(self) -> u8 {
        match self {
            FeeMode::Sender => 0,
            FeeMode::Delegated => FEE_DELEGATED_OFFSET,
            FeeMode::DelegatedWithRatio => FEE_DELEGATED_WITH_RATIO_OFFSET,
        }
    }

    /// Whether a fee payer signs.
    pub fn is_delegated(self) -> bool {
        !matches!(self, FeeMode::Sender)
    }
}

/// A concrete transaction type: family plus fee mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxType {
    pub family: TxFamily,
    pub fee_mode: FeeMode,
}

impl TxType {
    pub const LEGACY: TxType = TxType {
        family: TxFamily::Legacy,
        fee_mode: FeeMode::Sender,
    };

    pub fn new(family: TxFamily, fee_mode: FeeMode) -> Self {
        Self { family, fee_mode }
    }

    /// Every supported type, legacy first.
    pub fn all() -> Vec<TxType> {
        let mut out = vec![TxType::LEGACY];
        for family in TxFamily::TYPED {
            for fee_mode in [FeeMode::Sender, FeeMode::Delegated, FeeMode::DelegatedWithRatio] {
                out.push(TxType::new(family, fee_mode));
            }
        }
        out
    }

    /// Wire tag, `None` for legacy.
    pub fn tag(&self) -> Option<u8> {
        self.family.base_tag().map(|base| base + self.fee_mode.offset())
    }

    /// Resolve a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self, CodecError> {
        if (TAG_ACCOUNT_CREATION..TAG_ACCOUNT_CREATION + 3).contains(&tag) {
            return Err(CodecError::UnsupportedType(tag));
        }
        TxFamily::TYPED
            .iter()
            .filter_map(|&family| family.base_tag().map(|base| (family, base)))
            .find_map(|(family, base)| {
                let fee_mode = match tag.checked_sub(base)? {
                    0 => FeeMode::Sender,
                    FEE_DELEGATED_OFFSET => FeeMode::Delegated,
                    FEE_DELEGATED_WITH_RATIO_OFFSET => FeeMode::DelegatedWithRatio,
                    _ => return None,
                };
                Some(TxType::new(family, fee_mode))
            })
            .ok_or(CodecError::UnsupportedType(tag))
    }

    /// Chain type name, e.g. `TxTypeFeeDelegatedValueTransferWithRatio`.
    pub fn name(&self) -> String {
        let stem = self.family.name_stem();
        match self.fee_mode {
            FeeMode::Sender => format!("TxType{stem}"),
            FeeMode::Delegated => format!("TxTypeFeeDelegated{stem}"),
            FeeMode::DelegatedWithRatio => format!("TxTypeFeeDelegated{stem}WithRatio"),
        }
    }

    /// Resolve a chain type name. The `TxType` prefix is optional.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        let wanted = name.strip_prefix("TxType").unwrap_or(name);
        Self::all()
            .into_iter()
            .find(|t| t.name().strip_prefix("TxType") == Some(wanted))
            .ok_or_else(|| CodecError::UnknownTypeName(name.to_string()))
    }

    pub fn is_legacy(&self) -> bool {
        self.family == TxFamily::Legacy
    }

    pub fn is_fee_delegated(&self) -> bool {
        self.fee_mode.is_delegated()
    }

    pub fn has_fee_ratio(&self) -> bool {
        self.fee_mode == FeeMode::DelegatedWithRatio
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_follow_family_offsets() {
        let fd_vt = TxType::new(TxFamily::ValueTransfer, FeeMode::Delegated);
        assert_eq!(fd_vt.tag(), Some(0x09));
        let fdr_update = TxType::new(TxFamily::AccountUpdate, FeeMode::DelegatedWithRatio);
        assert_eq!(fdr_update.tag(), Some(0x22));
        let fdr_deploy = TxType::new(TxFamily::SmartContractDeploy, FeeMode::DelegatedWithRatio);
        assert_eq!(fdr_deploy.tag(), Some(0x2a));
        let fd_exec = TxType::new(TxFamily::SmartContractExecution, FeeMode::Delegated);
        assert_eq!(fd_exec.tag(), Some(0x31));
        assert_eq!(TxType::LEGACY.tag(), None);
    }

    #[test]
    fn from_tag_inverts_tag() {
        for t in TxType::all().into_iter().filter(|t| !t.is_legacy()) {
            let tag = t.tag().unwrap();
            assert_eq!(TxType::from_tag(tag).unwrap(), t);
        }
    }

    #[test]
    fn account_creation_is_unsupported() {
        assert_eq!(TxType::from_tag(0x18).unwrap_err(), CodecError::UnsupportedType(0x18));
    }

    #[test]
    fn unknown_tags_are_unsupported() {
        for tag in [0x00, 0x03, 0x0b, 0x40, 0x4b, 0xff] {
            assert_eq!(TxType::from_tag(tag).unwrap_err(), CodecError::UnsupportedType(tag));
        }
    }

    #[test]
    fn names() {
        assert_eq!(TxType::LEGACY.name(), "TxTypeLegacyTransaction");
        assert_eq!(
            TxType::new(TxFamily::ValueTransferMemo, FeeMode::DelegatedWithRatio).name(),
            "TxTypeFeeDelegatedValueTransferMemoWithRatio"
        );
        assert_eq!(
            TxType::from_name("TxTypeFeeDelegatedCancel").unwrap(),
            TxType::new(TxFamily::Cancel, FeeMode::Delegated)
        );
        assert_eq!(
            TxType::from_name("ValueTransfer").unwrap(),
            TxType::new(TxFamily::ValueTransfer, FeeMode::Sender)
        );
        assert!(matches!(
            TxType::from_name("TxTypeBogus").unwrap_err(),
            CodecError::UnknownTypeName(_)
        ));
    }

    #[test]
    fn registry_size() {
        assert_eq!(TxType::all().len(), 22);
    }
}
