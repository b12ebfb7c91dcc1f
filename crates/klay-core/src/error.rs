//! Error types for the Klaytn wire layer.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported transaction type: 0x{0:02x}")] UnsupportedType(u8),
    #[error("unknown transaction type name: {0}")] UnknownTypeName(String),
    #[error("malformed encoding: {0}")] MalformedEncoding(String),
    #[error("missing field: {0}")] MissingField(&'static str),
    #[error("forbidden field for this transaction type: {0}")] ForbiddenField(&'static str),
    #[error("invalid field {field}: {reason}")] InvalidField { field: &'static str, reason: String },
    #[error("{0} is not a fee-delegated transaction type")] NotFeeDelegated(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key")] InvalidPrivateKey,
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature")] InvalidSignature,
    #[error("public key recovery failed")] RecoveryFailed,
    #[error("chain id {0} does not fit the recovery value")] ChainIdOverflow(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid length: {0} bytes")] InvalidLength(usize),
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid checksum")] InvalidChecksum,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KlayError {
    #[error(transparent)] Codec(#[from] CodecError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Address(#[from] AddressError),
}

impl CodecError {
    /// Shorthand for a [`CodecError::MalformedEncoding`] with formatted context.
    pub fn malformed(context: impl Into<String>) -> Self {
        Self::MalformedEncoding(context.into())
    }

    /// Shorthand for a [`CodecError::InvalidField`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unsupported_type_is_hex() {
        assert_eq!(
            CodecError::UnsupportedType(0x18).to_string(),
            "unsupported transaction type: 0x18"
        );
    }

    #[test]
    fn display_missing_field_names_field() {
        assert_eq!(CodecError::MissingField("nonce").to_string(), "missing field: nonce");
    }

    #[test]
    fn klay_error_from_codec() {
        let e: KlayError = CodecError::ForbiddenField("to").into();
        assert_eq!(e, KlayError::Codec(CodecError::ForbiddenField("to")));
    }
}
