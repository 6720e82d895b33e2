//! Closed wire error codes and the crate's internal error type.
//!
//! Every failure that can cross the runtime boundary has a stable,
//! serializable shape, never an opaque string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of wire error kinds (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbortCode {
    BadMessage,
    SidMismatch,
    ProtocolError,
}

impl fmt::Display for AbortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbortCode::BadMessage => "BAD_MESSAGE",
            AbortCode::SidMismatch => "SID_MISMATCH",
            AbortCode::ProtocolError => "PROTOCOL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Internal invariant violations and wire-visible abort causes. `abort_code`
/// maps each variant onto its wire code; `Display` yields the exact abort
/// message text where one is mandated verbatim.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("message exceeds size ceiling")]
    MessageTooLarge,
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("sid present before lock")]
    SidPresentBeforeLock,
    #[error("sid absent after lock")]
    SidAbsentAfterLock,
    #[error("sid mismatch")]
    SidMismatch,
    #[error("sequence number did not strictly increase")]
    NonMonotonicSeq,
    #[error("message from unexpected role")]
    UnexpectedRole,
    #[error("Handshake params mismatch")]
    HandshakeParamsMismatch,
    #[error("Conflicting keygen data")]
    ConflictingKeygenData,
    #[error("Nonce mismatch")]
    NonceMismatch,
    #[error("Template digest mismatch")]
    TemplateDigestMismatch,
    #[error("{0}")]
    CapsuleInvalid(String),
    #[error("Invalid adaptor sig for {0}")]
    InvalidAdaptorSig(String),
    #[error("Insufficient funding value")]
    InsufficientFundingValue,
    #[error("Funding leg mismatch")]
    FundingLegMismatch,
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn abort_code(&self) -> AbortCode {
        match self {
            Error::MessageTooLarge
            | Error::MalformedMessage(_)
            | Error::SidPresentBeforeLock
            | Error::SidAbsentAfterLock
            | Error::NonMonotonicSeq => AbortCode::BadMessage,
            Error::SidMismatch => AbortCode::SidMismatch,
            Error::UnexpectedRole
            | Error::HandshakeParamsMismatch
            | Error::ConflictingKeygenData
            | Error::NonceMismatch
            | Error::TemplateDigestMismatch
            | Error::CapsuleInvalid(_)
            | Error::InvalidAdaptorSig(_)
            | Error::InsufficientFundingValue
            | Error::FundingLegMismatch
            | Error::Other(_) => AbortCode::ProtocolError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_mismatch_maps_to_protocol_error() {
        assert_eq!(Error::HandshakeParamsMismatch.abort_code(), AbortCode::ProtocolError);
        assert_eq!(Error::HandshakeParamsMismatch.to_string(), "Handshake params mismatch");
    }

    #[test]
    fn non_monotonic_seq_maps_to_bad_message() {
        assert_eq!(Error::NonMonotonicSeq.abort_code(), AbortCode::BadMessage);
    }

    #[test]
    fn abort_code_serializes_to_wire_string() {
        assert_eq!(serde_json::to_string(&AbortCode::ProtocolError).unwrap(), "\"PROTOCOL_ERROR\"");
        assert_eq!(serde_json::to_string(&AbortCode::SidMismatch).unwrap(), "\"SID_MISMATCH\"");
    }
}
