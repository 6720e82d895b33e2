//! Handshake parameters: the public agreement both peers sign up to before
//! a session id can be derived (spec.md §3, §4.3).

use crate::hexbytes::Address20;
use serde::{Deserialize, Serialize};

pub const HANDSHAKE_VERSION: &str = "voidswap-v1";

/// The encoded-message size ceiling mirrored at every validation boundary
/// (spec.md §5, §7 `BAD_MESSAGE` "size limit exceeded").
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// The public agreement both peers sign up to. Immutable once a session is
/// created; equality of this value between peers (checked canonically, not
/// structurally) gates the handshake lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeParams {
    pub version: String,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    #[serde(rename = "drandChainId")]
    pub drand_chain_id: String,
    #[serde(rename = "valueA")]
    pub value_a: String,
    #[serde(rename = "valueB")]
    pub value_b: String,
    #[serde(rename = "targetA")]
    pub target_a: Address20,
    #[serde(rename = "targetB")]
    pub target_b: Address20,
    #[serde(rename = "refundRoundB")]
    pub refund_round_b: u64,
    #[serde(rename = "refundRoundA")]
    pub refund_round_a: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("unsupported handshake version {0:?}")]
    UnsupportedVersion(String),
    #[error("value must be a non-negative, unsigned decimal string: {0:?}")]
    InvalidValue(String),
    #[error("refund round policy violated: refundRoundB ({refund_round_b}) must be < refundRoundA ({refund_round_a})")]
    RefundOrder { refund_round_b: u64, refund_round_a: u64 },
}

impl HandshakeParams {
    /// `validateRefundOrder` (spec.md §8 boundary behaviors): a policy
    /// check distinct from, and run before, any state-machine validation.
    pub fn validate_refund_order(&self) -> Result<(), ParamsError> {
        if self.refund_round_b >= self.refund_round_a {
            return Err(ParamsError::RefundOrder {
                refund_round_b: self.refund_round_b,
                refund_round_a: self.refund_round_a,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.version != HANDSHAKE_VERSION {
            return Err(ParamsError::UnsupportedVersion(self.version.clone()));
        }
        validate_decimal_string(&self.value_a)?;
        validate_decimal_string(&self.value_b)?;
        self.validate_refund_order()
    }
}

/// Decimal-string big integers carry no sign and no leading zero other than
/// a bare `"0"` (spec.md §3, §8).
fn validate_decimal_string(s: &str) -> Result<(), ParamsError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParamsError::InvalidValue(s.to_string()));
    }
    if s.len() > 1 && s.starts_with('0') {
        return Err(ParamsError::InvalidValue(s.to_string()));
    }
    Ok(())
}
