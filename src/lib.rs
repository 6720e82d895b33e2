#![warn(
    unused_extern_crates,
    missing_debug_implementations,
    missing_copy_implementations,
    rust_2018_idioms,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::fallible_impl_from,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
    clippy::dbg_macro
)]
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![forbid(unsafe_code)]

//! A deterministic, two-party atomic-swap session state machine.
//!
//! [`session::SessionRuntime`] is the crate's single public entry point: one
//! instance per peer, driven by [`session::SessionRuntime::start`] and
//! [`session::SessionRuntime::handle_message`], each returning the ordered
//! [`effects::Effect`]s to carry out. The runtime performs no I/O and never
//! re-enters itself mid-call.

mod adaptor;
mod bigdec;
mod canonical;
mod effects;
mod error;
mod handshake;
mod hash;
mod hexbytes;
mod message;
mod mock_crypto;
mod params;
mod role;
mod session;
mod session_id;
mod transaction;
mod transcript;

pub use effects::{AbortInfo, Effect, LifecycleEvent};
pub use error::{AbortCode, Error};
pub use handshake::HandshakeState;
pub use hexbytes::{Address20, Hex32, Hex64, HexError};
pub use message::{
    AbortPayload, AdaptorAckPayload, AdaptorMode, AdaptorRespPayload, AdaptorStartPayload,
    AliceOnly, CapsuleAckPayload, CapsuleOfferPayload, CapsuleRole, ErrorPayload, FeeMode,
    FeeParamsAckPayload, FeeParamsPayload, FundingTxPayload, HelloAckPayload, HelloPayload,
    KeygenAnnouncePayload, Leg, Message, MpcCommitments, MpcResult, NonceReportPayload, Payload,
    TxBroadcastPayload, TxTemplateAckPayload, TxTemplateCommitPayload,
};
pub use params::{HandshakeParams, ParamsError, HANDSHAKE_VERSION};
pub use role::Role;
pub use session::{Phase, SessionConfig, SessionRuntime, SessionStatus};
pub use session_id::{compute_sid, random_nonce, Nonce, SessionId};
