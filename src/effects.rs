//! Effects returned from the runtime (spec.md §9 Design Notes).
//!
//! Every public entry point returns an ordered `Vec<Effect>` instead of
//! invoking operator callbacks directly, keeping `(state, input) ->
//! (state', effects)` a pure function with no I/O performed inside it.

use crate::error::AbortCode;
use crate::message::Message;
use crate::session_id::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortInfo {
    pub code: AbortCode,
    pub message: String,
}

/// Phase/lifecycle notifications that accompany but are distinct from
/// outbound wire messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    Locked { sid: SessionId },
    PhaseAdvanced { phase: String },
    Aborted { info: AbortInfo },
}

/// An abort is always surfaced as a `Send` of the wire `abort` message
/// alongside a `Lifecycle(Aborted)` notification (see
/// `SessionRuntime::abort`/`HandshakeRuntime::abort`); there is no separate
/// effect variant for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Message),
    Lifecycle(LifecycleEvent),
}

impl Effect {
    pub fn send(message: Message) -> Self {
        Effect::Send(message)
    }

    pub fn phase_advanced(phase: impl Into<String>) -> Self {
        Effect::Lifecycle(LifecycleEvent::PhaseAdvanced { phase: phase.into() })
    }
}
