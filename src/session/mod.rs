//! The principal state machine: phase 2 onward, from `LOCKED` through
//! `EXECUTION_PLANNED` (spec.md §4.4).
//!
//! One [`SessionRuntime`] per peer. Every public entry point consumes one
//! input and returns an ordered `Vec<Effect>`; the runtime performs no I/O
//! and never re-enters itself mid-call (spec.md §5).

pub mod adaptor_phase;
pub mod exec;
pub mod funding;

use crate::effects::{AbortInfo, Effect, LifecycleEvent};
use crate::error::Error;
use crate::handshake::HandshakeRuntime;
use crate::hexbytes::Hex32;
use crate::message::{
    CapsuleAckPayload, CapsuleOfferPayload, CapsuleRole, KeygenAnnouncePayload, Leg, Message,
    MpcResult, Payload,
};
use crate::mock_crypto::{expected_mpc_result, verify_capsule_offer};
use crate::params::HandshakeParams;
use crate::role::Role;
use crate::session_id::{Nonce, SessionId};
use crate::transcript::{Transcript, TranscriptRecord};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, error, warn};

pub const POST_HANDSHAKE_SEQ_FLOOR: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshake,
    Locked,
    Keygen,
    KeygenComplete,
    CapsulesExchange,
    CapsulesVerified,
    Funding,
    Funded,
    ExecPrep,
    ExecReady,
    ExecTemplatesBuilt,
    ExecTemplatesSync,
    ExecTemplatesReady,
    AdaptorNegotiating,
    AdaptorReady,
    ExecutionPlanned,
    Aborted,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Handshake => "HANDSHAKE",
            Phase::Locked => "LOCKED",
            Phase::Keygen => "KEYGEN",
            Phase::KeygenComplete => "KEYGEN_COMPLETE",
            Phase::CapsulesExchange => "CAPSULES_EXCHANGE",
            Phase::CapsulesVerified => "CAPSULES_VERIFIED",
            Phase::Funding => "FUNDING",
            Phase::Funded => "FUNDED",
            Phase::ExecPrep => "EXEC_PREP",
            Phase::ExecReady => "EXEC_READY",
            Phase::ExecTemplatesBuilt => "EXEC_TEMPLATES_BUILT",
            Phase::ExecTemplatesSync => "EXEC_TEMPLATES_SYNC",
            Phase::ExecTemplatesReady => "EXEC_TEMPLATES_READY",
            Phase::AdaptorNegotiating => "ADAPTOR_NEGOTIATING",
            Phase::AdaptorReady => "ADAPTOR_READY",
            Phase::ExecutionPlanned => "EXECUTION_PLANNED",
            Phase::Aborted => "ABORTED",
        }
    }
}

/// The message size ceiling and post-handshake `seq` floor; the crate's
/// only configuration surface (SPEC_FULL.md §2).
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub max_message_bytes: usize,
    pub post_handshake_seq_floor: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: crate::params::DEFAULT_MAX_MESSAGE_BYTES,
            post_handshake_seq_floor: POST_HANDSHAKE_SEQ_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: String,
    pub sid: Option<SessionId>,
    #[serde(rename = "transcriptHash")]
    pub transcript_hash: Hex32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct KeygenState {
    pub mpc_a: Option<MpcResult>,
    pub mpc_b: Option<MpcResult>,
    pub peer_confirmed: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CapsuleState {
    pub offered: bool,
    pub local_ok: bool,
    pub peer_ok: bool,
}

pub struct SessionRuntime {
    pub(crate) role: Role,
    pub(crate) config: SessionConfig,
    pub(crate) handshake: HandshakeRuntime,
    pub(crate) phase: Phase,
    pub(crate) sid: Option<SessionId>,
    pub(crate) post: Transcript,
    pub(crate) last_seq: HashMap<Role, u64>,
    pub(crate) local_seq: u64,
    pub(crate) abort_info: Option<AbortInfo>,

    pub(crate) keygen: KeygenState,
    pub(crate) capsules: CapsuleState,
    pub(crate) funding: funding::FundingBook,
    pub(crate) exec: exec::ExecState,
    pub(crate) adaptor: adaptor_phase::AdaptorState,
    pub(crate) role_action: Option<String>,
}

impl SessionRuntime {
    pub fn new(role: Role, params: HandshakeParams, local_nonce: Nonce) -> Self {
        Self::with_config(role, params, local_nonce, SessionConfig::default())
    }

    pub fn with_config(role: Role, params: HandshakeParams, local_nonce: Nonce, config: SessionConfig) -> Self {
        Self {
            role,
            config,
            handshake: HandshakeRuntime::with_max_message_bytes(role, params, local_nonce, config.max_message_bytes),
            phase: Phase::Handshake,
            sid: None,
            post: Transcript::new(),
            last_seq: HashMap::new(),
            local_seq: config.post_handshake_seq_floor.saturating_sub(1),
            abort_info: None,
            keygen: KeygenState::default(),
            capsules: CapsuleState::default(),
            funding: funding::FundingBook::default(),
            exec: exec::ExecState::default(),
            adaptor: adaptor_phase::AdaptorState::default(),
            role_action: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sid(&self) -> Option<SessionId> {
        self.sid
    }

    pub fn abort_info(&self) -> Option<&AbortInfo> {
        self.abort_info.as_ref()
    }

    pub fn role_action(&self) -> Option<&str> {
        self.role_action.as_deref()
    }

    fn transcript_hash(&self) -> Hex32 {
        let mut combined = Transcript::new();
        for record in self.handshake.transcript().handshake_records() {
            combined.push_handshake(record.clone());
        }
        for record in self.post.post_records() {
            combined.push_post(record.clone());
        }
        combined.digest()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus { phase: self.phase.as_str().to_string(), sid: self.sid, transcript_hash: self.transcript_hash() }
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.local_seq += 1;
        self.local_seq
    }

    pub(crate) fn record_post(&mut self, msg: &Message) {
        self.post.push_post(TranscriptRecord {
            seq: msg.seq,
            from: msg.from,
            msg_type: msg.type_name().to_string(),
            payload: json!(msg.payload),
        });
    }

    pub(crate) fn send_self(&mut self, payload: Payload) -> Message {
        let seq = self.next_seq();
        let msg = Message::new(payload, self.role, seq, self.sid);
        self.record_post(&msg);
        msg
    }

    pub(crate) fn abort(&mut self, err: Error) -> Vec<Effect> {
        let info = AbortInfo { code: err.abort_code(), message: err.to_string() };
        error!(phase = self.phase.as_str(), code = %info.code, message = %info.message, "session aborting");
        self.phase = Phase::Aborted;
        self.abort_info = Some(info.clone());
        let abort_msg = self.send_self(Payload::Abort(crate::message::AbortPayload {
            code: info.code,
            message: info.message.clone(),
        }));
        vec![Effect::Send(abort_msg), Effect::Lifecycle(LifecycleEvent::Aborted { info })]
    }

    pub fn abort_manually(&mut self, message: impl Into<String>) -> Vec<Effect> {
        if self.phase == Phase::Aborted {
            return Vec::new();
        }
        self.abort(Error::Other(message.into()))
    }

    fn advance(&mut self, phase: Phase) -> Effect {
        debug!(from = self.phase.as_str(), to = phase.as_str(), "phase advance");
        self.phase = phase;
        Effect::phase_advanced(phase.as_str())
    }

    /// Starts the handshake: emits `hello`.
    pub fn start(&mut self) -> Vec<Effect> {
        self.handshake.start()
    }

    /// Validates the post-handshake envelope (spec.md §4.4): `sid` match,
    /// `seq` floor, monotonicity, idempotent duplicate detection. Returns
    /// `Ok(true)` if this is an exact duplicate to be silently ignored.
    fn check_post_envelope(&mut self, msg: &Message) -> Result<bool, Error> {
        let encoded_len = serde_json::to_vec(msg).map(|bytes| bytes.len()).unwrap_or(usize::MAX);
        if encoded_len > self.config.max_message_bytes {
            return Err(Error::MessageTooLarge);
        }
        if msg.sid != self.sid {
            return Err(Error::SidMismatch);
        }
        if msg.seq < self.config.post_handshake_seq_floor {
            return Err(Error::MalformedMessage("seq below post-handshake floor".into()));
        }
        if let Some(&last) = self.last_seq.get(&msg.from) {
            if msg.seq == last {
                let candidate = TranscriptRecord {
                    seq: msg.seq,
                    from: msg.from,
                    msg_type: msg.type_name().to_string(),
                    payload: json!(msg.payload),
                };
                return match self.post.find_post(msg.from, msg.seq) {
                    Some(existing) if existing == &candidate => Ok(true),
                    _ => Err(Error::MalformedMessage("duplicate seq with conflicting payload".into())),
                };
            } else if msg.seq < last {
                return Err(Error::NonMonotonicSeq);
            }
        }
        self.last_seq.insert(msg.from, msg.seq);
        Ok(false)
    }

    /// Consumes one inbound message. Dispatches to the handshake runtime
    /// pre-lock, or to the phase-specific handler post-lock.
    pub fn handle_message(&mut self, msg: Message) -> Vec<Effect> {
        if self.phase == Phase::Aborted {
            return Vec::new();
        }

        if self.phase == Phase::Handshake {
            let effects = self.handshake.handle_incoming(msg);
            return self.absorb_handshake_effects(effects);
        }

        if msg.from == self.role {
            return self.abort(Error::MalformedMessage("message claims own role as sender".into()));
        }

        match self.check_post_envelope(&msg) {
            Ok(true) => {
                warn!(phase = self.phase.as_str(), seq = msg.seq, "ignoring idempotent duplicate");
                return Vec::new();
            }
            Ok(false) => {}
            Err(e) => return self.abort(e),
        }

        self.dispatch_post(msg)
    }

    fn absorb_handshake_effects(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut out = Vec::with_capacity(effects.len());
        for effect in effects {
            if let Effect::Lifecycle(LifecycleEvent::Locked { sid }) = &effect {
                self.sid = Some(*sid);
                out.push(effect);
                out.push(self.advance(Phase::Locked));
                out.extend(self.enter_keygen());
                continue;
            }
            if let Effect::Lifecycle(LifecycleEvent::Aborted { info }) = &effect {
                self.phase = Phase::Aborted;
                self.abort_info = Some(info.clone());
            }
            out.push(effect);
        }
        out
    }

    /// On lock, each peer announces both legs' `MpcResult`, duplicating the
    /// deterministic computation it performs locally, so a single incoming
    /// announcement lets the listener reject any value that does not match
    /// its own expectation for either leg (spec.md §4.4 KEYGEN).
    fn enter_keygen(&mut self) -> Vec<Effect> {
        let sid = self.sid.expect("keygen only entered once locked");
        let mpc_a = expected_mpc_result(sid, Leg::A);
        let mpc_b = expected_mpc_result(sid, Leg::B);
        self.keygen.mpc_a = Some(mpc_a.clone());
        self.keygen.mpc_b = Some(mpc_b.clone());

        let mut effects = vec![self.advance(Phase::Keygen)];
        let msg = self.send_self(Payload::KeygenAnnounce(KeygenAnnouncePayload {
            mpc_a: Some(mpc_a),
            mpc_b: Some(mpc_b),
            note: None,
        }));
        effects.push(Effect::Send(msg));
        effects
    }

    fn dispatch_post(&mut self, msg: Message) -> Vec<Effect> {
        match (&msg.payload, self.phase) {
            // KEYGEN_COMPLETE is transient (entering it immediately cascades
            // into CAPSULES_EXCHANGE), so a resent `keygen_announce` at a new
            // seq is typically observed well past it; checked in any phase,
            // mirroring `abort`/`error`'s own any-phase handling below.
            (Payload::KeygenAnnounce(_), _) => self.handle_keygen_announce(msg),
            (Payload::CapsuleOffer(_), Phase::CapsulesExchange) => self.handle_capsule_offer(msg),
            (Payload::CapsuleAck(_), Phase::CapsulesExchange) => self.handle_capsule_ack(msg),
            (Payload::FundingTx(_), Phase::Funding) | (Payload::FundingTx(_), Phase::Funded) => {
                self.handle_funding_tx(msg)
            }
            (Payload::NonceReport(_), Phase::ExecPrep) => self.handle_nonce_report(msg),
            (Payload::FeeParams(_), Phase::ExecPrep) => self.handle_fee_params(msg),
            (Payload::FeeParamsAck(_), Phase::ExecPrep) => self.handle_fee_params_ack(msg),
            (Payload::TxTemplateCommit(_), Phase::ExecTemplatesBuilt)
            | (Payload::TxTemplateCommit(_), Phase::ExecTemplatesSync) => self.handle_tx_template_commit(msg),
            (Payload::TxTemplateAck(_), Phase::ExecTemplatesBuilt)
            | (Payload::TxTemplateAck(_), Phase::ExecTemplatesSync) => self.handle_tx_template_ack(msg),
            (Payload::AdaptorStart(_), Phase::AdaptorNegotiating) => self.handle_adaptor_start(msg),
            (Payload::AdaptorResp(_), Phase::AdaptorNegotiating) => self.handle_adaptor_resp(msg),
            (Payload::AdaptorAck(_), Phase::AdaptorNegotiating) => self.handle_adaptor_ack(msg),
            (Payload::TxBBroadcast(_), Phase::AdaptorNegotiating)
            | (Payload::TxBBroadcast(_), Phase::AdaptorReady)
            | (Payload::TxBBroadcast(_), Phase::ExecutionPlanned) => self.handle_tx_b_broadcast(msg),
            (Payload::TxABroadcast(_), Phase::ExecutionPlanned) => self.handle_tx_a_broadcast(msg),
            (Payload::Abort(payload), _) => {
                let info = AbortInfo { code: payload.code, message: payload.message.clone() };
                self.phase = Phase::Aborted;
                self.abort_info = Some(info.clone());
                vec![Effect::Lifecycle(LifecycleEvent::Aborted { info })]
            }
            (Payload::Error(_), _) => Vec::new(),
            (payload, phase) => self.abort(Error::Other(format!(
                "unexpected message type {:?} in phase {:?}",
                payload, phase
            ))),
        }
    }

    fn handle_keygen_announce(&mut self, msg: Message) -> Vec<Effect> {
        let payload = match &msg.payload {
            Payload::KeygenAnnounce(p) => p.clone(),
            _ => unreachable!(),
        };

        let sid = self.sid.expect("sid present once locked");

        let (mpc_a, mpc_b) = match (&payload.mpc_a, &payload.mpc_b) {
            (Some(a), Some(b)) => (a, b),
            _ => return self.abort(Error::MalformedMessage("keygen_announce missing a leg".into())),
        };
        // Any value differing from the deterministic expectation is a
        // protocol violation whether this is the peer's first announcement
        // or a later resend at a new seq (spec.md §4.4 KEYGEN); dispatch
        // routes `keygen_announce` here regardless of current phase, since
        // a resend can arrive well after the phase has advanced past
        // KEYGEN_COMPLETE, and it must still be checked rather than
        // silently mis-routed.
        if *mpc_a != expected_mpc_result(sid, Leg::A) || *mpc_b != expected_mpc_result(sid, Leg::B) {
            return self.abort(Error::ConflictingKeygenData);
        }

        self.record_post(&msg);

        if self.keygen.peer_confirmed {
            return Vec::new();
        }
        self.keygen.peer_confirmed = true;

        let mut effects = vec![self.advance(Phase::KeygenComplete)];
        effects.extend(self.enter_capsules_exchange());
        effects
    }

    fn enter_capsules_exchange(&mut self) -> Vec<Effect> {
        let sid = self.sid.expect("sid present once locked");
        let (role, refund_round) = self.local_capsule_role_and_round();
        let expected = crate::mock_crypto::expected_capsule(sid, role, refund_round);
        self.capsules.offered = true;
        let mut effects = vec![self.advance(Phase::CapsulesExchange)];
        let msg = self.send_self(Payload::CapsuleOffer(CapsuleOfferPayload {
            role,
            refund_round,
            y_share: expected.y_share,
            ct: expected.ct,
            proof: expected.proof,
        }));
        effects.push(Effect::Send(msg));
        effects
    }

    /// A offers the refund capsule for A's funds (`refund_A`,
    /// `refundRoundA`); B offers the mirror.
    fn local_capsule_role_and_round(&self) -> (CapsuleRole, u64) {
        match self.role {
            Role::Alice => (CapsuleRole::RefundA, self.handshake_params().refund_round_a),
            Role::Bob => (CapsuleRole::RefundB, self.handshake_params().refund_round_b),
        }
    }

    fn peer_capsule_role_and_round(&self) -> (CapsuleRole, u64) {
        match self.role {
            Role::Alice => (CapsuleRole::RefundB, self.handshake_params().refund_round_b),
            Role::Bob => (CapsuleRole::RefundA, self.handshake_params().refund_round_a),
        }
    }

    fn handshake_params(&self) -> &HandshakeParams {
        self.handshake.local_params()
    }

    fn handle_capsule_offer(&mut self, msg: Message) -> Vec<Effect> {
        let offer = match &msg.payload {
            Payload::CapsuleOffer(p) => p.clone(),
            _ => unreachable!(),
        };
        let sid = self.sid.expect("sid present once locked");
        let (expected_role, expected_round) = self.peer_capsule_role_and_round();

        self.record_post(&msg);

        match verify_capsule_offer(sid, expected_role, expected_round, &offer) {
            Ok(()) => {
                self.capsules.peer_ok = true;
                let ack = self.send_self(Payload::CapsuleAck(CapsuleAckPayload {
                    role: offer.role,
                    ok: true,
                    reason: None,
                }));
                let mut effects = vec![Effect::Send(ack)];
                effects.extend(self.maybe_enter_capsules_verified());
                effects
            }
            Err(reason) => {
                let ack = self.send_self(Payload::CapsuleAck(CapsuleAckPayload {
                    role: offer.role,
                    ok: false,
                    reason: Some(reason.clone()),
                }));
                let mut effects = vec![Effect::Send(ack)];
                effects.extend(self.abort(Error::CapsuleInvalid(reason)));
                effects
            }
        }
    }

    fn handle_capsule_ack(&mut self, msg: Message) -> Vec<Effect> {
        let ack = match &msg.payload {
            Payload::CapsuleAck(p) => p.clone(),
            _ => unreachable!(),
        };
        self.record_post(&msg);
        if !ack.ok {
            return self.abort(Error::CapsuleInvalid(ack.reason.unwrap_or_else(|| "peer rejected capsule".into())));
        }
        self.capsules.local_ok = true;
        self.maybe_enter_capsules_verified()
    }

    fn maybe_enter_capsules_verified(&mut self) -> Vec<Effect> {
        if self.capsules.local_ok && self.capsules.peer_ok {
            let mut effects = vec![self.advance(Phase::CapsulesVerified)];
            effects.extend(self.enter_funding());
            effects
        } else {
            Vec::new()
        }
    }

    fn enter_funding(&mut self) -> Vec<Effect> {
        vec![self.advance(Phase::Funding)]
    }
}
