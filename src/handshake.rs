//! Phase-1 state machine: parameter agreement and session-id lock
//! (spec.md §4.3).

use crate::effects::{AbortInfo, Effect, LifecycleEvent};
use crate::error::{AbortCode, Error};
use crate::message::{HelloAckPayload, HelloPayload, Message, Payload};
use crate::params::HandshakeParams;
use crate::role::Role;
use crate::session_id::{compute_sid, Nonce, SessionId};
use crate::transcript::{Transcript, TranscriptRecord};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    SentHello,
    GotPeerHello,
    SentAck,
    Locked,
    Aborted,
}

pub struct HandshakeRuntime {
    role: Role,
    local_params: HandshakeParams,
    local_nonce: Nonce,
    state: HandshakeState,
    local_seq: u64,
    last_peer_seq: Option<u64>,
    seen_peer_hello: bool,
    seen_peer_ack: bool,
    sent_local_ack: bool,
    peer_nonce: Option<Nonce>,
    transcript: Transcript,
    abort_info: Option<AbortInfo>,
    max_message_bytes: usize,
}

impl HandshakeRuntime {
    pub fn new(role: Role, local_params: HandshakeParams, local_nonce: Nonce) -> Self {
        Self::with_max_message_bytes(role, local_params, local_nonce, crate::params::DEFAULT_MAX_MESSAGE_BYTES)
    }

    pub fn with_max_message_bytes(
        role: Role,
        local_params: HandshakeParams,
        local_nonce: Nonce,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            role,
            local_params,
            local_nonce,
            state: HandshakeState::Init,
            local_seq: 0,
            last_peer_seq: None,
            seen_peer_hello: false,
            seen_peer_ack: false,
            sent_local_ack: false,
            peer_nonce: None,
            transcript: Transcript::new(),
            abort_info: None,
            max_message_bytes,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn abort_info(&self) -> Option<&AbortInfo> {
        self.abort_info.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn local_params(&self) -> &HandshakeParams {
        &self.local_params
    }

    fn next_local_seq(&mut self) -> u64 {
        self.local_seq += 1;
        self.local_seq
    }

    fn record_local(&mut self, msg: &Message) {
        self.transcript.push_handshake(TranscriptRecord {
            seq: msg.seq,
            from: msg.from,
            msg_type: msg.type_name().to_string(),
            payload: json!(msg.payload),
        });
    }

    fn record_peer(&mut self, msg: &Message) {
        self.transcript.push_handshake(TranscriptRecord {
            seq: msg.seq,
            from: msg.from,
            msg_type: msg.type_name().to_string(),
            payload: json!(msg.payload),
        });
    }

    fn abort(&mut self, error: Error) -> Vec<Effect> {
        let info = AbortInfo { code: error.abort_code(), message: error.to_string() };
        self.state = HandshakeState::Aborted;
        self.abort_info = Some(info.clone());
        vec![
            Effect::send(Message::new(
                Payload::Abort(crate::message::AbortPayload {
                    code: info.code,
                    message: info.message.clone(),
                }),
                self.role,
                self.next_local_seq(),
                None,
            )),
            Effect::Lifecycle(LifecycleEvent::Aborted { info }),
        ]
    }

    /// Emits the initial `hello`.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state != HandshakeState::Init {
            return Vec::new();
        }
        let msg = Message::new(
            Payload::Hello(HelloPayload { handshake: self.local_params.clone(), nonce: self.local_nonce }),
            self.role,
            self.next_local_seq(),
            None,
        );
        self.record_local(&msg);
        self.state = HandshakeState::SentHello;
        vec![Effect::send(msg)]
    }

    pub fn handle_incoming(&mut self, msg: Message) -> Vec<Effect> {
        if self.state == HandshakeState::Aborted || self.state == HandshakeState::Locked {
            return Vec::new();
        }

        let encoded_len = serde_json::to_vec(&msg).map(|bytes| bytes.len()).unwrap_or(usize::MAX);
        if encoded_len > self.max_message_bytes {
            return self.abort(Error::MessageTooLarge);
        }

        if msg.from == self.role {
            return self.abort(Error::MalformedMessage("message claims own role as sender".into()));
        }
        if msg.from != self.role.peer() {
            return self.abort(Error::UnexpectedRole);
        }
        if let Some(last) = self.last_peer_seq {
            if msg.seq <= last {
                return self.abort(Error::NonMonotonicSeq);
            }
        }
        if msg.sid.is_some() {
            return self.abort(Error::SidPresentBeforeLock);
        }

        let (peer_params, peer_nonce, is_ack) = match &msg.payload {
            Payload::Hello(HelloPayload { handshake, nonce }) => (handshake.clone(), *nonce, false),
            Payload::HelloAck(HelloAckPayload { handshake, nonce, .. }) => (handshake.clone(), *nonce, true),
            _ => {
                return self.abort(Error::MalformedMessage(format!(
                    "unexpected message type {:?} before lock",
                    msg.type_name()
                )))
            }
        };

        if peer_params != self.local_params {
            return self.abort(Error::HandshakeParamsMismatch);
        }

        self.last_peer_seq = Some(msg.seq);
        self.record_peer(&msg);
        self.peer_nonce = Some(peer_nonce);
        self.seen_peer_hello = true;
        if is_ack {
            self.seen_peer_ack = true;
        }
        if self.state == HandshakeState::SentHello {
            self.state = HandshakeState::GotPeerHello;
        }

        let mut effects = Vec::new();

        if !self.sent_local_ack {
            let ack = Message::new(
                Payload::HelloAck(HelloAckPayload {
                    handshake: self.local_params.clone(),
                    nonce: self.local_nonce,
                    handshake_hash: None,
                }),
                self.role,
                self.next_local_seq(),
                None,
            );
            self.record_local(&ack);
            self.sent_local_ack = true;
            self.state = HandshakeState::SentAck;
            effects.push(Effect::send(ack));
        }

        if self.local_params != peer_params {
            return self.abort(Error::HandshakeParamsMismatch);
        }

        if self.seen_peer_hello && self.seen_peer_ack && self.sent_local_ack {
            let sid = self.lock_sid();
            self.state = HandshakeState::Locked;
            effects.push(Effect::Lifecycle(LifecycleEvent::Locked { sid }));
        }

        effects
    }

    fn lock_sid(&self) -> SessionId {
        let peer_nonce = self.peer_nonce.expect("lock only reached once peer nonce is known");
        let (nonce_alice, nonce_bob) = match self.role {
            Role::Alice => (self.local_nonce, peer_nonce),
            Role::Bob => (peer_nonce, self.local_nonce),
        };
        compute_sid(&self.local_params, nonce_alice, nonce_bob)
    }

    pub fn abort_manually(&mut self, message: impl Into<String>) -> Vec<Effect> {
        self.abort(Error::Other(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> HandshakeParams {
        HandshakeParams {
            version: crate::params::HANDSHAKE_VERSION.to_string(),
            chain_id: 1,
            drand_chain_id: "fastnet".to_string(),
            value_a: "1000000000000000000".to_string(),
            value_b: "2000000000000000000".to_string(),
            target_a: "0x1234567890123456789012345678901234567890".parse().unwrap(),
            target_b: "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd".parse().unwrap(),
            refund_round_b: 1000,
            refund_round_a: 2000,
        }
    }

    fn locks_both_peers(params_a: HandshakeParams, params_b: HandshakeParams) -> (HandshakeRuntime, HandshakeRuntime) {
        let nonce_a = Nonce([0xaa; 32]);
        let nonce_b = Nonce([0xbb; 32]);
        let mut alice = HandshakeRuntime::new(Role::Alice, params_a, nonce_a);
        let mut bob = HandshakeRuntime::new(Role::Bob, params_b, nonce_b);

        let mut alice_out = alice.start();
        let mut bob_out = bob.start();

        // Drain until both lock or abort, relaying Send effects to the peer.
        for _ in 0..8 {
            let mut next_alice_out = Vec::new();
            for effect in bob_out.drain(..) {
                if let Effect::Send(msg) = effect {
                    next_alice_out.extend(alice.handle_incoming(msg));
                }
            }
            let mut next_bob_out = Vec::new();
            for effect in alice_out.drain(..) {
                if let Effect::Send(msg) = effect {
                    next_bob_out.extend(bob.handle_incoming(msg));
                }
            }
            alice_out = next_alice_out;
            bob_out = next_bob_out;
            if alice.state() != HandshakeState::SentHello && bob.state() != HandshakeState::SentHello {
                // keep pumping until no more Send effects are produced
            }
            if matches!(alice.state(), HandshakeState::Locked | HandshakeState::Aborted)
                && matches!(bob.state(), HandshakeState::Locked | HandshakeState::Aborted)
            {
                break;
            }
        }

        (alice, bob)
    }

    #[test]
    fn matching_params_lock_both_peers_to_the_same_sid() {
        let (alice, bob) = locks_both_peers(sample_params(), sample_params());
        assert_eq!(alice.state(), HandshakeState::Locked);
        assert_eq!(bob.state(), HandshakeState::Locked);
    }

    #[test]
    fn mismatched_params_abort_with_protocol_error() {
        let mut tampered = sample_params();
        tampered.value_a = "999999999999999999".to_string();
        let (alice, bob) = locks_both_peers(sample_params(), tampered);
        assert_eq!(alice.state(), HandshakeState::Aborted);
        assert_eq!(bob.state(), HandshakeState::Aborted);
        assert_eq!(
            alice.abort_info().unwrap().message,
            "Handshake params mismatch"
        );
    }

    #[test]
    fn replaying_own_role_is_rejected() {
        let mut runtime = HandshakeRuntime::new(Role::Alice, sample_params(), Nonce([1; 32]));
        runtime.start();
        let spoofed = Message::new(
            Payload::Hello(HelloPayload { handshake: sample_params(), nonce: Nonce([2; 32]) }),
            Role::Alice,
            1,
            None,
        );
        let effects = runtime.handle_incoming(spoofed);
        assert_eq!(runtime.state(), HandshakeState::Aborted);
        assert!(!effects.is_empty());
    }

    #[test]
    fn sid_present_before_lock_is_rejected() {
        let mut runtime = HandshakeRuntime::new(Role::Alice, sample_params(), Nonce([1; 32]));
        runtime.start();
        let bad = Message::new(
            Payload::Hello(HelloPayload { handshake: sample_params(), nonce: Nonce([2; 32]) }),
            Role::Bob,
            1,
            Some(SessionId([0; 32])),
        );
        runtime.handle_incoming(bad);
        assert_eq!(runtime.state(), HandshakeState::Aborted);
    }
}
