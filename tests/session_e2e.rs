//! Two-party integration harness driving a pair of `SessionRuntime`s against
//! each other through an in-memory relay, covering the seed end-to-end
//! scenarios (spec.md §8).

use std::collections::VecDeque;
use voidswap_session::{
    random_nonce, AbortCode, Effect, FundingTxPayload, HandshakeParams, Hex32, Hex64, Leg, Message,
    Payload, Phase, Role, SessionRuntime,
};

const HANDSHAKE_VERSION: &str = "voidswap-v1";

fn sample_params() -> HandshakeParams {
    HandshakeParams {
        version: HANDSHAKE_VERSION.to_string(),
        chain_id: 1,
        drand_chain_id: "fastnet".to_string(),
        value_a: "1000000000000000000".to_string(),
        value_b: "2000000000000000000".to_string(),
        target_a: "0x1111111111111111111111111111111111111111".parse().unwrap(),
        target_b: "0x2222222222222222222222222222222222222222".parse().unwrap(),
        refund_round_b: 1000,
        refund_round_a: 2000,
    }
}

fn new_pair(params_alice: HandshakeParams, params_bob: HandshakeParams) -> (SessionRuntime, SessionRuntime) {
    let alice = SessionRuntime::new(Role::Alice, params_alice, random_nonce());
    let bob = SessionRuntime::new(Role::Bob, params_bob, random_nonce());
    (alice, bob)
}

/// Routes every `Effect::Send` in `seed` (and everything it provokes) to
/// whichever runtime is the message's addressee, until no `Send` effects
/// remain. Non-`Send` effects are dropped; callers inspect runtime state
/// (`phase()`, `abort_info()`, `status()`) afterward instead.
fn pump(alice: &mut SessionRuntime, bob: &mut SessionRuntime, seed: Vec<Effect>) {
    let mut queue: VecDeque<Effect> = seed.into_iter().collect();
    while let Some(effect) = queue.pop_front() {
        if let Effect::Send(msg) = effect {
            let target = match msg.from {
                Role::Alice => &mut *bob,
                Role::Bob => &mut *alice,
            };
            queue.extend(target.handle_message(msg));
        }
    }
}

fn drive_to_funding(alice: &mut SessionRuntime, bob: &mut SessionRuntime) {
    let a0 = alice.start();
    let b0 = bob.start();
    pump(alice, bob, a0);
    pump(alice, bob, b0);
}

fn fund_and_confirm(alice: &mut SessionRuntime, bob: &mut SessionRuntime) {
    let a_fund = alice.emit_funding_tx(
        Hex32([0xa1; 32]),
        "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap(),
        sample_params().target_b,
        sample_params().value_a,
    );
    pump(alice, bob, a_fund);
    let b_fund = bob.emit_funding_tx(
        Hex32([0xb1; 32]),
        "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap(),
        sample_params().target_a,
        sample_params().value_b,
    );
    pump(alice, bob, b_fund);

    for effects in [
        alice.notify_funding_confirmed(Leg::A),
        alice.notify_funding_confirmed(Leg::B),
        bob.notify_funding_confirmed(Leg::A),
        bob.notify_funding_confirmed(Leg::B),
    ] {
        pump(alice, bob, effects);
    }
}

fn agree_nonces(alice: &mut SessionRuntime, bob: &mut SessionRuntime, alice_nonce: &str, bob_nonce: &str) {
    let a_nonce = alice.set_local_nonce_report(alice_nonce.to_string(), bob_nonce.to_string(), 100, "latest".to_string());
    pump(alice, bob, a_nonce);
    let b_nonce = bob.set_local_nonce_report(alice_nonce.to_string(), bob_nonce.to_string(), 100, "latest".to_string());
    pump(alice, bob, b_nonce);
}

/// Drives both peers from a fresh handshake all the way through
/// `EXECUTION_PLANNED`'s entry (fee proposal triggers the template build,
/// commit/ack exchange, and the full adaptor negotiation in one cascade).
fn drive_to_execution_planned(alice: &mut SessionRuntime, bob: &mut SessionRuntime) {
    drive_to_funding(alice, bob);
    fund_and_confirm(alice, bob);
    agree_nonces(alice, bob, "3", "7");
    let fee = alice.propose_fee_params("30000000000".to_string(), "2000000000".to_string(), "21000".to_string());
    pump(alice, bob, fee);
}

#[test]
fn happy_path_reaches_execution_planned_with_matching_transcripts() {
    let (mut alice, mut bob) = new_pair(sample_params(), sample_params());
    drive_to_funding(&mut alice, &mut bob);
    assert_eq!(alice.phase(), Phase::Funding);
    assert_eq!(bob.phase(), Phase::Funding);
    assert!(alice.sid().is_some());
    assert_eq!(alice.sid(), bob.sid());

    fund_and_confirm(&mut alice, &mut bob);
    assert_eq!(alice.phase(), Phase::ExecPrep);
    assert_eq!(bob.phase(), Phase::ExecPrep);

    agree_nonces(&mut alice, &mut bob, "3", "7");
    let fee = alice.propose_fee_params("30000000000".to_string(), "2000000000".to_string(), "21000".to_string());
    pump(&mut alice, &mut bob, fee);

    assert_eq!(alice.phase(), Phase::ExecutionPlanned);
    assert_eq!(bob.phase(), Phase::ExecutionPlanned);
    assert_eq!(alice.role_action(), Some("broadcast_tx_B"));
    assert_eq!(bob.role_action(), Some("wait_tx_B_then_extract_then_broadcast_tx_A"));

    let bcast_b = alice.broadcast_tx_b(Hex32([0xcc; 32]));
    pump(&mut alice, &mut bob, bcast_b);
    assert_eq!(bob.role_action(), Some("broadcast_tx_A"));

    let bcast_a = bob.broadcast_tx_a(Hex32([0xdd; 32]));
    pump(&mut alice, &mut bob, bcast_a);
    assert_eq!(bob.role_action(), None);

    assert_eq!(alice.status().transcript_hash, bob.status().transcript_hash);
}

#[test]
fn parameter_mismatch_aborts_both_peers_with_protocol_error() {
    let mut tampered = sample_params();
    tampered.value_a = "999999999999999999".to_string();
    let (mut alice, mut bob) = new_pair(sample_params(), tampered);
    drive_to_funding(&mut alice, &mut bob);

    assert_eq!(alice.phase(), Phase::Aborted);
    assert_eq!(bob.phase(), Phase::Aborted);
    assert_eq!(alice.abort_info().unwrap().code, AbortCode::ProtocolError);
}

#[test]
fn duplicate_funding_tx_is_idempotent_but_conflicting_resend_aborts() {
    let (mut alice, mut bob) = new_pair(sample_params(), sample_params());
    drive_to_funding(&mut alice, &mut bob);

    let tx_hash = Hex32([0xa1; 32]);
    let from = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap();
    let to = sample_params().target_b;
    let value = sample_params().value_a;

    let out = alice.emit_funding_tx(tx_hash, from, to, value.clone());
    pump(&mut alice, &mut bob, out);
    assert_eq!(bob.phase(), Phase::Funding);

    // Re-deliver the exact same (from, seq, payload): an idempotent
    // duplicate, silently ignored.
    let duplicate = Message::new(
        Payload::FundingTx(FundingTxPayload {
            which: Leg::A,
            tx_hash,
            from_address: from,
            to_address: to,
            value_wei: value.clone(),
        }),
        Role::Alice,
        100,
        alice.sid(),
    );
    let effects = bob.handle_message(duplicate);
    assert!(effects.is_empty());
    assert_eq!(bob.phase(), Phase::Funding);
    assert!(bob.abort_info().is_none());

    // A different seq carrying a conflicting value for the same leg is a
    // protocol violation.
    let conflicting = Message::new(
        Payload::FundingTx(FundingTxPayload {
            which: Leg::A,
            tx_hash: Hex32([0xee; 32]),
            from_address: from,
            to_address: to,
            value_wei: value,
        }),
        Role::Alice,
        101,
        alice.sid(),
    );
    bob.handle_message(conflicting);
    assert_eq!(bob.phase(), Phase::Aborted);
    assert_eq!(bob.abort_info().unwrap().code, AbortCode::ProtocolError);
}

#[test]
fn nonce_mismatch_after_funded_aborts_with_protocol_error() {
    let (mut alice, mut bob) = new_pair(sample_params(), sample_params());
    drive_to_funding(&mut alice, &mut bob);
    fund_and_confirm(&mut alice, &mut bob);
    assert_eq!(alice.phase(), Phase::ExecPrep);

    let a_nonce = alice.set_local_nonce_report("3".to_string(), "7".to_string(), 100, "latest".to_string());
    pump(&mut alice, &mut bob, a_nonce);
    let b_nonce = bob.set_local_nonce_report("4".to_string(), "7".to_string(), 100, "latest".to_string());
    pump(&mut alice, &mut bob, b_nonce);

    assert_eq!(alice.phase(), Phase::Aborted);
    assert_eq!(alice.abort_info().unwrap().code, AbortCode::ProtocolError);
}

#[test]
fn tampered_adaptor_signature_is_rejected() {
    let (mut alice, mut bob) = new_pair(sample_params(), sample_params());
    drive_to_funding(&mut alice, &mut bob);
    fund_and_confirm(&mut alice, &mut bob);
    agree_nonces(&mut alice, &mut bob, "3", "7");

    let fee = alice.propose_fee_params("30000000000".to_string(), "2000000000".to_string(), "21000".to_string());

    // Drain manually so the first `adaptor_resp` (Bob -> Alice, leg B) can
    // be tampered with before delivery instead of relayed verbatim.
    let mut queue: VecDeque<Effect> = fee.into_iter().collect();
    let mut tampered_once = false;
    while let Some(effect) = queue.pop_front() {
        let msg = match effect {
            Effect::Send(msg) => msg,
            _ => continue,
        };
        if !tampered_once && msg.from == Role::Bob {
            if let Payload::AdaptorResp(mut resp) = msg.payload.clone() {
                let mut bytes = *resp.adaptor_sig.as_bytes();
                bytes[0] ^= 0xff;
                resp.adaptor_sig = Hex64::from_bytes(bytes);
                tampered_once = true;
                let tampered = Message::new(Payload::AdaptorResp(resp), msg.from, msg.seq, msg.sid);
                queue.extend(alice.handle_message(tampered));
                continue;
            }
        }
        let target = match msg.from {
            Role::Alice => &mut bob,
            Role::Bob => &mut alice,
        };
        queue.extend(target.handle_message(msg));
    }

    assert!(tampered_once, "expected an adaptor_resp from Bob to intercept");
    assert_eq!(alice.phase(), Phase::Aborted);
    assert_eq!(alice.abort_info().unwrap().code, AbortCode::ProtocolError);
}

#[test]
fn duplicate_keygen_announce_is_idempotent_but_conflicting_resend_aborts() {
    let (mut alice, mut bob) = new_pair(sample_params(), sample_params());
    let a0 = alice.start();
    let b0 = bob.start();

    // Drain the handshake/keygen/.../funding cascade manually so the
    // keygen_announce Bob accepted from Alice can be captured and replayed.
    let mut queue: VecDeque<Effect> = a0.into_iter().chain(b0).collect();
    let mut captured: Option<Message> = None;
    while let Some(effect) = queue.pop_front() {
        let msg = match effect {
            Effect::Send(msg) => msg,
            _ => continue,
        };
        if captured.is_none() && msg.from == Role::Alice && matches!(msg.payload, Payload::KeygenAnnounce(_)) {
            captured = Some(msg.clone());
        }
        let target = match msg.from {
            Role::Alice => &mut bob,
            Role::Bob => &mut alice,
        };
        queue.extend(target.handle_message(msg));
    }

    assert_eq!(bob.phase(), Phase::Funding);
    let original = captured.expect("expected Alice's keygen_announce to have been relayed");

    // Exact duplicate of the already-accepted announcement: idempotent, ignored.
    let effects = bob.handle_message(original.clone());
    assert!(effects.is_empty());
    assert_eq!(bob.phase(), Phase::Funding);
    assert!(bob.abort_info().is_none());

    // Same sender, next seq, but a mutated MPC value: a protocol violation,
    // not a replay.
    let mut conflicting = original;
    conflicting.seq += 1;
    if let Payload::KeygenAnnounce(ref mut payload) = conflicting.payload {
        let leg = payload.mpc_a.as_mut().expect("keygen_announce carries both legs");
        leg.commitments.local = Hex32([0xff; 32]);
    }
    bob.handle_message(conflicting);
    assert_eq!(bob.phase(), Phase::Aborted);
    assert_eq!(bob.abort_info().unwrap().code, AbortCode::ProtocolError);
    assert!(bob.abort_info().unwrap().message.contains("Conflicting keygen data"));
}

#[test]
fn transcript_digest_is_bit_identical_across_peers_through_execution_planned() {
    let (mut alice, mut bob) = new_pair(sample_params(), sample_params());
    drive_to_execution_planned(&mut alice, &mut bob);
    assert_eq!(alice.phase(), Phase::ExecutionPlanned);
    assert_eq!(bob.phase(), Phase::ExecutionPlanned);
    assert_eq!(alice.status().transcript_hash, bob.status().transcript_hash);
}
