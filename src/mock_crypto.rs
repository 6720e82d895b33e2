//! Deterministic stand-ins for the real secp256k1 MPC keygen and
//! timelock/capsule cryptography (spec.md §4.4 KEYGEN / CAPSULES_EXCHANGE,
//! §9 "Deterministic mock cryptography").
//!
//! Every value here is a pure function of `(sid, leg, ...)` so both peers
//! can independently recompute and compare rather than trust what arrives
//! on the wire. A production implementation swaps these functions for a
//! real DKG and timelock-encrypted capsule scheme without touching the
//! session runtime.

use crate::hash::domain_hash;
use crate::hexbytes::{Address20, Hex32};
use crate::message::{CapsuleOfferPayload, CapsuleRole, Leg, MpcCommitments, MpcResult};
use crate::session_id::SessionId;

fn leg_tag(leg: Leg) -> &'static [u8] {
    match leg {
        Leg::A => b"A",
        Leg::B => b"B",
    }
}

fn capsule_role_tag(role: CapsuleRole) -> &'static [u8] {
    match role {
        CapsuleRole::RefundA => b"refund_A",
        CapsuleRole::RefundB => b"refund_B",
    }
}

/// The deterministic `MpcResult` for the given leg under `sid`.
pub fn expected_mpc_result(sid: SessionId, leg: Leg) -> MpcResult {
    let addr_hash = domain_hash(&[b"mpc-address", sid.as_bytes(), leg_tag(leg)]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&addr_hash.as_bytes()[..20]);

    let local = domain_hash(&[b"mpc-local", sid.as_bytes(), leg_tag(leg)]);
    let peer = domain_hash(&[b"mpc-peer", sid.as_bytes(), leg_tag(leg)]);

    MpcResult {
        address: Address20::from_bytes(address),
        commitments: MpcCommitments { local, peer },
    }
}

/// The deterministic capsule components the offering peer must send and
/// the listener must verify against (spec.md §4.4 CAPSULES_EXCHANGE).
pub struct ExpectedCapsule {
    pub y_share: Hex32,
    pub ct: Hex32,
    pub proof: Hex32,
}

pub fn expected_capsule(sid: SessionId, role: CapsuleRole, refund_round: u64) -> ExpectedCapsule {
    let round_bytes = refund_round.to_be_bytes();
    let y_share = domain_hash(&[b"yshare", sid.as_bytes(), capsule_role_tag(role), &round_bytes]);
    let ct = domain_hash(&[b"ct", sid.as_bytes(), capsule_role_tag(role), &round_bytes]);
    let proof = domain_hash(&[
        b"proof",
        sid.as_bytes(),
        capsule_role_tag(role),
        &round_bytes,
        y_share.as_bytes(),
        ct.as_bytes(),
    ]);
    ExpectedCapsule { y_share, ct, proof }
}

/// Verifies an incoming `capsule_offer` against the deterministic
/// expectation, in the order spec.md §4.4 lists: role, refund round,
/// `yShare`, `ct`, then the proof. Returns the `capsule_ack` failure reason
/// text on the first mismatch.
pub fn verify_capsule_offer(
    sid: SessionId,
    expected_role: CapsuleRole,
    expected_refund_round: u64,
    offer: &CapsuleOfferPayload,
) -> Result<(), String> {
    if offer.role != expected_role {
        return Err("unexpected capsule role".to_string());
    }
    if offer.refund_round != expected_refund_round {
        return Err("refund round does not match agreed parameters".to_string());
    }
    let expected = expected_capsule(sid, offer.role, offer.refund_round);
    if offer.y_share != expected.y_share {
        return Err("yShare does not match expected commitment".to_string());
    }
    if offer.ct != expected.ct {
        return Err("ct does not match expected ciphertext".to_string());
    }
    if offer.proof != expected.proof {
        return Err("capsule proof does not verify".to_string());
    }
    Ok(())
}
