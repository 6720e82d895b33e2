//! Commit-reveal adaptor signature mock (spec.md §4.4 ADAPTOR_NEGOTIATING,
//! §4.6).
//!
//! Every value here is a pure function of `(sid, digest, T)`, following the
//! same "both peers independently derive and compare" discipline as
//! [`crate::mock_crypto`]: Bob computes `adaptorSig` and sends it; Alice
//! recomputes the identical value herself rather than trusting the wire,
//! so a tampered byte is caught as a `PROTOCOL_ERROR`, not inferred from
//! the secret itself (which a real adaptor signature would never reveal
//! at this stage). A production implementation swaps every function here
//! for real randomized Schnorr/ECDSA adaptor signatures with explicit
//! commitment and proof exchange; only the interfaces are fixed.

use crate::hash::domain_hash;
use crate::hexbytes::{Hex32, Hex64};
use crate::session_id::SessionId;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AdaptorError {
    #[error("BAD_SECRET")]
    BadSecret,
    #[error("Mask commitment mismatch")]
    MaskCommitmentMismatch,
    #[error("Proposed secret does not match final signature")]
    SecretMismatch,
}

/// `T_leg = H(tag | sid | digest)`. `tag` is `"TA"` or `"TB"`.
pub fn compute_t(tag: &str, sid: SessionId, digest: Hex32) -> Hex32 {
    domain_hash(&[tag.as_bytes(), sid.as_bytes(), digest.as_bytes()])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presignature {
    pub adaptor_sig: Hex64,
    pub secret: Hex32,
    pub mask_salt: [u8; 32],
}

/// Deterministic presign: `n1 = T`, `n2 = H("n2" | sid | digest | T)`,
/// `maskSalt = H("salt" | sid | digest | T)`. Callable by either peer —
/// the listener recomputes it and compares rather than trusting the wire.
pub fn presign(sid: SessionId, digest: Hex32, t: Hex32) -> Presignature {
    let n2 = domain_hash(&[b"n2", sid.as_bytes(), digest.as_bytes(), t.as_bytes()]);
    let mask_salt = domain_hash(&[b"salt", sid.as_bytes(), digest.as_bytes(), t.as_bytes()]).0;

    let secret = adaptor_secret_leg(sid, digest, t, t.as_bytes(), n2.as_bytes());
    let mask_commit = domain_hash(&[b"c|", &mask_salt]);
    let mask = domain_hash(&[b"mask", sid.as_bytes(), digest.as_bytes(), t.as_bytes(), &mask_salt]);
    let masked_secret = xor32(secret.as_bytes(), mask.as_bytes());

    Presignature {
        adaptor_sig: Hex64::from_parts(*mask_commit.as_bytes(), masked_secret),
        secret,
        mask_salt,
    }
}

/// `secret = H("sec" | sid | digest | T | n1 | n2)`. `n1` is taken as `T`
/// per spec.md §4.4; this is the single seam a future implementation with
/// independent per-leg secrets would change (see the Open Question
/// decision recorded in DESIGN.md).
pub fn adaptor_secret_leg(sid: SessionId, digest: Hex32, t: Hex32, n1: &[u8; 32], n2: &[u8; 32]) -> Hex32 {
    domain_hash(&[b"sec", sid.as_bytes(), digest.as_bytes(), t.as_bytes(), n1, n2])
}

/// `complete(secret, maskSalt) -> finalSig`, where `finalSig = sigCore ‖
/// maskSalt` and `sigCore = H("sig" | sid | digest | secret)`.
pub fn complete(sid: SessionId, digest: Hex32, secret: Hex32, mask_salt: [u8; 32]) -> Hex64 {
    let sig_core = domain_hash(&[b"sig", sid.as_bytes(), digest.as_bytes(), secret.as_bytes()]);
    Hex64::from_parts(*sig_core.as_bytes(), mask_salt)
}

/// `extract(sid, digest, T, adaptorSig, finalSig) -> secret` per the
/// four-step contract in spec.md §4.6.
pub fn extract(sid: SessionId, digest: Hex32, t: Hex32, adaptor_sig: Hex64, final_sig: Hex64) -> Result<Hex32, AdaptorError> {
    let (mask_commit, masked_secret) = adaptor_sig.split();
    let (sig_core, mask_salt) = final_sig.split();

    if domain_hash(&[b"c|", &mask_salt]).0 != mask_commit {
        return Err(AdaptorError::MaskCommitmentMismatch);
    }

    let mask = domain_hash(&[b"mask", sid.as_bytes(), digest.as_bytes(), t.as_bytes(), &mask_salt]);
    let secret = xor32(&masked_secret, mask.as_bytes());

    let expected_core = domain_hash(&[b"sig", sid.as_bytes(), digest.as_bytes(), &secret]);
    if expected_core.0 != sig_core {
        return Err(AdaptorError::SecretMismatch);
    }

    Ok(Hex32::from_bytes(secret))
}

fn xor32(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = a[i] ^ b[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_t_is_deterministic_and_tag_sensitive() {
        let sid = SessionId([1; 32]);
        let digest = Hex32([2; 32]);
        assert_eq!(compute_t("TA", sid, digest), compute_t("TA", sid, digest));
        assert_ne!(compute_t("TA", sid, digest), compute_t("TB", sid, digest));
    }

    #[test]
    fn presign_is_independently_reproducible() {
        let sid = SessionId([3; 32]);
        let digest = Hex32([4; 32]);
        let t = compute_t("TB", sid, digest);
        assert_eq!(presign(sid, digest, t), presign(sid, digest, t));
    }

    #[test]
    fn presign_then_complete_then_extract_round_trips() {
        let sid = SessionId([3; 32]);
        let digest = Hex32([4; 32]);
        let t = compute_t("TB", sid, digest);
        let presig = presign(sid, digest, t);

        let final_sig = complete(sid, digest, presig.secret, presig.mask_salt);
        let extracted = extract(sid, digest, t, presig.adaptor_sig, final_sig).unwrap();
        assert_eq!(extracted, presig.secret);
    }

    #[test]
    fn extract_rejects_tampered_mask_salt() {
        let sid = SessionId([3; 32]);
        let digest = Hex32([4; 32]);
        let t = compute_t("TB", sid, digest);
        let presig = presign(sid, digest, t);

        let mut final_bytes = *complete(sid, digest, presig.secret, presig.mask_salt).as_bytes();
        final_bytes[63] ^= 0xff;
        let tampered_final = Hex64(final_bytes);

        assert_eq!(
            extract(sid, digest, t, presig.adaptor_sig, tampered_final),
            Err(AdaptorError::MaskCommitmentMismatch)
        );
    }

    #[test]
    fn a_tampered_adaptor_sig_byte_is_detectable_by_recomputation() {
        let sid = SessionId([3; 32]);
        let digest = Hex32([4; 32]);
        let t = compute_t("TB", sid, digest);
        let presig = presign(sid, digest, t);

        let mut tampered_bytes = *presig.adaptor_sig.as_bytes();
        tampered_bytes[40] ^= 0xff;
        let tampered = Hex64(tampered_bytes);

        assert_ne!(tampered, presig.adaptor_sig);
    }
}
