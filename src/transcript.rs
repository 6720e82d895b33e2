//! Accepted-message transcript and its digest (spec.md §4.2).
//!
//! Records are appended in acceptance order into two buckets: the
//! handshake (pre-lock) transcript and the post-handshake transcript. The
//! post-handshake digest sorts by `(from, seq, type)` before hashing so
//! that cross-sender reordering in transit never perturbs it; the
//! handshake digest keeps insertion order since pre-lock exchange is a
//! fixed two-message dance.

use crate::canonical::canonical_hash;
use crate::hexbytes::Hex32;
use crate::role::Role;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptRecord {
    pub seq: u64,
    pub from: Role,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    handshake: Vec<TranscriptRecord>,
    post: Vec<TranscriptRecord>,
}

#[derive(Serialize)]
struct CombinedDigestInput {
    h: Hex32,
    p: Hex32,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this exact `(from, seq, type, payload)` record was
    /// already accepted into the handshake bucket (idempotency check).
    pub fn handshake_contains(&self, record: &TranscriptRecord) -> bool {
        self.handshake.iter().any(|r| r == record)
    }

    pub fn post_contains(&self, record: &TranscriptRecord) -> bool {
        self.post.iter().any(|r| r == record)
    }

    /// Finds a previously accepted post-handshake record by `(from, seq)`,
    /// used to distinguish an idempotent duplicate delivery from a
    /// conflicting resend of the same sequence number.
    pub fn find_post(&self, from: Role, seq: u64) -> Option<&TranscriptRecord> {
        self.post.iter().find(|r| r.from == from && r.seq == seq)
    }

    pub fn handshake_records(&self) -> &[TranscriptRecord] {
        &self.handshake
    }

    pub fn post_records(&self) -> &[TranscriptRecord] {
        &self.post
    }

    pub fn push_handshake(&mut self, record: TranscriptRecord) {
        if !self.handshake_contains(&record) {
            self.handshake.push(record);
        }
    }

    pub fn push_post(&mut self, record: TranscriptRecord) {
        if !self.post_contains(&record) {
            self.post.push(record);
        }
    }

    fn handshake_digest(&self) -> Hex32 {
        canonical_hash(&self.handshake).expect("transcript records always canonicalize")
    }

    fn post_digest(&self) -> Hex32 {
        let mut sorted = self.post.clone();
        sorted.sort_by(|a, b| (a.from.as_str(), a.seq, &a.msg_type).cmp(&(b.from.as_str(), b.seq, &b.msg_type)));
        canonical_hash(&sorted).expect("transcript records always canonicalize")
    }

    /// `SHA-256(canonical({h: H(handshake), p: H(post)}))`.
    pub fn digest(&self) -> Hex32 {
        let input = CombinedDigestInput {
            h: self.handshake_digest(),
            p: self.post_digest(),
        };
        canonical_hash(&input).expect("digest pair always canonicalizes")
    }
}
