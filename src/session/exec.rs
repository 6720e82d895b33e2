//! EXEC_PREP through EXEC_TEMPLATES_READY: nonce agreement, fee proposal,
//! and deterministic transaction-template derivation (spec.md §4.4 EXEC_PREP
//! / EXEC_TEMPLATES_SYNC, §4.5).

use super::{Phase, SessionRuntime};
use crate::canonical::canonical_hash;
use crate::effects::Effect;
use crate::error::Error;
use crate::hexbytes::Hex32;
use crate::message::{
    FeeMode, FeeParamsAckPayload, FeeParamsPayload, Message, NonceReportPayload, Payload,
    TxTemplateAckPayload, TxTemplateCommitPayload,
};
use crate::role::Role;
use crate::transaction::{build_templates, TemplateInput, TemplateOutput};
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub(crate) struct ExecState {
    pub local_nonce_report: Option<NonceReportPayload>,
    pub peer_nonce_report: Option<NonceReportPayload>,
    pub nonces_agree: bool,
    pub fee_params: Option<FeeParamsPayload>,
    pub fee_params_hash: Option<Hex32>,
    pub fee_ack_verified: bool,
    pub templates: Option<TemplateOutput>,
    pub local_commit_hash: Option<Hex32>,
    pub local_ack_received: bool,
}

#[derive(Serialize)]
struct DigestPair {
    #[serde(rename = "digestA")]
    digest_a: Hex32,
    #[serde(rename = "digestB")]
    digest_b: Hex32,
}

impl SessionRuntime {
    pub(crate) fn enter_exec_prep(&mut self) -> Vec<Effect> {
        vec![self.advance(Phase::ExecPrep)]
    }

    pub fn set_local_nonce_report(
        &mut self,
        mpc_alice_nonce: String,
        mpc_bob_nonce: String,
        block_number: u64,
        rpc_tag: String,
    ) -> Vec<Effect> {
        if self.phase != Phase::ExecPrep {
            return Vec::new();
        }
        let payload = NonceReportPayload { mpc_alice_nonce, mpc_bob_nonce, block_number, rpc_tag };
        self.exec.local_nonce_report = Some(payload.clone());
        let msg = self.send_self(Payload::NonceReport(payload));
        let mut effects = vec![Effect::Send(msg)];
        effects.extend(self.maybe_check_nonce_agreement());
        effects
    }

    fn maybe_check_nonce_agreement(&mut self) -> Vec<Effect> {
        let (local, peer) = match (&self.exec.local_nonce_report, &self.exec.peer_nonce_report) {
            (Some(l), Some(p)) => (l.clone(), p.clone()),
            _ => return Vec::new(),
        };
        if local.mpc_alice_nonce != peer.mpc_alice_nonce || local.mpc_bob_nonce != peer.mpc_bob_nonce {
            return self.abort(Error::NonceMismatch);
        }
        self.exec.nonces_agree = true;
        self.maybe_advance_exec_ready()
    }

    pub(crate) fn handle_nonce_report(&mut self, msg: Message) -> Vec<Effect> {
        let payload = match &msg.payload {
            Payload::NonceReport(p) => p.clone(),
            _ => unreachable!(),
        };
        self.record_post(&msg);
        self.exec.peer_nonce_report = Some(payload);
        self.maybe_check_nonce_agreement()
    }

    /// Only Alice may propose fee parameters (spec.md §4.4 EXEC_PREP).
    pub fn propose_fee_params(
        &mut self,
        max_fee_per_gas_wei: String,
        max_priority_fee_per_gas_wei: String,
        gas_limit: String,
    ) -> Vec<Effect> {
        if self.role != Role::Alice || self.phase != Phase::ExecPrep {
            return Vec::new();
        }
        let payload = FeeParamsPayload {
            max_fee_per_gas_wei,
            max_priority_fee_per_gas_wei,
            gas_limit,
            mode: FeeMode::Fixed,
            proposer: crate::message::AliceOnly,
        };
        let hash = canonical_hash(&payload).expect("fee params always canonicalize");
        self.exec.fee_params = Some(payload.clone());
        self.exec.fee_params_hash = Some(hash);
        let msg = self.send_self(Payload::FeeParams(payload));
        vec![Effect::Send(msg)]
    }

    pub(crate) fn handle_fee_params(&mut self, msg: Message) -> Vec<Effect> {
        if msg.from != Role::Alice {
            return self.abort(Error::UnexpectedRole);
        }
        let payload = match &msg.payload {
            Payload::FeeParams(p) => p.clone(),
            _ => unreachable!(),
        };
        self.record_post(&msg);
        let hash = canonical_hash(&payload).expect("fee params always canonicalize");
        self.exec.fee_params = Some(payload);
        self.exec.fee_params_hash = Some(hash);
        let ack = self.send_self(Payload::FeeParamsAck(FeeParamsAckPayload {
            ok: true,
            reason: None,
            fee_params_hash: hash,
        }));
        // Bob has no ack of his own to verify; receiving and accepting
        // Alice's proposal is his half of the "fee ack verifies" gate.
        self.exec.fee_ack_verified = true;
        let mut effects = vec![Effect::Send(ack)];
        effects.extend(self.maybe_advance_exec_ready());
        effects
    }

    pub(crate) fn handle_fee_params_ack(&mut self, msg: Message) -> Vec<Effect> {
        if msg.from != Role::Bob {
            return self.abort(Error::UnexpectedRole);
        }
        let ack = match &msg.payload {
            Payload::FeeParamsAck(p) => p.clone(),
            _ => unreachable!(),
        };
        self.record_post(&msg);
        let expected = self.exec.fee_params_hash;
        if !ack.ok || Some(ack.fee_params_hash) != expected {
            return self.abort(Error::TemplateDigestMismatch);
        }
        self.exec.fee_ack_verified = true;
        self.maybe_advance_exec_ready()
    }

    fn maybe_advance_exec_ready(&mut self) -> Vec<Effect> {
        if self.phase != Phase::ExecPrep || !self.exec.nonces_agree || !self.exec.fee_ack_verified {
            return Vec::new();
        }
        let mut effects = vec![self.advance(Phase::ExecReady)];
        effects.extend(self.build_templates_and_commit());
        effects
    }

    fn build_templates_and_commit(&mut self) -> Vec<Effect> {
        let params = self.handshake_params().clone();
        let fee = self.exec.fee_params.clone().expect("fee params present once acked");
        let nonce_report = self.exec.local_nonce_report.clone().expect("nonce report present once agreed");
        let nonce_a: u64 = nonce_report.mpc_alice_nonce.parse().unwrap_or(0);
        let nonce_b: u64 = nonce_report.mpc_bob_nonce.parse().unwrap_or(0);

        let input = TemplateInput {
            chain_id: params.chain_id,
            target_a: params.target_a,
            target_b: params.target_b,
            value_a: params.value_a.clone(),
            value_b: params.value_b.clone(),
            nonce_a,
            nonce_b,
            max_fee_per_gas: fee.max_fee_per_gas_wei.clone(),
            max_priority_fee_per_gas: fee.max_priority_fee_per_gas_wei.clone(),
            gas_limit: fee.gas_limit.clone(),
        };
        let templates = build_templates(&input);
        let commit_hash = canonical_hash(&DigestPair { digest_a: templates.digest_a, digest_b: templates.digest_b })
            .expect("digest pair always canonicalizes");

        self.exec.local_commit_hash = Some(commit_hash);
        let digest_a = templates.digest_a;
        let digest_b = templates.digest_b;
        self.exec.templates = Some(templates);

        let mut effects = vec![self.advance(Phase::ExecTemplatesBuilt)];
        let msg = self.send_self(Payload::TxTemplateCommit(TxTemplateCommitPayload {
            digest_a,
            digest_b,
            commit_hash,
        }));
        effects.push(Effect::Send(msg));
        effects.push(self.advance(Phase::ExecTemplatesSync));
        effects
    }

    pub(crate) fn handle_tx_template_commit(&mut self, msg: Message) -> Vec<Effect> {
        let payload = match &msg.payload {
            Payload::TxTemplateCommit(p) => p.clone(),
            _ => unreachable!(),
        };

        let recomputed =
            canonical_hash(&DigestPair { digest_a: payload.digest_a, digest_b: payload.digest_b })
                .expect("digest pair always canonicalizes");

        let templates = self.exec.templates.clone();
        let matches = recomputed == payload.commit_hash
            && templates
                .as_ref()
                .map(|t| t.digest_a == payload.digest_a && t.digest_b == payload.digest_b)
                .unwrap_or(false);

        self.record_post(&msg);

        if !matches {
            return self.abort(Error::TemplateDigestMismatch);
        }

        let ack = self.send_self(Payload::TxTemplateAck(TxTemplateAckPayload {
            ok: true,
            reason: None,
            commit_hash: payload.commit_hash,
        }));
        vec![Effect::Send(ack)]
    }

    pub(crate) fn handle_tx_template_ack(&mut self, msg: Message) -> Vec<Effect> {
        let ack = match &msg.payload {
            Payload::TxTemplateAck(p) => p.clone(),
            _ => unreachable!(),
        };
        self.record_post(&msg);

        let expected = self.exec.local_commit_hash;
        if !ack.ok || Some(ack.commit_hash) != expected {
            return self.abort(Error::TemplateDigestMismatch);
        }
        if self.exec.local_ack_received {
            return Vec::new();
        }
        self.exec.local_ack_received = true;

        let mut effects = vec![self.advance(Phase::ExecTemplatesReady)];
        effects.extend(self.enter_adaptor_negotiating());
        effects
    }
}
