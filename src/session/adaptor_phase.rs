//! ADAPTOR_NEGOTIATING and EXECUTION_PLANNED: the commit-reveal adaptor
//! signature dance and the two broadcasts it unlocks (spec.md §4.4).

use super::{Phase, SessionRuntime};
use crate::adaptor::{self, compute_t, Presignature};
use crate::effects::Effect;
use crate::error::Error;
use crate::hexbytes::Hex32;
use crate::message::{
    AdaptorAckPayload, AdaptorMode, AdaptorRespPayload, AdaptorStartPayload, Leg, Message, Payload,
    TxBroadcastPayload,
};
use crate::role::Role;

#[derive(Debug, Clone, Default)]
pub(crate) struct LegAdaptor {
    pub t: Option<Hex32>,
    pub presig: Option<Presignature>,
    pub resp_received: bool,
    pub acked: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AdaptorState {
    pub a: LegAdaptor,
    pub b: LegAdaptor,
    pub secret: Option<Hex32>,
    pub tx_b_broadcast: Option<Hex32>,
    pub tx_a_broadcast: Option<Hex32>,
}

impl AdaptorState {
    fn leg(&self, which: Leg) -> &LegAdaptor {
        match which {
            Leg::A => &self.a,
            Leg::B => &self.b,
        }
    }

    fn leg_mut(&mut self, which: Leg) -> &mut LegAdaptor {
        match which {
            Leg::A => &mut self.a,
            Leg::B => &mut self.b,
        }
    }
}

impl SessionRuntime {
    /// Alice emits `adaptor_start` for leg B then leg A, in that order
    /// (spec.md §4.4 ADAPTOR_NEGOTIATING); Bob waits.
    pub(crate) fn enter_adaptor_negotiating(&mut self) -> Vec<Effect> {
        let mut effects = vec![self.advance(Phase::AdaptorNegotiating)];
        if self.role != Role::Alice {
            return effects;
        }
        let sid = self.sid.expect("sid present once locked");
        let templates = self.exec.templates.clone().expect("templates built before adaptor negotiation");

        let t_b = compute_t("TB", sid, templates.digest_b);
        self.adaptor.b.t = Some(t_b);
        let start_b = self.send_self(Payload::AdaptorStart(AdaptorStartPayload {
            which: Leg::B,
            digest: templates.digest_b,
            t: t_b,
            mode: AdaptorMode::Mock,
        }));
        effects.push(Effect::Send(start_b));

        let t_a = compute_t("TA", sid, templates.digest_a);
        self.adaptor.a.t = Some(t_a);
        let start_a = self.send_self(Payload::AdaptorStart(AdaptorStartPayload {
            which: Leg::A,
            digest: templates.digest_a,
            t: t_a,
            mode: AdaptorMode::Mock,
        }));
        effects.push(Effect::Send(start_a));

        effects
    }

    fn local_digest(&self, which: Leg) -> Hex32 {
        let templates = self.exec.templates.as_ref().expect("templates built before adaptor negotiation");
        match which {
            Leg::A => templates.digest_a,
            Leg::B => templates.digest_b,
        }
    }

    pub(crate) fn handle_adaptor_start(&mut self, msg: Message) -> Vec<Effect> {
        if msg.from != Role::Alice {
            return self.abort(Error::UnexpectedRole);
        }
        let payload = match &msg.payload {
            Payload::AdaptorStart(p) => p.clone(),
            _ => unreachable!(),
        };
        if payload.digest != self.local_digest(payload.which) {
            return self.abort(Error::TemplateDigestMismatch);
        }

        self.record_post(&msg);

        let sid = self.sid.expect("sid present once locked");
        let presig = adaptor::presign(sid, payload.digest, payload.t);
        self.adaptor.leg_mut(payload.which).t = Some(payload.t);
        self.adaptor.leg_mut(payload.which).presig = Some(presig);

        let resp = self.send_self(Payload::AdaptorResp(AdaptorRespPayload {
            which: payload.which,
            digest: payload.digest,
            t: payload.t,
            adaptor_sig: presig.adaptor_sig,
            mode: AdaptorMode::Mock,
        }));
        vec![Effect::Send(resp)]
    }

    pub(crate) fn handle_adaptor_resp(&mut self, msg: Message) -> Vec<Effect> {
        if msg.from != Role::Bob {
            return self.abort(Error::UnexpectedRole);
        }
        let payload = match &msg.payload {
            Payload::AdaptorResp(p) => p.clone(),
            _ => unreachable!(),
        };

        let sid = self.sid.expect("sid present once locked");
        let recomputed = adaptor::presign(sid, payload.digest, payload.t);
        if recomputed.adaptor_sig != payload.adaptor_sig {
            self.record_post(&msg);
            return self.abort(Error::InvalidAdaptorSig(payload.which.as_str().to_string()));
        }

        self.record_post(&msg);
        let leg = self.adaptor.leg_mut(payload.which);
        leg.t = Some(payload.t);
        leg.presig = Some(recomputed);
        leg.resp_received = true;

        let ack = self.send_self(Payload::AdaptorAck(AdaptorAckPayload {
            which: payload.which,
            ok: true,
            digest: payload.digest,
            t: payload.t,
            reason: None,
        }));
        let mut effects = vec![Effect::Send(ack)];
        effects.extend(self.maybe_alice_ready());
        effects
    }

    pub(crate) fn handle_adaptor_ack(&mut self, msg: Message) -> Vec<Effect> {
        if msg.from != Role::Alice {
            return self.abort(Error::UnexpectedRole);
        }
        let payload = match &msg.payload {
            Payload::AdaptorAck(p) => p.clone(),
            _ => unreachable!(),
        };
        self.record_post(&msg);
        if !payload.ok || self.adaptor.leg(payload.which).t != Some(payload.t) {
            return self.abort(Error::InvalidAdaptorSig(payload.which.as_str().to_string()));
        }
        self.adaptor.leg_mut(payload.which).acked = true;
        self.maybe_bob_ready()
    }

    fn maybe_alice_ready(&mut self) -> Vec<Effect> {
        if self.role != Role::Alice || !self.adaptor.a.resp_received || !self.adaptor.b.resp_received {
            return Vec::new();
        }
        let mut effects = vec![self.advance(Phase::AdaptorReady)];
        effects.push(self.advance(Phase::ExecutionPlanned));
        self.role_action = Some("broadcast_tx_B".to_string());
        effects
    }

    fn maybe_bob_ready(&mut self) -> Vec<Effect> {
        if self.role != Role::Bob || !self.adaptor.a.acked || !self.adaptor.b.acked {
            return Vec::new();
        }
        let mut effects = vec![self.advance(Phase::AdaptorReady)];
        effects.push(self.advance(Phase::ExecutionPlanned));
        self.role_action = Some("wait_tx_B_then_extract_then_broadcast_tx_A".to_string());
        effects
    }

    /// Alice's only externally-triggered action in `EXECUTION_PLANNED`: she
    /// reports the chain collaborator's broadcast result for `tx_B`.
    pub fn broadcast_tx_b(&mut self, tx_hash: Hex32) -> Vec<Effect> {
        if self.role != Role::Alice
            || self.phase != Phase::ExecutionPlanned
            || self.role_action.as_deref() != Some("broadcast_tx_B")
        {
            return Vec::new();
        }
        self.adaptor.tx_b_broadcast = Some(tx_hash);
        self.role_action = None;
        let msg = self.send_self(Payload::TxBBroadcast(TxBroadcastPayload { tx_hash }));
        vec![Effect::Send(msg)]
    }

    /// Bob's broadcast of `tx_A`, once the swap secret has been extracted
    /// from `tx_B`'s published signature (here: recomputed deterministically,
    /// since the mock's secret is a pure function of already-known inputs).
    pub fn broadcast_tx_a(&mut self, tx_hash: Hex32) -> Vec<Effect> {
        if self.role != Role::Bob || self.phase != Phase::ExecutionPlanned || self.adaptor.secret.is_none() {
            return Vec::new();
        }
        self.adaptor.tx_a_broadcast = Some(tx_hash);
        self.role_action = None;
        let msg = self.send_self(Payload::TxABroadcast(TxBroadcastPayload { tx_hash }));
        vec![Effect::Send(msg)]
    }

    pub(crate) fn handle_tx_b_broadcast(&mut self, msg: Message) -> Vec<Effect> {
        if msg.from != Role::Alice {
            return self.abort(Error::UnexpectedRole);
        }
        let payload = match &msg.payload {
            Payload::TxBBroadcast(p) => p.clone(),
            _ => unreachable!(),
        };
        if let Some(existing) = self.adaptor.tx_b_broadcast {
            if existing == payload.tx_hash {
                return Vec::new();
            }
            return self.abort(Error::Other("conflicting txB_broadcast".into()));
        }
        self.record_post(&msg);
        self.adaptor.tx_b_broadcast = Some(payload.tx_hash);

        if self.role != Role::Bob {
            return Vec::new();
        }

        let sid = self.sid.expect("sid present once locked");
        let digest_b = self.local_digest(Leg::B);
        let t_b = self.adaptor.b.t.expect("bob holds T_B from his own presign");
        let presig_b = self.adaptor.b.presig.expect("bob holds his own presign for leg B");
        let final_sig = adaptor::complete(sid, digest_b, presig_b.secret, presig_b.mask_salt);
        let secret = match adaptor::extract(sid, digest_b, t_b, presig_b.adaptor_sig, final_sig) {
            Ok(s) => s,
            Err(_) => return self.abort(Error::InvalidAdaptorSig("B".to_string())),
        };
        self.adaptor.secret = Some(secret);
        self.role_action = Some("broadcast_tx_A".to_string());
        Vec::new()
    }

    pub(crate) fn handle_tx_a_broadcast(&mut self, msg: Message) -> Vec<Effect> {
        if msg.from != Role::Bob {
            return self.abort(Error::UnexpectedRole);
        }
        let payload = match &msg.payload {
            Payload::TxABroadcast(p) => p.clone(),
            _ => unreachable!(),
        };
        if let Some(existing) = self.adaptor.tx_a_broadcast {
            if existing == payload.tx_hash {
                return Vec::new();
            }
            return self.abort(Error::Other("conflicting txA_broadcast".into()));
        }
        self.record_post(&msg);
        self.adaptor.tx_a_broadcast = Some(payload.tx_hash);
        Vec::new()
    }
}
