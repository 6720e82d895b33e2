//! FUNDING phase: `emitFundingTx`, `notifyFundingConfirmed`, and inbound
//! `funding_tx` handling (spec.md §4.4 FUNDING).

use super::{Phase, SessionRuntime};
use crate::bigdec;
use crate::effects::Effect;
use crate::error::Error;
use crate::hexbytes::{Address20, Hex32};
use crate::message::{FundingTxPayload, Leg, Message, Payload};

#[derive(Debug, Clone, Default)]
pub(crate) struct FundingLeg {
    pub tx: Option<FundingTxPayload>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FundingBook {
    pub a: FundingLeg,
    pub b: FundingLeg,
}

impl FundingBook {
    fn leg(&self, which: Leg) -> &FundingLeg {
        match which {
            Leg::A => &self.a,
            Leg::B => &self.b,
        }
    }

    fn leg_mut(&mut self, which: Leg) -> &mut FundingLeg {
        match which {
            Leg::A => &mut self.a,
            Leg::B => &mut self.b,
        }
    }

    fn both_ready(&self) -> bool {
        self.a.tx.is_some() && self.a.confirmed && self.b.tx.is_some() && self.b.confirmed
    }
}

impl SessionRuntime {
    /// A peer only ever emits the leg matching its own role; any
    /// caller-supplied `which` would be discarded, so the parameter is not
    /// exposed at all.
    fn own_funding_leg(&self) -> Leg {
        match self.role {
            crate::role::Role::Alice => Leg::A,
            crate::role::Role::Bob => Leg::B,
        }
    }

    pub fn emit_funding_tx(
        &mut self,
        tx_hash: Hex32,
        from_address: Address20,
        to_address: Address20,
        value_wei: String,
    ) -> Vec<Effect> {
        if self.phase != Phase::Funding {
            return Vec::new();
        }
        let which = self.own_funding_leg();
        let payload = FundingTxPayload { which, tx_hash, from_address, to_address, value_wei };
        self.funding.leg_mut(which).tx = Some(payload.clone());
        let msg = self.send_self(Payload::FundingTx(payload));
        vec![Effect::Send(msg)]
    }

    /// Registers the chain collaborator's confirmation for `which` leg.
    pub fn notify_funding_confirmed(&mut self, which: Leg) -> Vec<Effect> {
        if self.phase != Phase::Funding {
            return Vec::new();
        }
        self.funding.leg_mut(which).confirmed = true;
        self.maybe_enter_funded()
    }

    fn maybe_enter_funded(&mut self) -> Vec<Effect> {
        if self.funding.both_ready() {
            let mut effects = vec![self.advance(Phase::Funded)];
            effects.extend(self.enter_exec_prep());
            effects
        } else {
            Vec::new()
        }
    }

    pub(crate) fn handle_funding_tx(&mut self, msg: Message) -> Vec<Effect> {
        let payload = match &msg.payload {
            Payload::FundingTx(p) => p.clone(),
            _ => unreachable!(),
        };

        let expected_which = match msg.from {
            crate::role::Role::Alice => Leg::A,
            crate::role::Role::Bob => Leg::B,
        };
        if payload.which != expected_which {
            return self.abort(Error::FundingLegMismatch);
        }

        let expected_value = match payload.which {
            Leg::A => &self.handshake_params().value_a,
            Leg::B => &self.handshake_params().value_b,
        };
        if !bigdec::ge(&payload.value_wei, expected_value) {
            return self.abort(Error::InsufficientFundingValue);
        }

        self.record_post(&msg);

        if let Some(existing) = self.funding.leg(payload.which).tx.clone() {
            if existing != payload {
                return self.abort(Error::FundingLegMismatch);
            }
            return Vec::new();
        }

        self.funding.leg_mut(payload.which).tx = Some(payload);
        self.maybe_enter_funded()
    }
}
