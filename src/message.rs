//! Wire message envelope and payload vocabulary (spec.md §6).
//!
//! An adjacently-tagged enum (`type` / `payload`) keyed into each variant's
//! struct, rather than a per-type struct-plus-`From`/`TryFrom` ladder —
//! the simpler enum-of-struct-variants shape common to gossip/relay
//! message types.

use crate::error::AbortCode;
use crate::hexbytes::{Address20, Hex32, Hex64};
use crate::params::HandshakeParams;
use crate::role::Role;
use crate::session_id::{Nonce, SessionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Leg {
    A,
    B,
}

impl Leg {
    pub fn as_str(self) -> &'static str {
        match self {
            Leg::A => "A",
            Leg::B => "B",
        }
    }
}

/// The deterministic, per-peer keygen output (spec.md §3 `KeyMaterial`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpcResult {
    pub address: Address20,
    pub commitments: MpcCommitments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpcCommitments {
    pub local: Hex32,
    pub peer: Hex32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    pub handshake: HandshakeParams,
    pub nonce: Nonce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloAckPayload {
    pub handshake: HandshakeParams,
    pub nonce: Nonce,
    #[serde(rename = "handshakeHash", skip_serializing_if = "Option::is_none")]
    pub handshake_hash: Option<Hex32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeygenAnnouncePayload {
    #[serde(rename = "mpcA", skip_serializing_if = "Option::is_none")]
    pub mpc_a: Option<MpcResult>,
    #[serde(rename = "mpcB", skip_serializing_if = "Option::is_none")]
    pub mpc_b: Option<MpcResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapsuleRole {
    RefundA,
    RefundB,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleOfferPayload {
    pub role: CapsuleRole,
    #[serde(rename = "refundRound")]
    pub refund_round: u64,
    #[serde(rename = "yShare")]
    pub y_share: Hex32,
    pub ct: Hex32,
    pub proof: Hex32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleAckPayload {
    pub role: CapsuleRole,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingTxPayload {
    pub which: Leg,
    #[serde(rename = "txHash")]
    pub tx_hash: Hex32,
    #[serde(rename = "fromAddress")]
    pub from_address: Address20,
    #[serde(rename = "toAddress")]
    pub to_address: Address20,
    #[serde(rename = "valueWei")]
    pub value_wei: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceReportPayload {
    #[serde(rename = "mpcAliceNonce")]
    pub mpc_alice_nonce: String,
    #[serde(rename = "mpcBobNonce")]
    pub mpc_bob_nonce: String,
    #[serde(rename = "blockNumber")]
    pub block_number: u64,
    #[serde(rename = "rpcTag")]
    pub rpc_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParamsPayload {
    #[serde(rename = "maxFeePerGasWei")]
    pub max_fee_per_gas_wei: String,
    #[serde(rename = "maxPriorityFeePerGasWei")]
    pub max_priority_fee_per_gas_wei: String,
    #[serde(rename = "gasLimit")]
    pub gas_limit: String,
    pub mode: FeeMode,
    pub proposer: AliceOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeMode {
    Fixed,
}

/// A unit type that only ever serializes/deserializes as `"alice"`,
/// enforcing at the type level that `fee_params.proposer` names Alice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliceOnly;

impl Serialize for AliceOnly {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("alice")
    }
}

impl<'de> Deserialize<'de> for AliceOnly {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "alice" {
            Ok(AliceOnly)
        } else {
            Err(serde::de::Error::custom("proposer must be \"alice\""))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParamsAckPayload {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "feeParamsHash")]
    pub fee_params_hash: Hex32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTemplateCommitPayload {
    #[serde(rename = "digestA")]
    pub digest_a: Hex32,
    #[serde(rename = "digestB")]
    pub digest_b: Hex32,
    #[serde(rename = "commitHash")]
    pub commit_hash: Hex32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTemplateAckPayload {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "commitHash")]
    pub commit_hash: Hex32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptorMode {
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptorStartPayload {
    pub which: Leg,
    pub digest: Hex32,
    #[serde(rename = "T")]
    pub t: Hex32,
    pub mode: AdaptorMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptorRespPayload {
    pub which: Leg,
    pub digest: Hex32,
    #[serde(rename = "T")]
    pub t: Hex32,
    #[serde(rename = "adaptorSig")]
    pub adaptor_sig: Hex64,
    pub mode: AdaptorMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptorAckPayload {
    pub which: Leg,
    pub ok: bool,
    pub digest: Hex32,
    #[serde(rename = "T")]
    pub t: Hex32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBroadcastPayload {
    #[serde(rename = "txHash")]
    pub tx_hash: Hex32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortPayload {
    pub code: AbortCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: AbortCode,
    pub message: String,
}

/// Every protocol message type and its payload, adjacently tagged by
/// `type`/`payload` per spec.md §6's envelope shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Payload {
    #[serde(rename = "hello")]
    Hello(HelloPayload),
    #[serde(rename = "hello_ack")]
    HelloAck(HelloAckPayload),
    #[serde(rename = "keygen_announce")]
    KeygenAnnounce(KeygenAnnouncePayload),
    #[serde(rename = "capsule_offer")]
    CapsuleOffer(CapsuleOfferPayload),
    #[serde(rename = "capsule_ack")]
    CapsuleAck(CapsuleAckPayload),
    #[serde(rename = "funding_tx")]
    FundingTx(FundingTxPayload),
    #[serde(rename = "nonce_report")]
    NonceReport(NonceReportPayload),
    #[serde(rename = "fee_params")]
    FeeParams(FeeParamsPayload),
    #[serde(rename = "fee_params_ack")]
    FeeParamsAck(FeeParamsAckPayload),
    #[serde(rename = "tx_template_commit")]
    TxTemplateCommit(TxTemplateCommitPayload),
    #[serde(rename = "tx_template_ack")]
    TxTemplateAck(TxTemplateAckPayload),
    #[serde(rename = "adaptor_start")]
    AdaptorStart(AdaptorStartPayload),
    #[serde(rename = "adaptor_resp")]
    AdaptorResp(AdaptorRespPayload),
    #[serde(rename = "adaptor_ack")]
    AdaptorAck(AdaptorAckPayload),
    #[serde(rename = "txB_broadcast")]
    TxBBroadcast(TxBroadcastPayload),
    #[serde(rename = "txA_broadcast")]
    TxABroadcast(TxBroadcastPayload),
    #[serde(rename = "abort")]
    Abort(AbortPayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl Payload {
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Hello(_) => "hello",
            Payload::HelloAck(_) => "hello_ack",
            Payload::KeygenAnnounce(_) => "keygen_announce",
            Payload::CapsuleOffer(_) => "capsule_offer",
            Payload::CapsuleAck(_) => "capsule_ack",
            Payload::FundingTx(_) => "funding_tx",
            Payload::NonceReport(_) => "nonce_report",
            Payload::FeeParams(_) => "fee_params",
            Payload::FeeParamsAck(_) => "fee_params_ack",
            Payload::TxTemplateCommit(_) => "tx_template_commit",
            Payload::TxTemplateAck(_) => "tx_template_ack",
            Payload::AdaptorStart(_) => "adaptor_start",
            Payload::AdaptorResp(_) => "adaptor_resp",
            Payload::AdaptorAck(_) => "adaptor_ack",
            Payload::TxBBroadcast(_) => "txB_broadcast",
            Payload::TxABroadcast(_) => "txA_broadcast",
            Payload::Abort(_) => "abort",
            Payload::Error(_) => "error",
        }
    }
}

/// `{type, from, seq, sid?, payload}` (spec.md §6). `type`/`payload` are
/// carried by the flattened [`Payload`] tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub payload: Payload,
    pub from: Role,
    pub seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<SessionId>,
}

impl Message {
    pub fn new(payload: Payload, from: Role, seq: u64, sid: Option<SessionId>) -> Self {
        Self { payload, from, seq, sid }
    }

    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }
}
