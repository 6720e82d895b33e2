//! Deterministic EIP-1559 transaction construction and signing-digest
//! computation (spec.md §4.5).

use crate::hash::keccak256;
use crate::hexbytes::{Address20, Hex32};
use rlp::RlpStream;
use serde::{Deserialize, Serialize};

pub const EIP1559_TX_TYPE: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub tx_type: u16,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address20,
    pub value: String,
    pub gas: String,
    #[serde(rename = "maxFeePerGas")]
    pub max_fee_per_gas: String,
    #[serde(rename = "maxPriorityFeePerGas")]
    pub max_priority_fee_per_gas: String,
    pub data: String,
    #[serde(rename = "accessList")]
    pub access_list: Vec<()>,
}

/// Everything the template builder needs to produce both legs at once
/// (spec.md §4.5 Input).
#[derive(Debug, Clone)]
pub struct TemplateInput {
    pub chain_id: u64,
    pub target_a: Address20,
    pub target_b: Address20,
    pub value_a: String,
    pub value_b: String,
    pub nonce_a: u64,
    pub nonce_b: u64,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub gas_limit: String,
}

#[derive(Debug, Clone)]
pub struct TemplateOutput {
    pub tx_a: Transaction,
    pub tx_b: Transaction,
    pub digest_a: Hex32,
    pub digest_b: Hex32,
}

fn build_leg(input: &TemplateInput, to: Address20, value: &str, nonce: u64) -> Transaction {
    Transaction {
        tx_type: 1559,
        chain_id: input.chain_id,
        nonce,
        to,
        value: value.to_string(),
        gas: input.gas_limit.clone(),
        max_fee_per_gas: input.max_fee_per_gas.clone(),
        max_priority_fee_per_gas: input.max_priority_fee_per_gas.clone(),
        data: "0x".to_string(),
        access_list: Vec::new(),
    }
}

/// `digestX = keccak-256(0x02 ‖ rlp([chainId, nonce, maxPriorityFeePerGas,
/// maxFeePerGas, gas, to, value, data, accessList]))`.
pub fn signing_digest(tx: &Transaction) -> Hex32 {
    let mut stream = RlpStream::new_list(9);
    stream.append(&tx.chain_id);
    stream.append(&tx.nonce);
    stream.append(&decimal_to_be_bytes(&tx.max_priority_fee_per_gas));
    stream.append(&decimal_to_be_bytes(&tx.max_fee_per_gas));
    stream.append(&decimal_to_be_bytes(&tx.gas));
    stream.append(&tx.to.as_bytes().as_ref());
    stream.append(&decimal_to_be_bytes(&tx.value));
    stream.append(&Vec::<u8>::new()); // data = 0x
    stream.begin_list(0); // accessList = []

    let mut bytes = Vec::with_capacity(1 + stream.as_raw().len());
    bytes.push(EIP1559_TX_TYPE);
    bytes.extend_from_slice(stream.as_raw());
    keccak256(&bytes)
}

/// Minimal-length big-endian encoding of a non-negative decimal string, the
/// form RLP requires for integers (no leading zero byte).
fn decimal_to_be_bytes(decimal: &str) -> Vec<u8> {
    let mut value: Vec<u8> = vec![0];
    for ch in decimal.bytes() {
        let digit = (ch - b'0') as u32;
        let mut carry = digit;
        for byte in value.iter_mut().rev() {
            let total = (*byte as u32) * 10 + carry;
            *byte = (total & 0xff) as u8;
            carry = total >> 8;
        }
        while carry > 0 {
            value.insert(0, (carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    while value.len() > 1 && value[0] == 0 {
        value.remove(0);
    }
    if value == [0] {
        Vec::new()
    } else {
        value
    }
}

pub fn build_templates(input: &TemplateInput) -> TemplateOutput {
    let tx_a = build_leg(input, input.target_b, &input.value_a, input.nonce_a);
    let tx_b = build_leg(input, input.target_a, &input.value_b, input.nonce_b);
    let digest_a = signing_digest(&tx_a);
    let digest_b = signing_digest(&tx_b);
    TemplateOutput { tx_a, tx_b, digest_a, digest_b }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> TemplateInput {
        TemplateInput {
            chain_id: 1,
            target_a: "0x1234567890123456789012345678901234567890".parse().unwrap(),
            target_b: "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd".parse().unwrap(),
            value_a: "1000000000000000000".to_string(),
            value_b: "2000000000000000000".to_string(),
            nonce_a: 0,
            nonce_b: 0,
            max_fee_per_gas: "20000000000".to_string(),
            max_priority_fee_per_gas: "1000000000".to_string(),
            gas_limit: "21000".to_string(),
        }
    }

    #[test]
    fn decimal_to_be_bytes_matches_known_values() {
        assert_eq!(decimal_to_be_bytes("0"), Vec::<u8>::new());
        assert_eq!(decimal_to_be_bytes("255"), vec![0xff]);
        assert_eq!(decimal_to_be_bytes("256"), vec![0x01, 0x00]);
        assert_eq!(decimal_to_be_bytes("21000"), vec![0x52, 0x08]);
    }

    #[test]
    fn templates_are_deterministic_given_identical_inputs() {
        let a = build_templates(&sample_input());
        let b = build_templates(&sample_input());
        assert_eq!(a.digest_a, b.digest_a);
        assert_eq!(a.digest_b, b.digest_b);
    }

    #[test]
    fn tx_a_targets_b_and_tx_b_targets_a() {
        let input = sample_input();
        let out = build_templates(&input);
        assert_eq!(out.tx_a.to, input.target_b);
        assert_eq!(out.tx_b.to, input.target_a);
        assert_eq!(out.tx_a.value, input.value_a);
        assert_eq!(out.tx_b.value, input.value_b);
    }

    #[test]
    fn digests_differ_between_legs() {
        let out = build_templates(&sample_input());
        assert_ne!(out.digest_a, out.digest_b);
    }

    #[test]
    fn data_field_is_always_empty() {
        let out = build_templates(&sample_input());
        assert_eq!(out.tx_a.data, "0x");
        assert_eq!(out.tx_b.data, "0x");
    }
}
