//! Blocks, transactions and outputs as held by the ledger.
//!
//! Values here start out as raw chain data and are annotated during
//! classification (tx type, burnt fee, output flags). `reset` strips those
//! annotations again so a block can be handed to a lite node for re-parsing.

use serde::{Deserialize, Serialize};

use bsq_types::{Amount, BlockHash, BtcAddress, Timestamp, TxId, TxOutputKey, TxOutputType, TxType};

/// Locking script family of a Bitcoin output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    PubKey,
    PubKeyHash,
    ScriptHash,
    Multisig,
    NullData,
    WitnessV0KeyHash,
    WitnessV0ScriptHash,
    #[default]
    NonStandard,
}

/// Where and by whom a token output was consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentInfo {
    pub block_height: u32,
    pub tx_id: TxId,
    pub input_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// The output being spent.
    pub previous_output: TxOutputKey,
    /// Set once the input resolved against a spendable token output.
    pub connected_output: Option<TxOutputKey>,
}

impl TxInput {
    pub fn new(previous_output: TxOutputKey) -> Self {
        Self {
            previous_output,
            connected_output: None,
        }
    }

    pub fn reset(&mut self) {
        self.connected_output = None;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub index: u32,
    pub value: Amount,
    pub tx_id: TxId,
    pub block_height: u32,
    pub script_type: ScriptType,
    /// `None` for OP_RETURN outputs.
    pub address: Option<BtcAddress>,
    /// Raw OP_RETURN data, without the opcode.
    pub op_return_data: Option<Vec<u8>>,
    pub verified: bool,
    pub unspent: bool,
    pub output_type: TxOutputType,
    pub spent_info: Option<SpentInfo>,
}

impl TxOutput {
    pub fn key(&self) -> TxOutputKey {
        TxOutputKey::new(self.tx_id, self.index)
    }

    pub fn has_op_return(&self) -> bool {
        self.op_return_data.is_some()
    }

    /// Accept this output as a genuine token output.
    pub fn mark_verified(&mut self) {
        self.verified = true;
        self.unspent = true;
        self.output_type = TxOutputType::TokenOutput;
    }

    pub fn mark_spent(&mut self, info: SpentInfo) {
        self.unspent = false;
        self.spent_info = Some(info);
    }

    pub fn reset(&mut self) {
        self.verified = false;
        self.unspent = false;
        self.output_type = TxOutputType::Undefined;
        self.spent_info = None;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub id: TxId,
    pub block_height: u32,
    pub block_hash: BlockHash,
    pub time: Timestamp,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub tx_type: Option<TxType>,
    pub burnt_fee: Option<Amount>,
}

impl Tx {
    pub fn output(&self, index: u32) -> Option<&TxOutput> {
        self.outputs.get(index as usize)
    }

    pub fn output_mut(&mut self, index: u32) -> Option<&mut TxOutput> {
        self.outputs.get_mut(index as usize)
    }

    pub fn has_burnt_fee(&self) -> bool {
        self.burnt_fee.is_some_and(|fee| !fee.is_zero())
    }

    /// Value of all outputs currently accepted as token outputs.
    pub fn verified_output_value(&self) -> Amount {
        self.outputs
            .iter()
            .filter(|o| o.verified)
            .map(|o| o.value)
            .sum()
    }

    pub fn reset(&mut self) {
        self.tx_type = None;
        self.burnt_fee = None;
        self.inputs.iter_mut().for_each(TxInput::reset);
        self.outputs.iter_mut().for_each(TxOutput::reset);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u32,
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    /// Token-relevant transactions, in classification order.
    pub txs: Vec<Tx>,
}

impl Block {
    pub fn new(height: u32, hash: BlockHash, prev_hash: BlockHash) -> Self {
        Self {
            height,
            hash,
            prev_hash,
            txs: Vec::new(),
        }
    }

    /// Strip every classification annotation from the contained txs.
    pub fn reset(&mut self) {
        self.txs.iter_mut().for_each(Tx::reset);
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            height: self.height,
            hash: self.hash,
            prev_hash: self.prev_hash,
        }
    }
}

/// The identity of a block without its transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u32,
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
}
