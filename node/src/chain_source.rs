//! The raw-chain boundary.
//!
//! Parsing consumes blocks and transactions through [`RawChainSource`]. The
//! trait is synchronous: the orchestrator only calls it from its blocking
//! worker, never while a ledger lock is held.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bsq_ledger::{ScriptType, Tx, TxInput, TxOutput};
use bsq_types::{Amount, BlockHash, BtcAddress, Timestamp, TxId, TxOutputKey, TxOutputType};

#[derive(Debug, Error)]
pub enum ChainSourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("no block at height {0}")]
    BlockNotFound(u32),

    #[error("transaction {0} not found")]
    TxNotFound(TxId),

    #[error("malformed chain data: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A block as the chain source reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub height: u32,
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    pub tx_ids: Vec<TxId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTxOutput {
    pub value: Amount,
    #[serde(default)]
    pub script_type: ScriptType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<BtcAddress>,
    /// OP_RETURN data, hex encoded in JSON.
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Option::is_none")]
    pub op_return: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTx {
    pub id: TxId,
    pub inputs: Vec<TxOutputKey>,
    pub outputs: Vec<RawTxOutput>,
    #[serde(default)]
    pub time: Timestamp,
}

impl RawTx {
    /// An unclassified ledger tx placed in the given block.
    pub fn into_tx(self, height: u32, block_hash: BlockHash) -> Tx {
        let id = self.id;
        Tx {
            id,
            block_height: height,
            block_hash,
            time: self.time,
            inputs: self.inputs.into_iter().map(TxInput::new).collect(),
            outputs: self
                .outputs
                .into_iter()
                .enumerate()
                .map(|(index, out)| TxOutput {
                    index: index as u32,
                    value: out.value,
                    tx_id: id,
                    block_height: height,
                    script_type: out.script_type,
                    address: out.address,
                    op_return_data: out.op_return,
                    verified: false,
                    unspent: false,
                    output_type: TxOutputType::Undefined,
                    spent_info: None,
                })
                .collect(),
            tx_type: None,
            burnt_fee: None,
        }
    }
}

/// Read access to the base chain.
pub trait RawChainSource: Send + Sync {
    fn chain_head_height(&self) -> Result<u32, ChainSourceError>;

    fn get_block(&self, height: u32) -> Result<RawBlock, ChainSourceError>;

    fn get_raw_transaction(&self, tx_id: &TxId) -> Result<RawTx, ChainSourceError>;

    /// A block together with its transactions, in block order.
    fn get_block_with_txs(&self, height: u32) -> Result<(RawBlock, Vec<RawTx>), ChainSourceError> {
        let block = self.get_block(height)?;
        let txs = block
            .tx_ids
            .iter()
            .map(|id| self.get_raw_transaction(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((block, txs))
    }
}

// ── JSON dump ───────────────────────────────────────────────────────────

/// One block of a dump file, transactions inlined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpBlock {
    pub height: u32,
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    #[serde(default)]
    pub txs: Vec<RawTx>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDump {
    pub blocks: Vec<DumpBlock>,
}

impl ChainDump {
    pub fn to_json(&self) -> Result<String, ChainSourceError> {
        serde_json::to_string_pretty(self).map_err(|e| ChainSourceError::Decode(e.to_string()))
    }
}

/// A chain source backed by a JSON dump held in memory.
#[derive(Debug, Default)]
pub struct JsonChainSource {
    blocks: BTreeMap<u32, RawBlock>,
    txs: HashMap<TxId, RawTx>,
}

impl JsonChainSource {
    pub fn from_dump(dump: ChainDump) -> Self {
        let mut source = Self::default();
        for block in dump.blocks {
            let tx_ids = block.txs.iter().map(|tx| tx.id).collect();
            for tx in block.txs {
                source.txs.insert(tx.id, tx);
            }
            source.blocks.insert(
                block.height,
                RawBlock {
                    height: block.height,
                    hash: block.hash,
                    prev_hash: block.prev_hash,
                    tx_ids,
                },
            );
        }
        source
    }

    pub fn from_json_str(json: &str) -> Result<Self, ChainSourceError> {
        let dump: ChainDump =
            serde_json::from_str(json).map_err(|e| ChainSourceError::Decode(e.to_string()))?;
        Ok(Self::from_dump(dump))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChainSourceError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl RawChainSource for JsonChainSource {
    fn chain_head_height(&self) -> Result<u32, ChainSourceError> {
        self.blocks
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| ChainSourceError::Transport("dump contains no blocks".into()))
    }

    fn get_block(&self, height: u32) -> Result<RawBlock, ChainSourceError> {
        self.blocks
            .get(&height)
            .cloned()
            .ok_or(ChainSourceError::BlockNotFound(height))
    }

    fn get_raw_transaction(&self, tx_id: &TxId) -> Result<RawTx, ChainSourceError> {
        self.txs
            .get(tx_id)
            .cloned()
            .ok_or(ChainSourceError::TxNotFound(*tx_id))
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
