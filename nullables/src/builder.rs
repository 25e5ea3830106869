//! Builders for raw chain data.

use bsq_ledger::ScriptType;
use bsq_node::{BlockInput, ChainDump, DumpBlock, RawBlock, RawTx, RawTxOutput};
use bsq_types::{Amount, BlockHash, BtcAddress, Timestamp, TxId, TxOutputKey};

/// Deterministic block hash for `height`.
pub fn block_hash(height: u32) -> BlockHash {
    let mut bytes = [0xc3; 32];
    bytes[..4].copy_from_slice(&height.to_be_bytes());
    BlockHash::new(bytes)
}

/// Tx id made of one repeated byte.
pub fn tx_id(byte: u8) -> TxId {
    TxId::new([byte; 32])
}

/// Builds a [`RawTx`].
#[derive(Clone, Debug)]
pub struct TxBuilder {
    tx: RawTx,
}

impl TxBuilder {
    pub fn new(id: TxId) -> Self {
        Self {
            tx: RawTx {
                id,
                inputs: Vec::new(),
                outputs: Vec::new(),
                time: Timestamp::new(0),
            },
        }
    }

    pub fn with_id_byte(byte: u8) -> Self {
        Self::new(tx_id(byte))
    }

    pub fn input(mut self, tx_id: TxId, index: u32) -> Self {
        self.tx.inputs.push(TxOutputKey::new(tx_id, index));
        self
    }

    pub fn output(self, value: u64) -> Self {
        self.push(value, ScriptType::PubKeyHash, None, None)
    }

    pub fn output_to(self, value: u64, address: &str) -> Self {
        self.push(
            value,
            ScriptType::PubKeyHash,
            Some(BtcAddress::new(address)),
            None,
        )
    }

    pub fn op_return(self, data: Vec<u8>) -> Self {
        self.push(0, ScriptType::NullData, None, Some(data))
    }

    pub fn time(mut self, secs: u64) -> Self {
        self.tx.time = Timestamp::new(secs);
        self
    }

    pub fn build(self) -> RawTx {
        self.tx
    }

    fn push(
        mut self,
        value: u64,
        script_type: ScriptType,
        address: Option<BtcAddress>,
        op_return: Option<Vec<u8>>,
    ) -> Self {
        self.tx.outputs.push(RawTxOutput {
            value: Amount::new(value),
            script_type,
            address,
            op_return,
        });
        self
    }
}

/// Builds a connected chain of blocks starting at a given height.
#[derive(Clone, Debug)]
pub struct ChainBuilder {
    next_height: u32,
    blocks: Vec<DumpBlock>,
}

impl ChainBuilder {
    pub fn starting_at(height: u32) -> Self {
        Self {
            next_height: height,
            blocks: Vec::new(),
        }
    }

    /// Append the next block holding `txs`.
    pub fn block(mut self, txs: Vec<RawTx>) -> Self {
        let height = self.next_height;
        let prev_hash = match self.blocks.last() {
            Some(prev) => prev.hash,
            None => BlockHash::ZERO,
        };
        self.blocks.push(DumpBlock {
            height,
            hash: block_hash(height),
            prev_hash,
            txs,
        });
        self.next_height = height.saturating_add(1);
        self
    }

    pub fn empty_blocks(mut self, count: u32) -> Self {
        for _ in 0..count {
            self = self.block(Vec::new());
        }
        self
    }

    /// Height of the last block added.
    pub fn tip_height(&self) -> Option<u32> {
        self.blocks.last().map(|b| b.height)
    }

    pub fn build(self) -> ChainDump {
        ChainDump {
            blocks: self.blocks,
        }
    }

    /// The blocks as parser input, skipping the chain source.
    pub fn build_inputs(self) -> Vec<BlockInput> {
        self.blocks.into_iter().map(block_input).collect()
    }
}

pub fn block_input(block: DumpBlock) -> BlockInput {
    let raw = RawBlock {
        height: block.height,
        hash: block.hash,
        prev_hash: block.prev_hash,
        tx_ids: block.txs.iter().map(|tx| tx.id).collect(),
    };
    BlockInput::from_raw(raw, block.txs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_links_each_block_to_its_parent() {
        let dump = ChainBuilder::starting_at(7)
            .block(vec![TxBuilder::with_id_byte(1).output(10).build()])
            .empty_blocks(2)
            .build();
        assert_eq!(dump.blocks.len(), 3);
        assert_eq!(dump.blocks[0].prev_hash, BlockHash::ZERO);
        for pair in dump.blocks.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].hash);
            assert_eq!(pair[1].height, pair[0].height + 1);
        }
    }

    #[test]
    fn tx_builder_keeps_output_order() {
        let tx = TxBuilder::with_id_byte(2)
            .input(tx_id(1), 0)
            .output_to(400, "alice")
            .op_return(vec![1, 2])
            .build();
        assert_eq!(tx.inputs, vec![TxOutputKey::new(tx_id(1), 0)]);
        assert_eq!(tx.outputs[0].address, Some(BtcAddress::new("alice")));
        assert_eq!(tx.outputs[1].script_type, ScriptType::NullData);
        assert_eq!(tx.outputs[1].op_return, Some(vec![1, 2]));
    }
}
