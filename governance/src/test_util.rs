use bsq_ledger::{ChainState, ScriptType, Tx, TxOutput};
use bsq_types::{Amount, BlockHash, BtcAddress, ConsensusParams, Timestamp, TxId, TxOutputType};

pub(crate) fn params() -> ConsensusParams {
    ConsensusParams::default()
}

pub(crate) fn state() -> ChainState {
    ChainState::new(&params())
}

pub(crate) fn genesis_height() -> u32 {
    params().genesis.block_height
}

pub(crate) fn output(tx_id: TxId, index: u32, value: u64, address: Option<&str>) -> TxOutput {
    TxOutput {
        index,
        value: Amount::new(value),
        tx_id,
        block_height: genesis_height(),
        script_type: ScriptType::PubKeyHash,
        address: address.map(BtcAddress::new),
        op_return_data: None,
        verified: false,
        unspent: false,
        output_type: TxOutputType::Undefined,
        spent_info: None,
    }
}

pub(crate) fn tx(id: u8, height: u32, outputs: &[(u64, Option<&str>)]) -> Tx {
    let tx_id = TxId::new([id; 32]);
    Tx {
        id: tx_id,
        block_height: height,
        block_hash: BlockHash::ZERO,
        time: Timestamp::new(0),
        inputs: Vec::new(),
        outputs: outputs
            .iter()
            .enumerate()
            .map(|(i, (value, address))| {
                let mut o = output(tx_id, i as u32, *value, *address);
                o.block_height = height;
                o
            })
            .collect(),
        tx_type: None,
        burnt_fee: None,
    }
}
