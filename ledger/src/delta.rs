//! Per-block classification buffer.
//!
//! Classification of a block happens against the committed state plus the
//! results of the txs already classified in the same block. `BlockDelta`
//! buffers those results and `BlockView` overlays them on a `ChainState`, so
//! the whole block can be committed in one write section.

use std::collections::BTreeMap;

use bsq_types::{Amount, BtcAddress, GenesisPin, TxId, TxOutputKey};

use crate::funding::{FeeKind, FundingRequest, SponsorPayment};
use crate::model::{SpentInfo, Tx, TxOutput};
use crate::state::ChainState;
use crate::view::LedgerView;

#[derive(Clone, Debug, Default)]
pub struct BlockDelta {
    height: u32,
    txs: Vec<Tx>,
    tx_positions: BTreeMap<TxId, usize>,
    new_outputs: BTreeMap<TxOutputKey, TxOutput>,
    /// Spends of outputs committed in earlier blocks.
    spent: BTreeMap<TxOutputKey, SpentInfo>,
    funding_requests: Vec<FundingRequest>,
    sponsor_payments: Vec<SponsorPayment>,
    genesis_tx: Option<Tx>,
}

/// The owned contents of a delta, consumed by `ChainState::apply_block`.
pub(crate) struct DeltaParts {
    pub txs: Vec<Tx>,
    pub new_outputs: BTreeMap<TxOutputKey, TxOutput>,
    pub spent: BTreeMap<TxOutputKey, SpentInfo>,
    pub funding_requests: Vec<FundingRequest>,
    pub sponsor_payments: Vec<SponsorPayment>,
    pub genesis_tx: Option<Tx>,
}

impl BlockDelta {
    pub fn new(height: u32) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Buffer a classified tx.
    ///
    /// Inputs with a connected output consume it; verified outputs become
    /// spendable for the rest of the block.
    pub fn record(
        &mut self,
        mut tx: Tx,
        funding_requests: Vec<FundingRequest>,
        sponsor_payments: Vec<SponsorPayment>,
    ) {
        for (input_index, input) in tx.inputs.iter().enumerate() {
            let Some(key) = input.connected_output else {
                continue;
            };
            let info = SpentInfo {
                block_height: self.height,
                tx_id: tx.id,
                input_index: input_index as u32,
            };
            if self.new_outputs.remove(&key).is_some() {
                let created_here = self
                    .tx_positions
                    .get(&key.tx_id)
                    .and_then(|pos| self.txs.get_mut(*pos))
                    .and_then(|t| t.output_mut(key.index));
                if let Some(output) = created_here {
                    output.mark_spent(info);
                }
            } else {
                self.spent.insert(key, info);
            }
        }

        for output in tx.outputs.iter_mut().filter(|o| o.verified) {
            output.unspent = true;
            self.new_outputs.insert(output.key(), output.clone());
        }

        self.funding_requests.extend(funding_requests);
        self.sponsor_payments.extend(sponsor_payments);
        self.tx_positions.insert(tx.id, self.txs.len());
        self.txs.push(tx);
    }

    /// Buffer the genesis tx. Its outputs are expected to be verified already.
    pub fn record_genesis(&mut self, tx: Tx) {
        self.genesis_tx = Some(tx.clone());
        self.record(tx, Vec::new(), Vec::new());
    }

    pub fn txs(&self) -> &[Tx] {
        &self.txs
    }

    pub fn contains_tx(&self, tx_id: &TxId) -> bool {
        self.tx_positions.contains_key(tx_id)
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Total fee burnt by the txs buffered so far.
    pub fn burnt_fee(&self) -> Amount {
        self.txs.iter().filter_map(|tx| tx.burnt_fee).sum()
    }

    pub(crate) fn into_parts(self) -> DeltaParts {
        DeltaParts {
            txs: self.txs,
            new_outputs: self.new_outputs,
            spent: self.spent,
            funding_requests: self.funding_requests,
            sponsor_payments: self.sponsor_payments,
            genesis_tx: self.genesis_tx,
        }
    }
}

/// The committed state as seen from inside a block being classified.
pub struct BlockView<'a> {
    state: &'a ChainState,
    delta: &'a BlockDelta,
}

impl<'a> BlockView<'a> {
    pub fn new(state: &'a ChainState, delta: &'a BlockDelta) -> Self {
        Self { state, delta }
    }
}

impl LedgerView for BlockView<'_> {
    fn genesis(&self) -> GenesisPin {
        self.state.genesis()
    }

    fn unspent_output(&self, key: &TxOutputKey) -> Option<&TxOutput> {
        if self.delta.spent.contains_key(key) {
            return None;
        }
        self.delta
            .new_outputs
            .get(key)
            .or_else(|| self.state.unspent_output(key))
    }

    fn contains_tx(&self, tx_id: &TxId) -> bool {
        self.delta.contains_tx(tx_id) || self.state.contains_tx(tx_id)
    }

    fn effective_fee(&self, kind: FeeKind, height: u32) -> Option<Amount> {
        self.state.effective_fee(kind, height)
    }

    fn funding_requests(&self, address: &BtcAddress) -> Vec<&FundingRequest> {
        let mut requests = self.state.funding_requests(address);
        requests.extend(
            self.delta
                .funding_requests
                .iter()
                .filter(|r| &r.address == address),
        );
        requests
    }

    fn sponsor_payments(&self, address: &BtcAddress) -> Vec<&SponsorPayment> {
        let mut payments = self.state.sponsor_payments(address);
        payments.extend(
            self.delta
                .sponsor_payments
                .iter()
                .filter(|p| &p.address == address),
        );
        payments
    }
}
