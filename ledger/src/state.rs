//! The derived ledger as a plain value.
//!
//! `ChainState` is `Clone + PartialEq + Serialize`: snapshots are value
//! copies of it and two nodes that parsed the same chain must hold equal
//! values. Every collection is ordered so the bincode encoding is
//! deterministic too.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bsq_types::{
    Amount, BlockHash, BtcAddress, ConsensusParams, GenesisPin, HeightSchedule, TxId, TxOutputKey,
    TxType,
};

use crate::delta::BlockDelta;
use crate::funding::{FeeKind, FundingRequest, SponsorPayment};
use crate::model::{Block, BlockHeader, SpentInfo, Tx, TxOutput};
use crate::view::LedgerView;
use crate::LedgerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct TxLocation {
    block: usize,
    position: usize,
}

/// Result of applying a block to the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { height: u32, tx_count: usize },
    /// The block was already part of the chain; nothing changed.
    Duplicate { height: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    genesis: GenesisPin,
    blocks: Vec<Block>,
    tx_index: BTreeMap<TxId, TxLocation>,
    unspent: BTreeMap<TxOutputKey, TxOutput>,
    compensation_request_fees: HeightSchedule<Amount>,
    voting_fees: HeightSchedule<Amount>,
    funding_requests: BTreeMap<BtcAddress, Vec<FundingRequest>>,
    sponsor_payments: BTreeMap<BtcAddress, Vec<SponsorPayment>>,
    genesis_tx: Option<Tx>,
}

impl ChainState {
    /// An empty state with the initial fee entries effective from genesis.
    pub fn new(params: &ConsensusParams) -> Self {
        let genesis_height = params.genesis.block_height;
        Self {
            genesis: params.genesis,
            blocks: Vec::new(),
            tx_index: BTreeMap::new(),
            unspent: BTreeMap::new(),
            compensation_request_fees: HeightSchedule::starting_at(
                genesis_height,
                params.initial_compensation_request_fee,
            ),
            voting_fees: HeightSchedule::starting_at(genesis_height, params.initial_voting_fee),
            funding_requests: BTreeMap::new(),
            sponsor_payments: BTreeMap::new(),
            genesis_tx: None,
        }
    }

    // ── Block application ───────────────────────────────────────────────

    /// Append a classified block.
    ///
    /// The block must connect to the current head. All checks run before the
    /// first mutation so a failed append leaves the state untouched.
    pub fn apply_block(
        &mut self,
        header: BlockHeader,
        delta: BlockDelta,
    ) -> Result<AppendOutcome, LedgerError> {
        if self.contains_block(&header.hash, header.height) {
            return Ok(AppendOutcome::Duplicate {
                height: header.height,
            });
        }

        if let Some(head) = self.blocks.last() {
            if header.prev_hash != head.hash || header.height != head.height.saturating_add(1) {
                return Err(LedgerError::NonConnectingBlock {
                    height: header.height,
                    prev_hash: header.prev_hash,
                    head_height: head.height,
                    head_hash: head.hash,
                });
            }
        }

        let parts = delta.into_parts();

        for key in parts.spent.keys() {
            if !self.unspent.contains_key(key) {
                return Err(LedgerError::OutputNotSpendable(*key));
            }
        }
        for tx in &parts.txs {
            if self.tx_index.contains_key(&tx.id) {
                return Err(LedgerError::DuplicateTx(tx.id));
            }
        }
        if let Some(genesis_tx) = &parts.genesis_tx {
            self.check_genesis(genesis_tx)?;
        }

        let block_pos = self.blocks.len();
        for (position, tx) in parts.txs.iter().enumerate() {
            self.tx_index.insert(
                tx.id,
                TxLocation {
                    block: block_pos,
                    position,
                },
            );
        }
        let tx_count = parts.txs.len();
        self.blocks.push(Block {
            height: header.height,
            hash: header.hash,
            prev_hash: header.prev_hash,
            txs: parts.txs,
        });

        for (key, output) in parts.new_outputs {
            self.unspent.insert(key, output);
        }
        for (key, info) in parts.spent {
            self.mark_output_spent(&key, info)?;
        }
        for request in parts.funding_requests {
            self.funding_requests
                .entry(request.address.clone())
                .or_default()
                .push(request);
        }
        for payment in parts.sponsor_payments {
            self.sponsor_payments
                .entry(payment.address.clone())
                .or_default()
                .push(payment);
        }
        if let Some(genesis_tx) = parts.genesis_tx {
            self.set_genesis_tx(genesis_tx)?;
        }

        Ok(AppendOutcome::Appended {
            height: header.height,
            tx_count,
        })
    }

    // ── Single mutations ────────────────────────────────────────────────

    /// Accept an output of an already-indexed tx as a token output.
    pub fn mark_output_verified(&mut self, key: &TxOutputKey) -> Result<(), LedgerError> {
        if self.unspent.contains_key(key) {
            return Err(LedgerError::OutputAlreadyVerified(*key));
        }
        let output = self
            .output_mut(key)
            .ok_or(LedgerError::OutputNotFound(*key))?;
        if output.verified {
            return Err(LedgerError::OutputAlreadyVerified(*key));
        }
        output.mark_verified();
        let copy = output.clone();
        self.unspent.insert(*key, copy);
        Ok(())
    }

    /// Remove a token output from the unspent index.
    ///
    /// Fails if the output is not currently spendable; an output is never
    /// removed twice.
    pub fn mark_output_spent(
        &mut self,
        key: &TxOutputKey,
        info: SpentInfo,
    ) -> Result<TxOutput, LedgerError> {
        let mut removed = self
            .unspent
            .remove(key)
            .ok_or(LedgerError::OutputNotSpendable(*key))?;
        removed.mark_spent(info);
        if let Some(output) = self.output_mut(key) {
            output.mark_spent(info);
        }
        Ok(removed)
    }

    /// Record a new fee effective from `height`.
    ///
    /// Blocks up to the chain head were classified with the fees in force at
    /// the time, so `height` must lie above the head and above every earlier
    /// entry.
    pub fn record_fee_schedule_entry(
        &mut self,
        kind: FeeKind,
        height: u32,
        fee: Amount,
    ) -> Result<(), LedgerError> {
        if !self.is_empty() && height <= self.chain_head_height() {
            return Err(LedgerError::RetroactiveFeeEntry {
                height,
                head: self.chain_head_height(),
            });
        }
        self.fee_schedule_mut(kind).record(height, fee)?;
        Ok(())
    }

    pub fn set_genesis_tx(&mut self, tx: Tx) -> Result<(), LedgerError> {
        self.check_genesis(&tx)?;
        self.genesis_tx = Some(tx);
        Ok(())
    }

    fn check_genesis(&self, tx: &Tx) -> Result<(), LedgerError> {
        if self.genesis_tx.is_some() {
            return Err(LedgerError::GenesisAlreadySet);
        }
        if tx.id != self.genesis.tx_id || tx.block_height != self.genesis.block_height {
            return Err(LedgerError::GenesisMismatch {
                expected: self.genesis.tx_id,
                expected_height: self.genesis.block_height,
                found: tx.id,
                found_height: tx.block_height,
            });
        }
        Ok(())
    }

    fn fee_schedule_mut(&mut self, kind: FeeKind) -> &mut HeightSchedule<Amount> {
        match kind {
            FeeKind::CompensationRequest => &mut self.compensation_request_fees,
            FeeKind::Voting => &mut self.voting_fees,
        }
    }

    fn output_mut(&mut self, key: &TxOutputKey) -> Option<&mut TxOutput> {
        let loc = *self.tx_index.get(&key.tx_id)?;
        self.blocks
            .get_mut(loc.block)?
            .txs
            .get_mut(loc.position)?
            .output_mut(key.index)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Height of the last appended block, or 0 on an empty chain.
    pub fn chain_head_height(&self) -> u32 {
        self.blocks.last().map_or(0, |b| b.height)
    }

    pub fn chain_head(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn tx_count(&self) -> usize {
        self.tx_index.len()
    }

    pub fn contains_block(&self, hash: &BlockHash, height: u32) -> bool {
        self.block_at(height).is_some_and(|b| &b.hash == hash)
    }

    pub fn block_at(&self, height: u32) -> Option<&Block> {
        let first = self.blocks.first()?.height;
        let offset = height.checked_sub(first)? as usize;
        self.blocks.get(offset)
    }

    pub fn find_tx(&self, tx_id: &TxId) -> Option<&Tx> {
        let loc = self.tx_index.get(tx_id)?;
        self.blocks.get(loc.block)?.txs.get(loc.position)
    }

    pub fn tx_type(&self, tx_id: &TxId) -> Option<TxType> {
        self.find_tx(tx_id).and_then(|tx| tx.tx_type)
    }

    pub fn has_burnt_fee(&self, tx_id: &TxId) -> bool {
        self.find_tx(tx_id).is_some_and(Tx::has_burnt_fee)
    }

    pub fn txs(&self) -> impl Iterator<Item = &Tx> {
        self.blocks.iter().flat_map(|b| b.txs.iter())
    }

    pub fn unspent_outputs(&self) -> impl Iterator<Item = &TxOutput> {
        self.unspent.values()
    }

    pub fn unspent_count(&self) -> usize {
        self.unspent.len()
    }

    pub fn unspent_value(&self) -> Amount {
        self.unspent.values().map(|o| o.value).sum()
    }

    /// Verified outputs that have been consumed.
    pub fn spent_outputs(&self) -> Vec<&TxOutput> {
        self.txs()
            .flat_map(|tx| tx.outputs.iter())
            .filter(|o| o.verified && !o.unspent)
            .collect()
    }

    pub fn fee_transactions(&self) -> Vec<&Tx> {
        self.txs().filter(|tx| tx.has_burnt_fee()).collect()
    }

    pub fn total_burnt_fee(&self) -> Amount {
        self.txs().filter_map(|tx| tx.burnt_fee).sum()
    }

    pub fn genesis_tx(&self) -> Option<&Tx> {
        self.genesis_tx.as_ref()
    }

    pub fn genesis_tx_id(&self) -> TxId {
        self.genesis.tx_id
    }

    pub fn genesis_block_height(&self) -> u32 {
        self.genesis.block_height
    }

    /// Total supply minted by the genesis transaction.
    pub fn issued_amount(&self) -> Amount {
        self.genesis_tx
            .as_ref()
            .map(|tx| tx.outputs.iter().map(|o| o.value).sum())
            .unwrap_or(Amount::ZERO)
    }

    pub fn fee_schedule(&self, kind: FeeKind) -> &HeightSchedule<Amount> {
        match kind {
            FeeKind::CompensationRequest => &self.compensation_request_fees,
            FeeKind::Voting => &self.voting_fees,
        }
    }

    pub fn all_funding_requests(&self) -> impl Iterator<Item = &FundingRequest> {
        self.funding_requests.values().flatten()
    }

    /// Blocks from `height` on with every classification annotation removed.
    pub fn blocks_from(&self, height: u32) -> Vec<Block> {
        self.blocks
            .iter()
            .filter(|b| b.height >= height)
            .cloned()
            .map(|mut b| {
                b.reset();
                b
            })
            .collect()
    }
}

impl LedgerView for ChainState {
    fn genesis(&self) -> GenesisPin {
        self.genesis
    }

    fn unspent_output(&self, key: &TxOutputKey) -> Option<&TxOutput> {
        self.unspent.get(key)
    }

    fn contains_tx(&self, tx_id: &TxId) -> bool {
        self.tx_index.contains_key(tx_id)
    }

    fn effective_fee(&self, kind: FeeKind, height: u32) -> Option<Amount> {
        self.fee_schedule(kind).effective_at(height).copied()
    }

    fn funding_requests(&self, address: &BtcAddress) -> Vec<&FundingRequest> {
        self.funding_requests
            .get(address)
            .map(|v| v.iter().collect())
            .unwrap_or_default()
    }

    fn sponsor_payments(&self, address: &BtcAddress) -> Vec<&SponsorPayment> {
        self.sponsor_payments
            .get(address)
            .map(|v| v.iter().collect())
            .unwrap_or_default()
    }
}
