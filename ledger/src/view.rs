//! Read-only access to ledger state used by classification and verifiers.

use bsq_types::{Amount, BtcAddress, GenesisPin, TxId, TxOutputKey};

use crate::funding::{FeeKind, FundingRequest, SponsorPayment};
use crate::model::TxOutput;

/// What classification needs to see of the ledger.
///
/// Implemented by the committed [`ChainState`](crate::ChainState) and by
/// [`BlockView`](crate::BlockView), which overlays the block currently being
/// classified on top of it.
pub trait LedgerView {
    fn genesis(&self) -> GenesisPin;

    /// A verified, unspent token output.
    fn unspent_output(&self, key: &TxOutputKey) -> Option<&TxOutput>;

    fn contains_tx(&self, tx_id: &TxId) -> bool;

    /// The fee of `kind` effective at `height`.
    fn effective_fee(&self, kind: FeeKind, height: u32) -> Option<Amount>;

    fn funding_requests(&self, address: &BtcAddress) -> Vec<&FundingRequest>;

    fn sponsor_payments(&self, address: &BtcAddress) -> Vec<&SponsorPayment>;

    fn is_output_spendable(&self, key: &TxOutputKey) -> bool {
        self.unspent_output(key).is_some()
    }
}
