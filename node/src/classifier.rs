//! Per-transaction BSQ classification.
//!
//! Input value comes from outputs still in the unspent index. That value is
//! allocated greedily to outputs in index order; an OP_RETURN in the last
//! position may claim what is left as the fee of a consensus payload, and
//! whatever nobody claims is burnt. Transactions without token input are
//! only kept when they qualify as issuance.

use std::collections::BTreeSet;

use tracing::{debug, info, trace};

use bsq_governance::{IssuanceVerifier, OpReturnCandidate, OpReturnInterpreter, PayloadOutcome};
use bsq_ledger::{FundingRequest, LedgerView, SponsorPayment, Tx};
use bsq_types::{Amount, ConsensusParams, TxOutputType, TxType};

/// A tx that moves token value, with the governance records it creates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedTx {
    pub tx: Tx,
    pub funding_requests: Vec<FundingRequest>,
    pub sponsor_payments: Vec<SponsorPayment>,
    /// An OP_RETURN in metadata position was seen but not accepted.
    pub rejected_payload: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Already known to the ledger or the current block.
    Duplicate,
    /// Carries no token value.
    Ignored,
    Genesis(Tx),
    Token(ClassifiedTx),
}

pub struct TransactionClassifier {
    interpreter: OpReturnInterpreter,
    issuance: IssuanceVerifier,
}

impl TransactionClassifier {
    pub fn new(params: &ConsensusParams) -> Self {
        Self {
            interpreter: OpReturnInterpreter::new(params),
            issuance: IssuanceVerifier::new(),
        }
    }

    /// Classify an unannotated tx found in the block at `height`.
    pub fn classify(&self, mut tx: Tx, view: &dyn LedgerView, height: u32) -> Classification {
        if view.contains_tx(&tx.id) {
            trace!(tx_id = %tx.id, "tx already classified");
            return Classification::Duplicate;
        }

        let genesis = view.genesis();
        if tx.id == genesis.tx_id && height == genesis.block_height {
            return Classification::Genesis(classify_genesis(tx));
        }

        let input_value = connect_inputs(&mut tx, view);
        if input_value.is_zero() {
            return self.classify_issuance(tx, view);
        }
        Classification::Token(self.classify_token_tx(tx, view, height, input_value))
    }

    fn classify_token_tx(
        &self,
        mut tx: Tx,
        view: &dyn LedgerView,
        height: u32,
        input_value: Amount,
    ) -> ClassifiedTx {
        let last_index = tx.outputs.len().saturating_sub(1);
        let mut available = input_value;
        let mut issuance_candidate: Option<usize> = None;
        let mut transferred = false;
        let mut payload: Option<PayloadOutcome> = None;
        let mut rejected_payload = false;

        for index in 0..tx.outputs.len() {
            if let Some(data) = tx.outputs[index].op_return_data.as_deref() {
                // only the last position may carry metadata
                if index == last_index && !available.is_zero() {
                    let candidate = OpReturnCandidate {
                        data,
                        output: &tx.outputs[index],
                        available,
                        height,
                        issuance_candidate: issuance_candidate.map(|i| &tx.outputs[i]),
                    };
                    payload = self.interpreter.maybe_process(view, candidate);
                    rejected_payload = payload.is_none();
                }
                tx.outputs[index].output_type = payload
                    .as_ref()
                    .map_or(TxOutputType::NonTokenOutput, |p| p.metadata_output_type);
                continue;
            }

            let output = &mut tx.outputs[index];
            if !output.value.is_zero() && output.value <= available {
                available = available - output.value;
                output.mark_verified();
                transferred = true;
            } else {
                output.output_type = TxOutputType::NonTokenOutput;
                if !available.is_zero() && issuance_candidate.is_none() {
                    issuance_candidate = Some(index);
                }
            }
        }

        let mut funding_requests = Vec::new();
        tx.tx_type = Some(match payload {
            Some(outcome) => {
                if let Some(output) = outcome
                    .issuance_candidate
                    .and_then(|index| tx.output_mut(index))
                {
                    output.output_type = TxOutputType::IssuanceCandidateOutput;
                }
                funding_requests.extend(outcome.funding_request);
                outcome.tx_type
            }
            None if transferred => TxType::Transfer,
            None => TxType::PayFee,
        });
        tx.burnt_fee = (!available.is_zero()).then_some(available);

        debug!(
            tx_id = %tx.id,
            height,
            input = %input_value,
            burnt = %available,
            tx_type = tx.tx_type.map_or("none", |t| t.as_str()),
            "classified token tx"
        );

        ClassifiedTx {
            tx,
            funding_requests,
            sponsor_payments: Vec::new(),
            rejected_payload,
        }
    }

    fn classify_issuance(&self, mut tx: Tx, view: &dyn LedgerView) -> Classification {
        let Some(outcome) = self.issuance.maybe_process(view, &tx) else {
            return Classification::Ignored;
        };
        for output in &mut tx.outputs {
            output.output_type = if outcome.sponsor_outputs.contains(&output.index) {
                TxOutputType::SponsorOutput
            } else {
                TxOutputType::NonTokenOutput
            };
        }
        tx.tx_type = Some(TxType::Issuance);
        debug!(tx_id = %tx.id, payments = outcome.payments.len(), "classified issuance tx");

        Classification::Token(ClassifiedTx {
            tx,
            funding_requests: Vec::new(),
            sponsor_payments: outcome.payments,
            rejected_payload: false,
        })
    }
}

/// Every output of the genesis tx is a token output.
fn classify_genesis(mut tx: Tx) -> Tx {
    tx.outputs.iter_mut().for_each(|o| o.mark_verified());
    tx.tx_type = Some(TxType::Genesis);
    info!(
        tx_id = %tx.id,
        height = tx.block_height,
        supply = %tx.verified_output_value(),
        "found genesis tx"
    );
    tx
}

/// Connect inputs to spendable token outputs and sum their value.
///
/// An output referenced twice by the same tx counts once.
fn connect_inputs(tx: &mut Tx, view: &dyn LedgerView) -> Amount {
    let mut seen = BTreeSet::new();
    let mut total = Amount::ZERO;
    for input in &mut tx.inputs {
        let key = input.previous_output;
        if !seen.insert(key) {
            continue;
        }
        if let Some(output) = view.unspent_output(&key) {
            total = total.saturating_add(output.value);
            input.connected_output = Some(key);
        }
    }
    total
}
