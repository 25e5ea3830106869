//! Issuance verification.
//!
//! A transaction without token inputs counts as issuance when it pays
//! addresses with an accepted funding request, and no payment pushes the
//! address past the amount it requested. Prior payments are summed in
//! `(height, tx id)` order so every node arrives at the same running total.

use tracing::debug;

use bsq_ledger::{LedgerView, SponsorPayment, Tx};
use bsq_types::{Amount, BtcAddress, TxId};

use crate::error::GovernanceError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IssuanceOutcome {
    /// Indices of the outputs accepted as sponsor outputs.
    pub sponsor_outputs: Vec<u32>,
    pub payments: Vec<SponsorPayment>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IssuanceVerifier;

impl IssuanceVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Check every output of `tx`; `None` if none qualifies.
    pub fn maybe_process(&self, view: &dyn LedgerView, tx: &Tx) -> Option<IssuanceOutcome> {
        let mut outcome = IssuanceOutcome::default();
        for output in &tx.outputs {
            if output.has_op_return() || output.value.is_zero() {
                continue;
            }
            let Some(address) = &output.address else {
                continue;
            };
            match self.verify_payment(
                view,
                address,
                output.value,
                tx.id,
                tx.block_height,
                &outcome.payments,
            ) {
                Ok(payment) => {
                    outcome.sponsor_outputs.push(output.index);
                    outcome.payments.push(payment);
                }
                Err(GovernanceError::NoFundingRequest(_)) => {}
                Err(e) => {
                    debug!(tx_id = %tx.id, index = output.index, error = %e, "issuance output rejected");
                }
            }
        }

        if outcome.payments.is_empty() {
            None
        } else {
            Some(outcome)
        }
    }

    /// Validate one payment against the funding requests of `address`.
    ///
    /// `pending` holds payments already accepted earlier in the same tx.
    pub fn verify_payment(
        &self,
        view: &dyn LedgerView,
        address: &BtcAddress,
        amount: Amount,
        tx_id: TxId,
        height: u32,
        pending: &[SponsorPayment],
    ) -> Result<SponsorPayment, GovernanceError> {
        let requests = view.funding_requests(address);
        if requests.is_empty() {
            return Err(GovernanceError::NoFundingRequest(address.clone()));
        }
        let requested = requests
            .iter()
            .try_fold(Amount::ZERO, |acc, r| acc.checked_add(r.requested_amount))
            .ok_or(GovernanceError::Overflow)?;

        let mut prior = view.sponsor_payments(address);
        prior.extend(pending.iter().filter(|p| &p.address == address));
        prior.sort_by_key(|p| p.order_key());
        let funded = prior
            .iter()
            .try_fold(Amount::ZERO, |acc, p| acc.checked_add(p.amount))
            .ok_or(GovernanceError::Overflow)?;

        let total = funded.checked_add(amount).ok_or(GovernanceError::Overflow)?;
        if total > requested {
            return Err(GovernanceError::FundingExceeded {
                address: address.clone(),
                requested,
                funded,
                payment: amount,
            });
        }

        Ok(SponsorPayment {
            address: address.clone(),
            amount,
            tx_id,
            block_height: height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsq_ledger::{BlockDelta, BlockView, FundingRequest};

    use crate::test_util::{genesis_height, state, tx};

    fn request(address: &str, amount: u64, tx_byte: u8) -> FundingRequest {
        FundingRequest {
            address: BtcAddress::new(address),
            requested_amount: Amount::new(amount),
            tx_id: TxId::new([tx_byte; 32]),
            block_height: genesis_height(),
        }
    }

    fn delta_with(requests: Vec<FundingRequest>, payments: Vec<SponsorPayment>) -> BlockDelta {
        let mut delta = BlockDelta::new(genesis_height() + 40);
        delta.record(tx(0xa0, genesis_height() + 40, &[]), requests, payments);
        delta
    }

    #[test]
    fn pays_registered_address_within_request() {
        let state = state();
        let delta = delta_with(vec![request("alice", 1_000, 1)], Vec::new());
        let view = BlockView::new(&state, &delta);

        let issuance = tx(0x10, genesis_height() + 40, &[(600, Some("alice")), (50, Some("change"))]);
        let outcome = IssuanceVerifier::new().maybe_process(&view, &issuance).unwrap();
        assert_eq!(outcome.sponsor_outputs, vec![0]);
        assert_eq!(outcome.payments[0].amount, Amount::new(600));
    }

    #[test]
    fn unregistered_addresses_are_not_issuance() {
        let state = state();
        let delta = delta_with(Vec::new(), Vec::new());
        let view = BlockView::new(&state, &delta);
        let plain = tx(0x10, genesis_height() + 40, &[(600, Some("bob"))]);
        assert_eq!(IssuanceVerifier::new().maybe_process(&view, &plain), None);
    }

    #[test]
    fn running_total_caps_payments() {
        let state = state();
        let prior = SponsorPayment {
            address: BtcAddress::new("alice"),
            amount: Amount::new(700),
            tx_id: TxId::new([5; 32]),
            block_height: genesis_height() + 39,
        };
        let delta = delta_with(vec![request("alice", 1_000, 1)], vec![prior]);
        let view = BlockView::new(&state, &delta);
        let verifier = IssuanceVerifier::new();

        let over = tx(0x10, genesis_height() + 40, &[(400, Some("alice"))]);
        assert_eq!(verifier.maybe_process(&view, &over), None);

        let exact = tx(0x11, genesis_height() + 40, &[(300, Some("alice"))]);
        assert!(verifier.maybe_process(&view, &exact).is_some());
    }

    #[test]
    fn payments_within_one_tx_accumulate() {
        let state = state();
        let delta = delta_with(vec![request("alice", 1_000, 1)], Vec::new());
        let view = BlockView::new(&state, &delta);
        let split = tx(
            0x10,
            genesis_height() + 40,
            &[(600, Some("alice")), (600, Some("alice"))],
        );
        let outcome = IssuanceVerifier::new().maybe_process(&view, &split).unwrap();
        assert_eq!(outcome.sponsor_outputs, vec![0]);
    }

    #[test]
    fn multiple_requests_raise_the_cap() {
        let state = state();
        let delta = delta_with(
            vec![request("alice", 500, 1), request("alice", 500, 2)],
            Vec::new(),
        );
        let view = BlockView::new(&state, &delta);
        let err = IssuanceVerifier::new()
            .verify_payment(
                &view,
                &BtcAddress::new("alice"),
                Amount::new(1_001),
                TxId::new([9; 32]),
                genesis_height() + 40,
                &[],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::FundingExceeded { requested, .. } if requested == Amount::new(1_000)
        ));
    }
}
