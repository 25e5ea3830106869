//! Checks shared by the fee-gated payload verifiers.

use bsq_ledger::{FeeKind, LedgerView};
use bsq_types::{Amount, HeightSchedule};

use crate::error::PayloadError;
use crate::period::{DaoPeriod, Phase};

pub(crate) fn check_version(
    schedule: &HeightSchedule<u8>,
    height: u32,
    found: u8,
) -> Result<(), PayloadError> {
    let expected = *schedule
        .effective_at(height)
        .ok_or(PayloadError::NoActiveVersion(height))?;
    if expected != found {
        return Err(PayloadError::VersionMismatch { expected, found });
    }
    Ok(())
}

/// The unallocated token value must pay exactly the fee effective at `height`.
pub(crate) fn check_fee(
    view: &dyn LedgerView,
    kind: FeeKind,
    height: u32,
    available: Amount,
) -> Result<Amount, PayloadError> {
    let required = view
        .effective_fee(kind, height)
        .ok_or(PayloadError::MissingFee(height))?;
    if required != available {
        return Err(PayloadError::FeeMismatch {
            required,
            available,
        });
    }
    Ok(required)
}

pub(crate) fn check_phase(
    period: &DaoPeriod,
    height: u32,
    expected: Phase,
) -> Result<(), PayloadError> {
    let actual = period.phase_at(height);
    if actual != Some(expected) {
        return Err(PayloadError::WrongPhase { expected, actual });
    }
    Ok(())
}
