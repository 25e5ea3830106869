//! Classification tags for transactions and outputs.

use serde::{Deserialize, Serialize};

/// The classification of a BSQ-relevant transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    /// The pinned genesis transaction; the only minting event.
    Genesis,
    /// Token value moved to new outputs.
    Transfer,
    /// Token inputs burnt (fully or partly) without any other role.
    PayFee,
    /// Carries an accepted compensation request payload.
    CompensationRequest,
    /// Carries an accepted vote payload.
    Vote,
    /// Pays a registered funding request address.
    Issuance,
}

impl TxType {
    /// Whether the type was assigned by a consensus payload verifier.
    pub fn is_consensus_tagged(&self) -> bool {
        matches!(
            self,
            Self::CompensationRequest | Self::Vote | Self::Issuance
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Genesis => "genesis",
            Self::Transfer => "transfer",
            Self::PayFee => "pay_fee",
            Self::CompensationRequest => "compensation_request",
            Self::Vote => "vote",
            Self::Issuance => "issuance",
        }
    }
}

/// The role an individual output plays after classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxOutputType {
    /// Not yet looked at by the classifier.
    #[default]
    Undefined,
    /// A verified token output.
    TokenOutput,
    /// A plain Bitcoin output carrying no token value.
    NonTokenOutput,
    /// OP_RETURN output holding an accepted compensation request.
    CompensationRequestMetadataOutput,
    /// Bitcoin output registered as the payout address of a compensation request.
    IssuanceCandidateOutput,
    /// OP_RETURN output holding an accepted vote.
    VoteMetadataOutput,
    /// Bitcoin output paying a registered funding request address.
    SponsorOutput,
}

impl TxOutputType {
    pub fn is_metadata(&self) -> bool {
        matches!(
            self,
            Self::CompensationRequestMetadataOutput | Self::VoteMetadataOutput
        )
    }
}
