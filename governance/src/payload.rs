//! OP_RETURN payload wire formats.
//!
//! Every payload starts with a type byte and a version byte:
//!
//! ```text
//! compensation request: [0x01][version][hash160: 20][requested amount: u64 BE]
//! vote:                 [0x02][version][hash160: 20][count][count x (voted, accepted)]
//! ```

use bsq_types::Amount;

use crate::error::PayloadError;

pub const OP_RETURN_TYPE_COMPENSATION_REQUEST: u8 = 0x01;
pub const OP_RETURN_TYPE_VOTE: u8 = 0x02;

pub const HASH160_LEN: usize = 20;
pub const COMPENSATION_REQUEST_LEN: usize = 2 + HASH160_LEN + 8;
/// Length of a vote payload without its pairs.
pub const VOTE_HEADER_LEN: usize = 2 + HASH160_LEN + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadType {
    CompensationRequest,
    Vote,
}

impl PayloadType {
    pub fn from_byte(byte: u8) -> Result<Self, PayloadError> {
        match byte {
            OP_RETURN_TYPE_COMPENSATION_REQUEST => Ok(Self::CompensationRequest),
            OP_RETURN_TYPE_VOTE => Ok(Self::Vote),
            other => Err(PayloadError::UnknownType(other)),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::CompensationRequest => OP_RETURN_TYPE_COMPENSATION_REQUEST,
            Self::Vote => OP_RETURN_TYPE_VOTE,
        }
    }
}

/// Type and version bytes common to every payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayloadHeader {
    pub payload_type: PayloadType,
    pub version: u8,
}

impl PayloadHeader {
    pub fn parse(data: &[u8]) -> Result<Self, PayloadError> {
        match data {
            [type_byte, version, ..] => Ok(Self {
                payload_type: PayloadType::from_byte(*type_byte)?,
                version: *version,
            }),
            _ => Err(PayloadError::TooShort(data.len())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompensationRequestPayload {
    pub version: u8,
    /// Hash160 of the off-chain request document.
    pub hash: [u8; HASH160_LEN],
    pub requested_amount: Amount,
}

impl CompensationRequestPayload {
    pub fn decode(data: &[u8]) -> Result<Self, PayloadError> {
        if data.len() != COMPENSATION_REQUEST_LEN {
            return Err(PayloadError::InvalidLength {
                expected: COMPENSATION_REQUEST_LEN,
                actual: data.len(),
            });
        }
        if data[0] != OP_RETURN_TYPE_COMPENSATION_REQUEST {
            return Err(PayloadError::UnknownType(data[0]));
        }
        let mut hash = [0u8; HASH160_LEN];
        hash.copy_from_slice(&data[2..2 + HASH160_LEN]);
        let mut amount = [0u8; 8];
        amount.copy_from_slice(&data[2 + HASH160_LEN..]);
        Ok(Self {
            version: data[1],
            hash,
            requested_amount: Amount::new(u64::from_be_bytes(amount)),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(COMPENSATION_REQUEST_LEN);
        out.push(OP_RETURN_TYPE_COMPENSATION_REQUEST);
        out.push(self.version);
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(&self.requested_amount.sat().to_be_bytes());
        out
    }
}

/// One byte of vote bitmaps: which items were voted on and which accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VotePair {
    pub voted: u8,
    pub accepted: u8,
}

impl VotePair {
    /// An accepted bit is only meaningful where the voted bit is set.
    pub fn is_consistent(&self) -> bool {
        self.accepted & !self.voted == 0
    }

    /// Per-item decisions for the eight items this pair covers.
    pub fn decisions(&self) -> [Option<bool>; 8] {
        let mut out = [None; 8];
        for (bit, slot) in out.iter_mut().enumerate() {
            if self.voted & (1 << bit) != 0 {
                *slot = Some(self.accepted & (1 << bit) != 0);
            }
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VotePayload {
    pub version: u8,
    /// Hash160 of the voter's compensation request collection.
    pub collection_hash: [u8; HASH160_LEN],
    pub pairs: Vec<VotePair>,
}

impl VotePayload {
    pub fn decode(data: &[u8]) -> Result<Self, PayloadError> {
        if data.len() < VOTE_HEADER_LEN {
            return Err(PayloadError::TooShort(data.len()));
        }
        if data[0] != OP_RETURN_TYPE_VOTE {
            return Err(PayloadError::UnknownType(data[0]));
        }
        let count = data[VOTE_HEADER_LEN - 1];
        if count % 2 != 0 {
            return Err(PayloadError::OddVoteCount(count));
        }
        let expected = VOTE_HEADER_LEN + 2 * count as usize;
        if data.len() != expected {
            return Err(PayloadError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }

        let mut collection_hash = [0u8; HASH160_LEN];
        collection_hash.copy_from_slice(&data[2..2 + HASH160_LEN]);
        let pairs: Vec<VotePair> = data[VOTE_HEADER_LEN..]
            .chunks_exact(2)
            .map(|c| VotePair {
                voted: c[0],
                accepted: c[1],
            })
            .collect();
        if let Some(bad) = pairs.iter().position(|p| !p.is_consistent()) {
            return Err(PayloadError::AcceptedWithoutVote(bad));
        }

        Ok(Self {
            version: data[1],
            collection_hash,
            pairs,
        })
    }

    /// Encode the payload. Fails if the pair count does not fit the wire
    /// format (even and below 256).
    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        let count = u8::try_from(self.pairs.len()).map_err(|_| PayloadError::InvalidLength {
            expected: VOTE_HEADER_LEN + 2 * u8::MAX as usize,
            actual: VOTE_HEADER_LEN + 2 * self.pairs.len(),
        })?;
        if count % 2 != 0 {
            return Err(PayloadError::OddVoteCount(count));
        }
        let mut out = Vec::with_capacity(VOTE_HEADER_LEN + 2 * self.pairs.len());
        out.push(OP_RETURN_TYPE_VOTE);
        out.push(self.version);
        out.extend_from_slice(&self.collection_hash);
        out.push(count);
        for pair in &self.pairs {
            out.push(pair.voted);
            out.push(pair.accepted);
        }
        Ok(out)
    }
}
