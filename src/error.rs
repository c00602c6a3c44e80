//! Per-hand error taxonomy.
//!
//! None of these are fatal: every variant means "this record or hand
//! contributes nothing" and maps onto a [`SkipReason`] that the batch
//! summary counts.

use crate::models::SkipReason;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandError {
    #[error("malformed hand record: {0}")]
    MalformedRecord(String),

    #[error("hand {hand_id} has no player with a positive win")]
    NoWinner { hand_id: u64 },

    #[error("focal player {player} is not seated in hand {hand_id}")]
    MissingFocalPlayer { hand_id: u64, player: String },

    #[error("winner {player} of hand {hand_id} is anonymized")]
    AnonymizedWinner { hand_id: u64, player: String },

    #[error("hand {hand_id} has no eligible contributors to apportion rake")]
    InsufficientRakeData { hand_id: u64 },
}

impl HandError {
    /// Shorthand for a malformed-record error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        HandError::MalformedRecord(msg.into())
    }

    /// The skip bucket this error is counted under.
    pub fn reason(&self) -> SkipReason {
        match self {
            HandError::MalformedRecord(_) => SkipReason::Malformed,
            HandError::NoWinner { .. } => SkipReason::NoWinner,
            HandError::MissingFocalPlayer { .. } => SkipReason::MissingFocalPlayer,
            HandError::AnonymizedWinner { .. } => SkipReason::AnonymizedWinner,
            HandError::InsufficientRakeData { .. } => SkipReason::InsufficientRakeData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_mapping() {
        assert_eq!(HandError::malformed("x").reason(), SkipReason::Malformed);
        assert_eq!(HandError::NoWinner { hand_id: 1 }.reason(), SkipReason::NoWinner);
        assert_eq!(
            HandError::MissingFocalPlayer {
                hand_id: 1,
                player: "hero".to_string()
            }
            .reason(),
            SkipReason::MissingFocalPlayer
        );
    }

    #[test]
    fn test_display() {
        let err = HandError::NoWinner { hand_id: 42 };
        assert_eq!(err.to_string(), "hand 42 has no player with a positive win");
    }
}
