//! Shared primitive types used across the entire stats pipeline.

use serde::{Deserialize, Serialize};

/// Primary key of a recorded match.
pub type MatchId = i64;

/// A ladder profile id. `0` means "no player" in request payloads.
pub type PlayerId = i64;

pub type CivId = i64;
pub type MapId = i64;
pub type LadderId = i64;
pub type PatchNumber = i64;
pub type TechId = i64;

/// Position of a rule in the opening rule table.
/// Stable: derived tables are keyed by it.
pub type OpeningIndex = usize;

/// A rounded-down rating used as a grouping key.
pub type RatingBucket = i64;

/// Monotonic id assigned by the store to advanced queue entries.
pub type QueueEntryId = i64;

/// Sentinel used in every inclusion list to mean "no restriction".
pub const NO_RESTRICTION: i64 = -1;

/// Which player slot of a match a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    One,
    Two,
}

impl Seat {
    pub const BOTH: [Seat; 2] = [Seat::One, Seat::Two];

    pub fn other(self) -> Seat {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Seat::One => 1,
            Seat::Two => 2,
        }
    }
}

/// Round a rating down to the nearest multiple of `delta`.
pub fn rating_bucket(rating: f64, delta: i64) -> RatingBucket {
    delta * (rating / delta as f64).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_rounds_down_to_delta() {
        assert_eq!(rating_bucket(1274.0, 50), 1250);
        assert_eq!(rating_bucket(1299.9, 50), 1250);
        assert_eq!(rating_bucket(0.0, 50), 0);
    }

    #[test]
    fn bucket_is_idempotent_at_multiples() {
        assert_eq!(rating_bucket(1250.0, 50), 1250);
        assert_eq!(rating_bucket(rating_bucket(1250.0, 50) as f64, 50), 1250);
    }

    #[test]
    fn seat_other_flips() {
        assert_eq!(Seat::One.other(), Seat::Two);
        assert_eq!(Seat::Two.other().other(), Seat::Two);
    }
}
