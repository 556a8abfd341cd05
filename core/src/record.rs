//! Corpus records. Owned by the ingestion process, read-only here.

use crate::{
    error::DataQualityIssue,
    predicate::{Field, Row, Value},
    types::{CivId, LadderId, MapId, MatchId, PatchNumber, PlayerId, Seat, TechId},
};
use serde::{Deserialize, Serialize};

/// A stored average rating. Text that slipped past ingestion is kept
/// as-is so it can be rejected instead of coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatingValue {
    Numeric(f64),
    Malformed(String),
}

impl RatingValue {
    pub fn numeric(&self, match_id: MatchId) -> Result<f64, DataQualityIssue> {
        match self {
            RatingValue::Numeric(v) if v.is_finite() => Ok(*v),
            RatingValue::Numeric(v) => Err(DataQualityIssue::MalformedRating {
                match_id,
                raw: v.to_string(),
            }),
            RatingValue::Malformed(raw) => Err(DataQualityIssue::MalformedRating {
                match_id,
                raw: raw.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,
    pub player1_civ: CivId,
    pub player2_civ: CivId,
    pub player1_flags: u32,
    pub player2_flags: u32,
    pub map_id: MapId,
    pub ladder_id: LadderId,
    pub patch: PatchNumber,
    pub rating: RatingValue,
    pub player1_victory: bool,
    pub player2_victory: bool,
}

impl MatchRecord {
    pub fn player_id(&self, seat: Seat) -> PlayerId {
        match seat {
            Seat::One => self.player1_id,
            Seat::Two => self.player2_id,
        }
    }

    pub fn civ(&self, seat: Seat) -> CivId {
        match seat {
            Seat::One => self.player1_civ,
            Seat::Two => self.player2_civ,
        }
    }

    pub fn flags(&self, seat: Seat) -> u32 {
        match seat {
            Seat::One => self.player1_flags,
            Seat::Two => self.player2_flags,
        }
    }

    pub fn victory(&self, seat: Seat) -> bool {
        match seat {
            Seat::One => self.player1_victory,
            Seat::Two => self.player2_victory,
        }
    }

    /// Seat of the given player, if they played this match.
    pub fn seat_of(&self, player_id: PlayerId) -> Option<Seat> {
        Seat::BOTH.into_iter().find(|s| self.player_id(*s) == player_id)
    }

    pub fn is_civ_mirror(&self) -> bool {
        self.player1_civ == self.player2_civ
    }
}

impl Row for MatchRecord {
    fn get(&self, field: Field) -> Option<Value> {
        Some(match field {
            Field::MatchId => Value::Int(self.id),
            Field::PlayerId(seat) => Value::Int(self.player_id(seat)),
            Field::Civ(seat) => Value::Int(self.civ(seat)),
            Field::Flag { seat, bit } => Value::Bool(self.flags(seat) & (1u32 << bit) != 0),
            Field::Victory(seat) => Value::Bool(self.victory(seat)),
            Field::MapId => Value::Int(self.map_id),
            Field::LadderId => Value::Int(self.ladder_id),
            Field::Patch => Value::Int(self.patch),
            Field::Rating => match self.rating {
                RatingValue::Numeric(v) => Value::Float(v),
                RatingValue::Malformed(_) => return None,
            },
            _ => return None,
        })
    }
}

/// A single in-match event. Only "tech researched" events are aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchActionRecord {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub event_type: i64,
    /// Tech id when `event_type` is the tech-researched type.
    pub event_id: TechId,
    /// Elapsed game time in milliseconds.
    pub time_ms: i64,
}

/// Catalog entry for a researchable technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechRecord {
    pub id: TechId,
    pub name: String,
    pub duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MatchRecord {
        MatchRecord {
            id: 9,
            player1_id: 100,
            player2_id: 200,
            player1_civ: 1,
            player2_civ: 2,
            player1_flags: 0b1000,
            player2_flags: 0,
            map_id: 9,
            ladder_id: 3,
            patch: 61591,
            rating: RatingValue::Numeric(1274.0),
            player1_victory: true,
            player2_victory: false,
        }
    }

    #[test]
    fn malformed_rating_is_rejected_not_coerced() {
        let mut m = sample();
        m.rating = RatingValue::Malformed("1200".into());
        assert!(m.rating.numeric(m.id).is_err());
        assert_eq!(m.get(Field::Rating), None);
    }

    #[test]
    fn seat_lookup() {
        let m = sample();
        assert_eq!(m.seat_of(200), Some(Seat::Two));
        assert_eq!(m.seat_of(300), None);
    }

    #[test]
    fn flag_field_reads_single_bit() {
        let m = sample();
        assert_eq!(m.get(Field::Flag { seat: Seat::One, bit: 3 }), Some(Value::Bool(true)));
        assert_eq!(m.get(Field::Flag { seat: Seat::One, bit: 2 }), Some(Value::Bool(false)));
    }
}
