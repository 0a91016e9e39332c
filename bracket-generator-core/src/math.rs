//! # Bracket Math
//!
//! Computes the numeric shape of a single elimination bracket from the number of participants.
//!
//! A bracket whose size is not a power of two is reduced to the next smaller power of two by a
//! preliminary round (round `0`). The participants that do not play in the preliminary round
//! advance directly into the first round. This guarantees that no participant receives more
//! than one bye and that exactly `participants - 1` matches decide the winner.
use std::fmt::{self, Display, Formatter};

use crate::utils::NumExt;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The minimum number of participants of any bracket.
pub const MIN_PARTICIPANTS: usize = 2;

/// The maximum number of participants of a single elimination bracket.
pub const MAX_PARTICIPANTS: usize = 1024;

/// The numeric shape of a single elimination bracket.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BracketShape {
    pub participants: usize,
    /// The smallest power of two that is `>= participants`.
    pub upper_power_of_two: usize,
    /// `upper_power_of_two / 2`.
    pub lower_power_of_two: usize,
    pub needs_preliminary_round: bool,
    pub preliminary_participants: usize,
    pub preliminary_matches: usize,
    /// The number of participants advancing into the first round without playing in the
    /// preliminary round.
    pub first_round_byes: usize,
    pub first_round_matches: usize,
    /// The number of rounds including the preliminary round.
    pub total_rounds: usize,
    pub rounds: Vec<RoundShape>,
    pub third_place_match: bool,
    pub total_matches: usize,
}

impl BracketShape {
    /// Computes the shape of a bracket with `participants` participants.
    ///
    /// A third place match is only included if it was requested and the bracket has a true
    /// semifinal, i.e. at least 4 participants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParticipantCount`] if `participants` is not within
    /// [`MIN_PARTICIPANTS`]`..=`[`MAX_PARTICIPANTS`].
    pub fn new(participants: usize, third_place_match: bool) -> Result<Self> {
        if !(MIN_PARTICIPANTS..=MAX_PARTICIPANTS).contains(&participants) {
            return Err(Error::InvalidParticipantCount {
                count: participants,
                min: MIN_PARTICIPANTS,
                max: MAX_PARTICIPANTS,
            });
        }

        let upper_power_of_two = participants.next_power_of_two();
        let lower_power_of_two = upper_power_of_two / 2;

        // An exact power of two never needs a preliminary round. The "preliminary" round of
        // such a bracket would seat every participant and is just the first round.
        let needs_preliminary_round = participants > lower_power_of_two
            && participants != upper_power_of_two;

        let (main_size, preliminary_participants) = if needs_preliminary_round {
            (
                lower_power_of_two,
                (participants - lower_power_of_two) * 2,
            )
        } else {
            (participants, 0)
        };

        let preliminary_matches = preliminary_participants / 2;
        let first_round_byes = if needs_preliminary_round {
            lower_power_of_two - preliminary_matches
        } else {
            0
        };

        let mut rounds = Vec::with_capacity(main_size.ilog2_ceil() + 1);
        if needs_preliminary_round {
            rounds.push(RoundShape {
                round: 0,
                matches: preliminary_matches,
                name: RoundName::Preliminary,
            });
        }

        let mut matches = main_size / 2;
        let mut round = 1;
        while matches > 0 {
            rounds.push(RoundShape {
                round,
                matches,
                name: RoundName::from_matches(matches),
            });

            matches /= 2;
            round += 1;
        }

        if third_place_match && main_size < 4 {
            log::debug!(
                "Dropping third place match for {} participants: no semifinal",
                participants
            );
        }
        let third_place_match = third_place_match && main_size >= 4;

        let mut total_matches = participants - 1;
        if third_place_match {
            total_matches += 1;
        }

        let this = Self {
            participants,
            upper_power_of_two,
            lower_power_of_two,
            needs_preliminary_round,
            preliminary_participants,
            preliminary_matches,
            first_round_byes,
            first_round_matches: main_size / 2,
            total_rounds: rounds.len(),
            rounds,
            third_place_match,
            total_matches,
        };

        log::trace!("Computed bracket shape: {:?}", this);

        Ok(this)
    }

    /// Returns the number of participants in the first round after the preliminary round.
    #[inline]
    pub fn main_bracket_size(&self) -> usize {
        self.first_round_matches * 2
    }

    /// Returns the number of participants seated directly into the first round.
    #[inline]
    pub fn direct_participants(&self) -> usize {
        if self.needs_preliminary_round {
            self.first_round_byes
        } else {
            self.participants
        }
    }

    /// Returns the shapes of the rounds after the preliminary round.
    pub fn main_rounds(&self) -> impl Iterator<Item = &RoundShape> {
        self.rounds.iter().filter(|round| round.round > 0)
    }

    /// Returns the index of the final round.
    #[inline]
    pub fn final_round(&self) -> u32 {
        self.main_bracket_size().ilog2_ceil() as u32
    }

    /// Returns the index of the semifinal round if the bracket has one.
    pub fn semifinal_round(&self) -> Option<u32> {
        if self.main_bracket_size() >= 4 {
            Some(self.final_round() - 1)
        } else {
            None
        }
    }
}

/// The shape of a single round.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoundShape {
    pub round: u32,
    pub matches: usize,
    pub name: RoundName,
}

/// The human-readable name of a round, derived from the number of matches left in the round
/// rather than from its index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RoundName {
    Preliminary,
    Final,
    Semifinal,
    Quarterfinal,
    /// A round with the given number of participants.
    RoundOf(usize),
}

impl RoundName {
    fn from_matches(matches: usize) -> Self {
        match matches {
            1 => Self::Final,
            2 => Self::Semifinal,
            4 => Self::Quarterfinal,
            n => Self::RoundOf(n * 2),
        }
    }
}

impl Display for RoundName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preliminary => f.write_str("Preliminary Round"),
            Self::Final => f.write_str("Final"),
            Self::Semifinal => f.write_str("Semifinal"),
            Self::Quarterfinal => f.write_str("Quarterfinal"),
            Self::RoundOf(n) => write!(f, "Round of {}", n),
        }
    }
}
