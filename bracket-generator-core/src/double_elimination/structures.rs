//! Lookup of the static double elimination shapes.
//!
//! The losers bracket of a double elimination bracket does not follow a simple formula, so
//! only the sizes listed in the table are supported. Other participant counts are rounded up to
//! the next supported size and filled with byes.
use thiserror::Error;

use super::table::STRUCTURES;
use crate::Result;

/// The smallest supported bracket size.
pub const MIN_SIZE: usize = 4;
/// The largest supported bracket size.
pub const MAX_SIZE: usize = 128;

/// The shape of a double elimination bracket with `participants` slots.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Structure {
    pub participants: usize,
    /// The number of matches in every winners round.
    pub winners_rounds: &'static [usize],
    /// The number of matches in every losers round.
    pub losers_rounds: &'static [usize],
    /// The 1-based losers round that receives the losers of every winners round.
    pub loser_feeds: &'static [usize],
    /// The total number of matches including the grand final and its reset.
    pub total_matches: usize,
}

impl Structure {
    #[inline]
    pub fn winners_matches(&self) -> usize {
        self.winners_rounds.iter().sum()
    }

    #[inline]
    pub fn losers_matches(&self) -> usize {
        self.losers_rounds.iter().sum()
    }

    /// Checks that the entry describes a complete double elimination bracket.
    ///
    /// # Errors
    ///
    /// Returns the first [`StructureError`] found.
    pub fn validate(&self) -> std::result::Result<(), StructureError> {
        let size = self.participants;

        if !size.is_power_of_two() || size < MIN_SIZE {
            return Err(StructureError::WinnersShape { size });
        }

        let mut expected = size / 2;
        for matches in self.winners_rounds {
            if *matches != expected {
                return Err(StructureError::WinnersShape { size });
            }

            expected /= 2;
        }

        if expected != 0 {
            return Err(StructureError::WinnersShape { size });
        }

        if self.winners_matches() != size - 1 {
            return Err(StructureError::WinnersSum {
                size,
                expected: size - 1,
                found: self.winners_matches(),
            });
        }

        // Free slots of every losers round after the survivors of the previous losers round
        // have been sent into it.
        let mut free = Vec::with_capacity(self.losers_rounds.len());
        for (index, matches) in self.losers_rounds.iter().enumerate() {
            let incoming = match index.checked_sub(1).map(|prev| self.losers_rounds[prev]) {
                None if *matches == size / 4 => 0,
                Some(prev) if prev == *matches => *matches,
                Some(prev) if prev == *matches * 2 => prev,
                _ => return Err(StructureError::LosersShape { size }),
            };

            free.push(matches * 2 - incoming);
        }

        if self.losers_rounds.last() != Some(&1) {
            return Err(StructureError::LosersShape { size });
        }

        if self.losers_matches() != size - 2 {
            return Err(StructureError::LosersSum {
                size,
                expected: size - 2,
                found: self.losers_matches(),
            });
        }

        let total = self.winners_matches() + self.losers_matches() + 2;
        if total != self.total_matches {
            return Err(StructureError::Total {
                size,
                expected: self.total_matches,
                found: total,
            });
        }

        if self.loser_feeds.len() != self.winners_rounds.len() {
            return Err(StructureError::Feeds { size, round: 0 });
        }

        let mut incoming = vec![0; self.losers_rounds.len()];
        let mut prev = 0;
        for (round, feed) in self.loser_feeds.iter().enumerate() {
            if *feed <= prev || *feed > self.losers_rounds.len() {
                return Err(StructureError::Feeds {
                    size,
                    round: round + 1,
                });
            }

            incoming[feed - 1] += self.winners_rounds[round];
            prev = *feed;
        }

        for (index, (incoming, free)) in incoming.into_iter().zip(free).enumerate() {
            if incoming != free {
                return Err(StructureError::Feeds {
                    size,
                    round: index + 1,
                });
            }
        }

        Ok(())
    }
}

/// An invalid entry in the double elimination table.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("winners rounds of size {size} do not halve down to a final")]
    WinnersShape { size: usize },
    #[error("winners rounds of size {size} have {found} matches, expected {expected}")]
    WinnersSum {
        size: usize,
        expected: usize,
        found: usize,
    },
    #[error("losers rounds of size {size} do not alternate down to a final")]
    LosersShape { size: usize },
    #[error("losers rounds of size {size} have {found} matches, expected {expected}")]
    LosersSum {
        size: usize,
        expected: usize,
        found: usize,
    },
    #[error("size {size} declares {expected} matches, but has {found}")]
    Total {
        size: usize,
        expected: usize,
        found: usize,
    },
    #[error("losers of size {size} do not fit into losers round {round}")]
    Feeds { size: usize, round: usize },
}

/// Returns the size of the bracket that seats `participants`.
#[inline]
pub fn bracket_size(participants: usize) -> usize {
    participants.next_power_of_two().max(MIN_SIZE)
}

/// Returns an iterator over all supported bracket sizes.
pub fn supported_sizes() -> impl Iterator<Item = usize> {
    STRUCTURES.iter().map(|structure| structure.participants)
}

/// Returns the validated [`Structure`] seating `participants`.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidParticipantCount`] for less than 2 participants,
/// [`crate::Error::UnsupportedSize`] if no entry seats `participants` and [`crate::Error::Table`] if the entry
/// is invalid.
pub fn lookup(participants: usize) -> Result<&'static Structure> {
    if participants < 2 {
        return Err(crate::Error::InvalidParticipantCount {
            count: participants,
            min: 2,
            max: MAX_SIZE,
        });
    }

    let size = bracket_size(participants);

    let structure = STRUCTURES
        .iter()
        .find(|structure| structure.participants == size)
        .ok_or(crate::Error::UnsupportedSize { participants, size })?;

    structure.validate()?;

    Ok(structure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_valid() {
        for structure in &STRUCTURES {
            structure.validate().unwrap();
        }

        assert_eq!(
            supported_sizes().collect::<Vec<_>>(),
            vec![4, 8, 16, 32, 64, 128]
        );
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(2).unwrap().participants, 4);
        assert_eq!(lookup(3).unwrap().participants, 4);
        assert_eq!(lookup(8).unwrap().participants, 8);
        assert_eq!(lookup(9).unwrap().participants, 16);
        assert_eq!(lookup(128).unwrap().participants, 128);

        assert_eq!(
            lookup(200).unwrap_err(),
            crate::Error::UnsupportedSize {
                participants: 200,
                size: 256
            }
        );
        assert_eq!(
            lookup(129).unwrap_err(),
            crate::Error::UnsupportedSize {
                participants: 129,
                size: 256
            }
        );
        assert!(matches!(
            lookup(1).unwrap_err(),
            crate::Error::InvalidParticipantCount { count: 1, .. }
        ));
    }

    #[test]
    fn test_lookup_eight() {
        let structure = lookup(8).unwrap();

        assert_eq!(structure.winners_matches(), 7);
        assert_eq!(structure.losers_matches(), 6);
        assert_eq!(structure.total_matches, 15);
    }

    #[test]
    fn test_lookup_sixteen_feeds() {
        let structure = lookup(16).unwrap();
        assert_eq!(structure.loser_feeds, &[1, 2, 4, 6]);
    }

    #[test]
    fn test_validate_broken_entries() {
        let structure = Structure {
            participants: 8,
            winners_rounds: &[4, 2, 1],
            losers_rounds: &[2, 2, 1, 1],
            loser_feeds: &[1, 2, 4],
            total_matches: 16,
        };
        assert_eq!(
            structure.validate().unwrap_err(),
            StructureError::Total {
                size: 8,
                expected: 16,
                found: 15
            }
        );

        let structure = Structure {
            participants: 8,
            winners_rounds: &[4, 2, 1],
            losers_rounds: &[2, 2, 1, 1],
            loser_feeds: &[1, 3, 4],
            total_matches: 15,
        };
        assert_eq!(
            structure.validate().unwrap_err(),
            StructureError::Feeds { size: 8, round: 2 }
        );

        let structure = Structure {
            participants: 8,
            winners_rounds: &[4, 2, 1],
            losers_rounds: &[2, 1, 1, 1],
            loser_feeds: &[1, 2, 4],
            total_matches: 15,
        };
        assert_eq!(
            structure.validate().unwrap_err(),
            StructureError::LosersSum {
                size: 8,
                expected: 6,
                found: 5
            }
        );

        let structure = Structure {
            participants: 8,
            winners_rounds: &[4, 2, 2],
            losers_rounds: &[2, 2, 1, 1],
            loser_feeds: &[1, 2, 4],
            total_matches: 15,
        };
        assert_eq!(
            structure.validate().unwrap_err(),
            StructureError::WinnersShape { size: 8 }
        );
    }
}
