//! # Double Elimination
//!
//! The shape of the winners and losers bracket is taken from a static table (see
//! [`structures`]). Participant counts between the supported sizes are rounded up and the
//! missing participants are spread over the first round as byes.
pub mod structures;
mod table;

use crate::bracket::{BracketKind, BracketStats};
use crate::graph::{BracketSection, ExpectedRound, Inconsistency, Link, MatchGraph, RoundMarker};
use crate::seeding::Seed;
use crate::{EntrantSpot, Error, Result, TournamentId};

use self::structures::Structure;

/// A double elimination bracket for a fixed number of participants.
#[derive(Clone, Debug)]
pub struct DoubleElimination {
    structure: &'static Structure,
    participants: usize,
    full_double_elimination: bool,
}

impl DoubleElimination {
    /// Creates a new `DoubleElimination` bracket for `participants` participants.
    ///
    /// If `full_double_elimination` is `false` the bracket ends after a single grand final.
    /// Otherwise a reset match follows the grand final.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if `participants` cannot be seated into any supported bracket.
    pub fn new(participants: usize, full_double_elimination: bool) -> Result<Self> {
        let structure = structures::lookup(participants)?;

        log::debug!(
            "Creating a new DoubleElimination bracket with {} participants (size {})",
            participants,
            structure.participants
        );

        Ok(Self {
            structure,
            participants,
            full_double_elimination,
        })
    }

    #[inline]
    pub fn structure(&self) -> &'static Structure {
        self.structure
    }

    /// Returns the number of slots in the first round.
    #[inline]
    pub fn bracket_size(&self) -> usize {
        self.structure.participants
    }

    /// Returns the number of empty slots in the first round.
    #[inline]
    pub fn byes(&self) -> usize {
        self.bracket_size() - self.participants
    }

    #[inline]
    pub fn grand_final_matches(&self) -> usize {
        if self.full_double_elimination {
            2
        } else {
            1
        }
    }

    /// Returns the total number of matches. The table always includes the reset match.
    #[inline]
    pub fn total_matches(&self) -> usize {
        self.structure.total_matches - (2 - self.grand_final_matches())
    }

    pub fn expected_rounds(&self) -> Vec<ExpectedRound> {
        let winners = self.structure.winners_rounds.iter().enumerate().map(|(index, matches)| {
            ExpectedRound::new(BracketSection::Winners, index as u32 + 1, *matches)
        });

        let losers = self.structure.losers_rounds.iter().enumerate().map(|(index, matches)| {
            ExpectedRound::new(BracketSection::Losers, index as u32 + 1, *matches)
        });

        let mut rounds: Vec<ExpectedRound> = winners.chain(losers).collect();
        rounds.push(ExpectedRound::new(BracketSection::GrandFinal, 1, 1));

        if self.full_double_elimination {
            rounds.push(ExpectedRound::new(BracketSection::GrandFinalReset, 1, 1));
        }

        rounds
    }

    /// Builds and validates the [`MatchGraph`] with `seeds` placed into the first winners round.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParticipantCount`] if the number of `seeds` does not match the
    /// bracket and [`Error::Inconsistent`] if the built graph is invalid.
    pub fn build(&self, tournament_id: TournamentId, seeds: &[Seed]) -> Result<MatchGraph> {
        if seeds.len() != self.participants {
            return Err(Error::InvalidParticipantCount {
                count: seeds.len(),
                min: self.participants,
                max: self.participants,
            });
        }

        let mut graph = MatchGraph::with_capacity(tournament_id, self.total_matches());

        let rounds = self.create(&mut graph);
        self.link(&mut graph, &rounds)?;
        self.place(&mut graph, &rounds, seeds)?;

        graph.validate(&self.expected_rounds())?;

        log::debug!(
            "Built DoubleElimination bracket with {} matches for tournament {}",
            graph.len(),
            tournament_id
        );

        Ok(graph)
    }

    fn create(&self, graph: &mut MatchGraph) -> Rounds {
        let winners: Vec<Vec<usize>> = self
            .structure
            .winners_rounds
            .iter()
            .enumerate()
            .map(|(index, matches)| {
                (0..*matches)
                    .map(|_| graph.push(BracketSection::Winners, index as u32 + 1, None))
                    .collect()
            })
            .collect();

        let num_rounds = self.structure.losers_rounds.len();
        let losers: Vec<Vec<usize>> = self
            .structure
            .losers_rounds
            .iter()
            .enumerate()
            .map(|(index, matches)| {
                let marker = match (num_rounds - index, *matches) {
                    (1, 1) => Some(RoundMarker::LoserFinal),
                    (2, 1) => Some(RoundMarker::LoserSemifinal),
                    _ => None,
                };

                (0..*matches)
                    .map(|_| graph.push(BracketSection::Losers, index as u32 + 1, marker))
                    .collect()
            })
            .collect();

        let grand_final = graph.push(BracketSection::GrandFinal, 1, None);
        let reset = if self.full_double_elimination {
            Some(graph.push(BracketSection::GrandFinalReset, 1, None))
        } else {
            None
        };

        Rounds {
            winners,
            losers,
            grand_final,
            reset,
        }
    }

    fn link(&self, graph: &mut MatchGraph, rounds: &Rounds) -> Result<()> {
        for pair in rounds.winners.windows(2) {
            graph.link_pairs(&pair[0], &pair[1])?;
        }

        // Losers rounds that receive fresh losers from the winners bracket keep their size,
        // pure losers rounds halve it.
        for pair in rounds.losers.windows(2) {
            if pair[0].len() == pair[1].len() {
                for (from, to) in pair[0].iter().zip(&pair[1]) {
                    graph.link_winner(*from, Link::new(*to, 0))?;
                }
            } else {
                graph.link_pairs(&pair[0], &pair[1])?;
            }
        }

        // A winners round twice the size of its target feeds adjacent pairs, which keeps two
        // bye matches apart whenever the byes allow it. Other rounds feed round-robin.
        for (round, feed) in self.structure.loser_feeds.iter().enumerate() {
            let target = &rounds.losers[feed - 1];
            let source = &rounds.winners[round];
            let paired = source.len() == 2 * target.len();

            for (position, from) in source.iter().enumerate() {
                let to = if paired {
                    target[position / 2]
                } else {
                    target[position % target.len()]
                };

                let slot = graph.first_free_slot(to).ok_or_else(|| {
                    let sequence = graph.get(to).map(|node| node.sequence).unwrap_or_default();
                    Inconsistency::DoubleFedSlot { sequence, slot: 1 }
                })?;

                graph.link_loser(*from, Link::new(to, slot))?;
            }
        }

        graph.link_winner(rounds.winners_final(), Link::new(rounds.grand_final, 0))?;
        graph.link_winner(rounds.losers_final(), Link::new(rounds.grand_final, 1))?;

        match rounds.reset {
            Some(reset) => {
                graph.link_winner(rounds.grand_final, Link::new(reset, 0))?;
                graph.link_loser(rounds.grand_final, Link::new(reset, 1))?;
                graph.mark_terminal(reset);
            }
            None => graph.mark_terminal(rounds.grand_final),
        }

        Ok(())
    }

    /// Places the seeds into the first winners round, spreading the byes evenly over all
    /// matches. A match with a bye gets its participant in the first slot.
    fn place(&self, graph: &mut MatchGraph, rounds: &Rounds, seeds: &[Seed]) -> Result<()> {
        let first_round = &rounds.winners[0];
        let matches = first_round.len();
        let byes = self.byes();

        let mut seeds = seeds.iter().map(|seed| seed.participant.id);

        for (position, index) in first_round.iter().enumerate() {
            let has_bye = byes * (matches - position) / matches
                - byes * (matches - position - 1) / matches
                > 0;

            graph.place(*index, 0, EntrantSpot::new(seeds.next()))?;

            let second = if has_bye {
                EntrantSpot::Empty
            } else {
                EntrantSpot::new(seeds.next())
            };
            graph.place(*index, 1, second)?;
        }

        Ok(())
    }

    pub fn stats(&self) -> BracketStats {
        BracketStats {
            kind: BracketKind::DoubleElimination,
            participants: self.participants,
            bracket_size: self.bracket_size(),
            byes: self.byes(),
            rounds: self.structure.winners_rounds.len()
                + self.structure.losers_rounds.len()
                + self.grand_final_matches(),
            total_matches: self.total_matches(),
            preliminary_matches: 0,
            winners_matches: self.structure.winners_matches(),
            losers_matches: self.structure.losers_matches(),
            grand_final_matches: self.grand_final_matches(),
            third_place_match: false,
        }
    }
}

/// Arena indices of the created matches.
struct Rounds {
    winners: Vec<Vec<usize>>,
    losers: Vec<Vec<usize>>,
    grand_final: usize,
    reset: Option<usize>,
}

impl Rounds {
    fn winners_final(&self) -> usize {
        self.winners.last().and_then(|round| round.first()).copied().unwrap_or(0)
    }

    fn losers_final(&self) -> usize {
        self.losers.last().and_then(|round| round.first()).copied().unwrap_or(0)
    }
}
