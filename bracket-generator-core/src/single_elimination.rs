//! # Single Elimination
//!
//! A single elimination bracket is built in three passes over a [`MatchGraph`]: all matches are
//! created first, then linked and finally the seeded participants are placed into the starting
//! slots. Linking and placement both walk the same [`SlotPlan`].
use crate::bracket::{BracketKind, BracketStats};
use crate::graph::{BracketSection, ExpectedRound, Link, MatchGraph, RoundMarker};
use crate::math::BracketShape;
use crate::seeding::Seed;
use crate::{EntrantSpot, Error, Result, TournamentId};

/// What fills a starting slot of the first main round.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotSource {
    /// The participant with the given 0-based seed index advances directly.
    Seed(usize),
    /// The winner of the preliminary match with the given index.
    Preliminary(usize),
}

/// The order in which the starting slots are filled.
///
/// Slot `n` of the plan is slot `n % 2` of the `n / 2`th match in the first main round.
/// Participants that advance directly take the first slots, the winners of the preliminary
/// matches take the remaining slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotPlan {
    pub starting: Vec<SlotSource>,
    /// The two 0-based seed indices playing in every preliminary match.
    pub preliminary: Vec<[usize; 2]>,
}

impl SlotPlan {
    pub fn new(shape: &BracketShape) -> Self {
        let direct = shape.direct_participants();

        let mut starting = Vec::with_capacity(shape.main_bracket_size());
        starting.extend((0..direct).map(SlotSource::Seed));
        starting.extend((0..shape.preliminary_matches).map(SlotSource::Preliminary));

        let preliminary = (0..shape.preliminary_matches)
            .map(|index| [direct + index * 2, direct + index * 2 + 1])
            .collect();

        Self {
            starting,
            preliminary,
        }
    }

    /// Returns the position of a starting slot as `(match, slot)` within the first main round.
    #[inline]
    pub fn position(slot: usize) -> (usize, usize) {
        (slot / 2, slot % 2)
    }
}

/// A single elimination bracket for a fixed number of participants.
#[derive(Clone, Debug)]
pub struct SingleElimination {
    shape: BracketShape,
    plan: SlotPlan,
}

impl SingleElimination {
    /// Creates a new `SingleElimination` bracket for `participants` participants.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if `participants` is not a valid bracket size. See
    /// [`BracketShape::new`].
    pub fn new(participants: usize, third_place_match: bool) -> Result<Self> {
        let shape = BracketShape::new(participants, third_place_match)?;
        let plan = SlotPlan::new(&shape);

        log::debug!(
            "Creating a new SingleElimination bracket with {} participants ({} preliminary matches)",
            participants,
            shape.preliminary_matches
        );

        Ok(Self { shape, plan })
    }

    #[inline]
    pub fn shape(&self) -> &BracketShape {
        &self.shape
    }

    #[inline]
    pub fn plan(&self) -> &SlotPlan {
        &self.plan
    }

    /// Returns the number of matches every round must have after generation.
    pub fn expected_rounds(&self) -> Vec<ExpectedRound> {
        let mut rounds: Vec<ExpectedRound> = self
            .shape
            .rounds
            .iter()
            .map(|round| ExpectedRound::new(BracketSection::Winners, round.round, round.matches))
            .collect();

        if self.shape.third_place_match {
            rounds.push(ExpectedRound::new(
                BracketSection::ThirdPlace,
                self.shape.final_round(),
                1,
            ));
        }

        rounds
    }

    /// Builds and validates the [`MatchGraph`] with `seeds` placed into their slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParticipantCount`] if the number of `seeds` does not match the
    /// bracket and [`Error::Inconsistent`] if the built graph is invalid.
    pub fn build(&self, tournament_id: TournamentId, seeds: &[Seed]) -> Result<MatchGraph> {
        if seeds.len() != self.shape.participants {
            return Err(Error::InvalidParticipantCount {
                count: seeds.len(),
                min: self.shape.participants,
                max: self.shape.participants,
            });
        }

        let mut graph = MatchGraph::with_capacity(tournament_id, self.shape.total_matches);

        let rounds = self.create(&mut graph);
        self.link(&mut graph, &rounds)?;
        self.place(&mut graph, &rounds, seeds)?;

        graph.validate(&self.expected_rounds())?;

        log::debug!(
            "Built SingleElimination bracket with {} matches for tournament {}",
            graph.len(),
            tournament_id
        );

        Ok(graph)
    }

    fn create(&self, graph: &mut MatchGraph) -> Rounds {
        let final_round = self.shape.final_round();
        let semifinal_round = self.shape.semifinal_round();

        let mut rounds = Rounds {
            preliminary: Vec::with_capacity(self.shape.preliminary_matches),
            main: Vec::with_capacity(final_round as usize),
            third_place: None,
        };

        for _ in 0..self.shape.preliminary_matches {
            rounds
                .preliminary
                .push(graph.push(BracketSection::Winners, 0, None));
        }

        for round in self.shape.main_rounds() {
            let marker = if round.round == final_round {
                Some(RoundMarker::Final)
            } else if Some(round.round) == semifinal_round {
                Some(RoundMarker::Semifinal)
            } else {
                None
            };

            let indices = (0..round.matches)
                .map(|_| graph.push(BracketSection::Winners, round.round, marker))
                .collect();

            rounds.main.push(indices);
        }

        if self.shape.third_place_match {
            rounds.third_place = Some(graph.push(BracketSection::ThirdPlace, final_round, None));
        }

        rounds
    }

    fn link(&self, graph: &mut MatchGraph, rounds: &Rounds) -> Result<()> {
        // Every boundary except the one into the final.
        if rounds.main.len() > 2 {
            for pair in rounds.main[..rounds.main.len() - 1].windows(2) {
                graph.link_pairs(&pair[0], &pair[1])?;
            }
        }

        let final_index = rounds.final_index();

        if let [.., semifinals, _] = rounds.main.as_slice() {
            for (slot, index) in semifinals.iter().enumerate() {
                graph.link_winner(*index, Link::new(final_index, slot))?;

                if let Some(third_place) = rounds.third_place {
                    graph.link_loser(*index, Link::new(third_place, slot))?;
                }
            }
        }

        for (slot, source) in self.plan.starting.iter().enumerate() {
            if let SlotSource::Preliminary(preliminary) = source {
                let (position, slot) = SlotPlan::position(slot);

                graph.link_winner(
                    rounds.preliminary[*preliminary],
                    Link::new(rounds.main[0][position], slot),
                )?;
            }
        }

        graph.mark_terminal(final_index);
        if let Some(third_place) = rounds.third_place {
            graph.mark_terminal(third_place);
        }

        Ok(())
    }

    fn place(&self, graph: &mut MatchGraph, rounds: &Rounds, seeds: &[Seed]) -> Result<()> {
        for (slot, source) in self.plan.starting.iter().enumerate() {
            if let SlotSource::Seed(seed) = source {
                let (position, slot) = SlotPlan::position(slot);

                graph.place(
                    rounds.main[0][position],
                    slot,
                    EntrantSpot::Entrant(seeds[*seed].participant.id),
                )?;
            }
        }

        for (index, pair) in rounds.preliminary.iter().zip(&self.plan.preliminary) {
            for (slot, seed) in pair.iter().enumerate() {
                graph.place(*index, slot, EntrantSpot::Entrant(seeds[*seed].participant.id))?;
            }
        }

        Ok(())
    }

    pub fn stats(&self) -> BracketStats {
        BracketStats {
            kind: BracketKind::SingleElimination,
            participants: self.shape.participants,
            bracket_size: self.shape.upper_power_of_two,
            byes: self.shape.first_round_byes,
            rounds: self.shape.total_rounds,
            total_matches: self.shape.total_matches,
            preliminary_matches: self.shape.preliminary_matches,
            winners_matches: self.shape.participants - 1,
            losers_matches: 0,
            grand_final_matches: 0,
            third_place_match: self.shape.third_place_match,
        }
    }
}

/// Arena indices of the created matches.
struct Rounds {
    preliminary: Vec<usize>,
    main: Vec<Vec<usize>>,
    third_place: Option<usize>,
}

impl Rounds {
    fn final_index(&self) -> usize {
        // The last main round always holds exactly the final.
        self.main.last().and_then(|round| round.first()).copied().unwrap_or(0)
    }
}
