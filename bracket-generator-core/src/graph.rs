//! # Match Graph
//!
//! Every bracket is built as a [`MatchGraph`] first: an arena of [`MatchNode`]s which refer to
//! each other by their index in the arena. A graph is only handed out after
//! [`MatchGraph::validate`] accepted it, so a caller never sees a half-built bracket.
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::{EntrantSpot, ParticipantId, TournamentId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The part of a bracket a match belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BracketSection {
    Winners,
    Losers,
    GrandFinal,
    GrandFinalReset,
    ThirdPlace,
}

impl BracketSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Winners => "winners",
            Self::Losers => "losers",
            Self::GrandFinal => "grand_final",
            Self::GrandFinalReset => "grand_final_reset",
            Self::ThirdPlace => "third_place",
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Winners => 0,
            Self::Losers => 1,
            Self::GrandFinal => 2,
            Self::GrandFinalReset => 3,
            Self::ThirdPlace => 4,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Winners),
            1 => Some(Self::Losers),
            2 => Some(Self::GrandFinal),
            3 => Some(Self::GrandFinalReset),
            4 => Some(Self::ThirdPlace),
            _ => None,
        }
    }
}

impl Display for BracketSection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A label on a round that has a special meaning for standings and rendering. Markers never
/// change how matches are linked.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RoundMarker {
    Semifinal,
    Final,
    LoserSemifinal,
    LoserFinal,
}

impl RoundMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semifinal => "semifinal",
            Self::Final => "final",
            Self::LoserSemifinal => "loser_semifinal",
            Self::LoserFinal => "loser_final",
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Semifinal => 0,
            Self::Final => 1,
            Self::LoserSemifinal => 2,
            Self::LoserFinal => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Semifinal),
            1 => Some(Self::Final),
            2 => Some(Self::LoserSemifinal),
            3 => Some(Self::LoserFinal),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchStatus {
    /// The match has not been played yet. Every generated match starts in this state.
    #[default]
    Pending,
    /// A result was recorded for this match.
    Completed,
}

impl MatchStatus {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Completed => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A reference to a slot of another match in the same [`MatchGraph`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Link {
    /// The index of the target match in the graph.
    pub index: usize,
    /// The slot of the target match, either `0` or `1`.
    pub slot: usize,
}

impl Link {
    #[inline]
    pub fn new(index: usize, slot: usize) -> Self {
        Self { index, slot }
    }
}

/// A single match of a bracket.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchNode {
    pub round: u32,
    /// The 1-based position of the match within its section and round.
    pub number_in_round: u32,
    /// The 1-based position of the match within the whole bracket.
    pub sequence: u32,
    pub section: BracketSection,
    pub marker: Option<RoundMarker>,
    pub slots: [EntrantSpot<ParticipantId>; 2],
    pub winner_to: Option<Link>,
    pub loser_to: Option<Link>,
    pub status: MatchStatus,
}

impl MatchNode {
    /// Returns an iterator over all outgoing links of this match.
    pub fn links(&self) -> impl Iterator<Item = Link> {
        self.winner_to.into_iter().chain(self.loser_to)
    }
}

/// The number of matches a round is expected to have after generation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExpectedRound {
    pub section: BracketSection,
    pub round: u32,
    pub matches: usize,
}

impl ExpectedRound {
    #[inline]
    pub fn new(section: BracketSection, round: u32, matches: usize) -> Self {
        Self {
            section,
            round,
            matches,
        }
    }
}

/// An arena of [`MatchNode`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchGraph {
    tournament_id: TournamentId,
    nodes: Vec<MatchNode>,
    fed: Vec<[bool; 2]>,
    terminals: Vec<usize>,
    numbers: BTreeMap<(BracketSection, u32), u32>,
}

impl MatchGraph {
    /// Creates a new empty `MatchGraph` with space for `capacity` matches.
    pub fn with_capacity(tournament_id: TournamentId, capacity: usize) -> Self {
        Self {
            tournament_id,
            nodes: Vec::with_capacity(capacity),
            fed: Vec::with_capacity(capacity),
            terminals: Vec::new(),
            numbers: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn tournament_id(&self) -> TournamentId {
        self.tournament_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&MatchNode> {
        self.nodes.get(index)
    }

    #[inline]
    pub fn nodes(&self) -> &[MatchNode] {
        &self.nodes
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, MatchNode> {
        self.nodes.iter()
    }

    /// Appends a new match with both slots waiting for a participant. Returns the index of the
    /// new match.
    pub fn push(&mut self, section: BracketSection, round: u32, marker: Option<RoundMarker>) -> usize {
        let number = self.numbers.entry((section, round)).or_insert(0);
        *number += 1;

        let index = self.nodes.len();
        self.nodes.push(MatchNode {
            round,
            number_in_round: *number,
            sequence: index as u32 + 1,
            section,
            marker,
            slots: [EntrantSpot::TBD, EntrantSpot::TBD],
            winner_to: None,
            loser_to: None,
            status: MatchStatus::Pending,
        });
        self.fed.push([false; 2]);

        index
    }

    /// Sends the winner of the match at `from` into `to`.
    pub fn link_winner(&mut self, from: usize, to: Link) -> Result<(), Inconsistency> {
        self.link(from, to, false)
    }

    /// Sends the loser of the match at `from` into `to`.
    pub fn link_loser(&mut self, from: usize, to: Link) -> Result<(), Inconsistency> {
        self.link(from, to, true)
    }

    fn link(&mut self, from: usize, to: Link, loser: bool) -> Result<(), Inconsistency> {
        let sequence = match self.nodes.get(from) {
            Some(node) => node.sequence,
            None => return Err(Inconsistency::MissingMatch { index: from }),
        };

        if to.index >= self.nodes.len() || to.slot > 1 || to.index == from {
            return Err(Inconsistency::BrokenLink {
                sequence,
                target: to.index,
                slot: to.slot,
            });
        }

        if self.fed[to.index][to.slot] {
            return Err(Inconsistency::DoubleFedSlot {
                sequence: self.nodes[to.index].sequence,
                slot: to.slot,
            });
        }

        let node = &mut self.nodes[from];
        let (field, kind) = if loser {
            (&mut node.loser_to, "loser")
        } else {
            (&mut node.winner_to, "winner")
        };

        if field.is_some() {
            return Err(Inconsistency::AlreadyLinked { sequence, kind });
        }

        *field = Some(to);
        self.fed[to.index][to.slot] = true;

        Ok(())
    }

    /// Sends the winners of every pair of matches in `from` into the two slots of one match in
    /// `to`.
    pub fn link_pairs(&mut self, from: &[usize], to: &[usize]) -> Result<(), Inconsistency> {
        for (position, index) in from.iter().enumerate() {
            let target = to
                .get(position / 2)
                .copied()
                .ok_or(Inconsistency::MissingMatch {
                    index: self.nodes.len(),
                })?;

            self.link_winner(*index, Link::new(target, position % 2))?;
        }

        Ok(())
    }

    /// Returns the first slot of the match at `index` that no other match sends a participant
    /// into.
    pub fn first_free_slot(&self, index: usize) -> Option<usize> {
        (0..2).find(|slot| !self.is_fed(index, *slot))
    }

    /// Returns `true` if some match already sends a participant into `slot` of the match at
    /// `index`.
    #[inline]
    pub fn is_fed(&self, index: usize, slot: usize) -> bool {
        self.fed
            .get(index)
            .and_then(|slots| slots.get(slot))
            .copied()
            .unwrap_or(false)
    }

    /// Puts `spot` into `slot` of the match at `index`. Slots that are fed by another match
    /// cannot be placed into.
    pub fn place(
        &mut self,
        index: usize,
        slot: usize,
        spot: EntrantSpot<ParticipantId>,
    ) -> Result<(), Inconsistency> {
        if index >= self.nodes.len() || slot > 1 {
            return Err(Inconsistency::MissingMatch { index });
        }

        if self.fed[index][slot] {
            return Err(Inconsistency::OccupiedSlot {
                sequence: self.nodes[index].sequence,
                slot,
            });
        }

        self.nodes[index].slots[slot] = spot;
        Ok(())
    }

    /// Marks the match at `index` as a match which has no following match for its winner.
    pub fn mark_terminal(&mut self, index: usize) {
        if !self.terminals.contains(&index) {
            self.terminals.push(index);
        }
    }

    #[inline]
    pub fn is_terminal(&self, index: usize) -> bool {
        self.terminals.contains(&index)
    }

    /// Returns the indices of all matches in `section` and `round` in creation order.
    pub fn round_indices(&self, section: BracketSection, round: u32) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.section == section && node.round == round)
            .map(|(index, _)| index)
            .collect()
    }

    /// Returns the number of matches in `section` and `round`.
    pub fn count(&self, section: BracketSection, round: u32) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.section == section && node.round == round)
            .count()
    }

    /// Returns the number of matches in `section`.
    pub fn count_section(&self, section: BracketSection) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.section == section)
            .count()
    }

    /// Checks all structural invariants of the graph.
    ///
    /// # Errors
    ///
    /// Returns the first [`Inconsistency`] found. The checks are, in order: the number of
    /// matches per round compared with `expected`, every link points at an existing and
    /// waiting slot, no slot is fed twice, every waiting slot is fed, every non-terminal match
    /// sends its winner somewhere, no match has two byes and the graph is acyclic.
    pub fn validate(&self, expected: &[ExpectedRound]) -> Result<(), Inconsistency> {
        let total: usize = expected.iter().map(|round| round.matches).sum();
        if total != self.nodes.len() {
            return Err(Inconsistency::MatchCount {
                expected: total,
                found: self.nodes.len(),
            });
        }

        for round in expected {
            let found = self.count(round.section, round.round);
            if found != round.matches {
                return Err(Inconsistency::RoundSize {
                    section: round.section,
                    round: round.round,
                    expected: round.matches,
                    found,
                });
            }
        }

        let mut feeds = vec![[0u8; 2]; self.nodes.len()];
        for node in &self.nodes {
            for link in node.links() {
                let target = match self.nodes.get(link.index) {
                    Some(target) if link.slot < 2 => target,
                    _ => {
                        return Err(Inconsistency::BrokenLink {
                            sequence: node.sequence,
                            target: link.index,
                            slot: link.slot,
                        })
                    }
                };

                if !target.slots[link.slot].is_tbd() {
                    return Err(Inconsistency::OccupiedSlot {
                        sequence: target.sequence,
                        slot: link.slot,
                    });
                }

                feeds[link.index][link.slot] += 1;
                if feeds[link.index][link.slot] > 1 {
                    return Err(Inconsistency::DoubleFedSlot {
                        sequence: target.sequence,
                        slot: link.slot,
                    });
                }
            }
        }

        for (index, node) in self.nodes.iter().enumerate() {
            for (slot, spot) in node.slots.iter().enumerate() {
                if spot.is_tbd() && feeds[index][slot] == 0 {
                    return Err(Inconsistency::UnfedSlot {
                        sequence: node.sequence,
                        slot,
                    });
                }
            }

            if node.slots[0].is_empty() && node.slots[1].is_empty() {
                return Err(Inconsistency::DoubleBye {
                    sequence: node.sequence,
                });
            }

            if node.winner_to.is_none() && !self.is_terminal(index) {
                return Err(Inconsistency::MissingWinnerLink {
                    sequence: node.sequence,
                });
            }
        }

        // Kahn's algorithm: every match must be reachable by peeling off matches without
        // incoming links.
        let mut indegree = vec![0usize; self.nodes.len()];
        for node in &self.nodes {
            for link in node.links() {
                indegree[link.index] += 1;
            }
        }

        let mut queue: Vec<usize> = (0..self.nodes.len())
            .filter(|index| indegree[*index] == 0)
            .collect();

        let mut visited = 0;
        while let Some(index) = queue.pop() {
            visited += 1;

            for link in self.nodes[index].links() {
                indegree[link.index] -= 1;
                if indegree[link.index] == 0 {
                    queue.push(link.index);
                }
            }
        }

        if visited != self.nodes.len() {
            return Err(Inconsistency::Cycle);
        }

        Ok(())
    }
}

/// A violated invariant of a [`MatchGraph`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Inconsistency {
    #[error("invalid number of matches: expected {expected}, found {found}")]
    MatchCount { expected: usize, found: usize },
    #[error("invalid number of matches in {section} round {round}: expected {expected}, found {found}")]
    RoundSize {
        section: BracketSection,
        round: u32,
        expected: usize,
        found: usize,
    },
    #[error("no match at index {index}")]
    MissingMatch { index: usize },
    #[error("match {sequence} links to slot {slot} of a missing match at index {target}")]
    BrokenLink {
        sequence: u32,
        target: usize,
        slot: usize,
    },
    #[error("match {sequence} already has a {kind} link")]
    AlreadyLinked { sequence: u32, kind: &'static str },
    #[error("slot {slot} of match {sequence} is fed by more than one match")]
    DoubleFedSlot { sequence: u32, slot: usize },
    #[error("slot {slot} of match {sequence} is fed by another match but already taken")]
    OccupiedSlot { sequence: u32, slot: usize },
    #[error("slot {slot} of match {sequence} is never filled")]
    UnfedSlot { sequence: u32, slot: usize },
    #[error("match {sequence} has no winner link but is not a terminal match")]
    MissingWinnerLink { sequence: u32 },
    #[error("match {sequence} has a bye in both slots")]
    DoubleBye { sequence: u32 },
    #[error("the match graph contains a cycle")]
    Cycle,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn final_of_two() -> MatchGraph {
        let mut graph = MatchGraph::with_capacity(TournamentId(1), 3);
        let a = graph.push(BracketSection::Winners, 1, None);
        let b = graph.push(BracketSection::Winners, 1, None);
        let f = graph.push(BracketSection::Winners, 2, Some(RoundMarker::Final));

        graph.link_winner(a, Link::new(f, 0)).unwrap();
        graph.link_winner(b, Link::new(f, 1)).unwrap();
        graph.mark_terminal(f);

        for (index, ids) in [(a, [1, 2]), (b, [3, 4])] {
            for (slot, id) in ids.into_iter().enumerate() {
                graph
                    .place(index, slot, EntrantSpot::Entrant(ParticipantId(id)))
                    .unwrap();
            }
        }

        graph
    }

    fn expected() -> Vec<ExpectedRound> {
        vec![
            ExpectedRound::new(BracketSection::Winners, 1, 2),
            ExpectedRound::new(BracketSection::Winners, 2, 1),
        ]
    }

    #[test]
    fn test_match_graph_push() {
        let graph = final_of_two();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.get(1).unwrap().number_in_round, 2);
        assert_eq!(graph.get(2).unwrap().number_in_round, 1);
        assert_eq!(graph.get(2).unwrap().sequence, 3);
        assert_eq!(graph.round_indices(BracketSection::Winners, 1), vec![0, 1]);
        assert_eq!(graph.count_section(BracketSection::Losers), 0);
    }

    #[test]
    fn test_match_graph_validate() {
        let graph = final_of_two();
        graph.validate(&expected()).unwrap();

        assert_eq!(
            graph
                .validate(&[ExpectedRound::new(BracketSection::Winners, 1, 2)])
                .unwrap_err(),
            Inconsistency::MatchCount {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn test_match_graph_round_size() {
        let graph = final_of_two();

        assert_eq!(
            graph
                .validate(&[
                    ExpectedRound::new(BracketSection::Winners, 1, 1),
                    ExpectedRound::new(BracketSection::Winners, 2, 2),
                ])
                .unwrap_err(),
            Inconsistency::RoundSize {
                section: BracketSection::Winners,
                round: 1,
                expected: 1,
                found: 2,
            }
        );
    }

    #[test]
    fn test_match_graph_double_fed() {
        let mut graph = final_of_two();
        let extra = graph.push(BracketSection::Winners, 1, None);

        assert_eq!(
            graph.link_winner(extra, Link::new(2, 0)).unwrap_err(),
            Inconsistency::DoubleFedSlot {
                sequence: 3,
                slot: 0
            }
        );

        assert_eq!(
            graph.link_winner(0, Link::new(extra, 0)).unwrap_err(),
            Inconsistency::AlreadyLinked {
                sequence: 1,
                kind: "winner"
            }
        );

        assert_eq!(
            graph.link_winner(extra, Link::new(9, 0)).unwrap_err(),
            Inconsistency::BrokenLink {
                sequence: 4,
                target: 9,
                slot: 0
            }
        );
    }

    #[test]
    fn test_match_graph_unfed_and_missing_winner() {
        let mut graph = MatchGraph::with_capacity(TournamentId(1), 2);
        let a = graph.push(BracketSection::Winners, 1, None);
        let f = graph.push(BracketSection::Winners, 2, None);
        graph.link_winner(a, Link::new(f, 0)).unwrap();
        graph.place(a, 0, EntrantSpot::Entrant(ParticipantId(1))).unwrap();
        graph.place(a, 1, EntrantSpot::Entrant(ParticipantId(2))).unwrap();

        let expected = [
            ExpectedRound::new(BracketSection::Winners, 1, 1),
            ExpectedRound::new(BracketSection::Winners, 2, 1),
        ];

        assert_eq!(
            graph.validate(&expected).unwrap_err(),
            Inconsistency::UnfedSlot {
                sequence: 2,
                slot: 1
            }
        );

        graph.place(f, 1, EntrantSpot::Entrant(ParticipantId(3))).unwrap();
        assert_eq!(
            graph.validate(&expected).unwrap_err(),
            Inconsistency::MissingWinnerLink { sequence: 2 }
        );

        graph.mark_terminal(f);
        graph.validate(&expected).unwrap();
    }

    #[test]
    fn test_match_graph_occupied_slot() {
        let mut graph = final_of_two();

        assert_eq!(
            graph
                .place(2, 1, EntrantSpot::Entrant(ParticipantId(5)))
                .unwrap_err(),
            Inconsistency::OccupiedSlot {
                sequence: 3,
                slot: 1
            }
        );
    }

    #[test]
    fn test_match_graph_double_bye() {
        let mut graph = MatchGraph::with_capacity(TournamentId(1), 1);
        let index = graph.push(BracketSection::Winners, 1, None);
        graph.place(index, 0, EntrantSpot::Empty).unwrap();
        graph.place(index, 1, EntrantSpot::Empty).unwrap();
        graph.mark_terminal(index);

        assert_eq!(
            graph
                .validate(&[ExpectedRound::new(BracketSection::Winners, 1, 1)])
                .unwrap_err(),
            Inconsistency::DoubleBye { sequence: 1 }
        );
    }

    #[test]
    fn test_match_graph_cycle() {
        let mut graph = MatchGraph::with_capacity(TournamentId(1), 2);
        let a = graph.push(BracketSection::Winners, 1, None);
        let b = graph.push(BracketSection::Winners, 1, None);
        graph.link_winner(a, Link::new(b, 0)).unwrap();
        graph.link_winner(b, Link::new(a, 0)).unwrap();
        graph.link_loser(a, Link::new(b, 1)).unwrap();
        graph.link_loser(b, Link::new(a, 1)).unwrap();

        assert_eq!(
            graph
                .validate(&[ExpectedRound::new(BracketSection::Winners, 1, 2)])
                .unwrap_err(),
            Inconsistency::Cycle
        );
    }

    #[test]
    fn test_match_graph_link_pairs() {
        let mut graph = MatchGraph::with_capacity(TournamentId(1), 7);
        let first: Vec<usize> = (0..4)
            .map(|_| graph.push(BracketSection::Winners, 1, None))
            .collect();
        let second: Vec<usize> = (0..2)
            .map(|_| graph.push(BracketSection::Winners, 2, None))
            .collect();

        graph.link_pairs(&first, &second).unwrap();

        assert_eq!(graph.get(0).unwrap().winner_to, Some(Link::new(4, 0)));
        assert_eq!(graph.get(3).unwrap().winner_to, Some(Link::new(5, 1)));
        assert_eq!(graph.first_free_slot(4), None);

        let extra = graph.push(BracketSection::Winners, 3, None);
        assert_eq!(graph.first_free_slot(extra), Some(0));
        graph.link_winner(4, Link::new(extra, 0)).unwrap();
        assert_eq!(graph.first_free_slot(extra), Some(1));
    }

    #[test]
    fn test_section_u8() {
        for section in [
            BracketSection::Winners,
            BracketSection::Losers,
            BracketSection::GrandFinal,
            BracketSection::GrandFinalReset,
            BracketSection::ThirdPlace,
        ] {
            assert_eq!(BracketSection::from_u8(section.to_u8()), Some(section));
        }

        assert_eq!(BracketSection::from_u8(5), None);
        assert_eq!(RoundMarker::from_u8(2), Some(RoundMarker::LoserSemifinal));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_tokens() {
        use serde_test::{assert_tokens, Token};

        assert_tokens(
            &BracketSection::GrandFinalReset,
            &[Token::UnitVariant {
                name: "BracketSection",
                variant: "grand_final_reset",
            }],
        );

        assert_tokens(
            &EntrantSpot::Entrant(ParticipantId(3)),
            &[
                Token::NewtypeVariant {
                    name: "EntrantSpot",
                    variant: "entrant",
                },
                Token::U64(3),
            ],
        );
        assert_tokens(
            &EntrantSpot::<ParticipantId>::TBD,
            &[Token::UnitVariant {
                name: "EntrantSpot",
                variant: "tbd",
            }],
        );
    }
}
