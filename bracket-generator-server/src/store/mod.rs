//! Persistence of participants and generated matches.
//!
//! All writes of a single generation go through one [`MatchWriter`]. Nothing written through a
//! writer becomes visible to [`MatchStore::list_matches`] before [`MatchWriter::commit`].
#[cfg(test)]
pub mod memory;
pub mod mysql;

use bracket_generator_core::{
    BracketSection, EntrantSpot, MatchId, MatchNode, MatchStatus, Participant, ParticipantId,
    RoundMarker, TournamentId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("corrupt row in {table}: {reason}")]
    Corrupt {
        table: &'static str,
        reason: String,
    },
    #[error("no match with id {0}")]
    MissingMatch(MatchId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A persisted match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub round: u32,
    pub number_in_round: u32,
    pub sequence: u32,
    pub section: BracketSection,
    pub marker: Option<RoundMarker>,
    pub slots: [EntrantSpot<ParticipantId>; 2],
    pub winner_to: Option<SlotRef>,
    pub loser_to: Option<SlotRef>,
    pub status: MatchStatus,
}

/// A slot of a persisted match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub match_id: MatchId,
    pub slot: u8,
}

/// A match before it is inserted. Both slots start as [`EntrantSpot::TBD`] and no links are
/// set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NewMatch {
    pub tournament_id: TournamentId,
    pub round: u32,
    pub number_in_round: u32,
    pub sequence: u32,
    pub section: BracketSection,
    pub marker: Option<RoundMarker>,
}

impl NewMatch {
    pub fn from_node(tournament_id: TournamentId, node: &MatchNode) -> Self {
        Self {
            tournament_id,
            round: node.round,
            number_in_round: node.number_in_round,
            sequence: node.sequence,
            section: node.section,
            marker: node.marker,
        }
    }

    pub(crate) fn into_record(self, id: MatchId) -> MatchRecord {
        MatchRecord {
            id,
            tournament_id: self.tournament_id,
            round: self.round,
            number_in_round: self.number_in_round,
            sequence: self.sequence,
            section: self.section,
            marker: self.marker,
            slots: [EntrantSpot::TBD, EntrantSpot::TBD],
            winner_to: None,
            loser_to: None,
            status: MatchStatus::Pending,
        }
    }
}

/// Which participant of a match advances along a link.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Winner,
    Loser,
}

/// The participant source and match repository.
#[allow(async_fn_in_trait)]
pub trait MatchStore {
    type Writer: MatchWriter;

    /// Returns all participants of a tournament in registration order.
    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Vec<Participant>, StoreError>;

    /// Returns all committed matches of a tournament ordered by sequence.
    async fn list_matches(&self, tournament_id: TournamentId)
        -> Result<Vec<MatchRecord>, StoreError>;

    /// Starts a new transaction.
    async fn begin(&self) -> Result<Self::Writer, StoreError>;
}

/// A single transaction on a [`MatchStore`]. Dropping a writer without committing discards all
/// of its writes.
#[allow(async_fn_in_trait)]
pub trait MatchWriter {
    /// Deletes all matches of a tournament. Returns the number of deleted matches.
    async fn delete_all_matches(&mut self, tournament_id: TournamentId) -> Result<u64, StoreError>;

    async fn create_match(&mut self, new: &NewMatch) -> Result<MatchId, StoreError>;

    async fn set_advancement_link(
        &mut self,
        id: MatchId,
        kind: LinkKind,
        to: SlotRef,
    ) -> Result<(), StoreError>;

    async fn set_starting_slots(
        &mut self,
        id: MatchId,
        slots: [EntrantSpot<ParticipantId>; 2],
    ) -> Result<(), StoreError>;

    /// Returns all matches of a tournament as seen from inside this transaction.
    async fn list_matches(
        &mut self,
        tournament_id: TournamentId,
    ) -> Result<Vec<MatchRecord>, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}
