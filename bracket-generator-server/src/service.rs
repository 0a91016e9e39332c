//! # Bracket generation service
//!
//! Turns a [`Bracket`] built by the core crate into persisted matches. A generation writes
//! every match inside a single transaction in three passes (create, link, place), reads the
//! result back and compares it against the in-memory graph before committing. Any error rolls
//! the whole transaction back so a tournament either has a complete bracket or none at all.
//!
//! Only one generation can run per tournament at a time. A second request for the same
//! tournament is rejected with [`Error::GenerationInProgress`] instead of waiting.
use std::collections::HashSet;

use bracket_generator_core::options::{OptionValues, MAX_PARTICIPANTS_KEY, SEEDING_STRATEGY};
use bracket_generator_core::{
    generate, Bracket, BracketKind, BracketStats, GenerateOptions, MatchGraph, MatchId,
    Participant, SeedingInfo, TournamentId,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;

use crate::config::Generation;
use crate::store::{
    LinkKind, MatchRecord, MatchStore, MatchWriter, NewMatch, SlotRef, StoreError,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] bracket_generator_core::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("a bracket is already being generated for tournament {0}")]
    GenerationInProgress(TournamentId),
    #[error("tournament {0} already has matches")]
    AlreadyGenerated(TournamentId),
    #[error("stored match {sequence} does not match the generated bracket: {field}")]
    WriteMismatch { sequence: u32, field: &'static str },
}

impl Error {
    /// Returns `true` if the error was caused by the request rather than the store or a broken
    /// bracket.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::Core(err) => err.is_invalid_input(),
            Self::AlreadyGenerated(_) => true,
            _ => false,
        }
    }
}

/// The result of a successful generation.
#[derive(Clone, Debug, Serialize)]
pub struct Generated {
    pub matches: Vec<MatchRecord>,
    pub stats: BracketStats,
    pub seeding: SeedingInfo,
}

#[derive(Debug)]
pub struct BracketGenerationService<S> {
    store: S,
    defaults: Generation,
    in_flight: Mutex<HashSet<TournamentId>>,
}

impl<S> BracketGenerationService<S>
where
    S: MatchStore,
{
    pub fn new(store: S, defaults: Generation) -> Self {
        Self {
            store,
            defaults,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Generates the bracket for `participants` and persists it. Fails with
    /// [`Error::AlreadyGenerated`] if the tournament already has matches.
    pub async fn generate_bracket(
        &self,
        tournament_id: TournamentId,
        kind: BracketKind,
        participants: &[Participant],
        values: OptionValues,
    ) -> Result<Generated, Error> {
        let _guard = self.lock(tournament_id)?;
        self.run(tournament_id, kind, participants, values, false)
            .await
    }

    /// Replaces all existing matches of the tournament with a newly generated bracket.
    pub async fn regenerate_bracket(
        &self,
        tournament_id: TournamentId,
        kind: BracketKind,
        participants: &[Participant],
        values: OptionValues,
    ) -> Result<Generated, Error> {
        let _guard = self.lock(tournament_id)?;
        self.run(tournament_id, kind, participants, values, true)
            .await
    }

    /// Loads the participants of the tournament from the store and generates its bracket.
    pub async fn generate_from_source(
        &self,
        tournament_id: TournamentId,
        kind: BracketKind,
        values: OptionValues,
        regenerate: bool,
    ) -> Result<Generated, Error> {
        let _guard = self.lock(tournament_id)?;

        let participants = self.store.list_participants(tournament_id).await?;
        log::debug!(
            "Loaded {} participants for tournament {}",
            participants.len(),
            tournament_id
        );

        self.run(tournament_id, kind, &participants, values, regenerate)
            .await
    }

    fn lock(&self, tournament_id: TournamentId) -> Result<InFlight<'_>, Error> {
        let mut in_flight = self.in_flight.lock();

        if !in_flight.insert(tournament_id) {
            log::warn!(
                "Rejecting generation for tournament {}: already in progress",
                tournament_id
            );
            return Err(Error::GenerationInProgress(tournament_id));
        }

        Ok(InFlight {
            set: &self.in_flight,
            tournament_id,
        })
    }

    fn options(&self, kind: BracketKind, mut values: OptionValues) -> Result<GenerateOptions, Error> {
        values.set_default(SEEDING_STRATEGY, self.defaults.default_seeding.as_str());
        values.set_default(MAX_PARTICIPANTS_KEY, self.defaults.max_participants as u64);

        GenerateOptions::from_values(kind, values)
            .map_err(|err| Error::Core(bracket_generator_core::Error::from(err)))
    }

    async fn run(
        &self,
        tournament_id: TournamentId,
        kind: BracketKind,
        participants: &[Participant],
        values: OptionValues,
        regenerate: bool,
    ) -> Result<Generated, Error> {
        let options = self.options(kind, values)?;
        let bracket = generate(
            tournament_id,
            kind,
            participants,
            &options,
            &mut StdRng::from_entropy(),
        )?;

        let mut writer = self.store.begin().await?;

        match write(&mut writer, tournament_id, &bracket, regenerate).await {
            Ok(matches) => {
                writer.commit().await?;

                log::info!(
                    "Generated {} bracket for tournament {} with {} matches",
                    kind,
                    tournament_id,
                    matches.len()
                );

                Ok(Generated {
                    matches,
                    stats: bracket.stats,
                    seeding: bracket.seeding,
                })
            }
            Err(err) => {
                log::error!(
                    "Failed to write bracket for tournament {}: {}",
                    tournament_id,
                    err
                );

                if let Err(rollback) = writer.rollback().await {
                    log::warn!(
                        "Failed to roll back tournament {}: {}",
                        tournament_id,
                        rollback
                    );
                }

                Err(err)
            }
        }
    }
}

/// Releases the tournament when dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<TournamentId>>,
    tournament_id: TournamentId,
}

impl<'a> Drop for InFlight<'a> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.tournament_id);
    }
}

async fn write<W>(
    writer: &mut W,
    tournament_id: TournamentId,
    bracket: &Bracket,
    regenerate: bool,
) -> Result<Vec<MatchRecord>, Error>
where
    W: MatchWriter,
{
    if regenerate {
        let deleted = writer.delete_all_matches(tournament_id).await?;
        log::debug!(
            "Deleted {} matches of tournament {}",
            deleted,
            tournament_id
        );
    } else if !writer.list_matches(tournament_id).await?.is_empty() {
        return Err(Error::AlreadyGenerated(tournament_id));
    }

    let graph = &bracket.matches;

    let mut ids = Vec::with_capacity(graph.len());
    for node in graph.iter() {
        let id = writer
            .create_match(&NewMatch::from_node(tournament_id, node))
            .await?;
        ids.push(id);
    }

    for (index, node) in graph.iter().enumerate() {
        for (kind, link) in [(LinkKind::Winner, node.winner_to), (LinkKind::Loser, node.loser_to)] {
            if let Some(link) = link {
                writer
                    .set_advancement_link(ids[index], kind, slot_ref(&ids, link))
                    .await?;
            }
        }
    }

    for (index, node) in graph.iter().enumerate() {
        if node.slots.iter().any(|slot| !slot.is_tbd()) {
            writer.set_starting_slots(ids[index], node.slots).await?;
        }
    }

    let matches = writer.list_matches(tournament_id).await?;
    verify(graph, &ids, &matches)?;

    Ok(matches)
}

fn slot_ref(ids: &[MatchId], link: bracket_generator_core::Link) -> SlotRef {
    SlotRef {
        match_id: ids[link.index],
        slot: link.slot as u8,
    }
}

/// Compares the stored matches against the generated graph.
fn verify(graph: &MatchGraph, ids: &[MatchId], matches: &[MatchRecord]) -> Result<(), Error> {
    if matches.len() != graph.len() {
        let sequence = matches.len().min(graph.len()) as u32 + 1;
        return Err(Error::WriteMismatch {
            sequence,
            field: "count",
        });
    }

    for ((node, id), record) in graph.iter().zip(ids).zip(matches) {
        let field = if record.id != *id {
            Some("id")
        } else if record.sequence != node.sequence {
            Some("sequence")
        } else if record.round != node.round || record.number_in_round != node.number_in_round {
            Some("round")
        } else if record.section != node.section || record.marker != node.marker {
            Some("section")
        } else if record.slots != node.slots {
            Some("slots")
        } else if record.winner_to != node.winner_to.map(|link| slot_ref(ids, link)) {
            Some("winner_to")
        } else if record.loser_to != node.loser_to.map(|link| slot_ref(ids, link)) {
            Some("loser_to")
        } else if record.status != node.status {
            Some("status")
        } else {
            None
        };

        if let Some(field) = field {
            return Err(Error::WriteMismatch {
                sequence: node.sequence,
                field,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use bracket_generator_core::options::{
        OptionValues, CUSTOM_ORDER, FULL_DOUBLE_ELIMINATION, SEEDING_STRATEGY, THIRD_PLACE_MATCH,
    };
    use std::collections::HashMap;

    use bracket_generator_core::{
        BracketKind, BracketSection, EntrantSpot, MatchId, Participant, ParticipantId,
        TournamentId,
    };

    use super::{BracketGenerationService, Error};
    use crate::config::Generation;
    use crate::store::memory::MemoryStore;
    use crate::store::{MatchRecord, MatchStore, SlotRef, StoreError};

    fn participants(n: u64) -> Vec<Participant> {
        (1..=n)
            .map(|id| Participant::new(id, format!("Participant {}", id)))
            .collect()
    }

    fn manual(n: u64) -> OptionValues {
        let mut values = OptionValues::new();
        values.set(SEEDING_STRATEGY, "manual");
        values.set(
            CUSTOM_ORDER,
            (1..=n).map(ParticipantId).collect::<Vec<_>>(),
        );
        values
    }

    /// The winner and loser links of every match as `(target sequence, slot)`, so that two runs
    /// with different match ids compare equal.
    fn links_by_sequence(matches: &[MatchRecord]) -> Vec<[Option<(u32, u8)>; 2]> {
        let sequences: HashMap<MatchId, u32> = matches
            .iter()
            .map(|record| (record.id, record.sequence))
            .collect();

        let resolve =
            |link: Option<SlotRef>| link.map(|link| (sequences[&link.match_id], link.slot));

        matches
            .iter()
            .map(|record| [resolve(record.winner_to), resolve(record.loser_to)])
            .collect()
    }

    fn service() -> BracketGenerationService<MemoryStore> {
        BracketGenerationService::new(MemoryStore::new(), Generation::default())
    }

    #[tokio::test]
    async fn test_generate_single_elimination() {
        let service = service();
        let mut values = manual(8);
        values.set(THIRD_PLACE_MATCH, true);

        let generated = service
            .generate_bracket(
                TournamentId(1),
                BracketKind::SingleElimination,
                &participants(8),
                values,
            )
            .await
            .unwrap();

        assert_eq!(generated.matches.len(), 8);
        assert_eq!(generated.stats.total_matches, 8);
        assert_eq!(
            generated.seeding.order,
            (1..=8).map(ParticipantId).collect::<Vec<_>>()
        );

        let stored = service.store().list_matches(TournamentId(1)).await.unwrap();
        assert_eq!(stored, generated.matches);

        let third_place = stored
            .iter()
            .filter(|record| record.section == BracketSection::ThirdPlace)
            .count();
        assert_eq!(third_place, 1);

        let terminal = stored
            .iter()
            .filter(|record| record.winner_to.is_none())
            .count();
        assert_eq!(terminal, 2);
    }

    #[tokio::test]
    async fn test_generate_double_elimination() {
        let service = service();
        let mut values = manual(9);
        values.set(FULL_DOUBLE_ELIMINATION, false);

        let generated = service
            .generate_bracket(
                TournamentId(1),
                BracketKind::DoubleElimination,
                &participants(9),
                values,
            )
            .await
            .unwrap();

        assert_eq!(generated.matches.len(), 30);
        assert_eq!(generated.stats.byes, 7);

        let byes = generated
            .matches
            .iter()
            .flat_map(|record| record.slots.iter())
            .filter(|slot| **slot == EntrantSpot::Empty)
            .count();
        assert_eq!(byes, 7);

        let ids: Vec<_> = generated.matches.iter().map(|record| record.id).collect();
        for record in &generated.matches {
            for link in record.winner_to.iter().chain(record.loser_to.iter()) {
                assert!(ids.contains(&link.match_id));
            }
        }
    }

    #[tokio::test]
    async fn test_generate_already_generated() {
        let service = service();

        service
            .generate_bracket(
                TournamentId(1),
                BracketKind::SingleElimination,
                &participants(4),
                OptionValues::new(),
            )
            .await
            .unwrap();

        let err = service
            .generate_bracket(
                TournamentId(1),
                BracketKind::SingleElimination,
                &participants(4),
                OptionValues::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AlreadyGenerated(TournamentId(1))));
        assert!(err.is_invalid_input());
        assert_eq!(
            service
                .store()
                .list_matches(TournamentId(1))
                .await
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_regenerate_is_idempotent() {
        let service = service();

        let first = service
            .generate_bracket(
                TournamentId(1),
                BracketKind::DoubleElimination,
                &participants(13),
                manual(13),
            )
            .await
            .unwrap();

        let second = service
            .regenerate_bracket(
                TournamentId(1),
                BracketKind::DoubleElimination,
                &participants(13),
                manual(13),
            )
            .await
            .unwrap();

        assert_eq!(first.matches.len(), second.matches.len());
        assert_eq!(first.seeding, second.seeding);
        assert_eq!(first.stats, second.stats);

        let first_links = links_by_sequence(&first.matches);
        let second_links = links_by_sequence(&second.matches);

        for (index, (a, b)) in first.matches.iter().zip(&second.matches).enumerate() {
            assert_eq!(a.sequence, b.sequence);
            assert_eq!(a.round, b.round);
            assert_eq!(a.number_in_round, b.number_in_round);
            assert_eq!(a.section, b.section);
            assert_eq!(a.marker, b.marker);
            assert_eq!(a.slots, b.slots);
            assert_eq!(a.status, b.status);
            assert_eq!(first_links[index], second_links[index], "sequence {}", a.sequence);
        }

        let stored = service.store().list_matches(TournamentId(1)).await.unwrap();
        assert_eq!(stored, second.matches);
    }

    #[tokio::test]
    async fn test_generate_rolls_back_on_store_failure() {
        let service = service();

        service
            .generate_bracket(
                TournamentId(1),
                BracketKind::SingleElimination,
                &participants(4),
                manual(4),
            )
            .await
            .unwrap();
        let before = service.store().list_matches(TournamentId(1)).await.unwrap();

        // Fail while the new matches are created.
        service.store().fail_after(Some(5));

        let err = service
            .regenerate_bracket(
                TournamentId(1),
                BracketKind::SingleElimination,
                &participants(8),
                manual(8),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Store(StoreError::Unavailable(_))));
        assert!(!err.is_invalid_input());

        service.store().fail_after(None);
        let after = service.store().list_matches(TournamentId(1)).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_generate_detects_lost_writes() {
        let service = service();
        service.store().drop_links(true);

        let err = service
            .generate_bracket(
                TournamentId(1),
                BracketKind::SingleElimination,
                &participants(4),
                OptionValues::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::WriteMismatch {
                sequence: 1,
                field: "winner_to"
            }
        ));
        assert!(service
            .store()
            .list_matches(TournamentId(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_generate_in_progress() {
        let service = service();
        let guard = service.lock(TournamentId(1)).unwrap();

        let err = service
            .generate_bracket(
                TournamentId(1),
                BracketKind::SingleElimination,
                &participants(4),
                OptionValues::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GenerationInProgress(TournamentId(1))));

        // Other tournaments are not blocked.
        service
            .generate_bracket(
                TournamentId(2),
                BracketKind::SingleElimination,
                &participants(4),
                OptionValues::new(),
            )
            .await
            .unwrap();

        drop(guard);

        service
            .generate_bracket(
                TournamentId(1),
                BracketKind::SingleElimination,
                &participants(4),
                OptionValues::new(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_generate_invalid_input_writes_nothing() {
        let service = service();

        let err = service
            .generate_bracket(
                TournamentId(1),
                BracketKind::DoubleElimination,
                &participants(200),
                OptionValues::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());

        let mut values = OptionValues::new();
        values.set("unknown", true);
        let err = service
            .generate_bracket(
                TournamentId(1),
                BracketKind::SingleElimination,
                &participants(4),
                values,
            )
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());

        assert!(service
            .store()
            .list_matches(TournamentId(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_generate_from_source() {
        let store = MemoryStore::new();
        store.insert_participants(TournamentId(3), participants(6));

        let service = BracketGenerationService::new(
            store,
            Generation {
                max_participants: 8,
                default_seeding: String::from("ranking"),
            },
        );

        let generated = service
            .generate_from_source(
                TournamentId(3),
                BracketKind::SingleElimination,
                OptionValues::new(),
                false,
            )
            .await
            .unwrap();
        assert_eq!(generated.stats.participants, 6);
        assert_eq!(generated.matches.len(), 5);

        let err = service
            .generate_from_source(
                TournamentId(4),
                BracketKind::SingleElimination,
                OptionValues::new(),
                false,
            )
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());

        service
            .store()
            .insert_participants(TournamentId(5), participants(9));
        let err = service
            .generate_from_source(
                TournamentId(5),
                BracketKind::SingleElimination,
                OptionValues::new(),
                false,
            )
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
    }
}
