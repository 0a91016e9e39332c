//! A [`MatchStore`] held in process memory.
//!
//! Writes are staged inside the [`MemoryWriter`] and applied under a single write lock on
//! commit. The store can be told to fail or to drop writes, which is used to exercise the
//! rollback and read-back paths of the generation service.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bracket_generator_core::{EntrantSpot, MatchId, Participant, ParticipantId, TournamentId};
use parking_lot::{Mutex, RwLock};

use super::{LinkKind, MatchRecord, MatchStore, MatchWriter, NewMatch, SlotRef, StoreError};

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    participants: RwLock<HashMap<TournamentId, Vec<Participant>>>,
    matches: RwLock<BTreeMap<MatchId, MatchRecord>>,
    next_id: AtomicU64,
    /// Remaining writes before every following write fails.
    fail_after: Mutex<Option<usize>>,
    drop_links: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the participants of a tournament.
    pub fn insert_participants(&self, tournament_id: TournamentId, participants: Vec<Participant>) {
        self.inner
            .participants
            .write()
            .insert(tournament_id, participants);
    }

    /// Lets the next `writes` writes succeed and fails every write after them. `None` disables
    /// the failure.
    pub fn fail_after(&self, writes: Option<usize>) {
        *self.inner.fail_after.lock() = writes;
    }

    /// Silently discards all advancement links while enabled.
    pub fn drop_links(&self, enabled: bool) {
        self.inner.drop_links.store(enabled, Ordering::SeqCst);
    }

    fn committed(&self, tournament_id: TournamentId) -> Vec<MatchRecord> {
        let mut matches: Vec<MatchRecord> = self
            .inner
            .matches
            .read()
            .values()
            .filter(|record| record.tournament_id == tournament_id)
            .cloned()
            .collect();

        matches.sort_by_key(|record| record.sequence);
        matches
    }
}

impl MatchStore for MemoryStore {
    type Writer = MemoryWriter;

    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Vec<Participant>, StoreError> {
        Ok(self
            .inner
            .participants
            .read()
            .get(&tournament_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_matches(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        Ok(self.committed(tournament_id))
    }

    async fn begin(&self) -> Result<Self::Writer, StoreError> {
        Ok(MemoryWriter {
            store: self.clone(),
            deleted: HashSet::new(),
            staged: BTreeMap::new(),
        })
    }
}

#[derive(Debug)]
pub struct MemoryWriter {
    store: MemoryStore,
    deleted: HashSet<TournamentId>,
    staged: BTreeMap<MatchId, MatchRecord>,
}

impl MemoryWriter {
    fn check_write(&self) -> Result<(), StoreError> {
        let mut fail_after = self.store.inner.fail_after.lock();

        match fail_after.as_mut() {
            Some(0) => Err(StoreError::Unavailable(String::from("injected write failure"))),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Returns the staged copy of the match `id`, copying it from the committed state first.
    fn stage(&mut self, id: MatchId) -> Result<&mut MatchRecord, StoreError> {
        if !self.staged.contains_key(&id) {
            let record = self
                .store
                .inner
                .matches
                .read()
                .get(&id)
                .filter(|record| !self.deleted.contains(&record.tournament_id))
                .cloned()
                .ok_or(StoreError::MissingMatch(id))?;

            self.staged.insert(id, record);
        }

        self.staged.get_mut(&id).ok_or(StoreError::MissingMatch(id))
    }
}

impl MatchWriter for MemoryWriter {
    async fn delete_all_matches(&mut self, tournament_id: TournamentId) -> Result<u64, StoreError> {
        self.check_write()?;

        let committed = if self.deleted.insert(tournament_id) {
            self.store.committed(tournament_id).len()
        } else {
            0
        };

        let before = self.staged.len();
        self.staged
            .retain(|_, record| record.tournament_id != tournament_id);

        Ok((committed + before - self.staged.len()) as u64)
    }

    async fn create_match(&mut self, new: &NewMatch) -> Result<MatchId, StoreError> {
        self.check_write()?;

        let id = MatchId(self.store.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.staged.insert(id, new.into_record(id));

        Ok(id)
    }

    async fn set_advancement_link(
        &mut self,
        id: MatchId,
        kind: LinkKind,
        to: SlotRef,
    ) -> Result<(), StoreError> {
        self.check_write()?;

        let drop_links = self.store.inner.drop_links.load(Ordering::SeqCst);
        let record = self.stage(id)?;

        if !drop_links {
            match kind {
                LinkKind::Winner => record.winner_to = Some(to),
                LinkKind::Loser => record.loser_to = Some(to),
            }
        }

        Ok(())
    }

    async fn set_starting_slots(
        &mut self,
        id: MatchId,
        slots: [EntrantSpot<ParticipantId>; 2],
    ) -> Result<(), StoreError> {
        self.check_write()?;

        self.stage(id)?.slots = slots;
        Ok(())
    }

    async fn list_matches(
        &mut self,
        tournament_id: TournamentId,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let mut matches: BTreeMap<MatchId, MatchRecord> = if self.deleted.contains(&tournament_id)
        {
            BTreeMap::new()
        } else {
            self.store
                .committed(tournament_id)
                .into_iter()
                .map(|record| (record.id, record))
                .collect()
        };

        for (id, record) in &self.staged {
            if record.tournament_id == tournament_id {
                matches.insert(*id, record.clone());
            }
        }

        let mut matches: Vec<MatchRecord> = matches.into_values().collect();
        matches.sort_by_key(|record| record.sequence);
        Ok(matches)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut matches = self.store.inner.matches.write();

        if !self.deleted.is_empty() {
            matches.retain(|_, record| !self.deleted.contains(&record.tournament_id));
        }

        matches.extend(self.staged);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bracket_generator_core::{BracketSection, EntrantSpot, ParticipantId, TournamentId};

    use super::MemoryStore;
    use crate::store::{LinkKind, MatchStore, MatchWriter, NewMatch, SlotRef, StoreError};

    fn new_match(tournament: u64, sequence: u32) -> NewMatch {
        NewMatch {
            tournament_id: TournamentId(tournament),
            round: 1,
            number_in_round: sequence,
            sequence,
            section: BracketSection::Winners,
            marker: None,
        }
    }

    #[tokio::test]
    async fn test_memory_store_commit() {
        let store = MemoryStore::new();
        let mut writer = store.begin().await.unwrap();

        let a = writer.create_match(&new_match(1, 1)).await.unwrap();
        let b = writer.create_match(&new_match(1, 2)).await.unwrap();
        writer
            .set_advancement_link(a, LinkKind::Winner, SlotRef { match_id: b, slot: 0 })
            .await
            .unwrap();
        writer
            .set_starting_slots(
                a,
                [
                    EntrantSpot::Entrant(ParticipantId(1)),
                    EntrantSpot::Empty,
                ],
            )
            .await
            .unwrap();

        assert_eq!(writer.list_matches(TournamentId(1)).await.unwrap().len(), 2);
        assert!(store.list_matches(TournamentId(1)).await.unwrap().is_empty());

        writer.commit().await.unwrap();

        let matches = store.list_matches(TournamentId(1)).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, a);
        assert_eq!(
            matches[0].winner_to,
            Some(SlotRef {
                match_id: b,
                slot: 0
            })
        );
        assert_eq!(matches[0].slots[1], EntrantSpot::Empty);
        assert_eq!(matches[1].slots, [EntrantSpot::TBD, EntrantSpot::TBD]);
    }

    #[tokio::test]
    async fn test_memory_store_rollback() {
        let store = MemoryStore::new();

        let mut writer = store.begin().await.unwrap();
        writer.create_match(&new_match(1, 1)).await.unwrap();
        writer.create_match(&new_match(2, 1)).await.unwrap();
        writer.commit().await.unwrap();

        let mut writer = store.begin().await.unwrap();
        assert_eq!(writer.delete_all_matches(TournamentId(1)).await.unwrap(), 1);
        writer.create_match(&new_match(1, 1)).await.unwrap();
        writer.create_match(&new_match(1, 2)).await.unwrap();
        writer.rollback().await.unwrap();

        assert_eq!(store.list_matches(TournamentId(1)).await.unwrap().len(), 1);
        assert_eq!(store.list_matches(TournamentId(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_delete_keeps_other_tournaments() {
        let store = MemoryStore::new();

        let mut writer = store.begin().await.unwrap();
        writer.create_match(&new_match(1, 1)).await.unwrap();
        writer.create_match(&new_match(2, 1)).await.unwrap();
        writer.commit().await.unwrap();

        let mut writer = store.begin().await.unwrap();
        writer.delete_all_matches(TournamentId(1)).await.unwrap();
        assert!(writer.list_matches(TournamentId(1)).await.unwrap().is_empty());
        writer.commit().await.unwrap();

        assert!(store.list_matches(TournamentId(1)).await.unwrap().is_empty());
        assert_eq!(store.list_matches(TournamentId(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_fail_after() {
        let store = MemoryStore::new();
        store.fail_after(Some(1));

        let mut writer = store.begin().await.unwrap();
        writer.create_match(&new_match(1, 1)).await.unwrap();

        let err = writer.create_match(&new_match(1, 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.fail_after(None);
        writer.create_match(&new_match(1, 2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_missing_match() {
        let store = MemoryStore::new();
        let mut writer = store.begin().await.unwrap();

        let err = writer
            .set_starting_slots(
                bracket_generator_core::MatchId(99),
                [EntrantSpot::TBD, EntrantSpot::TBD],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::MissingMatch(_)));
    }
}
