//! The MySQL backed [`MatchStore`].
use bracket_generator_core::{
    BracketSection, EntrantSpot, MatchId, MatchStatus, Participant, ParticipantId, RoundMarker,
    TournamentId,
};
use futures::TryStreamExt;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Executor, MySql, Row, Transaction};

use super::{LinkKind, MatchRecord, MatchStore, MatchWriter, NewMatch, SlotRef, StoreError};
use crate::config::Database;

const SPOT_TBD: u8 = 0;
const SPOT_EMPTY: u8 = 1;
const SPOT_ENTRANT: u8 = 2;

#[derive(Clone, Debug)]
pub struct MySqlStore {
    pub pool: MySqlPool,
    pub table_prefix: String,
}

impl MySqlStore {
    pub async fn connect(config: &Database) -> Result<Self, StoreError> {
        let pool = MySqlPool::connect(&config.connect_string()).await?;

        Ok(Self {
            pool,
            table_prefix: config.prefix.clone(),
        })
    }

    /// Creates the participant and match tables if they don't exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {}participants (
                tournament_id BIGINT UNSIGNED NOT NULL,
                id BIGINT UNSIGNED NOT NULL,
                name TEXT NOT NULL,
                rating DOUBLE NULL,
                secondary_rating DOUBLE NULL,
                PRIMARY KEY (tournament_id, id)
            )",
            self.table_prefix
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {}matches (
                id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
                tournament_id BIGINT UNSIGNED NOT NULL,
                round INT UNSIGNED NOT NULL,
                number_in_round INT UNSIGNED NOT NULL,
                sequence INT UNSIGNED NOT NULL,
                section TINYINT UNSIGNED NOT NULL,
                marker TINYINT UNSIGNED NULL,
                slot0_kind TINYINT UNSIGNED NOT NULL,
                slot0_participant BIGINT UNSIGNED NULL,
                slot1_kind TINYINT UNSIGNED NOT NULL,
                slot1_participant BIGINT UNSIGNED NULL,
                winner_match BIGINT UNSIGNED NULL,
                winner_slot TINYINT UNSIGNED NULL,
                loser_match BIGINT UNSIGNED NULL,
                loser_slot TINYINT UNSIGNED NULL,
                status TINYINT UNSIGNED NOT NULL,
                INDEX (tournament_id)
            )",
            self.table_prefix
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl MatchStore for MySqlStore {
    type Writer = MySqlWriter;

    async fn list_participants(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Vec<Participant>, StoreError> {
        let sql = format!(
            "SELECT id, name, rating, secondary_rating FROM {}participants WHERE tournament_id = ? ORDER BY id",
            self.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(tournament_id.0).fetch(&self.pool);

        let mut participants = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let id: u64 = row.try_get("id")?;
            let name: String = row.try_get("name")?;

            participants.push(Participant {
                id: ParticipantId(id),
                name,
                rating: row.try_get("rating")?,
                secondary_rating: row.try_get("secondary_rating")?,
            });
        }

        Ok(participants)
    }

    async fn list_matches(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        fetch_matches(&self.pool, &self.table_prefix, tournament_id).await
    }

    async fn begin(&self) -> Result<Self::Writer, StoreError> {
        let tx = self.pool.begin().await?;

        Ok(MySqlWriter {
            tx,
            table_prefix: self.table_prefix.clone(),
        })
    }
}

/// A [`MatchWriter`] wrapping a database transaction. Dropping it rolls the transaction back.
pub struct MySqlWriter {
    tx: Transaction<'static, MySql>,
    table_prefix: String,
}

impl MatchWriter for MySqlWriter {
    async fn delete_all_matches(&mut self, tournament_id: TournamentId) -> Result<u64, StoreError> {
        let res = sqlx::query(&format!(
            "DELETE FROM {}matches WHERE tournament_id = ?",
            self.table_prefix
        ))
        .bind(tournament_id.0)
        .execute(&mut self.tx)
        .await?;

        Ok(res.rows_affected())
    }

    async fn create_match(&mut self, new: &NewMatch) -> Result<MatchId, StoreError> {
        let res = sqlx::query(&format!(
            "INSERT INTO {}matches (tournament_id, round, number_in_round, sequence, section, marker, slot0_kind, slot1_kind, status) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.table_prefix
        ))
        .bind(new.tournament_id.0)
        .bind(new.round)
        .bind(new.number_in_round)
        .bind(new.sequence)
        .bind(new.section.to_u8())
        .bind(new.marker.map(RoundMarker::to_u8))
        .bind(SPOT_TBD)
        .bind(SPOT_TBD)
        .bind(MatchStatus::Pending.to_u8())
        .execute(&mut self.tx)
        .await?;

        Ok(MatchId(res.last_insert_id()))
    }

    async fn set_advancement_link(
        &mut self,
        id: MatchId,
        kind: LinkKind,
        to: SlotRef,
    ) -> Result<(), StoreError> {
        let column = match kind {
            LinkKind::Winner => "winner",
            LinkKind::Loser => "loser",
        };

        sqlx::query(&format!(
            "UPDATE {}matches SET {}_match = ?, {}_slot = ? WHERE id = ?",
            self.table_prefix, column, column
        ))
        .bind(to.match_id.0)
        .bind(to.slot)
        .bind(id.0)
        .execute(&mut self.tx)
        .await?;

        Ok(())
    }

    async fn set_starting_slots(
        &mut self,
        id: MatchId,
        slots: [EntrantSpot<ParticipantId>; 2],
    ) -> Result<(), StoreError> {
        let (slot0_kind, slot0_participant) = encode_spot(slots[0]);
        let (slot1_kind, slot1_participant) = encode_spot(slots[1]);

        sqlx::query(&format!(
            "UPDATE {}matches SET slot0_kind = ?, slot0_participant = ?, slot1_kind = ?, slot1_participant = ? WHERE id = ?",
            self.table_prefix
        ))
        .bind(slot0_kind)
        .bind(slot0_participant)
        .bind(slot1_kind)
        .bind(slot1_participant)
        .bind(id.0)
        .execute(&mut self.tx)
        .await?;

        Ok(())
    }

    async fn list_matches(
        &mut self,
        tournament_id: TournamentId,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        fetch_matches(&mut self.tx, &self.table_prefix, tournament_id).await
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

async fn fetch_matches<'c, E>(
    executor: E,
    table_prefix: &str,
    tournament_id: TournamentId,
) -> Result<Vec<MatchRecord>, StoreError>
where
    E: Executor<'c, Database = MySql>,
{
    let sql = format!(
        "SELECT id, round, number_in_round, sequence, section, marker, slot0_kind, slot0_participant, slot1_kind, slot1_participant, winner_match, winner_slot, loser_match, loser_slot, status FROM {}matches WHERE tournament_id = ? ORDER BY sequence",
        table_prefix
    );

    let mut rows = sqlx::query(&sql).bind(tournament_id.0).fetch(executor);

    let mut matches = Vec::new();
    while let Some(row) = rows.try_next().await? {
        matches.push(decode_match(tournament_id, &row)?);
    }

    Ok(matches)
}

fn decode_match(tournament_id: TournamentId, row: &MySqlRow) -> Result<MatchRecord, StoreError> {
    let id: u64 = row.try_get("id")?;

    let section: u8 = row.try_get("section")?;
    let section = BracketSection::from_u8(section)
        .ok_or_else(|| corrupt(id, format!("invalid section {}", section)))?;

    let marker = match row.try_get::<Option<u8>, _>("marker")? {
        Some(marker) => Some(
            RoundMarker::from_u8(marker)
                .ok_or_else(|| corrupt(id, format!("invalid marker {}", marker)))?,
        ),
        None => None,
    };

    let status: u8 = row.try_get("status")?;
    let status = MatchStatus::from_u8(status)
        .ok_or_else(|| corrupt(id, format!("invalid status {}", status)))?;

    let mut slots = [EntrantSpot::TBD; 2];
    for (index, slot) in slots.iter_mut().enumerate() {
        let kind: u8 = row.try_get(format!("slot{}_kind", index).as_str())?;
        let participant: Option<u64> =
            row.try_get(format!("slot{}_participant", index).as_str())?;

        *slot = decode_spot(kind, participant)
            .ok_or_else(|| corrupt(id, format!("invalid slot {}", index)))?;
    }

    let winner_to = decode_link(row.try_get("winner_match")?, row.try_get("winner_slot")?)
        .ok_or_else(|| corrupt(id, String::from("invalid winner link")))?;
    let loser_to = decode_link(row.try_get("loser_match")?, row.try_get("loser_slot")?)
        .ok_or_else(|| corrupt(id, String::from("invalid loser link")))?;

    Ok(MatchRecord {
        id: MatchId(id),
        tournament_id,
        round: row.try_get("round")?,
        number_in_round: row.try_get("number_in_round")?,
        sequence: row.try_get("sequence")?,
        section,
        marker,
        slots,
        winner_to,
        loser_to,
        status,
    })
}

fn corrupt(id: u64, reason: String) -> StoreError {
    StoreError::Corrupt {
        table: "matches",
        reason: format!("match {}: {}", id, reason),
    }
}

fn encode_spot(spot: EntrantSpot<ParticipantId>) -> (u8, Option<u64>) {
    match spot {
        EntrantSpot::TBD => (SPOT_TBD, None),
        EntrantSpot::Empty => (SPOT_EMPTY, None),
        EntrantSpot::Entrant(id) => (SPOT_ENTRANT, Some(id.0)),
    }
}

fn decode_spot(kind: u8, participant: Option<u64>) -> Option<EntrantSpot<ParticipantId>> {
    match (kind, participant) {
        (SPOT_TBD, None) => Some(EntrantSpot::TBD),
        (SPOT_EMPTY, None) => Some(EntrantSpot::Empty),
        (SPOT_ENTRANT, Some(id)) => Some(EntrantSpot::Entrant(ParticipantId(id))),
        _ => None,
    }
}

/// Returns `None` if only one of both columns is set or the slot is out of range.
fn decode_link(match_id: Option<u64>, slot: Option<u8>) -> Option<Option<SlotRef>> {
    match (match_id, slot) {
        (None, None) => Some(None),
        (Some(match_id), Some(slot)) if slot < 2 => Some(Some(SlotRef {
            match_id: MatchId(match_id),
            slot,
        })),
        _ => None,
    }
}
