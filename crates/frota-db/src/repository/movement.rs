//! SurrealDB implementation of [`MovementLedger`].
//!
//! Each movement is stored as one flat row: the variant goes into
//! `movement_type`, its site into `site_id`, and the person who handed the
//! resource over (assign) or received it back (return) into `actor`.
//!
//! [`MovementLedger::append`] writes the event and moves the resource's
//! `current_site_id` inside a single transaction, so the registry cache can
//! never run ahead of or behind the ledger. The transaction throws when the
//! resource (or, for an assign, the target site) no longer exists. An assign
//! also stamps `site.last_movement_at`, so it conflicts with a concurrent
//! site delete instead of pointing at a vanished site. The unique
//! `(resource_id, sequence)` index turns a lost race between two writers
//! into a failed transaction instead of a forked history.

use chrono::{DateTime, Utc};
use frota_core::error::{FrotaError, FrotaResult};
use frota_core::models::movement::{Movement, MovementEvent, NewMovement};
use frota_core::repository::{MovementLedger, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};
use crate::repository::resource::parse_kind;

const APPEND_TRANSITION: &str = "\
BEGIN TRANSACTION;
LET $resource = (UPDATE ONLY type::record('resource', $resource_id) SET \
    current_site_id = $current_site_id, \
    updated_at = time::now() \
    RETURN AFTER);
IF $resource = NONE { THROW 'movement target resource does not exist' };
IF $movement_type = 'Assign' {
    LET $site = (UPDATE ONLY type::record('site', $site_id) SET \
        last_movement_at = time::now() \
        RETURN AFTER);
    IF $site = NONE { THROW 'movement target site does not exist' };
};
CREATE type::record('movement', $id) SET \
    resource_id = $resource_id, \
    resource_kind = $resource_kind, \
    sequence = $sequence, \
    timestamp = $timestamp, \
    movement_type = $movement_type, \
    site_id = $site_id, \
    actor = $actor, \
    notes = $notes;
COMMIT TRANSACTION;";

#[derive(Debug, SurrealValue)]
struct MovementRowWithId {
    record_id: String,
    resource_id: String,
    resource_kind: String,
    sequence: u64,
    timestamp: DateTime<Utc>,
    movement_type: String,
    site_id: String,
    actor: String,
    notes: Option<String>,
}

impl MovementRowWithId {
    fn try_into_event(self) -> Result<MovementEvent, DbError> {
        let site_id = parse_uuid(&self.site_id, "site")?;
        let movement = match self.movement_type.as_str() {
            "Assign" => Movement::Assign {
                site_id,
                handed_over_by: self.actor,
            },
            "Return" => Movement::Return {
                site_id,
                received_by: self.actor,
            },
            other => {
                return Err(DbError::Corrupt(format!("unknown movement type: {other}")));
            }
        };
        Ok(MovementEvent {
            id: parse_uuid(&self.record_id, "movement")?,
            resource_id: parse_uuid(&self.resource_id, "resource")?,
            resource_kind: parse_kind(&self.resource_kind)?,
            sequence: self.sequence,
            timestamp: self.timestamp,
            movement,
            notes: self.notes,
        })
    }
}

fn split_movement(movement: &Movement) -> (&'static str, Uuid, String) {
    match movement {
        Movement::Assign {
            site_id,
            handed_over_by,
        } => ("Assign", *site_id, handed_over_by.clone()),
        Movement::Return {
            site_id,
            received_by,
        } => ("Return", *site_id, received_by.clone()),
    }
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    #[allow(dead_code)]
    record_id: String,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the movement ledger.
pub struct SurrealMovementLedger<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealMovementLedger<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealMovementLedger<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn record_exists(&self, table: &'static str, id: Uuid) -> FrotaResult<bool> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id FROM type::record($table, $id)")
            .bind(("table", table.to_string()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }

    /// Turn a rolled-back append into `NotFound` when one of its targets
    /// is gone, otherwise into a storage error.
    async fn explain_rollback(&self, input: &NewMovement, err: surrealdb::Error) -> FrotaError {
        match self.record_exists("resource", input.resource_id).await {
            Ok(false) => return FrotaError::not_found("resource", input.resource_id),
            Err(lookup) => return lookup,
            Ok(true) => {}
        }
        if let Movement::Assign { site_id, .. } = &input.movement {
            match self.record_exists("site", *site_id).await {
                Ok(false) => return FrotaError::not_found("site", *site_id),
                Err(lookup) => return lookup,
                Ok(true) => {}
            }
        }
        DbError::Query(format!("ledger append rolled back: {err}")).into()
    }

    async fn select_events(
        &self,
        query: &'static str,
        resource_id: Uuid,
    ) -> FrotaResult<Vec<MovementEvent>> {
        let mut result = self
            .db
            .query(query)
            .bind(("resource_id", resource_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MovementRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_event())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}

impl<C: Connection> MovementLedger for SurrealMovementLedger<C> {
    async fn append(&self, input: NewMovement) -> FrotaResult<MovementEvent> {
        let id = Uuid::new_v4();
        let (movement_type, site_id, actor) = split_movement(&input.movement);
        let current_site_id = input.movement.resulting_site().map(|s| s.to_string());

        let result = self
            .db
            .query(APPEND_TRANSITION)
            .bind(("id", id.to_string()))
            .bind(("resource_id", input.resource_id.to_string()))
            .bind(("resource_kind", input.resource_kind.as_str().to_string()))
            .bind(("sequence", input.sequence))
            .bind(("timestamp", input.timestamp))
            .bind(("movement_type", movement_type.to_string()))
            .bind(("site_id", site_id.to_string()))
            .bind(("actor", actor))
            .bind(("notes", input.notes.clone()))
            .bind(("current_site_id", current_site_id))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = result.check() {
            return Err(self.explain_rollback(&input, e).await);
        }

        debug!(
            movement_id = %id,
            resource_id = %input.resource_id,
            sequence = input.sequence,
            movement_type,
            "Movement appended"
        );

        Ok(MovementEvent {
            id,
            resource_id: input.resource_id,
            resource_kind: input.resource_kind,
            sequence: input.sequence,
            timestamp: input.timestamp,
            movement: input.movement,
            notes: input.notes,
        })
    }

    async fn history(&self, resource_id: Uuid) -> FrotaResult<Vec<MovementEvent>> {
        self.select_events(
            "SELECT meta::id(id) AS record_id, * FROM movement \
             WHERE resource_id = $resource_id \
             ORDER BY sequence ASC",
            resource_id,
        )
        .await
    }

    async fn latest(&self, resource_id: Uuid) -> FrotaResult<Option<MovementEvent>> {
        let events = self
            .select_events(
                "SELECT meta::id(id) AS record_id, * FROM movement \
                 WHERE resource_id = $resource_id \
                 ORDER BY sequence DESC LIMIT 1",
                resource_id,
            )
            .await?;
        Ok(events.into_iter().next())
    }

    async fn list_by_site(
        &self,
        site_id: Uuid,
        pagination: Pagination,
    ) -> FrotaResult<PaginatedResult<MovementEvent>> {
        let site_id_str = site_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM movement \
                 WHERE site_id = $site_id GROUP ALL",
            )
            .bind(("site_id", site_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM movement \
                 WHERE site_id = $site_id \
                 ORDER BY timestamp DESC, sequence DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("site_id", site_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MovementRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_event())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
