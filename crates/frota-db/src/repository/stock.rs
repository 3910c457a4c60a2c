//! SurrealDB implementation of [`StockLedger`].

use chrono::{DateTime, Utc};
use frota_core::error::{FrotaError, FrotaResult};
use frota_core::models::stock::{NewStockMovement, StockDirection, StockMovement};
use frota_core::repository::{PaginatedResult, Pagination, StockLedger};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

const RECORD_STOCK_MOVEMENT: &str = "\
BEGIN TRANSACTION;
LET $material = (UPDATE ONLY type::record('resource', $material_id) SET \
    metadata.stock_current = $balance_after, \
    updated_at = time::now() \
    WHERE kind = 'Material' \
    RETURN AFTER);
IF $material = NONE { THROW 'stock movement target material does not exist' };
CREATE type::record('stock_movement', $id) SET \
    material_id = $material_id, \
    sequence = $sequence, \
    timestamp = $timestamp, \
    direction = $direction, \
    quantity = $quantity, \
    balance_after = $balance_after, \
    site_id = $site_id, \
    supplier = $supplier, \
    document = $document, \
    responsible = $responsible, \
    notes = $notes;
COMMIT TRANSACTION;";

#[derive(Debug, SurrealValue)]
struct StockRowWithId {
    record_id: String,
    material_id: String,
    sequence: u64,
    timestamp: DateTime<Utc>,
    direction: String,
    quantity: f64,
    balance_after: f64,
    site_id: Option<String>,
    supplier: String,
    document: String,
    responsible: String,
    notes: Option<String>,
}

fn parse_direction(s: &str) -> Result<StockDirection, DbError> {
    match s {
        "Inbound" => Ok(StockDirection::Inbound),
        "Outbound" => Ok(StockDirection::Outbound),
        other => Err(DbError::Corrupt(format!("unknown stock direction: {other}"))),
    }
}

impl StockRowWithId {
    fn try_into_movement(self) -> Result<StockMovement, DbError> {
        Ok(StockMovement {
            id: parse_uuid(&self.record_id, "stock_movement")?,
            material_id: parse_uuid(&self.material_id, "resource")?,
            sequence: self.sequence,
            timestamp: self.timestamp,
            direction: parse_direction(&self.direction)?,
            quantity: self.quantity,
            balance_after: self.balance_after,
            site_id: self
                .site_id
                .map(|s| parse_uuid(&s, "site"))
                .transpose()?,
            supplier: self.supplier,
            document: self.document,
            responsible: self.responsible,
            notes: self.notes,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct KindRow {
    kind: String,
}

/// SurrealDB implementation of the material stock ledger.
pub struct SurrealStockLedger<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealStockLedger<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealStockLedger<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select_movements(
        &self,
        material_id: Uuid,
        newest_first: bool,
    ) -> FrotaResult<Vec<StockMovement>> {
        let query = if newest_first {
            "SELECT meta::id(id) AS record_id, * FROM stock_movement \
             WHERE material_id = $material_id ORDER BY sequence DESC LIMIT 1"
        } else {
            "SELECT meta::id(id) AS record_id, * FROM stock_movement \
             WHERE material_id = $material_id ORDER BY sequence ASC"
        };

        let mut result = self
            .db
            .query(query)
            .bind(("material_id", material_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StockRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| row.try_into_movement())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    /// Classify a rolled-back append: a missing or non-material target is
    /// `NotFound`, anything else is a storage fault.
    async fn explain_rollback(&self, material_id: Uuid, err: surrealdb::Error) -> FrotaError {
        let lookup = async {
            let mut result = self
                .db
                .query("SELECT kind FROM type::record('resource', $id)")
                .bind(("id", material_id.to_string()))
                .await?;
            let rows: Vec<KindRow> = result.take(0)?;
            Ok::<_, surrealdb::Error>(rows)
        };
        match lookup.await {
            Ok(rows) if rows.iter().all(|r| r.kind != "Material") => {
                FrotaError::not_found("material", material_id)
            }
            Ok(_) => DbError::Query(format!("stock movement rolled back: {err}")).into(),
            Err(lookup_err) => DbError::from(lookup_err).into(),
        }
    }
}

impl<C: Connection> StockLedger for SurrealStockLedger<C> {
    async fn record(&self, input: NewStockMovement) -> FrotaResult<StockMovement> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(RECORD_STOCK_MOVEMENT)
            .bind(("id", id.to_string()))
            .bind(("material_id", input.material_id.to_string()))
            .bind(("sequence", input.sequence))
            .bind(("timestamp", input.timestamp))
            .bind(("direction", input.direction.as_str().to_string()))
            .bind(("quantity", input.quantity))
            .bind(("balance_after", input.balance_after))
            .bind(("site_id", input.site_id.map(|s| s.to_string())))
            .bind(("supplier", input.supplier.clone()))
            .bind(("document", input.document.clone()))
            .bind(("responsible", input.responsible.clone()))
            .bind(("notes", input.notes.clone()))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = result.check() {
            return Err(self.explain_rollback(input.material_id, e).await);
        }

        debug!(
            stock_movement_id = %id,
            material_id = %input.material_id,
            sequence = input.sequence,
            direction = input.direction.as_str(),
            balance_after = input.balance_after,
            "Stock movement recorded"
        );

        Ok(StockMovement {
            id,
            material_id: input.material_id,
            sequence: input.sequence,
            timestamp: input.timestamp,
            direction: input.direction,
            quantity: input.quantity,
            balance_after: input.balance_after,
            site_id: input.site_id,
            supplier: input.supplier,
            document: input.document,
            responsible: input.responsible,
            notes: input.notes,
        })
    }

    async fn history(&self, material_id: Uuid) -> FrotaResult<Vec<StockMovement>> {
        self.select_movements(material_id, false).await
    }

    async fn latest(&self, material_id: Uuid) -> FrotaResult<Option<StockMovement>> {
        Ok(self
            .select_movements(material_id, true)
            .await?
            .into_iter()
            .next())
    }

    async fn list_by_site(
        &self,
        site_id: Uuid,
        pagination: Pagination,
    ) -> FrotaResult<PaginatedResult<StockMovement>> {
        let site_id_str = site_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM stock_movement \
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
                "SELECT meta::id(id) AS record_id, * FROM stock_movement \
                 WHERE site_id = $site_id \
                 ORDER BY timestamp DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("site_id", site_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StockRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_movement())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
