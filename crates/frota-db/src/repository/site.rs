//! SurrealDB implementation of [`SiteRepository`].

use chrono::{DateTime, Utc};
use frota_core::error::{FrotaError, FrotaResult};
use frota_core::models::site::{CreateSite, Site, SiteState, UpdateSite};
use frota_core::repository::{PaginatedResult, Pagination, SiteRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

/// Occupancy check and delete in one transaction. Assigns stamp
/// `last_movement_at` on the site, so a racing assign and delete conflict.
const DELETE_UNOCCUPIED: &str = "\
BEGIN TRANSACTION;
LET $occupied = (SELECT VALUE meta::id(id) FROM resource \
    WHERE current_site_id = $id LIMIT 1);
IF array::len($occupied) > 0 { THROW 'site still has assigned resources' };
DELETE type::record('site', $id);
COMMIT TRANSACTION;";

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct SiteRow {
    code: String,
    name: String,
    address: String,
    client: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct SiteRowWithId {
    record_id: String,
    code: String,
    name: String,
    address: String,
    client: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_state(s: &str) -> Result<SiteState, DbError> {
    match s {
        "Active" => Ok(SiteState::Active),
        "Paused" => Ok(SiteState::Paused),
        "Completed" => Ok(SiteState::Completed),
        other => Err(DbError::Corrupt(format!("unknown site state: {other}"))),
    }
}

impl SiteRow {
    fn into_site(self, id: Uuid) -> Result<Site, DbError> {
        Ok(Site {
            id,
            code: self.code,
            name: self.name,
            address: self.address,
            client: self.client,
            state: parse_state(&self.state)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl SiteRowWithId {
    fn try_into_site(self) -> Result<Site, DbError> {
        Ok(Site {
            id: parse_uuid(&self.record_id, "site")?,
            code: self.code,
            name: self.name,
            address: self.address,
            client: self.client,
            state: parse_state(&self.state)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the site registry.
pub struct SurrealSiteRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealSiteRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealSiteRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_code(&self, code: &str) -> FrotaResult<Option<Site>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM site WHERE code = $code")
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SiteRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_site())
            .transpose()
            .map_err(Into::into)
    }

    async fn occupant_count(&self, id: Uuid) -> FrotaResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM resource \
                 WHERE current_site_id = $site_id GROUP ALL",
            )
            .bind(("site_id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}

impl<C: Connection> SiteRepository for SurrealSiteRepository<C> {
    async fn create(&self, input: CreateSite) -> FrotaResult<Site> {
        if self.find_by_code(&input.code).await?.is_some() {
            return Err(FrotaError::AlreadyExists {
                entity: format!("site {}", input.code),
            });
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let state = input.state.unwrap_or_default();

        let result = self
            .db
            .query(
                "CREATE type::record('site', $id) SET \
                 code = $code, name = $name, address = $address, \
                 client = $client, state = $state",
            )
            .bind(("id", id_str.clone()))
            .bind(("code", input.code))
            .bind(("name", input.name))
            .bind(("address", input.address.unwrap_or_default()))
            .bind(("client", input.client.unwrap_or_default()))
            .bind(("state", state.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SiteRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "site".into(),
            id: id_str,
        })?;

        row.into_site(id).map_err(Into::into)
    }

    async fn get_by_id(&self, id: Uuid) -> FrotaResult<Site> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('site', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SiteRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "site".into(),
            id: id_str,
        })?;

        row.into_site(id).map_err(Into::into)
    }

    async fn update(&self, id: Uuid, input: UpdateSite) -> FrotaResult<Site> {
        let id_str = id.to_string();

        if let Some(ref code) = input.code {
            match self.find_by_code(code).await? {
                Some(other) if other.id != id => {
                    return Err(FrotaError::AlreadyExists {
                        entity: format!("site {code}"),
                    });
                }
                _ => {}
            }
        }

        let mut sets = Vec::new();
        if input.code.is_some() {
            sets.push("code = $code");
        }
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.address.is_some() {
            sets.push("address = $address");
        }
        if input.client.is_some() {
            sets.push("client = $client");
        }
        if input.state.is_some() {
            sets.push("state = $state");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('site', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(code) = input.code {
            builder = builder.bind(("code", code));
        }
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(address) = input.address {
            builder = builder.bind(("address", address));
        }
        if let Some(client) = input.client {
            builder = builder.bind(("client", client));
        }
        if let Some(state) = input.state {
            builder = builder.bind(("state", state.as_str().to_string()));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SiteRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "site".into(),
            id: id_str,
        })?;

        let site = row.into_site(id)?;
        if let Some(state) = input.state {
            info!(site_id = %id, state = %state, "Site state updated");
        }
        Ok(site)
    }

    async fn delete(&self, id: Uuid) -> FrotaResult<()> {
        // Ensures the site exists before checking occupancy.
        self.get_by_id(id).await?;

        let result = self
            .db
            .query(DELETE_UNOCCUPIED)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        if let Err(e) = result.check() {
            let occupants = self.occupant_count(id).await?;
            if occupants > 0 {
                return Err(FrotaError::Validation {
                    message: format!(
                        "site {id} still has {occupants} assigned resource(s); return them first"
                    ),
                });
            }
            return Err(DbError::Query(format!("site delete rolled back: {e}")).into());
        }

        info!(site_id = %id, "Site deleted");
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> FrotaResult<PaginatedResult<Site>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM site GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM site \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SiteRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_site())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_state(&self, state: SiteState) -> FrotaResult<Vec<Site>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM site \
                 WHERE state = $state ORDER BY code ASC",
            )
            .bind(("state", state.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SiteRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_site())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
