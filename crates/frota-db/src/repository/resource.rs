//! SurrealDB implementation of [`ResourceRepository`].

use chrono::{DateTime, Utc};
use frota_core::error::{FrotaError, FrotaResult};
use frota_core::models::resource::{CreateResource, Resource, ResourceKind, UpdateResource};
use frota_core::repository::{PaginatedResult, Pagination, ResourceRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct ResourceRow {
    kind: String,
    code: String,
    description: String,
    active: bool,
    current_site_id: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ResourceRowWithId {
    record_id: String,
    kind: String,
    code: String,
    description: String,
    active: bool,
    current_site_id: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub(crate) fn parse_kind(s: &str) -> Result<ResourceKind, DbError> {
    match s {
        "Vehicle" => Ok(ResourceKind::Vehicle),
        "Equipment" => Ok(ResourceKind::Equipment),
        "Material" => Ok(ResourceKind::Material),
        other => Err(DbError::Corrupt(format!("unknown resource kind: {other}"))),
    }
}

fn row_to_resource(row: ResourceRow, id: Uuid) -> Result<Resource, DbError> {
    let current_site_id = row
        .current_site_id
        .map(|s| parse_uuid(&s, "site"))
        .transpose()?;
    Ok(Resource {
        id,
        kind: parse_kind(&row.kind)?,
        code: row.code,
        description: row.description,
        active: row.active,
        current_site_id,
        metadata: row.metadata,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl ResourceRowWithId {
    fn try_into_resource(self) -> Result<Resource, DbError> {
        let id = parse_uuid(&self.record_id, "resource")?;
        row_to_resource(
            ResourceRow {
                kind: self.kind,
                code: self.code,
                description: self.description,
                active: self.active,
                current_site_id: self.current_site_id,
                metadata: self.metadata,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            id,
        )
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the resource registry.
pub struct SurrealResourceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealResourceRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealResourceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn code_taken(
        &self,
        kind: ResourceKind,
        code: &str,
        except: Option<Uuid>,
    ) -> FrotaResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM resource \
                 WHERE kind = $kind AND code = $code",
            )
            .bind(("kind", kind.as_str().to_string()))
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;
        let except = except.map(|id| id.to_string());
        Ok(rows
            .iter()
            .any(|row| except.as_deref() != Some(row.record_id.as_str())))
    }

    async fn select_many(
        &self,
        query: &'static str,
        key: &'static str,
        value: String,
    ) -> FrotaResult<Vec<Resource>> {
        let mut result = self
            .db
            .query(query)
            .bind((key, value))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_resource())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}

impl<C: Connection> ResourceRepository for SurrealResourceRepository<C> {
    async fn create(&self, input: CreateResource) -> FrotaResult<Resource> {
        if self.code_taken(input.kind, &input.code, None).await? {
            return Err(FrotaError::AlreadyExists {
                entity: format!("{} {}", input.kind, input.code),
            });
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('resource', $id) SET \
                 kind = $kind, code = $code, description = $description, \
                 active = $active, current_site_id = NONE, \
                 metadata = $metadata",
            )
            .bind(("id", id_str.clone()))
            .bind(("kind", input.kind.as_str().to_string()))
            .bind(("code", input.code))
            .bind(("description", input.description))
            .bind(("active", input.active.unwrap_or(true)))
            .bind(("metadata", metadata))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource".into(),
            id: id_str,
        })?;

        row_to_resource(row, id).map_err(Into::into)
    }

    async fn get_by_id(&self, id: Uuid) -> FrotaResult<Resource> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('resource', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource".into(),
            id: id_str,
        })?;

        row_to_resource(row, id).map_err(Into::into)
    }

    async fn update(&self, id: Uuid, input: UpdateResource) -> FrotaResult<Resource> {
        let id_str = id.to_string();

        if let Some(ref code) = input.code {
            let existing = self.get_by_id(id).await?;
            if self.code_taken(existing.kind, code, Some(id)).await? {
                return Err(FrotaError::AlreadyExists {
                    entity: format!("{} {}", existing.kind, code),
                });
            }
        }

        let mut sets = Vec::new();
        if input.code.is_some() {
            sets.push("code = $code");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.active.is_some() {
            sets.push("active = $active");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('resource', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(code) = input.code {
            builder = builder.bind(("code", code));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(active) = input.active {
            builder = builder.bind(("active", active));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource".into(),
            id: id_str,
        })?;

        row_to_resource(row, id).map_err(Into::into)
    }

    async fn delete(&self, id: Uuid) -> FrotaResult<()> {
        let id_str = id.to_string();

        // Only unassigned resources may disappear from the registry.
        let result = self
            .db
            .query(
                "DELETE type::record('resource', $id) \
                 WHERE current_site_id = NONE RETURN BEFORE",
            )
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        if !rows.is_empty() {
            return Ok(());
        }

        // Nothing deleted: either the resource is unknown or still assigned.
        let resource = self.get_by_id(id).await?;
        match resource.current_site_id {
            Some(site_id) => Err(FrotaError::AlreadyAssigned {
                resource_id: id,
                site_id,
            }),
            None => Err(FrotaError::Storage(format!(
                "resource {id} could not be deleted"
            ))),
        }
    }

    async fn list(&self, pagination: Pagination) -> FrotaResult<PaginatedResult<Resource>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM resource GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM resource \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_resource())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_kind(&self, kind: ResourceKind) -> FrotaResult<Vec<Resource>> {
        self.select_many(
            "SELECT meta::id(id) AS record_id, * FROM resource \
             WHERE kind = $kind ORDER BY code ASC",
            "kind",
            kind.as_str().to_string(),
        )
        .await
    }

    async fn list_by_site(&self, site_id: Uuid) -> FrotaResult<Vec<Resource>> {
        self.select_many(
            "SELECT meta::id(id) AS record_id, * FROM resource \
             WHERE current_site_id = $site_id ORDER BY kind ASC, code ASC",
            "site_id",
            site_id.to_string(),
        )
        .await
    }

    async fn set_assignment(&self, id: Uuid, site_id: Option<Uuid>) -> FrotaResult<()> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('resource', $id) SET \
                 current_site_id = $site_id, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("site_id", site_id.map(|s| s.to_string())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "resource".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }
}
