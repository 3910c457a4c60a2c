//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. The `movement` table is the
//! append-only ledger; `resource.current_site_id` is its cache.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "assignment_tracking",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "ledger_guards_stock_and_trips",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: sites, resources, movement ledger
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Sites (construction sites / obras)
-- =======================================================================
DEFINE TABLE site SCHEMAFULL;
DEFINE FIELD code ON TABLE site TYPE string;
DEFINE FIELD name ON TABLE site TYPE string;
DEFINE FIELD address ON TABLE site TYPE string DEFAULT '';
DEFINE FIELD client ON TABLE site TYPE string DEFAULT '';
DEFINE FIELD state ON TABLE site TYPE string \
    ASSERT $value IN ['Active', 'Paused', 'Completed'];
DEFINE FIELD created_at ON TABLE site TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE site TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_site_code ON TABLE site COLUMNS code UNIQUE;
DEFINE INDEX idx_site_state ON TABLE site COLUMNS state;

-- =======================================================================
-- Resources (vehicles, equipment, materials)
-- =======================================================================
DEFINE TABLE resource SCHEMAFULL;
DEFINE FIELD kind ON TABLE resource TYPE string \
    ASSERT $value IN ['Vehicle', 'Equipment', 'Material'];
DEFINE FIELD code ON TABLE resource TYPE string;
DEFINE FIELD description ON TABLE resource TYPE string;
DEFINE FIELD active ON TABLE resource TYPE bool DEFAULT true;
DEFINE FIELD current_site_id ON TABLE resource TYPE option<string>;
DEFINE FIELD metadata ON TABLE resource TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_resource_kind_code ON TABLE resource \
    COLUMNS kind, code UNIQUE;
DEFINE INDEX idx_resource_site ON TABLE resource \
    COLUMNS current_site_id;

-- =======================================================================
-- Movement ledger (append-only)
-- =======================================================================
DEFINE TABLE movement SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD resource_id ON TABLE movement TYPE string;
DEFINE FIELD resource_kind ON TABLE movement TYPE string \
    ASSERT $value IN ['Vehicle', 'Equipment', 'Material'];
DEFINE FIELD sequence ON TABLE movement TYPE int ASSERT $value >= 1;
DEFINE FIELD timestamp ON TABLE movement TYPE datetime;
DEFINE FIELD movement_type ON TABLE movement TYPE string \
    ASSERT $value IN ['Assign', 'Return'];
DEFINE FIELD site_id ON TABLE movement TYPE string;
DEFINE FIELD actor ON TABLE movement TYPE string;
DEFINE FIELD notes ON TABLE movement TYPE option<string>;
DEFINE INDEX idx_movement_resource_seq ON TABLE movement \
    COLUMNS resource_id, sequence UNIQUE;
DEFINE INDEX idx_movement_site_time ON TABLE movement \
    COLUMNS site_id, timestamp;
";

// -----------------------------------------------------------------------
// Schema v2: immutable ledgers, stock movements, vehicle trips
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- Table permissions do not bind root sessions; events do.
DEFINE EVENT movement_append_only ON TABLE movement \
    WHEN $event IN ['UPDATE', 'DELETE'] \
    THEN { THROW 'movement ledger is append-only' };

-- Written by every assign so that deleting the site conflicts with it.
DEFINE FIELD last_movement_at ON TABLE site TYPE option<datetime>;

-- =======================================================================
-- Stock movements (material inbound / outbound, append-only)
-- =======================================================================
DEFINE TABLE stock_movement SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD material_id ON TABLE stock_movement TYPE string;
DEFINE FIELD sequence ON TABLE stock_movement TYPE int ASSERT $value >= 1;
DEFINE FIELD timestamp ON TABLE stock_movement TYPE datetime;
DEFINE FIELD direction ON TABLE stock_movement TYPE string \
    ASSERT $value IN ['Inbound', 'Outbound'];
DEFINE FIELD quantity ON TABLE stock_movement TYPE number ASSERT $value > 0;
DEFINE FIELD balance_after ON TABLE stock_movement TYPE number \
    ASSERT $value >= 0;
DEFINE FIELD site_id ON TABLE stock_movement TYPE option<string>;
DEFINE FIELD supplier ON TABLE stock_movement TYPE string DEFAULT '';
DEFINE FIELD document ON TABLE stock_movement TYPE string DEFAULT '';
DEFINE FIELD responsible ON TABLE stock_movement TYPE string DEFAULT '';
DEFINE FIELD notes ON TABLE stock_movement TYPE option<string>;
DEFINE INDEX idx_stock_material_seq ON TABLE stock_movement \
    COLUMNS material_id, sequence UNIQUE;
DEFINE INDEX idx_stock_site_time ON TABLE stock_movement \
    COLUMNS site_id, timestamp;
DEFINE EVENT stock_movement_append_only ON TABLE stock_movement \
    WHEN $event IN ['UPDATE', 'DELETE'] \
    THEN { THROW 'stock ledger is append-only' };

-- =======================================================================
-- Vehicle trips (driver log)
-- =======================================================================
DEFINE TABLE vehicle_trip SCHEMAFULL;
DEFINE FIELD vehicle_id ON TABLE vehicle_trip TYPE string;
DEFINE FIELD site_id ON TABLE vehicle_trip TYPE option<string>;
DEFINE FIELD driver ON TABLE vehicle_trip TYPE string;
DEFINE FIELD km_start ON TABLE vehicle_trip TYPE number ASSERT $value >= 0;
DEFINE FIELD km_end ON TABLE vehicle_trip TYPE number ASSERT $value >= 0;
DEFINE FIELD trip_date ON TABLE vehicle_trip TYPE string;
DEFINE FIELD notes ON TABLE vehicle_trip TYPE option<string>;
DEFINE FIELD created_at ON TABLE vehicle_trip TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_trip_vehicle ON TABLE vehicle_trip COLUMNS vehicle_id;
DEFINE INDEX idx_trip_site ON TABLE vehicle_trip COLUMNS site_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
