//! SurrealDB implementation of [`TripLog`].

use chrono::{DateTime, NaiveDate, Utc};
use frota_core::error::FrotaResult;
use frota_core::models::trip::{CreateVehicleTrip, VehicleTrip};
use frota_core::repository::TripLog;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct TripRowWithId {
    record_id: String,
    vehicle_id: String,
    site_id: Option<String>,
    driver: String,
    km_start: f64,
    km_end: f64,
    trip_date: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TripRowWithId {
    fn try_into_trip(self) -> Result<VehicleTrip, DbError> {
        let trip_date = NaiveDate::parse_from_str(&self.trip_date, "%Y-%m-%d")
            .map_err(|e| DbError::Corrupt(format!("invalid trip date {}: {e}", self.trip_date)))?;
        Ok(VehicleTrip {
            id: parse_uuid(&self.record_id, "vehicle_trip")?,
            vehicle_id: parse_uuid(&self.vehicle_id, "resource")?,
            site_id: self
                .site_id
                .map(|s| parse_uuid(&s, "site"))
                .transpose()?,
            driver: self.driver,
            km_start: self.km_start,
            km_end: self.km_end,
            trip_date,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the vehicle trip log.
pub struct SurrealTripLog<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealTripLog<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealTripLog<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select_trips(
        &self,
        query: &'static str,
        key: &'static str,
        value: String,
    ) -> FrotaResult<Vec<VehicleTrip>> {
        let mut result = self
            .db
            .query(query)
            .bind((key, value))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TripRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| row.try_into_trip())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}

impl<C: Connection> TripLog for SurrealTripLog<C> {
    async fn create(&self, input: CreateVehicleTrip) -> FrotaResult<VehicleTrip> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('vehicle_trip', $id) SET \
                 vehicle_id = $vehicle_id, site_id = $site_id, driver = $driver, \
                 km_start = $km_start, km_end = $km_end, trip_date = $trip_date, \
                 notes = $notes;
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('vehicle_trip', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("vehicle_id", input.vehicle_id.to_string()))
            .bind(("site_id", input.site_id.map(|s| s.to_string())))
            .bind(("driver", input.driver))
            .bind(("km_start", input.km_start))
            .bind(("km_end", input.km_end))
            .bind(("trip_date", input.trip_date.format("%Y-%m-%d").to_string()))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<TripRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "vehicle_trip".into(),
            id: id_str,
        })?;

        row.try_into_trip().map_err(Into::into)
    }

    async fn list_by_vehicle(&self, vehicle_id: Uuid) -> FrotaResult<Vec<VehicleTrip>> {
        self.select_trips(
            "SELECT meta::id(id) AS record_id, * FROM vehicle_trip \
             WHERE vehicle_id = $vehicle_id \
             ORDER BY trip_date DESC, created_at DESC",
            "vehicle_id",
            vehicle_id.to_string(),
        )
        .await
    }

    async fn list_by_site(&self, site_id: Uuid) -> FrotaResult<Vec<VehicleTrip>> {
        self.select_trips(
            "SELECT meta::id(id) AS record_id, * FROM vehicle_trip \
             WHERE site_id = $site_id \
             ORDER BY trip_date DESC, created_at DESC",
            "site_id",
            site_id.to_string(),
        )
        .await
    }
}
