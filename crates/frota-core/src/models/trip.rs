//! Vehicle trip log: who drove a vehicle, where, and the odometer range.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleTrip {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub site_id: Option<Uuid>,
    pub driver: String,
    pub km_start: f64,
    pub km_end: f64,
    pub trip_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VehicleTrip {
    pub fn distance_km(&self) -> f64 {
        self.km_end - self.km_start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVehicleTrip {
    pub vehicle_id: Uuid,
    #[serde(default)]
    pub site_id: Option<Uuid>,
    #[serde(default)]
    pub driver: String,
    pub km_start: f64,
    pub km_end: f64,
    pub trip_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}
