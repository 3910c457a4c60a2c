//! Vehicle trip log.

use frota_core::error::{FrotaError, FrotaResult};
use frota_core::models::resource::ResourceKind;
use frota_core::models::trip::{CreateVehicleTrip, VehicleTrip};
use frota_core::repository::{ResourceRepository, SiteRepository, TripLog};
use tracing::info;
use uuid::Uuid;

pub struct TripService<R: ResourceRepository, S: SiteRepository, T: TripLog> {
    resources: R,
    sites: S,
    trips: T,
}

impl<R: ResourceRepository, S: SiteRepository, T: TripLog> TripService<R, S, T> {
    pub fn new(resources: R, sites: S, trips: T) -> Self {
        Self {
            resources,
            sites,
            trips,
        }
    }

    pub async fn record_trip(&self, mut input: CreateVehicleTrip) -> FrotaResult<VehicleTrip> {
        let readings_valid = input.km_start.is_finite()
            && input.km_end.is_finite()
            && input.km_start >= 0.0
            && input.km_end >= input.km_start;
        if !readings_valid {
            return Err(FrotaError::Validation {
                message: format!(
                    "odometer readings must satisfy 0 <= km_start <= km_end, got {} -> {}",
                    input.km_start, input.km_end
                ),
            });
        }

        self.ensure_vehicle(input.vehicle_id).await?;
        if let Some(site_id) = input.site_id {
            self.sites.get_by_id(site_id).await?;
        }

        input.driver = input.driver.trim().to_string();
        input.notes = input
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let trip = self.trips.create(input).await?;
        info!(
            vehicle_id = %trip.vehicle_id,
            trip_id = %trip.id,
            distance_km = trip.distance_km(),
            "Vehicle trip recorded"
        );
        Ok(trip)
    }

    pub async fn trips_of(&self, vehicle_id: Uuid) -> FrotaResult<Vec<VehicleTrip>> {
        self.ensure_vehicle(vehicle_id).await?;
        self.trips.list_by_vehicle(vehicle_id).await
    }

    pub async fn trips_at_site(&self, site_id: Uuid) -> FrotaResult<Vec<VehicleTrip>> {
        self.sites.get_by_id(site_id).await?;
        self.trips.list_by_site(site_id).await
    }

    async fn ensure_vehicle(&self, id: Uuid) -> FrotaResult<()> {
        let resource = self.resources.get_by_id(id).await?;
        if resource.kind != ResourceKind::Vehicle {
            return Err(FrotaError::not_found("vehicle", id));
        }
        Ok(())
    }
}
