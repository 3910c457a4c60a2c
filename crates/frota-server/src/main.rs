//! Frota server: application entry point.
//!
//! Connects to SurrealDB, applies migrations, rebuilds any assignment
//! pointer that drifted from the movement ledger, and reports the
//! current inventory and pending alerts. Low-stock alerts carry the last
//! stock movement and due inspections the kilometres logged since.

use frota_core::models::resource::ResourceKind;
use frota_core::models::site::SiteState;
use frota_db::repository::{
    SurrealMovementLedger, SurrealResourceRepository, SurrealSiteRepository, SurrealStockLedger,
    SurrealTripLog,
};
use frota_db::{DbConfig, DbManager};
use frota_tracking::{
    AlertKind, AlertScanner, AssignmentService, SiteAggregator, StockService, TrackingConfig,
    TripService,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("frota=info".parse()?))
        .json()
        .init();

    info!("Starting frota server...");

    let db_config = DbConfig::from_env();
    let tracking_config = TrackingConfig::from_env();

    let manager = DbManager::connect(&db_config).await?;
    let db = manager.client().clone();
    frota_db::run_migrations(&db).await?;

    let resources = SurrealResourceRepository::new(db.clone());
    let sites = SurrealSiteRepository::new(db.clone());
    let ledger = SurrealMovementLedger::new(db.clone());

    let service = AssignmentService::new(resources.clone(), sites.clone(), ledger);
    let stock = StockService::new(
        resources.clone(),
        sites.clone(),
        SurrealStockLedger::new(db.clone()),
        service.locks(),
    );
    let trips = TripService::new(resources.clone(), sites.clone(), SurrealTripLog::new(db));
    let report = service.reconcile_all().await?;
    for drift in &report.drifts {
        warn!(
            resource_id = %drift.resource_id,
            cached = ?drift.cached,
            ledger = ?drift.ledger,
            "Repaired assignment pointer"
        );
    }

    let aggregator = SiteAggregator::new(resources.clone(), sites);
    let summary = aggregator.summary().await?;
    for kind in ResourceKind::ALL {
        let counts = summary.kind(kind);
        info!(
            kind = %kind,
            total = counts.total,
            active = counts.active,
            assigned = counts.assigned,
            in_pool = counts.in_pool,
            "Inventory"
        );
    }
    info!(
        active_sites = summary.sites_in(SiteState::Active),
        paused_sites = summary.sites_in(SiteState::Paused),
        completed_sites = summary.sites_in(SiteState::Completed),
        material_stock = summary.material_stock,
        "Sites"
    );

    let scanner = AlertScanner::new(resources, tracking_config);
    for alert in scanner.scan().await? {
        warn!(
            kind = ?alert.kind,
            resource_id = %alert.resource_id,
            site_id = ?alert.site_id,
            urgent = alert.urgent,
            "{}",
            alert.message
        );
        match alert.kind {
            AlertKind::LowStock => {
                if let Some(last) = stock.history(alert.resource_id).await?.last() {
                    info!(
                        resource_id = %alert.resource_id,
                        direction = last.direction.as_str(),
                        quantity = last.quantity,
                        balance_after = last.balance_after,
                        at = %last.timestamp,
                        "Last stock movement"
                    );
                }
            }
            AlertKind::InspectionDue => {
                let logged = trips.trips_of(alert.resource_id).await?;
                let km: f64 = logged.iter().map(|t| t.distance_km()).sum();
                info!(
                    resource_id = %alert.resource_id,
                    trips = logged.len(),
                    km,
                    "Logged kilometres"
                );
            }
            AlertKind::InsuranceDue => {}
        }
    }

    info!("Frota server stopped.");
    Ok(())
}
