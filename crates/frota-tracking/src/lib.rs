//! Frota Tracking: assignment state machine, per-resource serialization,
//! stock and trip logs, site aggregation and document/stock alerts.

pub mod aggregator;
pub mod alerts;
pub mod config;
pub mod error;
pub mod locks;
pub mod service;
pub mod state;
pub mod stock;
pub mod trips;

pub use aggregator::{InventorySummary, SiteAggregator, SiteResources};
pub use alerts::{Alert, AlertKind, AlertScanner, evaluate_alerts};
pub use config::TrackingConfig;
pub use error::TransitionError;
pub use locks::ResourceLocks;
pub use service::{AssignInput, AssignmentService, Drift, ReconcileReport, ReturnInput};
pub use state::AssignmentState;
pub use stock::{StockInput, StockService};
pub use trips::TripService;
