//! SurrealDB repository implementations.

mod movement;
mod resource;
mod site;
mod stock;
mod trip;

pub use movement::SurrealMovementLedger;
pub use resource::SurrealResourceRepository;
pub use site::SurrealSiteRepository;
pub use stock::SurrealStockLedger;
pub use trip::SurrealTripLog;
