//! Domain models for frota.
//!
//! These are the core types shared across all crates.

pub mod movement;
pub mod resource;
pub mod site;
pub mod stock;
pub mod trip;
