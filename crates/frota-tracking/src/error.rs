//! Assignment transition errors.

use frota_core::error::FrotaError;
use frota_core::models::site::SiteState;
use thiserror::Error;
use uuid::Uuid;

/// Why a requested assign or return was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("resource {resource_id} is already at site {site_id}")]
    AlreadyAssigned { resource_id: Uuid, site_id: Uuid },

    #[error("resource {resource_id} is inactive")]
    ResourceInactive { resource_id: Uuid },

    #[error("site {site_id} is {state}")]
    SiteNotEligible { site_id: Uuid, state: SiteState },

    #[error("resource {resource_id} is in the pool")]
    NotAssigned { resource_id: Uuid },
}

impl From<TransitionError> for FrotaError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::AlreadyAssigned {
                resource_id,
                site_id,
            } => FrotaError::AlreadyAssigned {
                resource_id,
                site_id,
            },
            TransitionError::ResourceInactive { resource_id } => {
                FrotaError::ResourceInactive { resource_id }
            }
            TransitionError::SiteNotEligible { site_id, state } => {
                FrotaError::SiteNotEligible { site_id, state }
            }
            TransitionError::NotAssigned { resource_id } => FrotaError::NotAssigned { resource_id },
        }
    }
}
