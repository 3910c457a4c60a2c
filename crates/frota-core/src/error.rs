//! Error types for the frota system.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::site::SiteState;

#[derive(Debug, Error)]
pub enum FrotaError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Resource {resource_id} is inactive and cannot be assigned")]
    ResourceInactive { resource_id: Uuid },

    #[error("Site {site_id} is {state} and does not accept new assignments")]
    SiteNotEligible { site_id: Uuid, state: SiteState },

    #[error("Resource {resource_id} is already assigned to site {site_id}")]
    AlreadyAssigned { resource_id: Uuid, site_id: Uuid },

    #[error("Resource {resource_id} is not assigned to any site")]
    NotAssigned { resource_id: Uuid },

    #[error("Material {material_id} has {available} in stock, {requested} requested")]
    InsufficientStock {
        material_id: Uuid,
        available: f64,
        requested: f64,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type FrotaResult<T> = Result<T, FrotaError>;

/// Stable machine-readable error classification for callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    ResourceInactive,
    SiteNotEligible,
    AlreadyAssigned,
    NotAssigned,
    InsufficientStock,
    Validation,
    Storage,
    Internal,
}

/// Transport-neutral error payload: a kind plus a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    /// Whether the caller may retry the same request unchanged.
    pub retryable: bool,
}

impl FrotaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrotaError::NotFound { .. } => ErrorKind::NotFound,
            FrotaError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            FrotaError::ResourceInactive { .. } => ErrorKind::ResourceInactive,
            FrotaError::SiteNotEligible { .. } => ErrorKind::SiteNotEligible,
            FrotaError::AlreadyAssigned { .. } => ErrorKind::AlreadyAssigned,
            FrotaError::NotAssigned { .. } => ErrorKind::NotAssigned,
            FrotaError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            FrotaError::Validation { .. } => ErrorKind::Validation,
            FrotaError::Storage(_) => ErrorKind::Storage,
            FrotaError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Business-rule rejections reflect a stale client view and are never
    /// retryable; only storage faults are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FrotaError::Storage(_))
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        FrotaError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_errors_are_retryable() {
        assert!(FrotaError::Storage("io".into()).is_retryable());
        assert!(
            !FrotaError::NotAssigned {
                resource_id: Uuid::new_v4()
            }
            .is_retryable()
        );
        assert!(!FrotaError::not_found("resource", "x").is_retryable());
    }

    #[test]
    fn report_carries_kind_and_message() {
        let site_id = Uuid::new_v4();
        let err = FrotaError::SiteNotEligible {
            site_id,
            state: SiteState::Paused,
        };
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::SiteNotEligible);
        assert!(report.message.contains(&site_id.to_string()));
        assert!(report.message.contains("Paused"));
        assert!(!report.retryable);
    }

    #[test]
    fn insufficient_stock_reports_quantities() {
        let err = FrotaError::InsufficientStock {
            material_id: Uuid::new_v4(),
            available: 2.5,
            requested: 4.0,
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert!(err.to_string().contains("2.5 in stock, 4 requested"));
    }
}
