//! Vehicle document and material stock alerts.
//!
//! Vehicles carry `inspection_date` and `insurance_date` in their metadata;
//! materials carry `stock_current` and `stock_minimum`. Alerts are
//! computed on demand and tagged with the site currently holding the
//! resource so site managers can be notified.

use chrono::{DateTime, NaiveDate, Utc};
use frota_core::error::FrotaResult;
use frota_core::models::resource::{Resource, ResourceKind, STOCK_MINIMUM};
use frota_core::repository::ResourceRepository;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::TrackingConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AlertKind {
    InspectionDue,
    InsuranceDue,
    LowStock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub resource_id: Uuid,
    pub resource_code: String,
    /// Site holding the resource when the alert was raised.
    pub site_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub message: String,
    /// Document already expired, or stock exhausted.
    pub urgent: bool,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn document_alert(
    resource: &Resource,
    field: &str,
    kind: AlertKind,
    label: &str,
    today: NaiveDate,
    config: &TrackingConfig,
) -> Option<Alert> {
    let raw = resource.metadata.get(field)?.as_str()?;
    let Some(due) = parse_date(raw) else {
        debug!(resource_id = %resource.id, field, value = raw, "Skipping unparsable date");
        return None;
    };

    let days_left = (due - today).num_days();
    if days_left > config.alert_days_before {
        return None;
    }

    let message = if days_left < 0 {
        format!("{} {label} expired {} day(s) ago", resource.code, -days_left)
    } else {
        format!("{} {label} expires in {days_left} day(s)", resource.code)
    };

    Some(Alert {
        kind,
        resource_id: resource.id,
        resource_code: resource.code.clone(),
        site_id: resource.current_site_id,
        due_date: Some(due),
        message,
        urgent: days_left < 0,
    })
}

fn stock_alert(resource: &Resource) -> Option<Alert> {
    let minimum = resource.metadata_number(STOCK_MINIMUM)?;
    let current = resource.stock_current();
    if minimum <= 0.0 || current > minimum {
        return None;
    }

    Some(Alert {
        kind: AlertKind::LowStock,
        resource_id: resource.id,
        resource_code: resource.code.clone(),
        site_id: resource.current_site_id,
        due_date: None,
        message: format!(
            "{} stock at {current} (minimum {minimum})",
            resource.code
        ),
        urgent: current <= 0.0,
    })
}

/// Alerts for `resources` as of `today`. Inactive resources are included.
pub fn evaluate_alerts(
    resources: &[Resource],
    today: NaiveDate,
    config: &TrackingConfig,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for resource in resources {
        match resource.kind {
            ResourceKind::Vehicle => {
                alerts.extend(document_alert(
                    resource,
                    "inspection_date",
                    AlertKind::InspectionDue,
                    "inspection",
                    today,
                    config,
                ));
                alerts.extend(document_alert(
                    resource,
                    "insurance_date",
                    AlertKind::InsuranceDue,
                    "insurance",
                    today,
                    config,
                ));
            }
            ResourceKind::Material => alerts.extend(stock_alert(resource)),
            ResourceKind::Equipment => {}
        }
    }
    alerts
}

/// Runs [`evaluate_alerts`] over the registry.
pub struct AlertScanner<R: ResourceRepository> {
    resources: R,
    config: TrackingConfig,
}

impl<R: ResourceRepository> AlertScanner<R> {
    pub fn new(resources: R, config: TrackingConfig) -> Self {
        Self { resources, config }
    }

    pub async fn scan(&self) -> FrotaResult<Vec<Alert>> {
        self.scan_at(Utc::now().date_naive()).await
    }

    pub async fn scan_at(&self, today: NaiveDate) -> FrotaResult<Vec<Alert>> {
        let mut candidates = self.resources.list_by_kind(ResourceKind::Vehicle).await?;
        candidates.extend(self.resources.list_by_kind(ResourceKind::Material).await?);
        Ok(evaluate_alerts(&candidates, today, &self.config))
    }
}
