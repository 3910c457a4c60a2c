//! Construction site ("obra") domain model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum SiteState {
    #[default]
    Active,
    Paused,
    Completed,
}

impl SiteState {
    pub const ALL: [SiteState; 3] = [SiteState::Active, SiteState::Paused, SiteState::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteState::Active => "Active",
            SiteState::Paused => "Paused",
            SiteState::Completed => "Completed",
        }
    }

    /// Only active sites accept new assignments. Resources already on a
    /// site stay there when it is paused or completed.
    pub fn accepts_assignments(&self) -> bool {
        matches!(self, SiteState::Active)
    }
}

impl fmt::Display for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    /// Unique site code.
    pub code: String,
    pub name: String,
    pub address: String,
    pub client: String,
    pub state: SiteState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSite {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub client: Option<String>,
    /// Defaults to [`SiteState::Active`].
    pub state: Option<SiteState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateSite {
    pub code: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub client: Option<String>,
    pub state: Option<SiteState>,
}
