use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;
use super::category::Category;
use super::section::Section;

/// A portfolio as returned by the backend.
///
/// The backend serializes GORM models (`ID`, `CreatedAt`) on some routes and
/// snake_case on others, so both spellings are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(rename = "ID", alias = "id")]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: String,
    #[serde(rename = "CreatedAt", alias = "created_at", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "UpdatedAt", alias = "updated_at", default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
}

impl Identified for Portfolio {
    fn id(&self) -> i64 {
        self.id
    }
}

// ── DTOs ──

#[derive(Debug, Clone, Serialize)]
pub struct CreatePortfolio {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePortfolio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
