use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;
use super::project::Project;

/// A category groups projects inside a portfolio; `position` orders siblings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "ID", alias = "id")]
    pub id: i64,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: i64,
    pub portfolio_id: i64,
    #[serde(default)]
    pub owner_id: String,
    #[serde(rename = "CreatedAt", alias = "created_at", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "UpdatedAt", alias = "updated_at", default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Project>>,
}

impl Identified for Category {
    fn id(&self) -> i64 {
        self.id
    }
}

// ── DTOs ──

#[derive(Debug, Clone, Serialize)]
pub struct CreateCategory {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub portfolio_id: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateCategory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
