use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;

/// A section of a portfolio page. `kind` is a free-form type tag such as
/// `"about"` or `"experience"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "ID", alias = "id")]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, alias = "order")]
    pub position: i64,
    pub portfolio_id: i64,
    #[serde(default)]
    pub owner_id: String,
    #[serde(rename = "CreatedAt", alias = "created_at", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "UpdatedAt", alias = "updated_at", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Identified for Section {
    fn id(&self) -> i64 {
        self.id
    }
}

// ── DTOs ──

#[derive(Debug, Clone, Serialize)]
pub struct CreateSection {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub portfolio_id: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}
