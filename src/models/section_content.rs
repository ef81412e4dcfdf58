use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;

/// An ordered content block inside a section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionContent {
    #[serde(rename = "ID", alias = "id")]
    pub id: i64,
    pub section_id: i64,
    /// e.g. `"text"` or `"image"`.
    #[serde(alias = "type")]
    pub content_type: String,
    pub content: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub owner_id: String,
    #[serde(rename = "CreatedAt", alias = "created_at", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "UpdatedAt", alias = "updated_at", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Identified for SectionContent {
    fn id(&self) -> i64 {
        self.id
    }
}

/// Sort content blocks by `order`, keeping the relative order of ties.
pub fn sort_by_order(contents: &mut [SectionContent]) {
    contents.sort_by_key(|c| c.order);
}

// ── DTOs ──

#[derive(Debug, Clone, Serialize)]
pub struct CreateSectionContent {
    pub section_id: i64,
    pub content_type: String,
    pub content: String,
    pub order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSectionContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UpdateContentOrder {
    pub order: i64,
}
