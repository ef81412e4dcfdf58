pub mod category;
pub mod image;
pub mod portfolio;
pub mod project;
pub mod section;
pub mod section_content;

use serde::{Deserialize, Serialize};

/// Standard response envelope: `{data?, error?, message?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Paginated list envelope: `{data: [...], page, limit}`.
/// `data` may be absent or `null` when there is nothing to list.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PaginatedEnvelope<T> {
    #[serde(default)]
    pub data: Option<Vec<T>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageQuery {
    pub page: u64,
    pub limit: u64,
}

impl PageQuery {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, 100),
        }
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// One entry of a bulk reorder: the item id and its new zero-based order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub id: i64,
    pub order: i64,
}

/// Body for the position-only update accepted by categories, projects and sections.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PositionUpdate {
    pub position: i64,
}

/// Anything the client keeps in a list keyed by the backend id.
pub trait Identified {
    fn id(&self) -> i64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_clamps_bounds() {
        assert_eq!(PageQuery::new(0, 0), PageQuery { page: 1, limit: 1 });
        assert_eq!(PageQuery::new(3, 500), PageQuery { page: 3, limit: 100 });
    }

    #[test]
    fn paginated_envelope_tolerates_missing_data() {
        let env: PaginatedEnvelope<i64> =
            serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert!(env.data.unwrap_or_default().is_empty());
        assert_eq!(env.error.as_deref(), Some("nope"));
    }

    #[test]
    fn paginated_envelope_treats_null_data_as_empty() {
        let env: PaginatedEnvelope<i64> =
            serde_json::from_str(r#"{"data":null,"page":1,"limit":10}"#).unwrap();
        assert_eq!(env.data.unwrap_or_default(), Vec::<i64>::new());
        assert_eq!(env.page, Some(1));
    }
}
