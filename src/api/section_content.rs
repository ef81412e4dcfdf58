use futures_util::future::try_join_all;
use reqwest::Method;

use super::{Access, ApiClient, ApiError, expect_success, read_data, read_page};
use crate::models::OrderUpdate;
use crate::models::section_content::{
    CreateSectionContent, SectionContent, UpdateContentOrder, UpdateSectionContent,
};

/// GET /section-contents/{id}
pub async fn get_by_id(api: &ApiClient, id: i64) -> Result<SectionContent, ApiError> {
    let request = api.public(Method::GET, &format!("/section-contents/{id}"));
    let response = api.send(Access::Public, request).await?;
    read_data(response, "Failed to fetch content").await
}

/// GET /sections/{section_id}/contents
pub async fn get_by_section(
    api: &ApiClient,
    section_id: i64,
) -> Result<Vec<SectionContent>, ApiError> {
    let request = api.public(Method::GET, &format!("/sections/{section_id}/contents"));
    let response = api.send(Access::Public, request).await?;
    read_page(response, "Failed to fetch section contents").await
}

/// POST /section-contents/own
pub async fn create(
    api: &ApiClient,
    input: &CreateSectionContent,
) -> Result<SectionContent, ApiError> {
    let request = api.authed(Method::POST, "/section-contents/own")?.json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to create content").await
}

/// PUT /section-contents/own/{id}
pub async fn update(
    api: &ApiClient,
    id: i64,
    input: &UpdateSectionContent,
) -> Result<SectionContent, ApiError> {
    let request = api
        .authed(Method::PUT, &format!("/section-contents/own/{id}"))?
        .json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to update content").await
}

/// PATCH /section-contents/own/{id}/order
pub async fn update_order(api: &ApiClient, id: i64, order: i64) -> Result<(), ApiError> {
    let request = api
        .authed(Method::PATCH, &format!("/section-contents/own/{id}/order"))?
        .json(&UpdateContentOrder { order });
    let response = api.send(Access::Owner, request).await?;
    expect_success(response, "Failed to update content order").await
}

/// Save a whole reorder. The backend has no batch route, so every item's
/// order is patched concurrently and the first failure fails the batch.
pub async fn update_orders(api: &ApiClient, updates: &[OrderUpdate]) -> Result<(), ApiError> {
    try_join_all(
        updates
            .iter()
            .map(|update| update_order(api, update.id, update.order)),
    )
    .await?;
    Ok(())
}

/// DELETE /section-contents/own/{id}
pub async fn delete(api: &ApiClient, id: i64) -> Result<(), ApiError> {
    let request = api.authed(Method::DELETE, &format!("/section-contents/own/{id}"))?;
    let response = api.send(Access::Owner, request).await?;
    expect_success(response, "Failed to delete content").await
}
