use reqwest::Method;

use super::{Access, ApiClient, ApiError, expect_success, read_data, read_page};
use crate::models::section::{CreateSection, Section, UpdateSection};
use crate::models::{PageQuery, PositionUpdate};

/// GET /sections/own?page&limit
pub async fn get_own(api: &ApiClient, query: PageQuery) -> Result<Vec<Section>, ApiError> {
    let request = api.authed(Method::GET, "/sections/own")?.query(&query);
    let response = api.send(Access::Owner, request).await?;
    read_page(response, "Failed to fetch sections").await
}

/// GET /sections/public/{id}
pub async fn get_by_id(api: &ApiClient, id: i64) -> Result<Section, ApiError> {
    let request = api.public(Method::GET, &format!("/sections/public/{id}"));
    let response = api.send(Access::Public, request).await?;
    read_data(response, "Failed to fetch section").await
}

/// GET /sections/portfolio/{portfolio_id}
pub async fn get_by_portfolio(
    api: &ApiClient,
    portfolio_id: i64,
) -> Result<Vec<Section>, ApiError> {
    let request = api.public(Method::GET, &format!("/sections/portfolio/{portfolio_id}"));
    let response = api.send(Access::Public, request).await?;
    read_page(response, "Failed to fetch sections").await
}

/// GET /sections/type?type=
pub async fn get_by_type(api: &ApiClient, kind: &str) -> Result<Vec<Section>, ApiError> {
    let request = api
        .public(Method::GET, "/sections/type")
        .query(&[("type", kind)]);
    let response = api.send(Access::Public, request).await?;
    read_page(response, "Failed to fetch sections").await
}

/// POST /sections/own
pub async fn create(api: &ApiClient, input: &CreateSection) -> Result<Section, ApiError> {
    let request = api.authed(Method::POST, "/sections/own")?.json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to create section").await
}

/// PUT /sections/own/{id}
pub async fn update(api: &ApiClient, id: i64, input: &UpdateSection) -> Result<Section, ApiError> {
    let request = api
        .authed(Method::PUT, &format!("/sections/own/{id}"))?
        .json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to update section").await
}

/// PUT /sections/own/{id} with only `{position}`.
pub async fn update_position(api: &ApiClient, id: i64, position: i64) -> Result<Section, ApiError> {
    let request = api
        .authed(Method::PUT, &format!("/sections/own/{id}"))?
        .json(&PositionUpdate { position });
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to update position").await
}

/// DELETE /sections/own/{id}
pub async fn delete(api: &ApiClient, id: i64) -> Result<(), ApiError> {
    let request = api.authed(Method::DELETE, &format!("/sections/own/{id}"))?;
    let response = api.send(Access::Owner, request).await?;
    expect_success(response, "Failed to delete section").await
}
