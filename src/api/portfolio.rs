use reqwest::Method;

use super::{Access, ApiClient, ApiError, expect_success, read_data, read_page};
use crate::models::PageQuery;
use crate::models::portfolio::{CreatePortfolio, Portfolio, UpdatePortfolio};

/// GET /portfolios/own?page&limit: the caller's portfolios.
pub async fn get_own(api: &ApiClient, query: PageQuery) -> Result<Vec<Portfolio>, ApiError> {
    let request = api.authed(Method::GET, "/portfolios/own")?.query(&query);
    let response = api.send(Access::Owner, request).await?;
    read_page(response, "Failed to load portfolios").await
}

/// GET /portfolios/id/{id}: public lookup.
pub async fn get_by_id(api: &ApiClient, id: i64) -> Result<Portfolio, ApiError> {
    let request = api.public(Method::GET, &format!("/portfolios/id/{id}"));
    let response = api.send(Access::Public, request).await?;
    read_data(response, "Failed to load portfolio").await
}

/// POST /portfolios/own
pub async fn create(api: &ApiClient, input: &CreatePortfolio) -> Result<Portfolio, ApiError> {
    let request = api.authed(Method::POST, "/portfolios/own")?.json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to create portfolio").await
}

/// PUT /portfolios/own/{id}
pub async fn update(
    api: &ApiClient,
    id: i64,
    input: &UpdatePortfolio,
) -> Result<Portfolio, ApiError> {
    let request = api
        .authed(Method::PUT, &format!("/portfolios/own/{id}"))?
        .json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to update portfolio").await
}

/// DELETE /portfolios/own/{id}
pub async fn delete(api: &ApiClient, id: i64) -> Result<(), ApiError> {
    let request = api.authed(Method::DELETE, &format!("/portfolios/own/{id}"))?;
    let response = api.send(Access::Owner, request).await?;
    expect_success(response, "Failed to delete portfolio").await
}
