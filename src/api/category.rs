use reqwest::Method;

use super::{Access, ApiClient, ApiError, expect_success, read_data, read_page};
use crate::models::category::{Category, CreateCategory, UpdateCategory};
use crate::models::project::Project;
use crate::models::{PageQuery, PositionUpdate};

/// GET /categories/own?page&limit
pub async fn get_own(api: &ApiClient, query: PageQuery) -> Result<Vec<Category>, ApiError> {
    let request = api.authed(Method::GET, "/categories/own")?.query(&query);
    let response = api.send(Access::Owner, request).await?;
    read_page(response, "Failed to fetch categories").await
}

/// GET /categories/id/{id}
pub async fn get_by_id(api: &ApiClient, id: i64) -> Result<Category, ApiError> {
    let request = api.public(Method::GET, &format!("/categories/id/{id}"));
    let response = api.send(Access::Public, request).await?;
    read_data(response, "Failed to fetch category").await
}

/// GET /categories/public/{id}
pub async fn get_public_by_id(api: &ApiClient, id: i64) -> Result<Category, ApiError> {
    let request = api.public(Method::GET, &format!("/categories/public/{id}"));
    let response = api.send(Access::Public, request).await?;
    read_data(response, "Failed to fetch category").await
}

/// GET /portfolios/public/{portfolio_id}/categories
pub async fn get_by_portfolio(
    api: &ApiClient,
    portfolio_id: i64,
) -> Result<Vec<Category>, ApiError> {
    let path = format!("/portfolios/public/{portfolio_id}/categories");
    let response = api.send(Access::Public, api.public(Method::GET, &path)).await?;
    read_page(response, "Failed to fetch categories").await
}

/// GET /categories/public/{id}/projects
pub async fn get_projects(api: &ApiClient, id: i64) -> Result<Vec<Project>, ApiError> {
    let path = format!("/categories/public/{id}/projects");
    let response = api.send(Access::Public, api.public(Method::GET, &path)).await?;
    read_page(response, "Failed to fetch projects").await
}

/// POST /categories/own
pub async fn create(api: &ApiClient, input: &CreateCategory) -> Result<Category, ApiError> {
    let request = api.authed(Method::POST, "/categories/own")?.json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to create category").await
}

/// PUT /categories/own/{id}
pub async fn update(
    api: &ApiClient,
    id: i64,
    input: &UpdateCategory,
) -> Result<Category, ApiError> {
    let request = api
        .authed(Method::PUT, &format!("/categories/own/{id}"))?
        .json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to update category").await
}

/// PUT /categories/own/{id} with only `{position}`.
pub async fn update_position(
    api: &ApiClient,
    id: i64,
    position: i64,
) -> Result<Category, ApiError> {
    let request = api
        .authed(Method::PUT, &format!("/categories/own/{id}"))?
        .json(&PositionUpdate { position });
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to update position").await
}

/// DELETE /categories/own/{id}
pub async fn delete(api: &ApiClient, id: i64) -> Result<(), ApiError> {
    let request = api.authed(Method::DELETE, &format!("/categories/own/{id}"))?;
    let response = api.send(Access::Owner, request).await?;
    expect_success(response, "Failed to delete category").await
}
