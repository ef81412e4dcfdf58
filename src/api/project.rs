use reqwest::Method;

use super::{Access, ApiClient, ApiError, expect_success, read_data, read_page};
use crate::models::project::{CreateProject, Project, UpdateProject};
use crate::models::{PageQuery, PositionUpdate};

/// GET /projects/own?page&limit
pub async fn get_own(api: &ApiClient, query: PageQuery) -> Result<Vec<Project>, ApiError> {
    let request = api.authed(Method::GET, "/projects/own")?.query(&query);
    let response = api.send(Access::Owner, request).await?;
    read_page(response, "Failed to fetch projects").await
}

/// GET /projects/own/{id}
pub async fn get_own_by_id(api: &ApiClient, id: i64) -> Result<Project, ApiError> {
    let request = api.authed(Method::GET, &format!("/projects/own/{id}"))?;
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to fetch project").await
}

/// GET /projects/public/{id}
pub async fn get_by_id(api: &ApiClient, id: i64) -> Result<Project, ApiError> {
    let request = api.public(Method::GET, &format!("/projects/public/{id}"));
    let response = api.send(Access::Public, request).await?;
    read_data(response, "Failed to fetch project").await
}

/// GET /projects/category/{category_id}
pub async fn get_by_category(api: &ApiClient, category_id: i64) -> Result<Vec<Project>, ApiError> {
    let request = api.public(Method::GET, &format!("/projects/category/{category_id}"));
    let response = api.send(Access::Public, request).await?;
    read_page(response, "Failed to fetch projects").await
}

/// GET /projects/search/skills?skills=a&skills=b
pub async fn search_by_skills(
    api: &ApiClient,
    skills: &[String],
) -> Result<Vec<Project>, ApiError> {
    let params: Vec<(&str, &str)> = skills.iter().map(|s| ("skills", s.as_str())).collect();
    let request = api
        .public(Method::GET, "/projects/search/skills")
        .query(&params);
    let response = api.send(Access::Public, request).await?;
    read_page(response, "Failed to search projects").await
}

/// GET /projects/search/client?client=
pub async fn search_by_client(api: &ApiClient, client: &str) -> Result<Vec<Project>, ApiError> {
    let request = api
        .public(Method::GET, "/projects/search/client")
        .query(&[("client", client)]);
    let response = api.send(Access::Public, request).await?;
    read_page(response, "Failed to search projects").await
}

/// POST /projects/own
pub async fn create(api: &ApiClient, input: &CreateProject) -> Result<Project, ApiError> {
    let request = api.authed(Method::POST, "/projects/own")?.json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to create project").await
}

/// PUT /projects/own/{id}
pub async fn update(api: &ApiClient, id: i64, input: &UpdateProject) -> Result<Project, ApiError> {
    let request = api
        .authed(Method::PUT, &format!("/projects/own/{id}"))?
        .json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to update project").await
}

/// PUT /projects/own/{id} with only `{position}`.
pub async fn update_position(api: &ApiClient, id: i64, position: i64) -> Result<Project, ApiError> {
    let request = api
        .authed(Method::PUT, &format!("/projects/own/{id}"))?
        .json(&PositionUpdate { position });
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to update position").await
}

/// DELETE /projects/own/{id}
pub async fn delete(api: &ApiClient, id: i64) -> Result<(), ApiError> {
    let request = api.authed(Method::DELETE, &format!("/projects/own/{id}"))?;
    let response = api.send(Access::Owner, request).await?;
    expect_success(response, "Failed to delete project").await
}
