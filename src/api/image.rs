use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use std::path::Path;

use super::{Access, ApiClient, ApiError, expect_success, read_data, read_page};
use crate::models::image::{EntityType, Image, UpdateImage};

/// A file to attach to an entity.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub alt: Option<String>,
}

impl ImageUpload {
    /// Read `path` from disk, guessing the content type from its extension.
    pub async fn from_path(
        path: impl AsRef<Path>,
        entity_type: EntityType,
        entity_id: i64,
        alt: Option<String>,
    ) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            file_name,
            mime,
            bytes,
            entity_type,
            entity_id,
            alt,
        })
    }

    fn into_form(self) -> Result<Form, ApiError> {
        let file = Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime)?;

        let mut form = Form::new()
            .part("file", file)
            .text("entity_type", self.entity_type.as_str())
            .text("entity_id", self.entity_id.to_string());
        if let Some(alt) = self.alt.filter(|a| !a.is_empty()) {
            form = form.text("alt", alt);
        }
        Ok(form)
    }
}

/// POST /images/own (multipart)
pub async fn upload(api: &ApiClient, upload: ImageUpload) -> Result<Image, ApiError> {
    let form = upload.into_form()?;
    let request = api.authed(Method::POST, "/images/own")?.multipart(form);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to upload image").await
}

/// GET /images/entity/{type}/{id}. An entity without images answers 404.
pub async fn get_by_entity(
    api: &ApiClient,
    entity_type: EntityType,
    entity_id: i64,
) -> Result<Vec<Image>, ApiError> {
    let path = format!("/images/entity/{entity_type}/{entity_id}");
    let response = api.send(Access::Public, api.public(Method::GET, &path)).await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(Vec::new());
    }
    read_page(response, "Failed to fetch images").await
}

/// PUT /images/own/{id}
pub async fn update(api: &ApiClient, id: i64, input: &UpdateImage) -> Result<Image, ApiError> {
    let request = api
        .authed(Method::PUT, &format!("/images/own/{id}"))?
        .json(input);
    let response = api.send(Access::Owner, request).await?;
    read_data(response, "Failed to update image").await
}

/// DELETE /images/own/{id}
pub async fn delete(api: &ApiClient, id: i64) -> Result<(), ApiError> {
    let request = api.authed(Method::DELETE, &format!("/images/own/{id}"))?;
    let response = api.send(Access::Owner, request).await?;
    expect_success(response, "Failed to delete image").await
}
