use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use super::{StoreCell, StoreState, remove_by_id, replace_by_id};
use crate::api::image::ImageUpload;
use crate::api::{self, ApiClient, ApiError};
use crate::models::image::{EntityType, Image, UpdateImage};

#[derive(Debug, Clone, Default)]
pub struct ImageState {
    pub items: Vec<Image>,
    pub loading: bool,
    pub error: Option<String>,
    /// 0 while an upload is in flight or after a failure, 100 once it lands.
    pub upload_progress: u8,
}

impl StoreState for ImageState {
    fn loading_mut(&mut self) -> &mut bool {
        &mut self.loading
    }
    fn error_mut(&mut self) -> &mut Option<String> {
        &mut self.error
    }
}

#[derive(Clone)]
pub struct ImageStore {
    api: ApiClient,
    cell: Arc<StoreCell<ImageState>>,
}

impl ImageStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cell: Arc::new(StoreCell::new()),
        }
    }

    pub fn state(&self) -> ImageState {
        self.cell.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ImageState> {
        self.cell.subscribe()
    }

    pub async fn upload(&self, upload: ImageUpload) -> Result<Image, ApiError> {
        self.cell.update(|s| s.upload_progress = 0);
        self.cell
            .track_or(
                "image.upload",
                api::image::upload(&self.api, upload),
                |s, image| {
                    s.items.push(image.clone());
                    s.upload_progress = 100;
                },
                |s| s.upload_progress = 0,
            )
            .await
    }

    /// Upload a file from disk; the content type is guessed from the extension.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        entity_type: EntityType,
        entity_id: i64,
        alt: Option<String>,
    ) -> Result<Image, ApiError> {
        let upload = match ImageUpload::from_path(path, entity_type, entity_id, alt).await {
            Ok(upload) => upload,
            Err(e) => {
                self.cell.update(|s| s.error = Some(e.to_string()));
                return Err(e);
            }
        };
        self.upload(upload).await
    }

    pub async fn get_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: i64,
    ) -> Result<Vec<Image>, ApiError> {
        self.cell
            .track(
                "image.get_by_entity",
                api::image::get_by_entity(&self.api, entity_type, entity_id),
                |s, images| s.items = images.clone(),
            )
            .await
    }

    pub async fn update_image(&self, id: i64, input: &UpdateImage) -> Result<Image, ApiError> {
        self.cell
            .track(
                "image.update",
                api::image::update(&self.api, id, input),
                |s, image| replace_by_id(&mut s.items, image),
            )
            .await
    }

    pub async fn set_main(&self, id: i64) -> Result<Image, ApiError> {
        let input = UpdateImage {
            is_main: Some(true),
            ..Default::default()
        };
        self.update_image(id, &input).await
    }

    pub async fn update_alt(&self, id: i64, alt: &str) -> Result<Image, ApiError> {
        let input = UpdateImage {
            alt: Some(alt.to_string()),
            ..Default::default()
        };
        self.update_image(id, &input).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.cell
            .track(
                "image.delete",
                api::image::delete(&self.api, id),
                |s, _| remove_by_id(&mut s.items, id),
            )
            .await
    }

    pub fn clear(&self) {
        self.cell.reset();
    }

    pub fn clear_error(&self) {
        self.cell.clear_error();
    }
}
