use std::sync::Arc;
use tokio::sync::watch;

use super::{StoreCell, StoreState, forget_current, refresh_current, remove_by_id, replace_by_id};
use crate::api::{self, ApiClient, ApiError};
use crate::models::PageQuery;
use crate::models::project::{CreateProject, Project, UpdateProject};

#[derive(Debug, Clone, Default)]
pub struct ProjectState {
    pub items: Vec<Project>,
    pub current: Option<Project>,
    pub loading: bool,
    pub error: Option<String>,
}

impl StoreState for ProjectState {
    fn loading_mut(&mut self) -> &mut bool {
        &mut self.loading
    }
    fn error_mut(&mut self) -> &mut Option<String> {
        &mut self.error
    }
}

#[derive(Clone)]
pub struct ProjectStore {
    api: ApiClient,
    cell: Arc<StoreCell<ProjectState>>,
}

impl ProjectStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cell: Arc::new(StoreCell::new()),
        }
    }

    pub fn state(&self) -> ProjectState {
        self.cell.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProjectState> {
        self.cell.subscribe()
    }

    pub async fn get_own(&self, query: PageQuery) -> Result<Vec<Project>, ApiError> {
        self.cell
            .track(
                "project.get_own",
                api::project::get_own(&self.api, query),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    pub async fn get_own_by_id(&self, id: i64) -> Result<Project, ApiError> {
        self.cell
            .track_or(
                "project.get_own_by_id",
                api::project::get_own_by_id(&self.api, id),
                |s, project| s.current = Some(project.clone()),
                |s| s.current = None,
            )
            .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Project, ApiError> {
        self.cell
            .track_or(
                "project.get_by_id",
                api::project::get_by_id(&self.api, id),
                |s, project| s.current = Some(project.clone()),
                |s| s.current = None,
            )
            .await
    }

    pub async fn get_by_category(&self, category_id: i64) -> Result<Vec<Project>, ApiError> {
        self.cell
            .track(
                "project.get_by_category",
                api::project::get_by_category(&self.api, category_id),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    pub async fn search_by_skills(&self, skills: &[String]) -> Result<Vec<Project>, ApiError> {
        self.cell
            .track(
                "project.search_by_skills",
                api::project::search_by_skills(&self.api, skills),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    pub async fn search_by_client(&self, client: &str) -> Result<Vec<Project>, ApiError> {
        self.cell
            .track(
                "project.search_by_client",
                api::project::search_by_client(&self.api, client),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    pub async fn create(&self, input: &CreateProject) -> Result<Project, ApiError> {
        self.cell
            .track(
                "project.create",
                api::project::create(&self.api, input),
                |s, project| s.items.push(project.clone()),
            )
            .await
    }

    pub async fn update(&self, id: i64, input: &UpdateProject) -> Result<Project, ApiError> {
        self.cell
            .track(
                "project.update",
                api::project::update(&self.api, id, input),
                |s, project| {
                    replace_by_id(&mut s.items, project);
                    refresh_current(&mut s.current, project);
                },
            )
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.cell
            .track(
                "project.delete",
                api::project::delete(&self.api, id),
                |s, _| {
                    remove_by_id(&mut s.items, id);
                    forget_current(&mut s.current, id);
                },
            )
            .await
    }

    /// Move one project within its category. Does not touch `loading` or `error`.
    pub async fn update_position(&self, id: i64, position: i64) -> Result<Project, ApiError> {
        let project = api::project::update_position(&self.api, id, position).await?;
        self.cell.update(|s| replace_by_id(&mut s.items, &project));
        Ok(project)
    }

    pub fn clear_current(&self) {
        self.cell.update(|s| s.current = None);
    }

    pub fn clear_error(&self) {
        self.cell.clear_error();
    }
}
