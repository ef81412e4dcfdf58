use std::sync::Arc;
use tokio::sync::watch;

use super::{
    StoreCell, StoreState, forget_current, refresh_current, remove_by_id, reorder_by_ids,
    replace_by_id,
};
use crate::api::{self, ApiClient, ApiError};
use crate::models::category::{Category, CreateCategory, UpdateCategory};
use crate::models::project::Project;
use crate::models::{OrderUpdate, PageQuery};

#[derive(Debug, Clone, Default)]
pub struct CategoryState {
    pub items: Vec<Category>,
    pub current: Option<Category>,
    /// Projects of the category last loaded with [`CategoryStore::get_projects`].
    pub projects: Vec<Project>,
    pub loading: bool,
    pub error: Option<String>,
}

impl StoreState for CategoryState {
    fn loading_mut(&mut self) -> &mut bool {
        &mut self.loading
    }
    fn error_mut(&mut self) -> &mut Option<String> {
        &mut self.error
    }
}

#[derive(Clone)]
pub struct CategoryStore {
    api: ApiClient,
    cell: Arc<StoreCell<CategoryState>>,
}

impl CategoryStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cell: Arc::new(StoreCell::new()),
        }
    }

    pub fn state(&self) -> CategoryState {
        self.cell.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<CategoryState> {
        self.cell.subscribe()
    }

    pub async fn get_own(&self, query: PageQuery) -> Result<Vec<Category>, ApiError> {
        self.cell
            .track(
                "category.get_own",
                api::category::get_own(&self.api, query),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, ApiError> {
        self.cell
            .track_or(
                "category.get_by_id",
                api::category::get_by_id(&self.api, id),
                |s, category| s.current = Some(category.clone()),
                |s| s.current = None,
            )
            .await
    }

    pub async fn get_public_by_id(&self, id: i64) -> Result<Category, ApiError> {
        self.cell
            .track_or(
                "category.get_public_by_id",
                api::category::get_public_by_id(&self.api, id),
                |s, category| s.current = Some(category.clone()),
                |s| s.current = None,
            )
            .await
    }

    pub async fn get_by_portfolio(&self, portfolio_id: i64) -> Result<Vec<Category>, ApiError> {
        self.cell
            .track(
                "category.get_by_portfolio",
                api::category::get_by_portfolio(&self.api, portfolio_id),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    pub async fn get_projects(&self, id: i64) -> Result<Vec<Project>, ApiError> {
        self.cell
            .track(
                "category.get_projects",
                api::category::get_projects(&self.api, id),
                |s, projects| s.projects = projects.clone(),
            )
            .await
    }

    pub async fn create(&self, input: &CreateCategory) -> Result<Category, ApiError> {
        self.cell
            .track(
                "category.create",
                api::category::create(&self.api, input),
                |s, category| s.items.push(category.clone()),
            )
            .await
    }

    pub async fn update(&self, id: i64, input: &UpdateCategory) -> Result<Category, ApiError> {
        self.cell
            .track(
                "category.update",
                api::category::update(&self.api, id, input),
                |s, category| {
                    replace_by_id(&mut s.items, category);
                    refresh_current(&mut s.current, category);
                },
            )
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.cell
            .track(
                "category.delete",
                api::category::delete(&self.api, id),
                |s, _| {
                    remove_by_id(&mut s.items, id);
                    forget_current(&mut s.current, id);
                },
            )
            .await
    }

    /// Move one category. Does not touch `loading` or `error`.
    pub async fn update_position(&self, id: i64, position: i64) -> Result<Category, ApiError> {
        let category = api::category::update_position(&self.api, id, position).await?;
        self.cell.update(|s| replace_by_id(&mut s.items, &category));
        Ok(category)
    }

    /// Reorder the local list to match `ids` and renumber positions, before any save.
    pub fn apply_local_order(&self, ids: &[i64]) {
        self.cell.update(|s| {
            reorder_by_ids(&mut s.items, ids, |c| c.id, |c, p| c.position = p)
        });
    }

    /// Persist a full reorder as concurrent position updates.
    pub async fn save_positions(&self, updates: &[OrderUpdate]) -> Result<(), ApiError> {
        futures_util::future::try_join_all(
            updates
                .iter()
                .map(|u| self.update_position(u.id, u.order)),
        )
        .await?;
        Ok(())
    }

    pub fn clear_current(&self) {
        self.cell.update(|s| {
            s.current = None;
            s.projects.clear();
        });
    }

    pub fn clear_error(&self) {
        self.cell.clear_error();
    }
}
