use std::sync::Arc;
use tokio::sync::watch;

use super::{
    StoreCell, StoreState, forget_current, refresh_current, remove_by_id, reorder_by_ids,
    replace_by_id,
};
use crate::api::{self, ApiClient, ApiError};
use crate::models::section::{CreateSection, Section, UpdateSection};
use crate::models::{OrderUpdate, PageQuery};

#[derive(Debug, Clone, Default)]
pub struct SectionState {
    pub items: Vec<Section>,
    pub current: Option<Section>,
    pub loading: bool,
    pub error: Option<String>,
}

impl StoreState for SectionState {
    fn loading_mut(&mut self) -> &mut bool {
        &mut self.loading
    }
    fn error_mut(&mut self) -> &mut Option<String> {
        &mut self.error
    }
}

#[derive(Clone)]
pub struct SectionStore {
    api: ApiClient,
    cell: Arc<StoreCell<SectionState>>,
}

impl SectionStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cell: Arc::new(StoreCell::new()),
        }
    }

    pub fn state(&self) -> SectionState {
        self.cell.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SectionState> {
        self.cell.subscribe()
    }

    pub async fn get_own(&self, query: PageQuery) -> Result<Vec<Section>, ApiError> {
        self.cell
            .track(
                "section.get_own",
                api::section::get_own(&self.api, query),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Section, ApiError> {
        self.cell
            .track_or(
                "section.get_by_id",
                api::section::get_by_id(&self.api, id),
                |s, section| s.current = Some(section.clone()),
                |s| s.current = None,
            )
            .await
    }

    pub async fn get_by_portfolio(&self, portfolio_id: i64) -> Result<Vec<Section>, ApiError> {
        self.cell
            .track(
                "section.get_by_portfolio",
                api::section::get_by_portfolio(&self.api, portfolio_id),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    pub async fn get_by_type(&self, kind: &str) -> Result<Vec<Section>, ApiError> {
        self.cell
            .track(
                "section.get_by_type",
                api::section::get_by_type(&self.api, kind),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    pub async fn create(&self, input: &CreateSection) -> Result<Section, ApiError> {
        self.cell
            .track(
                "section.create",
                api::section::create(&self.api, input),
                |s, section| s.items.push(section.clone()),
            )
            .await
    }

    pub async fn update(&self, id: i64, input: &UpdateSection) -> Result<Section, ApiError> {
        self.cell
            .track(
                "section.update",
                api::section::update(&self.api, id, input),
                |s, section| {
                    replace_by_id(&mut s.items, section);
                    refresh_current(&mut s.current, section);
                },
            )
            .await
    }

    /// Move one section. Does not touch `loading` or `error`.
    pub async fn update_position(&self, id: i64, position: i64) -> Result<Section, ApiError> {
        let section = api::section::update_position(&self.api, id, position).await?;
        self.cell.update(|s| replace_by_id(&mut s.items, &section));
        Ok(section)
    }

    pub fn apply_local_order(&self, ids: &[i64]) {
        self.cell.update(|s| {
            reorder_by_ids(&mut s.items, ids, |c| c.id, |c, p| c.position = p)
        });
    }

    pub async fn save_positions(&self, updates: &[OrderUpdate]) -> Result<(), ApiError> {
        futures_util::future::try_join_all(
            updates
                .iter()
                .map(|u| self.update_position(u.id, u.order)),
        )
        .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.cell
            .track(
                "section.delete",
                api::section::delete(&self.api, id),
                |s, _| {
                    remove_by_id(&mut s.items, id);
                    forget_current(&mut s.current, id);
                },
            )
            .await
    }

    pub fn clear_current(&self) {
        self.cell.update(|s| s.current = None);
    }

    pub fn clear_error(&self) {
        self.cell.clear_error();
    }
}
