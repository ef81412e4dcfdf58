use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use super::{StoreCell, StoreState, forget_current, refresh_current, remove_by_id, replace_by_id};
use crate::api::{self, ApiClient, ApiError};
use crate::models::OrderUpdate;
use crate::models::section_content::{
    CreateSectionContent, SectionContent, UpdateSectionContent, sort_by_order,
};

#[derive(Debug, Clone, Default)]
pub struct SectionContentState {
    /// Always sorted by `order`.
    pub items: Vec<SectionContent>,
    pub current: Option<SectionContent>,
    pub loading: bool,
    pub error: Option<String>,
}

impl StoreState for SectionContentState {
    fn loading_mut(&mut self) -> &mut bool {
        &mut self.loading
    }
    fn error_mut(&mut self) -> &mut Option<String> {
        &mut self.error
    }
}

#[derive(Clone)]
pub struct SectionContentStore {
    api: ApiClient,
    cell: Arc<StoreCell<SectionContentState>>,
}

impl SectionContentStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cell: Arc::new(StoreCell::new()),
        }
    }

    pub fn state(&self) -> SectionContentState {
        self.cell.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SectionContentState> {
        self.cell.subscribe()
    }

    pub async fn get_by_id(&self, id: i64) -> Result<SectionContent, ApiError> {
        self.cell
            .track_or(
                "section_content.get_by_id",
                api::section_content::get_by_id(&self.api, id),
                |s, content| s.current = Some(content.clone()),
                |s| s.current = None,
            )
            .await
    }

    /// Load a section's blocks, sorted by `order`.
    pub async fn get_by_section_id(
        &self,
        section_id: i64,
    ) -> Result<Vec<SectionContent>, ApiError> {
        let sorted = async {
            let mut contents = api::section_content::get_by_section(&self.api, section_id).await?;
            sort_by_order(&mut contents);
            Ok::<_, ApiError>(contents)
        };
        self.cell
            .track("section_content.get_by_section_id", sorted, |s, items| {
                s.items = items.clone()
            })
            .await
    }

    pub async fn create(&self, input: &CreateSectionContent) -> Result<SectionContent, ApiError> {
        self.cell
            .track(
                "section_content.create",
                api::section_content::create(&self.api, input),
                |s, content| {
                    s.items.push(content.clone());
                    sort_by_order(&mut s.items);
                },
            )
            .await
    }

    pub async fn update(
        &self,
        id: i64,
        input: &UpdateSectionContent,
    ) -> Result<SectionContent, ApiError> {
        self.cell
            .track(
                "section_content.update",
                api::section_content::update(&self.api, id, input),
                |s, content| {
                    replace_by_id(&mut s.items, content);
                    sort_by_order(&mut s.items);
                    refresh_current(&mut s.current, content);
                },
            )
            .await
    }

    /// Change one block's order, then re-sort the local list.
    pub async fn update_order(&self, id: i64, order: i64) -> Result<(), ApiError> {
        self.cell
            .track(
                "section_content.update_order",
                api::section_content::update_order(&self.api, id, order),
                |s, _| apply_orders(&mut s.items, &[OrderUpdate { id, order }]),
            )
            .await
    }

    /// Apply a batch of order changes locally at once, then save them together.
    /// The local list is not rolled back here; callers reload on failure.
    pub async fn reorder_contents(&self, updates: &[OrderUpdate]) -> Result<(), ApiError> {
        self.cell.update(|s| apply_orders(&mut s.items, updates));
        self.cell
            .track(
                "section_content.reorder_contents",
                api::section_content::update_orders(&self.api, updates),
                |_, _| {},
            )
            .await
    }

    /// Rearrange the local list to follow `ids`, numbering orders from zero.
    pub fn apply_local_order(&self, ids: &[i64]) {
        self.cell.update(|s| {
            super::reorder_by_ids(&mut s.items, ids, |c| c.id, |c, o| c.order = o)
        });
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.cell
            .track(
                "section_content.delete",
                api::section_content::delete(&self.api, id),
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

    /// Forget everything, e.g. when switching to another section.
    pub fn clear_all(&self) {
        self.cell.reset();
    }
}

fn apply_orders(items: &mut [SectionContent], updates: &[OrderUpdate]) {
    let orders: HashMap<i64, i64> = updates.iter().map(|u| (u.id, u.order)).collect();
    for item in items.iter_mut() {
        if let Some(order) = orders.get(&item.id) {
            item.order = *order;
        }
    }
    sort_by_order(items);
}
