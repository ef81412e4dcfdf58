use std::sync::Arc;
use tokio::sync::watch;

use super::{StoreCell, StoreState, forget_current, refresh_current, remove_by_id, replace_by_id};
use crate::api::{self, ApiClient, ApiError};
use crate::models::PageQuery;
use crate::models::portfolio::{CreatePortfolio, Portfolio, UpdatePortfolio};

#[derive(Debug, Clone, Default)]
pub struct PortfolioState {
    pub items: Vec<Portfolio>,
    pub current: Option<Portfolio>,
    pub loading: bool,
    pub error: Option<String>,
}

impl StoreState for PortfolioState {
    fn loading_mut(&mut self) -> &mut bool {
        &mut self.loading
    }
    fn error_mut(&mut self) -> &mut Option<String> {
        &mut self.error
    }
}

/// Client-side cache of the caller's portfolios.
#[derive(Clone)]
pub struct PortfolioStore {
    api: ApiClient,
    cell: Arc<StoreCell<PortfolioState>>,
}

impl PortfolioStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cell: Arc::new(StoreCell::new()),
        }
    }

    pub fn state(&self) -> PortfolioState {
        self.cell.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PortfolioState> {
        self.cell.subscribe()
    }

    pub async fn get_own(&self, query: PageQuery) -> Result<Vec<Portfolio>, ApiError> {
        self.cell
            .track(
                "portfolio.get_own",
                api::portfolio::get_own(&self.api, query),
                |s, items| s.items = items.clone(),
            )
            .await
    }

    /// Load one portfolio into `current`. A failure leaves `current` empty.
    pub async fn get_by_id(&self, id: i64) -> Result<Portfolio, ApiError> {
        self.cell
            .track_or(
                "portfolio.get_by_id",
                api::portfolio::get_by_id(&self.api, id),
                |s, portfolio| s.current = Some(portfolio.clone()),
                |s| s.current = None,
            )
            .await
    }

    pub async fn create(&self, input: &CreatePortfolio) -> Result<Portfolio, ApiError> {
        self.cell
            .track(
                "portfolio.create",
                api::portfolio::create(&self.api, input),
                |s, portfolio| s.items.push(portfolio.clone()),
            )
            .await
    }

    pub async fn update(&self, id: i64, input: &UpdatePortfolio) -> Result<Portfolio, ApiError> {
        self.cell
            .track(
                "portfolio.update",
                api::portfolio::update(&self.api, id, input),
                |s, portfolio| {
                    replace_by_id(&mut s.items, portfolio);
                    refresh_current(&mut s.current, portfolio);
                },
            )
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.cell
            .track(
                "portfolio.delete",
                api::portfolio::delete(&self.api, id),
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
