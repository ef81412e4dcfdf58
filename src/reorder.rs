use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::models::OrderUpdate;
use crate::notify::Toasts;
use crate::stores::{CategoryStore, SectionContentStore, SectionStore};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2500);

pub const SAVE_FAILED_MESSAGE: &str = "Failed to save content order. Please try again.";

/// A list that can be reordered locally and then saved in one go.
pub trait ReorderTarget: Send + Sync + 'static {
    /// Show the new order right away, before anything is saved.
    fn apply_local(&self, ordered_ids: &[i64]);

    fn save_order(&self, updates: Vec<OrderUpdate>) -> BoxFuture<'static, Result<(), ApiError>>;

    /// Fetch the list again so local state matches the server.
    fn reload(&self) -> BoxFuture<'static, Result<(), ApiError>>;
}

/// Content blocks of one section.
pub struct ContentOrder {
    store: SectionContentStore,
    section_id: i64,
}

impl ContentOrder {
    pub fn new(store: SectionContentStore, section_id: i64) -> Self {
        Self { store, section_id }
    }
}

impl ReorderTarget for ContentOrder {
    fn apply_local(&self, ordered_ids: &[i64]) {
        self.store.apply_local_order(ordered_ids);
    }

    fn save_order(&self, updates: Vec<OrderUpdate>) -> BoxFuture<'static, Result<(), ApiError>> {
        let store = self.store.clone();
        Box::pin(async move { store.reorder_contents(&updates).await })
    }

    fn reload(&self) -> BoxFuture<'static, Result<(), ApiError>> {
        let store = self.store.clone();
        let section_id = self.section_id;
        Box::pin(async move { store.get_by_section_id(section_id).await.map(|_| ()) })
    }
}

/// Categories of one portfolio.
pub struct CategoryOrder {
    store: CategoryStore,
    portfolio_id: i64,
}

impl CategoryOrder {
    pub fn new(store: CategoryStore, portfolio_id: i64) -> Self {
        Self {
            store,
            portfolio_id,
        }
    }
}

impl ReorderTarget for CategoryOrder {
    fn apply_local(&self, ordered_ids: &[i64]) {
        self.store.apply_local_order(ordered_ids);
    }

    fn save_order(&self, updates: Vec<OrderUpdate>) -> BoxFuture<'static, Result<(), ApiError>> {
        let store = self.store.clone();
        Box::pin(async move { store.save_positions(&updates).await })
    }

    fn reload(&self) -> BoxFuture<'static, Result<(), ApiError>> {
        let store = self.store.clone();
        let portfolio_id = self.portfolio_id;
        Box::pin(async move { store.get_by_portfolio(portfolio_id).await.map(|_| ()) })
    }
}

/// Sections of one portfolio.
pub struct SectionOrder {
    store: SectionStore,
    portfolio_id: i64,
}

impl SectionOrder {
    pub fn new(store: SectionStore, portfolio_id: i64) -> Self {
        Self {
            store,
            portfolio_id,
        }
    }
}

impl ReorderTarget for SectionOrder {
    fn apply_local(&self, ordered_ids: &[i64]) {
        self.store.apply_local_order(ordered_ids);
    }

    fn save_order(&self, updates: Vec<OrderUpdate>) -> BoxFuture<'static, Result<(), ApiError>> {
        let store = self.store.clone();
        Box::pin(async move { store.save_positions(&updates).await })
    }

    fn reload(&self) -> BoxFuture<'static, Result<(), ApiError>> {
        let store = self.store.clone();
        let portfolio_id = self.portfolio_id;
        Box::pin(async move { store.get_by_portfolio(portfolio_id).await.map(|_| ()) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReorderStatus {
    #[default]
    Idle,
    /// A save is scheduled or running.
    Saving,
    Saved,
    Failed(String),
}

const WAITING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

struct Pending {
    state: Arc<AtomicU8>,
    handle: JoinHandle<()>,
}

impl Pending {
    /// Abort the timer unless it already fired. Returns whether it was stopped.
    fn cancel(self) -> bool {
        let stopped = self
            .state
            .compare_exchange(WAITING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if stopped {
            self.handle.abort();
        }
        stopped
    }
}

/// Collapses a burst of reorders into one save after a quiet period.
///
/// Must be used inside a tokio runtime: each schedule spawns a timer task.
pub struct DebouncedReorder<T: ReorderTarget> {
    target: Arc<T>,
    delay: Duration,
    status: Arc<watch::Sender<ReorderStatus>>,
    toasts: Option<Arc<Toasts>>,
    pending: Mutex<Option<Pending>>,
    generation: Arc<AtomicU64>,
}

impl<T: ReorderTarget> DebouncedReorder<T> {
    pub fn new(target: T) -> Self {
        Self::with_delay(target, DEFAULT_DEBOUNCE)
    }

    pub fn with_delay(target: T, delay: Duration) -> Self {
        Self {
            target: Arc::new(target),
            delay,
            status: Arc::new(watch::Sender::new(ReorderStatus::Idle)),
            toasts: None,
            pending: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Post an error toast when a save fails.
    pub fn with_toasts(mut self, toasts: Arc<Toasts>) -> Self {
        self.toasts = Some(toasts);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn status(&self) -> ReorderStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReorderStatus> {
        self.status.subscribe()
    }

    /// Apply `ordered_ids` locally and (re)start the save timer.
    pub fn handle_reorder(&self, ordered_ids: Vec<i64>) {
        self.target.apply_local(&ordered_ids);

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            if previous.cancel() {
                debug!("Rescheduled pending reorder save");
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.status.send_replace(ReorderStatus::Saving);

        let state = Arc::new(AtomicU8::new(WAITING));
        let handle = tokio::spawn(run_save(
            SaveJob {
                target: self.target.clone(),
                status: self.status.clone(),
                toasts: self.toasts.clone(),
                latest: self.generation.clone(),
                generation,
                state: state.clone(),
            },
            self.delay,
            ordered_ids,
        ));
        *pending = Some(Pending { state, handle });
    }

    /// Cancel a save that has not fired yet. A save already running finishes.
    pub fn cleanup(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pending) = pending {
            if pending.cancel() {
                debug!("Cancelled pending reorder save");
                self.status.send_replace(ReorderStatus::Idle);
            }
        }
    }
}

impl<T: ReorderTarget> Drop for DebouncedReorder<T> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

struct SaveJob<T> {
    target: Arc<T>,
    status: Arc<watch::Sender<ReorderStatus>>,
    toasts: Option<Arc<Toasts>>,
    latest: Arc<AtomicU64>,
    generation: u64,
    state: Arc<AtomicU8>,
}

impl<T> SaveJob<T> {
    /// Only the newest schedule reports its outcome.
    fn report(&self, status: ReorderStatus) {
        if self.latest.load(Ordering::Acquire) == self.generation {
            self.status.send_replace(status);
        }
    }
}

async fn run_save<T: ReorderTarget>(job: SaveJob<T>, delay: Duration, ordered_ids: Vec<i64>) {
    tokio::time::sleep(delay).await;
    if job
        .state
        .compare_exchange(WAITING, FIRED, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return;
    }

    let updates: Vec<OrderUpdate> = ordered_ids
        .iter()
        .enumerate()
        .map(|(index, id)| OrderUpdate {
            id: *id,
            order: index as i64,
        })
        .collect();
    let count = updates.len();

    let result = match job.target.save_order(updates).await {
        Ok(()) => job.target.reload().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            info!(count, "Saved new order");
            job.report(ReorderStatus::Saved);
        }
        Err(e) => {
            warn!(error = %e, "Failed to save new order, reloading");
            if let Err(reload_err) = job.target.reload().await {
                warn!(error = %reload_err, "Reload after failed reorder also failed");
            }
            if let Some(toasts) = &job.toasts {
                toasts.error(SAVE_FAILED_MESSAGE);
            }
            job.report(ReorderStatus::Failed(e.to_string()));
        }
    }
}
