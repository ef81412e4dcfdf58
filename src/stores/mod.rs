pub mod category;
pub mod image;
pub mod portfolio;
pub mod project;
pub mod section;
pub mod section_content;

pub use category::CategoryStore;
pub use image::ImageStore;
pub use portfolio::PortfolioStore;
pub use project::ProjectStore;
pub use section::SectionStore;
pub use section_content::SectionContentStore;

use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::models::Identified;

/// State shared by every store: a loading flag and the last error message.
pub trait StoreState: Clone + Default + Send + Sync + 'static {
    fn loading_mut(&mut self) -> &mut bool;
    fn error_mut(&mut self) -> &mut Option<String>;
}

/// Observable state cell behind a store.
pub struct StoreCell<S> {
    state: watch::Sender<S>,
}

impl<S: StoreState> StoreCell<S> {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(S::default()),
        }
    }

    pub fn snapshot(&self) -> S {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state.subscribe()
    }

    pub fn update(&self, f: impl FnOnce(&mut S)) {
        self.state.send_modify(f);
    }

    pub fn reset(&self) {
        self.state.send_replace(S::default());
    }

    /// Run one backend call with the usual bookkeeping: set `loading` and clear
    /// `error` first, then either `apply` the result or record the error.
    pub async fn track<T, F>(
        &self,
        op: &str,
        call: F,
        apply: impl FnOnce(&mut S, &T),
    ) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.track_or(op, call, apply, |_| {}).await
    }

    /// [`track`](Self::track) with extra cleanup applied on failure.
    pub async fn track_or<T, F>(
        &self,
        op: &str,
        call: F,
        apply: impl FnOnce(&mut S, &T),
        on_error: impl FnOnce(&mut S),
    ) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.update(|s| {
            *s.loading_mut() = true;
            *s.error_mut() = None;
        });

        match call.await {
            Ok(value) => {
                self.update(|s| {
                    apply(s, &value);
                    *s.loading_mut() = false;
                });
                debug!(op, "Store operation succeeded");
                Ok(value)
            }
            Err(e) => {
                warn!(op, error = %e, "Store operation failed");
                self.update(|s| {
                    on_error(s);
                    *s.loading_mut() = false;
                    *s.error_mut() = Some(e.to_string());
                });
                Err(e)
            }
        }
    }

    pub fn clear_error(&self) {
        self.update(|s| *s.error_mut() = None);
    }
}

impl<S: StoreState> Default for StoreCell<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the item with the same id, leaving the list untouched otherwise.
pub fn replace_by_id<T: Identified + Clone>(items: &mut [T], item: &T) {
    if let Some(slot) = items.iter_mut().find(|i| i.id() == item.id()) {
        *slot = item.clone();
    }
}

pub fn remove_by_id<T: Identified>(items: &mut Vec<T>, id: i64) {
    items.retain(|i| i.id() != id);
}

/// Replace `current` when it is the item that just changed.
pub fn refresh_current<T: Identified + Clone>(current: &mut Option<T>, item: &T) {
    if current.as_ref().is_some_and(|c| c.id() == item.id()) {
        *current = Some(item.clone());
    }
}

/// Drop `current` when it is the item that was just deleted.
pub fn forget_current<T: Identified>(current: &mut Option<T>, id: i64) {
    if current.as_ref().is_some_and(|c| c.id() == id) {
        *current = None;
    }
}

/// Sort `items` into the order given by `ids` and set each one's position to its index.
/// Items missing from `ids` keep their relative order after the listed ones.
pub fn reorder_by_ids<T>(
    items: &mut [T],
    ids: &[i64],
    id_of: impl Fn(&T) -> i64,
    set_position: impl Fn(&mut T, i64),
) {
    let rank = |item: &T| {
        ids.iter()
            .position(|id| *id == id_of(item))
            .unwrap_or(ids.len())
    };
    items.sort_by_key(|item| rank(item));
    for (index, item) in items.iter_mut().enumerate() {
        set_position(item, index as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[derive(Clone, Debug, PartialEq)]
    struct Item(i64, &'static str);

    impl Identified for Item {
        fn id(&self) -> i64 {
            self.0
        }
    }

    #[derive(Clone, Default)]
    struct TestState {
        items: Vec<Item>,
        loading: bool,
        error: Option<String>,
    }

    impl StoreState for TestState {
        fn loading_mut(&mut self) -> &mut bool {
            &mut self.loading
        }
        fn error_mut(&mut self) -> &mut Option<String> {
            &mut self.error
        }
    }

    #[test]
    fn list_helpers_touch_only_the_target() {
        let mut items = vec![Item(1, "a"), Item(2, "b"), Item(3, "c")];
        replace_by_id(&mut items, &Item(2, "B"));
        assert_eq!(items, vec![Item(1, "a"), Item(2, "B"), Item(3, "c")]);
        remove_by_id(&mut items, 1);
        assert_eq!(items, vec![Item(2, "B"), Item(3, "c")]);
        replace_by_id(&mut items, &Item(9, "z"));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn reorder_follows_ids_and_renumbers() {
        let mut items = vec![(1, 0), (2, 1), (3, 2), (4, 3)];
        reorder_by_ids(&mut items, &[3, 1, 2], |i| i.0, |i, p| i.1 = p);
        assert_eq!(items, vec![(3, 0), (1, 1), (2, 2), (4, 3)]);
    }

    #[tokio::test]
    async fn track_applies_success() {
        let cell = StoreCell::<TestState>::new();
        let item = cell
            .track("create", async { Ok(Item(1, "a")) }, |s, item| {
                s.items.push(item.clone())
            })
            .await
            .unwrap();
        assert_eq!(item, Item(1, "a"));
        let state = cell.snapshot();
        assert_eq!(state.items.len(), 1);
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn track_records_failure() {
        let cell = StoreCell::<TestState>::new();
        let result: Result<Item, _> = cell
            .track(
                "load",
                async {
                    Err(ApiError::Api {
                        status: StatusCode::NOT_FOUND,
                        message: "Portfolio not found".into(),
                    })
                },
                |_, _| {},
            )
            .await;
        assert!(result.is_err());
        let state = cell.snapshot();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("Portfolio not found"));
    }
}
