use std::sync::Arc;
use tracing::info;

use crate::api::ApiClient;
use crate::auth::oidc::OidcClient;
use crate::auth::password::PasswordAuth;
use crate::auth::storage::{FileStore, MemoryStore, StorageError};
use crate::auth::{Session, SessionStorage};
use crate::config::ClientConfig;
use crate::notify::Toasts;
use crate::reorder::{CategoryOrder, ContentOrder, DebouncedReorder, SectionOrder};
use crate::stores::{
    CategoryStore, ImageStore, PortfolioStore, ProjectStore, SectionContentStore, SectionStore,
};

/// One signed-in (or anonymous) user's view of the backend: the session,
/// every resource store and the notification list, all sharing one HTTP pool.
#[derive(Clone)]
pub struct PortfolioClient {
    pub config: ClientConfig,
    pub session: Arc<Session>,
    pub api: ApiClient,
    pub toasts: Arc<Toasts>,
    pub portfolios: PortfolioStore,
    pub categories: CategoryStore,
    pub projects: ProjectStore,
    pub sections: SectionStore,
    pub contents: SectionContentStore,
    pub images: ImageStore,
    http: reqwest::Client,
}

impl PortfolioClient {
    pub fn new(config: ClientConfig, storage: SessionStorage) -> Self {
        let http = reqwest::Client::new();
        let session = Arc::new(Session::new(storage));
        session.init();

        let api = ApiClient::with_http(&config.api_url, session.clone(), http.clone());
        info!(api_url = %config.api_url, "Portfolio client ready");

        Self {
            portfolios: PortfolioStore::new(api.clone()),
            categories: CategoryStore::new(api.clone()),
            projects: ProjectStore::new(api.clone()),
            sections: SectionStore::new(api.clone()),
            contents: SectionContentStore::new(api.clone()),
            images: ImageStore::new(api.clone()),
            toasts: Arc::new(Toasts::new()),
            config,
            session,
            api,
            http,
        }
    }

    /// Session persisted to `config.session_file`, cookie tier kept in memory.
    pub fn with_session_file(config: ClientConfig) -> Result<Self, StorageError> {
        let local = FileStore::open(&config.session_file)?;
        let storage = SessionStorage::new(Arc::new(local), Some(Arc::new(MemoryStore::new())));
        Ok(Self::new(config, storage))
    }

    pub fn password_auth(&self) -> PasswordAuth {
        PasswordAuth::with_http(
            &self.config.auth_api_url,
            &self.config.api_url,
            self.session.clone(),
            self.http.clone(),
        )
    }

    /// OIDC login, when an identity provider is configured.
    pub fn oidc(&self) -> Option<OidcClient> {
        let settings = self.config.oidc.as_ref()?;
        Some(OidcClient::with_http(
            settings.endpoints(),
            self.session.clone(),
            self.http.clone(),
        ))
    }

    pub fn content_reorder(&self, section_id: i64) -> DebouncedReorder<ContentOrder> {
        DebouncedReorder::with_delay(
            ContentOrder::new(self.contents.clone(), section_id),
            self.config.reorder_debounce,
        )
        .with_toasts(self.toasts.clone())
    }

    pub fn category_reorder(&self, portfolio_id: i64) -> DebouncedReorder<CategoryOrder> {
        DebouncedReorder::with_delay(
            CategoryOrder::new(self.categories.clone(), portfolio_id),
            self.config.reorder_debounce,
        )
        .with_toasts(self.toasts.clone())
    }

    pub fn section_reorder(&self, portfolio_id: i64) -> DebouncedReorder<SectionOrder> {
        DebouncedReorder::with_delay(
            SectionOrder::new(self.sections.clone(), portfolio_id),
            self.config.reorder_debounce,
        )
        .with_toasts(self.toasts.clone())
    }
}
