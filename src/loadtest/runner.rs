use futures_util::future::join_all;
use rand::Rng;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::metrics::{Metrics, Report, Sample};
use super::scenario::{Scenario, ScenarioKind};
use crate::config::{optional, parse_flag, string_or};

/// VUs still running when the last stage ends get this long to finish their iteration.
const GRACEFUL_STOP: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    pub base_url: String,
    pub auth_url: String,
    pub email: String,
    pub password: String,
    pub skip_auth: bool,
    /// How often the controller re-reads the stage table.
    pub tick: Duration,
    /// Multiplier applied to every think-time pause.
    pub think_scale: f64,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            auth_url: "http://localhost:8080".to_string(),
            email: "tes2t@example.com".to_string(),
            password: "testpassword".to_string(),
            skip_auth: false,
            tick: Duration::from_secs(1),
            think_scale: 1.0,
        }
    }
}

impl LoadTestConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: string_or("LOADTEST_BASE_URL", &defaults.base_url),
            auth_url: string_or("LOADTEST_AUTH_URL", &defaults.auth_url),
            email: string_or("LOADTEST_EMAIL", &defaults.email),
            password: string_or("LOADTEST_PASSWORD", &defaults.password),
            skip_auth: parse_flag("LOADTEST_SKIP_AUTH"),
            think_scale: optional("LOADTEST_THINK_SCALE")
                .and_then(|v| v.parse().ok())
                .filter(|v: &f64| *v >= 0.0)
                .unwrap_or(defaults.think_scale),
            ..defaults
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadTestError {
    #[error("API health check failed - aborting {0} test")]
    Unhealthy(ScenarioKind),

    #[error("Authentication failed - aborting {0} test")]
    AuthRequired(ScenarioKind),
}

/// One scenario run against a live backend.
pub struct LoadTest {
    config: LoadTestConfig,
    scenario: Arc<Scenario>,
    http: reqwest::Client,
    metrics: Arc<Metrics>,
}

impl LoadTest {
    pub fn new(config: LoadTestConfig, scenario: Scenario) -> Self {
        Self {
            config,
            scenario: Arc::new(scenario),
            http: reqwest::Client::new(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// `GET /health` answers 200 with a status of `ok` or `healthy`.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        debug!("Checking health at {url}");

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Health check request failed");
                return false;
            }
        };
        if response.status() != StatusCode::OK {
            warn!(status = %response.status(), "Health check returned non-200");
            return false;
        }
        let body: Value = response.json().await.unwrap_or_default();
        matches!(body["status"].as_str(), Some("ok" | "healthy"))
    }

    /// Log in with the configured test user; `None` when skipped or refused.
    pub async fn authenticate(&self) -> Option<String> {
        if self.config.skip_auth {
            info!("Authentication skipped (LOADTEST_SKIP_AUTH=true)");
            return None;
        }

        let url = format!("{}/api/auth/login", self.config.auth_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "email": self.config.email, "password": self.config.password }))
            .send()
            .await;

        match response {
            Ok(response) if response.status() == StatusCode::OK => {
                let body: Value = response.json().await.unwrap_or_default();
                let token = body["token"].as_str().map(str::to_string);
                self.metrics.check(token.is_some());
                token
            }
            Ok(response) => {
                warn!(status = %response.status(), "Authentication failed");
                self.metrics.check(false);
                None
            }
            Err(e) => {
                warn!(error = %e, "Authentication error (auth service may not be running)");
                None
            }
        }
    }

    /// Health check and login, honouring the scenario's abort rules.
    pub async fn setup(&self) -> Result<Option<String>, LoadTestError> {
        let kind = self.scenario.kind;
        info!(scenario = %kind, target = %self.config.base_url, "Starting {kind} test");

        if !self.health_check().await {
            if self.scenario.require_healthy {
                return Err(LoadTestError::Unhealthy(kind));
            }
            warn!("API health check failed - continuing anyway");
        }

        let token = self.authenticate().await;
        if token.is_none() {
            if self.scenario.require_auth {
                return Err(LoadTestError::AuthRequired(kind));
            }
            warn!("Running without authentication (some endpoints may fail)");
        }
        Ok(token)
    }

    /// Run every stage, then summarise.
    pub async fn run(self) -> Result<Report, LoadTestError> {
        let token = self.setup().await?.map(Arc::<str>::from);

        let started = Instant::now();
        let total = self.scenario.total_duration();
        let target = Arc::new(AtomicU32::new(0));
        let mut vus: Vec<JoinHandle<()>> = Vec::new();

        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let elapsed = started.elapsed();
            if elapsed >= total {
                break;
            }

            let desired = self.scenario.target_at(elapsed);
            target.store(desired, Ordering::Relaxed);

            for id in 1..=desired {
                let index = (id - 1) as usize;
                if vus.get(index).is_some_and(|vu| !vu.is_finished()) {
                    continue;
                }
                let vu = VirtualUser {
                    id,
                    http: self.http.clone(),
                    base_url: self.config.base_url.clone(),
                    token: token.clone(),
                    metrics: self.metrics.clone(),
                    scenario: self.scenario.clone(),
                    started,
                    think_scale: self.config.think_scale,
                    iteration: AtomicU64::new(0),
                };
                let handle = tokio::spawn(vu.run(target.clone()));
                if index < vus.len() {
                    vus[index] = handle;
                } else {
                    vus.push(handle);
                }
            }
        }

        target.store(0, Ordering::Relaxed);
        let running = vus.iter().filter(|vu| !vu.is_finished()).count();
        info!(running, "Stages done, waiting for in-flight iterations");

        let aborts: Vec<_> = vus.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(GRACEFUL_STOP, join_all(vus)).await.is_err() {
            warn!("Graceful stop timed out, interrupting remaining VUs");
            aborts.iter().for_each(|handle| handle.abort());
        }
        let elapsed = started.elapsed();

        if self.scenario.recovery_check {
            tokio::time::sleep(Duration::from_secs(5)).await;
            if self.health_check().await {
                info!("System recovered after the {} test", self.scenario.kind);
            } else {
                warn!("System may not have fully recovered - check logs");
            }
        }

        let report = self.metrics.report(&self.scenario, elapsed);
        info!(
            scenario = %self.scenario.kind,
            requests = report.requests,
            failure_rate = report.failure_rate,
            "Load test completed"
        );
        Ok(report)
    }
}

struct VirtualUser {
    id: u32,
    http: reqwest::Client,
    base_url: String,
    token: Option<Arc<str>>,
    metrics: Arc<Metrics>,
    scenario: Arc<Scenario>,
    started: Instant,
    think_scale: f64,
    iteration: AtomicU64,
}

/// What a VU learnt from one response.
struct Reply {
    status: Option<StatusCode>,
    body: Value,
}

impl Reply {
    fn is(&self, status: StatusCode) -> bool {
        self.status == Some(status)
    }

    /// Created ids come back as `data.ID`, `data.id` or a bare `id`.
    fn created_id(&self) -> Option<i64> {
        if !self.is(StatusCode::CREATED) {
            return None;
        }
        let data = &self.body["data"];
        data["ID"]
            .as_i64()
            .or_else(|| data["id"].as_i64())
            .or_else(|| self.body["id"].as_i64())
    }
}

impl VirtualUser {
    /// Keep iterating while this VU is within the current target.
    async fn run(self, target: Arc<AtomicU32>) {
        debug!(vu = self.id, "VU started");
        while self.id <= target.load(Ordering::Relaxed) {
            match self.scenario.kind {
                ScenarioKind::Load => self.load_iteration().await,
                ScenarioKind::Stress => self.stress_iteration().await,
                ScenarioKind::Spike => self.spike_iteration().await,
                ScenarioKind::Soak => self.soak_iteration().await,
            }
            self.iteration.fetch_add(1, Ordering::Relaxed);
            self.metrics.iteration_done();
        }
        debug!(vu = self.id, "VU stopped");
    }

    fn owner_id(&self) -> String {
        format!("{}-test-user-{}", self.scenario.kind, self.id)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, name: &'static str, request: RequestBuilder) -> Reply {
        let phase = self.scenario.phase_at(self.started.elapsed());
        let sent = Instant::now();
        let result = request.send().await;
        let duration = sent.elapsed();

        let (status, body) = match result {
            Ok(response) => {
                let status = response.status();
                (Some(status), response.json().await.unwrap_or_default())
            }
            Err(e) => {
                debug!(vu = self.id, name, error = %e, "Request failed");
                (None, Value::Null)
            }
        };

        let failed = !status.is_some_and(|s| s.as_u16() >= 200 && s.as_u16() < 400);
        self.metrics.record(Sample {
            name,
            phase,
            duration,
            failed,
        });
        Reply { status, body }
    }

    async fn think(&self, min: f64, max: f64) {
        let secs = rand::rng().random_range(min..=max);
        self.pause(secs).await;
    }

    async fn pause(&self, secs: f64) {
        let scaled = secs * self.think_scale;
        if scaled > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(scaled)).await;
        }
    }

    async fn list_portfolios(&self, name: &'static str, limit: u32, offset: u32) -> Reply {
        let path = format!("/api/portfolios/own?page=1&limit={limit}&offset={offset}");
        self.send(name, self.request(Method::GET, &path)).await
    }

    async fn get_portfolio(&self, id: i64) -> Reply {
        let path = format!("/api/portfolios/own/{id}");
        self.send("get_portfolio", self.request(Method::GET, &path)).await
    }

    async fn update_portfolio(&self, id: i64, title: &str, description: &str) -> Reply {
        let path = format!("/api/portfolios/own/{id}");
        let body = json!({
            "title": format!("{title} {}", now_ms()),
            "description": description,
        });
        let request = self.request(Method::PUT, &path).json(&body);
        self.send("update_portfolio", request).await
    }

    async fn create(&self, name: &'static str, resource: &str, body: Value) -> Option<i64> {
        let path = format!("/api/{resource}/own");
        let reply = self.send(name, self.request(Method::POST, &path).json(&body)).await;
        let id = reply.created_id();
        self.metrics.check(id.is_some());
        id
    }

    async fn create_portfolio(&self) -> Option<i64> {
        let now = chrono::Utc::now();
        let body = json!({
            "title": format!("Test Portfolio {}", now.timestamp_millis()),
            "description": format!("This is a test portfolio created at {}", now.to_rfc3339()),
            "ownerId": self.owner_id(),
        });
        self.create("create_portfolio", "portfolios", body).await
    }

    async fn create_category(&self, portfolio_id: i64) -> Option<i64> {
        let body = json!({
            "title": format!("Test Category {}", now_ms()),
            "description": "Test category description",
            "portfolioId": portfolio_id,
            "position": 0,
        });
        self.create("create_category", "categories", body).await
    }

    async fn create_section(&self, portfolio_id: i64, kind: &str) -> Option<i64> {
        let body = json!({
            "title": format!("Test Section {}", now_ms()),
            "description": "Test section description",
            "type": kind,
            "portfolioId": portfolio_id,
            "position": 0,
        });
        self.create("create_section", "sections", body).await
    }

    async fn create_project(&self, category_id: i64) -> Option<i64> {
        let body = json!({
            "title": format!("Test Project {}", now_ms()),
            "description": "Test project description for load testing",
            "mainImage": "https://example.com/image.jpg",
            "images": ["https://example.com/image1.jpg", "https://example.com/image2.jpg"],
            "skills": ["JavaScript", "Go", "React"],
            "client": "Test Client",
            "link": "https://example.com",
            "categoryId": category_id,
            "position": 0,
        });
        self.create("create_project", "projects", body).await
    }

    async fn health(&self) {
        let reply = self
            .send("health", self.http.get(format!("{}/health", self.base_url)))
            .await;
        self.metrics.check(reply.is(StatusCode::OK));
        self.metrics
            .check(reply.body["database"].as_str() == Some("connected"));
    }

    fn check_data(&self, reply: &Reply) {
        self.metrics.check(reply.is(StatusCode::OK));
        self.metrics.check(!reply.body["data"].is_null());
    }

    fn check_title(&self, reply: &Reply) {
        self.metrics.check(reply.is(StatusCode::OK));
        let title = &reply.body["data"]["title"];
        self.metrics
            .check(!title.is_null() || !reply.body["title"].is_null());
    }

    async fn load_iteration(&self) {
        let reply = self.list_portfolios("list_portfolios", 10, 0).await;
        self.check_data(&reply);
        self.think(1.0, 2.0).await;

        let Some(portfolio_id) = self.create_portfolio().await else {
            warn!(vu = self.id, "Failed to create portfolio, skipping dependent requests");
            return;
        };
        self.think(1.0, 3.0).await;

        let reply = self.get_portfolio(portfolio_id).await;
        self.check_title(&reply);
        self.think(2.0, 4.0).await;

        if let Some(category_id) = self.create_category(portfolio_id).await {
            self.think(1.0, 2.0).await;
            self.create_project(category_id).await;
        }
        self.think(1.0, 3.0).await;

        self.create_section(portfolio_id, "about").await;
        self.think(1.0, 2.0).await;

        let reply = self
            .update_portfolio(portfolio_id, "Updated Portfolio", "Updated description")
            .await;
        self.metrics.check(reply.is(StatusCode::OK));
        self.think(2.0, 4.0).await;

        let reply = self.list_portfolios("list_portfolios_cached", 10, 0).await;
        self.metrics
            .check(reply.is(StatusCode::OK) || reply.is(StatusCode::NOT_MODIFIED));
        self.pause(1.0).await;
    }

    async fn stress_iteration(&self) {
        for page in 0..3 {
            let reply = self.list_portfolios("list_portfolios", 20, page * 20).await;
            self.metrics.check(
                reply.is(StatusCode::OK) || reply.is(StatusCode::INTERNAL_SERVER_ERROR),
            );
            self.pause(0.5).await;
        }
        self.pause(1.0).await;

        if let Some(portfolio_id) = self.create_portfolio().await {
            for _ in 0..2 {
                if let Some(category_id) = self.create_category(portfolio_id).await {
                    self.create_project(category_id).await;
                }
                self.pause(0.3).await;
            }
        }
        self.think(0.5, 1.5).await;

        self.list_portfolios("list_portfolios", 10, 0).await;
        self.pause(0.2).await;
        let created = self.create_portfolio().await;
        self.pause(0.3).await;
        if let Some(portfolio_id) = created {
            let reply = self.get_portfolio(portfolio_id).await;
            self.metrics
                .check(reply.is(StatusCode::OK) || reply.is(StatusCode::NOT_FOUND));
        }
        self.pause(0.5).await;
        if let Some(portfolio_id) = created {
            self.update_portfolio(portfolio_id, "Stress Test", "Stress test update")
                .await;
        }
        self.think(0.5, 1.0).await;

        for offset in [0, 10, 20, 30] {
            self.list_portfolios("paginated_query", 10, offset).await;
            self.pause(0.2).await;
        }
        self.pause(1.0).await;
    }

    async fn spike_iteration(&self) {
        match self.id % 3 {
            0 => {
                for page in 0..5 {
                    let reply = self.list_portfolios("list_portfolios", 10, page * 10).await;
                    self.metrics.check(
                        reply
                            .status
                            .is_some_and(|s| s.is_success() || s.is_redirection()),
                    );
                    self.pause(0.5).await;
                }
            }
            1 => {
                let created = self.create_portfolio().await;
                self.pause(0.3).await;
                if let Some(portfolio_id) = created {
                    for _ in 0..3 {
                        self.create_category(portfolio_id).await;
                        self.pause(0.4).await;
                    }
                }
            }
            _ => {
                self.list_portfolios("list_portfolios", 5, 0).await;
                self.pause(0.5).await;
                let created = self.create_portfolio().await;
                self.pause(0.5).await;
                if let Some(portfolio_id) = created {
                    let reply = self.get_portfolio(portfolio_id).await;
                    self.metrics.check(reply.is(StatusCode::OK));
                }
                self.pause(0.5).await;
                if let Some(portfolio_id) = created {
                    self.update_portfolio(portfolio_id, "Spike Test", "Updated during spike test")
                        .await;
                }
            }
        }

        self.health().await;
        self.think(0.5, 1.5).await;
    }

    async fn soak_iteration(&self) {
        self.soak_session().await;

        if self.iteration.load(Ordering::Relaxed) % 10 == 0 {
            self.health().await;
        }
        self.think(5.0, 10.0).await;
    }

    async fn soak_session(&self) {
        let reply = self.list_portfolios("list_portfolios", 10, 0).await;
        self.check_data(&reply);
        self.think(2.0, 4.0).await;

        let Some(portfolio_id) = self.create_portfolio().await else {
            warn!(vu = self.id, "Portfolio creation failed, skipping dependent requests");
            self.pause(5.0).await;
            return;
        };
        self.think(3.0, 5.0).await;

        let reply = self.get_portfolio(portfolio_id).await;
        self.check_title(&reply);
        self.think(2.0, 4.0).await;

        for kind in ["about", "skills", "experience"] {
            self.create_section(portfolio_id, kind).await;
            self.pause(1.0).await;
        }
        self.think(3.0, 6.0).await;

        let category = self.create_category(portfolio_id).await;
        self.think(2.0, 3.0).await;

        if let Some(category_id) = category {
            for _ in 0..2 {
                self.create_project(category_id).await;
                self.pause(2.0).await;
            }
            self.think(2.0, 4.0).await;
        }

        let minutes = self.started.elapsed().as_secs_f64() / 60.0;
        let description = format!("Updated during soak test at {minutes:.2} minutes");
        let reply = self
            .update_portfolio(portfolio_id, "Updated Portfolio", &description)
            .await;
        self.metrics.check(reply.is(StatusCode::OK));
        self.think(3.0, 5.0).await;

        self.list_portfolios("list_portfolios", 20, 0).await;
        self.think(2.0, 4.0).await;
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: StatusCode, body: Value) -> Reply {
        Reply {
            status: Some(status),
            body,
        }
    }

    #[test]
    fn created_id_accepts_every_envelope() {
        assert_eq!(
            reply(StatusCode::CREATED, json!({"data": {"ID": 7}})).created_id(),
            Some(7)
        );
        assert_eq!(
            reply(StatusCode::CREATED, json!({"data": {"id": 8}})).created_id(),
            Some(8)
        );
        assert_eq!(reply(StatusCode::CREATED, json!({"id": 9})).created_id(), Some(9));
    }

    #[test]
    fn created_id_requires_201() {
        assert_eq!(
            reply(StatusCode::OK, json!({"data": {"ID": 7}})).created_id(),
            None
        );
    }

    #[test]
    fn config_defaults_point_at_local_services() {
        let config = LoadTestConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.auth_url, "http://localhost:8080");
        assert!(!config.skip_auth);
        assert_eq!(config.think_scale, 1.0);
    }

    #[tokio::test]
    async fn unhealthy_load_test_aborts_setup() {
        let config = LoadTestConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            skip_auth: true,
            ..LoadTestConfig::default()
        };
        let test = LoadTest::new(config, Scenario::load());
        assert!(matches!(
            test.setup().await,
            Err(LoadTestError::Unhealthy(ScenarioKind::Load))
        ));
    }

    #[tokio::test]
    async fn stress_test_tolerates_missing_services() {
        let config = LoadTestConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            auth_url: "http://127.0.0.1:9".to_string(),
            ..LoadTestConfig::default()
        };
        let test = LoadTest::new(config, Scenario::stress());
        assert!(matches!(test.setup().await, Ok(None)));
    }
}
