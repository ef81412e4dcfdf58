//! In-process fake of the portfolio backend, the password auth service and an
//! OIDC token endpoint, served by actix-web on an ephemeral port.
#![allow(dead_code)]

use actix_web::dev::ServerHandle;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use portfolio_client::auth::{Credentials, Session, SessionStorage};

const TEST_SECRET: &str = "test-secret-at-least-256-bits-long-for-hs256-xxxxxxx";

/// Mint an HS256 token for `claims`, with `exp` one hour ahead unless given.
pub fn mint_token(mut claims: Value) -> String {
    if claims.get("exp").is_none() {
        claims["exp"] = json!(Utc::now().timestamp() + 3600);
    }
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to encode test JWT")
}

/// A session already holding a fresh token for user 1.
pub fn signed_in_session() -> Arc<Session> {
    let session = Arc::new(Session::new(SessionStorage::in_memory()));
    session.set_auth(Credentials {
        access_token: mint_token(json!({ "user_id": 1, "email": "alice@example.com" })),
        id_token: None,
        user: None,
    });
    session
}

#[derive(Default)]
pub struct Backend {
    portfolios: Mutex<Vec<Value>>,
    next_id: Mutex<i64>,
    /// Answer every owner-scoped call with 401.
    pub revoke_tokens: AtomicBool,
    /// Bodies received by the OIDC token endpoint.
    pub token_requests: Mutex<Vec<TokenForm>>,
    /// Answer order and position updates with 500.
    pub fail_order_updates: AtomicBool,
    /// `(route, body)` of the write and search calls tests inspect.
    pub calls: Mutex<Vec<(String, Value)>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    pub code: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub code_verifier: String,
}

impl Backend {
    fn allocate_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }

    pub fn portfolio_count(&self) -> usize {
        self.portfolios.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, route: String, body: Value) {
        self.calls.lock().unwrap().push((route, body));
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub backend: web::Data<Backend>,
    handle: ServerHandle,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn api_url(&self) -> String {
        self.url("/api")
    }

    pub fn auth_url(&self) -> String {
        self.url("/api/auth")
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

/// Start the fake services on `127.0.0.1:0`.
pub async fn spawn_backend() -> TestServer {
    let backend = web::Data::new(Backend::default());
    let data = backend.clone();

    let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("Failed to bind test server");
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    TestServer {
        addr,
        backend,
        handle,
    }
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/oidc/token", web::post().to(token))
        .route(
            "/oidc/.well-known/openid-configuration",
            web::get().to(discovery),
        )
        .service(
            web::scope("/api")
                .route("/auth/login", web::post().to(login))
                .route("/portfolios/own", web::get().to(list_portfolios))
                .route("/portfolios/own", web::post().to(create_portfolio))
                .route("/portfolios/own/{id}", web::put().to(update_portfolio))
                .route("/portfolios/own/{id}", web::delete().to(delete_portfolio))
                .route("/portfolios/id/{id}", web::get().to(get_portfolio))
                .route(
                    "/portfolios/public/{id}/categories",
                    web::get().to(portfolio_categories),
                )
                .route("/categories/own", web::post().to(create_category))
                .route("/categories/own/{id}", web::put().to(update_category))
                .route("/categories/own/{id}", web::delete().to(delete_owned))
                .route("/projects/search/skills", web::get().to(search_skills))
                .route("/projects/own", web::post().to(create_project))
                .route("/projects/own/{id}", web::put().to(update_project))
                .route("/projects/own/{id}", web::delete().to(delete_owned))
                .route("/sections/own", web::post().to(create_section))
                .route("/sections/own/{id}", web::delete().to(delete_owned))
                .route("/sections/type", web::get().to(sections_by_type))
                .route("/sections/{id}/contents", web::get().to(section_contents))
                .route(
                    "/section-contents/own/{id}/order",
                    web::patch().to(update_content_order),
                )
                .route("/section-contents/own/{id}", web::put().to(update_content))
                .route("/section-contents/own/{id}", web::delete().to(delete_owned))
                .route("/images/own", web::post().to(upload_image))
                .route("/images/own/{id}", web::put().to(update_image))
                .route("/images/own/{id}", web::delete().to(delete_owned))
                .route(
                    "/images/entity/{entity_type}/{entity_id}",
                    web::get().to(images_by_entity),
                ),
        );
}

fn authorized(req: &HttpRequest, backend: &Backend) -> Result<(), HttpResponse> {
    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    if !bearer || backend.revoke_tokens.load(Ordering::SeqCst) {
        return Err(HttpResponse::Unauthorized().json(json!({ "error": "Unauthorized" })));
    }
    Ok(())
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok", "database": "connected" }))
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(body: web::Json<LoginBody>) -> HttpResponse {
    if body.password != "secret" {
        return HttpResponse::Unauthorized().json(json!({ "error": "Invalid credentials" }));
    }
    let token = mint_token(json!({ "user_id": 1, "email": body.email }));
    HttpResponse::Ok().json(json!({
        "token": token,
        "user": { "id": 1, "username": "alice", "email": body.email },
    }))
}

async fn discovery(req: HttpRequest) -> HttpResponse {
    let base = format!("http://{}/oidc", req.connection_info().host());
    HttpResponse::Ok().json(json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/auth"),
        "token_endpoint": format!("{base}/token"),
        "end_session_endpoint": format!("{base}/logout"),
    }))
}

async fn token(backend: web::Data<Backend>, form: web::Form<TokenForm>) -> HttpResponse {
    let form = form.into_inner();
    let accepted = form.code == "good-code";
    backend.token_requests.lock().unwrap().push(form);
    if !accepted {
        return HttpResponse::BadRequest().json(json!({
            "error": "invalid_grant",
            "error_description": "Code not valid",
        }));
    }
    let id_token = mint_token(json!({
        "sub": "kc-user-1",
        "email": "alice@example.com",
        "preferred_username": "alice",
        "name": "Alice Smith",
    }));
    HttpResponse::Ok().json(json!({
        "access_token": mint_token(json!({ "sub": "kc-user-1" })),
        "id_token": id_token,
        "token_type": "Bearer",
        "expires_in": 300,
    }))
}

async fn list_portfolios(req: HttpRequest, backend: web::Data<Backend>) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let items = backend.portfolios.lock().unwrap().clone();
    HttpResponse::Ok().json(json!({ "data": items, "page": 1, "limit": 10 }))
}

#[derive(Deserialize)]
struct PortfolioBody {
    title: Option<String>,
    description: Option<String>,
}

async fn create_portfolio(
    req: HttpRequest,
    backend: web::Data<Backend>,
    body: web::Json<PortfolioBody>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let Some(title) = body.title.clone().filter(|t| !t.is_empty()) else {
        return HttpResponse::BadRequest().json(json!({ "error": "Title is required" }));
    };
    let portfolio = json!({
        "ID": backend.allocate_id(),
        "title": title,
        "description": body.description,
        "owner_id": "u1",
        "CreatedAt": Utc::now().to_rfc3339(),
    });
    backend.portfolios.lock().unwrap().push(portfolio.clone());
    HttpResponse::Created().json(json!({ "data": portfolio }))
}

async fn update_portfolio(
    req: HttpRequest,
    backend: web::Data<Backend>,
    path: web::Path<i64>,
    body: web::Json<PortfolioBody>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let id = path.into_inner();
    let mut portfolios = backend.portfolios.lock().unwrap();
    let Some(portfolio) = portfolios.iter_mut().find(|p| p["ID"] == json!(id)) else {
        return HttpResponse::NotFound().json(json!({ "error": "Portfolio not found" }));
    };
    if let Some(title) = &body.title {
        portfolio["title"] = json!(title);
    }
    if let Some(description) = &body.description {
        portfolio["description"] = json!(description);
    }
    HttpResponse::Ok().json(json!({ "data": portfolio }))
}

async fn delete_portfolio(
    req: HttpRequest,
    backend: web::Data<Backend>,
    path: web::Path<i64>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let id = path.into_inner();
    let mut portfolios = backend.portfolios.lock().unwrap();
    let before = portfolios.len();
    portfolios.retain(|p| p["ID"] != json!(id));
    if portfolios.len() == before {
        return HttpResponse::NotFound().json(json!({ "error": "Portfolio not found" }));
    }
    HttpResponse::Ok().json(json!({ "message": "Portfolio deleted" }))
}

async fn get_portfolio(backend: web::Data<Backend>, path: web::Path<i64>) -> HttpResponse {
    let id = path.into_inner();
    let portfolios = backend.portfolios.lock().unwrap();
    match portfolios.iter().find(|p| p["ID"] == json!(id)) {
        Some(portfolio) => HttpResponse::Ok().json(json!({ "data": portfolio })),
        None => HttpResponse::NotFound().json(json!({ "error": "Portfolio not found" })),
    }
}

async fn images_by_entity() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": "No images found" }))
}

async fn portfolio_categories(path: web::Path<i64>) -> HttpResponse {
    let portfolio_id = path.into_inner();
    HttpResponse::Ok().json(json!({
        "data": [
            { "ID": 2, "title": "Web", "position": 1, "portfolio_id": portfolio_id },
            { "id": 1, "name": "Print", "position": 0, "portfolio_id": portfolio_id },
        ]
    }))
}

async fn update_category(
    req: HttpRequest,
    backend: web::Data<Backend>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let id = path.into_inner();
    let body = body.into_inner();
    backend.record(format!("PUT /categories/own/{id}"), body.clone());
    if backend.fail_order_updates.load(Ordering::SeqCst) {
        return HttpResponse::InternalServerError().json(json!({ "error": "Update failed" }));
    }
    let title = if id == 1 { "Print" } else { "Web" };
    HttpResponse::Ok().json(json!({
        "data": {
            "ID": id,
            "title": title,
            "position": body["position"].as_i64().unwrap_or(0),
            "portfolio_id": 1,
        }
    }))
}

async fn search_skills(req: HttpRequest, backend: web::Data<Backend>) -> HttpResponse {
    backend.record(
        "GET /projects/search/skills".to_string(),
        json!(req.query_string()),
    );
    HttpResponse::Ok().json(json!({
        "data": [{ "ID": 4, "title": "Compiler", "skills": ["Rust", "Go"], "category_id": 3 }]
    }))
}

async fn create_section(
    req: HttpRequest,
    backend: web::Data<Backend>,
    body: web::Json<Value>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    HttpResponse::Created().json(json!({
        "data": {
            "ID": backend.allocate_id() + 4,
            "title": body["title"],
            "type": body["type"],
            "portfolio_id": body["portfolio_id"],
            "order": 0,
        }
    }))
}

async fn sections_by_type(
    query: web::Query<std::collections::HashMap<String, String>>,
) -> HttpResponse {
    let kind = query.get("type").cloned().unwrap_or_default();
    HttpResponse::Ok().json(json!({
        "data": [{ "ID": 5, "title": "About me", "type": kind, "portfolio_id": 1 }]
    }))
}

async fn section_contents(path: web::Path<i64>) -> HttpResponse {
    let section_id = path.into_inner();
    let block = |id: i64, order: i64| {
        json!({
            "ID": id,
            "section_id": section_id,
            "content_type": "text",
            "content": format!("block {id}"),
            "order": order,
        })
    };
    HttpResponse::Ok().json(json!({ "data": [block(10, 2), block(11, 0), block(12, 1)] }))
}

async fn update_content_order(
    req: HttpRequest,
    backend: web::Data<Backend>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let id = path.into_inner();
    let body = body.into_inner();
    backend.record(format!("PATCH /section-contents/own/{id}/order"), body.clone());
    if backend.fail_order_updates.load(Ordering::SeqCst) {
        return HttpResponse::InternalServerError()
            .json(json!({ "error": "Failed to update order" }));
    }
    HttpResponse::Ok().json(json!({
        "data": {
            "ID": id,
            "section_id": 7,
            "content_type": "text",
            "content": format!("block {id}"),
            "order": body["order"],
        }
    }))
}

/// Shared by every owner-scoped DELETE; records the path without the `/api` prefix.
async fn delete_owned(req: HttpRequest, backend: web::Data<Backend>) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let path = req.path().trim_start_matches("/api").to_string();
    backend.record(format!("DELETE {path}"), Value::Null);
    HttpResponse::Ok().json(json!({ "message": "Deleted" }))
}

async fn create_category(
    req: HttpRequest,
    backend: web::Data<Backend>,
    body: web::Json<Value>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    HttpResponse::Created().json(json!({
        "data": {
            "ID": backend.allocate_id() + 100,
            "title": body["title"],
            "position": 0,
            "portfolio_id": body["portfolio_id"],
        }
    }))
}

async fn create_project(
    req: HttpRequest,
    backend: web::Data<Backend>,
    body: web::Json<Value>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let mut project = body.into_inner();
    project["ID"] = json!(backend.allocate_id() + 200);
    HttpResponse::Created().json(json!({ "data": project }))
}

async fn update_project(
    req: HttpRequest,
    backend: web::Data<Backend>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let id = path.into_inner();
    let body = body.into_inner();
    backend.record(format!("PUT /projects/own/{id}"), body.clone());
    HttpResponse::Ok().json(json!({
        "data": {
            "ID": id,
            "title": body["title"].as_str().unwrap_or("Untitled"),
            "category_id": 3,
        }
    }))
}

async fn update_content(
    req: HttpRequest,
    backend: web::Data<Backend>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let id = path.into_inner();
    HttpResponse::Ok().json(json!({
        "data": {
            "ID": id,
            "section_id": 7,
            "content_type": "text",
            "content": body["content"].as_str().unwrap_or("edited"),
            "order": body["order"].as_i64().unwrap_or(0),
        }
    }))
}

/// Value of a plain text field in a multipart body.
fn form_field<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let marker = format!("name=\"{name}\"\r\n\r\n");
    let start = body.find(&marker)? + marker.len();
    let end = body[start..].find("\r\n")? + start;
    Some(&body[start..end])
}

async fn upload_image(
    req: HttpRequest,
    backend: web::Data<Backend>,
    body: web::Bytes,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let multipart = req
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&body);
    if !multipart || !body.contains("name=\"file\"") {
        return HttpResponse::BadRequest().json(json!({ "error": "No file uploaded" }));
    }

    let entity_type = form_field(&body, "entity_type").unwrap_or_default();
    let entity_id: i64 = form_field(&body, "entity_id")
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    let alt = form_field(&body, "alt");
    backend.record(
        "POST /images/own".to_string(),
        json!({ "entity_type": entity_type, "entity_id": entity_id, "alt": alt }),
    );

    let id = backend.allocate_id();
    HttpResponse::Created().json(json!({
        "data": {
            "ID": id,
            "url": format!("/uploads/{id}.png"),
            "alt": alt,
            "entity_type": entity_type,
            "entity_id": entity_id,
            "is_main": false,
        }
    }))
}

async fn update_image(
    req: HttpRequest,
    backend: web::Data<Backend>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> HttpResponse {
    if let Err(denied) = authorized(&req, &backend) {
        return denied;
    }
    let id = path.into_inner();
    let body = body.into_inner();
    backend.record(format!("PUT /images/own/{id}"), body.clone());
    HttpResponse::Ok().json(json!({
        "data": {
            "ID": id,
            "url": format!("/uploads/{id}.png"),
            "alt": body["alt"],
            "entity_type": "project",
            "entity_id": 4,
            "is_main": body["is_main"].as_bool().unwrap_or(false),
        }
    }))
}
