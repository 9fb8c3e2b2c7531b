//! In-process stand-in for the LocalLens API, used by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use locallens::config::Config;
use locallens::geolocation::{GeolocationGate, LocationProvider};
use locallens::session::MemorySessionStore;
use locallens::state::AppState;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

struct ScriptedFeed {
    latitude: f64,
    delay: Duration,
    posts: Vec<Value>,
}

#[derive(Default)]
pub struct MockState {
    pub requests: Mutex<Vec<Recorded>>,
    pub posts: Mutex<Vec<Value>>,
    pub comments: Mutex<HashMap<i64, Vec<Value>>>,
    pub uploads: Mutex<Vec<UploadField>>,
    feed_script: Mutex<Vec<ScriptedFeed>>,
    pub fail_feed: AtomicBool,
    pub fail_likes: AtomicBool,
    pub fail_comments: AtomicBool,
    pub mutation_delay_ms: AtomicU64,
    next_comment_id: AtomicU64,
}

impl MockState {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn set_posts(&self, posts: Vec<Value>) {
        *self.posts.lock().unwrap() = posts;
    }

    /// Answer feed requests at `latitude` with `posts` after `delay`.
    pub fn script_feed(&self, latitude: f64, delay: Duration, posts: Vec<Value>) {
        self.feed_script.lock().unwrap().push(ScriptedFeed {
            latitude,
            delay,
            posts,
        });
    }

    pub fn set_comments(&self, post_id: i64, comments: Vec<Value>) {
        self.comments.lock().unwrap().insert(post_id, comments);
    }

    pub fn set_mutation_delay(&self, delay: Duration) {
        self.mutation_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn mutation_delay(&self) -> Duration {
        Duration::from_millis(self.mutation_delay_ms.load(Ordering::SeqCst))
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::default());
        state.next_comment_id.store(100, Ordering::SeqCst);
        let app = router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api", addr),
            state,
        }
    }

    pub fn app(&self, provider: Arc<dyn LocationProvider>) -> AppState {
        let mut config = Config::default();
        config.api.base_url = self.base_url.clone();
        AppState::new(
            config,
            reqwest::Client::new(),
            Arc::new(MemorySessionStore::default()),
            GeolocationGate::new(provider).with_timeout(Duration::from_millis(500)),
        )
        .unwrap()
    }
}

pub fn post_json(id: i64, username: &str, like_count: u32, user_liked: bool) -> Value {
    json!({
        "id": id,
        "user_id": 2,
        "username": username,
        "image_path": format!("uploads/{}_photo.jpg", id),
        "caption": format!("post {}", id),
        "latitude": 37.7701,
        "longitude": -122.4102,
        "created_at": "Tue, 15 Oct 2024 10:00:00 GMT",
        "like_count": like_count,
        "user_liked": user_liked,
        "distance_miles": 0.02
    })
}

pub fn comment_json(id: i64, username: &str, text: &str) -> Value {
    json!({
        "id": id,
        "user_id": 3,
        "username": username,
        "text": text,
        "created_at": "2024-10-15T10:05:00"
    })
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/feed", get(feed))
        .route("/api/posts", post(create_post))
        .route("/api/posts/{id}/like", post(like))
        .route("/api/posts/{id}/unlike", delete(unlike))
        .route(
            "/api/posts/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

async fn record(State(state): State<Arc<MockState>>, req: Request, next: Next) -> Response {
    state.requests.lock().unwrap().push(Recorded {
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
        query: req.uri().query().map(str::to_string),
        authorization: req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });
    next.run(req).await
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.starts_with("Bearer token-"))
}

async fn register(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    if username == "taken" {
        return error(StatusCode::CONFLICT, "Username or email already exists");
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": { "id": 7, "username": username, "email": body["email"] },
            "access_token": format!("token-{}", username)
        })),
    )
        .into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if password != "secret1" {
        return error(StatusCode::UNAUTHORIZED, "Invalid username or password");
    }
    Json(json!({
        "message": "Login successful",
        "user": { "id": 1, "username": username, "email": format!("{}@example.com", username) },
        "access_token": format!("token-{}", username)
    }))
    .into_response()
}

async fn feed(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid or missing token");
    }
    let latitude: f64 = match params.get("latitude").and_then(|v| v.parse().ok()) {
        Some(lat) => lat,
        None => return error(StatusCode::BAD_REQUEST, "Latitude and longitude are required"),
    };

    let scripted = state
        .feed_script
        .lock()
        .unwrap()
        .iter()
        .find(|s| (s.latitude - latitude).abs() < 1e-9)
        .map(|s| (s.delay, s.posts.clone()));
    if let Some((delay, posts)) = scripted {
        tokio::time::sleep(delay).await;
        return Json(json!({ "posts": posts })).into_response();
    }

    if state.fail_feed.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    let posts = state.posts.lock().unwrap().clone();
    Json(json!({ "posts": posts })).into_response()
}

async fn like(State(state): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    toggle(state, headers, id, true).await
}

async fn unlike(State(state): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    toggle(state, headers, id, false).await
}

async fn toggle(state: Arc<MockState>, headers: HeaderMap, id: i64, liking: bool) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid or missing token");
    }
    tokio::time::sleep(state.mutation_delay()).await;
    if state.fail_likes.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "like service unavailable");
    }

    let mut posts = state.posts.lock().unwrap();
    let Some(post) = posts.iter_mut().find(|p| p["id"] == id) else {
        return error(StatusCode::NOT_FOUND, "Post not found");
    };
    let count = post["like_count"].as_u64().unwrap_or(0);
    let count = if liking { count + 1 } else { count.saturating_sub(1) };
    post["like_count"] = json!(count);
    post["user_liked"] = json!(liking);

    let status = if liking { StatusCode::CREATED } else { StatusCode::OK };
    (status, Json(json!({ "message": "ok", "like_count": count }))).into_response()
}

async fn list_comments(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid or missing token");
    }
    if state.fail_comments.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "comments unavailable");
    }
    let comments = state
        .comments
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .unwrap_or_default();
    Json(json!({ "comments": comments })).into_response()
}

async fn add_comment(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid or missing token");
    }
    tokio::time::sleep(state.mutation_delay()).await;
    if state.fail_comments.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "comments unavailable");
    }
    let text = body["text"].as_str().unwrap_or_default().trim().to_string();
    if text.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Comment cannot be empty");
    }

    let comment_id = state.next_comment_id.fetch_add(1, Ordering::SeqCst) as i64;
    let comment = comment_json(comment_id, "alice", &text);
    state
        .comments
        .lock()
        .unwrap()
        .entry(id)
        .or_default()
        .push(comment.clone());
    (StatusCode::CREATED, Json(json!({ "comment": comment }))).into_response()
}

async fn create_post(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid or missing token");
    }

    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        fields.push(UploadField {
            name,
            file_name,
            content_type,
            data,
        });
    }

    let text = |name: &str| {
        fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| String::from_utf8_lossy(&f.data).to_string())
            .unwrap_or_default()
    };
    let caption = text("caption");
    let latitude: f64 = text("latitude").parse().unwrap_or(f64::NAN);
    let longitude: f64 = text("longitude").parse().unwrap_or(f64::NAN);
    let image_name = fields
        .iter()
        .find(|f| f.name == "image")
        .and_then(|f| f.file_name.clone())
        .unwrap_or_default();

    state.uploads.lock().unwrap().extend(fields);
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "Post created successfully",
            "post": {
                "id": 99,
                "image_path": format!("uploads/{}", image_name),
                "caption": caption,
                "latitude": latitude,
                "longitude": longitude
            }
        })),
    )
        .into_response()
}
