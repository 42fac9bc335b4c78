//! In-process mock of the ERP proxy.
//!
//! Serves `/auth/signin`, `/auth/session` and, for every collection,
//! list (`POST /<path>`), update (`PUT /<path>/:id`) and create
//! (`POST /<path>/create`). Counts hits per route so tests can assert
//! how many requests were actually made.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use stockroom_client::Collection;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin";
pub const ADMIN_SESSION: &str = "sess-admin";

#[derive(Default)]
pub struct MockState {
    pub sessions: Mutex<HashSet<String>>,
    pub records: Mutex<HashMap<Collection, Vec<Value>>>,
    pub hits: Mutex<HashMap<String, usize>>,
    pub list_delay: Mutex<Duration>,
    pub last_headers: Mutex<Option<HeaderMap>>,
}

impl MockState {
    fn hit(&self, key: &str) {
        *self.hits.lock().unwrap().entry(key.to_string()).or_default() += 1;
    }

    pub fn hits(&self, key: &str) -> usize {
        self.hits.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn revoke(&self, session: &str) {
        self.sessions.lock().unwrap().remove(session);
    }

    pub fn seed(&self, collection: Collection, items: Vec<Value>) {
        self.records.lock().unwrap().insert(collection, items);
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.last_headers
            .lock()
            .unwrap()
            .as_ref()?
            .get(name)?
            .to_str()
            .ok()
            .map(str::to_string)
    }

    fn session_ok(&self, body: &Value) -> bool {
        body["sessionId"]
            .as_str()
            .is_some_and(|s| self.sessions.lock().unwrap().contains(s))
    }
}

pub struct MockProxy {
    pub base_url: String,
    pub state: Arc<MockState>,
}

pub async fn start_mock_proxy() -> MockProxy {
    let state = Arc::new(MockState::default());
    state.sessions.lock().unwrap().insert(ADMIN_SESSION.to_string());
    state.seed(
        Collection::Products,
        vec![
            json!({"id": 1, "name": "Desk", "list_price": 120.0, "categ_id": [3, "Furniture"]}),
            json!({"id": 2, "name": "Chair", "list_price": 45.0, "categ_id": false}),
        ],
    );
    state.seed(
        Collection::Quants,
        vec![json!({"id": 10, "product_id": [1, "Desk"], "location_id": [8, "WH/Stock"], "quantity": 4.0})],
    );

    let mut app = Router::new()
        .route("/auth/signin", post(signin))
        .route("/auth/session", post(session));

    for collection in Collection::ALL {
        app = app
            .route(
                collection.path(),
                post(move |State(s): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>| {
                    list(s, collection, headers, body)
                }),
            )
            .route(
                &format!("{}/:id", collection.path()),
                post(move |State(s): State<Arc<MockState>>, Path(id): Path<String>, Json(body): Json<Value>| {
                    create(s, collection, id, body)
                })
                .put(move |State(s): State<Arc<MockState>>, Path(id): Path<i64>, Json(body): Json<Value>| {
                    update(s, collection, id, body)
                }),
            );
    }

    let app = app.with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockProxy {
        base_url: format!("http://{}", addr),
        state,
    }
}

/// A URL where nothing is listening.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn signin(State(s): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    s.hit("signin");
    if body["email"] == ADMIN_EMAIL && body["password"] == ADMIN_PASSWORD {
        Json(json!({
            "isAuthenticated": true,
            "uid": 2,
            "name": "Mitchell Admin",
            "sessionId": ADMIN_SESSION,
        }))
    } else {
        Json(json!({ "isAuthenticated": false }))
    }
}

async fn session(State(s): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    s.hit("session");
    Json(json!({ "isValid": s.session_ok(&body) }))
}

async fn list(s: Arc<MockState>, collection: Collection, headers: HeaderMap, body: Value) -> Json<Value> {
    s.hit(collection.name());
    *s.last_headers.lock().unwrap() = Some(headers);
    let delay = *s.list_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if !s.session_ok(&body) {
        return Json(json!({ "success": false, "message": "Session expired" }));
    }
    let items = s.records.lock().unwrap().get(&collection).cloned().unwrap_or_default();
    let mut resp = Map::new();
    resp.insert("success".into(), json!(true));
    resp.insert(collection.name().into(), Value::Array(items));
    Json(Value::Object(resp))
}

async fn update(s: Arc<MockState>, collection: Collection, id: i64, body: Value) -> Json<Value> {
    s.hit(&format!("{}:update", collection.name()));
    if !s.session_ok(&body) {
        return Json(json!({ "success": false, "message": "Session expired" }));
    }
    let values = body["values"].as_object().cloned().unwrap_or_default();
    if values.get("list_price").and_then(Value::as_f64).is_some_and(|p| p < 0.0) {
        return Json(json!({ "success": false, "message": "Sales price cannot be negative" }));
    }
    let mut records = s.records.lock().unwrap();
    let items = records.entry(collection).or_default();
    let Some(item) = items.iter_mut().find(|r| r["id"] == id) else {
        return Json(json!({ "success": false, "message": format!("Record {id} does not exist") }));
    };
    for (k, v) in values {
        item[k.as_str()] = v;
    }
    Json(json!({ "success": true }))
}

async fn create(s: Arc<MockState>, collection: Collection, id: String, body: Value) -> Json<Value> {
    if id != "create" {
        return Json(json!({ "success": false, "message": "not found" }));
    }
    s.hit(&format!("{}:create", collection.name()));
    if !s.session_ok(&body) {
        return Json(json!({ "success": false, "message": "Session expired" }));
    }
    let mut values = body["values"].as_object().cloned().unwrap_or_default();
    let mut records = s.records.lock().unwrap();
    let items = records.entry(collection).or_default();
    let next = items.iter().filter_map(|r| r["id"].as_i64()).max().unwrap_or(0) + 1;
    values.insert("id".into(), json!(next));
    items.push(Value::Object(values));
    Json(json!({ "success": true, "id": next }))
}
