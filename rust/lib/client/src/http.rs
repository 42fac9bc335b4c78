//! Shared request helper for the ERP proxy.
//!
//! Every call is a single JSON request:
//! - body: caller params with `sessionId` merged in
//! - headers: `x-odoo-base` / `x-odoo-db` when the target is configured
//!
//! No retries, no backoff. One attempt, one outcome.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::collection::Collection;
use crate::config::ProxyConfig;
use crate::error::ApiError;
use crate::record::Record;

pub const HEADER_ODOO_BASE: &str = "x-odoo-base";
pub const HEADER_ODOO_DB: &str = "x-odoo-db";

// ── Response envelopes ──────────────────────────────────────────────

/// `POST /auth/signin` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    #[serde(default)]
    pub is_authenticated: bool,
    /// Odoo uid; numeric in practice but treated as opaque.
    #[serde(default)]
    pub uid: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl SignInResponse {
    pub fn uid_string(&self) -> Option<String> {
        match self.uid.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// `POST /auth/session` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCheck {
    #[serde(default)]
    pub is_valid: bool,
}

/// `{ success, message?, ...rest }`: the shape of every data endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl Envelope {
    fn into_result(self) -> Result<Map<String, Value>, ApiError> {
        if self.success {
            return Ok(self.rest);
        }
        let msg = self
            .message
            .or(self.error)
            .unwrap_or_else(|| "request rejected".to_string());
        Err(ApiError::Rejected(msg))
    }
}

// ── ProxyClient ─────────────────────────────────────────────────────

/// HTTP client bound to one proxy and one ERP target. Cheap to clone.
#[derive(Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    config: ProxyConfig,
}

impl ProxyClient {
    pub fn new(config: ProxyConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Merge `sessionId` into the params object.
    fn body(session_id: Option<&str>, params: Value) -> Result<Value, ApiError> {
        let mut map = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ApiError::Decode(format!(
                    "request params must be a JSON object, got {other}"
                )))
            }
        };
        if let Some(sid) = session_id {
            map.insert("sessionId".to_string(), Value::String(sid.to_string()));
        }
        Ok(Value::Object(map))
    }

    fn with_target(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(base) = &self.config.odoo_base_url {
            req = req.header(HEADER_ODOO_BASE, base);
        }
        if let Some(db) = &self.config.odoo_db {
            req = req.header(HEADER_ODOO_DB, db);
        }
        req
    }

    /// Parse a response, mapping HTTP errors to `ApiError`.
    async fn parse<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Server { status: code, message: body });
        }
        resp.json::<R>()
            .await
            .map_err(|e| ApiError::Decode(format!("response body: {}", e)))
    }

    /// `POST {path}` with `{ sessionId, ...params }`.
    pub async fn post<R: DeserializeOwned>(
        &self,
        path: &str,
        session_id: Option<&str>,
        params: Value,
    ) -> Result<R, ApiError> {
        let body = Self::body(session_id, params)?;
        debug!("POST {}", path);
        let req = self.with_target(self.http.post(self.url(path)).json(&body));
        let resp = req.send().await?;
        Self::parse(resp).await
    }

    /// `PUT {path}` with `{ sessionId, ...params }`.
    pub async fn put<R: DeserializeOwned>(
        &self,
        path: &str,
        session_id: Option<&str>,
        params: Value,
    ) -> Result<R, ApiError> {
        let body = Self::body(session_id, params)?;
        debug!("PUT {}", path);
        let req = self.with_target(self.http.put(self.url(path)).json(&body));
        let resp = req.send().await?;
        Self::parse(resp).await
    }

    // ── Endpoints ───────────────────────────────────────────────────

    /// `POST /auth/signin { email, password }`.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInResponse, ApiError> {
        self.post(
            "/auth/signin",
            None,
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// `POST /auth/session { sessionId }`.
    pub async fn check_session(&self, session_id: &str) -> Result<SessionCheck, ApiError> {
        self.post("/auth/session", Some(session_id), Value::Null).await
    }

    /// `POST /<collection> { sessionId, ...filters }`.
    pub async fn list(
        &self,
        collection: Collection,
        session_id: &str,
        filters: Value,
    ) -> Result<Vec<Record>, ApiError> {
        let env: Envelope = self.post(collection.path(), Some(session_id), filters).await?;
        let mut rest = env.into_result()?;
        let items = rest.remove(collection.name()).ok_or_else(|| {
            ApiError::Decode(format!("response has no \"{}\" list", collection.name()))
        })?;
        serde_json::from_value(items)
            .map_err(|e| ApiError::Decode(format!("{} records: {}", collection.name(), e)))
    }

    /// `PUT /<collection>/:id { sessionId, values }`.
    pub async fn update(
        &self,
        collection: Collection,
        id: i64,
        session_id: &str,
        values: &Map<String, Value>,
    ) -> Result<(), ApiError> {
        let path = format!("{}/{}", collection.path(), id);
        let env: Envelope = self
            .put(&path, Some(session_id), serde_json::json!({ "values": values }))
            .await?;
        env.into_result().map(|_| ())
    }

    /// `POST /<collection>/create { sessionId, values }`. Returns the new id.
    pub async fn create(
        &self,
        collection: Collection,
        session_id: &str,
        values: &Map<String, Value>,
    ) -> Result<i64, ApiError> {
        let path = format!("{}/create", collection.path());
        let env: Envelope = self
            .post(&path, Some(session_id), serde_json::json!({ "values": values }))
            .await?;
        let rest = env.into_result()?;
        rest.get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::Decode("create response has no id".into()))
    }
}
