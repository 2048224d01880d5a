use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Windows kept before expired entries are swept.
const RATE_LIMIT_SWEEP_THRESHOLD: usize = 1_024;

/// Request correlation id, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Rate-limit key set by [`require_bearer_auth`]: the accepted token, or
/// `anonymous` when auth is disabled.
#[derive(Debug, Clone)]
struct ClientKey(String);

const ANONYMOUS_CLIENT: &str = "anonymous";

/// Bearer keys accepted on protected routes.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<Vec<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// # Errors
    ///
    /// Fails outside development when no key is configured.
    pub fn from_config(config: &tilecrm_core::AppConfig) -> anyhow::Result<Self> {
        Self::new(config.api_keys.clone(), config.is_development())
    }

    /// # Errors
    ///
    /// Fails when `api_keys` is empty and `is_development` is false.
    pub fn new(api_keys: Vec<String>, is_development: bool) -> anyhow::Result<Self> {
        match (api_keys.is_empty(), is_development) {
            (false, _) => Ok(Self {
                api_keys: Arc::new(api_keys),
                enabled: true,
            }),
            (true, true) => {
                tracing::warn!("TILECRM_API_KEYS empty; promotion admin routes are open");
                Ok(Self {
                    api_keys: Arc::new(Vec::new()),
                    enabled: false,
                })
            }
            (true, false) => anyhow::bail!(
                "TILECRM_API_KEYS must list at least one bearer token outside development"
            ),
        }
    }

    /// Every configured key is compared, in constant time per key.
    fn allows(&self, token: &str) -> bool {
        self.api_keys.iter().fold(false, |found, key| {
            found | bool::from(key.as_bytes().ct_eq(token.as_bytes()))
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter keyed by the [`ClientKey`] auth attached. Requests
/// that fail auth never reach it, so it tracks at most one window per
/// configured key plus `anonymous`.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    clients: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request for `client`; false once its window is full.
    async fn admit(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;

        if clients.len() >= RATE_LIMIT_SWEEP_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started_at) < window);
        }

        let entry = clients.entry(client.to_owned()).or_insert(Window {
            started_at: now,
            count: 0,
        });
        if now.duration_since(entry.started_at) >= self.window {
            *entry = Window {
                started_at: now,
                count: 0,
            };
        }
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Reuses an inbound `x-request-id` or mints a `UUIDv4`, then exposes it as
/// a [`RequestId`] extension and echoes it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut res = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    res
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        req.extensions_mut()
            .insert(ClientKey(ANONYMOUS_CLIENT.to_owned()));
        return next.run(req).await;
    }

    let accepted = extract_bearer_token(req.headers().get(AUTHORIZATION))
        .filter(|token| auth.allows(token))
        .map(ToOwned::to_owned);

    match accepted {
        Some(token) => {
            req.extensions_mut().insert(ClientKey(token));
            next.run(req).await
        }
        None => ApiError::new(
            request_id_of(&req),
            "unauthorized",
            "missing or invalid bearer token",
        )
        .into_response(),
    }
}

/// Must sit inside [`require_bearer_auth`].
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ClientKey>()
        .map_or(ANONYMOUS_CLIENT, |key| key.0.as_str());

    if !rate_limit.admit(client).await {
        tracing::warn!(
            max_requests = rate_limit.max_requests,
            window_secs = rate_limit.window.as_secs(),
            "rate limit exceeded"
        );
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
