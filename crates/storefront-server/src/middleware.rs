use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use storefront_core::Environment;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// A set of bearer tokens, held as SHA-256 digests.
///
/// Lookups hash the presented token and compare every stored digest in
/// constant time.
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    digests: Arc<Vec<[u8; 32]>>,
}

impl TokenSet {
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests: Vec<[u8; 32]> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_owned())
            .filter(|k| !k.is_empty())
            .map(|k| Sha256::digest(k.as_bytes()).into())
            .collect();
        Self {
            digests: Arc::new(digests),
        }
    }

    /// Parses a comma-separated token list from `var`. Unset means empty.
    pub fn from_env_var(var: &str) -> Self {
        let raw = std::env::var(var).unwrap_or_default();
        Self::from_keys(raw.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    fn contains(&self, token: &str) -> bool {
        let presented = Sha256::digest(token.as_bytes());
        self.digests.iter().fold(false, |found, digest| {
            found | bool::from(digest.as_slice().ct_eq(presented.as_slice()))
        })
    }
}

/// API key auth settings for write endpoints.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: TokenSet,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `STOREFRONT_API_KEYS` (comma-separated bearer
    /// tokens).
    ///
    /// In development, empty/missing keys leave API writes open. In other
    /// environments, empty/missing keys fail startup.
    pub fn from_env(env: &Environment) -> anyhow::Result<Self> {
        Self::for_environment(TokenSet::from_env_var("STOREFRONT_API_KEYS"), env)
    }

    pub fn for_environment(api_keys: TokenSet, env: &Environment) -> anyhow::Result<Self> {
        let state = Self::from_tokens(api_keys);
        if state.enabled {
            return Ok(state);
        }
        if *env != Environment::Development {
            anyhow::bail!(
                "STOREFRONT_API_KEYS is required in {env}; provide comma-separated bearer tokens"
            );
        }
        tracing::warn!("STOREFRONT_API_KEYS not set; bearer auth disabled in development");
        Ok(state)
    }

    pub fn from_tokens(api_keys: TokenSet) -> Self {
        let enabled = !api_keys.is_empty();
        Self { api_keys, enabled }
    }

    fn allows(&self, token: &str) -> bool {
        self.api_keys.contains(token)
    }
}

/// Cookie carrying a staff token for browser sessions.
pub const STAFF_COOKIE: &str = "storefront_staff";

/// Staff principals, identified by bearer token or the staff cookie.
#[derive(Debug, Clone)]
pub struct StaffAuth {
    staff_keys: TokenSet,
}

impl StaffAuth {
    /// Builds the staff set from `STOREFRONT_STAFF_KEYS`. With no keys
    /// configured every staff route is refused.
    pub fn from_env() -> Self {
        let staff_keys = TokenSet::from_env_var("STOREFRONT_STAFF_KEYS");
        if staff_keys.is_empty() {
            tracing::warn!("STOREFRONT_STAFF_KEYS not set; inventory management is unreachable");
        }
        Self { staff_keys }
    }

    pub fn from_tokens(staff_keys: TokenSet) -> Self {
        Self { staff_keys }
    }

    pub fn is_staff(&self, token: &str) -> bool {
        self.staff_keys.contains(token)
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

fn reject(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(MiddlewareErrorBody {
            error: MiddlewareError { code, message },
        }),
    )
        .into_response()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing Bearer token auth when enabled.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    match extract_bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        ),
    }
}

/// Middleware admitting staff principals only.
///
/// A bearer header takes precedence over the staff cookie. Runs before the
/// handler, so a refused request never reaches the database.
pub async fn require_staff(State(staff): State<StaffAuth>, req: Request, next: Next) -> Response {
    let Some(token) = staff_credential(req.headers()) else {
        return reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "authentication required",
        );
    };

    if staff.is_staff(&token) {
        next.run(req).await
    } else {
        tracing::warn!(path = %req.uri().path(), "non-staff request to staff route refused");
        reject(StatusCode::FORBIDDEN, "forbidden", "staff access required")
    }
}

fn staff_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers.get(AUTHORIZATION)) {
        return Some(token.to_owned());
    }
    CookieJar::from_headers(headers)
        .get(STAFF_COOKIE)
        .map(|c| c.value().trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        return reject(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded",
        );
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
