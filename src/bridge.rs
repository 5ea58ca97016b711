//! The front bridge.
//!
//! Routes each group collection to its backing facade by the first path
//! segment, streams the response back through the URL rewriter, and
//! composes the cross-facade documents (`/`, `/model`). Facades receive
//! the bridge-visible base URL in `X-Base-Url` so the `self` URLs they
//! compose never leak a backend origin.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::middleware;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use chrono::DateTime;
use chrono::Utc;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tracing::instrument;
use tracing::warn;

use prism_core::ApiError;
use prism_core::TraceContext;
use prism_core::constants::BASE_URL_HEADER;
use prism_core::constants::CONTENT_TYPE_XREGISTRY;
use prism_core::constants::SPEC_VERSION;
use prism_core::constants::XREGISTRY_VERSION_HEADER;
use prism_core::entity;
use prism_rewrite::apply_cors;
use prism_rewrite::resolve_base_url;
use prism_rewrite::rewrite_body;
use prism_rewrite::rewrite_link_header;

use crate::config::ConfigError;
use crate::ecosystems::EcosystemKind;
use crate::facade;
use crate::handlers::problem_response;
use crate::server::router::method_policy;
use crate::server::router::mount_under_prefix;

/// Proxied calls may sit behind a facade's whole-query deadline, so the
/// bridge waits longer than any facade will.
const PROXY_TIMEOUT: Duration = Duration::from_secs(20);

/// One routed backend.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Group collection segment this backend owns.
    pub group_plural: String,
    /// Backend origin, stripped from every proxied payload.
    pub base_url: String,
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Listen port.
    pub port: u16,
    /// Bind address.
    pub host: String,
    /// Path prefix stripped before routing.
    pub api_path_prefix: String,
    /// Backends in dispatch order.
    pub backends: Vec<Backend>,
}

impl BridgeConfig {
    /// Load from the environment.
    ///
    /// `XREGISTRY_BRIDGE_BACKENDS` is a comma-separated
    /// `group=origin` list; the default wires all five facades on their
    /// conventional localhost ports.
    pub fn load() -> Result<Self, ConfigError> {
        let port = match std::env::var("XREGISTRY_BRIDGE_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "XREGISTRY_BRIDGE_PORT".to_string(),
                value: raw.clone(),
                reason: format!("must be a valid port number (0-65535): {e}"),
            })?,
            Err(_) => 8080,
        };

        let backends = match std::env::var("XREGISTRY_BRIDGE_BACKENDS") {
            Ok(raw) => parse_backends(&raw)?,
            Err(_) => Self::default_backends(),
        };

        Ok(Self {
            port,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_path_prefix: std::env::var("API_PATH_PREFIX").unwrap_or_default(),
            backends,
        })
    }

    /// All five facades on their conventional localhost ports.
    pub fn default_backends() -> Vec<Backend> {
        [
            EcosystemKind::Npm,
            EcosystemKind::Pypi,
            EcosystemKind::Maven,
            EcosystemKind::Oci,
            EcosystemKind::Mcp,
        ]
        .iter()
        .map(|kind| Backend {
            group_plural: kind.build().meta().group_plural.to_string(),
            base_url: format!("http://localhost:{}", kind.default_port()),
        })
        .collect()
    }

    /// The backend owning a group collection segment.
    pub fn backend_for(&self, group_plural: &str) -> Option<&Backend> {
        self.backends.iter().find(|b| b.group_plural == group_plural)
    }
}

fn parse_backends(raw: &str) -> Result<Vec<Backend>, ConfigError> {
    let mut backends = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((group, origin)) = entry.split_once('=') else {
            return Err(ConfigError::InvalidValue {
                key: "XREGISTRY_BRIDGE_BACKENDS".to_string(),
                value: entry.to_string(),
                reason: "expected <groupPlural>=<origin>".to_string(),
            });
        };
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "XREGISTRY_BRIDGE_BACKENDS".to_string(),
                value: origin.to_string(),
                reason: "origin must start with http:// or https://".to_string(),
            });
        }
        backends.push(Backend {
            group_plural: group.to_string(),
            base_url: origin.trim_end_matches('/').to_string(),
        });
    }
    Ok(backends)
}

/// Shared bridge state.
#[derive(Clone)]
pub struct BridgeState {
    /// Routing table and listen parameters.
    pub config: Arc<BridgeConfig>,
    client: reqwest::Client,
    started_at: Instant,
    booted_at: DateTime<Utc>,
}

impl BridgeState {
    /// Build state and the outbound client.
    pub fn new(config: BridgeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROXY_TIMEOUT)
            .user_agent(concat!("prism-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            client,
            started_at: Instant::now(),
            booted_at: Utc::now(),
        })
    }
}

/// Build the bridge router.
pub fn build_router(state: &BridgeState) -> Router {
    let router = Router::new()
        .route("/", get(root))
        .route("/model", get(model))
        .route("/capabilities", get(capabilities))
        .route("/health", get(health))
        .fallback(proxy)
        .layer(middleware::from_fn(method_policy))
        .with_state(state.clone());

    mount_under_prefix(router, &state.config.api_path_prefix)
}

/// `GET /` — the composed registry document.
///
/// Group collections are listed as URL references with their counts; each
/// facade contributes exactly one group, so no backend round-trip is
/// needed to compose the root.
async fn root(State(state): State<BridgeState>, headers: HeaderMap, uri: Uri) -> Response {
    let trace = TraceContext::from_headers(&headers);
    let base = match bridge_base(&state, &headers, &uri, &trace) {
        Ok(base) => base,
        Err(response) => return response,
    };

    let mut doc = Map::new();
    doc.insert("specversion".into(), json!(SPEC_VERSION));
    doc.insert("registryid".into(), json!("prism-bridge"));
    doc.insert("xid".into(), json!("/"));
    doc.insert("self".into(), json!(entity::self_url(&base, "/")));
    doc.insert("epoch".into(), json!(1));
    doc.insert("createdat".into(), json!(entity::iso8601(state.booted_at)));
    doc.insert("modifiedat".into(), json!(entity::iso8601(state.booted_at)));
    doc.insert("modelurl".into(), json!(entity::self_url(&base, "/model")));
    doc.insert("capabilitiesurl".into(), json!(entity::self_url(&base, "/capabilities")));
    for backend in &state.config.backends {
        let xid = format!("/{}", backend.group_plural);
        doc.insert(format!("{}url", backend.group_plural), json!(entity::self_url(&base, &xid)));
        doc.insert(format!("{}count", backend.group_plural), json!(1));
    }

    registry_json(Value::Object(doc), &trace)
}

/// `GET /model` — the merged model document across facades.
async fn model(State(state): State<BridgeState>, headers: HeaderMap, uri: Uri) -> Response {
    let trace = TraceContext::from_headers(&headers);
    let base = match bridge_base(&state, &headers, &uri, &trace) {
        Ok(base) => base,
        Err(response) => return response,
    };

    let mut groups = Map::new();
    for backend in &state.config.backends {
        let url = format!("{}/model", backend.base_url);
        let fetched = state
            .client
            .get(&url)
            .header(BASE_URL_HEADER, &base)
            .send()
            .await;
        match fetched {
            Ok(response) => match response.json::<Value>().await {
                Ok(model) => {
                    if let Some(backend_groups) = model.get("groups").and_then(Value::as_object) {
                        for (key, value) in backend_groups {
                            groups.insert(key.clone(), value.clone());
                        }
                    }
                }
                Err(e) => warn!(group = %backend.group_plural, error = %e, "backend model unreadable"),
            },
            Err(e) => warn!(group = %backend.group_plural, error = %e, "backend model unreachable"),
        }
    }

    registry_json(json!({ "groups": groups }), &trace)
}

/// `GET /capabilities`.
async fn capabilities(headers: HeaderMap) -> Response {
    let trace = TraceContext::from_headers(&headers);
    registry_json(facade::capabilities_document(), &trace)
}

/// `GET /health`.
async fn health(State(state): State<BridgeState>, headers: HeaderMap) -> Response {
    let trace = TraceContext::from_headers(&headers);
    let backends: Vec<Value> = state
        .config
        .backends
        .iter()
        .map(|b| json!({"group": b.group_plural, "origin": b.base_url}))
        .collect();
    registry_json(
        json!({
            "status": "ok",
            "uptime_secs": state.started_at.elapsed().as_secs(),
            "backends": backends,
        }),
        &trace,
    )
}

/// Everything else: dispatch by group type and rewrite on the way back.
#[instrument(skip_all, fields(path = %uri.path()))]
async fn proxy(State(state): State<BridgeState>, headers: HeaderMap, uri: Uri) -> Response {
    let trace = TraceContext::from_headers(&headers);
    let base = match bridge_base(&state, &headers, &uri, &trace) {
        Ok(base) => base,
        Err(response) => return response,
    };

    let group = uri.path().trim_start_matches('/').split('/').next().unwrap_or("");
    let Some(backend) = state.config.backend_for(group) else {
        let err = ApiError::NotFound { subject: uri.path().to_string() };
        return problem_response(&err, uri.path(), &trace);
    };

    let query = uri.query().map(|q| format!("?{q}")).unwrap_or_default();
    let url = format!("{}{}{}", backend.base_url, uri.path(), query);

    let mut request = state.client.get(&url).header(BASE_URL_HEADER, &base);
    for (name, value) in trace.outbound_headers() {
        request = request.header(name, value);
    }

    let upstream = match request.send().await {
        Ok(response) => response,
        Err(e) => return upstream_error(backend, &trace, uri.path(), &e.to_string()),
    };

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(CONTENT_TYPE_XREGISTRY)
        .to_string();
    let link = upstream
        .headers()
        .get(reqwest::header::LINK)
        .and_then(|v| v.to_str().ok())
        .map(|v| rewrite_link_header(v, &backend.base_url, &base));
    let location = upstream
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.replace(&backend.base_url, &base));

    let body = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return upstream_error(backend, &trace, uri.path(), &e.to_string()),
    };

    // JSON bodies go through the recursive rewriter; anything else passes
    // through untouched (the Link header was already rewritten)
    let body = if content_type.contains("json") {
        rewrite_body(&body, &backend.base_url, &base)
            .map(bytes::Bytes::from)
            .unwrap_or(body)
    } else {
        body
    };

    let mut response = (status, body).into_response();
    let response_headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        response_headers.insert(axum::http::header::CONTENT_TYPE, value);
    }
    if let Some(link) = link {
        if let Ok(value) = HeaderValue::from_str(&link) {
            response_headers.insert(axum::http::header::LINK, value);
        }
    }
    if let Some(location) = location {
        if let Ok(value) = HeaderValue::from_str(&location) {
            response_headers.insert(axum::http::header::LOCATION, value);
        }
    }
    apply_cors(response_headers);
    response
}

/// 502 body for unreachable backends.
fn upstream_error(
    backend: &Backend,
    trace: &TraceContext,
    instance: &str,
    message: &str,
) -> Response {
    warn!(group = %backend.group_plural, instance, message, "backend unreachable");
    let body = json!({
        "error": "upstream_unreachable",
        "message": message,
        "groupType": backend.group_plural,
        "traceId": trace.trace_id,
        "correlationId": trace.correlation_id,
    });
    let mut response = (StatusCode::BAD_GATEWAY, axum::Json(body)).into_response();
    apply_cors(response.headers_mut());
    response
}

fn bridge_base(
    state: &BridgeState,
    headers: &HeaderMap,
    uri: &Uri,
    trace: &TraceContext,
) -> Result<String, Response> {
    resolve_base_url(headers, &state.config.api_path_prefix, None).map_err(|e| {
        let err = ApiError::BadRequest { detail: e.to_string() };
        problem_response(&err, uri.path(), trace)
    })
}

fn registry_json(doc: Value, trace: &TraceContext) -> Response {
    let mut response = (StatusCode::OK, axum::Json(doc)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_XREGISTRY),
    );
    headers.insert(XREGISTRY_VERSION_HEADER, HeaderValue::from_static(SPEC_VERSION));
    apply_cors(headers);
    if let Ok(value) = HeaderValue::from_str(&trace.trace_id) {
        headers.insert(prism_core::constants::TRACE_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&trace.correlation_id) {
        headers.insert(prism_core::constants::CORRELATION_ID_HEADER, value);
    }
    response
}
