//! End-to-end facade tests.
//!
//! A mock npm upstream and a real facade are bound to ephemeral ports;
//! requests are driven with a plain HTTP client so every layer (method
//! policy, flags, filtering, pagination, rewriting, problem bodies) is
//! exercised the way clients see it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::Router;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use serde_json::Value;
use serde_json::json;

use prism::config::FacadeConfig;
use prism::ecosystems::EcosystemKind;
use prism::ecosystems::npm::NpmEcosystem;
use prism::server::build_router;
use prism::state::AppState;

const CORPUS: &[&str] =
    &["express", "lodash", "preact", "react", "react-dom", "react-router", "redux"];

#[derive(Clone)]
struct MockState {
    base: String,
    packument_hits: Arc<AtomicUsize>,
}

async fn all_docs() -> Response {
    let rows: Vec<Value> = CORPUS.iter().map(|name| json!({"id": name})).collect();
    axum::Json(json!({"rows": rows})).into_response()
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Response {
    let text = params.get("text").cloned().unwrap_or_default();
    let objects: Vec<Value> = CORPUS
        .iter()
        .filter(|name| name.contains(&text))
        .map(|name| json!({"package": {"name": name}}))
        .collect();
    axum::Json(json!({"objects": objects})).into_response()
}

async fn packument(State(state): State<MockState>, uri: Uri) -> Response {
    let name = uri.path().trim_start_matches('/').to_string();
    if !CORPUS.contains(&name.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.packument_hits.fetch_add(1, Ordering::SeqCst);

    let body = if name == "express" {
        let versions = [
            ("4.0.0", "2014-04-09T00:00:00.000Z"),
            ("4.17.1", "2019-05-26T00:00:00.000Z"),
            ("4.18.2", "2022-10-08T00:00:00.000Z"),
        ];
        let mut version_map = serde_json::Map::new();
        let mut time_map = serde_json::Map::new();
        for (version, time) in versions {
            version_map.insert(
                version.to_string(),
                json!({
                    "name": "express",
                    "version": version,
                    "description": "Fast, unopinionated web framework",
                    "license": "MIT",
                    "dist": {
                        "tarball": format!("{}/express/-/express-{version}.tgz", state.base)
                    },
                }),
            );
            time_map.insert(version.to_string(), json!(time));
        }
        json!({
            "name": "express",
            "dist-tags": {"latest": "4.18.2"},
            "versions": version_map,
            "time": time_map,
            "description": "Fast, unopinionated web framework",
            "license": "MIT",
            "homepage": "http://expressjs.com/",
        })
    } else {
        json!({
            "name": name,
            "dist-tags": {"latest": "1.0.0"},
            "versions": {
                "1.0.0": {
                    "name": name,
                    "version": "1.0.0",
                    "description": format!("{name} package"),
                    "license": if name.starts_with('r') { "MIT" } else { "ISC" },
                    "dist": {"tarball": format!("{}/{name}/-/{name}-1.0.0.tgz", state.base)},
                }
            },
            "time": {"1.0.0": "2020-01-01T00:00:00.000Z"},
            "description": format!("{name} package"),
            "license": if name.starts_with('r') { "MIT" } else { "ISC" },
        })
    };
    axum::Json(body).into_response()
}

struct Harness {
    facade_base: String,
    packument_hits: Arc<AtomicUsize>,
    client: reqwest::Client,
    _cache_dir: tempfile::TempDir,
}

async fn spawn() -> Harness {
    // mock upstream
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_base = format!("http://{}", listener.local_addr().unwrap());
    let packument_hits = Arc::new(AtomicUsize::new(0));
    let mock = Router::new()
        .route("/_all_docs", get(all_docs))
        .route("/-/v1/search", get(search))
        .fallback(packument)
        .with_state(MockState {
            base: upstream_base.clone(),
            packument_hits: Arc::clone(&packument_hits),
        });
    tokio::spawn(async move { axum::serve(listener, mock).await.unwrap() });

    // facade over the mock
    let cache_dir = tempfile::tempdir().unwrap();
    let mut config = FacadeConfig::default_for(EcosystemKind::Npm);
    config.cache_dir = cache_dir.path().to_path_buf();
    config.packages_estimate = None;
    let ecosystem = Arc::new(NpmEcosystem::with_upstream(&upstream_base, &upstream_base));
    let state = AppState::with_ecosystem(config, ecosystem).await.unwrap();
    let router = build_router(&state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let facade_base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap()
    });

    let harness = Harness {
        facade_base,
        packument_hits,
        client: reqwest::Client::new(),
        _cache_dir: cache_dir,
    };
    harness.wait_index_ready().await;
    harness
}

impl Harness {
    async fn wait_index_ready(&self) {
        for _ in 0..100 {
            let health: Value = self
                .client
                .get(format!("{}/health", self.facade_base))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if health["index_ready"] == json!(true) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("index never became ready");
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(format!("{}{path}", self.facade_base)).send().await.unwrap()
    }

    async fn get_json(&self, path: &str) -> (StatusCode, Option<String>, Value) {
        let response = self.get(path).await;
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        let link = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.json().await.unwrap();
        (status, link, body)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn sorted_listing_returns_smallest_names_with_link() {
    let harness = spawn().await;
    let (status, link, body) = harness
        .get_json("/noderegistries/npmjs.org/packages?limit=2&sort=name=asc")
        .await;

    assert_eq!(status, StatusCode::OK);
    let mut names: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["express", "lodash"]);

    let link = link.expect("full page advertises a next page");
    assert!(link.contains("offset=2"));
    assert!(link.contains("rel=\"next\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn name_filter_matches_without_enrichment() {
    let harness = spawn().await;
    let (status, link, body) = harness
        .get_json("/noderegistries/npmjs.org/packages?filter=name=react*&limit=3")
        .await;

    assert_eq!(status, StatusCode::OK);
    let entries = body.as_object().unwrap();
    assert!(entries.len() <= 3);
    for (name, entry) in entries {
        assert!(name.starts_with("react"));
        // name-only filters skip step 2, so no metadata is attached
        assert!(entry.get("description").is_none());
        assert!(entry.get("xid").is_some());
    }
    assert!(link.is_some(), "non-empty filtered page advertises a next page");
}

#[tokio::test(flavor = "multi_thread")]
async fn metadata_filter_runs_enrichment() {
    let harness = spawn().await;
    // '&' inside the filter value arrives percent-encoded
    let (status, _, body) = harness
        .get_json("/noderegistries/npmjs.org/packages?filter=name%3Dreact*%26license%3DMIT&limit=5")
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_object().unwrap();
    assert!(!entries.is_empty());
    for entry in entries.values() {
        assert_eq!(entry["license"], json!("MIT"));
        assert!(entry.get("description").is_some(), "enriched entries carry metadata");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn resource_reflects_default_version() {
    let harness = spawn().await;
    let (status, _, body) = harness.get_json("/noderegistries/npmjs.org/packages/express").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["packageid"], json!("express"));
    assert_eq!(body["versionid"], json!("4.18.2"));
    assert_eq!(body["isdefault"], json!(true));
    assert_eq!(body["versionscount"], json!(3));
    assert_eq!(body["xid"], json!("/noderegistries/npmjs.org/packages/express"));
    assert_eq!(
        body["self"],
        json!(format!("{}/noderegistries/npmjs.org/packages/express", harness.facade_base))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn version_meta_has_exactly_the_identity_keys() {
    let harness = spawn().await;
    let (status, _, body) = harness
        .get_json("/noderegistries/npmjs.org/packages/express/versions/4.0.0/meta")
        .await;

    assert_eq!(status, StatusCode::OK);
    let mut keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "ancestor", "createdat", "epoch", "isdefault", "modifiedat", "packageid", "self",
            "versionid", "xid",
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn mutating_verbs_get_problem_405() {
    let harness = spawn().await;
    for method in [
        reqwest::Method::POST,
        reqwest::Method::PUT,
        reqwest::Method::PATCH,
        reqwest::Method::DELETE,
    ] {
        let response = harness
            .client
            .request(method.clone(), format!("{}/noderegistries/npmjs.org/packages", harness.facade_base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 405, "{method} must be refused");

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["title"], json!("Method Not Allowed"));
        assert_eq!(body["status"], json!(405));
        assert!(body["detail"].as_str().unwrap().contains("read-only"));
        assert!(body.get("traceId").is_some());
        assert!(body.get("instance").is_some());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn upstream_origins_are_rewritten_but_xid_is_not() {
    let harness = spawn().await;
    let (status, _, body) = harness
        .get_json("/noderegistries/npmjs.org/packages/express/versions/4.18.2")
        .await;

    assert_eq!(status, StatusCode::OK);
    let tarball = body["dist"]["tarball"].as_str().unwrap();
    assert!(
        tarball.starts_with(&harness.facade_base),
        "tarball URL must carry the bridge origin, got {tarball}"
    );
    // xid keeps its registry-relative form untouched
    assert_eq!(
        body["xid"],
        json!("/noderegistries/npmjs.org/packages/express/versions/4.18.2")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_fetches_coalesce_to_one_upstream_call() {
    let harness = spawn().await;
    let before = harness.packument_hits.load(Ordering::SeqCst);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = harness.client.clone();
        let url = format!("{}/noderegistries/npmjs.org/packages/express", harness.facade_base);
        handles.push(tokio::spawn(async move {
            client.get(url).send().await.unwrap().status().as_u16()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    let after = harness.packument_hits.load(Ordering::SeqCst);
    assert_eq!(after - before, 1, "single-flight must coalesce identical misses");
}

#[tokio::test(flavor = "multi_thread")]
async fn ancestor_chain_follows_time_order() {
    let harness = spawn().await;
    let (_, _, versions) =
        harness.get_json("/noderegistries/npmjs.org/packages/express/versions").await;

    let versions = versions.as_object().unwrap();
    assert_eq!(versions.len(), 3);
    assert_eq!(versions["4.0.0"]["ancestor"], json!("4.0.0"), "oldest is its own ancestor");
    assert_eq!(versions["4.17.1"]["ancestor"], json!("4.0.0"));
    assert_eq!(versions["4.18.2"]["ancestor"], json!("4.17.1"));
    assert_eq!(versions["4.18.2"]["isdefault"], json!(true));
    assert_eq!(versions["4.0.0"]["isdefault"], json!(false));
}

#[tokio::test(flavor = "multi_thread")]
async fn resource_and_meta_views_agree() {
    let harness = spawn().await;
    let (_, _, resource) = harness.get_json("/noderegistries/npmjs.org/packages/express").await;
    let (_, _, meta) = harness.get_json("/noderegistries/npmjs.org/packages/express/meta").await;

    assert_eq!(resource["versionid"], meta["defaultversionid"]);
    assert_eq!(resource["epoch"], meta["epoch"]);
    assert_eq!(resource["modifiedat"], meta["modifiedat"]);
    assert_eq!(meta["readonly"], json!(true));
}

#[tokio::test(flavor = "multi_thread")]
async fn boundary_conditions() {
    let harness = spawn().await;

    // limit must be positive
    let (status, _, body) =
        harness.get_json("/noderegistries/npmjs.org/packages?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!(400));

    // unknown flags are client errors
    let (status, _, _) =
        harness.get_json("/noderegistries/npmjs.org/packages?frobnicate=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // a filter matching nothing returns an empty object and no Link
    let (status, link, body) = harness
        .get_json("/noderegistries/npmjs.org/packages?filter=name%3Dzzz*")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
    assert!(link.is_none());

    // unknown package is a 404 problem
    let (status, _, body) =
        harness.get_json("/noderegistries/npmjs.org/packages/no-such-package").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["title"], json!("Not Found"));

    // unknown group collection is a 404
    let (status, _, _) = harness.get_json("/cargoregistries").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn registry_document_is_stable_and_inlines_on_request() {
    let harness = spawn().await;

    let (_, _, first) = harness.get_json("/").await;
    let (_, _, second) = harness.get_json("/").await;
    assert_eq!(first, second, "root document is idempotent");
    assert_eq!(first["xid"], json!("/"));
    assert_eq!(first["self"], json!(format!("{}/", harness.facade_base)));
    assert_eq!(first["noderegistriescount"], json!(1));
    assert!(first.get("noderegistries").is_none());

    let (_, _, inlined) = harness.get_json("/?inline=noderegistries").await;
    let group = &inlined["noderegistries"]["npmjs.org"];
    assert_eq!(group["noderegistryid"], json!("npmjs.org"));
    assert_eq!(group["xid"], json!("/noderegistries/npmjs.org"));
}

#[tokio::test(flavor = "multi_thread")]
async fn limit_one_returns_first_of_deterministic_order() {
    let harness = spawn().await;
    let (_, _, body) = harness
        .get_json("/noderegistries/npmjs.org/packages?limit=1&sort=name=asc")
        .await;
    let names: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(names, vec!["express"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn export_redirects_to_document_form() {
    let harness = spawn().await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client
        .get(format!("{}/export", harness.facade_base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 302);
    let location = response.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.contains("doc"));
    assert!(location.contains("inline=*,capabilities,modelsource"));
}

#[tokio::test(flavor = "multi_thread")]
async fn responses_carry_registry_headers() {
    let harness = spawn().await;
    let response = harness.get("/noderegistries/npmjs.org/packages/express").await;

    let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.contains("schema=https://xregistry.io/schemas/xregistry-v1.0-rc2.json"));
    assert_eq!(
        response.headers().get("xregistry-version").unwrap().to_str().unwrap(),
        "1.0-rc2"
    );
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap().to_str().unwrap(),
        "*"
    );
    assert!(response.headers().get("x-trace-id").is_some());
}
