use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use resumatch_core::SearchOptions;
use serde_json::{json, Value};
use std::fs;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

fn build_store() -> TempDir {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("u1")).unwrap();
    fs::write(
        dir.path().join("u1/resumes.jsonl"),
        concat!(
            r#"{"id":"a","name":"backend.pdf","textContent":"Senior Backend Engineer experienced in distributed systems and Go","lastModified":1}"#,
            "\n",
            r#"{"id":"b","name":"frontend.pdf","textContent":"Frontend Developer skilled in React and CSS","lastModified":2}"#,
            "\n",
        ),
    )
    .unwrap();
    dir
}

fn app(dir: &TempDir) -> Router {
    resumatch_server::build_app(&dir.path().to_string_lossy(), SearchOptions::default()).unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn ids(json: &Value) -> Vec<String> {
    json["results"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap().to_string()).collect()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = build_store();
    let app = app(&dir);

    let (status, info) = call(&app, Method::POST, "/sessions/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["documents"], 2);
    assert_eq!(info["state"], "ready");

    let (status, json) = call(&app, Method::GET, "/sessions/u1/search?q=backend%20engineer%20with%20Go&k=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(ids(&json)[0], "a");
    assert!(json["results"][0]["snippet"].as_str().unwrap().contains("<em>Go</em>"));
}

#[tokio::test]
async fn unknown_session_searches_empty() {
    let dir = build_store();
    let app = app(&dir);
    let (status, json) = call(&app, Method::GET, "/sessions/nobody/search?q=rust", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], false);
    assert!(ids(&json).is_empty());

    let (status, _) = call(&app, Method::GET, "/sessions/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn add_and_remove_documents() {
    let dir = build_store();
    let app = app(&dir);
    call(&app, Method::POST, "/sessions/u1", None).await;

    let doc = json!({"id": "h", "name": "fp.pdf", "textContent": "Haskell and Elm developer", "lastModified": 3});
    let (status, json) = call(&app, Method::POST, "/sessions/u1/documents", Some(doc.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["outcome"], "inserted");
    let (status, _) = call(&app, Method::POST, "/sessions/u1/documents", Some(doc)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&app, Method::GET, "/sessions/u1/search?q=Haskell&k=1", None).await;
    assert_eq!(ids(&json), vec!["h"]);

    let (status, _) = call(&app, Method::DELETE, "/sessions/u1/documents/h", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::DELETE, "/sessions/u1/documents/h", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = call(&app, Method::GET, "/sessions/u1/search?q=Haskell&k=5", None).await;
    assert!(!ids(&json).contains(&"h".to_string()));
}

#[tokio::test]
async fn limits_and_pinning() {
    let dir = build_store();
    let app = app(&dir);
    call(&app, Method::POST, "/sessions/u1", None).await;

    let (_, json) = call(&app, Method::GET, "/sessions/u1/search?q=Go&k=0", None).await;
    assert!(ids(&json).is_empty());
    let (_, json) = call(&app, Method::GET, "/sessions/u1/search?q=Go&k=-3", None).await;
    assert!(ids(&json).is_empty());

    let (_, json) = call(&app, Method::GET, "/sessions/u1/search?q=distributed%20systems&k=1&selected=b", None).await;
    assert_eq!(ids(&json), vec!["a", "b"]);
    assert_eq!(json["results"][1]["pinned"], true);

    let (_, json) = call(&app, Method::GET, "/sessions/u1/search?q=distributed%20systems&k=1&selected=a", None).await;
    assert_eq!(ids(&json), vec!["a"]);
}

#[tokio::test]
async fn closing_a_session_discards_it() {
    let dir = build_store();
    let app = app(&dir);
    call(&app, Method::POST, "/sessions/u1", None).await;
    let (status, _) = call(&app, Method::DELETE, "/sessions/u1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::POST, "/sessions/u1/documents", Some(json!({"id": "x", "textContent": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn broken_store_makes_session_unavailable() {
    let dir = build_store();
    fs::write(dir.path().join("u1/broken.json"), "[").unwrap();
    let app = app(&dir);
    let (status, _) = call(&app, Method::POST, "/sessions/u1", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (_, info) = call(&app, Method::GET, "/sessions/u1", None).await;
    assert_eq!(info["state"], "unavailable");
    let (_, json) = call(&app, Method::GET, "/sessions/u1/search?q=Go", None).await;
    assert_eq!(json["ready"], false);
}

#[tokio::test]
async fn preloaded_sessions_search_without_opening() {
    let dir = build_store();
    let state = resumatch_server::AppState::new(&dir.path().to_string_lossy(), SearchOptions::default()).unwrap();
    assert_eq!(state.preload().unwrap(), 1);
    let app = resumatch_server::build_router(state);

    let (status, info) = call(&app, Method::GET, "/sessions/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["state"], "ready");

    let (_, json) = call(&app, Method::GET, "/sessions/u1/search?q=backend%20Go", None).await;
    assert_eq!(json["ready"], true);
    assert_eq!(ids(&json)[0], "a");
}
