//! Search clients against local fake indexers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use reelstream_core::config::NetworkConfig;
use reelstream_core::network::HttpTransport;
use reelstream_core::settings::{JackettSettings, ProwlarrSettings, ProxySettings, SettingsStore};
use reelstream_search::{IndexerKind, MediaSearchError, MediaSearchService};
use serde_json::json;
use tokio::net::TcpListener;

const KEY: &str = "secret-key";

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn prowlarr_search(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if headers.get("X-Api-Key").and_then(|v| v.to_str().ok()) != Some(KEY) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    assert_eq!(params.get("limit").map(String::as_str), Some("10"));
    let query = params.get("query").cloned().unwrap_or_default();
    Json(json!([
        {"title": format!("{query} 1080p"), "magnetUrl": "magnet:?xt=urn:btih:aa", "size": 2048},
        {"title": format!("{query} 720p"), "downloadUrl": "http://prowlarr/dl/2"},
        {"title": "no link"}
    ]))
    .into_response()
}

async fn jackett_results(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if params.get("apikey").map(String::as_str) != Some(KEY) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    match params.get("Query") {
        Some(query) => Json(json!({"Results": [
            {"Title": format!("{query} S01"), "Link": "http://jackett/dl/1", "Seeders": 4, "Peers": 2}
        ]}))
        .into_response(),
        None => Json(json!({"Results": []})).into_response(),
    }
}

fn indexer() -> Router {
    Router::new()
        .route("/api/v1/search", get(prowlarr_search))
        .route(
            "/api/v1/system/status",
            get(|headers: HeaderMap| async move {
                match headers.get("X-Api-Key").and_then(|v| v.to_str().ok()) {
                    Some(KEY) => (StatusCode::OK, r#"{"version":"1.0"}"#),
                    _ => (StatusCode::UNAUTHORIZED, "bad key"),
                }
            }),
        )
        .route("/api/v2.0/indexers/all/results", get(jackett_results))
}

fn service(host: &str, key: &str, enabled: bool) -> MediaSearchService {
    let settings = Arc::new(SettingsStore::default());
    settings.set_prowlarr(ProwlarrSettings {
        enable_prowlarr: enabled,
        prowlarr_host: format!("{host}/"),
        prowlarr_api_key: key.to_string(),
    });
    settings.set_jackett(JackettSettings {
        enable_jackett: enabled,
        jackett_host: host.to_string(),
        jackett_api_key: key.to_string(),
    });
    let transport =
        HttpTransport::new(NetworkConfig::default(), &ProxySettings::default()).unwrap();
    MediaSearchService::new(Arc::new(transport), settings)
}

#[tokio::test]
async fn test_prowlarr_search() {
    let host = serve(indexer()).await;
    let results = service(&host, KEY, true)
        .search(IndexerKind::Prowlarr, " Big Movie ")
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Big Movie 1080p");
    assert!(results[0].direct_magnet);
    assert_eq!(results[0].size.as_deref(), Some("2.00 KB"));
    assert_eq!(results[1].download_url.as_deref(), Some("http://prowlarr/dl/2"));
}

#[tokio::test]
async fn test_jackett_search() {
    let host = serve(indexer()).await;
    let results = service(&host, KEY, true)
        .search(IndexerKind::Jackett, "Show")
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Show S01");
    assert_eq!(results[0].seeders, Some(4));
    assert_eq!(results[0].leechers, Some(2));
}

#[tokio::test]
async fn test_rejected_key_is_upstream_error() {
    let host = serve(indexer()).await;
    let result = service(&host, "wrong", true)
        .search(IndexerKind::Prowlarr, "x")
        .await;

    match result {
        Err(MediaSearchError::UpstreamStatus { status, body, .. }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad key");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_disabled_or_blank_query_is_user_error() {
    let host = serve(indexer()).await;

    let disabled = service(&host, KEY, false)
        .search(IndexerKind::Jackett, "x")
        .await
        .unwrap_err();
    assert!(matches!(disabled, MediaSearchError::NotConfigured { .. }));
    assert!(disabled.is_user_error());

    let empty = service(&host, KEY, true)
        .search(IndexerKind::Jackett, "   ")
        .await
        .unwrap_err();
    assert!(matches!(empty, MediaSearchError::EmptyQuery));
}

#[tokio::test]
async fn test_connection_checks() {
    let host = serve(indexer()).await;
    let service = service(&host, KEY, false);

    let status = service
        .test_connection(IndexerKind::Prowlarr, &host, KEY)
        .await
        .unwrap();
    assert!(status.contains("version"));

    let jackett = service
        .test_connection(IndexerKind::Jackett, &host, KEY)
        .await
        .unwrap();
    assert!(jackett.contains("Results"));

    assert!(matches!(
        service.test_connection(IndexerKind::Jackett, &host, "bad").await,
        Err(MediaSearchError::UpstreamStatus { status: 401, .. })
    ));
    assert!(matches!(
        service.test_connection(IndexerKind::Prowlarr, "", KEY).await,
        Err(MediaSearchError::NotConfigured { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_indexer_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = service(&host, KEY, true)
        .search(IndexerKind::Prowlarr, "x")
        .await;
    assert!(matches!(result, Err(MediaSearchError::NetworkError { .. })));
}
