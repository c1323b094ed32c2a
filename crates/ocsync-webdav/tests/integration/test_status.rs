//! Server status check against a mock server

use ocsync_core::{domain::ResultCode, ports::IServerInfo};
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_supported_server() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("GET"))
        .and(path("/status.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "installed": true,
            "maintenance": false,
            "version": "10.11.0.6",
            "versionstring": "10.11.0",
            "edition": "Community"
        })))
        .mount(&server)
        .await;

    let status = client.server_status().await.unwrap();
    assert!(status.installed);
    assert!(status.verdict().is_success());
}

#[tokio::test]
async fn test_old_server_is_rejected() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("GET"))
        .and(path("/status.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "installed": true,
            "version": "3.0.3",
            "versionstring": "3.0.3"
        })))
        .mount(&server)
        .await;

    let status = client.server_status().await.unwrap();
    assert_eq!(status.verdict().code(), ResultCode::BadOcVersion);
}

#[tokio::test]
async fn test_missing_status_document() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("GET"))
        .and(path("/status.php"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client.server_status().await.unwrap_err();
    assert_eq!(result.code(), ResultCode::FileNotFound);
}
