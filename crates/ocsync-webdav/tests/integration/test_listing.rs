//! Folder listing against a mock server

use ocsync_core::{
    domain::{FileKind, ResultCode, TransportFailure},
    ports::IRemoteFolderLister,
};
use wiremock::{
    matchers::{header_exists, method, path},
    Mock, ResponseTemplate,
};

use crate::common::{self, dav_response, multistatus, remote};

#[tokio::test]
async fn test_list_folder_returns_folder_and_children() {
    let (server, client) = common::setup_server().await;

    let body = multistatus(&[
        dav_response("/Documents/", true, 0),
        dav_response("/Documents/Reports/", true, 0),
        dav_response("/Documents/notes%20v2.txt", false, 42),
    ]);
    common::mount_listing(&server, "/Documents", body).await;

    let listing = client.list_folder(&remote("/Documents")).await.unwrap();

    assert_eq!(listing.folder.remote_path, remote("/Documents"));
    assert!(listing.folder.is_directory());
    assert_eq!(listing.children.len(), 2);

    let reports = &listing.children[0];
    assert_eq!(reports.remote_path, remote("/Documents/Reports"));
    assert_eq!(reports.kind, FileKind::Directory);

    let notes = &listing.children[1];
    assert_eq!(notes.remote_path, remote("/Documents/notes v2.txt"));
    assert_eq!(notes.size, 42);
    assert_eq!(notes.etag.as_deref(), Some("etag-42"));
    assert!(notes.modified.is_some());
}

#[tokio::test]
async fn test_list_root() {
    let (server, client) = common::setup_server().await;

    let body = multistatus(&[dav_response("/", true, 0), dav_response("/a.txt", false, 1)]);
    common::mount_listing(&server, "/", body).await;

    let listing = client
        .list_folder(&ocsync_core::domain::RemotePath::root())
        .await
        .unwrap();
    assert!(listing.folder.remote_path.is_root());
    assert_eq!(listing.children[0].remote_path, remote("/a.txt"));
}

#[tokio::test]
async fn test_listing_sends_basic_auth() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/webdav/Secure"))
        .and(header_exists("Authorization"))
        .respond_with(
            ResponseTemplate::new(207)
                .set_body_string(multistatus(&[dav_response("/Secure/", true, 0)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.list_folder(&remote("/Secure")).await.is_ok());
}

#[tokio::test]
async fn test_listing_status_codes_are_classified() {
    let (server, client) = common::setup_server().await;

    for (folder, status) in [("/Gone", 404), ("/Broken", 500), ("/Locked", 401)] {
        Mock::given(method("PROPFIND"))
            .and(path(format!("/remote.php/webdav{folder}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let gone = client.list_folder(&remote("/Gone")).await.unwrap_err();
    assert_eq!(gone.code(), ResultCode::FileNotFound);

    let broken = client.list_folder(&remote("/Broken")).await.unwrap_err();
    assert_eq!(broken.code(), ResultCode::InstanceNotConfigured);
    assert!(broken.is_finisher());

    let locked = client.list_folder(&remote("/Locked")).await.unwrap_err();
    assert_eq!(locked.code(), ResultCode::UnhandledHttpCode);
    assert!(locked.is_auth_failure());
}

#[tokio::test]
async fn test_plain_ok_is_not_a_listing() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/webdav/Odd"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html/>"))
        .mount(&server)
        .await;

    let result = client.list_folder(&remote("/Odd")).await.unwrap_err();
    assert_eq!(result.code(), ResultCode::UnhandledHttpCode);
    assert_eq!(result.http_status(), Some(200));
}

#[tokio::test]
async fn test_malformed_multistatus() {
    let (server, client) = common::setup_server().await;

    common::mount_listing(&server, "/Bad", "<d:multistatus><d:response>".to_string()).await;

    let result = client.list_folder(&remote("/Bad")).await.unwrap_err();
    assert_eq!(
        result.transport_failure(),
        Some(&TransportFailure::MalformedResponse)
    );
    assert!(!result.is_success());
}
