//! Shared helpers for WebDAV integration tests
//!
//! Each helper mounts the endpoints a test needs on a wiremock server and
//! returns a client pointing at it.

use std::sync::Mutex;

use ocsync_core::{domain::RemotePath, ports::ITransferProgressListener};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ocsync_webdav::client::WebdavClient;

pub const WEBDAV_PATH: &str = "/remote.php/webdav";

/// Starts a mock server and returns it with an authenticated client
pub async fn setup_server() -> (MockServer, WebdavClient) {
    let server = MockServer::start().await;
    let client = WebdavClient::new(&server.uri(), WEBDAV_PATH)
        .unwrap()
        .with_credentials("alice", "secret");
    (server, client)
}

pub fn remote(p: &str) -> RemotePath {
    RemotePath::new(p.to_string()).unwrap()
}

/// One `<d:response>` element for a multistatus body
pub fn dav_response(href: &str, collection: bool, size: u64) -> String {
    let resourcetype = if collection {
        "<d:resourcetype><d:collection/></d:resourcetype>".to_string()
    } else {
        format!(
            "<d:resourcetype/><d:getcontentlength>{size}</d:getcontentlength>\
             <d:getcontenttype>text/plain</d:getcontenttype>"
        )
    };
    format!(
        "<d:response><d:href>{WEBDAV_PATH}{href}</d:href><d:propstat><d:prop>\
         {resourcetype}<d:getlastmodified>Mon, 02 Sep 2024 12:00:00 GMT</d:getlastmodified>\
         <d:getetag>\"etag-{size}\"</d:getetag></d:prop>\
         <d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>"
    )
}

pub fn multistatus(responses: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\"?><d:multistatus xmlns:d=\"DAV:\">{}</d:multistatus>",
        responses.concat()
    )
}

/// Mounts a PROPFIND answer for one folder path (URL path, already encoded)
pub async fn mount_listing(server: &MockServer, url_path: &str, body: String) {
    Mock::given(method("PROPFIND"))
        .and(path(format!("{WEBDAV_PATH}{url_path}")))
        .and(header("Depth", "1"))
        .respond_with(
            ResponseTemplate::new(207)
                .insert_header("Content-Type", "application/xml; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Records every progress callback
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<(u64, u64, u64, String)>>,
}

impl ITransferProgressListener for RecordingListener {
    fn on_transfer_progress(
        &self,
        progress_rate: u64,
        total_transferred: u64,
        total_to_transfer: u64,
        file_name: &str,
    ) {
        self.events.lock().unwrap().push((
            progress_rate,
            total_transferred,
            total_to_transfer,
            file_name.to_string(),
        ));
    }
}
