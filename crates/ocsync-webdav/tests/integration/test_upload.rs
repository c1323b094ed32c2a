//! Chunked uploads against a mock server

use std::{io::Write, sync::Arc, time::Duration};

use ocsync_core::domain::{ChunkPlan, ResultCode};
use ocsync_webdav::{client::WebdavClient, ChunkedUploader};
use tempfile::NamedTempFile;
use wiremock::{
    matchers::{header, method, path, path_regex},
    Mock, ResponseTemplate,
};

use crate::common::{self, remote, RecordingListener};

fn source_file(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_chunks_cover_the_whole_file() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/remote\.php/webdav/Docs/report\.pdf-chunking-4321-3-\d$"))
        .and(header("OC-Chunked", "OC-Chunked"))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&server)
        .await;

    let content: Vec<u8> = (0..25u8).collect();
    let file = source_file(&content);
    let plan = ChunkPlan::with_token(25, 10, 4321).unwrap();

    let result = ChunkedUploader::new(client)
        .with_chunk_size(10)
        .upload_with_plan(file.path(), &remote("/Docs/report.pdf"), &plan)
        .await
        .unwrap();
    assert_eq!(result.code(), ResultCode::Ok);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let mut sent = Vec::new();
    for (index, request) in requests.iter().enumerate() {
        assert!(request
            .url
            .path()
            .ends_with(&format!("-chunking-4321-3-{index}")));
        sent.extend_from_slice(&request.body);
    }
    assert_eq!(requests[0].body.len(), 10);
    assert_eq!(requests[2].body.len(), 5);
    assert_eq!(sent, content);
}

#[tokio::test]
async fn test_failing_chunk_stops_the_upload() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"-chunking-\d{4}-4-1$"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"-chunking-\d{4}-4-0$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"-chunking-\d{4}-4-[23]$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let file = source_file(&[7u8; 40]);
    let result = ChunkedUploader::new(client)
        .with_chunk_size(10)
        .upload(file.path(), &remote("/big.bin"))
        .await
        .unwrap();

    assert_eq!(result.code(), ResultCode::InstanceNotConfigured);
    assert_eq!(result.http_status(), Some(500));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_not_found_chunk() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let file = source_file(b"payload");
    let result = ChunkedUploader::new(client)
        .upload(file.path(), &remote("/Missing/dir/file.txt"))
        .await
        .unwrap();
    assert_eq!(result.code(), ResultCode::FileNotFound);
}

#[tokio::test]
async fn test_empty_file_sends_one_request() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/remote\.php/webdav/empty\.txt-chunking-\d{4}-1-0$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let file = source_file(b"");
    let result = ChunkedUploader::new(client)
        .upload(file.path(), &remote("/empty.txt"))
        .await
        .unwrap();

    assert!(result.is_success());
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].body.is_empty());
}

#[tokio::test]
async fn test_progress_is_monotonic_and_complete() {
    let (server, client) = common::setup_server().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let content = vec![1u8; 10_000];
    let file = source_file(&content);
    let listener = Arc::new(RecordingListener::default());

    let mut uploader = ChunkedUploader::new(client).with_chunk_size(3_000);
    uploader.add_progress_listener(listener.clone());
    let result = uploader
        .upload(file.path(), &remote("/photos/cat.jpg"))
        .await
        .unwrap();
    assert!(result.is_success());

    let events = listener.events.lock().unwrap();
    assert!(!events.is_empty());
    let mut previous = 0;
    let mut summed = 0;
    for (rate, so_far, total, name) in events.iter() {
        assert!(*so_far >= previous);
        assert_eq!(*total, 10_000);
        assert_eq!(name, "cat.jpg");
        summed += rate;
        previous = *so_far;
    }
    assert_eq!(previous, 10_000);
    assert_eq!(summed, 10_000);
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = wiremock::MockServer::start().await;
    let client = WebdavClient::with_timeouts(
        &server.uri(),
        common::WEBDAV_PATH,
        Duration::from_secs(5),
        Duration::from_millis(200),
    )
    .unwrap();

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let file = source_file(b"slow");
    let result = ChunkedUploader::new(client)
        .upload(file.path(), &remote("/slow.txt"))
        .await
        .unwrap();
    assert_eq!(result.code(), ResultCode::Timeout);
}
