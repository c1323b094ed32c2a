//! Folder listings over WebDAV
//!
//! A listing is a `PROPFIND` with `Depth: 1` against the folder URL. The
//! server answers `207 Multi-Status` with one `<d:response>` for the folder
//! itself followed by one per immediate child.

use chrono::{DateTime, Utc};
use ocsync_core::{
    domain::{
        remote_file::DIRECTORY_MIME_TYPE, FileKind, OperationResult, RawOutcome, RemotePath,
        TransportFailure,
    },
    ports::{FolderListing, IRemoteFolderLister, RemoteEntry},
};
use quick_xml::{events::Event, Reader};
use reqwest::{header::CONTENT_TYPE, Method, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{client::WebdavClient, failure::failure_result};

/// Properties requested for every entry
const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
    <d:getcontenttype/>
    <d:getetag/>
  </d:prop>
</d:propfind>"#;

/// Errors in a multistatus body
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("XML error: {0}")]
    Xml(String),
    #[error("response without href")]
    MissingHref,
    #[error("href outside the WebDAV root: {0}")]
    ForeignHref(String),
    #[error("invalid path in href {href}: {reason}")]
    InvalidPath { href: String, reason: String },
    #[error("multistatus contains no responses")]
    Empty,
}

// ============================================================================
// Multistatus parsing
// ============================================================================

/// Property whose text content is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Href,
    ContentLength,
    LastModified,
    ContentType,
    Etag,
}

#[derive(Debug, Default)]
struct PendingEntry {
    href: Option<String>,
    collection: bool,
    content_length: Option<u64>,
    last_modified: Option<DateTime<Utc>>,
    content_type: Option<String>,
    etag: Option<String>,
}

impl PendingEntry {
    fn set(&mut self, field: Field, text: String) {
        match field {
            Field::Href => self.href = Some(text),
            Field::ContentLength => self.content_length = text.parse().ok(),
            Field::LastModified => self.last_modified = parse_http_date(&text),
            Field::ContentType => self.content_type = Some(text),
            Field::Etag => self.etag = Some(text.trim_matches('"').to_string()),
        }
    }

    fn finish(self, webdav_prefix: &str) -> Result<RemoteEntry, ParseError> {
        let href = self.href.ok_or(ParseError::MissingHref)?;
        let remote_path = href_to_path(&href, webdav_prefix)?;
        let kind = if self.collection {
            FileKind::Directory
        } else {
            FileKind::File
        };
        Ok(RemoteEntry {
            remote_path,
            kind,
            size: match kind {
                FileKind::Directory => 0,
                FileKind::File => self.content_length.unwrap_or(0),
            },
            modified: self.last_modified,
            mime_type: match kind {
                FileKind::Directory => Some(DIRECTORY_MIME_TYPE.to_string()),
                FileKind::File => self.content_type,
            },
            etag: self.etag,
        })
    }
}

/// Parses a multistatus body into entries, in document order
///
/// # Arguments
/// * `xml` - Response body
/// * `webdav_prefix` - URL path of the WebDAV root; stripped from every href
pub fn parse_multistatus(xml: &str, webdav_prefix: &str) -> Result<Vec<RemoteEntry>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut pending: Option<PendingEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"response" => pending = Some(PendingEntry::default()),
                b"href" => field = Some(Field::Href),
                b"getcontentlength" => field = Some(Field::ContentLength),
                b"getlastmodified" => field = Some(Field::LastModified),
                b"getcontenttype" => field = Some(Field::ContentType),
                b"getetag" => field = Some(Field::Etag),
                b"collection" => {
                    if let Some(entry) = pending.as_mut() {
                        entry.collection = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"collection" {
                    if let Some(entry) = pending.as_mut() {
                        entry.collection = true;
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(current), Some(entry)) = (field, pending.as_mut()) {
                    let text = e
                        .unescape()
                        .map_err(|err| ParseError::Xml(err.to_string()))?;
                    entry.set(current, text.trim().to_string());
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"response" {
                    if let Some(entry) = pending.take() {
                        entries.push(entry.finish(webdav_prefix)?);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ParseError::Xml(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if entries.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(entries)
}

/// Turns an href (absolute URL or absolute path) into a remote path
fn href_to_path(href: &str, webdav_prefix: &str) -> Result<RemotePath, ParseError> {
    let url_path = if href.starts_with("http://") || href.starts_with("https://") {
        url::Url::parse(href)
            .map(|u| u.path().to_string())
            .map_err(|e| ParseError::InvalidPath {
                href: href.to_string(),
                reason: e.to_string(),
            })?
    } else {
        href.to_string()
    };

    let decoded = urlencoding::decode(&url_path).map_err(|e| ParseError::InvalidPath {
        href: href.to_string(),
        reason: e.to_string(),
    })?;

    let relative = decoded
        .strip_prefix(webdav_prefix)
        .ok_or_else(|| ParseError::ForeignHref(href.to_string()))?;
    let relative = if relative.is_empty() { "/" } else { relative };

    RemotePath::new(relative.to_string()).map_err(|e| ParseError::InvalidPath {
        href: href.to_string(),
        reason: e.to_string(),
    })
}

/// Parses an RFC 1123 date as sent in `getlastmodified`
fn parse_http_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Splits parsed entries into the folder itself and its children
fn into_listing(
    requested: &RemotePath,
    mut entries: Vec<RemoteEntry>,
) -> Result<FolderListing, ParseError> {
    if entries.is_empty() {
        return Err(ParseError::Empty);
    }
    let position = entries
        .iter()
        .position(|e| &e.remote_path == requested)
        .unwrap_or(0);
    let folder = entries.remove(position);
    Ok(FolderListing {
        folder,
        children: entries,
    })
}

// ============================================================================
// IRemoteFolderLister for WebdavClient
// ============================================================================

#[async_trait::async_trait]
impl IRemoteFolderLister for WebdavClient {
    #[tracing::instrument(skip(self), fields(path = %path))]
    async fn list_folder(&self, path: &RemotePath) -> Result<FolderListing, OperationResult> {
        let secure = self.is_secure();
        let url = self.resource_url(path);
        let method = Method::from_bytes(b"PROPFIND").map_err(|e| {
            OperationResult::from_failure(TransportFailure::Other, e.to_string())
        })?;

        debug!(url = %url, "PROPFIND");

        let response = self
            .request(method, &url)
            .header("Depth", "1")
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
            .send()
            .await
            .map_err(|e| failure_result(&e, secure))?;

        let status = response.status();
        // The body is always drained so the connection can be reused.
        let body = response
            .text()
            .await
            .map_err(|e| failure_result(&e, secure))?;

        if status != StatusCode::MULTI_STATUS {
            let result = OperationResult::from_outcome(
                RawOutcome::Response {
                    success: false,
                    status: status.as_u16(),
                },
                secure,
            );
            warn!(status = status.as_u16(), "{}", result.log_message());
            return Err(result);
        }

        let listing = parse_multistatus(&body, self.webdav_prefix())
            .and_then(|entries| into_listing(path, entries))
            .map_err(|e| {
                warn!(error = %e, "Unparsable PROPFIND response");
                OperationResult::from_failure(TransportFailure::MalformedResponse, e.to_string())
                    .with_secure(secure)
            })?;

        debug!(children = listing.children.len(), "Listed folder");
        Ok(listing)
    }
}
