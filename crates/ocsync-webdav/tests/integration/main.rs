//! Integration tests for ocsync-webdav
//!
//! Uses wiremock to simulate an ownCloud server and verifies end-to-end
//! behavior of folder listings, the status check and chunked uploads.

mod common;

mod test_listing;
mod test_status;
mod test_upload;
