//! Translation of reqwest errors into transport failures
//!
//! reqwest (through hyper and rustls) reports most connection problems as
//! opaque error chains. This module inspects the error flags, the I/O error
//! kinds found in the source chain, and as a last resort the rendered
//! message, and produces one [`TransportFailure`].

use std::error::Error as StdError;
use std::io;

use ocsync_core::domain::{OperationResult, TransportFailure};

/// Message fragments that identify a DNS resolution failure
const DNS_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "no such host",
    "nodename nor servname",
];

/// Message fragments that identify a certificate the user could choose to trust
const UNTRUSTED_CERT_MARKERS: &[&str] = &[
    "invalid peer certificate",
    "unknownissuer",
    "unknown issuer",
    "self signed",
    "self-signed",
    "certificate has expired",
    "certexpired",
    "notvalidforname",
];

/// Message fragments that identify any other TLS failure
const TLS_MARKERS: &[&str] = &["tls", "ssl", "handshake", "certificate"];

/// Message fragments that identify a missing network
const NO_NETWORK_MARKERS: &[&str] = &["network is unreachable", "network unreachable"];

/// Normalizes a reqwest error
pub fn transport_failure(err: &reqwest::Error) -> TransportFailure {
    if err.is_builder() {
        return TransportFailure::MalformedUrl;
    }

    if err.is_timeout() {
        return if err.is_connect() {
            TransportFailure::ConnectTimeout
        } else {
            TransportFailure::Timeout
        };
    }

    let message = error_chain_text(err).to_lowercase();

    if DNS_MARKERS.iter().any(|m| message.contains(m)) {
        return TransportFailure::UnresolvedHost;
    }

    if NO_NETWORK_MARKERS.iter().any(|m| message.contains(m)) {
        return TransportFailure::NoNetwork;
    }

    if UNTRUSTED_CERT_MARKERS.iter().any(|m| message.contains(m)) {
        return TransportFailure::Tls {
            recoverable: true,
            certificate_chain: Some(error_chain_text(err)),
        };
    }

    if err.is_connect() && TLS_MARKERS.iter().any(|m| message.contains(m)) {
        return TransportFailure::Tls {
            recoverable: false,
            certificate_chain: None,
        };
    }

    if let Some(kind) = io_error_kind(err) {
        match kind {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => return TransportFailure::ConnectionReset,
            io::ErrorKind::TimedOut => return TransportFailure::Timeout,
            io::ErrorKind::UnexpectedEof => return TransportFailure::ProtocolViolation,
            _ => return TransportFailure::Io,
        }
    }

    if err.is_connect() {
        return TransportFailure::ConnectionReset;
    }

    if err.is_decode() {
        return TransportFailure::MalformedResponse;
    }

    if err.is_body() || err.is_request() {
        return TransportFailure::Io;
    }

    TransportFailure::Other
}

/// Classified result for a reqwest error, keeping the error text as cause
pub fn failure_result(err: &reqwest::Error, secure: bool) -> OperationResult {
    OperationResult::from_failure(transport_failure(err), error_chain_text(err)).with_secure(secure)
}

/// First I/O error kind found in the source chain
fn io_error_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = current.source();
    }
    None
}

/// Renders an error and all its sources as `outer: inner: innermost`
fn error_chain_text(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(current) = source {
        text.push_str(": ");
        text.push_str(&current.to_string());
        source = current.source();
    }
    text
}
