//! Operation results and the result classifier
//!
//! Every remote operation (folder listing, chunk upload, server status check)
//! ends in an [`OperationResult`]. Adapters normalize whatever went wrong at
//! the transport level into a [`TransportFailure`] and hand it, or the HTTP
//! response they received, to [`classify`] as a [`RawOutcome`]. The
//! classifier is a pure, total function: every input yields exactly one
//! [`ResultCode`].
//!
//! ## Finisher codes
//!
//! A small subset of codes cannot be fixed by trying again during the same
//! session (see [`ResultCode::is_finisher`]). The orchestrator aborts the
//! whole session as soon as one of them shows up.

use serde::{Deserialize, Serialize};

// ============================================================================
// ResultCode
// ============================================================================

/// Closed set of outcomes a remote operation can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    /// Operation succeeded
    Ok,
    /// Operation succeeded over TLS
    OkSsl,
    /// Operation succeeded over plain HTTP
    OkNoSsl,
    /// Server answered with a status the client has no specific handling for
    UnhandledHttpCode,
    /// Server answered 404
    FileNotFound,
    /// Server answered 500, or reports it is not installed
    InstanceNotConfigured,
    /// Malformed response or unexpected local error
    UnknownError,
    /// Connection reset or refused
    WrongConnection,
    /// Connect or read timeout
    Timeout,
    /// The server URL could not be parsed
    IncorrectAddress,
    /// The server host name could not be resolved
    HostNotAvailable,
    /// No network interface is up
    NoNetworkConnection,
    /// TLS handshake failed in a way the user cannot fix by trusting a certificate
    SslError,
    /// The peer certificate could not be verified, but the user may accept it
    SslRecoverablePeerUnverified,
    /// The server version is missing or too old
    BadOcVersion,
}

impl ResultCode {
    /// Returns true for the success family (`Ok`, `OkSsl`, `OkNoSsl`)
    pub fn is_success(&self) -> bool {
        matches!(self, ResultCode::Ok | ResultCode::OkSsl | ResultCode::OkNoSsl)
    }

    /// Returns true if this failure aborts the whole sync session
    ///
    /// Retrying within the same session cannot help for TLS problems, an
    /// unsupported server version, or an uninstalled server.
    pub fn is_finisher(&self) -> bool {
        matches!(
            self,
            ResultCode::SslError
                | ResultCode::SslRecoverablePeerUnverified
                | ResultCode::BadOcVersion
                | ResultCode::InstanceNotConfigured
        )
    }

    /// Stable identifier used in logs and persisted reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Ok => "OK",
            ResultCode::OkSsl => "OK_SSL",
            ResultCode::OkNoSsl => "OK_NO_SSL",
            ResultCode::UnhandledHttpCode => "UNHANDLED_HTTP_CODE",
            ResultCode::FileNotFound => "FILE_NOT_FOUND",
            ResultCode::InstanceNotConfigured => "INSTANCE_NOT_CONFIGURED",
            ResultCode::UnknownError => "UNKNOWN_ERROR",
            ResultCode::WrongConnection => "WRONG_CONNECTION",
            ResultCode::Timeout => "TIMEOUT",
            ResultCode::IncorrectAddress => "INCORRECT_ADDRESS",
            ResultCode::HostNotAvailable => "HOST_NOT_AVAILABLE",
            ResultCode::NoNetworkConnection => "NO_NETWORK_CONNECTION",
            ResultCode::SslError => "SSL_ERROR",
            ResultCode::SslRecoverablePeerUnverified => "SSL_RECOVERABLE_PEER_UNVERIFIED",
            ResultCode::BadOcVersion => "BAD_OC_VERSION",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TransportFailure / RawOutcome
// ============================================================================

/// Transport-level failure, normalized at the adapter boundary
///
/// Adapters translate their HTTP library's error types into this enum so that
/// classification never depends on concrete error type hierarchies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TransportFailure {
    /// Connection reset, refused, or closed mid-exchange
    ConnectionReset,
    /// No response within the read timeout
    Timeout,
    /// Connection could not be established within the connect timeout
    ConnectTimeout,
    /// The request URL is not a valid URL
    MalformedUrl,
    /// DNS resolution failed
    UnresolvedHost,
    /// No network interface available
    NoNetwork,
    /// TLS handshake or certificate failure
    Tls {
        /// The user could resolve this by trusting the presented certificate
        recoverable: bool,
        /// Human-readable certificate chain, kept for the trust prompt
        certificate_chain: Option<String>,
    },
    /// The server broke the HTTP protocol (bad headers, truncated body)
    ProtocolViolation,
    /// Any other I/O error while talking to the server
    Io,
    /// The response arrived but its body could not be parsed
    MalformedResponse,
    /// Anything the adapter could not map to a more specific variant
    Other,
}

impl TransportFailure {
    /// Short description used by [`OperationResult::log_message`]
    pub fn describe(&self) -> &'static str {
        match self {
            TransportFailure::ConnectionReset => "Socket exception",
            TransportFailure::Timeout => "Socket timeout exception",
            TransportFailure::ConnectTimeout => "Connect timeout exception",
            TransportFailure::MalformedUrl => "Malformed URL exception",
            TransportFailure::UnresolvedHost => "Unknown host exception",
            TransportFailure::NoNetwork => "No network connection",
            TransportFailure::Tls {
                recoverable: true, ..
            } => "SSL recoverable exception",
            TransportFailure::Tls { .. } => "SSL exception",
            TransportFailure::ProtocolViolation => "HTTP violation",
            TransportFailure::Io => "Unrecovered transport exception",
            TransportFailure::MalformedResponse | TransportFailure::Other => {
                "Unexpected exception"
            }
        }
    }
}

/// Input to the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    /// The exchange failed before a usable response was obtained
    Transport(TransportFailure),
    /// The server answered
    Response {
        /// Whether the calling operation considers this response a success
        success: bool,
        /// HTTP status code
        status: u16,
    },
}

// ============================================================================
// Classifier
// ============================================================================

/// Map a raw outcome to exactly one [`ResultCode`]
///
/// Total and side-effect free. A response only counts as `Ok` when the
/// operation flagged it successful *and* the status is 2xx; anything else is
/// decided by the status alone.
pub fn classify(outcome: &RawOutcome) -> ResultCode {
    match outcome {
        RawOutcome::Transport(failure) => match failure {
            TransportFailure::ConnectionReset => ResultCode::WrongConnection,
            TransportFailure::Timeout | TransportFailure::ConnectTimeout => ResultCode::Timeout,
            TransportFailure::MalformedUrl => ResultCode::IncorrectAddress,
            TransportFailure::UnresolvedHost => ResultCode::HostNotAvailable,
            TransportFailure::NoNetwork => ResultCode::NoNetworkConnection,
            TransportFailure::Tls {
                recoverable: true, ..
            } => ResultCode::SslRecoverablePeerUnverified,
            TransportFailure::Tls { .. } => ResultCode::SslError,
            TransportFailure::ProtocolViolation
            | TransportFailure::Io
            | TransportFailure::MalformedResponse
            | TransportFailure::Other => ResultCode::UnknownError,
        },
        RawOutcome::Response { success, status } => {
            if *success && (200..300).contains(status) {
                ResultCode::Ok
            } else {
                match status {
                    404 => ResultCode::FileNotFound,
                    500 => ResultCode::InstanceNotConfigured,
                    _ => ResultCode::UnhandledHttpCode,
                }
            }
        }
    }
}

// ============================================================================
// OperationResult
// ============================================================================

/// Outcome of a single remote operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    code: ResultCode,
    http_status: Option<u16>,
    secure: bool,
    transport: Option<TransportFailure>,
    cause: Option<String>,
}

impl OperationResult {
    /// Classify a raw outcome
    ///
    /// # Arguments
    /// * `outcome` - What the adapter observed
    /// * `secure` - Whether the exchange used TLS
    pub fn from_outcome(outcome: RawOutcome, secure: bool) -> Self {
        let code = classify(&outcome);
        match outcome {
            RawOutcome::Transport(failure) => Self {
                code,
                http_status: None,
                secure,
                transport: Some(failure),
                cause: None,
            },
            RawOutcome::Response { status, .. } => Self {
                code,
                http_status: Some(status),
                secure,
                transport: None,
                cause: None,
            },
        }
    }

    /// Result for an HTTP response
    pub fn from_response(success: bool, status: u16) -> Self {
        Self::from_outcome(RawOutcome::Response { success, status }, false)
    }

    /// Result for a transport failure, keeping the original error text
    pub fn from_failure(failure: TransportFailure, cause: impl Into<String>) -> Self {
        Self::from_outcome(RawOutcome::Transport(failure), false).with_cause(cause)
    }

    /// Result carrying a code the classifier never produces on its own
    ///
    /// Used for `BadOcVersion` and `InstanceNotConfigured` from the server
    /// status check.
    pub fn from_code(code: ResultCode) -> Self {
        Self {
            code,
            http_status: None,
            secure: false,
            transport: None,
            cause: None,
        }
    }

    /// Plain successful result
    pub fn ok() -> Self {
        Self::from_code(ResultCode::Ok)
    }

    /// Attach the original failure text (for logging only)
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Record whether the exchange used TLS
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Replace a plain `Ok` with `OkSsl` / `OkNoSsl`
    ///
    /// Display-only refinement; policy decisions treat all three alike.
    pub fn tls_distinguished(mut self) -> Self {
        if self.code == ResultCode::Ok {
            self.code = if self.secure {
                ResultCode::OkSsl
            } else {
                ResultCode::OkNoSsl
            };
        }
        self
    }

    // --- Getters ---

    /// The classified code
    pub fn code(&self) -> ResultCode {
        self.code
    }

    /// True when the code is in the success family
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// True when the code aborts a sync session
    pub fn is_finisher(&self) -> bool {
        self.code.is_finisher()
    }

    /// HTTP status, when the server answered
    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Whether the exchange used TLS
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// The normalized transport failure, if any
    pub fn transport_failure(&self) -> Option<&TransportFailure> {
        self.transport.as_ref()
    }

    /// Certificate chain of a TLS failure, retained for a trust prompt
    pub fn certificate_chain(&self) -> Option<&str> {
        match &self.transport {
            Some(TransportFailure::Tls {
                certificate_chain, ..
            }) => certificate_chain.as_deref(),
            _ => None,
        }
    }

    /// Original error text, if one was captured
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    /// True when the server rejected the credentials
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.http_status, Some(401) | Some(403))
    }

    /// Human-readable summary for logs
    pub fn log_message(&self) -> String {
        if let Some(failure) = &self.transport {
            return failure.describe().to_string();
        }

        match self.code {
            ResultCode::InstanceNotConfigured if self.http_status.is_none() => {
                "The ownCloud server is not configured!".to_string()
            }
            ResultCode::NoNetworkConnection => "No network connection".to_string(),
            ResultCode::BadOcVersion => {
                "No valid ownCloud version was found at the server".to_string()
            }
            _ => match self.http_status {
                Some(status) => format!(
                    "Operation finished with HTTP status code {} ({})",
                    status,
                    if self.is_success() { "success" } else { "fail" }
                ),
                None if self.is_success() => "Operation finished successfully".to_string(),
                None => format!("Operation finished with code {}", self.code),
            },
        }
    }
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.log_message())
    }
}
