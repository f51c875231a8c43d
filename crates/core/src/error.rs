//! Error taxonomy for Service Control Manager operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Win32 status codes the taxonomy knows how to classify
pub mod codes {
    pub const ERROR_FILE_NOT_FOUND: u32 = 2;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_BAD_NETPATH: u32 = 53;
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    pub const ERROR_INVALID_NAME: u32 = 123;
    pub const ERROR_MORE_DATA: u32 = 234;
    pub const ERROR_SERVICE_DOES_NOT_EXIST: u32 = 1060;
    pub const ERROR_SERVICE_MARKED_FOR_DELETE: u32 = 1072;
    pub const ERROR_NO_SUCH_DOMAIN: u32 = 1355;
    pub const ERROR_NO_NET_OR_BAD_PATH: u32 = 1203;
    pub const ERROR_LOGON_FAILURE: u32 = 1326;
    pub const RPC_S_UNKNOWN_IF: u32 = 1717;
    pub const RPC_S_SERVER_UNAVAILABLE: u32 = 1722;
    pub const ERROR_RESOURCE_DATA_NOT_FOUND: u32 = 1812;
    pub const ERROR_RESOURCE_TYPE_NOT_FOUND: u32 = 1813;
    pub const ERROR_RESOURCE_NAME_NOT_FOUND: u32 = 1814;
    pub const ERROR_MUI_FILE_NOT_FOUND: u32 = 15100;

    /// Codes a description query returns when the text lives in a resource
    /// that cannot be loaded. The service itself is fine.
    pub fn is_description_unavailable(code: u32) -> bool {
        matches!(
            code,
            ERROR_FILE_NOT_FOUND
                | ERROR_RESOURCE_DATA_NOT_FOUND
                | ERROR_RESOURCE_TYPE_NOT_FOUND
                | ERROR_RESOURCE_NAME_NOT_FOUND
                | ERROR_MUI_FILE_NOT_FOUND
        )
    }
}

/// Stable classification of a failure, independent of its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    ServiceNotFound,
    AccessDenied,
    HostUnreachable,
    BufferNegotiationFailed,
    WorkerFailed,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "InvalidArgument"),
            ErrorKind::ServiceNotFound => write!(f, "ServiceNotFound"),
            ErrorKind::AccessDenied => write!(f, "AccessDenied"),
            ErrorKind::HostUnreachable => write!(f, "HostUnreachable"),
            ErrorKind::BufferNegotiationFailed => write!(f, "BufferNegotiationFailed"),
            ErrorKind::WorkerFailed => write!(f, "WorkerFailed"),
            ErrorKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Errors raised by the SCM core and its backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScmError {
    /// Caller supplied an argument of the wrong type or shape
    #[error("{0}")]
    InvalidArgument(String),

    /// The service name does not resolve in the target manager
    #[error("{api}: service {name:?} not found")]
    ServiceNotFound { api: &'static str, name: String },

    /// Insufficient rights to open or query
    #[error("{api}: access denied")]
    AccessDenied { api: &'static str },

    /// The remote host identifier cannot be contacted
    #[error("{api}: host {host:?} is unreachable (code {code})")]
    HostUnreachable {
        api: &'static str,
        host: String,
        code: u32,
    },

    /// The query-then-allocate protocol did not converge
    #[error("{api}: buffer negotiation failed: {reason}")]
    BufferNegotiationFailed { api: &'static str, reason: String },

    /// The worker pool could not run the operation to completion
    #[error("worker failed: {0}")]
    WorkerFailed(String),

    /// Native status code with no taxonomy entry
    #[error("{api} failed with code {code}")]
    Unknown { api: &'static str, code: u32 },
}

impl ScmError {
    /// Classify a native status code returned by `api`.
    ///
    /// `target` is the service name for per-service calls and the host
    /// identifier for manager-level calls; it only feeds the message.
    pub fn from_win32(api: &'static str, code: u32, target: &str) -> Self {
        use codes::*;

        match code {
            ERROR_ACCESS_DENIED => ScmError::AccessDenied { api },
            ERROR_SERVICE_DOES_NOT_EXIST | ERROR_INVALID_NAME | ERROR_SERVICE_MARKED_FOR_DELETE => {
                ScmError::ServiceNotFound {
                    api,
                    name: target.to_string(),
                }
            }
            RPC_S_SERVER_UNAVAILABLE
            | RPC_S_UNKNOWN_IF
            | ERROR_BAD_NETPATH
            | ERROR_NO_NET_OR_BAD_PATH
            | ERROR_LOGON_FAILURE
            | ERROR_NO_SUCH_DOMAIN => ScmError::HostUnreachable {
                api,
                host: target.to_string(),
                code,
            },
            _ => ScmError::Unknown { api, code },
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ScmError::InvalidArgument(message.into())
    }

    /// The taxonomy entry of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScmError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ScmError::ServiceNotFound { .. } => ErrorKind::ServiceNotFound,
            ScmError::AccessDenied { .. } => ErrorKind::AccessDenied,
            ScmError::HostUnreachable { .. } => ErrorKind::HostUnreachable,
            ScmError::BufferNegotiationFailed { .. } => ErrorKind::BufferNegotiationFailed,
            ScmError::WorkerFailed(_) => ErrorKind::WorkerFailed,
            ScmError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Raw native code, when the error came from one
    pub fn code(&self) -> Option<u32> {
        match self {
            ScmError::AccessDenied { .. } => Some(codes::ERROR_ACCESS_DENIED),
            ScmError::HostUnreachable { code, .. } | ScmError::Unknown { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this is an access denied error
    pub fn is_access_denied(&self) -> bool {
        matches!(self, ScmError::AccessDenied { .. })
    }

    /// Check if the service could not be resolved
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScmError::ServiceNotFound { .. })
    }
}

/// Serializable view of an error for JSON output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
}

impl From<&ScmError> for ErrorReport {
    fn from(err: &ScmError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            code: err.code(),
        }
    }
}

/// Result type for SCM operations
pub type ScmResult<T> = Result<T, ScmError>;
