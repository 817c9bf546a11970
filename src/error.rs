//! Error types for the cloud and zeroconf layers
//!
//! Nothing here is raised past a command boundary. Every failure becomes an
//! [`ErrorBody`], which serializes to the result objects the CLI prints:
//! `{"error": "..."}` or `{"msg": "...", "error": 406}`.

use std::io;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Errors produced by cache persistence, ARP discovery and the cloud client
#[derive(Debug, Error)]
pub enum ZeroconfError {
    #[error("{errno}: {description}, {op} '{path}'")]
    Filesystem {
        errno: &'static str,
        description: String,
        op: &'static str,
        path: String,
    },

    #[error("{msg}")]
    Cloud { code: u16, msg: String },

    #[error("range must not be empty")]
    EmptyRange,

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Lookup(String),

    #[error("arp table unavailable: {0}")]
    Arp(String),

    #[error("{0}")]
    Transport(String),
}

impl ZeroconfError {
    /// Wrap an I/O failure with the errno-style message callers match on
    pub fn filesystem(op: &'static str, path: &Path, err: &io::Error) -> Self {
        let (errno, description) = errno_parts(err);
        Self::Filesystem {
            errno,
            description,
            op,
            path: path.display().to_string(),
        }
    }

    /// Build a cloud error, preferring the fixed table over the server text
    pub fn cloud(code: u16, server_msg: Option<&str>) -> Self {
        let msg = error_message(code)
            .map(str::to_string)
            .or_else(|| server_msg.filter(|m| !m.is_empty()).map(str::to_string))
            .unwrap_or_else(|| "Unknown error".to_string());
        Self::Cloud { code, msg }
    }

    /// The structured result object for this failure
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Cloud { code, msg } => ErrorBody::Coded {
                msg: msg.clone(),
                error: *code,
            },
            other => ErrorBody::Message {
                error: format!("Error: {other}"),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Filesystem { errno: "ENOENT", .. })
    }
}

/// Failure result object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Coded { msg: String, error: u16 },
    Message { error: String },
}

/// Fixed eWeLink error code table
pub fn error_message(code: u16) -> Option<&'static str> {
    let msg = match code {
        400 => "Parameter error",
        401 => "Wrong account or password",
        402 => "Email inactivated",
        403 => "Forbidden",
        404 => "Device does not exist",
        406 => "Authentication failed",
        503 => "Service Temporarily Unavailable or Device is offline",
        _ => return None,
    };
    Some(msg)
}

fn errno_parts(err: &io::Error) -> (&'static str, String) {
    let known = match err.raw_os_error() {
        Some(2) => Some(("ENOENT", "no such file or directory")),
        Some(13) => Some(("EACCES", "permission denied")),
        Some(17) => Some(("EEXIST", "file already exists")),
        Some(20) => Some(("ENOTDIR", "not a directory")),
        Some(21) => Some(("EISDIR", "illegal operation on a directory")),
        Some(28) => Some(("ENOSPC", "no space left on device")),
        Some(30) => Some(("EROFS", "read-only file system")),
        _ => None,
    };
    if let Some((errno, description)) = known {
        return (errno, description.to_string());
    }

    match err.kind() {
        io::ErrorKind::NotFound => ("ENOENT", "no such file or directory".to_string()),
        io::ErrorKind::PermissionDenied => ("EACCES", "permission denied".to_string()),
        io::ErrorKind::AlreadyExists => ("EEXIST", "file already exists".to_string()),
        kind => ("EIO", kind.to_string().to_lowercase()),
    }
}
