use crate::keys::{KeyId, KeyKind};
use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

pub type KeysetResult<T> = Result<T, KeysetError>;

#[derive(Error, Debug)]
pub enum KeysetError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing key file {path}")]
    MissingKey { path: PathBuf },
    #[error("corrupted key file {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },
    #[error("contract violation: {0}")]
    ContractViolation(String),
    #[error("unknown {kind} key with id {id}")]
    UnknownKey { kind: KeyKind, id: KeyId },
    #[error("failed to fetch {kind} key {id}: {source}")]
    Transport {
        kind: KeyKind,
        id: KeyId,
        #[source]
        source: anyhow::Error,
    },
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl KeysetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KeysetError::Io {
            path: path.into(),
            source,
        }
    }
}

#[track_caller]
pub(crate) fn contract_violation_and_log<S: AsRef<str> + fmt::Display>(msg: S) -> KeysetError {
    tracing::error!("Error in {}: {}", Location::caller(), msg);
    KeysetError::ContractViolation(msg.to_string())
}

#[track_caller]
pub(crate) fn anyhow_error_and_log<S: AsRef<str> + fmt::Display>(msg: S) -> anyhow::Error {
    tracing::error!("Error in {}: {}", Location::caller(), msg);
    anyhow::anyhow!("Error in {}: {}", Location::caller(), msg)
}
