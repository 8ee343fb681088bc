use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("mailbox transport failed: {0}")]
    Transport(String),
    #[error("failed to write archived message {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to append `{identifier}` to ledger {path}: {source}")]
    LedgerWrite {
        identifier: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to link {destination}: {source}")]
    Link {
        destination: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no free file name for `{base}` after {attempts} attempts")]
    NamesExhausted { base: String, attempts: usize },
    #[error("identifier cannot be stored in the ledger: {0:?}")]
    InvalidIdentifier(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("another archiver holds {0}")]
    Locked(PathBuf),
}

impl ShelfError {
    pub fn code(&self) -> ShelfErrorCode {
        match self {
            Self::Transport(_) => ShelfErrorCode::E001Transport,
            Self::StorageWrite { .. } => ShelfErrorCode::E002StorageWrite,
            Self::LedgerWrite { .. } => ShelfErrorCode::E003LedgerWrite,
            Self::Link { .. } => ShelfErrorCode::E004Link,
            Self::NamesExhausted { .. } => ShelfErrorCode::E005NamesExhausted,
            Self::InvalidIdentifier(_) => ShelfErrorCode::E006InvalidIdentifier,
            Self::InvalidConfig(_) => ShelfErrorCode::E007ConfigInvalid,
            Self::Locked(_) => ShelfErrorCode::E008Locked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfErrorCode {
    E001Transport,
    E002StorageWrite,
    E003LedgerWrite,
    E004Link,
    E005NamesExhausted,
    E006InvalidIdentifier,
    E007ConfigInvalid,
    E008Locked,
}

impl ShelfErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Transport => "E001_TRANSPORT",
            Self::E002StorageWrite => "E002_STORAGE_WRITE",
            Self::E003LedgerWrite => "E003_LEDGER_WRITE",
            Self::E004Link => "E004_LINK",
            Self::E005NamesExhausted => "E005_NAMES_EXHAUSTED",
            Self::E006InvalidIdentifier => "E006_INVALID_IDENTIFIER",
            Self::E007ConfigInvalid => "E007_CONFIG_INVALID",
            Self::E008Locked => "E008_LOCKED",
        }
    }
}
