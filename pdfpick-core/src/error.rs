use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentOpenError {
    #[error("no such document: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("{} is password protected", .0.display())]
    PasswordProtected(PathBuf),
}

#[derive(Debug, Error)]
pub enum ExtractionWriteError {
    #[error("permission denied writing {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("no space left writing {}", .0.display())]
    DiskFull(PathBuf),
    #[error("invalid output path {}", .0.display())]
    PathInvalid(PathBuf),
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExtractionWriteError {
    pub fn classify(path: PathBuf, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                Self::PermissionDenied(path)
            }
            io::ErrorKind::StorageFull => Self::DiskFull(path),
            io::ErrorKind::NotFound
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::IsADirectory => Self::PathInvalid(path),
            _ => Self::Io { path, source: err },
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to fetch image bytes: {0:#}")]
    Source(anyhow::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Write(#[from] ExtractionWriteError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
