//! Error types shared by the playlist model, parser and logo cache

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Playlist or cache file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Capacity for a new group or entry could not be reserved
    #[error("out of memory while growing the playlist")]
    OutOfMemory,

    /// A required field was empty
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("failed to fetch '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The cache directory could not be created; remembered for the process lifetime
    #[error("cache directory '{}' unavailable: {reason}", path.display())]
    CacheDirUnavailable { path: PathBuf, reason: String },

    #[error("logo decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Process exit code for this error (OS error code when one is available)
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Io(e) => e.raw_os_error().unwrap_or(1),
            Error::InvalidArgument(_) => EINVAL,
            _ => 1,
        }
    }
}

/// Network-level failure reported by a [`crate::logo_cache::Fetcher`]
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub const EINVAL: i32 = 22;
pub const ENODATA: i32 = 61;
