//! M3U Viewer core
//!
//! Playlist model and parser for IPTV channel lists, plus the on-disk logo
//! cache the presentation layer uses to show channel logos.

pub mod config;
pub mod error;
pub mod logo_cache;
pub mod m3u_parser;
pub mod models;


pub use config::ViewerConfig;
pub use error::{Error, FetchError, Result};
pub use logo_cache::{cache_key, Fetcher, HttpFetcher, LogoLoader, ResourceCache};
pub use m3u_parser::{parse_playlist, read_playlist, GroupFallback, ParseOptions, ParseOutcome};
pub use models::{Entry, Group, Playlist};
