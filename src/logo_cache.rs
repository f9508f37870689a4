//! Channel logo cache
//!
//! [`ResourceCache`] maps a logo URL to a file in the cache directory. A file
//! that exists is a hit and is returned without touching the network. A miss
//! is downloaded once into `<key>.part` and renamed into place, so a failed or
//! interrupted download never leaves a usable-looking entry behind.
//!
//! [`LogoLoader`] sits on top and decodes cached bytes into a fixed-size
//! bitmap the first time an entry's logo is requested.

use crate::error::{Error, FetchError, Result};
use crate::models::{Entry, Playlist};
use image::imageops::FilterType;
use image::RgbaImage;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest cache file name derived from a URL
pub const CACHE_KEY_MAX_LEN: usize = 93;
const KEY_FILLER: char = '-';

pub const DEFAULT_CACHE_DIR: &str = "cache";
pub const DEFAULT_LOGO_SIZE: u32 = 80;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:81.0) Gecko/20100101 Firefox/81.0";

/// Cache file name for `url`: ASCII alphanumerics kept, every other byte
/// replaced by `-`, truncated to [`CACHE_KEY_MAX_LEN`].
///
/// Distinct URLs can map to the same key; they then share one cache file.
pub fn cache_key(url: &str) -> Result<String> {
    if url.is_empty() {
        return Err(Error::InvalidArgument("resource url is empty"));
    }

    Ok(url
        .bytes()
        .take(CACHE_KEY_MAX_LEN)
        .map(|b| {
            if b.is_ascii_alphanumeric() {
                b as char
            } else {
                KEY_FILLER
            }
        })
        .collect())
}

/// Download settings
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds
    pub read_timeout_secs: u64,
    pub max_redirects: u32,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            read_timeout_secs: 60,
            max_redirects: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Source of resource bytes for cache misses
pub trait Fetcher {
    /// Stream the body at `url` into `sink`, returning the byte count
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> std::result::Result<u64, FetchError>;
}

/// HTTP(S) fetcher with redirects and a browser user agent
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.read_timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(config.connect_timeout_secs)))
            .max_redirects(config.max_redirects)
            .build()
            .new_agent();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(&FetchConfig::default())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> std::result::Result<u64, FetchError> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => FetchError::Status(code),
                other => FetchError::Request(other.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mut reader = response.into_body().into_reader();
        Ok(std::io::copy(&mut reader, sink)?)
    }
}

#[derive(Debug)]
enum DirState {
    Unchecked,
    Ready,
    Failed(String),
}

/// Fetch-once, persist-locally map from URL to file
pub struct ResourceCache<F: Fetcher = HttpFetcher> {
    dir: PathBuf,
    fetcher: F,
    dir_state: DirState,
}

impl ResourceCache<HttpFetcher> {
    pub fn with_http(dir: impl Into<PathBuf>, config: &FetchConfig) -> Self {
        Self::new(dir, HttpFetcher::new(config))
    }
}

impl<F: Fetcher> ResourceCache<F> {
    pub fn new(dir: impl Into<PathBuf>, fetcher: F) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            dir_state: DirState::Unchecked,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Where the bytes for `url` live (or would live) on disk
    pub fn cache_path(&self, url: &str) -> Result<PathBuf> {
        Ok(self.dir.join(cache_key(url)?))
    }

    pub fn is_cached(&self, url: &str) -> bool {
        self.cache_path(url).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Open the cached bytes for `url`, downloading them first on a miss
    pub fn resolve(&mut self, url: &str) -> Result<File> {
        let path = self.cache_path(url)?;
        self.ensure_dir()?;

        if path.exists() {
            match File::open(&path) {
                Ok(file) => {
                    debug!("Cache hit for '{}'", url);
                    return Ok(file);
                }
                Err(e) => warn!(
                    "Failed to open cached file '{}': {}, downloading again",
                    path.display(),
                    e
                ),
            }
        }

        self.download(url, &path)?;
        Ok(File::open(&path)?)
    }

    fn download(&self, url: &str, path: &Path) -> Result<()> {
        let mut partial_name = path.as_os_str().to_os_string();
        partial_name.push(".part");
        let partial = PathBuf::from(partial_name);

        let mut file = File::create(&partial)?;
        let fetched = self
            .fetcher
            .fetch(url, &mut file)
            .and_then(|n| file.flush().map(|_| n).map_err(FetchError::from));
        drop(file);

        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(source) => {
                warn!("Failed to download '{}': {}", url, source);
                remove_partial(&partial);
                return Err(Error::Fetch {
                    url: url.to_string(),
                    source,
                });
            }
        };

        if let Err(e) = fs::rename(&partial, path) {
            remove_partial(&partial);
            return Err(e.into());
        }

        info!("Cached '{}' ({} bytes) as '{}'", url, bytes, path.display());
        Ok(())
    }

    /// Create the cache directory on first use. A failure is reported once
    /// and returned for every later call.
    fn ensure_dir(&mut self) -> Result<()> {
        if let DirState::Failed(reason) = &self.dir_state {
            return Err(Error::CacheDirUnavailable {
                path: self.dir.clone(),
                reason: reason.clone(),
            });
        }
        if matches!(self.dir_state, DirState::Ready) {
            return Ok(());
        }

        if !self.dir.is_dir() {
            if let Err(e) = fs::create_dir_all(&self.dir) {
                error!("Cannot create cache directory '{}': {}", self.dir.display(), e);
                self.dir_state = DirState::Failed(e.to_string());
                return Err(Error::CacheDirUnavailable {
                    path: self.dir.clone(),
                    reason: e.to_string(),
                });
            }
            info!("Created cache directory '{}'", self.dir.display());
        }

        self.dir_state = DirState::Ready;
        Ok(())
    }
}

fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial download '{}': {}", path.display(), e);
        }
    }
}

/// Decode image bytes and scale them to a `size` x `size` bitmap
pub fn decode_logo(bytes: &[u8], size: u32) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes)?;
    Ok(image.resize_exact(size, size, FilterType::Triangle).to_rgba8())
}

/// Counts from [`LogoLoader::prefetch`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchReport {
    pub already_cached: usize,
    pub downloaded: usize,
    pub failed: usize,
}

/// Lazily decodes entry logos through a [`ResourceCache`]
pub struct LogoLoader<F: Fetcher = HttpFetcher> {
    cache: ResourceCache<F>,
    size: u32,
}

impl<F: Fetcher> LogoLoader<F> {
    pub fn new(cache: ResourceCache<F>, size: u32) -> Self {
        Self { cache, size }
    }

    pub fn cache(&self) -> &ResourceCache<F> {
        &self.cache
    }

    /// Logo bitmap for `entry`, decoded on first success and kept on the entry.
    ///
    /// Returns `None` when the entry has no logo or the logo cannot be
    /// fetched or decoded; nothing is remembered, so the next call tries again.
    pub fn logo_for<'e>(&mut self, entry: &'e mut Entry) -> Option<&'e RgbaImage> {
        if entry.decoded_logo.is_none() {
            if !entry.has_logo() {
                return None;
            }
            match self.load(entry.logo()) {
                Ok(image) => entry.decoded_logo = Some(image),
                Err(e) => {
                    warn!("No logo for '{}': {}", entry.name(), e);
                    return None;
                }
            }
        }
        entry.decoded_logo.as_ref()
    }

    fn load(&mut self, url: &str) -> Result<RgbaImage> {
        let mut file = self.cache.resolve(url)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        decode_logo(&bytes, self.size)
    }

    /// Download every distinct logo of `playlist` that is not cached yet
    pub fn prefetch(&mut self, playlist: &Playlist) -> PrefetchReport {
        let mut report = PrefetchReport::default();
        let mut seen = HashSet::new();

        for (_, entry) in playlist.entries() {
            let url = entry.logo();
            if url.is_empty() || !seen.insert(url) {
                continue;
            }
            if self.cache.is_cached(url) {
                report.already_cached += 1;
                continue;
            }
            match self.cache.resolve(url) {
                Ok(_) => report.downloaded += 1,
                Err(_) => report.failed += 1,
            }
        }

        info!(
            "Logo prefetch: {} cached, {} downloaded, {} failed",
            report.already_cached, report.downloaded, report.failed
        );
        report
    }
}
