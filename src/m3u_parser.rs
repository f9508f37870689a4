//! Streaming M3U playlist parser
//!
//! Reads `#EXTINF` metadata lines and stream URL lines and files each
//! channel into its group. Metadata is sticky: it stays pending after a URL
//! line and applies to every following URL line until the next recognized
//! `#EXTINF` line replaces it.

use crate::error::Result;
use crate::models::Playlist;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, error, info};

const EXTINF_PREFIX: &str = "#EXTINF:-1";
const LOGO_ATTR: &str = "tvg-logo=\"";
const GROUP_ATTR: &str = "group-title=\"";

/// What to do when a metadata line has no `group-title`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GroupFallback {
    /// Keep the group of the previous metadata line
    #[default]
    Previous,
    /// Keep the previous group and also copy it into the logo field
    Legacy,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub group_fallback: GroupFallback,
}

/// Result of a parse: the playlist and how many entries made it in
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub playlist: Playlist,
    pub total_entries: usize,
}

/// Metadata carried from the last recognized `#EXTINF` line
#[derive(Debug, Default)]
struct Pending {
    name: String,
    logo: String,
    group: String,
}

/// Line-at-a-time parser state
#[derive(Debug, Default)]
pub struct M3uParser {
    options: ParseOptions,
    pending: Pending,
    playlist: Playlist,
    total_entries: usize,
}

impl M3uParser {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Feed one raw line (with or without its line terminator)
    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        if line.starts_with('#') {
            self.metadata_line(line);
            return Ok(());
        }

        let url = line.trim_end_matches(['\r', '\n']);
        if url.is_empty() {
            debug!("Skipping blank line");
            return Ok(());
        }

        self.playlist.new_entry(
            &self.pending.group,
            &self.pending.name,
            &self.pending.logo,
            url,
        )?;
        self.total_entries += 1;
        Ok(())
    }

    fn metadata_line(&mut self, line: &str) {
        let Some((args, name)) = match_extinf(line) else {
            debug!("Ignoring comment: {}", line.trim_end());
            return;
        };

        self.pending.name = name.to_string();
        self.pending.logo = extract_attr(args, LOGO_ATTR)
            .unwrap_or_default()
            .to_string();

        match extract_attr(args, GROUP_ATTR) {
            Some(group) => self.pending.group = group.to_string(),
            None => {
                if self.options.group_fallback == GroupFallback::Legacy {
                    self.pending.logo = self.pending.group.clone();
                }
            }
        }
    }

    pub fn finish(self) -> ParseOutcome {
        ParseOutcome {
            playlist: self.playlist,
            total_entries: self.total_entries,
        }
    }
}

/// Parse a playlist from any line source.
///
/// Invalid UTF-8 is replaced rather than rejected. Read errors abort with
/// `Error::Io`; allocation failure aborts with `Error::OutOfMemory`.
pub fn parse_playlist<R: BufRead>(mut reader: R, options: ParseOptions) -> Result<ParseOutcome> {
    let mut parser = M3uParser::new(options);
    let mut buf = Vec::with_capacity(512);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        if let Err(e) = parser.feed_line(&line) {
            error!(
                "Parsing aborted after {} entries: {}",
                parser.total_entries, e
            );
            return Err(e);
        }
    }

    Ok(parser.finish())
}

/// Parse in-memory M3U content
pub fn parse_m3u(content: &str, options: ParseOptions) -> Result<ParseOutcome> {
    parse_playlist(content.as_bytes(), options)
}

/// Parse a playlist file - auto-detects gzip compression
pub fn read_playlist(path: &Path, options: ParseOptions) -> Result<ParseOutcome> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);

    // Gzip magic bytes (1f 8b); peek without consuming
    let is_gzip = reader.fill_buf()?.starts_with(&[0x1f, 0x8b]);

    let outcome = if is_gzip {
        debug!("Playlist '{}' is gzip compressed", path.display());
        let decoder = BufReader::with_capacity(64 * 1024, GzDecoder::new(reader));
        parse_playlist(decoder, options)?
    } else {
        parse_playlist(reader, options)?
    };

    info!(
        "Loaded playlist '{}': {} groups, {} entries",
        path.display(),
        outcome.playlist.len(),
        outcome.total_entries
    );
    Ok(outcome)
}

/// Split a recognized `#EXTINF:-1 <args>,<name>` line into args and name.
///
/// Both parts must be non-empty. The name ends at the first control
/// character. Anything else is a comment.
fn match_extinf(line: &str) -> Option<(&str, &str)> {
    let rest = line
        .strip_prefix(EXTINF_PREFIX)?
        .trim_start_matches(|c: char| c.is_ascii_whitespace());

    let comma = rest.find(',')?;
    let args = &rest[..comma];
    if args.is_empty() {
        return None;
    }

    let name = &rest[comma + 1..];
    let end = name.find(char::is_control).unwrap_or(name.len());
    let name = &name[..end];
    if name.is_empty() {
        return None;
    }

    Some((args, name))
}

/// Value following `key` (which includes the opening quote), up to the
/// closing quote or the end of the argument section
fn extract_attr<'a>(args: &'a str, key: &str) -> Option<&'a str> {
    let start = args.find(key)? + key.len();
    let rest = &args[start..];
    let end = rest.find('"').unwrap_or(rest.len());
    Some(&rest[..end])
}
