//! M3U Viewer - console front end
//! Loads a playlist, prints its channel catalog and optionally warms the logo cache

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use m3u_viewer::error::{EINVAL, ENODATA};
use m3u_viewer::{read_playlist, LogoLoader, ResourceCache, ViewerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "m3u-viewer", version, about = "Browse an IPTV M3U channel list")]
struct Cli {
    /// Playlist file (.m3u, optionally gzip compressed)
    playlist: PathBuf,

    /// Download every channel logo into the cache
    #[arg(long)]
    prefetch: bool,

    /// Logo cache directory (overrides the config file)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Read settings from this JSON file instead of the user config directory
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("m3u_viewer=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return exit_code(EINVAL);
        }
    };

    init_logging();

    let mut config = match &cli.config {
        Some(path) => match ViewerConfig::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                return exit_code(e.exit_code());
            }
        },
        None => ViewerConfig::load(),
    };
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }

    let outcome = match read_playlist(&cli.playlist, config.parse_options()) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Cannot load '{}': {}", cli.playlist.display(), e);
            return exit_code(e.exit_code());
        }
    };

    if outcome.total_entries == 0 {
        error!("No channels found in '{}'", cli.playlist.display());
        return exit_code(ENODATA);
    }

    let stdout = std::io::stdout();
    if let Err(e) = outcome.playlist.write_summary(stdout.lock()) {
        error!("Failed to print playlist: {}", e);
        return exit_code(e.raw_os_error().unwrap_or(1));
    }

    if cli.prefetch {
        let cache = ResourceCache::with_http(&config.cache_dir, &config.fetch_config());
        let mut loader = LogoLoader::new(cache, config.logo_size);
        let report = loader.prefetch(&outcome.playlist);
        println!(
            "\nLogos: {} already cached, {} downloaded, {} failed",
            report.already_cached, report.downloaded, report.failed
        );
    }

    ExitCode::SUCCESS
}
