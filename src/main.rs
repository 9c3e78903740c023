//! Media Manifest CLI
//!
//! Scans a media directory, enriches video files with movie metadata and
//! prints the resulting listing.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use media_manifest::{
    normalize_filename, refresh_library, LibraryConfig, ManifestStore, MediaRecord, OmdbClient,
    ProgressReporter, ScanError,
};

const ABOUT: &str = r#"
Media Manifest - keeps a movie manifest in sync with a media directory

Examples:
  media_manifest sync -m /srv/media -k <API_KEY>        scan and fetch metadata
  media_manifest sync -m /srv/media --json              print the listing as JSON
  media_manifest list -m /srv/media                     show the cached manifest
  media_manifest normalize Movie.2020.BRRip.XviD.mkv    preview a search title
"#;

/// Media directory scanner with a metadata cache
#[derive(Parser)]
#[command(name = "media_manifest")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LocationArgs {
    /// Root directory holding the media files
    #[arg(short = 'm', long, env = "MEDIA_PATH")]
    media_path: PathBuf,

    /// Manifest file (defaults to <media-path>/manifest.json)
    #[arg(long = "manifest", env = "MANIFEST_PATH")]
    manifest_path: Option<PathBuf>,

    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the media directory and resolve missing metadata
    Sync {
        #[command(flatten)]
        location: LocationArgs,

        /// API key for the title-lookup service
        #[arg(short = 'k', long, env = "OMDB_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Base URL of the title-lookup service
        #[arg(long, env = "OMDB_API_URL", default_value = media_manifest::config::DEFAULT_API_URL)]
        api_url: String,

        /// Timeout for one metadata request, in seconds
        #[arg(long, default_value_t = media_manifest::config::DEFAULT_REQUEST_TIMEOUT_SECS)]
        timeout: u64,

        /// Newly resolved records between manifest writes
        #[arg(long, default_value_t = media_manifest::config::DEFAULT_CHECKPOINT_INTERVAL)]
        checkpoint_interval: u64,

        /// Emit JSON progress lines on stderr
        #[arg(long)]
        progress: bool,
    },

    /// Print the cached manifest without scanning or fetching
    List {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Print the search title derived from each name
    Normalize {
        /// File or directory names
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<(), ScanError> {
    match command {
        Commands::Sync {
            location,
            api_key,
            api_url,
            timeout,
            checkpoint_interval,
            progress,
        } => {
            let mut builder = LibraryConfig::builder()
                .media_path(location.media_path)
                .api_key(api_key)
                .api_url(api_url)
                .request_timeout_secs(timeout)
                .checkpoint_interval(checkpoint_interval)
                .show_progress(progress);
            if let Some(manifest_path) = location.manifest_path {
                builder = builder.manifest_path(manifest_path);
            }
            let config = builder.build();
            config.validate()?;

            info!("Media path: {:?}", config.media_path);
            info!("Manifest: {:?}", config.effective_manifest_path());

            let client = OmdbClient::new(&config)?;
            let reporter = ProgressReporter::new(config.show_progress, 500);
            let records = refresh_library(&config, &client, &reporter).await?;
            print_records(&records, location.json)
        }
        Commands::List { location } => {
            let config = LibraryConfig::new(location.media_path);
            let manifest_path = location
                .manifest_path
                .unwrap_or_else(|| config.effective_manifest_path());

            let manifest = ManifestStore::new(manifest_path).load().await?;
            print_records(&manifest.sorted_records(), location.json)
        }
        Commands::Normalize { names } => {
            for name in names {
                println!("{}\t{}", name, normalize_filename(&name));
            }
            Ok(())
        }
    }
}

fn print_records(records: &[MediaRecord], json: bool) -> Result<(), ScanError> {
    if json {
        let text = serde_json::to_string_pretty(records)
            .map_err(|e| ScanError::io_error(None, e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }

    for record in records {
        let year = record.year().map(|y| format!(" ({})", y)).unwrap_or_default();
        let rating = record
            .imdb_rating()
            .map(|r| format!("  {}/10", r))
            .unwrap_or_default();
        let runtime = record
            .runtime()
            .map(|r| format!("  {}", r))
            .unwrap_or_default();
        println!("{}{}{}{}", record.display_title(), year, rating, runtime);
        if let Some(plot) = record.plot() {
            println!("    {}", plot);
        }
        if let Some(poster) = record.poster() {
            println!("    poster: {}", poster);
        }
        if let Some(dvd) = record.dvd() {
            println!("    dvd: {}", dvd);
        }
        println!("    {}", record.path);
    }
    println!("{} file(s)", records.len());
    Ok(())
}
