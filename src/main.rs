//! Command line front end for media-dl

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use media_dl::{Config, Container, DownloadRequest, MediaDownloader, Quality};

/// Concurrent media downloader built on yt-dlp
#[derive(Parser, Debug)]
#[command(name = "media-dl", version, about)]
struct Cli {
    /// URL to download (repeat for a batch)
    #[arg(short, long = "url", required_unless_present = "init_config")]
    urls: Vec<String>,

    /// Root output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extract audio only (mp3)
    #[arg(short, long)]
    audio: bool,

    /// Video quality
    #[arg(short, long)]
    quality: Option<Quality>,

    /// Output container format
    #[arg(long = "video-format")]
    video_format: Option<Container>,

    /// Config file path (default: ~/.media-dl/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    init_config: bool,

    /// Attempts per download before giving up
    #[arg(short, long)]
    retries: Option<u32>,

    /// Browser to source cookies from (chrome, firefox, safari, ...)
    #[arg(long)]
    cookies_browser: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Overlay command line flags on top of the loaded config
    fn apply_to(&self, config: &mut Config) {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if self.audio {
            config.audio_only = true;
        }
        if let Some(quality) = self.quality {
            config.video_quality = quality;
        }
        if let Some(container) = self.video_format {
            config.format_preference = container;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(browser) = &self.cookies_browser {
            config.cookies_browser = Some(browser.clone());
        }
        if self.verbose {
            config.verbose = true;
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "media_dl=debug" } else { "media_dl=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> media_dl::Result<bool> {
    if cli.init_config {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => Config::default_path().ok_or_else(|| media_dl::Error::Other(
                "cannot determine home directory for config".to_string(),
            ))?,
        };
        if Config::init_default(&path).await? {
            println!("Wrote default config to {}", path.display());
        } else {
            println!("Config already exists at {}", path.display());
        }
        return Ok(true);
    }

    let mut config = Config::load(cli.config.as_deref()).await;
    cli.apply_to(&mut config);

    let downloader = MediaDownloader::new(config.clone()).await?;

    // Print throttled progress until the batch completes
    let mut events = downloader.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.percent {
                Some(percent) => {
                    println!(
                        "[{}] {} {:.1}% {} ETA {}",
                        event.task_id, event.file_name, percent, event.speed, event.eta
                    );
                }
                None => println!("[{}] {} {}", event.task_id, event.file_name, event.raw_status),
            }
        }
    });

    // First Ctrl-C cancels everything; tasks still report their outcomes
    let shutdown_target = downloader.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, cancelling active downloads");
            shutdown_target.shutdown().await;
        }
    });

    let requests: Vec<DownloadRequest> = cli
        .urls
        .iter()
        .map(|url| DownloadRequest::from_config(url, &config))
        .collect();
    let handles = downloader.submit_batch(requests).await?;
    let outcomes = MediaDownloader::await_all(handles).await;
    printer.abort();

    let mut all_ok = true;
    for outcome in &outcomes {
        if outcome.success {
            println!("✓ {} [{}] {}", outcome.title, outcome.platform, outcome.url);
        } else {
            all_ok = false;
            println!(
                "✗ {} ({})",
                outcome.url,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(all_ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
