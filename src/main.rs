//! CLI entry point for the music-get tool.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use music_get::config::AppConfig;
use music_get::provider::{CredentialPrompt, Credentials};
use music_get::report::LOG_FILE_NAME;
use music_get::{
    AuthError, Bitrate, DownloadEngine, DownloadSettings, Provider, ProviderContext, aggregate,
    resolve_tracks, route,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// Reads the account and password from the terminal.
struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn credentials(&self, provider: Provider) -> Result<Credentials, AuthError> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Err(AuthError::CredentialsUnavailable { provider });
        }
        let mut lines = stdin.lock().lines();
        let mut ask = |label: &str| -> Option<String> {
            print!("{label}: ");
            io::stdout().flush().ok()?;
            let line = lines.next()?.ok()?;
            let line = line.trim().to_string();
            (!line.is_empty()).then_some(line)
        };

        println!("Please log in to {provider}");
        let account = ask("Phone");
        let password = ask("Password");
        match (account, password) {
            (Some(account), Some(password)) => Ok(Credentials::new(account, password)),
            _ => Err(AuthError::CredentialsUnavailable { provider }),
        }
    }
}

fn progress_bar(total: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let mut request = route(&args.url)?;
    info!(provider = %request.provider(), kind = %request.kind(), "resolving");

    let mut config = AppConfig::load(&args.config)?;
    let bitrate = args
        .bitrate
        .map_or_else(|| config.bitrate(), Bitrate::from_kbps);

    let ctx = ProviderContext::new(config.session(), bitrate)?.with_prompt(TerminalPrompt);
    let resolved = resolve_tracks(request.as_mut(), &ctx).await;

    // A login may have succeeded even if a later stage failed
    let session = ctx.into_session();
    config.set_session(session.clone());
    if let Err(e) = config.save(&args.config) {
        warn!(error = %e, "failed to save config");
    }

    let tracks = resolved?;
    if tracks.is_empty() {
        info!("nothing to download");
        return Ok(());
    }

    let settings = DownloadSettings::new(&args.output, args.force, usize::from(args.concurrency));
    std::fs::create_dir_all(&settings.download_dir).with_context(|| {
        format!(
            "cannot create download directory {}",
            settings.download_dir.display()
        )
    })?;

    let bar = progress_bar(tracks.len(), args.quiet);
    let engine = DownloadEngine::new(&settings)?
        .with_session(session)
        .with_progress(bar.clone());
    let tasks = engine.download(tracks).await;
    bar.finish_and_clear();

    let summary = aggregate(&tasks, Path::new(LOG_FILE_NAME));
    println!("{}", summary.report);
    if let Some(path) = summary.failure_log {
        println!("\nSee more info in {:?}", path.display().to_string());
    }

    Ok(())
}
