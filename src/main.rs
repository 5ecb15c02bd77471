use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod controllers;
mod error;
mod models;
mod routers;
mod signal;
mod terminal;

use config::Config;
use controllers::{
    AcoustIdController, PlaylistManager, Request, SessionController, SongController,
    SpotifyController,
    session::{Outcome, exit_code},
};
use signal::Interrupt;
use terminal::{Console, Tone};

/// Find the song playing in a video and add it to your "Spotted on Spotify"
/// playlist.
#[derive(Parser, Debug)]
#[command(name = "spotted-on-spotify", version, about)]
struct Cli {
    /// YouTube or SoundCloud URL; prompted for when omitted
    url: Option<String>,

    #[arg(hide = true)]
    extra: Vec<String>,

    /// Spotify username; prompted for when omitted
    #[arg(long, env = "SPOTIFY_USERNAME")]
    username: Option<String>,

    /// Search with the cleaned-up video title instead of the audio fingerprint
    #[arg(long)]
    use_title: bool,

    /// Config file (default: <config dir>/spotted-on-spotify/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = Config::load(cli.config.as_deref()).context("Invalid configuration")?;
    debug!("Temp audio at {}", config.temp_audio_path().display());

    let interrupt = Interrupt::listen();
    let console = Console::new();
    console.print_intro();

    let spotify = SpotifyController::new(&config).context("Cannot create Spotify client")?;
    let acoustid = AcoustIdController::new(&config).context("Cannot create AcoustID client")?;

    let mut session = SessionController::new(
        SongController::new(&config),
        acoustid,
        PlaylistManager::new(spotify),
        console,
        interrupt,
        config.temp_audio_path(),
    );

    let result = session
        .run(Request {
            url: cli.url,
            username: cli.username,
            use_title: cli.use_title,
        })
        .await;
    if let Ok(Outcome::Added(track)) = &result {
        info!("Added {} ({})", track.full_title(), track.uri);
    }
    info!("Finished in state {:?}", session.state());
    Ok(exit_code(&result))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.extra.is_empty() {
        terminal::print(Tone::Warning, "WARNING: Only using first command line argument");
    }

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            terminal::print(Tone::Error, &format!("ERROR: {:#}", e));
            1
        }
    };

    // A prompt abandoned on Ctrl-C still holds a blocking stdin read, which
    // would keep the runtime from shutting down.
    std::process::exit(code);
}
