//! Cinestory console runner entry point.

use std::error::Error;

use cinestory_content::application::source::FileStorySource;
use cinestory_core::clock::SystemClock;
use cinestory_core::rng::{DeterministicRng, SeededRng};
use cinestory_player::config::PlayerConfig;
use cinestory_player::console::{ConsoleCommand, parse_line};
use cinestory_player::error::AppError;
use cinestory_player::media::LoggingMediaOutput;
use cinestory_playback::application::command_handlers::start_session;
use cinestory_playback::application::runtime::spawn_session;
use cinestory_playback::domain::config::PlaybackConfig;
use cinestory_playback::domain::session::SessionPorts;
use cinestory_playback::domain::snapshot::RenderSnapshot;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr; stdout carries snapshots only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Cinestory console runner");

    let config = PlayerConfig::from_env()?;
    let mut source = FileStorySource::new(config.story_root());
    if let Some(format) = config.format {
        source = source.with_format(format);
    }
    let rng: Box<dyn DeterministicRng> = match config.rng_seed {
        Some(seed) => Box::new(SeededRng::from_seed(seed)),
        None => Box::new(SeededRng::from_entropy()),
    };
    let ports = SessionPorts {
        media: Box::new(LoggingMediaOutput),
        clock: Box::new(SystemClock),
        rng,
    };

    let engine = start_session(&config.story_id()?, &source, PlaybackConfig::default(), ports).await;
    let handle = spawn_session(engine);

    let mut snapshots = handle.watch_snapshots();
    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            let line = encode(&snapshots.borrow_and_update())?;
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
            if snapshots.changed().await.is_err() {
                return Ok::<(), AppError>(());
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line, &handle.snapshot()) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::Intent(intent)) => handle.send(intent)?,
            Err(e) => tracing::warn!(error = %e, "ignoring console line"),
        }
    }

    handle.shutdown().await?;
    printer.await??;
    tracing::info!("Console runner stopped");
    Ok(())
}

fn encode(snapshot: &RenderSnapshot) -> Result<String, AppError> {
    let mut line = serde_json::to_string(snapshot)?;
    line.push('\n');
    Ok(line)
}
