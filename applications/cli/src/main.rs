/// Lyre - terminal playlist player
mod commands;
mod config;

use anyhow::Context;
use clap::Parser;
use commands::{Command, HELP, VOLUME_STEP};
use config::CliConfig;
use crossbeam_channel::{unbounded, Receiver};
use lyre_audio_desktop::{CpalEngine, SourceFetcher, SymphoniaDecoder};
use lyre_playback::{PlaybackState, PlaylistController, PlaylistEvent};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// How long the main loop waits for engine activity between input checks
const TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "lyre")]
#[command(about = "Play a list of audio files or URLs", long_about = None)]
struct Cli {
    /// Files, file:// or http(s):// URLs, in playback order
    #[arg(required = true)]
    locators: Vec<String>,

    /// Initial volume (0.0 - 1.0)
    #[arg(short, long)]
    volume: Option<f32>,

    /// Configuration file path (default: ./lyre.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print notifications as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lyre=info,lyre_playback=info,lyre_audio_desktop=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(volume) = cli.volume {
        config.playback.volume = volume;
        config.validate().context("invalid --volume")?;
    }

    let engine = CpalEngine::new().context("opening audio output")?;
    let decoder = SymphoniaDecoder::with_output_rate(engine.sample_rate());
    let fetcher = SourceFetcher::with_timeout(config.network.http_timeout())?;

    let mut playlist = PlaylistController::new(
        config.playback.clone(),
        Arc::new(engine),
        Arc::new(fetcher),
        Arc::new(decoder),
    )?;
    let events = playlist.subscribe();
    playlist.add_tracks(cli.locators);

    info!(tracks = playlist.len(), "starting playback");
    let input = spawn_stdin_reader()?;
    run(&mut playlist, &events, &input, cli.json)
}

/// Forward stdin lines to the main loop
fn spawn_stdin_reader() -> anyhow::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn run(
    playlist: &mut PlaylistController,
    events: &Receiver<PlaylistEvent>,
    input: &Receiver<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut autoplay = true;

    loop {
        playlist.wait_dispatch(TICK);

        if autoplay {
            autoplay = start_first_playable(playlist)?;
        }

        for event in events.try_iter() {
            print_event(&event, json)?;
            if event == PlaylistEvent::PlaylistEnded {
                return Ok(());
            }
        }

        loop {
            match input.try_recv() {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Command::parse(&line) {
                        Ok(Command::Quit) => return Ok(()),
                        Ok(command) => apply(playlist, command),
                        Err(message) => eprintln!("{message}"),
                    }
                }
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                // stdin closed: keep playing until the playlist ends
                Err(crossbeam_channel::TryRecvError::Disconnected) => break,
            }
        }
    }
}

/// Start the track at the cursor once it is decoded, skipping tracks that
/// failed to load
///
/// Returns whether autoplay is still waiting.
fn start_first_playable(playlist: &mut PlaylistController) -> anyhow::Result<bool> {
    let Some(current) = playlist.current() else {
        return Ok(false);
    };
    if current.is_ready() {
        playlist.play()?;
        return Ok(false);
    }
    if current.load_error().is_some() {
        if playlist.cursor() + 1 >= playlist.len() {
            anyhow::bail!("none of the given tracks could be loaded");
        }
        playlist.advance()?;
    }
    Ok(true)
}

fn apply(playlist: &mut PlaylistController, command: Command) {
    let result = match command {
        Command::TogglePlay => match playlist.state() {
            PlaybackState::Playing => playlist.pause(),
            PlaybackState::Paused | PlaybackState::Stopped => playlist.play(),
        },
        Command::Stop => playlist.stop(),
        Command::Next => playlist.advance(),
        Command::Back => playlist.skip_back(),
        Command::ToggleMute => {
            playlist.toggle_mute();
            Ok(())
        }
        Command::VolumeUp => playlist.set_volume(playlist.volume() + VOLUME_STEP),
        Command::VolumeDown => playlist.set_volume(playlist.volume() - VOLUME_STEP),
        Command::Seek(position) => playlist.set_song_position(position),
        Command::Status => {
            print_status(playlist);
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    if let Err(e) = result {
        warn!(error = %e, "command failed");
        eprintln!("{e}");
    }
}

fn print_status(playlist: &PlaylistController) {
    let cursor = playlist.cursor();
    let current = playlist
        .locators()
        .get(cursor)
        .map(ToString::to_string)
        .unwrap_or_default();
    let duration = playlist.song_duration(None).unwrap_or_default();
    println!(
        "[{}/{}] {} {:?} {:.1}s / {:.1}s  volume {:.0}%{}",
        cursor + 1,
        playlist.len(),
        current,
        playlist.state(),
        playlist.song_position().as_secs_f64(),
        duration.as_secs_f64(),
        playlist.volume() * 100.0,
        if playlist.is_muted() { " (muted)" } else { "" }
    );
}

fn print_event(event: &PlaylistEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        PlaylistEvent::TrackFinished { locator } => println!("finished  {locator}"),
        PlaylistEvent::TrackLoaded { locator } => println!("loaded    {locator}"),
        PlaylistEvent::TrackLoadFailed { locator, message } => {
            println!("failed    {locator}: {message}");
        }
        PlaylistEvent::SkipNext { new_index, .. } | PlaylistEvent::SkipBack { new_index, .. } => {
            println!("track     {}", new_index + 1);
        }
        PlaylistEvent::VolumeChanged { to, .. } => println!("volume    {:.0}%", to * 100.0),
        other => println!("{}", other.name()),
    }
    Ok(())
}
