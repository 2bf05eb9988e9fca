use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tally_gateway::Config;
use tally_gateway::audio::replay::{self, WavSource};
use tally_gateway::audio::{
    AudioCapture, AudioChunk, AudioFormat, AudioSink, Direction, NullSink, PLAYBACK_SAMPLE_RATE,
    SpeakerSink, f32_to_pcm16, pump_capture, transport,
};
use tally_gateway::ledger::{self, TransactionMaterializer, TransactionRepo, UserRepo};
use tally_gateway::model::LiveConnector;
use tally_gateway::session::{SessionDriver, SessionEvent, SessionOptions, StopHandle};
use tally_gateway::tools::ToolRegistry;

/// Tally - voice transaction capture gateway
#[derive(Parser)]
#[command(name = "tally", version, about)]
struct Cli {
    /// User to attribute captured transactions to
    #[arg(short, long, env = "TALLY_USER")]
    user: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a WAV recording through the capture pipeline
    Replay {
        /// Path to a WAV file
        file: PathBuf,

        /// Seconds to keep the session open after the file ends
        #[arg(long, default_value = "8")]
        linger: u64,

        /// Discard synthesized audio instead of playing it
        #[arg(long)]
        mute: bool,
    },
    /// List recently captured transactions
    Recent {
        /// Number of transactions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,tally_gateway=info",
        1 => "info,tally_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Replay { file, linger, mute } => {
                replay_session(cli.user, &file, linger, mute).await
            }
            Command::Recent { limit } => recent(cli.user, limit),
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::Setup => tally_gateway::setup::run_setup(),
        };
    }

    live_session(cli.user).await
}

/// Load config with an optional user override and open the ledger
fn open_ledger(user_override: Option<String>) -> anyhow::Result<(Config, TransactionRepo)> {
    let mut config = Config::load()?;
    if let Some(user) = user_override {
        config.user_id = user;
    }

    let pool = ledger::init(config.db_path())?;
    UserRepo::new(pool.clone()).find_or_create(&config.user_id)?;

    Ok((config, TransactionRepo::new(pool)))
}

/// Build the dispatch table with the one registered handler
fn build_tools(repo: TransactionRepo, user_id: &str, session_id: &str) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(
        TransactionMaterializer::declaration(),
        Box::new(TransactionMaterializer::new(repo, user_id, session_id)),
    );
    tools
}

/// Run a live session from the default microphone
#[allow(clippy::future_not_send)]
async fn live_session(user_override: Option<String>) -> anyhow::Result<()> {
    let (config, repo) = open_ledger(user_override)?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let tools = build_tools(repo.clone(), &config.user_id, &session_id);
    let connector = LiveConnector::new(&config, tools.declarations())?;

    let (mic_tx, mic_rx) = transport::inbound(config.audio.inbound_queue_capacity);

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let driver = SessionDriver::new(tools, SessionOptions::default()).with_events(events_tx);
    let stop = driver.stop_handle();

    spawn_interrupt(stop.clone());
    tokio::spawn(print_events(events_rx));

    tracing::info!(
        user = %config.user_id,
        model = %config.model_id,
        "starting live capture session"
    );
    println!("Listening - tell me what you spent. Ctrl-C to stop.\n");

    let pump_stop = stop.subscribe();
    let (session_result, pump_result) = tokio::join!(
        driver.run(&connector, mic_rx, speaker_or_null()),
        pump_capture(&capture, &mic_tx, config.audio.chunk_ms, pump_stop),
    );
    capture.stop();

    if let Err(e) = pump_result {
        tracing::debug!(error = %e, "capture pump ended early");
    }
    session_result?;

    println!();
    print_recent(&repo, &config.user_id, 5)
}

/// Drive a session from a pre-recorded WAV file
#[allow(clippy::future_not_send)]
async fn replay_session(
    user_override: Option<String>,
    file: &Path,
    linger: u64,
    mute: bool,
) -> anyhow::Result<()> {
    let (config, repo) = open_ledger(user_override)?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let tools = build_tools(repo.clone(), &config.user_id, &session_id);
    let connector = LiveConnector::new(&config, tools.declarations())?;

    let source = WavSource::load(file)?;
    println!(
        "Replaying {} ({:.1}s of audio)...\n",
        file.display(),
        source.duration().as_secs_f32()
    );

    let (mic_tx, mic_rx) = transport::inbound(config.audio.inbound_queue_capacity);

    let sink: Box<dyn AudioSink> = if mute {
        Box::new(NullSink)
    } else {
        speaker_or_null()
    };

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let driver = SessionDriver::new(tools, SessionOptions::default()).with_events(events_tx);
    let stop = driver.stop_handle();

    spawn_interrupt(stop.clone());
    tokio::spawn(print_events(events_rx));

    let feeder = {
        let stop = stop.clone();
        let mut stopped = stop.subscribe();
        let chunk_ms = config.audio.chunk_ms;
        async move {
            if let Err(e) = replay::feed(&source, &mic_tx, chunk_ms).await {
                tracing::debug!(error = %e, "replay feed ended early");
                return;
            }
            // Leave the session open for the model's replies, then stop
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(linger)) => stop.stop(),
                _ = stopped.changed() => {}
            }
        }
    };

    let (session_result, ()) = tokio::join!(driver.run(&connector, mic_rx, sink), feeder);
    session_result?;

    println!();
    print_recent(&repo, &config.user_id, 5)
}

/// List recently captured transactions
fn recent(user_override: Option<String>, limit: usize) -> anyhow::Result<()> {
    let (config, repo) = open_ledger(user_override)?;
    print_recent(&repo, &config.user_id, limit)
}

fn print_recent(repo: &TransactionRepo, user_id: &str, limit: usize) -> anyhow::Result<()> {
    let transactions = repo.list_recent(user_id, limit)?;

    if transactions.is_empty() {
        println!("No transactions recorded for {user_id}");
        return Ok(());
    }

    println!("Recent transactions for {user_id}:");
    for t in transactions {
        println!(
            "  {}  {:>10.2}  {:<17}  {}",
            t.occurred_at.format("%Y-%m-%d %H:%M"),
            t.amount,
            t.category,
            t.description.unwrap_or_default()
        );
    }

    Ok(())
}

/// Print session events as they arrive
async fn print_events(mut events: tokio::sync::mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Transcript(text) => println!("<< {text}"),
            SessionEvent::Text(text) => println!(".. {text}"),
            SessionEvent::ToolDispatched { name, success, .. } => {
                if success {
                    println!("[recorded via {name}]");
                } else {
                    println!("[{name} failed]");
                }
            }
        }
    }
}

/// Stop the session on Ctrl-C
fn spawn_interrupt(stop: StopHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, closing session");
            stop.stop();
        }
    });
}

/// Speaker sink, or a silent sink when no device is available
fn speaker_or_null() -> Box<dyn AudioSink> {
    match SpeakerSink::new() {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            tracing::warn!(error = %e, "no playback device, audio output disabled");
            Box::new(NullSink)
        }
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut sink = SpeakerSink::new()?;

    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (PLAYBACK_SAMPLE_RATE as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());

    let chunk = AudioChunk::from_samples(
        &f32_to_pcm16(&samples),
        AudioFormat::playback(),
        Direction::Outbound,
    );
    sink.play(&chunk)?;

    // The render thread owns the device; wait for the tone to finish
    tokio::time::sleep(Duration::from_secs_f32(duration_secs + 0.5)).await;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}
