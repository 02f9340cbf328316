use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use maitre::api::ApiServerBuilder;
use maitre::db::{self, ConversationRepo, StoreLocation};
use maitre::voice::{
    AudioCapture, AudioPlayback, LazyPlayback, OrchestratorClient, PLAYBACK_SAMPLE_RATE,
    Recorder, RecorderState, ToggleOutcome,
};
use maitre::{Config, RecorderConfig, VoiceOrchestrator};

/// Maitre - voice assistant for restaurant orders and reservations
#[derive(Parser)]
#[command(name = "maitre", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "MAITRE_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the orchestrator HTTP server (default)
    Serve,
    /// Talk to a running orchestrator: Enter starts and stops recording
    Talk {
        /// Orchestrator endpoint (overrides config)
        #[arg(short, long)]
        endpoint: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Show recent conversations from the local database
    History {
        /// Number of conversations to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Database file (defaults to the configured store)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,maitre=info",
        1 => "info,maitre=debug",
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
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cli.port).await,
        Command::Talk { endpoint } => talk(endpoint).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker(),
        Command::History { limit, db } => history(limit, db),
    }
}

/// Run the orchestrator until interrupted
async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load()?;
    config.prepare_data_dir();

    let orchestrator = Arc::new(VoiceOrchestrator::from_config(&config)?);
    tracing::info!(
        stt_model = %config.services.stt_model,
        llm_model = %config.services.llm_model,
        tts_voice = %config.services.tts_voice,
        store = orchestrator.store_backend(),
        "orchestrator ready"
    );

    let server = ApiServerBuilder::new(orchestrator, config.server.port)
        .server_config(&config.server)
        .port(port.unwrap_or(config.server.port))
        .build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

/// Interactive push-to-talk session
#[allow(clippy::future_not_send)]
async fn talk(endpoint: Option<String>) -> anyhow::Result<()> {
    let mut config = RecorderConfig::load()?;
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }

    let client = OrchestratorClient::new(&config)?;
    println!("Talking to {}", client.endpoint());
    println!("Press Enter to start recording, Enter again to send, q to quit.\n");

    let mut recorder = Recorder::new(AudioCapture::new(), client, LazyPlayback::default());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} > ", prompt(recorder.state()));
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }

        match recorder.toggle().await {
            Ok(ToggleOutcome::Started) => println!("Recording... press Enter to send."),
            Ok(ToggleOutcome::Replied(exchange)) => {
                println!("Assistant: {}", exchange.text);
                if let Err(e) = exchange.playback {
                    println!("(could not play reply: {e})");
                }
            }
            Ok(ToggleOutcome::Ignored) => println!("Still processing, please wait."),
            Err(e) => println!("Error: {e}"),
        }
    }

    // Release the microphone if the session ends mid-recording
    if recorder.state() == RecorderState::Listening {
        let _ = recorder.stop();
    }

    Ok(())
}

const fn prompt(state: RecorderState) -> &'static str {
    match state {
        RecorderState::Idle => "idle",
        RecorderState::Listening => "listening",
        RecorderState::Processing => "processing",
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new();
    capture.start()?;

    println!("Sample rate: {} Hz", maitre::voice::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

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
    println!("If RMS stayed near 0, check that the microphone is connected and allowed.");

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
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let frequency = 440.0_f32;
    let num_samples = PLAYBACK_SAMPLE_RATE * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());
    playback.play_samples(samples)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Print recent conversations, newest first
fn history(limit: usize, db_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match db_path {
        Some(path) => path,
        None => match maitre::config::store_location()? {
            StoreLocation::Sqlite(path) => path,
            StoreLocation::Rest(url) => {
                anyhow::bail!("conversations are stored remotely at {url}; pass --db for a local file")
            }
            StoreLocation::Memory => anyhow::bail!("in-memory store has no history"),
        },
    };

    if !path.exists() {
        println!("No conversations yet ({} does not exist)", path.display());
        return Ok(());
    }

    let repo = ConversationRepo::new(db::init(&path)?);
    let conversations = repo.list_recent(limit)?;
    if conversations.is_empty() {
        println!("No conversations yet");
        return Ok(());
    }

    for conversation in conversations {
        println!("[{}]", conversation.created_at.format("%Y-%m-%d %H:%M:%S"));
        println!("  guest:     {}", conversation.user_input);
        println!("  assistant: {}\n", conversation.ai_response);
    }
    println!("{} conversation(s) stored", repo.count()?);

    Ok(())
}
