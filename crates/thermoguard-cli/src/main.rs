use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use thermoguard_client::ApiClient;
use thermoguard_core::{
    evaluate, fit_calibration, BlinkDetector, CaptureError, Correspondence, Descriptor, FramePair,
    Landmarks,
};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod replay;

use config::Config;
use engine::{spawn_engine, EngineError, EngineSettings};
use replay::ReplaySession;

#[derive(Parser)]
#[command(name = "thermoguard", version, about = "Thermal liveness checks for face enrollment")]
struct Cli {
    /// TOML file overriding the liveness policy from the environment.
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one optical/thermal frame pair and print the verdict as JSON.
    Evaluate {
        #[arg(long)]
        optical: PathBuf,
        /// Omit to evaluate an optical-only pair.
        #[arg(long)]
        thermal: Option<PathBuf>,
        /// JSON array of 68 `{x, y}` landmarks in optical pixel coordinates.
        #[arg(long)]
        landmarks: PathBuf,
        #[arg(long, default_value_t = 0)]
        optical_ts: u64,
        #[arg(long)]
        thermal_ts: Option<u64>,
    },
    /// Run the blink detector over a JSON-lines file of landmark sets.
    Blink {
        #[arg(long)]
        landmarks: PathBuf,
    },
    /// Fit a calibration from optical/thermal point correspondences.
    Calibrate {
        /// JSON array of `{"optical": {x, y}, "thermal": {x, y}}`.
        #[arg(long)]
        pairs: PathBuf,
    },
    /// Drive the full pipeline from a recorded session directory.
    Replay {
        #[arg(long)]
        session: PathBuf,
        #[arg(long, value_enum, default_value_t = ReplayMode::Inspect)]
        mode: ReplayMode,
        #[arg(long, required_if_eq_any([("mode", "register"), ("mode", "verify")]))]
        user: Option<String>,
    },
    /// Register a precomputed descriptor with the API.
    Register {
        #[arg(long)]
        user: String,
        /// JSON array of 128 floats.
        #[arg(long)]
        descriptor: PathBuf,
    },
    /// Verify a precomputed descriptor against the API. Exits 1 when rejected.
    Verify {
        #[arg(long)]
        user: String,
        #[arg(long)]
        descriptor: PathBuf,
    },
    /// Print the effective configuration.
    Status,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReplayMode {
    Inspect,
    Register,
    Verify,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = &cli.policy {
        config.policy = config::load_policy(path)?;
        tracing::info!(path = %path.display(), rule = ?config.policy.rule, "policy file loaded");
    }

    match cli.command {
        Command::Evaluate {
            optical,
            thermal,
            landmarks,
            optical_ts,
            thermal_ts,
        } => {
            let optical = replay::load_frame(&optical, optical_ts)?;
            let thermal = match thermal {
                Some(path) => Some(replay::load_frame(&path, thermal_ts.unwrap_or(optical_ts))?),
                None => None,
            };
            let landmarks: Landmarks = read_json(&landmarks)?;
            let verdict = evaluate(
                &landmarks,
                &FramePair::new(optical, thermal),
                &config.calibration,
                &config.policy,
            );
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(exit_status(verdict.is_live))
        }
        Command::Blink { landmarks } => {
            let text = std::fs::read_to_string(&landmarks)
                .with_context(|| format!("failed to read {}", landmarks.display()))?;
            let mut detector = BlinkDetector::new(config.blink_threshold, config.blink_window);
            let mut any = false;
            for (n, line) in text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
                let set: Landmarks = serde_json::from_str(line)
                    .with_context(|| format!("{}:{}: invalid landmarks", landmarks.display(), n + 1))?;
                let blink = detector.check(&set);
                any |= blink;
                println!("{}", serde_json::json!({ "frame": n, "blink": blink }));
            }
            Ok(exit_status(any))
        }
        Command::Calibrate { pairs } => {
            let pairs: Vec<Correspondence> = read_json(&pairs)?;
            let fit = fit_calibration(&pairs)?;
            println!("{}", serde_json::to_string_pretty(&fit)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Replay {
            session,
            mode,
            user,
        } => run_replay(&config, &session, mode, user).await,
        Command::Register { user, descriptor } => {
            let descriptor: Descriptor = read_json(&descriptor)?;
            let client = api_client(&config);
            tokio::task::spawn_blocking(move || client.register(&user, &descriptor)).await??;
            println!("registered");
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { user, descriptor } => {
            let descriptor: Descriptor = read_json(&descriptor)?;
            let client = api_client(&config);
            let accepted =
                tokio::task::spawn_blocking(move || client.verify(&user, &descriptor)).await?;
            println!("{}", if accepted { "accepted" } else { "rejected" });
            Ok(exit_status(accepted))
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_replay(
    config: &Config,
    dir: &Path,
    mode: ReplayMode,
    user: Option<String>,
) -> Result<ExitCode> {
    let session = ReplaySession::open(dir)?;
    if session.is_empty() {
        bail!("session {} has no frames", dir.display());
    }
    let (source, extractor) = session.into_parts();
    let engine = spawn_engine(
        source,
        extractor,
        api_client(config),
        EngineSettings::from(config),
    )?;

    match (mode, user) {
        (ReplayMode::Inspect, _) => loop {
            match engine.inspect().await {
                Ok(report) => println!("{}", serde_json::to_string(&report)?),
                Err(EngineError::Capture(CaptureError::Exhausted)) => {
                    return Ok(ExitCode::SUCCESS)
                }
                Err(e) => return Err(e.into()),
            }
        },
        (ReplayMode::Register, Some(user)) => {
            let result = engine.register(&user).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        (ReplayMode::Verify, Some(user)) => {
            let result = engine.verify(&user).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(exit_status(result.accepted))
        }
        (_, None) => bail!("--user is required for register and verify"),
    }
}

fn api_client(config: &Config) -> ApiClient {
    ApiClient::new(
        &config.api_base_url,
        Duration::from_secs(config.api_timeout_secs),
    )
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn exit_status(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
