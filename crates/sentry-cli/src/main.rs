use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sentry_audio::{AudioConfig, Cue, CueManager};
use sentry_link::SerialLink;
use sentry_relay::client::RelayClient;
use sentry_turret::dispatch::CommandDispatcher;
use sentry_turret::poller::TelemetryPoller;
use sentry_turret::state::TurretState;

#[derive(Debug, Parser)]
#[command(name = "sentry", version, about = "Two-node sentry turret control rig")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config without touching hardware.
    Doctor,
    /// Run the turret node: serial actuator, telemetry poller, HTTP API.
    Turret,
    /// Run the controller node: browser API, command relay, alarm mirror.
    Relay,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    serial: SerialCfg,
    audio: AudioConfig,
    turret: TurretCfg,
    relay: Option<RelayCfg>,
}

#[derive(Debug, serde::Deserialize)]
struct SerialCfg {
    device: String,
    baud: u32,

    /// In-memory stand-in for the actuator; commands go nowhere and no
    /// telemetry arrives. Useful on a dev box without the MCU.
    #[serde(default)]
    mock: bool,
}

#[derive(Debug, serde::Deserialize)]
struct TurretCfg {
    listen_addr: String,
}

#[derive(Debug, serde::Deserialize)]
struct RelayCfg {
    listen_addr: String,
    turret_url: String,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg),
        Command::Turret => run_turret(&cfg).await,
        Command::Relay => run_relay(&cfg).await,
    }
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    anyhow::ensure!(!cfg.serial.device.is_empty(), "serial.device missing");
    anyhow::ensure!(cfg.serial.baud > 0, "serial.baud invalid");
    if !cfg.serial.mock && !std::path::Path::new(&cfg.serial.device).exists() {
        warn!("doctor: serial device {} not present (link will start disabled)", cfg.serial.device);
    }

    let sounds = std::path::Path::new(&cfg.audio.sound_dir);
    anyhow::ensure!(sounds.is_dir(), "audio.sound_dir is not a dir: {}", cfg.audio.sound_dir);
    for file in [&cfg.audio.buildup, &cfg.audio.idle, &cfg.audio.alert, &cfg.audio.spot] {
        if !sounds.join(file).is_file() {
            warn!("doctor: sample missing: {}", file);
        }
    }

    cfg.turret
        .listen_addr
        .parse::<std::net::SocketAddr>()
        .context("turret.listen_addr invalid")?;

    if let Some(relay) = &cfg.relay {
        relay
            .listen_addr
            .parse::<std::net::SocketAddr>()
            .context("relay.listen_addr invalid")?;
        anyhow::ensure!(
            relay.turret_url.starts_with("http://") || relay.turret_url.starts_with("https://"),
            "relay.turret_url must be an http(s) URL"
        );
    }

    info!("doctor: OK");
    Ok(())
}

fn open_link(cfg: &SerialCfg) -> SerialLink {
    if cfg.mock {
        warn!("serial: mock mode, actuator traffic is discarded");
        let (link, mut hw) = SerialLink::in_memory();
        // keep the hardware end alive and drained, like a silent MCU
        tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut buf = [0u8; 256];
            while matches!(hw.read(&mut buf).await, Ok(n) if n > 0) {}
        });
        link
    } else {
        SerialLink::open(&cfg.device, cfg.baud)
    }
}

async fn run_turret(cfg: &Config) -> Result<()> {
    info!("turret: starting");

    let link = Arc::new(open_link(&cfg.serial));
    if link.is_connected().await && !cfg.serial.mock {
        // opening the port toggles DTR and reboots the MCU; give it a moment
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let state = Arc::new(TurretState::default());
    let cues = Arc::new(CueManager::new(cfg.audio.clone()));

    cues.play_one_shot(Cue::Buildup);

    tokio::spawn(TelemetryPoller::new(state.clone(), link.clone(), cues.clone()).run());

    let dispatcher = Arc::new(CommandDispatcher::new(state.clone(), link, cues.clone()));
    let api = sentry_turret::http::Api { state, dispatcher };
    sentry_turret::http::serve(&cfg.turret.listen_addr, api, shutdown_signal()).await?;

    info!("turret: shutting down");
    cues.set_alert_loop(false).await;
    Ok(())
}

async fn run_relay(cfg: &Config) -> Result<()> {
    let relay = cfg.relay.as_ref().context("no [relay] config section")?;
    info!("relay: starting, turret at {}", relay.turret_url);

    let cues = Arc::new(CueManager::new(cfg.audio.clone()));
    let client = RelayClient::new(&relay.turret_url)?;

    tokio::spawn(sentry_relay::mirror::run(client.clone(), cues.clone()));

    let api = sentry_relay::api::Api { client, cues: cues.clone() };
    sentry_relay::api::serve(&relay.listen_addr, api, shutdown_signal()).await?;

    // never leave the alarm wailing after exit
    info!("relay: shutting down");
    cues.set_alert_loop(false).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("ctrl-c handler failed: {}", e);
    }
}
