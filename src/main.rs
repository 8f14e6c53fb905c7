//! Skyhop entry point
//!
//! `skyhop relay` serves the two-peer relay. `skyhop play` runs a headless
//! session driven by the demo autopilot, optionally joined to a relay.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};

use skyhop::consts::TICK_RATE;
use skyhop::net::{PeerLink, Relay};
use skyhop::sim::{GameEvent, TickInput};
use skyhop::{Error, FileHighScore, Session, Settings, Tuning};

#[derive(Parser, Debug)]
#[command(author, version, about = "Endless vertical platformer engine and peer relay", long_about = None)]
struct Cli {
    /// Settings JSON (addresses, peer count, high score path)
    #[arg(long, global = true, default_value = "skyhop.json")]
    settings: PathBuf,
    /// Tuning JSON overriding the default game balance
    #[arg(long, global = true)]
    tuning: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the position relay
    Relay(RelayArgs),
    /// Run a headless session on autopilot
    Play(PlayArgs),
}

#[derive(Args, Debug)]
struct RelayArgs {
    /// Listen address; defaults to the settings relay address
    #[arg(long)]
    bind: Option<String>,
    /// Peers required before START
    #[arg(long)]
    peers: Option<usize>,
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[arg(long)]
    seed: Option<u64>,
    /// Ticks to simulate
    #[arg(long, default_value_t = 3600)]
    ticks: u64,
    /// Join a relay; without a value uses the settings relay address
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    connect: Option<String>,
    /// Print the final render snapshot as JSON
    #[arg(long)]
    snapshot: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let settings = Settings::load(&cli.settings);
    match cli.command {
        Commands::Relay(args) => relay(&settings, args),
        Commands::Play(args) => {
            let tuning = match &cli.tuning {
                Some(path) => Tuning::load(path)?,
                None => Tuning::default(),
            };
            play(&settings, tuning, args)
        }
    }
}

fn relay(settings: &Settings, args: RelayArgs) -> Result<(), Error> {
    let mut config = settings.relay_config();
    if let Some(peers) = args.peers {
        config.max_peers = peers.max(1);
    }
    let bind = args.bind.unwrap_or_else(|| settings.relay_addr.clone());
    Relay::bind(bind.as_str(), config)?.run()?;
    Ok(())
}

fn play(settings: &Settings, tuning: Tuning, args: PlayArgs) -> Result<(), Error> {
    let seed = args.seed.or(settings.seed).unwrap_or_else(clock_seed);
    log::info!("Skyhop starting (seed {seed})");

    let store = FileHighScore::new(&settings.highscore_path);
    let mut session = Session::new(seed, tuning, Box::new(store))?;
    if let Some(addr) = args.connect {
        let addr = if addr.is_empty() { settings.relay_addr.clone() } else { addr };
        session = session.with_link(PeerLink::connect(addr.as_str())?);
    }

    let input = TickInput {
        idle_mode: true,
        ..TickInput::default()
    };
    let frame = Duration::from_secs(1) / TICK_RATE;
    let mut runs = 0u32;
    let mut best = 0u64;

    for _ in 0..args.ticks {
        let started = Instant::now();
        for event in session.step(&input) {
            match event {
                GameEvent::RunEnded { cause, score } => {
                    runs += 1;
                    best = best.max(score);
                    log::info!("Run {runs} ended ({cause:?}) with score {score}");
                }
                other => log::debug!("{other:?}"),
            }
        }
        // Real time only matters when someone else is watching
        if session.is_linked() {
            thread::sleep(frame.saturating_sub(started.elapsed()));
        }
    }

    log::info!(
        "Finished {} ticks: {runs} runs ended, best {best}, all-time {}",
        args.ticks,
        session.high_score()
    );
    if args.snapshot {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    }
    Ok(())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
