use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate::{
    config, AccessLedger, CommandMatcher, FeedbackDirective, FeedbackSink, FrameSpool,
    ProfileRegistry, SeedMapping, Verifier,
};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "facegate")]
#[command(
    version,
    about = "Face-verification access point: match, decide, audit"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the verification loop against the frame spool
    Run,
    /// Seed the profile registry from a TOML mapping (insert-if-absent)
    Seed {
        /// Profiles file (defaults to profiles.toml in the data directory)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show recent access-log entries
    History {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Open config file in editor
    Config,
}

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_sig: libc::c_int) {
    STOP.store(true, Ordering::Relaxed);
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;

    match cli.command {
        Commands::Run => run(&cfg),
        Commands::Seed { file } => seed(file.as_deref()),
        Commands::History { limit } => history(limit),
        Commands::Config => open_config(),
    }
}

fn db_path() -> Result<PathBuf> {
    std::fs::create_dir_all(*config::DATA_DIR)
        .with_context(|| format!("creating data dir {}", config::DATA_DIR.display()))?;
    Ok(config::DATA_DIR.join("facegate.db"))
}

fn default_profiles_path() -> PathBuf {
    config::DATA_DIR.join("profiles.toml")
}

fn load_seed_mapping(path: &Path) -> Result<SeedMapping> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading profiles at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing profiles {}", path.display()))
}

/// Emits each feedback directive as one JSON line on stdout, for whatever
/// renderer/audio player is attached downstream.
struct JsonlSink;

impl FeedbackSink for JsonlSink {
    fn emit(&mut self, directive: &FeedbackDirective) {
        match serde_json::to_string(directive) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("dropping unserializable directive: {e}"),
        }
    }
}

fn run(cfg: &config::Config) -> Result<()> {
    let db = db_path()?;

    let registry = ProfileRegistry::open(&db).context("opening profile registry")?;

    // Idempotent, so safe on every startup.
    let profiles = default_profiles_path();
    if profiles.exists() {
        let mapping = load_seed_mapping(&profiles)?;
        registry.seed(&mapping).context("seeding profiles")?;
        info!("seeded {} profile(s) from {}", mapping.len(), profiles.display());
    }

    let ledger = AccessLedger::open(&db).context("opening access ledger")?;

    let matcher = CommandMatcher::new(cfg);
    let mut frames = FrameSpool::new(
        Path::new(&cfg.frame_dir),
        Duration::from_secs(cfg.spool_idle_secs),
    );
    let mut sink = JsonlSink;

    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }

    info!("watching frame spool {}", cfg.frame_dir);
    info!("press Ctrl+C to stop");

    let mut verifier = Verifier::new(cfg, matcher, registry, ledger);
    verifier
        .run(&mut frames, &mut sink, &STOP)
        .context("frame acquisition failed")?;

    info!("verification loop ended");
    Ok(())
}

fn seed(file: Option<&Path>) -> Result<()> {
    let path = file.map(Path::to_path_buf).unwrap_or_else(default_profiles_path);
    let mapping = load_seed_mapping(&path)?;

    let registry = ProfileRegistry::open(&db_path()?).context("opening profile registry")?;
    registry.seed(&mapping).context("seeding profiles")?;

    info!(
        "seeded {} profile(s), registry now holds {}",
        mapping.len(),
        registry.count()?
    );
    Ok(())
}

fn history(limit: usize) -> Result<()> {
    let ledger = AccessLedger::open(&db_path()?).context("opening access ledger")?;
    let entries = ledger.recent(limit)?;

    if entries.is_empty() {
        info!("access log is empty");
        return Ok(());
    }
    for e in entries {
        let distance = e
            .distance
            .map(|d| format!("{d:.3}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {}  distance={}",
            e.timestamp,
            if e.matched { "GRANTED" } else { "DENIED " },
            e.display_name,
            distance
        );
    }
    Ok(())
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
