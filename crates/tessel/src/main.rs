//! # Tessel
//!
//! Command-line driver: loads a session config, renders every tile with the
//! accumulating engine and reports per-tile progress.
//!
//! ```text
//! tessel --config render.toml --threads 8
//! tessel --config render.toml --stop-at 32 --resume
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tessel_core::SampleId;
use tessel_session::{
    AccumulationEngine, LogSink, RenderSession, ResumeState, SessionConfig, SessionSummary, TileGrid,
    TileState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Session config (TOML). Defaults are used when omitted.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Override the worker thread count
    #[clap(short, long)]
    threads: Option<usize>,

    /// Stop every tile after this event sample ID
    #[clap(long)]
    stop_at: Option<SampleId>,

    /// After a stopped run, continue from where the tiles paused
    #[clap(long)]
    resume: bool,

    /// Seed of the accumulating engine
    #[clap(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading session config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.worker_threads = threads;
    }
    if args.stop_at.is_some() {
        config.events.stop_at = args.stop_at;
    }

    let grid = TileGrid::new(config.width, config.height, config.tile_size);
    let engine = Arc::new(AccumulationEngine::new(&grid, args.seed));
    let session = RenderSession::new(config, engine, Arc::new(LogSink)).context("starting render session")?;

    let mut summary = session.run().context("rendering")?;
    report("run", &summary);

    if args.resume && summary.paused() > 0 {
        info!(paused = summary.paused(), "resuming paused tiles");
        summary = session
            .resume(&ResumeState::from_summary(&summary))
            .context("resuming")?;
        report("resume", &summary);
    }

    if summary.failed() > 0 {
        bail!("{} of {} tiles failed", summary.failed(), summary.tiles.len());
    }
    Ok(())
}

fn report(phase: &str, summary: &SessionSummary) {
    println!("┌─ {phase} ─────────────────────────────────────────");
    for p in &summary.tiles {
        let state = match &p.state {
            TileState::Finished => "finished".to_string(),
            TileState::Paused { at } => format!("paused at {at}"),
            TileState::Failed(err) => format!("failed: {err}"),
            TileState::Pending | TileState::Running => "incomplete".to_string(),
        };
        println!(
            "│ {:<8} samples {:>6}  stints {:>4}  {:>9.3} ms/sample  {state}",
            p.tile.to_string(),
            p.rendered_through,
            p.stints,
            p.cost.estimate() * 1000.0
        );
    }
    println!("└─ {summary}");
}
