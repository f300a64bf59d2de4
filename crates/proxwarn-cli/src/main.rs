mod scenario;
mod simulate;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use proxwarn_config::{LoadedConfig, load_config};
use proxwarn_core::classify;

use crate::scenario::Scenario;

#[derive(Parser)]
#[command(name = "proxwarn", about = "Proximity-warning engine tools")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a config file and print what it defines
    Validate {
        /// Config file (TOML)
        config: PathBuf,
    },

    /// Show which tier a distance falls into for a category
    Classify {
        /// Config file (TOML)
        config: PathBuf,
        /// Category name
        category: String,
        /// Distance from the user, in metres
        distance: f64,
    },

    /// Run a scenario and print every cue played
    Simulate {
        /// Config file (TOML)
        config: PathBuf,
        /// Scenario file (JSON)
        scenario: PathBuf,

        /// Print cues as JSON lines
        #[arg(long)]
        json: bool,

        /// Run at wall-clock speed instead of on a simulated clock
        #[arg(long)]
        realtime: bool,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

// The simulated clock needs a single-threaded runtime.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Validate { config } => cmd_validate(config),
        Commands::Classify {
            config,
            category,
            distance,
        } => cmd_classify(config, category, *distance),
        Commands::Simulate {
            config,
            scenario,
            json,
            realtime,
        } => cmd_simulate(config, scenario, *json, *realtime).await,
    }
}

fn open_config(path: &Path) -> Result<LoadedConfig> {
    load_config(path).with_context(|| format!("failed to load config {}", path.display()))
}

fn cmd_validate(path: &Path) -> Result<()> {
    let config = open_config(path)?;
    let settings = &config.settings;

    println!("ok: {}", path.display());
    println!("channels:   {}", settings.channels);
    println!("refresh:    {}ms", settings.refresh_interval.as_millis());
    println!("threshold:  {}", settings.cluster_threshold);
    println!("floor:      {}", settings.use_floor_projection);
    for (_, category) in config.categories.iter() {
        let ranges: Vec<String> = category.tiers.iter().map(|t| t.range.to_string()).collect();
        println!(
            "category {}: mask={:#x} tiers=[{}]",
            category.name,
            category.layer_mask,
            ranges.join(", ")
        );
    }
    Ok(())
}

fn cmd_classify(path: &Path, category: &str, distance: f64) -> Result<()> {
    let config = open_config(path)?;
    let id = config
        .categories
        .by_name(category)
        .ok_or_else(|| anyhow!("unknown category `{category}`"))?;
    let tiers = config.categories.tiers(id);

    match classify(tiers, distance) {
        Some(index) => {
            let tier = &tiers[index];
            println!(
                "tier {index}: cue={} priority={} every={}s",
                tier.cue, tier.priority, tier.cue_frequency
            );
        }
        None => println!("out of range"),
    }
    Ok(())
}

async fn cmd_simulate(config: &Path, scenario: &Path, json: bool, realtime: bool) -> Result<()> {
    let config = open_config(config)?;
    let scenario = Scenario::load(scenario)?;
    let summary = simulate::run(config, &scenario, realtime).await?;

    for cue in &summary.cues {
        if json {
            println!(
                "{}",
                serde_json::to_string(cue).context("failed to serialize cue")?
            );
        } else {
            println!(
                "{:>7.3}s  ch{}  {:<16} at ({:.2}, {:.2}, {:.2})  rolloff {:.2}..{:.2}",
                cue.t,
                cue.channel,
                cue.cue,
                cue.position.x,
                cue.position.y,
                cue.position.z,
                cue.min_distance,
                cue.max_distance,
            );
        }
    }

    if !json {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for cue in &summary.cues {
            *counts.entry(cue.cue.as_str()).or_default() += 1;
        }
        println!(
            "done. frames={} cues={} tracked={}",
            summary.frames,
            summary.cues.len(),
            summary.tracked
        );
        for (cue, count) in counts {
            println!("  {cue}: {count}");
        }
    }
    Ok(())
}
