use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use rand_core::OsRng;
use wren::tsch::SystemClock;
use wren_sim::{SimConfig, Simulation};

#[derive(Parser, Debug)]
#[command(name = "wren-sim", about = "Run a TSCH PAN over a loopback medium")]
struct Args {
    /// TOML node configuration; without it a PAN of `--nodes` nodes is built.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 3)]
    nodes: usize,
    /// Seconds to run before printing the node report.
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level)).init();

    let config = match &args.config {
        Some(path) => SimConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::with_node_count(args.nodes),
    };
    anyhow::ensure!(!config.nodes.is_empty(), "configuration has no nodes");

    let clock = SystemClock::new(config.tsch.ticks_per_second);
    let mut sim = Simulation::new(&config, &clock, &mut OsRng)?;
    sim.start()?;
    log::info!("sim: {} nodes up, running for {}s", sim.nodes.len(), args.duration_secs);

    let tick = Duration::from_millis(config.tick_ms.max(1));
    let deadline = Instant::now() + Duration::from_secs(args.duration_secs);
    while Instant::now() < deadline {
        sim.step()?;
        std::thread::sleep(tick);
    }

    log::info!("sim: {}/{} nodes associated", sim.associated(), sim.nodes.len());
    for node in sim.report()? {
        println!("{node}");
    }
    Ok(())
}
