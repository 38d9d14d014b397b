use gmsim::{ScenarioConfig, Scenario};
use gmsim::{KineticEnergyWriter, MultiWriter, ProgressWriter, XyzWriter};
use gmsim::{bench_integrators, bench_neighbours};

use clap::Parser;
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// Scenario file under `scenarios/`
    #[arg(short, default_value = "silo_flow.yaml")]
    file_name: String,

    /// Run the neighbour search and integrator benchmarks instead
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name);
    ScenarioConfig::load(&config_path).with_context(|| format!("loading {}", config_path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gmsim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if args.bench {
        bench_neighbours();
        bench_integrators();
        return Ok(());
    }

    let cfg = load_scenario_from_yaml(&args.file_name)?;
    let Scenario { mut simulator, mut criteria, .. } = Scenario::build_scenario(&cfg)?;

    let mut progress = ProgressWriter;
    let mut energy = KineticEnergyWriter::new();
    let mut xyz = match &cfg.output.xyz {
        Some(path) => Some(XyzWriter::create(path).with_context(|| format!("creating {}", path.display()))?),
        None => None,
    };

    let mut writers = MultiWriter::new().with(&mut energy);
    if !cfg.output.quiet {
        writers = writers.with(&mut progress);
    }
    if let Some(w) = xyz.as_mut() {
        writers = writers.with(w);
    }

    let outcome = simulator.simulate(&mut criteria, &mut writers)?;
    drop(writers);

    info!(
        time = outcome.time,
        ticks = outcome.ticks,
        reason = ?outcome.reason,
        write_failures = outcome.write_failures,
        "run summary"
    );
    if let Some(flow) = criteria.flow() {
        info!(exits = flow.exits(), rate = ?flow.mean_flow_rate(), "flow");
    }

    if let Some(path) = &cfg.output.kinetic_energy {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        energy.write_csv(BufWriter::new(file))?;
    }

    Ok(())
}
