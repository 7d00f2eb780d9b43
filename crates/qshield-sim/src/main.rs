//! qshield-sim - QKD channel simulator
//!
//! Usage:
//!   qshield-sim run --duration 30s --attacks intercept_resend
//!   qshield-sim run --baseline noisy_channel --format json --assets-url http://localhost:8000/assets
//!   qshield-sim storyboard e91 --attack
//!   qshield-sim list

use clap::{Parser, Subcommand, ValueEnum};
use qshield_core::{EngineConfig, ThreatStateEngine};
use qshield_sim::{
    DirAssetSource, HttpAssetSource, LoaderConfig, SimulationDriver, e91_walkthrough, load_assets,
    rsa_walkthrough, scenarios,
};
use std::error::Error;
use tracing::{Level, warn};

#[derive(Parser)]
#[command(name = "qshield-sim")]
#[command(about = "Quantum key distribution threat-state simulator")]
struct Cli {
    /// Engine configuration (JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Base URL serving rsa.json and key_exchange.json
    #[arg(long, global = true)]
    assets_url: Option<String>,

    /// Directory holding rsa.json and key_exchange.json
    #[arg(long, global = true, conflicts_with = "assets_url")]
    assets_dir: Option<String>,

    /// RNG seed for reproducible keys and Bell tests
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the engine with simulated channel traffic
    Run {
        /// Duration (e.g., 30s, 5m)
        #[arg(short, long, default_value = "30s")]
        duration: String,

        /// Baseline channel scenario
        #[arg(short, long, default_value = "quiet_channel")]
        baseline: String,

        /// Attacks to inject (comma-separated)
        #[arg(short, long)]
        attacks: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        format: OutputFormat,

        /// Tick interval in milliseconds
        #[arg(long, default_value = "500")]
        tick_ms: u64,
    },

    /// List available scenarios
    List,

    /// Print a protocol walkthrough
    Storyboard {
        protocol: Protocol,

        /// Run the E91 exchange with an eavesdropper on the channel
        #[arg(long)]
        attack: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Protocol {
    Rsa,
    E91,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List => {
            run_list();
            Ok(())
        }
        Commands::Run {
            ref duration,
            ref baseline,
            ref attacks,
            format,
            tick_ms,
        } => {
            let engine = build_engine(&cli).await?;
            run_simulation(engine, duration, baseline, attacks.as_deref(), format, tick_ms)
        }
        Commands::Storyboard { protocol, attack } => {
            let engine = build_engine(&cli).await?;
            run_storyboard(engine, protocol, attack)
        }
    }
}

async fn build_engine(cli: &Cli) -> Result<ThreatStateEngine, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let loader = LoaderConfig::default();
    let assets = if let Some(url) = &cli.assets_url {
        match HttpAssetSource::new(url.as_str(), loader) {
            Ok(source) => Some(load_assets(&source, &config).await.0),
            Err(e) => {
                warn!(error = %e, "HTTP client unavailable, using built-in assets");
                None
            }
        }
    } else if let Some(dir) = &cli.assets_dir {
        Some(load_assets(&DirAssetSource::new(dir), &config).await.0)
    } else {
        None
    };

    Ok(match assets {
        Some(assets) => ThreatStateEngine::with_assets(config, assets),
        None => ThreatStateEngine::new(config),
    })
}

fn run_simulation(
    engine: ThreatStateEngine,
    duration: &str,
    baseline: &str,
    attacks: Option<&str>,
    format: OutputFormat,
    tick_ms: u64,
) -> Result<(), Box<dyn Error>> {
    eprintln!("╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║           QSHIELD-SIM Channel Simulation                     ║");
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║ Duration: {:50} ║", duration);
    eprintln!("║ Baseline: {:50} ║", baseline);
    eprintln!("║ Attacks: {:51} ║", attacks.unwrap_or("none"));
    eprintln!("╚══════════════════════════════════════════════════════════════╝");

    let duration_ns = parse_duration(duration).saturating_mul(1_000_000_000);
    let tick_ns = tick_ms.max(1).saturating_mul(1_000_000);

    let mut driver = SimulationDriver::new(engine);
    driver.start(baseline);

    if let Some(list) = attacks {
        let count = list.split(',').count() as u64;
        let slot_ns = duration_ns / (count + 1);
        let mut offset_ns = slot_ns / 2;

        for name in list.split(',').map(str::trim) {
            match driver.schedule_attack(name, offset_ns, slot_ns / 2) {
                Some(id) => eprintln!(
                    "Scheduled attack '{}' (id: {}) at offset {}ms for {}ms",
                    name,
                    id,
                    offset_ns / 1_000_000,
                    slot_ns / 2 / 1_000_000
                ),
                None => eprintln!("Warning: Unknown attack type '{}'", name),
            }
            offset_ns = offset_ns.saturating_add(slot_ns);
        }
    }

    eprintln!("\nRunning...\n");

    let mut elapsed_ns = 0u64;
    while elapsed_ns < duration_ns {
        let report = driver.tick(tick_ns);
        elapsed_ns = elapsed_ns.saturating_add(tick_ns);

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
            OutputFormat::Pretty => {
                for alert in &report.alerts {
                    println!(
                        "[{:>7.1}s] {:?} score={:.2} {} | {}",
                        report.elapsed_ns as f64 / 1e9,
                        report.snapshot.status,
                        report.snapshot.anomaly_score,
                        report.threat_level,
                        alert
                    );
                }
            }
        }
    }

    let outcome = driver.engine_mut().start_default_key_exchange()?;
    let stats = driver.stats().clone();

    eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║                    Simulation Complete                        ║");
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║ Ticks: {:54} ║", stats.tick_count);
    eprintln!("║ QBER samples: {:47} ║", stats.samples_observed);
    eprintln!("║ Alerts raised: {:46} ║", stats.alerts_raised);
    eprintln!("║ Final status: {:47} ║", format!("{:?}", driver.engine().status()));
    eprintln!("║ Recommendation: {:45} ║", driver.engine().recommendation());
    eprintln!(
        "║ Final key: {:50} ║",
        format!("{} bits, {}", outcome.shared_key.len(), outcome.profile.name())
    );
    for window in driver.ground_truth() {
        let latency = window
            .detection_latency_ns()
            .map(|ns| format!("{}ms", ns / 1_000_000))
            .unwrap_or_else(|| "missed".to_string());
        eprintln!(
            "║ {:30} detected after {:15} ║",
            window.attack_type, latency
        );
    }
    eprintln!("╚══════════════════════════════════════════════════════════════╝");
    Ok(())
}

fn run_list() {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║              Available Channel Scenarios                      ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (name, description) in scenarios::list_scenarios() {
        println!("║ {:18} - {:38} ║", name, description);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("\nUsage: qshield-sim run --baseline <SCENARIO> --attacks <ATTACK1,ATTACK2>");
}

fn run_storyboard(
    mut engine: ThreatStateEngine,
    protocol: Protocol,
    attack: bool,
) -> Result<(), Box<dyn Error>> {
    let frames = match protocol {
        Protocol::Rsa => rsa_walkthrough(&engine.assets().rsa),
        Protocol::E91 => {
            if attack {
                engine.simulate_eavesdropping();
            }
            let outcome = engine.start_default_key_exchange()?;
            let bell = engine.bell_test();
            e91_walkthrough(&outcome, &bell)
        }
    };

    for frame in frames {
        println!(
            "[{}/{}] {:?}: {}",
            frame.index + 1,
            frame.total,
            frame.stage,
            frame.caption
        );
    }
    Ok(())
}

fn parse_duration(s: &str) -> u64 {
    let s = s.trim();
    if let Some(n) = s.strip_suffix('m') {
        n.parse::<u64>().unwrap_or(1).saturating_mul(60)
    } else if let Some(n) = s.strip_suffix('h') {
        n.parse::<u64>().unwrap_or(1).saturating_mul(3600)
    } else if let Some(n) = s.strip_suffix('s') {
        n.parse::<u64>().unwrap_or(30)
    } else {
        s.parse::<u64>().unwrap_or(30)
    }
}
