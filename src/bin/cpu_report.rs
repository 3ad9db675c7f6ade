use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use sysinfo::System;
use tracing_subscriber::EnvFilter;

use cpu_env::cpu::{CpuCaps, FeatureDetector};
use cpu_env::fpu::HostFpEnvironment;
use cpu_env::setup::config::{FpuConfig, FpuReport};
use cpu_env::setup::diagnostics::{Diagnostics, EnvStatus, FpuState};
use cpu_env::setup::runtime::RuntimeConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Report CPU capabilities and configure the FPU environment", long_about = None)]
struct Args {
    /// JSON file with an FpuConfig.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Leave denormals-are-zero off.
    #[arg(long)]
    no_daz: bool,

    /// Leave flush-to-zero off.
    #[arg(long)]
    no_ftz: bool,

    /// Also configure a Rayon pool with this many workers.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    cpu_brand: String,
    logical_cores: usize,
    vendor: Option<String>,
    capabilities: CpuCaps,
    daz_supported: bool,
    config: FpuConfig,
    applied: FpuReport,
    state: Option<FpuState>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => FpuConfig::load(path)?,
        None => FpuConfig::default(),
    };
    if args.no_daz {
        config.denormals_are_zero = false;
    }
    if args.no_ftz {
        config.flush_to_zero = false;
    }

    let detector = FeatureDetector::host();
    let mut env = HostFpEnvironment::current();
    let applied = config.apply(&detector, &mut env);

    if let Some(n) = args.threads {
        RuntimeConfig::init_rayon_pool(config, Some(n))?;
    }

    let mut sys = System::new();
    sys.refresh_cpu();
    let cpu_brand = sys
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .unwrap_or_default();

    let daz_supported = detector.has_daz_support();
    let report = Report {
        cpu_brand,
        logical_cores: sys.cpus().len(),
        vendor: detector.vendor(),
        capabilities: detector.processor_capabilities(),
        daz_supported,
        config,
        applied,
        state: Diagnostics::fpu_state(&env),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("CPU: {} ({} logical cores)", report.cpu_brand, report.logical_cores);
    println!("Vendor: {}", report.vendor.as_deref().unwrap_or("unknown"));
    println!("Capabilities: {:?}", report.capabilities);
    println!("DAZ supported: {}", report.daz_supported);
    println!(
        "Applied: DAZ={:?} FTZ={:?} Precision={:?}",
        report.applied.daz, report.applied.ftz, report.applied.precision
    );
    match Diagnostics::check_environment(&env, &config, daz_supported) {
        EnvStatus::Configured => println!("Environment: configured"),
        EnvStatus::Drifted(msg) => println!("Environment: drifted ({})", msg),
        EnvStatus::Unavailable => println!("Environment: no control register on this target"),
    }

    Ok(())
}
