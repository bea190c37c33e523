//! simpulse CLI entry point

use anyhow::{Context, Result};
use simpulse::bus::memory::MemoryBus;
use simpulse::config::{self, cli::Cli, validator};
use simpulse::orchestrator::Orchestrator;
use simpulse::sampler::DistributionRegistry;
use simpulse::session::SessionContext;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&cli.log_level)
                .context("Invalid --log-level filter")?,
        )
        .init();

    println!("simpulse v{}", env!("CARGO_PKG_VERSION"));
    println!("Device-fleet simulator");
    println!();

    // Load and validate configuration; any failure here exits before a
    // single device starts
    let bus_config = config::load_bus_config(&cli.config)?;
    println!(
        "Loaded config: Host - {}, port - {}, keepalive - {}s",
        bus_config.hostname, bus_config.port, bus_config.keepalive
    );

    let devices = config::load_devices(&cli.devices)?;
    println!(
        "{} device(s) {} loaded!",
        devices.len(),
        if devices.len() > 1 { "were" } else { "was" }
    );

    let distributions = config::load_distributions(&cli.distributions)?;
    validator::validate_fleet(&devices, &distributions)
        .context("Configuration validation failed")?;
    let registry = DistributionRegistry::build(&distributions)?;

    if cli.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let session = match cli.session_id {
        Some(id) => SessionContext::new(id),
        None => SessionContext::generate(),
    };
    println!(
        "Use this session id to communicate with the devices: {}",
        session.id()
    );
    println!();

    // In-process loopback bus; a broker-backed BusConnector built from
    // bus_config plugs in here when an external transport is wired up
    let connector = Arc::new(MemoryBus::new());

    let orchestrator = Orchestrator::new(devices, &registry, session, connector)?;
    orchestrator.run()
}
