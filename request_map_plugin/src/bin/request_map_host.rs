use clap::Parser;
use request_map_plugin::{PluginConfig, RequestMapPlugin};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

const TICK_INTERVAL: Duration = Duration::from_millis(33);

/// Runs the request-map plugin standalone and waits for a host bridge.
#[derive(Parser, Debug)]
#[command(name = "request_map_host")]
struct Args {
    /// Address the host bridge connects to (overrides REQUEST_MAP_BIND_ADDR).
    #[arg(long)]
    addr: Option<String>,

    /// JSON config file; REQUEST_MAP_* variables are used when absent.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long)]
    vote_duration: Option<u64>,

    #[arg(long)]
    map_switch_delay: Option<u64>,

    #[arg(long)]
    cooldown_delay: Option<u64>,

    #[arg(long)]
    approve_threshold: Option<u32>,

    /// Write the bound address here once listening.
    #[arg(long, value_name = "PATH")]
    addr_file: Option<PathBuf>,

    #[arg(long)]
    run_for_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
            PluginConfig::from_json(&text)?
        }
        None => PluginConfig::from_env()?,
    };
    if let Some(addr) = args.addr {
        config.bind_addr = addr;
    }
    if let Some(v) = args.vote_duration {
        config.vote_duration = v;
    }
    if let Some(v) = args.map_switch_delay {
        config.map_switch_delay = v;
    }
    if let Some(v) = args.cooldown_delay {
        config.cooldown_delay = v;
    }
    if let Some(v) = args.approve_threshold {
        config.approve_threshold = v;
    }

    let plugin = RequestMapPlugin::enable(&config)?;

    if let Some(path) = &args.addr_file {
        fs::write(path, plugin.listen_addr().to_string())?;
    }
    println!("request_map_host listening on ws://{}", plugin.listen_addr());

    let stop_after = args.run_for_ms.map(Duration::from_millis);
    let start = Instant::now();
    loop {
        plugin.tick();
        thread::sleep(TICK_INTERVAL);
        if let Some(max) = stop_after {
            if start.elapsed() >= max {
                break;
            }
        }
    }

    plugin.disable();
    Ok(())
}
