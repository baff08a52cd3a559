//! Kiln cache server binary.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use server::config::{Config, format_size};
use slab_cache::{PAGE_SIZE, SLOT_SIZES, SlabRouter};

#[derive(Parser)]
#[command(name = "kiln-server")]
#[command(about = "Memcached-protocol cache server over a slab-paged LRU cache")]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    config: Option<PathBuf>,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return;
    }

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    server::logging::init(&config.logging);

    if let Err(e) = run(config) {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        budget = %format_size(config.cache.max_bytes),
        page_size = %format_size(PAGE_SIZE),
        slab_classes = SLOT_SIZES.len(),
        core_workers = config.core_workers(),
        max_workers = config.max_workers(),
        "starting cache"
    );

    let cache = Arc::new(
        SlabRouter::builder()
            .max_bytes(config.cache.max_bytes)
            .build()?,
    );

    let handle = server::spawn(&config, cache)?;
    let shutdown = server::signal::install_signal_handler();

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    handle.shutdown();
    tracing::info!("server stopped");
    Ok(())
}

fn print_default_config() {
    let config = r#"# Kiln Server Configuration

[listener]
# Address to listen on
address = "0.0.0.0:11211"

[cache]
# Global memory budget, carved into 16MB pages (e.g. "160MB", "4GB")
max_bytes = "160MB"

[workers]
# Resident worker threads (default: half the CPUs, at least one)
# core_threads = 4

# Upper bound on worker threads (default: number of CPUs)
# max_threads = 8

# Depth of the pending-request queue
queue_depth = 1024

[logging]
# Log level filter (e.g. "info", "server=debug")
level = "info"

# Output format: "pretty", "json", or "compact"
format = "pretty"

# Include timestamps / targets / thread names in events
timestamps = true
target = false
thread_names = true
"#;
    print!("{}", config);
}
