//! netband: live per-direction and per-subnet bandwidth monitoring.
//!
//! Frames are captured with libpcap on a dedicated thread, classified as
//! inbound or outbound by their Ethernet destination, optionally attributed
//! to configured subnets, and summed into a shared [`core::CounterBank`].
//! A tokio task drains the bank every interval and reports rates to the
//! terminal or to per-subnet files.

pub mod capture;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod interface;
pub mod report;
pub mod services;

use clap::Parser;

use cli::Cli;
use services::MonitorServices;

/// Binary entry point: parse flags, set up logging, run until interrupted.
pub fn run() -> anyhow::Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in netband: {info}");
        default_hook(info);
    }));

    let cli = Cli::parse();

    // Logs go to stderr so the in-place rate line on stdout stays intact.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_directive().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.list_interfaces {
        for iface in interface::list_interfaces() {
            println!("{iface}");
        }
        return Ok(());
    }

    let config = cli.into_config()?;
    tracing::debug!("Configuration: {config:?}");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("netband-worker")
        .build()?;

    runtime.block_on(async {
        let services = MonitorServices::start(&config)?;
        services.run_until_shutdown().await
    })
}
