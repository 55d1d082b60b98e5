//! datapath-bench: a UDP test endpoint for device data-path validation
//!
//! Three channels run concurrently against one shared reference packet:
//! - Upload (7777): receives and tallies packets, never replies
//! - Echo (7778): sends valid packets straight back to the sender
//! - Download (7779): streams paced bursts of the reference packet on a
//!   valid trigger
//!
//! The reference packet is generated from a seeded pseudo-random stream;
//! the device under test must use the same length, seed, and generator.
//! Configuration via CLI arguments or TOML file.

mod channels;
mod config;
mod packet;
mod server;
mod shutdown;
mod validator;

use config::Config;
use server::Server;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        upload_port = config.upload_port,
        echo_port = config.echo_port,
        download_port = config.download_port,
        packet_length = config.packet_length,
        seed = config.seed,
        "Starting datapath-bench server"
    );

    // Bind failures abort startup here rather than leaving a dead channel
    let server = Server::bind(&config).await?;
    let shutdown = server.shutdown_handle();
    let channels = tokio::spawn(server.run());

    wait_for_stop().await;

    info!("Shutting down");
    shutdown.shutdown();
    channels.await?;

    Ok(())
}

/// Block until the operator asks to stop: a line on stdin or Ctrl-C.
///
/// When stdin is closed (detached runs), fall back to Ctrl-C only.
async fn wait_for_stop() {
    info!("Press Enter or Ctrl-C to stop the server");

    let mut line = String::new();
    let mut stdin = BufReader::new(io::stdin());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        read = stdin.read_line(&mut line) => {
            if matches!(read, Ok(0)) {
                // stdin hit EOF; wait for the signal instead
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
}
