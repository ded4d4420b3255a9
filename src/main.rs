//! rawws demo server.
//!
//! Accepts WebSocket connections and logs every connection, message and
//! close reason.
//!
//! # Usage
//!
//! ```text
//! rawws [OPTIONS]
//!
//! Options:
//!   --port <PORT>   TCP port to listen on [default: 2345]
//!   --host <HOST>   IP address to bind [default: 0.0.0.0]
//! ```
//!
//! The log level is controlled by `RUST_LOG` (e.g. `RUST_LOG=rawws=debug`).

use std::net::IpAddr;

use anyhow::Context;
use clap::Parser;
use rawws::{Config, DEFAULT_PORT, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// WebSocket server that logs what its clients send.
#[derive(Debug, Parser)]
#[command(name = "rawws", about = "Minimal RFC 6455 WebSocket server", version)]
struct Cli {
    /// TCP port for the WebSocket server to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// IP address to bind the WebSocket server to.
    ///
    /// Use `0.0.0.0` to accept connections on every interface, or
    /// `127.0.0.1` to accept only local connections.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
}

impl Cli {
    fn into_config(self) -> Config {
        Config::default().with_host(self.host).with_port(self.port)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config();
    let addr = config.bind_addr();

    let server = Server::bind(config)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))?;

    server.on_connection(|ws| {
        let ip = ws.ip();
        info!(%ip, "connected");

        ws.on_message_text(move |text| info!(%ip, %text, "text message"));
        ws.on_message_binary(move |data| info!(%ip, len = data.len(), "binary message"));
        ws.on_close(move |reason| info!(%ip, %reason, "disconnected"));
    });

    let accept_loop = server.start_background();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Ctrl+C received; shutting down");

    server.stop().await;
    accept_loop.await.context("accept loop panicked")?;

    Ok(())
}
