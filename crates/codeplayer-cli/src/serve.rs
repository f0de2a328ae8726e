//! Serve command implementation for the Code Player CLI.
//!
//! Starts the playground server.

use codeplayer_server::ServerConfig;

use crate::colors;

/// Start the playground server.
pub async fn execute(host: &str, port: u16) -> anyhow::Result<()> {
    println!("\n{}Code Player Server{} - Live Preview Playground", colors::BOLD, colors::RESET);
    println!("{}", "─".repeat(50));

    let config = ServerConfig {
        host: host.to_string(),
        port,
        ..ServerConfig::default()
    };

    println!(
        "{}  ◆ Server:{} http://{}:{}",
        colors::CYAN,
        colors::RESET,
        config.host,
        config.port
    );
    println!(
        "{}  ◆ WebSocket:{} ws://{}:{}/ws",
        colors::CYAN,
        colors::RESET,
        config.host,
        config.port
    );
    println!("{}", "─".repeat(50));
    println!("{}Press Ctrl+C to stop{}", colors::GREEN, colors::RESET);
    println!();

    codeplayer_server::serve(config).await?;

    Ok(())
}
