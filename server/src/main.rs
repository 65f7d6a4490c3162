use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::{BoxError, Server};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    info!(
        "Starting presence server (max {} clients, spawn offset {}, range {})",
        config.max_clients, config.spawn_offset, config.spawn_range
    );

    let mut server = Server::new(&config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
