use clap::Parser;
use log::{error, info};
use server::config::Config;
use server::game;
use server::network::Server;

/// Parses configuration, then runs the game task and the WebSocket server side by side.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let settings = config.round_settings();
    info!(
        "Rounds last {}s with {}s breaks",
        settings.round_duration,
        settings.break_duration.as_secs()
    );

    let (game, game_handle) = game::spawn(settings);
    let server = Server::bind(&config.address(), game, config.outbox_capacity).await?;

    let server_handle = tokio::spawn(server.run());

    // Handle shutdown gracefully
    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Err(e)) => error!("Server stopped: {}", e),
                Err(e) => error!("Network task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        result = game_handle => {
            if let Err(e) = result {
                error!("Game loop task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
