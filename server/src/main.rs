use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::console::spawn_console;
use server::network::Server;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of player slots
    #[arg(short, long)]
    max_players: Option<usize>,

    /// Milliseconds between score ticks
    #[arg(short, long)]
    tick_ms: Option<u64>,

    /// Points the flag holder earns per tick
    #[arg(long)]
    score_increment: Option<f32>,

    /// Score that wins the match
    #[arg(long)]
    win_score: Option<f32>,

    /// Max distance from the flag for a pickup to count
    #[arg(long)]
    pickup_radius: Option<f32>,

    /// Drop clients silent for this many seconds (0 disables)
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// Keep the winner's score instead of zeroing it after a win
    #[arg(long)]
    keep_winner_score: bool,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max_players) = self.max_players {
            config.max_players = max_players;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        if let Some(score_increment) = self.score_increment {
            config.rules.score_increment = score_increment;
        }
        if let Some(win_score) = self.win_score {
            config.rules.win_score = win_score;
        }
        if self.pickup_radius.is_some() {
            config.rules.pickup_radius = self.pickup_radius;
        }
        if let Some(idle_timeout_secs) = self.idle_timeout_secs {
            config.idle_timeout_secs = idle_timeout_secs;
        }
        if self.keep_winner_score {
            config.rules.reset_winner_score = false;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;

    info!("Starting server...");
    info!(
        "Slots: {}, tick: {}ms, win at {} points",
        config.max_players, config.tick_ms, config.rules.win_score
    );

    let server = Server::new(config).await?;
    let handle = server.handle();

    let mut server_task = tokio::spawn(server.run());
    let _console = spawn_console(handle.clone());
    info!("Type 'scores' to see the score table or 'quit' to stop");

    tokio::select! {
        result = &mut server_task => {
            if let Err(e) = result {
                error!("Server task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown().await;
            if let Err(e) = server_task.await {
                error!("Server task panicked: {}", e);
            }
        }
    }

    // Blocking stdin reads would otherwise keep the runtime alive.
    std::process::exit(0);
}
