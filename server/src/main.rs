use clap::Parser;
use log::info;
use server::gateway::{bind, serve};
use server::AppState;

/// Authoritative room server for shared-space movement, combat and voice signaling
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, env = "HUDDLE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, env = "HUDDLE_PORT", default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    // One room for the whole process, shared by every connection
    let state = AppState::new();
    let listener = bind(&address).await?;

    info!("WebSocket endpoint: ws://{}/ws", address);
    info!("Health check: http://{}/health", address);

    tokio::select! {
        result = serve(listener, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
