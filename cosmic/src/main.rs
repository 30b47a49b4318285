use cosmic::CosmicProvider;
use tfplug::{serve, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries the plugin handshake
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if let Err(e) = serve(CosmicProvider::new(), ServerConfig::from_env()).await {
        tracing::error!("provider server failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
