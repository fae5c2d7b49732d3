//! HTTP server binary for the generation provider
//!
//! Starts an HTTP server that exposes image generation over a REST
//! endpoint. The generator session is created once at startup; its
//! session key is acquired lazily on the first generation request.
//!
//! # Usage
//!
//! ```bash
//! perchance-gen-server --port 8888 --host 0.0.0.0
//! ```
//!
//! # API Endpoints
//!
//! - `POST /api/txttoimage`: Generate an image from a prompt
//! - `GET /health`: Health check endpoint
//! - `GET /`: Service banner

use clap::Parser;
use perchance_gen_provider::config::ConfigLoader;
use std::path::PathBuf;

/// HTTP server for the Perchance generation provider
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8888")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    // Load configuration, falling back to the default config location
    let config_path = cli
        .config
        .clone()
        .or_else(perchance_gen_provider::Settings::default_config_path);
    let mut settings = ConfigLoader::new().load(config_path.as_deref())?;

    // Override with CLI arguments
    settings.server.host = cli.host.clone();
    settings.server.port = cli.port;

    tracing::info!(
        "Starting generation provider v{}",
        perchance_gen_provider::utils::version::get_version()
    );

    // Create the Axum application
    let app = perchance_gen_provider::server::app::create_app(settings)?;

    let addr = parse_and_bind_address(&cli.host, cli.port).await?;

    tracing::info!(
        "Generation provider v{} listening on {}",
        perchance_gen_provider::utils::version::get_version(),
        addr
    );

    // Start the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse host string and attempt to bind to the address
///
/// Accepts literal IP addresses plus the `::` and `0.0.0.0` any-address
/// forms; binding to `::` falls back to IPv4 when IPv6 is unavailable.
pub async fn parse_and_bind_address(host: &str, port: u16) -> anyhow::Result<std::net::SocketAddr> {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

    // Try to parse as IP address first
    if let Ok(ip) = host.parse::<IpAddr>() {
        let addr = SocketAddr::new(ip, port);
        tracing::debug!("Parsed address: {}", addr);
        return Ok(addr);
    }

    match host {
        "::" => {
            let addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);

            // Test if we can bind to IPv6
            match tokio::net::TcpListener::bind(addr).await {
                Ok(_) => Ok(addr),
                Err(e) => {
                    tracing::warn!(
                        "Could not listen on [::]:{} (Caused by {}), falling back to 0.0.0.0",
                        port,
                        e
                    );
                    Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
                }
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid host address: {}. Use a literal IP, '::' or '0.0.0.0'",
                host
            );
        }
    }
}
