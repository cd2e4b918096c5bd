use std::net::SocketAddr;
use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lanshare::{routes, AppState, Config};

#[derive(Parser, Debug)]
#[command(name = "lanshare")]
#[command(about = "LAN file drop and shared clipboard server")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "LANSHARE_PORT", default_value = "8080")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "LANSHARE_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Root directory for shared files
    #[arg(short, long, env = "LANSHARE_ROOT", default_value = "./uploads")]
    root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, env = "LANSHARE_VERBOSE")]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long, env = "LANSHARE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "lanshare=debug,tower_http=debug"
    } else {
        "lanshare=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config from file if provided, otherwise use defaults
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // The root is a drop zone; create it when absent, then resolve it to an
    // absolute path so containment checks compare canonical prefixes.
    if !cli.root.exists() {
        info!("Creating root directory: {}", cli.root.display());
        std::fs::create_dir_all(&cli.root)?;
    }
    let root_dir = cli.root.canonicalize().unwrap_or_else(|_| cli.root.clone());

    if !root_dir.is_dir() {
        return Err(format!("Root path is not a directory: {}", root_dir.display()).into());
    }

    info!("Sharing files from: {}", root_dir.display());

    // Multipart bodies carry framing overhead on top of the file itself
    let body_limit = config.max_upload_size as usize + 64 * 1024;

    let state = AppState::with_config(root_dir, config);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .merge(routes::api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    info!("Starting lanshare on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
