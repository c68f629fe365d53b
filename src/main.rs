use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use imagedrop::{
    Config,
    client::{
        ClientConfig, HttpTransport, MessageKind, SelectedFile, UploadSession, UploadState,
        load_gallery,
    },
    create_app, startup_checks,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server (default if no command specified)
    Serve {
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// Upload image files to a running server
    Upload {
        #[arg(short, long, default_value = "http://127.0.0.1:3000")]
        server: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the gallery of a running server
    Gallery {
        #[arg(short, long, default_value = "http://127.0.0.1:3000")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;

    // RUST_LOG wins over --log-level, which wins over the config file
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.app.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(config, &cli.config, port, host, quit_after).await,
        Some(Commands::Upload { server, files }) => run_upload(server, files).await,
        Some(Commands::Gallery { server }) => run_gallery(server).await,
        None => run_server(config, &cli.config, None, None, None).await,
    }
}

fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        let config_content = std::fs::read_to_string(config_path)?;
        Ok(toml_edit::de::from_str::<Config>(&config_content)?)
    } else {
        Ok(Config::default())
    }
}

async fn run_server(
    config: Config,
    config_path: &Path,
    port: Option<u16>,
    host: Option<String>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() {
        info!("Configuration loaded from: {:?}", config_path);
    } else {
        info!("Config file not found at {:?}, using defaults", config_path);
    }

    let host = host.unwrap_or(config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} server", config.app.name);
    info!(
        "Storage directory: {:?} (served at {})",
        config.upload.storage_directory, config.upload.public_prefix
    );
    info!("Site directory: {:?}", config.static_files.directory);
    info!(
        "Accepting up to {} files of {} bytes each{}",
        config.upload.max_files,
        config.upload.max_file_size,
        if config.upload.partial_success {
            ", partial success enabled"
        } else {
            ""
        }
    );

    // Each failed check is logged where it is detected
    if let Err(errors) = startup_checks::perform_startup_checks(&config).await {
        if errors.iter().any(|e| e.is_critical()) {
            tracing::error!("Uploads will fail until the storage directory is usable");
        } else {
            warn!("Non-critical startup checks failed, continuing");
        }
    }

    let app = create_app(config).await;

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        tracing::error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn run_upload(server: String, paths: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let transport = Arc::new(HttpTransport::new(ClientConfig::with_base_url(server))?);
    let mut session = UploadSession::new(transport);

    let mut candidates = Vec::with_capacity(paths.len());
    for path in &paths {
        match SelectedFile::from_path(path).await {
            Ok(file) => candidates.push(file),
            Err(e) => warn!("Skipping {:?}: {}", path, e),
        }
    }

    let ticket = match session.handle_files(candidates) {
        Ok(ticket) => ticket,
        Err(rejected) => {
            eprintln!("{}", rejected);
            std::process::exit(1);
        }
    };

    for preview in session.previews().await {
        println!(
            "[{}] {} {}x{}",
            preview.position, preview.name, preview.dimensions.0, preview.dimensions.1
        );
    }

    while session.in_flight() > 0 {
        let Some(event) = session.next_event().await else {
            break;
        };
        session.apply(event);
        if let Some(message) = session.message() {
            println!("{}", message);
        }
    }

    if let Some(upload) = session.upload(ticket)
        && let UploadState::Completed { stored } = &upload.state
    {
        for image in stored {
            println!("{} -> {}", image.original_name, image.public_path);
        }
    }

    if session
        .message()
        .is_some_and(|m| m.kind == MessageKind::Error)
    {
        std::process::exit(1);
    }

    Ok(())
}

async fn run_gallery(server: String) -> Result<(), Box<dyn std::error::Error>> {
    let transport = HttpTransport::new(ClientConfig::with_base_url(server))?;
    let view = load_gallery(&transport).await;
    print!("{}", view.render());
    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
