//! Split-plane HTTP server
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                   SERVER                     │
//!   app traffic   │  ┌──────────┐                 ┌───────────┐  │
//!  ───────────────┼─▶│ app      │──┐           ┌─▶│ app       │  │
//!                 │  │listeners │  │  ┌─────┐  │  │ handler   │  │
//!                 │  └──────────┘  ├─▶│ dis-│──┤  └───────────┘  │
//!   ops traffic   │  ┌──────────┐  │  │patch│  │  ┌───────────┐  │
//!  ───────────────┼─▶│ admin    │──┘  └─────┘  └─▶│ admin     │  │
//!                 │  │listeners │                 │ handler   │  │
//!                 │  └──────────┘                 └───────────┘  │
//!                 │   app pool "app-N"  |  admin pool "admin-N"  │
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use axum::{routing::get, Router};
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;

use split_plane::admin::{admin_handler, AdminState};
use split_plane::config::{load_config, Config};
use split_plane::observability::{logging::init_logging, metrics::install_recorder};
use split_plane::{Handler, Handlers, ServerFactory};

#[derive(Parser)]
#[command(name = "split-plane")]
#[command(about = "HTTP server with separate application and admin planes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server until a termination signal arrives
    Server {
        /// TOML configuration file; built-in defaults when omitted
        config: Option<PathBuf>,
    },
    /// Validate a configuration file and exit
    Check {
        /// TOML configuration file
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => match load_config(&config) {
            Ok(_) => {
                println!("{}: configuration OK", config.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", config.display(), e);
                ExitCode::FAILURE
            }
        },
        Commands::Server { config } => {
            let config = match config {
                Some(path) => match load_config(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("{}: {}", path.display(), e);
                        return ExitCode::FAILURE;
                    }
                },
                None => Config::default(),
            };

            match run(config) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "Server exited with error");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&config.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "split-plane starting");

    let metrics = if config.metrics.enabled {
        Some(install_recorder()?)
    } else {
        None
    };

    let handlers = Handlers {
        application: application_handler(),
        admin: admin_handler(AdminState::new(metrics)),
    };

    let server = ServerFactory::new(config.server).build(handlers)?;
    server.start()?;
    server.run_until_shutdown()?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn application_handler() -> Handler {
    let router = Router::new()
        .route("/", get(|| async { "split-plane\n" }))
        .layer(TraceLayer::new_for_http());
    Handler::new("application", router)
}
