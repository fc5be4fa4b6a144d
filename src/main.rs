//! dropload command line.
//!
//! Usage:
//!   dropload upload ./site notes.txt
//!   dropload serve

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};

use dropload::report::ConsoleReporter;
use dropload::upload::{HttpUploader, SubmissionController};
use dropload::web::WebServer;
use dropload::{Config, DroploadError};

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(name = "dropload")]
#[command(about = "Upload dropped files and folders as a hosted site")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload files and directories in one request
    Upload {
        /// Files or directories to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Upload endpoint, overriding the configuration
        #[arg(short, long)]
        endpoint: Option<String>,
    },
    /// Run the upload server
    Serve {
        /// Port to listen on, overriding the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, DroploadError> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => match Config::load(DEFAULT_CONFIG) {
            Ok(config) => config,
            Err(DroploadError::Io(_)) => Config::default(),
            Err(e) => return Err(e),
        },
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match load_config(args.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if args.verbose {
        config.logging.level = "debug".to_string();
    }

    // Initialize logging
    if let Err(e) = dropload::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        dropload::logging::init_console_only(&config.logging.level);
    }

    let result = match args.command {
        Command::Upload { paths, endpoint } => {
            if let Some(endpoint) = endpoint {
                config.client.endpoint = endpoint;
            }
            upload(&config, &paths).await.map(|ok| {
                if ok {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            })
        }
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run one submission and tell whether it succeeded. A failed submission has
/// already been shown by the console reporter, so it is not an `Err`.
async fn upload(config: &Config, paths: &[PathBuf]) -> Result<bool, DroploadError> {
    config.validate()?;

    let uploader = HttpUploader::from_config(&config.client)?;
    info!("uploading to {}", uploader.endpoint());

    let controller = SubmissionController::new(config.policy.to_policy(), uploader, ConsoleReporter)
        .with_expiry_hours(config.client.expiry_hours);

    match controller.submit_paths(paths).await {
        Ok(_) => Ok(true),
        Err(e) => {
            debug!("upload failed: {}", e);
            Ok(false)
        }
    }
}

async fn serve(config: &Config) -> Result<ExitCode, DroploadError> {
    let server = WebServer::new(&config.server)?;
    info!("dropload server starting on {}", server.addr());
    server.run().await?;
    Ok(ExitCode::SUCCESS)
}
