use std::process::ExitCode;

use tracing::{error, info};

use strongbox::{Application, Config, StrongboxError};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(StrongboxError::Io(e)) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if let Err(e) = strongbox::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        strongbox::logging::init_console_only(&config.logging.level);
    }

    info!("Strongbox - encrypted file storage");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> strongbox::Result<()> {
    let app = Application::open(config).await?;
    let config = app.config();
    info!(
        path = %config.database.path,
        schema_version = app.db().schema_version().await?,
        "Metadata store ready"
    );
    info!(
        root = %config.storage.root,
        presigned_url_ttl = ?app.presign_ttl(),
        "Blob store ready"
    );

    app.sessions().purge_expired().await?;

    info!(
        max_share_expiry_hours = config.shares.max_expiry_hours,
        "Strongbox ready"
    );
    Ok(())
}
