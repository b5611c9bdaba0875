use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_bootstrap::config::schema::LOGGING_SECTION;
use api_bootstrap::config::{ConfigurationSource, LoggingConfig};
use api_bootstrap::http::{service_routes, HttpServer};
use api_bootstrap::lifecycle::{spawn_signal_listener, PipelineAssembler, Shutdown};
use api_bootstrap::observability::logging;
use api_bootstrap::security::RuntimeEnvironmentContext;

#[derive(Debug, Parser)]
#[command(name = "api-bootstrap", version, about = "API service host")]
struct Cli {
    /// Directory containing appsettings.toml.
    #[arg(long, env = "APP_CONTENT_ROOT", default_value = ".")]
    content_root: PathBuf,

    /// Environment name selecting appsettings.{environment}.toml.
    #[arg(long, env = "APP_ENVIRONMENT", default_value = "Production")]
    environment: String,

    /// Overrides Host.BindAddress.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = ConfigurationSource::load(&cli.content_root, &cli.environment);

    // Logging comes up before anything can fail so every fault is recorded.
    let (logging_config, logging_error) = match &loaded {
        Ok(config) => match config.section_or_default::<LoggingConfig>(LOGGING_SECTION) {
            Ok(logging_config) => (logging_config, None),
            Err(e) => (LoggingConfig::default(), Some(e)),
        },
        Err(_) => (LoggingConfig::default(), None),
    };
    logging::init_logging(&logging_config)?;

    if let Some(e) = logging_error {
        tracing::warn!(kind = e.kind(), error = %e, "Logging section ignored; using defaults");
    }
    match &loaded {
        Ok(config) => tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %config.environment(),
            files = ?config.files(),
            "api-bootstrap starting"
        ),
        Err(e) => tracing::error!(
            kind = e.kind(),
            error = %e,
            content_root = %cli.content_root.display(),
            "Configuration could not be loaded"
        ),
    }

    let pipeline = PipelineAssembler::from_load_result(loaded, RuntimeEnvironmentContext::detect())
        .with_routes(service_routes())
        .assemble()?;

    let bind_address = cli.bind.unwrap_or_else(|| pipeline.host.bind_address.clone());
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let telemetry = pipeline.telemetry.clone();
    let server = HttpServer::new(pipeline.router, pipeline.host);
    let result = server.run(listener, &shutdown).await;

    shutdown.complete(&telemetry);
    result?;
    Ok(())
}
