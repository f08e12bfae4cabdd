use anyhow::Result;
use clap::Parser;
use multimouse::server::{Server, ServerConfig, DEFAULT_PORT};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "multimouse", about = "Run the multimouse relay server")]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Disable the activity spinner.
    #[arg(short, long, default_value_t = false)]
    no_spinner: bool,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[arg(long, env = "MULTIMOUSE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.json_logs);

    let server = Server::new(ServerConfig {
        host: cli.host,
        port: cli.port,
        spinner: !cli.no_spinner,
        ..ServerConfig::default()
    });

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting multimouse");

    server.listen().await?;
    Ok(())
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        // stdout belongs to the spinner.
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
