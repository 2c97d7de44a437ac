use clap::Parser;
use ema_trader::cli::{print_config, Cli, Commands};
use ema_trader::config::{load_env_file, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before telemetry so the env file can carry RUST_LOG; reported below
    let env_file = load_env_file(&cli.env_file);

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(ema_trader::config::ConfigError::Read { path, source }) => {
            eprintln!("Warning: Could not load config from {}: {}", path.display(), source);
            eprintln!("Using bundled example configuration");
            Config::from_toml(include_str!("../config.toml.example"))?
        }
        Err(e) => return Err(e.into()),
    };

    // Initialize telemetry
    ema_trader::telemetry::init_telemetry(&config.telemetry)?;

    match env_file {
        Ok(true) => tracing::debug!(path = %cli.env_file, "Loaded environment file"),
        Ok(false) => tracing::debug!(path = %cli.env_file, "No environment file"),
        Err(e) => tracing::warn!(
            path = %cli.env_file,
            error = %e,
            "Failed to load environment file"
        ),
    }

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting bot");
            args.execute(config).await?;
        }
        Commands::Balance(args) => args.execute(config).await?,
        Commands::Indicators(args) => args.execute(config).await?,
        Commands::Trade(args) => {
            tracing::info!(symbol = %args.symbol, side = %args.side, "Manual trade");
            args.execute(config).await?;
        }
        Commands::Config => print_config(&config),
    }

    Ok(())
}
