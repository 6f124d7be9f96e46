use colored::Colorize;
use remote_term::{AppResult, cli::Cli, cli::commands, config::Config, init_logging};

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse_args();

    // Load configuration; logging is not up yet, so report a bad file on stderr
    let (mut config, load_error) = match Config::load_or_default(&cli.config_file) {
        Ok(config) => (config, None),
        Err(e) => {
            eprintln!("{} {:#}; using defaults", "Warning:".yellow().bold(), e);
            (Config::default(), Some(e))
        }
    };
    cli.apply_overrides(&mut config);

    // Initialize logging
    let _log_guard = init_logging(
        &cli.effective_log_level(&config),
        config.log.file_path.as_deref(),
    )?;

    if let Some(e) = load_error {
        tracing::warn!("Failed to load config {}: {:#}", cli.config_file, e);
    }
    tracing::debug!("CLI arguments: {:?}", cli);

    if let Err(e) = commands::run(&cli, config).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
