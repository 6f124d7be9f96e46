//! CLI command handlers

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::output;
use super::{Cli, Commands, ConfigAction};
use crate::config::Config;
use crate::terminal::{
    MessageType, SessionOptions, SessionRegistry, SessionState, TerminalManager, TerminalMessage,
};

/// Execute the parsed command
pub async fn run(cli: &Cli, config: Config) -> Result<()> {
    if let Commands::Config { action } = &cli.command {
        return handle_config(cli, &config, action);
    }

    let manager = TerminalManager::new(config.manager_options(), SessionRegistry::new());
    let result = match &cli.command {
        Commands::List => list(&manager).await,
        Commands::Create { name } => create(&manager, name.clone()).await,
        Commands::Shutdown { name } => shutdown(&manager, name).await,
        Commands::Attach { name, rows, cols } => attach(&manager, name.clone(), *rows, *cols).await,
        Commands::Config { .. } => Ok(()),
    };
    manager.dispose();
    result
}

async fn list(manager: &TerminalManager) -> Result<()> {
    let running = manager
        .list_running()
        .await
        .context("Failed to list terminals")?;
    output::display_running(&running);
    Ok(())
}

async fn create(manager: &TerminalManager, name: Option<String>) -> Result<()> {
    let mut options = SessionOptions::new();
    options.name = name;
    let session = manager
        .create(options)
        .await
        .context("Failed to create terminal")?;

    let name = session.name().unwrap_or_default();
    // The terminal keeps running on the server after we let go of it.
    session.dispose();
    output::display_created(&name);
    Ok(())
}

async fn shutdown(manager: &TerminalManager, name: &str) -> Result<()> {
    manager
        .shutdown(name)
        .await
        .with_context(|| format!("Failed to shut down terminal {}", name))?;
    output::display_shutdown(name);
    Ok(())
}

async fn attach(
    manager: &TerminalManager,
    name: Option<String>,
    rows: u16,
    cols: u16,
) -> Result<()> {
    let mut options = SessionOptions::new();
    options.name = name;
    let session = manager
        .create(options)
        .await
        .context("Failed to attach to terminal")?;

    let mut messages = session.message_received();
    let mut status = session.status_changed();
    output::display_attached(
        &session.name().unwrap_or_default(),
        &session.url().unwrap_or_default(),
    );

    // A resize makes the server redraw the current screen.
    session.send(&TerminalMessage::set_size(rows, cols))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let reason = loop {
        tokio::select! {
            message = messages.recv() => {
                match message {
                    Some(message) => match message.kind {
                        MessageType::Stdout => output::write_stdout(&message)?,
                        MessageType::Disconnect => break "terminal disconnected".to_string(),
                        other => debug!("Ignoring {} message", other),
                    },
                    None => break "session ended".to_string(),
                }
            }
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => session.send(&TerminalMessage::stdin(format!("{}\n", line)))?,
                    None => break "end of input".to_string(),
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break "session ended".to_string();
                }
                if let SessionState::Closed(reason) = &*status.borrow() {
                    break reason.clone();
                }
            }
        }
    };

    info!("Leaving terminal: {}", reason);
    session.dispose();
    output::display_detached(&reason);
    Ok(())
}

fn handle_config(cli: &Cli, config: &Config, action: &Option<ConfigAction>) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => config.display(),
        Some(ConfigAction::Reset) => {
            let default_config = Config::default();
            default_config.save_to_file(&cli.config_file)?;
            println!("Wrote default configuration to {}", cli.config_file);
            default_config.display()
        }
    }
}
