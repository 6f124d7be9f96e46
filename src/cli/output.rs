//! Console output for CLI commands

use std::io::Write;

use colored::Colorize;

use crate::terminal::{TerminalMessage, TerminalModel};

/// Display the running terminal list
pub fn display_running(models: &[TerminalModel]) {
    println!("{}", "Running terminals:".bold());
    if models.is_empty() {
        println!("   (No running terminals)");
    } else {
        for (i, model) in models.iter().enumerate() {
            println!("   {}. {}", i + 1, model.name.cyan());
        }
    }
}

pub fn display_created(name: &str) {
    println!("{} {}", "Created terminal".green(), name.cyan().bold());
}

pub fn display_shutdown(name: &str) {
    println!("{} {}", "Shut down terminal".yellow(), name.cyan().bold());
}

pub fn display_attached(name: &str, url: &str) {
    eprintln!(
        "{} {} ({})",
        "Attached to terminal".green(),
        name.cyan().bold(),
        url.dimmed()
    );
}

pub fn display_detached(reason: &str) {
    eprintln!();
    eprintln!("{} {}", "Detached:".yellow(), reason);
}

/// Write terminal output verbatim
pub fn write_stdout(message: &TerminalMessage) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(message.text().as_bytes())?;
    stdout.flush()
}
