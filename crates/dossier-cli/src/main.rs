//! Dossier CLI Application
//!
//! Command-line interface over the dossier storage layer.

mod args;
mod cli;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use dossier_core::ContextBuilder;
use log::info;
use renderer::TerminalRenderer;
use Commands::*;

// Connections and external tools drive their own event loops, so main stays
// synchronous.
fn main() -> Result<()> {
    env_logger::init();

    let Args {
        settings_file,
        no_color,
        command,
    } = Args::parse();

    let context = ContextBuilder::new()
        .with_settings_path(settings_file)
        .build()
        .context("Failed to load settings")?;
    let cli = Cli::new(context, TerminalRenderer::new(!no_color));

    info!("Dossier started");

    match command {
        Some(Providers) => cli.list_providers(),
        Some(List) | None => cli.list_dossiers(),
        Some(Show { dossier }) => cli.show_dossier(&dossier),
        Some(Define(args)) => cli.define_dossier(args),
        Some(Remove { dossier }) => cli.remove_dossier(&dossier),
        Some(Create(args)) => cli.create_dossier(args),
        Some(Query(args)) => cli.run_query(args),
        Some(Backup(args)) => cli.backup(args),
        Some(Restore(args)) => cli.restore(args),
        Some(Archive(args)) => cli.archive(args),
        Some(Period { command }) => cli.handle_period_command(command),
    }
}
