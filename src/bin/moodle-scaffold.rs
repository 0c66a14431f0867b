// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use moodle_scaffold::{
    ComposerScripts, Overrides, ProjectLayout, Scaffolder, TerminalChannel,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::process::exit;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "moodle-scaffold <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        match self.command {
            Command::Scaffold => run_scaffold().await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Scaffold Moodle configuration into the current Composer project.
    #[command(name = "moodle:scaffold", visible_alias = "scaffold")]
    Scaffold,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn run_scaffold() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let layout = ProjectLayout::discover(&cwd)?;
    let overrides = Overrides::discover(&cwd);
    let dispatcher = ComposerScripts::new(layout.clone());

    let mut scaffolder = Scaffolder::new(layout, overrides, TerminalChannel::new(), dispatcher)
        .with_progress(ProgressBar::new_spinner());
    scaffolder.run().await?;

    Ok(())
}
