// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Moodle scaffolding.
//!
//! Composer installs Moodle as just another dependency, which leaves a fresh
//! project without anything Moodle needs to actually boot. The __scaffolder__
//! fills that gap right after installation:
//!
//! 1. Announce the start of scaffolding to listeners.
//! 2. Write the shim configuration file into the Moodle directory.
//! 3. Generate the project configuration file if there is none yet, and
//!    optionally run Moodle's database installer right after.
//! 4. Announce the end of scaffolding to listeners.
//!
//! # Idempotence
//!
//! Running the scaffolder again over a configured project only rewrites the
//! shim. An existing configuration file is never touched, and the installer is
//! never run for it.
//!
//! # Overrides
//!
//! Every question the scaffolder would ask can be answered ahead of time
//! through [`Overrides`], which makes unattended setups possible. An override
//! always wins over asking.

pub mod config_file;
pub mod events;
pub mod gitignore;
pub mod installer;
pub mod shim;

use crate::{
    channel::{ChannelError, InteractionChannel},
    config::{ConfigError, ProjectLayout},
    overrides::{self, Overrides},
};
use config_file::{ConfigGenerator, Generation};
use events::{EventDispatcher, EventError, ScaffoldEvent};
use installer::{InstallOutcome, InstallRunner};
use shim::ShimFile;

use indicatif::ProgressBar;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

const BANNER: &str = r" __  __                 _ _
|  \/  | ___   ___   __| | | ___
| |\/| |/ _ \ / _ \ / _` | |/ _ \
| |  | | (_) | (_) | (_| | |  __/
|_|  |_|\___/ \___/ \__,_|_|\___|
";

/// Outcome of the configuration step of a scaffold run.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConfigStep {
    /// Configuration file existed before the run.
    AlreadyExists,

    /// User chose not to generate a configuration file.
    NotRequested,

    /// Generator ran, possibly followed by the installer.
    Generated {
        generation: Generation,
        install: Option<InstallOutcome>,
    },
}

/// Summary of a finished scaffold run.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ScaffoldReport {
    /// Whether the shim file was written.
    pub shim_written: bool,

    /// What happened to the configuration file.
    pub config: ConfigStep,
}

/// Orchestrator of a scaffold run.
///
/// Generic over how it talks to the user, and over who gets told about
/// lifecycle events.
#[derive(Debug)]
pub struct Scaffolder<C, D>
where
    C: InteractionChannel,
    D: EventDispatcher,
{
    layout: ProjectLayout,
    overrides: Overrides,
    channel: C,
    dispatcher: D,
    progress: ProgressBar,
    php_binary: Option<PathBuf>,
}

impl<C, D> Scaffolder<C, D>
where
    C: InteractionChannel,
    D: EventDispatcher,
{
    /// Construct new scaffolder.
    pub fn new(layout: ProjectLayout, overrides: Overrides, channel: C, dispatcher: D) -> Self {
        Self {
            layout,
            overrides,
            channel,
            dispatcher,
            progress: ProgressBar::hidden(),
            php_binary: None,
        }
    }

    /// Spin progress bar while the installer runs.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run installer through specific PHP binary.
    ///
    /// Takes precedence over the `PHP_BINARY` override.
    pub fn with_php_binary(mut self, php_binary: impl Into<PathBuf>) -> Self {
        self.php_binary = Some(php_binary.into());
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Tear down into channel and dispatcher.
    pub fn into_parts(self) -> (C, D) {
        (self.channel, self.dispatcher)
    }

    /// Perform a full scaffold run.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::Event`] if a lifecycle listener fails.
    /// - Return [`ScaffoldError::Shim`] if shim file cannot be written.
    /// - Return [`ScaffoldError::Channel`] if prompting fails.
    /// - Return [`ScaffoldError::Write`] if configuration file cannot be
    ///   written.
    /// - Return [`ScaffoldError::Gitignore`] if `.gitignore` upkeep fails.
    #[instrument(skip(self), fields(root = ?self.layout.root()), level = "debug")]
    pub async fn run(&mut self) -> Result<ScaffoldReport> {
        self.dispatcher.dispatch(ScaffoldEvent::PreScaffold)?;

        self.channel.write(BANNER);
        self.channel.write("Scaffolding Moodle core files...");

        let shim_written = ShimFile::new(&self.layout)
            .generate(&mut self.channel)
            .map_err(|source| ScaffoldError::Shim {
                source,
                path: self.layout.moodle_path().into(),
            })?;

        let config = self.configure().await?;

        self.channel.write("Moodle core files scaffolded successfully.");
        self.dispatcher.dispatch(ScaffoldEvent::PostScaffold)?;

        let report = ScaffoldReport {
            shim_written,
            config,
        };
        info!("scaffold finished with {report:?}");

        Ok(report)
    }

    async fn configure(&mut self) -> Result<ConfigStep> {
        let generator = ConfigGenerator::new(&self.layout, &self.overrides);
        if generator.config_exists() {
            self.channel
                .write("- Configuration file already exists. Skipping generation.");
            return Ok(ConfigStep::AlreadyExists);
        }

        let requested = match self.overrides.flag(overrides::CREATE_CONFIG) {
            Some(requested) => {
                debug!("configuration request answered by {}", overrides::CREATE_CONFIG);
                requested
            }
            None => self.channel.ask_yes_no(
                "A Moodle configuration file does not exist. Do you want to generate a new one now?",
                true,
            )?,
        };

        if !requested {
            self.channel.write(
                "- Skipping configuration file generation. You can create config.php manually later.",
            );
            return Ok(ConfigStep::NotRequested);
        }

        let generation = generator.generate(&mut self.channel)?;
        if generation != Generation::Written {
            return Ok(ConfigStep::Generated {
                generation,
                install: None,
            });
        }

        let mut runner = InstallRunner::new(&self.layout, &self.overrides);
        if let Some(php_binary) = &self.php_binary {
            runner = runner.with_php_binary(php_binary);
        }
        let install = runner.install(&mut self.channel, &self.progress).await?;

        Ok(ConfigStep::Generated {
            generation,
            install: Some(install),
        })
    }
}

/// Scaffold error types.
#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    /// Talking to the user failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Project configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Lifecycle listener failed.
    #[error(transparent)]
    Event(#[from] EventError),

    /// Gitignore upkeep failed.
    #[error(transparent)]
    Gitignore(#[from] gitignore::Error),

    /// Shim file cannot be written.
    #[error("failed to write shim configuration file into {:?}", path.display())]
    Shim {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be written.
    #[error("failed to write configuration file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ScaffoldError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel::ScriptedChannel, config::ComposerManifest};
    use events::NoopDispatcher;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, read_to_string, write};

    fn block_on<F: std::future::Future>(future: F) -> anyhow::Result<F::Output> {
        Ok(tokio::runtime::Runtime::new()?.block_on(future))
    }

    #[sealed_test]
    fn declining_generation_leaves_project_alone() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        let layout = ProjectLayout::new(&root, ComposerManifest::default());
        create_dir_all(layout.moodle_path())?;
        let channel = ScriptedChannel::new(["n"]);

        let mut scaffolder = Scaffolder::new(layout, Overrides::new(), channel, NoopDispatcher);
        let report = block_on(scaffolder.run())??;

        assert_eq!(
            report,
            ScaffoldReport {
                shim_written: true,
                config: ConfigStep::NotRequested,
            }
        );
        assert!(!root.join("config.php").exists());
        assert!(root.join("moodle/config.php").exists());
        assert!(scaffolder.channel().said("Skipping configuration file generation"));
        assert_eq!(scaffolder.channel().output()[0], BANNER);
        assert!(BANNER.contains(r"|_|  |_|\___/ \___/ \__,_|_|\___|"));

        Ok(())
    }

    #[sealed_test]
    fn existing_config_short_circuits() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        write(root.join("config.php"), "<?php // mine\n")?;
        let layout = ProjectLayout::new(&root, ComposerManifest::default());
        let overrides = Overrides::new().with(overrides::CREATE_CONFIG, "1");
        let channel = ScriptedChannel::new(Vec::<String>::new());

        let mut scaffolder = Scaffolder::new(layout, overrides, channel, NoopDispatcher);
        let report = block_on(scaffolder.run())??;

        assert_eq!(report.config, ConfigStep::AlreadyExists);
        assert_eq!(read_to_string(root.join("config.php"))?, "<?php // mine\n");
        assert!(scaffolder.channel().prompts().is_empty());

        Ok(())
    }

    #[sealed_test]
    fn non_interactive_generation_skips_installer() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        let layout = ProjectLayout::new(&root, ComposerManifest::default());
        let overrides = Overrides::new().with(overrides::CREATE_CONFIG, "true");

        let mut scaffolder = Scaffolder::new(
            layout,
            overrides,
            ScriptedChannel::non_interactive(),
            NoopDispatcher,
        );
        let report = block_on(scaffolder.run())??;

        assert_eq!(
            report.config,
            ConfigStep::Generated {
                generation: Generation::NonInteractive,
                install: None,
            }
        );
        assert!(!root.join("config.php").exists());

        Ok(())
    }
}
