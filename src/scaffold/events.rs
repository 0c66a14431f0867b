// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Scaffold lifecycle events.
//!
//! The scaffolder announces when it starts and when it finishes, so the host
//! project can hook its own work in around it. Composer projects do this
//! through the `scripts` section of their manifest, keyed by event name:
//!
//! ```json
//! {
//!     "scripts": {
//!         "moodle-pre-scaffold": "echo about to scaffold",
//!         "moodle-post-scaffold": ["php admin/cli/purge_caches.php"]
//!     }
//! }
//! ```

use crate::config::ProjectLayout;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    process::Command,
};
use tracing::{debug, info, instrument, warn};

/// Points in the scaffold run that listeners can hook into.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ScaffoldEvent {
    /// Dispatched before any file is touched.
    PreScaffold,

    /// Dispatched after everything else is done.
    PostScaffold,
}

impl ScaffoldEvent {
    /// Event name as listeners know it.
    pub fn name(self) -> &'static str {
        match self {
            Self::PreScaffold => "moodle-pre-scaffold",
            Self::PostScaffold => "moodle-post-scaffold",
        }
    }
}

impl Display for ScaffoldEvent {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.name())
    }
}

/// Deliver lifecycle events to whoever listens.
pub trait EventDispatcher {
    /// Notify listeners of an event.
    fn dispatch(&mut self, event: ScaffoldEvent) -> Result<()>;
}

/// Dispatcher without listeners.
#[derive(Debug, Default)]
pub struct NoopDispatcher;

impl EventDispatcher for NoopDispatcher {
    fn dispatch(&mut self, event: ScaffoldEvent) -> Result<()> {
        debug!("no listeners for {event}");
        Ok(())
    }
}

/// Dispatcher that runs commands from the manifest `scripts` section.
///
/// Each command runs through the platform shell with the install root as its
/// working directory, inheriting standard streams.
#[derive(Debug, Clone)]
pub struct ComposerScripts {
    layout: ProjectLayout,
}

impl ComposerScripts {
    /// Construct new script dispatcher for project layout.
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }
}

impl EventDispatcher for ComposerScripts {
    #[instrument(skip(self), level = "debug")]
    fn dispatch(&mut self, event: ScaffoldEvent) -> Result<()> {
        for command in self.layout.script_commands(event.name()) {
            // INVARIANT: References to other Composer scripts and PHP callbacks
            // need Composer itself to resolve.
            if command.starts_with('@') {
                warn!("skipping unsupported script reference {command:?} for {event}");
                continue;
            }

            info!("run {event} script: {command}");
            shell(command, self.layout.root())?;
        }

        Ok(())
    }
}

fn shell(command: &str, cwd: &Path) -> Result<()> {
    #[cfg(unix)]
    let mut process = {
        let mut process = Command::new("sh");
        process.arg("-c").arg(command);
        process
    };
    #[cfg(windows)]
    let mut process = {
        let mut process = Command::new("cmd");
        process.arg("/C").arg(command);
        process
    };

    let status = process
        .current_dir(cwd)
        .status()
        .map_err(|source| EventError::Spawn {
            source,
            command: command.to_string(),
        })?;

    if !status.success() {
        return Err(EventError::Failed {
            command: command.to_string(),
            code: status.code(),
        });
    }

    Ok(())
}

/// Lifecycle event error types.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Script command could not be started.
    #[error("failed to run script {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Script command exited unsuccessfully.
    #[error("script {command:?} failed with exit code {code:?}")]
    Failed { command: String, code: Option<i32> },
}

/// Friendly result alias :3
pub type Result<T, E = EventError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComposerManifest;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn event_names() {
        assert_eq!(ScaffoldEvent::PreScaffold.name(), "moodle-pre-scaffold");
        assert_eq!(ScaffoldEvent::PostScaffold.to_string(), "moodle-post-scaffold");
    }

    #[cfg(unix)]
    #[sealed_test]
    fn composer_scripts_run_in_install_root() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let manifest: ComposerManifest = r#"
            {
                "scripts": {
                    "moodle-pre-scaffold": ["@other-script", "echo pre >> events.log"],
                    "moodle-post-scaffold": "echo post >> events.log"
                }
            }
        "#
        .parse()?;
        let mut dispatcher = ComposerScripts::new(ProjectLayout::new(&cwd, manifest));

        dispatcher.dispatch(ScaffoldEvent::PreScaffold)?;
        dispatcher.dispatch(ScaffoldEvent::PostScaffold)?;

        let log = std::fs::read_to_string(cwd.join("events.log"))?;
        assert_eq!(log, "pre\npost\n");

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn composer_script_failure_is_error() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let manifest: ComposerManifest =
            r#"{ "scripts": { "moodle-pre-scaffold": "exit 4" } }"#.parse()?;
        let mut dispatcher = ComposerScripts::new(ProjectLayout::new(&cwd, manifest));

        let result = dispatcher.dispatch(ScaffoldEvent::PreScaffold);

        assert!(matches!(
            result,
            Err(EventError::Failed { code: Some(4), .. })
        ));

        Ok(())
    }
}
