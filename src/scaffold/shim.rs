// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shim configuration file.
//!
//! Moodle looks for its `config.php` inside its own code directory. Composer
//! installs that directory as a dependency, so the real configuration file
//! lives at the project root instead. The shim placed inside the Moodle
//! directory just pulls the real one in, and then bootstraps Moodle.

use crate::{channel::InteractionChannel, config::{ProjectLayout, CONFIG_FILE_NAME}, path};

use std::{fs::write, path::PathBuf};
use tracing::{instrument, warn};

/// Generator of the shim configuration file.
#[derive(Debug)]
pub struct ShimFile<'a> {
    layout: &'a ProjectLayout,
}

impl<'a> ShimFile<'a> {
    /// Construct new shim generator for project layout.
    pub fn new(layout: &'a ProjectLayout) -> Self {
        Self { layout }
    }

    /// Path the shim gets written to.
    pub fn path(&self) -> PathBuf {
        self.layout.moodle_path().join(CONFIG_FILE_NAME)
    }

    /// Shim file content.
    pub fn content(&self) -> String {
        let relative = path::relative_path(self.layout.moodle_path(), self.layout.root());
        let relative = relative.to_string_lossy().replace('\\', "/");

        format!(
            "<?php\n\
             \n\
             // This file is generated by the Moodle scaffold tool. Do not edit it.\n\
             // Site configuration belongs in the config.php file of the project root.\n\
             \n\
             require_once(__DIR__ . '/{relative}/{CONFIG_FILE_NAME}');\n\
             require_once(__DIR__ . '/lib/setup.php');\n"
        )
    }

    /// Write the shim file, replacing whatever is there.
    ///
    /// Does nothing if Moodle is not installed yet, or if it is installed
    /// straight into the project root where the shim would clobber the real
    /// configuration file.
    ///
    /// # Errors
    ///
    /// - Return [`std::io::Error`] if shim cannot be written.
    #[instrument(skip_all, level = "debug")]
    pub fn generate(&self, channel: &mut impl InteractionChannel) -> std::io::Result<bool> {
        let moodle_path = self.layout.moodle_path();
        if moodle_path == self.layout.root() {
            warn!("moodle installed into project root, no shim needed");
            return Ok(false);
        }

        if !moodle_path.is_dir() {
            warn!("moodle not found at {:?}, skipping shim", moodle_path.display());
            channel.write(&format!(
                "- Moodle not found at {}. Skipping shim configuration file.",
                moodle_path.display()
            ));
            return Ok(false);
        }

        write(self.path(), self.content())?;
        channel.write("- Generated Moodle configuration shim file.");

        Ok(true)
    }
}
