// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Environment overrides.
//!
//! Every value the scaffolder would otherwise prompt for can be supplied
//! ahead of time through an environment variable. The variables are gathered
//! once into an [`Overrides`] map that gets handed to whoever needs it, rather
//! than being read back out of the process environment at random points.
//!
//! # Sources
//!
//! Dotenv files are consulted relative to the current working directory in
//! this order: `.env`, `.env.local`, `../.env`, `../.env.local`. A later file
//! replaces values set by an earlier one. Variables from the real process
//! environment always win over anything loaded from a dotenv file.
//!
//! # Precedence Over Prompts
//!
//! An override only counts when it is present _and_ non-empty. Setting a
//! variable to the empty string is the same as not setting it at all, so the
//! user still gets prompted.

use crate::validate;

use std::{
    collections::HashMap,
    ffi::OsString,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Whether to generate a configuration file when none exists (bool).
pub const CREATE_CONFIG: &str = "MOODLE_CREATE_CONFIG";

/// Database driver key, e.g., `pgsql`.
pub const DB_DRIVER: &str = "MOODLE_DB_DRIVER";

/// Database user name.
pub const DB_USERNAME: &str = "MOODLE_DB_USERNAME";

/// Database password.
pub const DB_PASSWORD: &str = "MOODLE_DB_PASSWORD";

/// Database name.
pub const DB_NAME: &str = "MOODLE_DB_NAME";

/// Database host.
pub const DB_HOST: &str = "MOODLE_DB_HOST";

/// Database table prefix.
pub const DB_PREFIX: &str = "MOODLE_DB_PREFIX";

/// Web root URL.
pub const WWWROOT: &str = "MOODLE_WWWROOT";

/// Data root directory.
pub const DATAROOT: &str = "MOODLE_DATAROOT";

/// Whether to run the installer without asking first (bool).
pub const RUN_INSTALLER: &str = "MOODLE_RUN_INSTALLER";

/// Prior agreement to the license terms (bool).
pub const AGREE_LICENSE: &str = "MOODLE_AGREE_LICENSE";

/// Admin account email address.
pub const ADMIN_EMAIL: &str = "MOODLE_ADMIN_EMAIL";

/// Admin account password.
pub const ADMIN_PASSWORD: &str = "MOODLE_ADMIN_PASSWORD";

/// Site short name.
pub const SHORTNAME: &str = "MOODLE_SHORTNAME";

/// PHP runtime binary. Composer exports this to the scripts it runs.
pub const PHP_BINARY: &str = "PHP_BINARY";

/// Read-only map of environment overrides.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    vars: HashMap<String, String>,
}

impl Overrides {
    /// Construct new empty override map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gather overrides from dotenv files around `cwd` and the process
    /// environment.
    ///
    /// Dotenv files that fail to parse are skipped with a warning. The process
    /// environment itself is never modified.
    pub fn discover(cwd: impl AsRef<Path>) -> Self {
        let mut overrides = Self::new();
        for path in dotenv_paths(cwd.as_ref()) {
            if path.is_file() {
                overrides.load_dotenv(&path);
            }
        }
        overrides.load_process_env(std::env::vars_os());

        overrides
    }

    fn load_process_env(&mut self, vars: impl IntoIterator<Item = (OsString, OsString)>) {
        for (name, value) in vars {
            match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => {
                    self.vars.insert(name, value);
                }
                // INVARIANT: Every override name is ASCII, so nothing of ours is lost.
                (Ok(name), Err(_)) => debug!("skipping {name}, value is not unicode"),
                (Err(name), _) => debug!("skipping {name:?}, name is not unicode"),
            }
        }
    }

    fn load_dotenv(&mut self, path: &Path) {
        debug!("load dotenv file {:?}", path.display());
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(error) => {
                warn!("skipping dotenv file {:?}: {error}", path.display());
                return;
            }
        };

        // INVARIANT: A dotenv file is applied in full or not at all.
        let mut loaded = Vec::new();
        for item in iter {
            match item {
                Ok(pair) => loaded.push(pair),
                Err(error) => {
                    warn!("skipping dotenv file {:?}: {error}", path.display());
                    return;
                }
            }
        }
        self.vars.extend(loaded);
    }

    /// Set override value, replacing any previous one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Builder form of [`Overrides::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Lookup override that is present and non-empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Lookup override as a boolean flag.
    ///
    /// Returns `None` if the override is absent or empty. Otherwise `1`,
    /// `true`, `on`, and `yes` mean true, and anything else means false.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).map(validate::parse_bool)
    }
}

impl<K, V> FromIterator<(K, V)> for Overrides
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

fn dotenv_paths(cwd: &Path) -> Vec<PathBuf> {
    let mut paths = vec![cwd.join(".env"), cwd.join(".env.local")];
    if let Some(parent) = cwd.parent() {
        paths.push(parent.join(".env"));
        paths.push(parent.join(".env.local"));
    }

    paths
}
