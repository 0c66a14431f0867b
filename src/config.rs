// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Two kinds of configuration pass through the scaffolder. The first is read:
//! the Composer manifest of the project, which says where dependencies and
//! Moodle itself get installed. The second is written: the Moodle
//! configuration file, whose content is rendered from values collected from
//! the user.

use crate::path;

use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Name of the Composer manifest file.
pub const COMPOSER_MANIFEST: &str = "composer.json";

/// Name of the generated Moodle configuration file.
pub const CONFIG_FILE_NAME: &str = "config.php";

/// Placeholder replaced with the install root's directory name.
pub const NAME_PLACEHOLDER: &str = "[NAME]";

/// Subset of the Composer manifest the scaffolder cares about.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct ComposerManifest {
    /// Composer behaviour settings.
    #[serde(default)]
    pub config: ComposerConfig,

    /// Free-form settings for plugins.
    #[serde(default)]
    pub extra: ComposerExtra,

    /// Named script hooks.
    #[serde(default)]
    pub scripts: BTreeMap<String, ScriptEntry>,
}

impl FromStr for ComposerManifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data).map_err(ConfigError::Deserialize)
    }
}

/// The `config` section of the Composer manifest.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct ComposerConfig {
    /// Directory dependencies get installed into.
    #[serde(rename = "vendor-dir")]
    pub vendor_dir: Option<String>,
}

/// The `extra` section of the Composer manifest.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct ComposerExtra {
    /// Directory Moodle gets installed into, relative to the install root.
    #[serde(rename = "install-path")]
    pub install_path: Option<String>,
}

/// Composer script hook, either one command or a list of them.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScriptEntry {
    One(String),
    Many(Vec<String>),
}

impl ScriptEntry {
    /// Commands of script hook in order.
    pub fn commands(&self) -> Vec<&str> {
        match self {
            Self::One(command) => vec![command.as_str()],
            Self::Many(commands) => commands.iter().map(String::as_str).collect(),
        }
    }
}

/// Resolved location of everything the scaffolder touches.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    moodle_path: PathBuf,
    scripts: BTreeMap<String, ScriptEntry>,
}

impl ProjectLayout {
    /// Default vendor directory.
    pub const DEFAULT_VENDOR_DIR: &'static str = "vendor";

    /// Default Moodle install directory.
    pub const DEFAULT_INSTALL_PATH: &'static str = "moodle/";

    /// Construct layout from parsed manifest.
    ///
    /// The install root is the parent of the vendor directory, which is
    /// resolved against `cwd` when relative.
    pub fn new(cwd: impl AsRef<Path>, manifest: ComposerManifest) -> Self {
        let vendor = manifest
            .config
            .vendor_dir
            .as_deref()
            .unwrap_or(Self::DEFAULT_VENDOR_DIR);
        let vendor = path::normalize(cwd.as_ref().join(vendor));
        let root = vendor
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| vendor.clone());

        let install_path = manifest
            .extra
            .install_path
            .as_deref()
            .unwrap_or(Self::DEFAULT_INSTALL_PATH);
        let moodle_path = path::normalize(root.join(install_path));

        Self {
            root,
            moodle_path,
            scripts: manifest.scripts,
        }
    }

    /// Locate project layout from Composer manifest in `cwd`.
    ///
    /// A missing manifest means every setting takes its default.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadManifest`] if manifest exists but cannot be
    ///   read.
    /// - Return [`ConfigError::Deserialize`] if manifest is not valid JSON.
    pub fn discover(cwd: impl AsRef<Path>) -> Result<Self> {
        let manifest_path = cwd.as_ref().join(COMPOSER_MANIFEST);
        let manifest = match read_to_string(&manifest_path) {
            Ok(data) => data.parse()?,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("no manifest at {:?}, using defaults", manifest_path.display());
                ComposerManifest::default()
            }
            Err(error) => {
                return Err(ConfigError::ReadManifest {
                    source: error,
                    path: manifest_path,
                })
            }
        };

        Ok(Self::new(cwd, manifest))
    }

    /// Project root that holds the Composer manifest and the vendor directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory Moodle is installed into.
    pub fn moodle_path(&self) -> &Path {
        &self.moodle_path
    }

    /// Name of the install root directory.
    pub fn base_dir_name(&self) -> String {
        path::base_dir_name(&self.root)
    }

    /// Path of the generated Moodle configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Commands registered for a named script hook.
    pub fn script_commands(&self, name: &str) -> Vec<&str> {
        self.scripts
            .get(name)
            .map(ScriptEntry::commands)
            .unwrap_or_default()
    }
}

/// Database drivers Moodle supports.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy)]
pub enum DbDriver {
    MariaDb,
    MySqli,
    #[default]
    PgSql,
    SqlSrv,
    AuroraMySql,
}

impl DbDriver {
    /// All drivers in the order they are offered.
    pub const ALL: [DbDriver; 5] = [
        Self::MariaDb,
        Self::MySqli,
        Self::PgSql,
        Self::SqlSrv,
        Self::AuroraMySql,
    ];

    /// Key Moodle uses for the driver.
    pub fn key(self) -> &'static str {
        match self {
            Self::MariaDb => "mariadb",
            Self::MySqli => "mysqli",
            Self::PgSql => "pgsql",
            Self::SqlSrv => "sqlsrv",
            Self::AuroraMySql => "auroramysql",
        }
    }

    /// Human friendly label.
    pub fn label(self) -> &'static str {
        match self {
            Self::MariaDb => "MariaDB (mariadb)",
            Self::MySqli => "MySQL Improved (mysqli)",
            Self::PgSql => "PostgreSQL (pgsql)",
            Self::SqlSrv => "Microsoft SQL Server (sqlsrv)",
            Self::AuroraMySql => "Amazon Aurora MySQL (auroramysql)",
        }
    }

    /// Key and label pairs of all drivers.
    pub fn options() -> Vec<(&'static str, &'static str)> {
        Self::ALL
            .iter()
            .map(|driver| (driver.key(), driver.label()))
            .collect()
    }
}

impl FromStr for DbDriver {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|driver| driver.key() == data.trim())
            .ok_or_else(|| ConfigError::UnknownDriver(data.to_string()))
    }
}

impl Display for DbDriver {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.key())
    }
}

/// Database connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub driver: DbDriver,
    pub host: String,
    pub name: String,
    pub username: String,
    pub password: String,
    pub table_prefix: String,
}

impl Debug for DatabaseConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("table_prefix", &self.table_prefix)
            .finish()
    }
}

/// Site location settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Absolute URL without trailing slash.
    pub wwwroot: String,

    /// Absolute path to writable data directory.
    pub dataroot: PathBuf,
}

/// Moodle configuration file content.
///
/// Renders as PHP through [`Display`]. Values are written as single-quoted
/// PHP string literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodleConfig {
    pub database: DatabaseConfig,
    pub site: SiteConfig,
}

impl Display for MoodleConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let db = &self.database;
        let dataroot = self.site.dataroot.to_string_lossy();

        writeln!(fmt, "<?php")?;
        writeln!(fmt)?;
        writeln!(fmt, "/**")?;
        writeln!(fmt, " * This is the Moodle configuration file.")?;
        writeln!(fmt, " *")?;
        writeln!(fmt, " * For documentation see https://docs.moodle.org/en/Configuration_file")?;
        writeln!(fmt, " */")?;
        writeln!(fmt)?;
        writeln!(fmt, "unset($CFG);")?;
        writeln!(fmt, "global $CFG;")?;
        writeln!(fmt, "$CFG = new stdClass();")?;
        writeln!(fmt)?;
        writeln!(fmt, "$CFG->dbtype    = '{}';", php_quote(db.driver.key()))?;
        writeln!(fmt, "$CFG->dblibrary = 'native';")?;
        writeln!(fmt, "$CFG->dbhost    = '{}';", php_quote(&db.host))?;
        writeln!(fmt, "$CFG->dbname    = '{}';", php_quote(&db.name))?;
        writeln!(fmt, "$CFG->dbuser    = '{}';", php_quote(&db.username))?;
        writeln!(fmt, "$CFG->dbpass    = '{}';", php_quote(&db.password))?;
        writeln!(fmt, "$CFG->prefix    = '{}';", php_quote(&db.table_prefix))?;
        writeln!(fmt)?;
        writeln!(fmt, "$CFG->dboptions = array (")?;
        writeln!(fmt, "  'dbpersist' => 0,")?;
        writeln!(fmt, "  'dbport' => '',")?;
        writeln!(fmt, "  'dbsocket' => '',")?;
        writeln!(fmt, ");")?;
        writeln!(fmt)?;
        writeln!(fmt, "$CFG->wwwroot   = '{}';", php_quote(&self.site.wwwroot))?;
        writeln!(fmt, "$CFG->dataroot  = '{}';", php_quote(&dataroot))?;
        writeln!(fmt)?;
        writeln!(fmt, "// Note: Do *not* include setup.php here.")?;
        writeln!(
            fmt,
            "// For Composer-based installations, it is included by the shim config.php file."
        )
    }
}

/// Escape text for a single-quoted PHP string literal.
pub fn php_quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Composer manifest cannot be read.
    #[error("failed to read composer manifest at {:?}", path.display())]
    ReadManifest {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Composer manifest is not valid JSON.
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),

    /// Database driver key is not one Moodle supports.
    #[error("unknown database driver {0:?}")]
    UnknownDriver(String),
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
