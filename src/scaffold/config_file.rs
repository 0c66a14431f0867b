// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Moodle configuration file generation.
//!
//! Collects database and site settings, then renders them into the Moodle
//! `config.php` at the project root. Each setting is taken from its
//! environment override when one is set, and asked for otherwise. An override
//! that fails validation is reported, and the user gets asked instead.

use crate::{
    channel::{until_valid, InteractionChannel},
    config::{
        DatabaseConfig, DbDriver, MoodleConfig, ProjectLayout, SiteConfig, NAME_PLACEHOLDER,
    },
    overrides::{self, Overrides},
    path,
    scaffold::{gitignore::GitignoreFile, Result, ScaffoldError},
    validate::{self, Validation},
};

use std::{
    fs::{remove_file, write, File},
    io,
    path::{Path, PathBuf},
    process,
};
use tracing::{debug, info, instrument, warn};

/// Default database host.
pub const DEFAULT_DB_HOST: &str = "localhost";

/// Default database table prefix.
pub const DEFAULT_DB_PREFIX: &str = "mdl_";

/// Default data root, relative to the project root.
pub const DEFAULT_DATAROOT: &str = "data";

/// Permission bits of a freshly created data root. Moodle's web server user
/// and the CLI user are rarely the same.
#[cfg(unix)]
pub const DATAROOT_MODE: u32 = 0o2777;

/// How configuration file generation ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Generation {
    /// Configuration file was written.
    Written,

    /// Nobody is around to answer prompts.
    NonInteractive,

    /// Configuration file exists, and user chose to keep it.
    OverwriteDeclined,
}

/// Generator of the Moodle configuration file.
#[derive(Debug)]
pub struct ConfigGenerator<'a> {
    layout: &'a ProjectLayout,
    overrides: &'a Overrides,
}

impl<'a> ConfigGenerator<'a> {
    /// Construct new generator.
    pub fn new(layout: &'a ProjectLayout, overrides: &'a Overrides) -> Self {
        Self { layout, overrides }
    }

    /// Check if configuration file already exists.
    pub fn config_exists(&self) -> bool {
        self.layout.config_path().exists()
    }

    /// Collect settings and write the configuration file.
    ///
    /// Refuses to run without an interactive channel, even if every setting
    /// has an override, so a half-configured file never gets written
    /// silently. An existing configuration file is only replaced after the
    /// user confirms it.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::Channel`] if prompting fails.
    /// - Return [`ScaffoldError::Write`] if configuration file cannot be
    ///   written.
    #[instrument(skip_all, level = "debug")]
    pub fn generate(&self, channel: &mut impl InteractionChannel) -> Result<Generation> {
        channel.write("Generating Moodle configuration file...");

        if !channel.is_interactive() {
            channel.write(
                "error: Non-interactive mode detected. Skipping configuration file generation to avoid incomplete setup.",
            );
            return Ok(Generation::NonInteractive);
        }

        if self.config_exists() {
            channel.write("warning: Configuration file already exists.");
            let overwrite = channel
                .ask_yes_no("Do you want to overwrite the existing configuration file?", false)?;
            if !overwrite {
                channel.write("Keeping existing configuration file. Aborting configuration file generation.");
                return Ok(Generation::OverwriteDeclined);
            }
            channel.write("warning: Overwriting existing configuration file as requested.");
        }

        let config = MoodleConfig {
            database: self.database_config(channel)?,
            site: self.site_config(channel)?,
        };
        debug!("collected configuration {config:?}");

        self.write(channel, &config)?;
        channel.write("Moodle configuration file generated successfully.");

        Ok(Generation::Written)
    }

    /// Resolve database settings.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::Channel`] if prompting fails.
    pub fn database_config(&self, channel: &mut impl InteractionChannel) -> Result<DatabaseConfig> {
        let driver = self.driver(channel)?;
        let username = self.text(
            channel,
            overrides::DB_USERNAME,
            "Enter the database username:",
            None,
            |value| validate::non_empty("Database username", value),
        )?;
        let password = self.secret(channel, overrides::DB_PASSWORD, "Enter the database password:", |value| {
            validate::non_empty("Database password", value)
        })?;
        let name = self.text(
            channel,
            overrides::DB_NAME,
            "Enter the database name:",
            Some(&self.layout.base_dir_name()),
            |value| validate::non_empty("Database name", value),
        )?;
        let host = self.text(
            channel,
            overrides::DB_HOST,
            "Enter the database host:",
            Some(DEFAULT_DB_HOST),
            |value| validate::non_empty("Database host", value),
        )?;
        let table_prefix = self.text(
            channel,
            overrides::DB_PREFIX,
            "Enter the database table prefix:",
            Some(DEFAULT_DB_PREFIX),
            |value| validate::non_empty("Database table prefix", value),
        )?;

        Ok(DatabaseConfig {
            driver,
            host,
            name,
            username,
            password,
            table_prefix,
        })
    }

    /// Resolve site settings.
    ///
    /// The data root is created when missing.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::Channel`] if prompting fails.
    pub fn site_config(&self, channel: &mut impl InteractionChannel) -> Result<SiteConfig> {
        let name = self.layout.base_dir_name();

        let wwwroot = self.text(
            channel,
            overrides::WWWROOT,
            "Enter the web root URL (for example, https://moodle.example.com):",
            None,
            |value| validate::wwwroot(&value.replace(NAME_PLACEHOLDER, &name)),
        )?;

        let dataroot = self.text(
            channel,
            overrides::DATAROOT,
            "Enter the Moodle data directory path:",
            Some(DEFAULT_DATAROOT),
            |value| prepare_dataroot(self.layout.root(), &name, value),
        )?;

        Ok(SiteConfig {
            wwwroot,
            dataroot: PathBuf::from(dataroot),
        })
    }

    fn driver(&self, channel: &mut impl InteractionChannel) -> Result<DbDriver> {
        if let Some(value) = self.overrides.get(overrides::DB_DRIVER) {
            match value.parse::<DbDriver>() {
                Ok(driver) => return Ok(driver),
                Err(error) => report_bad_override(channel, overrides::DB_DRIVER, &error.to_string()),
            }
        }

        let key = channel.select(
            "What database driver are you using?",
            &DbDriver::options(),
            DbDriver::default().key(),
        )?;

        Ok(key.parse()?)
    }

    fn text<C>(
        &self,
        channel: &mut C,
        name: &str,
        prompt: &str,
        default: Option<&str>,
        validate: impl Fn(&str) -> Validation<String>,
    ) -> Result<String>
    where
        C: InteractionChannel,
    {
        if let Some(value) = self.valid_override(channel, name, &validate) {
            return Ok(value);
        }

        Ok(until_valid(channel, |channel| channel.ask(prompt, default), validate)?)
    }

    fn secret<C>(
        &self,
        channel: &mut C,
        name: &str,
        prompt: &str,
        validate: impl Fn(&str) -> Validation<String>,
    ) -> Result<String>
    where
        C: InteractionChannel,
    {
        if let Some(value) = self.valid_override(channel, name, &validate) {
            return Ok(value);
        }

        Ok(until_valid(channel, |channel| channel.ask_secret(prompt), validate)?)
    }

    fn valid_override(
        &self,
        channel: &mut impl InteractionChannel,
        name: &str,
        validate: impl Fn(&str) -> Validation<String>,
    ) -> Option<String> {
        let value = self.overrides.get(name)?;
        match validate(value) {
            Ok(value) => {
                debug!("using override {name}");
                Some(value)
            }
            Err(reason) => {
                report_bad_override(channel, name, &reason);
                None
            }
        }
    }

    #[instrument(skip_all, level = "debug")]
    fn write(&self, channel: &mut impl InteractionChannel, config: &MoodleConfig) -> Result<()> {
        let path = self.layout.config_path();
        write(&path, config.to_string()).map_err(|source| ScaffoldError::Write {
            source,
            path: path.clone(),
        })?;
        info!("wrote {:?}", path.display());
        channel.write(&format!("- Wrote {}", path.display()));

        let gitignore = GitignoreFile::new(self.layout.root());
        if gitignore.is_applicable() && gitignore.ensure_ignored(&path, "/config.php")? {
            channel.write("- Added config.php to .gitignore");
        }

        Ok(())
    }
}

fn report_bad_override(channel: &mut impl InteractionChannel, name: &str, reason: &str) {
    warn!("ignoring invalid override {name}");
    channel.write(&format!("error: Ignoring {name}: {reason}"));
}

/// Resolve data root answer into an existing absolute directory.
///
/// The `[NAME]` placeholder is replaced with the install root's name, and `~`
/// is expanded. Relative paths are taken from the project root. A directory
/// that has to be created gets [`DATAROOT_MODE`] on unix.
fn prepare_dataroot(root: &Path, name: &str, value: &str) -> Validation<String> {
    let value = value.trim().replace(NAME_PLACEHOLDER, name);
    let value = shellexpand::tilde(&value).into_owned();
    let trimmed = value.trim_end_matches('/');
    let trimmed = if trimmed.is_empty() && value.starts_with('/') {
        "/"
    } else {
        trimmed
    };
    if trimmed.is_empty() {
        return Err("Data directory path cannot be empty.".into());
    }

    let dataroot = path::normalize(root.join(trimmed));
    if dataroot.exists() && !dataroot.is_dir() {
        return Err(format!("{} exists but is not a directory.", dataroot.display()));
    }

    let created = mkdirp::mkdirp(&dataroot).map_err(|error| {
        format!("Cannot create data directory {}: {error}", dataroot.display())
    })?;

    if created.is_some() {
        debug!("created data root {:?}", dataroot.display());
        set_dataroot_mode(&dataroot)?;
    }

    check_writable(&dataroot).map_err(|error| {
        format!("Data directory {} is not writable: {error}", dataroot.display())
    })?;

    Ok(dataroot.to_string_lossy().into_owned())
}

/// Check that the current user can create files in `dir`.
///
/// Permission bits alone cannot answer this, ownership and elevated privileges
/// matter too. So a throwaway file gets created and removed again.
fn check_writable(dir: &Path) -> io::Result<()> {
    let marker = dir.join(format!(".moodle-scaffold-{}", process::id()));
    File::options().write(true).create_new(true).open(&marker)?;
    remove_file(&marker)
}

#[cfg(unix)]
fn set_dataroot_mode(dataroot: &Path) -> Validation<()> {
    use std::{
        fs::{set_permissions, Permissions},
        os::unix::fs::PermissionsExt,
    };

    set_permissions(dataroot, Permissions::from_mode(DATAROOT_MODE)).map_err(|error| {
        format!("Cannot set permissions on {}: {error}", dataroot.display())
    })
}

#[cfg(not(unix))]
fn set_dataroot_mode(_dataroot: &Path) -> Validation<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel::ScriptedChannel, config::ComposerManifest};
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir, metadata, read_dir, read_to_string};

    fn site_layout() -> anyhow::Result<ProjectLayout> {
        let root = std::env::current_dir()?.join("mysite");
        create_dir(&root)?;
        Ok(ProjectLayout::new(&root, ComposerManifest::default()))
    }

    fn full_overrides(layout: &ProjectLayout) -> Overrides {
        Overrides::new()
            .with(overrides::DB_DRIVER, "mariadb")
            .with(overrides::DB_USERNAME, "moodleuser")
            .with(overrides::DB_PASSWORD, "s3cret")
            .with(overrides::DB_NAME, "moodledb")
            .with(overrides::DB_HOST, "db.internal")
            .with(overrides::DB_PREFIX, "m_")
            .with(overrides::WWWROOT, "https://[NAME].example.com/")
            .with(
                overrides::DATAROOT,
                layout.root().join("moodledata").to_string_lossy(),
            )
    }

    #[sealed_test]
    fn overrides_skip_every_prompt() -> anyhow::Result<()> {
        let layout = site_layout()?;
        let overrides = full_overrides(&layout);
        let mut channel = ScriptedChannel::new(Vec::<String>::new());

        let result = ConfigGenerator::new(&layout, &overrides).generate(&mut channel)?;

        assert_eq!(result, Generation::Written);
        assert!(channel.prompts().is_empty());

        let content = read_to_string(layout.config_path())?;
        assert!(content.contains("$CFG->dbtype    = 'mariadb';"));
        assert!(content.contains("$CFG->dbhost    = 'db.internal';"));
        assert!(content.contains("$CFG->dbname    = 'moodledb';"));
        assert!(content.contains("$CFG->dbuser    = 'moodleuser';"));
        assert!(content.contains("$CFG->dbpass    = 's3cret';"));
        assert!(content.contains("$CFG->prefix    = 'm_';"));
        assert!(content.contains("$CFG->wwwroot   = 'https://mysite.example.com';"));
        assert!(layout.root().join("moodledata").is_dir());

        Ok(())
    }

    #[sealed_test]
    fn prompts_with_defaults() -> anyhow::Result<()> {
        let layout = site_layout()?;
        let overrides = Overrides::new();
        let mut channel = ScriptedChannel::new([
            "",                            // driver
            "moodleuser",                  // username
            "s3cret",                      // password
            "",                            // name
            "",                            // host
            "",                            // prefix
            "not a url",                   // wwwroot
            "https://[NAME].example.com/", // wwwroot
            "",                            // dataroot
        ]);

        let generator = ConfigGenerator::new(&layout, &overrides);
        let database = generator.database_config(&mut channel)?;
        let site = generator.site_config(&mut channel)?;

        assert_eq!(database.driver, DbDriver::PgSql);
        assert_eq!(database.name, "mysite");
        assert_eq!(database.host, "localhost");
        assert_eq!(database.table_prefix, "mdl_");
        assert_eq!(site.wwwroot, "https://mysite.example.com");
        assert_eq!(site.dataroot, layout.root().join("data"));
        assert!(channel.said("Please enter a valid URL for the web root."));
        assert_eq!(channel.remaining(), 0);

        Ok(())
    }

    #[sealed_test]
    fn invalid_override_falls_back_to_prompt() -> anyhow::Result<()> {
        let layout = site_layout()?;
        let overrides = full_overrides(&layout).with(overrides::DB_DRIVER, "oracle");
        let mut channel = ScriptedChannel::new(["sqlsrv"]);

        let database = ConfigGenerator::new(&layout, &overrides).database_config(&mut channel)?;

        assert_eq!(database.driver, DbDriver::SqlSrv);
        assert_eq!(channel.prompts().len(), 1);
        assert!(channel.said("Ignoring MOODLE_DB_DRIVER"));

        Ok(())
    }

    #[sealed_test]
    fn non_interactive_never_writes() -> anyhow::Result<()> {
        let layout = site_layout()?;
        let overrides = full_overrides(&layout);
        let mut channel = ScriptedChannel::non_interactive();

        let result = ConfigGenerator::new(&layout, &overrides).generate(&mut channel)?;

        assert_eq!(result, Generation::NonInteractive);
        assert!(!layout.config_path().exists());
        assert!(channel.said("Non-interactive mode detected"));

        Ok(())
    }

    #[sealed_test]
    fn existing_config_kept_unless_confirmed() -> anyhow::Result<()> {
        let layout = site_layout()?;
        write(layout.config_path(), "<?php // keep me\n")?;
        let overrides = full_overrides(&layout);

        let mut channel = ScriptedChannel::new([""]);
        let result = ConfigGenerator::new(&layout, &overrides).generate(&mut channel)?;
        assert_eq!(result, Generation::OverwriteDeclined);
        assert_eq!(read_to_string(layout.config_path())?, "<?php // keep me\n");

        let mut channel = ScriptedChannel::new(["y"]);
        let result = ConfigGenerator::new(&layout, &overrides).generate(&mut channel)?;
        assert_eq!(result, Generation::Written);
        assert!(read_to_string(layout.config_path())?.contains("moodledb"));

        Ok(())
    }

    #[sealed_test]
    fn config_added_to_gitignore() -> anyhow::Result<()> {
        let layout = site_layout()?;
        create_dir(layout.root().join(".git"))?;
        let overrides = full_overrides(&layout);
        let mut channel = ScriptedChannel::new(Vec::<String>::new());

        ConfigGenerator::new(&layout, &overrides).generate(&mut channel)?;

        let gitignore = read_to_string(layout.root().join(".gitignore"))?;
        assert_eq!(gitignore, "/config.php\n");

        Ok(())
    }

    #[sealed_test]
    fn dataroot_resolution() -> anyhow::Result<()> {
        let root = std::env::current_dir()?.join("mysite");
        create_dir(&root)?;

        let dataroot = prepare_dataroot(&root, "mysite", "../[NAME]data/")
            .map_err(anyhow::Error::msg)?;
        let expect = path::normalize(root.join("../mysitedata"));
        assert_eq!(PathBuf::from(dataroot), expect);
        assert!(expect.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata(&expect)?.permissions().mode() & 0o7777;
            assert_eq!(mode, DATAROOT_MODE);
        }

        write(root.join("occupied"), "")?;
        assert!(prepare_dataroot(&root, "mysite", "occupied").is_err());
        assert!(prepare_dataroot(&root, "mysite", "   ").is_err());

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn dataroot_writability_follows_real_access() -> anyhow::Result<()> {
        use std::{
            fs::{set_permissions, Permissions},
            os::unix::fs::PermissionsExt,
        };

        let root = std::env::current_dir()?;
        let locked = root.join("locked");
        create_dir(&locked)?;
        set_permissions(&locked, Permissions::from_mode(0o555))?;

        // Privileged users write past missing write bits.
        let writable = File::create(locked.join("touch")).is_ok();
        let _ = remove_file(locked.join("touch"));

        let result = prepare_dataroot(&root, "mysite", "locked");

        assert_eq!(result.is_ok(), writable);
        if let Err(reason) = &result {
            assert!(reason.contains("is not writable"));
        }
        assert_eq!(read_dir(&locked)?.count(), 0);

        set_permissions(&locked, Permissions::from_mode(0o755))?;

        Ok(())
    }
}
