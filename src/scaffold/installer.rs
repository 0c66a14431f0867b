// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Moodle database installer.
//!
//! Once a configuration file exists, Moodle's own CLI installer can create
//! the database schema and the admin account. The runner collects what that
//! installer needs, then launches it and relays its output line by line as it
//! arrives.
//!
//! # License Agreement
//!
//! Moodle's installer demands agreement to the GNU General Public License. The
//! license text is shown and the user must accept it explicitly, unless
//! agreement was given ahead of time through `MOODLE_AGREE_LICENSE`.
//!
//! # Secrets
//!
//! The admin password is handed to the installer as a command line argument,
//! because that is the only way the installer accepts it. It is never written
//! to disk, and never logged.

use crate::{
    channel::{until_valid, InteractionChannel},
    config::ProjectLayout,
    overrides::{self, Overrides},
    scaffold::Result,
    validate::{self, Validation},
};

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split},
    process::Command,
};
use tracing::{debug, info, instrument, warn};

/// Installer script, relative to the Moodle directory.
pub const INSTALL_SCRIPT: &str = "admin/cli/install_database.php";

/// PHP binary used when none is configured.
pub const DEFAULT_PHP_BINARY: &str = "php";

/// License text shown when Moodle's language pack cannot be read.
pub const FALLBACK_LICENSE: &str = "\
Copyright (C) 1999 onwards Martin Dougiamas (https://moodle.com)

This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.

This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

See the Moodle License information page for full details: https://moodledev.io/general/license";

/// How an installer run ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InstallOutcome {
    /// User chose not to run the installer now.
    Skipped,

    /// User did not agree to the license.
    LicenseDeclined,

    /// Installer process could not be started.
    LaunchFailed,

    /// Installer process exited.
    Finished {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,

        /// Whether the process exited successfully.
        success: bool,
    },
}

impl From<ExitStatus> for InstallOutcome {
    fn from(status: ExitStatus) -> Self {
        Self::Finished {
            code: status.code(),
            success: status.success(),
        }
    }
}

/// Admin account of a fresh Moodle site.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub email: String,
    pub password: String,
    pub site_short_name: String,
}

impl AdminAccount {
    /// Installer arguments that carry the account.
    pub fn installer_args(&self) -> [String; 4] {
        [
            "--agree-license".to_string(),
            format!("--adminpass={}", self.password),
            format!("--adminemail={}", self.email),
            format!("--shortname={}", self.site_short_name),
        ]
    }
}

impl Debug for AdminAccount {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("AdminAccount")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("site_short_name", &self.site_short_name)
            .finish()
    }
}

/// Runner of Moodle's database installer.
#[derive(Debug)]
pub struct InstallRunner<'a> {
    layout: &'a ProjectLayout,
    overrides: &'a Overrides,
    php_binary: PathBuf,
}

impl<'a> InstallRunner<'a> {
    /// Construct new installer runner.
    ///
    /// Runs the installer through `PHP_BINARY` if set, or through whatever
    /// `php` is on the search path.
    pub fn new(layout: &'a ProjectLayout, overrides: &'a Overrides) -> Self {
        let php_binary = overrides
            .get(overrides::PHP_BINARY)
            .unwrap_or(DEFAULT_PHP_BINARY)
            .into();

        Self {
            layout,
            overrides,
            php_binary,
        }
    }

    /// Use specific PHP binary.
    pub fn with_php_binary(mut self, php_binary: impl Into<PathBuf>) -> Self {
        self.php_binary = php_binary.into();
        self
    }

    /// Ask for admin details, and run the installer.
    ///
    /// The progress bar spins while the installer runs, and is suspended
    /// whenever a line of installer output is relayed.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::Channel`](crate::scaffold::ScaffoldError::Channel)
    ///   if prompting fails.
    #[instrument(skip_all, level = "debug")]
    pub async fn install<C>(&self, channel: &mut C, progress: &ProgressBar) -> Result<InstallOutcome>
    where
        C: InteractionChannel,
    {
        let requested = match self.overrides.flag(overrides::RUN_INSTALLER) {
            Some(requested) => requested,
            None => channel.ask_yes_no("Do you want to run the Moodle installer now?", true)?,
        };

        if !requested {
            channel.write("- Skipping Moodle installer. You can run it later by running:");
            channel.write(&format!("  php {INSTALL_SCRIPT}"));
            return Ok(InstallOutcome::Skipped);
        }

        channel.write("");
        channel.write("Launching Moodle installer...");

        if !self.license_agreed(channel)? {
            channel.write("error: You must agree to the license terms to proceed with the installation.");
            return Ok(InstallOutcome::LicenseDeclined);
        }

        let account = self.admin_account(channel)?;
        debug!("collected {account:?}");

        Ok(self.launch(channel, &account, progress).await)
    }

    /// Ask user to agree to the license, unless agreed ahead of time.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::Channel`](crate::scaffold::ScaffoldError::Channel)
    ///   if prompting fails.
    pub fn license_agreed(&self, channel: &mut impl InteractionChannel) -> Result<bool> {
        if self.overrides.flag(overrides::AGREE_LICENSE) == Some(true) {
            debug!("license agreed through {}", overrides::AGREE_LICENSE);
            return Ok(true);
        }

        channel.write("================================");
        channel.write("Moodle GNU General Public License Agreement");
        channel.write("================================");
        channel.write("");
        channel.write(&license_text(self.layout.moodle_path()));
        channel.write("");

        Ok(channel.ask_yes_no("Do you agree to the GNU General Public License terms?", false)?)
    }

    /// Resolve admin account details.
    ///
    /// # Errors
    ///
    /// - Return [`ScaffoldError::Channel`](crate::scaffold::ScaffoldError::Channel)
    ///   if prompting fails.
    pub fn admin_account<C>(&self, channel: &mut C) -> Result<AdminAccount>
    where
        C: InteractionChannel,
    {
        let email = match self.valid_override(channel, overrides::ADMIN_EMAIL, validate::email) {
            Some(email) => email,
            None => channel.ask_validated(
                "Enter the email address for the admin user:",
                validate::email,
                None,
            )?,
        };

        let password =
            match self.valid_override(channel, overrides::ADMIN_PASSWORD, validate::admin_password) {
                Some(password) => password,
                None => until_valid(
                    channel,
                    |channel| channel.ask_secret("Enter the password for the admin user:"),
                    validate::admin_password,
                )?,
            };

        let default = self.layout.base_dir_name();
        let short_name_check = |value: &str| validate::non_empty("Site short name", value);
        let site_short_name =
            match self.valid_override(channel, overrides::SHORTNAME, short_name_check) {
                Some(name) => name,
                None => channel.ask_validated(
                    "Enter the site short name:",
                    short_name_check,
                    Some(&default),
                )?,
            };

        Ok(AdminAccount {
            email,
            password,
            site_short_name,
        })
    }

    fn valid_override(
        &self,
        channel: &mut impl InteractionChannel,
        name: &str,
        validate: impl Fn(&str) -> Validation<String>,
    ) -> Option<String> {
        let value = self.overrides.get(name)?;
        match validate(value) {
            Ok(value) => Some(value),
            Err(reason) => {
                warn!("ignoring invalid override {name}");
                channel.write(&format!("error: Ignoring {name}: {reason}"));
                None
            }
        }
    }

    async fn launch<C>(&self, channel: &mut C, account: &AdminAccount, progress: &ProgressBar) -> InstallOutcome
    where
        C: InteractionChannel,
    {
        let moodle_path = self.layout.moodle_path();
        info!(
            "run {} {INSTALL_SCRIPT} in {:?}",
            self.php_binary.display(),
            moodle_path.display()
        );

        let mut child = match Command::new(&self.php_binary)
            .arg(INSTALL_SCRIPT)
            .args(account.installer_args())
            .current_dir(moodle_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(error) => {
                warn!("failed to launch installer: {error}");
                channel.write(&format!(
                    "error: Unable to launch the Moodle installer with {}: {error}",
                    self.php_binary.display()
                ));
                return InstallOutcome::LaunchFailed;
            }
        };

        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            progress.set_style(style);
        }
        progress.set_message("Moodle installer running...");
        progress.enable_steady_tick(Duration::from_millis(100));

        // INVARIANT: Both pipes exist, they were requested above.
        let mut stdout = child.stdout.take().map(|out| BufReader::new(out).split(b'\n'));
        let mut stderr = child.stderr.take().map(|err| BufReader::new(err).split(b'\n'));

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                line = next_line(&mut stdout), if stdout.is_some() => match line {
                    Some(line) => progress.suspend(|| channel.write(&line)),
                    None => stdout = None,
                },
                line = next_line(&mut stderr), if stderr.is_some() => match line {
                    Some(line) => progress.suspend(|| channel.write(&line)),
                    None => stderr = None,
                },
            }
        }

        let status = child.wait().await;
        progress.finish_and_clear();

        match status {
            Ok(status) if status.success() => {
                info!("installer finished");
                channel.write("Moodle installer finished.");
                status.into()
            }
            Ok(status) => {
                warn!("installer exited with {status}");
                channel.write(&format!(
                    "error: Moodle installer failed ({status}). Review its output above."
                ));
                status.into()
            }
            Err(error) => {
                warn!("failed to wait for installer: {error}");
                channel.write(&format!("error: Lost track of the Moodle installer: {error}"));
                InstallOutcome::Finished {
                    code: None,
                    success: false,
                }
            }
        }
    }
}

/// Next line of installer output, or `None` once the pipe is done.
///
/// Output is not required to be UTF-8. Undecodable bytes are replaced, and
/// reading carries on so the installer never writes into a closed pipe.
async fn next_line<R>(segments: &mut Option<Split<R>>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let segments = segments.as_mut()?;
    match segments.next_segment().await {
        Ok(segment) => segment.map(|bytes| decode_line(&bytes)),
        Err(error) => {
            warn!("stopped reading installer output: {error}");
            None
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Load license text from Moodle's English language pack.
///
/// Falls back to [`FALLBACK_LICENSE`] when no language pack is readable.
pub fn license_text(moodle_path: &Path) -> String {
    let candidates = [
        moodle_path.join("public/lang/en/moodle.php"),
        moodle_path.join("lang/en/moodle.php"),
    ];

    candidates
        .iter()
        .filter_map(|path| read_to_string(path).ok())
        .find_map(|source| gpl3_string(&source))
        .unwrap_or_else(|| FALLBACK_LICENSE.to_string())
}

/// Extract the `gpl3` language string from PHP source.
///
/// Only understands single-quoted literals, which is how Moodle writes its
/// language strings. HTML markup is stripped.
fn gpl3_string(source: &str) -> Option<String> {
    let start = source.find("$string['gpl3']")?;
    let rest = &source[start + "$string['gpl3']".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let rest = rest.strip_prefix('\'')?;

    let mut literal = String::new();
    let mut chars = rest.chars();
    loop {
        match chars.next()? {
            '\\' => match chars.next()? {
                escaped @ ('\\' | '\'') => literal.push(escaped),
                other => {
                    literal.push('\\');
                    literal.push(other);
                }
            },
            '\'' => break,
            c => literal.push(c),
        }
    }

    Some(strip_tags(&literal).trim().to_string())
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }

    text
}
