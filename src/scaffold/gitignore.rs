// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Gitignore upkeep.
//!
//! The generated configuration file holds database credentials, so it must
//! never be committed. When the project is tracked by Git, a rule for it gets
//! appended to the project's `.gitignore` unless some existing rule already
//! covers it.
//!
//! Existing content is never reordered or rewritten. Rules are only ever
//! appended to the end of the file.

use ignore::gitignore::GitignoreBuilder;
use std::{
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Editor of a project `.gitignore` file.
#[derive(Clone, Debug)]
pub struct GitignoreFile {
    root: PathBuf,
    path: PathBuf,
}

impl GitignoreFile {
    /// Construct new editor for `.gitignore` at project root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let path = root.join(".gitignore");

        Self { root, path }
    }

    /// Check if project is tracked by Git or already has ignore rules.
    pub fn is_applicable(&self) -> bool {
        self.root.join(".git").exists() || self.path.is_file()
    }

    /// Current content of the ignore file, empty if missing.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if file exists but cannot be read.
    pub fn content(&self) -> Result<String> {
        match read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(error) => Err(Error::Read {
                source: error,
                path: self.path.clone(),
            }),
        }
    }

    /// Check if a path below the project root is ignored by current rules.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if file exists but cannot be read.
    pub fn is_ignored(&self, path: impl AsRef<Path>) -> Result<bool> {
        Ok(is_ignored_by(&self.root, &self.content()?, path.as_ref()))
    }

    /// Append rule unless `path` is already ignored.
    ///
    /// Returns true if the rule was appended.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if file exists but cannot be read.
    /// - Return [`Error::Write`] if file cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn ensure_ignored(&self, path: &Path, rule: &str) -> Result<bool> {
        let mut content = self.content()?;
        if is_ignored_by(&self.root, &content, path) {
            debug!("{:?} already ignored", path.display());
            return Ok(false);
        }

        // INVARIANT: New rule always starts on its own line.
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(rule);
        content.push('\n');

        write(&self.path, content).map_err(|error| Error::Write {
            source: error,
            path: self.path.clone(),
        })?;
        info!("added {rule:?} to {:?}", self.path.display());

        Ok(true)
    }
}

fn is_ignored_by(root: &Path, content: &str, path: &Path) -> bool {
    let mut builder = GitignoreBuilder::new(root);
    for line in content.lines() {
        // INVARIANT: A broken rule matches nothing, same as Git treats it.
        if let Err(error) = builder.add_line(None, line) {
            debug!("skipping gitignore rule {line:?}: {error}");
        }
    }

    match builder.build() {
        Ok(matcher) => matcher
            .matched_path_or_any_parents(path, path.is_dir())
            .is_ignore(),
        Err(_) => false,
    }
}

/// Gitignore upkeep error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Ignore file cannot be read from.
    #[error("failed to read from gitignore file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Ignore file cannot be written to.
    #[error("failed to write to gitignore file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::create_dir;

    #[test]
    fn match_existing_rules() {
        let root = Path::new("/srv/mysite");
        let rules = indoc! {r#"
            # secrets
            /config.php
            vendor/
        "#};

        assert!(is_ignored_by(root, rules, &root.join("config.php")));
        assert!(is_ignored_by(root, rules, &root.join("vendor/autoload.php")));
        assert!(!is_ignored_by(root, rules, &root.join("moodle/config.php")));
        assert!(!is_ignored_by(root, "", &root.join("config.php")));
    }

    #[sealed_test]
    fn append_rule_once() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        write(root.join(".gitignore"), "vendor/")?;
        let gitignore = GitignoreFile::new(&root);
        let config = root.join("config.php");

        assert!(gitignore.is_applicable());
        assert!(gitignore.ensure_ignored(&config, "/config.php")?);
        assert!(!gitignore.ensure_ignored(&config, "/config.php")?);
        assert_eq!(gitignore.content()?, "vendor/\n/config.php\n");
        assert!(gitignore.is_ignored(&config)?);

        Ok(())
    }

    #[sealed_test]
    fn applicable_only_in_git_projects() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        let gitignore = GitignoreFile::new(&root);
        assert!(!gitignore.is_applicable());

        create_dir(root.join(".git"))?;
        assert!(gitignore.is_applicable());

        Ok(())
    }
}
