// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Lexical helpers to locate the files the scaffolder writes. Nothing here
//! touches the file system, so paths that do not exist yet can still be
//! reasoned about.

use std::path::{Component, Path, PathBuf};

/// Normalize path lexically.
///
/// Removes `.` components and folds `..` into its parent where possible. A
/// `..` that would climb above the root of an absolute path is dropped, while
/// leading `..` components of a relative path are kept.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => match normal.components().next_back() {
                Some(Component::Normal(_)) => {
                    normal.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => continue,
                _ => normal.push(".."),
            },
            other => normal.push(other.as_os_str()),
        }
    }

    if normal.as_os_str().is_empty() {
        normal.push(".");
    }

    normal
}

/// Compute path of `to` relative to directory `from`.
///
/// Both paths are normalized first. Returns `.` when both point at the same
/// directory.
pub fn relative_path(from: impl AsRef<Path>, to: impl AsRef<Path>) -> PathBuf {
    let from = normalize(from);
    let to = normalize(to);
    let from = from.components().collect::<Vec<_>>();
    let to = to.components().collect::<Vec<_>>();

    let shared = from
        .iter()
        .zip(to.iter())
        .take_while(|(lhs, rhs)| lhs == rhs)
        .count();

    let mut relative = PathBuf::new();
    for _ in shared..from.len() {
        relative.push("..");
    }
    for component in &to[shared..] {
        relative.push(component.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }

    relative
}

/// Name of the final directory component of a path.
///
/// Returns an empty string for paths without a final normal component,
/// e.g., `/`.
pub fn base_dir_name(path: impl AsRef<Path>) -> String {
    normalize(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("/srv/site/./vendor/..", "/srv/site"; "current and parent")]
    #[test_case("/../srv", "/srv"; "parent above root")]
    #[test_case("../a/b/../c", "../a/c"; "relative keeps leading parent")]
    #[test_case("a/..", "."; "collapse to current")]
    #[test]
    fn normalize_folds_components(input: &str, expect: &str) {
        assert_eq!(normalize(input), PathBuf::from(expect));
    }

    #[test_case("/srv/site/moodle", "/srv/site", ".."; "parent")]
    #[test_case("/srv/site", "/srv/site/moodle/lib", "moodle/lib"; "child")]
    #[test_case("/srv/site/moodle/", "/srv/other", "../../other"; "sibling")]
    #[test_case("/srv/site", "/srv/site", "."; "same")]
    #[test]
    fn relative_path_between_directories(from: &str, to: &str, expect: &str) {
        assert_eq!(relative_path(from, to), PathBuf::from(expect));
    }

    #[test]
    fn base_dir_name_of_install_root() {
        assert_eq!(base_dir_name("/srv/mysite/"), "mysite");
        assert_eq!(base_dir_name("/srv/mysite/vendor/.."), "mysite");
        assert_eq!(base_dir_name("/"), "");
    }
}
