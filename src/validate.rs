// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Input validation.
//!
//! Pure checks applied to prompted answers and override values. A failed
//! check is not an error, it is a reason to ask again. Thus, every validator
//! returns [`Validation`] whose error side is the reason shown to the user.

use url::Url;

/// Outcome of validating user input. The error side is the reason text.
pub type Validation<T> = Result<T, String>;

/// Minimum length of the admin account password.
pub const MIN_ADMIN_PASSWORD_LEN: usize = 6;

/// Parse boolean word the way Composer users expect.
///
/// `1`, `true`, `on`, and `yes` are true regardless of case or surrounding
/// whitespace. Everything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Reject empty or blank input.
pub fn non_empty(field: &str, value: &str) -> Validation<String> {
    if value.trim().is_empty() {
        return Err(format!("{field} cannot be empty."));
    }

    Ok(value.to_owned())
}

/// Validate web root URL.
///
/// Must be an absolute `http` or `https` URL with a host. The returned value
/// has its trailing slashes stripped, but is otherwise left as written.
pub fn wwwroot(value: &str) -> Validation<String> {
    let reason = || "Please enter a valid URL for the web root.".to_string();
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(reason());
    }

    let url = Url::parse(trimmed).map_err(|_| reason())?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(reason());
    }

    Ok(trimmed.to_owned())
}

/// Validate email address syntax.
///
/// Checks the common dot-atom form: a local part of allowed characters
/// without leading, trailing, or doubled dots, followed by a domain of at
/// least two labels.
pub fn email(value: &str) -> Validation<String> {
    let reason = || "Invalid email address.".to_string();
    let value = value.trim();
    let (local, domain) = value.rsplit_once('@').ok_or_else(reason)?;

    if !is_local_part(local) || !is_domain(domain) {
        return Err(reason());
    }

    Ok(value.to_owned())
}

/// Validate admin account password length.
pub fn admin_password(value: &str) -> Validation<String> {
    if value.chars().count() < MIN_ADMIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_ADMIN_PASSWORD_LEN} characters long. Please try again."
        ));
    }

    Ok(value.to_owned())
}

fn is_local_part(local: &str) -> bool {
    const SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~";

    !local.is_empty()
        && local.len() <= 64
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || SPECIALS.contains(c))
}

fn is_domain(domain: &str) -> bool {
    let labels = domain.split('.').collect::<Vec<_>>();

    domain.len() <= 253
        && labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && labels
            .last()
            .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_alphabetic()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("admin@example.com"; "plain")]
    #[test_case("first.last+tag@sub.example.org"; "dotted plus tag")]
    #[test]
    fn email_accepts(input: &str) {
        assert_eq!(email(input), Ok(input.to_string()));
    }

    #[test_case("not-an-email"; "missing at")]
    #[test_case("@example.com"; "empty local")]
    #[test_case("admin@localhost"; "single label")]
    #[test_case("ad..min@example.com"; "double dot")]
    #[test_case("admin@-example.com"; "leading hyphen")]
    #[test_case("ad min@example.com"; "space")]
    #[test]
    fn email_rejects(input: &str) {
        assert_eq!(email(input), Err("Invalid email address.".into()));
    }

    #[test_case("12345", false; "five chars")]
    #[test_case("123456", true; "six chars")]
    #[test_case("", false; "empty")]
    #[test]
    fn admin_password_length(input: &str, valid: bool) {
        assert_eq!(admin_password(input).is_ok(), valid);
    }

    #[test_case("https://moodle.example.com/", Ok("https://moodle.example.com"); "trailing slash")]
    #[test_case("http://localhost:8080/moodle", Ok("http://localhost:8080/moodle"); "port and path")]
    #[test_case("moodle.example.com", Err(()); "no scheme")]
    #[test_case("ftp://moodle.example.com", Err(()); "wrong scheme")]
    #[test_case("", Err(()); "empty")]
    #[test]
    fn wwwroot_validation(input: &str, expect: Result<&str, ()>) {
        let result = wwwroot(input).map_err(|_| ());
        assert_eq!(result, expect.map(str::to_string));
    }

    #[test]
    fn non_empty_reports_field() {
        assert_eq!(
            non_empty("Database name", "  "),
            Err("Database name cannot be empty.".into())
        );
        assert_eq!(non_empty("Database name", "moodle"), Ok("moodle".into()));
    }

    #[test_case("1", true; "one")]
    #[test_case(" TRUE ", true; "upper true")]
    #[test_case("on", true; "on")]
    #[test_case("yes", true; "yes")]
    #[test_case("0", false; "zero")]
    #[test_case("off", false; "off")]
    #[test_case("nope", false; "garbage")]
    #[test]
    fn parse_bool_words(input: &str, expect: bool) {
        assert_eq!(parse_bool(input), expect);
    }
}
