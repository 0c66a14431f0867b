// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Line-oriented user interaction.
//!
//! The scaffolder talks to the person running it through an
//! [`InteractionChannel`]. The channel knows how to print a line, and how to
//! ask a handful of question shapes: yes or no, free text, hidden text, and
//! one-of-many selection. Whatever sits behind the channel, a terminal or a
//! queue of canned answers, is of no concern to the scaffolding logic.
//!
//! # Validation Loops
//!
//! Questions whose answers must pass a check are driven by [`until_valid`].
//! It keeps asking until the validator accepts, printing the validator's
//! reason after every rejected answer.
//!
//! # Non-Interactive Use
//!
//! Without a person on the other end, every question is answered with its
//! default. A question without a default fails with
//! [`ChannelError::NonInteractive`], and a rejected answer fails with
//! [`ChannelError::Rejected`] rather than being asked again.

use crate::validate::Validation;

use inquire::{Confirm, Password, PasswordDisplayMode, Select, Text};
use std::{
    collections::VecDeque,
    fmt::{Display, Formatter, Result as FmtResult},
    io::IsTerminal,
};

/// Capability to interact with the user.
pub trait InteractionChannel {
    /// Print a line of text.
    fn write(&mut self, text: &str);

    /// Whether there is a person on the other end to answer prompts.
    fn is_interactive(&self) -> bool;

    /// Ask yes or no question.
    fn ask_yes_no(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Ask for free text. An empty answer selects the default if given.
    fn ask(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Ask for text without echoing it back.
    fn ask_secret(&mut self, prompt: &str) -> Result<String>;

    /// Ask user to pick one option by key.
    ///
    /// Options are `(key, label)` pairs. Returns the key of the selected
    /// option.
    fn select(&mut self, prompt: &str, options: &[(&str, &str)], default: &str) -> Result<String>;

    /// Ask for free text until the validator accepts it.
    fn ask_validated(
        &mut self,
        prompt: &str,
        validator: impl Fn(&str) -> Validation<String>,
        default: Option<&str>,
    ) -> Result<String>
    where
        Self: Sized,
    {
        until_valid(self, |channel| channel.ask(prompt, default), validator)
    }
}

/// Drive question until its answer validates.
///
/// Calls `ask` for an answer, and hands it to `validate`. Every rejection is
/// reported through the channel before asking again.
///
/// # Errors
///
/// - Return [`ChannelError`] if asking itself fails.
pub fn until_valid<C, T>(
    channel: &mut C,
    mut ask: impl FnMut(&mut C) -> Result<String>,
    validate: impl Fn(&str) -> Validation<T>,
) -> Result<T>
where
    C: InteractionChannel + ?Sized,
{
    loop {
        let answer = ask(channel)?;
        match validate(&answer) {
            Ok(value) => return Ok(value),
            Err(reason) => {
                channel.write(&format!("error: {reason}"));
                if !channel.is_interactive() {
                    return Err(ChannelError::Rejected { reason });
                }
            }
        }
    }
}

/// Channel connected to the controlling terminal.
///
/// Prompts are rendered through [`inquire`]. Output goes to standard output.
#[derive(Debug, Default)]
pub struct TerminalChannel;

impl TerminalChannel {
    /// Construct new terminal channel.
    pub fn new() -> Self {
        Self
    }
}

impl InteractionChannel for TerminalChannel {
    fn write(&mut self, text: &str) {
        println!("{text}");
    }

    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn ask_yes_no(&mut self, prompt: &str, default: bool) -> Result<bool> {
        if !self.is_interactive() {
            return Ok(default);
        }

        Ok(Confirm::new(prompt).with_default(default).prompt()?)
    }

    fn ask(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        if !self.is_interactive() {
            return default_answer(prompt, default);
        }

        let mut text = Text::new(prompt);
        if let Some(default) = default {
            text = text.with_default(default);
        }

        Ok(text.prompt()?)
    }

    fn ask_secret(&mut self, prompt: &str) -> Result<String> {
        if !self.is_interactive() {
            return default_answer(prompt, None);
        }

        Ok(Password::new(prompt)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Hidden)
            .prompt()?)
    }

    fn select(&mut self, prompt: &str, options: &[(&str, &str)], default: &str) -> Result<String> {
        if !self.is_interactive() {
            return Ok(default.to_string());
        }

        let choices = options
            .iter()
            .map(|&(key, label)| Choice { key, label })
            .collect::<Vec<_>>();
        let cursor = choices
            .iter()
            .position(|choice| choice.key == default)
            .unwrap_or_default();

        let picked = Select::new(prompt, choices)
            .with_starting_cursor(cursor)
            .prompt()?;

        Ok(picked.key.to_string())
    }
}

fn default_answer(prompt: &str, default: Option<&str>) -> Result<String> {
    default
        .map(str::to_string)
        .ok_or_else(|| ChannelError::NonInteractive {
            prompt: prompt.to_string(),
        })
}

/// Selectable option shown by its label.
struct Choice<'a> {
    key: &'a str,
    label: &'a str,
}

impl Display for Choice<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.label)
    }
}

/// Channel fed from a queue of canned answers.
///
/// Records every prompt asked and every line written so callers can inspect
/// the conversation afterwards. Yes or no answers accept `y`, `yes`, `n`, and
/// `no`. An empty answer always selects the default of the question. A
/// non-interactive scripted channel consumes no answers, and behaves like a
/// terminal without a person in front of it.
#[derive(Debug, Clone)]
pub struct ScriptedChannel {
    answers: VecDeque<String>,
    interactive: bool,
    prompts: Vec<String>,
    output: Vec<String>,
}

impl ScriptedChannel {
    /// Construct new interactive scripted channel.
    pub fn new(answers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            interactive: true,
            prompts: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Construct new scripted channel that reports itself as non-interactive.
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Prompts asked so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Lines written so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Check if any written line contains target text.
    pub fn said(&self, text: &str) -> bool {
        self.output.iter().any(|line| line.contains(text))
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next_answer(&mut self, prompt: &str, has_default: bool) -> Result<String> {
        self.prompts.push(prompt.to_string());
        if !self.interactive {
            // INVARIANT: An empty answer selects the default.
            if has_default {
                return Ok(String::new());
            }
            return Err(ChannelError::NonInteractive {
                prompt: prompt.to_string(),
            });
        }

        self.answers.pop_front().ok_or_else(|| ChannelError::Exhausted {
            prompt: prompt.to_string(),
        })
    }
}

impl InteractionChannel for ScriptedChannel {
    fn write(&mut self, text: &str) {
        self.output.push(text.to_string());
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn ask_yes_no(&mut self, prompt: &str, default: bool) -> Result<bool> {
        let answer = self.next_answer(prompt, true)?;
        match answer.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "y" | "yes" => Ok(true),
            "n" | "no" => Ok(false),
            _ => Err(ChannelError::Unexpected { prompt: prompt.into(), answer }),
        }
    }

    fn ask(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let answer = self.next_answer(prompt, default.is_some())?;
        match default {
            Some(default) if answer.is_empty() => Ok(default.to_string()),
            _ => Ok(answer),
        }
    }

    fn ask_secret(&mut self, prompt: &str) -> Result<String> {
        self.next_answer(prompt, false)
    }

    fn select(&mut self, prompt: &str, options: &[(&str, &str)], default: &str) -> Result<String> {
        let answer = self.next_answer(prompt, true)?;
        if answer.is_empty() {
            return Ok(default.to_string());
        }

        if options.iter().any(|(key, _)| *key == answer) {
            Ok(answer)
        } else {
            Err(ChannelError::Unexpected { prompt: prompt.into(), answer })
        }
    }
}

/// Interaction error types.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Terminal prompt failed or was cancelled by the user.
    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),

    /// Scripted channel ran out of answers.
    #[error("no scripted answer left for prompt {prompt:?}")]
    Exhausted { prompt: String },

    /// Scripted answer does not fit the question.
    #[error("scripted answer {answer:?} does not fit prompt {prompt:?}")]
    Unexpected { prompt: String, answer: String },

    /// Question has no default, and nobody is there to answer it.
    #[error("cannot answer {prompt:?} without an interactive terminal")]
    NonInteractive { prompt: String },

    /// Answer was rejected, and nobody is there to give another one.
    #[error("{reason}")]
    Rejected { reason: String },
}

/// Friendly result alias :3
pub type Result<T, E = ChannelError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate;
    use pretty_assertions::assert_eq;

    #[test]
    fn until_valid_reprompts_with_reason() -> anyhow::Result<()> {
        let mut channel = ScriptedChannel::new(["abc", "12345", "123456"]);

        let password = until_valid(
            &mut channel,
            |channel| channel.ask_secret("Admin password"),
            validate::admin_password,
        )?;

        assert_eq!(password, "123456");
        assert_eq!(channel.prompts().len(), 3);
        assert_eq!(
            channel
                .output()
                .iter()
                .filter(|line| line.contains("at least 6 characters"))
                .count(),
            2
        );

        Ok(())
    }

    #[test]
    fn ask_validated_uses_default_on_empty_answer() -> anyhow::Result<()> {
        let mut channel = ScriptedChannel::new([""]);

        let name = channel.ask_validated(
            "Database name",
            |value| validate::non_empty("Database name", value),
            Some("mysite"),
        )?;

        assert_eq!(name, "mysite");
        assert!(channel.output().is_empty());

        Ok(())
    }

    #[test]
    fn ask_validated_stops_when_answers_run_out() {
        let mut channel = ScriptedChannel::new(["not-an-email"]);

        let result = channel.ask_validated("Admin email", validate::email, None);

        assert!(matches!(result, Err(ChannelError::Exhausted { .. })));
        assert!(channel.said("Invalid email address."));
    }

    #[test]
    fn non_interactive_answers_with_defaults() -> anyhow::Result<()> {
        let mut channel = ScriptedChannel::non_interactive();

        assert!(channel.ask_yes_no("Proceed?", true)?);
        assert!(!channel.ask_yes_no("Overwrite?", false)?);
        assert_eq!(channel.ask("Database host", Some("localhost"))?, "localhost");
        assert_eq!(
            channel.select("Driver", &[("pgsql", "PostgreSQL")], "pgsql")?,
            "pgsql"
        );
        assert!(matches!(
            channel.ask_secret("Database password"),
            Err(ChannelError::NonInteractive { .. })
        ));
        assert_eq!(channel.prompts().len(), 5);

        Ok(())
    }

    #[test]
    fn non_interactive_rejection_is_error() {
        let mut channel = ScriptedChannel::non_interactive();

        let result = channel.ask_validated(
            "Database name",
            |value| validate::non_empty("Database name", value),
            Some(" "),
        );

        assert!(matches!(result, Err(ChannelError::Rejected { .. })));
        assert!(channel.said("Database name cannot be empty."));
    }

    #[test]
    fn scripted_select_checks_keys() -> anyhow::Result<()> {
        let options = [("pgsql", "PostgreSQL"), ("mysqli", "MySQL")];
        let mut channel = ScriptedChannel::new(["", "mysqli", "oracle"]);

        assert_eq!(channel.select("Driver", &options, "pgsql")?, "pgsql");
        assert_eq!(channel.select("Driver", &options, "pgsql")?, "mysqli");
        assert!(matches!(
            channel.select("Driver", &options, "pgsql"),
            Err(ChannelError::Unexpected { .. })
        ));

        Ok(())
    }

    #[test]
    fn scripted_yes_no_defaults() -> anyhow::Result<()> {
        let mut channel = ScriptedChannel::new(["", "", "y", "NO"]);

        assert!(channel.ask_yes_no("Proceed?", true)?);
        assert!(!channel.ask_yes_no("Overwrite?", false)?);
        assert!(channel.ask_yes_no("Proceed?", false)?);
        assert!(!channel.ask_yes_no("Proceed?", true)?);
        assert_eq!(channel.remaining(), 0);

        Ok(())
    }
}
