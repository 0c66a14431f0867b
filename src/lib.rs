// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Moodle scaffolding for Composer projects.
//!
//! After Composer installs Moodle into a project, Moodle still needs a
//! configuration file and a database before it can serve a single page. This
//! crate takes care of both: it writes the `config.php` Moodle expects, and it
//! drives Moodle's own CLI installer to set up the database and admin account.
//!
//! Everything starts at [`Scaffolder`], which is handed a [`ProjectLayout`]
//! describing where things live, the [`Overrides`] that answer questions ahead
//! of time, and an [`InteractionChannel`] to ask the rest.

pub mod channel;
pub mod config;
pub mod overrides;
pub mod path;
pub mod scaffold;
pub mod validate;

pub use channel::{InteractionChannel, ScriptedChannel, TerminalChannel};
pub use config::ProjectLayout;
pub use overrides::Overrides;
pub use scaffold::{
    events::{ComposerScripts, EventDispatcher, NoopDispatcher, ScaffoldEvent},
    ScaffoldError, ScaffoldReport, Scaffolder,
};
