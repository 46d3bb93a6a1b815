// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
A small framework for telling the user what the tools are doing.

The collation runs are long and chatty (one line per tile), so instead of a
logging facade the CLI routes everything through a [`NotificationBackend`]:
progress notes go to standard output, problems to standard error, both with
colorized prefixes. A `--chatter` flag controls how much of the routine
output is shown.

*/

pub mod termcolor;

use anyhow::Error;
use std::fmt::Arguments;
use std::result::Result as StdResult;

/// How chatty the notification system should be.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum ChatterLevel {
    /// Only warnings and errors are reported.
    Minimal,

    /// Informational messages are reported too.
    Normal,
}

/// The kind of notification being produced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationKind {
    /// An informational notice.
    Note,

    /// Warning of an unusual condition; the run will likely still succeed.
    Warning,

    /// Notification of a severe problem; the run is about to give up.
    Severe,
}

/// Trait for types that deliver notifications to the user.
pub trait NotificationBackend {
    /// Notify the user about an event.
    ///
    /// If `err` is not `None`, the information it contains should be
    /// reported after the main message.
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>);
}

/// Send an informational notification to the user.
///
/// ```rust,ignore
/// mn_note!(nbe, "collated {} tiles", n_tiles);
/// ```
///
/// where `nbe` implements [`NotificationBackend`]. An `Error` value may be
/// supplied after a semicolon; its contents are printed after the message.
#[macro_export]
macro_rules! mn_note {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Note, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Note, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// Warn the user of a problematic condition. Usage as with [`mn_note!`].
#[macro_export]
macro_rules! mn_warning {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Warning, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Warning, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// A notification backend that discards everything. Handy in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotificationBackend {}

impl NoopNotificationBackend {
    /// Create a new NoopNotificationBackend.
    pub fn new() -> Self {
        NoopNotificationBackend {}
    }
}

impl NotificationBackend for NoopNotificationBackend {
    fn notify(&mut self, _kind: NotificationKind, _args: Arguments, _err: Option<Error>) {}
}

/// An extension trait for adding the standard notification arguments to a
/// clap `Command`.
pub trait ClapNotificationArgsExt {
    /// Add the standard mcal notification-related arguments.
    fn mcal_notify_args(self) -> Self;
}

impl ClapNotificationArgsExt for clap::Command {
    fn mcal_notify_args(self) -> Self {
        self.arg(
            clap::Arg::new("chatter_level")
                .long("chatter")
                .short('c')
                .value_name("LEVEL")
                .help("How much chatter to print when running")
                .value_parser(["default", "minimal"])
                .default_value("default")
                .global(true),
        )
    }
}

/// Run a function with colorized reporting of errors, returning the exit
/// code the process should use.
pub fn run_with_notifications<E, F>(matches: clap::ArgMatches, inner: F) -> i32
where
    E: Into<Error>,
    F: FnOnce(clap::ArgMatches, &mut dyn NotificationBackend) -> StdResult<i32, E>,
{
    let chatter = match matches
        .get_one::<String>("chatter_level")
        .map(|s| s.as_str())
    {
        Some("minimal") => ChatterLevel::Minimal,
        _ => ChatterLevel::Normal,
    };

    let mut tnb = termcolor::TermcolorNotificationBackend::new(chatter);

    match inner(matches, &mut tnb) {
        Ok(ret) => ret,

        Err(e) => {
            tnb.bare_error(e);
            1
        }
    }
}
