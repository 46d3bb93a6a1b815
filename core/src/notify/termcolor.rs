// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
A notification backend that sends colorized output to the terminal.

*/

use anyhow::Error;
use std::fmt::Arguments;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use super::{ChatterLevel, NotificationBackend, NotificationKind};

/// A notification backend that writes colorized prefixes to standard
/// output (notes) and standard error (everything else).
pub struct TermcolorNotificationBackend {
    chatter: ChatterLevel,
    stdout: StandardStream,
    stderr: StandardStream,
    note_spec: ColorSpec,
    warning_spec: ColorSpec,
    severe_spec: ColorSpec,
}

impl TermcolorNotificationBackend {
    /// Create a new TermcolorNotificationBackend.
    pub fn new(chatter: ChatterLevel) -> TermcolorNotificationBackend {
        let mut note_spec = ColorSpec::new();
        note_spec.set_fg(Some(Color::Green)).set_bold(true);

        let mut warning_spec = ColorSpec::new();
        warning_spec.set_fg(Some(Color::Yellow)).set_bold(true);

        let mut severe_spec = ColorSpec::new();
        severe_spec.set_fg(Some(Color::Red)).set_bold(true);

        TermcolorNotificationBackend {
            chatter,
            stdout: StandardStream::stdout(ColorChoice::Auto),
            stderr: StandardStream::stderr(ColorChoice::Auto),
            note_spec,
            warning_spec,
            severe_spec,
        }
    }

    fn styled<F>(&mut self, kind: NotificationKind, f: F)
    where
        F: FnOnce(&mut StandardStream),
    {
        if kind == NotificationKind::Note && self.chatter <= ChatterLevel::Minimal {
            return;
        }

        let (spec, stream) = match kind {
            NotificationKind::Note => (&self.note_spec, &mut self.stdout),
            NotificationKind::Warning => (&self.warning_spec, &mut self.stderr),
            NotificationKind::Severe => (&self.severe_spec, &mut self.stderr),
        };

        stream.set_color(spec).expect("failed to set color");
        f(stream);
        stream.reset().expect("failed to clear color");
    }

    fn with_stream<F>(&mut self, kind: NotificationKind, f: F)
    where
        F: FnOnce(&mut StandardStream),
    {
        if kind == NotificationKind::Note && self.chatter <= ChatterLevel::Minimal {
            return;
        }

        let stream = match kind {
            NotificationKind::Note => &mut self.stdout,
            NotificationKind::Warning => &mut self.stderr,
            NotificationKind::Severe => &mut self.stderr,
        };

        f(stream);
    }

    fn generic_message(&mut self, kind: NotificationKind, prefix: Option<&str>, args: Arguments) {
        let text = match prefix {
            Some(s) => s,
            None => match kind {
                NotificationKind::Note => "note:",
                NotificationKind::Warning => "warning:",
                NotificationKind::Severe => "severe:",
            },
        };

        self.styled(kind, |s| {
            write!(s, "{}", text).expect("failed to write to standard stream");
        });
        self.with_stream(kind, |s| {
            writeln!(s, " {}", args).expect("failed to write to standard stream");
        });
    }

    /// Print the information contained in an Error object: the error, the
    /// chain of causes, and the backtrace if one was captured.
    pub fn bare_error<E: Into<Error>>(&mut self, err: E) {
        let mut prefix = "error:";
        let err = err.into();

        for cause in err.chain() {
            self.generic_message(NotificationKind::Severe, Some(prefix), format_args!("{}", cause));
            prefix = "caused by:";
        }

        let backtrace = err.backtrace();
        self.generic_message(
            NotificationKind::Severe,
            Some("debugging:"),
            format_args!("backtrace follows:"),
        );
        self.with_stream(NotificationKind::Severe, |s| {
            writeln!(s, "{:?}", backtrace).expect("backtrace dump failed");
        });
    }
}

impl NotificationBackend for TermcolorNotificationBackend {
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>) {
        self.generic_message(kind, None, args);

        if let Some(e) = err {
            for cause in e.chain() {
                self.generic_message(kind, Some("caused by:"), format_args!("{}", cause));
            }
        }
    }
}
