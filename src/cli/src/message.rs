//! Tagged one-line status messages for the terminal.
//!
//! These bypass the run transcript. Errors go to stderr, everything else to stdout.
use colored::{ColoredString, Colorize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Info,
    Warning,
    Error,
}

impl MessageKind {
    /// Right-aligned so message bodies line up.
    pub fn tag(self) -> ColoredString {
        match self {
            MessageKind::Success => "[SUCCESS]".green().bold(),
            MessageKind::Info => "   [INFO]".cyan().bold(),
            MessageKind::Warning => "[WARNING]".yellow().bold(),
            MessageKind::Error => "  [ERROR]".red().bold(),
        }
    }
}

pub fn format_message(kind: MessageKind, text: &str) -> String {
    format!("{} {}", kind.tag(), text)
}

pub fn print_message(kind: MessageKind, text: &str) {
    let line = format_message(kind, text);
    match kind {
        MessageKind::Error => eprintln!("{line}"),
        _ => println!("{line}"),
    }
}

#[macro_export]
macro_rules! success_message {
    ($($arg:tt)*) => {
        $crate::message::print_message($crate::message::MessageKind::Success, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! info_message {
    ($($arg:tt)*) => {
        $crate::message::print_message($crate::message::MessageKind::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warning_message {
    ($($arg:tt)*) => {
        $crate::message::print_message($crate::message::MessageKind::Warning, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! error_message {
    ($($arg:tt)*) => {
        $crate::message::print_message($crate::message::MessageKind::Error, &format!($($arg)*))
    };
}
