pub mod box_formatter;
pub mod commands;
pub mod handlers;
pub mod message;
pub mod process_command;
pub mod progress;
pub mod prompts;
pub mod theme;
