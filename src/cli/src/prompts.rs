use crate::theme::INTERACTIVE_THEME;
use colored::Colorize;
use dialoguer::Confirm;
use pipeline_runner::operator::{FixedAnswer, Operator};

/// Asks the person at the terminal. A prompt that cannot be shown counts as "no".
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn confirm(&self, title: &str, message: &str) -> bool {
        println!("{}", format!("== {title} ==").bold());
        let answer = Confirm::with_theme(&*INTERACTIVE_THEME)
            .with_prompt(message)
            .default(false)
            .interact()
            .unwrap_or(false);
        tracing::info!("operator answered '{}' with {}", title, answer);
        answer
    }
}

/// `--yes` answers every question with yes, `--no-input` with no, otherwise the terminal asks.
pub fn operator_for(yes: bool, no_input: bool) -> Box<dyn Operator> {
    if yes {
        Box::new(FixedAnswer(true))
    } else if no_input {
        Box::new(FixedAnswer(false))
    } else {
        Box::new(TerminalOperator)
    }
}
