#[cfg(test)]
use mockall::automock;

/// Yes/no decisions that need the operator's consent. Calls block until answered.
#[cfg_attr(test, automock)]
pub trait Operator {
    fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Answers every question the same way, for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Operator for FixedAnswer {
    fn confirm(&self, title: &str, _message: &str) -> bool {
        tracing::info!("auto-answering '{}' with {}", title, self.0);
        self.0
    }
}
