use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Setup phases counted before the first step: preflight, log retention, run log.
pub const SETUP_PHASES: u64 = 3;

/// Terminal progress over a whole run: the setup phases, one tick per step, and a final tick.
///
/// Drawn on stderr and never through the transcript console, so it stays out of the run log.
/// indicatif skips drawing when stderr is not a terminal.
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    pub fn new(step_count: usize) -> Self {
        Self::with_target(step_count, ProgressDrawTarget::stderr())
    }

    pub fn with_target(step_count: usize, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(Self::total_for(step_count)), target);
        match ProgressStyle::with_template(
            "{spinner:.green} Pipeline Progress [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            Ok(style) => bar.set_style(style.progress_chars("=> ")),
            Err(e) => tracing::debug!("falling back to the default progress style: {e}"),
        }
        Self { bar }
    }

    pub fn total_for(step_count: usize) -> u64 {
        SETUP_PHASES + step_count as u64 + 1
    }

    /// Mark `phase` as done.
    pub fn advance(&self, phase: &str) {
        self.bar.set_message(phase.to_string());
        self.bar.inc(1);
    }

    /// Run `f` with the bar cleared, for prompts and other terminal output.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("done");
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn total(&self) -> Option<u64> {
        self.bar.length()
    }
}
