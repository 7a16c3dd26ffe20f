use crate::errors::StepError;
use crate::tee::Console;

/// The work behind one pipeline step.
///
/// An attempt either completes, reports a missing dependency by name, or fails with any other
/// error. Output produced while working goes through the console so it lands in the run log.
pub trait StepWork {
    fn run(&mut self, console: &mut Console) -> Result<(), StepError>;
}

impl<F> StepWork for F
where
    F: FnMut(&mut Console) -> Result<(), StepError>,
{
    fn run(&mut self, console: &mut Console) -> Result<(), StepError> {
        self(console)
    }
}

/// A named unit of pipeline work, fixed at construction.
pub struct PipelineStep {
    name: String,
    work: Box<dyn StepWork>,
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, work: impl StepWork + 'static) -> Self {
        Self {
            name: name.into(),
            work: Box::new(work),
        }
    }

    /// Step backed by a closure.
    pub fn from_fn<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnMut(&mut Console) -> Result<(), StepError> + 'static,
    {
        Self::new(name, work)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn attempt(&mut self, console: &mut Console) -> Result<(), StepError> {
        self.work.run(console)
    }
}

impl std::fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStep").field("name", &self.name).finish()
    }
}
