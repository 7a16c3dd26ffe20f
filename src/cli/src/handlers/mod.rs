mod info;
mod logs;
mod probe_gpu;
mod run;

pub use info::info;
pub use logs::logs;
pub use probe_gpu::probe_gpu;
pub use run::run;
