use crate::error::Result;
use crate::fgs::{FgsState, FoundationSystem};
use crate::ngs::pool::VectorPool;
use crate::rgs::{Request, RelativeSystem};

/// Statistics of one scheduled computation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Degree steps of the image system.
    pub image_steps: usize,
    /// Runs of the kernel system that did some work.
    pub kernel_invocations: usize,
}

/// Drives relative and foundation systems to completion. The relative system never calls its
/// kernel system itself; it asks the scheduler to, and is told the outcome.
#[derive(Debug)]
pub struct Scheduler<'a> {
    pool: &'a mut VectorPool,
}

impl<'a> Scheduler<'a> {
    pub fn new(pool: &'a mut VectorPool) -> Self {
        Self { pool }
    }

    /// Runs `rgs` until both its image and its kernel are complete. If this returns an error,
    /// calling it again resumes where the computation stopped.
    #[tracing::instrument(skip_all)]
    pub fn run_relative(&mut self, rgs: &mut RelativeSystem) -> Result<ScheduleReport> {
        let mut report = ScheduleReport::default();
        let kernel_runs = rgs.kernel().runs();
        loop {
            match rgs.advance(self.pool)? {
                Request::Continue => (),
                Request::KernelWork | Request::ForceKernel => {
                    let state = rgs.kernel_mut().run(self.pool)?;
                    rgs.kernel_returned(state)?;
                }
                Request::Done => break,
            }
        }
        report.image_steps = rgs.image().steps();
        report.kernel_invocations = rgs.kernel().runs() - kernel_runs;
        Ok(report)
    }

    /// Runs a stand-alone foundation system.
    pub fn run_foundation(&mut self, fgs: &mut FoundationSystem) -> Result<FgsState> {
        fgs.set_rgs_unfinished(false);
        fgs.run(self.pool)
    }
}
