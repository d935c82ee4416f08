//! Relative generating systems.
//!
//! A [`RelativeSystem`] computes the image and the kernel of a map $d \colon A^s \to A^r$ at the
//! same time. Its generators are the rows $[d(e_j) \mid e_j]$ of the graph of $d$, of which only
//! the first $r$ blocks take part in reductions. Whenever the image part of a vector reduces to
//! zero, what is left is an element of the kernel, and it is handed to the kernel
//! [`FoundationSystem`].
//!
//! The system is a state machine driven by a [`Scheduler`](crate::scheduler::Scheduler): every
//! call to [`advance`](RelativeSystem::advance) performs one transition and tells the scheduler
//! whether the kernel system should run next.

use std::sync::Arc;

use fp::vector::FpVector;

use crate::algebra::AlgebraContext;
use crate::error::{Error, Result};
use crate::fgs::{FgsState, FoundationSystem};
use crate::ngs::pool::VectorPool;
use crate::ngs::Ngs;
use crate::utils::{Heuristics, Interrupt};

/// What the scheduler should do after a call to [`RelativeSystem::advance`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Request {
    Continue,
    /// Run the kernel system once. It may pause.
    KernelWork,
    /// Run the kernel system, which has to finish now that the image is complete.
    ForceKernel,
    Done,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Setup,
    Expanding,
    ForceKernel,
    Verify,
    Done,
}

#[derive(Debug)]
pub struct RelativeSystem {
    image: Ngs,
    ker: FoundationSystem,
    overshoot: usize,
    prev_ker_pnon: usize,
    phase: Phase,
}

impl RelativeSystem {
    /// A system for a map from a free module of rank `source_rank` to one of rank
    /// `target_rank`. `image_dimension` is the expected dimension of the image, if known.
    pub fn new(
        algebra: Arc<AlgebraContext>,
        target_rank: usize,
        source_rank: usize,
        image_dimension: Option<usize>,
        heuristics: Heuristics,
        interrupt: Interrupt,
    ) -> Self {
        let ker = FoundationSystem::new(
            Arc::clone(&algebra),
            source_rank,
            None,
            heuristics.max_unfruitful,
            interrupt.clone(),
        );
        Self {
            image: Ngs::new(algebra, target_rank, source_rank, image_dimension, interrupt),
            prev_ker_pnon: ker.ngs().pnontips(),
            ker,
            overshoot: heuristics.overshoot,
            phase: Phase::Setup,
        }
    }

    pub fn image(&self) -> &Ngs {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut Ngs {
        &mut self.image
    }

    pub fn kernel(&self) -> &FoundationSystem {
        &self.ker
    }

    pub fn kernel_mut(&mut self) -> &mut FoundationSystem {
        &mut self.ker
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Adds the generator $[d(e_j) \mid e_j]$. Only possible before the first
    /// [`advance`](Self::advance).
    pub fn add_generator(&mut self, pool: &mut VectorPool, j: usize, image: &FpVector) -> Result<()> {
        if self.phase != Phase::Setup {
            return Err(Error::invalid_state(
                "generators must be added before the relative system starts",
            ));
        }
        let n = self.image.algebra().dimension();
        let r = self.image.rank();
        if j >= self.image.aux_rank() {
            return Err(fp::FpError::OutOfBounds {
                index: j,
                len: self.image.aux_rank(),
            }
            .into());
        }
        if image.len() != r * n {
            return Err(fp::FpError::DimensionMismatch {
                expected: r * n,
                found: image.len(),
            }
            .into());
        }
        let mut row = FpVector::new(image.prime(), self.image.row_len());
        row.assign_offset(image, 0);
        row.set_entry(r * n + j * n, 1);
        self.image.insert(pool, &row)
    }

    /// Whether the kernel system should run after the current image step. It should if any of
    /// these holds:
    ///
    /// - the image rank cannot be certified from the target yet;
    /// - the image is complete;
    /// - at least `overshoot` image steps in a row were unfruitful;
    /// - the kernel made progress during its last run.
    ///
    /// Kernel work is not held back until the image rank is certifiable.
    pub fn appropriate_to_do_kernel_work(&self) -> bool {
        let unfruitful = self.image.unfruitful();
        !self.image.easy_correct_rank()
            || !self.ker.rgs_unfinished()
            || unfruitful >= self.overshoot
            || (unfruitful < self.overshoot && self.ker.ngs().pnontips() < self.prev_ker_pnon)
    }

    /// Whether the image system has swept every degree and no heady vector is left.
    fn image_complete(&self) -> Result<bool> {
        Ok(self.image.pending() == 0
            && self.image.all_expansions_done()?
            && !self.image.has_heady())
    }

    /// Moves kernel elements found by the image system into the kernel system.
    fn feed_kernel(&mut self, pool: &mut VectorPool) -> Result<()> {
        let relations = self.image.take_relations();
        if self.ker.is_finished() {
            return Ok(());
        }
        if !relations.is_empty() {
            tracing::debug!(count = relations.len(), "feeding kernel");
        }
        for relation in &relations {
            self.ker.insert(pool, relation)?;
        }
        self.ker.ngs_mut().absorb(pool)
    }

    /// Performs one transition of the relative algorithm.
    pub fn advance(&mut self, pool: &mut VectorPool) -> Result<Request> {
        match self.phase {
            Phase::Setup => {
                self.ker.set_rgs_unfinished(true);
                self.image.absorb(pool)?;
                self.feed_kernel(pool)?;
                self.image.start_expansion(false);
                self.phase = Phase::Expanding;
                Ok(Request::Continue)
            }
            Phase::Expanding => {
                // Vectors queued by a step that was interrupted before its absorb.
                self.image.absorb(pool)?;
                self.feed_kernel(pool)?;
                if self.image_complete()? {
                    self.ker.set_rgs_unfinished(false);
                    self.phase = if self.ker.is_finished() {
                        Phase::Verify
                    } else {
                        Phase::ForceKernel
                    };
                    return Ok(Request::Continue);
                }
                self.prev_ker_pnon = self.ker.ngs().pnontips();
                self.image.expand(pool)?;
                self.image.absorb(pool)?;
                if self.image_complete()? {
                    self.ker.set_rgs_unfinished(false);
                }
                self.image.update_counters();
                self.feed_kernel(pool)?;

                if !self.ker.is_finished() && self.appropriate_to_do_kernel_work() {
                    Ok(Request::KernelWork)
                } else {
                    Ok(Request::Continue)
                }
            }
            Phase::ForceKernel => {
                self.ker.set_rgs_unfinished(false);
                Ok(Request::ForceKernel)
            }
            Phase::Verify => {
                if let Some(expected) = self.image.target_rank() {
                    let found = self.ker.ngs().pnontips();
                    if found != expected {
                        return Err(Error::RankMismatch { expected, found });
                    }
                }
                tracing::info!(
                    image = self.image.spanned(),
                    kernel = self.ker.ngs().spanned(),
                    "relative system finished"
                );
                self.phase = Phase::Done;
                Ok(Request::Done)
            }
            Phase::Done => Ok(Request::Done),
        }
    }

    /// Reports the outcome of a kernel run requested by [`advance`](Self::advance).
    pub fn kernel_returned(&mut self, state: FgsState) -> Result<()> {
        match (self.phase, state) {
            (Phase::Expanding | Phase::ForceKernel, FgsState::Finished) => {
                self.phase = Phase::Verify;
                Ok(())
            }
            (Phase::Expanding, FgsState::Paused) => Ok(()),
            (Phase::ForceKernel, FgsState::Paused) => Err(Error::invalid_state(
                "kernel paused although the image is complete",
            )),
            (phase, state) => Err(Error::invalid_state(format!(
                "kernel returned {state:?} in phase {phase:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scheduler::Scheduler;
    use fp::prime::TWO;

    fn heuristics() -> Heuristics {
        Heuristics {
            max_unfruitful: 2,
            overshoot: 3,
        }
    }

    #[test]
    fn generators_only_before_start() {
        let algebra = Arc::new(AlgebraContext::truncated_polynomial(TWO, 2).unwrap());
        let mut pool = VectorPool::new(TWO);
        let mut rgs =
            RelativeSystem::new(algebra, 1, 1, Some(1), heuristics(), Interrupt::new());
        let x = FpVector::from_slice(TWO, &[0, 1]);
        assert!(rgs.add_generator(&mut pool, 1, &x).is_err());
        rgs.add_generator(&mut pool, 0, &x).unwrap();
        assert_eq!(rgs.advance(&mut pool).unwrap(), Request::Continue);
        assert!(rgs.add_generator(&mut pool, 0, &x).is_err());
    }

    #[test]
    fn resumes_between_expand_and_absorb() {
        // Multiplication by x on F_2[x]/x^4. The image has dimension 3 and the kernel is
        // generated by x^3.
        let algebra = Arc::new(AlgebraContext::truncated_polynomial(TWO, 4).unwrap());
        let interrupt = Interrupt::new();
        let mut pool = VectorPool::new(TWO);
        let mut rgs = RelativeSystem::new(
            Arc::clone(&algebra),
            1,
            1,
            Some(3),
            heuristics(),
            interrupt.clone(),
        );
        rgs.add_generator(&mut pool, 0, &FpVector::from_slice(TWO, &[0, 1, 0, 0]))
            .unwrap();
        assert_eq!(rgs.advance(&mut pool).unwrap(), Request::Continue);

        rgs.image_mut().expand(&mut pool).unwrap();
        interrupt.trigger();
        assert!(matches!(
            rgs.image_mut().absorb(&mut pool),
            Err(Error::Interrupted { .. })
        ));
        assert_eq!(rgs.image().pending(), 1);
        interrupt.reset();

        Scheduler::new(&mut pool).run_relative(&mut rgs).unwrap();
        assert!(rgs.is_done());
        assert!(!rgs.image().has_heady());
        assert_eq!(rgs.image().spanned(), 3);
        assert_eq!(
            rgs.kernel().minimal_generators(),
            &[FpVector::from_slice(TWO, &[0, 0, 0, 1])]
        );
    }

    #[test]
    fn kernel_protocol() {
        let algebra = Arc::new(AlgebraContext::truncated_polynomial(TWO, 2).unwrap());
        let mut rgs = RelativeSystem::new(algebra, 1, 1, None, heuristics(), Interrupt::new());
        assert!(rgs.kernel_returned(FgsState::Finished).is_err());
        rgs.phase = Phase::ForceKernel;
        assert!(matches!(
            rgs.kernel_returned(FgsState::Paused),
            Err(Error::InvalidState(_))
        ));
        rgs.kernel_returned(FgsState::Finished).unwrap();
        assert_eq!(rgs.phase, Phase::Verify);
    }
}
