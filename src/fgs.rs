//! Foundation generating systems.
//!
//! A [`FoundationSystem`] saturates the submodule generated by the vectors inserted into it. It
//! can run stand-alone, or as the kernel system of a [`RelativeSystem`](crate::rgs::RelativeSystem),
//! in which case it receives generators in batches while the relative system is still running
//! and may pause to wait for more.
//!
//! Once finished, it computes a minimal generating set. By Nakayama's lemma a set of elements of
//! $K$ generates $K$ minimally if and only if it maps to a basis of $K / KJ$, where $J$ is the
//! augmentation ideal. $KJ$ is spanned by the products of the basis with the generators of the
//! algebra, and the inserted generators span $K$ modulo $KJ$.

use std::sync::Arc;

use fp::matrix::Subspace;
use fp::vector::FpVector;

use crate::algebra::AlgebraContext;
use crate::error::{Error, Result};
use crate::ngs::pool::VectorPool;
use crate::ngs::{ExpDim, Ngs, Origin};
use crate::utils::Interrupt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FgsState {
    /// The span is the whole submodule. This is terminal.
    Finished,
    /// Waiting for more generators from the dependent computation.
    Paused,
}

#[derive(Debug)]
pub struct FoundationSystem {
    ngs: Ngs,
    finished: bool,
    rgs_unfinished: bool,
    max_unfruitful: usize,
    minimal_generators: Vec<FpVector>,
    runs: usize,
}

impl FoundationSystem {
    pub fn new(
        algebra: Arc<AlgebraContext>,
        rank: usize,
        target_rank: Option<usize>,
        max_unfruitful: usize,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            ngs: Ngs::new(algebra, rank, 0, target_rank, interrupt),
            finished: false,
            rgs_unfinished: false,
            max_unfruitful,
            minimal_generators: Vec::new(),
            runs: 0,
        }
    }

    pub fn ngs(&self) -> &Ngs {
        &self.ngs
    }

    pub fn ngs_mut(&mut self) -> &mut Ngs {
        &mut self.ngs
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether a relative system may still supply generators.
    pub fn rgs_unfinished(&self) -> bool {
        self.rgs_unfinished
    }

    pub fn set_rgs_unfinished(&mut self, value: bool) {
        self.rgs_unfinished = value;
    }

    /// The number of times [`run`](Self::run) did any work.
    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn insert(&mut self, pool: &mut VectorPool, row: &FpVector) -> Result<()> {
        if self.finished {
            return Err(Error::invalid_state(
                "cannot insert into a finished foundation system",
            ));
        }
        self.ngs.insert(pool, row)
    }

    /// Whether the span is known to be the whole submodule.
    pub fn hard_correct_rank(&self) -> Result<bool> {
        Ok(self.ngs.easy_correct_rank()
            || (!self.rgs_unfinished
                && self.ngs.pending() == 0
                && self.ngs.all_expansions_done()?))
    }

    /// Runs the foundation algorithm until the system finishes or decides to wait for more
    /// generators. Calling this on a finished system does nothing.
    #[tracing::instrument(skip_all, fields(rank = self.ngs.rank(), runs = self.runs))]
    pub fn run(&mut self, pool: &mut VectorPool) -> Result<FgsState> {
        if self.finished {
            return Ok(FgsState::Finished);
        }
        self.runs += 1;
        self.ngs.absorb(pool)?;
        let exp_dim = self.ngs.start_expansion(self.rgs_unfinished);
        if self.hard_correct_rank()? && !self.ngs.has_heady() {
            self.finish(pool)?;
            return Ok(FgsState::Finished);
        }
        if exp_dim == ExpDim::NothingToExpand {
            return Ok(FgsState::Paused);
        }

        while !self.ngs.all_expansions_done()? || self.ngs.has_heady() {
            self.ngs.expand(pool)?;
            self.ngs.absorb(pool)?;
            self.ngs.update_counters();

            if self.hard_correct_rank()? && !self.ngs.has_heady() {
                self.finish(pool)?;
                return Ok(FgsState::Finished);
            }
            if self.rgs_unfinished
                && self.ngs.unfruitful() >= self.max_unfruitful
                && !self.ngs.easy_correct_rank()
                && !self.ngs.has_heady()
            {
                tracing::debug!(unfruitful = self.ngs.unfruitful(), "pausing");
                return Ok(FgsState::Paused);
            }
        }

        if self.hard_correct_rank()? {
            self.finish(pool)?;
            Ok(FgsState::Finished)
        } else {
            Ok(FgsState::Paused)
        }
    }

    fn finish(&mut self, pool: &mut VectorPool) -> Result<()> {
        // Anything still queued lies in the span already.
        while self.ngs.pending() > 0 {
            self.ngs.absorb(pool)?;
        }
        self.minimal_generators = self.compute_minimal_generators()?;
        self.finished = true;
        tracing::info!(
            spanned = self.ngs.spanned(),
            generators = self.minimal_generators.len(),
            "foundation system finished"
        );
        Ok(())
    }

    fn compute_minimal_generators(&mut self) -> Result<Vec<FpVector>> {
        let rank = self.ngs.rank();
        let algebra = Arc::clone(self.ngs.algebra());
        let p = algebra.prime();
        let len = rank * algebra.dimension();
        let basis = self.ngs.materialize_all()?;

        let mut quotient = Subspace::new(p, len);
        let mut product = FpVector::new(p, len);
        for v in basis {
            let row = v.row().ok_or_else(|| Error::invalid_state("basis row missing"))?;
            for arrow in 0..algebra.arrows() {
                product.set_to_zero();
                algebra.multiply(row, rank, arrow, &mut product)?;
                quotient.add_vector(&product)?;
            }
        }

        let mut generators = Vec::new();
        for v in basis.iter().filter(|v| v.origin() == Origin::Generator) {
            let row = v.row().ok_or_else(|| Error::invalid_state("basis row missing"))?;
            if quotient.add_vector(row)? {
                generators.push(row.clone());
            }
        }
        Ok(generators)
    }

    /// A minimal generating set of the span. Empty until the system is finished.
    pub fn minimal_generators(&self) -> &[FpVector] {
        &self.minimal_generators
    }
}
