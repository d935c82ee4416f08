//! Minimal free resolutions.
//!
//! A [`Resolution`] of a module $M = A^{r_0} / R$ is built one homological degree at a time.
//! The first differential $d_1$ sends the generators of $P_1$ to a minimal generating set of
//! $R$, found by a [`FoundationSystem`]. Each later differential $d_{k + 1}$ is obtained from
//! $d_k$ by a [`RelativeSystem`], which computes the image of $d_k$ and a minimal generating set
//! of its kernel at the same time. The image dimension of $d_{k - 1}$ gives, by rank-nullity,
//! the dimension of the kernel of $d_{k - 1}$ and hence the expected image dimension of $d_k$.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fp::vector::FpVector;
use itertools::Itertools;

use crate::algebra::AlgebraContext;
use crate::error::{Error, Result};
use crate::fgs::{FgsState, FoundationSystem};
use crate::homomorphism::FreeModuleHomomorphism;
use crate::ngs::pool::VectorPool;
use crate::ngs::slice::{FileSlices, MemorySlices, SliceCache};
use crate::ngs::Ngs;
use crate::rgs::RelativeSystem;
use crate::save::{SaveDirectory, SaveFile, SaveKind};
use crate::scheduler::Scheduler;
use crate::urbild::UrbildBasis;
use crate::utils::{Heuristics, Interrupt};

/// A computation that was interrupted, kept so that it can be resumed.
#[derive(Debug)]
enum Step {
    Presentation(FoundationSystem),
    Relative(RelativeSystem),
}

#[derive(Debug)]
pub struct Resolution {
    name: String,
    algebra: Arc<AlgebraContext>,
    heuristics: Heuristics,
    interrupt: Interrupt,
    pool: VectorPool,
    save_dir: SaveDirectory,

    /// Whether we should save newly computed data to the disk. This has no effect if there is no
    /// save directory. Defaults to `save_dir.is_some()`.
    pub should_save: bool,

    /// Whether the generating systems move the rows of swept degrees out of memory. They go to
    /// the write directory if there is one, and are kept in memory otherwise.
    pub spill: bool,

    relations: Vec<FpVector>,
    /// The dimension of the span of `relations`, if known in advance.
    relations_dimension: Option<usize>,

    /// `ranks[n]` is the rank of $P_n$.
    ranks: Vec<usize>,
    /// `differentials[n - 1]` is $d_n \colon P_n \to P_{n - 1}$.
    differentials: Vec<FreeModuleHomomorphism>,
    /// `image_dimensions[0]` is $\dim M$, and `image_dimensions[n]` is $\dim \operatorname{im} d_n$.
    image_dimensions: Vec<usize>,
    /// `urbild_bases[n - 1]` lifts along $d_n$.
    urbild_bases: Vec<UrbildBasis>,

    in_progress: Option<Step>,
}

impl Resolution {
    /// Resolves the trivial module $\mathbb{F}_p = A / J$, where $J$ is generated by the arrows.
    pub fn trivial_module(algebra: Arc<AlgebraContext>, heuristics: Heuristics) -> Self {
        let n = algebra.dimension();
        let relations = (0..algebra.arrows())
            .map(|i| algebra.action(i).row(0).clone())
            .collect();
        let mut result = Self::new(algebra, heuristics, 1, relations);
        result.relations_dimension = Some(n - 1);
        result
    }

    /// Resolves $A^{r_0} / R$, where $R$ is the submodule generated by `relations`.
    pub fn from_presentation(
        algebra: Arc<AlgebraContext>,
        heuristics: Heuristics,
        rank0: usize,
        relations: Vec<FpVector>,
    ) -> Result<Self> {
        let len = rank0 * algebra.dimension();
        if let Some(bad) = relations.iter().find(|r| r.len() != len) {
            return Err(fp::FpError::DimensionMismatch {
                expected: len,
                found: bad.len(),
            }
            .into());
        }
        Ok(Self::new(algebra, heuristics, rank0, relations))
    }

    fn new(
        algebra: Arc<AlgebraContext>,
        heuristics: Heuristics,
        rank0: usize,
        relations: Vec<FpVector>,
    ) -> Self {
        Self {
            name: algebra.name().to_owned(),
            pool: VectorPool::new(algebra.prime()),
            algebra,
            heuristics,
            interrupt: Interrupt::new(),
            save_dir: SaveDirectory::None,
            should_save: false,
            spill: false,
            relations,
            relations_dimension: None,
            ranks: vec![rank0],
            differentials: Vec::new(),
            image_dimensions: Vec::new(),
            urbild_bases: Vec::new(),
            in_progress: None,
        }
    }

    /// Reads previously computed degrees from `save_dir` and writes new ones to it.
    pub fn set_save_dir(&mut self, save_dir: SaveDirectory) -> Result<()> {
        if let Some(p) = save_dir.write() {
            for subdir in SaveKind::resolution_data() {
                subdir.create_dir(p)?;
            }
        }
        self.should_save = save_dir.is_some();
        self.save_dir = save_dir;
        Ok(())
    }

    /// Replaces the interrupt flag. Setting the flag makes [`compute_through`](Self::compute_through)
    /// return [`Error::Interrupted`]; calling it again resumes the computation.
    pub fn set_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupt = interrupt;
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algebra(&self) -> &Arc<AlgebraContext> {
        &self.algebra
    }

    /// The degree through which ranks are known.
    pub fn max_degree(&self) -> usize {
        self.ranks.len() - 1
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    pub fn rank(&self, n: usize) -> Option<usize> {
        self.ranks.get(n).copied()
    }

    /// The dimension of the image of $d_n$. For $n = 0$, this is the dimension of the module.
    pub fn image_dimension(&self, n: usize) -> Option<usize> {
        self.image_dimensions.get(n).copied()
    }

    /// The differential $d_n \colon P_n \to P_{n - 1}$, for $n \geq 1$.
    pub fn differential(&self, n: usize) -> Option<&FreeModuleHomomorphism> {
        self.differentials.get(n.checked_sub(1)?)
    }

    /// The preimage basis of $d_n$. Available once the kernel of $d_n$ is known.
    pub fn urbild_basis(&self, n: usize) -> Option<&UrbildBasis> {
        self.urbild_bases.get(n.checked_sub(1)?)
    }

    /// The ranks as a space separated string.
    pub fn rank_string(&self) -> String {
        self.ranks.iter().join(" ")
    }

    fn save_file(&self, kind: SaveKind, degree: usize) -> SaveFile {
        SaveFile {
            kind,
            algebra_magic: self.algebra.magic(),
            degree,
        }
    }

    /// Computes $P_n$ for every `n <= max`.
    #[tracing::instrument(skip(self), fields(algebra = %self.name))]
    pub fn compute_through(&mut self, max: usize) -> Result<()> {
        while self.ranks.len() <= max {
            let degree = self.ranks.len();
            let start = Instant::now();
            if !self.load_step(degree)? {
                self.step(degree)?;
            }
            tracing::info!(
                degree,
                rank = self.ranks[degree],
                elapsed = ?start.elapsed(),
                "computed free module"
            );
        }
        Ok(())
    }

    /// Computes $d_n$, and with it the rank of $P_n$, the image dimension of $d_{n - 1}$ and the
    /// preimage basis of $d_{n - 1}$.
    fn step(&mut self, n: usize) -> Result<()> {
        if self.ranks[n - 1] == 0 {
            return self.push_zero_step(n);
        }
        let step = match self.in_progress.take() {
            Some(step) => step,
            None => self.start_step(n)?,
        };
        match step {
            Step::Presentation(mut fgs) => {
                let state = match Scheduler::new(&mut self.pool).run_foundation(&mut fgs) {
                    Ok(state) => state,
                    Err(e) => {
                        self.in_progress = Some(Step::Presentation(fgs));
                        return Err(e);
                    }
                };
                if state != FgsState::Finished {
                    return Err(Error::invalid_state("presentation did not finish"));
                }
                let m = self.ranks[0] * self.algebra.dimension() - fgs.ngs().spanned();
                let d = FreeModuleHomomorphism::from_outputs(
                    Arc::clone(&self.algebra),
                    self.ranks[0],
                    fgs.minimal_generators().to_vec(),
                )?;
                self.push_step(n, d, m, None)?;
            }
            Step::Relative(mut rgs) => {
                if let Err(e) = Scheduler::new(&mut self.pool).run_relative(&mut rgs) {
                    self.in_progress = Some(Step::Relative(rgs));
                    return Err(e);
                }
                let image_dimension = rgs.image().spanned();
                let urbild = UrbildBasis::from_image(rgs.image_mut())?;
                let d = FreeModuleHomomorphism::from_outputs(
                    Arc::clone(&self.algebra),
                    self.ranks[n - 1],
                    rgs.kernel().minimal_generators().to_vec(),
                )?;
                self.push_step(n, d, image_dimension, Some(urbild))?;
            }
        }
        self.remove_scratch(n)
    }

    fn start_step(&mut self, n: usize) -> Result<Step> {
        let dim = self.algebra.dimension();
        if n == 1 {
            let mut fgs = FoundationSystem::new(
                Arc::clone(&self.algebra),
                self.ranks[0],
                self.relations_dimension,
                self.heuristics.max_unfruitful,
                self.interrupt.clone(),
            );
            self.attach_cache(fgs.ngs_mut(), n, "presentation")?;
            for relation in &self.relations {
                fgs.insert(&mut self.pool, relation)?;
            }
            return Ok(Step::Presentation(fgs));
        }

        // d_{n - 1}: P_{n - 1} -> P_{n - 2}
        let (r, s) = (self.ranks[n - 2], self.ranks[n - 1]);
        let target = r * dim - self.image_dimensions[n - 2];
        let mut rgs = RelativeSystem::new(
            Arc::clone(&self.algebra),
            r,
            s,
            Some(target),
            self.heuristics,
            self.interrupt.clone(),
        );
        self.attach_cache(rgs.image_mut(), n, "image")?;
        self.attach_cache(rgs.kernel_mut().ngs_mut(), n, "kernel")?;
        let d = &self.differentials[n - 2];
        for (j, output) in d.outputs().iter().enumerate() {
            rgs.add_generator(&mut self.pool, j, output)?;
        }
        Ok(Step::Relative(rgs))
    }

    fn scratch_dir(&self, n: usize) -> Option<PathBuf> {
        let mut dir = self.save_dir.write()?.clone();
        dir.push(format!("scratch/{n}"));
        Some(dir)
    }

    fn attach_cache(&self, ngs: &mut Ngs, n: usize, name: &str) -> Result<()> {
        if !self.spill {
            return Ok(());
        }
        let cache: Box<dyn SliceCache> = match self.scratch_dir(n) {
            Some(mut dir) => {
                dir.push(name);
                Box::new(FileSlices::new(
                    dir,
                    self.algebra.prime(),
                    ngs.row_len(),
                    self.algebra.magic(),
                )?)
            }
            None => Box::new(MemorySlices::new()),
        };
        ngs.set_slice_cache(cache);
        Ok(())
    }

    fn remove_scratch(&self, n: usize) -> Result<()> {
        if !self.spill {
            return Ok(());
        }
        let Some(dir) = self.scratch_dir(n) else {
            return Ok(());
        };
        match std::fs::remove_dir_all(&dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Past a zero module, every module is zero.
    fn push_zero_step(&mut self, n: usize) -> Result<()> {
        let urbild = if n >= 2 {
            Some(UrbildBasis::from_rows(
                Arc::clone(&self.algebra),
                self.ranks[n - 2],
                0,
                Vec::new(),
            )?)
        } else {
            None
        };
        let d = FreeModuleHomomorphism::new(Arc::clone(&self.algebra), 0);
        self.push_step(n, d, 0, urbild)
    }

    /// Records $d_n$, the image dimension of $d_{n - 1}$ and the preimage basis of $d_{n - 1}$.
    fn push_step(
        &mut self,
        n: usize,
        d: FreeModuleHomomorphism,
        previous_image_dimension: usize,
        urbild: Option<UrbildBasis>,
    ) -> Result<()> {
        if self.should_save {
            if let Some(dir) = self.save_dir.write() {
                // The preimage basis goes first, so that a saved differential implies one.
                if let Some(urbild) = &urbild {
                    let mut f = self
                        .save_file(SaveKind::UrbildBasis, n - 1)
                        .create_file(dir.clone(), true)?;
                    urbild.to_bytes(&mut f)?;
                    f.finish()?;
                }
                let mut f = self
                    .save_file(SaveKind::Differential, n)
                    .create_file(dir.clone(), true)?;
                f.write_u64::<LittleEndian>(previous_image_dimension as u64)?;
                d.to_bytes(&mut f)?;
                f.finish()?;
            }
        }

        self.ranks.push(d.source_rank());
        self.differentials.push(d);
        self.image_dimensions.push(previous_image_dimension);
        if let Some(urbild) = urbild {
            self.urbild_bases.push(urbild);
        }
        Ok(())
    }

    /// Loads $d_n$ and the preimage basis of $d_{n - 1}$ from the save directory. Returns whether
    /// both were there.
    fn load_step(&mut self, n: usize) -> Result<bool> {
        let Some(dir) = self.save_dir.read().cloned() else {
            return Ok(false);
        };
        let urbild = if n >= 2 {
            let Some(mut f) = self
                .save_file(SaveKind::UrbildBasis, n - 1)
                .open_file(dir.clone())?
            else {
                return Ok(false);
            };
            let urbild = UrbildBasis::from_bytes(Arc::clone(&self.algebra), &mut f)?;
            f.finish()?;
            Some(urbild)
        } else {
            None
        };
        let Some(mut f) = self
            .save_file(SaveKind::Differential, n)
            .open_file(dir.clone())?
        else {
            return Ok(false);
        };
        let previous_image_dimension = f.read_u64::<LittleEndian>()? as usize;
        let d = FreeModuleHomomorphism::from_bytes(Arc::clone(&self.algebra), &mut f)?;
        f.finish()?;

        if d.target_rank() != self.ranks[n - 1] {
            return Err(Error::Corrupt(format!(
                "saved d_{n} has target rank {}, expected {}",
                d.target_rank(),
                self.ranks[n - 1]
            )));
        }
        if let Some(urbild) = &urbild {
            if urbild.dimension() != previous_image_dimension {
                return Err(Error::Corrupt(format!(
                    "saved preimage basis of d_{} has dimension {}, expected {previous_image_dimension}",
                    n - 1,
                    urbild.dimension()
                )));
            }
        }
        tracing::info!(degree = n, "loaded differential");
        self.in_progress = None;

        self.ranks.push(d.source_rank());
        self.differentials.push(d);
        self.image_dimensions.push(previous_image_dimension);
        if let Some(urbild) = urbild {
            self.urbild_bases.push(urbild);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algebra::MonomialOrdering;
    use expect_test::expect;
    use fp::prime::{ValidPrime, TWO};

    fn heuristics() -> Heuristics {
        Heuristics {
            max_unfruitful: 2,
            overshoot: 3,
        }
    }

    #[test]
    fn cyclic_of_order_four() {
        let algebra = Arc::new(AlgebraContext::truncated_polynomial(TWO, 4).unwrap());
        let mut res = Resolution::trivial_module(algebra, heuristics());
        res.compute_through(4).unwrap();
        expect![[r#"1 1 1 1 1"#]].assert_eq(&res.rank_string());
        assert_eq!(res.image_dimension(0), Some(1));
        assert_eq!(res.image_dimension(1), Some(3));
        assert_eq!(res.image_dimension(2), Some(1));
        assert_eq!(res.image_dimension(3), Some(3));
        // d_1 = x, d_2 = x^3
        assert_eq!(
            res.differential(1).unwrap().output(0),
            &FpVector::from_slice(TWO, &[0, 1, 0, 0])
        );
        assert_eq!(
            res.differential(2).unwrap().output(0),
            &FpVector::from_slice(TWO, &[0, 0, 0, 1])
        );
        assert!(res.differential(0).is_none());
        assert!(res.urbild_basis(3).is_some());
        assert!(res.urbild_basis(4).is_none());
    }

    #[test]
    fn klein_four_group() {
        let algebra = Arc::new(
            AlgebraContext::truncated_commutative(TWO, &[2, 2], MonomialOrdering::ReverseLengthLex)
                .unwrap(),
        );
        let mut res = Resolution::trivial_module(algebra, heuristics());
        res.compute_through(3).unwrap();
        expect![[r#"1 2 3 4"#]].assert_eq(&res.rank_string());
        assert_eq!(res.max_degree(), 3);
    }

    #[test]
    fn cyclic_at_odd_prime() {
        let p = ValidPrime::new(3);
        let algebra = Arc::new(AlgebraContext::truncated_polynomial(p, 3).unwrap());
        let mut res = Resolution::trivial_module(algebra, heuristics());
        res.compute_through(3).unwrap();
        assert_eq!(res.ranks(), &[1, 1, 1, 1]);
        assert_eq!(res.image_dimension(1), Some(2));
        assert_eq!(res.image_dimension(2), Some(1));
    }

    #[test]
    fn free_module_has_short_resolution() {
        let algebra = Arc::new(AlgebraContext::truncated_polynomial(TWO, 4).unwrap());
        let mut res = Resolution::from_presentation(algebra, heuristics(), 2, Vec::new()).unwrap();
        res.compute_through(3).unwrap();
        assert_eq!(res.ranks(), &[2, 0, 0, 0]);
        assert_eq!(res.image_dimension(0), Some(8));
    }

    #[test]
    fn presentation_is_minimised() {
        // F_2[x]/x^4 modulo x^2, given by the redundant relations x^2, x^3 and x^2 + x^3.
        let algebra = Arc::new(AlgebraContext::truncated_polynomial(TWO, 4).unwrap());
        let relations = vec![
            FpVector::from_slice(TWO, &[0, 0, 1, 0]),
            FpVector::from_slice(TWO, &[0, 0, 0, 1]),
            FpVector::from_slice(TWO, &[0, 0, 1, 1]),
        ];
        let mut res = Resolution::from_presentation(algebra, heuristics(), 1, relations).unwrap();
        res.compute_through(3).unwrap();
        assert_eq!(res.ranks(), &[1, 1, 1, 1]);
        assert_eq!(res.image_dimension(0), Some(2));
        assert!(Resolution::from_presentation(
            Arc::clone(res.algebra()),
            heuristics(),
            1,
            vec![FpVector::new(TWO, 3)]
        )
        .is_err());
    }
}
