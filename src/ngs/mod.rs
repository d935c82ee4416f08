//! The normed generating system, the expansion engine shared by foundation and relative systems.
//!
//! An [`Ngs`] lives in a free module $A^{r + s}$, stored as vectors of length $(r + s)N$. Only
//! the first $r$ blocks take part in leading term computations; the remaining $s$ blocks are
//! carried along and record how a vector was produced (for a relative system, the preimage).
//!
//! The basis consists of vectors whose leading monomials are pairwise distinct, normalised to
//! have leading coefficient one. Because the algebra acts by strictly degree raising maps, the
//! product of a basis vector of degree $d$ with a generator has all its terms in degree greater
//! than $d$, and so does everything it reduces to. The expansion therefore proceeds one degree at
//! a time: at frontier $d$, every basis vector of degree $d$ is multiplied by every generator, and
//! the products are reduced and inserted. When the frontier passes the maximal length, the
//! $\mathbb{F}_p$-span of the basis is closed under the action and hence equals the submodule.
//!
//! A vector inserted from outside (a kernel element found by a relative system, say) may have a
//! degree below the frontier. Such a vector is called heady. At the start of the next step the
//! heady vectors are expanded in degree order before the frontier moves on.

pub mod divisor_table;
pub mod pool;
pub mod slice;

use std::collections::VecDeque;
use std::sync::Arc;

use fp::vector::FpVector;

use crate::algebra::AlgebraContext;
use crate::error::{Error, Result};
use crate::utils::Interrupt;

use divisor_table::{ChildSlot, DivisorTable};
use pool::{Candidate, Tip, VectorPool};
use slice::SliceCache;

/// An index into the basis arena. Handles are handed out in discovery order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasisHandle(pub(crate) usize);

impl BasisHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The expansion frontier of a generating system.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpDim {
    /// No frontier has been chosen yet.
    NothingToExpand,
    /// The system has no vectors and never will.
    NoExpansionRequired,
    /// Every degree below this one has been swept.
    Degree(usize),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Inserted from outside.
    Generator,
    /// The reduction of `parent * arrow`.
    Product { parent: BasisHandle, arrow: usize },
}

#[derive(Debug, Clone)]
pub struct BasisVector {
    block: usize,
    monomial: usize,
    degree: usize,
    /// `None` while the slice of this degree is held by the slice cache.
    row: Option<FpVector>,
    exp_dim: usize,
    origin: Origin,
}

impl BasisVector {
    pub fn block(&self) -> usize {
        self.block
    }

    pub fn monomial(&self) -> usize {
        self.monomial
    }

    /// The degree of the leading monomial.
    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn row(&self) -> Option<&FpVector> {
        self.row.as_ref()
    }

    /// The degree this vector is expanded at next. Once expanded, it follows the frontier.
    pub fn exp_dim(&self) -> usize {
        self.exp_dim
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

/// The leading term of `v` among its first `r` blocks of size `n`.
pub fn leading_term(v: &FpVector, r: usize, n: usize) -> Option<Tip> {
    let end = r * n;
    v.iter_nonzero()
        .take_while(|&(i, _)| i < end)
        .min_by_key(|&(i, _)| (i % n, i / n))
        .map(|(i, coeff)| Tip {
            block: i / n,
            monomial: i % n,
            coeff,
        })
}

#[derive(Debug)]
pub struct Ngs {
    algebra: Arc<AlgebraContext>,
    r: usize,
    s: usize,
    /// $rN$ minus the dimension of the span of the basis.
    pnontips: usize,
    step_start_pnontips: usize,
    exp_dim: ExpDim,
    unfruitful: usize,
    target_rank: Option<usize>,
    pending: VecDeque<(Candidate, Origin)>,
    basis: Vec<BasisVector>,
    by_degree: Vec<Vec<BasisHandle>>,
    tables: Vec<DivisorTable>,
    relations: Vec<FpVector>,
    cache: Option<Box<dyn SliceCache>>,
    /// Rows of degrees below this are held by the cache.
    resident_from: usize,
    interrupt: Interrupt,
    steps: usize,
}

impl Ngs {
    /// A generating system in $A^{r + s}$ with leading blocks `r` and tracking blocks `s`.
    /// `target_rank` is the expected dimension of the span, if known.
    pub fn new(
        algebra: Arc<AlgebraContext>,
        r: usize,
        s: usize,
        target_rank: Option<usize>,
        interrupt: Interrupt,
    ) -> Self {
        let n = algebra.dimension();
        let tables = (0..r)
            .map(|_| DivisorTable::new(n, algebra.arrows()))
            .collect();
        let by_degree = vec![Vec::new(); algebra.max_length() + 1];
        Self {
            r,
            s,
            pnontips: r * n,
            step_start_pnontips: r * n,
            exp_dim: ExpDim::NothingToExpand,
            unfruitful: 0,
            target_rank,
            pending: VecDeque::new(),
            basis: Vec::new(),
            by_degree,
            tables,
            relations: Vec::new(),
            cache: None,
            resident_from: 0,
            interrupt,
            steps: 0,
            algebra,
        }
    }

    /// Lets the system move rows of swept degrees into `cache`.
    pub fn set_slice_cache(&mut self, cache: Box<dyn SliceCache>) {
        self.cache = Some(cache);
    }

    pub fn algebra(&self) -> &Arc<AlgebraContext> {
        &self.algebra
    }

    /// The number of leading blocks.
    pub fn rank(&self) -> usize {
        self.r
    }

    /// The number of tracking blocks.
    pub fn aux_rank(&self) -> usize {
        self.s
    }

    pub fn row_len(&self) -> usize {
        (self.r + self.s) * self.algebra.dimension()
    }

    pub fn pnontips(&self) -> usize {
        self.pnontips
    }

    /// The dimension of the span of the basis.
    pub fn spanned(&self) -> usize {
        self.r * self.algebra.dimension() - self.pnontips
    }

    pub fn exp_dim(&self) -> ExpDim {
        self.exp_dim
    }

    pub fn unfruitful(&self) -> usize {
        self.unfruitful
    }

    pub fn target_rank(&self) -> Option<usize> {
        self.target_rank
    }

    pub fn basis(&self) -> &[BasisVector] {
        &self.basis
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The number of degree steps performed.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// The leading term of `v`: its first nonzero entry among the leading blocks, scanning
    /// monomials in order and blocks within a monomial. This is a term of least degree.
    pub fn leading_term(&self, v: &FpVector) -> Option<Tip> {
        leading_term(v, self.r, self.algebra.dimension())
    }

    /// Queues a vector from outside for insertion. It is reduced on the next
    /// [`absorb`](Self::absorb).
    pub fn insert(&mut self, pool: &mut VectorPool, row: &FpVector) -> Result<()> {
        if row.len() != self.row_len() {
            return Err(fp::FpError::DimensionMismatch {
                expected: self.row_len(),
                found: row.len(),
            }
            .into());
        }
        if self.exp_dim == ExpDim::NoExpansionRequired {
            return Err(Error::invalid_state(
                "cannot insert into a system that requires no expansion",
            ));
        }
        let mut candidate = pool.acquire(row.len());
        candidate.row.assign(row);
        self.pending.push_back((candidate, Origin::Generator));
        Ok(())
    }

    /// Reduces every pending vector against the basis. Those with a surviving leading term join
    /// the basis; the others are discarded, except that a nonzero tracking part is kept as a
    /// relation.
    pub fn absorb(&mut self, pool: &mut VectorPool) -> Result<()> {
        let degree = self.frontier_degree();
        loop {
            self.interrupt.check(degree)?;
            let Some((mut candidate, origin)) = self.pending.pop_front() else {
                break;
            };
            if let Some(tip) = self.leading_term(&candidate.row) {
                let start = self.algebra.degree(tip.monomial);
                if let Err(e) = self.materialize_from(start) {
                    self.pending.push_front((candidate, origin));
                    return Err(e);
                }
            }
            candidate.tip = self.reduce(&mut candidate.row)?;
            match candidate.tip {
                Some(tip) => self.insert_basis(candidate.row, tip, origin)?,
                None => {
                    self.record_relation(&candidate.row);
                    pool.release(candidate);
                }
            }
        }
        Ok(())
    }

    /// Head reduces `row` against the basis and returns the leading term of the result. All rows
    /// of degree at least the initial leading degree have to be resident.
    fn reduce(&self, row: &mut FpVector) -> Result<Option<Tip>> {
        let p = self.algebra.prime();
        while let Some(tip) = self.leading_term(row) {
            let Some(h) = self.tables[tip.block].divisor(tip.monomial) else {
                return Ok(Some(tip));
            };
            row.try_add(self.resident_row(h)?, p.negate(tip.coeff))?;
        }
        Ok(None)
    }

    fn resident_row(&self, h: BasisHandle) -> Result<&FpVector> {
        self.basis[h.0].row.as_ref().ok_or_else(|| {
            Error::invalid_state(format!("basis vector {} is not resident", h.0))
        })
    }

    fn record_relation(&mut self, row: &FpVector) {
        if self.s == 0 {
            return;
        }
        let n = self.algebra.dimension();
        if !row.is_zero_in(self.r * n, row.len()) {
            self.relations.push(row.slice_to_owned(self.r * n, row.len()));
        }
    }

    fn insert_basis(&mut self, mut row: FpVector, tip: Tip, origin: Origin) -> Result<()> {
        if self.exp_dim == ExpDim::NoExpansionRequired {
            return Err(Error::invalid_state(
                "cannot insert into a system that requires no expansion",
            ));
        }
        row.scale(self.algebra.prime().inverse(tip.coeff)?);
        let handle = BasisHandle(self.basis.len());
        self.tables[tip.block].set_divisor(tip.monomial, handle)?;
        let degree = self.algebra.degree(tip.monomial);
        let exp_dim = match self.exp_dim {
            ExpDim::Degree(d) => std::cmp::min(d, degree),
            _ => degree,
        };
        self.basis.push(BasisVector {
            block: tip.block,
            monomial: tip.monomial,
            degree,
            row: Some(row),
            exp_dim,
            origin,
        });
        self.by_degree[degree].push(handle);
        self.pnontips -= 1;
        Ok(())
    }

    /// Chooses the first frontier. With vectors present, this is the least degree of a basis
    /// vector. Without vectors, the system requires no expansion unless a dependent computation
    /// may still supply some, in which case nothing changes.
    pub fn start_expansion(&mut self, has_dependent: bool) -> ExpDim {
        if self.exp_dim != ExpDim::NothingToExpand {
            return self.exp_dim;
        }
        if let Some(d) = self.basis.iter().map(|v| v.degree).min() {
            self.exp_dim = ExpDim::Degree(d);
            for v in &mut self.basis {
                v.exp_dim = d;
            }
        } else if !has_dependent {
            self.exp_dim = ExpDim::NoExpansionRequired;
        }
        self.exp_dim
    }

    pub fn all_expansions_done(&self) -> Result<bool> {
        match self.exp_dim {
            ExpDim::NothingToExpand => Err(Error::invalid_state(
                "completeness queried before expansion started",
            )),
            ExpDim::NoExpansionRequired => Ok(true),
            ExpDim::Degree(d) => Ok(d > self.algebra.max_length()),
        }
    }

    /// Whether the span has the expected dimension.
    pub fn easy_correct_rank(&self) -> bool {
        self.target_rank
            .is_some_and(|t| t + self.pnontips == self.r * self.algebra.dimension())
    }

    pub fn has_heady(&self) -> bool {
        self.lowest_heady().is_some()
    }

    fn lowest_heady(&self) -> Option<BasisHandle> {
        let ExpDim::Degree(d) = self.exp_dim else {
            return None;
        };
        self.by_degree
            .iter()
            .take(d)
            .flatten()
            .copied()
            .find(|&h| self.basis[h.0].exp_dim < d)
    }

    fn frontier_degree(&self) -> usize {
        match self.exp_dim {
            ExpDim::Degree(d) => d,
            _ => 0,
        }
    }

    /// Performs one degree step: expands the heady vectors, then every vector of the frontier
    /// degree, and moves the frontier up by one. New vectors are queued and need to be
    /// [absorbed](Self::absorb) afterwards.
    #[tracing::instrument(skip_all, fields(exp_dim = ?self.exp_dim, basis = self.basis.len()))]
    pub fn expand(&mut self, pool: &mut VectorPool) -> Result<()> {
        let ExpDim::Degree(d) = self.exp_dim else {
            return Err(Error::invalid_state(format!(
                "cannot expand with frontier {:?}",
                self.exp_dim
            )));
        };
        self.interrupt.check(d)?;
        self.step_start_pnontips = self.pnontips;

        while let Some(h) = self.lowest_heady() {
            tracing::debug!(degree = self.basis[h.0].degree, "expanding heady vector");
            self.expand_vector(h, d, pool)?;
            self.basis[h.0].exp_dim = d;
            self.absorb(pool)?;
        }

        if d <= self.algebra.max_length() {
            self.release_below(d)?;
            let handles: Vec<BasisHandle> = self.by_degree[d]
                .iter()
                .copied()
                .filter(|h| self.basis[h.0].exp_dim <= d)
                .collect();
            for h in handles {
                self.expand_vector(h, d, pool)?;
            }
            for v in &mut self.basis {
                if v.exp_dim == d {
                    v.exp_dim = d + 1;
                }
            }
            self.exp_dim = ExpDim::Degree(d + 1);
        }
        self.steps += 1;
        Ok(())
    }

    /// Multiplies a basis vector by every generator whose child slot is still empty.
    fn expand_vector(&mut self, h: BasisHandle, frontier: usize, pool: &mut VectorPool) -> Result<()> {
        let (block, monomial, degree) = {
            let v = &self.basis[h.0];
            (v.block, v.monomial, v.degree)
        };
        self.materialize_from(degree)?;
        let arrows: Vec<usize> = self.tables[block].empty_children(monomial).collect();
        let p = self.algebra.prime();
        for arrow in arrows {
            self.interrupt.check(frontier)?;
            let mut candidate = pool.acquire(self.row_len());
            self.algebra.multiply(
                self.resident_row(h)?,
                self.r + self.s,
                arrow,
                &mut candidate.row,
            )?;
            candidate.tip = self.leading_term(&candidate.row);
            let origin = Origin::Product { parent: h, arrow };
            match candidate.tip {
                Some(tip) => {
                    candidate.row.scale(p.inverse(tip.coeff)?);
                    candidate.tip = Some(Tip { coeff: 1, ..tip });
                    self.tables[block].set_child(monomial, arrow, ChildSlot::Spanning)?;
                    self.pending.push_back((candidate, origin));
                }
                None => {
                    self.tables[block].set_child(monomial, arrow, ChildSlot::Relation)?;
                    self.record_relation(&candidate.row);
                    pool.release(candidate);
                }
            }
        }
        Ok(())
    }

    /// Resets `unfruitful` if the last step made progress and increments it otherwise.
    pub fn update_counters(&mut self) {
        if self.pnontips < self.step_start_pnontips {
            self.unfruitful = 0;
        } else {
            self.unfruitful += 1;
        }
        self.step_start_pnontips = self.pnontips;
    }

    /// The tracking parts of the vectors whose leading part vanished since the last call.
    pub fn take_relations(&mut self) -> Vec<FpVector> {
        std::mem::take(&mut self.relations)
    }

    /// Hands the rows of all degrees below `degree` to the cache.
    fn release_below(&mut self, degree: usize) -> Result<()> {
        let Some(cache) = self.cache.as_mut() else {
            return Ok(());
        };
        for d in self.resident_from..degree {
            let rows = self.by_degree[d]
                .iter()
                .map(|h| {
                    self.basis[h.0].row.clone().ok_or_else(|| {
                        Error::invalid_state(format!("slice {d} released twice"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            cache.store(d, &rows)?;
            for h in &self.by_degree[d] {
                self.basis[h.0].row = None;
            }
            tracing::debug!(degree = d, rows = rows.len(), "released slice");
        }
        self.resident_from = std::cmp::max(self.resident_from, degree);
        Ok(())
    }

    /// Brings the rows of all degrees at least `degree` back into memory.
    fn materialize_from(&mut self, degree: usize) -> Result<()> {
        if degree >= self.resident_from {
            return Ok(());
        }
        let Some(cache) = self.cache.as_mut() else {
            return Ok(());
        };
        for d in degree..self.resident_from {
            let rows = cache.load(d)?;
            if rows.len() != self.by_degree[d].len() {
                return Err(Error::Corrupt(format!(
                    "slice {d} holds {} rows, expected {}",
                    rows.len(),
                    self.by_degree[d].len()
                )));
            }
            cache.destroy(d)?;
            for (h, row) in self.by_degree[d].iter().zip(rows) {
                self.basis[h.0].row = Some(row);
            }
        }
        self.resident_from = degree;
        Ok(())
    }

    /// Brings every row back into memory and returns the basis.
    pub fn materialize_all(&mut self) -> Result<&[BasisVector]> {
        self.materialize_from(0)?;
        Ok(&self.basis)
    }
}
