//! Preimages under a differential.
//!
//! When the relative system for $d \colon A^s \to A^r$ finishes, its basis consists of rows
//! $[d(x) \mid x]$ whose image parts have pairwise distinct leading terms and span the image of
//! $d$. Head reducing an element $y$ of the image against these rows accumulates a preimage of
//! $y$ in the tracking part.

use std::io;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fp::vector::FpVector;
use fp::FpError;
use rustc_hash::FxHashMap;

use crate::algebra::AlgebraContext;
use crate::error::{Error, Result};
use crate::ngs::{leading_term, Ngs};

#[derive(Debug, Clone)]
pub struct UrbildBasis {
    algebra: Arc<AlgebraContext>,
    target_rank: usize,
    source_rank: usize,
    rows: Vec<FpVector>,
    /// (block, monomial) of the leading term --> row
    pivots: FxHashMap<(usize, usize), usize>,
}

impl UrbildBasis {
    /// Builds the basis from rows $[d(x) \mid x]$ of length `(target_rank + source_rank) * N`.
    /// The image parts must have pairwise distinct leading terms.
    pub fn from_rows(
        algebra: Arc<AlgebraContext>,
        target_rank: usize,
        source_rank: usize,
        mut rows: Vec<FpVector>,
    ) -> Result<Self> {
        let n = algebra.dimension();
        let p = algebra.prime();
        let len = (target_rank + source_rank) * n;
        let mut pivots = FxHashMap::default();
        for (i, row) in rows.iter_mut().enumerate() {
            if row.len() != len {
                return Err(FpError::DimensionMismatch {
                    expected: len,
                    found: row.len(),
                }
                .into());
            }
            let tip = leading_term(row, target_rank, n)
                .ok_or_else(|| Error::Corrupt(format!("preimage row {i} has zero image")))?;
            row.scale(p.inverse(tip.coeff)?);
            if pivots.insert((tip.block, tip.monomial), i).is_some() {
                return Err(Error::Corrupt(format!(
                    "preimage rows share the leading term ({}, {})",
                    tip.block, tip.monomial
                )));
            }
        }
        Ok(Self {
            algebra,
            target_rank,
            source_rank,
            rows,
            pivots,
        })
    }

    /// Reads off the basis of a finished image system.
    pub fn from_image(image: &mut Ngs) -> Result<Self> {
        let algebra = Arc::clone(image.algebra());
        let (target_rank, source_rank) = (image.rank(), image.aux_rank());
        let rows = image
            .materialize_all()?
            .iter()
            .map(|v| {
                v.row()
                    .cloned()
                    .ok_or_else(|| Error::invalid_state("basis row missing"))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(algebra, target_rank, source_rank, rows)
    }

    /// The dimension of the image.
    pub fn dimension(&self) -> usize {
        self.rows.len()
    }

    pub fn target_rank(&self) -> usize {
        self.target_rank
    }

    pub fn source_rank(&self) -> usize {
        self.source_rank
    }

    pub fn rows(&self) -> &[FpVector] {
        &self.rows
    }

    /// Returns some $x$ with $d(x) = y$, or `None` if $y$ is not in the image.
    pub fn preimage(&self, y: &FpVector) -> Result<Option<FpVector>> {
        let n = self.algebra.dimension();
        let p = self.algebra.prime();
        let split = self.target_rank * n;
        if y.len() != split {
            return Err(FpError::DimensionMismatch {
                expected: split,
                found: y.len(),
            }
            .into());
        }

        let mut work = FpVector::new(p, split + self.source_rank * n);
        work.assign_offset(y, 0);
        while let Some(tip) = leading_term(&work, self.target_rank, n) {
            let Some(&i) = self.pivots.get(&(tip.block, tip.monomial)) else {
                return Ok(None);
            };
            work.try_add(&self.rows[i], p.negate(tip.coeff))?;
        }
        let mut result = work.slice_to_owned(split, work.len());
        result.scale(p.negate(1));
        Ok(Some(result))
    }

    pub fn to_bytes(&self, buffer: &mut impl io::Write) -> io::Result<()> {
        buffer.write_u64::<LittleEndian>(self.rows.len() as u64)?;
        buffer.write_u64::<LittleEndian>(self.target_rank as u64)?;
        buffer.write_u64::<LittleEndian>(self.source_rank as u64)?;
        for row in &self.rows {
            row.to_bytes(buffer)?;
        }
        Ok(())
    }

    pub fn from_bytes(algebra: Arc<AlgebraContext>, data: &mut impl io::Read) -> Result<Self> {
        let count = data.read_u64::<LittleEndian>()? as usize;
        let target_rank = data.read_u64::<LittleEndian>()? as usize;
        let source_rank = data.read_u64::<LittleEndian>()? as usize;
        let len = (target_rank + source_rank) * algebra.dimension();
        let rows = (0..count)
            .map(|_| FpVector::from_bytes(algebra.prime(), len, data))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| Error::Corrupt(format!("truncated preimage basis: {e}")))?;
        Self::from_rows(algebra, target_rank, source_rank, rows)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algebra::MonomialOrdering;
    use crate::homomorphism::FreeModuleHomomorphism;
    use crate::ngs::pool::VectorPool;
    use crate::rgs::RelativeSystem;
    use crate::scheduler::Scheduler;
    use crate::utils::{Heuristics, Interrupt};
    use fp::prime::ValidPrime;

    /// The augmentation $A^k \to A$ of an elementary abelian group algebra, sending generator
    /// `i` to arrow `i`, together with its preimage basis.
    fn augmentation(p: u32, rank: usize) -> (FreeModuleHomomorphism, UrbildBasis) {
        let p = ValidPrime::new(p);
        let algebra = Arc::new(
            AlgebraContext::truncated_commutative(
                p,
                &vec![p.as_usize(); rank],
                MonomialOrdering::ReverseLengthLex,
            )
            .unwrap(),
        );
        let n = algebra.dimension();
        let outputs: Vec<FpVector> = (0..rank)
            .map(|i| algebra.action(i).row(0).clone())
            .collect();
        let d = FreeModuleHomomorphism::from_outputs(Arc::clone(&algebra), 1, outputs).unwrap();

        let mut pool = VectorPool::new(p);
        let heuristics = Heuristics {
            max_unfruitful: 2,
            overshoot: 3,
        };
        let mut rgs = RelativeSystem::new(
            Arc::clone(&algebra),
            1,
            rank,
            Some(n - 1),
            heuristics,
            Interrupt::new(),
        );
        for (j, output) in d.outputs().iter().enumerate() {
            rgs.add_generator(&mut pool, j, output).unwrap();
        }
        Scheduler::new(&mut pool).run_relative(&mut rgs).unwrap();
        let urbild = UrbildBasis::from_image(rgs.image_mut()).unwrap();
        (d, urbild)
    }

    #[test]
    fn preimages_of_the_augmentation_ideal() {
        let (d, urbild) = augmentation(2, 2);
        let n = d.algebra().dimension();
        assert_eq!(urbild.dimension(), n - 1);

        for m in 1..n {
            let mut y = FpVector::new(d.algebra().prime(), n);
            y.set_entry(m, 1);
            let x = urbild.preimage(&y).unwrap().unwrap();
            let mut image = FpVector::new(d.algebra().prime(), n);
            d.apply(&mut image, 1, &x).unwrap();
            assert_eq!(image, y);
        }

        let mut unit = FpVector::new(d.algebra().prime(), n);
        unit.set_entry(0, 1);
        assert_eq!(urbild.preimage(&unit).unwrap(), None);
        assert!(urbild.preimage(&FpVector::new(d.algebra().prime(), 2)).is_err());
    }

    #[test]
    fn preimages_at_odd_primes() {
        let (d, urbild) = augmentation(3, 2);
        let p = d.algebra().prime();
        let n = d.algebra().dimension();
        let mut y = FpVector::new(p, n);
        for m in 1..n {
            y.set_entry(m, (m % 3) as u32);
        }
        let x = urbild.preimage(&y).unwrap().unwrap();
        let mut image = FpVector::new(p, n);
        d.apply(&mut image, 1, &x).unwrap();
        assert_eq!(image, y);
    }

    #[test]
    fn bytes_roundtrip() {
        let (d, urbild) = augmentation(2, 2);
        let mut buffer = Vec::new();
        urbild.to_bytes(&mut buffer).unwrap();
        let loaded = UrbildBasis::from_bytes(Arc::clone(d.algebra()), &mut &buffer[..]).unwrap();
        assert_eq!(loaded.rows(), urbild.rows());
        assert_eq!(loaded.source_rank(), 2);
        assert!(UrbildBasis::from_bytes(Arc::clone(d.algebra()), &mut &buffer[..30]).is_err());
    }

    #[test]
    fn repeated_leading_terms_are_rejected() {
        let algebra = Arc::new(AlgebraContext::truncated_polynomial(fp::prime::TWO, 2).unwrap());
        let row = FpVector::from_slice(fp::prime::TWO, &[0, 1, 1, 0]);
        assert!(matches!(
            UrbildBasis::from_rows(algebra, 1, 1, vec![row.clone(), row]),
            Err(Error::Corrupt(_))
        ));
    }
}
