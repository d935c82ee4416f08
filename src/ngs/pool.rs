use fp::prime::ValidPrime;
use fp::vector::FpVector;
use rustc_hash::FxHashMap;

/// The leading term of a vector in a free module: a block (free generator), a monomial and the
/// coefficient in front of it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tip {
    pub block: usize,
    pub monomial: usize,
    pub coeff: u32,
}

/// A vector that is being classified. The buffer comes from a [`VectorPool`] and goes back to it
/// unless the candidate ends up in a basis.
#[derive(Debug)]
pub struct Candidate {
    pub row: FpVector,
    /// Scratch slot for the leading term, filled in by the generating system.
    pub tip: Option<Tip>,
}

/// A free list of row buffers, keyed by length. A resolution step creates and discards a large
/// number of vectors of the same few lengths, and recycling them avoids hammering the allocator.
#[derive(Debug)]
pub struct VectorPool {
    p: ValidPrime,
    free: FxHashMap<usize, Vec<FpVector>>,
    allocated: usize,
}

impl VectorPool {
    pub fn new(p: ValidPrime) -> Self {
        Self {
            p,
            free: FxHashMap::default(),
            allocated: 0,
        }
    }

    pub fn prime(&self) -> ValidPrime {
        self.p
    }

    /// A zeroed candidate with a row of length `len`.
    pub fn acquire(&mut self, len: usize) -> Candidate {
        let row = match self.free.get_mut(&len).and_then(Vec::pop) {
            Some(mut v) => {
                v.set_to_zero();
                v
            }
            None => {
                self.allocated += 1;
                FpVector::new(self.p, len)
            }
        };
        Candidate { row, tip: None }
    }

    pub fn release(&mut self, candidate: Candidate) {
        self.release_row(candidate.row);
    }

    pub fn release_row(&mut self, row: FpVector) {
        self.free.entry(row.len()).or_default().push(row);
    }

    /// The number of buffers ever allocated by this pool.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// The number of buffers currently waiting to be reused.
    pub fn available(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn buffers_are_recycled() {
        let p = ValidPrime::new(3);
        let mut pool = VectorPool::new(p);

        let mut a = pool.acquire(6);
        a.row.set_entry(2, 1);
        a.tip = Some(Tip {
            block: 0,
            monomial: 2,
            coeff: 1,
        });
        pool.release(a);
        assert_eq!(pool.available(), 1);

        let b = pool.acquire(6);
        assert!(b.row.is_zero());
        assert!(b.tip.is_none());
        assert_eq!(pool.allocated(), 1);

        let c = pool.acquire(4);
        assert_eq!(c.row.len(), 4);
        assert_eq!(pool.allocated(), 2);
        assert_eq!(pool.available(), 0);
    }
}
