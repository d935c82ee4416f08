use crate::prime::ValidPrime;
use crate::vector::FpVector;
use crate::FpError;

/// A subspace of a vector space.
///
/// The basis is kept in reduced row echelon form, sorted by pivot column, so membership tests
/// and reductions are a single pass over the basis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subspace {
    p: ValidPrime,
    ambient_dimension: usize,
    basis: Vec<FpVector>,
    pivots: Vec<usize>,
}

impl Subspace {
    pub fn new(p: ValidPrime, ambient_dimension: usize) -> Self {
        Self {
            p,
            ambient_dimension,
            basis: Vec::new(),
            pivots: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.basis.len()
    }

    /// Projects a vector to the complement of the subspace spanned by the non-pivot columns.
    pub fn reduce(&self, vector: &mut FpVector) -> Result<(), FpError> {
        if vector.len() != self.ambient_dimension {
            return Err(FpError::DimensionMismatch {
                expected: self.ambient_dimension,
                found: vector.len(),
            });
        }
        for (row, &col) in self.basis.iter().zip(&self.pivots) {
            let c = vector.entry(col);
            if c != 0 {
                vector.try_add(row, self.p.negate(c))?;
            }
        }
        Ok(())
    }

    /// Adds a vector to the subspace.
    ///
    /// # Returns
    /// Whether the dimension went up.
    pub fn add_vector(&mut self, vector: &FpVector) -> Result<bool, FpError> {
        let mut vector = vector.clone();
        self.reduce(&mut vector)?;
        let Some((col, c)) = vector.first_nonzero() else {
            return Ok(false);
        };
        vector.scale(self.p.inverse(c)?);
        for row in &mut self.basis {
            let d = row.entry(col);
            if d != 0 {
                row.try_add(&vector, self.p.negate(d))?;
            }
        }
        let position = self.pivots.partition_point(|&x| x < col);
        self.pivots.insert(position, col);
        self.basis.insert(position, vector);
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grow_and_reduce() {
        let p = ValidPrime::new(3);
        let mut s = Subspace::new(p, 4);
        assert!(s.add_vector(&FpVector::from_slice(p, &[0, 1, 1, 0])).unwrap());
        assert!(s.add_vector(&FpVector::from_slice(p, &[1, 1, 0, 0])).unwrap());
        assert!(!s.add_vector(&FpVector::from_slice(p, &[1, 2, 1, 0])).unwrap());
        assert_eq!(s.dimension(), 2);
        assert_eq!(s.pivots, vec![0, 1]);
        assert_eq!(s.basis[0], FpVector::from_slice(p, &[1, 0, 2, 0]));

        let mut v = FpVector::from_slice(p, &[2, 1, 2, 0]);
        s.reduce(&mut v).unwrap();
        assert!(v.is_zero());
        let mut w = FpVector::from_slice(p, &[0, 0, 0, 1]);
        s.reduce(&mut w).unwrap();
        assert!(!w.is_zero());
        assert!(s.add_vector(&FpVector::new(p, 3)).is_err());
    }
}
