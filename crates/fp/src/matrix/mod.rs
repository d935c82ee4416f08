mod subspace;

pub use subspace::Subspace;

use std::ops::{Index, IndexMut};

use crate::prime::ValidPrime;
use crate::vector::FpVector;

/// A matrix over $\mathbb{F}_p$, stored as a list of rows.
///
/// In the resolution engine a matrix describes the action of an algebra generator on a monomial
/// basis, with row $i$ holding the image of basis element $i$.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    p: ValidPrime,
    columns: usize,
    vectors: Vec<FpVector>,
}

impl Matrix {
    pub fn new(p: ValidPrime, rows: usize, columns: usize) -> Self {
        Self {
            p,
            columns,
            vectors: (0..rows).map(|_| FpVector::new(p, columns)).collect(),
        }
    }

    pub fn prime(&self) -> ValidPrime {
        self.p
    }

    pub fn rows(&self) -> usize {
        self.vectors.len()
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn row(&self, i: usize) -> &FpVector {
        &self.vectors[i]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FpVector> {
        self.vectors.iter()
    }
}

impl Index<usize> for Matrix {
    type Output = FpVector;

    fn index(&self, i: usize) -> &FpVector {
        &self.vectors[i]
    }
}

impl IndexMut<usize> for Matrix {
    fn index_mut(&mut self, i: usize) -> &mut FpVector {
        &mut self.vectors[i]
    }
}
