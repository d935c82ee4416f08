use std::io;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fp::vector::FpVector;
use fp::FpError;

use crate::algebra::AlgebraContext;
use crate::error::{Error, Result};

/// A map $A^s \to A^r$ of free right modules, determined by the images of the generators.
#[derive(Debug, Clone)]
pub struct FreeModuleHomomorphism {
    algebra: Arc<AlgebraContext>,
    target_rank: usize,
    outputs: Vec<FpVector>, // input_idx --> output
}

impl FreeModuleHomomorphism {
    pub fn new(algebra: Arc<AlgebraContext>, target_rank: usize) -> Self {
        Self {
            algebra,
            target_rank,
            outputs: Vec::new(),
        }
    }

    pub fn from_outputs(
        algebra: Arc<AlgebraContext>,
        target_rank: usize,
        outputs: Vec<FpVector>,
    ) -> Result<Self> {
        let mut result = Self::new(algebra, target_rank);
        for output in outputs {
            result.add_generator(output)?;
        }
        Ok(result)
    }

    pub fn algebra(&self) -> &Arc<AlgebraContext> {
        &self.algebra
    }

    pub fn source_rank(&self) -> usize {
        self.outputs.len()
    }

    pub fn target_rank(&self) -> usize {
        self.target_rank
    }

    /// Adds a generator to the source, mapping to `output`.
    pub fn add_generator(&mut self, output: FpVector) -> Result<()> {
        let expected = self.target_rank * self.algebra.dimension();
        if output.len() != expected {
            return Err(FpError::DimensionMismatch {
                expected,
                found: output.len(),
            }
            .into());
        }
        self.outputs.push(output);
        Ok(())
    }

    pub fn output(&self, generator: usize) -> &FpVector {
        &self.outputs[generator]
    }

    pub fn outputs(&self) -> &[FpVector] {
        &self.outputs
    }

    /// Adds `coeff` times the image of basis element `input_index` of the source to `result`.
    /// Basis element `j * N + m` is generator `j` times monomial `m`.
    pub fn apply_to_basis_element(
        &self,
        result: &mut FpVector,
        coeff: u32,
        input_index: usize,
    ) -> Result<()> {
        let n = self.algebra.dimension();
        let (generator, monomial) = (input_index / n, input_index % n);
        let image =
            self.algebra
                .multiply_by_monomial(&self.outputs[generator], self.target_rank, monomial)?;
        result.try_add(&image, coeff)?;
        Ok(())
    }

    pub fn apply(&self, result: &mut FpVector, coeff: u32, input: &FpVector) -> Result<()> {
        let n = self.algebra.dimension();
        if input.len() != self.source_rank() * n {
            return Err(FpError::DimensionMismatch {
                expected: self.source_rank() * n,
                found: input.len(),
            }
            .into());
        }
        let p = self.algebra.prime();
        for (i, c) in input.iter_nonzero() {
            self.apply_to_basis_element(result, p.product(c, coeff), i)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self, buffer: &mut impl io::Write) -> io::Result<()> {
        buffer.write_u64::<LittleEndian>(self.source_rank() as u64)?;
        buffer.write_u64::<LittleEndian>(self.target_rank as u64)?;
        for output in &self.outputs {
            output.to_bytes(buffer)?;
        }
        Ok(())
    }

    pub fn from_bytes(algebra: Arc<AlgebraContext>, data: &mut impl io::Read) -> Result<Self> {
        let source_rank = data.read_u64::<LittleEndian>()? as usize;
        let target_rank = data.read_u64::<LittleEndian>()? as usize;
        let len = target_rank * algebra.dimension();
        let outputs = (0..source_rank)
            .map(|_| FpVector::from_bytes(algebra.prime(), len, data))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| Error::Corrupt(format!("truncated differential: {e}")))?;
        Self::from_outputs(algebra, target_rank, outputs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::algebra::MonomialOrdering;
    use fp::prime::TWO;

    #[test]
    fn apply_uses_the_action() {
        let algebra = Arc::new(
            AlgebraContext::truncated_commutative(TWO, &[2, 2], MonomialOrdering::ReverseLengthLex)
                .unwrap(),
        );
        // A^2 -> A, e_0 |-> y, e_1 |-> x
        let d = FreeModuleHomomorphism::from_outputs(
            Arc::clone(&algebra),
            1,
            vec![
                FpVector::from_slice(TWO, &[0, 1, 0, 0]),
                FpVector::from_slice(TWO, &[0, 0, 1, 0]),
            ],
        )
        .unwrap();
        assert_eq!(d.source_rank(), 2);

        // e_0 x + e_1 y |-> yx + xy = 0
        let input = FpVector::from_slice(TWO, &[0, 0, 1, 0, 0, 1, 0, 0]);
        let mut result = FpVector::new(TWO, 4);
        d.apply(&mut result, 1, &input).unwrap();
        assert!(result.is_zero());

        // e_0 x |-> xy
        let input = FpVector::from_slice(TWO, &[0, 0, 1, 0, 0, 0, 0, 0]);
        d.apply(&mut result, 1, &input).unwrap();
        assert_eq!(result, FpVector::from_slice(TWO, &[0, 0, 0, 1]));

        assert!(d.apply(&mut result, 1, &FpVector::new(TWO, 4)).is_err());
        assert!(d
            .clone()
            .add_generator(FpVector::new(TWO, 3))
            .is_err());
    }

    #[test]
    fn bytes_roundtrip() {
        let algebra = Arc::new(AlgebraContext::truncated_polynomial(TWO, 4).unwrap());
        let d = FreeModuleHomomorphism::from_outputs(
            Arc::clone(&algebra),
            1,
            vec![FpVector::from_slice(TWO, &[0, 1, 0, 1])],
        )
        .unwrap();
        let mut buffer = Vec::new();
        d.to_bytes(&mut buffer).unwrap();
        let e = FreeModuleHomomorphism::from_bytes(algebra, &mut &buffer[..]).unwrap();
        assert_eq!(e.outputs(), d.outputs());
        assert_eq!(e.target_rank(), 1);
        assert!(FreeModuleHomomorphism::from_bytes(e.algebra().clone(), &mut &buffer[..20])
            .is_err());
    }
}
