//! Linear algebra over prime fields.
//!
//! This crate supplies exactly what the resolution engine needs from its arithmetic layer: a
//! dynamic prime, dense row vectors, matrices whose rows are such vectors, and subspaces kept in
//! row reduced echelon form.
#![allow(clippy::many_single_char_names)]
#![allow(clippy::unreadable_literal)]

pub mod matrix;
pub mod prime;
pub mod vector;

/// Failures of the arithmetic layer. Callers are expected to propagate these unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FpError {
    /// Two operands that must have the same length did not.
    DimensionMismatch { expected: usize, found: usize },
    /// Attempted to invert a scalar that is zero modulo the prime.
    NotInvertible { value: u32, p: u32 },
    /// An index past the end of a vector or matrix.
    OutOfBounds { index: usize, len: usize },
}

impl std::fmt::Display for FpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Self::NotInvertible { value, p } => write!(f, "{value} is not invertible mod {p}"),
            Self::OutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
        }
    }
}

impl std::error::Error for FpError {}
