//! Dense vectors over $\mathbb{F}_p$.
//!
//! Entries are stored one per `u32` and are always kept reduced mod p. The resolution engine
//! works with rows that are a few thousand entries long at most, so the simple representation
//! wins over packed limbs in clarity without costing much.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use itertools::Itertools;

use crate::prime::ValidPrime;
use crate::FpError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FpVector {
    p: ValidPrime,
    entries: Vec<u32>,
}

impl FpVector {
    pub fn new(p: ValidPrime, len: usize) -> Self {
        Self {
            p,
            entries: vec![0; len],
        }
    }

    pub fn from_slice(p: ValidPrime, slice: &[u32]) -> Self {
        Self {
            p,
            entries: slice.iter().map(|&x| x % p.as_u32()).collect(),
        }
    }

    pub fn prime(&self) -> ValidPrime {
        self.p
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> u32 {
        self.entries[index]
    }

    pub fn set_entry(&mut self, index: usize, value: u32) {
        self.entries[index] = value % self.p.as_u32();
    }

    pub fn add_basis_element(&mut self, index: usize, value: u32) {
        self.entries[index] = self.p.sum(self.entries[index], value);
    }

    pub fn set_to_zero(&mut self) {
        self.entries.iter_mut().for_each(|x| *x = 0);
    }

    pub fn is_zero(&self) -> bool {
        self.entries.iter().all(|&x| x == 0)
    }

    /// Whether the entries in `start..end` all vanish.
    pub fn is_zero_in(&self, start: usize, end: usize) -> bool {
        self.entries[start..end].iter().all(|&x| x == 0)
    }

    pub fn scale(&mut self, c: u32) {
        let p = self.p;
        let c = c % p.as_u32();
        match c {
            0 => self.set_to_zero(),
            1 => (),
            _ => self.entries.iter_mut().for_each(|x| *x = p.product(*x, c)),
        }
    }

    /// Makes `self` equal to `other`. The two must have the same length.
    pub fn assign(&mut self, other: &Self) {
        debug_assert_eq!(self.len(), other.len());
        self.entries.copy_from_slice(&other.entries);
    }

    /// Adds `c * other` to `self`.
    pub fn try_add(&mut self, other: &Self, c: u32) -> Result<(), FpError> {
        if self.len() != other.len() {
            return Err(FpError::DimensionMismatch {
                expected: self.len(),
                found: other.len(),
            });
        }
        self.add_offset(other, c, 0)
    }

    /// Adds `c * other` to the entries `offset..offset + other.len()` of `self`.
    pub fn add_offset(&mut self, other: &Self, c: u32, offset: usize) -> Result<(), FpError> {
        let end = offset + other.len();
        if end > self.len() {
            return Err(FpError::OutOfBounds {
                index: end - 1,
                len: self.len(),
            });
        }
        let p = self.p;
        let c = c % p.as_u32();
        if c == 0 {
            return Ok(());
        }
        for (x, &y) in self.entries[offset..end].iter_mut().zip(&other.entries) {
            if y != 0 {
                *x = p.sum(*x, p.product(y, c));
            }
        }
        Ok(())
    }

    /// Copies the entries `start..end` into a new vector.
    pub fn slice_to_owned(&self, start: usize, end: usize) -> Self {
        Self {
            p: self.p,
            entries: self.entries[start..end].to_vec(),
        }
    }

    /// Overwrites `self[offset..offset + other.len()]` with `other`.
    pub fn assign_offset(&mut self, other: &Self, offset: usize) {
        self.entries[offset..offset + other.len()].copy_from_slice(&other.entries);
    }

    /// The index and value of the first nonzero entry.
    pub fn first_nonzero(&self) -> Option<(usize, u32)> {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .find(|&(_, x)| x != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().copied()
    }

    pub fn iter_nonzero(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, x)| x != 0)
    }

    /// Resizes the vector to `len`, zeroing every entry. Used when a pooled buffer is reused.
    pub fn reset(&mut self, len: usize) {
        self.entries.clear();
        self.entries.resize(len, 0);
    }

    pub fn from_bytes(p: ValidPrime, len: usize, data: &mut impl Read) -> std::io::Result<Self> {
        let mut entries = vec![0; len];
        data.read_u32_into::<LittleEndian>(&mut entries)?;
        if let Some(bad) = entries.iter().find(|&&x| x >= p.as_u32()) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("entry {bad} is not reduced mod {p}"),
            ));
        }
        Ok(Self { p, entries })
    }

    pub fn to_bytes(&self, buffer: &mut impl Write) -> std::io::Result<()> {
        for &x in &self.entries {
            buffer.write_u32::<LittleEndian>(x)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for FpVector {
    /// Prints `[1, 0, 2]`. The alternate form drops brackets and separators, which is compact
    /// for p = 2.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "{}", self.entries.iter().join(""))
        } else {
            write!(f, "[{}]", self.entries.iter().join(", "))
        }
    }
}
