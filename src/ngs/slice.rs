//! Storage for basis rows of degrees that are no longer being expanded.
//!
//! Once a generating system has swept past a degree, the rows of that degree are only needed
//! again if a vector of lower degree shows up later, or when the final results are read off. A
//! [`SliceCache`] lets those rows leave memory in the meantime.

use std::cell::RefCell;
use std::fmt::Debug;
use std::path::PathBuf;
use std::rc::Rc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fp::prime::ValidPrime;
use fp::vector::FpVector;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::save::{SaveFile, SaveKind};

pub trait SliceCache: Debug {
    /// Stores the rows of one degree, replacing whatever was stored for it before.
    fn store(&mut self, degree: usize, rows: &[FpVector]) -> Result<()>;

    /// Returns the rows previously stored for `degree`.
    fn load(&mut self, degree: usize) -> Result<Vec<FpVector>>;

    /// Forgets the rows of `degree`. Destroying a degree that was never stored is not an error.
    fn destroy(&mut self, degree: usize) -> Result<()>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SliceEvent {
    Store(usize),
    Load(usize),
    Destroy(usize),
}

/// A shared record of the operations performed on a [`MemorySlices`].
#[derive(Debug, Clone, Default)]
pub struct SliceLog(Rc<RefCell<Vec<SliceEvent>>>);

impl SliceLog {
    fn push(&self, event: SliceEvent) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<SliceEvent> {
        self.0.borrow().clone()
    }
}

/// Keeps released slices in a hash map. This saves nothing, but records every operation, which
/// makes the access pattern of a generating system observable.
#[derive(Debug, Default)]
pub struct MemorySlices {
    slices: FxHashMap<usize, Vec<FpVector>>,
    log: SliceLog,
}

impl MemorySlices {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle to the log that stays valid after the cache is boxed.
    pub fn log(&self) -> SliceLog {
        self.log.clone()
    }
}

impl SliceCache for MemorySlices {
    fn store(&mut self, degree: usize, rows: &[FpVector]) -> Result<()> {
        self.log.push(SliceEvent::Store(degree));
        self.slices.insert(degree, rows.to_vec());
        Ok(())
    }

    fn load(&mut self, degree: usize) -> Result<Vec<FpVector>> {
        self.log.push(SliceEvent::Load(degree));
        self.slices
            .get(&degree)
            .cloned()
            .ok_or_else(|| Error::invalid_state(format!("slice {degree} was never stored")))
    }

    fn destroy(&mut self, degree: usize) -> Result<()> {
        self.log.push(SliceEvent::Destroy(degree));
        self.slices.remove(&degree);
        Ok(())
    }
}

/// Writes each slice to its own checksummed file `slices/{degree}_slice` under `dir`.
#[derive(Debug)]
pub struct FileSlices {
    dir: PathBuf,
    p: ValidPrime,
    row_len: usize,
    algebra_magic: u32,
}

impl FileSlices {
    pub fn new(dir: PathBuf, p: ValidPrime, row_len: usize, algebra_magic: u32) -> Result<Self> {
        SaveKind::Slice.create_dir(&dir)?;
        Ok(Self {
            dir,
            p,
            row_len,
            algebra_magic,
        })
    }

    fn save_file(&self, degree: usize) -> SaveFile {
        SaveFile {
            kind: SaveKind::Slice,
            algebra_magic: self.algebra_magic,
            degree,
        }
    }
}

impl SliceCache for FileSlices {
    fn store(&mut self, degree: usize, rows: &[FpVector]) -> Result<()> {
        let mut f = self.save_file(degree).create_file(self.dir.clone(), true)?;
        f.write_u64::<LittleEndian>(rows.len() as u64)?;
        f.write_u64::<LittleEndian>(self.row_len as u64)?;
        for row in rows {
            row.to_bytes(&mut f)?;
        }
        f.finish()?;
        Ok(())
    }

    fn load(&mut self, degree: usize) -> Result<Vec<FpVector>> {
        let mut f = self
            .save_file(degree)
            .open_file(self.dir.clone())?
            .ok_or_else(|| Error::invalid_state(format!("slice {degree} was never stored")))?;
        let count = f.read_u64::<LittleEndian>()? as usize;
        let row_len = f.read_u64::<LittleEndian>()? as usize;
        if row_len != self.row_len {
            return Err(Error::Corrupt(format!(
                "slice {degree} has rows of length {row_len}, expected {}",
                self.row_len
            )));
        }
        let rows = (0..count)
            .map(|_| FpVector::from_bytes(self.p, row_len, &mut f))
            .collect::<std::io::Result<Vec<_>>>()?;
        f.finish()?;
        Ok(rows)
    }

    fn destroy(&mut self, degree: usize) -> Result<()> {
        Ok(self.save_file(degree).delete_file(self.dir.clone())?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rows(p: ValidPrime) -> Vec<FpVector> {
        vec![
            FpVector::from_slice(p, &[0, 1, 2, 0]),
            FpVector::from_slice(p, &[0, 0, 1, 1]),
        ]
    }

    #[test]
    fn memory_slices() {
        let p = ValidPrime::new(3);
        let mut cache = MemorySlices::new();
        let log = cache.log();
        cache.store(1, &rows(p)).unwrap();
        assert_eq!(cache.load(1).unwrap(), rows(p));
        cache.destroy(1).unwrap();
        assert!(cache.load(1).is_err());
        assert_eq!(
            log.events(),
            vec![
                SliceEvent::Store(1),
                SliceEvent::Load(1),
                SliceEvent::Destroy(1),
                SliceEvent::Load(1)
            ]
        );
    }

    #[test]
    fn file_slices() {
        let p = ValidPrime::new(3);
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = FileSlices::new(dir.path().into(), p, 4, 99).unwrap();
        cache.store(2, &rows(p)).unwrap();
        cache.store(2, &rows(p)[..1]).unwrap();
        assert_eq!(cache.load(2).unwrap(), rows(p)[..1].to_vec());
        cache.destroy(2).unwrap();
        cache.destroy(2).unwrap();
        assert!(cache.load(2).is_err());
    }
}
