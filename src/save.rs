//! Degree indexed save files.
//!
//! Every file starts with a header of three little endian `u32`s: the magic number of its
//! [`SaveKind`], the [`magic`](crate::algebra::AlgebraContext::magic) of the algebra and the
//! homological degree (or slice degree). The payload follows, and the file ends with the adler32
//! checksum of everything before it.
//!
//! Files are written to a temporary path and renamed into place once the checksum is written, so
//! an interrupted run never leaves a truncated file behind under the final name.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SaveDirectory {
    None,
    Combined(PathBuf),
    /// Read existing data from `read` and write new data to `write`.
    Split { read: PathBuf, write: PathBuf },
}

impl SaveDirectory {
    pub fn read(&self) -> Option<&PathBuf> {
        match self {
            Self::None => None,
            Self::Combined(x) => Some(x),
            Self::Split { read, .. } => Some(read),
        }
    }

    pub fn write(&self) -> Option<&PathBuf> {
        match self {
            Self::None => None,
            Self::Combined(x) => Some(x),
            Self::Split { write, .. } => Some(write),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_some(&self) -> bool {
        !self.is_none()
    }
}

impl From<Option<PathBuf>> for SaveDirectory {
    fn from(x: Option<PathBuf>) -> Self {
        match x {
            None => Self::None,
            Some(x) => Self::Combined(x),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SaveKind {
    /// The images of the generators under a differential of the resolution
    Differential,

    /// The image basis of a differential, with preimages, used to lift elements
    UrbildBasis,

    /// Basis rows of one degree of a generating system, spilled to disk
    Slice,
}

impl SaveKind {
    pub fn magic(self) -> u32 {
        match self {
            Self::Differential => 0xD1FF0000,
            Self::UrbildBasis => 0x0B1D0000,
            Self::Slice => 0x51CE0000,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Differential => "differential",
            Self::UrbildBasis => "urbild_basis",
            Self::Slice => "slice",
        }
    }

    pub fn resolution_data() -> impl Iterator<Item = Self> {
        use SaveKind::*;
        static KINDS: [SaveKind; 2] = [Differential, UrbildBasis];
        KINDS.iter().copied()
    }

    pub fn create_dir(self, p: &Path) -> Result<()> {
        let mut p = p.to_owned();

        p.push(format!("{}s", self.name()));
        if !p.exists() {
            std::fs::create_dir_all(&p)?;
        } else if !p.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{p:?} is not a directory"),
            )));
        }
        Ok(())
    }
}

/// A writer that accumulates the adler32 checksum of everything written through it. The
/// checksum is only appended by [`ChecksumWriter::finish`]; a writer that is dropped without
/// finishing leaves no file behind.
pub struct ChecksumWriter<T: Write> {
    writer: Option<T>,
    path: PathBuf,
    tmp_path: PathBuf,
    adler: adler::Adler32,
    bytes: usize,
}

impl<T: Write> ChecksumWriter<T> {
    fn new(path: PathBuf, tmp_path: PathBuf, writer: T) -> Self {
        Self {
            writer: Some(writer),
            path,
            tmp_path,
            adler: adler::Adler32::new(),
            bytes: 0,
        }
    }

    fn inner(&mut self) -> io::Result<&mut T> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "writer already finished"))
    }

    /// Writes the checksum and moves the file into place.
    pub fn finish(mut self) -> io::Result<()> {
        let checksum = self.adler.checksum();
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "writer already finished"))?;
        writer.write_u32::<LittleEndian>(checksum)?;
        writer.flush()?;
        drop(writer);
        std::fs::rename(&self.tmp_path, &self.path)?;
        tracing::info!(bytes = self.bytes, "closing file: {}", self.path.to_string_lossy());
        Ok(())
    }
}

impl<T: Write> Write for ChecksumWriter<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.inner()?.write(buf)?;
        self.adler.write_slice(&buf[0..bytes_written]);
        self.bytes += bytes_written;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner()?.flush()
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner()?.write_all(buf)?;
        self.adler.write_slice(buf);
        self.bytes += buf.len();
        Ok(())
    }
}

impl<T: Write> Drop for ChecksumWriter<T> {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            tracing::warn!(
                "discarding unfinished file: {}",
                self.tmp_path.to_string_lossy()
            );
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

pub struct ChecksumReader<T: Read> {
    reader: T,
    adler: adler::Adler32,
}

impl<T: Read> ChecksumReader<T> {
    pub fn new(reader: T) -> Self {
        Self {
            reader,
            adler: adler::Adler32::new(),
        }
    }

    /// Checks the trailing checksum and that nothing follows it.
    pub fn finish(mut self) -> Result<()> {
        let expected = self.adler.checksum();
        let found = self.reader.read_u32::<LittleEndian>()?;
        if expected != found {
            return Err(Error::Corrupt(format!(
                "invalid file checksum: computed {expected:#010x}, stored {found:#010x}"
            )));
        }
        let mut buf = [0];
        if self.reader.read(&mut buf)? != 0 {
            return Err(Error::Corrupt("trailing data after checksum".into()));
        }
        Ok(())
    }
}

/// We only implement the functions required and the ones we actually use.
impl<T: Read> Read for ChecksumReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes_read = self.reader.read(buf)?;
        self.adler.write_slice(&buf[0..bytes_read]);
        Ok(bytes_read)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.reader.read_exact(buf)?;
        self.adler.write_slice(buf);
        Ok(())
    }
}

/// Identifies one save file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SaveFile {
    pub kind: SaveKind,
    pub algebra_magic: u32,
    pub degree: usize,
}

impl SaveFile {
    fn write_header(&self, buffer: &mut impl Write) -> io::Result<()> {
        buffer.write_u32::<LittleEndian>(self.kind.magic())?;
        buffer.write_u32::<LittleEndian>(self.algebra_magic)?;
        buffer.write_u32::<LittleEndian>(self.degree as u32)
    }

    fn validate_header(&self, buffer: &mut impl Read) -> Result<()> {
        macro_rules! check_header {
            ($name:literal, $value:expr, $format:literal) => {
                let data = buffer.read_u32::<LittleEndian>()?;
                if data != $value {
                    return Err(Error::Corrupt(format!(
                        "invalid header: {} was {} but expected {}",
                        $name,
                        format_args!($format, data),
                        format_args!($format, $value)
                    )));
                }
            };
        }

        check_header!("magic", self.kind.magic(), "{:#010x}");
        check_header!("algebra", self.algebra_magic, "{:#010x}");
        check_header!("degree", self.degree as u32, "{}");

        Ok(())
    }

    pub fn get_save_path(&self, mut dir: PathBuf) -> PathBuf {
        dir.push(format!(
            "{name}s/{degree}_{name}",
            name = self.kind.name(),
            degree = self.degree
        ));
        dir
    }

    /// Opens the file for reading and checks its header. Returns `None` if the file does not
    /// exist. An empty file is treated as missing and deleted.
    pub fn open_file(&self, dir: PathBuf) -> Result<Option<ChecksumReader<BufReader<File>>>> {
        use io::BufRead;

        let path = self.get_save_path(dir);
        let f = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("failed open for reading: {}", path.to_string_lossy());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(f);
        if reader.fill_buf()?.is_empty() {
            std::fs::remove_file(&path)?;
            return Ok(None);
        }
        let mut reader = ChecksumReader::new(reader);
        self.validate_header(&mut reader)?;
        tracing::info!("success open for reading: {}", path.to_string_lossy());
        Ok(Some(reader))
    }

    pub fn exists(&self, dir: PathBuf) -> bool {
        self.get_save_path(dir).exists()
    }

    pub fn delete_file(&self, dir: PathBuf) -> io::Result<()> {
        let p = self.get_save_path(dir);
        match std::fs::remove_file(p) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Creates the file and writes the header. The parent directory is created if needed.
    ///
    /// # Arguments
    ///  - `overwrite`: Whether to overwrite a file if it already exists.
    pub fn create_file(
        &self,
        dir: PathBuf,
        overwrite: bool,
    ) -> Result<ChecksumWriter<BufWriter<File>>> {
        self.kind.create_dir(&dir)?;
        let p = self.get_save_path(dir);
        if !overwrite && p.exists() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("save file {p:?} already exists"),
            )));
        }
        tracing::info!("open for writing: {}", p.to_string_lossy());

        let mut tmp = p.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let f = File::create(&tmp)?;
        let mut f = ChecksumWriter::new(p, tmp, BufWriter::new(f));
        self.write_header(&mut f)?;
        Ok(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip_and_checksum() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = SaveFile {
            kind: SaveKind::Differential,
            algebra_magic: 0x1234,
            degree: 3,
        };
        assert!(file.open_file(dir.path().into()).unwrap().is_none());

        let mut f = file.create_file(dir.path().into(), false).unwrap();
        f.write_u64::<LittleEndian>(42).unwrap();
        f.finish().unwrap();
        assert!(file.exists(dir.path().into()));
        assert!(file.create_file(dir.path().into(), false).is_err());

        let mut f = file.open_file(dir.path().into()).unwrap().unwrap();
        assert_eq!(f.read_u64::<LittleEndian>().unwrap(), 42);
        f.finish().unwrap();

        let other = SaveFile {
            algebra_magic: 0x4321,
            ..file
        };
        assert!(matches!(
            other.open_file(dir.path().into()),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn corrupt_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = SaveFile {
            kind: SaveKind::UrbildBasis,
            algebra_magic: 7,
            degree: 0,
        };
        let mut f = file.create_file(dir.path().into(), false).unwrap();
        f.write_u32::<LittleEndian>(5).unwrap();
        f.finish().unwrap();

        let path = file.get_save_path(dir.path().into());
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[12] ^= 1;
        std::fs::write(&path, bytes).unwrap();

        let mut f = file.open_file(dir.path().into()).unwrap().unwrap();
        assert_eq!(f.read_u32::<LittleEndian>().unwrap(), 4);
        assert!(matches!(f.finish(), Err(Error::Corrupt(_))));
    }

    #[test]
    fn unfinished_files_are_discarded() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = SaveFile {
            kind: SaveKind::Slice,
            algebra_magic: 7,
            degree: 2,
        };
        let f = file.create_file(dir.path().into(), false).unwrap();
        drop(f);
        assert!(!file.exists(dir.path().into()));
        assert!(file.open_file(dir.path().into()).unwrap().is_none());
    }
}
