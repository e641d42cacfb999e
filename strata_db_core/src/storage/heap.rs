use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DbError, Result};

/// Fixed-length records for one table, concatenated with no header.
/// A row's location is its byte offset in the file.
#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    row_width: usize,
}

impl HeapFile {
    /// Creates an empty heap file; fails if one already exists.
    pub fn create(path: impl Into<PathBuf>, row_width: usize) -> Result<Self> {
        let path = path.into();
        if row_width == 0 {
            return Err(DbError::InvalidArgument("Row width must be positive".to_string()));
        }
        OpenOptions::new().create_new(true).write(true).open(&path)?;
        Ok(Self { path, row_width })
    }

    /// Opens an existing heap file and checks it holds whole rows only.
    pub fn open(path: impl Into<PathBuf>, row_width: usize) -> Result<Self> {
        let path = path.into();
        if row_width == 0 {
            return Err(DbError::InvalidArgument("Row width must be positive".to_string()));
        }
        let len = fs::metadata(&path)?.len();
        if len % row_width as u64 != 0 {
            return Err(DbError::CorruptRow {
                location: len - len % row_width as u64,
                reason: format!(
                    "heap file length {len} is not a multiple of row width {row_width}"
                ),
            });
        }
        Ok(Self { path, row_width })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn len_bytes(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    pub fn row_count(&self) -> Result<u64> {
        Ok(self.len_bytes()? / self.row_width as u64)
    }

    /// Writes one row at end-of-file and returns its location.
    pub fn append(&mut self, row_bytes: &[u8]) -> Result<u64> {
        self.check_width(row_bytes)?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let location = file.metadata()?.len();
        file.write_all(row_bytes)?;
        debug!(path = %self.path.display(), location, "appended row");
        Ok(location)
    }

    pub fn read_at(&self, location: u64) -> Result<Vec<u8>> {
        self.check_location(location)?;
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(location))?;
        let mut buf = vec![0u8; self.row_width];
        file.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => DbError::CorruptRow {
                location,
                reason: "row truncated at end of file".to_string(),
            },
            _ => DbError::Io(e),
        })?;
        Ok(buf)
    }

    /// Rewrites one record in place.
    pub fn overwrite_at(&mut self, location: u64, row_bytes: &[u8]) -> Result<()> {
        self.check_width(row_bytes)?;
        self.check_location(location)?;
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(location))?;
        file.write_all(row_bytes)?;
        Ok(())
    }

    /// Forward iterator over every row slot in file order. Calling `scan`
    /// again restarts from the first row.
    pub fn scan(&self) -> Result<HeapScan> {
        let file = File::open(&self.path)?;
        Ok(HeapScan {
            reader: BufReader::new(file),
            row_width: self.row_width,
            location: 0,
            done: false,
        })
    }

    /// Compaction: writes `rows` into a fresh file and renames it over the
    /// original, so readers never observe a half-written heap.
    pub fn rewrite<'a, I>(&mut self, rows: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let tmp = self.path.with_extension("bin.compact");
        let mut written = 0u64;
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for row in rows {
                self.check_width(row)?;
                out.write_all(row)?;
                written += 1;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), rows = written, "compacted heap file");
        Ok(written)
    }

    pub fn truncate(&mut self) -> Result<()> {
        OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        Ok(())
    }

    fn check_width(&self, row_bytes: &[u8]) -> Result<()> {
        if row_bytes.len() != self.row_width {
            return Err(DbError::InvalidArgument(format!(
                "Row is {} bytes but the heap stores {}-byte rows",
                row_bytes.len(),
                self.row_width
            )));
        }
        Ok(())
    }

    fn check_location(&self, location: u64) -> Result<()> {
        if location % self.row_width as u64 != 0 {
            return Err(DbError::CorruptRow {
                location,
                reason: format!("offset is not aligned to row width {}", self.row_width),
            });
        }
        let len = self.len_bytes()?;
        if location + self.row_width as u64 > len {
            return Err(DbError::CorruptRow {
                location,
                reason: format!("offset is past end of file ({len} bytes)"),
            });
        }
        Ok(())
    }
}

/// Iterator returned by [`HeapFile::scan`]. A truncated trailing row ends
/// the scan with a `CorruptRow` error instead of being skipped.
pub struct HeapScan {
    reader: BufReader<File>,
    row_width: usize,
    location: u64,
    done: bool,
}

impl Iterator for HeapScan {
    type Item = Result<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = vec![0u8; self.row_width];
        let mut filled = 0;
        while filled < self.row_width {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(DbError::Io(e)));
                }
            }
        }
        if filled == 0 {
            self.done = true;
            return None;
        }
        if filled < self.row_width {
            self.done = true;
            return Some(Err(DbError::CorruptRow {
                location: self.location,
                reason: format!("row truncated after {filled} of {} bytes", self.row_width),
            }));
        }
        let location = self.location;
        self.location += self.row_width as u64;
        Some(Ok((location, buf)))
    }
}
