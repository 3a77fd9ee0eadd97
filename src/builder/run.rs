//! Run files: sorted intermediate output of the bulk builder
//!
//! One run file is produced per buffer flush. Records are laid out in
//! strictly ascending key order:
//!
//! ```text
//! +------------------+
//! | Key Length       | (u32 BE)
//! +------------------+
//! | Key Bytes        |
//! +------------------+
//! | Added Length     | (u32 BE, multiple of 8)
//! +------------------+
//! | Added IDs        | (8-byte BE each, ascending)
//! +------------------+
//! | Removed Length   | (u32 BE, replace mode only)
//! +------------------+
//! | Removed IDs      | (8-byte BE each, ascending)
//! +------------------+
//! ```
//!
//! No file header or footer; EOF terminates the record stream. The merge
//! phase consumes and discards these files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::errors::{BuildError, BuildResult};

/// One decoded run record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// The index key
    pub key: Vec<u8>,
    /// Concatenated 8-byte big-endian added ids, ascending
    pub added: Vec<u8>,
    /// Concatenated removed ids; present only in replace mode
    pub removed: Option<Vec<u8>>,
}

impl RunRecord {
    /// Number of added ids in this record.
    pub fn added_count(&self) -> usize {
        self.added.len() / 8
    }

    /// Number of removed ids in this record.
    pub fn removed_count(&self) -> usize {
        self.removed.as_ref().map_or(0, |r| r.len() / 8)
    }
}

/// Sequential writer for one run file.
pub struct RunWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records: u64,
}

impl RunWriter {
    /// Creates the run file, truncating any previous content.
    pub fn create(path: &Path) -> BuildResult<Self> {
        let file = File::create(path).map_err(|e| BuildError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    /// Appends one record. The caller guarantees key order.
    pub fn write_record(
        &mut self,
        key: &[u8],
        added: &[u8],
        removed: Option<&[u8]>,
    ) -> BuildResult<()> {
        self.write_section(key)?;
        self.write_section(added)?;
        if let Some(removed) = removed {
            self.write_section(removed)?;
        }
        self.records += 1;
        Ok(())
    }

    fn write_section(&mut self, bytes: &[u8]) -> BuildResult<()> {
        let len = bytes.len() as u32;
        self.writer
            .write_all(&len.to_be_bytes())
            .and_then(|_| self.writer.write_all(bytes))
            .map_err(|e| BuildError::io(&self.path, e))
    }

    /// Flushes buffered output and returns the record count.
    pub fn finish(mut self) -> BuildResult<u64> {
        self.writer
            .flush()
            .map_err(|e| BuildError::io(&self.path, e))?;
        Ok(self.records)
    }
}

/// Sequential reader for one run file.
///
/// Truncated or malformed records are classified as corruption, with the
/// offset of the failing record for diagnostics.
pub struct RunReader {
    path: PathBuf,
    reader: BufReader<File>,
    replace_mode: bool,
    offset: u64,
    file_size: u64,
}

impl RunReader {
    /// Opens a run file. `replace_mode` must match the mode the file was
    /// built with: it decides whether a removed section follows each
    /// added section.
    pub fn open(path: &Path, replace_mode: bool) -> BuildResult<Self> {
        let file = File::open(path).map_err(|e| BuildError::io(path, e))?;
        let file_size = file
            .metadata()
            .map_err(|e| BuildError::io(path, e))?
            .len();
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            replace_mode,
            offset: 0,
            file_size,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next record, or `None` at end of file.
    pub fn read_next(&mut self) -> BuildResult<Option<RunRecord>> {
        if self.offset >= self.file_size {
            return Ok(None);
        }
        let record_offset = self.offset;

        let key = self.read_section(record_offset, "key")?;
        if key.is_empty() {
            return Err(BuildError::corrupt(
                &self.path,
                record_offset,
                "zero-length key",
            ));
        }
        let added = self.read_id_run(record_offset, "added")?;
        let removed = if self.replace_mode {
            Some(self.read_id_run(record_offset, "removed")?)
        } else {
            None
        };

        Ok(Some(RunRecord { key, added, removed }))
    }

    fn read_id_run(&mut self, record_offset: u64, section: &str) -> BuildResult<Vec<u8>> {
        let run = self.read_section(record_offset, section)?;
        if run.len() % 8 != 0 {
            return Err(BuildError::corrupt(
                &self.path,
                record_offset,
                format!("{} run length {} is not a multiple of 8", section, run.len()),
            ));
        }
        Ok(run)
    }

    fn read_section(&mut self, record_offset: u64, section: &str) -> BuildResult<Vec<u8>> {
        let remaining = self.file_size - self.offset;
        if remaining < 4 {
            return Err(BuildError::corrupt(
                &self.path,
                record_offset,
                format!("truncated {} length: {} bytes remaining", section, remaining),
            ));
        }
        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .map_err(|e| BuildError::io(&self.path, e))?;
        self.offset += 4;

        let len = u32::from_be_bytes(len_buf) as u64;
        if len > self.file_size - self.offset {
            return Err(BuildError::corrupt(
                &self.path,
                record_offset,
                format!(
                    "{} length {} exceeds remaining file size {}",
                    section,
                    len,
                    self.file_size - self.offset
                ),
            ));
        }
        let mut bytes = vec![0u8; len as usize];
        self.reader
            .read_exact(&mut bytes)
            .map_err(|e| BuildError::io(&self.path, e))?;
        self.offset += len;
        Ok(bytes)
    }
}

/// Statistics from verifying one run file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Records in the file
    pub records: u64,
    /// Total added ids across all records
    pub added_ids: u64,
    /// Total removed ids across all records
    pub removed_ids: u64,
}

/// Checks a run file's ordering contract: strictly ascending keys, and
/// strictly ascending id runs within each record.
pub fn verify_run_file(path: &Path, replace_mode: bool) -> BuildResult<RunStats> {
    let mut reader = RunReader::open(path, replace_mode)?;
    let mut stats = RunStats::default();
    let mut previous_key: Option<Vec<u8>> = None;

    while let Some(record) = reader.read_next()? {
        if let Some(prev) = &previous_key {
            if record.key.as_slice() <= prev.as_slice() {
                return Err(BuildError::corrupt(
                    path,
                    0,
                    format!("keys out of order after record {}", stats.records),
                ));
            }
        }
        verify_id_run(path, &record.key, "added", &record.added)?;
        stats.added_ids += record.added_count() as u64;
        if let Some(removed) = &record.removed {
            verify_id_run(path, &record.key, "removed", removed)?;
            stats.removed_ids += record.removed_count() as u64;
        }
        previous_key = Some(record.key);
        stats.records += 1;
    }
    Ok(stats)
}

fn verify_id_run(path: &Path, key: &[u8], section: &str, run: &[u8]) -> BuildResult<()> {
    let mut previous: Option<u64> = None;
    for chunk in run.chunks_exact(8) {
        let id = u64::from_be_bytes(chunk.try_into().expect("chunk is 8 bytes"));
        if let Some(prev) = previous {
            if id <= prev {
                return Err(BuildError::corrupt(
                    path,
                    0,
                    format!("{} ids out of order for key of {} bytes", section, key.len()),
                ));
            }
        }
        previous = Some(id);
    }
    Ok(())
}
