use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::index::error::{IndexError, Result};
use crate::index::IndexRecord;

/// SCRATCH_DIR_VAR overrides where per-type staging files are created.
pub const SCRATCH_DIR_VAR: &str = "SWL_TMPDIR";

/// Per-process stream counter folded into scratch file names, so that
/// two passes in one process never collide on a type code.
static NEXT_STREAM: AtomicU64 = AtomicU64::new(0);

/// scratch_dir resolves the staging directory: $SWL_TMPDIR when set,
/// the platform temp directory otherwise.
fn scratch_dir() -> PathBuf {
    match env::var_os(SCRATCH_DIR_VAR) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => env::temp_dir(),
    }
}

/// ScratchStream stages index entries for one record type while a build
/// or append pass runs. The backing file is deleted when the stream is
/// dropped, on success and failure paths alike. A killed process leaks
/// the file; there is no recovery sweep.
pub(crate) struct ScratchStream {
    file: File,
    path: PathBuf,
    count: i64,
}

impl ScratchStream {
    /// open creates the staging file for a record type, named by process
    /// id, a per-process sequence number and the type code.
    pub fn open(type_code: usize) -> Result<Self> {
        let seq = NEXT_STREAM.fetch_add(1, Ordering::Relaxed);
        let path = scratch_dir().join(format!(
            "{:08}-{:04}{:02}.ndx",
            std::process::id(),
            seq,
            type_code
        ));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| IndexError::ScratchFileOpen {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            file,
            path,
            count: 0,
        })
    }

    /// append writes one entry, in native byte order, at the write
    /// position.
    pub fn append(&mut self, record: &IndexRecord) -> Result<()> {
        record.write_to(&mut self.file, false)?;
        self.count += 1;
        Ok(())
    }

    /// rewind resets the stream to its first entry.
    pub fn rewind(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// read_next returns the entry at the read position, or None past
    /// the end of the staged data.
    pub fn read_next(&mut self) -> Result<Option<IndexRecord>> {
        match IndexRecord::read_from(&mut self.file, false) {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for ScratchStream {
    fn drop(&mut self) {
        // The backing file must not outlive the pass.
        let _ = fs::remove_file(&self.path);
    }
}
