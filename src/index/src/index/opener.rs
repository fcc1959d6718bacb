use std::fs::{self, File};
use std::io::{ErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use common_base::reader::RecordReader;
use common_base::record::{RecordTime, RecordType};
use tracing::{debug, warn};

use crate::index::error::{IndexError, Result};
use crate::index::{appender, builder, header};
use crate::index::{DirectoryEntry, IndexRecord, TypeDirectory, INDEX_RECORD_SIZE, SCALE_FACTOR_SLOT};

/// index_file_path derives the index path from the source path: the
/// first letter of the extension becomes 'n' (`survey.swl` becomes
/// `survey.nwl`).
pub(crate) fn index_file_path(source: &Path) -> PathBuf {
    match source.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => {
            let mut indexed = String::with_capacity(ext.len());
            indexed.push('n');
            indexed.extend(ext.chars().skip(1));
            source.with_extension(indexed)
        }
        _ => source.with_extension("nwl"),
    }
}

/// FileIndex is the opened, in-memory view of one source file's index:
/// the per-type directory, an open handle on the index file, and the
/// eagerly loaded scale factor table.
pub struct FileIndex {
    path: PathBuf,
    fd: File,
    swap: bool,
    source_file_size: i64,
    directory: TypeDirectory,
    scale_factors: Vec<IndexRecord>,
    last_scale_factor_index: i64,
}

impl FileIndex {
    /// open readies the index for a source file, choosing between using
    /// the existing index as-is, extending it, and rebuilding it, based
    /// on the stored header and how the source file size moved since
    /// the index was written.
    ///
    /// The reader must be positioned at the first record; a build pass
    /// consumes it from there, an append pass repositions it itself.
    pub fn open<R: RecordReader>(
        source_path: impl AsRef<Path>,
        reader: &mut R,
        source_size: u64,
    ) -> Result<Self> {
        let index_path = index_file_path(source_path.as_ref());

        let mut fd = match File::open(&index_path) {
            Ok(fd) => fd,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %index_path.display(), "no index file, building");
                let parts = builder::build(&index_path, reader, source_size)?;
                return Ok(Self::from_parts(index_path, false, source_size as i64, parts));
            }
            Err(source) => {
                return Err(IndexError::IndexFileOpen {
                    path: index_path,
                    source,
                })
            }
        };

        let header = match header::read_header(&mut fd) {
            Ok(header) => header,
            Err(IndexError::UnrecognizedVersion) => {
                // A stale or foreign-format file is safe to regenerate;
                // anything corrupt past a recognized tag is not, and
                // propagates instead.
                debug!(path = %index_path.display(), "unrecognized index version, rebuilding");
                drop(fd);
                let parts = builder::build(&index_path, reader, source_size)?;
                return Ok(Self::from_parts(index_path, false, source_size as i64, parts));
            }
            Err(e) => return Err(e),
        };

        if header.source_file_size < source_size as i64 {
            let swap = header.swap;
            let parts = appender::append(&index_path, fd, header, reader, source_size)?;
            return Ok(Self::from_parts(index_path, swap, source_size as i64, parts));
        }

        if header.source_file_size > source_size as i64 {
            // The source shrank since indexing: stored offsets may point
            // past the new end of file, so the index cannot be trusted
            // or extended.
            warn!(
                path = %index_path.display(),
                stored = header.source_file_size,
                current = source_size,
                "source file shrank, discarding index and rebuilding"
            );
            drop(fd);
            fs::remove_file(&index_path)?;
            let parts = builder::build(&index_path, reader, source_size)?;
            return Ok(Self::from_parts(index_path, false, source_size as i64, parts));
        }

        // Stored and current sizes agree; the index is already current
        // and only the in-memory state needs populating.
        debug!(
            path = %index_path.display(),
            types = header.directory.type_count(),
            "index already current"
        );
        let scale_factors = builder::load_scale_table(&mut fd, &header.directory, header.swap)?;
        Ok(Self {
            path: index_path,
            fd,
            swap: header.swap,
            source_file_size: header.source_file_size,
            directory: header.directory,
            scale_factors,
            last_scale_factor_index: -1,
        })
    }

    fn from_parts(
        path: PathBuf,
        swap: bool,
        source_file_size: i64,
        parts: (File, TypeDirectory, Vec<IndexRecord>),
    ) -> Self {
        let (fd, directory, scale_factors) = parts;
        Self {
            path,
            fd,
            swap,
            source_file_size,
            directory,
            scale_factors,
            last_scale_factor_index: -1,
        }
    }

    /// record_count returns how many index entries a type has.
    pub fn record_count(&self, typ: RecordType) -> i64 {
        self.directory
            .get(typ.code() as usize)
            .map_or(0, |entry| entry.record_count)
    }

    /// types yields (type code, entry count) for every populated slot.
    pub fn types(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.directory
            .iter()
            .map(|(code, entry)| (code, entry.record_count))
    }

    /// entry reads the nth (1-based) index entry of a type. Slot 0 is
    /// answered from the in-memory scale factor table.
    pub fn entry(&mut self, typ: RecordType, n: i64) -> Result<IndexRecord> {
        let code = typ.code() as usize;
        let dir_entry = self
            .directory
            .get(code)
            .filter(|entry| n >= 1 && n <= entry.record_count)
            .ok_or(IndexError::EntryOutOfRange { type_code: code, n })?;

        if code == SCALE_FACTOR_SLOT {
            return Ok(self.scale_factors[(n - 1) as usize]);
        }

        self.fd.seek(SeekFrom::Start(
            dir_entry.start_address as u64 + (n as u64 - 1) * INDEX_RECORD_SIZE,
        ))?;
        Ok(IndexRecord::read_from(&mut self.fd, self.swap)?)
    }

    /// scale_factor_for returns the most recent scale factor entry at or
    /// before a time. Lookups tend to move forward through a file, so
    /// the match position of the previous call seeds the next search; a
    /// lookup earlier than that rescans from the front.
    pub fn scale_factor_for(&mut self, time: RecordTime) -> Option<IndexRecord> {
        if self.scale_factors.is_empty() || time < self.scale_factors[0].time {
            return None;
        }

        let mut i = if self.last_scale_factor_index >= 0 {
            self.last_scale_factor_index as usize
        } else {
            0
        };
        if self.scale_factors[i].time > time {
            i = 0;
        }
        while i + 1 < self.scale_factors.len() && self.scale_factors[i + 1].time <= time {
            i += 1;
        }

        self.last_scale_factor_index = i as i64;
        Some(self.scale_factors[i])
    }

    /// swap_required reports whether stored entries are byte-reversed
    /// relative to this host. Fixed at open time; appends never change
    /// the file's declared order.
    pub fn swap_required(&self) -> bool {
        self.swap
    }

    /// source_file_size is the size the source file had when the index
    /// was last brought up to date.
    pub fn source_file_size(&self) -> i64 {
        self.source_file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// directory_entry returns a type's raw directory triple.
    pub fn directory_entry(&self, typ: RecordType) -> Option<DirectoryEntry> {
        self.directory.get(typ.code() as usize)
    }
}
