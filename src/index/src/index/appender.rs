use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;

use common_base::reader::RecordReader;
use common_base::record::RecordType;
use tracing::{debug, info};

use crate::index::builder::{
    load_scale_table, new_streams, scan_source, stream_for, write_index_file,
};
use crate::index::error::{IndexError, Result};
use crate::index::header::IndexHeader;
use crate::index::progress::ProgressPhase;
use crate::index::{IndexRecord, TypeDirectory, SCALE_FACTOR_SLOT};

/// append extends an existing index whose source file has grown. The
/// old entries are re-staged through fresh scratch streams, the reader
/// is repositioned one record past the last indexed one, and the scan
/// continues from there. The index file is then rewritten whole, never
/// patched in place, and keeps the byte order it was first created
/// with, even on a host of the opposite order.
pub(crate) fn append<R: RecordReader>(
    index_path: &Path,
    mut fd: File,
    header: IndexHeader,
    reader: &mut R,
    source_size: u64,
) -> Result<(File, TypeDirectory, Vec<IndexRecord>)> {
    let swap = header.swap;
    debug!(
        path = %index_path.display(),
        stored = header.source_file_size,
        current = source_size,
        "appending to index"
    );

    // Re-stage every existing entry, swapped to native order, tracking
    // the entry that starts furthest into the source file. Slot 0 is
    // left out of the tracking: its entries alias ping records.
    let mut streams = new_streams();
    let mut last: Option<(usize, i64, i64)> = None;
    for (code, dir_entry) in header.directory.iter() {
        if dir_entry.record_count == 0 {
            continue;
        }
        fd.seek(SeekFrom::Start(dir_entry.start_address as u64))?;
        let stream = stream_for(&mut streams, code)?;
        for ordinal in 1..=dir_entry.record_count {
            let record = IndexRecord::read_from(&mut fd, swap)?;
            stream.append(&record)?;
            if code != SCALE_FACTOR_SLOT
                && last.map_or(true, |(_, _, offset)| record.offset > offset)
            {
                last = Some((code, ordinal, record.offset));
            }
        }
    }

    let staged = load_scale_table(&mut fd, &header.directory, swap)?;
    debug!(entries = staged.len(), "existing scale factor table staged");

    // The reader's internal scale factor state must be current before
    // any newly appended ping is decoded: re-read the latest ping, then
    // the true last record when it is of another type. This also leaves
    // the cursor one record past the last indexed one.
    let ping_count = header
        .directory
        .get(RecordType::Ping.code() as usize)
        .map_or(0, |entry| entry.record_count);
    if ping_count > 0 {
        reader
            .read_nth(RecordType::Ping, ping_count)
            .map_err(IndexError::Reader)?;
    }
    if let Some((code, ordinal, _)) = last {
        if code != RecordType::Ping.code() as usize {
            let typ = RecordType::from_code(code as u32)
                .ok_or(IndexError::Corrupt("directory type code out of range"))?;
            reader.read_nth(typ, ordinal).map_err(IndexError::Reader)?;
        }
    }

    scan_source(reader, &mut streams, source_size, ProgressPhase::Appending)?;

    // The directory load held the file read-only; the rewrite needs a
    // fresh writable handle.
    drop(fd);
    let mut fd = OpenOptions::new()
        .read(true)
        .write(true)
        .truncate(true)
        .open(index_path)
        .map_err(|source| IndexError::IndexFileOpen {
            path: index_path.to_owned(),
            source,
        })?;

    let directory = write_index_file(&mut fd, &mut streams, swap, source_size, &header.reserved)?;
    let scale_factors = load_scale_table(&mut fd, &directory, swap)?;

    info!(
        types = directory.type_count(),
        records = directory.total_records(),
        "index appended"
    );
    Ok((fd, directory, scale_factors))
}
