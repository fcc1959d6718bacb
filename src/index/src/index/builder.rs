use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;

use common_base::reader::RecordReader;
use common_base::record::{Record, RecordTime, RecordType, MAX_RECORD_TYPES};
use tracing::{debug, info};

use crate::index::error::{IndexError, Result};
use crate::index::header;
use crate::index::progress::{ProgressPhase, ProgressReporter};
use crate::index::scratch::ScratchStream;
use crate::index::{IndexRecord, TypeDirectory, RESERVED_SIZE, SCALE_FACTOR_SLOT};

/// TimeExtractor picks which embedded timestamp represents a record in
/// the index. Types without one are not indexed.
type TimeExtractor = fn(&Record) -> Option<RecordTime>;

/// The dispatch table from record type to indexed timestamp. The file
/// header is deliberately absent: it produces no index entries.
const TIME_EXTRACTORS: [(RecordType, TimeExtractor); 8] = [
    (RecordType::Ping, ping_time),
    (RecordType::VelocityProfile, velocity_profile_time),
    (RecordType::Parameters, parameters_time),
    (RecordType::Comment, comment_time),
    (RecordType::History, history_time),
    (RecordType::NavigationError, navigation_error_time),
    (RecordType::Summary, summary_time),
    (RecordType::Attitude, attitude_time),
];

pub(crate) fn time_extractor(typ: RecordType) -> Option<TimeExtractor> {
    TIME_EXTRACTORS
        .iter()
        .find(|(t, _)| *t == typ)
        .map(|(_, f)| *f)
}

fn ping_time(record: &Record) -> Option<RecordTime> {
    match record {
        Record::Ping(r) => Some(r.time),
        _ => None,
    }
}

fn velocity_profile_time(record: &Record) -> Option<RecordTime> {
    match record {
        Record::VelocityProfile(r) => Some(r.observation_time),
        _ => None,
    }
}

fn parameters_time(record: &Record) -> Option<RecordTime> {
    match record {
        Record::Parameters(r) => Some(r.time),
        _ => None,
    }
}

fn comment_time(record: &Record) -> Option<RecordTime> {
    match record {
        Record::Comment(r) => Some(r.time),
        _ => None,
    }
}

fn history_time(record: &Record) -> Option<RecordTime> {
    match record {
        Record::History(r) => Some(r.time),
        _ => None,
    }
}

fn navigation_error_time(record: &Record) -> Option<RecordTime> {
    match record {
        Record::NavigationError(r) => Some(r.time),
        _ => None,
    }
}

/// Summary entries take their seconds from the start time and their
/// nanoseconds from the end time. Existing index readers depend on this
/// pairing; keep it.
fn summary_time(record: &Record) -> Option<RecordTime> {
    match record {
        Record::Summary(r) => Some(RecordTime::new(
            r.start_time.seconds,
            r.end_time.nanoseconds,
        )),
        _ => None,
    }
}

fn attitude_time(record: &Record) -> Option<RecordTime> {
    match record {
        Record::Attitude(r) => Some(r.base_time),
        _ => None,
    }
}

/// Streams is the per-type staging table for one pass; slots open
/// lazily when the first entry is routed to them.
pub(crate) type Streams = [Option<ScratchStream>; MAX_RECORD_TYPES];

pub(crate) fn new_streams() -> Streams {
    std::array::from_fn(|_| None)
}

pub(crate) fn stream_for(streams: &mut Streams, code: usize) -> Result<&mut ScratchStream> {
    if streams[code].is_none() {
        streams[code] = Some(ScratchStream::open(code)?);
    }
    Ok(streams[code].as_mut().unwrap())
}

/// scan_source drives the sequential reader from its current position
/// to the end of the source file, staging one index entry per indexable
/// record, two for pings that embed scale factors.
pub(crate) fn scan_source<R: RecordReader>(
    reader: &mut R,
    streams: &mut Streams,
    source_size: u64,
    phase: ProgressPhase,
) -> Result<()> {
    let mut progress = ProgressReporter::new(phase);
    loop {
        let offset = reader.tell().map_err(IndexError::SourcePosition)?;
        progress.report(offset, source_size);

        let record = match reader.next_record().map_err(IndexError::Reader)? {
            Some(record) => record,
            None => break,
        };

        let typ = record.record_type();
        let extract = match time_extractor(typ) {
            Some(extract) => extract,
            None => continue,
        };
        let time = match extract(&record) {
            Some(time) => time,
            None => continue,
        };

        let entry = IndexRecord::new(time, offset as i64);
        stream_for(streams, typ.code() as usize)?.append(&entry)?;

        // A ping carrying embedded scale factors is indexed twice: under
        // its own type and under the reserved slot 0.
        if let Record::Ping(ping) = &record {
            if ping.has_scale_factors() {
                stream_for(streams, SCALE_FACTOR_SLOT)?.append(&entry)?;
            }
        }
    }
    Ok(())
}

/// write_index_file lays the staged streams out as the final index
/// file: fixed header, directory, then each type's packed entry array
/// in slot order. Directory slots start as zeroed placeholders and are
/// patched as each type's copy completes, so the written directory
/// carries no gaps.
pub(crate) fn write_index_file(
    fd: &mut File,
    streams: &mut Streams,
    swap: bool,
    source_size: u64,
    reserved: &[u8; RESERVED_SIZE],
) -> Result<TypeDirectory> {
    // The type count comes from the streams that actually hold entries,
    // not from a counter carried across phases.
    let type_count = streams
        .iter()
        .flatten()
        .filter(|stream| stream.count() > 0)
        .count() as i32;
    let total_records: i64 = streams.iter().flatten().map(|stream| stream.count()).sum();

    header::write_header(fd, source_size as i64, swap, type_count, reserved)?;

    let mut progress = ProgressReporter::new(ProgressPhase::Creating);
    let mut directory = TypeDirectory::new();
    let mut slot = 0_usize;
    let mut written = 0_i64;

    for code in 0..MAX_RECORD_TYPES {
        let mut stream = match streams[code].take() {
            Some(stream) if stream.count() > 0 => stream,
            Some(_) => continue,
            None => continue,
        };

        stream.rewind()?;
        let start_address = fd.stream_position()? as i64;
        while let Some(entry) = stream.read_next()? {
            entry.write_to(fd, swap)?;
            written += 1;
            progress.report(written as u64, total_records as u64);
        }

        let entry = crate::index::DirectoryEntry {
            start_address,
            record_count: stream.count(),
        };
        header::patch_directory_entry(fd, slot, code, &entry, swap)?;
        directory.set(code, entry);
        slot += 1;
        // The stream drops here and its scratch file is removed.
    }

    fd.sync_all()?;
    Ok(directory)
}

/// load_scale_table materializes every slot-0 entry in memory. Scale
/// factors are consulted on nearly every ping read, so the whole slot
/// is loaded eagerly instead of seeked per lookup.
pub(crate) fn load_scale_table(
    fd: &mut File,
    directory: &TypeDirectory,
    swap: bool,
) -> Result<Vec<IndexRecord>> {
    let entry = match directory.get(SCALE_FACTOR_SLOT) {
        Some(entry) if entry.record_count > 0 => entry,
        _ => return Ok(Vec::new()),
    };

    let count = entry.record_count as usize;
    let mut table = Vec::new();
    table
        .try_reserve_exact(count)
        .map_err(|_| IndexError::Allocation(count))?;

    fd.seek(SeekFrom::Start(entry.start_address as u64))?;
    for _ in 0..count {
        table.push(IndexRecord::read_from(fd, swap)?);
    }
    Ok(table)
}

/// build creates a fresh index for a source file by scanning it from
/// the reader's current position (the first record) to the end, then
/// writing the staged entries out to index_path.
pub(crate) fn build<R: RecordReader>(
    index_path: &Path,
    reader: &mut R,
    source_size: u64,
) -> Result<(File, TypeDirectory, Vec<IndexRecord>)> {
    debug!(path = %index_path.display(), source_size, "building index");

    let mut streams = new_streams();
    scan_source(reader, &mut streams, source_size, ProgressPhase::Scanning)?;

    let mut fd = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(index_path)
        .map_err(|source| IndexError::IndexFileOpen {
            path: index_path.to_owned(),
            source,
        })?;

    let directory = write_index_file(&mut fd, &mut streams, false, source_size, &[0; RESERVED_SIZE])?;
    let scale_factors = load_scale_table(&mut fd, &directory, false)?;

    info!(
        types = directory.type_count(),
        records = directory.total_records(),
        "index built"
    );
    Ok((fd, directory, scale_factors))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use common_base::reader::LogReader;
    use common_base::record::Record;

    use super::*;
    use crate::index::progress::{clear_progress_callback, register_progress_callback};
    use crate::index::testfiles::{comment, file_header, ping, summary, velocity_profile, write_log};

    fn indexed(fd: &mut File, directory: &TypeDirectory, code: usize) -> Vec<IndexRecord> {
        let entry = directory.get(code).unwrap();
        fd.seek(SeekFrom::Start(entry.start_address as u64)).unwrap();
        (0..entry.record_count)
            .map(|_| IndexRecord::read_from(fd, false).unwrap())
            .collect()
    }

    #[test]
    fn test_summary_timestamp_mixes_start_and_end() {
        let record = summary(RecordTime::new(100, 111), RecordTime::new(200, 999));
        let time = summary_time(&record).unwrap();
        assert_eq!(time, RecordTime::new(100, 999));
    }

    #[test]
    fn test_extractor_table_skips_file_header() {
        assert!(time_extractor(RecordType::FileHeader).is_none());
        assert!(time_extractor(RecordType::ScaleFactors).is_none());
        for typ in [
            RecordType::Ping,
            RecordType::VelocityProfile,
            RecordType::Parameters,
            RecordType::Comment,
            RecordType::History,
            RecordType::NavigationError,
            RecordType::Summary,
            RecordType::Attitude,
        ] {
            assert!(time_extractor(typ).is_some(), "{:?}", typ);
        }
    }

    #[test]
    fn test_build_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("survey.swl");
        let offsets = write_log(
            &source,
            &[
                file_header(),
                ping(100, 0, false),
                ping(101, 0, true),
                comment(102, "end of line 1"),
            ],
        );

        let mut reader = LogReader::open(&source).unwrap();
        let size = reader.file_size().unwrap();
        let (mut fd, directory, scale_factors) =
            build(&dir.path().join("survey.nwl"), &mut reader, size).unwrap();

        // Three populated slots: pings, comments, and the slot-0 fan-out
        // of the scale factor ping. The file header contributes nothing.
        assert_eq!(directory.type_count(), 3);
        assert!(directory.get(RecordType::FileHeader.code() as usize).is_none());

        let pings = indexed(&mut fd, &directory, RecordType::Ping.code() as usize);
        assert_eq!(
            pings,
            vec![
                IndexRecord::new(RecordTime::new(100, 0), offsets[1] as i64),
                IndexRecord::new(RecordTime::new(101, 0), offsets[2] as i64),
            ]
        );

        let comments = indexed(&mut fd, &directory, RecordType::Comment.code() as usize);
        assert_eq!(
            comments,
            vec![IndexRecord::new(RecordTime::new(102, 0), offsets[3] as i64)]
        );

        // The flagged ping appears exactly once in slot 0, with the same
        // timestamp and offset as its own entry.
        let slot0 = indexed(&mut fd, &directory, SCALE_FACTOR_SLOT);
        assert_eq!(
            slot0,
            vec![IndexRecord::new(RecordTime::new(101, 0), offsets[2] as i64)]
        );
        assert_eq!(scale_factors, slot0);
    }

    #[test]
    fn test_build_completeness() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("survey.swl");

        let mut records: Vec<Record> = vec![file_header()];
        let mut scale_factor_pings = 0_i64;
        for i in 0..40_i64 {
            let with_sf = i % 8 == 0;
            if with_sf {
                scale_factor_pings += 1;
            }
            records.push(ping(1000 + i, 0, with_sf));
        }
        records.push(velocity_profile(900));
        records.push(comment(1040, "post-line"));
        records.push(summary(RecordTime::new(1000, 0), RecordTime::new(1040, 500)));

        let offsets = write_log(&source, &records);

        let mut reader = LogReader::open(&source).unwrap();
        let size = reader.file_size().unwrap();
        let (mut fd, directory, _) =
            build(&dir.path().join("survey.nwl"), &mut reader, size).unwrap();

        // Every indexable record lands once, plus one extra slot-0 entry
        // per scale factor ping; the file header never lands.
        let indexable = records.len() as i64 - 1;
        assert_eq!(directory.total_records(), indexable + scale_factor_pings);

        // Every stored offset is the byte the record started at.
        for (code, _) in directory.iter() {
            for entry in indexed(&mut fd, &directory, code) {
                assert!(offsets.contains(&(entry.offset as u64)), "slot {}", code);
            }
        }
    }

    #[test]
    fn test_progress_each_value_once_and_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("survey.swl");

        let mut records = vec![file_header()];
        for i in 0..200_i64 {
            records.push(ping(2000 + i, 0, i % 16 == 0));
        }
        write_log(&source, &records);

        // The hook is process-wide and other tests may be mid-pass on
        // other threads; keep only events from this one.
        let events: Arc<Mutex<Vec<(ProgressPhase, i32)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let thread = std::thread::current().id();
        register_progress_callback(move |phase, percent| {
            if std::thread::current().id() == thread {
                sink.lock().unwrap().push((phase, percent));
            }
        });

        let mut reader = LogReader::open(&source).unwrap();
        let size = reader.file_size().unwrap();
        build(&dir.path().join("survey.nwl"), &mut reader, size).unwrap();
        clear_progress_callback();

        let events = events.lock().unwrap();
        for phase in [ProgressPhase::Scanning, ProgressPhase::Creating] {
            let percents: Vec<i32> = events
                .iter()
                .filter(|(p, _)| *p == phase)
                .map(|(_, percent)| *percent)
                .collect();
            assert!(!percents.is_empty(), "{:?}", phase);
            for pair in percents.windows(2) {
                assert!(pair[0] < pair[1], "{:?}: {:?}", phase, percents);
            }
            assert_eq!(*percents.last().unwrap(), 100);
        }
    }
}
