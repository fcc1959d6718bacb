use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::codec::{decode_record, RECORD_HEADER_SIZE};
use crate::record::{Record, RecordType};

/// RecordReader is the pull interface an index pass drives over a log
/// file. Implementations own the cursor; every call moves it.
pub trait RecordReader {
    /// next_record decodes the record at the current position and leaves
    /// the cursor after it. Ok(None) marks the expected terminal
    /// conditions, a clean end of file or an incomplete trailing record;
    /// anything else is a hard error.
    fn next_record(&mut self) -> anyhow::Result<Option<Record>>;

    /// read_nth reads the nth (1-based) record of a type from anywhere
    /// in the file and leaves the cursor one record past it.
    fn read_nth(&mut self, typ: RecordType, n: i64) -> anyhow::Result<Record>;

    /// tell reports the byte offset of the next record to be read.
    fn tell(&mut self) -> anyhow::Result<u64>;
}

/// LogReader reads a log file with plain blocking I/O.
pub struct LogReader {
    file: File,
    path: PathBuf,
}

impl LogReader {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path)
            .map_err(|e| anyhow!("open log file {}: {}", path.display(), e))?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> anyhow::Result<u64> {
        let meta = self.file.metadata().map_err(|e| anyhow!(e))?;
        Ok(meta.len())
    }

    /// read_at decodes the record starting at an absolute byte offset,
    /// as recorded in an index entry.
    pub fn read_at(&mut self, offset: u64) -> anyhow::Result<Record> {
        self.file.seek(SeekFrom::Start(offset))?;
        match self.next_record()? {
            Some(record) => Ok(record),
            None => Err(anyhow!("no record at offset {}", offset)),
        }
    }
}

impl RecordReader for LogReader {
    fn next_record(&mut self) -> anyhow::Result<Option<Record>> {
        let mut header = [0_u8; RECORD_HEADER_SIZE];
        match self.file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(anyhow!("read record header: {}", e)),
        }

        let code = u32::from_be_bytes(header[..4].try_into().unwrap());
        let len = u32::from_be_bytes(header[4..].try_into().unwrap()) as usize;

        let mut payload = vec![0_u8; len];
        match self.file.read_exact(&mut payload) {
            Ok(()) => {}
            // A record cut off by the end of the file is the expected
            // shape of a log caught mid-write, not an error.
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(anyhow!("read record payload: {}", e)),
        }

        let record = decode_record(code, &payload)?;
        Ok(Some(record))
    }

    fn read_nth(&mut self, typ: RecordType, n: i64) -> anyhow::Result<Record> {
        if n < 1 {
            return Err(anyhow!("record numbers are 1-based, got {}", n));
        }

        self.file.seek(SeekFrom::Start(0))?;
        let mut seen = 0_i64;
        while let Some(record) = self.next_record()? {
            if record.record_type() == typ {
                seen += 1;
                if seen == n {
                    return Ok(record);
                }
            }
        }

        Err(anyhow!(
            "record {} of type {} not found in {}",
            n,
            typ.name(),
            self.path.display()
        ))
    }

    fn tell(&mut self) -> anyhow::Result<u64> {
        self.file.stream_position().map_err(|e| anyhow!(e))
    }
}
