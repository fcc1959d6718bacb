use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::encode_record;
use crate::record::Record;

/// LogWriter appends framed records to a log file.
pub struct LogWriter {
    file: File,
    path: PathBuf,
}

impl LogWriter {
    /// create starts a new log file, truncating anything already there.
    pub fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_owned();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| anyhow!("create log file {}: {}", path.display(), e))?;
        Ok(Self { file, path })
    }

    /// open_append resumes writing at the end of an existing log file.
    pub fn open_append(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_owned();
        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| anyhow!("open log file {}: {}", path.display(), e))?;
        file.seek(SeekFrom::End(0))?;
        Ok(Self { file, path })
    }

    /// append writes one record and returns the byte offset it starts at.
    pub fn append(&mut self, record: &Record) -> anyhow::Result<u64> {
        let offset = self.file.stream_position()?;
        let buf = encode_record(record);
        self.file.write_all(&buf)?;
        Ok(offset)
    }

    pub fn sync(&mut self) -> anyhow::Result<()> {
        self.file.flush()?;
        self.file.sync_all().map_err(|e| anyhow!(e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
