use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// IndexError enumerates the failure kinds surfaced by index open,
/// build and append operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The file exists but does not carry a recognized index version
    /// tag. Open treats this as safe to regenerate, never as corruption.
    #[error("not a recognized index file")]
    UnrecognizedVersion,

    /// The header carries a recognized tag but fails validation. Never
    /// silently rebuilt; the operator should be told.
    #[error("corrupt index file: {0}")]
    Corrupt(&'static str),

    #[error("cannot create scratch file {path}: {source}")]
    ScratchFileOpen { path: PathBuf, source: io::Error },

    #[error("cannot open index file {path}: {source}")]
    IndexFileOpen { path: PathBuf, source: io::Error },

    /// The in-memory scale factor table could not be reserved.
    #[error("cannot allocate scale factor table of {0} entries")]
    Allocation(usize),

    /// tell or seek failed on the source data file mid-scan.
    #[error("lost position in source file: {0}")]
    SourcePosition(anyhow::Error),

    /// No entry with that ordinal exists for the record type.
    #[error("no entry {n} for record type {type_code}")]
    EntryOutOfRange { type_code: usize, n: i64 },

    /// I/O failure on the index file or a scratch stream.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Error surfaced by the sequential record reader.
    #[error(transparent)]
    Reader(anyhow::Error),
}
