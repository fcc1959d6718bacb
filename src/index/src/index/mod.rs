pub mod error;
pub mod opener;
pub mod progress;

mod appender;
mod builder;
mod header;
mod scratch;
mod swap;

use std::fmt::{Display, Formatter};
use std::io::{self, Read, Write};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use common_base::record::{RecordTime, MAX_RECORD_TYPES};

/// VERSION_TAG is written as the first 16 bytes of an index file and is
/// the authority on whether the rest of the file is trustworthy.
pub const VERSION_TAG: [u8; 16] = *b"INDEX-SWL-01.00\0";

/// VERSION_PREFIX is the part of the tag that decides whether a file is
/// an index this code understands at all.
pub const VERSION_PREFIX: &[u8] = b"INDEX-SWL-";

/// The endian tag as written by the index creator, and the bit pattern
/// it reads back as on a host of the opposite byte order. There is no
/// third valid value.
pub const ENDIAN_NATIVE: u32 = 0x0001_0203;
pub const ENDIAN_SWAPPED: u32 = 0x0302_0100;

/// Fixed header span before the directory: version tag, source file
/// size, endian tag, type count, reserved bytes.
pub const HEADER_SIZE: u64 = 44;

/// Reserved bytes between the type count and the directory, carried
/// verbatim for future layout growth.
pub const RESERVED_SIZE: usize = 16;

/// One directory triple: type code, start address, record count.
pub const DIRECTORY_ENTRY_SIZE: u64 = 12;

/// One packed index entry: 8-byte seconds, 4-byte nanoseconds, 4-byte
/// source offset.
pub const INDEX_RECORD_SIZE: u64 = 16;

/// Directory slot holding the scale factor entries
/// (RecordType::ScaleFactors).
pub const SCALE_FACTOR_SLOT: usize = 0;

/// IndexRecord is one index entry: the timestamp of a source record and
/// the byte offset it starts at. On disk it is 16 bytes in the index
/// file's declared byte order; offsets are stored as 32-bit words, which
/// bounds indexed source files to 2 GiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub time: RecordTime,
    pub offset: i64,
}

impl IndexRecord {
    pub fn new(time: RecordTime, offset: i64) -> Self {
        Self { time, offset }
    }

    /// write_to encodes the entry in host byte order, reversing each
    /// field when the destination file's declared order is foreign.
    pub fn write_to<W: Write>(&self, w: &mut W, swap: bool) -> io::Result<()> {
        let mut seconds = self.time.seconds as u64;
        let mut nanoseconds = self.time.nanoseconds as u32;
        let mut offset = self.offset as u32;
        if swap {
            seconds = seconds.swap_bytes();
            nanoseconds = nanoseconds.swap_bytes();
            offset = offset.swap_bytes();
        }
        w.write_u64::<NativeEndian>(seconds)?;
        w.write_u32::<NativeEndian>(nanoseconds)?;
        w.write_u32::<NativeEndian>(offset)
    }

    pub fn read_from<R: Read>(r: &mut R, swap: bool) -> io::Result<Self> {
        let mut seconds = r.read_u64::<NativeEndian>()?;
        let mut nanoseconds = r.read_u32::<NativeEndian>()?;
        let mut offset = r.read_u32::<NativeEndian>()?;
        if swap {
            seconds = seconds.swap_bytes();
            nanoseconds = nanoseconds.swap_bytes();
            offset = offset.swap_bytes();
        }
        Ok(Self {
            time: RecordTime::new(seconds as i64, nanoseconds as i32),
            offset: offset as i64,
        })
    }
}

impl Display for IndexRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "t={} ofs={}", self.time, self.offset)
    }
}

/// DirectoryEntry locates one type's packed entry array in the index
/// file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub start_address: i64,
    pub record_count: i64,
}

/// TypeDirectory is the in-memory directory. The record type code
/// doubles as the slot number, so the stored order of the on-disk
/// triples never matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDirectory {
    slots: [Option<DirectoryEntry>; MAX_RECORD_TYPES],
}

impl TypeDirectory {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_RECORD_TYPES],
        }
    }

    pub fn set(&mut self, code: usize, entry: DirectoryEntry) {
        self.slots[code] = Some(entry);
    }

    pub fn get(&self, code: usize) -> Option<DirectoryEntry> {
        self.slots.get(code).copied().flatten()
    }

    /// type_count is the number of populated slots.
    pub fn type_count(&self) -> i32 {
        self.slots.iter().flatten().count() as i32
    }

    pub fn total_records(&self) -> i64 {
        self.slots.iter().flatten().map(|e| e.record_count).sum()
    }

    /// iter yields (type code, entry) for every populated slot, in slot
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, DirectoryEntry)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(code, slot)| slot.map(|e| (code, e)))
    }
}

impl Default for TypeDirectory {
    fn default() -> Self {
        Self::new()
    }
}
