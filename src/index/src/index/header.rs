use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use bytes::{BufMut, BytesMut};
use common_base::record::MAX_RECORD_TYPES;

use crate::index::error::{IndexError, Result};
use crate::index::swap::{swap32, swap_i32, swap_u32};
use crate::index::{
    DirectoryEntry, TypeDirectory, DIRECTORY_ENTRY_SIZE, ENDIAN_NATIVE, ENDIAN_SWAPPED,
    HEADER_SIZE, RESERVED_SIZE, VERSION_PREFIX, VERSION_TAG,
};

/// IndexHeader is the decoded file-level metadata of an index file.
#[derive(Debug)]
pub(crate) struct IndexHeader {
    pub source_file_size: i64,
    pub swap: bool,
    pub reserved: [u8; RESERVED_SIZE],
    pub directory: TypeDirectory,
}

/// read_header decodes and validates the header and directory of an
/// index file, leaving the cursor past the last directory triple.
///
/// A missing or foreign version tag is UnrecognizedVersion, the signal
/// that the file is safe to regenerate. Validation failures past a
/// recognized tag are Corrupt and are never silently rebuilt.
pub(crate) fn read_header(fd: &mut File) -> Result<IndexHeader> {
    fd.seek(SeekFrom::Start(0))?;

    let mut tag = [0_u8; VERSION_TAG.len()];
    match fd.read_exact(&mut tag) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(IndexError::UnrecognizedVersion)
        }
        Err(e) => return Err(e.into()),
    }
    if tag.iter().all(|b| *b == 0) || !tag.starts_with(VERSION_PREFIX) {
        return Err(IndexError::UnrecognizedVersion);
    }

    // The size and the endian tag are read in the raw stored order; the
    // tag then decides whether every numeric field, this size included,
    // gets byte-reversed after the fact.
    let mut source_file_size = fd.read_i32::<NativeEndian>()?;
    let endian_tag = fd.read_u32::<NativeEndian>()?;
    let swap = match endian_tag {
        ENDIAN_NATIVE => false,
        ENDIAN_SWAPPED => true,
        _ => return Err(IndexError::Corrupt("unknown endian tag")),
    };
    source_file_size = swap_i32(source_file_size, swap);

    let type_count = swap_i32(fd.read_i32::<NativeEndian>()?, swap);
    if type_count < 1 || type_count as usize > MAX_RECORD_TYPES {
        return Err(IndexError::Corrupt("record type count out of range"));
    }

    let mut reserved = [0_u8; RESERVED_SIZE];
    fd.read_exact(&mut reserved)?;

    let mut directory = TypeDirectory::new();
    for _ in 0..type_count {
        let mut triple = [0_u32; 3];
        fd.read_u32_into::<NativeEndian>(&mut triple)?;
        if swap {
            swap32(&mut triple);
        }

        let code = triple[0] as i32;
        if code < 0 || code as usize >= MAX_RECORD_TYPES {
            return Err(IndexError::Corrupt("directory type code out of range"));
        }
        let record_count = triple[2] as i32;
        if record_count < 0 {
            return Err(IndexError::Corrupt("negative directory record count"));
        }

        directory.set(
            code as usize,
            DirectoryEntry {
                start_address: triple[1] as i32 as i64,
                record_count: record_count as i64,
            },
        );
    }

    Ok(IndexHeader {
        source_file_size: source_file_size as i64,
        swap,
        reserved,
        directory,
    })
}

/// write_header lays down the fixed header and a zeroed directory
/// skeleton of type_count triples, starting at offset 0. Fields are
/// produced in host order; when `swap` is set each numeric field is
/// byte-reversed so the file keeps the order it was first created in.
pub(crate) fn write_header(
    fd: &mut File,
    source_file_size: i64,
    swap: bool,
    type_count: i32,
    reserved: &[u8; RESERVED_SIZE],
) -> Result<()> {
    let directory_len = type_count as usize * DIRECTORY_ENTRY_SIZE as usize;
    let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize + directory_len);
    buf.put_slice(&VERSION_TAG);
    buf.put_i32_ne(swap_i32(source_file_size as i32, swap));
    buf.put_u32_ne(swap_u32(ENDIAN_NATIVE, swap));
    buf.put_i32_ne(swap_i32(type_count, swap));
    buf.put_slice(reserved);
    buf.put_bytes(0, directory_len);

    fd.seek(SeekFrom::Start(0))?;
    fd.write_all(&buf)?;
    Ok(())
}

/// patch_directory_entry overwrites directory slot `slot` with the final
/// location of one type's entry array, then restores the write position.
pub(crate) fn patch_directory_entry(
    fd: &mut File,
    slot: usize,
    type_code: usize,
    entry: &DirectoryEntry,
    swap: bool,
) -> Result<()> {
    let pos = fd.stream_position()?;
    fd.seek(SeekFrom::Start(
        HEADER_SIZE + slot as u64 * DIRECTORY_ENTRY_SIZE,
    ))?;

    let mut triple = [
        type_code as u32,
        entry.start_address as u32,
        entry.record_count as u32,
    ];
    if swap {
        swap32(&mut triple);
    }
    for word in triple {
        fd.write_u32::<NativeEndian>(word)?;
    }

    fd.seek(SeekFrom::Start(pos))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_fd() -> File {
        tempfile::tempfile().unwrap()
    }

    fn entry(start_address: i64, record_count: i64) -> DirectoryEntry {
        DirectoryEntry {
            start_address,
            record_count,
        }
    }

    #[test]
    fn test_round_trip_native() {
        let mut fd = scratch_fd();
        let reserved = [7_u8; RESERVED_SIZE];

        write_header(&mut fd, 4096, false, 2, &reserved).unwrap();
        fd.seek(SeekFrom::End(0)).unwrap();
        patch_directory_entry(&mut fd, 0, 0, &entry(68, 3), false).unwrap();
        patch_directory_entry(&mut fd, 1, 2, &entry(116, 9), false).unwrap();

        let header = read_header(&mut fd).unwrap();
        assert_eq!(header.source_file_size, 4096);
        assert!(!header.swap);
        assert_eq!(header.reserved, reserved);
        assert_eq!(header.directory.type_count(), 2);
        assert_eq!(header.directory.get(0), Some(entry(68, 3)));
        assert_eq!(header.directory.get(2), Some(entry(116, 9)));
    }

    #[test]
    fn test_round_trip_foreign_order() {
        let mut fd = scratch_fd();

        // Written as a foreign-endian creator would have: every numeric
        // field byte-reversed relative to this host.
        write_header(&mut fd, 2048, true, 1, &[0; RESERVED_SIZE]).unwrap();
        fd.seek(SeekFrom::End(0)).unwrap();
        patch_directory_entry(&mut fd, 0, 2, &entry(56, 4), true).unwrap();

        let header = read_header(&mut fd).unwrap();
        assert!(header.swap);
        assert_eq!(header.source_file_size, 2048);
        assert_eq!(header.directory.get(2), Some(entry(56, 4)));
    }

    #[test]
    fn test_directory_read_in_any_stored_order() {
        let mut fd = scratch_fd();

        write_header(&mut fd, 999, false, 3, &[0; RESERVED_SIZE]).unwrap();
        fd.seek(SeekFrom::End(0)).unwrap();
        // Stored high-to-low; the reader scatters by type code.
        patch_directory_entry(&mut fd, 0, 8, &entry(300, 1), false).unwrap();
        patch_directory_entry(&mut fd, 1, 5, &entry(200, 2), false).unwrap();
        patch_directory_entry(&mut fd, 2, 0, &entry(80, 6), false).unwrap();

        let header = read_header(&mut fd).unwrap();
        assert_eq!(header.directory.get(0), Some(entry(80, 6)));
        assert_eq!(header.directory.get(5), Some(entry(200, 2)));
        assert_eq!(header.directory.get(8), Some(entry(300, 1)));
    }

    #[test]
    fn test_round_trip_generated_directories() {
        use rand::prelude::*;

        let mut rng = StdRng::seed_from_u64(0x5717);
        for _ in 0..50 {
            let swap = rng.gen_bool(0.5);
            let source_file_size = rng.gen_range(44..i32::MAX as i64);
            let reserved: [u8; RESERVED_SIZE] = rng.gen();

            let mut codes: Vec<usize> = (0..MAX_RECORD_TYPES).collect();
            codes.shuffle(&mut rng);
            codes.truncate(rng.gen_range(1..=MAX_RECORD_TYPES));

            let mut fd = scratch_fd();
            write_header(&mut fd, source_file_size, swap, codes.len() as i32, &reserved).unwrap();
            fd.seek(SeekFrom::End(0)).unwrap();

            let mut expected = TypeDirectory::new();
            for (slot, code) in codes.iter().enumerate() {
                let e = entry(rng.gen_range(0..i32::MAX as i64), rng.gen_range(1..10_000));
                patch_directory_entry(&mut fd, slot, *code, &e, swap).unwrap();
                expected.set(*code, e);
            }

            let header = read_header(&mut fd).unwrap();
            assert_eq!(header.swap, swap);
            assert_eq!(header.source_file_size, source_file_size);
            assert_eq!(header.reserved, reserved);
            assert_eq!(header.directory, expected);
        }
    }

    #[test]
    fn test_unrecognized_version() {
        // All-zero tag.
        let mut fd = scratch_fd();
        fd.write_all(&[0_u8; 64]).unwrap();
        assert!(matches!(
            read_header(&mut fd),
            Err(IndexError::UnrecognizedVersion)
        ));

        // Foreign magic.
        let mut fd = scratch_fd();
        fd.write_all(b"INDEX-XYZ-01.00\0").unwrap();
        fd.write_all(&[0_u8; 48]).unwrap();
        assert!(matches!(
            read_header(&mut fd),
            Err(IndexError::UnrecognizedVersion)
        ));

        // Too short to hold a tag at all.
        let mut fd = scratch_fd();
        fd.write_all(b"INDEX").unwrap();
        assert!(matches!(
            read_header(&mut fd),
            Err(IndexError::UnrecognizedVersion)
        ));
    }

    #[test]
    fn test_corrupt_endian_tag() {
        let mut fd = scratch_fd();
        fd.write_all(&VERSION_TAG).unwrap();
        fd.write_all(&1000_i32.to_ne_bytes()).unwrap();
        fd.write_all(&0xDEAD_BEEF_u32.to_ne_bytes()).unwrap();
        fd.write_all(&[0_u8; 32]).unwrap();

        assert!(matches!(
            read_header(&mut fd),
            Err(IndexError::Corrupt("unknown endian tag"))
        ));
    }

    #[test]
    fn test_corrupt_type_count() {
        // Zero and MAX+1 are both rejected before any directory triple
        // is read: the headers below carry no directory at all, so a
        // reader that got that far would fail differently.
        for bad_count in [0_i32, MAX_RECORD_TYPES as i32 + 1] {
            let mut fd = scratch_fd();
            write_header(&mut fd, 1000, false, 0, &[0; RESERVED_SIZE]).unwrap();
            fd.seek(SeekFrom::Start(24)).unwrap();
            fd.write_all(&bad_count.to_ne_bytes()).unwrap();

            assert!(matches!(
                read_header(&mut fd),
                Err(IndexError::Corrupt("record type count out of range"))
            ));
        }
    }

    #[test]
    fn test_corrupt_directory_type_code() {
        let mut fd = scratch_fd();
        write_header(&mut fd, 1000, false, 1, &[0; RESERVED_SIZE]).unwrap();
        fd.seek(SeekFrom::End(0)).unwrap();
        patch_directory_entry(&mut fd, 0, MAX_RECORD_TYPES, &entry(44, 1), false).unwrap();

        assert!(matches!(
            read_header(&mut fd),
            Err(IndexError::Corrupt("directory type code out of range"))
        ));
    }
}
