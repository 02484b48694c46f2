//! Wire structures of XFSA archives.
//!
//! Directory and file entries pack several values into shared 32-bit words. Every getter masks and
//! shifts, every setter clears its bits before OR-ing the new value in and rejects values that do not
//! fit.

use binrw::{BinRead, BinWrite};

use crate::error::{Error, Result};

/// XFSA file header, 36 bytes starting with "XFSA"
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"XFSA", little)]
pub struct XfsaHeader {
    /// Start of the directory entry table
    pub directory_entries_offset: u32,

    /// Start of the directory hash table
    pub directory_hash_offset: u32,

    /// Start of the file entry table
    pub file_entries_offset: u32,

    /// Start of the name table
    pub name_offset: u32,

    /// Start of the file data
    pub data_offset: u32,

    /// Number of directory entries
    pub directory_entries_count: u16,

    /// Number of directory hashes
    pub directory_hash_count: u16,

    /// Number of file entries
    pub file_entries_count: u32,

    /// Size of all tables
    pub table_chunk_size: u32,
}

impl XfsaHeader {
    /// Encoded size of the header
    pub const SIZE: u64 = 0x24;
}

const COUNT_MASK: u32 = 0x3FFF;
const NAME_START_MAX: u32 = u32::MAX >> 14;
const OFFSET_MASK: u32 = 0x03FF_FFFF;
const SIZE_MASK: u32 = 0x007F_FFFF;
const NAME_OFFSET_MAX: u32 = (1 << 15) - 1;

fn check(field: &'static str, value: u32, max: u32) -> Result<()> {
    if value > max {
        return Err(Error::unrepresentable(field, value));
    }
    Ok(())
}

/// XFSA directory entry
///
/// `tmp1` holds the file count in bits 0..14 and the file name start offset in bits 14..32. `tmp2`
/// holds the directory count and the directory name start offset the same way.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct XfsaDirectoryEntry {
    /// CRC-32 of the directory path
    pub crc32: u32,

    #[allow(missing_docs)]
    pub tmp1: u32,

    /// Index of the first file in the file table
    pub first_file_index: u16,

    /// Index of the first child in the sorted directory table
    pub first_directory_index: u16,

    #[allow(missing_docs)]
    pub tmp2: u32,
}

impl XfsaDirectoryEntry {
    /// Number of files, `tmp1 & 0x3FFF`
    pub fn file_count(&self) -> u32 {
        self.tmp1 & COUNT_MASK
    }

    /// Set the number of files, at most 0x3FFF
    pub fn set_file_count(&mut self, value: u32) -> Result<()> {
        check("XFSA directory file count", value, COUNT_MASK)?;
        self.tmp1 = (self.tmp1 & !COUNT_MASK) | value;
        Ok(())
    }

    /// Name table offset of the first file name, `tmp1 >> 14`
    pub fn file_name_start_offset(&self) -> u32 {
        self.tmp1 >> 14
    }

    /// Set the name table offset of the first file name, below 2^18
    pub fn set_file_name_start_offset(&mut self, value: u32) -> Result<()> {
        check("XFSA file name start offset", value, NAME_START_MAX)?;
        self.tmp1 = (self.tmp1 & COUNT_MASK) | (value << 14);
        Ok(())
    }

    /// Number of child directories, `tmp2 & 0x3FFF`
    pub fn directory_count(&self) -> u32 {
        self.tmp2 & COUNT_MASK
    }

    /// Set the number of child directories, at most 0x3FFF
    pub fn set_directory_count(&mut self, value: u32) -> Result<()> {
        check("XFSA directory count", value, COUNT_MASK)?;
        self.tmp2 = (self.tmp2 & !COUNT_MASK) | value;
        Ok(())
    }

    /// Name table offset of the directory name, `tmp2 >> 14`
    pub fn directory_name_start_offset(&self) -> u32 {
        self.tmp2 >> 14
    }

    /// Set the name table offset of the directory name, below 2^18
    pub fn set_directory_name_start_offset(&mut self, value: u32) -> Result<()> {
        check("XFSA directory name start offset", value, NAME_START_MAX)?;
        self.tmp2 = (self.tmp2 & COUNT_MASK) | (value << 14);
        Ok(())
    }
}

/// XFSA file entry
///
/// `tmp1` holds the data offset divided by 16 in bits 0..26 and the upper 6 bits of the name offset
/// in bits 26..32. `tmp2` holds the size in bits 0..23 and the lower 9 bits of the name offset in bits
/// 23..32.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct XfsaFileEntry {
    /// CRC-32 of the Shift-JIS file name
    pub crc32: u32,

    #[allow(missing_docs)]
    pub tmp1: u32,

    #[allow(missing_docs)]
    pub tmp2: u32,
}

impl XfsaFileEntry {
    /// Data offset, `(tmp1 & 0x03FFFFFF) << 4`
    pub fn file_offset(&self) -> u64 {
        ((self.tmp1 & OFFSET_MASK) as u64) << 4
    }

    /// Set the data offset, a multiple of 16 below 2^30
    pub fn set_file_offset(&mut self, value: u64) -> Result<()> {
        if value % 16 != 0 || (value >> 4) > OFFSET_MASK as u64 {
            return Err(Error::unrepresentable("XFSA file offset", value));
        }
        self.tmp1 = (self.tmp1 & !OFFSET_MASK) | (value >> 4) as u32;
        Ok(())
    }

    /// Data size, `tmp2 & 0x007FFFFF`
    pub fn file_size(&self) -> u32 {
        self.tmp2 & SIZE_MASK
    }

    /// Set the data size, at most 0x7FFFFF
    pub fn set_file_size(&mut self, value: u32) -> Result<()> {
        check("XFSA file size", value, SIZE_MASK)?;
        self.tmp2 = (self.tmp2 & !SIZE_MASK) | value;
        Ok(())
    }

    /// Name offset relative to the directory, `((tmp1 >> 26) << 9) | (tmp2 >> 23)`
    pub fn name_offset_in_folder(&self) -> u32 {
        ((self.tmp1 >> 26) << 9) | (self.tmp2 >> 23)
    }

    /// Set the name offset relative to the directory, below 2^15
    pub fn set_name_offset_in_folder(&mut self, value: u32) -> Result<()> {
        check("XFSA name offset in folder", value, NAME_OFFSET_MAX)?;
        self.tmp1 = (self.tmp1 & OFFSET_MASK) | ((value >> 9) << 26);
        self.tmp2 = (self.tmp2 & SIZE_MASK) | (value << 23);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::{BinRead, BinWrite};
    use pretty_assertions::assert_eq;

    use super::{XfsaDirectoryEntry, XfsaFileEntry, XfsaHeader};
    use crate::error::{Error, Result};

    #[test]
    fn read_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x58, 0x46, 0x53, 0x41,
            0x24, 0x00, 0x00, 0x00,
            0x34, 0x00, 0x00, 0x00,
            0x38, 0x00, 0x00, 0x00,
            0x44, 0x00, 0x00, 0x00,
            0x60, 0x00, 0x00, 0x00,
            0x01, 0x00,
            0x01, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x3B, 0x00, 0x00, 0x00,
        ]);

        let expected = XfsaHeader {
            directory_entries_offset: 0x24,
            directory_hash_offset: 0x34,
            file_entries_offset: 0x38,
            name_offset: 0x44,
            data_offset: 0x60,
            directory_entries_count: 1,
            directory_hash_count: 1,
            file_entries_count: 1,
            table_chunk_size: 0x3B,
        };

        assert_eq!(XfsaHeader::read(&mut input)?, expected);

        Ok(())
    }

    #[test]
    fn directory_entry_accessors() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x78, 0x56, 0x34, 0x12,
            0x05, 0x80, 0x02, 0x00,
            0x03, 0x00,
            0x04, 0x00,
            0x02, 0x00, 0x00, 0x00,
        ]);

        let entry = XfsaDirectoryEntry::read(&mut input)?;

        assert_eq!(entry.crc32, 0x1234_5678);
        assert_eq!(entry.file_count(), 5);
        assert_eq!(entry.file_name_start_offset(), 10);
        assert_eq!(entry.first_file_index, 3);
        assert_eq!(entry.first_directory_index, 4);
        assert_eq!(entry.directory_count(), 2);
        assert_eq!(entry.directory_name_start_offset(), 0);

        Ok(())
    }

    #[test]
    fn directory_entry_setters_keep_neighbours() -> Result<()> {
        let mut entry = XfsaDirectoryEntry::default();
        entry.set_file_name_start_offset(0x3_FFFF)?;
        entry.set_file_count(0x3FFF)?;
        entry.set_file_count(7)?;
        entry.set_directory_name_start_offset(0x1234)?;
        entry.set_directory_count(9)?;

        assert_eq!(entry.file_name_start_offset(), 0x3_FFFF);
        assert_eq!(entry.file_count(), 7);
        assert_eq!(entry.tmp1, 0xFFFF_C007);
        assert_eq!(entry.directory_name_start_offset(), 0x1234);
        assert_eq!(entry.directory_count(), 9);
        assert_eq!(entry.tmp2, (0x1234 << 14) | 9);

        assert!(matches!(
            entry.set_file_count(0x4000),
            Err(Error::UnrepresentableValue { .. })
        ));
        assert!(entry.set_directory_name_start_offset(0x4_0000).is_err());

        Ok(())
    }

    #[test]
    fn file_entry_accessors() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0xBB, 0xCE, 0x60, 0x12,
            0x03, 0x00, 0x00, 0x04,
            0xE8, 0x03, 0x80, 0x02,
        ]);

        let entry = XfsaFileEntry::read(&mut input)?;

        assert_eq!(entry.file_offset(), 0x30);
        assert_eq!(entry.file_size(), 1000);
        assert_eq!(entry.name_offset_in_folder(), (1 << 9) | 5);

        Ok(())
    }

    #[test]
    fn file_entry_write() -> Result<()> {
        let mut entry = XfsaFileEntry {
            crc32: 0x1260_CEBB,
            ..Default::default()
        };
        entry.set_file_offset(0x30)?;
        entry.set_file_size(1000)?;
        entry.set_name_offset_in_folder((1 << 9) | 5)?;

        #[rustfmt::skip]
        let expected = vec![
            0xBB, 0xCE, 0x60, 0x12,
            0x03, 0x00, 0x00, 0x04,
            0xE8, 0x03, 0x80, 0x02,
        ];

        let mut actual = Vec::new();
        entry.write(&mut Cursor::new(&mut actual))?;
        assert_eq!(actual, expected);

        Ok(())
    }

    #[test]
    fn file_entry_rejects_unrepresentable_values() {
        let mut entry = XfsaFileEntry::default();

        assert!(entry.set_file_offset(8).is_err());
        assert!(entry.set_file_offset(1 << 30).is_err());
        assert!(entry.set_file_size(0x80_0000).is_err());
        assert!(entry.set_name_offset_in_folder(1 << 15).is_err());
        assert_eq!(entry, XfsaFileEntry::default());
    }
}
