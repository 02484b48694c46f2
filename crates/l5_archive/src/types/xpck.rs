//! Wire structures of XPCK and XFSP archives.
//!
//! Both formats share a 20-byte header where offsets and sizes are stored divided by 4, and a file
//! count of 12 bits split over two bytes.

use binrw::{BinRead, BinWrite};

use crate::error::{Error, Result};

/// XPCK and XFSP file header
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct PackHeader {
    /// `XPCK` or `XFSP`
    pub magic: [u8; 4],

    /// Low byte of the file count
    pub fc1: u8,

    /// High nibble of the file count in bits 0..4
    pub fc2: u8,

    #[allow(missing_docs)]
    pub tmp1: u16,

    #[allow(missing_docs)]
    pub tmp2: u16,

    #[allow(missing_docs)]
    pub tmp3: u16,

    #[allow(missing_docs)]
    pub tmp4: u16,

    #[allow(missing_docs)]
    pub tmp5: u16,

    #[allow(missing_docs)]
    pub tmp6: u32,
}

fn quarter(field: &'static str, value: u64, max: u64) -> Result<u64> {
    if value % 4 != 0 || (value >> 2) > max {
        return Err(Error::unrepresentable(field, value));
    }
    Ok(value >> 2)
}

impl PackHeader {
    /// Encoded size of the header
    pub const SIZE: u64 = 0x14;

    /// Largest file count the header can store
    pub const MAX_FILES: usize = 0xFFF;

    /// An empty header with the given magic
    pub fn new(magic: [u8; 4]) -> Self {
        Self {
            magic,
            ..Default::default()
        }
    }

    /// Number of files, `((fc2 & 0xF) << 8) | fc1`
    pub fn file_count(&self) -> usize {
        (((self.fc2 & 0xF) as usize) << 8) | self.fc1 as usize
    }

    /// Set the number of files, the upper nibble of `fc2` is kept
    pub fn set_file_count(&mut self, count: usize) -> Result<()> {
        if count > Self::MAX_FILES {
            return Err(Error::unrepresentable("pack file count", count as u64));
        }
        self.fc1 = (count & 0xFF) as u8;
        self.fc2 = (self.fc2 & 0xF0) | ((count >> 8) & 0xF) as u8;
        Ok(())
    }

    /// Set the upper nibble of `fc2`
    pub fn set_count_bits(&mut self, bits: u8) {
        self.fc2 = (self.fc2 & 0x0F) | (bits << 4);
    }

    /// Start of the file entry table, `tmp1 << 2`
    pub fn file_info_offset(&self) -> u32 {
        (self.tmp1 as u32) << 2
    }

    /// Set the start of the file entry table
    pub fn set_file_info_offset(&mut self, value: u64) -> Result<()> {
        self.tmp1 = quarter("pack file info offset", value, u16::MAX as u64)? as u16;
        Ok(())
    }

    /// Start of the name table, `tmp2 << 2`
    pub fn filename_table_offset(&self) -> u32 {
        (self.tmp2 as u32) << 2
    }

    /// Set the start of the name table
    pub fn set_filename_table_offset(&mut self, value: u64) -> Result<()> {
        self.tmp2 = quarter("pack filename table offset", value, u16::MAX as u64)? as u16;
        Ok(())
    }

    /// Start of the file data, `tmp3 << 2`
    pub fn data_offset(&self) -> u32 {
        (self.tmp3 as u32) << 2
    }

    /// Set the start of the file data
    pub fn set_data_offset(&mut self, value: u64) -> Result<()> {
        self.tmp3 = quarter("pack data offset", value, u16::MAX as u64)? as u16;
        Ok(())
    }

    /// Size of the file entry table, `tmp4 << 2`
    pub fn file_info_size(&self) -> u32 {
        (self.tmp4 as u32) << 2
    }

    /// Set the size of the file entry table
    pub fn set_file_info_size(&mut self, value: u64) -> Result<()> {
        self.tmp4 = quarter("pack file info size", value, u16::MAX as u64)? as u16;
        Ok(())
    }

    /// Size of the name table, `tmp5 << 2`
    pub fn filename_table_size(&self) -> u32 {
        (self.tmp5 as u32) << 2
    }

    /// Set the size of the name table
    pub fn set_filename_table_size(&mut self, value: u64) -> Result<()> {
        self.tmp5 = quarter("pack filename table size", value, u16::MAX as u64)? as u16;
        Ok(())
    }

    /// Size of the file data, `tmp6 << 2`
    pub fn data_size(&self) -> u64 {
        (self.tmp6 as u64) << 2
    }

    /// Set the size of the file data
    pub fn set_data_size(&mut self, value: u64) -> Result<()> {
        self.tmp6 = quarter("pack data size", value, u32::MAX as u64)? as u32;
        Ok(())
    }
}

/// Bit length written to the upper nibble of an XFSP file count
///
/// The smallest `i < 12` with `2^i > count`, or 0 when there is none.
pub fn xfsp_count_bits(count: usize) -> u8 {
    (0..12u8).find(|i| (1usize << i) > count).unwrap_or(0)
}

/// Location of a file's data, shared by XPCK and XFSP entries
///
/// The offset is stored divided by 4 in 24 bits, the size in 24 bits, each split into a low 16-bit
/// and a high 8-bit part.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct PackLocation {
    #[allow(missing_docs)]
    pub offset_low: u16,

    #[allow(missing_docs)]
    pub size_low: u16,

    #[allow(missing_docs)]
    pub offset_high: u8,

    #[allow(missing_docs)]
    pub size_high: u8,
}

const U24_MAX: u64 = 0xFF_FFFF;

impl PackLocation {
    /// Data offset relative to the data region, `((offset_high << 16) | offset_low) << 2`
    pub fn offset(&self) -> u64 {
        (((self.offset_high as u64) << 16) | self.offset_low as u64) << 2
    }

    /// Set the data offset, a multiple of 4 below 2^26
    pub fn set_offset(&mut self, value: u64) -> Result<()> {
        let stored = quarter("pack file offset", value, U24_MAX)?;
        self.offset_low = (stored & 0xFFFF) as u16;
        self.offset_high = (stored >> 16) as u8;
        Ok(())
    }

    /// Data size, `(size_high << 16) | size_low`
    pub fn size(&self) -> u64 {
        ((self.size_high as u64) << 16) | self.size_low as u64
    }

    /// Set the data size, below 2^24
    pub fn set_size(&mut self, value: u64) -> Result<()> {
        if value > U24_MAX {
            return Err(Error::unrepresentable("pack file size", value));
        }
        self.size_low = (value & 0xFFFF) as u16;
        self.size_high = (value >> 16) as u8;
        Ok(())
    }
}

/// XPCK file entry, 12 bytes
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct XpckFileEntry {
    /// CRC-32 of the Shift-JIS file name
    pub crc32: u32,

    /// Offset of the name inside the name table
    pub name_offset: u16,

    /// Where the data lives
    pub location: PackLocation,
}

/// XFSP file entry, 10 bytes
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct XfspFileEntry {
    /// Low 16 bits of the CRC-32 of the Shift-JIS file name
    pub hash: u16,

    /// Offset of the name inside the name table
    pub name_offset: u16,

    /// Where the data lives
    pub location: PackLocation,
}
