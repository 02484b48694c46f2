//! Wire structures of ARC0 archives.

use binrw::{BinRead, BinWrite};

/// ARC0 file header
///
/// Always starts with "ARC0" and is 72 bytes long. Fields this library does not interpret are kept so
/// that a decoded archive writes them back unchanged.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"ARC0", little)]
pub struct Arc0Header {
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

    /// Size of all tables plus a fixed 0x20, rounded down to a multiple of 4
    pub table_chunk_size: u32,

    #[allow(missing_docs)]
    pub reserved0: u32,

    #[allow(missing_docs)]
    pub unknown: [u32; 4],

    /// Number of directories, mirrors `directory_entries_count`
    pub directory_count: u32,

    /// Number of files, mirrors `file_entries_count`
    pub file_count: u32,

    #[allow(missing_docs)]
    pub unknown2: u32,

    #[allow(missing_docs)]
    pub reserved1: u32,
}

impl Arc0Header {
    /// Encoded size of the header
    pub const SIZE: u64 = 0x48;
}

/// ARC0 directory entry
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Arc0DirectoryEntry {
    /// CRC-32 of the directory path
    pub crc32: u32,

    /// Index of the first child in the sorted directory table
    pub first_directory_index: u16,

    /// Number of child directories
    pub directory_count: u16,

    /// Index of the first file in the file table
    pub first_file_index: u16,

    /// Number of files
    pub file_count: u16,

    /// Name table offset where the names of the files of this directory begin
    pub file_name_start_offset: u32,

    /// Name table offset of the directory name
    pub directory_name_start_offset: u32,
}

/// ARC0 file entry
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Arc0FileEntry {
    /// CRC-32 of the Shift-JIS file name
    pub crc32: u32,

    /// Name offset relative to `file_name_start_offset` of the directory
    pub name_offset_in_folder: u32,

    /// Data offset relative to the start of the data region
    pub file_offset: u32,

    /// Size of the data
    pub file_size: u32,
}
