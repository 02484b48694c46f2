//! XFSA archives.
//!
//! Same table layout as ARC0 with a shorter header and bit-packed entries. File data is aligned to 16
//! bytes because entries store offsets divided by 16.

use std::{
    io::{Seek, Write},
    sync::Arc,
};

use crate::{
    compression::BlockCompressor,
    directory::VirtualDirectory,
    error::Result,
    progress::ProgressSink,
    stream::SharedStream,
    table::{
        self, narrow, DirectoryFields, DirectoryRecord, FileFields, FileRecord, TableFormat,
        TableLayout,
    },
    types::{XfsaDirectoryEntry, XfsaFileEntry, XfsaHeader},
};

pub(crate) struct Xfsa;

impl DirectoryRecord for XfsaDirectoryEntry {
    fn fields(&self) -> DirectoryFields {
        DirectoryFields {
            crc32: self.crc32,
            first_file_index: self.first_file_index as usize,
            file_count: self.file_count() as usize,
            directory_count: self.directory_count() as usize,
            file_name_start_offset: self.file_name_start_offset() as u64,
            directory_name_start_offset: self.directory_name_start_offset() as u64,
        }
    }

    fn from_fields(fields: &DirectoryFields) -> Result<Self> {
        let mut entry = Self {
            crc32: fields.crc32,
            first_file_index: narrow("XFSA first file index", fields.first_file_index as u64)?,
            ..Default::default()
        };
        entry.set_file_count(narrow("XFSA directory file count", fields.file_count as u64)?)?;
        entry.set_directory_count(narrow("XFSA directory count", fields.directory_count as u64)?)?;
        entry.set_file_name_start_offset(narrow(
            "XFSA file name start offset",
            fields.file_name_start_offset,
        )?)?;
        entry.set_directory_name_start_offset(narrow(
            "XFSA directory name start offset",
            fields.directory_name_start_offset,
        )?)?;
        Ok(entry)
    }

    fn set_first_directory_index(&mut self, index: usize) -> Result<()> {
        self.first_directory_index = narrow("XFSA first directory index", index as u64)?;
        Ok(())
    }
}

impl FileRecord for XfsaFileEntry {
    fn fields(&self) -> FileFields {
        FileFields {
            crc32: self.crc32,
            name_offset_in_folder: self.name_offset_in_folder() as u64,
            file_offset: self.file_offset(),
            file_size: self.file_size() as u64,
        }
    }

    fn from_fields(fields: &FileFields) -> Result<Self> {
        let mut entry = Self {
            crc32: fields.crc32,
            ..Default::default()
        };
        entry.set_file_offset(fields.file_offset)?;
        entry.set_file_size(narrow("XFSA file size", fields.file_size)?)?;
        entry.set_name_offset_in_folder(narrow(
            "XFSA name offset in folder",
            fields.name_offset_in_folder,
        )?)?;
        Ok(entry)
    }
}

impl TableFormat for Xfsa {
    type Header = XfsaHeader;
    type Directory = XfsaDirectoryEntry;
    type File = XfsaFileEntry;

    const HEADER_SIZE: u64 = XfsaHeader::SIZE;
    const DATA_ALIGNMENT: u64 = 16;

    fn layout(header: &XfsaHeader) -> TableLayout {
        TableLayout {
            directory_entries_offset: header.directory_entries_offset as u64,
            directory_hash_offset: header.directory_hash_offset as u64,
            file_entries_offset: header.file_entries_offset as u64,
            name_offset: header.name_offset as u64,
            data_offset: header.data_offset as u64,
            directory_count: header.directory_entries_count as usize,
            hash_count: header.directory_hash_count as usize,
            file_count: header.file_entries_count as usize,
        }
    }

    fn apply_layout(
        header: &mut XfsaHeader,
        layout: &TableLayout,
        name_table_len: u64,
    ) -> Result<()> {
        let directory_count = layout.directory_count as u64;
        let hash_count = layout.hash_count as u64;
        let file_count = layout.file_count as u64;

        header.directory_entries_offset =
            narrow("XFSA directory table offset", layout.directory_entries_offset)?;
        header.directory_hash_offset =
            narrow("XFSA directory hash offset", layout.directory_hash_offset)?;
        header.file_entries_offset =
            narrow("XFSA file table offset", layout.file_entries_offset)?;
        header.name_offset = narrow("XFSA name table offset", layout.name_offset)?;
        header.data_offset = narrow("XFSA data offset", layout.data_offset)?;
        header.directory_entries_count = narrow("XFSA directory entry count", directory_count)?;
        header.directory_hash_count = narrow("XFSA directory hash count", hash_count)?;
        header.file_entries_count = narrow("XFSA file entry count", file_count)?;
        header.table_chunk_size = narrow(
            "XFSA table chunk size",
            directory_count * 16 + hash_count * 4 + file_count * 12 + name_table_len,
        )?;
        Ok(())
    }
}

/// Read an XFSA archive from `source`
pub(crate) fn decode(
    source: Arc<SharedStream>,
    compressor: &dyn BlockCompressor,
) -> Result<(XfsaHeader, VirtualDirectory)> {
    table::decode::<Xfsa>(source, compressor)
}

/// Write `root` as an XFSA archive
pub(crate) fn encode<W: Write + Seek>(
    root: &VirtualDirectory,
    header: XfsaHeader,
    writer: W,
    compressor: &dyn BlockCompressor,
    progress: Option<ProgressSink>,
) -> Result<XfsaHeader> {
    table::encode::<Xfsa, W>(root, header, writer, compressor, progress)
}
