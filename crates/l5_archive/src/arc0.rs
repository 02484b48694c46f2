//! ARC0 archives, the hierarchical format behind `.fa` files.

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
    types::{Arc0DirectoryEntry, Arc0FileEntry, Arc0Header},
};

const TABLE_CHUNK_EXTRA: u64 = 0x20;

pub(crate) struct Arc0;

impl DirectoryRecord for Arc0DirectoryEntry {
    fn fields(&self) -> DirectoryFields {
        DirectoryFields {
            crc32: self.crc32,
            first_file_index: self.first_file_index as usize,
            file_count: self.file_count as usize,
            directory_count: self.directory_count as usize,
            file_name_start_offset: self.file_name_start_offset as u64,
            directory_name_start_offset: self.directory_name_start_offset as u64,
        }
    }

    fn from_fields(fields: &DirectoryFields) -> Result<Self> {
        Ok(Self {
            crc32: fields.crc32,
            first_directory_index: 0,
            directory_count: narrow("ARC0 directory count", fields.directory_count as u64)?,
            first_file_index: narrow("ARC0 first file index", fields.first_file_index as u64)?,
            file_count: narrow("ARC0 directory file count", fields.file_count as u64)?,
            file_name_start_offset: narrow(
                "ARC0 file name start offset",
                fields.file_name_start_offset,
            )?,
            directory_name_start_offset: narrow(
                "ARC0 directory name start offset",
                fields.directory_name_start_offset,
            )?,
        })
    }

    fn set_first_directory_index(&mut self, index: usize) -> Result<()> {
        self.first_directory_index = narrow("ARC0 first directory index", index as u64)?;
        Ok(())
    }
}

impl FileRecord for Arc0FileEntry {
    fn fields(&self) -> FileFields {
        FileFields {
            crc32: self.crc32,
            name_offset_in_folder: self.name_offset_in_folder as u64,
            file_offset: self.file_offset as u64,
            file_size: self.file_size as u64,
        }
    }

    fn from_fields(fields: &FileFields) -> Result<Self> {
        Ok(Self {
            crc32: fields.crc32,
            name_offset_in_folder: narrow(
                "ARC0 name offset in folder",
                fields.name_offset_in_folder,
            )?,
            file_offset: narrow("ARC0 file offset", fields.file_offset)?,
            file_size: narrow("ARC0 file size", fields.file_size)?,
        })
    }
}

impl TableFormat for Arc0 {
    type Header = Arc0Header;
    type Directory = Arc0DirectoryEntry;
    type File = Arc0FileEntry;

    const HEADER_SIZE: u64 = Arc0Header::SIZE;
    const DATA_ALIGNMENT: u64 = 4;

    fn layout(header: &Arc0Header) -> TableLayout {
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
        header: &mut Arc0Header,
        layout: &TableLayout,
        name_table_len: u64,
    ) -> Result<()> {
        let directory_count = layout.directory_count as u64;
        let hash_count = layout.hash_count as u64;
        let file_count = layout.file_count as u64;
        let table_chunk_size = (directory_count * 20
            + hash_count * 4
            + file_count * 16
            + name_table_len
            + TABLE_CHUNK_EXTRA
            + 3)
            & !3;

        header.directory_entries_offset =
            narrow("ARC0 directory table offset", layout.directory_entries_offset)?;
        header.directory_hash_offset =
            narrow("ARC0 directory hash offset", layout.directory_hash_offset)?;
        header.file_entries_offset =
            narrow("ARC0 file table offset", layout.file_entries_offset)?;
        header.name_offset = narrow("ARC0 name table offset", layout.name_offset)?;
        header.data_offset = narrow("ARC0 data offset", layout.data_offset)?;
        header.directory_entries_count = narrow("ARC0 directory entry count", directory_count)?;
        header.directory_hash_count = narrow("ARC0 directory hash count", hash_count)?;
        header.file_entries_count = narrow("ARC0 file entry count", file_count)?;
        header.directory_count = narrow("ARC0 directory count", directory_count)?;
        header.file_count = narrow("ARC0 file count", file_count)?;
        header.table_chunk_size = narrow("ARC0 table chunk size", table_chunk_size)?;
        Ok(())
    }
}

/// Read an ARC0 archive from `source`
pub(crate) fn decode(
    source: Arc<SharedStream>,
    compressor: &dyn BlockCompressor,
) -> Result<(Arc0Header, VirtualDirectory)> {
    table::decode::<Arc0>(source, compressor)
}

/// Write `root` as an ARC0 archive, carrying over the unknown fields of `header`
pub(crate) fn encode<W: Write + Seek>(
    root: &VirtualDirectory,
    header: Arc0Header,
    writer: W,
    compressor: &dyn BlockCompressor,
    progress: Option<ProgressSink>,
) -> Result<Arc0Header> {
    table::encode::<Arc0, W>(root, header, writer, compressor, progress)
}
