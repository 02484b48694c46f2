//! Decode and encode pipeline shared by the hierarchical formats (ARC0 and XFSA).
//!
//! Both store a directory table, a directory hash table, a file table and a name table, each as a
//! whole block passed through a [`BlockCompressor`], followed by the file data. They only differ in
//! header layout, entry packing and data alignment, which [`TableFormat`] describes.

use std::{
    fmt::Debug,
    io::{Cursor, Seek, Write},
    sync::Arc,
};

use binrw::{BinRead, BinWrite};
use encoding_rs::SHIFT_JIS;
use tracing::{debug, instrument, trace, warn};

use crate::{
    compression::BlockCompressor,
    cursor::{align_up, ByteReader, ByteWriter},
    directory::VirtualDirectory,
    error::{Error, Result},
    hash::{crc32, directory_hash, encode_name, with_sentinel},
    progress::{ProgressSink, ProgressTracker},
    stream::{FileHandle, SharedStream},
};

/// Section offsets and entry counts read from or written to a header
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableLayout {
    pub directory_entries_offset: u64,
    pub directory_hash_offset: u64,
    pub file_entries_offset: u64,
    pub name_offset: u64,
    pub data_offset: u64,
    pub directory_count: usize,
    pub hash_count: usize,
    pub file_count: usize,
}

/// Values of one directory entry, independent of how a format packs them
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DirectoryFields {
    pub crc32: u32,
    pub first_file_index: usize,
    pub file_count: usize,
    pub directory_count: usize,
    pub file_name_start_offset: u64,
    pub directory_name_start_offset: u64,
}

/// Values of one file entry, independent of how a format packs them
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileFields {
    pub crc32: u32,
    pub name_offset_in_folder: u64,
    pub file_offset: u64,
    pub file_size: u64,
}

pub(crate) trait DirectoryRecord:
    Copy + Debug + for<'a> BinRead<Args<'a> = ()> + for<'a> BinWrite<Args<'a> = ()>
{
    fn fields(&self) -> DirectoryFields;

    fn from_fields(fields: &DirectoryFields) -> Result<Self>;

    fn set_first_directory_index(&mut self, index: usize) -> Result<()>;

    fn crc32(&self) -> u32 {
        self.fields().crc32
    }
}

pub(crate) trait FileRecord:
    Copy + Debug + for<'a> BinRead<Args<'a> = ()> + for<'a> BinWrite<Args<'a> = ()>
{
    fn fields(&self) -> FileFields;

    fn from_fields(fields: &FileFields) -> Result<Self>;

    fn crc32(&self) -> u32 {
        self.fields().crc32
    }
}

/// A hierarchical archive format
pub(crate) trait TableFormat {
    type Header: Copy + Debug + for<'a> BinRead<Args<'a> = ()> + for<'a> BinWrite<Args<'a> = ()>;
    type Directory: DirectoryRecord;
    type File: FileRecord;

    /// Where the first table starts
    const HEADER_SIZE: u64;

    /// Alignment of every file offset inside the data region
    const DATA_ALIGNMENT: u64;

    fn layout(header: &Self::Header) -> TableLayout;

    /// Store offsets, counts and the table chunk size, keeping every other header field
    fn apply_layout(header: &mut Self::Header, layout: &TableLayout, name_table_len: u64)
        -> Result<()>;
}

pub(crate) fn narrow<T: TryFrom<u64>>(field: &'static str, value: impl Into<u64>) -> Result<T> {
    let value = value.into();
    T::try_from(value).map_err(|_| Error::unrepresentable(field, value))
}

fn read_table<R: std::io::Read + Seek>(
    reader: &mut ByteReader<R>,
    compressor: &dyn BlockCompressor,
    start: u64,
    end: u64,
    what: &str,
) -> Result<Vec<u8>> {
    let len = end
        .checked_sub(start)
        .ok_or_else(|| Error::CorruptTable(format!("{what} ends before it starts")))?;
    reader.seek(start)?;
    let raw = reader.read_section(len)?;
    let table = compressor.decompress(&raw)?;
    trace!(what, raw = raw.len(), decoded = table.len(), "read table");
    Ok(table)
}

fn parse_entries<T>(table: Vec<u8>, count: usize, what: &str) -> Result<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    ByteReader::new(Cursor::new(table))?
        .read_structs(count)
        .map_err(|e| match e {
            Error::TruncatedData { .. } => {
                Error::CorruptTable(format!("{what} holds fewer than {count} entries"))
            }
            other => other,
        })
}

/// Read the header and tables of an archive and build its tree
///
/// File handles point back into `source`, no file data is read.
#[instrument(skip(source, compressor), err)]
pub(crate) fn decode<F: TableFormat>(
    source: Arc<SharedStream>,
    compressor: &dyn BlockCompressor,
) -> Result<(F::Header, VirtualDirectory)> {
    let mut reader = ByteReader::new(source.reader())?;
    let header: F::Header = reader.read_struct()?;
    let layout = F::layout(&header);
    debug!(?layout, "table layout");

    let directory_table = read_table(
        &mut reader,
        compressor,
        layout.directory_entries_offset,
        layout.directory_hash_offset,
        "directory table",
    )?;
    let hash_table = read_table(
        &mut reader,
        compressor,
        layout.directory_hash_offset,
        layout.file_entries_offset,
        "directory hash table",
    )?;
    let file_table = read_table(
        &mut reader,
        compressor,
        layout.file_entries_offset,
        layout.name_offset,
        "file table",
    )?;
    let name_table = read_table(
        &mut reader,
        compressor,
        layout.name_offset,
        layout.data_offset,
        "name table",
    )?;

    let directories: Vec<F::Directory> =
        parse_entries(directory_table, layout.directory_count, "directory table")?;
    let hashes: Vec<u32> = parse_entries(hash_table, layout.hash_count, "directory hash table")?;
    let files: Vec<F::File> = parse_entries(file_table, layout.file_count, "file table")?;

    if !hashes.iter().copied().eq(directories.iter().map(|d| d.crc32())) {
        warn!("stored directory hashes do not match the directory table, ignoring them");
    }

    let mut names = ByteReader::new(Cursor::new(name_table))?;
    let mut root = VirtualDirectory::root();

    for directory in &directories {
        let fields = directory.fields();
        names.seek(fields.directory_name_start_offset)?;
        let directory_name = names.read_cstring(SHIFT_JIS)?;

        let entries = files
            .get(fields.first_file_index..fields.first_file_index + fields.file_count)
            .ok_or_else(|| {
                Error::CorruptTable(format!(
                    "directory {directory_name:?} lists files outside the file table"
                ))
            })?;

        let mut folder = VirtualDirectory::new(directory_name.as_str());
        for entry in entries {
            let file = entry.fields();
            names.seek(fields.file_name_start_offset + file.name_offset_in_folder)?;
            let file_name = names.read_cstring(SHIFT_JIS)?;
            trace!(directory = %directory_name, file = %file_name, offset = file.file_offset, size = file.file_size);

            let handle = FileHandle::backed(
                source.clone(),
                layout.data_offset + file.file_offset,
                file.file_size,
            )?;
            if directory_name.is_empty() {
                root.attach_file(file_name, handle)?;
            } else {
                folder.attach_file(file_name, handle)?;
            }
        }

        if !directory_name.is_empty() {
            root.push_folder(folder);
        }
    }

    root.reorganize();
    root.sort_alphabetically();
    debug!(
        directories = directories.len(),
        files = files.len(),
        "decoded archive"
    );

    Ok((header, root))
}

fn write_table<W: Write + Seek>(
    out: &mut ByteWriter<W>,
    compressor: &dyn BlockCompressor,
    table: &[u8],
) -> Result<u64> {
    let start = out.position()?;
    out.write_bytes(&compressor.compress(table)?)?;
    out.write_alignment(4)?;
    Ok(start)
}

fn serialize<T>(entries: &[T]) -> Result<Vec<u8>>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut table = ByteWriter::new(Cursor::new(Vec::new()));
    table.write_structs(entries)?;
    Ok(table.into_inner()?.into_inner())
}

/// Write `root` as a complete archive, returning the header that was stored
///
/// Unknown fields of `header` are written back unchanged. File data is streamed from each handle.
#[instrument(skip_all, err)]
pub(crate) fn encode<F: TableFormat, W: Write + Seek>(
    root: &VirtualDirectory,
    mut header: F::Header,
    writer: W,
    compressor: &dyn BlockCompressor,
    progress: Option<ProgressSink>,
) -> Result<F::Header> {
    let mut name_table: Vec<u8> = Vec::new();
    let mut directories: Vec<F::Directory> = Vec::new();
    let mut files: Vec<(F::File, &FileHandle)> = Vec::new();
    let mut data_cursor = 0u64;

    for (path, directory) in root.all_folders() {
        let directory_name = path.strip_prefix('/').unwrap_or(&path);
        let directory_name_start_offset = name_table.len() as u64;
        name_table.extend(encode_name(directory_name)?);
        name_table.push(0);
        let file_name_start_offset = name_table.len() as u64;

        let mut sorted: Vec<_> = directory.files().iter().collect();
        sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut slice = Vec::with_capacity(sorted.len());
        for (name, handle) in sorted {
            let encoded = encode_name(name)?;
            let size = handle.size();
            let entry = F::File::from_fields(&FileFields {
                crc32: with_sentinel(crc32(&encoded)),
                name_offset_in_folder: name_table.len() as u64 - file_name_start_offset,
                file_offset: data_cursor,
                file_size: size,
            })?;
            name_table.extend(encoded);
            name_table.push(0);

            slice.push((entry, handle));
            data_cursor = align_up(data_cursor + size, F::DATA_ALIGNMENT);
        }
        slice.sort_by_key(|(entry, _)| entry.crc32());

        directories.push(F::Directory::from_fields(&DirectoryFields {
            crc32: directory_hash(directory_name),
            first_file_index: files.len(),
            file_count: slice.len(),
            directory_count: directory.folders().len(),
            file_name_start_offset,
            directory_name_start_offset,
        })?);
        files.extend(slice);
    }

    directories.sort_by_key(|d| d.crc32());
    let mut next_directory = 0;
    for directory in &mut directories {
        directory.set_first_directory_index(next_directory)?;
        next_directory += directory.fields().directory_count;
    }

    let hashes: Vec<u32> = directories.iter().map(|d| d.crc32()).collect();
    let entries: Vec<F::File> = files.iter().map(|(entry, _)| *entry).collect();

    let mut out = ByteWriter::new(writer);
    out.seek(F::HEADER_SIZE)?;
    let layout = TableLayout {
        directory_entries_offset: write_table(&mut out, compressor, &serialize(&directories)?)?,
        directory_hash_offset: write_table(&mut out, compressor, &serialize(&hashes)?)?,
        file_entries_offset: write_table(&mut out, compressor, &serialize(&entries)?)?,
        name_offset: write_table(&mut out, compressor, &name_table)?,
        data_offset: out.position()?,
        directory_count: directories.len(),
        hash_count: hashes.len(),
        file_count: entries.len(),
    };
    debug!(?layout, "wrote tables");

    let total_bytes = files.iter().map(|(entry, _)| entry.fields().file_size).sum();
    let mut tracker = ProgressTracker::new(progress, total_bytes, files.len());
    let mut data_end = layout.data_offset;
    for (entry, handle) in &files {
        let file = entry.fields();
        out.seek(layout.data_offset + file.file_offset)?;
        let copied = handle.copy_to(&mut out)?;
        if copied != file.file_size {
            return Err(Error::InvalidTree(format!(
                "file changed size while being written ({} of {} bytes)",
                copied, file.file_size
            )));
        }
        if copied > 0 {
            data_end = data_end.max(layout.data_offset + file.file_offset + copied);
        }
        tracker.file_written(copied);
    }
    tracker.finish();

    // zero-sized files may sit past the last written byte
    let padded_end = layout.data_offset + data_cursor;
    if padded_end > data_end {
        out.seek(data_end)?;
        out.write_bytes(&vec![0u8; (padded_end - data_end) as usize])?;
    }

    F::apply_layout(&mut header, &layout, name_table.len() as u64)?;
    out.seek(0)?;
    out.write_struct(&header)?;
    out.into_inner()?;

    Ok(header)
}
