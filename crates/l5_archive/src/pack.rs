//! Decode and encode pipeline shared by the flat formats (XPCK and XFSP).
//!
//! A pack has no directory table. Every file is listed once with its full path in the name table,
//! entries are ordered by their stored hash and data follows the names:
//!
//! | Section      | Start                                  | Size                                  |
//! |--------------|----------------------------------------|---------------------------------------|
//! | Header       | 0x00                                   | 0x14                                  |
//! | File entries | 0x14                                   | entry size × file count, padded to 4  |
//! | Name table   | after the entries                      | compressed size, padded to 4          |
//! | Data         | after the name table                   | every file aligned to 4               |

use std::{
    fmt::Debug,
    io::{Cursor, Seek, Write},
    sync::Arc,
};

use binrw::{BinRead, BinWrite};
use encoding_rs::SHIFT_JIS;
use tracing::{debug, instrument, trace};

use crate::{
    compression::BlockCompressor,
    cursor::{align_up, ByteReader, ByteWriter},
    directory::VirtualDirectory,
    error::{Error, Result},
    hash::{crc32, encode_name, with_sentinel},
    progress::{ProgressSink, ProgressTracker},
    stream::{EntryStatus, FileHandle, SharedStream},
    table::narrow,
    types::{PackHeader, PackLocation},
};

const DATA_ALIGNMENT: u64 = 4;

/// A file entry of a flat archive
pub(crate) trait PackRecord:
    Copy + Debug + for<'a> BinRead<Args<'a> = ()> + for<'a> BinWrite<Args<'a> = ()>
{
    const MAGIC: [u8; 4];
    const SIZE: u64;

    fn name_offset(&self) -> u16;

    fn location(&self) -> PackLocation;

    /// Build an entry from the CRC-32 of the encoded name
    fn build(crc32: u32, name_offset: u16, location: PackLocation) -> Self;

    /// Value the entry table is sorted by
    fn sort_key(&self) -> u32;

    /// Store the file count, and whatever else the format derives from it
    fn stamp_count(header: &mut PackHeader, count: usize) -> Result<()> {
        header.set_file_count(count)
    }
}

/// Read a pack from `source`
#[instrument(skip(source, compressor), err)]
pub(crate) fn decode<E: PackRecord>(
    source: Arc<SharedStream>,
    compressor: &dyn BlockCompressor,
) -> Result<(PackHeader, VirtualDirectory)> {
    let mut reader = ByteReader::new(source.reader())?;
    let header: PackHeader = reader.read_struct()?;
    if header.magic != E::MAGIC {
        return Err(Error::UnsupportedFormat {
            magic: Some(header.magic),
        });
    }
    debug!(
        files = header.file_count(),
        file_info_offset = header.file_info_offset(),
        filename_table_offset = header.filename_table_offset(),
        data_offset = header.data_offset(),
        "pack layout"
    );

    if (header.file_info_size() as u64) < header.file_count() as u64 * E::SIZE {
        return Err(Error::CorruptTable(format!(
            "{} entries do not fit in a file table of {} bytes",
            header.file_count(),
            header.file_info_size()
        )));
    }
    reader.seek(header.file_info_offset() as u64)?;
    let entries: Vec<E> = reader.read_structs(header.file_count())?;

    reader.seek(header.filename_table_offset() as u64)?;
    let raw_names = reader.read_section(header.filename_table_size() as u64)?;
    let mut names = ByteReader::new(Cursor::new(compressor.decompress(&raw_names)?))?;

    let data_offset = header.data_offset() as u64;
    let mut root = VirtualDirectory::root();
    for entry in &entries {
        names.seek(entry.name_offset() as u64)?;
        let path = names.read_cstring(SHIFT_JIS)?;
        let location = entry.location();
        trace!(%path, offset = location.offset(), size = location.size());

        let handle = FileHandle::backed(
            source.clone(),
            data_offset + location.offset(),
            location.size(),
        )?;
        let (folder, file_name) = match path.rsplit_once('/') {
            Some((parent, file_name)) => {
                let parent = parent.split('/').filter(|s| !s.is_empty());
                (root.ensure_path(parent, EntryStatus::Original), file_name)
            }
            None => (&mut root, path.as_str()),
        };
        if file_name.is_empty() {
            return Err(Error::CorruptTable(format!("entry {path:?} has no file name")));
        }
        folder.attach_file(file_name, handle)?;
    }

    root.sort_alphabetically();
    debug!(files = entries.len(), "decoded pack");

    Ok((header, root))
}

/// Write every file of `root` as a pack
///
/// Nested files are stored under their path relative to `root`. Folders holding no file are lost,
/// the format cannot describe them.
#[instrument(skip_all, err)]
pub(crate) fn encode<E: PackRecord, W: Write + Seek>(
    root: &VirtualDirectory,
    mut header: PackHeader,
    writer: W,
    compressor: &dyn BlockCompressor,
    progress: Option<ProgressSink>,
) -> Result<PackHeader> {
    let mut files: Vec<(String, &FileHandle)> = root
        .all_files()
        .into_iter()
        .map(|(path, handle)| (path.trim_start_matches('/').to_owned(), handle))
        .collect();
    files.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut name_table = Vec::new();
    let mut entries: Vec<(E, &FileHandle)> = Vec::with_capacity(files.len());
    let mut data_cursor = 0u64;
    for (path, handle) in &files {
        let encoded = encode_name(path)?;
        let mut location = PackLocation::default();
        location.set_offset(data_cursor)?;
        location.set_size(handle.size())?;

        let entry = E::build(
            with_sentinel(crc32(&encoded)),
            narrow("pack name offset", name_table.len() as u64)?,
            location,
        );
        name_table.extend(encoded);
        name_table.push(0);

        entries.push((entry, *handle));
        data_cursor = align_up(data_cursor + handle.size(), DATA_ALIGNMENT);
    }
    entries.sort_by_key(|(entry, _)| entry.sort_key());

    header.magic = E::MAGIC;
    E::stamp_count(&mut header, entries.len())?;

    let mut out = ByteWriter::new(writer);
    out.seek(PackHeader::SIZE)?;
    let file_info_offset = out.position()?;
    for (entry, _) in &entries {
        out.write_struct(entry)?;
    }
    out.write_alignment(4)?;

    let filename_table_offset = out.position()?;
    out.write_bytes(&compressor.compress(&name_table)?)?;
    out.write_alignment(4)?;
    let data_offset = out.position()?;

    header.set_file_info_offset(file_info_offset)?;
    header.set_file_info_size(filename_table_offset - file_info_offset)?;
    header.set_filename_table_offset(filename_table_offset)?;
    header.set_filename_table_size(data_offset - filename_table_offset)?;
    header.set_data_offset(data_offset)?;
    header.set_data_size(data_cursor)?;
    debug!(file_info_offset, filename_table_offset, data_offset, "wrote pack tables");

    let total_bytes = entries.iter().map(|(_, handle)| handle.size()).sum();
    let mut tracker = ProgressTracker::new(progress, total_bytes, entries.len());
    let mut data_end = data_offset;
    for (entry, handle) in &entries {
        let location = entry.location();
        out.seek(data_offset + location.offset())?;
        let copied = handle.copy_to(&mut out)?;
        if copied != location.size() {
            return Err(Error::InvalidTree(format!(
                "file changed size while being written ({} of {} bytes)",
                copied,
                location.size()
            )));
        }
        if copied > 0 {
            data_end = data_end.max(data_offset + location.offset() + copied);
        }
        tracker.file_written(copied);
    }
    tracker.finish();

    let padded_end = data_offset + data_cursor;
    if padded_end > data_end {
        out.seek(data_end)?;
        out.write_bytes(&vec![0u8; (padded_end - data_end) as usize])?;
    }

    out.seek(0)?;
    out.write_struct(&header)?;
    out.into_inner()?;

    Ok(header)
}
