//! XPCK and XFSP archives, the flat formats behind `.xc`, `.xb` and `.pck` files.

use std::{
    io::{Seek, Write},
    sync::Arc,
};

use crate::{
    compression::BlockCompressor,
    directory::VirtualDirectory,
    error::Result,
    pack::{self, PackRecord},
    progress::ProgressSink,
    stream::SharedStream,
    types::{xfsp_count_bits, PackHeader, PackLocation, XfspFileEntry, XpckFileEntry},
};

impl PackRecord for XpckFileEntry {
    const MAGIC: [u8; 4] = *b"XPCK";
    const SIZE: u64 = 12;

    fn name_offset(&self) -> u16 {
        self.name_offset
    }

    fn location(&self) -> PackLocation {
        self.location
    }

    fn build(crc32: u32, name_offset: u16, location: PackLocation) -> Self {
        Self {
            crc32,
            name_offset,
            location,
        }
    }

    fn sort_key(&self) -> u32 {
        self.crc32
    }
}

impl PackRecord for XfspFileEntry {
    const MAGIC: [u8; 4] = *b"XFSP";
    const SIZE: u64 = 10;

    fn name_offset(&self) -> u16 {
        self.name_offset
    }

    fn location(&self) -> PackLocation {
        self.location
    }

    fn build(crc32: u32, name_offset: u16, location: PackLocation) -> Self {
        Self {
            hash: (crc32 & 0xFFFF) as u16,
            name_offset,
            location,
        }
    }

    fn sort_key(&self) -> u32 {
        self.hash as u32
    }

    fn stamp_count(header: &mut PackHeader, count: usize) -> Result<()> {
        header.set_file_count(count)?;
        header.set_count_bits(xfsp_count_bits(count));
        Ok(())
    }
}

/// Read an XPCK archive from `source`
pub(crate) fn decode(
    source: Arc<SharedStream>,
    compressor: &dyn BlockCompressor,
) -> Result<(PackHeader, VirtualDirectory)> {
    pack::decode::<XpckFileEntry>(source, compressor)
}

/// Write `root` as an XPCK archive
pub(crate) fn encode<W: Write + Seek>(
    root: &VirtualDirectory,
    header: PackHeader,
    writer: W,
    compressor: &dyn BlockCompressor,
    progress: Option<ProgressSink>,
) -> Result<PackHeader> {
    pack::encode::<XpckFileEntry, W>(root, header, writer, compressor, progress)
}

/// Read an XFSP archive from `source`, the 16-bit hashes are not checked
pub(crate) fn decode_xfsp(
    source: Arc<SharedStream>,
    compressor: &dyn BlockCompressor,
) -> Result<(PackHeader, VirtualDirectory)> {
    pack::decode::<XfspFileEntry>(source, compressor)
}

/// Write `root` as an XFSP archive
pub(crate) fn encode_xfsp<W: Write + Seek>(
    root: &VirtualDirectory,
    header: PackHeader,
    writer: W,
    compressor: &dyn BlockCompressor,
    progress: Option<ProgressSink>,
) -> Result<PackHeader> {
    pack::encode::<XfspFileEntry, W>(root, header, writer, compressor, progress)
}

#[cfg(test)]
mod test {
    use std::{io::Cursor, sync::Arc};

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{decode, decode_xfsp, encode, encode_xfsp};
    use crate::{
        compression::CompressionMethod,
        directory::VirtualDirectory,
        error::{Error, Result},
        stream::{FileHandle, SharedStream},
        cursor::ByteReader,
        types::{PackHeader, XfspFileEntry, XpckFileEntry},
    };

    fn sample_tree() -> Result<VirtualDirectory> {
        let mut root = VirtualDirectory::root();
        root.add_file("b.txt", FileHandle::from_bytes(&b"hey"[..]))?;
        root.add_file("a.bin", FileHandle::from_bytes(&[9u8, 8, 7, 6, 5][..]))?;
        Ok(root)
    }

    #[rustfmt::skip]
    const SAMPLE: [u8; 68] = [
        // header
        0x58, 0x50, 0x43, 0x4B,
        0x02, 0x00,
        0x05, 0x00,
        0x0B, 0x00,
        0x0E, 0x00,
        0x06, 0x00,
        0x03, 0x00,
        0x03, 0x00, 0x00, 0x00,
        // entries, "a.bin" then "b.txt"
        0x12, 0xF2, 0xFB, 0x77,
        0x00, 0x00,
        0x00, 0x00, 0x05, 0x00, 0x00, 0x00,
        0x6A, 0x8D, 0x4B, 0x86,
        0x06, 0x00,
        0x02, 0x00, 0x03, 0x00, 0x00, 0x00,
        // names
        b'a', b'.', b'b', b'i', b'n', 0x00, b'b', b'.',
        b't', b'x', b't', 0x00,
        // data
        0x09, 0x08, 0x07, 0x06, 0x05, 0x00, 0x00, 0x00,
        b'h', b'e', b'y', 0x00,
    ];

    #[test]
    #[traced_test]
    fn encode_sample() -> Result<()> {
        let mut out = Cursor::new(Vec::new());
        encode(
            &sample_tree()?,
            PackHeader::new(*b"XPCK"),
            &mut out,
            &CompressionMethod::None,
            None,
        )?;

        assert_eq!(out.into_inner(), SAMPLE.to_vec());

        Ok(())
    }

    #[test]
    fn decode_sample() -> Result<()> {
        let source = Arc::new(SharedStream::new(Cursor::new(SAMPLE.to_vec()))?);
        let (header, root) = decode(source, &CompressionMethod::None)?;

        assert_eq!(header.file_count(), 2);
        assert_eq!(&*root.read_file("a.bin")?, &[9, 8, 7, 6, 5]);
        assert_eq!(&*root.read_file("b.txt")?, b"hey");
        let names: Vec<_> = root.files().keys().cloned().collect();
        assert_eq!(names, vec!["a.bin", "b.txt"]);

        Ok(())
    }

    #[test]
    fn nested_names_become_folders() -> Result<()> {
        let mut root = VirtualDirectory::root();
        root.insert_file("/img/ui/logo.bin", FileHandle::from_bytes(&[1u8; 6][..]))?;
        root.add_file("top.txt", FileHandle::from_bytes(&b"t"[..]))?;

        let mut out = Cursor::new(Vec::new());
        encode(&root, PackHeader::new(*b"XPCK"), &mut out, &CompressionMethod::Zlib, None)?;

        let source = Arc::new(SharedStream::new(Cursor::new(out.into_inner()))?);
        let (_, decoded) = decode(source, &CompressionMethod::Zlib)?;
        assert_eq!(&*decoded.read_file("/img/ui/logo.bin")?, &[1u8; 6]);
        assert_eq!(&*decoded.read_file("/top.txt")?, b"t");

        Ok(())
    }

    #[test]
    fn xfsp_round_trip_stamps_count_bits() -> Result<()> {
        let mut out = Cursor::new(Vec::new());
        let header = encode_xfsp(
            &sample_tree()?,
            PackHeader::new(*b"XFSP"),
            &mut out,
            &CompressionMethod::None,
            None,
        )?;

        // two files need two bits
        assert_eq!(header.fc2 >> 4, 2);
        assert_eq!(header.file_count(), 2);
        assert_eq!(header.file_info_size(), 20);

        let source = Arc::new(SharedStream::new(Cursor::new(out.into_inner()))?);
        let (_, root) = decode_xfsp(source, &CompressionMethod::None)?;
        assert_eq!(&*root.read_file("b.txt")?, b"hey");

        Ok(())
    }

    #[test]
    fn equal_checksums_keep_name_order() -> Result<()> {
        // both names hash to 0x9BEA2BC9
        let mut root = VirtualDirectory::root();
        root.add_file("fze.bin", FileHandle::from_bytes(&b"f"[..]))?;
        root.add_file("76t1tt.bin", FileHandle::from_bytes(&b"7"[..]))?;

        let mut out = Cursor::new(Vec::new());
        encode(&root, PackHeader::new(*b"XPCK"), &mut out, &CompressionMethod::None, None)?;

        let mut reader = ByteReader::new(Cursor::new(out.into_inner()))?;
        reader.seek(PackHeader::SIZE)?;
        let entries: Vec<XpckFileEntry> = reader.read_structs(2)?;
        assert_eq!(entries[0].crc32, entries[1].crc32);
        assert_eq!(entries[0].name_offset, 0);
        assert_eq!(entries[1].name_offset, 11);

        Ok(())
    }

    #[test]
    fn equal_short_hashes_keep_name_order() -> Result<()> {
        // the full checksums differ, the low 16 bits are both 0x55C6
        let mut root = VirtualDirectory::root();
        root.add_file("lly4c.bin", FileHandle::from_bytes(&b"l"[..]))?;
        root.add_file("cjx.bin", FileHandle::from_bytes(&b"c"[..]))?;

        let mut out = Cursor::new(Vec::new());
        encode_xfsp(&root, PackHeader::new(*b"XFSP"), &mut out, &CompressionMethod::None, None)?;

        let bytes = out.into_inner();
        let mut reader = ByteReader::new(Cursor::new(bytes.clone()))?;
        reader.seek(PackHeader::SIZE)?;
        let entries: Vec<XfspFileEntry> = reader.read_structs(2)?;
        assert_eq!(entries[0].hash, 0x55C6);
        assert_eq!(entries[1].hash, 0x55C6);
        assert_eq!(entries[0].name_offset, 0);
        assert_eq!(entries[1].name_offset, 8);

        let source = Arc::new(SharedStream::new(Cursor::new(bytes))?);
        let (_, decoded) = decode_xfsp(source, &CompressionMethod::None)?;
        assert_eq!(&*decoded.read_file("cjx.bin")?, b"c");
        assert_eq!(&*decoded.read_file("lly4c.bin")?, b"l");

        Ok(())
    }

    #[test]
    fn wrong_magic_is_unsupported() -> Result<()> {
        let source = Arc::new(SharedStream::new(Cursor::new(SAMPLE.to_vec()))?);

        assert!(matches!(
            decode_xfsp(source, &CompressionMethod::None),
            Err(Error::UnsupportedFormat { .. })
        ));

        Ok(())
    }

    #[test]
    fn count_past_file_table_is_corrupt() -> Result<()> {
        let mut input = SAMPLE.to_vec();
        // three entries do not fit in the 24-byte table
        input[4] = 3;
        let source = Arc::new(SharedStream::new(Cursor::new(input))?);

        assert!(matches!(
            decode(source, &CompressionMethod::None),
            Err(Error::CorruptTable(_))
        ));

        Ok(())
    }

    #[test]
    fn entries_cut_short_are_truncated() -> Result<()> {
        // the header and one and a half entries
        let source = Arc::new(SharedStream::new(Cursor::new(SAMPLE[..0x26].to_vec()))?);

        assert!(matches!(
            decode(source, &CompressionMethod::None),
            Err(Error::TruncatedData { .. })
        ));

        Ok(())
    }

    #[test]
    fn too_many_files_are_unrepresentable() -> Result<()> {
        let mut root = VirtualDirectory::root();
        for i in 0..=PackHeader::MAX_FILES {
            root.add_file(&format!("{i}.bin"), FileHandle::from_bytes(Vec::<u8>::new()))?;
        }

        let result = encode(
            &root,
            PackHeader::new(*b"XPCK"),
            Cursor::new(Vec::new()),
            &CompressionMethod::None,
            None,
        );
        assert!(matches!(result, Err(Error::UnrepresentableValue { .. })));

        Ok(())
    }
}
