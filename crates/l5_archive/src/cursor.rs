//! Positioned readers and writers over seekable byte sources.

use std::io::{self, Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite, Endian};
use byteorder::{ReadBytesExt, WriteBytesExt};
use encoding_rs::Encoding;

use crate::error::{Error, Result};

/// Sequential little-endian reader that knows the length of its source
///
/// Every read is bounds checked against that length, so a section that reaches past the end of the
/// source surfaces as [`Error::TruncatedData`] instead of a short read.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> ByteReader<R> {
    /// Wrap a reader, measuring the length of its source
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len })
    }

    /// Total length of the source
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current absolute position
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Move to an absolute position
    pub fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.len {
            return Err(Error::TruncatedData {
                offset: position,
                needed: 0,
                available: self.len,
            });
        }
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    fn ensure(&mut self, needed: u64) -> Result<u64> {
        let offset = self.position()?;
        if offset.saturating_add(needed) > self.len {
            return Err(Error::TruncatedData {
                offset,
                needed,
                available: self.len,
            });
        }
        Ok(offset)
    }

    /// Read one fixed layout struct
    pub fn read_struct<T>(&mut self) -> Result<T>
    where
        T: for<'a> BinRead<Args<'a> = ()>,
    {
        let start = self.position()?;
        T::read_options(&mut self.inner, Endian::Little, ()).map_err(|e| {
            // binrw wraps the EOF in field context
            if e.is_eof() {
                Error::TruncatedData {
                    offset: start,
                    needed: 1,
                    available: self.len,
                }
            } else {
                Error::from(e)
            }
        })
    }

    /// Read `count` consecutive fixed layout structs
    pub fn read_structs<T>(&mut self, count: usize) -> Result<Vec<T>>
    where
        T: for<'a> BinRead<Args<'a> = ()>,
    {
        (0..count).map(|_| self.read_struct()).collect()
    }

    /// Read the next `len` bytes without interpretation
    pub fn read_section(&mut self, len: u64) -> Result<Vec<u8>> {
        self.ensure(len)?;
        let mut buffer = vec![0u8; len as usize];
        self.inner.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Read a null-terminated string and decode it, the terminator is not part of the result
    pub fn read_cstring(&mut self, encoding: &'static Encoding) -> Result<String> {
        let start = self.position()?;
        let mut raw = Vec::new();
        loop {
            let char = match self.inner.read_u8() {
                Ok(c) => c,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(Error::TruncatedData {
                        offset: start,
                        needed: raw.len() as u64 + 1,
                        available: self.len,
                    })
                }
                Err(e) => return Err(e.into()),
            };
            if char == b'\0' {
                break;
            }
            raw.push(char);
        }

        let (decoded, _) = encoding.decode_without_bom_handling(&raw);
        Ok(decoded.into_owned())
    }

    /// Unwrap and return the inner reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Sequential little-endian writer
#[derive(Debug)]
pub struct ByteWriter<W> {
    inner: W,
}

impl<W: Write + Seek> ByteWriter<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Current absolute position
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Move to an absolute position, gaps left behind read back as zeroes
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Write one fixed layout struct
    pub fn write_struct<T>(&mut self, value: &T) -> Result<()>
    where
        T: for<'a> BinWrite<Args<'a> = ()>,
    {
        value.write_options(&mut self.inner, Endian::Little, ())?;
        Ok(())
    }

    /// Write consecutive fixed layout structs
    pub fn write_structs<T>(&mut self, values: &[T]) -> Result<()>
    where
        T: for<'a> BinWrite<Args<'a> = ()>,
    {
        values.iter().try_for_each(|v| self.write_struct(v))
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        Ok(())
    }

    /// Pad with zeroes until the position is a multiple of `alignment`
    pub fn write_alignment(&mut self, alignment: u64) -> Result<()> {
        let position = self.position()?;
        for _ in position..align_up(position, alignment) {
            self.inner.write_u8(0)?;
        }
        Ok(())
    }

    /// Flush and return the inner writer
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ByteWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Round `value` up to the next multiple of `alignment`
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    match value % alignment {
        0 => value,
        rem => value + (alignment - rem),
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use encoding_rs::SHIFT_JIS;
    use pretty_assertions::assert_eq;

    use super::{align_up, ByteReader, ByteWriter};
    use crate::{
        error::{Error, Result},
        types::Arc0FileEntry,
    };

    #[test]
    fn align_up_values() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(17, 16), 32);
    }

    #[test]
    fn read_integers_and_sections() -> Result<()> {
        #[rustfmt::skip]
        let input = vec![
            0x41, 0x52, 0x43, 0x30,
            0x10, 0x00,
            0xAA, 0xBB, 0xCC,
        ];
        let mut reader = ByteReader::new(Cursor::new(input))?;

        assert_eq!(reader.len(), 9);
        assert_eq!(reader.read_struct::<u32>()?, 0x30435241);
        assert_eq!(reader.read_struct::<u16>()?, 0x10);
        assert_eq!(reader.read_section(3)?, vec![0xAA, 0xBB, 0xCC]);

        Ok(())
    }

    #[test]
    fn read_section_past_end_is_truncated() -> Result<()> {
        let mut reader = ByteReader::new(Cursor::new(vec![0u8; 8]))?;
        reader.seek(4)?;

        let result = reader.read_section(8);
        assert!(matches!(
            result,
            Err(Error::TruncatedData {
                offset: 4,
                needed: 8,
                available: 8
            })
        ));

        Ok(())
    }

    #[test]
    fn struct_cut_short_is_truncated() -> Result<()> {
        let mut reader = ByteReader::new(Cursor::new(vec![0u8; 20]))?;
        reader.read_struct::<Arc0FileEntry>()?;

        // the eof surfaces from the second field
        assert!(matches!(
            reader.read_struct::<Arc0FileEntry>(),
            Err(Error::TruncatedData {
                offset: 16,
                available: 20,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn seek_past_end_is_truncated() -> Result<()> {
        let mut reader = ByteReader::new(Cursor::new(vec![0u8; 8]))?;

        assert!(reader.seek(8).is_ok());
        assert!(matches!(reader.seek(9), Err(Error::TruncatedData { .. })));

        Ok(())
    }

    #[test]
    fn read_shift_jis_cstrings() -> Result<()> {
        let (encoded, _, _) = SHIFT_JIS.encode("データ.bin");
        let mut input = b"readme.txt\0".to_vec();
        input.extend_from_slice(&encoded);
        input.push(0);

        let mut reader = ByteReader::new(Cursor::new(input))?;
        assert_eq!(reader.read_cstring(SHIFT_JIS)?, "readme.txt");
        assert_eq!(reader.read_cstring(SHIFT_JIS)?, "データ.bin");

        Ok(())
    }

    #[test]
    fn unterminated_cstring_is_truncated() -> Result<()> {
        let mut reader = ByteReader::new(Cursor::new(b"abc".to_vec()))?;
        assert!(matches!(
            reader.read_cstring(SHIFT_JIS),
            Err(Error::TruncatedData { .. })
        ));

        Ok(())
    }

    #[test]
    fn write_with_alignment() -> Result<()> {
        let mut writer = ByteWriter::new(Cursor::new(Vec::new()));
        writer.write_struct(&0x30435241u32)?;
        writer.write_bytes(&[0x01])?;
        writer.write_alignment(4)?;
        writer.write_structs(&[0x0102u16, 0x0304u16])?;
        writer.write_alignment(4)?;

        #[rustfmt::skip]
        let expected = vec![
            0x41, 0x52, 0x43, 0x30,
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x01, 0x04, 0x03,
        ];
        assert_eq!(writer.into_inner()?.into_inner(), expected);

        Ok(())
    }

    #[test]
    fn seek_forward_leaves_zeroed_gap() -> Result<()> {
        let mut writer = ByteWriter::new(Cursor::new(Vec::new()));
        writer.seek(6)?;
        writer.write_bytes(&[0xFF])?;

        assert_eq!(
            writer.into_inner()?.into_inner(),
            vec![0, 0, 0, 0, 0, 0, 0xFF]
        );

        Ok(())
    }
}
