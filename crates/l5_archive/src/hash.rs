//! Name hashing used to order directory and file tables.

use crc::{Crc, CRC_32_ISO_HDLC};
use encoding_rs::SHIFT_JIS;

use crate::error::{Error, Result};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Stored in place of a checksum of 0, which the formats reserve
pub const ZERO_SENTINEL: u32 = 0xFFFF_FFFF;

/// Plain CRC-32 of a byte string
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Replace a zero checksum with [`ZERO_SENTINEL`]
pub fn with_sentinel(crc: u32) -> u32 {
    if crc == 0 {
        ZERO_SENTINEL
    } else {
        crc
    }
}

/// Hash stored for a directory entry, computed over its UTF-8 path
pub fn directory_hash(path: &str) -> u32 {
    with_sentinel(crc32(path.as_bytes()))
}

/// Hash stored for a file entry, computed over its Shift-JIS name
pub fn file_hash(name: &str) -> Result<u32> {
    Ok(with_sentinel(crc32(&encode_name(name)?)))
}

/// Encode a name to Shift-JIS, rejecting characters the encoding cannot hold
pub fn encode_name(name: &str) -> Result<Vec<u8>> {
    let (encoded, _, had_errors) = SHIFT_JIS.encode(name);
    if had_errors {
        return Err(Error::UnencodableName(name.to_owned()));
    }
    Ok(encoded.into_owned())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{crc32, directory_hash, encode_name, file_hash, ZERO_SENTINEL};
    use crate::error::{Error, Result};

    #[test]
    fn known_checksums() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b"hello.txt"), 0x1260_CEBB);
    }

    #[test]
    fn empty_root_uses_sentinel() {
        assert_eq!(crc32(b""), 0);
        assert_eq!(directory_hash(""), ZERO_SENTINEL);
    }

    #[test]
    fn zero_checksums_use_sentinel() -> Result<()> {
        assert_eq!(crc32(b"eiooynz.bin"), 0);
        assert_eq!(file_hash("eiooynz.bin")?, ZERO_SENTINEL);
        assert_eq!(directory_hash("ekemvtn/"), ZERO_SENTINEL);

        Ok(())
    }

    #[test]
    fn file_hash_uses_shift_jis_bytes() -> Result<()> {
        assert_eq!(file_hash("hello.txt")?, crc32(b"hello.txt"));
        assert_eq!(file_hash("テスト")?, crc32(&[0x83, 0x65, 0x83, 0x58, 0x83, 0x67]));

        Ok(())
    }

    #[test]
    fn unencodable_name_is_rejected() {
        assert!(matches!(
            encode_name("emoji 🦀"),
            Err(Error::UnencodableName(_))
        ));
    }
}
