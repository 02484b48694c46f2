//! Format detection by magic number or file extension, and the ZIP import bridge.

use std::{
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

use tracing::{debug, instrument};

use crate::{
    archive::ArchiveKind,
    directory::VirtualDirectory,
    error::{Error, Result},
    stream::{EntryStatus, FileHandle},
};

/// Local file header signature starting every ZIP file
pub const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// What a byte source holds
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    /// One of the Level-5 archive formats
    Archive(ArchiveKind),

    /// A ZIP file, imported into a new archive
    Zip,
}

impl Format {
    /// Match the first four bytes of a source
    pub fn from_magic(magic: [u8; 4]) -> Result<Format> {
        if magic == ZIP_MAGIC {
            return Ok(Format::Zip);
        }
        ArchiveKind::from_magic(magic)
            .map(Format::Archive)
            .ok_or(Error::UnsupportedFormat { magic: Some(magic) })
    }

    /// Guess the format from a file name
    ///
    /// `.fa` is ARC0, `.xc`, `.xb` and `.pck` are XPCK, `.zip` is a ZIP file. The match ignores case.
    pub fn from_extension(path: impl AsRef<Path>) -> Result<Format> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("fa") => Ok(Format::Archive(ArchiveKind::Arc0)),
            Some("xc" | "xb" | "pck") => Ok(Format::Archive(ArchiveKind::Xpck)),
            Some("zip") => Ok(Format::Zip),
            _ => Err(Error::UnsupportedFormat { magic: None }),
        }
    }
}

/// Identify the content of `reader` from its first four bytes, leaving it at the start
#[instrument(skip(reader), err)]
pub fn identify<R: Read + Seek>(reader: &mut R) -> Result<Format> {
    reader.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 4];
    let read = reader.read_exact(&mut magic);
    reader.seek(SeekFrom::Start(0))?;
    match read {
        Ok(()) => Format::from_magic(magic),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err(Error::UnsupportedFormat { magic: None })
        }
        Err(e) => Err(e.into()),
    }
}

/// Build a tree from the entries of a ZIP file
///
/// Entry paths are split on `/`, every folder along the way is created. File content is read into
/// memory, the ZIP file is not kept open.
#[instrument(skip(reader), err)]
pub fn zip_to_directory<R: Read + Seek>(reader: R) -> Result<VirtualDirectory> {
    let mut zip = zip::ZipArchive::new(reader)?;
    let mut root = VirtualDirectory::root();

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let name = entry.name().to_owned();
        let mut segments: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();

        if entry.is_dir() {
            root.ensure_path(segments, EntryStatus::Original);
            continue;
        }
        let Some(file_name) = segments.pop() else {
            continue;
        };

        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        debug!(%name, size = content.len(), "imported zip entry");

        root.ensure_path(segments, EntryStatus::Original)
            .attach_file(file_name, FileHandle::from_bytes(content))?;
    }

    root.sort_alphabetically();
    Ok(root)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::{identify, Format};
    use crate::{archive::ArchiveKind, error::Error};

    #[test]
    fn magics() {
        assert_eq!(
            Format::from_magic(*b"ARC0").ok(),
            Some(Format::Archive(ArchiveKind::Arc0))
        );
        assert_eq!(
            Format::from_magic(*b"XFSP").ok(),
            Some(Format::Archive(ArchiveKind::Xfsp))
        );
        assert_eq!(Format::from_magic(*b"PK\x03\x04").ok(), Some(Format::Zip));
        assert!(matches!(
            Format::from_magic(*b"TREE"),
            Err(Error::UnsupportedFormat {
                magic: Some([b'T', b'R', b'E', b'E'])
            })
        ));
    }

    #[test]
    fn extensions() {
        assert_eq!(
            Format::from_extension("menu.FA").ok(),
            Some(Format::Archive(ArchiveKind::Arc0))
        );
        assert_eq!(
            Format::from_extension("face.xc").ok(),
            Some(Format::Archive(ArchiveKind::Xpck))
        );
        assert_eq!(Format::from_extension("mods.zip").ok(), Some(Format::Zip));
        assert!(Format::from_extension("notes.txt").is_err());
        assert!(Format::from_extension("README").is_err());
    }

    #[test]
    fn identify_rewinds() {
        let mut input = Cursor::new(b"XFSA\x24\x00".to_vec());
        input.set_position(3);

        assert_eq!(
            identify(&mut input).ok(),
            Some(Format::Archive(ArchiveKind::Xfsa))
        );
        assert_eq!(input.position(), 0);
    }

    #[test]
    fn short_input_is_unsupported() {
        assert!(matches!(
            identify(&mut Cursor::new(b"AR".to_vec())),
            Err(Error::UnsupportedFormat { magic: None })
        ));
    }
}
