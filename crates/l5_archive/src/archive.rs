//! The [`Archive`] handle: open any supported format, edit its tree and save it again.

use std::{
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Cursor, Seek, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use bon::Builder;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::{
    arc0,
    compression::CompressionMethod,
    detect::{identify, zip_to_directory, Format},
    directory::VirtualDirectory,
    error::{Error, Result},
    progress::ProgressSink,
    stream::{FileHandle, ReadSeek, SharedStream},
    types::{Arc0Header, PackHeader, XfsaHeader},
    xfsa, xpck,
};

/// The archive formats this library reads and writes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// Hierarchical archive with plain entries, `.fa`
    Arc0,

    /// Hierarchical archive with bit-packed entries
    Xfsa,

    /// Flat archive, `.xc`, `.xb` and `.pck`
    Xpck,

    /// Flat archive with 16-bit name hashes
    Xfsp,
}

impl ArchiveKind {
    /// Every supported kind
    pub const ALL: [ArchiveKind; 4] = [
        ArchiveKind::Arc0,
        ArchiveKind::Xfsa,
        ArchiveKind::Xpck,
        ArchiveKind::Xfsp,
    ];

    /// Display name, which is also the magic number
    pub fn name(&self) -> &'static str {
        match self {
            ArchiveKind::Arc0 => "ARC0",
            ArchiveKind::Xfsa => "XFSA",
            ArchiveKind::Xpck => "XPCK",
            ArchiveKind::Xfsp => "XFSP",
        }
    }

    /// First four bytes of an archive of this kind
    pub fn magic(&self) -> [u8; 4] {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(self.name().as_bytes());
        magic
    }

    /// The kind an archive starting with `magic` has
    pub fn from_magic(magic: [u8; 4]) -> Option<ArchiveKind> {
        ArchiveKind::ALL.into_iter().find(|kind| kind.magic() == magic)
    }

    /// Whether the format stores folders, flat formats only store file paths
    pub fn is_hierarchical(&self) -> bool {
        matches!(self, ArchiveKind::Arc0 | ArchiveKind::Xfsa)
    }

    fn empty_header(&self) -> Header {
        match self {
            ArchiveKind::Arc0 => Header::Arc0(Arc0Header::default()),
            ArchiveKind::Xfsa => Header::Xfsa(XfsaHeader::default()),
            ArchiveKind::Xpck | ArchiveKind::Xfsp => Header::Pack(PackHeader::new(self.magic())),
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options applied when an archive is read and written
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct ArchiveOptions {
    /// The compression method of the tables
    #[builder(default)]
    pub table_compression: CompressionMethod,
}

/// Header read from disk, kept to write its unknown fields back
#[derive(Debug, Clone, Copy)]
enum Header {
    Arc0(Arc0Header),
    Xfsa(XfsaHeader),
    Pack(PackHeader),
}

/// An open archive
///
/// Files of an archive opened from a stream are loaded lazily from it, the stream stays open until
/// [`Archive::close`] is called or the archive is dropped.
///
/// ```no_run
/// use l5_archive::{Archive, ArchiveOptions, FileHandle};
///
/// let mut archive = Archive::open_path("menu.fa", ArchiveOptions::default())?;
/// archive
///     .directory_mut()
///     .insert_file("/data/readme.txt", FileHandle::from_bytes(&b"hi"[..]))?;
/// archive.save("menu.fa", None)?;
/// # Ok::<(), l5_archive::Error>(())
/// ```
#[derive(Debug)]
pub struct Archive {
    kind: ArchiveKind,
    header: Header,
    directory: VirtualDirectory,
    source: Option<Arc<SharedStream>>,
    path: Option<PathBuf>,
    options: ArchiveOptions,
}

impl Archive {
    /// An empty archive of the given kind
    pub fn new(kind: ArchiveKind, options: ArchiveOptions) -> Self {
        Self::from_directory(kind, VirtualDirectory::root(), options)
    }

    /// An archive holding an existing tree
    pub fn from_directory(
        kind: ArchiveKind,
        directory: VirtualDirectory,
        options: ArchiveOptions,
    ) -> Self {
        Self {
            kind,
            header: kind.empty_header(),
            directory,
            source: None,
            path: None,
            options,
        }
    }

    /// Detect the format of `reader` and decode it
    ///
    /// A ZIP file is imported into memory and becomes an ARC0 archive when it holds folders, an
    /// XPCK archive otherwise.
    #[instrument(skip(reader), err)]
    pub fn open(mut reader: impl ReadSeek + 'static, options: ArchiveOptions) -> Result<Self> {
        let kind = match identify(&mut reader)? {
            Format::Zip => {
                let directory = zip_to_directory(reader)?;
                let kind = if directory.folders().is_empty() {
                    ArchiveKind::Xpck
                } else {
                    ArchiveKind::Arc0
                };
                info!(kind = kind.name(), "imported zip file");
                return Ok(Self::from_directory(kind, directory, options));
            }
            Format::Archive(kind) => kind,
        };

        let source = Arc::new(SharedStream::new(reader)?);
        let compressor = &options.table_compression;
        let (header, directory) = match kind {
            ArchiveKind::Arc0 => {
                let (header, directory) = arc0::decode(source.clone(), compressor)?;
                (Header::Arc0(header), directory)
            }
            ArchiveKind::Xfsa => {
                let (header, directory) = xfsa::decode(source.clone(), compressor)?;
                (Header::Xfsa(header), directory)
            }
            ArchiveKind::Xpck => {
                let (header, directory) = xpck::decode(source.clone(), compressor)?;
                (Header::Pack(header), directory)
            }
            ArchiveKind::Xfsp => {
                let (header, directory) = xpck::decode_xfsp(source.clone(), compressor)?;
                (Header::Pack(header), directory)
            }
        };
        debug!(kind = kind.name(), size = source.len(), "opened archive");

        Ok(Self {
            kind,
            header,
            directory,
            source: Some(source),
            path: None,
            options,
        })
    }

    /// Open the archive stored at `path`
    pub fn open_path(path: impl AsRef<Path>, options: ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut archive = Self::open(BufReader::new(File::open(path)?), options)?;
        archive.path = Some(path.to_path_buf());
        Ok(archive)
    }

    /// Decode an archive held in memory
    pub fn from_bytes(data: impl Into<Vec<u8>>, options: ArchiveOptions) -> Result<Self> {
        Self::open(Cursor::new(data.into()), options)
    }

    /// Decode an archive stored as a file of another archive
    ///
    /// The result lives in memory. Write it back to the parent with [`Archive::save_to_bytes`] and
    /// [`VirtualDirectory::replace_file`].
    pub fn open_nested(handle: &FileHandle, options: ArchiveOptions) -> Result<Self> {
        Self::from_bytes(handle.read()?.to_vec(), options)
    }

    /// Format of the archive
    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Display name of the format, such as `ARC0`
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// The file tree
    pub fn directory(&self) -> &VirtualDirectory {
        &self.directory
    }

    /// The file tree, for editing
    pub fn directory_mut(&mut self) -> &mut VirtualDirectory {
        &mut self.directory
    }

    /// File the archive was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Options the archive was opened with
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Encode the archive into `writer`
    #[instrument(skip(self, writer, progress), fields(kind = self.kind.name()), err)]
    pub fn save_to<W: Write + Seek>(
        &mut self,
        writer: W,
        progress: Option<ProgressSink>,
    ) -> Result<()> {
        let compressor = &self.options.table_compression;
        let root = &self.directory;
        self.header = match (self.kind, self.header) {
            (ArchiveKind::Arc0, Header::Arc0(header)) => {
                Header::Arc0(arc0::encode(root, header, writer, compressor, progress)?)
            }
            (ArchiveKind::Xfsa, Header::Xfsa(header)) => {
                Header::Xfsa(xfsa::encode(root, header, writer, compressor, progress)?)
            }
            (ArchiveKind::Xpck, Header::Pack(header)) => {
                Header::Pack(xpck::encode(root, header, writer, compressor, progress)?)
            }
            (ArchiveKind::Xfsp, Header::Pack(header)) => {
                Header::Pack(xpck::encode_xfsp(root, header, writer, compressor, progress)?)
            }
            (kind, _) => {
                return Err(Error::InvalidTree(format!(
                    "{} archive carries a header of another format",
                    kind.name()
                )))
            }
        };
        Ok(())
    }

    /// Encode the archive into a new buffer
    pub fn save_to_bytes(&mut self, progress: Option<ProgressSink>) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.save_to(&mut out, progress)?;
        Ok(out.into_inner())
    }

    /// Encode the archive to `path`
    ///
    /// The data is staged in a temporary file next to `path` which replaces it only once it was
    /// completely written, a failed save leaves an existing file untouched. When `path` is the file
    /// the archive was opened from, the archive is reopened from the new file afterwards.
    #[instrument(skip_all, err)]
    pub fn save(&mut self, path: impl AsRef<Path>, progress: Option<ProgressSink>) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staging = NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(staging.as_file_mut());
            self.save_to(&mut writer, progress)?;
            writer.flush()?;
        }
        staging.as_file().sync_all()?;

        if self.is_source(path) {
            debug!(path = %path.display(), "replacing the open archive");
            self.replace_source(path, || {
                staging.persist(path)?;
                Ok(())
            })?;
        } else {
            staging.persist(path)?;
            self.directory.reset_status();
        }
        info!(path = %path.display(), kind = self.kind.name(), "saved archive");

        Ok(())
    }

    fn is_source(&self, path: &Path) -> bool {
        let Some(source_path) = &self.path else {
            return false;
        };
        match (source_path.canonicalize(), path.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => source_path == path,
        }
    }

    /// Close the stream while `persist` moves new content to `path`, then reopen from it
    ///
    /// When `persist` fails the original file is still in place and the stream is reopened on it,
    /// so handles of the tree stay readable.
    fn replace_source(&mut self, path: &Path, persist: impl FnOnce() -> Result<()>) -> Result<()> {
        let source = self.source.take();
        if let Some(source) = &source {
            source.close();
        }

        if let Err(e) = persist() {
            if let Some(source) = source {
                let reopened = File::open(path)
                    .map_err(Error::from)
                    .and_then(|file| source.reopen(BufReader::new(file)));
                match reopened {
                    Ok(()) => self.source = Some(source),
                    Err(reopen) => warn!(path = %path.display(), %reopen, "could not reopen the archive"),
                }
            }
            return Err(e);
        }

        *self = Self::open_path(path, self.options)?;
        Ok(())
    }

    fn release_source(&mut self) {
        if let Some(source) = self.source.take() {
            source.close();
        }
    }

    /// Release the backing stream and empty the tree
    pub fn close(&mut self) {
        self.release_source();
        self.directory = VirtualDirectory::root();
        self.path = None;
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        self.release_source();
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{Archive, ArchiveKind, ArchiveOptions};
    use crate::{
        compression::CompressionMethod,
        error::{Error, Result},
        stream::FileHandle,
    };

    fn options() -> ArchiveOptions {
        ArchiveOptions::builder()
            .table_compression(CompressionMethod::None)
            .build()
    }

    fn populated(kind: ArchiveKind) -> Result<Archive> {
        let mut archive = Archive::new(kind, options());
        let root = archive.directory_mut();
        root.add_file("readme.txt", FileHandle::from_bytes(&b"hi"[..]))?;
        root.insert_file("/data/x.bin", FileHandle::from_bytes(vec![7u8; 33]))?;
        Ok(archive)
    }

    #[test]
    fn magic_round_trip() {
        for kind in ArchiveKind::ALL {
            assert_eq!(ArchiveKind::from_magic(kind.magic()), Some(kind));
        }
        assert_eq!(ArchiveKind::from_magic(*b"ARC1"), None);
    }

    #[test]
    #[traced_test]
    fn every_kind_reopens() -> Result<()> {
        for kind in ArchiveKind::ALL {
            let bytes = populated(kind)?.save_to_bytes(None)?;
            let reopened = Archive::from_bytes(bytes, options())?;

            assert_eq!(reopened.kind(), kind);
            assert_eq!(reopened.name(), kind.name());
            assert_eq!(&*reopened.directory().read_file("/readme.txt")?, b"hi");
            assert_eq!(&*reopened.directory().read_file("/data/x.bin")?, &[7u8; 33][..]);
        }

        Ok(())
    }

    #[test]
    fn nested_archive_is_written_back() -> Result<()> {
        let inner = populated(ArchiveKind::Xpck)?.save_to_bytes(None)?;
        let mut outer = Archive::new(ArchiveKind::Arc0, options());
        outer
            .directory_mut()
            .insert_file("/ui/face.xc", FileHandle::from_bytes(inner))?;
        let mut outer = Archive::from_bytes(outer.save_to_bytes(None)?, options())?;

        let mut nested = Archive::open_nested(outer.directory().file("/ui/face.xc")?, options())?;
        nested.directory_mut().rename_file("readme.txt", "hello.txt")?;
        let bytes = nested.save_to_bytes(None)?;
        outer
            .directory_mut()
            .resolve_mut("/ui")?
            .replace_file("face.xc", bytes)?;

        let outer = Archive::from_bytes(outer.save_to_bytes(None)?, options())?;
        let nested = Archive::open_nested(outer.directory().file("/ui/face.xc")?, options())?;
        assert_eq!(&*nested.directory().read_file("/hello.txt")?, b"hi");
        assert!(!nested.directory().exists("/readme.txt"));

        Ok(())
    }

    #[test]
    fn close_releases_stream() -> Result<()> {
        let bytes = populated(ArchiveKind::Arc0)?.save_to_bytes(None)?;
        let mut archive = Archive::from_bytes(bytes, options())?;
        let handle = archive.directory().file("/data/x.bin")?.clone();

        archive.close();

        assert!(archive.directory().is_empty());
        assert!(handle.read().is_err());

        Ok(())
    }

    #[test]
    fn failed_replace_keeps_the_source_readable() -> Result<()> {
        let workdir = tempfile::tempdir()?;
        let path = workdir.path().join("menu.fa");
        populated(ArchiveKind::Arc0)?.save(&path, None)?;

        let mut archive = Archive::open_path(&path, options())?;
        archive
            .directory_mut()
            .add_file("new.bin", FileHandle::from_bytes(&b"n"[..]))?;

        let result = archive.replace_source(&path, || Err(Error::CustomError("disk full".into())));
        assert!(matches!(result, Err(Error::CustomError(_))));

        assert_eq!(&*archive.directory().read_file("/data/x.bin")?, &[7u8; 33]);
        assert_eq!(&*archive.directory().read_file("/new.bin")?, b"n");
        archive.save(&path, None)?;
        assert_eq!(&*archive.directory().read_file("/new.bin")?, b"n");

        Ok(())
    }

    #[test]
    fn unknown_input_is_unsupported() {
        let result = Archive::open(Cursor::new(b"RIFF0000".to_vec()), options());

        assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
    }
}
