//! This library reads, edits and writes the archives used by *Level-5* games.
//!
//! # Supported Formats
//!
//! | Magic  | Extensions         | Layout                                                        |
//! |--------|--------------------|---------------------------------------------------------------|
//! | `ARC0` | `.fa`              | directory table, directory hashes, file table, name table     |
//! | `XFSA` |                    | same tables as ARC0 with bit-packed entries                   |
//! | `XPCK` | `.xc` `.xb` `.pck` | flat file table and name table                                |
//! | `XFSP` |                    | same as XPCK with 16-bit name hashes                          |
//!
//! A ZIP file can be opened as well. Its content is imported into a new ARC0 archive when it holds
//! folders, into a new XPCK archive otherwise.
//!
//! All integers are little endian. Names are Shift-JIS encoded and null terminated.
//!
//! ## ARC0
//!
//! | Offset | Field                    | Description                                                 |
//! |--------|--------------------------|-------------------------------------------------------------|
//! | 0x00   | Magic                    | 4 bytes: "ARC0"                                             |
//! | 0x04   | Directory Entries Offset | 4 bytes: start of the directory table                       |
//! | 0x08   | Directory Hash Offset    | 4 bytes: start of the directory hash table                  |
//! | 0x0C   | File Entries Offset      | 4 bytes: start of the file table                            |
//! | 0x10   | Name Offset              | 4 bytes: start of the name table                            |
//! | 0x14   | Data Offset              | 4 bytes: start of the file data                             |
//! | 0x18   | Directory Entries Count  | 2 bytes                                                     |
//! | 0x1A   | Directory Hash Count     | 2 bytes                                                     |
//! | 0x1C   | File Entries Count       | 4 bytes                                                     |
//! | 0x20   | Table Chunk Size         | 4 bytes: size of all tables plus 0x20, rounded to 4         |
//! | 0x24   | Reserved and unknown     | 20 bytes, kept as they were read                            |
//! | 0x38   | Directory Count          | 4 bytes: copy of the directory entries count                |
//! | 0x3C   | File Count               | 4 bytes: copy of the file entries count                     |
//! | 0x40   | Unknown and reserved     | 8 bytes, kept as they were read                             |
//!
//! Each table may be compressed as a whole, see [`CompressionMethod`].
//!
//! ### Directory Entry (20 bytes)
//!
//! | Offset | Field                       | Description                                          |
//! |--------|-----------------------------|------------------------------------------------------|
//! | 0x00   | CRC32                       | 4 bytes: CRC-32 of the directory path, e.g. `data/`  |
//! | 0x04   | First Directory Index       | 2 bytes                                              |
//! | 0x06   | Directory Count             | 2 bytes: number of child directories                 |
//! | 0x08   | First File Index            | 2 bytes: index into the file table                   |
//! | 0x0A   | File Count                  | 2 bytes                                              |
//! | 0x0C   | File Name Start Offset      | 4 bytes: where the names of its files begin          |
//! | 0x10   | Directory Name Start Offset | 4 bytes: where its own path is stored                |
//!
//! Directory entries are sorted by CRC-32. The root directory has an empty path.
//!
//! ### File Entry (16 bytes)
//!
//! | Offset | Field                 | Description                                                |
//! |--------|-----------------------|------------------------------------------------------------|
//! | 0x00   | CRC32                 | 4 bytes: CRC-32 of the file name                           |
//! | 0x04   | Name Offset In Folder | 4 bytes: relative to the file name start of its directory  |
//! | 0x08   | File Offset           | 4 bytes: relative to the data offset, aligned to 4         |
//! | 0x0C   | File Size             | 4 bytes                                                    |
//!
//! The files of one directory are contiguous and sorted by CRC-32. A CRC-32 of 0 is stored as
//! `0xFFFFFFFF`.
//!
//! ## XFSA
//!
//! The header is 36 bytes, the first 36 bytes of the ARC0 header with "XFSA" as magic and a table
//! chunk size without the extra 0x20. Entries pack their fields into shared words, see
//! [`types::XfsaDirectoryEntry`] and [`types::XfsaFileEntry`]. File data is aligned to 16 bytes.
//!
//! ## XPCK and XFSP
//!
//! A 20-byte header, see [`types::PackHeader`], followed by one entry per file, the name table holding
//! full paths and the file data. Offsets and sizes in the header are stored divided by 4. Only the
//! name table may be compressed.
//!
//! # Example
//!
//! ```
//! use l5_archive::{Archive, ArchiveKind, ArchiveOptions, FileHandle};
//!
//! let mut archive = Archive::new(ArchiveKind::Arc0, ArchiveOptions::default());
//! archive
//!     .directory_mut()
//!     .insert_file("/data/readme.txt", FileHandle::from_bytes(&b"hi"[..]))?;
//! let bytes = archive.save_to_bytes(None)?;
//!
//! let reopened = Archive::from_bytes(bytes, ArchiveOptions::default())?;
//! assert_eq!(&*reopened.directory().read_file("/data/readme.txt")?, b"hi");
//! # Ok::<(), l5_archive::Error>(())
//! ```

mod arc0;
pub mod archive;
pub mod compression;
pub mod cursor;
pub mod detect;
pub mod directory;
pub mod error;
pub mod hash;
mod pack;
pub mod progress;
pub mod stream;
mod table;
pub mod types;
mod xfsa;
mod xpck;

pub use archive::{Archive, ArchiveKind, ArchiveOptions};
pub use compression::{BlockCompressor, CompressionMethod};
pub use detect::Format;
pub use directory::VirtualDirectory;
pub use error::{Error, Result};
pub use stream::{EntryStatus, FileHandle, SharedStream};
