//! Base types for the on-disk structure of the supported archives.
//!
//! All structures are little endian and have a fixed size.

pub mod arc0;
pub mod xfsa;
pub mod xpck;

pub use arc0::{Arc0DirectoryEntry, Arc0FileEntry, Arc0Header};
pub use xfsa::{XfsaDirectoryEntry, XfsaFileEntry, XfsaHeader};
pub use xpck::{xfsp_count_bits, PackHeader, PackLocation, XfspFileEntry, XpckFileEntry};
