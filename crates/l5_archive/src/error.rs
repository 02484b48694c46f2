//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent warpper for [`zip::result::ZipError`]
    #[error(transparent)]
    ZipError(#[from] zip::result::ZipError),

    /// Transparent warpper for [`tempfile::PersistError`]
    #[error(transparent)]
    PersistError(#[from] tempfile::PersistError),

    /// the input does not start with a known archive magic
    #[error("unsupported file type{}", .magic.map(|m| format!(" (magic {:02X?})", m)).unwrap_or_default())]
    #[diagnostic(help("supported archives are ARC0 (.fa), XFSA, XPCK/XFSP (.xc, .xb, .pck) and ZIP"))]
    UnsupportedFormat {
        /// The first four bytes of the input, when there were at least four
        magic: Option<[u8; 4]>,
    },

    /// a declared section reaches past the end of the available data
    #[error("truncated data: {needed} bytes requested at offset {offset} but only {available} are available")]
    TruncatedData {
        /// Where the read was attempted
        offset: u64,
        /// How many bytes were requested
        needed: u64,
        /// Total length of the data source
        available: u64,
    },

    /// a table could not be decompressed or interpreted
    #[error("corrupt table: {0}")]
    CorruptTable(String),

    /// a directory path does not exist in the tree
    #[error("path not found: {0}")]
    #[diagnostic(help("paths are separated by '/' and are case-sensitive"))]
    PathNotFound(String),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// an entry with this name already exists next to the one being added
    #[error("an entry named {0:?} already exists")]
    #[diagnostic(help("remove or rename the existing entry first, or use replace"))]
    DuplicateName(String),

    /// the tree broke an invariant while it was being flattened for writing
    #[error("invalid tree: {0}")]
    InvalidTree(String),

    /// a value does not fit the packed field it must be stored in
    #[error("{field} cannot store the value {value}")]
    UnrepresentableValue {
        /// Name of the packed field
        field: &'static str,
        /// The value which was rejected
        value: u64,
    },

    /// a name contains characters Shift-JIS cannot encode
    #[error("{0:?} cannot be encoded as Shift-JIS")]
    UnencodableName(String),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// by name {0}
    #[error("by name {0}")]
    Name(String),

    /// by path {0}
    #[error("by path {0}")]
    Path(String),
}

impl Error {
    pub(crate) fn unrepresentable(field: &'static str, value: impl Into<u64>) -> Self {
        Error::UnrepresentableValue {
            field,
            value: value.into(),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
