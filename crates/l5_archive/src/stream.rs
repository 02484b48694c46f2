//! Lazily loaded file handles over a shared backing stream.

use std::{
    fmt::{self, Debug},
    io::{self, Read, Seek, SeekFrom, Write},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{instrument, trace};

use crate::error::{Error, Result};

const COPY_CHUNK: usize = 64 * 1024;

/// Any seekable reader that can be moved between threads
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Modification marker carried by files and folders, never persisted
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum EntryStatus {
    /// Loaded from an archive and untouched
    #[default]
    Original,

    /// Newly added to the tree
    Added,

    /// Content or name replaced after loading
    Replaced,
}

/// The backing stream of an open archive
///
/// Every file handle of the archive shares it. A seek and the read following it happen under one lock
/// so concurrent loads never interleave.
pub struct SharedStream {
    inner: Mutex<Option<Box<dyn ReadSeek>>>,
    len: u64,
}

impl Debug for SharedStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SharedStream")
            .field("len", &self.len)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SharedStream {
    /// Take ownership of a reader, measuring its length
    pub fn new(mut reader: impl ReadSeek + 'static) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: Mutex::new(Some(Box::new(reader))),
            len,
        })
    }

    /// Length of the stream when it was opened
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the stream is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fill `buf` with the bytes starting at `offset`
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset.saturating_add(buf.len() as u64) > self.len {
            return Err(Error::TruncatedData {
                offset,
                needed: buf.len() as u64,
                available: self.len,
            });
        }

        let mut guard = self.inner.lock();
        let reader = guard.as_deref_mut().ok_or_else(closed_error)?;
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(buf)?;
        Ok(())
    }

    /// Put a reader back after [`SharedStream::close`], it must have the original length
    pub fn reopen(&self, mut reader: impl ReadSeek + 'static) -> Result<()> {
        let len = reader.seek(SeekFrom::End(0))?;
        if len != self.len {
            return Err(Error::CustomError(format!(
                "reopened stream holds {len} bytes instead of {}",
                self.len
            )));
        }
        *self.inner.lock() = Some(Box::new(reader));
        Ok(())
    }

    /// Drop the underlying reader, later reads fail
    pub fn close(&self) {
        self.inner.lock().take();
    }

    /// Whether [`SharedStream::close`] was called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }
}

/// Sequential cursor over a [`SharedStream`], each read takes the stream lock once
#[derive(Debug)]
pub struct SharedStreamReader<'a> {
    stream: &'a SharedStream,
    position: u64,
}

impl SharedStream {
    /// A reader starting at the beginning of the stream
    pub fn reader(&self) -> SharedStreamReader<'_> {
        SharedStreamReader {
            stream: self,
            position: 0,
        }
    }
}

impl Read for SharedStreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.stream.len.saturating_sub(self.position);
        let count = (buf.len() as u64).min(remaining) as usize;
        if count == 0 {
            return Ok(0);
        }
        self.stream
            .read_at(self.position, &mut buf[..count])
            .map_err(|e| match e {
                Error::IOError(io) => io,
                other => io::Error::other(other.to_string()),
            })?;
        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for SharedStreamReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.stream.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        self.position = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before the start of the stream")
        })?;
        Ok(self.position)
    }
}

fn closed_error() -> Error {
    io::Error::other("the backing stream of this archive has been closed").into()
}

/// A file inside an archive
///
/// A handle either points at `[offset, offset + size)` of a [`SharedStream`] or owns its bytes. Content
/// of a backed handle is read on first access and cached until [`FileHandle::release`].
pub struct FileHandle {
    offset: u64,
    size: u64,
    source: Option<Arc<SharedStream>>,
    content: Mutex<Option<Arc<[u8]>>>,
    status: EntryStatus,
}

impl Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("offset", &self.offset)
            .field("size", &self.size())
            .field("backed", &self.source.is_some())
            .field("loaded", &self.is_loaded())
            .field("status", &self.status)
            .finish()
    }
}

impl Clone for FileHandle {
    fn clone(&self) -> Self {
        Self {
            offset: self.offset,
            size: self.size,
            source: self.source.clone(),
            content: Mutex::new(self.content.lock().clone()),
            status: self.status,
        }
    }
}

impl FileHandle {
    /// A handle over a region of `source`, nothing is read yet
    pub fn backed(source: Arc<SharedStream>, offset: u64, size: u64) -> Result<Self> {
        if offset.saturating_add(size) > source.len() {
            return Err(Error::TruncatedData {
                offset,
                needed: size,
                available: source.len(),
            });
        }

        Ok(Self {
            offset,
            size,
            source: Some(source),
            content: Mutex::new(None),
            status: EntryStatus::Original,
        })
    }

    /// A handle owning `data`
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        let data: Arc<[u8]> = data.into();
        Self {
            offset: 0,
            size: data.len() as u64,
            source: None,
            content: Mutex::new(Some(data)),
            status: EntryStatus::Original,
        }
    }

    /// Offset of the region inside the backing stream
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the cached content when loaded, otherwise the declared size
    pub fn size(&self) -> u64 {
        match self.content.lock().as_ref() {
            Some(data) => data.len() as u64,
            None => self.size,
        }
    }

    /// Whether the content is currently held in memory
    pub fn is_loaded(&self) -> bool {
        self.content.lock().is_some()
    }

    /// Modification marker
    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Set the modification marker
    pub fn set_status(&mut self, status: EntryStatus) {
        self.status = status;
    }

    /// Whole content of the file, loading it once if needed
    #[instrument(skip(self), fields(offset = self.offset, size = self.size), err)]
    pub fn read(&self) -> Result<Arc<[u8]>> {
        let mut content = self.content.lock();
        if let Some(data) = content.as_ref() {
            return Ok(data.clone());
        }

        let source = self.source.as_ref().ok_or_else(|| {
            Error::CustomError("file handle has neither content nor a backing stream".into())
        })?;
        let mut buffer = vec![0u8; self.size as usize];
        source.read_at(self.offset, &mut buffer)?;
        trace!("loaded {} bytes", buffer.len());

        let data: Arc<[u8]> = buffer.into();
        *content = Some(data.clone());
        Ok(data)
    }

    /// `len` bytes starting at `start` within the file
    ///
    /// An unloaded backed handle reads just that region and stays unloaded.
    pub fn read_range(&self, start: u64, len: u64) -> Result<Vec<u8>> {
        let end = start.saturating_add(len);
        if end > self.size {
            return Err(Error::TruncatedData {
                offset: start,
                needed: len,
                available: self.size,
            });
        }

        let cached = self.content.lock().clone();
        if let Some(data) = cached {
            return Ok(data[start as usize..end as usize].to_vec());
        }

        let source = self.source.as_ref().ok_or_else(|| {
            Error::CustomError("file handle has neither content nor a backing stream".into())
        })?;
        let mut buffer = vec![0u8; len as usize];
        source.read_at(self.offset + start, &mut buffer)?;
        Ok(buffer)
    }

    /// Load the content into memory without returning it
    pub fn materialize(&self) -> Result<()> {
        self.read().map(|_| ())
    }

    /// Drop cached content of a backed handle, owned content is kept
    pub fn release(&self) {
        if self.source.is_some() {
            self.content.lock().take();
        }
    }

    /// Swap in new content, detaching the handle from its backing stream
    pub fn set_content(&mut self, data: impl Into<Arc<[u8]>>) {
        let data: Arc<[u8]> = data.into();
        self.offset = 0;
        self.size = data.len() as u64;
        self.source = None;
        *self.content.get_mut() = Some(data);
    }

    /// Stream the content into `writer` without caching it, returns the number of bytes copied
    pub fn copy_to(&self, writer: &mut impl Write) -> Result<u64> {
        let cached = self.content.lock().clone();
        if let Some(data) = cached {
            writer.write_all(&data)?;
            return Ok(data.len() as u64);
        }

        let source = self.source.as_ref().ok_or_else(|| {
            Error::CustomError("file handle has neither content nor a backing stream".into())
        })?;
        let mut buffer = vec![0u8; COPY_CHUNK.min(self.size as usize)];
        let mut copied = 0u64;
        while copied < self.size {
            let chunk = (self.size - copied).min(COPY_CHUNK as u64) as usize;
            source.read_at(self.offset + copied, &mut buffer[..chunk])?;
            writer.write_all(&buffer[..chunk])?;
            copied += chunk as u64;
        }
        Ok(copied)
    }
}
