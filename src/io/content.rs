//! Lazily opened, re-openable byte content.
//!
//! A [`ContentSource`] names some bytes without holding them: a file on disk, a
//! window into a stream shared with other sources, an entry in a shared ZIP
//! archive, or an in-memory buffer. Window and archive sources mutate a cursor
//! owned by the shared handle; every read goes through [`CursorGuard`], which
//! captures the cursor on entry and restores it on every exit path.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::warn;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Error, Result};
use crate::util::guess_media_type;

/// Upper bound on buffer space reserved from a ZIP entry's declared size.
const MAX_PREALLOC: u64 = 1 << 20;

/// A readable, seekable stream that can be moved across threads.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A shared cursor whose position can be captured and restored.
pub(crate) trait SharedCursor {
    type Mark;

    fn mark(&mut self) -> io::Result<Self::Mark>;

    fn restore(&mut self, mark: Self::Mark) -> io::Result<()>;
}

impl SharedCursor for Box<dyn ReadSeek> {
    type Mark = u64;

    fn mark(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn restore(&mut self, mark: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(mark)).map(|_| ())
    }
}

/// Scoped access to a shared cursor.
///
/// The cursor is captured by [`CursorGuard::acquire`] and put back when the
/// guard drops, including when the caller bails out early with `?`.
pub(crate) struct CursorGuard<'a, C: SharedCursor> {
    target: &'a mut C,
    mark: Option<C::Mark>,
}

impl<'a, C: SharedCursor> CursorGuard<'a, C> {
    pub(crate) fn acquire(target: &'a mut C) -> io::Result<Self> {
        let mark = target.mark()?;
        Ok(Self {
            target,
            mark: Some(mark),
        })
    }
}

impl<C: SharedCursor> Deref for CursorGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.target
    }
}

impl<C: SharedCursor> DerefMut for CursorGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.target
    }
}

impl<C: SharedCursor> Drop for CursorGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(mark) = self.mark.take()
            && let Err(e) = self.target.restore(mark)
        {
            warn!("failed to restore shared cursor: {e}");
        }
    }
}

// --- Shared handles ---

/// A seekable stream shared by every [`WindowContent`] cut from it.
#[derive(Clone)]
pub struct SharedStream {
    inner: Arc<Mutex<Box<dyn ReadSeek>>>,
}

impl SharedStream {
    pub fn new<R: Read + Seek + Send + 'static>(reader: R) -> Self {
        Self::from_boxed(Box::new(reader))
    }

    pub fn from_boxed(reader: Box<dyn ReadSeek>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(reader)),
        }
    }

    /// Exclusive access to the underlying stream.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn ReadSeek>> {
        self.inner.lock()
    }

    /// Current position of the shared stream.
    pub fn position(&self) -> io::Result<u64> {
        self.lock().stream_position()
    }

    /// Total length of the stream. The position is left untouched.
    pub fn total_len(&self) -> io::Result<u64> {
        let mut stream = self.lock();
        let mut guard = CursorGuard::acquire(&mut *stream)?;
        guard.seek(SeekFrom::End(0))
    }

    /// Returns true if both handles refer to the same stream.
    pub fn same_stream(&self, other: &SharedStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copy `length` bytes starting at `offset` into a private buffer.
    pub fn read_window(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        let mut stream = self.lock();
        let mut guard = CursorGuard::acquire(&mut *stream)?;
        guard.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(length as usize);
        (&mut **guard).take(length).read_to_end(&mut buf)?;
        if (buf.len() as u64) < length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("window {offset}+{length} runs past end of stream"),
            ));
        }
        Ok(buf)
    }
}

impl fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStream")
            .field("handle", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

/// ZIP archive state: the archive plus a "current entry" cursor.
pub struct ArchiveState {
    archive: ZipArchive<Box<dyn ReadSeek>>,
    current: Option<String>,
}

impl ArchiveState {
    /// Name of the current entry, if any.
    pub fn current_entry(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Move the cursor to entry `name`.
    pub fn select(&mut self, name: &str) -> Result<()> {
        if self.archive.index_for_name(name).is_none() {
            return Err(Error::Reference(format!("no entry named {name} in archive")));
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Read the whole current entry.
    pub fn read_current(&mut self) -> Result<Vec<u8>> {
        let name = self
            .current
            .clone()
            .ok_or_else(|| Error::Reference("archive has no current entry".into()))?;
        let mut entry = match self.archive.by_name(&name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(Error::Reference(format!("archive entry {name} vanished")));
            }
            Err(e) => return Err(e.into()),
        };
        // the declared size is untrusted; read_to_end grows past the cap
        let mut data = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
        entry.read_to_end(&mut data)?;
        Ok(data)
    }

    fn entry_size(&mut self, name: &str) -> Result<u64> {
        match self.archive.by_name(name) {
            Ok(entry) => Ok(entry.size()),
            Err(ZipError::FileNotFound) => {
                Err(Error::Reference(format!("archive entry {name} vanished")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl SharedCursor for ArchiveState {
    type Mark = Option<String>;

    fn mark(&mut self) -> io::Result<Option<String>> {
        Ok(self.current.clone())
    }

    fn restore(&mut self, mark: Option<String>) -> io::Result<()> {
        self.current = mark;
        Ok(())
    }
}

/// A ZIP archive shared by every [`ArchiveContent`] that points into it.
#[derive(Clone)]
pub struct SharedArchive {
    inner: Arc<Mutex<ArchiveState>>,
}

impl SharedArchive {
    pub fn new<R: Read + Seek + Send + 'static>(reader: R) -> Result<Self> {
        let reader: Box<dyn ReadSeek> = Box::new(reader);
        let archive = ZipArchive::new(reader)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(ArchiveState {
                archive,
                current: None,
            })),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }

    /// Exclusive access to the archive and its cursor.
    pub fn lock(&self) -> MutexGuard<'_, ArchiveState> {
        self.inner.lock()
    }

    pub fn current_entry(&self) -> Option<String> {
        self.lock().current.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().archive.index_for_name(name).is_some()
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.lock().archive.file_names().map(str::to_string).collect()
    }

    pub fn same_archive(&self, other: &SharedArchive) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SharedArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedArchive")
            .field("handle", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

// --- Variants ---

/// Content backed by a filesystem path. Each open gets its own handle.
#[derive(Debug, Clone)]
pub struct FileContent {
    path: PathBuf,
    name: String,
    mime: String,
}

impl FileContent {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::Reference(format!("file {} does not exist", path.display())));
        }
        let name = path.to_string_lossy().into_owned();
        let mime = guess_media_type(&name).to_string();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            mime,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A byte range of a [`SharedStream`].
#[derive(Debug, Clone)]
pub struct WindowContent {
    name: String,
    mime: String,
    stream: SharedStream,
    offset: u64,
    length: u64,
}

impl WindowContent {
    /// Create a window, checking that it lies inside the stream.
    pub fn new(name: impl Into<String>, stream: SharedStream, offset: u64, length: u64) -> Result<Self> {
        let available = stream.total_len()?;
        if offset.checked_add(length).is_none_or(|end| end > available) {
            return Err(Error::Reference(format!(
                "window {offset}+{length} exceeds stream length {available}"
            )));
        }
        Ok(Self::new_unchecked(name, stream, offset, length))
    }

    /// Create a window whose bounds the caller has already validated.
    ///
    /// Used while the stream is locked by a parser, where [`WindowContent::new`]
    /// would deadlock.
    pub(crate) fn new_unchecked(
        name: impl Into<String>,
        stream: SharedStream,
        offset: u64,
        length: u64,
    ) -> Self {
        let name = name.into();
        let mime = guess_media_type(&name).to_string();
        Self {
            name,
            mime,
            stream,
            offset,
            length,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn stream(&self) -> &SharedStream {
        &self.stream
    }

    /// Read the window's bytes. The shared stream position is preserved.
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(self.stream.read_window(self.offset, self.length)?)
    }
}

/// An entry of a [`SharedArchive`].
#[derive(Debug, Clone)]
pub struct ArchiveContent {
    name: String,
    mime: String,
    archive: SharedArchive,
}

impl ArchiveContent {
    /// Point at entry `name`, which must exist in the archive.
    pub fn new(archive: SharedArchive, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !archive.contains(&name) {
            return Err(Error::Reference(format!("no entry named {name} in archive")));
        }
        let mime = guess_media_type(&name).to_string();
        Ok(Self { name, mime, archive })
    }

    pub fn archive(&self) -> &SharedArchive {
        &self.archive
    }

    /// Read the entry. The archive's current entry is preserved.
    pub fn read(&self) -> Result<Vec<u8>> {
        let mut state = self.archive.lock();
        let mut guard = CursorGuard::acquire(&mut *state)?;
        guard.select(&self.name)?;
        guard.read_current()
    }
}

/// Bytes already held in memory.
#[derive(Debug, Clone)]
pub struct MemoryContent {
    name: String,
    mime: String,
    data: Arc<[u8]>,
}

impl MemoryContent {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let mime = guess_media_type(&name).to_string();
        let data: Vec<u8> = data.into();
        Self {
            name,
            mime,
            data: Arc::from(data),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Lazily opened content: a file, a window of a shared stream, an archive
/// entry, or an in-memory buffer.
///
/// Equality is semantic: two sources are equal when they name the same file,
/// the same window of the same stream, the same entry of the same archive, or
/// the same shared buffer.
#[derive(Debug, Clone)]
pub enum ContentSource {
    File(FileContent),
    Window(WindowContent),
    Entry(ArchiveContent),
    Memory(MemoryContent),
}

impl ContentSource {
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        FileContent::new(path).map(Self::File)
    }

    pub fn window(name: impl Into<String>, stream: SharedStream, offset: u64, length: u64) -> Result<Self> {
        WindowContent::new(name, stream, offset, length).map(Self::Window)
    }

    pub fn archive_entry(archive: SharedArchive, name: impl Into<String>) -> Result<Self> {
        ArchiveContent::new(archive, name).map(Self::Entry)
    }

    pub fn memory(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Memory(MemoryContent::new(name, data))
    }

    /// Override the guessed media type.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        let mime = mime.into();
        match &mut self {
            Self::File(c) => c.mime = mime,
            Self::Window(c) => c.mime = mime,
            Self::Entry(c) => c.mime = mime,
            Self::Memory(c) => c.mime = mime,
        }
        self
    }

    /// Name of the content, commonly a file name.
    pub fn name(&self) -> &str {
        match self {
            Self::File(c) => &c.name,
            Self::Window(c) => &c.name,
            Self::Entry(c) => &c.name,
            Self::Memory(c) => &c.name,
        }
    }

    /// Media type of the content.
    pub fn mime(&self) -> &str {
        match self {
            Self::File(c) => &c.mime,
            Self::Window(c) => &c.mime,
            Self::Entry(c) => &c.mime,
            Self::Memory(c) => &c.mime,
        }
    }

    /// Open an independent reader over the content.
    ///
    /// Window and archive sources copy their bytes into a private buffer; the
    /// shared cursor is restored before this returns.
    pub fn open_stream(&self) -> Result<Box<dyn Read + Send>> {
        match self {
            Self::File(c) => {
                let file = File::open(&c.path).map_err(|e| {
                    Error::Reference(format!("cannot open {}: {e}", c.path.display()))
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
            Self::Window(c) => Ok(Box::new(Cursor::new(c.read()?))),
            Self::Entry(c) => Ok(Box::new(Cursor::new(c.read()?))),
            Self::Memory(c) => Ok(Box::new(Cursor::new(Arc::clone(&c.data)))),
        }
    }

    /// Return shared resources to their state before [`ContentSource::open_stream`].
    ///
    /// Cursor restoration already happens inside `open_stream`, so this never
    /// moves anything; it is kept for callers that pair every open with a reset.
    pub fn reset(&self) -> Result<()> {
        Ok(())
    }

    /// Number of bytes available.
    pub fn available(&self) -> Result<u64> {
        match self {
            Self::File(c) => Ok(std::fs::metadata(&c.path)?.len()),
            Self::Window(c) => Ok(c.length),
            Self::Entry(c) => c.archive.lock().entry_size(&c.name),
            Self::Memory(c) => Ok(c.data.len() as u64),
        }
    }

    /// Read all bytes of the content.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        match self {
            Self::Window(c) => c.read(),
            Self::Entry(c) => c.read(),
            Self::Memory(c) => Ok(c.data.to_vec()),
            Self::File(_) => {
                let mut data = Vec::new();
                self.open_stream()?.read_to_end(&mut data)?;
                self.reset()?;
                Ok(data)
            }
        }
    }

    /// Copy up to `limit` bytes (all when `None`) to `out`.
    ///
    /// Returns the number of bytes copied.
    pub fn copy_to(&self, out: &mut dyn Write, limit: Option<u64>) -> Result<u64> {
        let mut stream = self.open_stream()?;
        let copied = match limit {
            Some(limit) => io::copy(&mut stream.take(limit), out)?,
            None => io::copy(&mut stream, out)?,
        };
        self.reset()?;
        Ok(copied)
    }
}

impl PartialEq for ContentSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::File(a), Self::File(b)) => a.path == b.path,
            (Self::Window(a), Self::Window(b)) => {
                a.stream.same_stream(&b.stream) && a.offset == b.offset && a.length == b.length
            }
            (Self::Entry(a), Self::Entry(b)) => {
                a.archive.same_archive(&b.archive) && a.name == b.name
            }
            (Self::Memory(a), Self::Memory(b)) => Arc::ptr_eq(&a.data, &b.data),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(data: &[u8]) -> SharedStream {
        SharedStream::new(Cursor::new(data.to_vec()))
    }

    #[test]
    fn test_cursor_guard_restores_on_error() {
        let shared = stream(b"0123456789");
        shared.lock().seek(SeekFrom::Start(4)).unwrap();

        let result = shared.read_window(8, 5);
        assert!(result.is_err());
        assert_eq!(shared.position().unwrap(), 4);
    }

    #[test]
    fn test_window_rejects_out_of_range() {
        let shared = stream(b"abc");
        assert!(matches!(
            WindowContent::new("w", shared.clone(), 2, 2),
            Err(Error::Reference(_))
        ));
        assert!(WindowContent::new("w", shared, 1, 2).is_ok());
    }

    #[test]
    fn test_window_equality_is_semantic() {
        let shared = stream(b"abcdef");
        let a = ContentSource::window("a.bin", shared.clone(), 1, 3).unwrap();
        let b = ContentSource::window("b.bin", shared.clone(), 1, 3).unwrap();
        let c = ContentSource::window("a.bin", shared, 2, 3).unwrap();
        let other = ContentSource::window("a.bin", stream(b"abcdef"), 1, 3).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, other);
    }

    #[test]
    fn test_memory_content() {
        let content = ContentSource::memory("page.gif", b"GIF89a".to_vec());
        assert_eq!(content.mime(), "image/gif");
        assert_eq!(content.available().unwrap(), 6);
        assert_eq!(content.read_all().unwrap(), b"GIF89a");
        assert_eq!(content, content.clone());
        assert_ne!(content, ContentSource::memory("page.gif", b"GIF89a".to_vec()));
    }

    #[test]
    fn test_copy_to_with_limit() {
        let content = ContentSource::window("w", stream(b"hello world"), 6, 5).unwrap();
        let mut out = Vec::new();
        assert_eq!(content.copy_to(&mut out, Some(3)).unwrap(), 3);
        assert_eq!(out, b"wor");
    }
}
