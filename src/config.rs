//! Flat `name=value` config store.
//!
//! A store is produced by [`load_file`] or [`load_bytes`] and is read-only
//! afterwards. All entries are views into one owned buffer; the entry table
//! only records offsets into it.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::LoadError;

const NEWLINE: u8 = b'\n';
const SEPARATOR: u8 = b'=';

/// Offsets of one entry inside the store buffer.
///
/// `name` is `start..name_end`. When `name_end < end` the byte at `name_end`
/// is the separator and the value is `name_end + 1..end`; otherwise the line
/// had no separator and the value is absent.
#[derive(Clone, Copy, Debug)]
struct Span {
    start: usize,
    name_end: usize,
    end: usize,
}

impl Span {
    fn resolve(self, buf: &[u8]) -> Entry<'_> {
        let value = (self.name_end < self.end).then(|| &buf[self.name_end + 1..self.end]);
        Entry {
            name: &buf[self.start..self.name_end],
            value,
        }
    }
}

/// One parsed line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry<'a> {
    pub name: &'a [u8],
    /// `None` when the line had no `=`.
    pub value: Option<&'a [u8]>,
}

/// Result of a name lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a [u8]),
    /// The name exists but its line had no `=`.
    NoValue,
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn value(self) -> Option<&'a [u8]> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NoValue | Lookup::NotFound => None,
        }
    }

    /// UTF-8 view of a found value. Non-UTF-8 values yield `None`.
    pub fn as_str(self) -> Option<&'a str> {
        self.value().and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn is_found(self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

#[derive(Debug)]
pub struct Store {
    buf: Box<[u8]>,
    spans: Vec<Span>,
}

impl Store {
    fn from_owned(buf: Vec<u8>) -> Result<Self, LoadError> {
        let spans = index_entries(&buf)?;
        Ok(Store {
            buf: buf.into_boxed_slice(),
            spans,
        })
    }

    /// Looks up `name` by exact byte match. Duplicate names resolve to the
    /// first entry in buffer order.
    pub fn get(&self, name: impl AsRef<[u8]>) -> Lookup<'_> {
        let name = name.as_ref();
        match self.entries().find(|entry| entry.name == name) {
            Some(Entry {
                value: Some(value), ..
            }) => Lookup::Found(value),
            Some(_) => Lookup::NoValue,
            None => Lookup::NotFound,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).as_str()
    }

    pub fn entries(&self) -> Entries<'_> {
        Entries {
            buf: &self.buf,
            spans: self.spans.iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Releases the store and its buffer.
    pub fn close(self) {
        debug!("Closing config store with {} entries", self.spans.len());
    }
}

impl<'a> IntoIterator for &'a Store {
    type Item = Entry<'a>;
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

/// Entries of a [`Store`] in buffer order.
#[derive(Clone, Debug)]
pub struct Entries<'a> {
    buf: &'a [u8],
    spans: std::slice::Iter<'a, Span>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.spans.next().map(|span| span.resolve(self.buf))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.spans.size_hint()
    }
}

impl ExactSizeIterator for Entries<'_> {}

/// Loads a config file. The file handle is closed before this returns,
/// whichever way it returns.
pub fn load_file(path: impl AsRef<Path>) -> Result<Store, LoadError> {
    let path = path.as_ref();
    let open_failed = |source: io::Error| {
        warn!("Failed to open config file {}: {}", path.display(), source);
        LoadError::OpenFailed {
            path: path.to_path_buf(),
            source,
        }
    };
    let mut file = File::open(path).map_err(open_failed)?;

    // Directories open fine on Unix but report a bogus size when seeked.
    let metadata = file.metadata().map_err(open_failed)?;
    if !metadata.is_file() {
        return Err(open_failed(io::Error::new(
            ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }

    let buf = read_source(&mut file, path)?;
    drop(file);

    let size = buf.len();
    let store = Store::from_owned(buf)?;
    debug!(
        "Loaded config file {} ({} bytes, {} entries)",
        path.display(),
        size,
        store.len()
    );
    Ok(store)
}

fn read_source<S: Read + Seek>(reader: &mut S, path: &Path) -> Result<Vec<u8>, LoadError> {
    let size = measure(reader).map_err(|source| {
        warn!("Failed to seek config file {}: {}", path.display(), source);
        LoadError::SeekFailed {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let mut buf = allocate(size)?;
    fill_buffer(reader, &mut buf, path)?;
    Ok(buf)
}

/// Parses an in-memory buffer into a store. The bytes are copied; the caller
/// keeps ownership of `bytes`.
pub fn load_bytes(bytes: &[u8]) -> Result<Store, LoadError> {
    let mut buf = allocate(bytes.len() as u64)?;
    buf.copy_from_slice(bytes);
    let store = Store::from_owned(buf)?;
    debug!(
        "Loaded config buffer ({} bytes, {} entries)",
        bytes.len(),
        store.len()
    );
    Ok(store)
}

// Size comes from seeking to the end, then the cursor is put back at 0.
fn measure<S: Seek>(file: &mut S) -> io::Result<u64> {
    let size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok(size)
}

fn allocate(size: u64) -> Result<Vec<u8>, LoadError> {
    let len = usize::try_from(size).map_err(|_| {
        warn!("Config of {} bytes does not fit in memory", size);
        LoadError::AllocFailed { size, source: None }
    })?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|source| {
        warn!("Failed to allocate {} bytes for config", size);
        LoadError::AllocFailed {
            size,
            source: Some(source),
        }
    })?;
    buf.resize(len, 0);
    Ok(buf)
}

fn fill_buffer<R: Read>(reader: &mut R, buf: &mut [u8], path: &Path) -> Result<(), LoadError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                warn!(
                    "Config file {} ended after {} of {} bytes",
                    path.display(),
                    filled,
                    buf.len()
                );
                return Err(LoadError::IncompleteRead {
                    path: path.to_path_buf(),
                    expected: buf.len() as u64,
                    read: filled as u64,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                warn!("Failed to read config file {}: {}", path.display(), source);
                return Err(LoadError::ReadFailed {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(())
}

// Empty segments are skipped wherever they occur, so a trailing newline or
// blank lines never produce entries.
fn index_entries(buf: &[u8]) -> Result<Vec<Span>, LoadError> {
    let segments = buf
        .split(|&b| b == NEWLINE)
        .filter(|segment| !segment.is_empty())
        .count();
    let mut spans = Vec::new();
    spans
        .try_reserve_exact(segments)
        .map_err(|source| LoadError::ParseAllocFailed { segments, source })?;

    let mut start = 0;
    for segment in buf.split(|&b| b == NEWLINE) {
        let end = start + segment.len();
        if !segment.is_empty() {
            let name_end = segment
                .iter()
                .position(|&b| b == SEPARATOR)
                .map_or(end, |pos| start + pos);
            spans.push(Span {
                start,
                name_end,
                end,
            });
        }
        start = end + 1;
    }
    Ok(spans)
}
