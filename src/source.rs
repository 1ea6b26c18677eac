//! What is being decoded, and how to tell whether two requests target the
//! same thing.

use crate::error::{J2kViewError, Result};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// A source to decode, with its identity fixed when the handle is made.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    origin: Origin,
    id: SourceId,
}

#[derive(Debug, Clone)]
enum Origin {
    /// A file on disk, read on every decode.
    Path(PathBuf),
    /// An in-memory codestream or JP2 file.
    Bytes(Arc<[u8]>),
}

impl SourceHandle {
    /// The path is canonicalised now; a file that does not exist yet keeps
    /// the path as given.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = SourceId::Path(fs::canonicalize(&path).unwrap_or_else(|_| path.clone()));
        Self {
            origin: Origin::Path(path),
            id,
        }
    }

    /// Hashes the buffer once, here.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        let id = SourceId::Content {
            len: bytes.len(),
            hash: hasher.finish(),
        };
        Self {
            origin: Origin::Bytes(bytes),
            id,
        }
    }

    /// Drains a stream. The handle is identified by content, so two
    /// streams carrying the same bytes are the same source.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(Self::from_bytes(buf))
    }

    /// Only `file:` URLs are accepted.
    pub fn from_url(url: &Url) -> Result<Self> {
        if url.scheme() != "file" {
            return Err(J2kViewError::UnsupportedUrl(url.scheme().to_string()));
        }
        url.to_file_path()
            .map(Self::from_path)
            .map_err(|_| J2kViewError::UnsupportedUrl(url.to_string()))
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::Path(p) => Some(p),
            Origin::Bytes(_) => None,
        }
    }

    pub fn read_bytes(&self) -> Result<Arc<[u8]>> {
        match &self.origin {
            Origin::Path(p) => Ok(fs::read(p)?.into()),
            Origin::Bytes(b) => Ok(Arc::clone(b)),
        }
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn describe(&self) -> String {
        match &self.origin {
            Origin::Path(p) => p.display().to_string(),
            Origin::Bytes(b) => format!("<{} bytes in memory>", b.len()),
        }
    }
}

/// Comparable snapshot of a [`SourceHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    Path(PathBuf),
    Content { len: usize, hash: u64 },
}
