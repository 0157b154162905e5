//! file: core/src/source.rs
//! description: byte sources that retrieve module binaries.
//!
//! A `ByteSource` turns a `ModuleLocation` into a `ByteStream`. The stream is
//! handed to the instantiator as-is, so a streaming compiler can start work
//! before the last chunk has arrived.

use std::collections::HashMap;
use std::io::Read;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::{FetchError, FetchErrorKind};
use crate::location::ModuleLocation;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Chunks of a module binary as they are retrieved.
pub struct ByteStream {
    location: ModuleLocation,
    inner: BoxStream<'static, Result<Vec<u8>, FetchError>>,
}

impl ByteStream {
    pub fn new(location: ModuleLocation, inner: BoxStream<'static, Result<Vec<u8>, FetchError>>) -> Self {
        Self { location, inner }
    }

    /// A stream that yields `bytes` in chunks of at most `chunk_size`.
    pub fn from_bytes(location: ModuleLocation, bytes: &[u8], chunk_size: usize) -> Self {
        let chunks: Vec<Result<Vec<u8>, FetchError>> =
            bytes.chunks(chunk_size.max(1)).map(|c| Ok(c.to_vec())).collect();
        Self::new(location, stream::iter(chunks).boxed())
    }

    pub fn location(&self) -> &ModuleLocation {
        &self.location
    }
}

impl Stream for ByteStream {
    type Item = Result<Vec<u8>, FetchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream").field("location", &self.location).finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Begin retrieving the binary at `location`.
    ///
    /// Errors detected up front (missing resource, unsupported scheme) are
    /// returned here; errors hit while reading surface as stream items.
    async fn fetch(&self, location: &ModuleLocation) -> Result<ByteStream, FetchError>;
}

/// Reads module binaries from the local filesystem.
///
/// Accepts plain paths and `file://` URLs. The file is read lazily, one
/// chunk per poll.
#[derive(Debug, Clone)]
pub struct FileSource {
    chunk_size: usize,
}

impl FileSource {
    pub fn new() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE }
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn fetch(&self, location: &ModuleLocation) -> Result<ByteStream, FetchError> {
        let path = location.to_file_path().ok_or_else(|| {
            FetchError::new(
                location.as_str(),
                FetchErrorKind::UnsupportedScheme,
                format!("scheme '{}' is not served by the file source", location.scheme().unwrap_or_default()),
            )
        })?;

        let file = std::fs::File::open(&path).map_err(|e| FetchError::from_io(location.as_str(), &e))?;
        let meta = file.metadata().map_err(|e| FetchError::from_io(location.as_str(), &e))?;
        if !meta.is_file() {
            return Err(FetchError::new(location.as_str(), FetchErrorKind::NotFound, "not a regular file"));
        }

        let chunk_size = self.chunk_size;
        let loc = location.to_string();
        let chunks = stream::unfold(Some(file), move |state| {
            let loc = loc.clone();
            async move {
                let mut file = state?;
                let mut buf = vec![0u8; chunk_size];
                loop {
                    match file.read(&mut buf) {
                        Ok(0) => return None,
                        Ok(n) => {
                            buf.truncate(n);
                            return Some((Ok(buf), Some(file)));
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        // stop after the first read failure
                        Err(e) => return Some((Err(FetchError::from_io(loc, &e)), None)),
                    }
                }
            }
        });

        Ok(ByteStream::new(location.clone(), chunks.boxed()))
    }
}

/// Serves module binaries registered in memory, keyed by location string.
///
/// Useful for images embedded with `include_bytes!` and for tests.
#[derive(Debug, Clone)]
pub struct MemorySource {
    images: HashMap<String, Arc<[u8]>>,
    chunk_size: usize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self { images: HashMap::new(), chunk_size: DEFAULT_CHUNK_SIZE }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Register `bytes` under `location`, replacing any earlier image.
    pub fn insert(&mut self, location: impl Into<ModuleLocation>, bytes: impl Into<Arc<[u8]>>) -> &mut Self {
        self.images.insert(location.into().as_str().to_string(), bytes.into());
        self
    }

    pub fn contains(&self, location: &ModuleLocation) -> bool {
        self.images.contains_key(location.as_str())
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn fetch(&self, location: &ModuleLocation) -> Result<ByteStream, FetchError> {
        let bytes = self
            .images
            .get(location.as_str())
            .ok_or_else(|| FetchError::not_found(location.as_str()))?;
        Ok(ByteStream::from_bytes(location.clone(), bytes, self.chunk_size))
    }
}
