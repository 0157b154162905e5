//! file: core/src/binary.rs
//! description: retrieved module images and header validation.

use std::sync::Arc;

use futures::StreamExt;

use crate::error::{CompileError, FetchError};
use crate::location::ModuleLocation;
use crate::source::ByteStream;

/// `\0asm`
pub const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

pub const WASM_VERSION: u32 = 1;

/// A fully retrieved module binary. Immutable once collected.
#[derive(Debug, Clone)]
pub struct ModuleBinary {
    location: ModuleLocation,
    bytes: Arc<[u8]>,
}

impl ModuleBinary {
    pub fn new(location: ModuleLocation, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { location, bytes: bytes.into() }
    }

    /// Drain `stream` into a single image. Instantiators that cannot compile
    /// incrementally use this to buffer the whole binary first.
    pub async fn collect(mut stream: ByteStream) -> Result<Self, FetchError> {
        let location = stream.location().clone();
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Self::new(location, buf))
    }

    pub fn location(&self) -> &ModuleLocation {
        &self.location
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check the WebAssembly preamble and return the binary format version.
pub fn validate_wasm_header(bytes: &[u8]) -> Result<u32, CompileError> {
    if bytes.len() < 8 {
        return Err(CompileError::new(format!(
            "binary truncated: {} bytes, header needs 8",
            bytes.len()
        )));
    }
    if bytes[0..4] != WASM_MAGIC {
        return Err(CompileError::new("bad magic number, not a WebAssembly binary"));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != WASM_VERSION {
        return Err(CompileError::new(format!("unsupported binary version {}", version)));
    }
    Ok(version)
}
