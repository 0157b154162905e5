//! file: core/src/error.rs
//! description: error taxonomy for the loading pipeline.
//!
//! Every stage of a load has its own error type (`FetchError`,
//! `CompileError`, `LinkError`, `ExecutionError`). `LoadError` carries the
//! originating error unchanged so callers can match on the failing stage.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level_str = match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        };
        write!(f, "{}", level_str)
    }
}

pub trait LoaderErrorExt {
    fn level(&self) -> Level;
    fn message(&self) -> String;
    fn issuer(&self) -> String;
    /// Module location the error relates to, when known.
    fn location(&self) -> Option<String>;
}

impl fmt::Debug for dyn LoaderErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loc_str = self.location().unwrap_or_else(|| "unknown".to_string());
        write!(
            f,
            "WASMBOOT | {} | {} | {} | {}",
            self.level(),
            loc_str,
            self.issuer(),
            self.message()
        )
    }
}

impl fmt::Display for dyn LoaderErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Nothing exists at the location.
    NotFound,
    /// The byte source cannot serve this kind of location (e.g. `https://` for a file source).
    UnsupportedScheme,
    /// The resource exists but reading it failed.
    Io,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchErrorKind::NotFound => "not found",
            FetchErrorKind::UnsupportedScheme => "unsupported scheme",
            FetchErrorKind::Io => "i/o error",
        };
        f.write_str(s)
    }
}

/// Retrieval of the module binary failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub location: String,
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn new(location: impl Into<String>, kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self { location: location.into(), kind, detail: detail.into() }
    }

    pub fn not_found(location: impl Into<String>) -> Self {
        Self::new(location, FetchErrorKind::NotFound, "no module binary at this location")
    }

    pub fn from_io(location: impl Into<String>, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => FetchErrorKind::NotFound,
            _ => FetchErrorKind::Io,
        };
        Self::new(location, kind, err.to_string())
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch '{}' failed ({}): {}", self.location, self.kind, self.detail)
    }
}

impl std::error::Error for FetchError {}

/// The binary is malformed or fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub detail: String,
    pub location: Option<String>,
}

impl CompileError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into(), location: None }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "compile '{}' failed: {}", loc, self.detail),
            None => write!(f, "compile failed: {}", self.detail),
        }
    }
}

impl std::error::Error for CompileError {}

/// An import declared by the binary is missing from, or does not match, the import object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    pub module: String,
    pub name: String,
    pub detail: String,
    pub location: Option<String>,
}

impl LinkError {
    pub fn new(module: impl Into<String>, name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { module: module.into(), name: name.into(), detail: detail.into(), location: None }
    }

    pub fn unknown_import(module: &str, name: &str) -> Self {
        Self::new(module, name, "unknown import")
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link failed for import {}.{}: {}", self.module, self.name, self.detail)
    }
}

impl std::error::Error for LinkError {}

/// The module's entry point trapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    pub detail: String,
    pub location: Option<String>,
}

impl ExecutionError {
    pub fn trap(detail: impl Into<String>) -> Self {
        Self { detail: detail.into(), location: None }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry point trapped: {}", self.detail)
    }
}

impl std::error::Error for ExecutionError {}

/// Failure reported by an `Instantiator`.
///
/// `Fetch` covers errors yielded by the byte stream while the instantiator
/// was still consuming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstantiateError {
    Fetch(FetchError),
    Compile(CompileError),
    Link(LinkError),
}

impl From<FetchError> for InstantiateError {
    fn from(e: FetchError) -> Self { InstantiateError::Fetch(e) }
}

impl From<CompileError> for InstantiateError {
    fn from(e: CompileError) -> Self { InstantiateError::Compile(e) }
}

impl From<LinkError> for InstantiateError {
    fn from(e: LinkError) -> Self { InstantiateError::Link(e) }
}

impl fmt::Display for InstantiateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstantiateError::Fetch(e) => fmt::Display::fmt(e, f),
            InstantiateError::Compile(e) => fmt::Display::fmt(e, f),
            InstantiateError::Link(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for InstantiateError {}

/// Outcome of a failed `load_module` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Fetch(FetchError),
    Compile(CompileError),
    Link(LinkError),
    Execution(ExecutionError),
}

impl LoadError {
    /// Short name of the failing stage.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Fetch(_) => "FetchError",
            LoadError::Compile(_) => "CompileError",
            LoadError::Link(_) => "LinkError",
            LoadError::Execution(_) => "ExecutionError",
        }
    }
}

impl From<FetchError> for LoadError {
    fn from(e: FetchError) -> Self { LoadError::Fetch(e) }
}

impl From<CompileError> for LoadError {
    fn from(e: CompileError) -> Self { LoadError::Compile(e) }
}

impl From<LinkError> for LoadError {
    fn from(e: LinkError) -> Self { LoadError::Link(e) }
}

impl From<ExecutionError> for LoadError {
    fn from(e: ExecutionError) -> Self { LoadError::Execution(e) }
}

impl From<InstantiateError> for LoadError {
    fn from(e: InstantiateError) -> Self {
        match e {
            InstantiateError::Fetch(e) => LoadError::Fetch(e),
            InstantiateError::Compile(e) => LoadError::Compile(e),
            InstantiateError::Link(e) => LoadError::Link(e),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Fetch(e) => fmt::Display::fmt(e, f),
            LoadError::Compile(e) => fmt::Display::fmt(e, f),
            LoadError::Link(e) => fmt::Display::fmt(e, f),
            LoadError::Execution(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Fetch(e) => Some(e),
            LoadError::Compile(e) => Some(e),
            LoadError::Link(e) => Some(e),
            LoadError::Execution(e) => Some(e),
        }
    }
}

impl LoaderErrorExt for FetchError {
    fn level(&self) -> Level { Level::Error }
    fn message(&self) -> String { format!("{}: {}", self.kind, self.detail) }
    fn issuer(&self) -> String { "wasmboot.fetch".to_string() }
    fn location(&self) -> Option<String> { Some(self.location.clone()) }
}

impl LoaderErrorExt for CompileError {
    fn level(&self) -> Level { Level::Error }
    fn message(&self) -> String { self.detail.clone() }
    fn issuer(&self) -> String { "wasmboot.compile".to_string() }
    fn location(&self) -> Option<String> { self.location.clone() }
}

impl LoaderErrorExt for LinkError {
    fn level(&self) -> Level { Level::Error }
    fn message(&self) -> String { format!("{}.{}: {}", self.module, self.name, self.detail) }
    fn issuer(&self) -> String { "wasmboot.link".to_string() }
    fn location(&self) -> Option<String> { self.location.clone() }
}

impl LoaderErrorExt for ExecutionError {
    fn level(&self) -> Level { Level::Critical }
    fn message(&self) -> String { self.detail.clone() }
    fn issuer(&self) -> String { "wasmboot.run".to_string() }
    fn location(&self) -> Option<String> { self.location.clone() }
}

impl LoaderErrorExt for LoadError {
    fn level(&self) -> Level {
        match self {
            LoadError::Fetch(e) => e.level(),
            LoadError::Compile(e) => e.level(),
            LoadError::Link(e) => e.level(),
            LoadError::Execution(e) => e.level(),
        }
    }

    fn message(&self) -> String {
        match self {
            LoadError::Fetch(e) => e.message(),
            LoadError::Compile(e) => e.message(),
            LoadError::Link(e) => e.message(),
            LoadError::Execution(e) => e.message(),
        }
    }

    fn issuer(&self) -> String {
        match self {
            LoadError::Fetch(e) => e.issuer(),
            LoadError::Compile(e) => e.issuer(),
            LoadError::Link(e) => e.issuer(),
            LoadError::Execution(e) => e.issuer(),
        }
    }

    fn location(&self) -> Option<String> {
        match self {
            LoadError::Fetch(e) => LoaderErrorExt::location(e),
            LoadError::Compile(e) => LoaderErrorExt::location(e),
            LoadError::Link(e) => LoaderErrorExt::location(e),
            LoadError::Execution(e) => LoaderErrorExt::location(e),
        }
    }
}
