use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

/// Where the module binary is loaded from when no path is given.
pub const DEFAULT_MODULE_PATH: &str = "./main.wasm";

/// A path or URL identifying a module binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleLocation(String);

impl ModuleLocation {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parsed URL when the location is written as one. Plain paths, including
    /// Windows drive paths such as `C:\mods\main.wasm`, are not URLs.
    fn url(&self) -> Option<Url> {
        if !self.0.contains("://") {
            return None;
        }
        Url::parse(&self.0).ok().filter(|u| u.scheme().len() > 1)
    }

    /// URL scheme (`file`, `https`, ...) when the location is written as a URL.
    pub fn scheme(&self) -> Option<String> {
        self.url().map(|u| u.scheme().to_string())
    }

    /// Filesystem path for plain paths and `file://` URLs. Percent-escapes
    /// are decoded and a `localhost` host is accepted.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        match self.url() {
            None => Some(PathBuf::from(&self.0)),
            Some(url) if url.scheme() == "file" => url.to_file_path().ok(),
            Some(_) => None,
        }
    }
}

impl Default for ModuleLocation {
    fn default() -> Self {
        Self::new(DEFAULT_MODULE_PATH)
    }
}

impl From<&str> for ModuleLocation {
    fn from(s: &str) -> Self { Self::new(s) }
}

impl From<String> for ModuleLocation {
    fn from(s: String) -> Self { Self(s) }
}

/// Paths must be valid UTF-8; the original path is handed back otherwise.
impl TryFrom<PathBuf> for ModuleLocation {
    type Error = PathBuf;

    fn try_from(p: PathBuf) -> Result<Self, PathBuf> {
        p.into_os_string()
            .into_string()
            .map(Self)
            .map_err(PathBuf::from)
    }
}

impl std::fmt::Display for ModuleLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
