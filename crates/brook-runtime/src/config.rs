//! Runtime configuration.
//!
//! [`RuntimeOptions`] is what a [`Runtime`](crate::Runtime) is built from.
//! [`Manifest`] is the optional `brook.toml` file layered on top of the
//! defaults; command-line flags are applied last by the CLI.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::console::Console;

/// Default port for `http.createServer`.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default bind address for `http.createServer`.
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Options controlling a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Directory containing `modules/` for `require`.
    pub base_path: PathBuf,
    /// Address the HTTP listener binds to.
    pub http_host: String,
    /// Port the HTTP listener binds to (0 picks a free port).
    pub http_port: u16,
    /// Snapshot exposed as `process.argv`.
    pub argv: Vec<String>,
    /// Sink for `console.log` and script diagnostics.
    pub console: Console,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            argv: brook_posix::process::argv(),
            console: Console::stdout(),
        }
    }
}

impl RuntimeOptions {
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_http_host(mut self, host: impl Into<String>) -> Self {
        self.http_host = host.into();
        self
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn with_argv(mut self, argv: Vec<String>) -> Self {
        self.argv = argv;
        self
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Overlay the values a manifest sets.
    pub fn apply_manifest(mut self, manifest: &Manifest) -> Self {
        if let Some(base_path) = &manifest.runtime.base_path {
            self.base_path = base_path.clone();
        }
        if let Some(host) = &manifest.http.host {
            self.http_host = host.clone();
        }
        if let Some(port) = manifest.http.port {
            self.http_port = port;
        }
        self
    }
}

/// Errors reading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of a `brook.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub runtime: RuntimeSection,
    pub http: HttpSection,
}

/// `[runtime]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSection {
    pub base_path: Option<PathBuf>,
}

/// `[http]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Manifest {
    /// File name looked up by [`Manifest::find`].
    pub const FILE_NAME: &'static str = "brook.toml";

    /// Parse manifest text. Relative paths are kept as written.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a manifest file. A relative `base_path` is resolved against the
    /// directory containing the file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let (Some(base_path), Some(dir)) = (&manifest.runtime.base_path, path.parent()) {
            if base_path.is_relative() {
                manifest.runtime.base_path = Some(dir.join(base_path));
            }
        }
        Ok(manifest)
    }

    /// Walk up from `start` looking for `brook.toml`.
    pub fn find(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(Self::FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}
