//! Configuration loading and validation.
//!
//! Sources are merged in order, later ones winning:
//! 1. built-in defaults,
//! 2. a TOML file (`--config <path>`, otherwise `config.toml` in the platform
//!    config directory if it exists),
//! 3. environment variables prefixed with `SHELF_`, using `__` to reach
//!    nested keys (`SHELF_LIBRARY__UPLOAD_DIR=/srv/books`).
//!
//! ```toml
//! [library]
//! upload_dir = "/srv/shelf/books"
//! database = "/srv/shelf/shelf.sqlite"
//!
//! [covers]
//! mode = "stored"        # or "inline"
//! require_image = true
//!
//! [updates]
//! mode = "merge"         # or "replace"
//!
//! [server]
//! listen = "0.0.0.0:8080"
//! max_upload_bytes = 104857600
//! embed_covers = false   # inline covers in book JSON as `coverBlob`
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use shelf_library::{CoverMode, Settings, UpdateMode};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "SHELF_";
const CONFIG_FILE: &str = "config.toml";
/// Used when the platform has no notion of a per-user data directory.
const FALLBACK_DATA_DIR: &str = "/var/lib/shelf";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "shelf")
}

fn data_dir() -> PathBuf {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory uploaded books (and stored covers) are written to.
    pub upload_dir: PathBuf,
    /// SQLite database file holding the book records.
    pub database: PathBuf,
}
impl Default for LibraryConfig {
    fn default() -> Self {
        let data = data_dir();
        Self { upload_dir: data.join("books"), database: data.join("shelf.sqlite") }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverConfig {
    pub mode: CoverMode,
    /// Reject covers that don't look like PNG, JPEG, GIF or WebP.
    pub require_image: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Semantics of `PATCH /api/books/{id}`.
    pub mode: UpdateMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Largest accepted request body; e-books easily exceed the usual 2 MiB.
    pub max_upload_bytes: usize,
    /// Send each book's cover, base64 encoded, along with the book.
    pub embed_covers: bool,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            embed_covers: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub library: LibraryConfig,
    pub covers: CoverConfig,
    pub updates: UpdateConfig,
    pub server: ServerConfig,
}
impl Config {
    /// Load and validate configuration from all sources.
    ///
    /// An explicitly named file must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::FileNotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE)),
        };
        if let Some(file) = &file {
            tracing::debug!(path = %file.display(), "Reading configuration file (if present)");
        }
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// The merged figment, before extraction.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, path) in [("library.upload_dir", &self.library.upload_dir), ("library.database", &self.library.database)] {
            if !path.is_absolute() {
                exn::bail!(ErrorKind::Invalid(format!("{key} must be an absolute path, got {}", path.display())));
            }
        }
        if self.server.max_upload_bytes == 0 {
            exn::bail!(ErrorKind::Invalid("server.max_upload_bytes must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// The library policy selected by this deployment.
    pub fn library_settings(&self) -> Settings {
        Settings {
            update_mode: self.updates.mode,
            cover_mode: self.covers.mode,
            require_cover_image: self.covers.require_image,
        }
    }
}
