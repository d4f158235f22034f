//! Layered configuration for bookdesc.
//!
//! Values are merged from, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, by extension),
//! 3. `BOOKDESC_`-prefixed environment variables, e.g. `BOOKDESC_BACKEND=log`.
//!
//! The file is the one given explicitly, or `config.toml` in the platform's
//! configuration directory for bookdesc when that exists.

pub mod error;

use crate::error::{ErrorKind, Result};
use bookdesc_extract::{DEFAULT_ANNOTATION_LIMIT, DEFAULT_METATEXT_LIMIT, MINIMUM_BUFFER_SIZE};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "BOOKDESC_";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage backend for shard indexes (`redb`, `log` or `memory`)
    pub backend: String,
    /// Appended to shard keys to name CSV files; `.gz` or `.bz2` at the end
    /// compresses them
    pub csv_extension: String,
    /// Appended to shard keys to name index files
    pub index_extension: String,
    /// Bytes read from an input at a time. The `<description>` of a book must
    /// appear within the first buffer.
    pub buffer_size: usize,
    /// Maximum characters of annotation kept per book
    pub annotation_limit: usize,
    /// Maximum characters of description text kept per book
    pub metatext_limit: usize,
    /// Compute MD5 alongside SHA-1
    pub md5: bool,
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: "redb".to_string(),
            csv_extension: ".csv".to_string(),
            index_extension: ".idx".to_string(),
            buffer_size: MINIMUM_BUFFER_SIZE,
            annotation_limit: DEFAULT_ANNOTATION_LIMIT,
            metatext_limit: DEFAULT_METATEXT_LIMIT,
            md5: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load and validate the configuration.
    ///
    /// `path` names the configuration file; it is an error for it not to
    /// exist. Without it the default location is used if there is a file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let figment = Self::figment(path)?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Defaults merged with the configuration file, without the environment.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.is_file()),
        };
        let Some(file) = file else {
            return Ok(figment);
        };
        tracing::debug!(path = %file.display(), "loading configuration file");
        let extension = file.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase);
        Ok(match extension.as_deref() {
            Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
            Some("json") => figment.merge(Json::file(file)),
            _ => figment.merge(Toml::file(file)),
        })
    }

    /// Extract and validate a configuration from any figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file location for this platform, if the platform
    /// has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "bookdesc").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        if self.csv_extension.is_empty() || self.index_extension.is_empty() {
            exn::bail!(ErrorKind::Invalid("csv_extension and index_extension must not be empty".to_string()));
        }
        if self.csv_extension == self.index_extension {
            exn::bail!(ErrorKind::Invalid(format!(
                "csv_extension and index_extension are both '{}'",
                self.csv_extension
            )));
        }
        if self.buffer_size < MINIMUM_BUFFER_SIZE {
            exn::bail!(ErrorKind::Invalid(format!(
                "buffer_size {} is below the minimum of {MINIMUM_BUFFER_SIZE} bytes",
                self.buffer_size
            )));
        }
        if self.backend.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("backend must not be empty".to_string()));
        }
        self.level_filter()?;
        Ok(())
    }

    /// [`log_level`](Self::log_level) as a filter.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse::<LevelFilter>()
            .or_raise(|| ErrorKind::Invalid(format!("unknown log_level '{}'", self.log_level)))
    }
}
