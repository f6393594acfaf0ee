//! Console configuration
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. `rhythm-console.toml` in the working directory, or the file named by
//!    `--config` / `RHYTHM_CONSOLE_CONFIG` (which must then exist)
//! 3. `RHYTHM_CONSOLE_*` environment variables, `.env` included
//! 4. explicit overrides set on the builder (CLI flags)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const ENV_PREFIX: &str = "RHYTHM_CONSOLE";
const CONFIG_ENV: &str = "RHYTHM_CONSOLE_CONFIG";
const DEFAULT_FILE: &str = "rhythm-console";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where resolved packages are installed
    pub install_dir: PathBuf,
    /// Local package archives, also the download cache
    pub archive_dir: PathBuf,
    /// Base URL serving `<name>.zip` archives
    pub index_url: Option<String>,
    /// Module directories searched before the install directory
    pub search_path: Vec<PathBuf>,
    pub ps1: String,
    pub ps2: String,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from(".rhythm/packages"),
            archive_dir: PathBuf::from(".rhythm/archives"),
            index_url: None,
            search_path: vec![PathBuf::from(".")],
            ps1: ">>> ".to_string(),
            ps2: "... ".to_string(),
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with no overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// The effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    install_dir: Option<PathBuf>,
    index_url: Option<String>,
    skip_env: bool,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn install_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.install_dir = dir;
        self
    }

    pub fn index_url(mut self, url: Option<String>) -> Self {
        self.index_url = url;
        self
    }

    /// Ignore the process environment and `.env`
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn build(self) -> Result<Config> {
        if !self.skip_env {
            // A missing .env is not an error
            let _ = dotenvy::dotenv();
        }

        let explicit = self.config_path.or_else(|| {
            if self.skip_env {
                None
            } else {
                std::env::var_os(CONFIG_ENV).map(PathBuf::from)
            }
        });

        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&Config::default())
                .context("failed to build default configuration")?,
        );

        builder = match &explicit {
            Some(path) => builder.add_source(config::File::from(path.as_path()).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_FILE).required(false)),
        };

        if !self.skip_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("search_path"),
            );
        }

        let mut config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| match &explicit {
                Some(path) => format!("failed to load configuration from {}", path.display()),
                None => "failed to load configuration".to_string(),
            })?;

        if let Some(dir) = self.install_dir {
            config.install_dir = dir;
        }
        if let Some(url) = self.index_url {
            config.index_url = Some(url);
        }
        Ok(config)
    }
}
