use std::collections::HashMap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Mutex;
use std::{env, fs};

use anyhow::{Context, Result};
use config::{Config as HierarchicalConfig, Environment};
use once_cell::sync::OnceCell;
use pawhub_client::DEFAULT_BASE_URL;
use pawhub_client::types::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use tracing::debug;
use xdg::BaseDirectories;

/// Name of pawhub managed directories (config, data, cache)
const PAWHUB_DIR_NAME: &str = "pawhub";
const PAWHUB_CONFIG_DIR_VAR: &str = "PAWHUB_CONFIG_DIR";
pub const PAWHUB_CONFIG_FILE: &str = "pawhub.toml";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// pawhub configuration options
    #[serde(default, flatten)]
    pub pawhub: PawhubConfig,
}

/// Describes the configuration for the pawhub CLI
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PawhubConfig {
    /// Directory where pawhub should store ephemeral data (default:
    /// `$XDG_CACHE_HOME/pawhub`)
    pub cache_dir: PathBuf,
    /// Directory where pawhub should store persistent data — the favorites
    /// file and the session cookie (default: `$XDG_DATA_HOME/pawhub`)
    pub data_dir: PathBuf,
    /// Directory where pawhub should load its configuration file (default:
    /// `$XDG_CONFIG_HOME/pawhub`)
    pub config_dir: PathBuf,

    /// The URL of the shelter service to use
    // Using a Url here adds an extra trailing slash,
    // so just use a String.
    pub base_url: Option<String>,

    /// How many results one search page holds.
    /// Fixed for the life of a session.
    pub page_size: Option<u32>,

    /// User-Agent override for outbound calls
    pub user_agent: Option<String>,
}

impl Config {
    /// Creates a raw [Config] object and caches it for the lifetime of the program
    fn raw_config(mut reload: bool) -> Result<HierarchicalConfig> {
        static INSTANCE: OnceCell<Mutex<HierarchicalConfig>> = OnceCell::new();

        debug!(
            "reading raw config (initialized: {initialized}, reload: {reload})",
            initialized = INSTANCE.get().is_some()
        );

        fn read_raw_config() -> Result<HierarchicalConfig> {
            let pawhub_dirs = BaseDirectories::with_prefix(PAWHUB_DIR_NAME);

            let cache_dir = pawhub_dirs
                .get_cache_home()
                .context("could not determine the XDG cache directory")?;
            let data_dir = pawhub_dirs
                .get_data_home()
                .context("could not determine the XDG data directory")?;

            let config_dir = match env::var(PAWHUB_CONFIG_DIR_VAR) {
                Ok(dir) => {
                    debug!("`${PAWHUB_CONFIG_DIR_VAR}` set: {dir}");
                    fs::create_dir_all(&dir)
                        .context(format!("Could not create config directory: {dir:?}"))?;
                    PathBuf::from(dir)
                },
                Err(_) => {
                    let config_dir = pawhub_dirs
                        .get_config_home()
                        .context("could not determine the XDG config directory")?;
                    debug!("`${PAWHUB_CONFIG_DIR_VAR}` not set, using {config_dir:?}");
                    fs::create_dir_all(&config_dir)
                        .context(format!("Could not create config directory: {config_dir:?}"))?;
                    config_dir
                },
            };

            let mut builder = HierarchicalConfig::builder()
                .set_default("cache_dir", cache_dir.to_str().unwrap())?
                .set_default("data_dir", data_dir.to_str().unwrap())?
                // Config dir is added to the config for completeness;
                // the config file cannot change the config dir.
                .set_override("config_dir", config_dir.to_str().unwrap())?;

            // read from /etc
            builder = builder.add_source(
                config::File::from(PathBuf::from("/etc").join(PAWHUB_CONFIG_FILE))
                    .format(config::FileFormat::Toml)
                    .required(false),
            );

            // look for files in XDG_CONFIG_DIRS locations
            for file in pawhub_dirs.find_config_files(PAWHUB_CONFIG_FILE) {
                builder =
                    builder.add_source(config::File::from(file).format(config::FileFormat::Toml));
            }

            // Add explicit PAWHUB_CONFIG_DIR file last
            builder = builder.add_source(
                config::File::from(config_dir.join(PAWHUB_CONFIG_FILE))
                    .format(config::FileFormat::Toml)
                    .required(false),
            );

            // override via env variables
            let pawhub_envs = env::vars()
                .filter_map(|(k, v)| k.strip_prefix("PAWHUB_").map(|k| (k.to_owned(), v)))
                .collect::<HashMap<_, _>>();

            let builder = builder.add_source(
                Environment::default()
                    .source(Some(pawhub_envs))
                    .try_parsing(true),
            );

            let final_config = builder.build()?;
            Ok(final_config)
        }

        let instance = INSTANCE.get_or_try_init(|| {
            // If we are initializing the config for the first time,
            // we don't need to reload right after
            reload = false;
            let config = read_raw_config()?;

            Ok::<_, anyhow::Error>(Mutex::new(config))
        })?;

        let mut config_guard = instance.lock().expect("config mutex poisoned");
        if reload {
            *config_guard = read_raw_config()?;
        }

        Ok(config_guard.deref().clone())
    }

    /// Creates a [Config] from the environment and config file
    ///
    /// When running in tests, the config is reloaded on every call.
    pub fn parse() -> Result<Config> {
        #[cfg(test)]
        let reload = true;
        #[cfg(not(test))]
        let reload = false;

        let raw = Self::raw_config(reload)?;
        let config = raw
            .try_deserialize()
            .context("could not parse configuration")?;
        Ok(config)
    }

    pub fn base_url(&self) -> &str {
        self.pawhub.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn page_size(&self) -> u32 {
        self.pawhub.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn user_agent(&self) -> String {
        self.pawhub
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("pawhub/{}", env!("CARGO_PKG_VERSION")))
    }
}
