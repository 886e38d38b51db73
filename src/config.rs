use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `server.url`.
pub const SERVER_URL_ENV: &str = "DINECACHE_SERVER_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Base URL of the restaurant backend
  #[serde(default = "default_server_url")]
  pub url: String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      url: default_server_url(),
      request_timeout_secs: default_request_timeout(),
    }
  }
}

fn default_server_url() -> String {
  "http://localhost:1337".to_string()
}

fn default_request_timeout() -> u64 {
  10
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Location of the store database (defaults to the user data directory)
  pub path: Option<PathBuf>,
  /// Set to false to run without a local store
  #[serde(default = "default_enabled")]
  pub enabled: bool,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      path: None,
      enabled: default_enabled(),
    }
  }
}

fn default_enabled() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dinecache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dinecache/config.yaml
  ///
  /// Without a file the defaults apply. `DINECACHE_SERVER_URL` overrides the server URL.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    Ok(config.with_env_overrides(std::env::var(SERVER_URL_ENV).ok()))
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("dinecache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dinecache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  fn with_env_overrides(mut self, server_url: Option<String>) -> Self {
    if let Some(url) = server_url.filter(|u| !u.trim().is_empty()) {
      self.server.url = url;
    }
    self
  }

  /// Directory for the log file and the default store location.
  pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .map(|dir| dir.join("dinecache"))
  }
}
