//! Configuration management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::ipc::DEFAULT_SOCKET_PATH;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub roon: RoonConfig,

    #[serde(default)]
    pub images: ImageConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            search: SearchConfig::default(),
            roon: RoonConfig::default(),
            images: ImageConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Where searches run inside Roon's browse tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    #[default]
    Library,
    Tidal,
    Qobuz,
}

impl SearchSource {
    /// Title of the source's entry in the browse root
    pub fn title(&self) -> &'static str {
        match self {
            Self::Library => "Library",
            Self::Tidal => "TIDAL",
            Self::Qobuz => "Qobuz",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results_per_category: usize,
    #[serde(default)]
    pub source: SearchSource,
}

fn default_max_results() -> usize {
    crate::browse::MAX_RESULTS_PER_CATEGORY
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results_per_category: default_max_results(),
            source: SearchSource::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoonConfig {
    /// Pairing state; defaults to `roon_state.json` in the config dir
    pub state_file: Option<PathBuf>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for RoonConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RoonConfig {
    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| get_config_file_path("roon_state.json"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Defaults to `images/` in the cache dir
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
    #[serde(default = "default_image_size")]
    pub size: u32,
}

fn default_max_age_days() -> u64 {
    30
}

fn default_image_size() -> u32 {
    300
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            max_age_days: default_max_age_days(),
            size: default_image_size(),
        }
    }
}

impl ImageConfig {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| get_cache_dir().join("images"))
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days.saturating_mul(24 * 60 * 60))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "roonpipe", "roonpipe")
}

/// Directory holding config.toml and the Roon pairing state
pub fn get_config_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Directory holding cached artwork
pub fn get_cache_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("roonpipe"))
}

pub fn get_config_file_path(name: &str) -> PathBuf {
    get_config_dir().join(name)
}

/// Load configuration: defaults, then the config file, then `ROONPIPE_*`
/// environment variables (`ROONPIPE_SEARCH__SOURCE=tidal`).
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let file = match path {
        Some(path) => ::config::File::from(path.to_path_buf()).required(true),
        None => ::config::File::with_name(&get_config_file_path("config").to_string_lossy())
            .required(false),
    };

    let config = ::config::Config::builder()
        .add_source(file)
        .add_source(
            ::config::Environment::with_prefix("ROONPIPE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/roonpipe.sock"));
        assert_eq!(config.search.max_results_per_category, 5);
        assert_eq!(config.search.source, SearchSource::Library);
        assert_eq!(config.roon.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.images.size, 300);
        assert_eq!(config.images.max_age(), Duration::from_secs(30 * 86_400));
        assert!(config.notifications.enabled);
    }

    #[test]
    fn test_huge_max_age_saturates() {
        let images = ImageConfig {
            max_age_days: u64::MAX,
            ..Default::default()
        };
        assert_eq!(images.max_age(), Duration::from_secs(u64::MAX));
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
socket_path = "/run/user/1000/roonpipe.sock"

[search]
source = "qobuz"
max_results_per_category = 3

[notifications]
enabled = false
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(
            config.socket_path,
            PathBuf::from("/run/user/1000/roonpipe.sock")
        );
        assert_eq!(config.search.source, SearchSource::Qobuz);
        assert_eq!(config.search.max_results_per_category, 3);
        assert!(!config.notifications.enabled);
        assert_eq!(config.images.size, 300);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[images]\nsize = 200\n").unwrap();

        std::env::set_var("ROONPIPE_IMAGES__SIZE", "512");
        std::env::set_var("ROONPIPE_SEARCH__SOURCE", "tidal");
        let config = load_config(Some(&path));
        std::env::remove_var("ROONPIPE_IMAGES__SIZE");
        std::env::remove_var("ROONPIPE_SEARCH__SOURCE");

        let config = config.unwrap();
        assert_eq!(config.images.size, 512);
        assert_eq!(config.search.source, SearchSource::Tidal);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_source_titles() {
        assert_eq!(SearchSource::Library.title(), "Library");
        assert_eq!(SearchSource::Tidal.title(), "TIDAL");
        assert_eq!(SearchSource::Qobuz.title(), "Qobuz");
    }
}
