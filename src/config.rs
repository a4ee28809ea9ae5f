use crate::crawler::{Depth, ScanOptions};
use crate::descriptor::DESCRIPTOR_FILE;
use crate::error::ConfigError;
use crate::model::{SortKey, SortSpec};
use crate::size::parse_size;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Steam app id of the workshop content usually analyzed.
const WORKSHOP_APP_ID: &str = "431960";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub root_path: Option<PathBuf>,
    pub max_depth: Depth,
    pub include_files: bool,
    /// Human-readable threshold such as `"100 MB"`; `"0"` disables filtering.
    pub min_size: String,
    pub sort_key: SortKey,
    pub descending: bool,
    pub descriptor_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_path: None,
            max_depth: Depth::default(),
            include_files: false,
            min_size: "0".to_string(),
            sort_key: SortKey::Size,
            descending: true,
            descriptor_file: DESCRIPTOR_FILE.to_string(),
        }
    }
}

/// Values given on the command line; `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root_path: Option<PathBuf>,
    pub max_depth: Option<Depth>,
    pub include_files: Option<bool>,
    pub min_size: Option<String>,
    pub sort_key: Option<SortKey>,
    pub descending: Option<bool>,
}

impl Settings {
    /// `<config dir>/spacetally/config.toml`
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        directories::ProjectDirs::from("", "", "spacetally")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load the default config file, falling back to defaults on any problem.
    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|err| {
                warn!("{}; using default settings", err);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.min_size_bytes()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(io_err)
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(root) = overrides.root_path {
            self.root_path = Some(root);
        }
        if let Some(depth) = overrides.max_depth {
            self.max_depth = depth;
        }
        if let Some(include_files) = overrides.include_files {
            self.include_files = include_files;
        }
        if let Some(min_size) = overrides.min_size {
            self.min_size = min_size;
        }
        if let Some(key) = overrides.sort_key {
            self.sort_key = key;
        }
        if let Some(descending) = overrides.descending {
            self.descending = descending;
        }
    }

    pub fn min_size_bytes(&self) -> Result<u64, ConfigError> {
        Ok(parse_size(&self.min_size)?)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_depth: self.max_depth,
            include_files: self.include_files,
        }
    }

    pub fn sort_spec(&self) -> SortSpec {
        SortSpec {
            key: self.sort_key,
            descending: self.descending,
        }
    }

    /// Configured root, or the first workshop directory found on this machine.
    pub fn resolve_root(&self) -> Option<PathBuf> {
        self.root_path.clone().or_else(locate_default_root)
    }
}

fn default_root_candidates() -> Vec<PathBuf> {
    let workshop = |steam: PathBuf| {
        steam
            .join("steamapps")
            .join("workshop")
            .join("content")
            .join(WORKSHOP_APP_ID)
    };

    let mut candidates = vec![
        workshop(PathBuf::from(r"C:\Program Files (x86)\Steam")),
        workshop(PathBuf::from(r"D:\Steam")),
        workshop(PathBuf::from(r"E:\Steam")),
    ];
    if let Some(home) = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()) {
        candidates.push(workshop(home.join(".steam").join("steam")));
        candidates.push(workshop(home.join(".local").join("share").join("Steam")));
        candidates.push(workshop(
            home.join("Library").join("Application Support").join("Steam"),
        ));
    }
    candidates
}

/// First existing well-known workshop content directory.
pub fn locate_default_root() -> Option<PathBuf> {
    default_root_candidates().into_iter().find(|path| path.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_depth, Depth::levels(1).unwrap());
        assert!(!settings.include_files);
        assert_eq!(settings.min_size_bytes().unwrap(), 0);
        assert_eq!(settings.sort_spec(), SortSpec::default());
        assert_eq!(settings.descriptor_file, "project.json");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "max_depth = \"unlimited\"\ninclude_files = true\nmin_size = \"100 MB\"\nsort_key = \"name\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.max_depth, Depth::Unlimited);
        assert!(settings.include_files);
        assert_eq!(settings.min_size_bytes().unwrap(), 100 * 1024 * 1024);
        assert_eq!(settings.sort_key, SortKey::Name);
        assert!(settings.descending);
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "max_depth = 0\n").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Parse { .. })));

        fs::write(&path, "min_size = \"lots\"\n").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ConfigError::MinSize(_))));

        assert!(matches!(
            Settings::load_from(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut settings = Settings::default();
        settings.root_path = Some(PathBuf::from("/data/workshop"));
        settings.max_depth = Depth::levels(3).unwrap();
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_overrides() {
        let mut settings = Settings::default();
        settings.apply_overrides(Overrides {
            root_path: Some(PathBuf::from("/x")),
            max_depth: Some(Depth::Unlimited),
            min_size: Some("1GB".to_string()),
            descending: Some(false),
            ..Overrides::default()
        });

        assert_eq!(settings.resolve_root(), Some(PathBuf::from("/x")));
        assert_eq!(settings.scan_options().max_depth, Depth::Unlimited);
        assert!(!settings.scan_options().include_files);
        assert_eq!(settings.min_size_bytes().unwrap(), 1024 * 1024 * 1024);
        assert_eq!(settings.sort_spec().key, SortKey::Size);
        assert!(!settings.sort_spec().descending);
    }
}
