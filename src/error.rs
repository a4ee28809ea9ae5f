use std::io;
use std::path::PathBuf;

/// Failures that abort a whole scan or reject a request outright.
///
/// Per-entry problems (an unreadable subdirectory, a file that vanished
/// mid-walk) never show up here; they are absorbed by the walker.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("path does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot read {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("another scan or deletion is already running")]
    Busy,

    #[error("background worker panicked")]
    WorkerPanicked,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SizeParseError {
    #[error("empty size string")]
    Empty,

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("unknown size unit: {0} (supported: B, KB, MB, GB, TB)")]
    UnknownUnit(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration directory available on this platform")]
    NoConfigDir,

    #[error("cannot access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid min_size: {0}")]
    MinSize(#[from] SizeParseError),
}
