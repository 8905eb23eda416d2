//! Daemon and scan configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Command line that switches clamd into streaming-input mode.
pub const DEFAULT_STREAM_COMMAND: &str = "nINSTREAM\n";

/// How to reach the scanning daemon.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    /// TCP socket at `address:port`.
    #[default]
    Tcp,
    /// Local socket at the filesystem path in `address`.
    Unix,
}

/// Configuration for the daemon connection pool.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct DaemonConfig {
    /// Transport used to reach the daemon.
    #[builder(default)]
    #[serde(default)]
    pub transport: Transport,

    /// Host name for TCP, socket path for Unix.
    pub address: String,

    /// TCP port (ignored for Unix sockets).
    #[builder(default = "3310")]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection timeout.
    #[builder(default = "Duration::from_secs(2)")]
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Deadline on each write and on the reply of a scan session.
    ///
    /// `None` waits as long as the daemon takes; large archives can keep
    /// clamd busy well past the connection timeout.
    #[builder(default)]
    #[serde(default)]
    pub io_timeout: Option<Duration>,

    /// Number of workers, one daemon connection each.
    #[builder(default = "10")]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Size of each streamed data frame.
    #[builder(default = "2048")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Command written before the first frame.
    #[builder(default = "DEFAULT_STREAM_COMMAND.to_string()")]
    #[serde(default = "default_command")]
    pub command: String,
}

fn default_port() -> u16 {
    3310
}

fn default_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_workers() -> usize {
    10
}

fn default_chunk_size() -> usize {
    2048
}

fn default_command() -> String {
    DEFAULT_STREAM_COMMAND.to_string()
}

impl DaemonConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.address {
            Some(ref address) if address.is_empty() => {
                return Err("Daemon address cannot be empty".to_string());
            }
            None => return Err("Daemon address is required".to_string()),
            _ => {}
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err("Connection timeout must be greater than zero".to_string());
        }
        if self.io_timeout == Some(Some(Duration::ZERO)) {
            return Err("I/O timeout must be greater than zero".to_string());
        }
        if self.workers == Some(0) {
            return Err("At least one worker is required".to_string());
        }
        if self.chunk_size == Some(0) {
            return Err("Chunk size must be greater than zero".to_string());
        }
        if let Some(size) = self.chunk_size {
            if u32::try_from(size).is_err() {
                return Err("Chunk size must fit in a 4-byte frame length".to_string());
            }
        }
        Ok(())
    }
}

impl DaemonConfig {
    /// Create a new daemon config builder.
    pub fn builder() -> DaemonConfigBuilder {
        DaemonConfigBuilder::default()
    }

    /// Create a TCP config with default settings.
    pub fn tcp(address: impl Into<String>, port: u16) -> Self {
        Self {
            transport: Transport::Tcp,
            address: address.into(),
            port,
            timeout: default_timeout(),
            io_timeout: None,
            workers: default_workers(),
            chunk_size: default_chunk_size(),
            command: default_command(),
        }
    }

    /// Human-readable daemon location, used in logs and errors.
    pub fn endpoint(&self) -> String {
        match self.transport {
            Transport::Tcp => format!("{}:{}", self.address, self.port),
            Transport::Unix => self.address.clone(),
        }
    }
}

/// Configuration for the repeating directory scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Files strictly larger than this are skipped.
    #[builder(default = "26_214_400")]
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Sleep between two cycles.
    #[builder(default = "Duration::from_secs(60)")]
    #[serde(default = "default_interval")]
    pub interval: Duration,

    /// Follow symbolic links.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Names to exclude from the walk.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Number of threads for directory traversal (0 = single-threaded walk).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    26_214_400
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size: default_max_file_size(),
            interval: default_interval(),
            follow_symlinks: false,
            include_hidden: true,
            ignore_patterns: Vec::new(),
            threads: 0,
        }
    }

    /// Check if a path should be ignored based on patterns.
    pub fn should_ignore(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| {
            if name == pattern {
                return true;
            }
            if let Some(prefix) = pattern.strip_suffix('*') {
                if name.starts_with(prefix) {
                    return true;
                }
            }
            if let Some(suffix) = pattern.strip_prefix('*') {
                if name.ends_with(suffix) {
                    return true;
                }
            }
            false
        })
    }

    /// Check if a hidden name should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }

    /// Check if a file of this size is beyond the scan ceiling.
    pub fn exceeds_size_limit(&self, size: u64) -> bool {
        size > self.max_file_size
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
