//! glamscan - continuously scan a directory tree through a clamd daemon.
//!
//! Usage:
//!   glamscan --address HOST --directory PATH   Watch PATH, deleting infected files
//!   glamscan history                          List recorded detections
//!   glamscan --help                           Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

use glamscan_core::{DaemonConfig, ScanConfig, Transport};
use glamscan_daemon::ScanQueue;
use glamscan_scan::Sentinel;
use glamscan_store::ScanStore;

#[derive(Parser)]
#[command(
    name = "glamscan",
    version,
    about = "Continuously scan a directory tree for malware through clamd",
    long_about = "glamscan walks a directory on an interval and streams every new or \
                  modified file to a clamd daemon. Clean files are remembered until \
                  they change; infected files are recorded and deleted."
)]
struct Cli {
    /// The database of files that have been scanned
    #[arg(long, global = true, default_value = "glamscan.db", env = "GLAMSCAN_DATABASE")]
    database: PathBuf,

    /// Turn on debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(flatten)]
    watch: WatchArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List files found infected and the digest recorded for each
    History {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct WatchArgs {
    /// The address of the clamd server, or its socket path with --protocol unix (required)
    #[arg(long, env = "GLAMSCAN_ADDRESS")]
    address: Option<String>,

    /// The directory of files to scan (required)
    #[arg(long, env = "GLAMSCAN_DIRECTORY")]
    directory: Option<PathBuf>,

    /// Largest file to scan (e.g. "25MB"); keep at or below clamd's StreamMaxLength
    #[arg(long, default_value = "26214400", value_parser = parse_size)]
    size: u64,

    /// The port clamd listens on
    #[arg(long, default_value_t = 3310)]
    port: u16,

    /// How to reach clamd: tcp or unix
    #[arg(long, default_value = "tcp")]
    protocol: Transport,

    /// How many files to scan at a time
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 2)]
    timeout: u64,

    /// Give up on a file whose verdict takes longer than this many seconds
    /// (default: wait for the daemon)
    #[arg(long)]
    io_timeout: Option<u64>,

    /// Seconds to wait between scans
    #[arg(long, default_value_t = 60)]
    sleep: u64,

    /// Bytes per streamed chunk
    #[arg(long, default_value_t = 2048)]
    chunk_size: usize,

    /// File or directory names to skip (exact, "prefix*" or "*suffix"); repeatable
    #[arg(long)]
    exclude: Vec<String>,
}

impl WatchArgs {
    fn daemon_config(&self, address: &str) -> Result<DaemonConfig> {
        DaemonConfig::builder()
            .transport(self.protocol)
            .address(address)
            .port(self.port)
            .timeout(Duration::from_secs(self.timeout))
            .io_timeout(self.io_timeout.map(Duration::from_secs))
            .workers(self.concurrency)
            .chunk_size(self.chunk_size)
            .build()
            .wrap_err("Invalid daemon configuration")
    }

    fn scan_config(&self, directory: &Path) -> Result<ScanConfig> {
        ScanConfig::builder()
            .root(directory)
            .max_file_size(self.size)
            .interval(Duration::from_secs(self.sleep))
            .ignore_patterns(self.exclude.clone())
            .build()
            .wrap_err("Invalid scan configuration")
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Some(Command::History { format }) => run_history(&cli.database, format),
        None => run_watch(&cli.watch, &cli.database).await,
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("GLAMSCAN_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_target(false).init();
}

/// Scan until interrupted.
async fn run_watch(args: &WatchArgs, database: &Path) -> Result<()> {
    let (Some(address), Some(directory)) = (args.address.as_deref(), args.directory.as_deref())
    else {
        bail!("Must specify a value for '--address' and '--directory'");
    };

    let daemon = args.daemon_config(address)?;
    let scan = args.scan_config(directory)?;

    let store = ScanStore::open(database)
        .wrap_err_with(|| format!("Cannot open database {}", database.display()))?;

    let mut queue = ScanQueue::connect(&daemon)
        .await
        .wrap_err("Cannot start scan queue")?;
    queue.start();

    let mut sentinel = match Sentinel::new(scan, Arc::new(store), queue.handle()) {
        Ok(sentinel) => sentinel,
        Err(err) => {
            queue.stop().await;
            return Err(err).wrap_err("Invalid scan directory");
        }
    };

    info!(
        root = %sentinel.root().display(),
        endpoint = %daemon.endpoint(),
        workers = queue.size(),
        max_size = %format_size(args.size),
        interval = ?Duration::from_secs(args.sleep),
        "watching"
    );
    sentinel.start();

    let interrupted = tokio::signal::ctrl_c().await;
    debug!("cleaning up");

    // Sentinel first: nothing may be submitted to a stopped queue.
    sentinel.stop().await;
    queue.stop().await;

    interrupted.wrap_err("Cannot listen for interrupt")
}

/// Print recorded detections.
fn run_history(database: &Path, format: OutputFormat) -> Result<()> {
    let store = ScanStore::open(database)
        .wrap_err_with(|| format!("Cannot open database {}", database.display()))?;
    let records = store.viruses().wrap_err("Cannot read detection history")?;

    match format {
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No detections recorded.");
            }
            for record in &records {
                println!("{}  {}", record.digest, record.path.display());
            }
        }
        OutputFormat::Json => {
            let entries: Vec<_> = records
                .iter()
                .map(|record| {
                    serde_json::json!({
                        "path": record.path,
                        "digest": record.digest.to_hex(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "2048", "512KB", "25MB", "1GB").
fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');

    let multiplier: u64 = match &s[digits.len()..] {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        unit => return Err(format!("unknown size unit '{unit}'")),
    };

    let num: f64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{s}'"))?;
    if num < 0.0 {
        return Err(format!("invalid size '{s}'"));
    }
    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("26214400").unwrap(), 26_214_400);
        assert_eq!(parse_size("25MB").unwrap(), 26_214_400);
        assert_eq!(parse_size("512k").unwrap(), 524_288);
        assert_eq!(parse_size("1.5G").unwrap(), 1_610_612_736);
        assert!(parse_size("12 parsecs").is_err());
        assert!(parse_size("MB").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["glamscan", "--address", "clamd", "--directory", "/srv"])
            .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.database, PathBuf::from("glamscan.db"));

        let daemon = cli.watch.daemon_config("clamd").unwrap();
        assert_eq!(daemon.endpoint(), "clamd:3310");
        assert_eq!(daemon.workers, 10);
        assert_eq!(daemon.timeout, Duration::from_secs(2));
        assert_eq!(daemon.io_timeout, None);

        let scan = cli.watch.scan_config(Path::new("/srv")).unwrap();
        assert_eq!(scan.max_file_size, 26_214_400);
        assert_eq!(scan.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_cli_unix_socket_and_excludes() {
        let cli = Cli::try_parse_from([
            "glamscan",
            "--address",
            "/run/clamav/clamd.ctl",
            "--directory",
            "/srv",
            "--protocol",
            "unix",
            "--exclude",
            ".git",
            "--exclude",
            "*.iso",
        ])
        .unwrap();

        let daemon = cli.watch.daemon_config("/run/clamav/clamd.ctl").unwrap();
        assert_eq!(daemon.transport, Transport::Unix);
        assert_eq!(daemon.endpoint(), "/run/clamav/clamd.ctl");
        assert_eq!(cli.watch.exclude, vec![".git", "*.iso"]);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let cli = Cli::try_parse_from([
            "glamscan",
            "--address",
            "clamd",
            "--directory",
            "/srv",
            "--concurrency",
            "0",
        ])
        .unwrap();
        assert!(cli.watch.daemon_config("clamd").is_err());
    }

    #[test]
    fn test_timeouts() {
        let cli = Cli::try_parse_from([
            "glamscan",
            "--timeout",
            "5",
            "--io-timeout",
            "600",
        ])
        .unwrap();
        let daemon = cli.watch.daemon_config("clamd").unwrap();
        assert_eq!(daemon.timeout, Duration::from_secs(5));
        assert_eq!(daemon.io_timeout, Some(Duration::from_secs(600)));

        let cli = Cli::try_parse_from(["glamscan", "--timeout", "0"]).unwrap();
        assert!(cli.watch.daemon_config("clamd").is_err());
    }

    #[test]
    fn test_history_subcommand() {
        let cli = Cli::try_parse_from(["glamscan", "history", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::History {
                format: OutputFormat::Json
            })
        ));
    }
}
