//! Cancellable depth-first walk over regular files.

use std::path::PathBuf;
use std::time::SystemTime;

use jwalk::{Parallelism, WalkDir};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use glamscan_core::ScanConfig;

/// A regular file seen by the walk.
#[derive(Debug, Clone)]
pub(crate) struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// What the visitor wants after seeing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visit {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WalkOutcome {
    Completed,
    Aborted,
}

/// Walk `config.root`, calling `visit` for every regular file.
///
/// `cancel` is checked before every entry. Unreadable entries are logged
/// and skipped; their siblings are still visited.
pub(crate) fn walk_files<F>(
    config: &ScanConfig,
    cancel: &CancellationToken,
    mut visit: F,
) -> WalkOutcome
where
    F: FnMut(FileEntry) -> Visit,
{
    let parallelism = match config.threads {
        0 => Parallelism::Serial,
        n => Parallelism::RayonNewPool(n),
    };

    // Prune hidden and ignored names before jwalk descends into them.
    let filter = config.clone();
    let walker = WalkDir::new(&config.root)
        .parallelism(parallelism)
        .sort(true)
        .skip_hidden(false)
        .follow_links(config.follow_symlinks)
        .process_read_dir(move |_depth, _dir, _state, children| {
            children.retain(|child| {
                child
                    .as_ref()
                    .map(|entry| {
                        let name = entry.file_name.to_string_lossy();
                        !filter.should_skip_hidden(&name) && !filter.should_ignore(&name)
                    })
                    .unwrap_or(true)
            });
        });

    for entry in walker {
        if cancel.is_cancelled() {
            debug!(root = %config.root.display(), "walk cancelled");
            return WalkOutcome::Aborted;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = ?err.path(), error = %err, "cannot read directory entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot stat file");
                continue;
            }
        };
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "no modification time");
                continue;
            }
        };

        let file = FileEntry {
            path,
            size: metadata.len(),
            modified,
        };
        if visit(file) == Visit::Stop {
            return WalkOutcome::Aborted;
        }
    }

    WalkOutcome::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn layout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/deeper")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join(".profile"), "hidden").unwrap();
        fs::write(dir.path().join("b/c.txt"), "c").unwrap();
        fs::write(dir.path().join("b/deeper/d.log"), "d").unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "js").unwrap();
        dir
    }

    fn names(config: &ScanConfig) -> Vec<String> {
        let mut seen = Vec::new();
        let outcome = walk_files(config, &CancellationToken::new(), |file| {
            let rel = file.path.strip_prefix(&config.root).unwrap();
            seen.push(rel.to_string_lossy().replace('\\', "/"));
            Visit::Continue
        });
        assert_eq!(outcome, WalkOutcome::Completed);
        seen
    }

    #[test]
    fn test_visits_files_depth_first() {
        let dir = layout();
        let config = ScanConfig::new(dir.path());

        assert_eq!(
            names(&config),
            vec![
                ".profile",
                "a.txt",
                "b/c.txt",
                "b/deeper/d.log",
                "node_modules/pkg/index.js",
            ]
        );
    }

    #[test]
    fn test_ignored_directories_are_pruned() {
        let dir = layout();
        let config = ScanConfig {
            ignore_patterns: vec!["node_modules".into(), "*.log".into()],
            ..ScanConfig::new(dir.path())
        };

        assert_eq!(names(&config), vec![".profile", "a.txt", "b/c.txt"]);
    }

    #[test]
    fn test_hidden_files_can_be_excluded() {
        let dir = layout();
        let config = ScanConfig {
            include_hidden: false,
            ..ScanConfig::new(dir.path())
        };

        assert!(!names(&config).contains(&".profile".to_string()));
    }

    #[test]
    fn test_hidden_directories_are_pruned() {
        let dir = layout();
        fs::create_dir_all(dir.path().join(".cache/nested")).unwrap();
        fs::write(dir.path().join(".cache/nested/blob"), "x").unwrap();

        let hidden_excluded = ScanConfig {
            include_hidden: false,
            ..ScanConfig::new(dir.path())
        };
        assert_eq!(
            names(&hidden_excluded),
            vec!["a.txt", "b/c.txt", "b/deeper/d.log", "node_modules/pkg/index.js"]
        );
        assert!(names(&ScanConfig::new(dir.path())).contains(&".cache/nested/blob".to_string()));
    }

    #[test]
    fn test_cancelled_walk_visits_nothing() {
        let dir = layout();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut visited = 0;
        let outcome = walk_files(&ScanConfig::new(dir.path()), &cancel, |_| {
            visited += 1;
            Visit::Continue
        });
        assert_eq!(outcome, WalkOutcome::Aborted);
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_cancel_mid_walk_stops_at_next_entry() {
        let dir = layout();
        let cancel = CancellationToken::new();

        let mut visited = 0;
        let outcome = walk_files(&ScanConfig::new(dir.path()), &cancel, |_| {
            visited += 1;
            cancel.cancel();
            Visit::Continue
        });
        assert_eq!(outcome, WalkOutcome::Aborted);
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_visitor_can_stop_walk() {
        let dir = layout();
        let mut visited = 0;
        let outcome = walk_files(&ScanConfig::new(dir.path()), &CancellationToken::new(), |_| {
            visited += 1;
            Visit::Stop
        });
        assert_eq!(outcome, WalkOutcome::Aborted);
        assert_eq!(visited, 1);
    }
}
