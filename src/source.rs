//! # Command Source
//!
//! Discovers executable command lines by walking a directory tree and
//! periodically feeds them to the [`CommandQueue`].
//!
//! Only files whose name ends in the configured extension are read. Each line
//! is trimmed; blank lines and lines starting with `#` are dropped. Traversal
//! follows the order the filesystem enumerates entries in, so command order
//! across files is not guaranteed to be stable between platforms.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::config::SourceConfig;
use crate::constants::COMMENT_MARKER;
use crate::events::{EventSender, RelayEvent};
use crate::queue::CommandQueue;

/// One executable line of text.
///
/// Commands have no identity beyond their text; the same line found twice is
/// executed twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    /// Trim a raw line and keep it only if it is a non-comment, non-empty line
    pub fn parse(line: &str) -> Option<Command> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
            None
        } else {
            Some(Command(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Cannot read command folder '{path}': {error}")]
    RootUnreadable { path: PathBuf, error: String },
}

/// Outcome of one pass over the command tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    /// Eligible files, relative to the folder root, in discovery order
    pub files: Vec<PathBuf>,

    /// Commands from every readable eligible file, in scan order
    pub commands: Vec<Command>,
}

/// Counters kept by the watch loop
#[derive(Debug, Default)]
pub struct WatchStats {
    pub scans_completed: AtomicU64,
    pub scans_failed: AtomicU64,
    pub commands_enqueued: AtomicU64,
    /// Scans that replaced an earlier scan the dispatcher had not drained yet
    pub scans_superseded: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct CommandSource {
    folder: PathBuf,
    extension: String,
    scan_interval: Duration,
}

impl CommandSource {
    pub fn new(
        folder: impl Into<PathBuf>,
        extension: impl Into<String>,
        scan_interval: Duration,
    ) -> Self {
        Self {
            folder: folder.into(),
            extension: extension.into(),
            scan_interval,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            config.folder_path.clone(),
            config.extension(),
            config.scan_interval(),
        )
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Eligible files under the folder, relative to it.
    ///
    /// Files are read to produce the list, so it matches the snapshot a watch
    /// iteration publishes: a file `scan` skips as unreadable is not listed.
    pub async fn list_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        Ok(self.scan().await?.files)
    }

    /// Walk the tree once and collect every command.
    ///
    /// Files or subdirectories that cannot be read are skipped with a warning;
    /// only an unreadable root folder fails the scan.
    pub async fn scan(&self) -> Result<ScanResult, SourceError> {
        let files = self.walk().await?;
        let mut result = ScanResult::default();

        for path in files {
            let contents = match fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unreadable command file");
                    continue;
                }
            };

            let before = result.commands.len();
            result
                .commands
                .extend(contents.lines().filter_map(Command::parse));

            debug!(
                file = %path.display(),
                commands = result.commands.len() - before,
                "Read command file"
            );
            result.files.push(self.relative(&path));
        }

        Ok(result)
    }

    /// Scan, enqueue and publish the file list every `scan_interval` until
    /// `cancel` is set. A failed scan is logged and retried on the next tick.
    ///
    /// Each scan replaces any earlier scan still waiting in `queue`, so the
    /// dispatcher always drains exactly one complete snapshot.
    pub async fn watch(
        &self,
        queue: CommandQueue,
        cancel: CancellationToken,
        events: Option<EventSender>,
        stats: &WatchStats,
    ) {
        info!(
            folder = %self.folder.display(),
            extension = %self.extension,
            interval_ms = self.scan_interval.as_millis() as u64,
            "Starting command source watch loop"
        );

        while !cancel.is_cancelled() {
            match self.scan().await {
                Ok(result) => {
                    let enqueued = result.commands.len();
                    let discarded = queue.replace_pending(result.commands);
                    stats.scans_completed.fetch_add(1, Ordering::Relaxed);
                    stats
                        .commands_enqueued
                        .fetch_add(enqueued as u64, Ordering::Relaxed);
                    if discarded > 0 {
                        stats.scans_superseded.fetch_add(1, Ordering::Relaxed);
                    }

                    debug!(
                        files = result.files.len(),
                        enqueued,
                        discarded,
                        "Scan complete"
                    );

                    if let Some(events) = &events {
                        // The controller may have stopped listening; scanning continues regardless
                        let _ = events.send(RelayEvent::FilesDiscovered(result.files));
                    }
                }
                Err(e) => {
                    stats.scans_failed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Command folder scan failed");
                }
            }

            if cancel.sleep(self.scan_interval).await {
                break;
            }
        }

        info!(
            scans = stats.scans_completed.load(Ordering::Relaxed),
            "Command source watch loop stopped"
        );
    }

    async fn walk(&self) -> Result<Vec<PathBuf>, SourceError> {
        let mut files = Vec::new();
        let mut dirs_to_scan = VecDeque::new();
        dirs_to_scan.push_back(self.folder.clone());
        let mut at_root = true;

        while let Some(current_dir) = dirs_to_scan.pop_front() {
            let mut entries = match fs::read_dir(&current_dir).await {
                Ok(entries) => entries,
                Err(e) if at_root => {
                    return Err(SourceError::RootUnreadable {
                        path: current_dir,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        directory = %current_dir.display(),
                        error = %e,
                        "Skipping unreadable directory"
                    );
                    continue;
                }
            };
            at_root = false;

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(
                            directory = %current_dir.display(),
                            error = %e,
                            "Failed to read directory entry"
                        );
                        break;
                    }
                };
                let path = entry.path();

                match entry.file_type().await {
                    Ok(file_type) if file_type.is_dir() => dirs_to_scan.push_back(path),
                    Ok(_) if self.is_eligible(&path) => files.push(path),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to stat directory entry");
                    }
                }
            }
        }

        Ok(files)
    }

    fn is_eligible(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&self.extension))
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.folder)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::TempDir;

    fn source_for(dir: &TempDir) -> CommandSource {
        CommandSource::new(dir.path(), ".mcfunction", Duration::from_millis(20))
    }

    fn texts(commands: &[Command]) -> Vec<&str> {
        commands.iter().map(Command::as_str).collect()
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("  say bye  ").unwrap().as_str(), "say bye");
        assert!(Command::parse("").is_none());
        assert!(Command::parse("   \t").is_none());
        assert!(Command::parse("# comment").is_none());
        assert!(Command::parse("   # indented comment").is_none());
        assert_eq!(
            Command::parse("say #not a comment").unwrap().as_str(),
            "say #not a comment"
        );
    }

    #[tokio::test]
    async fn test_scan_filters_lines_and_extensions() {
        let dir = TempDir::new().unwrap();
        std_fs::write(
            dir.path().join("a.mcfunction"),
            "say hi\n# comment\n\n  say bye  \n",
        )
        .unwrap();
        std_fs::write(dir.path().join("b.txt"), "say ignored\nkill @e\n").unwrap();

        let result = source_for(&dir).scan().await.unwrap();

        assert_eq!(texts(&result.commands), vec!["say hi", "say bye"]);
        assert_eq!(result.files, vec![PathBuf::from("a.mcfunction")]);
    }

    #[tokio::test]
    async fn test_scan_recurses_into_subdirectories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("pack").join("tick");
        std_fs::create_dir_all(&nested).unwrap();
        std_fs::write(nested.join("loop.mcfunction"), "time add 1\r\nweather clear\r\n").unwrap();

        let result = source_for(&dir).scan().await.unwrap();

        assert_eq!(texts(&result.commands), vec!["time add 1", "weather clear"]);
        assert_eq!(
            result.files,
            vec![PathBuf::from("pack").join("tick").join("loop.mcfunction")]
        );
    }

    #[tokio::test]
    async fn test_scan_keeps_duplicates_across_files() {
        let dir = TempDir::new().unwrap();
        std_fs::write(dir.path().join("one.mcfunction"), "say dup\n").unwrap();
        std_fs::write(dir.path().join("two.mcfunction"), "say dup\n").unwrap();

        let result = source_for(&dir).scan().await.unwrap();
        assert_eq!(texts(&result.commands), vec!["say dup", "say dup"]);
    }

    #[tokio::test]
    async fn test_scan_skips_unreadable_file() {
        let dir = TempDir::new().unwrap();
        std_fs::write(dir.path().join("broken.mcfunction"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        std_fs::write(dir.path().join("good.mcfunction"), "say ok\n").unwrap();

        let result = source_for(&dir).scan().await.unwrap();

        assert_eq!(texts(&result.commands), vec!["say ok"]);
        assert_eq!(result.files, vec![PathBuf::from("good.mcfunction")]);
    }

    #[tokio::test]
    async fn test_scan_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let source = CommandSource::new(
            dir.path().join("does-not-exist"),
            ".mcfunction",
            Duration::from_secs(5),
        );

        let err = source.scan().await.unwrap_err();
        assert!(matches!(err, SourceError::RootUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_list_files_matches_scan_snapshot() {
        let dir = TempDir::new().unwrap();
        std_fs::write(dir.path().join("broken.mcfunction"), [0xff, 0xfe]).unwrap();
        std_fs::write(dir.path().join("good.mcfunction"), "say ok\n").unwrap();
        std_fs::write(dir.path().join("notes.md"), "docs").unwrap();

        let source = source_for(&dir);
        let listed = source.list_files().await.unwrap();
        let scanned = source.scan().await.unwrap();

        assert_eq!(listed, vec![PathBuf::from("good.mcfunction")]);
        assert_eq!(listed, scanned.files);
    }

    #[tokio::test]
    async fn test_watch_keeps_one_pending_scan() {
        let dir = TempDir::new().unwrap();
        let lines: String = (0..100).map(|i| format!("say {i}\n")).collect();
        std_fs::write(dir.path().join("big.mcfunction"), lines).unwrap();

        let source = CommandSource::new(dir.path(), ".mcfunction", Duration::from_millis(5));
        let queue = CommandQueue::new();
        let cancel = CancellationToken::new();
        let stats = std::sync::Arc::new(WatchStats::default());

        let handle = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            let stats = stats.clone();
            tokio::spawn(async move { source.watch(queue, cancel, None, &stats).await })
        };

        // Nobody drains while several scans complete
        tokio::time::timeout(Duration::from_secs(5), async {
            while stats.scans_completed.load(Ordering::Relaxed) < 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("watch loop stalled");

        assert_eq!(queue.len(), 100);
        assert!(stats.scans_superseded.load(Ordering::Relaxed) >= 4);

        cancel.cancel();
        handle.await.unwrap();

        let drained = queue.drain();
        assert_eq!(drained.len(), 100);
        assert_eq!(drained[0].as_str(), "say 0");
        assert_eq!(drained[99].as_str(), "say 99");
    }

    #[tokio::test]
    async fn test_watch_enqueues_and_publishes_until_cancelled() {
        let dir = TempDir::new().unwrap();
        std_fs::write(dir.path().join("a.mcfunction"), "c1\nc2\n").unwrap();

        let source = source_for(&dir);
        let queue = CommandQueue::new();
        let cancel = CancellationToken::new();
        let (events_tx, mut events_rx) = crate::events::event_channel(16);
        let stats = std::sync::Arc::new(WatchStats::default());

        let handle = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            let stats = stats.clone();
            tokio::spawn(async move { source.watch(queue, cancel, Some(events_tx), &stats).await })
        };

        let first = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            first,
            RelayEvent::FilesDiscovered(vec![PathBuf::from("a.mcfunction")])
        );

        let drained = queue.drain();
        assert!(drained.len() >= 2);
        assert_eq!(texts(&drained[..2]), vec!["c1", "c2"]);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("watch loop should stop promptly")
            .unwrap();

        assert!(stats.scans_completed.load(Ordering::Relaxed) >= 1);
        assert_eq!(stats.scans_failed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_watch_survives_missing_folder() {
        let dir = TempDir::new().unwrap();
        let source = CommandSource::new(
            dir.path().join("later"),
            ".mcfunction",
            Duration::from_millis(10),
        );
        let cancel = CancellationToken::new();
        let stats = std::sync::Arc::new(WatchStats::default());

        let handle = {
            let cancel = cancel.clone();
            let stats = stats.clone();
            tokio::spawn(async move {
                source
                    .watch(CommandQueue::new(), cancel, None, &stats)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(stats.scans_failed.load(Ordering::Relaxed) >= 1);
        assert_eq!(stats.scans_completed.load(Ordering::Relaxed), 0);
    }
}
