//! 폴링 기반 디렉토리 감시기
//!
//! 감시 디렉토리를 주기적으로 나열하여 새로 나타난 파일마다
//! [`FileReadyHandler`]를 정확히 한 번 호출합니다.
//!
//! # 시작 순서
//! 1. 기준 스냅샷 -- 시작 시점에 존재하는 파일 목록을 먼저 기록
//! 2. 시작 스캔 -- 스냅샷의 파일을 처리 (`scan_filter` 적용)
//! 3. 폴링 -- 추적 집합에 없는 파일만 처리
//!
//! 스냅샷을 스캔보다 먼저 기록하므로 스캔 도중 생성된 파일은 첫 폴링에서
//! 처리되고, 스캔한 파일이 다시 처리되는 일도 없습니다.
//!
//! # 파일 식별
//! 경로와 inode(Unix)로 파일을 식별합니다. 사라진 파일은 추적 집합에서
//! 제거되므로 같은 이름으로 다시 생성되면 새 파일로 처리됩니다.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use spikewatch_core::config::ScanFilter;
use spikewatch_core::metrics as m;
use spikewatch_core::pipeline::FileReadyHandler;
use tokio::sync::broadcast;

use super::{FilePattern, TriggerOrigin};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

/// 파일 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    #[cfg(not(unix))]
    fn of(_meta: &Metadata) -> Self {
        Self {}
    }
}

/// 폴링 기반 디렉토리 감시기
pub struct DirectoryWatcher<H: FileReadyHandler> {
    root: PathBuf,
    pattern: FilePattern,
    recursive: bool,
    scan_filter: ScanFilter,
    poll_interval: Duration,
    handler: Arc<H>,
    /// 경로 -> 식별자
    tracked: HashMap<PathBuf, FileIdentity>,
    /// 시작 스캔 대기 중인 파일 (기준 스냅샷에서 채워짐)
    pending_scan: Vec<PathBuf>,
    /// 파일 처리 도중 종료 신호를 받음
    interrupted: bool,
}

impl<H: FileReadyHandler> DirectoryWatcher<H> {
    /// 설정과 핸들러로 감시기를 생성합니다.
    pub fn new(config: &PipelineConfig, handler: Arc<H>) -> Result<Self, LogPipelineError> {
        Ok(Self {
            root: config.directory.clone(),
            pattern: config.file_pattern()?,
            recursive: config.recursive,
            scan_filter: config.scan_filter,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            handler,
            tracked: HashMap::new(),
            pending_scan: Vec::new(),
            interrupted: false,
        })
    }

    /// 감시 디렉토리
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 추적 중인 파일 수
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// 기준 스냅샷을 기록합니다.
    ///
    /// 감시 디렉토리를 읽을 수 없으면 실패합니다. 이후 [`startup_scan`](Self::startup_scan)이
    /// 스냅샷의 파일을 처리합니다.
    pub async fn take_baseline(&mut self) -> Result<usize, LogPipelineError> {
        let entries = self.list().await?;

        self.pending_scan = entries
            .iter()
            .filter(|(path, _)| match self.scan_filter {
                ScanFilter::Matching => self.pattern.matches(path),
                ScanFilter::All => true,
            })
            .map(|(path, _)| path.clone())
            .collect();
        self.tracked = entries.into_iter().collect();
        gauge!(m::WATCHER_TRACKED_FILES).set(self.tracked.len() as f64);

        tracing::info!(
            directory = %self.root.display(),
            files = self.tracked.len(),
            pending = self.pending_scan.len(),
            "baseline snapshot taken"
        );
        Ok(self.tracked.len())
    }

    /// 기준 스냅샷의 파일을 처리합니다. 처리한 파일 수를 반환합니다.
    ///
    /// `shutdown`이 주어지면 파일 사이마다 종료 신호를 확인합니다.
    pub async fn startup_scan(
        &mut self,
        mut shutdown: Option<&mut broadcast::Receiver<()>>,
    ) -> usize {
        let pending = std::mem::take(&mut self.pending_scan);
        let mut dispatched = 0;
        for path in pending {
            if shutdown_requested(shutdown.as_deref_mut()) {
                tracing::info!("shutdown requested during startup scan");
                self.interrupted = true;
                break;
            }
            self.dispatch(path, TriggerOrigin::Startup).await;
            dispatched += 1;
        }
        dispatched
    }

    /// 디렉토리를 한 번 나열하여 새 파일을 처리합니다. 처리한 파일 수를 반환합니다.
    ///
    /// `shutdown`이 주어지면 파일 사이마다 종료 신호를 확인하고, 신호가 오면
    /// 남은 파일을 처리하지 않고 돌아갑니다.
    pub async fn poll_once(
        &mut self,
        mut shutdown: Option<&mut broadcast::Receiver<()>>,
    ) -> Result<usize, LogPipelineError> {
        let entries = self.list().await?;

        let mut fresh = Vec::new();
        let mut next = HashMap::with_capacity(entries.len());
        for (path, identity) in entries {
            if self.tracked.get(&path) != Some(&identity) && self.pattern.matches(&path) {
                fresh.push(path.clone());
            }
            next.insert(path, identity);
        }

        let vanished = self
            .tracked
            .keys()
            .filter(|p| !next.contains_key(*p))
            .count();
        if vanished > 0 {
            tracing::debug!(vanished, "files removed from watched directory");
        }
        self.tracked = next;
        gauge!(m::WATCHER_TRACKED_FILES).set(self.tracked.len() as f64);

        let mut dispatched = 0;
        for path in fresh {
            if shutdown_requested(shutdown.as_deref_mut()) {
                tracing::info!(dispatched, "shutdown requested during poll");
                self.interrupted = true;
                break;
            }
            self.dispatch(path, TriggerOrigin::Created).await;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// 시작 스캔 후 종료 신호가 올 때까지 폴링합니다.
    ///
    /// 진행 중인 파일 처리는 끝까지 수행한 뒤 종료합니다.
    /// 디렉토리 나열 실패는 경고로 기록하고 다음 주기에 재시도합니다.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let scanned = self.startup_scan(Some(&mut shutdown)).await;
        if self.interrupted {
            tracing::info!(directory = %self.root.display(), scanned, "directory watcher stopped");
            return;
        }
        tracing::info!(
            directory = %self.root.display(),
            scanned,
            pattern = self.pattern.as_str(),
            "startup scan complete, watching for new files"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // 첫 tick은 즉시 완료되므로 건너뜀
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("directory watcher received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.poll_once(Some(&mut shutdown)).await {
                counter!(m::WATCHER_POLL_ERRORS_TOTAL).increment(1);
                tracing::warn!(error = %e, "directory poll failed");
            }
            if self.interrupted {
                break;
            }
        }

        tracing::info!(directory = %self.root.display(), "directory watcher stopped");
    }

    async fn dispatch(&self, path: PathBuf, origin: TriggerOrigin) {
        tracing::debug!(path = %path.display(), origin = origin.as_str(), "file ready");

        let handler = Arc::clone(&self.handler);
        let target = path.clone();
        match tokio::task::spawn_blocking(move || handler.on_file_ready(&target)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    path = %path.display(),
                    origin = origin.as_str(),
                    error = %e,
                    "file processing failed, continuing to watch"
                );
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "file processing task failed");
            }
        }
    }

    async fn list(&self) -> Result<Vec<(PathBuf, FileIdentity)>, LogPipelineError> {
        let root = self.root.clone();
        let recursive = self.recursive;
        tokio::task::spawn_blocking(move || list_files(&root, recursive))
            .await
            .map_err(|e| LogPipelineError::Watch {
                path: self.root.display().to_string(),
                reason: e.to_string(),
            })?
    }
}

/// 종료 신호가 왔거나 송신측이 닫혔는지 확인합니다.
fn shutdown_requested(shutdown: Option<&mut broadcast::Receiver<()>>) -> bool {
    shutdown.is_some_and(|rx| {
        !matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty))
    })
}

/// 디렉토리 아래의 일반 파일을 경로 순으로 나열합니다.
///
/// 루트를 읽을 수 없으면 실패합니다. 하위 디렉토리를 읽을 수 없으면 건너뜁니다.
/// 디렉토리 심볼릭 링크는 따라가지 않습니다.
fn list_files(
    root: &Path,
    recursive: bool,
) -> Result<Vec<(PathBuf, FileIdentity)>, LogPipelineError> {
    let watch_error = |reason: String| LogPipelineError::Watch {
        path: root.display().to_string(),
        reason,
    };

    let meta = std::fs::metadata(root).map_err(|e| watch_error(e.to_string()))?;
    if !meta.is_dir() {
        return Err(watch_error("not a directory".to_owned()));
    }

    let mut files = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    let mut is_root = true;

    while let Some(dir) = dirs.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if is_root => return Err(watch_error(e.to_string())),
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable subdirectory");
                continue;
            }
        };
        is_root = false;

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                if recursive {
                    dirs.push(path);
                }
                continue;
            }
            // 심볼릭 링크는 대상이 일반 파일일 때만 포함
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => files.push((path, FileIdentity::of(&meta))),
                _ => {}
            }
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}
