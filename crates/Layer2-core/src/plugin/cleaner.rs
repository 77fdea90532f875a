//! Plugin Cleaner - 지연 삭제 큐
//!
//! 사용 중이라 즉시 지울 수 없는 경로를 `.cleanup.json`에 기록하고,
//! 다음 시작 시 플러그인 로드 전에 한 번 정리합니다.
//! 실패한 경로는 `max_attempts`회까지 다음 시작으로 넘어갑니다.

use super::archive;
use chrono::{DateTime, Utc};
use plugbay_foundation::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

// ============================================================================
// CleanupTask
// ============================================================================

/// 삭제 대상 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupKind {
    File,
    Directory,
}

/// 삭제 예약 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupTask {
    pub path: PathBuf,
    pub kind: CleanupKind,

    /// 실패한 시도 횟수
    #[serde(default)]
    pub attempts: u32,

    pub queued_at: DateTime<Utc>,
}

/// `.cleanup.json` 구조
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CleanupFile {
    #[serde(default = "default_version")]
    version: String,

    #[serde(default)]
    tasks: Vec<CleanupTask>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for CleanupFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            tasks: Vec::new(),
        }
    }
}

/// 한 번의 정리 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub retained: usize,
    pub dropped: usize,
}

// ============================================================================
// PluginCleaner
// ============================================================================

/// 지연 삭제 큐
pub struct PluginCleaner {
    file: PathBuf,
    max_attempts: u32,

    /// 파일 캐시 (첫 사용 시 로드)
    cache: Mutex<Option<CleanupFile>>,
}

impl PluginCleaner {
    pub fn new(file: impl Into<PathBuf>, max_attempts: u32) -> Self {
        Self {
            file: file.into(),
            max_attempts: max_attempts.max(1),
            cache: Mutex::new(None),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    async fn read_file(&self) -> Result<CleanupFile> {
        if !fs::try_exists(&self.file).await? {
            return Ok(CleanupFile::default());
        }

        let content = fs::read_to_string(&self.file).await?;
        match serde_json::from_str(&content) {
            Ok(file) => Ok(file),
            Err(e) => {
                warn!("Ignoring corrupt cleanup file {:?}: {}", self.file, e);
                Ok(CleanupFile::default())
            }
        }
    }

    async fn write_file(&self, data: &CleanupFile) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(data)?;
        fs::write(&self.file, content).await?;
        Ok(())
    }

    // ========================================================================
    // Queue
    // ========================================================================

    /// 경로 예약 (존재하지 않거나 이미 예약된 경로는 무시)
    pub async fn append(&self, path: &Path) -> Result<bool> {
        let metadata = match fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                debug!("Not scheduling missing path {:?}", path);
                return Ok(false);
            }
        };

        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        let data = cache.get_or_insert_with(CleanupFile::default);

        if data.tasks.iter().any(|task| task.path == path) {
            return Ok(false);
        }

        data.tasks.push(CleanupTask {
            path: path.to_path_buf(),
            kind: if metadata.is_dir() {
                CleanupKind::Directory
            } else {
                CleanupKind::File
            },
            attempts: 0,
            queued_at: Utc::now(),
        });

        self.write_file(data).await?;
        info!("Scheduled {:?} for deletion on next start", path);
        Ok(true)
    }

    /// `path` 또는 그 하위 경로의 예약 취소 (취소된 개수 반환)
    pub async fn cancel(&self, path: &Path) -> Result<usize> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        let data = cache.get_or_insert_with(CleanupFile::default);

        let before = data.tasks.len();
        data.tasks.retain(|task| !task.path.starts_with(path));
        let cancelled = before - data.tasks.len();

        if cancelled > 0 {
            self.write_file(data).await?;
            debug!("Cancelled {} cleanup task(s) under {:?}", cancelled, path);
        }
        Ok(cancelled)
    }

    /// 대기 중인 항목
    pub async fn pending(&self) -> Result<Vec<CleanupTask>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        Ok(cache
            .as_ref()
            .map(|data| data.tasks.clone())
            .unwrap_or_default())
    }

    // ========================================================================
    // Execute
    // ========================================================================

    /// 모든 항목을 한 번씩 삭제 시도
    pub async fn execute_all(&self) -> Result<CleanupReport> {
        let mut cache = self.cache.lock().await;
        let mut data = match cache.take() {
            Some(data) => data,
            None => self.read_file().await?,
        };

        let mut report = CleanupReport::default();
        let mut retained = Vec::new();

        for mut task in std::mem::take(&mut data.tasks) {
            match archive::delete_tree(&task.path).await {
                Ok(()) => {
                    debug!("Deleted {:?}", task.path);
                    report.deleted += 1;
                }
                Err(e) => {
                    task.attempts += 1;
                    if task.attempts >= self.max_attempts {
                        warn!(
                            "Giving up deleting {:?} after {} attempts: {}",
                            task.path, task.attempts, e
                        );
                        report.dropped += 1;
                    } else {
                        debug!("Deleting {:?} failed, will retry: {}", task.path, e);
                        retained.push(task);
                    }
                }
            }
        }

        report.retained = retained.len();
        data.tasks = retained;

        let result = self.write_file(&data).await;
        *cache = Some(data);
        result?;

        if report.deleted + report.dropped > 0 {
            info!(
                "Cleanup pass: {} deleted, {} retained, {} dropped",
                report.deleted, report.retained, report.dropped
            );
        }
        Ok(report)
    }

    /// 에러를 로그로만 남기는 정리
    pub async fn execute_all_silently(&self) -> CleanupReport {
        match self.execute_all().await {
            Ok(report) => report,
            Err(e) => {
                warn!("Plugin cleanup failed: {}", e);
                CleanupReport::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cleaner(temp: &TempDir) -> PluginCleaner {
        PluginCleaner::new(temp.path().join("plugins").join(".cleanup.json"), 3)
    }

    #[tokio::test]
    async fn test_append_ignores_missing_and_duplicates() {
        let temp = TempDir::new().unwrap();
        let cleaner = cleaner(&temp);
        let dir = temp.path().join("victim");
        std::fs::create_dir_all(&dir).unwrap();

        assert!(!cleaner.append(&temp.path().join("missing")).await.unwrap());
        assert!(cleaner.append(&dir).await.unwrap());
        assert!(!cleaner.append(&dir).await.unwrap());

        let pending = cleaner.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, CleanupKind::Directory);
    }

    #[tokio::test]
    async fn test_persisted_across_instances() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("victim");
        std::fs::create_dir_all(dir.join("inner")).unwrap();
        let file = temp.path().join("victim.txt");
        std::fs::write(&file, "x").unwrap();

        {
            let cleaner = cleaner(&temp);
            cleaner.append(&dir).await.unwrap();
            cleaner.append(&file).await.unwrap();
        }

        let next_run = cleaner(&temp);
        assert_eq!(next_run.pending().await.unwrap().len(), 2);

        let report = next_run.execute_all().await.unwrap();
        assert_eq!(report.deleted, 2);
        assert!(!dir.exists());
        assert!(!file.exists());
        assert!(cleaner(&temp).pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_under_path() {
        let temp = TempDir::new().unwrap();
        let cleaner = cleaner(&temp);
        let lib = temp.path().join("plugins/demo/lib");
        let docs = temp.path().join("plugins/demo/docs");
        let other = temp.path().join("plugins/other/lib");
        for dir in [&lib, &docs, &other] {
            std::fs::create_dir_all(dir).unwrap();
            cleaner.append(dir).await.unwrap();
        }

        let cancelled = cleaner.cancel(&temp.path().join("plugins/demo")).await.unwrap();
        assert_eq!(cancelled, 2);

        let pending = cleaner.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].path, other);
    }

    #[tokio::test]
    async fn test_missing_path_counts_as_done() {
        let temp = TempDir::new().unwrap();
        let cleaner = cleaner(&temp);
        let dir = temp.path().join("gone");
        std::fs::create_dir_all(&dir).unwrap();
        cleaner.append(&dir).await.unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let report = cleaner.execute_all().await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.retained, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_retry_bound() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("locked");
        let victim = locked.join("victim");
        std::fs::create_dir_all(&victim).unwrap();

        let cleaner = PluginCleaner::new(temp.path().join(".cleanup.json"), 2);
        cleaner.append(&victim).await.unwrap();

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // privileged users bypass directory permissions
        if std::fs::write(locked.join("write-check"), "x").is_ok() {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let first = cleaner.execute_all().await.unwrap();
        assert_eq!(first.retained, 1);
        assert_eq!(cleaner.pending().await.unwrap()[0].attempts, 1);

        let second = cleaner.execute_all().await.unwrap();
        assert_eq!(second.dropped, 1);
        assert!(cleaner.pending().await.unwrap().is_empty());

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let cleaner = cleaner(&temp);
        std::fs::create_dir_all(temp.path().join("plugins")).unwrap();
        std::fs::write(cleaner.file(), "garbage").unwrap();

        assert!(cleaner.pending().await.unwrap().is_empty());
        assert_eq!(cleaner.execute_all_silently().await, CleanupReport::default());
    }
}
