//! Local Artifact Repository - 디렉토리 기반 업데이트 저장소
//!
//! `<name>-<semver>.zip` 파일들 중 가장 높은 버전이 최신입니다.

use super::manifest::{cmp_precedence, parse_version, Version};
use super::traits::ArtifactRepository;
use async_trait::async_trait;
use plugbay_foundation::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// 로컬 디렉토리 아티팩트 저장소
#[derive(Debug, Clone)]
pub struct LocalArtifactRepository {
    dir: PathBuf,
}

impl LocalArtifactRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 파일명에서 버전 추출 (`demo-1.2.0.zip` → 1.2.0)
    pub fn version_of(file_name: &str) -> Option<Version> {
        let stem = file_name
            .strip_suffix(".zip")
            .or_else(|| file_name.strip_suffix(".ZIP"))?;

        // pre-release에도 '-'가 올 수 있으므로 앞에서부터 시도
        stem.match_indices('-')
            .map(|(idx, _)| &stem[idx + 1..])
            .find_map(parse_version)
    }

    async fn latest(&self) -> Result<Option<(Version, PathBuf)>> {
        if !fs::try_exists(&self.dir).await? {
            return Ok(None);
        }

        let mut latest: Option<(Version, PathBuf)> = None;
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(version) = name.to_str().and_then(Self::version_of) else {
                continue;
            };

            if latest.as_ref().map_or(true, |(current, _)| cmp_precedence(&version, current).is_gt()) {
                latest = Some((version, entry.path()));
            }
        }

        Ok(latest)
    }
}

#[async_trait]
impl ArtifactRepository for LocalArtifactRepository {
    async fn latest_version(&self) -> Result<Option<Version>> {
        Ok(self.latest().await?.map(|(version, _)| version))
    }

    async fn fetch_latest(&self, dest: &Path) -> Result<PathBuf> {
        let (version, path) = self
            .latest()
            .await?
            .ok_or_else(|| Error::NotFound(format!("No artifacts in {:?}", self.dir)))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| Error::Internal(format!("Invalid artifact path {:?}", path)))?;

        fs::create_dir_all(dest).await?;
        let target = dest.join(file_name);
        fs::copy(&path, &target).await?;

        debug!("Fetched artifact {} to {:?}", version, target);
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_version_of() {
        assert_eq!(
            LocalArtifactRepository::version_of("demo-1.2.0.zip"),
            parse_version("1.2.0")
        );
        assert_eq!(
            LocalArtifactRepository::version_of("my-demo-2.0.0-rc.1.zip"),
            parse_version("2.0.0-rc.1")
        );
        assert!(LocalArtifactRepository::version_of("demo.zip").is_none());
        assert!(LocalArtifactRepository::version_of("demo-1.0.0.tar").is_none());
    }

    #[tokio::test]
    async fn test_latest_and_fetch() {
        let temp = TempDir::new().unwrap();
        let repo_dir = temp.path().join("updates");
        std::fs::create_dir_all(&repo_dir).unwrap();
        for name in ["demo-1.0.0.zip", "demo-1.10.0.zip", "demo-1.9.0.zip", "demo-2.0.0-beta.zip", "notes.txt"] {
            std::fs::write(repo_dir.join(name), name).unwrap();
        }

        let repo = LocalArtifactRepository::new(&repo_dir);
        assert_eq!(repo.latest_version().await.unwrap(), parse_version("2.0.0-beta"));

        let fetched = repo.fetch_latest(&temp.path().join("dl")).await.unwrap();
        assert_eq!(fetched.file_name().unwrap(), "demo-2.0.0-beta.zip");
        assert!(fetched.exists());
    }

    #[tokio::test]
    async fn test_empty_repository() {
        let temp = TempDir::new().unwrap();
        let repo = LocalArtifactRepository::new(temp.path().join("missing"));

        assert!(repo.latest_version().await.unwrap().is_none());
        assert!(matches!(
            repo.fetch_latest(temp.path()).await,
            Err(Error::NotFound(_))
        ));
    }
}
