//! Plugin Installer - 플러그인 패키지 설치 및 제거
//!
//! zip 아카이브나 디렉토리에서 플러그인을 검증하고 관리 디렉토리로 복사합니다.
//! 사용 중일 수 있는 경로는 `PluginCleaner`로 다음 시작 시 삭제합니다.

use super::archive;
use super::cleaner::PluginCleaner;
use super::extension::ExtensionResolver;
use super::layout::PluginLayout;
use super::loader::PluginLoader;
use super::manifest::{supports_platform_version, PluginId, Version, MANIFEST_FILE};
use super::record::{PluginRecord, PluginState};
use super::repository::PluginRepository;
use super::traits::Plugin;
use parking_lot::Mutex;
use plugbay_foundation::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// 임시 압축 해제 디렉토리 접두사
pub const TEMP_DIR_PREFIX: &str = "plugbay_plugin_";

/// 패키지 내 번들 설정 디렉토리
pub const BUNDLED_CONFIG_DIR: &str = "config";

/// 패키지 내 번들 문서 디렉토리
pub const BUNDLED_DOCS_DIR: &str = "docs";

fn install_failed(reason: &str) -> Error {
    Error::Validation(reason.to_string())
}

/// 플러그인 설치기
pub struct PluginInstaller {
    layout: PluginLayout,
    host_version: Version,
    loader: Arc<PluginLoader>,
    cleaner: Arc<PluginCleaner>,
    repository: Arc<PluginRepository>,
    resolver: ExtensionResolver,

    /// 임시 디렉토리 루트
    temp_root: PathBuf,

    /// 이 설치기가 만든 임시 디렉토리들
    temp_dirs: Mutex<HashSet<PathBuf>>,
}

impl PluginInstaller {
    pub fn new(
        layout: PluginLayout,
        host_version: Version,
        loader: Arc<PluginLoader>,
        cleaner: Arc<PluginCleaner>,
        repository: Arc<PluginRepository>,
        resolver: ExtensionResolver,
    ) -> Self {
        Self {
            layout,
            host_version,
            loader,
            cleaner,
            repository,
            resolver,
            temp_root: std::env::temp_dir(),
            temp_dirs: Mutex::new(HashSet::new()),
        }
    }

    /// 임시 디렉토리 루트 변경
    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    pub fn layout(&self) -> &PluginLayout {
        &self.layout
    }

    // ========================================================================
    // 설치
    // ========================================================================

    /// 아카이브 또는 디렉토리에서 플러그인 설치
    pub async fn install(&self, source: &Path) -> Result<Arc<PluginRecord>> {
        info!("Installing plugin from {:?}", source);

        let metadata = fs::metadata(source)
            .await
            .map_err(|_| install_failed("path contains no plugins"))?;

        let unit_dir = if metadata.is_file() && archive::is_package_file(source) {
            self.extract_to_temp_dir(source).await?
        } else if metadata.is_dir() {
            source.to_path_buf()
        } else {
            return Err(install_failed("path contains no plugins"));
        };

        let mut plugins = self.loader.load(&[unit_dir.clone()]).await?;
        if plugins.is_empty() {
            return Err(install_failed("path contains no plugins"));
        }
        if plugins.len() > 1 {
            return Err(install_failed("only one plugin per directory allowed"));
        }
        let plugin = plugins.remove(0);

        if let Some(meta) = plugin.metadata() {
            debug!("Candidate plugin {}: {:?}", plugin.id(), meta);
        }
        self.validate(plugin.as_ref()).await?;

        self.copy_resources(plugin.id(), &unit_dir).await?;

        let extensions = self.resolver.resolve(plugin.id(), plugin.extensions());
        let record = Arc::new(PluginRecord::new(
            Arc::clone(&plugin),
            PluginState::Installed,
            extensions,
        ));

        if !self.repository.insert(Arc::clone(&record)).await {
            return Err(install_failed("already installed"));
        }

        info!("Installed plugin {} ({})", record.id(), record.name());
        Ok(record)
    }

    /// 설치 가능 여부 검증
    pub async fn validate(&self, plugin: &dyn Plugin) -> Result<()> {
        let metadata = plugin
            .metadata()
            .ok_or_else(|| install_failed("invalid metadata"))?;

        metadata.validate(&self.host_version)?;

        if !plugin.id().is_path_safe() {
            return Err(install_failed("invalid plugin id"));
        }

        if self.repository.contains(plugin.id()).await {
            return Err(install_failed("already installed"));
        }

        Ok(())
    }

    /// 요구 플랫폼 버전을 호스트가 만족하는지
    pub fn is_supported_platform_version(&self, required: Option<&str>) -> Result<bool> {
        supports_platform_version(&self.host_version, required)
    }

    async fn extract_to_temp_dir(&self, archive_path: &Path) -> Result<PathBuf> {
        // 임시 디렉토리를 만들기 전에 시그니처부터 확인
        if !archive::has_zip_signature(archive_path).await? {
            return Err(Error::extraction(archive_path, "not a zip archive"));
        }

        let temp_dir = self
            .temp_root
            .join(format!("{}{}", TEMP_DIR_PREFIX, uuid::Uuid::new_v4()));
        fs::create_dir_all(&temp_dir).await?;
        self.temp_dirs.lock().insert(temp_dir.clone());
        debug!("Extracting to {:?}", temp_dir);

        // 로드된 플러그인이 파일을 잡고 있을 수 있으므로 결과와 관계없이 예약
        if let Err(e) = self.cleaner.append(&temp_dir).await {
            warn!("Unable to schedule cleanup of {:?}: {}", temp_dir, e);
        }

        if let Err(e) = archive::extract_zip(archive_path, &temp_dir).await {
            let _ = archive::delete_tree(&temp_dir).await;
            return Err(e);
        }

        Self::locate_unit(&temp_dir).await
    }

    /// 압축 루트에 `plugin.json`이 없고 하위 디렉토리가 하나뿐이면 그것이 유닛
    async fn locate_unit(extracted: &Path) -> Result<PathBuf> {
        if fs::try_exists(extracted.join(MANIFEST_FILE)).await? {
            return Ok(extracted.to_path_buf());
        }

        let mut entries = fs::read_dir(extracted).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            children.push((entry.path(), entry.file_type().await?.is_dir()));
        }

        match children.as_slice() {
            [(path, true)] => Ok(path.clone()),
            _ => Ok(extracted.to_path_buf()),
        }
    }

    async fn copy_resources(&self, id: &PluginId, unit_dir: &Path) -> Result<()> {
        let plugin_dir = self.layout.plugin_dir(id);
        let data_dir = self.layout.data_dir(id);
        let created_plugin_dir = !fs::try_exists(&plugin_dir).await.unwrap_or(false);
        let created_data_dir = !fs::try_exists(&data_dir).await.unwrap_or(false);

        let lib_dir = self.layout.lib_dir(id);
        let config_dir = self.layout.config_dir(id);
        let docs_dir = self.layout.docs_dir(id);

        let result = async {
            for dir in [&lib_dir, &config_dir, &docs_dir, &data_dir] {
                fs::create_dir_all(dir).await?;
            }

            // 재시작 없이 제거 후 재설치한 경우
            for dir in [&lib_dir, &config_dir, &docs_dir] {
                self.cleaner.cancel(dir).await?;
            }

            debug!("Copying plugin artifact to {:?}", lib_dir);
            archive::copy_tree(unit_dir, &lib_dir, true, &[BUNDLED_CONFIG_DIR, BUNDLED_DOCS_DIR])
                .await?;

            debug!("Copying bundled config and docs");
            let bundled_config = unit_dir.join(BUNDLED_CONFIG_DIR);
            if fs::try_exists(&bundled_config).await? {
                archive::copy_tree(&bundled_config, &config_dir, false, &[]).await?;
            }
            let bundled_docs = unit_dir.join(BUNDLED_DOCS_DIR);
            if fs::try_exists(&bundled_docs).await? {
                archive::copy_tree(&bundled_docs, &docs_dir, false, &[]).await?;
            }

            Ok::<(), Error>(())
        }
        .await;

        if let Err(e) = result {
            error!("Unable to copy plugin {} files: {}", id, e);
            if created_plugin_dir {
                let _ = archive::delete_tree(&plugin_dir).await;
            }
            if created_data_dir {
                let _ = archive::delete_tree(&data_dir).await;
            }
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("generic I/O error: {}", e),
            )));
        }

        Ok(())
    }

    // ========================================================================
    // 제거
    // ========================================================================

    /// 플러그인 제거 (알 수 없거나 이미 제거된 경우 no-op)
    pub async fn uninstall(&self, id: &PluginId, delete_user_resources: bool) -> Result<bool> {
        let Some(record) = self.repository.get(id).await else {
            debug!("Uninstall of unknown plugin {} ignored", id);
            return Ok(false);
        };
        if record.state().is_uninstalled() {
            return Ok(false);
        }

        info!("Uninstalling {}", id);
        record.set_state(PluginState::Uninstalled);

        let lib_dir = self.layout.lib_dir(id);
        let artifact_dir = record
            .plugin()
            .location()
            .and_then(Path::parent)
            .map(Path::to_path_buf);

        match artifact_dir {
            Some(dir) if dir.starts_with(&lib_dir) => {
                self.schedule(&lib_dir).await;
            }
            artifact => {
                // 설치 직후(재시작 전) 제거: 아티팩트는 아직 임시 경로에 있음
                if let Err(e) = archive::delete_tree(&lib_dir).await {
                    warn!("Unable to delete {:?}: {}", lib_dir, e);
                }
                if let Some(dir) = artifact.filter(|dir| self.is_own_temp_path(dir)) {
                    self.schedule(&dir).await;
                }
            }
        }

        let docs_dir = self.layout.docs_dir(id);
        if let Err(e) = archive::delete_tree(&docs_dir).await {
            debug!("Ignoring failure to delete {:?}: {}", docs_dir, e);
        }

        let config_dir = self.layout.config_dir(id);
        if archive::is_empty_dir(&config_dir).await.unwrap_or(false) {
            let _ = fs::remove_dir(&config_dir).await;
        }

        if delete_user_resources {
            self.schedule(&self.layout.data_dir(id)).await;
            self.schedule(&self.layout.plugin_dir(id)).await;
        }

        info!("Uninstalled {}; some files will be deleted on next start", id);
        Ok(true)
    }

    async fn schedule(&self, path: &Path) {
        if let Err(e) = self.cleaner.append(path).await {
            warn!("Unable to schedule cleanup of {:?}: {}", path, e);
        }
    }

    fn is_own_temp_path(&self, path: &Path) -> bool {
        self.temp_dirs
            .lock()
            .iter()
            .any(|temp| path.starts_with(temp))
    }
}
