//! Process Plugin - 외부 프로세스로 라이프사이클 훅을 실행하는 기본 런타임
//!
//! 훅 호출 규약: `<program> <args...> <start|stop>`
//! - 작업 디렉토리: 유닛 디렉토리
//! - 환경 변수: `PLUGBAY_PLUGIN_ID`, `PLUGBAY_HOOK`, `PLUGBAY_UNIT_DIR`,
//!   `PLUGBAY_DATA_DIR`, `PLUGBAY_CONFIG_DIR`
//! - 종료 코드 0 = 성공, 그 외 = stderr를 담은 에러

use super::artifact::LocalArtifactRepository;
use super::extension::ExtensionClass;
use super::layout::PluginLayout;
use super::loader::LoadedUnit;
use super::manifest::{EntryPoint, Metadata, PluginId, ProviderDecl, DEFAULT_RUNTIME};
use super::traits::{ArtifactRepository, DependencyModule, Plugin, PluginFactory};
use async_trait::async_trait;
use plugbay_foundation::{Error, Result};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// 훅 이름
pub const HOOK_START: &str = "start";
pub const HOOK_STOP: &str = "stop";

// ============================================================================
// ProcessPlugin
// ============================================================================

/// 프로세스 훅 기반 플러그인
pub struct ProcessPlugin {
    id: PluginId,
    metadata: Option<Metadata>,
    icon: Option<PathBuf>,
    modules: Vec<DependencyModule>,
    extensions: Vec<ExtensionClass>,
    repository: Option<Arc<dyn ArtifactRepository>>,

    unit_dir: PathBuf,
    location: PathBuf,
    entry: Option<EntryPoint>,

    data_dir: Option<PathBuf>,
    config_dir: Option<PathBuf>,
}

impl ProcessPlugin {
    fn command(&self, entry: &EntryPoint, hook: &str) -> Command {
        // 경로 구분자가 있으면 유닛 디렉토리 기준
        let program = if entry.program.contains('/') || entry.program.contains('\\') {
            self.unit_dir.join(&entry.program).into_os_string()
        } else {
            entry.program.clone().into()
        };

        let mut cmd = Command::new(program);
        cmd.args(&entry.args)
            .arg(hook)
            .current_dir(&self.unit_dir)
            .env("PLUGBAY_PLUGIN_ID", self.id.as_str())
            .env("PLUGBAY_HOOK", hook)
            .env("PLUGBAY_UNIT_DIR", &self.unit_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.data_dir {
            cmd.env("PLUGBAY_DATA_DIR", dir);
        }
        if let Some(dir) = &self.config_dir {
            cmd.env("PLUGBAY_CONFIG_DIR", dir);
        }

        cmd
    }

    async fn run_hook(&self, hook: &str) -> Result<()> {
        let Some(entry) = &self.entry else {
            debug!("Plugin {} has no entry, {} hook is a no-op", self.id, hook);
            return Ok(());
        };

        debug!("Running {} hook of {}: {}", hook, self.id, entry.program);

        let output = self
            .command(entry, hook)
            .output()
            .await
            .map_err(|e| Error::lifecycle(self.id.as_str(), format!("failed to run {} hook: {}", hook, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::lifecycle(
            self.id.as_str(),
            format!("{} hook exited with {}: {}", hook, output.status, stderr.trim()),
        ))
    }
}

#[async_trait]
impl Plugin for ProcessPlugin {
    fn id(&self) -> &PluginId {
        &self.id
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    fn icon(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    fn dependency_modules(&self) -> Vec<DependencyModule> {
        self.modules.clone()
    }

    fn artifact_repository(&self) -> Option<Arc<dyn ArtifactRepository>> {
        self.repository.clone()
    }

    fn extensions(&self) -> &[ExtensionClass] {
        &self.extensions
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.location)
    }

    async fn start(&self) -> Result<()> {
        self.run_hook(HOOK_START).await
    }

    async fn stop(&self) -> Result<()> {
        self.run_hook(HOOK_STOP).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// ProcessPluginFactory
// ============================================================================

/// `process` 런타임 팩토리
#[derive(Debug, Clone, Default)]
pub struct ProcessPluginFactory {
    /// 있으면 데이터/설정 디렉토리를 환경 변수로 전달
    layout: Option<PluginLayout>,
}

impl ProcessPluginFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: PluginLayout) -> Self {
        Self {
            layout: Some(layout),
        }
    }
}

impl PluginFactory for ProcessPluginFactory {
    fn runtime(&self) -> &str {
        DEFAULT_RUNTIME
    }

    fn instantiate(&self, unit: &LoadedUnit, provider: &ProviderDecl) -> Result<Arc<dyn Plugin>> {
        if let Some(entry) = &unit.manifest.entry {
            if entry.program.trim().is_empty() {
                return Err(Error::Discovery(format!(
                    "unit {} has an empty entry program",
                    unit.name()
                )));
            }
        }

        let repository = provider.repository.as_ref().map(|dir| {
            Arc::new(LocalArtifactRepository::new(unit.resolve(dir))) as Arc<dyn ArtifactRepository>
        });

        Ok(Arc::new(ProcessPlugin {
            id: provider.id.clone(),
            metadata: provider.metadata.clone(),
            icon: provider.icon.as_ref().map(|icon| unit.resolve(icon)),
            modules: provider.modules.clone(),
            extensions: provider.extensions.clone(),
            repository,
            unit_dir: unit.dir.clone(),
            location: unit.manifest_path.clone(),
            entry: unit.manifest.entry.clone(),
            data_dir: self.layout.as_ref().map(|l| l.data_dir(&provider.id)),
            config_dir: self.layout.as_ref().map(|l| l.config_dir(&provider.id)),
        }))
    }
}
