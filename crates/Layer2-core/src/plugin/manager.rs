//! Plugin Manager - 플러그인 라이프사이클 관리
//!
//! 호스트가 사용하는 단일 진입점입니다.
//!
//! - 첫 작업(로드/설치/제거/활성화) 전에 정리 큐를 한 번 실행
//! - 관리 디렉토리 스캔 후 레코드 생성 (비활성 목록 반영)
//! - start/stop 훅 실행 (타임아웃, 실패 격리)
//! - 설치/제거 위임 및 이벤트 발행

use super::cleaner::{CleanupReport, PluginCleaner};
use super::events::{EventBus, PluginEvent, PluginEventKind};
use super::extension::{ExtensionPoint, ExtensionResolver};
use super::installer::PluginInstaller;
use super::layout::PluginLayout;
use super::loader::PluginLoader;
use super::manifest::{cmp_precedence, PluginId, Version};
use super::preferences::{JsonPluginPreferences, PluginPreferences};
use super::process::ProcessPluginFactory;
use super::record::{PluginRecord, PluginState};
use super::repository::PluginRepository;
use super::traits::PluginFactory;
use plugbay_foundation::{DiscoveryPolicy, Error, Result, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// 기본 훅 타임아웃
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// PluginManagerConfig
// ============================================================================

/// 플러그인 매니저 설정
#[derive(Debug, Clone)]
pub struct PluginManagerConfig {
    /// 호스트 플랫폼 버전
    pub host_version: Version,

    /// 관리 디렉토리 레이아웃
    pub layout: PluginLayout,

    /// 호스트가 지원하는 확장 포인트
    pub extension_points: Vec<ExtensionPoint>,

    /// `requires`로 참조 가능한 호스트 기능
    pub host_capabilities: Vec<String>,

    /// start/stop 훅 타임아웃
    pub hook_timeout: Duration,

    pub discovery_policy: DiscoveryPolicy,

    pub cleanup_max_attempts: u32,
}

impl PluginManagerConfig {
    pub fn new(host_version: Version, layout: PluginLayout) -> Self {
        Self {
            host_version,
            layout,
            extension_points: vec![ExtensionPoint::TOOL],
            host_capabilities: Vec::new(),
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
            discovery_policy: DiscoveryPolicy::default(),
            cleanup_max_attempts: 3,
        }
    }

    /// 런타임 설정에서 생성
    pub fn from_runtime(host_version: Version, runtime: &RuntimeConfig) -> Result<Self> {
        let layout = PluginLayout::from_config(runtime)?;
        let mut config = Self::new(host_version, layout);
        config.hook_timeout = runtime.lifecycle.hook_timeout();
        config.discovery_policy = runtime.discovery.policy;
        config.cleanup_max_attempts = runtime.cleanup.max_attempts;
        Ok(config)
    }

    pub fn with_extension_point(mut self, point: ExtensionPoint) -> Self {
        if !self.extension_points.contains(&point) {
            self.extension_points.push(point);
        }
        self
    }

    pub fn with_host_capability(mut self, capability: impl Into<String>) -> Self {
        self.host_capabilities.push(capability.into());
        self
    }

    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = timeout;
        self
    }

    pub fn with_discovery_policy(mut self, policy: DiscoveryPolicy) -> Self {
        self.discovery_policy = policy;
        self
    }
}

// ============================================================================
// Reports
// ============================================================================

/// start_all / stop_all 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleReport {
    /// 훅이 성공한 플러그인
    pub succeeded: Vec<PluginId>,

    /// 실패한 플러그인과 사유
    pub failed: Vec<(PluginId, String)>,
}

impl LifecycleReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 업데이트 확인 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub plugin: PluginId,
    pub current: Version,
    pub latest: Version,
}

/// 실행 중인 플러그인이 제공하는 확장
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRef {
    pub plugin: PluginId,
    pub class_name: String,
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    Start,
    Stop,
}

impl Hook {
    fn name(self) -> &'static str {
        match self {
            Hook::Start => "start",
            Hook::Stop => "stop",
        }
    }
}

// ============================================================================
// PluginManagerBuilder
// ============================================================================

/// PluginManager 빌더
pub struct PluginManagerBuilder {
    config: PluginManagerConfig,
    preferences: Option<Arc<dyn PluginPreferences>>,
    factories: Vec<Arc<dyn PluginFactory>>,
    temp_root: Option<PathBuf>,
    events: Option<Arc<EventBus>>,
}

impl PluginManagerBuilder {
    /// 비활성 목록 저장소 (기본: `preferences.json`)
    pub fn preferences(mut self, preferences: Arc<dyn PluginPreferences>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// 추가 런타임 팩토리
    pub fn factory(mut self, factory: Arc<dyn PluginFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// 설치용 임시 디렉토리 루트
    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    pub fn event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> PluginManager {
        let config = self.config;
        let layout = config.layout.clone();

        let mut loader = PluginLoader::new(config.host_capabilities.iter().cloned())
            .with_policy(config.discovery_policy)
            .with_factory(Arc::new(ProcessPluginFactory::with_layout(layout.clone())));
        for factory in self.factories {
            loader.register_factory(factory);
        }
        let loader = Arc::new(loader);

        let resolver = ExtensionResolver::new(config.extension_points.iter().cloned());
        let repository = Arc::new(PluginRepository::new());
        let cleaner = Arc::new(PluginCleaner::new(
            layout.cleanup_file(),
            config.cleanup_max_attempts,
        ));

        let mut installer = PluginInstaller::new(
            layout.clone(),
            config.host_version.clone(),
            Arc::clone(&loader),
            Arc::clone(&cleaner),
            Arc::clone(&repository),
            resolver.clone(),
        );
        if let Some(dir) = self.temp_root {
            installer = installer.with_temp_root(dir);
        }

        let preferences = self.preferences.unwrap_or_else(|| {
            Arc::new(JsonPluginPreferences::new(layout.preferences_file()))
        });

        PluginManager {
            config,
            repository,
            loader,
            installer,
            cleaner,
            resolver,
            preferences,
            events: self.events.unwrap_or_default(),
            cleanup_done: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// PluginManager
// ============================================================================

/// 플러그인 매니저 - 전체 플러그인 시스템 관리
pub struct PluginManager {
    config: PluginManagerConfig,

    /// 플러그인 레코드 저장소
    repository: Arc<PluginRepository>,

    loader: Arc<PluginLoader>,
    installer: PluginInstaller,
    cleaner: Arc<PluginCleaner>,
    resolver: ExtensionResolver,

    /// 비활성 목록
    preferences: Arc<dyn PluginPreferences>,

    /// 이벤트 버스
    events: Arc<EventBus>,

    /// 정리 큐 실행 여부
    cleanup_done: AtomicBool,
}

impl PluginManager {
    pub fn builder(config: PluginManagerConfig) -> PluginManagerBuilder {
        PluginManagerBuilder {
            config,
            preferences: None,
            factories: Vec::new(),
            temp_root: None,
            events: None,
        }
    }

    /// 기본 구성으로 생성
    pub fn new(config: PluginManagerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &PluginManagerConfig {
        &self.config
    }

    pub fn layout(&self) -> &PluginLayout {
        &self.config.layout
    }

    pub fn repository(&self) -> &Arc<PluginRepository> {
        &self.repository
    }

    pub fn installer(&self) -> &PluginInstaller {
        &self.installer
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// 이벤트 구독
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // 로드
    // ========================================================================

    /// 관리 디렉토리의 모든 플러그인 로드
    ///
    /// 반환값은 새로 추가된 레코드 수입니다.
    pub async fn load_all_plugins(&self) -> Result<usize> {
        self.ensure_cleanup().await;

        let roots = self.config.layout.scan_roots().await?;
        info!(
            "Searching {:?} for plugins ({} candidates)",
            self.config.layout.plugins_dir(),
            roots.len()
        );

        let plugins = self.loader.load(&roots).await?;
        let disabled = self.preferences.disabled_plugins().await.unwrap_or_else(|e| {
            warn!("Failed to read disabled plugins: {}", e);
            Default::default()
        });

        let mut loaded = 0;
        for plugin in plugins {
            if self.repository.contains(plugin.id()).await {
                debug!("Plugin {} is already registered, skipping", plugin.id());
                continue;
            }

            let state = if disabled.contains(plugin.id()) {
                PluginState::Disabled
            } else {
                PluginState::Loaded
            };
            let extensions = self.resolver.resolve(plugin.id(), plugin.extensions());
            let record = Arc::new(PluginRecord::new(plugin, state, extensions));

            if self.repository.insert(Arc::clone(&record)).await {
                info!("Plugin {} ({}): {}", record.id(), record.name(), state);
                loaded += 1;
            }
        }

        Ok(loaded)
    }

    /// 로드 실패 시 빈 카탈로그로 진행
    pub async fn load_all_plugins_or_empty(&self) -> usize {
        match self.load_all_plugins().await {
            Ok(count) => count,
            Err(e) => {
                error!("Plugin discovery failed, continuing without plugins: {}", e);
                0
            }
        }
    }

    /// 시작 시 정리 큐 실행 (이미 실행됐으면 빈 결과)
    ///
    /// 이번 실행 중에 예약된 작업은 다음 시작까지 남습니다.
    pub async fn run_cleanup(&self) -> Result<CleanupReport> {
        if self.cleanup_done.swap(true, Ordering::SeqCst) {
            debug!("Cleanup pass already ran in this session");
            return Ok(CleanupReport::default());
        }
        self.cleaner.execute_all().await
    }

    /// 설치/제거/로드 전에 한 번만 실행
    async fn ensure_cleanup(&self) {
        if self.cleanup_done.swap(true, Ordering::SeqCst) {
            return;
        }
        let report = self.cleaner.execute_all_silently().await;
        if report != CleanupReport::default() {
            debug!(
                "Cleanup pass: {} deleted, {} retained, {} dropped",
                report.deleted, report.retained, report.dropped
            );
        }
    }

    // ========================================================================
    // 라이프사이클
    // ========================================================================

    /// LOADED 상태의 모든 플러그인 시작
    pub async fn start_all_plugins(&self) -> LifecycleReport {
        let mut report = LifecycleReport::default();

        for record in self.repository.in_state(PluginState::Loaded).await {
            match self.start_plugin(&record).await {
                Ok(()) => report.succeeded.push(record.id().clone()),
                Err(e) => report.failed.push((record.id().clone(), e.to_string())),
            }
        }

        if !report.is_success() {
            warn!("{} plugin(s) failed to start", report.failed.len());
        }
        report
    }

    /// STARTED 상태의 모든 플러그인 정지
    pub async fn stop_all_plugins(&self) -> LifecycleReport {
        let mut report = LifecycleReport::default();

        for record in self.repository.in_state(PluginState::Started).await {
            match self.stop_plugin(&record).await {
                Ok(()) => report.succeeded.push(record.id().clone()),
                Err(e) => report.failed.push((record.id().clone(), e.to_string())),
            }
        }

        if !report.is_success() {
            warn!("{} plugin(s) failed to stop", report.failed.len());
        }
        report
    }

    async fn start_plugin(&self, record: &Arc<PluginRecord>) -> Result<()> {
        debug!("Starting plugin {}", record.id());
        match self.run_hook(record, Hook::Start).await {
            Ok(()) => {
                self.set_state(record, PluginState::Started).await;
                info!("Started plugin {}", record.id());
                Ok(())
            }
            Err(e) => {
                error!("Failed to start plugin {}: {}", record.id(), e);
                self.set_state(record, PluginState::Failed).await;
                Err(e)
            }
        }
    }

    async fn stop_plugin(&self, record: &Arc<PluginRecord>) -> Result<()> {
        debug!("Stopping plugin {}", record.id());
        match self.run_hook(record, Hook::Stop).await {
            Ok(()) => {
                self.set_state(record, PluginState::Stopped).await;
                info!("Stopped plugin {}", record.id());
                Ok(())
            }
            Err(e) => {
                error!("Failed to stop plugin {}: {}", record.id(), e);
                self.set_state(record, PluginState::Failed).await;
                Err(e)
            }
        }
    }

    async fn run_hook(&self, record: &PluginRecord, hook: Hook) -> Result<()> {
        let plugin = record.plugin();
        let timeout = self.config.hook_timeout;

        let result = match hook {
            Hook::Start => tokio::time::timeout(timeout, plugin.start()).await,
            Hook::Stop => tokio::time::timeout(timeout, plugin.stop()).await,
        };

        result.unwrap_or_else(|_| {
            Err(Error::Timeout(format!(
                "{} hook of {} exceeded {:?}",
                hook.name(),
                record.id(),
                timeout
            )))
        })
    }

    async fn set_state(&self, record: &PluginRecord, state: PluginState) {
        let previous = record.set_state(state);
        if previous != state {
            self.events
                .publish(PluginEvent::state_changed(record.id(), previous, state))
                .await;
        }
    }

    // ========================================================================
    // 활성화 / 비활성화
    // ========================================================================

    /// 플러그인 활성화 (DISABLED → LOADED → 시작)
    pub async fn enable_plugin(&self, id: &PluginId) -> Result<()> {
        self.ensure_cleanup().await;
        let record = self.require(id).await?;

        let state = record.state();
        if state == PluginState::Uninstalled {
            debug!("Plugin {} is uninstalled, nothing to enable", id);
            return Ok(());
        }
        self.preferences.set_disabled(id, false).await?;

        if state != PluginState::Disabled {
            debug!("Plugin {} is {}, nothing to enable", id, state);
            return Ok(());
        }

        self.set_state(&record, PluginState::Loaded).await;
        self.start_plugin(&record).await
    }

    /// 플러그인 비활성화 (실행 중이면 먼저 정지)
    pub async fn disable_plugin(&self, id: &PluginId) -> Result<()> {
        self.ensure_cleanup().await;
        let record = self.require(id).await?;

        let state = record.state();
        if state == PluginState::Uninstalled {
            debug!("Plugin {} is uninstalled, nothing to disable", id);
            return Ok(());
        }
        self.preferences.set_disabled(id, true).await?;

        match state {
            PluginState::Disabled => return Ok(()),
            PluginState::Started => {
                if let Err(e) = self.stop_plugin(&record).await {
                    warn!("Disabling {} after failed stop: {}", id, e);
                }
            }
            _ => {}
        }

        self.set_state(&record, PluginState::Disabled).await;
        info!("Disabled plugin {}", id);
        Ok(())
    }

    /// 영속된 비활성 목록 기준
    pub async fn is_enabled(&self, id: &PluginId) -> Result<bool> {
        Ok(!self.preferences.is_disabled(id).await?)
    }

    pub async fn set_enabled(&self, id: &PluginId, enabled: bool) -> Result<()> {
        if enabled {
            self.enable_plugin(id).await
        } else {
            self.disable_plugin(id).await
        }
    }

    // ========================================================================
    // 설치 / 제거
    // ========================================================================

    /// 설치 (새 코드는 재시작 후 로드)
    pub async fn install_plugin(&self, source: &Path) -> Result<Arc<PluginRecord>> {
        self.ensure_cleanup().await;
        let record = self.installer.install(source).await?;

        self.events
            .publish(PluginEvent::new(PluginEventKind::Installed {
                plugin: record.id().clone(),
            }))
            .await;
        self.events
            .publish(PluginEvent::restart_required(format!(
                "plugin {} installed",
                record.id()
            )))
            .await;

        Ok(record)
    }

    /// 제거 (알 수 없는 ID는 무시)
    pub async fn uninstall_plugin(&self, id: &PluginId, purge: bool) -> Result<bool> {
        self.ensure_cleanup().await;
        let Some(record) = self.repository.get(id).await else {
            debug!("Plugin {} is not registered, nothing to uninstall", id);
            return Ok(false);
        };

        if record.state() == PluginState::Started {
            if let Err(e) = self.stop_plugin(&record).await {
                warn!("Ignoring stop failure of {} before uninstall: {}", id, e);
            }
        }

        let previous = record.state();
        let removed = self.installer.uninstall(id, purge).await?;
        if !removed {
            return Ok(false);
        }

        self.events
            .publish(PluginEvent::state_changed(id, previous, PluginState::Uninstalled))
            .await;
        self.events
            .publish(PluginEvent::new(PluginEventKind::Uninstalled {
                plugin: id.clone(),
                purged: purge,
            }))
            .await;
        self.events
            .publish(PluginEvent::restart_required(format!(
                "plugin {} uninstalled",
                id
            )))
            .await;

        Ok(true)
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 이름순 전체 레코드
    pub async fn all_plugins(&self) -> Vec<Arc<PluginRecord>> {
        let mut records = self.repository.all().await;
        records.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.id().as_str().cmp(b.id().as_str()))
        });
        records
    }

    pub async fn find(&self, id: &PluginId) -> Option<Arc<PluginRecord>> {
        self.repository.get(id).await
    }

    /// 확장 포인트를 제공하는 레코드 (상태 무관)
    pub async fn plugins_providing(&self, point: &ExtensionPoint) -> Vec<Arc<PluginRecord>> {
        self.repository.providing(point).await
    }

    pub async fn extension_implementations(
        &self,
        id: &PluginId,
        point: &ExtensionPoint,
    ) -> Vec<String> {
        self.repository
            .get(id)
            .await
            .map(|record| record.extensions().implementations(point))
            .unwrap_or_default()
    }

    /// STARTED 플러그인의 확장만
    pub async fn started_extensions(&self, point: &ExtensionPoint) -> Vec<ExtensionRef> {
        self.repository
            .providing(point)
            .await
            .into_iter()
            .filter(|record| record.state() == PluginState::Started)
            .flat_map(|record| {
                record
                    .extensions()
                    .implementations(point)
                    .into_iter()
                    .map(move |class_name| ExtensionRef {
                        plugin: record.id().clone(),
                        class_name,
                    })
            })
            .collect()
    }

    // ========================================================================
    // 업데이트
    // ========================================================================

    /// 아티팩트 저장소에 더 높은 버전이 있는지 확인
    pub async fn check_for_update(&self, id: &PluginId) -> Result<Option<UpdateInfo>> {
        let record = self.require(id).await?;
        let Some(repository) = record.plugin().artifact_repository() else {
            return Ok(None);
        };
        let Some(current) = record.metadata().and_then(|m| m.parsed_version()) else {
            warn!("Plugin {} has no valid version, skipping update check", id);
            return Ok(None);
        };

        let update = repository
            .latest_version()
            .await?
            .filter(|latest| cmp_precedence(latest, &current).is_gt())
            .map(|latest| UpdateInfo {
                plugin: id.clone(),
                current,
                latest,
            });

        if let Some(info) = &update {
            info!("Update available for {}: {} -> {}", id, info.current, info.latest);
        }
        Ok(update)
    }

    async fn require(&self, id: &PluginId) -> Result<Arc<PluginRecord>> {
        self.repository
            .get(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("Plugin not found: {}", id)))
    }
}
