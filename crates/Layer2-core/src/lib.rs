//! plugbay-core: Plugin Runtime
//!
//! Layer2 - 플러그인 발견, 설치, 라이프사이클 레이어
//!
//! # 주요 모듈
//!
//! - `plugin`: 매니저, 로더, 설치기, 정리 큐, 확장 해석기
//!
//! # 사용 예시
//!
//! ```ignore
//! use plugbay_core::{PluginLayout, PluginManager, PluginManagerConfig, Version};
//!
//! let config = PluginManagerConfig::new(Version::new(0, 9, 0), PluginLayout::new(root));
//! let manager = PluginManager::new(config);
//!
//! // 설치 (새 코드는 재시작 후 로드)
//! manager.install_plugin(Path::new("demo-1.0.zip")).await?;
//!
//! // 로드 + 시작
//! manager.load_all_plugins().await?;
//! manager.start_all_plugins().await;
//! ```

pub mod plugin;

// Re-exports: Plugin
pub use plugin::{
    // Extensions
    ExtensionClass,
    ExtensionPoint,
    ExtensionRef,
    ExtensionResolver,
    // Events
    EventBus,
    PluginEvent,
    PluginEventHandler,
    PluginEventKind,
    // Manager
    LifecycleReport,
    PluginManager,
    PluginManagerConfig,
    UpdateInfo,
    // Layout & persistence
    JsonPluginPreferences,
    PluginCleaner,
    PluginLayout,
    PluginPreferences,
    // Model
    Metadata,
    PluginId,
    PluginRecord,
    PluginState,
    Version,
    // Traits
    ArtifactRepository,
    Plugin,
    PluginFactory,
};

// Layer1 re-exports
pub use plugbay_foundation::{Error, Result};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
