//! # Plugin System
//!
//! 패키지 기반 플러그인 런타임
//!
//! ## 개요
//!
//! 관리 디렉토리에 설치된 플러그인 유닛을 발견하고, 라이프사이클 훅을 실행하며,
//! 설치/제거와 지연 삭제를 처리합니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PluginManager                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │ PluginLoader │  │  Installer   │  │  PluginCleaner   │  │
//! │  │  (factories) │  │ (zip / dir)  │  │ (.cleanup.json)  │  │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────────────┘  │
//! │         │                 │                                 │
//! │  ┌──────▼─────────────────▼──────────────────────────────┐ │
//! │  │                 PluginRepository                       │ │
//! │  │   PluginRecord = Plugin + PluginState + ExtensionMap   │ │
//! │  └────────────────────────────────────────────────────────┘ │
//! │                                                              │
//! │  EventBus · PluginPreferences (disabled set) · Resolver     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 디렉토리 레이아웃
//!
//! ```text
//! <user-dir>/plugins/<id>/{config,lib,docs}
//! <user-dir>/plugins/.cleanup.json
//! <user-dir>/data/<id>
//! <user-dir>/preferences.json
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! let config = PluginManagerConfig::new(Version::new(0, 9, 0), PluginLayout::new(root));
//! let manager = PluginManager::new(config);
//!
//! manager.load_all_plugins_or_empty().await;
//! let report = manager.start_all_plugins().await;
//!
//! for ext in manager.started_extensions(&ExtensionPoint::TOOL).await {
//!     println!("{} -> {}", ext.plugin, ext.class_name);
//! }
//! ```

pub mod archive;
mod artifact;
mod cleaner;
mod events;
mod extension;
mod installer;
mod layout;
mod loader;
mod manager;
mod manifest;
mod preferences;
mod process;
mod record;
mod repository;
mod traits;

pub use artifact::LocalArtifactRepository;
pub use cleaner::{CleanupKind, CleanupReport, CleanupTask, PluginCleaner};
pub use events::{EventBus, PluginEvent, PluginEventHandler, PluginEventKind};
pub use extension::{ExtensionClass, ExtensionMap, ExtensionPoint, ExtensionResolver};
pub use installer::{PluginInstaller, TEMP_DIR_PREFIX};
pub use layout::{PluginLayout, CLEANUP_FILE, PREFERENCES_FILE};
pub use loader::{LoadedUnit, PluginLoader};
pub use manager::{
    ExtensionRef, LifecycleReport, PluginManager, PluginManagerBuilder, PluginManagerConfig,
    UpdateInfo, DEFAULT_HOOK_TIMEOUT,
};
pub use manifest::{
    cmp_precedence, parse_version, supports_platform_version, EntryPoint, Metadata, PluginId,
    ProviderDecl, UnitManifest, Version, MANIFEST_FILE,
};
pub use preferences::{InMemoryPreferences, JsonPluginPreferences, PluginPreferences};
pub use process::{ProcessPlugin, ProcessPluginFactory};
pub use record::{PluginRecord, PluginState};
pub use repository::PluginRepository;
pub use traits::{ArtifactRepository, DependencyModule, Plugin, PluginFactory};
