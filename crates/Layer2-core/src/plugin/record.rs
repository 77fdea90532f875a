//! Plugin Record - 플러그인 인스턴스 + 상태 + 확장 맵

use super::extension::{ExtensionMap, ExtensionPoint};
use super::manifest::{Metadata, PluginId};
use super::traits::Plugin;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// PluginState
// ============================================================================

/// 플러그인 라이프사이클 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// 발견됨, 아직 시작 안됨
    Loaded,

    /// start 훅 성공
    Started,

    /// stop 훅 실행됨
    Stopped,

    /// 관리자에 의해 비활성화
    Disabled,

    /// start/stop 훅 실패 또는 타임아웃
    Failed,

    /// 설치됨 (재시작 후 Loaded로 승격)
    Installed,

    /// 제거됨 (종료 상태)
    Uninstalled,
}

impl PluginState {
    pub fn is_uninstalled(&self) -> bool {
        matches!(self, PluginState::Uninstalled)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loaded => "loaded",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Disabled => "disabled",
            Self::Failed => "failed",
            Self::Installed => "installed",
            Self::Uninstalled => "uninstalled",
        };
        f.pad(name)
    }
}

// ============================================================================
// PluginRecord
// ============================================================================

/// 플러그인 하나에 대한 호스트 측 기록
pub struct PluginRecord {
    plugin: Arc<dyn Plugin>,
    state: RwLock<PluginState>,
    extensions: ExtensionMap,
}

impl PluginRecord {
    pub fn new(plugin: Arc<dyn Plugin>, state: PluginState, extensions: ExtensionMap) -> Self {
        Self {
            plugin,
            state: RwLock::new(state),
            extensions,
        }
    }

    pub fn id(&self) -> &PluginId {
        self.plugin.id()
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.plugin.metadata()
    }

    /// 표시 이름 (메타데이터 이름, 없으면 ID)
    pub fn name(&self) -> &str {
        self.plugin
            .metadata()
            .map(|m| m.name.as_str())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.plugin.id().as_str())
    }

    pub fn state(&self) -> PluginState {
        *self.state.read()
    }

    /// 상태 설정 (이전 상태 반환)
    pub fn set_state(&self, state: PluginState) -> PluginState {
        std::mem::replace(&mut *self.state.write(), state)
    }

    pub fn extensions(&self) -> &ExtensionMap {
        &self.extensions
    }

    pub fn provides(&self, point: &ExtensionPoint) -> bool {
        self.extensions.provides(point)
    }
}

impl fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRecord")
            .field("id", self.id())
            .field("state", &self.state())
            .field("extensions", &self.extensions)
            .finish()
    }
}
