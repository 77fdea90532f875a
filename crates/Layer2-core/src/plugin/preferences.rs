//! Plugin Preferences - 비활성화된 플러그인 목록 영속화

use super::manifest::PluginId;
use async_trait::async_trait;
use parking_lot::RwLock;
use plugbay_foundation::{JsonStore, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// 비활성화 집합 저장소
#[async_trait]
pub trait PluginPreferences: Send + Sync {
    async fn disabled_plugins(&self) -> Result<BTreeSet<PluginId>>;

    async fn set_disabled_plugins(&self, disabled: &BTreeSet<PluginId>) -> Result<()>;

    async fn is_disabled(&self, id: &PluginId) -> Result<bool> {
        Ok(self.disabled_plugins().await?.contains(id))
    }

    /// 비활성화 집합 갱신 (변경되었으면 true)
    async fn set_disabled(&self, id: &PluginId, disabled: bool) -> Result<bool> {
        let mut set = self.disabled_plugins().await?;
        let changed = if disabled {
            set.insert(id.clone())
        } else {
            set.remove(id)
        };
        if changed {
            self.set_disabled_plugins(&set).await?;
        }
        Ok(changed)
    }
}

// ============================================================================
// JsonPluginPreferences
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferencesFile {
    #[serde(default)]
    disabled_plugins: BTreeSet<PluginId>,

    /// 다른 호스트 설정은 보존
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

/// `preferences.json` 기반 구현
pub struct JsonPluginPreferences {
    store: JsonStore,
    filename: String,
}

impl JsonPluginPreferences {
    pub fn new(file: impl AsRef<Path>) -> Self {
        let file = file.as_ref();
        let dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let filename = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| super::layout::PREFERENCES_FILE.to_string());

        Self {
            store: JsonStore::new(dir),
            filename,
        }
    }

    fn read(&self) -> Result<PreferencesFile> {
        Ok(self
            .store
            .load_optional::<PreferencesFile>(&self.filename)?
            .unwrap_or_default())
    }
}

#[async_trait]
impl PluginPreferences for JsonPluginPreferences {
    async fn disabled_plugins(&self) -> Result<BTreeSet<PluginId>> {
        Ok(self.read()?.disabled_plugins)
    }

    async fn set_disabled_plugins(&self, disabled: &BTreeSet<PluginId>) -> Result<()> {
        let mut file = self.read()?;
        file.disabled_plugins = disabled.clone();
        self.store.save(&self.filename, &file)
    }
}

// ============================================================================
// InMemoryPreferences
// ============================================================================

/// 메모리 전용 구현 (테스트/임베딩용)
#[derive(Default)]
pub struct InMemoryPreferences {
    disabled: RwLock<BTreeSet<PluginId>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginPreferences for InMemoryPreferences {
    async fn disabled_plugins(&self) -> Result<BTreeSet<PluginId>> {
        Ok(self.disabled.read().clone())
    }

    async fn set_disabled_plugins(&self, disabled: &BTreeSet<PluginId>) -> Result<()> {
        *self.disabled.write() = disabled.clone();
        Ok(())
    }
}
