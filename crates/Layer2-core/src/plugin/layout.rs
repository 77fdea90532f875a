//! Plugin Layout - 관리 디렉토리 구조
//!
//! ```text
//! <user_dir>/plugins/<id>/{lib,config,docs}
//! <user_dir>/plugins/.cleanup.json
//! <user_dir>/data/<id>
//! <user_dir>/preferences.json
//! ```

use super::manifest::PluginId;
use plugbay_foundation::{Result, RuntimeConfig};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 지연 삭제 큐 파일명
pub const CLEANUP_FILE: &str = ".cleanup.json";

/// 환경설정 파일명
pub const PREFERENCES_FILE: &str = "preferences.json";

/// 관리 디렉토리 레이아웃
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLayout {
    root: PathBuf,
}

impl PluginLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 런타임 설정에서 사용자 디렉토리 결정
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        Ok(Self::new(config.resolve_user_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    pub fn data_root(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn cleanup_file(&self) -> PathBuf {
        self.plugins_dir().join(CLEANUP_FILE)
    }

    pub fn preferences_file(&self) -> PathBuf {
        self.root.join(PREFERENCES_FILE)
    }

    pub fn plugin_dir(&self, id: &PluginId) -> PathBuf {
        self.plugins_dir().join(id.as_str())
    }

    pub fn lib_dir(&self, id: &PluginId) -> PathBuf {
        self.plugin_dir(id).join("lib")
    }

    pub fn config_dir(&self, id: &PluginId) -> PathBuf {
        self.plugin_dir(id).join("config")
    }

    pub fn docs_dir(&self, id: &PluginId) -> PathBuf {
        self.plugin_dir(id).join("docs")
    }

    pub fn data_dir(&self, id: &PluginId) -> PathBuf {
        self.data_root().join(id.as_str())
    }

    /// 로더가 스캔할 루트들 (`plugins/*/lib`)
    pub async fn scan_roots(&self) -> Result<Vec<PathBuf>> {
        let plugins_dir = self.plugins_dir();
        if !fs::try_exists(&plugins_dir).await? {
            return Ok(Vec::new());
        }

        let mut roots = Vec::new();
        let mut entries = fs::read_dir(&plugins_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let lib = entry.path().join("lib");
            if fs::try_exists(&lib).await? {
                roots.push(lib);
            }
        }

        roots.sort();
        Ok(roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let layout = PluginLayout::new("/home/u/.plugbay");
        let id = PluginId::from("demo.DemoPlugin");

        assert_eq!(
            layout.lib_dir(&id),
            PathBuf::from("/home/u/.plugbay/plugins/demo.DemoPlugin/lib")
        );
        assert_eq!(
            layout.data_dir(&id),
            PathBuf::from("/home/u/.plugbay/data/demo.DemoPlugin")
        );
        assert_eq!(
            layout.cleanup_file(),
            PathBuf::from("/home/u/.plugbay/plugins/.cleanup.json")
        );
    }

    #[tokio::test]
    async fn test_scan_roots() {
        let temp = TempDir::new().unwrap();
        let layout = PluginLayout::new(temp.path());

        assert!(layout.scan_roots().await.unwrap().is_empty());

        std::fs::create_dir_all(layout.lib_dir(&PluginId::from("b"))).unwrap();
        std::fs::create_dir_all(layout.lib_dir(&PluginId::from("a"))).unwrap();
        std::fs::create_dir_all(layout.config_dir(&PluginId::from("no-lib"))).unwrap();
        std::fs::write(layout.cleanup_file(), "{}").unwrap();

        let roots = layout.scan_roots().await.unwrap();
        assert_eq!(
            roots,
            vec![
                layout.lib_dir(&PluginId::from("a")),
                layout.lib_dir(&PluginId::from("b"))
            ]
        );
    }
}
