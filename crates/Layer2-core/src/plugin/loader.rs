//! Plugin Loader - 플러그인 유닛 발견 및 인스턴스화
//!
//! 매 호출마다 새로운 네임스페이스에서 스캔합니다 (캐시 없음).
//!
//! 1. 루트마다 `plugin.json` 파싱
//! 2. 유닛 이름 중복 검사
//! 3. `requires`를 호스트 기능 + 같은 스캔의 유닛 이름으로 해석
//! 4. `plugin` 제공자를 런타임별 팩토리로 인스턴스화

use super::manifest::{UnitManifest, MANIFEST_FILE};
use super::process::ProcessPluginFactory;
use super::traits::{Plugin, PluginFactory};
use plugbay_foundation::{DiscoveryPolicy, Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

// ============================================================================
// LoadedUnit
// ============================================================================

/// 파싱된 유닛
#[derive(Debug, Clone)]
pub struct LoadedUnit {
    /// 유닛 디렉토리
    pub dir: PathBuf,

    /// `plugin.json` 경로
    pub manifest_path: PathBuf,

    pub manifest: UnitManifest,
}

impl LoadedUnit {
    pub fn name(&self) -> &str {
        &self.manifest.unit
    }

    /// 유닛 디렉토리 기준 경로
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.dir.join(relative)
    }
}

// ============================================================================
// PluginLoader
// ============================================================================

/// 플러그인 로더
pub struct PluginLoader {
    factories: HashMap<String, Arc<dyn PluginFactory>>,
    host_capabilities: HashSet<String>,
    policy: DiscoveryPolicy,
}

impl PluginLoader {
    /// 기본 `process` 런타임이 등록된 로더
    pub fn new(host_capabilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut loader = Self {
            factories: HashMap::new(),
            host_capabilities: host_capabilities.into_iter().map(Into::into).collect(),
            policy: DiscoveryPolicy::default(),
        };
        loader.register_factory(Arc::new(ProcessPluginFactory::new()));
        loader
    }

    pub fn with_policy(mut self, policy: DiscoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn PluginFactory>) -> Self {
        self.register_factory(factory);
        self
    }

    /// 런타임 팩토리 등록 (같은 런타임은 교체)
    pub fn register_factory(&mut self, factory: Arc<dyn PluginFactory>) {
        self.factories.insert(factory.runtime().to_string(), factory);
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 루트들을 스캔하여 플러그인 인스턴스 생성
    pub async fn load(&self, roots: &[PathBuf]) -> Result<Vec<Arc<dyn Plugin>>> {
        let units = self.read_units(roots).await?;
        let units = self.check_unique(units)?;
        let units = self.resolve_requires(units)?;
        let plugins = self.instantiate(&units)?;

        info!(
            "Discovered {} plugin(s) in {} unit(s)",
            plugins.len(),
            units.len()
        );
        Ok(plugins)
    }

    /// FailFast면 에러, SkipInvalid면 경고 후 계속
    fn reject(&self, message: String) -> Result<()> {
        match self.policy {
            DiscoveryPolicy::FailFast => Err(Error::Discovery(message)),
            DiscoveryPolicy::SkipInvalid => {
                warn!("Skipping plugin unit: {}", message);
                Ok(())
            }
        }
    }

    async fn read_units(&self, roots: &[PathBuf]) -> Result<Vec<LoadedUnit>> {
        let mut units = Vec::new();

        for root in roots {
            let manifest_path = root.join(MANIFEST_FILE);
            if !fs::try_exists(&manifest_path).await.unwrap_or(false) {
                debug!("No {} in {:?}", MANIFEST_FILE, root);
                continue;
            }

            let parsed = match fs::read_to_string(&manifest_path).await {
                Ok(content) => UnitManifest::parse(&content),
                Err(e) => Err(e.into()),
            };

            match parsed {
                Ok(manifest) => {
                    debug!("Found unit {} at {:?}", manifest.unit, root);
                    units.push(LoadedUnit {
                        dir: root.clone(),
                        manifest_path,
                        manifest,
                    });
                }
                Err(e) => {
                    self.reject(format!("malformed {:?}: {}", manifest_path, e))?;
                }
            }
        }

        Ok(units)
    }

    fn check_unique(&self, units: Vec<LoadedUnit>) -> Result<Vec<LoadedUnit>> {
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        let mut unique = Vec::with_capacity(units.len());

        for unit in units {
            if let Some(first) = seen.get(unit.name()) {
                self.reject(format!(
                    "duplicate unit {} in {:?} and {:?}",
                    unit.name(),
                    first,
                    unit.dir
                ))?;
                continue;
            }
            seen.insert(unit.name().to_string(), unit.dir.clone());
            unique.push(unit);
        }

        Ok(unique)
    }

    fn resolve_requires(&self, mut units: Vec<LoadedUnit>) -> Result<Vec<LoadedUnit>> {
        // 유닛 제거가 다른 유닛의 의존성을 깨뜨릴 수 있으므로 고정점까지 반복
        loop {
            let available: HashSet<&str> = self
                .host_capabilities
                .iter()
                .map(String::as_str)
                .chain(units.iter().map(LoadedUnit::name))
                .collect();

            let unresolved = units.iter().position(|unit| {
                unit.manifest
                    .requires
                    .iter()
                    .any(|req| !available.contains(req.as_str()))
            });

            let Some(index) = unresolved else {
                return Ok(units);
            };

            let unit = units.remove(index);
            let missing: Vec<&str> = unit
                .manifest
                .requires
                .iter()
                .map(String::as_str)
                .filter(|req| {
                    !self.host_capabilities.contains(*req)
                        && !units.iter().any(|other| other.name() == *req)
                })
                .collect();

            self.reject(format!(
                "unit {} has unresolved dependencies: {}",
                unit.name(),
                missing.join(", ")
            ))?;
        }
    }

    fn instantiate(&self, units: &[LoadedUnit]) -> Result<Vec<Arc<dyn Plugin>>> {
        let mut plugins = Vec::new();

        for unit in units {
            for provider in unit.manifest.plugin_providers() {
                let Some(factory) = self.factories.get(&provider.runtime) else {
                    self.reject(format!(
                        "unit {} provider {} uses unknown runtime {}",
                        unit.name(),
                        provider.id,
                        provider.runtime
                    ))?;
                    continue;
                };

                match factory.instantiate(unit, provider) {
                    Ok(plugin) => {
                        debug!("Instantiated plugin {} from {}", provider.id, unit.name());
                        plugins.push(plugin);
                    }
                    Err(e) => {
                        self.reject(format!(
                            "unit {} failed to instantiate {}: {}",
                            unit.name(),
                            provider.id,
                            e
                        ))?;
                    }
                }
            }
        }

        Ok(plugins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_unit(root: &Path, manifest: serde_json::Value) -> PathBuf {
        std::fs::create_dir_all(root).unwrap();
        std::fs::write(root.join(MANIFEST_FILE), manifest.to_string()).unwrap();
        root.to_path_buf()
    }

    fn unit(name: &str, id: &str, requires: &[&str]) -> serde_json::Value {
        json!({
            "unit": name,
            "requires": requires,
            "provides": [
                { "id": id, "metadata": { "name": id, "version": "1.0.0" } }
            ]
        })
    }

    #[tokio::test]
    async fn test_load_single_unit() {
        let temp = TempDir::new().unwrap();
        let root = write_unit(&temp.path().join("a"), unit("a.unit", "a.Plugin", &["plugbay.api"]));

        let loader = PluginLoader::new(["plugbay.api"]);
        let plugins = loader.load(&[root.clone()]).await.unwrap();

        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].id().as_str(), "a.Plugin");
        assert_eq!(plugins[0].location(), Some(root.join(MANIFEST_FILE).as_path()));
    }

    #[tokio::test]
    async fn test_missing_roots_contribute_nothing() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty");
        std::fs::create_dir_all(&empty).unwrap();

        let loader = PluginLoader::new(Vec::<String>::new());
        let plugins = loader
            .load(&[temp.path().join("missing"), empty])
            .await
            .unwrap();
        assert!(plugins.is_empty());
    }

    #[tokio::test]
    async fn test_requires_other_unit_in_scan() {
        let temp = TempDir::new().unwrap();
        let base = write_unit(&temp.path().join("base"), unit("base.unit", "base.Plugin", &[]));
        let ext = write_unit(&temp.path().join("ext"), unit("ext.unit", "ext.Plugin", &["base.unit"]));

        let loader = PluginLoader::new(Vec::<String>::new());
        assert_eq!(loader.load(&[ext, base]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fail_fast_on_missing_dependency() {
        let temp = TempDir::new().unwrap();
        let good = write_unit(&temp.path().join("good"), unit("good", "good.Plugin", &[]));
        let bad = write_unit(&temp.path().join("bad"), unit("bad", "bad.Plugin", &["nowhere"]));

        let loader = PluginLoader::new(Vec::<String>::new());
        let err = match loader.load(&[good, bad]).await {
            Err(e) => e,
            Ok(_) => panic!("scan should fail"),
        };
        assert!(matches!(err, Error::Discovery(_)));
        assert!(err.to_string().contains("nowhere"));
    }

    #[tokio::test]
    async fn test_skip_invalid_isolates_units() {
        let temp = TempDir::new().unwrap();
        let good = write_unit(&temp.path().join("good"), unit("good", "good.Plugin", &[]));
        let bad = write_unit(&temp.path().join("bad"), unit("bad", "bad.Plugin", &["nowhere"]));
        let dependent = write_unit(&temp.path().join("dep"), unit("dep", "dep.Plugin", &["bad"]));
        let malformed = temp.path().join("malformed");
        std::fs::create_dir_all(&malformed).unwrap();
        std::fs::write(malformed.join(MANIFEST_FILE), "{ nope").unwrap();

        let loader = PluginLoader::new(Vec::<String>::new()).with_policy(DiscoveryPolicy::SkipInvalid);
        let plugins = loader.load(&[good, bad, dependent, malformed]).await.unwrap();

        let ids: Vec<&str> = plugins.iter().map(|p| p.id().as_str()).collect();
        assert_eq!(ids, vec!["good.Plugin"]);
    }

    #[tokio::test]
    async fn test_duplicate_unit_names() {
        let temp = TempDir::new().unwrap();
        let a = write_unit(&temp.path().join("a"), unit("same", "a.Plugin", &[]));
        let b = write_unit(&temp.path().join("b"), unit("same", "b.Plugin", &[]));

        let loader = PluginLoader::new(Vec::<String>::new());
        assert!(loader.load(&[a.clone(), b.clone()]).await.is_err());

        let lenient = PluginLoader::new(Vec::<String>::new()).with_policy(DiscoveryPolicy::SkipInvalid);
        assert_eq!(lenient.load(&[a, b]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_only_plugin_service_instantiated() {
        let temp = TempDir::new().unwrap();
        let root = write_unit(
            &temp.path().join("multi"),
            json!({
                "unit": "multi",
                "provides": [
                    { "id": "multi.Plugin" },
                    { "id": "multi.Theme", "service": "theme" }
                ]
            }),
        );

        let loader = PluginLoader::new(Vec::<String>::new());
        assert_eq!(loader.load(&[root]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_runtime() {
        let temp = TempDir::new().unwrap();
        let root = write_unit(
            &temp.path().join("wasm"),
            json!({ "unit": "wasm", "provides": [ { "id": "w.Plugin", "runtime": "wasm" } ] }),
        );

        let loader = PluginLoader::new(Vec::<String>::new());
        let err = loader.load(&[root]).await.err().unwrap();
        assert!(err.to_string().contains("unknown runtime wasm"));
    }
}
