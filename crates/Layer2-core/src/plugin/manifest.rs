//! Plugin Manifest - 플러그인 메타데이터 및 `plugin.json` 디스크립터
//!
//! - `Version`: `semver` 크레이트 버전 + 우선순위 비교
//! - `Metadata`: 플러그인 표시 정보 (단일 검증 함수 `validate`)
//! - `UnitManifest` / `ProviderDecl`: 패키지 디스크립터

use super::extension::ExtensionClass;
use plugbay_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// 패키지 디스크립터 파일명
pub const MANIFEST_FILE: &str = "plugin.json";

/// 기본 서비스 타입 (이 서비스만 인스턴스화됨)
pub const PLUGIN_SERVICE: &str = "plugin";

/// 기본 런타임
pub const DEFAULT_RUNTIME: &str = "process";

// ============================================================================
// Version - semver
// ============================================================================

pub use semver::Version;

/// 버전 문자열 파싱 (앞뒤 공백 허용, 엄격한 semver)
pub fn parse_version(s: &str) -> Option<Version> {
    Version::parse(s.trim()).ok()
}

/// semver 우선순위 비교 (빌드 메타데이터 무시)
pub fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

// ============================================================================
// PluginId
// ============================================================================

/// 플러그인 구현 식별자 (관리 디렉토리 이름으로도 사용됨)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 디렉토리 이름으로 안전한지 확인 (영숫자, `.`, `-`, `_`)
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for PluginId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PluginId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// 플러그인 메타데이터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub name: String,

    /// semver 문자열
    #[serde(default)]
    pub version: String,

    /// 요구하는 최소 호스트 버전 (semver)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl Metadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_platform_version(mut self, version: impl Into<String>) -> Self {
        self.platform_version = Some(version.into());
        self
    }

    /// 설치 가능한 메타데이터인지 검증
    ///
    /// 이름/버전 공백 불가, 플랫폼 버전은 semver이고 호스트 버전 이하여야 함
    pub fn validate(&self, host_version: &Version) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("invalid plugin name".into()));
        }
        if self.version.trim().is_empty() {
            return Err(Error::Validation("invalid plugin version".into()));
        }
        if !supports_platform_version(host_version, self.platform_version.as_deref())? {
            return Err(Error::Validation("platform version too low".into()));
        }
        Ok(())
    }

    /// 파싱된 플러그인 버전
    pub fn parsed_version(&self) -> Option<Version> {
        parse_version(&self.version)
    }
}

/// 호스트가 요구 플랫폼 버전을 만족하는지 확인
///
/// 공백/없음이면 요구사항 없음. 잘못된 semver는 "invalid metadata" 검증 에러.
pub fn supports_platform_version(host_version: &Version, required: Option<&str>) -> Result<bool> {
    let required = match required.map(str::trim) {
        None | Some("") => return Ok(true),
        Some(v) => v,
    };

    let required =
        Version::parse(required).map_err(|_| Error::Validation("invalid metadata".into()))?;
    Ok(cmp_precedence(host_version, &required) != Ordering::Less)
}

// ============================================================================
// UnitManifest - plugin.json
// ============================================================================

/// 패키지 디스크립터 (`plugin.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitManifest {
    /// 유닛 이름 (스캔 내 고유)
    pub unit: String,

    /// 호스트 기능 또는 다른 유닛 이름
    #[serde(default)]
    pub requires: Vec<String>,

    /// 라이프사이클 훅 실행 진입점
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryPoint>,

    #[serde(default)]
    pub provides: Vec<ProviderDecl>,
}

impl UnitManifest {
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: UnitManifest = serde_json::from_str(content)?;
        if manifest.unit.trim().is_empty() {
            return Err(Error::Discovery("unit name must not be empty".into()));
        }
        Ok(manifest)
    }

    /// `plugin` 서비스 제공자만
    pub fn plugin_providers(&self) -> impl Iterator<Item = &ProviderDecl> {
        self.provides.iter().filter(|p| p.service == PLUGIN_SERVICE)
    }
}

/// 훅 실행 프로그램
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

/// 제공자 선언
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDecl {
    pub id: PluginId,

    #[serde(default = "default_service")]
    pub service: String,

    #[serde(default = "default_runtime")]
    pub runtime: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// 유닛 디렉토리 기준 상대 경로
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<PathBuf>,

    #[serde(default)]
    pub extensions: Vec<ExtensionClass>,

    /// 호스트 인젝터에 전달되는 불투명 모듈
    #[serde(default)]
    pub modules: Vec<Value>,

    /// 로컬 아티팩트 저장소 (유닛 디렉토리 기준 상대 경로)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<PathBuf>,
}

fn default_service() -> String {
    PLUGIN_SERVICE.to_string()
}

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_version_is_strict() {
        assert_eq!(parse_version(" 1.2.3 "), Some(Version::new(1, 2, 3)));
        for bad in ["", "1", "1.2", "1.2.3.4", "01.2.3", "1.2.x", "1.2.3-", "1.2.3-01", "v1.2.3"] {
            assert!(parse_version(bad).is_none(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_version_precedence() {
        let ordered = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
            "1.0.1",
            "1.1.0",
            "2.0.0",
        ];
        for pair in ordered.windows(2) {
            assert_eq!(
                cmp_precedence(&v(pair[0]), &v(pair[1])),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_precedence_ignores_build() {
        assert_eq!(cmp_precedence(&v("1.0.0+a"), &v("1.0.0+b")), Ordering::Equal);
        assert!(supports_platform_version(&v("0.9.0+host.7"), Some("0.9.0+other")).unwrap());
    }

    #[test]
    fn test_metadata_validate() {
        let host = v("0.9.0");

        assert!(Metadata::new("Demo", "1.0.0")
            .with_platform_version("0.5.0")
            .validate(&host)
            .is_ok());
        assert!(Metadata::new("Demo", "1.0.0").validate(&host).is_ok());

        let err = Metadata::new("  ", "1.0.0").validate(&host).unwrap_err();
        assert_eq!(err.to_string(), "Installation failed: invalid plugin name");

        let err = Metadata::new("Demo", "").validate(&host).unwrap_err();
        assert_eq!(err.to_string(), "Installation failed: invalid plugin version");

        let err = Metadata::new("Demo", "1.0.0")
            .with_platform_version("1.0.0")
            .validate(&host)
            .unwrap_err();
        assert_eq!(err.to_string(), "Installation failed: platform version too low");

        let err = Metadata::new("Demo", "1.0.0")
            .with_platform_version("nine")
            .validate(&host)
            .unwrap_err();
        assert_eq!(err.to_string(), "Installation failed: invalid metadata");
    }

    #[test]
    fn test_supports_platform_version() {
        let host = v("0.9.0");
        assert!(supports_platform_version(&host, None).unwrap());
        assert!(supports_platform_version(&host, Some(" ")).unwrap());
        assert!(supports_platform_version(&host, Some("0.9.0")).unwrap());
        assert!(!supports_platform_version(&host, Some("0.9.1")).unwrap());
        assert!(supports_platform_version(&host, Some("bogus")).is_err());
    }

    #[test]
    fn test_plugin_id_path_safe() {
        assert!(PluginId::from("demo.DemoPlugin").is_path_safe());
        assert!(PluginId::from("a_b-c").is_path_safe());
        assert!(!PluginId::from("..").is_path_safe());
        assert!(!PluginId::from("a/b").is_path_safe());
        assert!(!PluginId::from("").is_path_safe());
    }

    #[test]
    fn test_unit_manifest_defaults() {
        let manifest = UnitManifest::parse(
            r#"{
                "unit": "demo.unit",
                "provides": [
                    { "id": "demo.DemoPlugin", "metadata": { "name": "Demo", "version": "1.0.0" } },
                    { "id": "demo.Other", "service": "theme" }
                ]
            }"#,
        )
        .unwrap();

        assert!(manifest.requires.is_empty());
        assert!(manifest.entry.is_none());

        let providers: Vec<_> = manifest.plugin_providers().collect();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].runtime, DEFAULT_RUNTIME);
        assert_eq!(providers[0].metadata.as_ref().unwrap().name, "Demo");
    }

    #[test]
    fn test_unit_manifest_empty_unit() {
        assert!(UnitManifest::parse(r#"{ "unit": "" }"#).is_err());
    }
}
