//! Extension Resolver - 확장 클래스 → 확장 포인트 매핑
//!
//! 플러그인이 선언한 확장 클래스를 호스트가 지원하는 확장 포인트에 연결합니다.
//! 추상 클래스, 지원 포인트를 0개 또는 2개 이상 구현한 클래스는 제외됩니다.

use super::manifest::PluginId;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

// ============================================================================
// ExtensionPoint
// ============================================================================

/// 호스트가 정의한 확장 포인트 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionPoint(Cow<'static, str>);

impl ExtensionPoint {
    /// 기본 확장 포인트
    pub const TOOL: ExtensionPoint = ExtensionPoint(Cow::Borrowed("tool"));

    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExtensionPoint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// ExtensionClass
// ============================================================================

/// 플러그인이 선언한 확장 클래스
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionClass {
    /// 구현 클래스 이름
    pub name: String,

    /// 구현하는 인터페이스 식별자들
    #[serde(default)]
    pub implements: Vec<String>,

    /// 인스턴스화 불가 여부
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
}

impl ExtensionClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implements: Vec::new(),
            is_abstract: false,
        }
    }

    pub fn implementing(mut self, point: impl Into<String>) -> Self {
        self.implements.push(point.into());
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

// ============================================================================
// ExtensionMap
// ============================================================================

/// 확장 포인트 → 구현 클래스 이름 집합 (생성 후 불변)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionMap {
    entries: HashMap<ExtensionPoint, BTreeSet<String>>,
}

impl ExtensionMap {
    /// 해당 확장 포인트를 제공하는지
    pub fn provides(&self, point: &ExtensionPoint) -> bool {
        self.entries.contains_key(point)
    }

    /// 해당 확장 포인트의 구현 클래스들 (이름순)
    pub fn implementations(&self, point: &ExtensionPoint) -> Vec<String> {
        self.entries
            .get(point)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 특정 구현 클래스를 제공하는지
    pub fn provides_implementation(&self, class_name: &str) -> bool {
        self.entries.values().any(|names| names.contains(class_name))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }
}

// ============================================================================
// ExtensionResolver
// ============================================================================

/// 확장 리졸버
#[derive(Debug, Clone)]
pub struct ExtensionResolver {
    supported: HashSet<ExtensionPoint>,
}

impl ExtensionResolver {
    pub fn new(supported: impl IntoIterator<Item = ExtensionPoint>) -> Self {
        Self {
            supported: supported.into_iter().collect(),
        }
    }

    pub fn supports(&self, point: &ExtensionPoint) -> bool {
        self.supported.contains(point)
    }

    /// 선언된 클래스들을 확장 맵으로 변환
    pub fn resolve(&self, plugin_id: &PluginId, classes: &[ExtensionClass]) -> ExtensionMap {
        let mut entries: HashMap<ExtensionPoint, BTreeSet<String>> = HashMap::new();

        for class in classes {
            if class.is_abstract {
                warn!(
                    "Skipping abstract extension {} of plugin {}",
                    class.name, plugin_id
                );
                continue;
            }

            let points: BTreeSet<ExtensionPoint> = class
                .implements
                .iter()
                .map(|id| ExtensionPoint::new(id.as_str()))
                .filter(|point| self.supported.contains(point))
                .collect();

            let mut points = points.into_iter();
            match (points.next(), points.next()) {
                (Some(point), None) => {
                    debug!("Plugin {} provides {} as {}", plugin_id, class.name, point);
                    entries.entry(point).or_default().insert(class.name.clone());
                }
                (None, _) => {
                    warn!(
                        "Extension {} of plugin {} implements no supported extension point",
                        class.name, plugin_id
                    );
                }
                (Some(_), Some(_)) => {
                    warn!(
                        "Extension {} of plugin {} implements more than one extension point",
                        class.name, plugin_id
                    );
                }
            }
        }

        ExtensionMap { entries }
    }
}

impl Default for ExtensionResolver {
    fn default() -> Self {
        Self::new([ExtensionPoint::TOOL])
    }
}
