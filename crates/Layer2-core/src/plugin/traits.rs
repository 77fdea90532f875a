//! Plugin traits - 핵심 플러그인 인터페이스
//!
//! - `Plugin`: 메타데이터, 확장 선언, start/stop 훅
//! - `PluginFactory`: 런타임별 인스턴스 생성기
//! - `ArtifactRepository`: 업데이트 확인용 저장소

use super::extension::ExtensionClass;
use super::loader::LoadedUnit;
use super::manifest::{Metadata, PluginId, ProviderDecl, Version};
use async_trait::async_trait;
use plugbay_foundation::Result;
use serde_json::Value;
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 호스트 인젝터에 전달되는 불투명 의존성 모듈
pub type DependencyModule = Value;

// ============================================================================
// Plugin Trait
// ============================================================================

/// 플러그인 트레이트
#[async_trait]
pub trait Plugin: Send + Sync {
    /// 구현 식별자 (Repository 키)
    fn id(&self) -> &PluginId;

    /// 메타데이터 (없으면 설치 불가)
    fn metadata(&self) -> Option<&Metadata>;

    /// 아이콘 파일 경로
    fn icon(&self) -> Option<&Path> {
        None
    }

    /// 호스트 인젝터용 모듈
    fn dependency_modules(&self) -> Vec<DependencyModule> {
        Vec::new()
    }

    /// 업데이트 확인용 저장소
    fn artifact_repository(&self) -> Option<Arc<dyn ArtifactRepository>> {
        None
    }

    /// 선언된 확장 클래스
    fn extensions(&self) -> &[ExtensionClass] {
        &[]
    }

    /// 디스크상의 아티팩트 위치 (`plugin.json`)
    fn location(&self) -> Option<&Path>;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// 타입 캐스팅을 위한 헬퍼 (다운캐스팅 지원)
    fn as_any(&self) -> &dyn Any;
}

// ============================================================================
// PluginFactory
// ============================================================================

/// 런타임별 플러그인 생성기
///
/// `ProviderDecl.runtime` 값으로 선택됩니다.
pub trait PluginFactory: Send + Sync {
    fn runtime(&self) -> &str;

    fn instantiate(&self, unit: &LoadedUnit, provider: &ProviderDecl) -> Result<Arc<dyn Plugin>>;
}

// ============================================================================
// ArtifactRepository
// ============================================================================

/// 최신 버전 확인 및 아티팩트 가져오기
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// 최신 버전 (아티팩트가 없으면 None)
    async fn latest_version(&self) -> Result<Option<Version>>;

    /// 최신 아티팩트를 `dest` 디렉토리로 가져옴
    async fn fetch_latest(&self, dest: &Path) -> Result<PathBuf>;
}
