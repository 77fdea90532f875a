//! Runtime Config - 플러그인 런타임 설정
//!
//! 글로벌 `config.json` + 환경 변수(`PLUGBAY_USER_DIR`)를 병합해서 사용합니다.

use crate::storage::{JsonStore, APP_DIR_NAME};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 설정 파일명
pub const RUNTIME_CONFIG_FILE: &str = "config.json";

/// 사용자 디렉토리 환경 변수 (최우선)
pub const USER_DIR_ENV: &str = "PLUGBAY_USER_DIR";

// ============================================================================
// RuntimeConfig (통합)
// ============================================================================

/// 플러그인 런타임 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 사용자 디렉토리 (plugins/, data/, preferences.json 의 루트)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_dir: Option<PathBuf>,

    /// 라이프사이클 훅 설정
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// 플러그인 발견 설정
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// 지연 삭제 설정
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 설정 + 환경 변수 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<RuntimeConfig>(RUNTIME_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// 지정한 파일에서 로드 (환경 변수도 적용)
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let dir = path
            .parent()
            .map(PathBuf::from)
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::Config(format!("Invalid config path: {}", path.display())))?;

        let mut config = Self::new();
        config.merge(JsonStore::new(dir).load::<RuntimeConfig>(filename)?);
        config.apply_env();
        Ok(config)
    }

    /// 글로벌 설정 저장
    pub fn save_global(&self) -> Result<()> {
        let store = JsonStore::global()?;
        store.save(RUNTIME_CONFIG_FILE, self)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(USER_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.user_dir = Some(PathBuf::from(dir));
            }
        }
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: RuntimeConfig) {
        if other.user_dir.is_some() {
            self.user_dir = other.user_dir;
        }

        self.lifecycle.merge(other.lifecycle);
        self.discovery.merge(other.discovery);
        self.cleanup.merge(other.cleanup);
    }

    // ========================================================================
    // Resolved values
    // ========================================================================

    /// 사용자 디렉토리 결정
    ///
    /// 우선순위: 설정/환경 변수 → 플랫폼 데이터 디렉토리 → 홈 디렉토리
    pub fn resolve_user_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.user_dir {
            return Ok(dir.clone());
        }

        dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .map(|base| base.join(APP_DIR_NAME))
            .ok_or_else(|| Error::Config("Cannot determine user directory".to_string()))
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn user_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_dir = Some(dir.into());
        self
    }

    pub fn hook_timeout_secs(mut self, secs: u64) -> Self {
        self.lifecycle.hook_timeout_secs = secs;
        self
    }

    pub fn discovery_policy(mut self, policy: DiscoveryPolicy) -> Self {
        self.discovery.policy = policy;
        self
    }
}

// ============================================================================
// Lifecycle Config
// ============================================================================

/// start/stop 훅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleConfig {
    /// 훅 하나당 최대 실행 시간 (초)
    #[serde(default = "default_hook_timeout")]
    pub hook_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            hook_timeout_secs: default_hook_timeout(),
        }
    }
}

impl LifecycleConfig {
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs.max(1))
    }

    fn merge(&mut self, other: LifecycleConfig) {
        if other.hook_timeout_secs != default_hook_timeout() {
            self.hook_timeout_secs = other.hook_timeout_secs;
        }
    }
}

// ============================================================================
// Discovery Config
// ============================================================================

/// 스캔 중 잘못된 유닛을 만났을 때의 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPolicy {
    /// 유닛 하나라도 실패하면 전체 스캔 실패
    #[default]
    FailFast,

    /// 실패한 유닛만 건너뜀
    SkipInvalid,
}

/// 플러그인 발견 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub policy: DiscoveryPolicy,
}

impl DiscoveryConfig {
    fn merge(&mut self, other: DiscoveryConfig) {
        if other.policy != DiscoveryPolicy::default() {
            self.policy = other.policy;
        }
    }
}

// ============================================================================
// Cleanup Config
// ============================================================================

/// 지연 삭제 큐 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupConfig {
    /// 경로 하나당 최대 삭제 시도 횟수 (재시작마다 1회)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl CleanupConfig {
    fn merge(&mut self, other: CleanupConfig) {
        if other.max_attempts != default_max_attempts() {
            self.max_attempts = other.max_attempts;
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_version() -> u32 {
    1
}

fn default_hook_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}
