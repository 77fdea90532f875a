//! Error types for Plugbay
//!
//! 모든 에러를 중앙에서 관리

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Plugbay 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 설치 관련
    // ========================================================================
    /// 메타데이터 누락, 플랫폼 버전 불일치, 중복 설치 등
    #[error("Installation failed: {0}")]
    Validation(String),

    /// 손상되었거나 지원하지 않는 아카이브
    #[error("Unable to extract {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    // ========================================================================
    // 발견/로드 관련
    // ========================================================================
    #[error("Plugin discovery failed: {0}")]
    Discovery(String),

    // ========================================================================
    // 라이프사이클 관련
    // ========================================================================
    #[error("Plugin {plugin} lifecycle error: {message}")]
    Lifecycle { plugin: String, message: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 설치 검증 실패인지 확인
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Extraction { .. }
                | Error::Discovery(_)
                | Error::NotFound(_)
        )
    }

    /// 아카이브 에러 생성 헬퍼
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// 라이프사이클 에러 생성 헬퍼
    pub fn lifecycle(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Lifecycle {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err = Error::Validation("already installed".into());
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Installation failed: already installed");
    }

    #[test]
    fn test_user_facing() {
        assert!(Error::extraction("/tmp/a.zip", "bad signature").is_user_facing());
        assert!(!Error::Internal("boom".into()).is_user_facing());
        assert!(!Error::lifecycle("demo", "crashed").is_user_facing());
    }
}
