//! Config - 런타임 설정 관리
//!
//! - `runtime.rs` - RuntimeConfig 통합 설정 (훅 타임아웃, 발견 정책, 정리 재시도)

mod runtime;

pub use runtime::{
    CleanupConfig, DiscoveryConfig, DiscoveryPolicy, LifecycleConfig, RuntimeConfig,
    RUNTIME_CONFIG_FILE, USER_DIR_ENV,
};
