//! # plugbay-foundation
//!
//! Foundation layer for Plugbay:
//! - Error: 공통 에러 타입 (`Error`, `Result`)
//! - Config: 런타임 설정 (`RuntimeConfig`)
//! - Storage: JSON 파일 저장소 (`JsonStore`)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  plugbay-cli (host)                                     │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  plugbay-core::plugin (Manager/Installer/Loader/...)    │
//! │                     │                                   │
//! │          ┌─────────┴─────────┐                         │
//! │          ▼                   ▼                         │
//! │   RuntimeConfig          JsonStore                     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    CleanupConfig, DiscoveryConfig, DiscoveryPolicy, LifecycleConfig, RuntimeConfig,
    RUNTIME_CONFIG_FILE, USER_DIR_ENV,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{JsonStore, APP_DIR_NAME};
