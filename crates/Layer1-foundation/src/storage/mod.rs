//! Storage module for Plugbay
//!
//! - `json`: JSON - 범용 파일 저장/로드 (설정, 환경설정, 정리 작업 큐)

mod json;

// JSON Storage (범용)
pub use json::{JsonStore, APP_DIR_NAME};
