//! Plugin Events - 이벤트 시스템
//!
//! 상태 변경과 "재시작 필요" 신호를 호스트에 전달합니다.

use super::manifest::PluginId;
use super::record::PluginState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

// ============================================================================
// PluginEvent
// ============================================================================

/// 이벤트 종류
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginEventKind {
    StateChanged {
        plugin: PluginId,
        from: PluginState,
        to: PluginState,
    },
    Installed {
        plugin: PluginId,
    },
    Uninstalled {
        plugin: PluginId,
        purged: bool,
    },
    /// 새/삭제된 플러그인 코드는 호스트 재시작 후 반영됨
    RestartRequired {
        reason: String,
    },
}

impl PluginEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::Installed { .. } => "installed",
            Self::Uninstalled { .. } => "uninstalled",
            Self::RestartRequired { .. } => "restart_required",
        }
    }
}

/// 플러그인 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEvent {
    pub kind: PluginEventKind,

    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl PluginEvent {
    pub fn new(kind: PluginEventKind) -> Self {
        Self {
            kind,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn state_changed(plugin: &PluginId, from: PluginState, to: PluginState) -> Self {
        Self::new(PluginEventKind::StateChanged {
            plugin: plugin.clone(),
            from,
            to,
        })
    }

    pub fn restart_required(reason: impl Into<String>) -> Self {
        Self::new(PluginEventKind::RestartRequired {
            reason: reason.into(),
        })
    }
}

// ============================================================================
// PluginEventHandler
// ============================================================================

/// 이벤트 핸들러 트레이트
#[async_trait]
pub trait PluginEventHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: &PluginEvent);
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 - 이벤트 발행 및 구독 관리
pub struct EventBus {
    sender: broadcast::Sender<PluginEvent>,

    handlers: RwLock<HashMap<String, Arc<dyn PluginEventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            sender,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// 같은 이름의 핸들러는 교체
    pub async fn register_handler(&self, handler: Arc<dyn PluginEventHandler>) {
        let name = handler.name().to_string();
        let mut handlers = self.handlers.write().await;
        handlers.insert(name, handler);
    }

    pub async fn unregister_handler(&self, name: &str) {
        let mut handlers = self.handlers.write().await;
        handlers.remove(name);
    }

    /// 이벤트 발행
    pub async fn publish(&self, event: PluginEvent) {
        debug!("Publishing plugin event: {}", event.kind.name());

        // 구독자가 없어도 OK
        let _ = self.sender.send(event.clone());

        let handlers = self.handlers.read().await;
        for handler in handlers.values() {
            handler.handle(&event).await;
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl PluginEventHandler for CountingHandler {
        fn name(&self) -> &str {
            "counting"
        }

        async fn handle(&self, _event: &PluginEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_registered_handlers() {
        let bus = EventBus::new();
        let handler = Arc::new(CountingHandler {
            seen: AtomicUsize::new(0),
        });
        bus.register_handler(handler.clone()).await;
        bus.register_handler(handler.clone()).await;

        bus.publish(PluginEvent::restart_required("installed demo")).await;
        assert_eq!(handler.seen.load(Ordering::SeqCst), 1);

        bus.unregister_handler("counting").await;
        bus.publish(PluginEvent::restart_required("uninstalled demo")).await;
        assert_eq!(handler.seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(PluginEvent::state_changed(
            &PluginId::from("demo"),
            PluginState::Loaded,
            PluginState::Started,
        ))
        .await;

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.kind.name(), "state_changed");
    }
}
