//! Plugin Repository - 플러그인 기록 저장소
//!
//! 쓰기와 동시에 읽기가 가능한 인메모리 인덱스입니다.

use super::extension::ExtensionPoint;
use super::manifest::PluginId;
use super::record::{PluginRecord, PluginState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct Entry {
    record: Arc<PluginRecord>,
    load_order: usize,
}

/// 플러그인 저장소 (ID -> PluginRecord)
pub struct PluginRepository {
    records: RwLock<HashMap<PluginId, Entry>>,

    /// 로드 카운터
    load_counter: RwLock<usize>,
}

impl PluginRepository {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            load_counter: RwLock::new(0),
        }
    }

    /// 기록 추가 (이미 존재하면 false)
    pub async fn insert(&self, record: Arc<PluginRecord>) -> bool {
        let id = record.id().clone();
        let mut records = self.records.write().await;

        if records.contains_key(&id) {
            warn!("Plugin {} is already registered", id);
            return false;
        }

        let mut counter = self.load_counter.write().await;
        *counter += 1;
        let load_order = *counter;

        debug!("Registered plugin {} as {}", id, record.state());
        records.insert(id, Entry { record, load_order });
        true
    }

    pub async fn remove(&self, id: &PluginId) -> Option<Arc<PluginRecord>> {
        let mut records = self.records.write().await;
        records.remove(id).map(|entry| entry.record)
    }

    pub async fn get(&self, id: &PluginId) -> Option<Arc<PluginRecord>> {
        let records = self.records.read().await;
        records.get(id).map(|entry| Arc::clone(&entry.record))
    }

    pub async fn contains(&self, id: &PluginId) -> bool {
        let records = self.records.read().await;
        records.contains_key(id)
    }

    /// 모든 기록 (로드 순서대로)
    pub async fn all(&self) -> Vec<Arc<PluginRecord>> {
        let records = self.records.read().await;
        let mut entries: Vec<_> = records.values().collect();
        entries.sort_by_key(|entry| entry.load_order);
        entries
            .into_iter()
            .map(|entry| Arc::clone(&entry.record))
            .collect()
    }

    /// 특정 상태의 기록들
    pub async fn in_state(&self, state: PluginState) -> Vec<Arc<PluginRecord>> {
        self.all()
            .await
            .into_iter()
            .filter(|record| record.state() == state)
            .collect()
    }

    /// 특정 확장 포인트를 제공하는 기록들
    pub async fn providing(&self, point: &ExtensionPoint) -> Vec<Arc<PluginRecord>> {
        self.all()
            .await
            .into_iter()
            .filter(|record| record.provides(point))
            .collect()
    }

    pub async fn len(&self) -> usize {
        let records = self.records.read().await;
        records.len()
    }

    pub async fn is_empty(&self) -> bool {
        let records = self.records.read().await;
        records.is_empty()
    }
}

impl Default for PluginRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::record::tests::{record_for, StubPlugin};

    #[tokio::test]
    async fn test_insert_and_get() {
        let repository = PluginRepository::new();
        let record = record_for(StubPlugin::new("demo", "Demo"), PluginState::Loaded);

        assert!(repository.insert(record).await);
        assert_eq!(repository.len().await, 1);
        assert!(repository.get(&PluginId::from("demo")).await.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_insert() {
        let repository = PluginRepository::new();
        repository
            .insert(record_for(StubPlugin::new("demo", "Demo"), PluginState::Loaded))
            .await;

        let again = record_for(StubPlugin::new("demo", "Other"), PluginState::Installed);
        assert!(!repository.insert(again).await);
        assert_eq!(repository.len().await, 1);
    }

    #[tokio::test]
    async fn test_all_preserves_load_order() {
        let repository = PluginRepository::new();
        for id in ["c", "a", "b"] {
            repository
                .insert(record_for(StubPlugin::new(id, id), PluginState::Loaded))
                .await;
        }

        let ids: Vec<String> = repository
            .all()
            .await
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_providing_and_state_filter() {
        let repository = PluginRepository::new();
        repository
            .insert(record_for(
                StubPlugin::new("tools", "Tools").with_tool("t.Calc"),
                PluginState::Loaded,
            ))
            .await;
        repository
            .insert(record_for(StubPlugin::new("plain", "Plain"), PluginState::Disabled))
            .await;

        assert_eq!(repository.providing(&ExtensionPoint::TOOL).await.len(), 1);
        assert_eq!(repository.in_state(PluginState::Disabled).await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_during_writes() {
        let repository = Arc::new(PluginRepository::new());

        let writer = {
            let repository = Arc::clone(&repository);
            tokio::spawn(async move {
                for i in 0..50 {
                    let id = format!("p{}", i);
                    repository
                        .insert(record_for(StubPlugin::new(&id, &id), PluginState::Loaded))
                        .await;
                }
            })
        };

        for _ in 0..50 {
            let _ = repository.all().await;
        }

        writer.await.unwrap();
        assert_eq!(repository.len().await, 50);
    }
}
