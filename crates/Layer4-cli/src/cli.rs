//! Command implementations

use async_trait::async_trait;
use plugbay_core::{
    PluginEvent, PluginEventHandler, PluginEventKind, PluginId, PluginManager, PluginRecord,
};
use std::path::Path;
use std::sync::Arc;

/// Logs plugin state transitions while the host runs
struct StateLogger;

#[async_trait]
impl PluginEventHandler for StateLogger {
    fn name(&self) -> &str {
        "cli-state-logger"
    }

    async fn handle(&self, event: &PluginEvent) {
        if let PluginEventKind::StateChanged { plugin, from, to } = &event.kind {
            tracing::info!("{}: {} -> {}", plugin, from, to);
        }
    }
}

/// Print installed plugins
pub async fn list(manager: &PluginManager) -> anyhow::Result<()> {
    manager.load_all_plugins_or_empty().await;

    let plugins = manager.all_plugins().await;
    if plugins.is_empty() {
        println!("No plugins installed.");
        return Ok(());
    }

    println!("{:<32} {:<12} {:<12} {}", "ID", "VERSION", "STATE", "NAME");
    for record in &plugins {
        print_record(record);
    }
    Ok(())
}

pub async fn install(manager: &PluginManager, path: &Path) -> anyhow::Result<()> {
    manager.load_all_plugins_or_empty().await;

    let record = manager.install_plugin(path).await?;
    println!("✓ Installed {} ({})", record.id(), record.name());
    println!("Restart the host to load the new plugin.");
    Ok(())
}

pub async fn uninstall(manager: &PluginManager, id: &PluginId, purge: bool) -> anyhow::Result<()> {
    manager.load_all_plugins().await?;

    if manager.uninstall_plugin(id, purge).await? {
        println!("✓ Uninstalled {}", id);
        if purge {
            println!("User data will be deleted on next start.");
        }
    } else {
        println!("Plugin {} is not installed.", id);
    }
    Ok(())
}

pub async fn set_enabled(manager: &PluginManager, id: &PluginId, enabled: bool) -> anyhow::Result<()> {
    manager.load_all_plugins().await?;
    manager.set_enabled(id, enabled).await?;

    // enable은 start 훅을 실행하므로 종료 전에 정지
    if enabled {
        manager.stop_all_plugins().await;
        println!("✓ Enabled {}", id);
    } else {
        println!("✓ Disabled {}", id);
    }
    Ok(())
}

/// Start all plugins, wait for Ctrl-C, then stop them
pub async fn run(manager: &PluginManager) -> anyhow::Result<()> {
    let logger = Arc::new(StateLogger);
    let logger_name = logger.name().to_string();
    manager.events().register_handler(logger).await;

    let loaded = manager.load_all_plugins_or_empty().await;
    println!("Loaded {} plugin(s)", loaded);

    let report = manager.start_all_plugins().await;
    for (id, reason) in &report.failed {
        eprintln!("✗ {} failed to start: {}", id, reason);
    }
    println!(
        "Started {} plugin(s). Press Ctrl-C to stop.",
        report.succeeded.len()
    );

    tokio::signal::ctrl_c().await?;
    println!();

    let report = manager.stop_all_plugins().await;
    for (id, reason) in &report.failed {
        eprintln!("✗ {} failed to stop: {}", id, reason);
    }
    println!("Stopped {} plugin(s)", report.succeeded.len());

    manager.events().unregister_handler(&logger_name).await;
    Ok(())
}

pub async fn check_update(manager: &PluginManager, id: Option<PluginId>) -> anyhow::Result<()> {
    manager.load_all_plugins().await?;

    let ids: Vec<PluginId> = match id {
        Some(id) => vec![id],
        None => manager
            .all_plugins()
            .await
            .iter()
            .filter(|record| !record.state().is_uninstalled())
            .map(|record| record.id().clone())
            .collect(),
    };

    for id in ids {
        match manager.check_for_update(&id).await {
            Ok(Some(update)) => {
                println!("{}: {} -> {}", id, update.current, update.latest)
            }
            Ok(None) => println!("{}: up to date", id),
            Err(e) => eprintln!("{}: {}", id, e),
        }
    }
    Ok(())
}

pub async fn cleanup(manager: &PluginManager) -> anyhow::Result<()> {
    let report = manager.run_cleanup().await?;
    println!(
        "Deleted {}, retained {}, dropped {}",
        report.deleted, report.retained, report.dropped
    );
    Ok(())
}

fn print_record(record: &Arc<PluginRecord>) {
    let version = record
        .metadata()
        .map(|m| m.version.as_str())
        .unwrap_or("-");
    println!(
        "{:<32} {:<12} {:<12} {}",
        record.id(),
        version,
        record.state(),
        record.name()
    );
}
