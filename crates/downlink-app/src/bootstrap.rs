//! Service wiring (§9's sequencing requirement): runs the rollback check,
//! then opens the store, then builds every other service around it, then
//! serves the HTTP API until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use downlink_api::{ApiServer, ApiState, ApiStaticConfig};
use downlink_data::Store;
use downlink_downloader::Downloader;
use downlink_events::EventBus;
use downlink_federation::{announce_to_all_peers, FederationClient, PeerSyncScheduler};
use downlink_nat::{IgdPortMapper, NatManager};
use downlink_queue::JobCatalog;
use downlink_telemetry::{LogFormat, LoggingConfig, Metrics, OpenTelemetryConfig};
use downlink_update::{check_rollback, UpdateConfig, UpdateService};

use crate::config::NodeConfig;
use crate::error::{AppError, AppResult};

/// Entry point for the downlink node's boot sequence.
///
/// # Errors
///
/// Returns an error if configuration loading, store initialization,
/// telemetry setup, or serving the API fails.
pub async fn run_app() -> AppResult<()> {
    let config = NodeConfig::from_env().map_err(|err| AppError::InvalidConfig {
        field: "environment",
        reason: "load_failed",
        value: Some(err.to_string()),
    })?;

    let log_format = config.log_format.as_deref().and_then(|value| match value {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    });
    let logging = LoggingConfig {
        format: log_format.unwrap_or_else(LogFormat::infer),
        ..LoggingConfig::default()
    };
    let otel = load_otel_config_from_env();
    let otel_ref = otel.as_ref();
    let _otel_guard = downlink_telemetry::init_logging_with_otel(&logging, otel_ref)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!("downlink node bootstrap starting");

    // §4.10/§9: the rollback decision must run before the store opens.
    let update_config = build_update_config(&config);
    let rollback_outcome = check_rollback(&update_config.marker_path, &update_config.backend_dist, &update_config.frontend_dist)
        .await
        .map_err(|err| AppError::InvalidConfig {
            field: "update_marker",
            reason: "rollback_check_failed",
            value: Some(err.to_string()),
        })?;
    info!(phase = rollback_outcome.phase(), "rollback check complete");

    if let Some(parent) = config.db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| AppError::Io { operation: "create_db_dir", path: Some(parent.to_path_buf()), source })?;
    }
    let database_url = format!("sqlite://{}", config.db_path.display());
    let store = Store::connect(&database_url).await.map_err(|err| AppError::store("store.connect", err))?;

    let instance_id = store.instance_id().await.map_err(|err| AppError::store("store.instance_id", err))?;

    let events = EventBus::new();
    let telemetry = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

    let downloader = Downloader::new(config.download_tool_path.clone(), config.download_path.clone());
    let catalog = JobCatalog::new();
    let (queue, queue_worker) = downlink_queue::spawn(store.clone(), events.clone(), downloader, catalog);

    let mapper = Arc::new(IgdPortMapper);
    let nat = NatManager::new(mapper, events.clone());
    let local_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let nat_renewal = nat.start(config.external_url.clone(), local_addr, config.port).await;

    let federation_client = FederationClient::new();

    let scheduler = PeerSyncScheduler::new(store.clone(), federation_client.clone(), events.clone(), config.download_path.clone());
    scheduler.start(config.peer_sync_interval_minutes).await;

    if let Some(external_url) = nat.external_url().await {
        announce_to_all_peers(&store, &federation_client, instance_id, &external_url).await;
    }

    let update = UpdateService::new(update_config.clone(), events.clone());

    let api_config = ApiStaticConfig {
        instance_id,
        instance_name: config.instance_name.clone(),
        download_root: config.download_path.clone(),
        media_root: config.media_path.clone(),
        output_format: config.output_format.clone(),
        port: config.port,
        build_sha_path: config.build_sha_path.clone(),
        auth_disabled: config.auth_disabled,
        allowed_download_hosts: vec!["youtube.com".to_string(), "youtu.be".to_string()],
        update_manifest_url: config.update_manifest_url.clone(),
    };

    let state = Arc::new(ApiState::new(store, events, telemetry, queue, nat, federation_client, update, api_config));
    let api = ApiServer::new(state);

    let addr = SocketAddr::new(config.bind_addr, config.port);
    info!(%addr, "launching downlink API listener");
    let serve_result = api.serve(addr).await;

    shutdown_background_task(queue_worker, "queue worker").await;
    if let Some(nat_renewal) = nat_renewal {
        shutdown_background_task(nat_renewal, "nat renewal loop").await;
    }
    scheduler.stop().await;

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("downlink API server shutdown complete");
    Ok(())
}

fn build_update_config(config: &NodeConfig) -> UpdateConfig {
    let work_dir = config
        .db_path
        .parent()
        .map_or_else(|| config.download_path.clone(), std::path::Path::to_path_buf)
        .join("update-work");
    UpdateConfig {
        source_tarball_url: config.update_manifest_url.clone().unwrap_or_default(),
        work_dir: work_dir.clone(),
        backend_dist: work_dir.join("backend"),
        frontend_dist: work_dir.join("frontend"),
        marker_path: work_dir.join("rollback-marker.json"),
        build_sha_path: config.build_sha_path.clone(),
        build_command: vec!["cargo".to_string(), "build".to_string(), "--release".to_string()],
    }
}

async fn shutdown_background_task(handle: JoinHandle<()>, label: &'static str) {
    if !handle.is_finished() {
        handle.abort();
    }
    if let Err(err) = handle.await {
        if !err.is_cancelled() {
            warn!(error = %err, label, "background task join failed");
        }
    }
}

fn load_otel_config_from_env() -> Option<OpenTelemetryConfig<'static>> {
    let enabled = env_flag("DOWNLINK_ENABLE_OTEL");
    if !enabled {
        return None;
    }
    let service_name = std::env::var("DOWNLINK_OTEL_SERVICE_NAME").unwrap_or_else(|_| "downlink-app".to_string());
    let endpoint = std::env::var("DOWNLINK_OTEL_EXPORTER").ok();
    Some(OpenTelemetryConfig {
        enabled: true,
        service_name: std::borrow::Cow::Owned(service_name),
        endpoint: endpoint.map(std::borrow::Cow::Owned),
    })
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().is_some_and(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_handles_truthy_and_falsey() {
        assert!(!env_flag("DOWNLINK_APP_BOOTSTRAP_TEST_FLAG_THAT_DOES_NOT_EXIST"));
    }

    #[test]
    fn build_update_config_derives_paths_from_db_path() {
        let config = NodeConfig {
            port: 8080,
            bind_addr: "0.0.0.0".parse().unwrap(),
            output_format: "mkv".to_string(),
            download_path: "data/downloads".into(),
            media_path: "data/media".into(),
            db_path: "data/downlink.sqlite".into(),
            instance_name: "test".to_string(),
            external_url: None,
            auth_disabled: false,
            peer_sync_interval_minutes: 15,
            download_tool_path: "download-tool".into(),
            build_sha_path: "BUILD_SHA".into(),
            update_manifest_url: None,
            log_format: None,
        };
        let update_config = build_update_config(&config);
        assert_eq!(update_config.work_dir, std::path::PathBuf::from("data/update-work"));
        assert_eq!(update_config.marker_path, std::path::PathBuf::from("data/update-work/rollback-marker.json"));
    }
}
