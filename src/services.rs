//! Composition root.
//!
//! Owns the engine client and the compression coordinator for the lifetime of
//! the app session and hands out export coordinators per domain. Must be built
//! inside a tokio runtime (the coordinator spawns its worker on construction).

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::domains::compression::{BackgroundTaskHost, CompressionResourceCoordinator};
use crate::domains::export::{EngineExportCapability, ExportDomain, ExportJobCoordinator, ExportNavigator};
use crate::domains::telemetry::{DeviceSignals, DeviceTelemetryProbe};
use crate::errors::ServiceResult;
use crate::ffi::{EngineBridge, EngineClient};

pub struct ClientServices {
    config: OrchestratorConfig,
    client: EngineClient,
    probe: Arc<DeviceTelemetryProbe>,
    compression: CompressionResourceCoordinator,
}

impl ClientServices {
    pub fn new(
        config: OrchestratorConfig,
        bridge: Arc<dyn EngineBridge>,
        signals: Arc<dyn DeviceSignals>,
        host: Arc<dyn BackgroundTaskHost>,
    ) -> Self {
        let client = EngineClient::new(bridge);
        let probe = Arc::new(DeviceTelemetryProbe::new(signals));
        let compression = CompressionResourceCoordinator::new(
            client.clone(),
            Arc::clone(&probe),
            host,
            config.compression.clone(),
        );
        log::info!("Client services initialized");
        Self {
            config,
            client,
            probe,
            compression,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn compression(&self) -> &CompressionResourceCoordinator {
        &self.compression
    }

    pub fn telemetry(&self) -> &DeviceTelemetryProbe {
        &self.probe
    }

    /// Export coordinator for one domain screen.
    pub fn export_coordinator(
        &self,
        domain: ExportDomain,
        documents_dir: PathBuf,
        navigator: Arc<dyn ExportNavigator>,
    ) -> ExportJobCoordinator {
        let capability = EngineExportCapability::new(domain, self.client.clone());
        ExportJobCoordinator::new(Arc::new(capability), navigator, documents_dir, self.config.export_poll)
    }

    /// Stop the compression coordinator and wait for its worker to exit.
    pub async fn shutdown(&self) -> ServiceResult<()> {
        self.compression.shutdown().await?;
        log::info!("Client services shut down");
        Ok(())
    }
}
