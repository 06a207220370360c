//! Compression resource coordinator.
//!
//! `CompressionResourceCoordinator` is a cloneable-state handle; every mutation
//! of coordinator state (lifecycle, timer, background budget, cached status)
//! happens inside one worker task that consumes `CoordinatorEvent`s. Engine
//! calls never run on that task: request/response calls run on the caller's
//! task through `EngineClient` (which itself dispatches onto the blocking
//! pool), and fire-and-forget pushes go through a FIFO publisher task.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::background::{BackgroundTaskBudget, BackgroundTaskHost, ExpiryHandler};
use super::types::{
    BackgroundExtension, CancelledResponse, ComprehensiveStatus, CompressRequest, CompressionConfig,
    CompressionPriority, CompressionQueueStatus, CompressionResult, CompressionStats, DocumentCompressionHistory,
    DocumentRequest, LifecycleHint, PriorityRequest, QueueOutcome, UpdatedResponse, VisibilityHint,
};
use crate::config::CompressionCoordinatorConfig;
use crate::domains::telemetry::{DeviceCapabilities, DeviceState, DeviceTelemetryProbe, MemoryPressureEvent};
use crate::errors::{QueueRejection, ServiceError, ServiceResult};
use crate::ffi::{EngineCall, EngineClient, QueueStatusCode};
use crate::validation::{ensure_payload_within, DocumentId};

/// Background execution state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BudgetPhase {
    /// In the foreground, or not managing budgets
    Foreground,
    Budgeted { granted_seconds: u32 },
    /// Backgrounded and the OS window has closed (or was refused)
    Expired,
}

/// OS lifecycle notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    EnteredBackground,
    BecameActive,
    MemoryWarning,
    ThermalStateChanged,
}

impl LifecycleEvent {
    fn engine_hint(&self) -> Option<&'static str> {
        match self {
            LifecycleEvent::EnteredBackground => Some("entering_background"),
            LifecycleEvent::BecameActive => Some("becoming_active"),
            _ => None,
        }
    }
}

/// Results pulled from the engine and marshaled back to the worker
#[derive(Debug, Clone)]
pub enum CacheUpdate {
    Status(ComprehensiveStatus),
    Queue(CompressionQueueStatus),
    Capabilities(DeviceCapabilities),
    Stats(CompressionStats),
}

/// Every input that can change coordinator state
#[derive(Debug)]
pub enum CoordinatorEvent {
    Start,
    Stop,
    Lifecycle(LifecycleEvent),
    TelemetryTick,
    BudgetExpired { grant: u64 },
    Refreshed(CacheUpdate),
}

/// Point-in-time copy of the coordinator's state and cached engine status
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorSnapshot {
    pub is_active: bool,
    pub budget_granted_seconds: Option<u32>,
    pub timer_starts: u64,
    pub budget_grants: u64,
    pub last_device_state: Option<DeviceState>,
    pub current_status: Option<ComprehensiveStatus>,
    pub queue_status: Option<CompressionQueueStatus>,
    pub compression_stats: Option<CompressionStats>,
    pub device_capabilities: Option<DeviceCapabilities>,
    pub is_throttled: bool,
    pub throttle_reason: Option<String>,
}

#[derive(Debug)]
enum Command {
    Dispatch {
        event: CoordinatorEvent,
        response: oneshot::Sender<()>,
    },
    Snapshot {
        response: oneshot::Sender<CoordinatorSnapshot>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

// -----------------------------------------------------------------------------
// Publisher ----------------------------------------------------------------------
// -----------------------------------------------------------------------------

/// Fire-and-forget engine pushes
#[derive(Debug, Clone)]
enum Push {
    DeviceState(DeviceState),
    Budget(BackgroundExtension),
    MemoryPressure(MemoryPressureEvent),
    Visibility(VisibilityHint),
    Lifecycle(LifecycleHint),
}

impl Push {
    fn call(&self) -> EngineCall {
        match self {
            Push::DeviceState(_) => EngineCall::UpdateDeviceState,
            Push::Budget(_) => EngineCall::HandleBackgroundTaskExtension,
            Push::MemoryPressure(_) => EngineCall::HandleEnhancedMemoryWarning,
            Push::Visibility(_) => EngineCall::HandleContentVisibility,
            Push::Lifecycle(_) => EngineCall::HandleAppLifecycleEvent,
        }
    }

    fn encode(&self) -> ServiceResult<String> {
        let call = self.call();
        match self {
            Push::DeviceState(state) => EngineClient::encode(call, state),
            Push::Budget(extension) => EngineClient::encode(call, extension),
            Push::MemoryPressure(event) => EngineClient::encode(call, event),
            Push::Visibility(hint) => EngineClient::encode(call, hint),
            Push::Lifecycle(hint) => EngineClient::encode(call, hint),
        }
    }
}

/// Sends pushes to the engine one at a time, in submission order.
/// Failures are logged and dropped; a full queue drops the new push.
#[derive(Clone)]
struct Publisher {
    queue: mpsc::Sender<Push>,
}

impl Publisher {
    fn spawn(client: EngineClient, depth: usize) -> Self {
        let (queue, receiver) = mpsc::channel(depth);
        tokio::spawn(run_publisher(client, receiver));
        Self { queue }
    }

    fn push(&self, push: Push) {
        match self.queue.try_send(push) {
            Ok(()) => {}
            Err(TrySendError::Full(push)) => {
                log::warn!("Publisher queue full, dropping {}", push.call());
            }
            Err(TrySendError::Closed(push)) => {
                log::warn!("Publisher stopped, dropping {}", push.call());
            }
        }
    }
}

async fn run_publisher(client: EngineClient, mut receiver: mpsc::Receiver<Push>) {
    while let Some(push) = receiver.recv().await {
        let call = push.call();
        let payload = match push.encode() {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("{}", e);
                continue;
            }
        };
        match client.send(call, payload, None).await {
            Ok(reply) if reply.is_success() => log::debug!("Pushed {}", call),
            Ok(reply) => log::warn!("Push failed: {}", reply.into_rejection()),
            Err(e) => log::warn!("Push failed: {}", e),
        }
    }
    log::debug!("Publisher drained");
}

// -----------------------------------------------------------------------------
// Worker -------------------------------------------------------------------------
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StatusCache {
    current_status: Option<ComprehensiveStatus>,
    queue_status: Option<CompressionQueueStatus>,
    compression_stats: Option<CompressionStats>,
    device_capabilities: Option<DeviceCapabilities>,
    is_throttled: bool,
    throttle_reason: Option<String>,
}

impl StatusCache {
    fn apply(&mut self, update: CacheUpdate) {
        match update {
            CacheUpdate::Status(status) => {
                if let Some(queue) = &status.queue_status {
                    self.queue_status = Some(queue.clone());
                }
                if let Some(worker) = &status.ios_worker_status {
                    self.is_throttled = worker.is_throttled;
                    self.throttle_reason = worker.throttle_reason.clone();
                }
                if let Some(capabilities) = &status.device_capabilities {
                    self.device_capabilities = Some(capabilities.clone());
                }
                if let Some(stats) = &status.compression_stats {
                    self.compression_stats = Some(stats.clone());
                }
                self.current_status = Some(status);
            }
            CacheUpdate::Queue(queue) => self.queue_status = Some(queue),
            CacheUpdate::Capabilities(capabilities) => self.device_capabilities = Some(capabilities),
            CacheUpdate::Stats(stats) => self.compression_stats = Some(stats),
        }
    }
}

struct ActiveBudget {
    grant: u64,
    budget: BackgroundTaskBudget,
}

enum Step {
    Event(CoordinatorEvent),
    Command(Command),
    Closed,
}

struct CoordinatorWorker {
    client: EngineClient,
    probe: Arc<DeviceTelemetryProbe>,
    host: Arc<dyn BackgroundTaskHost>,
    config: CompressionCoordinatorConfig,
    publisher: Publisher,
    internal: mpsc::UnboundedSender<CoordinatorEvent>,
    phase: watch::Sender<BudgetPhase>,

    active: bool,
    in_background: bool,
    timer: Option<Interval>,
    timer_starts: u64,
    budget: Option<ActiveBudget>,
    next_grant: u64,
    budget_grants: u64,
    capabilities_requested: bool,
    last_device_state: Option<DeviceState>,
    cache: StatusCache,
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl CoordinatorWorker {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<CoordinatorEvent>,
    ) -> Option<oneshot::Sender<()>> {
        log::info!(
            "Compression coordinator worker running (telemetry every {:?})",
            self.config.telemetry_interval
        );

        loop {
            // Results marshaled back from engine calls are applied before any
            // command queued after them.
            let step = tokio::select! {
                biased;
                Some(event) = internal.recv() => Step::Event(event),
                command = commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Closed,
                },
                _ = next_tick(&mut self.timer) => Step::Event(CoordinatorEvent::TelemetryTick),
            };

            match step {
                Step::Event(event) => self.dispatch(event),
                Step::Command(Command::Dispatch { event, response }) => {
                    self.dispatch(event);
                    let _ = response.send(());
                }
                Step::Command(Command::Snapshot { response }) => {
                    let _ = response.send(self.snapshot());
                }
                Step::Command(Command::Shutdown { response }) => {
                    self.teardown();
                    return Some(response);
                }
                Step::Closed => {
                    self.teardown();
                    return None;
                }
            }
        }
    }

    fn dispatch(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Start => self.start(),
            CoordinatorEvent::Stop => self.stop(),
            CoordinatorEvent::Lifecycle(event) => self.on_lifecycle(event),
            CoordinatorEvent::TelemetryTick => self.push_device_state(),
            CoordinatorEvent::BudgetExpired { grant } => self.on_budget_expired(grant),
            CoordinatorEvent::Refreshed(update) => self.cache.apply(update),
        }
    }

    fn start(&mut self) {
        if self.active {
            log::debug!("Coordinator already active");
            return;
        }
        self.active = true;
        self.probe.enable_monitoring();

        let period = self.config.telemetry_interval;
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        self.timer_starts += 1;

        if !self.capabilities_requested {
            self.capabilities_requested = true;
            self.spawn_pull(EngineCall::DetectDeviceCapabilities, CacheUpdate::Capabilities);
        }
        self.spawn_pull(EngineCall::GetComprehensiveStatus, CacheUpdate::Status);
        log::info!("Compression coordinator started");

        if self.in_background {
            self.push_device_state();
            self.begin_budget();
        }
    }

    fn stop(&mut self) {
        if !self.active {
            log::debug!("Coordinator already inactive");
            return;
        }
        self.timer = None;
        self.end_budget("coordinator stopped");
        self.set_phase(BudgetPhase::Foreground);
        self.probe.disable_monitoring();
        self.active = false;
        log::info!("Compression coordinator stopped");
    }

    fn teardown(&mut self) {
        self.stop();
        log::info!("Compression coordinator worker shut down");
    }

    fn on_lifecycle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::EnteredBackground => self.in_background = true,
            LifecycleEvent::BecameActive => self.in_background = false,
            _ => {}
        }
        if !self.active {
            log::debug!("Ignoring {:?} while inactive", event);
            return;
        }

        match event {
            LifecycleEvent::EnteredBackground => {
                self.push_device_state();
                self.push_lifecycle_hint(event);
                self.begin_budget();
            }
            LifecycleEvent::BecameActive => {
                self.end_budget("returned to foreground");
                self.set_phase(BudgetPhase::Foreground);
                self.push_device_state();
                self.push_lifecycle_hint(event);
            }
            LifecycleEvent::MemoryWarning => {
                let available = self.probe.available_memory_mb();
                log::warn!("Memory warning, {} MB available", available);
                self.publisher.push(Push::MemoryPressure(MemoryPressureEvent::low_memory(available)));
                self.push_device_state();
            }
            LifecycleEvent::ThermalStateChanged => self.push_device_state(),
        }
    }

    fn push_device_state(&mut self) {
        if !self.active {
            return;
        }
        let state = self.probe.snapshot();
        self.last_device_state = Some(state.clone());
        self.publisher.push(Push::DeviceState(state));
    }

    fn push_lifecycle_hint(&self, event: LifecycleEvent) {
        if let Some(hint) = event.engine_hint() {
            self.publisher.push(Push::Lifecycle(LifecycleHint { event: hint }));
        }
    }

    fn begin_budget(&mut self) {
        if self.budget.is_some() {
            log::debug!("Background budget already outstanding");
            return;
        }

        self.next_grant += 1;
        let grant = self.next_grant;
        let internal = self.internal.clone();
        let on_expiry: ExpiryHandler = Box::new(move || {
            let _ = internal.send(CoordinatorEvent::BudgetExpired { grant });
        });

        let seconds = self.config.background_grant_seconds;
        match BackgroundTaskBudget::begin(
            Arc::clone(&self.host),
            &self.config.background_task_name,
            seconds,
            on_expiry,
        ) {
            Some(budget) => {
                self.budget = Some(ActiveBudget { grant, budget });
                self.budget_grants += 1;
                self.publisher.push(Push::Budget(BackgroundExtension { granted_seconds: seconds }));
                self.set_phase(BudgetPhase::Budgeted { granted_seconds: seconds });
            }
            None => {
                log::warn!("Background execution window refused");
                self.set_phase(BudgetPhase::Expired);
            }
        }
    }

    fn end_budget(&mut self, reason: &str) {
        if let Some(active) = self.budget.take() {
            log::info!("Releasing background budget: {}", reason);
            self.publisher.push(Push::Budget(BackgroundExtension { granted_seconds: 0 }));
            active.budget.release();
        }
    }

    fn on_budget_expired(&mut self, grant: u64) {
        match &self.budget {
            Some(active) if active.grant == grant => {
                self.end_budget("expired");
                self.set_phase(BudgetPhase::Expired);
            }
            _ => log::debug!("Ignoring expiry for stale budget {}", grant),
        }
    }

    fn set_phase(&self, phase: BudgetPhase) {
        self.phase.send_replace(phase);
    }

    /// Pull `call` off the worker and marshal the result back as a cache update.
    fn spawn_pull<T, F>(&self, call: EngineCall, into_update: F)
    where
        T: serde::de::DeserializeOwned + Send + 'static,
        F: FnOnce(T) -> CacheUpdate + Send + 'static,
    {
        let client = self.client.clone();
        let internal = self.internal.clone();
        tokio::spawn(async move {
            match client.fetch::<T>(call).await {
                Ok(value) => {
                    let _ = internal.send(CoordinatorEvent::Refreshed(into_update(value)));
                }
                Err(e) => log::warn!("{} failed: {}", call, e),
            }
        });
    }

    fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            is_active: self.active,
            budget_granted_seconds: self.budget.as_ref().map(|active| active.budget.granted_seconds()),
            timer_starts: self.timer_starts,
            budget_grants: self.budget_grants,
            last_device_state: self.last_device_state.clone(),
            current_status: self.cache.current_status.clone(),
            queue_status: self.cache.queue_status.clone(),
            compression_stats: self.cache.compression_stats.clone(),
            device_capabilities: self.cache.device_capabilities.clone(),
            is_throttled: self.cache.is_throttled,
            throttle_reason: self.cache.throttle_reason.clone(),
        }
    }
}

// -----------------------------------------------------------------------------
// Handle -------------------------------------------------------------------------
// -----------------------------------------------------------------------------

pub struct CompressionResourceCoordinator {
    commands: mpsc::Sender<Command>,
    internal: mpsc::UnboundedSender<CoordinatorEvent>,
    publisher: Publisher,
    client: EngineClient,
    phase: watch::Receiver<BudgetPhase>,
    max_compress_request_bytes: usize,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CompressionResourceCoordinator {
    /// Spawn the worker and publisher tasks. Must be called within a Tokio runtime.
    pub fn new(
        client: EngineClient,
        probe: Arc<DeviceTelemetryProbe>,
        host: Arc<dyn BackgroundTaskHost>,
        config: CompressionCoordinatorConfig,
    ) -> Self {
        let (commands, command_receiver) = mpsc::channel(config.command_queue_depth);
        let (internal, internal_receiver) = mpsc::unbounded_channel();
        let (phase_sender, phase) = watch::channel(BudgetPhase::Foreground);
        let publisher = Publisher::spawn(client.clone(), config.publisher_queue_depth);
        let max_compress_request_bytes = config.max_compress_request_bytes;

        let worker = CoordinatorWorker {
            client: client.clone(),
            probe,
            host,
            config,
            publisher: publisher.clone(),
            internal: internal.clone(),
            phase: phase_sender,
            active: false,
            in_background: false,
            timer: None,
            timer_starts: 0,
            budget: None,
            next_grant: 0,
            budget_grants: 0,
            capabilities_requested: false,
            last_device_state: None,
            cache: StatusCache::default(),
        };

        let handle = tokio::spawn(async move {
            if let Some(response) = worker.run(command_receiver, internal_receiver).await {
                let _ = response.send(());
            }
        });

        Self {
            commands,
            internal,
            publisher,
            client,
            phase,
            max_compress_request_bytes,
            worker: Mutex::new(Some(handle)),
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> ServiceResult<T> {
        let (response, receiver) = oneshot::channel();
        self.commands
            .send(build(response))
            .await
            .map_err(|_| ServiceError::CoordinatorUnavailable("worker has shut down".to_string()))?;
        receiver
            .await
            .map_err(|_| ServiceError::CoordinatorUnavailable("worker dropped the request".to_string()))
    }

    async fn dispatch(&self, event: CoordinatorEvent) -> ServiceResult<()> {
        self.request(|response| Command::Dispatch { event, response }).await
    }

    pub async fn start(&self) -> ServiceResult<()> {
        self.dispatch(CoordinatorEvent::Start).await
    }

    pub async fn stop(&self) -> ServiceResult<()> {
        self.dispatch(CoordinatorEvent::Stop).await
    }

    pub async fn handle_lifecycle_event(&self, event: LifecycleEvent) -> ServiceResult<()> {
        self.dispatch(CoordinatorEvent::Lifecycle(event)).await
    }

    pub async fn snapshot(&self) -> ServiceResult<CoordinatorSnapshot> {
        self.request(|response| Command::Snapshot { response }).await
    }

    pub fn subscribe_budget(&self) -> watch::Receiver<BudgetPhase> {
        self.phase.clone()
    }

    pub fn budget_phase(&self) -> BudgetPhase {
        *self.phase.borrow()
    }

    /// Stop the coordinator and wait for its worker to exit.
    pub async fn shutdown(&self) -> ServiceResult<()> {
        if let Err(e) = self.request(|response| Command::Shutdown { response }).await {
            log::debug!("Shutdown request not delivered: {}", e);
        }
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| ServiceError::Unknown(format!("coordinator worker failed: {}", e)))?;
        }
        Ok(())
    }

    /// Queue a document, falling back to a priority update when it is already queued.
    pub async fn queue_document(&self, document_id: &str, priority: CompressionPriority) -> ServiceResult<QueueOutcome> {
        let id = DocumentId::new(document_id)?;
        let call = EngineCall::QueueDocument;
        let payload = EngineClient::encode(call, &PriorityRequest { document_id: &id, priority })?;
        let reply = self.client.send(call, payload, None).await?;

        let reason = match QueueStatusCode::from(reply.status) {
            QueueStatusCode::Queued => {
                log::debug!("Queued {} at {}", id, priority.as_str());
                return Ok(QueueOutcome::Queued);
            }
            QueueStatusCode::AlreadyQueued => {
                log::info!("{} already queued, updating priority to {}", id, priority.as_str());
                let updated = self.send_priority_update(&id, priority).await?;
                return Ok(QueueOutcome::PriorityUpdated { updated });
            }
            QueueStatusCode::InvalidId => QueueRejection::InvalidId,
            QueueStatusCode::NotFound => QueueRejection::NotFound,
            QueueStatusCode::Other(code) => QueueRejection::Unknown(code),
        };

        let message = reply.last_error.clone().unwrap_or_else(|| reason.to_string());
        Err(ServiceError::QueueRejected {
            document_id: id.to_string(),
            reason,
            message,
        })
    }

    pub async fn update_priority(&self, document_id: &str, priority: CompressionPriority) -> ServiceResult<bool> {
        let id = DocumentId::new(document_id)?;
        self.send_priority_update(&id, priority).await
    }

    async fn send_priority_update(&self, id: &DocumentId, priority: CompressionPriority) -> ServiceResult<bool> {
        let response: UpdatedResponse = self
            .client
            .call_json(EngineCall::UpdatePriority, &PriorityRequest { document_id: id, priority }, None)
            .await?;
        Ok(response.updated)
    }

    pub async fn compress_document(
        &self,
        document_id: &str,
        config: Option<CompressionConfig>,
    ) -> ServiceResult<CompressionResult> {
        let id = DocumentId::new(document_id)?;
        if self.budget_phase() == BudgetPhase::Expired {
            return Err(ServiceError::ResourceBudgetExpired);
        }

        let call = EngineCall::CompressDocument;
        let payload = EngineClient::encode(call, &CompressRequest { document_id: &id, config: config.as_ref() })?;
        ensure_payload_within(call.symbol(), &payload, self.max_compress_request_bytes)?;

        let reply = self.client.send(call, payload, None).await?;
        let result: CompressionResult = EngineClient::decode(reply)?;
        log::info!(
            "Compressed {}: saved {} bytes ({:.1}%)",
            id,
            result.bytes_saved(),
            result.percent_saved
        );

        match self.client.fetch::<CompressionStats>(EngineCall::GetStats).await {
            Ok(stats) => {
                let _ = self.internal.send(CoordinatorEvent::Refreshed(CacheUpdate::Stats(stats)));
            }
            Err(e) => log::warn!("Failed to refresh compression stats: {}", e),
        }
        Ok(result)
    }

    /// Best-effort cancel; the flag is whatever the engine reports.
    pub async fn cancel_compression(&self, document_id: &str) -> ServiceResult<bool> {
        let id = DocumentId::new(document_id)?;
        let response: CancelledResponse = self
            .client
            .call_json(EngineCall::Cancel, &DocumentRequest { document_id: &id }, None)
            .await?;
        Ok(response.cancelled)
    }

    pub async fn get_document_status(&self, document_id: &str) -> ServiceResult<DocumentCompressionHistory> {
        let id = DocumentId::new(document_id)?;
        self.client
            .call_json(EngineCall::GetDocumentStatus, &DocumentRequest { document_id: &id }, None)
            .await
    }

    /// Pull the engine's aggregate status and refresh the cached fields.
    pub async fn refresh_status(&self) -> ServiceResult<ComprehensiveStatus> {
        let status: ComprehensiveStatus = self.client.fetch(EngineCall::GetComprehensiveStatus).await?;
        let _ = self
            .internal
            .send(CoordinatorEvent::Refreshed(CacheUpdate::Status(status.clone())));
        Ok(status)
    }

    /// Pull just the queue counters and refresh the cached copy.
    pub async fn refresh_queue_status(&self) -> ServiceResult<CompressionQueueStatus> {
        let queue: CompressionQueueStatus = self.client.fetch(EngineCall::GetQueueStatus).await?;
        let _ = self
            .internal
            .send(CoordinatorEvent::Refreshed(CacheUpdate::Queue(queue.clone())));
        Ok(queue)
    }

    pub fn handle_content_visibility(&self, is_visible: bool) {
        self.publisher.push(Push::Visibility(VisibilityHint { is_visible }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wait_until, FakeHost, FakeSignals, ScriptedEngine};
    use std::time::Duration;

    struct Harness {
        engine: Arc<ScriptedEngine>,
        signals: Arc<FakeSignals>,
        host: Arc<FakeHost>,
        coordinator: CompressionResourceCoordinator,
    }

    fn harness_with(config: CompressionCoordinatorConfig) -> Harness {
        let engine = ScriptedEngine::new();
        let signals = FakeSignals::new();
        let host = FakeHost::new();
        let coordinator = CompressionResourceCoordinator::new(
            EngineClient::new(engine.clone()),
            Arc::new(DeviceTelemetryProbe::new(signals.clone())),
            host.clone(),
            config,
        );
        Harness { engine, signals, host, coordinator }
    }

    fn harness() -> Harness {
        harness_with(CompressionCoordinatorConfig::default())
    }

    #[tokio::test]
    async fn test_blank_document_id_never_reaches_engine() {
        let h = harness();
        for id in ["", "   ", "\t"] {
            let c = &h.coordinator;
            assert!(c.queue_document(id, CompressionPriority::High).await.unwrap_err().is_validation());
            assert!(c.update_priority(id, CompressionPriority::Low).await.unwrap_err().is_validation());
            assert!(c.compress_document(id, None).await.unwrap_err().is_validation());
            assert!(c.cancel_compression(id).await.unwrap_err().is_validation());
            assert!(c.get_document_status(id).await.unwrap_err().is_validation());
        }
        assert!(h.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_already_queued_falls_back_to_priority_update() {
        let h = harness();
        h.engine.reply(EngineCall::QueueDocument, 3, None);
        h.engine.reply(EngineCall::UpdatePriority, 0, Some(r#"{"updated":true}"#));

        let outcome = h
            .coordinator
            .queue_document("doc-1", CompressionPriority::Normal)
            .await
            .unwrap();
        assert_eq!(outcome, QueueOutcome::PriorityUpdated { updated: true });

        let calls = h.engine.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call, EngineCall::QueueDocument);
        assert_eq!(calls[1].call, EngineCall::UpdatePriority);
        assert_eq!(calls[1].payload, r#"{"document_id":"doc-1","priority":"NORMAL"}"#);
        assert_eq!(calls[0].payload, calls[1].payload);
    }

    #[tokio::test]
    async fn test_queue_rejections_are_typed() {
        let h = harness();
        h.engine.reply(EngineCall::QueueDocument, 2, None);

        let err = h
            .coordinator
            .queue_document("doc-9", CompressionPriority::Low)
            .await
            .unwrap_err();
        match err {
            ServiceError::QueueRejected { document_id, reason, message } => {
                assert_eq!(document_id, "doc-9");
                assert_eq!(reason, QueueRejection::NotFound);
                assert_eq!(message, "document not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(h.engine.count(EngineCall::UpdatePriority), 0);

        h.engine.reply(EngineCall::QueueDocument, 0, None);
        assert_eq!(
            h.coordinator.queue_document("doc-9", CompressionPriority::Low).await.unwrap(),
            QueueOutcome::Queued
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_creates_one_timer() {
        let h = harness();
        h.coordinator.start().await.unwrap();
        h.coordinator.start().await.unwrap();

        let snapshot = h.coordinator.snapshot().await.unwrap();
        assert!(snapshot.is_active);
        assert_eq!(snapshot.timer_starts, 1);
        assert!(h.signals.battery_monitoring());

        let engine = h.engine.clone();
        assert!(wait_until(|| engine.count(EngineCall::DetectDeviceCapabilities) == 1).await);
        assert!(wait_until(|| engine.count(EngineCall::GetComprehensiveStatus) == 1).await);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(wait_until(|| engine.count(EngineCall::UpdateDeviceState) == 2).await);
        assert_eq!(h.engine.count(EngineCall::DetectDeviceCapabilities), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capabilities_detected_once_per_lifetime() {
        let h = harness();
        h.coordinator.start().await.unwrap();
        h.coordinator.stop().await.unwrap();
        h.coordinator.start().await.unwrap();

        let engine = h.engine.clone();
        assert!(wait_until(|| engine.count(EngineCall::GetComprehensiveStatus) == 2).await);
        assert_eq!(engine.count(EngineCall::DetectDeviceCapabilities), 1);
        assert_eq!(h.coordinator.snapshot().await.unwrap().timer_starts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_telemetry_while_inactive() {
        let h = harness();
        h.coordinator.start().await.unwrap();
        h.coordinator.stop().await.unwrap();
        h.coordinator.stop().await.unwrap();

        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::ThermalStateChanged)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(95)).await;

        assert_eq!(h.engine.count(EngineCall::UpdateDeviceState), 0);
        assert!(!h.signals.battery_monitoring());
        assert!(!h.coordinator.snapshot().await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_background_budget_is_single_and_released_on_foreground() {
        let h = harness();
        h.coordinator.start().await.unwrap();
        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::EnteredBackground)
            .await
            .unwrap();
        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::EnteredBackground)
            .await
            .unwrap();

        assert_eq!(h.host.begins(), 1);
        let snapshot = h.coordinator.snapshot().await.unwrap();
        assert_eq!(snapshot.budget_grants, 1);
        assert_eq!(snapshot.budget_granted_seconds, Some(30));
        assert_eq!(h.coordinator.budget_phase(), BudgetPhase::Budgeted { granted_seconds: 30 });

        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::BecameActive)
            .await
            .unwrap();
        assert_eq!(h.host.ends(), 1);
        assert_eq!(h.coordinator.budget_phase(), BudgetPhase::Foreground);

        let engine = h.engine.clone();
        assert!(wait_until(|| engine.count(EngineCall::HandleBackgroundTaskExtension) == 2).await);
        assert_eq!(
            engine.payloads(EngineCall::HandleBackgroundTaskExtension),
            vec![r#"{"granted_seconds":30}"#.to_string(), r#"{"granted_seconds":0}"#.to_string()]
        );
        assert!(wait_until(|| engine.count(EngineCall::HandleAppLifecycleEvent) == 3).await);
        let hints = engine.payloads(EngineCall::HandleAppLifecycleEvent);
        assert_eq!(hints[0], r#"{"event":"entering_background"}"#);
        assert_eq!(hints[2], r#"{"event":"becoming_active"}"#);
    }

    #[tokio::test]
    async fn test_expiry_releases_budget_and_blocks_compression() {
        let h = harness();
        h.coordinator.start().await.unwrap();
        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::EnteredBackground)
            .await
            .unwrap();

        assert!(h.host.fire_expiry());
        let snapshot = h.coordinator.snapshot().await.unwrap();
        assert_eq!(snapshot.budget_granted_seconds, None);
        assert_eq!(h.host.ends(), 1);
        assert_eq!(h.coordinator.budget_phase(), BudgetPhase::Expired);

        let err = h.coordinator.compress_document("doc-1", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::ResourceBudgetExpired));
        assert_eq!(h.engine.count(EngineCall::CompressDocument), 0);

        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::BecameActive)
            .await
            .unwrap();
        assert_eq!(h.coordinator.budget_phase(), BudgetPhase::Foreground);
        assert_eq!(h.host.ends(), 1);
    }

    #[tokio::test]
    async fn test_stop_releases_outstanding_budget() {
        let h = harness();
        h.coordinator.start().await.unwrap();
        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::EnteredBackground)
            .await
            .unwrap();
        h.coordinator.stop().await.unwrap();

        assert_eq!(h.host.ends(), 1);
        assert_eq!(h.host.outstanding(), 0);
        assert!(!h.signals.battery_monitoring());
        let snapshot = h.coordinator.snapshot().await.unwrap();
        assert!(!snapshot.is_active);
        assert_eq!(snapshot.budget_granted_seconds, None);
    }

    #[tokio::test]
    async fn test_shutdown_tears_down_worker() {
        let h = harness();
        h.coordinator.start().await.unwrap();
        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::EnteredBackground)
            .await
            .unwrap();
        h.coordinator.shutdown().await.unwrap();

        assert_eq!(h.host.outstanding(), 0);
        assert!(!h.signals.battery_monitoring());
        assert!(matches!(
            h.coordinator.start().await,
            Err(ServiceError::CoordinatorUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_warning_pushes_fixed_pressure_event() {
        let h = harness();
        h.signals.set_memory(2048 * 1024 * 1024, 1792 * 1024 * 1024);
        h.coordinator.start().await.unwrap();
        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::MemoryWarning)
            .await
            .unwrap();

        let engine = h.engine.clone();
        assert!(wait_until(|| engine.count(EngineCall::HandleEnhancedMemoryWarning) == 1).await);
        assert_eq!(
            engine.payloads(EngineCall::HandleEnhancedMemoryWarning),
            vec![r#"{"level":"critical","available_memory_mb":256,"trend":"increasing"}"#.to_string()]
        );
        let snapshot = h.coordinator.snapshot().await.unwrap();
        assert_eq!(snapshot.last_device_state.unwrap().available_memory_mb, 256);
    }

    #[tokio::test]
    async fn test_push_failures_are_not_retried() {
        let h = harness();
        h.engine.reply(EngineCall::UpdateDeviceState, 6, None);
        h.coordinator.start().await.unwrap();
        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::ThermalStateChanged)
            .await
            .unwrap();

        let engine = h.engine.clone();
        assert!(wait_until(|| engine.count(EngineCall::UpdateDeviceState) == 1).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(engine.count(EngineCall::UpdateDeviceState), 1);
    }

    #[tokio::test]
    async fn test_compress_rejects_oversize_requests() {
        let h = harness_with(CompressionCoordinatorConfig {
            max_compress_request_bytes: 64,
            ..CompressionCoordinatorConfig::default()
        });
        let id = "d".repeat(100);

        let err = h.coordinator.compress_document(&id, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(crate::errors::ValidationError::PayloadTooLarge { .. })
        ));
        assert!(h.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_compress_reports_savings_and_caches_stats() {
        let h = harness();
        h.engine.reply(
            EngineCall::CompressDocument,
            0,
            Some(r#"{"original_size":4000,"compressed_size":1000,"space_saved_percentage":75.0}"#),
        );
        h.engine.reply(
            EngineCall::GetStats,
            0,
            Some(r#"{"total_original_size":4000,"total_compressed_size":1000,"space_saved":3000}"#),
        );

        let result = h
            .coordinator
            .compress_document("doc-1", Some(CompressionConfig::default()))
            .await
            .unwrap();
        assert_eq!(result.bytes_saved(), 3000);
        assert_eq!(result.percent_saved, 75.0);

        let snapshot = h.coordinator.snapshot().await.unwrap();
        assert_eq!(snapshot.compression_stats.unwrap().space_saved, 3000);
        assert!(h.engine.calls()[0].payload.contains(r#""config":{"method":"Lossless""#));
    }

    #[tokio::test]
    async fn test_cancel_returns_engine_flag() {
        let h = harness();
        h.engine.reply(EngineCall::Cancel, 0, Some(r#"{"cancelled":false}"#));
        assert!(!h.coordinator.cancel_compression("doc-1").await.unwrap());
        assert_eq!(h.engine.calls()[0].payload, r#"{"document_id":"doc-1"}"#);
    }

    #[tokio::test]
    async fn test_refresh_status_updates_cached_fields() {
        let h = harness();
        h.engine.reply(
            EngineCall::GetComprehensiveStatus,
            0,
            Some(
                r#"{"queue_status":{"pending_count":2,"processing_count":1},
                    "ios_worker_status":{"is_throttled":true,"throttle_reason":"Battery low"},
                    "device_capabilities":{"device_type":"iPad","safe_concurrency":2,"memory_limit_mb":200}}"#,
            ),
        );

        let status = h.coordinator.refresh_status().await.unwrap();
        assert_eq!(status.queue_status.as_ref().unwrap().pending_count, 2);

        let snapshot = h.coordinator.snapshot().await.unwrap();
        assert!(snapshot.is_throttled);
        assert_eq!(snapshot.throttle_reason.as_deref(), Some("Battery low"));
        assert_eq!(snapshot.queue_status.unwrap().processing_count, 1);
        assert_eq!(snapshot.device_capabilities.unwrap().safe_concurrency, 2);
        assert!(snapshot.current_status.is_some());
    }

    #[tokio::test]
    async fn test_refresh_queue_status_updates_cached_counters() {
        let h = harness();
        h.engine.reply(
            EngineCall::GetQueueStatus,
            0,
            Some(r#"{"pending_count":5,"processing_count":1,"completed_count":9,"failed_count":2,"skipped_count":0}"#),
        );

        let queue = h.coordinator.refresh_queue_status().await.unwrap();
        assert_eq!(queue.pending_count, 5);
        assert_eq!(h.engine.payloads(EngineCall::GetQueueStatus), vec![String::new()]);

        let snapshot = h.coordinator.snapshot().await.unwrap();
        let cached = snapshot.queue_status.unwrap();
        assert_eq!(cached.completed_count, 9);
        assert_eq!(cached.failed_count, 2);
        assert!(snapshot.current_status.is_none());
    }

    #[tokio::test]
    async fn test_document_status_decodes_history() {
        let h = harness();
        h.engine.reply(
            EngineCall::GetDocumentStatus,
            0,
            Some(
                r#"{"document_id":"doc-4","current_status":"in_progress","original_size":8000,
                    "last_updated":"2024-05-01T10:00:00Z","attempts":2}"#,
            ),
        );

        let history = h.coordinator.get_document_status("doc-4").await.unwrap();
        assert_eq!(history.document_id, "doc-4");
        assert_eq!(history.current_status, "in_progress");
        assert_eq!(history.original_size, Some(8000));
        assert!(history.compressed_size.is_none());
        assert_eq!(
            h.engine.payloads(EngineCall::GetDocumentStatus),
            vec![r#"{"document_id":"doc-4"}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn test_refused_grant_marks_budget_expired() {
        let h = harness();
        h.host.refuse_grants(true);
        h.coordinator.start().await.unwrap();
        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::EnteredBackground)
            .await
            .unwrap();

        assert_eq!(h.coordinator.budget_phase(), BudgetPhase::Expired);
        let snapshot = h.coordinator.snapshot().await.unwrap();
        assert_eq!(snapshot.budget_grants, 0);
        assert_eq!(snapshot.budget_granted_seconds, None);
        assert_eq!(h.host.begins(), 0);
        assert!(matches!(
            h.coordinator.compress_document("doc-1", None).await,
            Err(ServiceError::ResourceBudgetExpired)
        ));
        assert_eq!(h.engine.count(EngineCall::CompressDocument), 0);

        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::BecameActive)
            .await
            .unwrap();
        assert_eq!(h.coordinator.budget_phase(), BudgetPhase::Foreground);
    }

    #[tokio::test]
    async fn test_start_while_backgrounded_requests_budget() {
        let h = harness();
        h.coordinator
            .handle_lifecycle_event(LifecycleEvent::EnteredBackground)
            .await
            .unwrap();
        assert_eq!(h.host.begins(), 0);
        assert_eq!(h.coordinator.budget_phase(), BudgetPhase::Foreground);

        h.coordinator.start().await.unwrap();
        assert_eq!(h.host.begins(), 1);
        assert_eq!(h.coordinator.budget_phase(), BudgetPhase::Budgeted { granted_seconds: 30 });
        let snapshot = h.coordinator.snapshot().await.unwrap();
        assert_eq!(snapshot.budget_grants, 1);
        assert!(snapshot.last_device_state.is_some());
    }

    #[tokio::test]
    async fn test_content_visibility_is_forwarded() {
        let h = harness();
        h.coordinator.handle_content_visibility(false);

        let engine = h.engine.clone();
        assert!(wait_until(|| engine.count(EngineCall::HandleContentVisibility) == 1).await);
        assert_eq!(
            engine.payloads(EngineCall::HandleContentVisibility),
            vec![r#"{"is_visible":false}"#.to_string()]
        );
    }
}
