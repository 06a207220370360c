//! In-process fakes for the engine and OS seams, shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::os::raw::c_char;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crate::domains::compression::{BackgroundTaskHost, BackgroundTaskId, ExpiryHandler};
use crate::domains::telemetry::{AppState, DeviceSignals, ThermalState};
use crate::ffi::buffer::release_rust_string;
use crate::ffi::{EngineBridge, EngineBuffer, EngineCall, RawEngineReply};

/// Poll `condition` until it holds or roughly two seconds pass.
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    for _ in 0..1000 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    condition()
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

// Live buffer address -> owning engine id
fn live_buffers() -> &'static Mutex<HashMap<usize, u64>> {
    static LIVE: OnceLock<Mutex<HashMap<usize, u64>>> = OnceLock::new();
    LIVE.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

unsafe extern "C" fn release_tracked(ptr: *mut c_char) {
    live_buffers().lock().unwrap().remove(&(ptr as usize));
    release_rust_string(ptr);
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: EngineCall,
    pub payload: String,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone)]
struct ScriptedReply {
    status: i32,
    body: Option<String>,
}

#[derive(Default)]
struct Script {
    queue: VecDeque<ScriptedReply>,
    // The lone remaining reply has answered at least once
    head_served: bool,
}

#[derive(Default)]
struct EngineState {
    scripts: HashMap<EngineCall, Script>,
    calls: Vec<RecordedCall>,
    last_error: Option<String>,
}

/// Engine bridge answering from per-call scripts.
///
/// Replies queue in order; the last one keeps answering until a new reply is
/// scripted, which then replaces it. Unscripted calls succeed with `{}` (or no
/// buffer for status-only calls).
pub struct ScriptedEngine {
    id: u64,
    state: Mutex<EngineState>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(EngineState::default()),
        })
    }

    pub fn reply(&self, call: EngineCall, status: i32, body: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let script = state.scripts.entry(call).or_default();
        if script.head_served {
            script.queue.clear();
            script.head_served = false;
        }
        script.queue.push_back(ScriptedReply {
            status,
            body: body.map(str::to_string),
        });
    }

    pub fn set_last_error(&self, message: &str) {
        self.state.lock().unwrap().last_error = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: EngineCall) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| c.call == call).count()
    }

    pub fn payloads(&self, call: EngineCall) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.call == call)
            .map(|c| c.payload.clone())
            .collect()
    }

    /// Buffers handed out by this engine and not yet released
    pub fn outstanding_buffers(&self) -> usize {
        live_buffers().lock().unwrap().values().filter(|owner| **owner == self.id).count()
    }

    fn next_reply(&self, call: EngineCall) -> ScriptedReply {
        let mut state = self.state.lock().unwrap();
        match state.scripts.get_mut(&call) {
            Some(script) if script.queue.len() > 1 => script.queue.pop_front().unwrap(),
            Some(script) if !script.queue.is_empty() => {
                script.head_served = true;
                script.queue[0].clone()
            }
            _ => ScriptedReply {
                status: 0,
                body: call.returns_payload().then(|| "{}".to_string()),
            },
        }
    }
}

impl EngineBridge for ScriptedEngine {
    fn invoke(&self, call: EngineCall, payload: &str, auth_token: Option<&str>) -> RawEngineReply {
        self.state.lock().unwrap().calls.push(RecordedCall {
            call,
            payload: payload.to_string(),
            auth_token: auth_token.map(str::to_string),
        });

        let reply = self.next_reply(call);
        let buffer = reply.body.map(|body| {
            let raw = std::ffi::CString::new(body).unwrap().into_raw();
            live_buffers().lock().unwrap().insert(raw as usize, self.id);
            unsafe { EngineBuffer::from_raw(raw, release_tracked) }.unwrap()
        });
        RawEngineReply {
            status: reply.status,
            buffer,
        }
    }

    fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().last_error.clone()
    }
}

// ---------------------------------------------------------------------------
// Device signals
// ---------------------------------------------------------------------------

struct SignalState {
    battery: f32,
    charging: bool,
    thermal: ThermalState,
    app_state: AppState,
    physical: u64,
    resident: u64,
    monitoring: bool,
    toggles: usize,
}

pub struct FakeSignals {
    state: Mutex<SignalState>,
}

impl FakeSignals {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SignalState {
                battery: 0.8,
                charging: false,
                thermal: ThermalState::Nominal,
                app_state: AppState::Active,
                physical: 4096 * 1024 * 1024,
                resident: 1024 * 1024 * 1024,
                monitoring: false,
                toggles: 0,
            }),
        })
    }

    pub fn set_battery(&self, level: f32) {
        self.state.lock().unwrap().battery = level;
    }

    pub fn set_charging(&self, charging: bool) {
        self.state.lock().unwrap().charging = charging;
    }

    pub fn set_thermal(&self, thermal: ThermalState) {
        self.state.lock().unwrap().thermal = thermal;
    }

    pub fn set_app_state(&self, app_state: AppState) {
        self.state.lock().unwrap().app_state = app_state;
    }

    pub fn set_memory(&self, physical: u64, resident: u64) {
        let mut state = self.state.lock().unwrap();
        state.physical = physical;
        state.resident = resident;
    }

    pub fn battery_monitoring(&self) -> bool {
        self.state.lock().unwrap().monitoring
    }

    pub fn monitoring_toggles(&self) -> usize {
        self.state.lock().unwrap().toggles
    }
}

impl DeviceSignals for FakeSignals {
    fn battery_level(&self) -> f32 {
        self.state.lock().unwrap().battery
    }

    fn is_charging(&self) -> bool {
        self.state.lock().unwrap().charging
    }

    fn thermal_state(&self) -> ThermalState {
        self.state.lock().unwrap().thermal
    }

    fn app_state(&self) -> AppState {
        self.state.lock().unwrap().app_state
    }

    fn physical_memory_bytes(&self) -> u64 {
        self.state.lock().unwrap().physical
    }

    fn resident_memory_bytes(&self) -> u64 {
        self.state.lock().unwrap().resident
    }

    fn set_battery_monitoring(&self, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        state.monitoring = enabled;
        state.toggles += 1;
    }
}

// ---------------------------------------------------------------------------
// Background task host
// ---------------------------------------------------------------------------

#[derive(Default)]
struct HostState {
    next_id: i32,
    active: Vec<BackgroundTaskId>,
    handlers: Vec<(BackgroundTaskId, ExpiryHandler)>,
    begins: usize,
    ends: usize,
    refuse: bool,
}

pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HostState::default()),
        })
    }

    pub fn refuse_grants(&self, refuse: bool) {
        self.state.lock().unwrap().refuse = refuse;
    }

    /// Granted windows so far
    pub fn begins(&self) -> usize {
        self.state.lock().unwrap().begins
    }

    pub fn ends(&self) -> usize {
        self.state.lock().unwrap().ends
    }

    pub fn outstanding(&self) -> usize {
        self.state.lock().unwrap().active.len()
    }

    /// Run the expiry handler of the most recent live window, as the OS would.
    pub fn fire_expiry(&self) -> bool {
        let handler = {
            let mut state = self.state.lock().unwrap();
            let active = state.active.clone();
            let position = state.handlers.iter().rposition(|(id, _)| active.contains(id));
            position.map(|index| state.handlers.remove(index).1)
        };
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

impl BackgroundTaskHost for FakeHost {
    fn begin_background_task(&self, _name: &str, on_expiry: ExpiryHandler) -> Option<BackgroundTaskId> {
        let mut state = self.state.lock().unwrap();
        if state.refuse {
            return None;
        }
        state.next_id += 1;
        let id = BackgroundTaskId(state.next_id);
        state.active.push(id);
        state.handlers.push((id, on_expiry));
        state.begins += 1;
        Some(id)
    }

    fn end_background_task(&self, id: BackgroundTaskId) {
        let mut state = self.state.lock().unwrap();
        state.active.retain(|active| *active != id);
        state.handlers.retain(|(handler_id, _)| *handler_id != id);
        state.ends += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(engine: &ScriptedEngine, call: EngineCall) -> i32 {
        engine.invoke(call, "{}", None).status
    }

    #[test]
    fn test_replies_queue_then_stick_until_rescripted() {
        let engine = ScriptedEngine::new();
        let call = EngineCall::QueueDocument;
        engine.reply(call, 202, None);
        engine.reply(call, 2, None);

        assert_eq!(status_of(&engine, call), 202);
        assert_eq!(status_of(&engine, call), 2);
        assert_eq!(status_of(&engine, call), 2);

        engine.reply(call, 0, None);
        assert_eq!(status_of(&engine, call), 0);
        assert_eq!(status_of(&engine, call), 0);
    }

    #[test]
    fn test_unserved_reply_still_queues() {
        let engine = ScriptedEngine::new();
        let call = EngineCall::Cancel;
        engine.reply(call, 208, None);
        engine.reply(call, 0, Some(r#"{"cancelled":true}"#));

        assert_eq!(status_of(&engine, call), 208);
        let reply = engine.invoke(call, "{}", None);
        assert_eq!(reply.status, 0);
        assert_eq!(reply.buffer.unwrap().to_str().unwrap(), r#"{"cancelled":true}"#);
        assert_eq!(engine.outstanding_buffers(), 0);
    }
}
