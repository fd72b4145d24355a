#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use capsulevisor::{
    AdmissionRegistry, AppendLogsRequest, BackendError, Beacon, Bus, CompleteRunRequest, Event,
    EventKind, RateLimitGuard, RunBackend, RunContext, SandboxControl, SandboxError,
    SessionConfig, SessionController, StartRunRequest, StartRunResponse,
};

/// Recording backend; `start_run` answers from a script, then with `run-123`.
#[derive(Default)]
pub struct FakeBackend {
    pub script: Mutex<VecDeque<Result<StartRunResponse, BackendError>>>,
    pub start_delay: Mutex<Option<Duration>>,
    pub fail_complete: AtomicBool,
    pub starts: Mutex<Vec<StartRunRequest>>,
    pub completes: Mutex<Vec<CompleteRunRequest>>,
    pub logs: Mutex<Vec<(String, AppendLogsRequest)>>,
}

impl FakeBackend {
    pub fn answer(&self, resp: Result<StartRunResponse, BackendError>) {
        self.script.lock().push_back(resp);
    }

    pub fn start_count(&self) -> usize {
        self.starts.lock().len()
    }

    pub fn completes(&self) -> Vec<CompleteRunRequest> {
        self.completes.lock().clone()
    }
}

pub fn accepted(run_id: &str) -> StartRunResponse {
    StartRunResponse {
        ok: true,
        status: 200,
        run_id: Some(run_id.to_string()),
        quota: None,
    }
}

#[async_trait]
impl RunBackend for FakeBackend {
    async fn start_run(&self, req: &StartRunRequest) -> Result<StartRunResponse, BackendError> {
        self.starts.lock().push(req.clone());
        let delay = *self.start_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Ok(accepted("run-123")))
    }

    async fn complete_run(&self, req: &CompleteRunRequest) -> Result<(), BackendError> {
        self.completes.lock().push(req.clone());
        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(BackendError::Transport {
                error: "connection reset".into(),
            });
        }
        Ok(())
    }

    async fn append_logs(&self, run_id: &str, req: &AppendLogsRequest) -> Result<(), BackendError> {
        self.logs.lock().push((run_id.to_string(), req.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBeacon {
    pub sent: Mutex<Vec<CompleteRunRequest>>,
}

impl Beacon for FakeBeacon {
    fn send_complete(&self, req: &CompleteRunRequest) -> Result<(), BackendError> {
        self.sent.lock().push(req.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSandbox {
    pub unreachable: AtomicBool,
    pub kills: AtomicUsize,
    pub restarts: AtomicUsize,
    pub params: Mutex<Vec<serde_json::Value>>,
}

impl FakeSandbox {
    fn deliver(&self) -> Result<(), SandboxError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(SandboxError::new("frame detached"))
        } else {
            Ok(())
        }
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxControl for FakeSandbox {
    async fn set_params(&self, values: serde_json::Value) -> Result<(), SandboxError> {
        self.deliver()?;
        self.params.lock().push(values);
        Ok(())
    }

    async fn restart(&self) -> Result<(), SandboxError> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.deliver()
    }

    async fn kill(&self) -> Result<(), SandboxError> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.deliver()
    }
}

pub struct Harness {
    pub player: SessionController,
    pub backend: Arc<FakeBackend>,
    pub beacon: Arc<FakeBeacon>,
    pub sandbox: Arc<FakeSandbox>,
    pub registry: Arc<AdmissionRegistry>,
    pub guard: Arc<RateLimitGuard>,
    pub events: broadcast::Receiver<Event>,
}

impl Harness {
    pub fn new(cfg: SessionConfig) -> Self {
        let registry = Arc::new(AdmissionRegistry::new(cfg.max_runners_clamped()));
        Self::shared(cfg, registry, Arc::new(RateLimitGuard::new()))
    }

    /// Player sharing a process-wide registry and guard.
    pub fn shared(
        cfg: SessionConfig,
        registry: Arc<AdmissionRegistry>,
        guard: Arc<RateLimitGuard>,
    ) -> Self {
        let backend = Arc::new(FakeBackend::default());
        let beacon = Arc::new(FakeBeacon::default());
        let sandbox = Arc::new(FakeSandbox::default());
        let bus = Bus::new(1024);
        let events = bus.subscribe();

        let player = SessionController::builder(cfg, backend.clone(), beacon.clone(), sandbox.clone())
            .with_registry(registry.clone())
            .with_guard(guard.clone())
            .with_bus(bus)
            .with_context(RunContext::new("capsule-1", "post-1"))
            .build();

        Self {
            player,
            backend,
            beacon,
            sandbox,
            registry,
            guard,
            events,
        }
    }

    /// Events published since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events.try_recv() {
            out.push(ev);
        }
        out
    }
}

pub fn of_kind(events: &[Event], kind: EventKind) -> Vec<&Event> {
    events.iter().filter(|e| e.kind == kind).collect()
}

pub fn toasts(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.is_toast())
        .filter_map(|e| e.reason.as_deref().map(str::to_string))
        .collect()
}

/// Lets spawned timers, listeners and submissions run on the paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
