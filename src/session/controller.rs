use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::admission::{AdmissionRegistry, SlotToken};
use crate::backend::{Beacon, CompleteRunRequest, RunBackend, SpoolBeacon, StartRunRequest};
use crate::budget::{BudgetEnforcer, BudgetPhase, Violation, ViolationKind};
use crate::config::SessionConfig;
use crate::cooldown::RateLimitGuard;
use crate::error::{BackendError, SessionError};
use crate::events::{Bus, Event, EventKind};
use crate::sandbox::{SandboxControl, SandboxError, SandboxSignal};
use crate::subscribers::SubscriberSet;
use crate::telemetry::{PerfThrottle, TelemetryBatcher};

use super::builder::SessionControllerBuilder;
use super::ledger::FinalizedRuns;
use super::types::{RunContext, RunStatus, Session};

type StartFuture = Shared<BoxFuture<'static, Option<Session>>>;

/// Error message recorded when a player is torn down mid-run.
const PAGE_UNLOAD: &str = "page_unload";
/// Error message recorded when the user stops a run.
const KILLED_BY_USER: &str = "killed_by_user";

#[derive(Clone, Debug)]
struct ActiveRun {
    session: Session,
    context: RunContext,
}

struct PlayerState {
    context: Option<RunContext>,
    active: Option<ActiveRun>,
    /// Most recent run, kept for late `error` reconciliation.
    last_run: Option<ActiveRun>,
    slot: Option<SlotToken>,
    budget: BudgetEnforcer,
    finalized: FinalizedRuns,
    running: bool,
    /// Set by `abandon`; a start still in flight reports through the beacon.
    abandoned: bool,
    starting: Option<StartFuture>,
}

/// How an established run ends up once `start_run` has answered.
enum Established {
    Admitted,
    Denied,
    /// Stopped by the user while the call was in flight.
    Killed,
    /// Torn down while the call was in flight.
    Abandoned(ActiveRun),
}

/// Collaborators assembled by [`SessionControllerBuilder`].
pub(super) struct Parts {
    pub cfg: SessionConfig,
    pub client_tag: String,
    pub context: Option<RunContext>,
    pub registry: Arc<AdmissionRegistry>,
    pub guard: Arc<RateLimitGuard>,
    pub backend: Arc<dyn RunBackend>,
    pub beacon: Arc<dyn Beacon>,
    pub spool: Option<Arc<SpoolBeacon>>,
    pub sandbox: Arc<dyn SandboxControl>,
    pub bus: Bus,
    pub subscribers: Option<SubscriberSet>,
}

struct Inner {
    cfg: SessionConfig,
    client_tag: String,
    registry: Arc<AdmissionRegistry>,
    guard: Arc<RateLimitGuard>,
    backend: Arc<dyn RunBackend>,
    beacon: Arc<dyn Beacon>,
    spool: Option<Arc<SpoolBeacon>>,
    spool_replayed: AtomicBool,
    sandbox: Arc<dyn SandboxControl>,
    bus: Bus,
    telemetry: TelemetryBatcher,
    perf: PerfThrottle,
    violations: mpsc::UnboundedSender<Violation>,
    state: Mutex<PlayerState>,
    _subscribers: Option<SubscriberSet>,
}

/// One player: drives a sandbox through admission, budgets, start and a
/// single terminal report per run.
///
/// Public operations never return errors; failures become events on the
/// [`Bus`] (`ToastShown`, `TransportFailed`, ...) and the running state.
///
/// Dropping the controller abandons the active run through the [`Beacon`]
/// and cancels its timers.
pub struct SessionController {
    inner: Arc<Inner>,
    _listener: DropGuard,
}

impl SessionController {
    /// Starts building a player around its required collaborators.
    pub fn builder(
        cfg: SessionConfig,
        backend: Arc<dyn RunBackend>,
        beacon: Arc<dyn Beacon>,
        sandbox: Arc<dyn SandboxControl>,
    ) -> SessionControllerBuilder {
        SessionControllerBuilder::new(cfg, backend, beacon, sandbox)
    }

    /// Wires the parts and spawns the violation listener.
    ///
    /// Must be called inside a tokio runtime.
    pub(super) fn from_parts(parts: Parts) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let telemetry = TelemetryBatcher::new(&parts.cfg, Arc::clone(&parts.backend), parts.bus.clone());
        telemetry.bind_context(parts.context.clone());

        let inner = Arc::new(Inner {
            perf: PerfThrottle::new(&parts.cfg),
            cfg: parts.cfg,
            client_tag: parts.client_tag,
            registry: parts.registry,
            guard: parts.guard,
            backend: parts.backend,
            beacon: parts.beacon,
            spool: parts.spool,
            spool_replayed: AtomicBool::new(false),
            sandbox: parts.sandbox,
            bus: parts.bus,
            telemetry,
            state: Mutex::new(PlayerState {
                context: parts.context,
                active: None,
                last_run: None,
                slot: None,
                budget: BudgetEnforcer::new(0, tx.clone()),
                finalized: FinalizedRuns::new(),
                running: false,
                abandoned: false,
                starting: None,
            }),
            violations: tx,
            _subscribers: parts.subscribers,
        });

        let token = CancellationToken::new();
        Inner::spawn_listener(Arc::downgrade(&inner), rx, token.clone());
        Self {
            inner,
            _listener: token.drop_guard(),
        }
    }

    /// Binds the capsule/post the next runs are accounted against.
    pub fn set_context(&self, context: RunContext) {
        self.inner.telemetry.bind_context(Some(context.clone()));
        self.inner.state.lock().context = Some(context);
    }

    pub fn context(&self) -> Option<RunContext> {
        self.inner.state.lock().context.clone()
    }

    /// Establishes a run with the backend.
    ///
    /// Refused locally (no network call) without a resolvable context, while
    /// the rate-limit guard is cooling down, or when no slot is available.
    /// Concurrent callers share the in-flight attempt. Returns the active
    /// session if one already exists.
    pub async fn start_session(&self) -> Option<Session> {
        self.inner.start_shared().await
    }

    /// Reports the active run's terminal status (at most once per run).
    pub async fn finalize_session(&self, status: RunStatus, error_message: Option<String>) {
        self.inner.finalize(status, error_message).await;
    }

    /// Synchronous teardown: marks the active run `failed` with
    /// `page_unload` and hands the report to the beacon.
    pub fn abandon(&self) {
        self.inner.abandon();
    }

    /// Completes the active run and reloads the sandbox.
    pub async fn restart(&self) {
        self.inner.finalize(RunStatus::Completed, None).await;
        self.inner.stop_local();
        if let Err(e) = self.inner.sandbox.restart().await {
            self.inner.sandbox_unreachable("restart", &e);
        }
        self.inner.set_running(false);
    }

    /// Fails the active run with `killed_by_user` and terminates the sandbox.
    ///
    /// The player reports stopped even when the sandbox cannot be reached.
    pub async fn kill(&self) {
        self.inner
            .finalize(RunStatus::Failed, Some(KILLED_BY_USER.to_string()))
            .await;
        self.inner.stop_local();
        if let Err(e) = self.inner.sandbox.kill().await {
            self.inner.sandbox_unreachable("kill", &e);
        }
        self.inner.set_running(false);
    }

    /// Forwards parameter values to the running capsule.
    pub async fn set_params(&self, values: serde_json::Value) {
        if let Err(e) = self.inner.sandbox.set_params(values).await {
            self.inner.sandbox_unreachable("set_params", &e);
        }
    }

    /// Feeds one sandbox signal into the lifecycle.
    pub async fn on_signal(&self, signal: SandboxSignal) {
        self.inner.record_signal(&signal);
        match signal {
            SandboxSignal::Loading => self.inner.on_loading().await,
            SandboxSignal::Ready => self.inner.on_ready().await,
            SandboxSignal::Error { message } => self.inner.on_error(message).await,
            SandboxSignal::Log { .. }
            | SandboxSignal::Stats { .. }
            | SandboxSignal::BootMetrics { .. } => {}
        }
    }

    /// Running/stopped state shown to the user.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.state.lock().active.as_ref().map(|r| r.session.clone())
    }

    /// Terminal status recorded for `run_id`, if it was finalized here.
    pub fn finalized_status(&self, run_id: &str) -> Option<RunStatus> {
        self.inner.state.lock().finalized.get(run_id)
    }

    pub fn budget_phase(&self) -> BudgetPhase {
        self.inner.state.lock().budget.phase()
    }

    /// True while this player holds an admission slot.
    pub fn holds_slot(&self) -> bool {
        self.inner.state.lock().slot.is_some()
    }

    pub fn client_tag(&self) -> &str {
        &self.inner.client_tag
    }

    pub fn telemetry(&self) -> &TelemetryBatcher {
        &self.inner.telemetry
    }

    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Receiver for events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        // The in-flight start holds an `Arc<Inner>`.
        self.inner.state.lock().starting = None;
        self.inner.abandon();
    }
}

impl Inner {
    fn spawn_listener(
        weak: Weak<Inner>,
        mut rx: mpsc::UnboundedReceiver<Violation>,
        token: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(v) => {
                            let Some(inner) = weak.upgrade() else { break };
                            inner.violate(v.epoch, v.kind).await;
                        }
                        None => break,
                    }
                }
            }
        });
    }

    fn start_shared(self: &Arc<Self>) -> StartFuture {
        let mut st = self.state.lock();
        if let Some(fut) = &st.starting {
            return fut.clone();
        }
        let inner = Arc::clone(self);
        let fut = async move {
            let out = inner.start().await;
            inner.state.lock().starting = None;
            out
        }
        .boxed()
        .shared();
        st.starting = Some(fut.clone());
        fut
    }

    async fn start(&self) -> Option<Session> {
        self.replay_spool();
        let epoch = {
            let mut st = self.state.lock();
            // A violated session stays latched until the next `loading`.
            if st.active.is_none() && st.budget.phase() == BudgetPhase::Completed {
                self.open_epoch(&mut st)
            } else {
                st.budget.epoch()
            }
        };
        match self.try_start().await {
            Ok(session) => Some(session),
            Err(err) => {
                self.start_failed(epoch, err).await;
                None
            }
        }
    }

    async fn try_start(&self) -> Result<Session, SessionError> {
        let (context, token, provisional) = {
            let mut st = self.state.lock();
            if let Some(run) = &st.active {
                return Ok(run.session.clone());
            }
            let context = st
                .context
                .clone()
                .filter(RunContext::is_resolvable)
                .ok_or(SessionError::MissingContext)?;
            if let Some(remaining) = self.guard.remaining() {
                return Err(SessionError::CoolingDown { remaining });
            }
            st.abandoned = false;
            let token = match st.slot {
                Some(token) => token,
                None => {
                    let token = self.reserve_slot()?;
                    st.slot = Some(token);
                    token
                }
            };
            (context, token, Uuid::new_v4().to_string())
        };

        let req = StartRunRequest {
            run_id: provisional.clone(),
            capsule_id: context.capsule_id.clone(),
            post_id: context.post_id.clone(),
            artifact_id: context.artifact_id.clone(),
        };
        let mut session = Session::begin(provisional);
        self.bus.publish(
            Event::new(EventKind::SessionStarting)
                .with_run(session.id.as_str())
                .with_context(&context),
        );

        let resp = self.backend.start_run(&req).await?;
        if resp.is_quota_exceeded() {
            let message = resp.quota.unwrap_or_default().user_message();
            self.guard.start_cooldown(self.cfg.rate_limit_cooldown);
            self.bus.publish(
                Event::new(EventKind::CooldownStarted).with_duration(self.cfg.rate_limit_cooldown),
            );
            return Err(SessionError::QuotaExceeded { message });
        }
        if !resp.ok {
            return Err(SessionError::Rejected {
                status: resp.status,
            });
        }
        match resp.run_id {
            Some(id) => session.id = id,
            None => tracing::debug!(run_id = %session.id, "start_run gave no run id; keeping provisional id"),
        }

        let admission = self.registry.confirm(token, &session.id);
        let established = {
            let mut st = self.state.lock();
            let run = ActiveRun {
                session: session.clone(),
                context: context.clone(),
            };
            st.last_run = Some(run.clone());
            if st.slot != Some(token) {
                if st.abandoned {
                    Established::Abandoned(run)
                } else {
                    st.active = Some(run);
                    Established::Killed
                }
            } else {
                st.active = Some(run);
                if admission.allowed {
                    st.budget.arm_run(self.cfg.run_budget_limit());
                    Established::Admitted
                } else {
                    Established::Denied
                }
            }
        };

        if !matches!(established, Established::Abandoned(_)) {
            self.telemetry.bind_run(Some(session.id.clone()));
            self.bus.publish(
                Event::new(EventKind::SessionStarted)
                    .with_run(session.id.as_str())
                    .with_context(&context),
            );
        }

        // The backend run exists in every branch, so each gets its one
        // terminal report.
        match established {
            Established::Abandoned(run) => {
                self.report_abandoned(run);
                Err(SessionError::Aborted)
            }
            Established::Killed => {
                self.finalize(RunStatus::Failed, Some(KILLED_BY_USER.to_string()))
                    .await;
                Err(SessionError::Aborted)
            }
            Established::Denied => Err(SessionError::AdmissionDenied {
                active: admission.active_count,
                max: self.registry.max_concurrent(),
            }),
            Established::Admitted => {
                tracing::info!(
                    run_id = %session.id,
                    capsule_id = %context.capsule_id,
                    post_id = %context.post_id,
                    "run started"
                );
                self.set_running(true);
                Ok(session)
            }
        }
    }

    async fn start_failed(&self, epoch: u64, err: SessionError) {
        let label = err.as_label();
        match &err {
            SessionError::Backend(e) => {
                let context = self.state.lock().context.clone();
                self.transport_failed("start_run", e, None, context.as_ref());
            }
            SessionError::MissingContext => tracing::debug!("start skipped: no capsule context"),
            _ => tracing::info!(reason = label, "start refused"),
        }
        self.bus
            .publish(Event::new(EventKind::StartFailed).with_reason(label));

        let violated = matches!(err, SessionError::AdmissionDenied { .. })
            && self.violate(epoch, ViolationKind::ConcurrencyLimit).await;
        self.release_slot();
        if violated || matches!(err, SessionError::Aborted) {
            return;
        }

        // A surface that booted for this run must not keep running without
        // a run or a budget.
        let live = {
            let mut st = self.state.lock();
            st.budget.complete();
            st.running
        };
        if live {
            if let Err(e) = self.sandbox.kill().await {
                self.sandbox_unreachable("kill", &e);
            }
        }
        self.set_running(false);
        if err.is_user_visible() {
            self.toast(err.as_message());
        }
    }

    /// Returns `true` if a terminal report was issued.
    async fn finalize(&self, status: RunStatus, error_message: Option<String>) -> bool {
        let (run, outcome) = {
            let mut st = self.state.lock();
            let Some(run) = st.active.take() else {
                return false;
            };
            let outcome = st.finalized.record(&run.session.id, status);
            (run, outcome)
        };
        let run_id = run.session.id.as_str();

        if outcome.should_report() {
            self.telemetry.flush(Some(run_id));
        }
        if self.telemetry.scope().run_id.as_deref() == Some(run_id) {
            self.telemetry.bind_run(None);
        }
        self.stop_local();

        if !outcome.should_report() {
            tracing::debug!(run_id, %status, ?outcome, "finalize ignored");
            return false;
        }

        let duration = run.session.elapsed();
        let req = CompleteRunRequest {
            run_id: run_id.to_string(),
            capsule_id: run.context.capsule_id.clone(),
            post_id: run.context.post_id.clone(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            status,
            error_message,
            artifact_id: run.context.artifact_id.clone(),
        };

        tracing::info!(
            run_id,
            capsule_id = %req.capsule_id,
            post_id = %req.post_id,
            %status,
            duration_ms = req.duration_ms,
            "run finalized"
        );
        let mut ev = Event::new(EventKind::SessionFinalized)
            .with_run(run_id)
            .with_context(&run.context)
            .with_status(status)
            .with_duration(duration);
        if let Some(msg) = &req.error_message {
            ev = ev.with_reason(msg.as_str());
        }
        self.bus.publish(ev);

        if let Err(e) = self.backend.complete_run(&req).await {
            self.transport_failed("complete_run", &e, Some(run_id), Some(&run.context));
        }
        true
    }

    fn abandon(&self) {
        let pending = {
            let mut st = self.state.lock();
            st.budget.complete();
            st.abandoned = true;
            st.active.take()
        };
        self.release_slot();
        self.telemetry.discard(PAGE_UNLOAD);
        self.set_running(false);

        if let Some(run) = pending {
            self.report_abandoned(run);
        }
    }

    /// Records `run` as failed with `page_unload` and hands the report to
    /// the beacon, unless it was already reported.
    fn report_abandoned(&self, run: ActiveRun) {
        let outcome = self
            .state
            .lock()
            .finalized
            .record(&run.session.id, RunStatus::Failed);
        if !outcome.should_report() {
            return;
        }

        let req = CompleteRunRequest {
            run_id: run.session.id.clone(),
            capsule_id: run.context.capsule_id.clone(),
            post_id: run.context.post_id.clone(),
            duration_ms: u64::try_from(run.session.elapsed().as_millis()).unwrap_or(u64::MAX),
            status: RunStatus::Failed,
            error_message: Some(PAGE_UNLOAD.to_string()),
            artifact_id: run.context.artifact_id.clone(),
        };
        match self.beacon.send_complete(&req) {
            Ok(()) => tracing::info!(run_id = %req.run_id, "run abandoned; completion handed to beacon"),
            Err(e) => self.transport_failed("beacon", &e, Some(&req.run_id), Some(&run.context)),
        }
        self.bus.publish(
            Event::new(EventKind::RunAbandoned)
                .with_run(req.run_id.as_str())
                .with_context(&run.context),
        );
    }

    /// Handles a violation for the session armed at `epoch`.
    ///
    /// Returns `true` if it was the session's first (and only) violation.
    async fn violate(&self, epoch: u64, kind: ViolationKind) -> bool {
        let run_id = {
            let mut st = self.state.lock();
            if st.budget.epoch() != epoch || !st.budget.report(kind) {
                return false;
            }
            st.active.as_ref().map(|r| r.session.id.clone())
        };

        tracing::warn!(violation = kind.as_label(), run_id = ?run_id, "budget violated");
        let mut ev = Event::new(EventKind::BudgetViolated).with_reason(kind.as_label());
        if let Some(id) = &run_id {
            ev = ev.with_run(id.as_str());
        }
        self.bus.publish(ev);

        self.release_slot();
        if run_id.is_some() {
            self.finalize(RunStatus::Failed, Some(kind.as_label().to_string()))
                .await;
        }
        if let Err(e) = self.sandbox.kill().await {
            self.sandbox_unreachable("kill", &e);
        }
        self.set_running(false);
        self.toast(kind.as_message());
        true
    }

    fn record_signal(&self, signal: &SandboxSignal) {
        let Some(mut entry) = signal.to_entry() else {
            return;
        };
        if signal.is_perf() {
            if self.perf.admit() {
                entry.sample_rate = self.perf.sample_rate();
                self.telemetry.enqueue_sampled(entry);
            }
        } else {
            self.telemetry.enqueue(entry);
        }
    }

    async fn on_loading(&self) {
        let reloaded = self.state.lock().active.is_some();
        if reloaded {
            self.finalize(RunStatus::Completed, None).await;
        }
        self.release_slot();

        let (epoch, admitted) = {
            let mut st = self.state.lock();
            let epoch = self.open_epoch(&mut st);
            let runner = st.context.as_ref().map(|c| c.runner).unwrap_or_default();
            match self.reserve_slot() {
                Ok(token) => {
                    st.slot = Some(token);
                    st.budget.arm_boot(self.cfg.boot_budget(runner));
                    (epoch, true)
                }
                Err(_) => (epoch, false),
            }
        };

        if admitted {
            self.set_running(true);
        } else {
            self.violate(epoch, ViolationKind::ConcurrencyLimit).await;
        }
    }

    async fn on_ready(self: &Arc<Self>) {
        let (epoch, verdict) = {
            let mut st = self.state.lock();
            if matches!(st.budget.phase(), BudgetPhase::Completed | BudgetPhase::Violated) {
                return;
            }
            (st.budget.epoch(), st.budget.on_ready())
        };
        match verdict {
            Ok(elapsed) => {
                tracing::debug!(boot_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX), "surface ready");
                self.start_shared().await;
            }
            Err(kind) => {
                self.violate(epoch, kind).await;
            }
        }
    }

    async fn on_error(&self, message: String) {
        {
            let mut st = self.state.lock();
            if st.active.is_none() && !self.guard.is_cooling_down() {
                st.active = st.last_run.clone();
            }
        }
        self.finalize(RunStatus::Failed, Some(message)).await;
        self.stop_local();
        self.set_running(false);
    }

    /// Replaces the budget with a fresh one for the next session.
    fn open_epoch(&self, st: &mut PlayerState) -> u64 {
        let epoch = st.budget.epoch().wrapping_add(1);
        st.budget = BudgetEnforcer::new(epoch, self.violations.clone());
        st.abandoned = false;
        epoch
    }

    /// Replays the spool once, in the background, on the first start.
    fn replay_spool(&self) {
        let Some(spool) = &self.spool else {
            return;
        };
        if self.spool_replayed.swap(true, Ordering::AcqRel) {
            return;
        }
        let spool = Arc::clone(spool);
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            match spool.drain(backend.as_ref()).await {
                Ok(report) => tracing::info!(
                    delivered = report.delivered,
                    kept = report.kept,
                    discarded = report.discarded,
                    "spool replayed"
                ),
                Err(e) => tracing::warn!(path = %spool.path().display(), error = %e, "spool replay failed"),
            }
        });
    }

    /// Disarms the budget and gives the slot back.
    fn stop_local(&self) {
        self.state.lock().budget.complete();
        self.release_slot();
    }

    fn reserve_slot(&self) -> Result<SlotToken, SessionError> {
        let admission = self.registry.reserve(&self.client_tag);
        match admission.token {
            Some(token) if admission.allowed => {
                self.bus
                    .publish(Event::new(EventKind::SlotReserved).with_count(admission.active_count));
                Ok(token)
            }
            _ => {
                self.bus.publish(
                    Event::new(EventKind::SlotDenied)
                        .with_count(admission.active_count)
                        .with_reason(ViolationKind::ConcurrencyLimit.as_label()),
                );
                Err(SessionError::AdmissionDenied {
                    active: admission.active_count,
                    max: self.registry.max_concurrent(),
                })
            }
        }
    }

    fn release_slot(&self) {
        let token = self.state.lock().slot.take();
        if let Some(token) = token {
            if self.registry.release(token) {
                self.bus.publish(
                    Event::new(EventKind::SlotReleased).with_count(self.registry.active_count()),
                );
            }
        }
    }

    fn set_running(&self, running: bool) {
        let changed = {
            let mut st = self.state.lock();
            std::mem::replace(&mut st.running, running) != running
        };
        if changed {
            self.bus
                .publish(Event::new(EventKind::RunningChanged).with_running(running));
        }
    }

    fn toast(&self, message: impl Into<Arc<str>>) {
        let message = message.into();
        tracing::info!(text = %message, "toast");
        self.bus.publish(Event::toast(message));
    }

    fn transport_failed(
        &self,
        op: &str,
        err: &BackendError,
        run_id: Option<&str>,
        context: Option<&RunContext>,
    ) {
        let capsule_id = context.map(|c| c.capsule_id.as_str());
        let post_id = context.map(|c| c.post_id.as_str());
        if matches!(err, BackendError::MissingAuth) {
            tracing::error!(code = err.as_label(), op, run_id, capsule_id, post_id, "backend call skipped");
        } else {
            tracing::warn!(op, run_id, capsule_id, post_id, error = %err, "backend call failed");
        }

        let mut ev = Event::new(EventKind::TransportFailed)
            .with_reason(format!("{op}: {}", err.as_label()));
        if let Some(id) = run_id {
            ev = ev.with_run(id);
        }
        if let Some(ctx) = context {
            ev = ev.with_context(ctx);
        }
        self.bus.publish(ev);
    }

    fn sandbox_unreachable(&self, op: &str, err: &SandboxError) {
        tracing::warn!(op, error = %err, "sandbox control not delivered");
        self.bus.publish(
            Event::new(EventKind::SandboxUnreachable).with_reason(format!("{op}: {}", err.reason)),
        );
    }
}
