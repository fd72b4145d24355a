mod common;

use std::sync::Arc;
use std::time::Duration;

use capsulevisor::{
    AdmissionRegistry, BudgetPhase, EventKind, RateLimitGuard, RunStatus, SandboxSignal,
    SessionConfig,
};

use common::{Harness, accepted, of_kind, settle, toasts};

fn budgets(boot: u64, run: u64) -> SessionConfig {
    SessionConfig {
        boot_budget_client: Duration::from_secs(boot),
        run_budget: Duration::from_secs(run),
        ..SessionConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn boot_timeout_kills_the_sandbox_and_frees_the_slot() {
    let mut h = Harness::new(budgets(10, 600));
    h.player.on_signal(SandboxSignal::Loading).await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;

    assert_eq!(h.sandbox.kills(), 1);
    assert!(!h.player.is_running());
    assert!(!h.player.holds_slot());
    assert_eq!(h.player.budget_phase(), BudgetPhase::Violated);

    let events = h.drain_events();
    let violated = of_kind(&events, EventKind::BudgetViolated);
    assert_eq!(violated.len(), 1);
    assert_eq!(violated[0].reason.as_deref(), Some("boot_timeout"));
    assert_eq!(toasts(&events).len(), 1);

    h.player.on_signal(SandboxSignal::Ready).await;
    assert_eq!(h.backend.start_count(), 0);
    assert!(h.backend.completes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn ready_within_budget_disarms_the_boot_timer() {
    let h = Harness::new(budgets(10, 0));
    h.player.on_signal(SandboxSignal::Loading).await;
    tokio::time::sleep(Duration::from_secs(9)).await;
    h.player.on_signal(SandboxSignal::Ready).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;

    assert_eq!(h.sandbox.kills(), 0);
    assert!(h.player.is_running());
    assert_eq!(h.player.budget_phase(), BudgetPhase::Running);
}

#[tokio::test(start_paused = true)]
async fn run_timeout_fails_the_run_once() {
    let h = Harness::new(budgets(10, 60));
    h.player.on_signal(SandboxSignal::Loading).await;
    h.player.on_signal(SandboxSignal::Ready).await;

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;

    let completes = h.backend.completes();
    assert_eq!(completes.len(), 1);
    assert_eq!(completes[0].status, RunStatus::Failed);
    assert_eq!(completes[0].error_message.as_deref(), Some("run_timeout"));
    assert_eq!(h.sandbox.kills(), 1);
    assert_eq!(h.registry.active_count(), 0);

    // A crash reported after the kill does not produce a second report.
    h.player.on_signal(SandboxSignal::error("killed")).await;
    assert_eq!(h.backend.completes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn a_later_run_on_the_same_player_gets_its_own_run_budget() {
    let h = Harness::new(budgets(10, 60));
    assert_eq!(h.player.start_session().await.unwrap().id, "run-123");
    h.player.finalize_session(RunStatus::Completed, None).await;
    assert_eq!(h.player.budget_phase(), BudgetPhase::Completed);

    h.backend.answer(Ok(accepted("run-2")));
    assert_eq!(h.player.start_session().await.unwrap().id, "run-2");
    assert_eq!(h.player.budget_phase(), BudgetPhase::Running);

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;

    let completes = h.backend.completes();
    assert_eq!(completes.len(), 2);
    assert_eq!(completes[1].run_id, "run-2");
    assert_eq!(completes[1].status, RunStatus::Failed);
    assert_eq!(completes[1].error_message.as_deref(), Some("run_timeout"));
    assert_eq!(h.sandbox.kills(), 1);
    assert!(!h.player.is_running());
}

#[tokio::test(start_paused = true)]
async fn refused_start_after_a_completed_run_is_a_new_violation() {
    let cfg = SessionConfig {
        max_concurrent_runners: 1,
        ..SessionConfig::default()
    };
    let mut h = Harness::new(cfg);
    h.player.start_session().await.unwrap();
    h.player.finalize_session(RunStatus::Completed, None).await;

    let other = h.registry.reserve("other-player");
    assert!(other.allowed);
    h.drain_events();

    assert!(h.player.start_session().await.is_none());

    let events = h.drain_events();
    let violated = of_kind(&events, EventKind::BudgetViolated);
    assert_eq!(violated.len(), 1);
    assert_eq!(violated[0].reason.as_deref(), Some("concurrency_limit"));
    assert_eq!(h.player.budget_phase(), BudgetPhase::Violated);
}

#[tokio::test(start_paused = true)]
async fn boot_timeout_then_admission_failure_reports_one_violation() {
    let cfg = SessionConfig {
        max_concurrent_runners: 1,
        ..budgets(10, 600)
    };
    let mut h = Harness::new(cfg);
    h.player.on_signal(SandboxSignal::Loading).await;
    tokio::time::sleep(Duration::from_secs(11)).await;
    settle().await;

    // Another player grabs the only slot; this player's start is refused.
    let other = h.registry.reserve("other-player");
    assert!(other.allowed);
    assert!(h.player.start_session().await.is_none());

    let events = h.drain_events();
    assert_eq!(of_kind(&events, EventKind::BudgetViolated).len(), 1);
    assert_eq!(h.sandbox.kills(), 1);
    assert_eq!(h.backend.start_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn denied_reservation_is_a_concurrency_violation() {
    let registry = Arc::new(AdmissionRegistry::new(1));
    let guard = Arc::new(RateLimitGuard::new());
    let a = Harness::shared(SessionConfig::default(), registry.clone(), guard.clone());
    let mut b = Harness::shared(SessionConfig::default(), registry.clone(), guard);

    a.player.on_signal(SandboxSignal::Loading).await;
    b.player.on_signal(SandboxSignal::Loading).await;

    assert!(a.player.holds_slot());
    assert!(!b.player.holds_slot());
    assert_eq!(registry.active_count(), 1);
    assert_eq!(b.sandbox.kills(), 1);
    assert_eq!(a.sandbox.kills(), 0);

    let events = b.drain_events();
    let violated = of_kind(&events, EventKind::BudgetViolated);
    assert_eq!(violated.len(), 1);
    assert_eq!(violated[0].reason.as_deref(), Some("concurrency_limit"));
    assert!(toasts(&events)[0].contains("Stop another run first"));

    // Releasing A's slot lets B boot on its next load.
    a.player.kill().await;
    b.player.on_signal(SandboxSignal::Loading).await;
    assert!(b.player.holds_slot());
}

#[tokio::test(start_paused = true)]
async fn lowered_cap_fails_confirmation_and_finalizes_the_run() {
    let registry = Arc::new(AdmissionRegistry::new(2));
    let guard = Arc::new(RateLimitGuard::new());
    let a = Harness::shared(SessionConfig::default(), registry.clone(), guard.clone());
    let b = Harness::shared(SessionConfig::default(), registry.clone(), guard);

    a.player.on_signal(SandboxSignal::Loading).await;
    b.player.on_signal(SandboxSignal::Loading).await;
    a.player.on_signal(SandboxSignal::Ready).await;

    registry.set_max_concurrent(1);
    b.backend.answer(Ok(common::accepted("run-b")));
    b.player.on_signal(SandboxSignal::Ready).await;

    assert!(b.player.current_session().is_none());
    let completes = b.backend.completes();
    assert_eq!(completes.len(), 1);
    assert_eq!(completes[0].run_id, "run-b");
    assert_eq!(completes[0].error_message.as_deref(), Some("concurrency_limit"));
    assert_eq!(b.sandbox.kills(), 1);
    assert_eq!(registry.active_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn webcontainer_runs_get_the_longer_boot_budget() {
    let h = Harness::new(SessionConfig::default());
    h.player.set_context(
        capsulevisor::RunContext::new("capsule-1", "post-1")
            .with_runner(capsulevisor::RunnerKind::Webcontainer),
    );
    h.player.on_signal(SandboxSignal::Loading).await;

    tokio::time::sleep(Duration::from_secs(20)).await;
    settle().await;
    assert_eq!(h.sandbox.kills(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(h.sandbox.kills(), 1);
}

#[tokio::test(start_paused = true)]
async fn perf_samples_are_throttled() {
    let cfg = SessionConfig {
        perf_sample_rate: 1.0,
        log_batch_target: 100,
        ..SessionConfig::default()
    };
    let h = Harness::new(cfg);
    h.player.on_signal(SandboxSignal::Loading).await;
    h.player.on_signal(SandboxSignal::Ready).await;

    for _ in 0..5 {
        h.player
            .on_signal(SandboxSignal::Stats {
                fps: 60.0,
                memory: None,
            })
            .await;
    }
    assert_eq!(h.player.telemetry().pending_len(), 1);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    h.player
        .on_signal(SandboxSignal::BootMetrics { boot_time_ms: 900 })
        .await;
    settle().await;

    let logs = h.backend.logs.lock();
    let shipped: usize = logs.iter().map(|(_, b)| b.logs.len()).sum();
    assert_eq!(shipped + h.player.telemetry().pending_len(), 2);
    assert!(logs.iter().all(|(run, b)| run == "run-123"
        && b.logs.iter().all(|e| e.source == "perf")));
}
