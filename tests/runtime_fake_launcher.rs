// tests/runtime_fake_launcher.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use rundag::engine::{LaunchKind, LaunchRequest, Reconciler, Runtime, RuntimeEvent};
use rundag::exec::SimulatedLauncher;
use rundag::state::RunReason;
use rundag::types::{ConditionStatus, ScriptedOutcome};
use rundag_test_utils::builders::{PipelineBuilder, SimulateBuilder, TaskBuilder};
use rundag_test_utils::fake_launcher::FakeLauncher;
use rundag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn launched_names(launched: &Arc<Mutex<Vec<LaunchRequest>>>) -> Vec<String> {
    launched
        .lock()
        .unwrap()
        .iter()
        .map(|l| l.task.clone())
        .collect()
}

#[tokio::test]
async fn chain_runs_in_dependency_order() -> TestResult {
    init_tracing();

    let pipeline = PipelineBuilder::new()
        .resync_interval("1h")
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b").after("a"))
        .task(TaskBuilder::new("c").after("b"))
        .build();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let launched = Arc::new(Mutex::new(Vec::new()));
    let launcher = FakeLauncher::new(tx.clone(), Arc::clone(&launched));

    let runtime = Runtime::new(Reconciler::new(pipeline), rx, launcher);
    let report = with_timeout(runtime.run()).await?;

    assert_eq!(launched_names(&launched), vec!["a", "b", "c"]);
    assert_eq!(report.condition.status, ConditionStatus::True);
    assert_eq!(report.condition.reason, RunReason::Succeeded);
    Ok(())
}

#[tokio::test]
async fn failing_task_skips_dependents_and_runs_finally() -> TestResult {
    init_tracing();

    let pipeline = PipelineBuilder::new()
        .resync_interval("1h")
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b").after("a"))
        .finally(TaskBuilder::new("report"))
        .build();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let launched = Arc::new(Mutex::new(Vec::new()));
    let launcher = FakeLauncher::new(tx.clone(), Arc::clone(&launched)).failing("a");

    let report = with_timeout(Runtime::new(Reconciler::new(pipeline), rx, launcher).run()).await?;

    assert_eq!(launched_names(&launched), vec!["a", "report"]);
    assert_eq!(report.condition.reason, RunReason::Failed);
    assert_eq!(report.skipped_tasks.len(), 1);
    assert_eq!(report.skipped_tasks[0].name, "b");
    Ok(())
}

#[tokio::test]
async fn condition_checks_run_before_the_task() -> TestResult {
    init_tracing();

    let pipeline = PipelineBuilder::new()
        .resync_interval("1h")
        .task(TaskBuilder::new("gated").condition("ready"))
        .task(TaskBuilder::new("blocked").condition("broken"))
        .build();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let launched = Arc::new(Mutex::new(Vec::new()));
    let launcher =
        FakeLauncher::new(tx.clone(), Arc::clone(&launched)).failing_condition("broken");

    let report = with_timeout(Runtime::new(Reconciler::new(pipeline), rx, launcher).run()).await?;

    let kinds: Vec<(String, bool)> = launched
        .lock()
        .unwrap()
        .iter()
        .map(|l| (l.task.clone(), matches!(l.kind, LaunchKind::TaskRun { .. })))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("gated".to_string(), false),
            ("blocked".to_string(), false),
            ("gated".to_string(), true),
        ]
    );
    assert_eq!(report.condition.reason, RunReason::Completed);
    Ok(())
}

#[tokio::test]
async fn cancel_request_stops_a_hanging_run() -> TestResult {
    init_tracing();

    let pipeline = PipelineBuilder::new()
        .resync_interval("1h")
        .task(TaskBuilder::new("slow"))
        .task(TaskBuilder::new("after").after("slow"))
        .build();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let launched = Arc::new(Mutex::new(Vec::new()));
    let launcher = FakeLauncher::new(tx.clone(), Arc::clone(&launched)).hanging("slow");
    let cancelled = launcher.cancelled();

    let handle = tokio::spawn(Runtime::new(Reconciler::new(pipeline), rx, launcher).run());

    with_timeout(async {
        while launched_names(&launched).is_empty() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    tx.send(RuntimeEvent::CancelRequested).await?;

    let report = with_timeout(handle).await??;
    assert_eq!(cancelled.lock().unwrap().clone(), vec!["pr-slow"]);
    assert_eq!(report.condition.status, ConditionStatus::False);
    assert_eq!(report.condition.reason, RunReason::Cancelled);
    assert_eq!(report.skipped_tasks[0].name, "after");
    Ok(())
}

#[tokio::test]
async fn simulated_launcher_retries_and_passes_results() -> TestResult {
    init_tracing();

    let pipeline = PipelineBuilder::new()
        .resync_interval("1h")
        .task(TaskBuilder::new("build").retries(1))
        .task(
            TaskBuilder::new("deploy")
                .when_in("$(tasks.build.results.channel)", &["stable"]),
        )
        .task(
            TaskBuilder::new("announce")
                .when_in("$(tasks.build.results.channel)", &["beta"]),
        )
        .simulate(
            "build",
            SimulateBuilder::new()
                .outcomes(&[ScriptedOutcome::Failed, ScriptedOutcome::Succeeded])
                .result("channel", "stable")
                .delay("5ms"),
        )
        .build();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let launcher = SimulatedLauncher::new(tx.clone(), &pipeline.simulate)?;

    let report = with_timeout(Runtime::new(Reconciler::new(pipeline), rx, launcher).run()).await?;

    assert_eq!(report.condition.reason, RunReason::Completed);
    let build = report.task_runs["pr-build"].status.as_ref().unwrap();
    assert_eq!(build.retries_used, 1);
    assert_eq!(build.succeeded, ConditionStatus::True);
    assert!(report.task_runs.contains_key("pr-deploy"));
    assert!(!report.task_runs.contains_key("pr-announce"));
    assert_eq!(report.skipped_tasks[0].name, "announce");
    Ok(())
}

#[tokio::test]
async fn run_timeout_cancels_simulated_tasks() -> TestResult {
    init_tracing();

    let pipeline = PipelineBuilder::new()
        .timeout("50ms")
        .resync_interval("1h")
        .task(TaskBuilder::new("sleepy"))
        .simulate("sleepy", SimulateBuilder::new().delay("10s"))
        .build();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let launcher = SimulatedLauncher::new(tx.clone(), &pipeline.simulate)?;

    let report = with_timeout(Runtime::new(Reconciler::new(pipeline), rx, launcher).run()).await?;

    assert_eq!(report.condition.status, ConditionStatus::False);
    assert_eq!(report.condition.reason, RunReason::TimedOut);
    let sleepy = report.task_runs["pr-sleepy"].status.as_ref().unwrap();
    assert_eq!(sleepy.reason.as_deref(), Some("TaskRunCancelled"));
    Ok(())
}

#[tokio::test]
async fn periodic_resync_keeps_ticking() -> TestResult {
    init_tracing();

    let pipeline = PipelineBuilder::new()
        .resync_interval("10ms")
        .task(TaskBuilder::new("a"))
        .simulate("a", SimulateBuilder::new().delay("40ms"))
        .build();

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let launcher = SimulatedLauncher::new(tx.clone(), &pipeline.simulate)?;

    let report = with_timeout(Runtime::new(Reconciler::new(pipeline), rx, launcher).run()).await?;
    assert_eq!(report.condition.reason, RunReason::Succeeded);
    assert_eq!(report.task_runs.len(), 1);
    Ok(())
}
