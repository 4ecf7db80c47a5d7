// tests/run_facts.rs

use std::time::Duration;

use rundag::state::{PipelineRunMeta, RunReason, SkipReason, TaskState};
use rundag::types::{ConditionStatus, ObservedStatus};
use rundag_test_utils::builders::{ObservedBuilder, PipelineBuilder, TaskBuilder};

fn names<'a>(tasks: impl IntoIterator<Item = &'a rundag::state::ResolvedTask>) -> Vec<&'a str> {
    tasks.into_iter().map(|t| t.name()).collect()
}

fn meta() -> PipelineRunMeta {
    PipelineRunMeta::new("pr", None)
}

fn chain() -> PipelineBuilder {
    PipelineBuilder::new()
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b").after("a"))
        .task(TaskBuilder::new("c").after("b"))
}

#[test]
fn chain_is_released_one_frontier_at_a_time() {
    let facts = chain().facts();
    assert_eq!(names(facts.dag_execution_queue().unwrap()), vec!["a"]);

    let facts = chain().observed(ObservedBuilder::running("a")).facts();
    assert!(facts.dag_execution_queue().unwrap().is_empty());

    let facts = chain().observed(ObservedBuilder::succeeded("a")).facts();
    assert_eq!(names(facts.dag_execution_queue().unwrap()), vec!["b"]);

    let facts = chain()
        .observed(ObservedBuilder::succeeded("a"))
        .observed(ObservedBuilder::succeeded("b"))
        .facts();
    assert_eq!(names(facts.dag_execution_queue().unwrap()), vec!["c"]);

    let facts = chain()
        .observed(ObservedBuilder::succeeded("a"))
        .observed(ObservedBuilder::succeeded("b"))
        .observed(ObservedBuilder::succeeded("c"))
        .facts();
    assert!(facts.dag_execution_queue().unwrap().is_empty());

    let condition = facts.pipeline_condition_status(&meta());
    assert_eq!(condition.status, ConditionStatus::True);
    assert_eq!(condition.reason, RunReason::Succeeded);
    assert_eq!(
        condition.message,
        "Tasks Completed: 3 (Failed: 0, Cancelled 0), Skipped: 0"
    );
}

#[test]
fn execution_queue_is_idempotent() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b"))
        .task(TaskBuilder::new("c").after("a"))
        .observed(ObservedBuilder::succeeded("a"))
        .facts();

    let first = names(facts.dag_execution_queue().unwrap());
    let second = names(facts.dag_execution_queue().unwrap());
    assert_eq!(first, vec!["b", "c"]);
    assert_eq!(first, second);
    assert_eq!(
        facts.pipeline_condition_status(&meta()),
        facts.pipeline_condition_status(&meta())
    );
}

fn independent_with_finally() -> PipelineBuilder {
    PipelineBuilder::new()
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b"))
        .finally(TaskBuilder::new("f"))
}

#[test]
fn failure_stops_the_dag_and_runs_finally_tasks() {
    // a failed while b is still running.
    let facts = independent_with_finally()
        .observed(ObservedBuilder::failed("a"))
        .observed(ObservedBuilder::running("b"))
        .facts();
    assert!(facts.is_stopping());
    assert!(facts.dag_execution_queue().unwrap().is_empty());
    assert!(!facts.check_dag_tasks_done());
    assert!(facts.final_tasks().is_empty());

    let condition = facts.pipeline_condition_status(&meta());
    assert_eq!(condition.status, ConditionStatus::Unknown);
    assert_eq!(condition.reason, RunReason::Running);

    // b succeeded: main DAG done, finally released.
    let facts = independent_with_finally()
        .observed(ObservedBuilder::failed("a"))
        .observed(ObservedBuilder::succeeded("b"))
        .facts();
    assert!(facts.check_dag_tasks_done());
    assert_eq!(names(facts.final_tasks()), vec!["f"]);
    assert_eq!(
        facts.pipeline_condition_status(&meta()).message,
        "Tasks Completed: 2 (Failed: 1, Cancelled 0), Incomplete: 1, Skipped: 0"
    );

    // f succeeded: run failed.
    let facts = independent_with_finally()
        .observed(ObservedBuilder::failed("a"))
        .observed(ObservedBuilder::succeeded("b"))
        .observed(ObservedBuilder::succeeded("f"))
        .facts();
    assert!(facts.final_tasks().is_empty());
    let condition = facts.pipeline_condition_status(&meta());
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, RunReason::Failed);
}

#[test]
fn stopping_skips_unstarted_main_tasks_but_not_finally() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b").after("a"))
        .task(TaskBuilder::new("c"))
        .finally(TaskBuilder::new("f"))
        .observed(ObservedBuilder::failed("a"))
        .facts();

    let b = facts.state.get("b").unwrap();
    let c = facts.state.get("c").unwrap();
    let f = facts.state.get("f").unwrap();
    assert_eq!(facts.skip_reason(b), Some(SkipReason::RunStopping));
    assert_eq!(facts.skip_reason(c), Some(SkipReason::RunStopping));
    assert_eq!(facts.skip_reason(f), None);
    assert!(facts.check_dag_tasks_done());
    assert_eq!(names(facts.final_tasks()), vec!["f"]);
}

#[test]
fn retryable_failure_is_relaunched_and_does_not_stop_the_run() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a").retries(2))
        .task(TaskBuilder::new("b"))
        .observed(ObservedBuilder::failed("a").retries_used(1))
        .facts();

    assert!(!facts.is_stopping());
    assert_eq!(names(facts.dag_execution_queue().unwrap()), vec!["a", "b"]);

    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a").retries(2))
        .observed(ObservedBuilder::failed("a").retries_used(2))
        .facts();
    assert!(facts.is_stopping());
    assert!(facts.dag_execution_queue().unwrap().is_empty());
}

#[test]
fn cancelled_task_puts_the_run_into_stopping() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b"))
        .observed(ObservedBuilder::cancelled("a"))
        .observed(ObservedBuilder::running("b"))
        .facts();

    assert!(facts.is_stopping());
    let condition = facts.pipeline_condition_status(&meta());
    assert_eq!(condition.status, ConditionStatus::Unknown);
    assert_eq!(condition.reason, RunReason::Stopping);
    assert_eq!(
        condition.message,
        "Tasks Completed: 1 (Failed: 0, Cancelled 1), Incomplete: 1, Skipped: 0"
    );
}

#[test]
fn failure_with_finally_done_reports_stopping() {
    let facts = independent_with_finally()
        .observed(ObservedBuilder::failed("a"))
        .observed(ObservedBuilder::running("b"))
        .observed(ObservedBuilder::succeeded("f"))
        .facts();

    assert_eq!(
        facts.pipeline_condition_status(&meta()).reason,
        RunReason::Stopping
    );
}

#[test]
fn failed_takes_precedence_over_cancelled() {
    for order in [["a", "b"], ["b", "a"]] {
        let mut builder = PipelineBuilder::new();
        for name in order {
            builder = builder.task(TaskBuilder::new(name));
        }
        let facts = builder
            .observed(ObservedBuilder::failed("a"))
            .observed(ObservedBuilder::cancelled("b"))
            .facts();

        let condition = facts.pipeline_condition_status(&meta());
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, RunReason::Failed);
    }
}

#[test]
fn one_failure_among_successes_reports_failed() {
    for failing in ["a", "b", "c"] {
        let mut builder = PipelineBuilder::new()
            .task(TaskBuilder::new("a"))
            .task(TaskBuilder::new("b"))
            .task(TaskBuilder::new("c"));
        for name in ["a", "b", "c"] {
            builder = builder.observed(if name == failing {
                ObservedBuilder::failed(name)
            } else {
                ObservedBuilder::succeeded(name)
            });
        }

        let condition = builder.facts().pipeline_condition_status(&meta());
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, RunReason::Failed);
    }
}

#[test]
fn all_cancelled_reports_cancelled() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a"))
        .observed(ObservedBuilder::failed("a").cancel_requested())
        .facts();

    let condition = facts.pipeline_condition_status(&meta());
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, RunReason::Cancelled);
}

#[test]
fn false_guard_skips_task_and_run_completes() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a").when_in("no", &["yes"]))
        .task(TaskBuilder::new("b"))
        .observed(ObservedBuilder::succeeded("b"))
        .facts();

    let a = facts.state.get("a").unwrap();
    assert_eq!(facts.skip_reason(a), Some(SkipReason::WhenExpressionsFalse));
    assert_eq!(facts.task_state(a), TaskState::Skipped);
    assert!(a.task_run.is_none());
    assert!(facts.dag_execution_queue().unwrap().is_empty());

    let condition = facts.pipeline_condition_status(&meta());
    assert_eq!(condition.status, ConditionStatus::True);
    assert_eq!(condition.reason, RunReason::Completed);
    assert_eq!(
        condition.message,
        "Tasks Completed: 1 (Failed: 0, Cancelled 0), Skipped: 1"
    );
    assert_eq!(
        facts
            .skipped_tasks()
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>(),
        vec!["a"]
    );
}

#[test]
fn skip_propagates_down_the_graph() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a").when_notin("x", &["x"]))
        .task(TaskBuilder::new("b").after("a"))
        .task(TaskBuilder::new("c").after("b"))
        .task(TaskBuilder::new("d"))
        .facts();

    let reasons: Vec<Option<SkipReason>> = ["a", "b", "c", "d"]
        .iter()
        .map(|n| facts.skip_reason(facts.state.get(n).unwrap()))
        .collect();
    assert_eq!(
        reasons,
        vec![
            Some(SkipReason::WhenExpressionsFalse),
            Some(SkipReason::ParentSkipped),
            Some(SkipReason::ParentSkipped),
            None,
        ]
    );
    assert_eq!(names(facts.dag_execution_queue().unwrap()), vec!["d"]);
}

#[test]
fn guard_is_not_evaluated_before_parents_are_done() {
    let pipeline = || {
        PipelineBuilder::new()
            .task(TaskBuilder::new("a"))
            .task(TaskBuilder::new("b").after("a").when_in("no", &["yes"]))
    };

    let facts = pipeline().facts();
    assert_eq!(facts.skip_reason(facts.state.get("b").unwrap()), None);
    assert_eq!(names(facts.dag_execution_queue().unwrap()), vec!["a"]);
    assert_eq!(facts.pipeline_condition_status(&meta()).reason, RunReason::Running);

    let facts = pipeline().observed(ObservedBuilder::running("a")).facts();
    assert!(!facts.is_skipped(facts.state.get("b").unwrap()));
    assert!(facts.dag_execution_queue().unwrap().is_empty());
    assert!(facts.skipped_tasks().is_empty());

    let facts = pipeline().observed(ObservedBuilder::succeeded("a")).facts();
    assert_eq!(
        facts.skip_reason(facts.state.get("b").unwrap()),
        Some(SkipReason::WhenExpressionsFalse)
    );
    assert!(facts.dag_execution_queue().unwrap().is_empty());
    assert_eq!(facts.pipeline_condition_status(&meta()).reason, RunReason::Completed);
}

/// Every task depends on both tasks of the previous layer.
fn layered(layers: usize) -> PipelineBuilder {
    let mut builder = PipelineBuilder::new();
    for layer in 0..layers {
        for side in ["l", "r"] {
            let mut task = TaskBuilder::new(&format!("{side}{layer}"));
            if layer > 0 {
                task = task
                    .after(&format!("l{}", layer - 1))
                    .after(&format!("r{}", layer - 1));
            }
            builder = builder.task(task);
        }
    }
    builder
}

#[test]
fn layered_graph_queries_stay_fast() {
    let facts = layered(30).facts();
    assert_eq!(names(facts.dag_execution_queue().unwrap()), vec!["l0", "r0"]);
    assert!(facts.skipped_tasks().is_empty());
    assert!(!facts.check_dag_tasks_done());

    // A skipped root skips everything reachable from it.
    let facts = layered(30)
        .task(TaskBuilder::new("gate").when_in("no", &["yes"]))
        .observed(ObservedBuilder::succeeded("l0"))
        .observed(ObservedBuilder::succeeded("r0"))
        .facts();
    assert_eq!(names(facts.dag_execution_queue().unwrap()), vec!["l1", "r1"]);
    assert_eq!(facts.skipped_tasks().len(), 1);
    assert_eq!(facts.pipeline_condition_status(&meta()).reason, RunReason::Running);
}

#[test]
fn guard_on_result_waits_for_the_producer() {
    let pipeline = || {
        PipelineBuilder::new()
            .task(TaskBuilder::new("probe"))
            .task(TaskBuilder::new("deploy").when_in("$(tasks.probe.results.ready)", &["true"]))
    };

    // Producer still running: guard is not evaluable, deploy is not skipped
    // and not schedulable yet (implicit dependency).
    let facts = pipeline().observed(ObservedBuilder::running("probe")).facts();
    let deploy = facts.state.get("deploy").unwrap();
    assert!(!facts.is_skipped(deploy));
    assert!(facts.dag_execution_queue().unwrap().is_empty());

    let facts = pipeline()
        .observed(ObservedBuilder::succeeded("probe").result("ready", "true"))
        .facts();
    assert_eq!(names(facts.dag_execution_queue().unwrap()), vec!["deploy"]);

    let facts = pipeline()
        .observed(ObservedBuilder::succeeded("probe").result("ready", "false"))
        .facts();
    assert!(facts.is_skipped(facts.state.get("deploy").unwrap()));
    assert!(facts.dag_execution_queue().unwrap().is_empty());
}

#[test]
fn missing_result_of_successful_task_is_empty() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("probe"))
        .task(TaskBuilder::new("empty").when_in("$(tasks.probe.results.out)", &[""]))
        .task(TaskBuilder::new("full").when_notin("$(tasks.probe.results.out)", &[""]))
        .observed(ObservedBuilder::succeeded("probe"))
        .facts();

    assert!(!facts.is_skipped(facts.state.get("empty").unwrap()));
    assert!(facts.is_skipped(facts.state.get("full").unwrap()));
}

#[test]
fn started_tasks_are_never_skipped() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a"))
        .task(TaskBuilder::new("b"))
        .observed(ObservedBuilder::failed("a"))
        .observed(ObservedBuilder::running("b"))
        .facts();

    let b = facts.state.get("b").unwrap();
    assert!(facts.is_stopping());
    assert!(!facts.is_skipped(b));
    assert_eq!(facts.task_state(b), TaskState::Running);
}

#[test]
fn failed_condition_check_skips_task_and_its_dependents() {
    let facts = PipelineBuilder::new()
        .task(TaskBuilder::new("a").condition("ready"))
        .task(TaskBuilder::new("b").after("a"))
        .observed(ObservedBuilder::new("a").check("ready", ObservedStatus::Failed))
        .facts();

    let a = facts.state.get("a").unwrap();
    let b = facts.state.get("b").unwrap();
    assert!(a.is_condition_check_failed());
    assert_eq!(facts.skip_reason(a), Some(SkipReason::ConditionCheckFailed));
    assert_eq!(facts.skip_reason(b), Some(SkipReason::ParentSkipped));
    assert!(facts.dag_execution_queue().unwrap().is_empty());

    let condition = facts.pipeline_condition_status(&meta());
    assert_eq!(condition.reason, RunReason::Completed);
}

#[test]
fn finally_tasks_wait_for_the_main_dag() {
    let pipeline = || {
        PipelineBuilder::new()
            .task(TaskBuilder::new("a"))
            .finally(TaskBuilder::new("f1"))
            .finally(TaskBuilder::new("f2").retries(1))
    };

    assert!(pipeline().facts().final_tasks().is_empty());

    let facts = pipeline()
        .observed(ObservedBuilder::succeeded("a"))
        .observed(ObservedBuilder::succeeded("f1"))
        .observed(ObservedBuilder::failed("f2"))
        .facts();
    assert_eq!(names(facts.final_tasks()), vec!["f2"]);
    assert!(!facts.check_final_tasks_done());
}

#[test]
fn timeout_takes_precedence() {
    let facts = chain()
        .observed(ObservedBuilder::succeeded("a"))
        .observed(ObservedBuilder::running("b"))
        .facts();

    let mut meta = PipelineRunMeta::new("pr", Some(Duration::from_secs(1)));
    meta.elapsed = Duration::from_secs(1);
    assert_eq!(
        facts.pipeline_condition_status(&meta).reason,
        RunReason::Running
    );

    meta.elapsed = Duration::from_millis(1001);
    let condition = facts.pipeline_condition_status(&meta);
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, RunReason::TimedOut);
    assert_eq!(
        condition.message,
        r#"PipelineRun "pr" failed to finish within "1s""#
    );

    let mut unlimited = PipelineRunMeta::new("pr", Some(Duration::ZERO));
    unlimited.elapsed = Duration::from_secs(3600);
    assert!(!unlimited.is_timed_out());
}
