// tests/dispatcher_scenarios.rs

mod common;

use std::time::Duration;

use tokio::time::{Instant, sleep};

use duodag::config::Catalog;
use duodag::dag::{Readiness, TrackAssignments};
use duodag::engine::DispatchPhase;
use duodag::types::{ModeVariant, RunState, Track};
use duodag_test_utils::builders::{CatalogBuilder, TaskConfigBuilder};
use duodag_test_utils::fake_actuator::{Call, FakeActuator, PollStep};

use common::{spawn, wait_for};

const LONG: Duration = Duration::from_secs(600);

/// A (human) -> B (robot).
fn human_then_robot() -> Catalog {
    CatalogBuilder::new()
        .with_task("A", TaskConfigBuilder::human().build())
        .with_task("B", TaskConfigBuilder::program("prog_b").after("A").build())
        .build()
}

fn two_robot_tasks() -> Catalog {
    CatalogBuilder::new()
        .with_task("C", TaskConfigBuilder::program("prog_c").duration_secs(5).build())
        .with_task("D", TaskConfigBuilder::program("prog_d").duration_secs(5).build())
        .build()
}

#[tokio::test(start_paused = true)]
async fn robot_task_waits_for_human_prerequisite() {
    let h = spawn(&human_then_robot(), FakeActuator::finishing_after(2));
    h.service
        .set_assignments(TrackAssignments {
            human: vec!["A".into()],
            automated: vec!["B".into()],
        })
        .unwrap();

    let robot = h.service.dependency_status(Track::Automated);
    assert!(!robot.allowed);
    assert_eq!(robot.blocking, vec!["A".to_string()]);
    assert!(h.service.dependency_status(Track::Human).allowed);

    h.service.enqueue("prog_b").unwrap();
    h.service.start_processing();

    let status = wait_for(&h.service, LONG, |s| s.state == DispatchPhase::DepWait).await;
    assert_eq!(status.current_task.as_deref(), Some("B"));
    assert_eq!(status.message, "waiting for: A");

    // Dependency waits have no timeout.
    sleep(Duration::from_secs(300)).await;
    assert!(h.fake.started_programs().is_empty());
    assert_eq!(h.service.status().state, DispatchPhase::DepWait);

    let event = h.service.complete_human_task("A").unwrap();
    assert_eq!(event.track, Track::Human);

    wait_for(&h.service, LONG, |s| s.executed_count == 1).await;
    assert_eq!(h.fake.started_programs(), vec!["prog_b"]);
    assert_eq!(h.service.finished_tasks(), vec!["A".to_string(), "B".to_string()]);
    assert_eq!(h.service.dependency_status(Track::Automated), Readiness::no_task());
    assert_eq!(h.service.dependency_status(Track::Human), Readiness::no_task());
}

#[tokio::test(start_paused = true)]
async fn failed_start_is_retried_after_the_rest_of_the_queue() {
    let h = spawn(&two_robot_tasks(), FakeActuator::finishing_after(1));
    h.fake.fail_starts("prog_c", 1);

    h.service.enqueue("prog_c").unwrap();
    h.service.enqueue("prog_d").unwrap();
    h.service.start_processing();

    let status = wait_for(&h.service, LONG, |s| s.all_completed).await;

    assert_eq!(h.fake.started_programs(), vec!["prog_c", "prog_d", "prog_c"]);
    assert_eq!(status.executed_count, 2);
    let history: Vec<_> = h.service.history().into_iter().map(|r| r.program).collect();
    assert_eq!(history, vec!["prog_d", "prog_c"]);
    let finished = h.service.finished_tasks();
    assert_eq!(finished.iter().filter(|n| *n == "C").count(), 1);
    assert!(status.abandoned.is_empty());
}

#[tokio::test(start_paused = true)]
async fn permanently_failing_task_is_abandoned_after_retry_cap() {
    let catalog = CatalogBuilder::new()
        .max_retries(2)
        .with_task("X", TaskConfigBuilder::program("prog_x").build())
        .build();
    let h = spawn(&catalog, FakeActuator::finishing_after(1));
    h.fake.fail_starts("prog_x", 100);

    h.service.enqueue("prog_x").unwrap();
    h.service.start_processing();

    let status = wait_for(&h.service, LONG, |s| !s.abandoned.is_empty()).await;

    assert_eq!(h.fake.started_programs().len(), 3);
    assert_eq!(status.abandoned, vec!["prog_x".to_string()]);
    assert_eq!(status.queue_depth, 0);
    assert_eq!(status.executed_count, 0);
    assert!(status.message.contains("abandoned"));
    assert!(h.service.finished_tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unreadable_state_right_after_start_counts_as_failed_start() {
    let catalog = CatalogBuilder::new()
        .with_task("E", TaskConfigBuilder::program("prog_e").build())
        .build();
    let h = spawn(&catalog, FakeActuator::finishing_after(1));
    h.fake.script_polls([PollStep::Error]);

    h.service.enqueue("prog_e").unwrap();
    h.service.start_processing();

    let status = wait_for(&h.service, LONG, |s| s.executed_count == 1).await;
    assert_eq!(h.fake.started_programs(), vec!["prog_e", "prog_e"]);
    assert!(status.abandoned.is_empty());
}

#[tokio::test(start_paused = true)]
async fn exceeding_max_wait_counts_as_completed() {
    // 5s estimate + 10s buffer.
    let catalog = CatalogBuilder::new()
        .with_task("E", TaskConfigBuilder::program("prog_e").duration_secs(5).build())
        .build();
    let h = spawn(&catalog, FakeActuator::never_finishing());

    let started = Instant::now();
    h.service.enqueue("prog_e").unwrap();
    h.service.start_processing();

    let status = wait_for(&h.service, LONG, |s| s.executed_count == 1).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(15), "finished too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(17), "finished too late: {elapsed:?}");
    assert!(status.all_completed);
    assert_eq!(h.service.finished_tasks(), vec!["E".to_string()]);
    assert_eq!(h.fake.count(&Call::ForceStop), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_run_state_counts_as_completed() {
    let catalog = CatalogBuilder::new()
        .with_task("E", TaskConfigBuilder::program("prog_e").duration_secs(300).build())
        .build();
    let h = spawn(&catalog, FakeActuator::never_finishing());
    h.fake.script_polls([
        PollStep::State(RunState::Running),
        PollStep::State(RunState::Running),
        PollStep::State(RunState::Unknown),
    ]);

    let started = Instant::now();
    h.service.enqueue("prog_e").unwrap();
    h.service.start_processing();

    wait_for(&h.service, LONG, |s| s.executed_count == 1).await;
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn pause_extends_deadline_and_settles_before_polling() {
    // 20s estimate + 10s buffer.
    let catalog = CatalogBuilder::new()
        .with_task("P", TaskConfigBuilder::program("prog_p").duration_secs(20).build())
        .build();
    let h = spawn(&catalog, FakeActuator::never_finishing());
    let settle = catalog.dispatcher.settle_delay();

    h.service.enqueue("prog_p").unwrap();
    h.service.start_processing();
    wait_for(&h.service, LONG, |s| s.state == DispatchPhase::Monitoring).await;

    h.service.pause_processing();
    let paused = wait_for(&h.service, LONG, |s| s.state == DispatchPhase::Paused).await;
    assert!(paused.paused);
    assert_eq!(paused.current_program.as_deref(), Some("prog_p"));

    sleep(Duration::from_secs(10)).await;
    let before = h.service.status().remaining_wait_ms.unwrap();

    h.service.resume_processing();
    sleep(Duration::from_millis(100)).await;
    let after = h.service.status();
    assert_eq!(after.state, DispatchPhase::Monitoring);
    let extension_ms = after.remaining_wait_ms.unwrap() + 100 - before;
    assert!(extension_ms >= 10_000, "deadline only extended by {extension_ms}ms");

    let calls = h.fake.timed_calls();
    let resumed_at = calls
        .iter()
        .find(|(_, c)| *c == Call::Resume)
        .map(|(at, _)| *at)
        .unwrap();
    assert_eq!(h.fake.count(&Call::Pause), 1);

    sleep(Duration::from_secs(2)).await;
    let next_poll = h
        .fake
        .poll_times()
        .into_iter()
        .find(|at| *at >= resumed_at)
        .unwrap();
    assert!(next_poll - resumed_at >= settle);

    // Still in flight: the pause did not cause a spurious timeout.
    assert_eq!(h.service.status().executed_count, 0);
}

#[tokio::test(start_paused = true)]
async fn paused_dispatcher_does_not_pick_up_new_work() {
    let h = spawn(&two_robot_tasks(), FakeActuator::finishing_after(1));

    h.service.enqueue("prog_c").unwrap();
    sleep(Duration::from_secs(5)).await;
    assert!(h.fake.started_programs().is_empty());

    h.service.start_processing();
    wait_for(&h.service, LONG, |s| s.executed_count == 1).await;

    h.service.pause_processing();
    h.service.enqueue("prog_d").unwrap();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.fake.started_programs(), vec!["prog_c"]);
    assert_eq!(h.service.status().queue_depth, 1);

    h.service.resume_processing();
    wait_for(&h.service, LONG, |s| s.executed_count == 2).await;
}

#[tokio::test(start_paused = true)]
async fn reset_mid_execution_clears_everything() {
    let catalog = CatalogBuilder::new()
        .with_task("A", TaskConfigBuilder::human().build())
        .with_task("C", TaskConfigBuilder::program("prog_c").duration_secs(100).build())
        .with_task("D", TaskConfigBuilder::program("prog_d").build())
        .build();
    let h = spawn(&catalog, FakeActuator::never_finishing());

    h.service
        .set_assignments(TrackAssignments {
            human: vec!["A".into()],
            automated: vec!["C".into(), "D".into()],
        })
        .unwrap();
    h.service.complete_human_task("A");
    h.service.set_mode(ModeVariant::Alternate);
    h.service.enqueue("prog_c").unwrap();
    h.service.enqueue("prog_d").unwrap();
    h.service.start_processing();
    wait_for(&h.service, LONG, |s| s.state == DispatchPhase::Monitoring).await;

    h.service.reset().await;

    let status = h.service.status();
    assert_eq!(status.state, DispatchPhase::Idle);
    assert_eq!(status.current_program, None);
    assert_eq!(status.queue_depth, 0);
    assert_eq!(status.executed_count, 0);
    assert!(status.paused);
    assert_eq!(status.mode, ModeVariant::Primary);
    assert!(h.service.finished_tasks().is_empty());
    assert_eq!(h.service.dependency_status(Track::Human), Readiness::no_task());
    assert_eq!(h.service.dependency_status(Track::Automated), Readiness::no_task());
    assert_eq!(h.fake.count(&Call::ForceStop), 1);

    // The dropped task neither completes nor trips the watchdog later.
    sleep(Duration::from_secs(200)).await;
    let status = h.service.status();
    assert_eq!(status.executed_count, 0);
    assert!(status.abandoned.is_empty());
    assert_eq!(h.fake.started_programs(), vec!["prog_c"]);

    // The worker is still alive.
    h.service.enqueue("prog_d").unwrap();
    h.service.start_processing();
    wait_for(&h.service, LONG, |s| s.executed_count == 1).await;
}

#[tokio::test(start_paused = true)]
async fn reset_during_a_slow_start_leaves_the_actuator_stopped() {
    let catalog = CatalogBuilder::new()
        .with_task("C", TaskConfigBuilder::program("prog_c").duration_secs(100).build())
        .build();
    let fake = FakeActuator::never_finishing();
    fake.slow_start(Duration::from_secs(2));
    let h = spawn(&catalog, fake);

    h.service.enqueue("prog_c").unwrap();
    h.service.start_processing();
    wait_for(&h.service, LONG, |s| s.state == DispatchPhase::Executing).await;
    sleep(Duration::from_millis(500)).await;

    h.service.reset().await;
    assert!(!h.fake.is_running(), "nothing is playing yet when reset stops the actuator");

    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.service.status().state, DispatchPhase::Idle);
    assert!(!h.fake.is_running());
    assert_eq!(h.fake.count(&Call::ForceStop), 2);
    assert_eq!(h.fake.started_programs(), vec!["prog_c"]);
}

#[tokio::test(start_paused = true)]
async fn human_only_task_never_reaches_the_robot() {
    let catalog = CatalogBuilder::new()
        .with_task("A", TaskConfigBuilder::human().build())
        .with_task(
            "H",
            TaskConfigBuilder::program("prog_h").after("A").human_only(true).build(),
        )
        .build();
    let h = spawn(&catalog, FakeActuator::finishing_after(1));

    assert!(
        h.service
            .set_assignments(TrackAssignments {
                human: vec!["A".into()],
                automated: vec!["H".into()],
            })
            .is_err()
    );
    assert!(h.service.enqueue("prog_h").is_err());
    h.service.start_processing();
    sleep(Duration::from_secs(30)).await;

    assert!(h.fake.started_programs().is_empty());
    assert!(h.service.finished_tasks().is_empty());
    assert_eq!(h.service.dependency_status(Track::Automated), Readiness::no_task());
}

#[tokio::test(start_paused = true)]
async fn mode_variant_reaches_the_actuator() {
    let h = spawn(&two_robot_tasks(), FakeActuator::finishing_after(1));
    h.service.set_mode(ModeVariant::Alternate);
    h.service.enqueue("prog_c").unwrap();
    h.service.start_processing();

    wait_for(&h.service, LONG, |s| s.executed_count == 1).await;
    assert_eq!(
        h.fake.calls()[0],
        Call::Start {
            program: "prog_c".into(),
            mode: ModeVariant::Alternate,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn completions_are_broadcast_for_both_tracks() {
    let h = spawn(&human_then_robot(), FakeActuator::finishing_after(1));
    let mut events = h.service.subscribe();

    h.service.enqueue("prog_b").unwrap();
    h.service.start_processing();
    h.service.complete_human_task("A");

    let first = events.recv().await.unwrap();
    assert_eq!((first.track, first.name.as_str()), (Track::Human, "A"));

    let second = events.recv().await.unwrap();
    assert_eq!(second.track, Track::Automated);
    assert_eq!(second.task_id, "prog_b");
    assert_eq!(second.name, "B");

    // Completing an already finished task publishes nothing.
    assert!(h.service.complete_human_task("A").is_none());
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_worker() {
    let h = spawn(&two_robot_tasks(), FakeActuator::finishing_after(1));
    h.service.shutdown();
    h.worker.await.unwrap().unwrap();
}
