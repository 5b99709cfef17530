// tests/console_session.rs

use std::sync::Arc;

use serde_json::Value;

use duodag::console::Console;
use duodag::engine::DispatchService;
use duodag_test_utils::builders::{CatalogBuilder, TaskConfigBuilder};
use duodag_test_utils::fake_actuator::FakeActuator;
use duodag_test_utils::init_tracing;

async fn run_session(input: &str) -> (Vec<Value>, DispatchService) {
    init_tracing();
    let catalog = CatalogBuilder::new()
        .with_task("A", TaskConfigBuilder::human().build())
        .with_task("B", TaskConfigBuilder::program("prog_b").after("A").build())
        .with_task(
            "Check seal",
            TaskConfigBuilder::program("prog_h").after("A").human_only(true).build(),
        )
        .build();
    let service = DispatchService::new(&catalog, Arc::new(FakeActuator::finishing_after(1)));
    let console = Console::new(service.clone(), "unused.toml");

    let mut out = Vec::new();
    console.run(input.as_bytes(), &mut out).await.unwrap();

    let replies = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    (replies, service)
}

#[tokio::test]
async fn console_drives_assignments_and_completion() {
    let (replies, service) = run_session(
        "assign human=A; automated=B\n\
         deps automated\n\
         enqueue prog_b\n\
         done A\n\
         deps automated\n\
         done A\n\
         status\n\
         quit\n\
         enqueue never_seen\n",
    )
    .await;

    assert_eq!(replies.len(), 8, "commands after quit are not read");
    assert_eq!(replies[0]["ok"], true);

    assert_eq!(replies[1]["readiness"]["allowed"], false);
    assert_eq!(replies[1]["readiness"]["blocking"][0], "A");
    assert_eq!(replies[1]["readiness"]["message"], "waiting for: A");
    assert_eq!(replies[1]["requires"][0], "A");

    assert_eq!(replies[2]["queue_depth"], 1);

    assert_eq!(replies[3]["event"]["track"], "human");
    assert_eq!(replies[3]["event"]["name"], "A");

    assert_eq!(replies[4]["readiness"]["allowed"], true);
    assert_eq!(replies[5]["already_finished"], "A");

    let status = &replies[6]["status"];
    assert_eq!(status["state"], "IDLE");
    assert_eq!(status["queue"][0], "prog_b");
    assert_eq!(status["paused"], true);

    assert_eq!(replies[7]["bye"], true);
    assert_eq!(service.status().queue_depth, 1);
}

#[tokio::test]
async fn console_reports_bad_input_without_stopping() {
    let (replies, service) = run_session(
        "launch rockets\n\
         \n\
         assign human=A; automated=A\n\
         mode alternate\n\
         start\n",
    )
    .await;

    assert_eq!(replies.len(), 4);
    assert_eq!(replies[0]["ok"], false);
    assert!(replies[0]["error"].as_str().unwrap().contains("unknown command"));
    assert_eq!(replies[1]["ok"], false);
    assert!(replies[1]["error"].as_str().unwrap().contains("more than once"));
    assert_eq!(replies[2]["mode"], "alternate");
    assert_eq!(replies[3]["ok"], true);

    let status = service.status();
    assert!(!status.paused);
    assert_eq!(status.mode, duodag::types::ModeVariant::Alternate);
}

#[tokio::test]
async fn console_keeps_human_only_tasks_off_the_robot() {
    let (replies, service) = run_session(
        "enqueue PROG_H
         assign human=A; automated=Check seal
         assign human=Check seal, A; automated=B
         done A
         deps human
",
    )
    .await;

    assert_eq!(replies.len(), 5);
    assert_eq!(replies[0]["ok"], false);
    assert!(replies[0]["error"].as_str().unwrap().contains("restricted to the human track"));
    assert_eq!(replies[1]["ok"], false);
    assert!(replies[1]["error"].as_str().unwrap().contains("Check seal"));
    assert_eq!(replies[2]["ok"], true);

    // A was not the head; it is removed anyway.
    assert_eq!(replies[4]["readiness"]["task"], "Check seal");
    assert_eq!(replies[4]["readiness"]["allowed"], true);
    assert_eq!(replies[4]["requires"][0], "A");

    let status = service.status();
    assert_eq!(status.queue_depth, 0);
    assert!(status.message.contains("restricted to the human track"));
}
