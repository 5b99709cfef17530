#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use duodag::config::Catalog;
use duodag::engine::{DispatchService, DispatcherStatus};
use duodag::errors::Result;
use duodag_test_utils::fake_actuator::FakeActuator;
use duodag_test_utils::init_tracing;
use duodag_test_utils::with_timeout;

pub struct Harness {
    pub service: DispatchService,
    pub fake: FakeActuator,
    pub worker: JoinHandle<Result<()>>,
}

/// Build a service around `fake` and spawn its worker.
pub fn spawn(catalog: &Catalog, fake: FakeActuator) -> Harness {
    init_tracing();
    let service = DispatchService::new(catalog, Arc::new(fake.clone()));
    let worker = service.spawn_worker();
    Harness {
        service,
        fake,
        worker,
    }
}

/// Poll the status until `pred` holds, bounded by `limit` of Tokio time.
pub async fn wait_for(
    service: &DispatchService,
    limit: Duration,
    pred: impl Fn(&DispatcherStatus) -> bool,
) -> DispatcherStatus {
    with_timeout(limit, async {
        loop {
            let status = service.status();
            if pred(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
}
