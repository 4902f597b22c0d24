//! Interactive task lifecycle, driven through `TaskService` with the scripted engine
//!
//! `cargo test -p agentpod-task --test lifecycle_test`

use agentpod_foundation::{Error, Resource};
use agentpod_task::{
    RunTaskRequest, ScriptedEngine, ScriptedStep, TaskId, TaskService, TaskServiceConfig,
    TaskStatus,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

fn service(engine: ScriptedEngine) -> TaskService {
    let config = TaskServiceConfig {
        max_concurrent: 64,
        ..TaskServiceConfig::default()
    };
    TaskService::new(Arc::new(engine), config)
}

fn slow_engine() -> ScriptedEngine {
    ScriptedEngine::new()
        .step(ScriptedStep::visit("https://example.com").delay(Duration::from_millis(40)))
        .step(ScriptedStep::visit("https://example.com/a").delay(Duration::from_millis(40)))
        .step(ScriptedStep::visit("https://example.com/b").delay(Duration::from_millis(40)))
}

async fn wait_for(service: &TaskService, id: &TaskId, status: TaskStatus) {
    let key = id.to_string();
    for _ in 0..200 {
        if service.status(&key).ok() == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} never reached {}", id, status);
}

#[tokio::test]
async fn test_create_then_immediately_stop() {
    let service = service(slow_engine());
    let id = service
        .create(RunTaskRequest::new("open example.com"))
        .await
        .unwrap();

    service.stop(&id.to_string()).unwrap();

    let record = service.get(&id.to_string()).unwrap();
    assert_eq!(record.status, TaskStatus::Stopped);
    assert!(record.finished_at.is_some());
    assert!(record.output.is_none());

    // the unit exits without overwriting the outcome
    tokio::time::sleep(Duration::from_millis(200)).await;
    let record = service.get(&id.to_string()).unwrap();
    assert_eq!(record.status, TaskStatus::Stopped);
    assert!(record.output.is_none());
    assert_eq!(service.in_flight(), 0);
}

#[tokio::test]
async fn test_pause_resume_then_finish() {
    let service = service(slow_engine());
    let id = service.create(RunTaskRequest::new("browse")).await.unwrap();
    let key = id.to_string();

    service.pause(&key).unwrap();
    assert_eq!(service.status(&key).unwrap(), TaskStatus::Paused);

    // pause only from RUNNING, resume only from PAUSED
    assert!(matches!(service.pause(&key), Err(Error::InvalidTransition { .. })));
    tokio::time::sleep(Duration::from_millis(150)).await;
    let held = service.get(&key).unwrap();
    assert_eq!(held.status, TaskStatus::Paused);
    assert!(held.steps.len() <= 1);

    service.resume(&key).unwrap();
    assert!(matches!(service.resume(&key), Err(Error::InvalidTransition { .. })));

    wait_for(&service, &id, TaskStatus::Finished).await;
    let record = service.get(&key).unwrap();
    assert_eq!(record.steps.len(), 3);
    assert_eq!(record.output.as_deref(), Some("Completed: browse"));
}

#[tokio::test]
async fn test_terminal_records_are_frozen() {
    let service = service(ScriptedEngine::echo());
    let id = service.create(RunTaskRequest::new("quick")).await.unwrap();
    wait_for(&service, &id, TaskStatus::Finished).await;
    let key = id.to_string();
    let before = service.get(&key).unwrap();

    for result in [service.pause(&key), service.resume(&key), service.stop(&key)] {
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
    }

    let after = service.get(&key).unwrap();
    assert_eq!(after.status, TaskStatus::Finished);
    assert_eq!(after.finished_at, before.finished_at);
    assert_eq!(after.steps, before.steps);
}

#[tokio::test]
async fn test_engine_fault_becomes_failed() {
    let engine = ScriptedEngine::new()
        .step(ScriptedStep::visit("https://example.com"))
        .step(ScriptedStep::visit("https://example.com/checkout").fail("button #pay not found"));
    let service = service(engine);

    let id = service.create(RunTaskRequest::new("buy it")).await.unwrap();
    wait_for(&service, &id, TaskStatus::Failed).await;

    let record = service.get(&id.to_string()).unwrap();
    assert_eq!(record.output.as_deref(), Some("button #pay not found"));
    assert!(record.finished_at.is_some());
}

/// Spawn `callers` creates on worker threads, all released at once
async fn create_simultaneously(service: &TaskService, callers: usize) -> Vec<Result<TaskId, Error>> {
    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|i| {
            let service = service.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                service.create(RunTaskRequest::new(format!("task {}", i))).await
            })
        })
        .collect();

    futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_creates_get_distinct_ids() {
    let service = service(ScriptedEngine::echo());

    let ids: Vec<TaskId> = create_simultaneously(&service, 16)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    let distinct: HashSet<_> = ids.iter().collect();
    assert_eq!(distinct.len(), 16);
    assert_eq!(service.store().len(), 16);
    for id in &ids {
        assert!(service.get(&id.to_string()).is_ok());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrency_limit_holds_under_simultaneous_creates() {
    let engine = ScriptedEngine::new()
        .step(ScriptedStep::visit("https://slow.example").delay(Duration::from_secs(30)));
    let config = TaskServiceConfig {
        max_concurrent: 1,
        ..TaskServiceConfig::default()
    };
    let service = TaskService::new(Arc::new(engine), config);

    for _ in 0..50 {
        let results = create_simultaneously(&service, 8).await;
        let accepted: Vec<TaskId> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();

        assert_eq!(accepted.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| matches!(err, Error::InvalidInput(_))));
        assert_eq!(service.store().len(), 1);

        let key = accepted[0].to_string();
        service.stop(&key).unwrap();
        wait_for(&service, &accepted[0], TaskStatus::Stopped).await;
        // deleting clears the unit registration as well
        service.delete(&key).unwrap();
    }
}

#[tokio::test]
async fn test_listing_is_newest_first() {
    let service = service(ScriptedEngine::echo());
    let mut ids = Vec::new();
    for i in 0..7 {
        ids.push(service.create(RunTaskRequest::new(format!("task {}", i))).await.unwrap());
    }

    let first = service.list(1, 5);
    assert_eq!(first.total_count, 7);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.tasks.len(), 5);
    assert_eq!(first.tasks[0].id, ids[6]);

    let second = service.list(2, 5);
    assert_eq!(second.tasks.len(), 2);
    assert_eq!(second.tasks[1].id, ids[0]);
}

#[tokio::test]
async fn test_empty_listing_page() {
    let service = service(ScriptedEngine::echo());
    let page = service.list(2, 5);

    assert!(page.tasks.is_empty());
    assert_eq!(page.total_count, 0);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.page, 2);
    assert_eq!(page.limit, 5);
}

#[tokio::test]
async fn test_output_file_not_found_is_distinct() {
    let service = service(ScriptedEngine::echo().output_file("log.txt"));
    let id = service.create(RunTaskRequest::new("export")).await.unwrap();
    wait_for(&service, &id, TaskStatus::Finished).await;

    let err = service.output_file(&id.to_string(), "report.csv").unwrap_err();
    assert!(err.is_not_found(Resource::OutputFile));
    assert!(!err.is_not_found(Resource::Task));

    let err = service
        .output_file(&TaskId::new().to_string(), "log.txt")
        .unwrap_err();
    assert!(err.is_not_found(Resource::Task));
}

#[tokio::test]
async fn test_artifacts_and_live_url() {
    let engine = ScriptedEngine::new()
        .step(ScriptedStep::visit("https://example.com").screenshot("shots/1.png"))
        .step(ScriptedStep::visit("https://example.com/b").screenshot("shots/2.png"))
        .recording("recordings/session.mp4")
        .live_url("https://live.example/session");
    let service = service(engine);

    let id = service.create(RunTaskRequest::new("record")).await.unwrap();
    wait_for(&service, &id, TaskStatus::Finished).await;
    let key = id.to_string();

    assert_eq!(service.screenshots(&key).unwrap(), vec!["shots/1.png", "shots/2.png"]);
    assert_eq!(service.media(&key).unwrap(), vec!["recordings/session.mp4"]);
    assert_eq!(service.gif(&key).unwrap(), None);
    assert_eq!(
        service.get(&key).unwrap().live_url.as_deref(),
        Some("https://live.example/session")
    );
}
