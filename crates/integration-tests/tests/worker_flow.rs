//! Worker end to end: aggregate of SQLite channels feeding registered handlers

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::TempDb;
use qmux_core::application::{
    handler_fn, shutdown_channel, HandlerError, PayloadDispatcher, ProcessOutcome, WorkerConfig,
};
use qmux_core::domain::ExecutablePayload;
use qmux_core::{AggregateQueue, QueueDriver, Worker};
use serde_json::{json, Value};

fn counting_dispatcher(counter: Arc<AtomicUsize>) -> Arc<PayloadDispatcher> {
    let mut dispatcher = PayloadDispatcher::new();
    dispatcher
        .register(
            "count",
            handler_fn(move |args: Vec<Value>| {
                let counter = counter.clone();
                async move {
                    let by = args.first().and_then(Value::as_u64).unwrap_or(1) as usize;
                    counter.fetch_add(by, Ordering::SeqCst);
                    Ok::<(), HandlerError>(())
                }
            }),
        )
        .register(
            "reject",
            handler_fn(|_args: Vec<Value>| async {
                Err::<(), _>(HandlerError::Failed("rejected".into()))
            }),
        );
    Arc::new(dispatcher)
}

async fn aggregate(db: &TempDb) -> Arc<AggregateQueue> {
    let mut aggregate = AggregateQueue::new();
    aggregate.add_channel("fast", db.driver().await, 3).unwrap();
    aggregate.add_channel("slow", db.driver().await, 1).unwrap();
    Arc::new(aggregate)
}

#[tokio::test]
async fn test_worker_drains_all_channels() {
    let db = TempDb::new();
    let queue = aggregate(&db).await;
    let counter = Arc::new(AtomicUsize::new(0));

    for channel in ["fast", "slow"] {
        for _ in 0..5 {
            queue
                .push(ExecutablePayload::new("count", vec![json!(2)]).into(), Some(channel))
                .await
                .unwrap();
        }
    }

    let worker = Worker::new(
        queue.clone(),
        counting_dispatcher(counter.clone()),
        WorkerConfig::default(),
    );

    let mut completed = 0;
    loop {
        match worker.process_next().await.unwrap() {
            ProcessOutcome::Completed(_) => completed += 1,
            ProcessOutcome::Idle => break,
            other => panic!("Unexpected outcome: {:?}", other),
        }
    }

    assert_eq!(completed, 10);
    assert_eq!(counter.load(Ordering::SeqCst), 20);
    assert_eq!(queue.size(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_item_stays_claimed_in_store() {
    let db = TempDb::new();
    let queue = aggregate(&db).await;

    let item = queue
        .push(ExecutablePayload::new("reject", vec![]).into(), Some("slow"))
        .await
        .unwrap()
        .unwrap();

    let worker = Worker::new(
        queue.clone(),
        counting_dispatcher(Arc::new(AtomicUsize::new(0))),
        WorkerConfig::default(),
    );
    assert_eq!(
        worker.process_next().await.unwrap(),
        ProcessOutcome::Failed(item.id().to_string())
    );

    // Another process looking at the same file sees the claim
    let observer = db.driver().await;
    let stored = observer
        .find_by_id(item.id(), Some("slow"))
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_claimed());
    assert!(observer.pop(Some("slow")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_worker_bound_to_one_channel() {
    let db = TempDb::new();
    let queue = aggregate(&db).await;
    let counter = Arc::new(AtomicUsize::new(0));

    queue
        .push(ExecutablePayload::new("count", vec![]).into(), Some("fast"))
        .await
        .unwrap();
    queue
        .push(ExecutablePayload::new("count", vec![]).into(), Some("slow"))
        .await
        .unwrap();

    let config = WorkerConfig {
        queue: Some("slow".to_string()),
        ..Default::default()
    };
    let worker = Worker::new(queue.clone(), counting_dispatcher(counter.clone()), config);

    assert!(matches!(
        worker.process_next().await.unwrap(),
        ProcessOutcome::Completed(_)
    ));
    assert_eq!(worker.process_next().await.unwrap(), ProcessOutcome::Idle);
    assert_eq!(queue.size(Some("fast")).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_workers_process_each_item_once() {
    let db = TempDb::new();
    let queue = aggregate(&db).await;
    let counter = Arc::new(AtomicUsize::new(0));
    let dispatcher = counting_dispatcher(counter.clone());

    for i in 0..40 {
        let channel = if i % 2 == 0 { "fast" } else { "slow" };
        queue
            .push(ExecutablePayload::new("count", vec![]).into(), Some(channel))
            .await
            .unwrap();
    }

    let (tx, token) = shutdown_channel();
    let config = WorkerConfig {
        idle_sleep: Duration::from_millis(10),
        ..Default::default()
    };

    let mut handles = Vec::new();
    for _ in 0..4 {
        let worker = Worker::new(queue.clone(), dispatcher.clone(), config.clone());
        let token = token.clone();
        handles.push(tokio::spawn(async move { worker.run(token).await }));
    }

    let drained = tokio::time::timeout(Duration::from_secs(10), async {
        while queue.size(None).await.unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "Workers did not drain the queue");

    tx.shutdown();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 40);
}
