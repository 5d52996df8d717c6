#![cfg(feature = "integration-tests")]

use common::domain::MessageQueue;
use common::postgres::{PostgresClient, PostgresConfig};
use common::queue::PgmqQueue;
use serde_json::json;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

const QUEUE: &str = "events_test";

async fn setup_queue() -> (ContainerAsync<GenericImage>, PgmqQueue, PostgresClient) {
    let postgres = GenericImage::new("ghcr.io/pgmq/pg17-pgmq", "v1.5.1")
        .with_wait_for(testcontainers::core::WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_exposed_port(5432.into())
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .start()
        .await
        .unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let client = PostgresClient::new(&PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 5,
        acquire_timeout_ms: 10_000,
    })
    .expect("Failed to create client");

    client
        .get_connection()
        .await
        .unwrap()
        .batch_execute("CREATE EXTENSION IF NOT EXISTS pgmq")
        .await
        .expect("Failed to create pgmq extension");

    (postgres, PgmqQueue::new(client.clone()), client)
}

#[tokio::test]
async fn test_ensure_queue_twice_succeeds() {
    let (_container, queue, _client) = setup_queue().await;

    queue.ensure_queue(QUEUE).await.unwrap();
    queue.ensure_queue(QUEUE).await.unwrap();

    let id = queue.enqueue(QUEUE, &json!({ "n": 1 })).await.unwrap();
    assert!(id > 0);
}

#[tokio::test]
async fn test_read_leases_message_until_archived() {
    let (_container, queue, _client) = setup_queue().await;
    queue.ensure_queue(QUEUE).await.unwrap();

    let id = queue
        .enqueue(QUEUE, &json!({ "tenant_external_id": "g1", "event": { "body": {} } }))
        .await
        .unwrap();

    let batch = queue.read(QUEUE, Duration::from_secs(30), 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, id);
    assert_eq!(batch[0].read_count, 1);
    assert_eq!(batch[0].payload["tenant_external_id"], "g1");
    assert!(batch[0].visible_at > batch[0].enqueued_at);

    // Leased message is hidden from other readers
    let hidden = queue.read(QUEUE, Duration::from_secs(30), 10).await.unwrap();
    assert!(hidden.is_empty());

    queue.archive(QUEUE, id).await.unwrap();
    // Archiving again is tolerated
    queue.archive(QUEUE, id).await.unwrap();
}

#[tokio::test]
async fn test_unarchived_message_is_redelivered_after_lease() {
    let (_container, queue, _client) = setup_queue().await;
    queue.ensure_queue(QUEUE).await.unwrap();

    let id = queue.enqueue(QUEUE, &json!({ "n": 7 })).await.unwrap();

    let first = queue.read(QUEUE, Duration::from_secs(1), 10).await.unwrap();
    assert_eq!(first.len(), 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let second = queue.read(QUEUE, Duration::from_secs(30), 10).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, id);
    assert_eq!(second[0].read_count, 2);
}

#[tokio::test]
async fn test_delete_removes_message() {
    let (_container, queue, client) = setup_queue().await;
    queue.ensure_queue(QUEUE).await.unwrap();

    let id = queue.enqueue(QUEUE, &json!({ "n": 1 })).await.unwrap();
    queue.delete(QUEUE, id).await.unwrap();

    let conn = client.get_connection().await.unwrap();
    let row = conn
        .query_one(&format!("SELECT count(*) FROM pgmq.q_{}", QUEUE), &[])
        .await
        .unwrap();
    let remaining: i64 = row.get(0);
    assert_eq!(remaining, 0);
}
