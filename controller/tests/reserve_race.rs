use futures_util::future::join_all;
use reqwest::Client;

mod common;
use ::common::constants::GB;
use ::common::schemas::RegisterRequest;
use common::*;
use controller::core::registry::Registry;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reserves_admit_exactly_one() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.upsert(
        &RegisterRequest {
            node_id: "node1".to_string(),
            host: "127.0.0.1".to_string(),
            heartbeat_port: 8080,
            probe_port: 9000,
            cpu: 4,
            memory_gb: 8,
            storage_gb: 1,
            bandwidth_mbps: 1000,
        },
        tokio::time::Instant::now(),
    );

    let attempts = (0..32).map(|_| {
        let registry = registry.clone();
        tokio::spawn(async move { registry.reserve("node1", GB) })
    });
    let results = join_all(attempts).await;

    let winners = results
        .into_iter()
        .map(|r| r.expect("task"))
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(registry.available_bytes("node1"), Some(0));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_never_overcommit() -> anyhow::Result<()> {
    let controller = TestController::new().await?;
    let client = Client::new();

    let node = spawn_node(&controller, "node1", 1, 1000).await?;

    let requests = (0..4).map(|i| {
        let client = client.clone();
        let url = controller.url().to_string();
        async move { create_transfer(&client, &url, &format!("f{i}"), 400.0, 1).await }
    });
    let summaries: Vec<_> = join_all(requests)
        .await
        .into_iter()
        .map(|r| r.map(|(_, s)| s.expect("accepted")))
        .collect::<anyhow::Result<_>>()?;

    let placed: u64 = summaries
        .iter()
        .flat_map(|s| &s.chunks)
        .map(|c| c.chunk_size_bytes * c.replica_node_ids.len() as u64)
        .sum();

    let record = controller.state.registry.get("node1").expect("registered");
    assert_eq!(record.reserved_storage_bytes, placed);
    assert!(record.reserved_storage_bytes <= record.declared_storage_bytes());
    // 1600 MB requested against 1 GB: someone came up short.
    assert!(summaries.iter().any(|s| s.placed_chunks < s.total_chunks));

    node.shutdown().await?;
    controller.shutdown().await?;
    Ok(())
}
