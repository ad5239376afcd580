use reqwest::Client;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

mod common;
use ::common::schemas::NodeStatus;
use common::*;

fn register_line(node_id: &str, probe_port: u16) -> String {
    json!({
        "action": "REGISTER",
        "node_id": node_id,
        "host": "127.0.0.1",
        "heartbeat_port": 8080,
        "probe_port": probe_port,
        "cpu": 4,
        "memory_gb": 8,
        "storage_gb": 100,
        "bandwidth_mbps": 1000,
        "rack": "ignored"
    })
    .to_string()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_register_and_heartbeat_over_tcp() -> anyhow::Result<()> {
    let controller = TestController::new().await?;
    let client = Client::new();

    let resp = send_line(controller.node_addr, &register_line("node1", 5001)).await?;
    assert_eq!(resp, json!({"status": "OK"}));

    let hb = json!({
        "action": "HEARTBEAT",
        "node_id": "node1",
        "reserved_storage_gb": 1.25,
        "timestamp": 1
    });
    let resp = send_line(controller.node_addr, &hb.to_string()).await?;
    assert_eq!(resp["status"], "OK");

    let nodes = list_nodes(&client, controller.url()).await?;
    assert_eq!(nodes.len(), 1);
    let node = &nodes[0];
    assert_eq!(node.node_id, "node1");
    assert_eq!(node.status, NodeStatus::Active);
    assert_eq!(node.probe_port, 5001);
    assert_eq!(node.declared_storage_gb, 100);
    assert_eq!(node.available_storage_gb, 100.0);
    assert_eq!(node.reported_reserved_gb, Some(1.25));
    assert!(node.last_heartbeat_age_ms < 5_000);

    controller.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejections_leave_registry_untouched() -> anyhow::Result<()> {
    let controller = TestController::new().await?;

    let unknown = json!({
        "action": "HEARTBEAT",
        "node_id": "ghost",
        "reserved_storage_gb": 0.0,
        "timestamp": 1
    });
    let resp = send_line(controller.node_addr, &unknown.to_string()).await?;
    assert_eq!(resp["status"], "ERROR");
    assert!(resp["reason"].as_str().unwrap().contains("ghost"));

    let missing_storage = json!({
        "action": "REGISTER",
        "node_id": "node1",
        "host": "127.0.0.1",
        "heartbeat_port": 8080,
        "probe_port": 5001,
        "cpu": 4,
        "memory_gb": 8,
        "bandwidth_mbps": 1000
    });
    let resp = send_line(controller.node_addr, &missing_storage.to_string()).await?;
    assert_eq!(resp["status"], "ERROR");

    let resp = send_line(controller.node_addr, "not json at all").await?;
    assert_eq!(resp["status"], "ERROR");

    let resp = send_line(controller.node_addr, r#"{"action":"ACTIVE_NOTIFICATION"}"#).await?;
    assert_eq!(resp["status"], "ERROR");
    assert_eq!(resp["reason"], "unknown action: ACTIVE_NOTIFICATION");

    assert!(controller.state.registry.is_empty());

    // Listener is still serving after the rejections.
    let resp = send_line(controller.node_addr, &register_line("node1", 5001)).await?;
    assert_eq!(resp["status"], "OK");
    assert_eq!(controller.state.registry.len(), 1);

    controller.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_nodes_and_stats_queries() -> anyhow::Result<()> {
    let controller = TestController::new().await?;

    send_line(controller.node_addr, &register_line("node1", 5001)).await?;
    send_line(controller.node_addr, &register_line("node2", 5002)).await?;

    let resp = send_line(controller.node_addr, r#"{"action":"LIST_NODES"}"#).await?;
    assert_eq!(resp["status"], "OK");
    let ids: Vec<&str> = resp["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["node_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["node1", "node2"]);

    let resp = send_line(controller.node_addr, r#"{"action":"STATS"}"#).await?;
    let stats = &resp["stats"];
    assert_eq!(stats["total_nodes"], 2);
    assert_eq!(stats["active_nodes"], 2);
    assert_eq!(stats["total_storage_capacity_gb"], 200);
    assert_eq!(stats["total_bandwidth_mbps"], 2000);
    // Four connections so far, this one included.
    assert_eq!(stats["total_connections"], 4);

    controller.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_several_messages_on_one_connection() -> anyhow::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    let controller = TestController::new().await?;

    let stream = TcpStream::connect(controller.node_addr).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let hb = json!({
        "action": "HEARTBEAT",
        "node_id": "node1",
        "reserved_storage_gb": 0.0,
        "timestamp": 1
    })
    .to_string();
    let batch = format!("{}\n\n{}\n", register_line("node1", 5001), hb);
    write_half.write_all(batch.as_bytes()).await?;

    for _ in 0..2 {
        let line = lines.next_line().await?.expect("answer line");
        let resp: serde_json::Value = serde_json::from_str(&line)?;
        assert_eq!(resp["status"], "OK");
    }

    controller.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_re_registration_refreshes_capacity() -> anyhow::Result<()> {
    let controller = TestController::new().await?;
    let client = Client::new();

    let node = spawn_node(&controller, "node1", 10, 1000).await?;
    let (_, summary) = create_transfer(&client, controller.url(), "a.bin", 20.0, 1).await?;
    assert!(summary.is_some());

    let mut node_state = node.state.clone();
    node_state.storage_gb = 50;
    node_state.bandwidth_mbps = 4000;
    storage_node::client::register(&node_state).await?;

    let nodes = list_nodes(&client, controller.url()).await?;
    assert_eq!(nodes[0].declared_storage_gb, 50);
    assert_eq!(nodes[0].declared_bandwidth_mbps, 4000);
    // Reservations survive re-registration.
    assert!((nodes[0].reserved_storage_gb - 20.0 / 1024.0).abs() < 1e-9);

    node.shutdown().await?;
    controller.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_utf8_is_answered_and_connection_survives() -> anyhow::Result<()> {
    let controller = TestController::new().await?;

    let mut stream = TcpStream::connect(controller.node_addr).await?;
    stream.write_all(b"{\"action\":\"REG\xff\xfeISTER\"}\n").await?;
    stream.write_all(register_line("node1", 5001).as_bytes()).await?;
    stream.write_all(b"\n").await?;

    let mut reader = BufReader::new(stream);
    let mut answer = String::new();
    reader.read_line(&mut answer).await?;
    let rejected: Value = serde_json::from_str(&answer)?;
    assert_eq!(rejected["status"], "ERROR");
    assert_eq!(rejected["code"], "PROTOCOL");

    answer.clear();
    reader.read_line(&mut answer).await?;
    let accepted: Value = serde_json::from_str(&answer)?;
    assert_eq!(accepted["status"], "OK");
    assert_eq!(controller.state.registry.len(), 1);

    controller.shutdown().await?;
    Ok(())
}
