#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the protocol client against a recording spy.

mod common;

use common::{spy_endpoint, wait_until, SpyConnector};
use mcplink_client::{ProtocolClient, FALLBACK_TABLES, MANDATORY_DENYLIST};
use mcplink_core::{FailureKind, McpLinkError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn client(spy: &SpyConnector, name: &str) -> ProtocolClient {
    ProtocolClient::with_connector(name, spy_endpoint(name), Arc::new(spy.clone()))
}

fn healthy_spy() -> SpyConnector {
    SpyConnector::new()
        .with_tool("ListTables", json!({"tables": ["orders", "customers"]}))
        .with_tool(
            "DescribeTable",
            json!({"table_name": "orders", "columns": [{"name": "total", "type": "decimal"}]}),
        )
        .with_tool("ReadData", json!({"data": [[1]], "columns": ["n"], "row_count": 1}))
}

// ---------------------------------------------------------------------------
// 1. Validation and policy rejections never touch the transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_blank_inputs_are_rejected_without_io() {
    let spy = healthy_spy();
    let client = client(&spy, "db");

    for blank in ["", "   ", "\t\n"] {
        let outcome = client.describe_entity(blank).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Validation);
        assert_eq!(failure.message, "Table name is required");
        assert!(!outcome.is_fallback());

        let outcome = client.run_query(blank).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Validation);
        assert_eq!(failure.message, "SQL query is required");
        assert_eq!(failure.context["sql"], json!(blank));
    }

    assert_eq!(spy.io_count(), 0);
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_denylisted_statements_are_blocked_without_io() {
    let spy = healthy_spy();
    let client = client(&spy, "db");

    let statements = [
        "DROP TABLE orders",
        "select 1; delete from orders",
        "TrUnCaTe orders",
        "ALTER TABLE orders ADD x INT",
        "create table t (id int)",
        "Insert Into orders values (1)",
        "update orders set total = 0",
    ];
    for (statement, keyword) in statements.iter().zip(MANDATORY_DENYLIST) {
        let outcome = client.run_query(statement).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Policy, "{statement}");
        assert!(failure.message.contains("blocked"));
        assert_eq!(failure.context["keyword"], json!(keyword));
        assert_eq!(failure.context["sql"], json!(statement));
    }

    assert_eq!(spy.io_count(), 0);
}

// ---------------------------------------------------------------------------
// 2. Successful operations pass the server payload through
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_operations_return_server_payloads() {
    let spy = healthy_spy();
    let client = client(&spy, "db");

    let tables = client.list_entities().await;
    assert!(tables.is_ok());
    assert_eq!(tables.to_json()["tables"], json!(["orders", "customers"]));

    let schema = client.describe_entity("  orders ").await;
    assert_eq!(schema.to_json()["table_name"], "orders");

    let rows = client.run_query("SELECT n FROM t").await;
    assert_eq!(rows.to_json()["row_count"], 1);

    let calls = spy.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].1, "DescribeTable");
    assert_eq!(calls[1].2, json!({"name": "orders"}));
    assert_eq!(calls[2].2, json!({"sql": "SELECT n FROM t"}));

    assert!(client.health_check().await);
}

#[tokio::test]
async fn test_invoke_generic_passes_arguments_verbatim() {
    let spy = healthy_spy().with_tool("ExportCsv", json!({"path": "/tmp/x.csv"}));
    let client = client(&spy, "db");

    // No guard on the generic path.
    let args = json!({"sql": "DROP TABLE t", "nested": {"a": [1, 2]}});
    let outcome = client.invoke_generic("ExportCsv", args.clone()).await;
    assert_eq!(outcome.to_json(), json!({"path": "/tmp/x.csv"}));
    assert_eq!(spy.calls()[0].2, args);

    let unknown = client.invoke_generic("Nope", json!({})).await;
    assert_eq!(unknown.failure().unwrap().kind, FailureKind::Remote);
    assert!(!unknown.is_fallback());
}

// ---------------------------------------------------------------------------
// 3. Transport failures turn into documented fallbacks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failing_transport_yields_fallback_shapes() {
    let spy = healthy_spy().failing_calls("flaky");
    let client = client(&spy, "flaky");

    let tables = client.list_entities().await;
    assert!(tables.is_fallback());
    assert_eq!(tables.to_json()["tables"], json!(FALLBACK_TABLES));
    assert_eq!(tables.to_json()["error"], "connection reset by peer");

    let schema = client.describe_entity("orders").await;
    assert!(schema.is_fallback());
    let schema = schema.to_json();
    assert_eq!(schema["table_name"], "orders");
    assert_eq!(schema["columns"].as_array().unwrap().len(), 2);
    assert_eq!(schema["columns"][0]["name"], "id");

    let rows = client.run_query("SELECT * FROM orders").await;
    assert!(rows.is_fallback());
    let rows = rows.to_json();
    assert_eq!(rows["data"], json!([]));
    assert_eq!(rows["columns"], json!([]));
    assert_eq!(rows["row_count"], 0);
    assert_eq!(rows["sql"], "SELECT * FROM orders");

    assert!(!client.health_check().await);
}

#[tokio::test]
async fn test_failed_discovery_loads_builtin_tools() {
    let spy = healthy_spy().failing_calls("flaky");
    let client = client(&spy, "flaky");
    client.connect().await.unwrap();

    let names: Vec<String> = client
        .get_available_tools()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["DescribeTable", "ListTables", "ReadData"]);
}

// ---------------------------------------------------------------------------
// 4. Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_is_idempotent() {
    let spy = healthy_spy();
    let client = client(&spy, "db");

    client.connect().await.unwrap();
    client.connect().await.unwrap();
    client.list_entities().await;

    assert_eq!(spy.opens(), 1);
    assert_eq!(spy.list_calls(), 1);
    assert_eq!(client.connect_count(), 1);
    assert_eq!(client.get_available_tools().len(), 3);
}

#[tokio::test]
async fn test_connect_failure_propagates_and_leaves_client_disconnected() {
    let spy = healthy_spy().failing_open("down");
    let client = client(&spy, "down");

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, McpLinkError::Connection(_)));
    assert!(!client.is_connected().await);
    assert!(client.get_available_tools().is_empty());

    // Operations absorb the same failure into a fallback.
    let tables = client.list_entities().await;
    assert!(tables.is_fallback());
    assert_eq!(tables.failure().unwrap().kind, FailureKind::Connection);
}

#[tokio::test]
async fn test_reconnect_replaces_registry_and_disconnect_releases_handle() {
    let spy = healthy_spy();
    let client = client(&spy, "db");

    client.connect().await.unwrap();
    client.disconnect().await;
    assert_eq!(spy.closes(), 1);
    assert!(client.get_available_tools().is_empty());

    client.disconnect().await;
    assert_eq!(spy.closes(), 1);

    client.connect().await.unwrap();
    assert_eq!(spy.opens(), 2);
    assert_eq!(client.get_available_tools().len(), 3);
}

#[tokio::test]
async fn test_concurrent_calls_share_one_connection() {
    let spy = healthy_spy();
    let client = Arc::new(client(&spy, "db"));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.list_entities().await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert_eq!(spy.opens(), 1);
    assert_eq!(spy.call_count(), 8);
}

// ---------------------------------------------------------------------------
// 5. Disconnect while a call is in flight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_disconnect_waits_for_in_flight_call() {
    let gate = Arc::new(Notify::new());
    let spy = healthy_spy().with_gate("slow", gate.clone());
    let client = Arc::new(client(&spy, "slow"));
    client.connect().await.unwrap();

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.list_entities().await })
    };
    wait_until(|| spy.call_count() == 1).await;

    let disconnect = {
        let client = client.clone();
        tokio::spawn(async move { client.disconnect().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!disconnect.is_finished());
    assert_eq!(spy.closes(), 0);

    gate.notify_one();
    let outcome = call.await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(outcome.to_json()["tables"], json!(["orders", "customers"]));

    disconnect.await.unwrap();
    assert_eq!(spy.closes(), 1);
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_call_queued_behind_disconnect_reconnects() {
    let gate = Arc::new(Notify::new());
    let spy = healthy_spy().with_gate("slow", gate.clone());
    let client = Arc::new(client(&spy, "slow"));
    client.connect().await.unwrap();

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.list_entities().await })
    };
    wait_until(|| spy.call_count() == 1).await;

    let disconnect = {
        let client = client.clone();
        tokio::spawn(async move { client.disconnect().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Queued behind the pending disconnect, so it never sees the old handle.
    let second = {
        let client = client.clone();
        tokio::spawn(async move { client.describe_entity("orders").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(spy.call_count(), 1);

    gate.notify_one();
    assert!(first.await.unwrap().is_ok());
    disconnect.await.unwrap();

    // The second call reconnects and parks on the gate again.
    wait_until(|| spy.call_count() == 2).await;
    gate.notify_one();
    let schema = second.await.unwrap();
    assert!(schema.is_ok());
    assert_eq!(schema.to_json()["table_name"], "orders");

    assert_eq!(spy.opens(), 2);
    assert_eq!(spy.closes(), 1);
}
