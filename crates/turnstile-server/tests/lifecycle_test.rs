//! Connection accounting, accept replenishment and shutdown.

mod common;

use common::{TestClient, WAIT, start_server, wait_until};
use serde_json::json;
use turnstile_proto::{ServerMessage, SessionKind};
use turnstile_server::{Server, ServerConfig, ServerError};

#[tokio::test]
async fn accepts_are_kept_topped_up() {
    let server = start_server(3).await;
    wait_until("initial accepts", || server.outstanding_accepts() == 3).await;

    let _a = TestClient::connect(&server).await;
    let _b = TestClient::connect(&server).await;
    wait_until("registration", || server.connection_count() == 2).await;
    wait_until("replenished accepts", || server.outstanding_accepts() == 3).await;

    server.shutdown().await;
}

#[tokio::test]
async fn more_clients_than_posted_accepts() {
    let server = start_server(1).await;

    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(TestClient::connect(&server).await);
    }
    wait_until("all registered", || server.connection_count() == 5).await;

    for (i, client) in clients.iter_mut().enumerate() {
        client.send(&json!({"type": "echo", "i": i})).await;
        assert_eq!(client.recv().await["i"], i);
    }
    server.shutdown().await;
}

#[tokio::test]
async fn disconnects_are_counted() {
    let server = start_server(4).await;
    let a = TestClient::connect(&server).await;
    let _b = TestClient::connect(&server).await;
    wait_until("registration", || server.connection_count() == 2).await;

    drop(a);
    wait_until("teardown", || server.connection_count() == 1).await;
    server.shutdown().await;
}

#[tokio::test]
async fn broadcast_reaches_everyone() {
    let server = start_server(4).await;
    let mut a = TestClient::connect(&server).await;
    let mut b = TestClient::connect(&server).await;
    wait_until("registration", || server.connection_count() == 2).await;

    server.broadcast(&ServerMessage::GameStart { kind: SessionKind::TicTacToe });

    assert_eq!(a.expect("game_start").await, b.expect("game_start").await);
    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_clients_and_finishes() {
    let server = start_server(4).await;
    let mut a = TestClient::connect(&server).await;
    let mut b = TestClient::connect(&server).await;
    a.send(&json!({"type": "service_create", "name": "tictactoe"})).await;
    wait_until("registration", || server.connection_count() == 2).await;

    tokio::time::timeout(WAIT, server.shutdown()).await.expect("shutdown hung");

    a.expect_closed().await;
    b.expect_closed().await;
}

#[tokio::test]
async fn pools_recycle_operations() {
    let server = start_server(2).await;
    let mut client = TestClient::connect(&server).await;

    for n in 0..20 {
        client.send(&json!({"type": "echo", "n": n})).await;
        assert_eq!(client.recv().await["n"], n);
    }

    let stats = server.pool_stats();
    // Two accepts plus one receive stay posted; everything else went back
    wait_until("pool settle", || server.pool_stats().operations.in_use == 3).await;
    assert!(stats.outbound.idle + stats.outbound.in_use >= 1);
    server.shutdown().await;
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let config = ServerConfig { bind_address: "not an address".into(), ..ServerConfig::default() };
    let result = Server::bind(config).await;
    assert!(matches!(result, Err(ServerError::Config(_))));
}
