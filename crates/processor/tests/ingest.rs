//! End-to-end ingestion tests: an in-process WebSocket source feeding
//! a real receiver, pool and storage.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_util::sync::CancellationToken;

use processor::config::ConnectionConfig;
use processor::pool::WorkerPool;
use processor::receiver::Receiver;
use processor::storage::InMemoryStorage;

fn log_frame(level: &str, service: &str) -> Message {
    let frame = serde_json::json!({
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "level": level,
        "message": "order created",
        "service": service,
        "component": "api",
        "trace_id": "a1b2c3d4e5f60708",
        "span_id": "0102030405060708",
        "parent_id": "1112131415161718",
    });
    Message::Text(frame.to_string().into())
}

async fn bind_source() -> (SocketAddr, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, listener)
}

fn start_pipeline(
    addr: SocketAddr,
) -> (CancellationToken, Arc<InMemoryStorage>, Arc<WorkerPool>, Receiver) {
    let token = CancellationToken::new();
    let storage = Arc::new(InMemoryStorage::new());
    let pool = Arc::new(WorkerPool::start(&token, 2, 64, storage.clone()));
    let receiver = Receiver::new(
        format!("ws://{}/ws/logs", addr),
        pool.clone(),
        ConnectionConfig::default(),
    );
    (token, storage, pool, receiver)
}

#[tokio::test]
async fn test_ingests_validates_and_aggregates() {
    let (addr, listener) = bind_source().await;

    let source: JoinHandle<bool> = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // Connection confirmation, then a burst of mixed frames
        ws.send(Message::Text(
            r#"{"status":"connected","interval_ms":"50"}"#.into(),
        ))
        .await
        .unwrap();

        for _ in 0..4 {
            ws.send(log_frame("INFO", "orders")).await.unwrap();
        }
        ws.send(log_frame(" info ", "orders")).await.unwrap();
        ws.send(log_frame("ERROR", "payments")).await.unwrap();
        ws.send(log_frame("ERROR", "payments")).await.unwrap();
        // Rejected by validation, must never reach storage
        ws.send(log_frame("DEBUG", "orders")).await.unwrap();
        ws.send(Message::Text("}{ not json".into())).await.unwrap();

        // A ping mid-stream must come back as a pong within a second
        ws.send(Message::Ping(Bytes::from_static(b"hb"))).await.unwrap();
        let ponged = loop {
            match timeout(Duration::from_secs(1), ws.next()).await {
                Ok(Some(Ok(Message::Pong(data)))) => break data.as_ref() == b"hb".as_slice(),
                Ok(Some(Ok(_))) => continue,
                _ => break false,
            }
        };

        ws.send(log_frame("WARN", "auth")).await.unwrap();
        ws.close(None).await.ok();
        ponged
    });

    let (token, storage, pool, receiver) = start_pipeline(addr);

    // The source hangs up at the end, so this is a broken stream from
    // the receiver's point of view, not a requested stop
    let result = timeout(Duration::from_secs(5), receiver.run(token.clone()))
        .await
        .expect("receiver did not stop after the source hung up");
    assert!(result.is_err(), "expected a read error, got {:?}", result);

    assert!(source.await.unwrap(), "source never saw the pong");

    // Drain everything that was accepted before asserting counts
    pool.close().await;

    let snapshot = storage.snapshot();
    assert_eq!(snapshot["orders"]["INFO"], 5);
    assert_eq!(snapshot["payments"]["ERROR"], 2);
    assert_eq!(snapshot["auth"]["WARN"], 1);
    assert!(
        !snapshot["orders"].contains_key("DEBUG"),
        "rejected level leaked into storage"
    );
    assert_eq!(storage.total(), 8);
    assert_eq!(pool.stats().processed, 8);
}

#[tokio::test]
async fn test_cancellation_stops_receiver_cleanly() {
    let (addr, listener) = bind_source().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Text(
            r#"{"status":"connected","interval_ms":"10"}"#.into(),
        ))
        .await
        .ok();

        // Stream frames until the client goes away
        loop {
            if ws.send(log_frame("INFO", "orders")).await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let (token, _storage, pool, receiver) = start_pipeline(addr);

    let stop = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            token.cancel();
        })
    };

    let result = timeout(Duration::from_secs(5), receiver.run(token))
        .await
        .expect("receiver did not react to cancellation");

    // An intentional stop is Ok, distinguishable from a broken stream
    assert!(result.is_ok(), "expected clean stop, got {:?}", result);

    stop.await.unwrap();
    pool.close().await;
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    // Grab a free port, then close the listener so nothing answers
    let (addr, listener) = bind_source().await;
    drop(listener);

    let (token, _storage, pool, receiver) = start_pipeline(addr);

    let result = timeout(Duration::from_secs(10), receiver.run(token.clone()))
        .await
        .expect("connect attempt did not fail in time");

    match result {
        Err(processor::error::ReceiverError::Connect(_)) => {}
        other => panic!("expected a connection error, got {:?}", other),
    }

    token.cancel();
    pool.close().await;
}
