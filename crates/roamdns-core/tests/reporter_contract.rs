//! Contract Test: Periodic Reporter
//!
//! Constraints verified:
//! - The reporter delivers its identity to a live server
//! - Failed attempts are logged and never end the loop
//! - A stop signal ends the loop promptly, even mid-exchange

mod common;

use common::*;
use roamdns_core::Reporter;
use roamdns_core::error::Error;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

const TICK: Duration = Duration::from_millis(25);

/// An address nothing listens on
async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[tokio::test]
async fn report_once_reaches_the_server() {
    let server = TestServer::start().await;
    let reporter = Reporter::new(server.addr().to_string(), "alice", TICK);

    assert_ok!(reporter.report_once().await);
    assert!(server.handle.server().registry().get("alice").is_some());
    assert_eq!(server.provider.create_count(), 1);

    server.handle.stop().await.unwrap();
}

#[tokio::test]
async fn report_once_surfaces_failure_status() {
    let server = TestServer::start().await;
    let reporter = Reporter::new(server.addr().to_string(), "", TICK);

    let res = reporter.report_once().await;
    assert!(matches!(res, Err(Error::Protocol(_))));

    server.handle.stop().await.unwrap();
}

#[tokio::test]
async fn report_once_fails_when_nobody_listens() {
    let reporter = Reporter::new(dead_addr().await.to_string(), "alice", TICK)
        .with_timeout(Duration::from_secs(1));

    assert_err!(reporter.report_once().await);
}

#[tokio::test]
async fn running_reporter_registers_its_identity() {
    let server = TestServer::start().await;
    let handle = Reporter::new(server.addr().to_string(), "alice", TICK).start();

    let registered = tokio::time::timeout(Duration::from_secs(2), async {
        while server.handle.server().registry().get("alice").is_none() {
            tokio::time::sleep(TICK).await;
        }
    })
    .await;
    assert!(registered.is_ok(), "reporter never reached the server");

    // Several ticks from the same host: still exactly one create
    tokio::time::sleep(TICK * 4).await;
    assert_eq!(server.provider.create_count(), 1);

    assert_ok!(handle.stop().await);
    server.handle.stop().await.unwrap();
}

#[tokio::test]
async fn unreachable_server_does_not_end_the_loop() {
    let handle = Reporter::new(dead_addr().await.to_string(), "alice", TICK)
        .with_timeout(Duration::from_millis(200))
        .start();

    tokio::time::sleep(TICK * 6).await;
    assert!(!handle.is_finished(), "a failed report ended the loop");

    let stopped = tokio::time::timeout(Duration::from_secs(1), handle.stop()).await;
    assert!(stopped.is_ok(), "reporter did not stop");
}

#[tokio::test]
async fn stop_before_first_tick_sends_nothing() {
    let server = TestServer::start().await;
    let handle = Reporter::new(server.addr().to_string(), "alice", Duration::from_secs(3600)).start();

    let stopped = tokio::time::timeout(Duration::from_secs(1), handle.stop()).await;
    assert!(stopped.is_ok());
    assert!(server.handle.server().registry().is_empty());

    server.handle.stop().await.unwrap();
}

#[tokio::test]
async fn stop_abandons_an_unanswered_report() {
    // Accepts every connection and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepted_tx, accepted_rx) = oneshot::channel();
    let silent = tokio::spawn(async move {
        let mut accepted_tx = Some(accepted_tx);
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
            if let Some(tx) = accepted_tx.take() {
                let _ = tx.send(());
            }
        }
    });

    // Exchange timeout far longer than the interval
    let handle = Reporter::new(addr.to_string(), "alice", Duration::from_millis(100))
        .with_timeout(Duration::from_secs(30))
        .start();

    let accepted = tokio::time::timeout(Duration::from_secs(2), accepted_rx).await;
    assert!(accepted.is_ok(), "reporter never dialed");

    let started = Instant::now();
    let stopped = tokio::time::timeout(Duration::from_secs(2), handle.stop()).await;
    assert!(stopped.is_ok(), "stop waited on the exchange timeout");
    assert_ok!(stopped.unwrap());
    assert!(started.elapsed() < Duration::from_secs(1));

    silent.abort();
}
