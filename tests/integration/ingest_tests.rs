//! Input-boundary behaviour: control lines, junk input, framing limits.

use std::sync::Arc;
use std::time::Duration;

use research_core::engine::ingest;
use research_core::handlers::ModeHandlers;
use research_core::protocol::codec::MAX_LINE_BYTES;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{for_request, kinds, Harness, ScriptedLlm, StaticSearch};

#[tokio::test]
async fn heartbeat_without_request_is_acknowledged_bare() {
    let mut h = Harness::offline().await;
    h.feed("{\"type\":\"heartbeat\"}\n").await;

    assert_eq!(h.drain(), vec![json!({"type": "heartbeat_ack"})]);
}

#[tokio::test]
async fn heartbeat_is_answered_while_a_request_streams() {
    let handlers = ModeHandlers::new(
        Arc::new(ScriptedLlm::slow(&["slow"], Duration::from_millis(100))),
        Arc::new(StaticSearch(vec![])),
    );
    let mut h = Harness::new(handlers).await;
    h.feed(concat!(
        "{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"hi\"}\n",
        "{\"type\":\"heartbeat\"}\n",
    ))
    .await;

    let lines = h.drain();
    let ack = lines
        .iter()
        .position(|l| l == &json!({"type": "heartbeat_ack"}))
        .expect("ack written");
    let complete = lines
        .iter()
        .position(|l| l["event"]["type"] == "complete")
        .expect("request finished");
    assert!(ack < complete, "ack must not wait for the request: {lines:?}");
    assert_eq!(kinds(&for_request(&lines, "r1")), vec!["content_delta", "complete"]);
}

#[tokio::test]
async fn unknown_commands_produce_no_output() {
    let mut h = Harness::offline().await;
    h.feed("{\"type\":\"teleport\",\"requestId\":\"x\"}\n{\"type\":\"\"}\n")
        .await;
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn malformed_and_blank_lines_are_skipped() {
    let mut h = Harness::offline().await;
    h.feed(concat!(
        "not json at all\n",
        "\n",
        "   \n",
        "{\"type\":\"chat\",\"requestId\":\"broken\"\n",
        "{\"requestId\":\"no-type\"}\n",
        "{\"type\":\"chat\",\"requestId\":\"ok\",\"content\":\"still alive\"}\n",
    ))
    .await;

    let lines = h.drain();
    assert_eq!(lines.len(), 2);
    assert_eq!(kinds(&for_request(&lines, "ok")), vec!["content_delta", "complete"]);
}

#[tokio::test]
async fn oversized_line_is_skipped_and_reading_continues() {
    let mut h = Harness::offline().await;
    let huge = format!(
        "{{\"type\":\"chat\",\"requestId\":\"huge\",\"content\":\"{}\"}}\n",
        "x".repeat(MAX_LINE_BYTES + 16)
    );
    let input = format!(
        "{huge}{{\"type\":\"chat\",\"requestId\":\"after\",\"content\":\"small\"}}\n"
    );
    h.feed(&input).await;

    let lines = h.drain();
    assert!(for_request(&lines, "huge").is_empty());
    assert_eq!(
        kinds(&for_request(&lines, "after")),
        vec!["content_delta", "complete"]
    );
}

#[tokio::test]
async fn final_line_without_newline_is_processed() {
    let mut h = Harness::offline().await;
    h.feed("{\"type\":\"plan\",\"requestId\":\"tail\",\"content\":\"eof\"}")
        .await;

    let lines = h.drain();
    assert_eq!(kinds(&for_request(&lines, "tail")), vec!["content_delta", "complete"]);
}

#[tokio::test]
async fn cancelled_ingest_reads_nothing() {
    let mut h = Harness::offline().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    ingest::run(
        Arc::clone(&h.engine),
        &b"{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"hi\"}\n"[..],
        cancel,
    )
    .await
    .expect("clean stop");

    assert!(h.drain().is_empty());
    assert!(h.store().get_request("r1").await.unwrap().is_none());
}

#[tokio::test]
async fn closed_output_ends_ingest_with_io_error() {
    let h = Harness::offline().await;
    let engine = Arc::clone(&h.engine);
    drop(h);

    let err = ingest::run(
        engine,
        &b"{\"type\":\"heartbeat\"}\n"[..],
        CancellationToken::new(),
    )
    .await
    .expect_err("output gone");
    assert!(err.is_fatal());
}
