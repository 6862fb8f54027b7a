//! Queue versus reject handling of requests that arrive while one runs.

use std::sync::Arc;
use std::time::Duration;

use research_core::config::GlobalConfig;
use research_core::engine::ingest;
use research_core::handlers::ModeHandlers;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{
    for_request, kinds, reject_config, seqs, terminal_count, test_config, Harness, ScriptedLlm,
    StaticSearch,
};

fn slow_handlers() -> ModeHandlers {
    ModeHandlers::new(
        Arc::new(ScriptedLlm::slow(&["a", "b"], Duration::from_millis(50))),
        Arc::new(StaticSearch(vec![])),
    )
}

const TWO_CHATS: &str = concat!(
    "{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"first\"}\n",
    "{\"type\":\"chat\",\"requestId\":\"r2\",\"content\":\"second\"}\n",
);

#[tokio::test]
async fn queue_policy_runs_requests_in_arrival_order() {
    let mut h = Harness::with_config(&test_config(), slow_handlers()).await;
    h.feed(TWO_CHATS).await;

    let lines = h.drain();
    let order: Vec<&str> = lines
        .iter()
        .map(|l| l["requestId"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["r1", "r1", "r1", "r2", "r2", "r2"]);
    assert_eq!(seqs(&for_request(&lines, "r2")), vec![1, 2, 3]);
}

#[tokio::test]
async fn reject_policy_refuses_a_request_while_busy() {
    let mut h = Harness::with_config(&reject_config(), slow_handlers()).await;
    h.feed(TWO_CHATS).await;

    let lines = h.drain();
    let r1 = for_request(&lines, "r1");
    assert_eq!(kinds(&r1), vec!["content_delta", "content_delta", "complete"]);

    let r2 = for_request(&lines, "r2");
    assert_eq!(r2.len(), 1);
    assert_eq!(r2[0]["seq"], 1);
    assert_eq!(r2[0]["event"]["type"], "error");
    assert_eq!(r2[0]["event"]["message"], "session busy");

    assert!(h.store().get_request("r2").await.unwrap().is_none());
}

#[tokio::test]
async fn reject_policy_accepts_requests_once_idle() {
    let mut h = Harness::with_config(&reject_config(), slow_handlers()).await;
    h.feed("{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"first\"}\n")
        .await;
    h.feed("{\"type\":\"chat\",\"requestId\":\"r2\",\"content\":\"second\"}\n")
        .await;

    let lines = h.drain();
    assert_eq!(kinds(&for_request(&lines, "r2")).last().map(String::as_str), Some("complete"));
}

#[tokio::test]
async fn reject_policy_still_answers_control_commands() {
    let mut h = Harness::with_config(&reject_config(), slow_handlers()).await;
    h.feed(concat!(
        "{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"first\"}\n",
        "{\"type\":\"heartbeat\"}\n",
        "{\"type\":\"query_history\",\"requestId\":\"h1\"}\n",
    ))
    .await;

    let lines = h.drain();
    assert!(lines.iter().any(|l| l["type"] == "heartbeat_ack"));
    assert_eq!(
        kinds(&for_request(&lines, "h1")),
        vec!["query_history_result", "complete"]
    );
}

#[tokio::test]
async fn reject_policy_drops_a_request_reusing_the_running_id() {
    let mut h = Harness::with_config(&reject_config(), slow_handlers()).await;
    h.feed(concat!(
        "{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"first\"}\n",
        "{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"again\"}\n",
    ))
    .await;

    let lines = h.drain();
    let r1 = for_request(&lines, "r1");
    assert_eq!(seqs(&r1), vec![1, 2, 3]);
    assert_eq!(kinds(&r1), vec!["content_delta", "content_delta", "complete"]);
    assert_eq!(terminal_count(&r1), 1);

    let stored = h.store().get_request("r1").await.unwrap().expect("stored");
    assert_eq!(stored.user_content, "first");
}

#[tokio::test]
async fn reject_policy_keeps_default_id_requests_apart() {
    let mut h = Harness::with_config(&reject_config(), slow_handlers()).await;
    h.feed(concat!(
        "{\"type\":\"chat\",\"content\":\"first\"}\n",
        "{\"type\":\"plan\",\"content\":\"second\"}\n",
    ))
    .await;

    let lines = h.drain();
    let default = for_request(&lines, "req_default");
    assert_eq!(seqs(&default), vec![1, 2, 3]);
    assert_eq!(terminal_count(&default), 1);
}

#[tokio::test]
async fn full_queue_still_answers_heartbeat_and_abort() {
    let config = GlobalConfig {
        queue_capacity: 1,
        ..test_config()
    };
    let handlers = ModeHandlers::new(
        Arc::new(ScriptedLlm::slow(
            &["1", "2", "3", "4", "5", "6"],
            Duration::from_millis(100),
        )),
        Arc::new(StaticSearch(vec![])),
    );
    let mut h = Harness::with_config(&config, handlers).await;
    let (mut client, input) = tokio::io::duplex(4096);
    let reader = tokio::spawn(ingest::run(
        Arc::clone(&h.engine),
        input,
        CancellationToken::new(),
    ));

    client
        .write_all(b"{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"a\"}\n")
        .await
        .unwrap();
    let first = h.next_line().await;
    assert_eq!(first["requestId"], "r1");

    // r2 fills the queue, r3 has to wait behind it.
    client
        .write_all(
            concat!(
                "{\"type\":\"chat\",\"requestId\":\"r2\",\"content\":\"b\"}\n",
                "{\"type\":\"chat\",\"requestId\":\"r3\",\"content\":\"c\"}\n",
                "{\"type\":\"heartbeat\"}\n",
                "{\"type\":\"abort\",\"requestId\":\"r1\"}\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    drop(client);
    reader.await.unwrap().unwrap();

    let mut lines = vec![first];
    lines.extend(h.drain());

    let r1 = for_request(&lines, "r1");
    assert_eq!(kinds(&r1).last().map(String::as_str), Some("aborted"));
    assert!(r1.len() < 7, "r1 stopped early");

    let ack = lines
        .iter()
        .position(|l| l["type"] == "heartbeat_ack")
        .expect("heartbeat answered");
    let r1_end = lines
        .iter()
        .position(|l| l["requestId"] == "r1" && l["event"]["type"] == "aborted")
        .unwrap();
    assert!(ack < r1_end, "ack written while r1 was still running");

    for id in ["r2", "r3"] {
        let envelopes = for_request(&lines, id);
        assert_eq!(kinds(&envelopes).last().map(String::as_str), Some("complete"));
        assert_eq!(seqs(&envelopes), (1..=7).collect::<Vec<u64>>());
    }
}
