//! End-to-end request flows through the ingest loop and engine.

use std::sync::Arc;

use research_core::handlers::ModeHandlers;
use research_core::providers::offline::EchoProvider;

use super::test_helpers::{
    for_request, hit, kinds, seqs, terminal_count, Harness, ScriptedLlm, StaticSearch, SESSION_ID,
};

#[tokio::test]
async fn chat_request_streams_then_completes() {
    let mut h = Harness::offline().await;
    h.feed("{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"hello\"}\n")
        .await;

    let lines = h.drain();
    assert_eq!(lines.len(), 2);
    let r1 = for_request(&lines, "r1");
    assert_eq!(kinds(&r1), vec!["content_delta", "complete"]);
    assert_eq!(seqs(&r1), vec![1, 2]);
    assert!(r1[0]["event"]["text"].as_str().unwrap().contains("hello"));
    assert!(r1.iter().all(|e| e["sessionId"] == SESSION_ID));
}

#[tokio::test]
async fn chat_forwards_each_provider_fragment() {
    let handlers = ModeHandlers::new(
        Arc::new(ScriptedLlm::new(&["Ownership ", "means ", "one owner."])),
        Arc::new(StaticSearch(vec![])),
    );
    let mut h = Harness::new(handlers).await;
    h.feed("{\"type\":\"chat\",\"requestId\":\"r1\",\"content\":\"ownership?\"}\n")
        .await;

    let lines = h.drain();
    let r1 = for_request(&lines, "r1");
    assert_eq!(
        kinds(&r1),
        vec!["content_delta", "content_delta", "content_delta", "complete"]
    );
    assert_eq!(seqs(&r1), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn plan_request_emits_one_delta_with_query() {
    let mut h = Harness::offline().await;
    h.feed("{\"type\":\"plan\",\"requestId\":\"r2\",\"content\":\"quantum computing\"}\n")
        .await;

    let lines = h.drain();
    let r2 = for_request(&lines, "r2");
    assert_eq!(kinds(&r2), vec!["content_delta", "complete"]);
    assert!(r2[0]["event"]["text"]
        .as_str()
        .unwrap()
        .contains("quantum computing"));
}

#[tokio::test]
async fn research_request_follows_phase_order() {
    let handlers = ModeHandlers::new(
        Arc::new(EchoProvider),
        Arc::new(StaticSearch(vec![hit(
            "Understanding Ownership",
            "https://doc.rust-lang.org/book/ch04-00-understanding-ownership.html",
        )])),
    );
    let mut h = Harness::new(handlers).await;
    h.feed("{\"type\":\"research\",\"requestId\":\"r3\",\"content\":\"rust ownership\"}\n")
        .await;

    let lines = h.drain();
    let r3 = for_request(&lines, "r3");
    assert_eq!(
        kinds(&r3),
        vec![
            "phase_status",
            "tool_call",
            "tool_result",
            "phase_status",
            "content_delta",
            "complete"
        ]
    );
    assert_eq!(seqs(&r3), vec![1, 2, 3, 4, 5, 6]);

    assert_eq!(r3[0]["event"]["phase"], "planning");
    assert_eq!(r3[0]["event"]["status"], "working");
    assert_eq!(r3[1]["event"]["tool"], "exa");
    assert_eq!(r3[1]["event"]["query"], "rust ownership");
    assert_eq!(r3[2]["event"]["tool"], "exa");
    assert_eq!(r3[2]["event"]["success"], true);
    assert_eq!(r3[3]["event"]["phase"], "synthesizing");

    let text = r3[4]["event"]["text"].as_str().unwrap();
    assert!(text.contains("rust ownership"));
    assert!(text.contains("## Citations"));
    assert!(text.contains("1. Understanding Ownership - https://doc.rust-lang.org/book/"));
}

#[tokio::test]
async fn research_with_offline_search_completes() {
    let mut h = Harness::offline().await;
    h.feed("{\"type\":\"research\",\"requestId\":\"r3\",\"content\":\"rust ownership\"}\n")
        .await;

    let lines = h.drain();
    let r3 = for_request(&lines, "r3");
    assert_eq!(r3.len(), 6);
    assert_eq!(r3[2]["event"]["summary"], "Exa search placeholder");
    assert_eq!(r3[5]["event"]["type"], "complete");
}

#[tokio::test]
async fn consecutive_requests_each_restart_at_seq_one() {
    let mut h = Harness::offline().await;
    h.feed(concat!(
        "{\"type\":\"research\",\"requestId\":\"a\",\"content\":\"x\"}\n",
        "{\"type\":\"chat\",\"requestId\":\"b\",\"content\":\"y\"}\n",
        "{\"type\":\"plan\",\"requestId\":\"c\",\"content\":\"z\"}\n",
    ))
    .await;

    let lines = h.drain();
    assert_eq!(seqs(&for_request(&lines, "a")), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(seqs(&for_request(&lines, "b")), vec![1, 2]);
    assert_eq!(seqs(&for_request(&lines, "c")), vec![1, 2]);
}

#[tokio::test]
async fn requests_never_interleave_and_end_with_one_terminal() {
    let mut h = Harness::offline().await;
    let mut input = String::new();
    for i in 0..6 {
        let mode = ["chat", "plan", "research"][i % 3];
        input.push_str(&format!(
            "{{\"type\":\"{mode}\",\"requestId\":\"req_{i}\",\"content\":\"topic {i}\"}}\n"
        ));
    }
    h.feed(&input).await;

    let lines = h.drain();
    let order: Vec<&str> = lines
        .iter()
        .map(|l| l["requestId"].as_str().unwrap())
        .collect();
    let mut seen: Vec<&str> = Vec::new();
    for &id in &order {
        if seen.last() != Some(&id) {
            assert!(!seen.contains(&id), "request {id} interleaved: {order:?}");
            seen.push(id);
        }
    }

    for i in 0..6 {
        let envelopes = for_request(&lines, &format!("req_{i}"));
        assert_eq!(terminal_count(&envelopes), 1);
        let last = envelopes.last().unwrap();
        assert!(matches!(
            last["event"]["type"].as_str(),
            Some("complete" | "aborted" | "error")
        ));
        let expected: Vec<u64> = (1..=envelopes.len() as u64).collect();
        assert_eq!(seqs(&envelopes), expected);
    }
}

#[tokio::test]
async fn omitted_fields_use_defaults() {
    let mut h = Harness::offline().await;
    h.feed("{\"type\":\"chat\"}\n").await;

    let lines = h.drain();
    let default = for_request(&lines, "req_default");
    assert_eq!(kinds(&default), vec!["content_delta", "complete"]);
    assert_eq!(default[0]["event"]["text"], "Chat mode: ");
}

#[tokio::test]
async fn reused_request_id_fails_without_touching_the_original() {
    let mut h = Harness::offline().await;
    h.feed(concat!(
        "{\"type\":\"chat\",\"requestId\":\"dup\",\"content\":\"first\"}\n",
        "{\"type\":\"chat\",\"requestId\":\"dup\",\"content\":\"second\"}\n",
    ))
    .await;

    let lines = h.drain();
    let dup = for_request(&lines, "dup");
    assert_eq!(kinds(&dup), vec!["content_delta", "complete", "error"]);
    assert_eq!(seqs(&dup), vec![1, 2, 1]);
    assert_eq!(dup[2]["event"]["message"], "duplicate request id: dup");
    assert_eq!(dup[2]["event"]["recoverable"], false);

    let stored = h.store().get_request("dup").await.unwrap().unwrap();
    assert_eq!(stored.user_content, "first");
    assert_eq!(stored.assistant_content.as_deref(), Some("Chat mode: first"));
}

#[tokio::test]
async fn set_mode_writes_nothing_and_updates_session() {
    let mut h = Harness::offline().await;
    h.feed("{\"type\":\"set_mode\",\"mode\":\"research\"}\n{\"type\":\"set_mode\",\"mode\":\"bogus\"}\n")
        .await;

    assert!(h.drain().is_empty());
    let session = h.store().get_session(SESSION_ID).await.unwrap().unwrap();
    assert_eq!(session.mode.as_str(), "research");
}
