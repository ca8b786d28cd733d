//! Streaming error shield and SSE channel tests

use switchyard::sse::{self, forward_stream, SseEvent, SSE_CONTENT_TYPE};
use switchyard::ErrorCode;

mod common;
use common::test_runtime::setup_may_runtime;

#[test]
fn test_producer_error_after_one_chunk() {
    let producer = vec![Ok("chunk-1".to_string()), Err("upstream closed")];
    let mut seen = Vec::new();

    let summary = forward_stream(producer, |chunk| seen.push(chunk));

    assert_eq!(seen, vec!["chunk-1"]);
    assert_eq!(summary.forwarded, 1);
    assert!(!summary.is_complete());
    let envelope = summary.error.unwrap();
    assert_eq!(envelope.code, ErrorCode::Panic);
    assert!(envelope.message.contains("upstream closed"));
    let details = envelope.details.unwrap();
    assert_eq!(details["message"], "upstream closed");
    assert_eq!(details["forwarded"], 1);
}

#[test]
fn test_producer_panic_is_contained() {
    let producer = (0..5).map(|i| -> Result<String, String> {
        if i == 2 {
            panic!("generator blew up");
        }
        Ok(format!("n{i}"))
    });
    let mut seen = Vec::new();

    let summary = forward_stream(producer, |chunk| seen.push(chunk));

    assert_eq!(seen, vec!["n0", "n1"]);
    assert_eq!(summary.forwarded, 2);
    let envelope = summary.error.unwrap();
    assert_eq!(envelope.code, ErrorCode::Panic);
    assert!(envelope.message.contains("generator blew up"));
}

#[test]
fn test_complete_stream_has_no_error() {
    let producer = ["a", "b", "c"].map(|s| Ok::<_, String>(s.to_string()));
    let mut count = 0;
    let summary = forward_stream(producer, |_chunk| count += 1);
    assert_eq!(count, 3);
    assert!(summary.is_complete());
}

#[test]
fn test_sender_forward_emits_error_event() {
    setup_may_runtime();
    let (tx, rx) = sse::channel();

    let summary = tx.forward(vec![Ok("first".to_string()), Err("db timeout")]);
    drop(tx);

    assert_eq!(summary.forwarded, 1);
    let first = rx.recv().unwrap();
    assert_eq!(first, SseEvent::data("first"));

    let failure = rx.recv().unwrap();
    assert_eq!(failure.event.as_deref(), Some("error"));
    let body: serde_json::Value = serde_json::from_str(&failure.data).unwrap();
    assert_eq!(body["code"], "panic");
    assert_eq!(body["details"]["forwarded"], 1);
    assert!(rx.recv().is_none());
}

#[test]
fn test_channel_collects_frames_from_coroutine() {
    setup_may_runtime();
    let (tx, rx) = sse::channel();

    let h = may::go!(move || {
        for i in 0..3 {
            tx.send_event(SseEvent::data(format!("tick {i}")).with_id(i.to_string()));
        }
    });
    h.join().unwrap();

    let out = rx.collect();
    assert_eq!(
        out,
        "id: 0\ndata: tick 0\n\nid: 1\ndata: tick 1\n\nid: 2\ndata: tick 2\n\n"
    );
    assert_eq!(SSE_CONTENT_TYPE, "text/event-stream");
}
