//! Session controller tests over an in-memory transport.

mod common;

use std::sync::Arc;

use clubstream::client::{ClientError, TransportError};
use clubstream::credentials::StaticCredentials;
use clubstream::model::{SessionOutcome, StreamUpdate};
use clubstream::session::{run_stream, start_stream, start_stream_with_cancel};
use clubstream::transport::Transport;
use common::{request, run_collect, split_at, Piece, ScriptedTransport};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn token(s: &str) -> StreamUpdate {
    StreamUpdate::Token(s.to_string())
}

#[tokio::test]
async fn test_token_split_mid_json_string() {
    let transport = ScriptedTransport::from_chunks([
        "event: token\ndata: {\"token\":\"Hel",
        "lo\"}\n\nevent: end\ndata: \n",
    ]);

    let (outcome, updates) = run_collect(&transport).await;

    assert_eq!(updates, vec![token("Hello"), StreamUpdate::End]);
    match outcome {
        SessionOutcome::Completed { tokens, answer } => {
            assert_eq!(tokens, 1);
            assert_eq!(answer, "Hello");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(transport.cancel_count(), 1);
}

#[tokio::test]
async fn test_multibyte_character_split_across_chunks() {
    let body = "event: token\ndata: {\"token\":\"社团\"}\n".as_bytes();
    let first = body.iter().position(|&b| b >= 0x80).unwrap();
    // Two bytes of the first character in one chunk, the third in the next.
    let transport = ScriptedTransport::new(
        split_at(body, &[first + 2])
            .into_iter()
            .map(Piece::Chunk)
            .collect(),
    );

    let (outcome, updates) = run_collect(&transport).await;

    assert_eq!(updates, vec![token("社团"), StreamUpdate::End]);
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_server_error_event_terminates() {
    let transport = ScriptedTransport::from_chunks([
        "event: error\ndata: {\"error\":\"quota exceeded\"}\nevent: token\ndata: late\n",
        "event: token\ndata: later\n",
    ]);

    let (outcome, updates) = run_collect(&transport).await;

    assert_eq!(
        updates,
        vec![StreamUpdate::Error {
            server_signaled: true,
            message: "Server error: quota exceeded".to_string(),
        }]
    );
    match outcome {
        SessionOutcome::Errored(ClientError::ServerSignaled(detail)) => {
            assert_eq!(detail, "quota exceeded")
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(transport.cancel_count(), 1);
}

#[tokio::test]
async fn test_source_event_passes_records_through() {
    let transport = ScriptedTransport::from_chunks([
        "event: source\ndata: [{\"id\":\"d1\",\"content\":\"x\",\"metadata\":{\"source\":\"a.pdf\",\"page\":1}}]\n",
    ]);

    let (_, updates) = run_collect(&transport).await;

    assert_eq!(
        updates,
        vec![
            StreamUpdate::Source(json!([
                {"id": "d1", "content": "x", "metadata": {"source": "a.pdf", "page": 1}}
            ])),
            StreamUpdate::End,
        ]
    );
}

#[tokio::test]
async fn test_chunk_boundary_invariance() {
    let body = concat!(
        "event: source\n",
        "data: [{\"id\":\"d1\",\"content\":\"社团创建流程\",\"metadata\":{\"source\":\"手册.pdf\",\"page\":5}}]\n",
        "event: token\n",
        "data: {\"token\":\"你好\"}\n",
        "data: {\"content\":\"🦀 \"}\n",
        "data: 42\n",
        "data: plain text\n",
        "\n",
        "event: heartbeat\n",
        "data: {\"token\":\"ignored\"}\n",
        "event: token\n",
        "data: {\"token\":\"done\"}\n",
        "event: end\n",
        "data: {}\n",
    )
    .as_bytes();

    let (_, expected) = run_collect(&ScriptedTransport::from_chunks([body])).await;
    assert_eq!(
        expected.iter().filter(|u| matches!(u, StreamUpdate::Token(_))).count(),
        5
    );

    for cut in 0..=body.len() {
        let transport = ScriptedTransport::new(
            split_at(body, &[cut]).into_iter().map(Piece::Chunk).collect(),
        );
        let (_, updates) = run_collect(&transport).await;
        assert_eq!(updates, expected, "split at byte {cut}");
    }

    let byte_by_byte = ScriptedTransport::from_chunks(body.iter().map(|b| vec![*b]));
    let (_, updates) = run_collect(&byte_by_byte).await;
    assert_eq!(updates, expected);

    let cuts: Vec<usize> = (3..body.len()).step_by(7).collect();
    let uneven = ScriptedTransport::new(split_at(body, &cuts).into_iter().map(Piece::Chunk).collect());
    let (_, updates) = run_collect(&uneven).await;
    assert_eq!(updates, expected);
}

#[tokio::test]
async fn test_end_finishes_current_chunk() {
    let transport = ScriptedTransport::from_chunks([
        "event: token\ndata: a\nevent: end\nevent: token\ndata: tail\n",
        "event: token\ndata: never\n",
    ]);

    let (outcome, updates) = run_collect(&transport).await;

    assert_eq!(updates, vec![token("a"), token("tail"), StreamUpdate::End]);
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_close_without_end_completes() {
    let transport = ScriptedTransport::from_chunks(["event: token\ndata: a\n", "data: b"]);

    let (outcome, updates) = run_collect(&transport).await;

    // The unterminated last line is processed when the body closes.
    assert_eq!(updates, vec![token("a"), token("b"), StreamUpdate::End]);
    assert!(outcome.is_completed());
    assert_eq!(transport.cancel_count(), 1);
}

#[tokio::test]
async fn test_truncated_character_at_close_errors() {
    let mut body = b"event: token\ndata: x\n".to_vec();
    body.extend_from_slice(&"社".as_bytes()[..2]);
    let transport = ScriptedTransport::new(vec![Piece::Chunk(body)]);

    let (outcome, updates) = run_collect(&transport).await;

    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0], token("x"));
    assert!(matches!(
        updates[1],
        StreamUpdate::Error {
            server_signaled: false,
            ..
        }
    ));
    assert!(matches!(outcome, SessionOutcome::Errored(ClientError::Decode(_))));
    assert_eq!(transport.cancel_count(), 1);
}

#[tokio::test]
async fn test_transport_failure_mid_stream() {
    let transport = ScriptedTransport::new(vec![
        Piece::Chunk(b"event: token\ndata: a\n".to_vec()),
        Piece::Fail("connection reset".to_string()),
        Piece::Chunk(b"data: b\n".to_vec()),
    ]);

    let (outcome, updates) = run_collect(&transport).await;

    assert_eq!(updates[0], token("a"));
    assert_eq!(updates.len(), 2);
    assert!(matches!(
        outcome,
        SessionOutcome::Errored(ClientError::Transport(TransportError::Io(_)))
    ));
    assert_eq!(transport.cancel_count(), 1);
}

#[tokio::test]
async fn test_connect_failure_reports_error() {
    let transport = ScriptedTransport::failing_with_status(502);

    let (outcome, updates) = run_collect(&transport).await;

    assert_eq!(
        updates,
        vec![StreamUpdate::Error {
            server_signaled: false,
            message: "Transport error: HTTP 502: scripted failure".to_string(),
        }]
    );
    assert!(matches!(
        outcome,
        SessionOutcome::Errored(ClientError::Transport(TransportError::Status { status: 502, .. }))
    ));
    assert_eq!(transport.cancel_count(), 0);
}

#[tokio::test]
async fn test_cancelled_before_connect() {
    let transport = ScriptedTransport::from_chunks(["event: token\ndata: a\n"]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let (mut tx, mut rx) = mpsc::unbounded_channel();
    let outcome = run_stream(&transport, request(), &mut tx, &cancel).await;

    assert!(outcome.is_cancelled());
    assert_eq!(rx.recv().await, Some(StreamUpdate::Cancelled));
    assert_eq!(transport.cancel_count(), 0);
}

#[tokio::test]
async fn test_cancel_running_session() {
    let transport = Arc::new(ScriptedTransport::from_chunks(["event: token\ndata: first\n"]).hanging());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = start_stream(
        transport.clone() as Arc<dyn Transport>,
        &StaticCredentials::none(),
        request(),
        tx,
    )
    .unwrap();

    assert_eq!(rx.recv().await, Some(token("first")));
    assert!(!handle.is_finished());

    handle.cancel();
    let outcome = handle.join().await.unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(rx.recv().await, Some(StreamUpdate::Cancelled));
    assert_eq!(rx.recv().await, None);
    assert_eq!(transport.cancel_count(), 1);
}

#[tokio::test]
async fn test_caller_supplied_token_cancels() {
    let transport = Arc::new(ScriptedTransport::from_chunks(Vec::<&str>::new()).hanging());
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = start_stream_with_cancel(
        transport.clone() as Arc<dyn Transport>,
        &StaticCredentials::none(),
        request(),
        tx,
        cancel.child_token(),
    )
    .unwrap();

    cancel.cancel();
    assert!(handle.join().await.unwrap().is_cancelled());
    assert_eq!(rx.recv().await, Some(StreamUpdate::Cancelled));
}

#[tokio::test]
async fn test_dropping_handle_cancels_session() {
    let transport = Arc::new(ScriptedTransport::from_chunks(["event: token\ndata: first\n"]).hanging());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = start_stream(
        transport.clone() as Arc<dyn Transport>,
        &StaticCredentials::none(),
        request(),
        tx,
    )
    .unwrap();

    assert_eq!(rx.recv().await, Some(token("first")));
    drop(handle);

    assert_eq!(rx.recv().await, Some(StreamUpdate::Cancelled));
    assert_eq!(rx.recv().await, None);
    assert_eq!(transport.cancel_count(), 1);
}

#[tokio::test]
async fn test_detached_session_keeps_running() {
    let transport = Arc::new(ScriptedTransport::from_chunks(["event: token\ndata: first\n"]).hanging());
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let task = start_stream_with_cancel(
        transport.clone() as Arc<dyn Transport>,
        &StaticCredentials::none(),
        request(),
        tx,
        cancel.clone(),
    )
    .unwrap()
    .detach();

    assert_eq!(rx.recv().await, Some(token("first")));
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!task.is_finished());
    assert_eq!(transport.cancel_count(), 0);

    cancel.cancel();
    assert!(task.await.unwrap().is_cancelled());
    assert_eq!(rx.recv().await, Some(StreamUpdate::Cancelled));
}

#[tokio::test]
async fn test_missing_credentials_rejects_start() {
    let transport = Arc::new(ScriptedTransport::from_chunks(["event: end\n"]));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let result = start_stream(
        transport.clone() as Arc<dyn Transport>,
        &StaticCredentials::none(),
        request().with_auth_required(true),
        tx,
    );

    assert!(matches!(result, Err(ClientError::MissingCredentials)));
    assert_eq!(rx.recv().await, None);
    assert!(transport.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let transport = Arc::new(ScriptedTransport::from_chunks(["event: end\n"]));
    let (tx, _rx) = mpsc::unbounded_channel();

    let handle = start_stream(
        transport.clone() as Arc<dyn Transport>,
        &StaticCredentials::new("jwt-123"),
        request().with_auth_required(true),
        tx,
    )
    .unwrap();
    assert!(handle.join().await.unwrap().is_completed());

    let requests = transport.requests.lock().unwrap();
    assert_eq!(
        requests[0].headers.get("Authorization").map(String::as_str),
        Some("Bearer jwt-123")
    );
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let search = Arc::new(ScriptedTransport::from_chunks([
        "event: token\ndata: {\"token\":\"se",
        "arch\"}\nevent: end\n",
    ]));
    let chat = Arc::new(ScriptedTransport::from_chunks([
        "event: token\ndata: {\"token\":\"ch",
        "at\"}\n",
    ]));

    let (search_tx, mut search_rx) = mpsc::unbounded_channel();
    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
    let credentials = StaticCredentials::none();

    let a = start_stream(search.clone() as Arc<dyn Transport>, &credentials, request(), search_tx).unwrap();
    let b = start_stream(chat.clone() as Arc<dyn Transport>, &credentials, request(), chat_tx).unwrap();

    assert!(a.join().await.unwrap().is_completed());
    assert!(b.join().await.unwrap().is_completed());

    assert_eq!(search_rx.recv().await, Some(token("search")));
    assert_eq!(chat_rx.recv().await, Some(token("chat")));
}
