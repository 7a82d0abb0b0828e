//! End-to-end streaming pipeline tests.
//!
//! Each test collects the full event sequence from `run_stream` and
//! asserts on ordering and terminal shape. The `done` marker is a web
//! layer concern and never appears here.

use serde_json::json;
use tokio::sync::mpsc;

use tabletalk::messages;
use tabletalk::pipeline::{Event, Stage};

use crate::support::{pipeline, ScriptedModel, StubBackend};

fn users_rows() -> Vec<serde_json::Value> {
    vec![
        json!({"id": 1, "name": "Ada"}),
        json!({"id": 2, "name": "Grace"}),
        json!({"id": 3, "name": "Edsger"}),
    ]
}

async fn collect_events(mut rx: mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn stages(events: &[Event]) -> Vec<Stage> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Status { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect()
}

fn chunks(events: &[Event]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ResponseChunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_help_stream_is_exactly_four_events() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new().reply(r#"{"type": "help"}"#);
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("hello", None)).await;

    assert_eq!(events.len(), 4, "help takes three stages and one reply: {events:?}");
    assert_eq!(
        stages(&events),
        vec![
            Stage::Connecting,
            Stage::AnalyzingSchema,
            Stage::InterpretingQuery
        ]
    );
    match &events[3] {
        Event::Response {
            message,
            query_result,
        } => {
            assert_eq!(message, messages::GREETING);
            assert!(query_result.is_none());
        }
        other => panic!("expected a response event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sql_stream_full_sequence() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new()
        .reply(r#"{"type": "sql", "sql": "SELECT COUNT(*) as total FROM users;", "explanation": "Count all users"}"#)
        .stream(vec![Ok("You "), Ok("have 3 users.")]);
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("how many users", None)).await;

    assert_eq!(events.len(), 8, "5 statuses, 2 chunks, 1 final: {events:?}");
    assert_eq!(
        stages(&events),
        vec![
            Stage::Connecting,
            Stage::AnalyzingSchema,
            Stage::InterpretingQuery,
            Stage::ExecutingQuery,
            Stage::GeneratingResponse,
        ]
    );
    assert_eq!(chunks(&events), vec!["You ", "have 3 users."]);

    match events.last() {
        Some(Event::Final {
            query_result,
            sql_query,
            explanation,
            error,
        }) => {
            assert_eq!(sql_query, "SELECT COUNT(*) as total FROM users;");
            assert_eq!(explanation.as_deref(), Some("Count all users"));
            assert!(error.is_none());
            let result = query_result.as_ref().expect("success carries the result");
            assert_eq!(result["rows"][0]["count"], json!(3));
        }
        other => panic!("expected a final event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_status_messages_match_stages() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new().reply(r#"{"type": "help"}"#);
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("hello", None)).await;

    for event in &events {
        if let Event::Status { stage, message } = event {
            assert_eq!(*message, stage.message());
        }
    }
    match &events[0] {
        Event::Status { message, .. } => assert_eq!(*message, "Connecting to database..."),
        other => panic!("expected a status event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsafe_sql_stream_emits_terminal_error() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model =
        ScriptedModel::new().reply(r#"{"type": "sql", "sql": "DELETE FROM users WHERE id = 1"}"#);
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("delete user 1", None)).await;

    assert_eq!(events.len(), 4, "refusal precedes the execution stage: {events:?}");
    assert!(!stages(&events).contains(&Stage::ExecutingQuery));
    match events.last() {
        Some(Event::Error { message, error }) => {
            assert!(message.contains("not allowed"));
            assert_eq!(message, error);
        }
        other => panic!("expected an error event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_failure_stream() {
    let backend = StubBackend::unreachable("HTTP 500: connection refused");
    let model = ScriptedModel::new();
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("how many users", None)).await;

    assert_eq!(events.len(), 2);
    assert_eq!(stages(&events), vec![Stage::Connecting]);
    match events.last() {
        Some(Event::Error { message, error }) => {
            assert_eq!(message, messages::CONNECTION_FAILED);
            assert!(error.contains("connection refused"));
        }
        other => panic!("expected an error event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_accessible_tables_stream() {
    let backend = StubBackend::with_tables(&[]);
    let model = ScriptedModel::new();
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("how many users", None)).await;

    assert_eq!(events.len(), 3);
    assert_eq!(stages(&events), vec![Stage::Connecting, Stage::AnalyzingSchema]);
    match events.last() {
        Some(Event::Error { message, error }) => {
            assert_eq!(message, messages::NO_PERMISSIONS);
            assert_eq!(error, "No accessible tables found");
        }
        other => panic!("expected an error event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_model_outage_stream() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new().fail("rate limited");
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("how many users", None)).await;

    assert_eq!(events.len(), 4);
    match events.last() {
        Some(Event::Error { message, error }) => {
            assert_eq!(message, messages::INTERPRETATION_FAILED);
            assert!(error.contains("rate limited"));
        }
        other => panic!("expected an error event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_midflight_stream_failure_recovers_with_full_text() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new()
        .reply(r#"{"type": "sql", "sql": "SELECT COUNT(*) FROM users"}"#)
        .reply("You have 3 users.")
        .stream(vec![Ok("You ha"), Err("connection reset")]);
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("how many users", None)).await;

    // The partial chunk is followed by one complete recovery chunk,
    // then the normal final event.
    assert_eq!(chunks(&events), vec!["You ha", "You have 3 users."]);
    assert!(matches!(events.last(), Some(Event::Final { error: None, .. })));
}

#[tokio::test]
async fn test_execution_failure_stream_still_renders() {
    let backend = StubBackend::with_failing_counts(&[("users", users_rows())]);
    let model = ScriptedModel::new()
        .reply(r#"{"type": "sql", "sql": "SELECT COUNT(*) FROM users"}"#)
        .stream(vec![Ok("I could not "), Ok("count your users.")]);
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("how many users", None)).await;

    assert_eq!(chunks(&events), vec!["I could not ", "count your users."]);
    match events.last() {
        Some(Event::Final {
            query_result,
            error,
            ..
        }) => {
            assert!(query_result.is_none(), "failed outcomes carry no result");
            assert!(error.as_deref().unwrap().contains("permission denied"));
        }
        other => panic!("expected a final event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_tables_intent_stream_carries_table_list() {
    let backend = StubBackend::with_tables(&[
        ("users", users_rows()),
        ("products", vec![json!({"id": 1})]),
    ]);
    let model = ScriptedModel::new().reply(r#"{"type": "tables"}"#);
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("what tables do I have?", None)).await;

    match events.last() {
        Some(Event::Response {
            message,
            query_result,
        }) => {
            assert!(message.starts_with("Your database has 2 tables: users, products."));
            let result = query_result.as_ref().expect("tables reply carries the list");
            assert_eq!(result["total_tables"], json!(2));
        }
        other => panic!("expected a response event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_intent_stream_responds_conversationally() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new()
        .reply(r#"{"type": "error", "message": "Table 'orders' doesn't exist. Available tables: [users]"}"#);
    let pipeline = pipeline(backend, model);

    let events = collect_events(pipeline.run_stream("count my orders", None)).await;

    assert_eq!(events.len(), 4);
    match events.last() {
        Some(Event::Response {
            message,
            query_result,
        }) => {
            assert_eq!(message, "Table 'orders' doesn't exist. Available tables: [users]");
            assert!(query_result.is_none());
        }
        other => panic!("expected a response event, got {other:?}"),
    }
}
