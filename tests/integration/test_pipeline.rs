//! End-to-end single-shot pipeline tests.

use serde_json::json;

use tabletalk::messages;

use crate::support::{pipeline, pipeline_with_handles, ScriptedModel, StubBackend};

fn users_rows() -> Vec<serde_json::Value> {
    vec![
        json!({"id": 1, "name": "Ada", "status": "active"}),
        json!({"id": 2, "name": "Grace", "status": "active"}),
        json!({"id": 3, "name": "Edsger", "status": "inactive"}),
    ]
}

#[tokio::test]
async fn test_count_question_end_to_end() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new()
        .reply(r#"{"type": "sql", "sql": "SELECT COUNT(*) as total FROM users;", "explanation": "Count all users"}"#)
        .reply("You have 3 users in your database.");
    let pipeline = pipeline(backend, model);

    let reply = pipeline.run("how many users do I have?", None).await;

    assert_eq!(reply.response, "You have 3 users in your database.");
    assert_eq!(
        reply.sql_query.as_deref(),
        Some("SELECT COUNT(*) as total FROM users;")
    );
    assert_eq!(reply.explanation.as_deref(), Some("Count all users"));
    assert!(reply.error.is_none());

    let result = reply.query_result.expect("count should produce a result");
    assert_eq!(result["success"], json!(true));
    assert_eq!(result["rows"][0]["count"], json!(3));
    assert_eq!(result["execution_method"], json!("exact_count"));
}

#[tokio::test]
async fn test_filtered_select_end_to_end() {
    let backend = StubBackend::with_tables(&[(
        "products",
        vec![
            json!({"id": 1, "name": "widget"}),
            json!({"id": 2, "name": "gadget"}),
        ],
    )]);
    let model = ScriptedModel::new()
        .reply(r#"{"type": "sql", "sql": "SELECT * FROM products WHERE id = 2 LIMIT 10", "explanation": "Find product 2"}"#)
        .reply("Product 2 is the gadget.");
    let pipeline = pipeline(backend, model);

    let reply = pipeline.run("show me product 2", None).await;

    assert_eq!(reply.response, "Product 2 is the gadget.");
    let result = reply.query_result.expect("select should produce a result");
    assert_eq!(result["row_count"], json!(1));
    assert_eq!(result["rows"][0]["name"], json!("gadget"));
    assert_eq!(result["execution_method"], json!("fallback_parse"));
}

#[tokio::test]
async fn test_write_attempt_is_refused_without_touching_backend() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model =
        ScriptedModel::new().reply(r#"{"type": "sql", "sql": "DELETE FROM users WHERE id = 1"}"#);
    let (pipeline, backend, model) = pipeline_with_handles(backend, model);

    let reply = pipeline.run("delete user 1", None).await;

    assert!(reply.response.contains("not allowed"));
    assert_eq!(reply.error.as_deref(), Some(reply.response.as_str()));
    assert_eq!(reply.sql_query.as_deref(), Some("DELETE FROM users WHERE id = 1"));
    assert!(reply.query_result.is_none());

    // Discovery probes ran, but nothing was executed or rendered
    let calls = backend.calls();
    assert!(calls.iter().all(|c| !c.starts_with("select:")));
    let count_calls = calls.iter().filter(|c| *c == "count:users:false").count();
    assert_eq!(count_calls, 1, "only the discovery count probe may run");
    assert_eq!(model.complete_calls(), 1, "render must not run for refused SQL");
}

#[tokio::test]
async fn test_help_question_short_circuits() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new().reply(r#"{"type": "help"}"#);
    let (pipeline, backend, _model) = pipeline_with_handles(backend, model);

    let reply = pipeline.run("hello, what can you do?", None).await;

    assert_eq!(reply.response, messages::GREETING);
    assert!(reply.query_result.is_none());
    assert!(reply.sql_query.is_none());
    assert!(reply.error.is_none());
    assert!(backend.calls().iter().all(|c| !c.starts_with("select:")));
}

#[tokio::test]
async fn test_tables_question_lists_accessible_tables() {
    let backend = StubBackend::with_tables(&[
        ("users", users_rows()),
        ("products", vec![json!({"id": 1})]),
    ]);
    let model = ScriptedModel::new().reply(r#"{"type": "tables"}"#);
    let pipeline = pipeline(backend, model);

    let reply = pipeline.run("what tables do I have?", None).await;

    assert_eq!(
        reply.response,
        "Your database has 2 tables: users, products. You can ask me to count records, \
         view data, or filter information from any of these tables."
    );
    let result = reply.query_result.expect("tables reply carries the list");
    assert_eq!(result["tables"], json!(["users", "products"]));
    assert_eq!(result["total_tables"], json!(2));
}

#[tokio::test]
async fn test_error_intent_message_becomes_the_answer() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new().reply(
        r#"{"type": "error", "message": "Table 'orders' doesn't exist. Available tables: [users]"}"#,
    );
    let pipeline = pipeline(backend, model);

    let reply = pipeline.run("count my orders", None).await;

    assert_eq!(
        reply.response,
        "Table 'orders' doesn't exist. Available tables: [users]"
    );
    // A conversational refusal is not a failure
    assert!(reply.error.is_none());
    assert!(reply.query_result.is_none());
}

#[tokio::test]
async fn test_gibberish_model_reply_degrades_to_keyword_fallback() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new()
        .reply("I am sorry, I cannot answer that.")
        .reply("You have 3 users.");
    let pipeline = pipeline(backend, model);

    let reply = pipeline.run("how many users do I have?", None).await;

    assert_eq!(reply.response, "You have 3 users.");
    assert_eq!(
        reply.sql_query.as_deref(),
        Some("SELECT COUNT(*) as total FROM users;")
    );
    let result = reply.query_result.expect("fallback SQL still executes");
    assert_eq!(result["rows"][0]["count"], json!(3));
}

#[tokio::test]
async fn test_gibberish_without_known_entity_carries_raw_text() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new().reply("forty-two, obviously");
    let pipeline = pipeline(backend, model);

    let reply = pipeline.run("what is the meaning of life?", None).await;

    assert_eq!(
        reply.response,
        "Could not parse SQL generation. AI said: forty-two, obviously"
    );
    assert!(reply.error.is_none());
}

#[tokio::test]
async fn test_unreachable_backend_reports_connection_failure() {
    let backend = StubBackend::unreachable("HTTP 500: connection refused");
    let model = ScriptedModel::new();
    let (pipeline, _backend, model) = pipeline_with_handles(backend, model);

    let reply = pipeline.run("how many users", None).await;

    assert_eq!(reply.response, messages::CONNECTION_FAILED);
    assert!(reply.error.as_deref().unwrap().contains("connection refused"));
    assert_eq!(model.complete_calls(), 0, "model must not be called");
}

#[tokio::test]
async fn test_missing_relation_counts_as_reachable_but_no_tables() {
    // The probe answers with a missing-relation error: the server is up
    // and the credentials were accepted, but nothing is accessible.
    let backend = StubBackend::with_tables(&[]);
    let model = ScriptedModel::new();
    let (pipeline, _backend, model) = pipeline_with_handles(backend, model);

    let reply = pipeline.run("how many users", None).await;

    assert_eq!(reply.response, messages::NO_PERMISSIONS);
    assert_eq!(reply.error.as_deref(), Some("No accessible tables found"));
    assert_eq!(model.complete_calls(), 0, "model must not be called");
}

#[tokio::test]
async fn test_model_outage_reports_interpretation_failure() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new().fail("rate limited");
    let pipeline = pipeline(backend, model);

    let reply = pipeline.run("how many users", None).await;

    assert_eq!(reply.response, messages::INTERPRETATION_FAILED);
    assert!(reply.error.as_deref().unwrap().contains("rate limited"));
}

#[tokio::test]
async fn test_backend_execution_failure_becomes_failed_result() {
    let backend = StubBackend::with_failing_counts(&[("users", users_rows())]);
    let model = ScriptedModel::new()
        .reply(r#"{"type": "sql", "sql": "SELECT COUNT(*) FROM users"}"#)
        .reply("I could not count your users.");
    let pipeline = pipeline(backend, model);

    let reply = pipeline.run("how many users", None).await;

    // The prose is still rendered over the failed outcome
    assert_eq!(reply.response, "I could not count your users.");
    assert!(reply.error.as_deref().unwrap().contains("permission denied"));
    assert!(reply.query_result.is_none(), "failed outcomes carry no result");
}

#[tokio::test]
async fn test_render_outage_degrades_to_fixed_sentence() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new()
        .reply(r#"{"type": "sql", "sql": "SELECT COUNT(*) FROM users"}"#)
        .fail("model offline");
    let pipeline = pipeline(backend, model);

    let reply = pipeline.run("how many users", None).await;

    assert_eq!(reply.response, messages::RENDER_FALLBACK);
    assert!(reply.error.is_none(), "the query itself succeeded");
    let result = reply.query_result.expect("result survives a render outage");
    assert_eq!(result["rows"][0]["count"], json!(3));
}

#[tokio::test]
async fn test_same_question_twice_is_deterministic() {
    let backend = StubBackend::with_tables(&[("users", users_rows())]);
    let model = ScriptedModel::new()
        .reply(r#"{"type": "sql", "sql": "SELECT COUNT(*) FROM users"}"#)
        .reply("You have 3 users.")
        .reply(r#"{"type": "sql", "sql": "SELECT COUNT(*) FROM users"}"#)
        .reply("You have 3 users.");
    let pipeline = pipeline(backend, model);

    let first = pipeline.run("how many users", None).await;
    let second = pipeline.run("how many users", None).await;

    assert_eq!(first.response, second.response);
    assert_eq!(first.sql_query, second.sql_query);
    assert_eq!(first.query_result, second.query_result);
}
