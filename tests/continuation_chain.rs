mod common;
use common::{settings, StubTransport};

use connector_kit::{
    Action, Connector, EngineError, ErrorKind, RawResponse, RequestBuilder, Runner, Step,
};
use serde_json::json;

fn connector() -> Connector {
    Connector::new("Chains")
        .base_uri(|settings| {
            settings
                .get("base")
                .and_then(|v| v.as_str())
                .unwrap_or("https://api.example.com")
                .to_string()
        })
        .action(Action::new("three_hops", |ctx| {
            Ok(Step::Request(ctx.get("one").after_response(|response| {
                assert_eq!(response.body()?, &json!("one"));
                Ok(Step::Request(RequestBuilder::get("two").after_response(
                    |response| {
                        assert_eq!(response.body()?, &json!("two"));
                        Ok(Step::Request(RequestBuilder::get("three")))
                    },
                )))
            })))
        }))
        .action(Action::new("fails_on_second_hop", |ctx| {
            Ok(Step::Request(ctx.get("one").after_response(|_| {
                Ok(Step::Request(RequestBuilder::get("two").after_response(
                    |_| {
                        Err(EngineError::runtime("second hop failed"))
                    },
                )))
            })))
        }))
        .action(Action::new("user_error_in_continuation", |ctx| {
            Ok(Step::Request(
                ctx.get("one")
                    .after_response(|response| Err(EngineError::user(format!("status {}", response.status())))),
            ))
        }))
        .action(Action::new("bad_json_in_continuation", |ctx| {
            Ok(Step::Request(ctx.get("one").after_response(|response| {
                let body = response.body()?.clone();
                Ok(Step::Done(body))
            })))
        }))
}

#[tokio::test]
async fn chain_resolves_to_the_innermost_value() {
    let stub = StubTransport::new([
        RawResponse::json(200, &json!("one")),
        RawResponse::json(200, &json!("two")),
        RawResponse::json(200, &json!({"response": "three"})),
    ]);
    let mut runner = Runner::new(connector(), settings(json!({})), stub.clone());

    let value = runner.invoke("three_hops", json!({})).await.expect("chain");
    assert_eq!(value, json!({"response": "three"}));

    let paths: Vec<String> = stub.sent().iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(paths, vec!["/one", "/two", "/three"]);
}

#[tokio::test]
async fn followups_use_the_connection_base_uri() {
    let stub = StubTransport::new([
        RawResponse::json(200, &json!("one")),
        RawResponse::json(200, &json!("two")),
        RawResponse::json(200, &json!(null)),
    ]);
    let mut runner = Runner::new(
        connector(),
        settings(json!({"base": "https://eu.example.com/api/v2"})),
        stub.clone(),
    );

    runner.invoke("three_hops", json!({})).await.expect("chain");
    let urls: Vec<String> = stub.sent().iter().map(|r| r.url.to_string()).collect();
    assert_eq!(
        urls,
        vec![
            "https://eu.example.com/api/v2/one",
            "https://eu.example.com/api/v2/two",
            "https://eu.example.com/api/v2/three",
        ]
    );
}

#[tokio::test]
async fn failure_trace_lists_each_boundary_in_call_order() {
    let stub = StubTransport::new([
        RawResponse::json(200, &json!("one")),
        RawResponse::json(200, &json!("two")),
    ]);
    let mut runner = Runner::new(connector(), settings(json!({})), stub.clone());

    let err = runner
        .invoke("fails_on_second_hop", json!({}))
        .await
        .expect_err("second hop raises");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "second hop failed");
    assert_eq!(err.trace.len(), 3, "two boundaries plus the raising site");
    assert!(err.trace.iter().all(|frame| frame.file == file!()));
    assert!(
        err.trace.windows(2).all(|pair| pair[0].line < pair[1].line),
        "frames are in call order: {:?}",
        err.trace
    );
    assert_eq!(stub.sent_count(), 2);
}

#[tokio::test]
async fn user_errors_keep_their_message_and_boundary() {
    let stub = StubTransport::new([RawResponse::json(418, &json!({}))]);
    let mut runner = Runner::new(connector(), settings(json!({})), stub);

    let err = runner
        .invoke("user_error_in_continuation", json!({}))
        .await
        .expect_err("user error");
    assert_eq!(err.kind, ErrorKind::User);
    assert_eq!(err.message, "status 418");
    assert_eq!(err.trace.len(), 1);
    assert_eq!(err.trace[0].file, file!());
}

#[tokio::test]
async fn engine_frames_are_trimmed_from_the_trace() {
    let stub = StubTransport::new([RawResponse::new(200).with_body("<html>")]);
    let mut runner = Runner::new(connector(), settings(json!({})), stub);

    let err = runner
        .invoke("bad_json_in_continuation", json!({}))
        .await
        .expect_err("invalid json");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("not valid JSON"));
    assert_eq!(err.trace.len(), 1, "only the continuation boundary survives");
    assert_eq!(err.trace[0].file, file!());
}
