// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end queue operations against a mock HTTP server, including the
//! byte-exact request bodies the service expects.

use futures::StreamExt;
use mq_stream::{ClientOptions, ErrorKind, MqClient, Queue, QueryParams};
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn options_for(server: &MockServer) -> ClientOptions {
    let addr = server.address();
    ClientOptions {
        protocol: "http".into(),
        host: addr.ip().to_string(),
        port: addr.port(),
        api_version: "1".into(),
        request_timeout_secs: None,
    }
}

fn queue_for(server: &MockServer) -> Queue {
    init_tracing();
    MqClient::new("test-token", options_for(server))
        .unwrap()
        .project("proj")
        .unwrap()
        .queue("jobs")
        .unwrap()
}

#[tokio::test]
async fn read_streams_messages_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/projects/proj/queues/jobs/messages"))
        .and(query_param("n", "5"))
        .and(header("Authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                {"id": "m1", "body": "first"},
                {"id": "m2", "body": "second"},
            ]
        })))
        .mount(&server)
        .await;

    let queue = queue_for(&server);
    let messages = queue
        .read_with(&QueryParams::batch(5))
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(
        messages,
        vec![
            json!({"id": "m1", "body": "first"}),
            json!({"id": "m2", "body": "second"}),
        ]
    );
}

#[tokio::test]
async fn read_of_empty_queue_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
        .mount(&server)
        .await;

    let messages = queue_for(&server).read().unwrap().collect_all().await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn write_sends_exact_array_framed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/projects/proj/queues/jobs/messages"))
        .and(header("Content-Type", "application/json"))
        .and(body_string(
            "{\n\"messages\":\n[{\"body\":\"hello\"}\n,\n{\"body\":\"world\"}\n]\n}\n",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ids": ["1", "2"], "msg": "Messages put on queue."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let writer = queue_for(&server).write().unwrap();
    writer.send("hello").await.unwrap();
    writer.send("world").await.unwrap();
    let reply = writer.finish().await.unwrap();
    assert_eq!(reply["ids"], json!(["1", "2"]));
}

#[tokio::test]
async fn write_serializes_structured_items_as_json_strings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string(
            "{\n\"messages\":\n[{\"body\":\"{\\\"task\\\":42}\"}\n]\n}\n",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ids": ["1"]})))
        .expect(1)
        .mount(&server)
        .await;

    let writer = queue_for(&server).write().unwrap();
    writer.send(json!({"task": 42})).await.unwrap();
    writer.finish().await.unwrap();
}

#[tokio::test]
async fn write_of_no_items_sends_empty_array_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string("{\n\"messages\":\n[\n]\n}\n"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ids": []})))
        .expect(1)
        .mount(&server)
        .await;

    let writer = queue_for(&server).write().unwrap();
    writer.finish().await.unwrap();
}

#[tokio::test]
async fn delete_sends_exact_single_value_framed_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/1/projects/proj/queues/jobs/messages"))
        .and(body_string("{\n\"ids\":\n[\"101\",\"102\"]\n}\n"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg": "Deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    let batch = queue_for(&server).delete().unwrap();
    // Numeric ids are stringified on the wire.
    batch.push(101).await.unwrap();
    batch.push("102").await.unwrap();
    batch.finish().await.unwrap();
}

#[tokio::test]
async fn delete_of_no_ids_sends_empty_array() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(body_string("{\n\"ids\":\n[]\n}\n"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg": "Deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    let batch = queue_for(&server).delete().unwrap();
    batch.finish().await.unwrap();
}

#[tokio::test]
async fn delete_is_idempotent_at_the_wire_level() {
    // Deleting the same batch twice sends the same payload twice; the
    // service answers 200 both times and both calls succeed.
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(body_string("{\n\"ids\":\n[\"7\"]\n}\n"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg": "Deleted"})))
        .expect(2)
        .mount(&server)
        .await;

    let queue = queue_for(&server);
    for _ in 0..2 {
        let batch = queue.delete().unwrap();
        batch.push("7").await.unwrap();
        batch.finish().await.unwrap();
    }
}

#[tokio::test]
async fn delete_rejects_structured_ids() {
    let server = MockServer::start().await;
    let batch = queue_for(&server).delete().unwrap();
    batch.push(json!({"id": 1})).await.unwrap();
    let err = batch.finish().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn clear_succeeds_on_cleared_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/projects/proj/queues/jobs/clear"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg": "Cleared"})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = queue_for(&server).clear().await.unwrap();
    assert_eq!(reply["msg"], "Cleared");
}

#[tokio::test]
async fn clear_with_wrong_marker_is_a_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg": "Busy"})))
        .mount(&server)
        .await;

    let err = queue_for(&server).clear().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("Busy"));
}

#[tokio::test]
async fn truncated_read_response_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(&br#"{"messages":[{"id":"m1""#[..], "application/json"),
        )
        .mount(&server)
        .await;

    let mut stream = queue_for(&server).read().unwrap();
    let err = loop {
        match stream.next().await {
            Some(Ok(_)) => continue,
            Some(Err(err)) => break err,
            None => panic!("truncated body must surface an error"),
        }
    };
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn non_success_read_status_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("queue not found"))
        .mount(&server)
        .await;

    let err = queue_for(&server).read().unwrap().collect_all().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn non_success_write_status_surfaces_at_finish() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let writer = queue_for(&server).write().unwrap();
    writer.send("item").await.unwrap();
    let err = writer.finish().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn dropping_a_read_stream_abandons_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"messages": [{"id": "m1"}, {"id": "m2"}]}))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let stream = queue_for(&server).read().unwrap();
    drop(stream);
    // No panic, no hang; a fresh pipeline on the same queue still works.
    let messages = queue_for(&server).read().unwrap().collect_all().await.unwrap();
    assert_eq!(messages.len(), 2);
}
