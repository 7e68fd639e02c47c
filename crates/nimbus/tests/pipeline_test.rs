//! Pipeline behavior against the mock transport

mod common;

use assert_matches::assert_matches;
use common::{GateAuth, direct_client, gated_client, settle};
use nimbus::{ClientState, Error, Method, RequestDescriptor, RequestOptions};
use nimbus_transport::{HttpResponse, MockTransport, TransportError};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

#[tokio::test]
async fn test_hooks_then_url_then_query() {
    let transport = MockTransport::new();
    let client = direct_client(&transport);
    client.register_hook(|_: &ClientState, d: &RequestDescriptor| {
        let mut next = d.clone();
        next.path.push("detail");
        Some(next)
    });
    client.register_hook(|_: &ClientState, d: &RequestDescriptor| {
        Some(d.clone().header("x-seen-path", d.path.segments().join("/")))
    });

    client
        .request(RequestOptions::with_query(
            Method::GET,
            "servers",
            [("limit", "10"), ("name", "web 1")],
        ))
        .outcome()
        .await
        .unwrap();

    let sent = transport.requests().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].url,
        "http://cloud.test/v1/acct/servers/detail?limit=10&name=web+1"
    );
    assert_eq!(sent[0].header("x-seen-path"), Some("servers/detail"));
}

#[tokio::test]
async fn test_unlisted_status_is_success() {
    let transport = MockTransport::new();
    transport.respond(202, "accepted").await;
    let client = direct_client(&transport);

    let reply = client.get("servers").outcome().await.unwrap();
    assert_eq!(reply.response.status, 202);
    assert_eq!(reply.text().unwrap(), "accepted");
}

#[tokio::test]
async fn test_listed_status_is_provider_error() {
    let transport = MockTransport::new();
    transport
        .respond(413, r#"{"overLimit":{"code":413,"retryAfter":"60"}}"#)
        .await;
    let client = direct_client(&transport);

    let err = client.get("servers").outcome().await.unwrap_err();
    assert_eq!(err.to_string(), "testcloud Error (413): Over Limit");
    assert_eq!(err.result().unwrap()["overLimit"]["retryAfter"], "60");
}

#[tokio::test]
async fn test_transport_failure_surfaces() {
    let transport = MockTransport::new();
    transport
        .fail(TransportError::Connection("refused".into()))
        .await;
    let client = direct_client(&transport);

    let err = client.get("servers").outcome().await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_nothing_dispatched_before_auth() {
    let transport = MockTransport::new();
    let auth = GateAuth::new();
    let client = gated_client(&transport, &auth);

    let handle = client.get("servers");
    assert!(handle.is_buffered());
    settle().await;
    assert_eq!(transport.request_count().await, 0);
    assert_eq!(auth.calls(), 1);

    auth.release();
    handle.outcome().await.unwrap();
    assert_eq!(transport.request_count().await, 1);
    assert!(client.is_authorized());
}

#[tokio::test]
async fn test_buffered_upload_keeps_order_and_sets_length() {
    let transport = MockTransport::new();
    let auth = GateAuth::new();
    let client = gated_client(&transport, &auth);

    let handle = client.upload(["photos", "cat.jpg"]);
    handle.write("a").unwrap();
    handle.write("b").unwrap();
    handle.write("c").unwrap();
    handle.end();

    auth.release();
    handle.outcome().await.unwrap();

    let sent = transport.requests().await;
    assert_eq!(sent[0].method, "PUT");
    assert_eq!(sent[0].url, "http://cloud.test/v1/acct/photos/cat.jpg");
    assert_eq!(&sent[0].body[..], b"abc");
    assert_eq!(sent[0].header("content-length"), Some("3"));
    assert_eq!(sent[0].header("transfer-encoding"), None);
}

#[tokio::test]
async fn test_open_upload_is_chunked() {
    let transport = MockTransport::new();
    let auth = GateAuth::new();
    let client = gated_client(&transport, &auth);

    let handle = client.upload("big.bin");
    handle.write("ab").unwrap();

    auth.release();
    settle().await;
    handle.write("cd").unwrap();
    handle.end();
    handle.outcome().await.unwrap();

    let sent = transport.requests().await;
    assert_eq!(&sent[0].body[..], b"abcd");
    assert!(sent[0].streamed);
    assert_eq!(sent[0].header("transfer-encoding"), Some("chunked"));
    assert_eq!(sent[0].header("content-length"), None);
}

#[tokio::test]
async fn test_first_write_after_auth() {
    let transport = MockTransport::new();
    let auth = GateAuth::new();
    let client = gated_client(&transport, &auth);

    let handle = client.upload("late.txt");
    auth.release();
    settle().await;
    assert!(!handle.buffer().unwrap().is_attached());

    handle.write("late").unwrap();
    handle.end();
    handle.outcome().await.unwrap();
    assert_eq!(&transport.requests().await[0].body[..], b"late");
}

#[tokio::test]
async fn test_end_held_until_response() {
    let transport = MockTransport::new();
    let auth = GateAuth::new();
    let client = gated_client(&transport, &auth);

    let handle = client.upload("obj");
    let buffer = handle.buffer().unwrap().clone();
    let mut ended = buffer.on_end();
    handle.write("x").unwrap();
    handle.end();

    settle().await;
    assert!(ended.try_recv().is_err());
    assert!(buffer.state().ended);

    auth.release();
    handle.outcome().await.unwrap();
    assert!(ended.await.is_ok());
    assert!(buffer.state().responded);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_auth() {
    let transport = MockTransport::new();
    let auth = GateAuth::new();
    let client = gated_client(&transport, &auth);

    let handles: Vec<_> = (0..4).map(|i| client.get(format!("servers/{i}"))).collect();
    settle().await;

    auth.release();
    for handle in handles {
        handle.outcome().await.unwrap();
    }
    assert_eq!(auth.calls(), 1);
    assert_eq!(transport.request_count().await, 4);
}

#[tokio::test]
async fn test_auth_failure_reaches_every_caller() {
    let transport = MockTransport::new();
    let auth = GateAuth::new();
    let client = gated_client(&transport, &auth);

    let first = client.upload("a");
    first.write("data").unwrap();
    let second = client.get("b");

    auth.reject();
    assert_matches!(first.outcome().await, Err(Error::Auth(_)));
    assert_matches!(second.outcome().await, Err(Error::Auth(_)));
    assert_eq!(transport.request_count().await, 0);
    assert!(!client.is_authorized());
}

#[tokio::test]
async fn test_authorized_client_dispatches_directly() {
    let transport = MockTransport::new();
    let auth = GateAuth::new();
    auth.release();
    let client = gated_client(&transport, &auth);
    client.authenticate().await.unwrap();

    let handle = client.upload("direct");
    assert!(!handle.is_buffered());
    handle.write("live").unwrap();
    handle.end();
    handle.outcome().await.unwrap();

    let sent = transport.requests().await;
    assert_eq!(&sent[0].body[..], b"live");
    assert_eq!(sent[0].header("content-length"), None);
}

#[tokio::test]
async fn test_download_piped_to_destination() {
    let transport = MockTransport::new();
    transport.respond(200, "object contents").await;
    let client = direct_client(&transport);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    let file = tokio::fs::File::create(&path).await.unwrap();

    let handle = client.download(["bucket", "object"]);
    handle.pipe_to(file);
    let reply = handle.outcome().await.unwrap();

    assert!(reply.body.is_empty());
    assert_eq!(
        tokio::fs::read(&path).await.unwrap(),
        b"object contents".to_vec()
    );
}

#[tokio::test]
async fn test_download_error_keeps_body() {
    let transport = MockTransport::new();
    transport
        .respond_with(HttpResponse::new(
            404,
            HashMap::new(),
            r#"{"itemNotFound":{"message":"no such object"}}"#,
        ))
        .await;
    let client = direct_client(&transport);

    let (writer, _reader) = tokio::io::duplex(16);
    let handle = client.download("missing");
    handle.pipe_to(writer);

    let err = handle.outcome().await.unwrap_err();
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(
        err.result().unwrap()["itemNotFound"]["message"],
        "no such object"
    );
}

#[tokio::test]
async fn test_then_continuation() {
    let transport = MockTransport::new();
    transport.respond(201, "created").await;
    let client = direct_client(&transport);

    let (tx, rx) = tokio::sync::oneshot::channel();
    client
        .request(RequestDescriptor::new(Method::POST, "servers").body("{}"))
        .then(
            |e| panic!("unexpected error: {e}"),
            move |body, head| {
                let _ = tx.send((head.status, body));
            },
        );

    let (status, body) = rx.await.unwrap();
    assert_eq!(status, 201);
    assert_eq!(&body[..], b"created");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_destination_given_late() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        let transport = MockTransport::new();
        transport.respond(200, "object contents").await;
        let client = direct_client(&transport);
        let path = dir.path().join(format!("out-{i}.bin"));

        let handle = client.download(["bucket", "object"]);
        let file = tokio::fs::File::create(&path).await.unwrap();
        handle.pipe_to(file);
        let reply = handle.outcome().await.unwrap();

        assert!(reply.body.is_empty());
        assert_eq!(
            tokio::fs::read(&path).await.unwrap(),
            b"object contents".to_vec()
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_without_destination_collects() {
    let transport = MockTransport::new();
    transport.respond(200, "kept in memory").await;
    let client = direct_client(&transport);

    let reply = client.download("object").outcome().await.unwrap();
    assert_eq!(reply.text().unwrap(), "kept in memory");
}

#[tokio::test]
async fn test_authenticate_runs_once_per_call() {
    let transport = MockTransport::new();
    let auth = GateAuth::new();
    auth.release();
    let client = gated_client(&transport, &auth);

    let (first, second) = tokio::join!(client.authenticate(), client.authenticate());
    first.unwrap();
    second.unwrap();
    assert_eq!(auth.calls(), 2);
    assert!(client.is_authorized());
}
