//! End-to-end behavior of a running mock server over real sockets.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mock_upstream::{
    Handler, Method, MockServer, Request, ResponseWriter, ServerConfig, ServerError, StatusCode,
};
use serde::Deserialize;

mod common;

#[derive(Debug, Deserialize, PartialEq)]
struct Payload {
    abcd: String,
    efgh: i64,
}

#[tokio::test]
async fn test_unregistered_route_is_not_found() {
    let server = common::start_server().await;
    let client = common::client_for(&server);

    let response = client.get("/nothing-here").await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body.as_ref(), b"404 page not found");
    assert_eq!(server.total_calls(), 0);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_post_json_with_path_and_query_params() {
    let server = common::start_server().await;
    server
        .register_handler(Method::POST, "/some-path/{id}", |w, r| {
            let payload: Payload = r.json().unwrap();
            assert_eq!(payload.abcd, "abcd");
            assert_eq!(r.params().by_name("id"), "123");
            assert_eq!(r.form_value("abcd"), "def");
            w.set_status_code(StatusCode::CREATED);
            w.set_body_json(&serde_json::json!({ "ok": true, "efgh": payload.efgh }))
                .unwrap();
        })
        .unwrap();

    let client = common::client_for(&server);
    let response = client
        .send(
            Method::POST,
            "/some-path/123",
            &[("content-type", "application/json")],
            r#"{"abcd":"abcd","efgh":1}"#,
            &[("abcd", "def")],
        )
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.header("content-type"), Some("application/json"));
    let echoed: serde_json::Value = response.json().unwrap();
    assert_eq!(echoed["efgh"], 1);

    assert_eq!(server.call_count(Method::POST, "/some-path/{id}"), 1);
    let records = server.call_records(Method::POST, "/some-path/{id}");
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.method, Method::POST);
    assert_eq!(record.path, "/some-path/123");
    assert_eq!(record.params["id"], "123");
    assert_eq!(
        record.query,
        BTreeMap::from([("abcd".to_string(), vec!["def".to_string()])])
    );
    assert_eq!(record.header("content-type"), Some("application/json"));
    assert_eq!(
        record.body_json::<Payload>().unwrap(),
        Payload {
            abcd: "abcd".into(),
            efgh: 1
        }
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_post_returns_fixed_json_and_records_request() {
    let server = common::start_server().await;
    server
        .register_handler(Method::POST, "/some-path/{id}", |w, _| {
            w.set_body_json(&serde_json::json!({ "abcd": "abcd", "efgh": 1 }))
                .unwrap();
        })
        .unwrap();

    let client = common::client_for(&server);
    let response = client
        .send(
            Method::POST,
            "/some-path/123",
            &[],
            r#"{"test":"osterone"}"#,
            &[("abcd", "def")],
        )
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), br#"{"abcd":"abcd","efgh":1}"#);

    assert_eq!(server.call_count(Method::POST, "/some-path/{id}"), 1);
    let records = server.call_records(Method::POST, "/some-path/{id}");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].body.as_ref(), br#"{"test":"osterone"}"#);
    assert_eq!(records[0].params.len(), 1);
    assert_eq!(records[0].params["id"], "123");
    assert_eq!(
        records[0].query,
        BTreeMap::from([("abcd".to_string(), vec!["def".to_string()])])
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_percent_encoded_paths_are_decoded() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/users/{name}", |w, r| {
            w.set_body_bytes(r.params().by_name("name"));
        })
        .unwrap();
    server
        .register_handler(Method::GET, "/some-path", |w, _| {
            w.set_status_code(StatusCode::ACCEPTED);
        })
        .unwrap();

    let client = common::client_for(&server);
    let response = client.get("/users/john%20doe").await.unwrap();
    assert_eq!(response.body.as_ref(), b"john doe");
    assert_eq!(
        client.get("/some%2Dpath").await.unwrap().status,
        StatusCode::ACCEPTED
    );

    let records = server.call_records(Method::GET, "/users/{name}");
    assert_eq!(records[0].path, "/users/john%20doe");
    assert_eq!(records[0].params["name"], "john doe");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_get_with_repeated_query_values() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/search", |w, r| {
            let tags = r.query().get("tag").cloned().unwrap_or_default();
            w.set_body_bytes(tags.join(","));
        })
        .unwrap();

    let client = common::client_for(&server);
    let response = client
        .send(Method::GET, "/search", &[], "", &[("tag", "a"), ("tag", "b"), ("q", "x")])
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), b"a,b");

    let records = server.call_records(Method::GET, "/search");
    assert_eq!(records[0].query["tag"], vec!["a", "b"]);
    assert_eq!(records[0].query["q"], vec!["x"]);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_colon_params_and_specific_route_wins() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/users/:id", |w, r| {
            w.set_body_bytes(format!("user {}", r.params().by_name("id")));
        })
        .unwrap();
    server
        .register_handler(Method::GET, "/users/me", |w, _| {
            w.set_body_bytes("me");
        })
        .unwrap();

    let client = common::client_for(&server);
    assert_eq!(client.get("/users/42").await.unwrap().body.as_ref(), b"user 42");
    assert_eq!(client.get("/users/me").await.unwrap().body.as_ref(), b"me");
    assert_eq!(
        client.get("/users/42/extra").await.unwrap().status,
        StatusCode::NOT_FOUND
    );

    assert_eq!(server.call_count(Method::GET, "/users/:id"), 1);
    assert_eq!(server.call_count(Method::GET, "/users/me"), 1);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_counts_then_reset_counts() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/ping", |w, _| {
            w.set_status_code(StatusCode::NO_CONTENT);
        })
        .unwrap();

    let client = common::client_for(&server);
    for _ in 0..10 {
        let response = client.get("/ping").await.unwrap();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }
    assert_eq!(server.call_count(Method::GET, "/ping"), 10);

    server.reset_counts();
    assert_eq!(server.call_count(Method::GET, "/ping"), 0);
    assert_eq!(server.call_records(Method::GET, "/ping").len(), 10);

    client.get("/ping").await.unwrap();
    assert_eq!(server.call_count(Method::GET, "/ping"), 1);

    server.reset_counts_and_records();
    assert_eq!(server.call_count(Method::GET, "/ping"), 0);
    assert!(server.call_records(Method::GET, "/ping").is_empty());
    assert_eq!(client.get("/ping").await.unwrap().status, StatusCode::NO_CONTENT);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_reregister_replaces_only_that_route() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/first", |w, _| w.set_status_code(StatusCode::OK))
        .unwrap();
    server
        .register_handler(Method::GET, "/second", |w, _| {
            w.set_status_code(StatusCode::CREATED)
        })
        .unwrap();

    let client = common::client_for(&server);
    assert_eq!(client.get("/first").await.unwrap().status, StatusCode::OK);

    server
        .register_handler(Method::GET, "/first", |w, _| {
            w.set_header("some", "header").unwrap();
            w.set_status_code(StatusCode::NOT_FOUND);
        })
        .unwrap();

    let response = client.get("/first").await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.header("some"), Some("header"));
    assert_eq!(client.get("/second").await.unwrap().status, StatusCode::CREATED);

    assert_eq!(server.call_count(Method::GET, "/first"), 2);
    assert_eq!(server.routes().len(), 2);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_slow_handler_times_out_client_but_is_counted() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/slow", |w, _| {
            std::thread::sleep(Duration::from_secs(1));
            w.set_body_bytes("too late");
        })
        .unwrap();

    let client = common::client_for(&server);
    let err = client.get("/slow").await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err}");
    assert_eq!(server.call_count(Method::GET, "/slow"), 1);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_response_delay_times_out_client() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/delayed", |w, _| {
            w.set_delay(Duration::from_secs(1));
        })
        .unwrap();

    let client = common::client_for(&server);
    assert!(client.get("/delayed").await.unwrap_err().is_timeout());
    assert_eq!(server.call_count(Method::GET, "/delayed"), 1);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_reset_all_drops_handlers_and_history() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/gone", |w, _| {
            w.set_body_bytes("here");
        })
        .unwrap();

    let client = common::client_for(&server);
    assert_eq!(client.get("/gone").await.unwrap().status, StatusCode::OK);

    server.reset_all();
    assert_eq!(server.call_count(Method::GET, "/gone"), 0);
    assert!(server.routes().is_empty());
    assert_eq!(client.get("/gone").await.unwrap().status, StatusCode::NOT_FOUND);
    assert_eq!(server.total_calls(), 0);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_servers_are_isolated() {
    let first = common::start_server().await;
    let second = common::start_server().await;
    for server in [&first, &second] {
        server
            .register_handler(Method::GET, "/shared", |w, _| {
                w.set_body_bytes("ok");
            })
            .unwrap();
    }

    common::client_for(&first).get("/shared").await.unwrap();
    common::client_for(&second).get("/shared").await.unwrap();
    first.reset_all();

    assert_eq!(first.call_count(Method::GET, "/shared"), 0);
    assert_eq!(second.call_count(Method::GET, "/shared"), 1);
    assert_eq!(
        common::client_for(&second).get("/shared").await.unwrap().status,
        StatusCode::OK
    );

    first.close().await.unwrap();
    second.close().await.unwrap();
}

#[tokio::test]
async fn test_unregister_keeps_records() {
    let server = common::start_server().await;
    server
        .register_handler(Method::DELETE, "/items/{id}", |w, _| {
            w.set_status_code(StatusCode::NO_CONTENT)
        })
        .unwrap();

    let client = common::client_for(&server);
    client
        .send(Method::DELETE, "/items/7", &[], "", &[])
        .await
        .unwrap();

    assert!(server.unregister_handler(Method::DELETE, "/items/{id}"));
    assert!(!server.unregister_handler(Method::DELETE, "/items/{id}"));

    let response = client
        .send(Method::DELETE, "/items/7", &[], "", &[])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(server.call_count(Method::DELETE, "/items/{id}"), 1);
    assert_eq!(server.call_records(Method::DELETE, "/items/{id}")[0].params["id"], "7");

    server.close().await.unwrap();
}

/// Fails the first `failures` calls, then succeeds.
struct Flaky {
    failures: usize,
    seen: AtomicUsize,
}

impl Handler for Flaky {
    fn handle(&self, w: &mut ResponseWriter, _: &Request) {
        if self.seen.fetch_add(1, Ordering::SeqCst) < self.failures {
            w.set_status_code(StatusCode::SERVICE_UNAVAILABLE);
        } else {
            w.set_body_bytes("recovered");
        }
    }
}

#[tokio::test]
async fn test_stateful_handler() {
    let server = common::start_server().await;
    server
        .register(
            Method::GET,
            "/flaky",
            Flaky {
                failures: 2,
                seen: AtomicUsize::new(0),
            },
        )
        .unwrap();

    let client = common::client_for(&server);
    let statuses = [
        client.get("/flaky").await.unwrap().status,
        client.get("/flaky").await.unwrap().status,
        client.get("/flaky").await.unwrap().status,
    ];
    assert_eq!(
        statuses,
        [
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::OK
        ]
    );
    assert_eq!(server.call_count(Method::GET, "/flaky"), 3);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_invalid_template_is_rejected() {
    let server = common::start_server().await;
    assert!(server
        .register_handler(Method::GET, "no-slash", |_, _| {})
        .is_err());
    assert!(server
        .register_handler(Method::GET, "/files/*path", |_, _| {})
        .is_err());
    assert!(server.routes().is_empty());

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_bind_in_use_fails_at_start() {
    let server = common::start_server().await;
    let taken = server.local_addr().to_string();

    let err = MockServer::start(&taken, ServerConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Listener(_)), "got {err:?}");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent_and_stops_serving() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/up", |w, _| {
            w.set_body_bytes("up");
        })
        .unwrap();
    let client = common::client_for(&server);
    assert_eq!(client.get("/up").await.unwrap().status, StatusCode::OK);

    server.close().await.unwrap();
    server.close().await.unwrap();

    assert!(client.get("/up").await.is_err());
}

#[tokio::test]
async fn test_http2_prior_knowledge() {
    let server = common::start_server_with(ServerConfig::default().with_http2(true)).await;
    server
        .register_handler(Method::GET, "/h2", |w, r| {
            w.set_body_bytes(format!("{:?}", r.version()));
        })
        .unwrap();

    let client = reqwest::Client::builder()
        .no_proxy()
        .http2_prior_knowledge()
        .timeout(common::CLIENT_TIMEOUT)
        .build()
        .unwrap();
    let response = client.get(server.url("/h2")).send().await.unwrap();
    assert_eq!(response.version(), reqwest::Version::HTTP_2);
    assert_eq!(response.text().await.unwrap(), "HTTP/2.0");

    // HTTP/1.1 clients keep working on the same listener.
    let response = common::client_for(&server).get("/h2").await.unwrap();
    assert_eq!(response.body.as_ref(), b"HTTP/1.1");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_http2_disabled_rejects_prior_knowledge() {
    let server = common::start_server().await;
    server
        .register_handler(Method::GET, "/h1", |w, _| {
            w.set_body_bytes("ok");
        })
        .unwrap();

    let client = reqwest::Client::builder()
        .no_proxy()
        .http2_prior_knowledge()
        .timeout(common::CLIENT_TIMEOUT)
        .build()
        .unwrap();
    assert!(client.get(server.url("/h1")).send().await.is_err());
    assert_eq!(server.call_count(Method::GET, "/h1"), 0);

    server.close().await.unwrap();
}
