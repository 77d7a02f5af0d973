// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Connections against an in-process HTTP server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use hyper::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use hyper::server::conn::AddrIncoming;
use hyper::service;
use hyper::{Body, Request, Response, Server, StatusCode};
use mz_hs2_client::{AuthConfig, ConnectionConfig, ConnectionError, Error, TransportKind};
use serde_json::{json, Value};

const SESSION_COOKIE: &str = "hive.server2.auth=token1";

/// What the server saw of one request.
#[derive(Debug, Clone)]
struct Seen {
    method: String,
    content_type: Option<String>,
    authorization: Option<String>,
    cookie: Option<String>,
}

type Log = Arc<Mutex<Vec<Seen>>>;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn header(req: &Request<Body>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn handle(log: Log, req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    if req.uri().path() != "/cliservice" {
        return Ok(Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(Body::empty())
            .unwrap());
    }
    let content_type = header(&req, CONTENT_TYPE);
    let authorization = header(&req, AUTHORIZATION);
    let cookie = header(&req, COOKIE);
    let body = hyper::body::to_bytes(req.into_body()).await?;
    let call: Value = serde_json::from_slice(&body).unwrap();
    let method = call["method"].as_str().unwrap().to_string();

    let ok = json!({"statusCode": 0});
    let (reply, set_cookie) = match method.as_str() {
        "OpenSession" => (
            json!({
                "status": ok,
                "serverProtocolVersion": 9,
                "sessionHandle": {"sessionId": {"guid": [1], "secret": [2]}},
            }),
            Some(format!("{SESSION_COOKIE}; Path=/; HttpOnly")),
        ),
        "ExecuteStatement" => (
            json!({
                "status": ok,
                "operationHandle": {
                    "operationId": {"guid": [3], "secret": [4]},
                    "operationType": 0,
                    "hasResultSet": false,
                },
            }),
            None,
        ),
        _ => (json!({"status": ok}), None),
    };
    log.lock().unwrap().push(Seen {
        method: method.clone(),
        content_type,
        authorization,
        cookie,
    });

    let envelope = json!({"method": method, "seqId": call["seqId"], "body": reply});
    let mut response = Response::builder().status(StatusCode::OK);
    if let Some(set_cookie) = set_cookie {
        response = response.header(SET_COOKIE, set_cookie);
    }
    Ok(response
        .body(Body::from(serde_json::to_vec(&envelope).unwrap()))
        .unwrap())
}

fn start_server() -> (SocketAddr, Log) {
    let log: Log = Arc::default();
    let incoming = AddrIncoming::bind(&([127, 0, 0, 1], 0).into()).unwrap();
    let addr = incoming.local_addr();
    let server_log = Arc::clone(&log);
    let server = Server::builder(incoming).serve(service::make_service_fn(move |_conn| {
        let log = Arc::clone(&server_log);
        async move {
            Ok::<_, hyper::Error>(service::service_fn(move |req| {
                handle(Arc::clone(&log), req)
            }))
        }
    }));
    spawn_server(server);
    (addr, log)
}

fn spawn_server(
    server: impl std::future::Future<Output = Result<(), hyper::Error>> + Send + 'static,
) {
    tokio::spawn(async move {
        if let Err(e) = server.await {
            eprintln!("test server failed: {e}");
        }
    });
}

fn http_config(addr: SocketAddr, path: &str) -> ConnectionConfig {
    ConnectionConfig::new("127.0.0.1", addr.port())
        .transport(TransportKind::Http {
            path: path.into(),
            https: false,
        })
        .auth(AuthConfig::Plain {
            username: Some("etl".into()),
            password: Some("secret".into()),
        })
}

#[tokio::test]
#[cfg_attr(miri, ignore)] // unsupported operation: can't call foreign function `socket`
async fn cookie_replayed_on_same_channel_only() -> Result<(), anyhow::Error> {
    init_logging();
    let (addr, log) = start_server();
    let config = http_config(addr, "cliservice").http_cookie_affinity(true);

    let session = mz_hs2_client::connect(&config, None).await?;
    session
        .execute_statement("SET x = 1", Default::default())
        .await?;
    let fresh = mz_hs2_client::connect(&config, None).await?;
    session.close().await?;
    drop(fresh);

    let seen = log.lock().unwrap().clone();
    let calls: Vec<_> = seen
        .iter()
        .map(|s| (s.method.as_str(), s.cookie.as_deref()))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("OpenSession", None),
            ("ExecuteStatement", Some(SESSION_COOKIE)),
            ("OpenSession", None),
            ("CloseSession", Some(SESSION_COOKIE)),
        ]
    );

    // "etl:secret"
    for s in &seen {
        assert_eq!(s.authorization.as_deref(), Some("Basic ZXRsOnNlY3JldA=="));
        assert_eq!(s.content_type.as_deref(), Some("application/x-thrift"));
    }
    Ok(())
}

#[tokio::test]
#[cfg_attr(miri, ignore)] // unsupported operation: can't call foreign function `socket`
async fn cookies_ignored_without_affinity() -> Result<(), anyhow::Error> {
    init_logging();
    let (addr, log) = start_server();
    let config = http_config(addr, "/cliservice");

    let session = mz_hs2_client::connect(&config, None).await?;
    session
        .execute_statement("SET x = 1", Default::default())
        .await?;

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|s| s.cookie.is_none()));
    Ok(())
}

#[tokio::test]
#[cfg_attr(miri, ignore)] // unsupported operation: can't call foreign function `socket`
async fn http_error_status() -> Result<(), anyhow::Error> {
    init_logging();
    let (addr, log) = start_server();
    let config = http_config(addr, "unavailable");

    let err = mz_hs2_client::connect(&config, None).await.unwrap_err();
    match err {
        Error::Connection(ConnectionError::HttpStatus { status, url }) => {
            assert_eq!(status.as_u16(), 503);
            assert!(url.ends_with("/unavailable"), "{url}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(log.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn cookie_affinity_requires_http() {
    // Nothing listens on the port: the configuration is rejected before dialing.
    let config = ConnectionConfig::new("127.0.0.1", 1).http_cookie_affinity(true);
    let err = mz_hs2_client::SessionClient::connect(&config, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err}");
}
