//! Serves the assembled pipeline on a real socket.

use std::time::Duration;

use api_bootstrap::http::{service_routes, HttpServer};
use api_bootstrap::lifecycle::Shutdown;
use api_bootstrap::observability::EventKind;
use tokio::net::TcpListener;

mod common;

use common::{assembler, settings, token, write_settings};

#[tokio::test]
async fn test_live_server_gates_requests_and_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    write_settings(dir.path(), &settings(&["orders.read"], "Enabled = false"));
    let (assembler, sink) = assembler(dir.path(), true);
    let pipeline = assembler.with_routes(service_routes()).assemble().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let telemetry = pipeline.telemetry.clone();
    let server = HttpServer::new(pipeline.router, pipeline.host);
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { server.run(listener, &server_shutdown).await });

    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let probe = client.get(format!("{}/probe", base)).send().await.unwrap();
    assert_eq!(probe.status(), 200);
    assert_eq!(probe.text().await.unwrap(), "Healthy");

    let anonymous = client.get(format!("{}/api/v1/info", base)).send().await.unwrap();
    assert_eq!(anonymous.status(), 401);

    let authorized = client
        .get(format!("{}/api/v1/info", base))
        .bearer_auth(token(&["orders.read"]))
        .send()
        .await
        .unwrap();
    assert_eq!(authorized.status(), 200);
    let info: serde_json::Value = authorized.json().await.unwrap();
    assert_eq!(info["name"], "api-bootstrap");

    drop(client);
    shutdown.trigger("test");
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    shutdown.complete(&telemetry);
    assert_eq!(sink.events_of_kind(EventKind::Lifecycle).len(), 2);
}
