use std::time::Duration;

use bytes::Bytes;
use http::{Request, StatusCode};
use micro_transfer::client::{HttpClient, RequestHandle, RequestStatus};
use micro_transfer::server::{HttpServer, make_dispatcher};
use micro_transfer::tls;
use rustls::pki_types::ServerName;
use tokio::io::AsyncReadExt;

struct Material {
    cert_pem: String,
    key_pem: String,
}

fn generate() -> Material {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
    Material { cert_pem: certified.cert.pem(), key_pem: certified.key_pair.serialize_pem() }
}

#[tokio::test]
async fn exchange_over_tls() {
    let material = generate();
    let server_config = tls::server_config_from_pem(material.cert_pem.as_bytes(), material.key_pem.as_bytes()).unwrap();

    let mut server = HttpServer::builder()
        .address("127.0.0.1:0")
        .tls(server_config)
        .dispatcher(make_dispatcher(|record| record.set_body("secure hello")))
        .build()
        .unwrap();
    let address = server.startup().await.unwrap();

    let client_config = tls::client_config_from_pem(material.cert_pem.as_bytes()).unwrap();
    let client = HttpClient::tls(client_config, ServerName::try_from("localhost").unwrap());

    let request = Request::get("/").body(Bytes::new()).unwrap();
    let handle = client.post(RequestHandle::builder(address, request).build()).await.unwrap();
    assert_eq!(handle.status(), RequestStatus::Succeeded);
    assert_eq!(handle.response().unwrap().status(), StatusCode::OK);
    assert_eq!(handle.response_body(), b"secure hello");
    assert!(handle.has_connection());

    let handle = client.post(handle).await.unwrap();
    assert_eq!(handle.response_body(), b"secure hello");

    server.shutdown().await;
}

#[tokio::test]
async fn untrusted_certificate_fails_to_connect() {
    let material = generate();
    let other = generate();
    let server_config = tls::server_config_from_pem(material.cert_pem.as_bytes(), material.key_pem.as_bytes()).unwrap();

    let mut server = HttpServer::builder()
        .address("127.0.0.1:0")
        .tls(server_config)
        .dispatcher(make_dispatcher(|record| record.set_body("unreachable")))
        .build()
        .unwrap();
    let address = server.startup().await.unwrap();

    let client_config = tls::client_config_from_pem(other.cert_pem.as_bytes()).unwrap();
    let client = HttpClient::tls(client_config, ServerName::try_from("localhost").unwrap());

    let request = Request::get("/").body(Bytes::new()).unwrap();
    let handle = client.post(RequestHandle::builder(address, request).build()).await.unwrap();
    assert_eq!(handle.status(), RequestStatus::ConnectFailed);
    assert_eq!(handle.tried_times(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn stalled_handshake_is_dropped() {
    let material = generate();
    let server_config = tls::server_config_from_pem(material.cert_pem.as_bytes(), material.key_pem.as_bytes()).unwrap();

    let mut server = HttpServer::builder()
        .address("127.0.0.1:0")
        .tls(server_config)
        .handshake_timeout(Duration::from_millis(200))
        .dispatcher(make_dispatcher(|record| record.set_body("unreachable")))
        .build()
        .unwrap();
    let address = server.startup().await.unwrap();

    // connect without ever sending a ClientHello
    let mut stream = tokio::net::TcpStream::connect(address).await.unwrap();
    let mut buf = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await.unwrap().unwrap();
    assert_eq!(read, 0);

    server.shutdown().await;
}
