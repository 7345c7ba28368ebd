//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{routing::get, Router};
use split_plane::config::{HttpListenerSpec, ListenerSpec, ServerConfig};
use split_plane::Handler;

/// An HTTP listener on an ephemeral loopback port.
pub fn loopback() -> ListenerSpec {
    ListenerSpec::Http(HttpListenerSpec {
        bind_host: Some("127.0.0.1".to_string()),
        ..HttpListenerSpec::with_port(0)
    })
}

/// Small pools and a short grace period, `app` and `admin` listeners each.
pub fn server_config(app: usize, admin: usize) -> ServerConfig {
    ServerConfig {
        application_listeners: (0..app).map(|_| loopback()).collect(),
        admin_listeners: (0..admin).map(|_| loopback()).collect(),
        min_threads: 2,
        max_threads: 4,
        admin_min_threads: 1,
        admin_max_threads: 2,
        shutdown_grace_period_secs: 1,
        ..ServerConfig::default()
    }
}

/// Handler answering `GET /` with its name and `GET /thread` with the name
/// of the thread serving the request.
pub fn probe_handler(name: &'static str) -> Handler {
    let router = Router::new()
        .route("/", get(move || async move { name }))
        .route(
            "/thread",
            get(|| async { std::thread::current().name().unwrap_or("").to_string() }),
        );
    Handler::new(name, router)
}

/// GET `path` from `addr` on a throwaway runtime, outside the server's pools.
pub fn http_get(addr: SocketAddr, path: &str) -> reqwest::Result<(u16, String)> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("client runtime");

    runtime.block_on(async {
        // Non-pooled so no idle connection outlives the request
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(Duration::from_secs(5))
            .build()?;
        let res = client.get(format!("http://{}{}", addr, path)).send().await?;
        let status = res.status().as_u16();
        Ok((status, res.text().await?))
    })
}

/// Write one keep-alive `GET /` on `stream` and read back whatever the
/// server answers before the body `expect` arrives, the peer closes, or the
/// read times out.
pub fn keep_alive_get(stream: &mut std::net::TcpStream, expect: &str) -> String {
    use std::io::{Read, Write};

    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    if stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n")
        .is_err()
    {
        return String::new();
    }

    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                received.extend_from_slice(&buf[..n]);
                if received.ends_with(expect.as_bytes()) {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&received).into_owned()
}
