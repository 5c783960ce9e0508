//! Integration tests driving a real `Server` over a loopback `TcpStream`,
//! covering request pipelining, fragmented reads, and idle timeouts.

use maker_web::{
    limits::ConnLimits, Handled, Handler, Request, Response, Server, StatusCode,
};
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::timeout,
};

struct EchoHandler;

impl Handler for EchoHandler {
    async fn handle(&self, _: &mut (), req: &Request, resp: &mut Response) -> Handled {
        resp.status(StatusCode::Ok).body(req.url().path())
    }
}

async fn spawn_server(conn_limits: ConnLimits) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Server::builder()
        .listener(listener)
        .handler(EchoHandler)
        .connection_limits(conn_limits)
        .build();

    tokio::spawn(server.launch());
    addr
}

async fn read_response(stream: &mut TcpStream) -> String {
    let mut buf = vec![0u8; 4096];
    let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("read timed out")
        .expect("read failed");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

#[tokio::test]
async fn pipelined_requests_get_ordered_responses() {
    let addr = spawn_server(ConnLimits::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let pipelined = b"GET /one HTTP/1.1\r\nHost: x\r\n\r\nGET /two HTTP/1.1\r\nHost: x\r\n\r\n";
    stream.write_all(pipelined).await.unwrap();

    // Both responses may arrive in separate TCP segments; keep reading until
    // we've seen both status lines and bodies.
    let mut received = String::new();
    while received.matches("HTTP/1.1 200").count() < 2 {
        received.push_str(&read_response(&mut stream).await);
    }

    let first = received.find("/one").expect("first body missing");
    let second = received.find("/two").expect("second body missing");
    assert!(first < second, "responses arrived out of order: {received:?}");
}

#[tokio::test]
async fn fragmented_request_parses_like_a_single_write() {
    let addr = spawn_server(ConnLimits::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let request = b"GET /fragmented HTTP/1.1\r\nHost: x\r\n\r\n";
    for chunk in request.chunks(3) {
        stream.write_all(chunk).await.unwrap();
        // give the worker a chance to attempt (and fail) a parse on partial data
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let response = read_response(&mut stream).await;
    assert!(response.starts_with("HTTP/1.1 200"), "got: {response:?}");
    assert!(response.ends_with("/fragmented"), "got: {response:?}");
}

#[tokio::test]
async fn idle_connection_closes_after_read_timeout_with_no_response() {
    let addr = spawn_server(ConnLimits {
        socket_read_timeout: Duration::from_millis(100),
        ..ConnLimits::default()
    })
    .await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Send nothing; the worker should give up after socket_read_timeout and
    // close the connection without ever writing a response.
    let mut buf = [0u8; 16];
    let result = timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("server never closed the idle connection");

    match result {
        Ok(0) => {}
        Ok(n) => panic!("expected clean close with no bytes, got {n} bytes"),
        Err(err) => panic!("expected clean close, got I/O error: {err}"),
    }
}
