//! HTTP adapter tests against a scripted in-process server.
//!
//! The server accepts one connection per scripted reply, records the raw
//! request (head + body) and answers with a fixed HTTP/1.1 response.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use javalab::{ChatGateway, ModelEndpoint, PistonClient};
use javalab_engine::execution::sandbox::SandboxRequest;
use javalab_engine::{
    ChatMessage, ChatRequest, Classification, ModelGateway, RunRequest, SandboxService, TierError,
};

struct Recorded {
    head: String,
    body: String,
}

enum Reply {
    Respond { status: u16, body: String },
    Stall,
}

/// Bind a local server that plays `replies` in order. Returns its base URL
/// and a receiver of the requests it saw.
async fn serve(replies: Vec<Reply>) -> (String, mpsc::UnboundedReceiver<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for reply in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            let recorded = read_request(&mut socket).await;
            let _ = tx.send(recorded);
            match reply {
                Reply::Respond { status, body } => {
                    let response = format!(
                        "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    socket.write_all(response.as_bytes()).await.unwrap();
                    socket.shutdown().await.ok();
                }
                Reply::Stall => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        }
    });

    (format!("http://{addr}"), rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Recorded {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Recorded {
        head,
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    }
}

fn sandbox_request() -> SandboxRequest {
    SandboxRequest::from_run(&RunRequest::new("class Main {}").with_stdin(vec!["7".into()]))
}

#[tokio::test]
async fn test_piston_round_trip() {
    let (base, mut seen) = serve(vec![Reply::Respond {
        status: 200,
        body: r#"{"compile":{"stdout":"","stderr":"","code":0},"run":{"stdout":"7\n","stderr":"","output":"7\n","code":0,"signal":null}}"#.into(),
    }])
    .await;
    let client = PistonClient::new(format!("{base}/api/v2/piston/execute"), Duration::from_secs(5)).unwrap();

    let response = client.execute(sandbox_request()).await.unwrap();
    let result = response.into_result();
    assert_eq!(result.classification(), Classification::Success);
    assert_eq!(result.output_text(), "7\n");

    let request = seen.recv().await.unwrap();
    assert!(request.head.starts_with("POST /api/v2/piston/execute"));
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["language"], "java");
    assert_eq!(body["files"][0]["name"], "Main.java");
    assert_eq!(body["stdin"], "7");
}

#[tokio::test]
async fn test_piston_service_error_is_recoverable() {
    let (base, _seen) = serve(vec![Reply::Respond {
        status: 429,
        body: r#"{"message":"Requests limited to 5 per second"}"#.into(),
    }])
    .await;
    let client = PistonClient::new(base, Duration::from_secs(5)).unwrap();

    let err = client.execute(sandbox_request()).await.unwrap_err();
    assert!(matches!(err, TierError::Service { status: 429, .. }));
    assert!(err.is_recoverable());
    assert!(err.to_string().contains("5 per second"));
}

#[tokio::test]
async fn test_piston_stall_times_out() {
    let (base, _seen) = serve(vec![Reply::Stall]).await;
    let client = PistonClient::new(base, Duration::from_millis(200)).unwrap();

    let err = client.execute(sandbox_request()).await.unwrap_err();
    assert!(matches!(err, TierError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_piston_connection_refused_is_transport() {
    // Bind then drop to get a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let client = PistonClient::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();

    let err = client.execute(sandbox_request()).await.unwrap_err();
    assert!(matches!(err, TierError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_chat_gateway_sends_json_mode_and_key() {
    let (base, mut seen) = serve(vec![Reply::Respond {
        status: 200,
        body: r#"{"choices":[{"message":{"role":"assistant","content":"{\"status\":\"success\",\"output\":\"hi\"}"}}]}"#.into(),
    }])
    .await;
    let gateway = ChatGateway::new(
        ModelEndpoint {
            base_url: format!("{base}/v1"),
            model: "tiny-coder".into(),
            api_key: Some("sk-local".into()),
        },
        Duration::from_secs(5),
    )
    .unwrap();

    let request = ChatRequest::new(vec![ChatMessage::system("compile"), ChatMessage::user("code")]).json();
    let text = gateway.complete(request).await.unwrap();
    assert_eq!(text, r#"{"status":"success","output":"hi"}"#);

    let recorded = seen.recv().await.unwrap();
    assert!(recorded.head.starts_with("POST /v1/chat/completions"));
    assert!(recorded
        .head
        .to_ascii_lowercase()
        .contains("authorization: bearer sk-local"));
    let body: serde_json::Value = serde_json::from_str(&recorded.body).unwrap();
    assert_eq!(body["model"], "tiny-coder");
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["messages"][1]["content"], "code");
}

#[tokio::test]
async fn test_chat_gateway_without_key_sends_no_auth() {
    let (base, mut seen) = serve(vec![Reply::Respond {
        status: 500,
        body: "upstream exploded".into(),
    }])
    .await;
    let gateway = ChatGateway::new(
        ModelEndpoint {
            base_url: base,
            model: "m".into(),
            api_key: None,
        },
        Duration::from_secs(5),
    )
    .unwrap();

    let err = gateway
        .complete(ChatRequest::new(vec![ChatMessage::user("x")]))
        .await
        .unwrap_err();
    assert!(matches!(err, TierError::Service { status: 500, .. }));

    let recorded = seen.recv().await.unwrap();
    assert!(!recorded.head.to_ascii_lowercase().contains("authorization"));
}
