// HTTP transport tests
// Runs the reqwest transport against a local axum stub standing in for the upstream catalog

use anyhow::Result;
use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use partsgate::catalog::{
    CatalogError, CatalogMethod, CatalogTransport, EnvelopeDefaults, HttpTransport,
    RequestEnvelope, API_KEY_HEADER,
};
use partsgate::GatewayBuilder;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const TEST_KEY: &str = "test-api-key";

async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if key != TEST_KEY {
        return (StatusCode::UNAUTHORIZED, "missing key").into_response();
    }
    Json(json!({"status": 200, "echo": body})).into_response()
}

async fn teapot() -> impl IntoResponse {
    (StatusCode::IM_A_TEAPOT, "short and stout")
}

async fn garbage() -> impl IntoResponse {
    (StatusCode::OK, "<html>definitely not json</html>")
}

async fn application_error() -> Json<Value> {
    Json(json!({"status": 407, "statusText": "Provider rejected"}))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({"status": 200}))
}

/// Start the stub upstream on an ephemeral port and return its base URL
async fn start_stub_upstream() -> Result<String> {
    let app = Router::new()
        .route("/json", post(echo))
        .route("/teapot", post(teapot))
        .route("/garbage", post(garbage))
        .route("/app-error", post(application_error))
        .route("/slow", post(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

/// Answer every request with a fixed raw status line, so the reason phrase
/// is whatever the test chooses rather than the registered one
async fn start_raw_status_upstream(status_line: &'static str) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_err() {
                    return;
                }
                let response = format!(
                    "{status_line}\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nno"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    Ok(format!("http://{addr}"))
}

/// Consume one request: headers, then `Content-Length` bytes of body
async fn read_request(socket: &mut tokio::net::TcpStream) -> std::io::Result<()> {
    let mut received = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        received.extend_from_slice(&chunk[..n]);

        let Some(header_end) = received.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&received[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if received.len() >= header_end + 4 + content_length {
            return Ok(());
        }
    }
}

fn envelope(method: CatalogMethod, params: Value) -> RequestEnvelope {
    let params: Map<String, Value> = match params {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    RequestEnvelope::build(method, &params, &EnvelopeDefaults::new(22610))
}

fn transport(base: &str, path: &str, timeout: Duration) -> HttpTransport {
    HttpTransport::new(format!("{base}{path}"), TEST_KEY, timeout).expect("client builds")
}

#[tokio::test]
async fn test_posts_wrapped_envelope_with_api_key() -> Result<()> {
    let base = start_stub_upstream().await?;
    let transport = transport(&base, "/json", Duration::from_secs(5));

    let response = transport
        .send(&envelope(
            CatalogMethod::VehiclesByPlate,
            json!({"keySystemNumber": "AB12345", "keySystemType": 99}),
        ))
        .await?;

    let body = &response["echo"]["getVehiclesByKeyNumberPlates"];
    assert_eq!(body["keySystemNumber"], json!("AB12345"));
    assert_eq!(body["provider"], json!(22610));
    assert_eq!(body["lang"], json!("no"));
    assert_eq!(body["country"], json!("NO"));
    Ok(())
}

#[tokio::test]
async fn test_wrong_key_is_classified_as_unauthorized() -> Result<()> {
    let base = start_stub_upstream().await?;
    let transport = HttpTransport::new(format!("{base}/json"), "wrong", Duration::from_secs(5))?;

    let err = transport
        .send(&envelope(CatalogMethod::AssemblyGroups, json!({})))
        .await
        .expect_err("401 must fail");
    assert!(matches!(err, CatalogError::Http { status: 401, .. }));
    assert!(err.to_string().starts_with("Unauthorized"));
    Ok(())
}

#[tokio::test]
async fn test_unmapped_status_uses_upstream_status_text() -> Result<()> {
    let base = start_stub_upstream().await?;
    let transport = transport(&base, "/teapot", Duration::from_secs(5));

    let err = transport
        .send(&envelope(CatalogMethod::Articles, json!({})))
        .await
        .expect_err("418 must fail");
    match &err {
        CatalogError::Http {
            status,
            message,
            status_text,
        } => {
            assert_eq!(*status, 418);
            assert_eq!(message, status_text);
            assert_eq!(message, "I'm a teapot");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_unmapped_status_keeps_upstream_reason_phrase() -> Result<()> {
    let base = start_raw_status_upstream("HTTP/1.1 418 Quota Brewing Refused").await?;
    let transport = transport(&base, "/", Duration::from_secs(5));

    let err = transport
        .send(&envelope(CatalogMethod::Articles, json!({})))
        .await
        .expect_err("418 must fail");
    match &err {
        CatalogError::Http {
            status,
            message,
            status_text,
        } => {
            assert_eq!(*status, 418);
            assert_eq!(status_text, "Quota Brewing Refused");
            assert_eq!(message, "Quota Brewing Refused");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_unregistered_status_keeps_upstream_reason_phrase() -> Result<()> {
    let base = start_raw_status_upstream("HTTP/1.1 599 Catalog Overloaded").await?;
    let transport = transport(&base, "/", Duration::from_secs(5));

    let err = transport
        .send(&envelope(CatalogMethod::AssemblyGroups, json!({})))
        .await
        .expect_err("599 must fail");
    assert!(matches!(err, CatalogError::Http { status: 599, .. }));
    assert!(err.to_string().contains("Catalog Overloaded"));
    assert!(!err.to_string().contains("Unknown error"));
    Ok(())
}

#[tokio::test]
async fn test_classified_status_appends_upstream_reason_phrase() -> Result<()> {
    let base = start_raw_status_upstream("HTTP/1.1 401 Key Expired").await?;
    let transport = transport(&base, "/", Duration::from_secs(5));

    let err = transport
        .send(&envelope(CatalogMethod::VehiclesByPlate, json!({})))
        .await
        .expect_err("401 must fail");
    assert!(err.to_string().starts_with("Unauthorized"));
    assert!(err.to_string().contains("Key Expired"));
    Ok(())
}

#[tokio::test]
async fn test_malformed_json_keeps_raw_body() -> Result<()> {
    let base = start_stub_upstream().await?;
    let transport = transport(&base, "/garbage", Duration::from_secs(5));

    let err = transport
        .send(&envelope(CatalogMethod::Articles, json!({})))
        .await
        .expect_err("non-JSON body must fail");
    match err {
        CatalogError::Parse { raw, .. } => {
            assert_eq!(raw, "<html>definitely not json</html>");
        }
        other => panic!("expected Parse error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_timeout_is_a_transport_error() -> Result<()> {
    let base = start_stub_upstream().await?;
    let transport = transport(&base, "/slow", Duration::from_millis(200));

    let err = transport
        .send(&envelope(CatalogMethod::Articles, json!({})))
        .await
        .expect_err("slow upstream must time out");
    assert!(matches!(err, CatalogError::Transport(_)));
    assert_eq!(err.status(), None);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_transport_error() -> Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let transport = HttpTransport::new(
        format!("http://127.0.0.1:{port}/json"),
        TEST_KEY,
        Duration::from_secs(2),
    )?;
    let err = transport
        .send(&envelope(CatalogMethod::Articles, json!({})))
        .await
        .expect_err("nothing is listening");
    assert!(matches!(err, CatalogError::Transport(_)));
    Ok(())
}

#[tokio::test]
async fn test_gateway_rejects_application_status_from_http_upstream() -> Result<()> {
    let base = start_stub_upstream().await?;
    let gateway = GatewayBuilder::new()
        .transport(Arc::new(transport(&base, "/app-error", Duration::from_secs(5))))
        .build()?;

    let err = gateway
        .fetch_assembly_groups(5555)
        .await
        .expect_err("status 407 envelope must fail");
    assert!(matches!(err, CatalogError::Application { status: 407, .. }));
    assert!(err.to_string().starts_with("Authentication failed"));
    Ok(())
}
