//! Discovery of a debuggee's CDP WebSocket URL via its `/json/list` endpoint.
//!
//! Uses a raw `TcpStream` HTTP/1.1 GET rather than a full HTTP client:
//! a full client is overkill for polling one endpoint a handful of times.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;

use super::ProvisionError;

/// A single entry in the `/json/list` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_debugger_url: Option<String>,
}

/// Warm-up delay before the first discovery attempt (§6).
const WARMUP_DELAY: Duration = Duration::from_millis(1500);
/// Delay between discovery retries (§6).
const RETRY_INTERVAL: Duration = Duration::from_secs(1);
/// Maximum number of discovery retries (§6).
const MAX_RETRIES: u32 = 5;

/// Poll `http://{host}:{port}/json/list` until a target with a
/// `webSocketDebuggerUrl` appears, after an initial warm-up delay.
///
/// # Errors
///
/// Returns `ProvisionError::DiscoveryExhausted` if no usable target appears
/// within `MAX_RETRIES` attempts.
pub async fn discover_websocket_url(host: &str, port: u16) -> Result<String, ProvisionError> {
    sleep(WARMUP_DELAY).await;

    let mut attempts = 0;
    loop {
        attempts += 1;
        match query_targets(host, port).await {
            Ok(targets) => {
                if let Some(url) = targets.into_iter().find_map(|t| t.ws_debugger_url) {
                    return Ok(url);
                }
            }
            Err(_) if attempts < MAX_RETRIES => {}
            Err(_) => return Err(ProvisionError::DiscoveryExhausted { attempts }),
        }

        if attempts >= MAX_RETRIES {
            return Err(ProvisionError::DiscoveryExhausted { attempts });
        }
        sleep(RETRY_INTERVAL).await;
    }
}

async fn query_targets(host: &str, port: u16) -> Result<Vec<TargetInfo>, ProvisionError> {
    let body = http_get(host, port, "/json/list").await?;
    serde_json::from_str(&body)
        .map_err(|e| ProvisionError::TransportFailed(format!("malformed /json/list body: {e}")))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_content_length(headers: &[u8]) -> Option<usize> {
    let header_str = std::str::from_utf8(headers).ok()?;
    for line in header_str.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

fn is_http_response_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find_header_end(buf) else {
        return false;
    };
    let body_start = header_end + 4;
    match parse_content_length(&buf[..header_end]) {
        Some(cl) => buf.len() >= body_start + cl,
        None => true,
    }
}

fn parse_http_response(buf: &[u8]) -> Result<String, ProvisionError> {
    let header_end = find_header_end(buf)
        .ok_or_else(|| ProvisionError::TransportFailed("malformed HTTP response".into()))?;
    let body_start = header_end + 4;

    let headers = std::str::from_utf8(&buf[..header_end])
        .map_err(|e| ProvisionError::TransportFailed(format!("invalid UTF-8 in headers: {e}")))?;

    let status_line = headers
        .lines()
        .next()
        .ok_or_else(|| ProvisionError::TransportFailed("empty response".into()))?;
    if !status_line.contains(" 200 ") {
        return Err(ProvisionError::TransportFailed(format!(
            "unexpected HTTP status: {status_line}"
        )));
    }

    let body_bytes = if let Some(cl) = parse_content_length(&buf[..header_end]) {
        let end = (body_start + cl).min(buf.len());
        &buf[body_start..end]
    } else {
        &buf[body_start..]
    };

    String::from_utf8(body_bytes.to_vec())
        .map_err(|e| ProvisionError::TransportFailed(format!("invalid UTF-8 in body: {e}")))
}

/// Perform a simple HTTP GET using blocking I/O in a `spawn_blocking` context.
async fn http_get(host: &str, port: u16, path: &str) -> Result<String, ProvisionError> {
    let addr = format!("{host}:{port}");
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");

    tokio::task::spawn_blocking(move || {
        let mut stream = TcpStream::connect_timeout(
            &addr
                .parse()
                .map_err(|e| ProvisionError::TransportFailed(format!("invalid address: {e}")))?,
            Duration::from_secs(2),
        )
        .map_err(|e| ProvisionError::TransportFailed(format!("connection failed to {addr}: {e}")))?;

        stream.set_read_timeout(Some(Duration::from_secs(5))).ok();
        stream
            .write_all(request.as_bytes())
            .map_err(|e| ProvisionError::TransportFailed(format!("write failed: {e}")))?;

        let mut buf = Vec::with_capacity(4096);
        let mut tmp = [0u8; 4096];
        loop {
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&tmp[..n]);
                    if is_http_response_complete(&buf) {
                        break;
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    if is_http_response_complete(&buf) {
                        break;
                    }
                    return Err(ProvisionError::TransportFailed(format!(
                        "read timed out: {e}"
                    )));
                }
                Err(e) => {
                    return Err(ProvisionError::TransportFailed(format!("read failed: {e}")));
                }
            }
        }

        parse_http_response(&buf)
    })
    .await
    .map_err(|e| ProvisionError::TransportFailed(format!("task join failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_target_list_with_ws_url() {
        let json = r#"[{"id":"1","type":"node","webSocketDebuggerUrl":"ws://127.0.0.1:9229/abc"}]"#;
        let targets: Vec<TargetInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(targets[0].ws_debugger_url.as_deref(), Some("ws://127.0.0.1:9229/abc"));
    }

    #[test]
    fn parse_target_list_without_ws_url() {
        let json = r#"[{"id":"1","type":"node"}]"#;
        let targets: Vec<TargetInfo> = serde_json::from_str(json).unwrap();
        assert!(targets[0].ws_debugger_url.is_none());
    }

    #[test]
    fn http_response_with_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n[]";
        assert_eq!(parse_http_response(raw).unwrap(), "[]");
    }

    #[test]
    fn http_response_non_200_is_error() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        assert!(parse_http_response(raw).is_err());
    }

    #[test]
    fn response_completeness_tracks_content_length() {
        let partial = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHe";
        assert!(!is_http_response_complete(partial));
        let complete = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHello";
        assert!(is_http_response_complete(complete));
    }
}
