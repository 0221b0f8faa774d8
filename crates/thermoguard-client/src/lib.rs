//! Client for the remote face registration/verification API.
//!
//! Both endpoints take `{"user_name": ..., "face_vector": [...]}` as a JSON
//! POST body. Verification succeeds only when the response body carries
//! `"status": "success"`; the HTTP status alone is not enough.
//!
//! Verification fails closed: any transport, status or parse error resolves
//! to "rejected" and is logged, never propagated. This is the opposite of the
//! liveness check, which fails open.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thermoguard_core::{Descriptor, FailMode};
use thiserror::Error;
use ureq::Agent;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";
pub const REGISTER_ENDPOINT: &str = "register_face";
pub const VERIFY_ENDPOINT: &str = "verify_face";

/// What [`ApiClient::verify`] resolves to when no decision could be read.
pub const VERIFY_FAIL_MODE: FailMode = FailMode::Closed;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: ureq::Error,
    },
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("malformed response from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Request body shared by both endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDto<'a> {
    pub user_name: &'a str,
    pub face_vector: &'a [f32],
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl VerifyResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Blocking HTTP client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    agent: Agent,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// POST the DTO and return the body of a 2xx response.
    fn post(&self, endpoint: &str, dto: &MessageDto<'_>) -> Result<String, ClientError> {
        let url = self.url(endpoint);
        let body = serde_json::to_string(dto).map_err(ClientError::Encode)?;

        let mut resp = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send(body.as_str())
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        let text = resp
            .body_mut()
            .read_to_string()
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    /// Register a descriptor under `user_name`.
    pub fn register(&self, user_name: &str, descriptor: &Descriptor) -> Result<(), ClientError> {
        let dto = MessageDto {
            user_name,
            face_vector: descriptor.values(),
        };
        let body = self.post(REGISTER_ENDPOINT, &dto).map_err(|e| {
            tracing::error!(user = user_name, error = %e, "register failed");
            e
        })?;
        tracing::info!(user = user_name, response = %body, "registered face");
        Ok(())
    }

    /// Ask the server whether `descriptor` belongs to `user_name`,
    /// propagating every failure.
    pub fn try_verify(&self, user_name: &str, descriptor: &Descriptor) -> Result<bool, ClientError> {
        let dto = MessageDto {
            user_name,
            face_vector: descriptor.values(),
        };
        let body = self.post(VERIFY_ENDPOINT, &dto)?;
        let parsed: VerifyResponse =
            serde_json::from_str(&body).map_err(|source| ClientError::Malformed {
                url: self.url(VERIFY_ENDPOINT),
                source,
            })?;
        tracing::debug!(
            user = user_name,
            status = %parsed.status,
            message = ?parsed.message,
            "verify response"
        );
        Ok(parsed.is_success())
    }

    /// Like [`ApiClient::try_verify`], but any failure resolves to
    /// [`VERIFY_FAIL_MODE`].
    pub fn verify(&self, user_name: &str, descriptor: &Descriptor) -> bool {
        match self.try_verify(user_name, descriptor) {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(user = user_name, error = %e, "verify failed, rejecting");
                VERIFY_FAIL_MODE.allows()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use thermoguard_core::types::DESCRIPTOR_DIM;

    fn descriptor() -> Descriptor {
        Descriptor::new((0..DESCRIPTOR_DIM).map(|i| i as f32 / 1000.0).collect()).unwrap()
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let content_length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serve exactly one canned response; the join handle yields the raw
    /// request that was received.
    fn serve_once(response: String) -> (ApiClient, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            request
        });
        let client = ApiClient::new(&format!("http://{addr}/api/"), Duration::from_secs(5));
        (client, handle)
    }

    #[test]
    fn verify_success_status_accepts() {
        let (client, server) = serve_once(http_response("200 OK", r#"{"status":"success"}"#));
        assert!(client.verify("alice", &descriptor()));

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/verify_face "));
        assert!(request.contains(r#""user_name":"alice""#));
        assert!(request.contains(r#""face_vector":[0.0,0.001"#));
    }

    #[test]
    fn verify_other_status_rejects() {
        let (client, server) = serve_once(http_response(
            "200 OK",
            r#"{"status":"fail","message":"no match"}"#,
        ));
        assert!(!client.verify("alice", &descriptor()));
        server.join().unwrap();
    }

    #[test]
    fn verify_http_500_rejects() {
        let (client, server) = serve_once(http_response("500 Internal Server Error", "{}"));
        assert!(!client.verify("alice", &descriptor()));
        server.join().unwrap();
    }

    #[test]
    fn verify_malformed_json_rejects() {
        let (client, server) = serve_once(http_response("200 OK", "<html>oops</html>"));
        assert!(!client.verify("alice", &descriptor()));
        server.join().unwrap();
    }

    #[test]
    fn try_verify_surfaces_malformed_body() {
        let (client, server) = serve_once(http_response("200 OK", r#"{"result":true}"#));
        let err = client.try_verify("alice", &descriptor()).unwrap_err();
        assert!(matches!(err, ClientError::Malformed { .. }));
        server.join().unwrap();
    }

    #[test]
    fn verify_unreachable_server_rejects() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        // Listener dropped: nothing accepts on this port any more.
        let client = ApiClient::new(&format!("http://{addr}/api"), Duration::from_secs(2));
        assert!(!client.verify("alice", &descriptor()));
    }

    #[test]
    fn register_posts_to_register_endpoint() {
        let (client, server) = serve_once(http_response("200 OK", r#"{"status":"ok"}"#));
        client.register("bob", &descriptor()).unwrap();
        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/register_face "));
        assert!(request.contains(r#""user_name":"bob""#));
    }

    #[test]
    fn register_surfaces_http_errors() {
        let (client, server) = serve_once(http_response("409 Conflict", r#"{"detail":"exists"}"#));
        let err = client.register("bob", &descriptor()).unwrap_err();
        match err {
            ClientError::Status { status, body, .. } => {
                assert_eq!(status, 409);
                assert!(body.contains("exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn verification_fails_closed() {
        assert_eq!(VERIFY_FAIL_MODE, FailMode::Closed);
        assert!(!VERIFY_FAIL_MODE.allows());
    }

    #[test]
    fn base_url_trailing_slash_normalised() {
        let client = ApiClient::new(DEFAULT_BASE_URL, Duration::from_secs(1));
        assert_eq!(client.url(VERIFY_ENDPOINT), "http://localhost:8000/api/verify_face");
    }
}
