//! HTTP implementation of [`Gateway`] using `reqwest`.
//!
//! Endpoints (relative to the configured base URL):
//!
//! * `POST /analyze-image/`: multipart `file`, `topic`, optional
//!   `motivational_texts`; success is exactly `202 Accepted`.
//! * `GET /status/{run_id}`: success is any 2xx.

use super::wire::{ErrorBody, StatusResponseBody, SubmitResponseBody};
use super::{Gateway, Submission, SubmissionRequest};
use crate::config::ClientConfig;
use crate::error::{EvalumeError, SubmissionError, TrackingError};
use crate::job::StatusUpdate;
use futures::future::{BoxFuture, FutureExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info, warn};

/// Gateway client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Result<Self, EvalumeError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            EvalumeError::InvalidConfig(format!("gateway URL '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(EvalumeError::InvalidConfig(format!(
                "gateway URL '{}' cannot be a base",
                config.base_url
            )));
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| EvalumeError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn submit_impl(&self, request: &SubmissionRequest) -> Result<Submission, SubmissionError> {
        // Trailing empty segment keeps the backend's trailing slash.
        let url = self.endpoint(&["analyze-image", ""]);
        info!("Submitting '{}' to {}", request.image.file_name, url);

        let part = Part::bytes(request.image.bytes.clone())
            .file_name(request.image.file_name.clone())
            .mime_str(&request.image.mime_type)
            .map_err(|e| SubmissionError::Network(format!("invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", part)
            .text("topic", request.topic.clone());
        if let Some(context) = request.context_text() {
            form = form.text("motivational_texts", context.to_string());
        }

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SubmissionError::Network(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let raw = response.text().await.unwrap_or_default();
            let message = ErrorBody::parse(&raw)
                .detail_or_message()
                .unwrap_or_else(|| "Failed to start image analysis".to_string());
            warn!("Submission rejected: HTTP {}: {}", status, message);
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: SubmitResponseBody = response
            .json()
            .await
            .map_err(|e| SubmissionError::MalformedResponse(e.to_string()))?;

        info!("Submission accepted: run {}", body.run_id);
        Ok(Submission {
            run_id: body.run_id,
            status: body.status,
            extracted_text: body.extracted_text,
        })
    }

    async fn status_impl(&self, run_id: &str) -> Result<StatusUpdate, TrackingError> {
        let url = self.endpoint(&["status", run_id]);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TrackingError::Network {
                run_id: run_id.to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = ErrorBody::parse(&raw)
                .message_or_detail()
                .unwrap_or_else(|| format!("Failed to get status for run {run_id}"));
            return Err(TrackingError::Status {
                run_id: run_id.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let raw = response.text().await.map_err(|e| TrackingError::Network {
            run_id: run_id.to_string(),
            detail: e.to_string(),
        })?;
        let body: StatusResponseBody =
            serde_json::from_str(&raw).map_err(|e| TrackingError::Decode {
                run_id: run_id.to_string(),
                detail: e.to_string(),
            })?;
        Ok(body.into())
    }
}

impl Gateway for HttpGateway {
    fn submit<'a>(
        &'a self,
        request: &'a SubmissionRequest,
    ) -> BoxFuture<'a, Result<Submission, SubmissionError>> {
        self.submit_impl(request).boxed()
    }

    fn status<'a>(&'a self, run_id: &'a str) -> BoxFuture<'a, Result<StatusUpdate, TrackingError>> {
        self.status_impl(run_id).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ImageUpload;
    use crate::job::StageStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Accept one connection, answer it with `status_line` and a JSON
    /// `body`, and hand back the raw request.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });
        (format!("http://{addr}"), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        while !request_complete(&buf) {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn request_complete(buf: &[u8]) -> bool {
        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        let body = &buf[head_end + 4..];
        let content_length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok());
        match content_length {
            Some(len) => body.len() >= len,
            None if head.contains("transfer-encoding: chunked") => body.ends_with(b"0\r\n\r\n"),
            None => true,
        }
    }

    fn essay_request(context: Option<&str>) -> SubmissionRequest {
        let upload = ImageUpload::from_bytes("essay.png", b"not really a png".to_vec())
            .with_mime_type("image/png");
        let request = SubmissionRequest::new(upload, "Climate policy");
        match context {
            Some(c) => request.with_context(c),
            None => request,
        }
    }

    #[tokio::test]
    async fn test_submit_accepted_sends_multipart_form() {
        let (base, server) = serve_once(
            "202 Accepted",
            r#"{"run_id":"abc123","status":"ACCEPTED","extracted_text":"A mountain landscape."}"#,
        )
        .await;

        let submission = gateway(&base)
            .submit(&essay_request(Some("Schools rely on tablets.")))
            .await
            .unwrap();
        assert_eq!(submission.run_id, "abc123");
        assert_eq!(submission.status, "ACCEPTED");
        assert_eq!(submission.extracted_text, "A mountain landscape.");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /analyze-image/ HTTP/1.1"), "{request}");
        assert!(request.contains(r#"name="file"; filename="essay.png""#));
        assert!(request.to_ascii_lowercase().contains("content-type: image/png"));
        assert!(request.contains(r#"name="topic""#));
        assert!(request.contains("Climate policy"));
        assert!(request.contains(r#"name="motivational_texts""#));
        assert!(request.contains("Schools rely on tablets."));
    }

    #[tokio::test]
    async fn test_submit_blank_context_is_omitted() {
        let (base, server) =
            serve_once("202 Accepted", r#"{"run_id":"r1","extracted_text":""}"#).await;
        gateway(&base).submit(&essay_request(Some("   "))).await.unwrap();
        let request = server.await.unwrap();
        assert!(!request.contains("motivational_texts"));
    }

    #[tokio::test]
    async fn test_submit_only_202_is_accepted() {
        let (base, _server) = serve_once(
            "200 OK",
            r#"{"run_id":"abc123","status":"ACCEPTED","extracted_text":"text"}"#,
        )
        .await;
        let err = gateway(&base).submit(&essay_request(None)).await.unwrap_err();
        match err {
            SubmissionError::Rejected { status, message } => {
                assert_eq!(status, 200);
                assert_eq!(message, "Failed to start image analysis");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_rejection_surfaces_detail() {
        let (base, _server) = serve_once(
            "500 Internal Server Error",
            r#"{"detail":"Text extraction failed: boom"}"#,
        )
        .await;
        let err = gateway(&base).submit(&essay_request(None)).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Rejected { status: 500, .. }));
        assert_eq!(
            err.to_string(),
            "Failed to upload image. Text extraction failed: boom"
        );
    }

    #[tokio::test]
    async fn test_submit_rejection_falls_back_to_message() {
        let (base, _server) =
            serve_once("400 Bad Request", r#"{"message":"Topic too long."}"#).await;
        let err = gateway(&base).submit(&essay_request(None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to upload image. Topic too long.");
    }

    #[tokio::test]
    async fn test_status_decodes_stages() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{
                "text_extraction": {"status": "COMPLETED", "result": "A mountain landscape."},
                "linguistic_analysis": {"status": "COMPLETED", "result": "Clear prose."},
                "argumentative_analysis": {"status": "RUNNING", "result": null}
            }"#,
        )
        .await;
        let update = gateway(&base).status("abc123").await.unwrap();
        assert_eq!(
            update.linguistic_analysis,
            StageStatus::Completed(Some("Clear prose.".into()))
        );
        assert_eq!(update.argumentative_analysis, StageStatus::Pending);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /status/abc123 HTTP/1.1"), "{request}");
    }

    #[tokio::test]
    async fn test_status_non_success_is_a_tracking_error() {
        let (base, _server) =
            serve_once("404 Not Found", r#"{"message":"Run ID not found."}"#).await;
        let err = gateway(&base).status("missing").await.unwrap_err();
        assert!(matches!(err, TrackingError::Status { status: 404, .. }));
        assert_eq!(err.run_id(), "missing");
        assert_eq!(err.detail(), "HTTP 404: Run ID not found.");
        assert_eq!(err.to_string(), crate::error::TRACKING_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_status_undecodable_body_is_a_tracking_error() {
        let (base, _server) = serve_once("200 OK", r#"{"linguistic_analysis": 3}"#).await;
        let err = gateway(&base).status("abc123").await.unwrap_err();
        assert!(matches!(err, TrackingError::Decode { .. }));
    }

    fn gateway(base: &str) -> HttpGateway {
        let config = ClientConfig::builder().base_url(base).build().unwrap();
        HttpGateway::new(&config).unwrap()
    }

    #[test]
    fn test_submit_endpoint_keeps_trailing_slash() {
        let g = gateway("http://localhost:8000");
        assert_eq!(
            g.endpoint(&["analyze-image", ""]).as_str(),
            "http://localhost:8000/analyze-image/"
        );
    }

    #[test]
    fn test_status_endpoint_under_prefix() {
        let g = gateway("https://host.example/api/");
        assert_eq!(
            g.endpoint(&["status", "abc123"]).as_str(),
            "https://host.example/api/status/abc123"
        );
    }

    #[test]
    fn test_run_id_is_percent_encoded() {
        let g = gateway("http://localhost:8000");
        let url = g.endpoint(&["status", "a b/c"]);
        assert_eq!(url.path(), "/status/a%20b%2Fc");
    }
}
