//! `reqwest` implementation of [`UploadTransport`].

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::redirect::Policy;
use resumable_protocol::constants::{
    HEADER_UPLOAD_CONTENT_LENGTH, HEADER_UPLOAD_CONTENT_TYPE, METADATA_CONTENT_TYPE,
};
use resumable_transfer::BodyStream;
use tracing::debug;

use crate::config::UploaderConfig;
use crate::error::TransportError;
use crate::transport::{
    HttpReply, InitiationRequest, ProbeRequest, TransportFuture, UploadRequest, UploadTransport,
};

/// HTTP transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client from the configuration.
    ///
    /// Redirects are disabled so 308 replies are handed back untouched.
    pub fn new(config: &UploaderConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { http })
    }

    /// Wraps an existing client. It must not follow redirects.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Drains a response into an [`HttpReply`].
async fn into_reply(resp: reqwest::Response) -> Result<HttpReply, TransportError> {
    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let body = resp.bytes().await?;
    Ok(HttpReply {
        status,
        headers,
        body,
    })
}

impl UploadTransport for HttpTransport {
    fn send_initiation(&self, request: InitiationRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            debug!(
                endpoint = %request.endpoint,
                size = request.upload_content_length,
                "sending initiation request"
            );
            let resp = self
                .http
                .post(&request.endpoint)
                .bearer_auth(&request.token)
                .header(CONTENT_TYPE, METADATA_CONTENT_TYPE)
                .header(HEADER_UPLOAD_CONTENT_LENGTH, request.upload_content_length)
                .header(HEADER_UPLOAD_CONTENT_TYPE, &request.upload_content_type)
                .body(request.metadata)
                .send()
                .await?;
            into_reply(resp).await
        })
    }

    fn send_upload(&self, request: UploadRequest, body: BodyStream) -> TransportFuture<'_> {
        Box::pin(async move {
            let mut builder = self
                .http
                .put(&request.session_url)
                .bearer_auth(&request.token)
                .header(CONTENT_TYPE, &request.content_type)
                .header(CONTENT_LENGTH, request.content_length);
            if let Some(range) = request.content_range {
                builder = builder.header(CONTENT_RANGE, range.to_string());
            }
            debug!(
                length = request.content_length,
                range = ?request.content_range.map(|r| r.to_string()),
                "sending upload request"
            );
            let resp = builder
                .body(reqwest::Body::wrap_stream(body))
                .send()
                .await?;
            into_reply(resp).await
        })
    }

    fn send_probe(&self, request: ProbeRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let resp = self
                .http
                .put(&request.session_url)
                .bearer_auth(&request.token)
                .header(CONTENT_LENGTH, 0)
                .header(CONTENT_RANGE, request.content_range().to_string())
                .send()
                .await?;
            into_reply(resp).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use resumable_transfer::{ByteSink, body_channel};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// What the mock server received.
    #[derive(Debug)]
    struct Captured {
        request_line: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl Captured {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Starts a mock HTTP server that answers one request with `response`
    /// and hands back what it received.
    async fn mock_server(response: String) -> (String, tokio::task::JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];

            let head_end = loop {
                let n = stream.read(&mut tmp).await.unwrap();
                assert!(n > 0, "connection closed before headers");
                buf.extend_from_slice(&tmp[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
            let mut lines = head.split("\r\n").filter(|l| !l.is_empty());
            let request_line = lines.next().unwrap_or_default().to_string();
            let headers: Vec<(String, String)> = lines
                .filter_map(|l| l.split_once(':'))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect();

            let length: usize = headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(0);

            let mut body = buf[head_end..].to_vec();
            while body.len() < length {
                let n = stream.read(&mut tmp).await.unwrap();
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&tmp[..n]);
            }

            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;

            Captured {
                request_line,
                headers,
                body,
            }
        });

        (url, handle)
    }

    fn response(status_line: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut out = format!("HTTP/1.1 {status_line}\r\n");
        for (k, v) in headers {
            out.push_str(&format!("{k}: {v}\r\n"));
        }
        out.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ));
        out
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(&UploaderConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn initiation_sends_protocol_headers() {
        let (url, handle) = mock_server(response(
            "200 OK",
            &[("Location", "https://upload.example.com/s?upload_id=abc")],
            "",
        ))
        .await;

        let reply = transport()
            .send_initiation(InitiationRequest {
                endpoint: format!("{url}/upload/videos?uploadType=resumable"),
                token: "ya29.token".into(),
                metadata: br#"{"snippet":{"title":"clip"}}"#.to_vec(),
                upload_content_length: 1000,
                upload_content_type: "video/mp4".into(),
            })
            .await
            .unwrap();

        assert_eq!(reply.status, 200);
        assert_eq!(
            reply.header("Location"),
            Some("https://upload.example.com/s?upload_id=abc")
        );

        let captured = handle.await.unwrap();
        assert!(captured.request_line.starts_with("POST /upload/videos?uploadType=resumable"));
        assert_eq!(captured.header("Authorization"), Some("Bearer ya29.token"));
        assert_eq!(
            captured.header("Content-Type"),
            Some("application/json; charset=UTF-8")
        );
        assert_eq!(captured.header("X-Upload-Content-Length"), Some("1000"));
        assert_eq!(captured.header("X-Upload-Content-Type"), Some("video/mp4"));
        assert_eq!(captured.body, br#"{"snippet":{"title":"clip"}}"#);
    }

    #[tokio::test]
    async fn upload_streams_body_with_range() {
        let (url, handle) = mock_server(response(
            "201 Created",
            &[("Content-Type", "application/json")],
            r#"{"id":"vid123"}"#,
        ))
        .await;

        let (mut sink, body) = body_channel(4);
        let writer = tokio::spawn(async move {
            sink.write(Bytes::from_static(b"45678")).await.unwrap();
            sink.write(Bytes::from_static(b"9")).await.unwrap();
            sink.finish();
        });

        let reply = transport()
            .send_upload(
                UploadRequest::from_offset(format!("{url}/session"), "tok", "video/mp4", 4, 10),
                body,
            )
            .await
            .unwrap();
        writer.await.unwrap();

        assert_eq!(reply.status, 201);
        assert_eq!(&reply.body[..], br#"{"id":"vid123"}"#);

        let captured = handle.await.unwrap();
        assert!(captured.request_line.starts_with("PUT /session"));
        assert_eq!(captured.header("Content-Length"), Some("6"));
        assert_eq!(captured.header("Content-Range"), Some("bytes 4-9/10"));
        assert_eq!(captured.header("Content-Type"), Some("video/mp4"));
        assert_eq!(captured.body, b"456789");
    }

    #[tokio::test]
    async fn probe_sends_open_range_and_keeps_308() {
        let (url, handle) = mock_server(response(
            "308 Resume Incomplete",
            &[("Range", "bytes=0-399")],
            "",
        ))
        .await;

        let reply = transport()
            .send_probe(ProbeRequest {
                session_url: format!("{url}/session"),
                token: "tok".into(),
                total_size: 1000,
            })
            .await
            .unwrap();

        assert_eq!(reply.status, 308);
        assert_eq!(reply.header("Range"), Some("bytes=0-399"));

        let captured = handle.await.unwrap();
        assert!(captured.request_line.starts_with("PUT /session"));
        assert_eq!(captured.header("Content-Length"), Some("0"));
        assert_eq!(captured.header("Content-Range"), Some("bytes */1000"));
        assert!(captured.body.is_empty());
    }

    #[tokio::test]
    async fn error_status_is_a_reply_not_an_error() {
        let (url, handle) = mock_server(response(
            "503 Service Unavailable",
            &[],
            "backend error",
        ))
        .await;

        let reply = transport()
            .send_probe(ProbeRequest {
                session_url: format!("{url}/session"),
                token: "tok".into(),
                total_size: 10,
            })
            .await
            .unwrap();
        assert_eq!(reply.status, 503);
        assert_eq!(reply.body_text(), "backend error");
        handle.abort();
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = transport()
            .send_probe(ProbeRequest {
                session_url: format!("http://127.0.0.1:{port}/session"),
                token: "tok".into(),
                total_size: 10,
            })
            .await
            .unwrap_err();
        assert!(err.status.is_none());
    }
}
