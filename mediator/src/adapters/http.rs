//! HTTP transport to the XDS.b registry.

use crate::collaborators::{BoxFuture, Forwarder};
use crate::error::TransportError;
use crate::types::{MediatorHttpRequest, MediatorHttpResponse, RequestHandle};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// reqwest-backed [`Forwarder`].
///
/// Any HTTP status is a response; only failing to get one is an error.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    /// Creates a forwarder whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(
        client: reqwest::Client,
        request: MediatorHttpRequest,
    ) -> Result<MediatorHttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut builder = client
            .request(method, request.url())
            .query(&request.query_params);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        // An absent Content-Type stays absent (empty) on the way back
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_default();
        let bytes = response.bytes().await.map_err(classify)?;
        let body = String::from_utf8(bytes.to_vec())
            .map_err(|e| TransportError::InvalidBody(e.to_string()))?;

        Ok(MediatorHttpResponse {
            status,
            content_type,
            body,
        })
    }
}

impl Forwarder for HttpForwarder {
    fn forward(
        &self,
        request_handler: RequestHandle,
        request: MediatorHttpRequest,
    ) -> BoxFuture<Result<MediatorHttpResponse, TransportError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let orchestration = request.orchestration.clone();
            let url = request.url();
            let start = std::time::Instant::now();

            let result = Self::send(client, request).await;

            match &result {
                Ok(response) => tracing::debug!(
                    handle = %request_handler,
                    %orchestration,
                    %url,
                    status = response.status,
                    duration_ms = start.elapsed().as_millis(),
                    "Downstream request completed"
                ),
                Err(error) => tracing::warn!(
                    handle = %request_handler,
                    %orchestration,
                    %url,
                    %error,
                    "Downstream request failed"
                ),
            }
            result
        })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Io(error.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use crate::config::RegistryEndpoint;
    use crate::reducer::forward_request;
    use axum::Router;
    use axum::extract::{Query, RawQuery};
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use std::collections::BTreeMap;

    async fn fault(headers: HeaderMap, body: String) -> (StatusCode, [(header::HeaderName, String); 1], String) {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "application/soap+xml".to_string())],
            format!("<Fault ct=\"{content_type}\">{body}</Fault>"),
        )
    }

    async fn echo_query(RawQuery(raw): RawQuery, Query(params): Query<BTreeMap<String, String>>) -> String {
        format!(
            "{}\n{}",
            raw.unwrap_or_default(),
            params.get("patient id").cloned().unwrap_or_default()
        )
    }

    async fn bare() -> Response {
        let mut response = "<Response/>".into_response();
        response.headers_mut().remove(header::CONTENT_TYPE);
        response
    }

    async fn latin1() -> ([(header::HeaderName, &'static str); 1], Vec<u8>) {
        (
            [(header::CONTENT_TYPE, "text/xml; charset=ISO-8859-1")],
            vec![b'<', b'a', b'>', 0xE9, b'<', b'/', b'a', b'>'],
        )
    }

    async fn registry() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = Router::new()
            .route("/xdsregistry", post(fault))
            .route("/query", post(echo_query))
            .route("/bare", post(bare))
            .route("/latin1", post(latin1));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        port
    }

    fn endpoint(port: u16) -> RegistryEndpoint {
        RegistryEndpoint {
            scheme: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port,
            path: "/xdsregistry".to_string(),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let port = registry().await;
        let forwarder = HttpForwarder::new(Duration::from_secs(5)).unwrap();

        let response = forwarder
            .forward(RequestHandle::new(), forward_request(&endpoint(port), "<Query/>".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(response.content_type, "application/soap+xml");
        assert_eq!(
            response.body,
            "<Fault ct=\"application/soap+xml\"><Query/></Fault>"
        );
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let forwarder = HttpForwarder::new(Duration::from_secs(5)).unwrap();

        let result = forwarder
            .forward(RequestHandle::new(), forward_request(&endpoint(port), String::new()))
            .await;

        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_query_params_are_percent_encoded() {
        let port = registry().await;
        let forwarder = HttpForwarder::new(Duration::from_secs(5)).unwrap();
        let mut request = forward_request(&endpoint(port), String::new());
        request.path = "/query".to_string();
        request
            .query_params
            .insert("patient id".to_string(), "a&b=c".to_string());

        let response = forwarder.forward(RequestHandle::new(), request).await.unwrap();

        assert_eq!(response.body, "patient+id=a%26b%3Dc\na&b=c");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_not_invented() {
        let port = registry().await;
        let forwarder = HttpForwarder::new(Duration::from_secs(5)).unwrap();
        let mut request = forward_request(&endpoint(port), String::new());
        request.path = "/bare".to_string();

        let response = forwarder.forward(RequestHandle::new(), request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "");
        assert_eq!(response.body, "<Response/>");
    }

    #[tokio::test]
    async fn test_non_utf8_body_is_a_transport_error() {
        let port = registry().await;
        let forwarder = HttpForwarder::new(Duration::from_secs(5)).unwrap();
        let mut request = forward_request(&endpoint(port), String::new());
        request.path = "/latin1".to_string();

        let result = forwarder.forward(RequestHandle::new(), request).await;

        assert!(matches!(result, Err(TransportError::InvalidBody(_))));
    }
}
