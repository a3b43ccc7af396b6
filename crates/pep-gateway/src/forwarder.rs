//! Replays authorized requests against the backend.

use axum::body::{Body, Bytes};
use axum::response::{IntoResponse, Response};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Headers describing a single hop; never relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

const DEFAULT_CONTENT_TYPE: &str = "application/json";

pub struct BackendForwarder {
    base_url: String,
    http: reqwest::Client,
}

/// What the backend answered, relayed to the caller as-is.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendForwarder {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `method {base_url}{path_and_query}` with `payload` as JSON body.
    ///
    /// No retries; a transport failure is returned to the caller.
    #[instrument(skip(self, payload), fields(backend = %self.base_url))]
    pub async fn forward(
        &self,
        method: &Method,
        path_and_query: &str,
        payload: Option<&Map<String, Value>>,
    ) -> Result<BackendReply, reqwest::Error> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        debug!(%url, status = status.as_u16(), bytes = body.len(), "backend replied");

        Ok(BackendReply {
            status,
            headers,
            body,
        })
    }
}

impl IntoResponse for BackendReply {
    /// Same status and body. When the backend named a content type its
    /// end-to-end headers are relayed; otherwise only a default content
    /// type is set.
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        if self.headers.contains_key(header::CONTENT_TYPE) {
            for (name, value) in &self.headers {
                if !is_hop_by_hop(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        } else {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
            );
        }
        response
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method as http_method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn body_of(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn replays_method_path_query_and_payload() {
        let server = MockServer::start().await;
        Mock::given(http_method("PUT"))
            .and(path("/orders/7"))
            .and(query_param("dry", "1"))
            .and(body_json(json!({"item": "book"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"ok": true}))
                    .insert_header("x-backend", "orders"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = BackendForwarder::new(format!("{}/", server.uri()), reqwest::Client::new());
        let payload = json!({"item": "book"}).as_object().cloned().unwrap();
        let reply = forwarder
            .forward(&Method::PUT, "/orders/7?dry=1", Some(&payload))
            .await
            .unwrap();

        assert_eq!(reply.status, StatusCode::CREATED);
        assert_eq!(reply.headers["x-backend"], "orders");
        assert_eq!(&reply.body[..], br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let forwarder = BackendForwarder::new("http://127.0.0.1:1", reqwest::Client::new());
        assert!(forwarder.forward(&Method::GET, "/", None).await.is_err());
    }

    #[tokio::test]
    async fn relays_headers_when_content_type_present() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        headers.insert("x-request-cost", HeaderValue::from_static("3"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let response = BackendReply {
            status: StatusCode::ACCEPTED,
            headers,
            body: Bytes::from_static(b"a,b\n1,2\n"),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(response.headers()["x-request-cost"], "3");
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(&body_of(response).await[..], b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn defaults_content_type_and_drops_headers_when_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-cost", HeaderValue::from_static("3"));

        let response = BackendReply {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(b"{}"),
        }
        .into_response();

        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert!(response.headers().get("x-request-cost").is_none());
        assert_eq!(&body_of(response).await[..], b"{}");
    }
}
