// ABOUTME: Minimal HTTP/1.1 client over plain TCP built on hyper.
// ABOUTME: Shared by the Marathon REST client and the HAProxy stats client.

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST, HeaderValue, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

const AGENT: &str = concat!("marathon-bluegreen/", env!("CARGO_PKG_VERSION"));

/// Errors from a single HTTP exchange.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("unsupported scheme '{0}', only http is supported")]
    UnsupportedScheme(String),

    #[error("connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("request failed: {0}")]
    Send(#[source] hyper::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] hyper::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One-connection-per-request HTTP client.
///
/// Every call opens a TCP connection, performs the exchange and drops the
/// connection. Request volume here is a handful of calls per drain step, so
/// pooling buys nothing.
#[derive(Debug, Clone)]
pub struct HttpClient {
    timeout: Duration,
    authorization: Option<HeaderValue>,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            authorization: None,
        }
    }

    /// Send `value` as the Authorization header on every request.
    pub fn with_authorization(mut self, value: HeaderValue) -> Self {
        self.authorization = Some(value);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(&self, uri: &Uri) -> Result<HttpResponse, HttpError> {
        self.send(Method::GET, uri, None).await
    }

    /// Perform a request, sending `body` as JSON when present.
    pub async fn send(
        &self,
        method: Method,
        uri: &Uri,
        body: Option<Bytes>,
    ) -> Result<HttpResponse, HttpError> {
        tokio::time::timeout(self.timeout, self.exchange(method, uri, body))
            .await
            .map_err(|_| HttpError::Timeout(self.timeout))?
    }

    async fn exchange(
        &self,
        method: Method,
        uri: &Uri,
        body: Option<Bytes>,
    ) -> Result<HttpResponse, HttpError> {
        let scheme = uri.scheme_str().unwrap_or("http");
        if scheme != "http" {
            return Err(HttpError::UnsupportedScheme(scheme.to_string()));
        }

        let authority = uri
            .authority()
            .ok_or_else(|| HttpError::InvalidUri(uri.to_string()))?;
        let host = authority.host().trim_start_matches('[').trim_end_matches(']');
        let port = authority.port_u16().unwrap_or(80);

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| HttpError::Connect {
                address: authority.to_string(),
                source,
            })?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(HttpError::Handshake)?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "http connection closed with error");
            }
        });

        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(path)
            .header(HOST, authority.as_str())
            .header(USER_AGENT, AGENT);

        if let Some(auth) = &self.authorization {
            builder = builder.header(AUTHORIZATION, auth.clone());
        }

        let payload = match body {
            Some(bytes) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Full::new(bytes)
            }
            None => Full::new(Bytes::new()),
        };

        let req = builder.body(payload)?;
        tracing::debug!(%method, %uri, "sending request");

        let resp = sender.send_request(req).await.map_err(HttpError::Send)?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(HttpError::Body)?
            .to_bytes();

        Ok(HttpResponse { status, body })
    }
}
